//! Process liveness endpoint.
//!
//! Answers `GET /` with `200 OK` regardless of poll-cycle health; it reports
//! that the process is up, nothing more.

use std::net::SocketAddr;

use anyhow::Result;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

pub async fn serve(port: u16) -> Result<()> {
    let app = Router::new()
        .route("/", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Liveness endpoint listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
