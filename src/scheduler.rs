//! Fixed-interval poll loop: fetch, normalize, diff, deliver.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::time;

use crate::archive::AttachmentStore;
use crate::config::Config;
use crate::contacts::ContactDirectory;
use crate::delivery::{DeliveryOutcome, DeliveryPipeline};
use crate::delta::DeltaTracker;
use crate::error::BridgeError;
use crate::graph::{MailGateway, TaskGateway};
use crate::message::{normalize, Message};

/// Runtime knobs for the poll loop.
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub fetch_limit: u32,
    pub task_list_id: String,
}

impl PollSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
            fetch_limit: config.fetch_limit,
            task_list_id: config.task_list_id.clone(),
        }
    }
}

/// Owns the gateways and the snapshot tracker, and drives one poll cycle at
/// a time. Deliveries within a cycle run strictly sequentially to keep task
/// ordering deterministic and avoid bursts against the task service.
pub struct PollScheduler<M: MailGateway, T: TaskGateway> {
    mail: M,
    tasks: T,
    contacts: ContactDirectory,
    store: AttachmentStore,
    tracker: DeltaTracker,
    settings: PollSettings,
}

impl<M: MailGateway, T: TaskGateway> PollScheduler<M, T> {
    pub fn new(
        mail: M,
        tasks: T,
        contacts: ContactDirectory,
        store: AttachmentStore,
        settings: PollSettings,
    ) -> Self {
        Self {
            mail,
            tasks,
            contacts,
            store,
            tracker: DeltaTracker::new(),
            settings,
        }
    }

    /// Prime the baseline, then poll until the shutdown flag flips. A failed
    /// cycle is logged and the loop carries on; only the initial fetch is
    /// fatal.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        self.initialize().await?;

        let mut ticker = time::interval(self.settings.interval);
        // The first tick of a tokio interval fires immediately; the baseline
        // was fetched a moment ago, so consume it and wait a full period.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        tracing::error!("Poll cycle failed: {e:#}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Shutdown requested, stopping poll loop");
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Boot fetch: establishes the comparison baseline without delivering.
    async fn initialize(&mut self) -> Result<()> {
        let current = self
            .fetch_normalized()
            .await
            .context("initial mailbox fetch failed")?;
        tracing::info!("Primed baseline with {} messages", current.len());
        self.tracker.prime(current);
        Ok(())
    }

    /// One poll cycle. On fetch failure the snapshot is left untouched, so
    /// the next cycle compares against the same baseline.
    async fn run_cycle(&mut self) -> Result<(), BridgeError> {
        let current = self.fetch_normalized().await?;
        let delta = self.tracker.diff(current);
        if delta.is_empty() {
            if let Some(snapshot) = self.tracker.snapshot() {
                tracing::debug!(
                    "No new mail, {} messages in snapshot captured at {}",
                    snapshot.messages.len(),
                    snapshot.captured_at
                );
            }
            return Ok(());
        }
        tracing::info!("Found {} new messages", delta.len());

        let pipeline = DeliveryPipeline::new(
            &self.mail,
            &self.tasks,
            &self.store,
            &self.settings.task_list_id,
        );
        for message in &delta {
            match pipeline.deliver(message).await {
                Ok(DeliveryOutcome::Delivered { task_id, .. }) => {
                    tracing::info!("Delivered message {} as task {}", message.message_id, task_id);
                }
                Ok(DeliveryOutcome::Unauthorized) => {
                    tracing::warn!("Skipped unauthorized message {}", message.message_id);
                }
                // The message stays in the snapshot, so it will not be
                // retried; log loudly.
                Err(e) => {
                    tracing::error!("Lost message {}: {}", message.message_id, e);
                }
            }
        }
        Ok(())
    }

    async fn fetch_normalized(&self) -> Result<Vec<Message>, BridgeError> {
        let raw = self.mail.fetch_recent(self.settings.fetch_limit).await?;
        Ok(raw.iter().map(|r| normalize(r, &self.contacts)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{directory, raw_message, text_attachment, RecordingTasks, ScriptedMail};

    fn settings() -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(90),
            fetch_limit: 10,
            task_list_id: "list-1".to_string(),
        }
    }

    fn build_scheduler(
        mail: ScriptedMail,
        tasks: RecordingTasks,
    ) -> (tempfile::TempDir, PollScheduler<ScriptedMail, RecordingTasks>) {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let store = AttachmentStore::new(dir.path());
        let scheduler = PollScheduler::new(mail, tasks, directory(), store, settings());
        (dir, scheduler)
    }

    #[tokio::test]
    async fn test_boot_messages_never_delivered_then_new_message_once() {
        let mail = ScriptedMail::new();
        // Boot: one message from an unmapped sender.
        mail.push_fetch(vec![raw_message("m1", "9998887777@vtext.com")]);
        // Next poll: Bob texted, old message still listed.
        let mut from_bob = raw_message("m2", "5550001111@vtext.com");
        from_bob.attachments.push(text_attachment("a1", "Call me"));
        mail.push_fetch(vec![from_bob, raw_message("m1", "9998887777@vtext.com")]);

        let (_dir, mut scheduler) = build_scheduler(mail, RecordingTasks::new());
        scheduler.initialize().await.expect("should prime");
        assert!(scheduler.tasks.created().is_empty());

        scheduler.run_cycle().await.expect("cycle should succeed");
        assert_eq!(
            scheduler.tasks.created(),
            vec![("list-1".to_string(), "Call me, Bob".to_string())]
        );

        // Unchanged mailbox on the following cycle: nothing new.
        scheduler.run_cycle().await.expect("cycle should succeed");
        assert_eq!(scheduler.tasks.created().len(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_new_message_never_delivered() {
        let mail = ScriptedMail::new();
        mail.push_fetch(vec![]);
        mail.push_fetch(vec![raw_message("m1", "9998887777@vtext.com")]);

        let (_dir, mut scheduler) = build_scheduler(mail, RecordingTasks::new());
        scheduler.initialize().await.expect("should prime");
        scheduler.run_cycle().await.expect("cycle should succeed");

        assert!(scheduler.tasks.created().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_baseline_and_recovers() {
        let mail = ScriptedMail::new();
        mail.push_fetch(vec![raw_message("m1", "5550001111@vtext.com")]);
        mail.push_fetch_error();
        let mut fresh = raw_message("m2", "5550001111@vtext.com");
        fresh.attachments.push(text_attachment("a1", "Still here"));
        mail.push_fetch(vec![fresh, raw_message("m1", "5550001111@vtext.com")]);

        let (_dir, mut scheduler) = build_scheduler(mail, RecordingTasks::new());
        scheduler.initialize().await.expect("should prime");

        // The failing cycle reports its error but leaves the snapshot alone.
        scheduler
            .run_cycle()
            .await
            .expect_err("gateway failure should surface");
        assert_eq!(
            scheduler.tracker.snapshot().unwrap().messages.len(),
            1,
            "snapshot untouched by failed fetch"
        );

        // The next cycle diffs against the same baseline and delivers.
        scheduler.run_cycle().await.expect("cycle should succeed");
        assert_eq!(
            scheduler.tasks.created(),
            vec![("list-1".to_string(), "Still here, Bob".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failed_delivery_is_not_retried() {
        let mail = ScriptedMail::new();
        mail.push_fetch(vec![]);
        let mut from_bob = raw_message("m1", "5550001111@vtext.com");
        from_bob.attachments.push(text_attachment("a1", "Lost one"));
        mail.push_fetch(vec![from_bob.clone()]);
        mail.push_fetch(vec![from_bob]);

        let tasks = RecordingTasks::new();
        tasks.fail_next_create();
        let (_dir, mut scheduler) = build_scheduler(mail, tasks);
        scheduler.initialize().await.expect("should prime");

        // Creation fails; the cycle itself still completes.
        scheduler.run_cycle().await.expect("cycle should succeed");
        assert!(scheduler.tasks.created().is_empty());

        // The message is already in the snapshot: no second attempt.
        scheduler.run_cycle().await.expect("cycle should succeed");
        assert!(scheduler.tasks.created().is_empty());
    }

    #[tokio::test]
    async fn test_deliveries_follow_fetch_order() {
        let mail = ScriptedMail::new();
        mail.push_fetch(vec![]);
        let mut newest = raw_message("m2", "5551234567@vtext.com");
        newest.attachments.push(text_attachment("a1", "second"));
        let mut older = raw_message("m1", "5550001111@vtext.com");
        older.attachments.push(text_attachment("a2", "first"));
        mail.push_fetch(vec![newest, older]);

        let (_dir, mut scheduler) = build_scheduler(mail, RecordingTasks::new());
        scheduler.initialize().await.expect("should prime");
        scheduler.run_cycle().await.expect("cycle should succeed");

        let titles: Vec<String> =
            scheduler.tasks.created().into_iter().map(|(_, t)| t).collect();
        assert_eq!(titles, vec!["second, Alice".to_string(), "first, Bob".to_string()]);
    }
}
