//! Snapshot of the last fetch and detection of newly arrived messages.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::message::Message;

/// The most recent successfully fetched, normalized message list.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub messages: Vec<Message>,
    pub captured_at: DateTime<Utc>,
}

/// Detects messages newly visible since the previous poll.
///
/// Exactly one snapshot is live at a time and it is replaced wholesale after
/// each successful fetch. Membership is forward-only for the process
/// lifetime: once a message id has appeared in any snapshot it is never
/// reported again, even if the provider drops it and later re-lists it.
/// Nothing survives a restart; the first fetch of a fresh process primes the
/// baseline without delivering.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    snapshot: Option<Snapshot>,
    seen_ids: HashSet<String>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_primed(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Store the boot fetch as the comparison baseline. Its messages count
    /// as already known and are never delivered.
    pub fn prime(&mut self, current: Vec<Message>) {
        self.replace(current);
    }

    /// Compute the whitelisted messages in `current` whose ids have never
    /// been seen, in `current` order (provider newest-first), then adopt
    /// `current` as the new snapshot. An unprimed tracker primes instead and
    /// reports nothing.
    pub fn diff(&mut self, current: Vec<Message>) -> Vec<Message> {
        if !self.is_primed() {
            self.prime(current);
            return Vec::new();
        }

        let delta: Vec<Message> = current
            .iter()
            .filter(|m| !self.seen_ids.contains(&m.message_id) && m.is_whitelisted())
            .cloned()
            .collect();

        self.replace(current);
        delta
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    fn replace(&mut self, current: Vec<Message>) {
        // Every fetched id becomes known, whitelisted or not.
        self.seen_ids
            .extend(current.iter().map(|m| m.message_id.clone()));
        self.snapshot = Some(Snapshot {
            messages: current,
            captured_at: Utc::now(),
        });
    }
}
