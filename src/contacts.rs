//! Whitelist of known senders.
//!
//! The directory maps a sender key (a 10-digit phone-number prefix for
//! SMS-forwarding gateways, or a full email address) to a display name.
//! It is built once at startup and read-only afterwards; a sender that does
//! not resolve is never delivered.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Phone-style keys are matched on this many leading characters of the
/// sender address.
pub const PHONE_PREFIX_LEN: usize = 10;

/// Resolution of a message sender against the contact directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sender {
    Known(String),
    Unknown,
}

impl Sender {
    pub fn is_known(&self) -> bool {
        matches!(self, Sender::Known(_))
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::Known(name) => f.write_str(name),
            Sender::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// Immutable sender whitelist loaded from CSV.
#[derive(Debug, Clone)]
pub struct ContactDirectory {
    entries: HashMap<String, String>,
}

impl ContactDirectory {
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read contacts CSV {}", path.display()))?;
        Self::from_csv_str(&text)
    }

    /// Parse `phone_number,name` CSV text. Duplicate keys last-wins; blank
    /// lines are skipped; an empty directory is an error since the process
    /// must not run unfiltered.
    pub fn from_csv_str(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let header = lines.next().context("contacts CSV is empty")?;
        if header.trim() != "phone_number,name" {
            bail!("contacts CSV header must be 'phone_number,name', got '{header}'");
        }

        let mut entries = HashMap::new();
        for (index, line) in lines.enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, name) = line
                .split_once(',')
                .with_context(|| format!("contacts CSV line {} has no comma", index + 2))?;
            let key = key.trim();
            let name = name.trim();
            if key.is_empty() || name.is_empty() {
                bail!("contacts CSV line {} is missing a key or name", index + 2);
            }
            entries.insert(key.to_string(), name.to_string());
        }

        let directory = Self { entries };
        if directory.is_empty() {
            bail!("contacts CSV has no entries");
        }
        Ok(directory)
    }

    /// Exact-match lookup: the fixed-length prefix of the sender address for
    /// phone-style keys, or the full address for email keys. No fuzzy
    /// matching.
    pub fn resolve(&self, sender_address: &str) -> Sender {
        let address = sender_address.trim();
        let prefix: String = address.chars().take(PHONE_PREFIX_LEN).collect();
        if let Some(name) = self.entries.get(prefix.as_str()) {
            return Sender::Known(name.clone());
        }
        if let Some(name) = self.entries.get(address) {
            return Sender::Known(name.clone());
        }
        Sender::Unknown
    }

    pub fn is_whitelisted(&self, sender_address: &str) -> bool {
        self.resolve(sender_address).is_known()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
