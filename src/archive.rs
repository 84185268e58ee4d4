//! Local persistence of message attachments.
//!
//! Files land in a date-partitioned tree under the configured root:
//! `<root>/<monthname>_<year>/<month>_<day>_<year>/`. Names are built from a
//! short prefix of the SMS body, a fragment of the message id, and a
//! per-extension running counter so two same-typed files from one message
//! never overwrite each other.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const BODY_PREFIX_LEN: usize = 9;

/// Date-partitioned attachment store rooted at a base directory.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write one message's attachments under the partition for `date`.
    /// Returns the paths written.
    pub fn save(
        &self,
        date: NaiveDate,
        message_id: &str,
        body_hint: &str,
        files: &[(&str, &[u8])],
    ) -> io::Result<Vec<PathBuf>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let dir = self.day_dir(date)?;
        let prefix = sanitize_for_filename(&take_chars(body_hint, BODY_PREFIX_LEN));
        let fragment = id_fragment(message_id);

        let mut counters: HashMap<String, u32> = HashMap::new();
        let mut written = Vec::with_capacity(files.len());
        for &(name, bytes) in files {
            let extension = Path::new(name)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("bin")
                .to_ascii_lowercase();
            let count = counters.entry(extension.clone()).or_insert(0);
            let file_name = format!("{prefix}_{fragment}_{count}.{extension}");
            *count += 1;

            let path = dir.join(file_name);
            fs::write(&path, bytes)?;
            tracing::info!("Saved attachment to {}", path.display());
            written.push(path);
        }
        Ok(written)
    }

    fn day_dir(&self, date: NaiveDate) -> io::Result<PathBuf> {
        let month_dir = format!("{}_{}", MONTH_NAMES[date.month0() as usize], date.year());
        let day_dir = format!("{}_{}_{}", date.month(), date.day(), date.year());
        let dir = self.root.join(month_dir).join(day_dir);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Short stable fragment of a provider message id, safe for char boundaries.
fn id_fragment(message_id: &str) -> String {
    let chars: Vec<char> = message_id.chars().collect();
    if chars.len() < 8 {
        return chars.into_iter().collect();
    }
    chars[chars.len() - 8..chars.len() - 4].iter().collect()
}

fn take_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn sanitize_for_filename(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' | ' ' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
