//! Destinations for notification records.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::NotificationRecord;
use crate::types::UserId;

const NOTIFICATIONS_FILE: &str = "notifications.json";

/// Bulk destination for notification records.
///
/// Callers treat failures as non-fatal; implementations should return the
/// error rather than retrying internally.
pub trait NotificationSink: Send + Sync {
    /// Sink name (for logging)
    fn name(&self) -> &str;

    /// Write all records in one operation
    fn insert_many(&self, records: &[NotificationRecord]) -> Result<()>;
}

/// In-process inbox, optionally mirrored to `notifications.json`
#[derive(Debug, Default)]
pub struct InMemoryNotificationSink {
    records: Mutex<Vec<NotificationRecord>>,
    writes: Mutex<usize>,
    file: Option<PathBuf>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(state_dir: &Path) -> Result<Self> {
        fs::create_dir_all(state_dir).context("Failed to create state directory")?;
        let file = state_dir.join(NOTIFICATIONS_FILE);
        let records = if file.exists() {
            let contents =
                fs::read_to_string(&file).context("Failed to read notifications file")?;
            serde_json::from_str(&contents).context("Failed to parse notifications file")?
        } else {
            Vec::new()
        };
        Ok(Self {
            records: Mutex::new(records),
            writes: Mutex::new(0),
            file: Some(file),
        })
    }

    /// Notifications for a user, newest first
    pub fn for_recipient(&self, user: UserId, unread_only: bool) -> Vec<NotificationRecord> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<NotificationRecord> = records
            .iter()
            .filter(|r| r.recipient == user && (!unread_only || !r.read))
            .cloned()
            .collect();
        out.reverse();
        out
    }

    pub fn all(&self) -> Vec<NotificationRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of bulk writes performed
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotificationSink for InMemoryNotificationSink {
    fn name(&self) -> &str {
        "memory"
    }

    fn insert_many(&self, records: &[NotificationRecord]) -> Result<()> {
        let mut stored = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        stored.extend_from_slice(records);
        if let Some(file) = &self.file {
            let contents = serde_json::to_string_pretty(&*stored)?;
            if let Err(e) = fs::write(file, contents) {
                let len = stored.len();
                stored.truncate(len - records.len());
                return Err(e).context("Failed to write notifications file");
            }
        }
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}
