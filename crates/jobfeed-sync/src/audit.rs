//! Bounded, most-recent-first run history.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use jobfeed_core::KindCounts;
use jobfeed_storage::write_atomic;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

pub const AUDIT_LOG_CAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Update,
    SourceError,
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<KindCounts>,
}

impl AuditEntry {
    pub fn new(timestamp: DateTime<Utc>, action: AuditAction, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            action,
            message: message.into(),
            counts: None,
        }
    }

    pub fn with_counts(mut self, counts: KindCounts) -> Self {
        self.counts = Some(counts);
        self
    }
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    cap: usize,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cap: AUDIT_LOG_CAP,
        }
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current history. An absent or unreadable log reads as empty.
    pub async fn entries(&self) -> Vec<AuditEntry> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "audit log unreadable; starting fresh");
                return Vec::new();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "audit log corrupt; starting fresh");
                Vec::new()
            }
        }
    }

    /// Prepend `batch` (first element becomes the newest entry) and rewrite the log.
    pub async fn record(&self, batch: Vec<AuditEntry>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut entries = batch;
        entries.extend(self.entries().await);
        entries.truncate(self.cap);

        let bytes = serde_json::to_vec_pretty(&entries).context("serializing audit log")?;
        write_atomic(&self.path, &bytes)
            .await
            .with_context(|| format!("writing audit log {}", self.path.display()))
    }

    pub async fn append(&self, entry: AuditEntry) -> Result<()> {
        self.record(vec![entry]).await
    }
}
