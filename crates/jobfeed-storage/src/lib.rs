//! Store document persistence and feed download for jobfeed.

mod http;
mod recovery;
mod render;

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use jobfeed_core::Store;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

pub use http::{FeedBody, FetchError, HttpClientConfig, HttpFetcher, RetrySchedule};
pub use recovery::{parse_document, CorruptSequence, RecoveryError};
pub use render::{header_line, render_document, COMBINED_JOBS_NAME};

pub const CRATE_NAME: &str = "jobfeed-storage";

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Replace `path` wholesale via a sibling temp file and rename.
///
/// A crash before the rename leaves the previous file untouched.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .await
        .with_context(|| format!("creating directory {}", parent.display()))?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document");
    let temp_path = parent.join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

    let mut file = fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&temp_path)
        .await
        .with_context(|| format!("opening temp file {}", temp_path.display()))?;
    let written = async {
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;
    drop(file);
    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path).await;
        return Err(err).with_context(|| format!("writing temp file {}", temp_path.display()));
    }

    match fs::rename(&temp_path, path).await {
        Ok(()) => Ok(()),
        Err(err) => {
            let _ = fs::remove_file(&temp_path).await;
            Err(err).with_context(|| {
                format!(
                    "atomically renaming {} -> {}",
                    temp_path.display(),
                    path.display()
                )
            })
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reading store document {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Corrupt(#[from] RecoveryError),
    #[error("rendering store document: {0}")]
    Render(#[from] serde_json::Error),
    #[error("writing store document: {0:#}")]
    Write(anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct SavedDocument {
    pub path: PathBuf,
    pub sha256: String,
    pub byte_size: usize,
}

/// The persisted store document.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    path: PathBuf,
}

impl DocumentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the store. An absent document is an empty store; corrupt content is an error.
    pub async fn load(&self) -> Result<Store, StoreError> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "store document absent; starting empty");
                return Ok(Store::default());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        Ok(parse_document(&text)?)
    }

    pub async fn save(&self, store: &Store, updated_at: DateTime<Utc>) -> Result<SavedDocument, StoreError> {
        let text = render_document(store, updated_at)?;
        write_atomic(&self.path, text.as_bytes())
            .await
            .map_err(StoreError::Write)?;
        Ok(SavedDocument {
            path: self.path.clone(),
            sha256: sha256_hex(text.as_bytes()),
            byte_size: text.len(),
        })
    }
}
