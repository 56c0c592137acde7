//! Persistence hook: invoked after each successful durable update.
//!
//! The store hands the hook a full snapshot of the conversation list;
//! what happens to it (JSON files, a database, nothing) is the hook's
//! concern. Hook failure never rolls back the in-memory mutation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::errors::StoreError;
use confab_core::Conversation;

/// Receives the conversation list after each durable update.
#[async_trait]
pub trait PersistenceHook: Send + Sync {
    /// Persist `snapshot` (the full conversation list, newest first).
    async fn persist(&self, snapshot: &[Conversation]) -> Result<(), StoreError>;
}

/// Hook that discards every snapshot.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullHook;

#[async_trait]
impl PersistenceHook for NullHook {
    async fn persist(&self, _snapshot: &[Conversation]) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Hook that writes one JSON file per conversation under a directory.
///
/// Files for conversations no longer in the snapshot are removed, so a
/// deleted conversation disappears from disk on the next durable update.
#[derive(Clone, Debug)]
pub struct JsonSnapshotHook {
    dir: PathBuf,
}

impl JsonSnapshotHook {
    /// Hook writing under `dir` (created on first persist).
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, conversation: &Conversation) -> PathBuf {
        self.dir.join(format!("{}.json", conversation.id))
    }
}

#[async_trait]
impl PersistenceHook for JsonSnapshotHook {
    async fn persist(&self, snapshot: &[Conversation]) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        for conversation in snapshot {
            let json = serde_json::to_vec_pretty(conversation)?;
            tokio::fs::write(self.path_for(conversation), json).await?;
        }

        // Drop files for conversations that no longer exist.
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            if !snapshot.iter().any(|c| c.id.as_str() == stem) {
                debug!(path = %path.display(), "removing stale conversation file");
                tokio::fs::remove_file(&path).await?;
            }
        }

        Ok(())
    }
}

/// Load all conversations previously written by [`JsonSnapshotHook`],
/// newest first.
pub async fn load_snapshot_dir(dir: impl AsRef<Path>) -> Result<Vec<Conversation>, StoreError> {
    let dir = dir.as_ref();
    let mut conversations = Vec::new();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(conversations),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let bytes = tokio::fs::read(&path).await?;
        let conversation: Conversation = serde_json::from_slice(&bytes)?;
        conversations.push(conversation);
    }

    conversations.sort_by_key(|c| std::cmp::Reverse(c.updated_at));
    Ok(conversations)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
