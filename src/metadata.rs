//! Session metadata manager: active file, MRU history and tab order.
//!
//! Wraps the singleton `SessionMetadata` record with persistence. Writes are
//! last-writer-wins; a single editor session is assumed to own the store.

use crate::error::Result;
use crate::model::SessionMetadata;
use crate::store::DurableStore;
use log::{debug, warn};
use std::sync::Arc;

/// Owner of the in-memory session record.
pub struct MetadataManager<S> {
    store: Arc<S>,
    meta: SessionMetadata,
    dirty: bool,
}

impl<S: DurableStore> MetadataManager<S> {
    /// Load the stored record and reconcile it with the open file ids.
    ///
    /// A missing or repaired record is marked dirty; call `persist` to store it.
    pub async fn load(store: Arc<S>, ids: &[String]) -> Result<Self> {
        let stored = store.get_metadata().await?;
        let missing = stored.is_none();
        let mut meta = stored.unwrap_or_default();
        let repaired = meta.reconcile(ids);
        if repaired && !missing {
            warn!("Stored session metadata did not match the stored files and was repaired");
        }
        Ok(Self {
            store,
            meta,
            dirty: missing || repaired,
        })
    }

    /// The current record.
    pub fn metadata(&self) -> &SessionMetadata {
        &self.meta
    }

    /// Id of the active file.
    pub fn active_file_id(&self) -> Option<&str> {
        self.meta.active_file_id.as_deref()
    }

    /// Tab display order.
    pub fn file_order(&self) -> &[String] {
        &self.meta.file_order
    }

    /// Access history, most recent last.
    pub fn history(&self) -> &[String] {
        &self.meta.history
    }

    /// Whether in-memory changes have not been stored yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mutate the record in memory; call `persist` afterwards.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut SessionMetadata) -> R) -> R {
        self.dirty = true;
        f(&mut self.meta)
    }

    /// Store the current record.
    pub async fn persist(&mut self) -> Result<()> {
        match self.store.put_metadata(&self.meta).await {
            Ok(()) => {
                self.dirty = false;
                debug!(
                    "Stored session metadata (active: {:?}, order: {:?})",
                    self.meta.active_file_id, self.meta.file_order
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Session metadata not stored: {}; tab order and active file may revert after reload",
                    e
                );
                Err(e.into())
            }
        }
    }

    /// Make `id` active and most recent, then persist.
    pub async fn record_access(&mut self, id: &str, limit: usize) -> Result<()> {
        self.edit(|meta| meta.record_access(id, limit));
        self.persist().await
    }

    /// Move a tab from `from` to `to`, then persist.
    ///
    /// Out-of-range indices are rejected without touching the record.
    pub async fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        self.meta.reorder(from, to)?;
        self.dirty = true;
        self.persist().await
    }

    /// The file to activate after deleting the active file `deleted`.
    pub fn resolve_replacement_on_delete(
        &self,
        deleted: &str,
        remaining: &[String],
    ) -> Option<String> {
        self.meta.resolve_replacement_on_delete(deleted, remaining)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
