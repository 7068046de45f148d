//! In-memory collection of open files, kept in sync with the durable store.
//!
//! The registry is the editor-facing cache of file records. Content edits
//! land here synchronously and reach the store through the debounced
//! `FileWriter`; structural changes (add, delete) are written through
//! immediately.
//!
//! When a store write fails the in-memory change is kept so the editor stays
//! usable, and the failure is returned to the caller to report.

use crate::error::{Error, Result};
use crate::model::{FileRecord, FileState, SessionMetadata};
use crate::store::DurableStore;
use crate::writer::FileWriter;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Ordered set of open files.
pub struct FileRegistry<S> {
    store: Arc<S>,
    writer: FileWriter<S>,
    files: Vec<FileRecord>,
}

impl<S: DurableStore> FileRegistry<S> {
    /// Load every stored file record.
    pub async fn load(store: Arc<S>, debounce: Duration) -> Result<Self> {
        let files = store.get_all_files().await?;
        let writer = FileWriter::new(Arc::clone(&store), debounce);
        for file in &files {
            writer.mark_synced(&file.id);
        }
        info!("Loaded {} file(s) from the store", files.len());
        Ok(Self {
            store,
            writer,
            files,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Number of open files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no file is open.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// All open files in insertion order.
    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    /// Ids of all open files in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.files.iter().map(|f| f.id.clone()).collect()
    }

    /// Look up a file by id.
    pub fn get(&self, id: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.id == id)
    }

    /// Whether a file with this id is open.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Persistence state of a file.
    pub fn state_of(&self, id: &str) -> FileState {
        self.writer.state_of(id)
    }

    /// The write scheduler backing this registry.
    pub fn writer(&self) -> &FileWriter<S> {
        &self.writer
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.files
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| Error::NotFound { id: id.to_string() })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an empty file named `name` and persist it.
    ///
    /// Fails with `DuplicateName` if the derived id is taken. If only the
    /// store write fails, the file stays open and `Error::Storage` is returned.
    pub async fn add_file(&mut self, name: &str) -> Result<FileRecord> {
        let record = self.insert(name)?;
        self.persist_new(&record).await?;
        Ok(record)
    }

    /// Validate `name` and append an empty record in memory only.
    pub fn insert(&mut self, name: &str) -> Result<FileRecord> {
        let record = FileRecord::new(name)?;
        if self.contains(&record.id) {
            return Err(Error::DuplicateName { id: record.id });
        }
        self.files.push(record.clone());
        debug!("Added '{}' ({})", record.id, record.language.display_name());
        Ok(record)
    }

    /// Write a record that was just inserted.
    pub async fn persist_new(&self, record: &FileRecord) -> Result<()> {
        self.writer.write_now(record).await.map_err(|e| {
            warn!(
                "File '{}' is open but was not stored: {}; it will be missing after reload",
                record.id, e
            );
            Error::from(e)
        })
    }

    /// Remove `id` from memory and from the store.
    ///
    /// Fails with `LastFile` when `id` is the only open file. When `id` is the
    /// active file in `meta`, returns the file that must become active.
    /// If only the store delete fails, the file is still closed and
    /// `Error::Storage` is returned.
    pub async fn delete_file(
        &mut self,
        id: &str,
        meta: &SessionMetadata,
    ) -> Result<Option<String>> {
        let replacement = self.remove(id, meta)?;
        self.delete_stored(id).await?;
        Ok(replacement)
    }

    /// Remove `id` from memory only. See `delete_file`.
    pub fn remove(&mut self, id: &str, meta: &SessionMetadata) -> Result<Option<String>> {
        let index = self.position(id)?;
        if self.files.len() <= 1 {
            return Err(Error::LastFile);
        }

        self.files.remove(index);
        let replacement = if meta.active_file_id.as_deref() == Some(id) {
            meta.resolve_replacement_on_delete(id, &self.ids())
        } else {
            None
        };
        debug!("Removed '{}', replacement: {:?}", id, replacement);
        Ok(replacement)
    }

    /// Delete the stored copy of a file already removed from memory.
    pub async fn delete_stored(&self, id: &str) -> Result<()> {
        self.writer.delete(id).await.map_err(|e| {
            warn!(
                "File '{}' was closed but its stored copy remains: {}; it will reappear after reload",
                id, e
            );
            Error::from(e)
        })
    }

    /// Apply an edit in memory and schedule its persistence.
    pub fn update_content(
        &mut self,
        id: &str,
        content: String,
        cursor_position: Option<usize>,
    ) -> Result<()> {
        let index = self.position(id)?;
        let record = &mut self.files[index];
        record.content = content;
        if cursor_position.is_some() {
            record.cursor_position = cursor_position;
        }
        self.writer.schedule(record.clone());
        Ok(())
    }

    /// Replace the in-memory copy of `id` with the stored one.
    ///
    /// Keeps the in-memory copy while the store is behind it (a write is
    /// waiting or the last one failed) or has no record for `id`.
    pub async fn reload(&mut self, id: &str) -> Result<&FileRecord> {
        let index = self.position(id)?;
        if self.writer.is_behind(id) {
            warn!(
                "Stored copy of '{}' is older than the editor; keeping the in-memory version",
                id
            );
            return Ok(&self.files[index]);
        }
        match self.store.get_file(id).await? {
            Some(stored) => {
                self.writer.mark_synced(id);
                self.files[index] = stored;
            }
            None => warn!(
                "No stored copy of '{}'; keeping the in-memory version",
                id
            ),
        }
        Ok(&self.files[index])
    }

    /// Force the pending write of `id`, if any.
    pub async fn flush(&self, id: &str) -> Result<()> {
        Ok(self.writer.flush(id).await?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
