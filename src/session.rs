//! Tab interaction controller.
//!
//! `Session` owns the file registry, the session metadata and the editor, and
//! applies every user action to all of them before returning, so callers
//! never see a half-applied change.
//!
//! Storage failures degrade instead of aborting: the in-memory change is
//! kept, the discrepancy is logged and a notice is queued for the user.
//! Every other error aborts the action and leaves the session unchanged.

use crate::adapters::{EditorAdapter, Formatter};
use crate::command::Command;
use crate::config::{Settings, Theme};
use crate::error::{Error, Result};
use crate::metadata::MetadataManager;
use crate::model::{FileRecord, FileState, Language};
use crate::registry::FileRegistry;
use crate::store::DurableStore;
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Notices
// ─────────────────────────────────────────────────────────────────────────────

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A message for the user, drained by the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            NoticeLevel::Info => write!(f, "{}", self.message),
            NoticeLevel::Error => write!(f, "error: {}", self.message),
        }
    }
}

/// One entry of the tab strip, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: String,
    pub language: Language,
    pub state: FileState,
    pub active: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// An open editing session over one durable store.
pub struct Session<S, E, F> {
    store: Arc<S>,
    registry: FileRegistry<S>,
    metadata: MetadataManager<S>,
    editor: E,
    formatter: F,
    theme: Theme,
    notices: Vec<Notice>,
}

impl<S, E, F> Session<S, E, F>
where
    S: DurableStore,
    E: EditorAdapter,
    F: Formatter,
{
    /// Restore the session stored in `store`.
    ///
    /// Seeds `settings.default_file_name` into an empty store, repairs the
    /// stored metadata against the stored files and binds the active file to
    /// the editor. Only a failure to read the store is fatal.
    pub async fn open(
        store: Arc<S>,
        editor: E,
        formatter: F,
        settings: &Settings,
    ) -> Result<Self> {
        let registry = FileRegistry::load(Arc::clone(&store), settings.debounce()).await?;
        let mut session = Self {
            metadata: MetadataManager::load(Arc::clone(&store), &registry.ids()).await?,
            store,
            registry,
            editor,
            formatter,
            theme: settings.theme,
            notices: Vec::new(),
        };

        if session.registry.is_empty() {
            info!("Store is empty, seeding '{}'", settings.default_file_name);
            let record = session.registry.insert(&settings.default_file_name)?;
            let result = session.registry.persist_new(&record).await;
            session.degrade(result)?;
            let ids = session.registry.ids();
            session.metadata.edit(|meta| meta.reconcile(&ids));
        }

        if session.metadata.is_dirty() {
            let result = session.metadata.persist().await;
            session.degrade(result)?;
        }

        let active = session.active_id()?;
        session.bind_editor(&active);
        info!(
            "Session restored with {} file(s), active '{}'",
            session.registry.len(),
            active
        );
        Ok(session)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Id of the active file.
    pub fn active_file_id(&self) -> Option<&str> {
        self.metadata.active_file_id()
    }

    /// The active file's record.
    pub fn active_file(&self) -> Option<&FileRecord> {
        self.active_file_id().and_then(|id| self.registry.get(id))
    }

    /// Tabs in display order.
    pub fn tabs(&self) -> Vec<Tab> {
        let active = self.active_file_id();
        self.metadata
            .file_order()
            .iter()
            .filter_map(|id| self.registry.get(id))
            .map(|record| Tab {
                id: record.id.clone(),
                language: record.language,
                state: self.registry.state_of(&record.id),
                active: active == Some(record.id.as_str()),
            })
            .collect()
    }

    /// Persistence state of a file.
    pub fn state_of(&self, id: &str) -> FileState {
        self.registry.state_of(id)
    }

    pub fn registry(&self) -> &FileRegistry<S> {
        &self.registry
    }

    pub fn metadata(&self) -> &MetadataManager<S> {
        &self.metadata
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    /// Mutable editor access. Report changes with `on_editor_change`.
    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Drain queued notices, including failures of background writes.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.collect_write_failures();
        std::mem::take(&mut self.notices)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tab Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an empty file, append it to the tab strip and make it active.
    pub async fn create_file(&mut self, name: &str) -> Result<String> {
        self.collect_write_failures();
        let record = self.registry.insert(name)?;
        let result = self.registry.persist_new(&record).await;
        self.degrade(result)?;

        let limit = self.registry.len();
        self.metadata.edit(|meta| {
            meta.record_access(&record.id, limit);
            meta.append_to_order(&record.id);
        });
        let result = self.metadata.persist().await;
        self.degrade(result)?;

        self.bind_editor(&record.id);
        info!("Created '{}'", record.id);
        Ok(record.id)
    }

    /// Make `id` the active file, loading its content from the store.
    pub async fn switch_tab(&mut self, id: &str) -> Result<()> {
        self.collect_write_failures();
        if self.active_file_id() == Some(id) {
            return Ok(());
        }
        if !self.registry.contains(id) {
            return Err(Error::NotFound { id: id.to_string() });
        }

        // Land pending writes of both files so the stored copy of `id` is current.
        if let Some(outgoing) = self.active_file_id().map(str::to_string) {
            let result = self.registry.flush(&outgoing).await;
            self.degrade(result)?;
        }
        let result = self.registry.flush(id).await;
        self.degrade(result)?;
        self.load_from_store(id).await?;

        let limit = self.registry.len();
        let result = self.metadata.record_access(id, limit).await;
        self.degrade(result)?;

        self.bind_editor(id);
        debug!("Switched to '{}'", id);
        Ok(())
    }

    /// Delete a file. Deleting the active file activates a replacement.
    pub async fn delete_tab(&mut self, id: &str) -> Result<()> {
        self.collect_write_failures();
        if self.registry.len() <= 1 {
            return Err(Error::LastFile);
        }

        let replacement = self.registry.remove(id, self.metadata.metadata())?;
        let result = self.registry.delete_stored(id).await;
        self.degrade(result)?;

        self.metadata.edit(|meta| meta.remove(id));
        if let Some(next) = &replacement {
            let result = self.registry.flush(next).await;
            self.degrade(result)?;
            self.load_from_store(next).await?;
            let limit = self.registry.len();
            self.metadata.edit(|meta| meta.record_access(next, limit));
        }
        let result = self.metadata.persist().await;
        self.degrade(result)?;

        if let Some(next) = &replacement {
            self.bind_editor(next);
        }
        info!("Deleted '{}'", id);
        Ok(())
    }

    /// Move the tab at `from` to `to`.
    pub async fn reorder_tabs(&mut self, from: usize, to: usize) -> Result<()> {
        self.collect_write_failures();
        let result = self.metadata.reorder(from, to).await;
        self.degrade(result)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Editing
    // ─────────────────────────────────────────────────────────────────────────

    /// Pick up the editor's content and cursor after the user changed them.
    pub fn on_editor_change(&mut self) -> Result<()> {
        let id = self.active_id()?;
        let content = self.editor.content();
        let cursor = self.editor.cursor();
        if let Some(record) = self.registry.get(&id) {
            if record.content == content && (cursor.is_none() || record.cursor_position == cursor) {
                return Ok(());
            }
        }
        let content = content.to_string();
        self.registry.update_content(&id, content, cursor)
    }

    /// Replace the active file's content, as if the user had typed it.
    pub fn edit_active(&mut self, text: &str, cursor: Option<usize>) -> Result<()> {
        let id = self.active_id()?;
        self.editor.set_content(text);
        if let Some(line) = cursor {
            self.editor.set_cursor(line);
        }
        self.registry.update_content(&id, text.to_string(), cursor)
    }

    /// Format the active file.
    ///
    /// Returns `true` if the content changed. On a formatter error the
    /// content is left alone and nothing is written.
    pub async fn format_active(&mut self) -> Result<bool> {
        self.collect_write_failures();
        let id = self.active_id()?;
        let Some(record) = self.registry.get(&id) else {
            return Err(Error::NotFound { id });
        };

        let formatted = match self.formatter.format(&record.content, record.language) {
            Ok(formatted) => formatted,
            Err(e) => {
                warn!("Failed to format '{}': {}", id, e);
                return Err(e.into());
            }
        };

        if formatted == record.content {
            self.notices
                .push(Notice::info(format!("'{}' is already formatted", id)));
            return Ok(false);
        }

        info!("Formatted {} document '{}'", record.language.display_name(), id);
        self.edit_active(&formatted, None)?;
        self.notices.push(Notice::info(format!("Formatted '{}'", id)));
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Write every pending edit now. Failures become notices.
    pub async fn flush(&mut self) {
        for (id, e) in self.registry.writer().flush_all().await {
            self.notices
                .push(Notice::error(format!("Could not save '{}': {}", id, e)));
        }
        if self.metadata.is_dirty() {
            let result = self.metadata.persist().await;
            // Storage errors never escape `degrade`
            let _ = self.degrade(result);
        }
    }

    /// Flush pending edits and close the store.
    pub async fn close(mut self) -> Result<Vec<Notice>> {
        self.flush().await;
        self.store.close().await?;
        info!("Session closed");
        Ok(self.take_notices())
    }

    /// Run one user command. Errors are turned into notices.
    ///
    /// Display commands (`show`, `tabs`, `help`, `quit`) are left to the
    /// front end and do nothing here.
    pub async fn execute(&mut self, command: &Command) {
        let result = match command {
            Command::New(name) => self.create_file(name).await.map(|_| ()),
            Command::Delete(id) => self.delete_tab(id).await,
            Command::Switch(id) => self.switch_tab(id).await,
            Command::Move { from, to } => self.reorder_tabs(*from, *to).await,
            Command::Format => self.format_active().await.map(|_| ()),
            Command::Write(text) => self.type_into_editor(|editor| editor.set_content(text)),
            Command::Append(text) => self.type_into_editor(|editor| {
                let mut content = editor.content().to_string();
                content.push_str(text);
                editor.set_content(&content);
            }),
            Command::Cursor(line) => self.type_into_editor(|editor| editor.set_cursor(*line)),
            Command::Flush => {
                self.flush().await;
                Ok(())
            }
            Command::Show | Command::Tabs | Command::Help | Command::Quit => Ok(()),
        };

        if let Err(e) = result {
            debug!("Command {:?} failed: {}", command, e);
            self.notices.push(Notice::error(e.to_string()));
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn type_into_editor(&mut self, f: impl FnOnce(&mut E)) -> Result<()> {
        f(&mut self.editor);
        self.on_editor_change()
    }

    fn active_id(&self) -> Result<String> {
        self.active_file_id()
            .map(str::to_string)
            .ok_or_else(|| Error::NotFound {
                id: String::from("<active file>"),
            })
    }

    /// Push the record `id` into the editor.
    fn bind_editor(&mut self, id: &str) {
        let Some(record) = self.registry.get(id) else {
            warn!("Cannot bind missing file '{}' to the editor", id);
            return;
        };
        self.editor.configure(record.language, self.theme);
        self.editor.set_content(&record.content);
        if let Some(line) = record.cursor_position {
            self.editor.set_cursor(line);
        }
    }

    /// Refresh `id` from the store, keeping the cached copy if the read fails.
    async fn load_from_store(&mut self, id: &str) -> Result<()> {
        match self.registry.reload(id).await {
            Ok(_) => Ok(()),
            Err(e) => self.degrade(Err(e)),
        }
    }

    /// Turn a storage failure into a notice; pass every other error on.
    fn degrade(&mut self, result: Result<()>) -> Result<()> {
        match result {
            Err(Error::Storage(e)) => {
                self.notices.push(Notice::error(Error::Storage(e).to_string()));
                Ok(())
            }
            other => other,
        }
    }

    fn collect_write_failures(&mut self) {
        for (id, e) in self.registry.writer().take_failures() {
            self.notices
                .push(Notice::error(format!("Could not save '{}': {}", id, e)));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
