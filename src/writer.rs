//! Debounced, per-file ordered persistence of file records.
//!
//! Every edit schedules a deferred write of the latest record. A new edit
//! for the same file cancels the pending write and schedules a fresh one,
//! so a burst of keystrokes collapses into a single write of the last value.
//!
//! Writes for one file id are serialized through a per-file async lock
//! that is acquired in request order: a deferred write that has already
//! started always lands before a later flush, delete or write of the same
//! file.

use crate::error::{StorageError, StoreResult};
use crate::model::{FileRecord, FileState};
use crate::store::DurableStore;
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Mutex as FileLock;
use tokio::task::JoinHandle;

/// A write waiting for its quiet period to pass.
#[derive(Debug)]
struct PendingWrite {
    generation: u64,
    record: FileRecord,
    task: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct WriterState {
    pending: HashMap<String, PendingWrite>,
    locks: HashMap<String, Arc<FileLock<()>>>,
    /// Ids with at least one successful write or loaded from the store
    synced: HashSet<String>,
    /// Last record of each id whose latest write attempt failed
    stale: HashMap<String, FileRecord>,
    /// Failures of deferred writes not yet reported
    failures: Vec<(String, StorageError)>,
    next_generation: u64,
}

impl WriterState {
    fn lock_for(&mut self, id: &str) -> Arc<FileLock<()>> {
        self.locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(FileLock::new(())))
            .clone()
    }

    fn cancel_pending(&mut self, id: &str) -> Option<FileRecord> {
        self.pending.remove(id).map(|pending| {
            pending.task.abort();
            pending.record
        })
    }

    fn record_outcome(&mut self, record: &FileRecord, result: &StoreResult<()>) {
        match result {
            Ok(()) => {
                self.stale.remove(&record.id);
                self.synced.insert(record.id.clone());
            }
            Err(_) => {
                self.stale.insert(record.id.clone(), record.clone());
            }
        }
    }
}

/// Schedules and orders file record writes against a shared store.
pub struct FileWriter<S> {
    store: Arc<S>,
    delay: Duration,
    runtime: Handle,
    state: Arc<Mutex<WriterState>>,
}

impl<S: DurableStore> FileWriter<S> {
    /// Create a writer with the given quiet period.
    ///
    /// Must be called from within a tokio runtime; deferred writes run on it.
    pub fn new(store: Arc<S>, delay: Duration) -> Self {
        Self {
            store,
            delay,
            runtime: Handle::current(),
            state: Arc::new(Mutex::new(WriterState::default())),
        }
    }

    /// Note that `id` is known to match the store (e.g. just loaded from it).
    pub fn mark_synced(&self, id: &str) {
        let mut state = self.state.lock();
        state.stale.remove(id);
        state.synced.insert(id.to_string());
    }

    /// Schedule a deferred write of `record`, superseding any pending one.
    pub fn schedule(&self, record: FileRecord) {
        let id = record.id.clone();
        let mut state = self.state.lock();
        state.next_generation += 1;
        let generation = state.next_generation;

        if state.cancel_pending(&id).is_some() {
            debug!("Superseded pending write of '{}'", id);
        }

        let lock = state.lock_for(&id);
        let task = self.runtime.spawn(write_after_delay(
            Arc::clone(&self.store),
            Arc::clone(&self.state),
            lock,
            id.clone(),
            generation,
            self.delay,
        ));
        state.pending.insert(
            id,
            PendingWrite {
                generation,
                record,
                task,
            },
        );
    }

    /// Write `record` now, superseding any pending write of the same file.
    pub async fn write_now(&self, record: &FileRecord) -> StoreResult<()> {
        let lock = {
            let mut state = self.state.lock();
            state.cancel_pending(&record.id);
            state.lock_for(&record.id)
        };
        let _guard = lock.lock().await;
        let result = self.store.put_file(record).await;
        self.state.lock().record_outcome(record, &result);
        result
    }

    /// Apply the pending write of `id`, if any, and wait for it to land.
    ///
    /// Also waits for a deferred write of `id` that is already in flight.
    /// Without a pending write, retries the last failed write of `id`.
    pub async fn flush(&self, id: &str) -> StoreResult<()> {
        let (pending, lock) = {
            let mut state = self.state.lock();
            (state.cancel_pending(id), state.lock_for(id))
        };
        let _guard = lock.lock().await;
        // Checked under the file lock so an in-flight write can clear it first
        let Some(record) = pending.or_else(|| self.state.lock().stale.get(id).cloned()) else {
            return Ok(());
        };

        debug!("Flushing pending write of '{}'", id);
        let result = self.store.put_file(&record).await;
        if let Err(e) = &result {
            warn!(
                "Flushing '{}' failed: {}; the stored copy is older than the editor",
                id, e
            );
        }
        self.state.lock().record_outcome(&record, &result);
        result
    }

    /// Flush every pending write and retry every failed one.
    /// Returns the failures, if any.
    pub async fn flush_all(&self) -> Vec<(String, StorageError)> {
        let ids: BTreeSet<String> = {
            let state = self.state.lock();
            state
                .pending
                .keys()
                .chain(state.stale.keys())
                .cloned()
                .collect()
        };

        let mut failures = Vec::new();
        for id in ids {
            if let Err(e) = self.flush(&id).await {
                failures.push((id, e));
            }
        }
        failures
    }

    /// Drop any pending write of `id` and delete its record.
    ///
    /// Waits for an in-flight write first so it cannot resurrect the record.
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        let lock = {
            let mut state = self.state.lock();
            if state.cancel_pending(id).is_some() {
                debug!("Discarded pending write of deleted file '{}'", id);
            }
            state.lock_for(id)
        };
        let _guard = lock.lock().await;
        let result = self.store.delete_file(id).await;

        let mut state = self.state.lock();
        if result.is_ok() {
            state.synced.remove(id);
            state.stale.remove(id);
            state.locks.remove(id);
        }
        result
    }

    /// Whether a deferred write of `id` is waiting.
    pub fn is_pending(&self, id: &str) -> bool {
        self.state.lock().pending.contains_key(id)
    }

    /// Whether the store may hold an older copy of `id` than the caller,
    /// because a write is waiting or the last one failed.
    pub fn is_behind(&self, id: &str) -> bool {
        let state = self.state.lock();
        state.pending.contains_key(id) || state.stale.contains_key(id)
    }

    /// Ids with a deferred write waiting, sorted.
    pub fn pending_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().pending.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Persistence state of `id` as far as this writer knows.
    pub fn state_of(&self, id: &str) -> FileState {
        let state = self.state.lock();
        let synced = state.synced.contains(id);
        let behind = state.pending.contains_key(id) || state.stale.contains_key(id);
        match (synced, behind) {
            (false, _) => FileState::Unsaved,
            (true, true) => FileState::Dirty,
            (true, false) => FileState::Persisted,
        }
    }

    /// Take the failures of deferred writes since the last call.
    pub fn take_failures(&self) -> Vec<(String, StorageError)> {
        std::mem::take(&mut self.state.lock().failures)
    }
}

impl<S> Drop for FileWriter<S> {
    fn drop(&mut self) {
        let state = self.state.lock();
        if !state.pending.is_empty() {
            warn!(
                "Writer dropped with {} pending write(s); they will still run",
                state.pending.len()
            );
        }
    }
}

async fn write_after_delay<S: DurableStore>(
    store: Arc<S>,
    state: Arc<Mutex<WriterState>>,
    lock: Arc<FileLock<()>>,
    id: String,
    generation: u64,
    delay: Duration,
) {
    tokio::time::sleep(delay).await;

    let record = {
        let mut state = state.lock();
        match state.pending.get(&id) {
            Some(pending) if pending.generation == generation => {
                state.pending.remove(&id).map(|pending| pending.record)
            }
            _ => None,
        }
    };
    let Some(record) = record else {
        return;
    };

    let _guard = lock.lock().await;
    let result = store.put_file(&record).await;
    let mut state = state.lock();
    state.record_outcome(&record, &result);
    match result {
        Ok(()) => debug!("Persisted '{}' after quiet period", id),
        Err(e) => {
            warn!(
                "Deferred write of '{}' failed: {}; the stored copy is older than the editor",
                id, e
            );
            state.failures.push((id, e));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const DELAY: Duration = Duration::from_millis(500);

    fn record(name: &str, content: &str) -> FileRecord {
        let mut record = FileRecord::new(name).unwrap();
        record.content = content.to_string();
        record
    }

    async fn stored(store: &MemoryStore, id: &str) -> Option<String> {
        store.get_file(id).await.unwrap().map(|r| r.content)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_write() {
        let store = Arc::new(MemoryStore::open());
        let writer = FileWriter::new(Arc::clone(&store), DELAY);

        for content in ["a", "ab", "abc"] {
            writer.schedule(record("index.js", content));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(writer.is_pending("index.js"));
        assert_eq!(store.write_count(), 0);

        tokio::time::sleep(DELAY).await;
        assert_eq!(stored(&store, "index.js").await.as_deref(), Some("abc"));
        assert_eq!(store.write_count(), 1);
        assert!(!writer.is_pending("index.js"));
        assert_eq!(writer.state_of("index.js"), FileState::Persisted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_immediately() {
        let store = Arc::new(MemoryStore::open());
        let writer = FileWriter::new(Arc::clone(&store), DELAY);

        writer.schedule(record("a.js", "latest"));
        writer.flush("a.js").await.unwrap();
        assert_eq!(stored(&store, "a.js").await.as_deref(), Some("latest"));

        // The superseded timer must not write again
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_without_pending_is_noop() {
        let store = Arc::new(MemoryStore::open());
        let writer = FileWriter::new(Arc::clone(&store), DELAY);
        writer.flush("a.js").await.unwrap();
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_discards_pending_write() {
        let store = Arc::new(MemoryStore::open());
        let writer = FileWriter::new(Arc::clone(&store), DELAY);
        writer.write_now(&record("a.js", "v1")).await.unwrap();

        writer.schedule(record("a.js", "v2"));
        writer.delete("a.js").await.unwrap();
        tokio::time::sleep(DELAY * 2).await;

        assert!(stored(&store, "a.js").await.is_none());
        assert_eq!(writer.state_of("a.js"), FileState::Unsaved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_files_do_not_supersede_each_other() {
        let store = Arc::new(MemoryStore::open());
        let writer = FileWriter::new(Arc::clone(&store), DELAY);

        writer.schedule(record("a.js", "A"));
        writer.schedule(record("b.css", "B"));
        assert_eq!(writer.pending_ids(), vec!["a.js", "b.css"]);

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(stored(&store, "a.js").await.as_deref(), Some("A"));
        assert_eq!(stored(&store, "b.css").await.as_deref(), Some("B"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_failure_is_reported() {
        let store = Arc::new(MemoryStore::with_quota(10));
        let writer = FileWriter::new(Arc::clone(&store), DELAY);
        writer.mark_synced("a.js");

        writer.schedule(record("a.js", "too large for the quota"));
        tokio::time::sleep(DELAY * 2).await;

        let failures = writer.take_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "a.js");
        assert!(matches!(failures[0].1, StorageError::QuotaExceeded { .. }));
        assert_eq!(writer.state_of("a.js"), FileState::Dirty);
        assert!(writer.take_failures().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_is_retried_by_flush() {
        let store = Arc::new(MemoryStore::with_quota(10));
        let writer = FileWriter::new(Arc::clone(&store), DELAY);
        writer.mark_synced("a.js");

        writer.schedule(record("a.js", "too large for the quota"));
        assert!(writer.flush("a.js").await.is_err());
        assert!(!writer.is_pending("a.js"));
        assert!(writer.is_behind("a.js"));

        store.set_quota(None);
        assert!(writer.flush_all().await.is_empty());
        assert_eq!(
            stored(&store, "a.js").await.as_deref(),
            Some("too large for the quota")
        );
        assert!(!writer.is_behind("a.js"));
        assert_eq!(writer.state_of("a.js"), FileState::Persisted);

        // Nothing left to retry
        let writes = store.write_count();
        writer.flush("a.js").await.unwrap();
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_all_reports_failures() {
        let store = Arc::new(MemoryStore::open());
        let writer = FileWriter::new(Arc::clone(&store), DELAY);

        writer.schedule(record("a.js", "A"));
        writer.schedule(record("b.js", "B"));
        store.close().await.unwrap();

        let failures = writer.flush_all().await;
        assert_eq!(failures.len(), 2);
        assert!(writer.pending_ids().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_transitions() {
        let store = Arc::new(MemoryStore::open());
        let writer = FileWriter::new(Arc::clone(&store), DELAY);

        assert_eq!(writer.state_of("a.js"), FileState::Unsaved);
        writer.write_now(&record("a.js", "")).await.unwrap();
        assert_eq!(writer.state_of("a.js"), FileState::Persisted);
        writer.schedule(record("a.js", "edit"));
        assert_eq!(writer.state_of("a.js"), FileState::Dirty);
        writer.flush("a.js").await.unwrap();
        assert_eq!(writer.state_of("a.js"), FileState::Persisted);
    }
}
