//! In-process store with an optional byte quota.
//!
//! Records are kept as serialized JSON so the quota counts the same bytes
//! a persistent backend would write. Every operation yields to the
//! scheduler once, so callers observe the same suspension points as with
//! a real backend.

use super::DurableStore;
use crate::error::{StorageError, StoreResult};
use crate::model::{FileRecord, SessionMetadata, META_ID};
use log::{debug, info};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct Collections {
    files: BTreeMap<String, String>,
    meta: Option<String>,
}

impl Collections {
    fn used_bytes(&self) -> usize {
        self.files.values().map(String::len).sum::<usize>()
            + self.meta.as_ref().map(String::len).unwrap_or(0)
    }
}

/// Durable store kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Collections>,
    quota: Mutex<Option<usize>>,
    closed: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Open an empty store without a quota.
    pub fn open() -> Self {
        Self::default()
    }

    /// Open an empty store that refuses to grow beyond `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        let store = Self::default();
        *store.quota.lock() = Some(bytes);
        store
    }

    /// Change or lift the quota. Existing records are kept even if they exceed it.
    pub fn set_quota(&self, bytes: Option<usize>) {
        *self.quota.lock() = bytes;
    }

    /// Reopen a closed store; records survive.
    pub fn reopen(&self) {
        if self.closed.swap(false, Ordering::AcqRel) {
            info!("Reopened in-memory store");
        }
    }

    /// Number of successful writes and deletes since the store was opened.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Acquire)
    }

    /// Bytes currently stored.
    pub fn used_bytes(&self) -> usize {
        self.data.lock().used_bytes()
    }

    async fn enter(&self) -> StoreResult<()> {
        tokio::task::yield_now().await;
        if self.closed.load(Ordering::Acquire) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    /// Check that replacing `old` bytes with `new` bytes fits the quota.
    fn check_quota(&self, data: &Collections, old: usize, new: usize) -> StoreResult<()> {
        if let Some(quota) = *self.quota.lock() {
            let others = data.used_bytes() - old;
            if others + new > quota {
                return Err(StorageError::QuotaExceeded {
                    needed: new,
                    available: quota.saturating_sub(others),
                });
            }
        }
        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::AcqRel);
    }
}

fn encode<T: Serialize>(key: &str, value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(key: &str, json: &str) -> StoreResult<T> {
    serde_json::from_str(json).map_err(|e| StorageError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })
}

impl DurableStore for MemoryStore {
    async fn get_all_files(&self) -> StoreResult<Vec<FileRecord>> {
        self.enter().await?;
        let data = self.data.lock();
        data.files
            .iter()
            .map(|(key, json)| decode(key, json))
            .collect()
    }

    async fn get_file(&self, id: &str) -> StoreResult<Option<FileRecord>> {
        self.enter().await?;
        let data = self.data.lock();
        data.files.get(id).map(|json| decode(id, json)).transpose()
    }

    async fn put_file(&self, record: &FileRecord) -> StoreResult<()> {
        self.enter().await?;
        let json = encode(&record.id, record)?;
        let mut data = self.data.lock();
        let old = data.files.get(&record.id).map(String::len).unwrap_or(0);
        self.check_quota(&data, old, json.len())?;
        data.files.insert(record.id.clone(), json);
        self.record_write();
        debug!("Stored file record '{}' in memory", record.id);
        Ok(())
    }

    async fn delete_file(&self, id: &str) -> StoreResult<()> {
        self.enter().await?;
        if self.data.lock().files.remove(id).is_some() {
            self.record_write();
        }
        Ok(())
    }

    async fn get_metadata(&self) -> StoreResult<Option<SessionMetadata>> {
        self.enter().await?;
        let data = self.data.lock();
        data.meta
            .as_deref()
            .map(|json| decode(META_ID, json))
            .transpose()
    }

    async fn put_metadata(&self, meta: &SessionMetadata) -> StoreResult<()> {
        self.enter().await?;
        let json = encode(&meta.id, meta)?;
        let mut data = self.data.lock();
        let old = data.meta.as_ref().map(String::len).unwrap_or(0);
        self.check_quota(&data, old, json.len())?;
        data.meta = Some(json);
        self.record_write();
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
