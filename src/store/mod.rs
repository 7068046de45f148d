//! Durable storage for file records and session metadata
//!
//! The store owns the persisted copies of every open file and of the
//! singleton session record. Two backends implement `DurableStore`:
//! - `JsonStore`: one JSON document per record under a directory
//! - `MemoryStore`: in-process maps with an optional byte quota
//!
//! A store is opened once per process and shared by the registry, the
//! metadata manager and the write scheduler through an `Arc`.

mod json;
mod memory;
mod schema;

pub use json::JsonStore;
pub use memory::MemoryStore;
pub use schema::{collections_at, migration_steps, Collection, SchemaMarker, SCHEMA_VERSION};

use crate::error::StoreResult;
use crate::model::{FileRecord, SessionMetadata};
use std::future::Future;
use std::sync::Arc;

/// Shared handle to an open store.
pub type StoreHandle<S> = Arc<S>;

/// Key-value persistence with a `files` and a `meta` collection.
///
/// Every operation may suspend and may fail with a `StorageError`.
/// Implementations are opened through their own constructors, which
/// create or migrate the schema.
pub trait DurableStore: Send + Sync + 'static {
    /// All file records, ordered by id.
    fn get_all_files(&self) -> impl Future<Output = StoreResult<Vec<FileRecord>>> + Send;

    /// A single file record.
    fn get_file(&self, id: &str) -> impl Future<Output = StoreResult<Option<FileRecord>>> + Send;

    /// Insert or replace a file record.
    fn put_file(&self, record: &FileRecord) -> impl Future<Output = StoreResult<()>> + Send;

    /// Remove a file record; removing a missing record is not an error.
    fn delete_file(&self, id: &str) -> impl Future<Output = StoreResult<()>> + Send;

    /// The session record, if one was ever written.
    fn get_metadata(&self) -> impl Future<Output = StoreResult<Option<SessionMetadata>>> + Send;

    /// Insert or replace the session record.
    fn put_metadata(&self, meta: &SessionMetadata) -> impl Future<Output = StoreResult<()>> + Send;

    /// End the handle's lifecycle. Later operations fail with `StorageError::Closed`.
    fn close(&self) -> impl Future<Output = StoreResult<()>> + Send;
}
