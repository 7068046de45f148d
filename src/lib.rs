//! codepad - session core of a tabbed multi-file code editor
//!
//! Keeps an in-memory set of open files, the active file, an access history
//! and a user-ordered tab strip consistent with a durable local store across
//! reloads and partial failures.

pub mod adapters;
pub mod command;
pub mod config;
pub mod error;
pub mod metadata;
pub mod model;
pub mod registry;
pub mod session;
pub mod store;
pub mod writer;

pub use adapters::{BufferEditor, EditorAdapter, Formatter, StructuredFormatter};
pub use command::Command;
pub use config::{Settings, Theme};
pub use error::{Error, FormatError, Result, StorageError};
pub use model::{FileRecord, FileState, Language, SessionMetadata};
pub use session::{Notice, NoticeLevel, Session, Tab};
pub use store::{DurableStore, JsonStore, MemoryStore};
