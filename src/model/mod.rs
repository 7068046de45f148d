//! Data model shared by the store, registry and session.
//!
//! - `FileRecord`: one open file with its content and derived language
//! - `SessionMetadata`: the singleton record holding the active file,
//!   access history and tab order

mod file;
mod session_meta;

pub use file::{validate_file_name, FileRecord, FileState, Language, MAX_FILE_NAME_LEN};
pub use session_meta::{SessionMetadata, META_ID};
