//! Directory-backed store: one JSON document per record.
//!
//! Layout under the store root:
//!
//! ```text
//! schema.json          {"version": 2}
//! files/<key>.json     one FileRecord per file
//! meta/fileMeta.json   the SessionMetadata singleton
//! ```
//!
//! A record key is its file id with ASCII uppercase letters, `%` and every
//! non-ASCII byte written as `%xx` (lowercase hex). Ids differing only in
//! case therefore map to distinct names on case-insensitive filesystems.

use super::schema::{migration_steps, Collection, SchemaMarker, SCHEMA_VERSION};
use super::DurableStore;
use crate::error::{StorageError, StoreResult};
use crate::model::{
    validate_file_name, FileRecord, SessionMetadata, MAX_FILE_NAME_LEN, META_ID,
};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs;

const SCHEMA_FILE: &str = "schema.json";
const RECORD_EXT: &str = "json";
const TEMP_SUFFIX: &str = ".tmp";

/// Encode a file id as a record file stem that is stable under case folding.
fn encode_key(id: &str) -> String {
    let mut encoded = String::with_capacity(id.len());
    let mut bytes = [0; 4];
    for c in id.chars() {
        if c == '%' || c.is_ascii_uppercase() || !c.is_ascii() {
            for byte in c.encode_utf8(&mut bytes).bytes() {
                encoded.push_str(&format!("%{:02x}", byte));
            }
        } else {
            encoded.push(c);
        }
    }
    encoded
}

/// Durable store writing JSON documents under a root directory.
#[derive(Debug)]
pub struct JsonStore {
    root: PathBuf,
    closed: AtomicBool,
}

impl JsonStore {
    /// Open the store at `root`, creating or migrating the schema.
    ///
    /// Opening an already current store changes nothing.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StorageError::from_io(format!("create {}", root.display()), e))?;

        let recorded = read_schema_version(&root).await?;
        if recorded > SCHEMA_VERSION {
            warn!(
                "Store at {} has schema v{}, newer than supported v{}; opening without migration",
                root.display(),
                recorded,
                SCHEMA_VERSION
            );
        }

        let steps = migration_steps(recorded, SCHEMA_VERSION);
        for collection in &steps {
            let dir = root.join(collection.name());
            debug!("Creating collection '{}'", collection.name());
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| StorageError::from_io(format!("create {}", dir.display()), e))?;
        }

        rename_legacy_records(&root.join(Collection::Files.name())).await?;

        if !steps.is_empty() {
            let marker = SchemaMarker {
                version: SCHEMA_VERSION,
            };
            write_json_atomic(&root.join(SCHEMA_FILE), &marker).await?;
            if recorded == 0 {
                info!("Created store at {}", root.display());
            } else {
                info!(
                    "Migrated store at {} from schema v{} to v{}",
                    root.display(),
                    recorded,
                    SCHEMA_VERSION
                );
            }
        }

        Ok(Self {
            root,
            closed: AtomicBool::new(false),
        })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Schema version currently recorded on disk.
    pub async fn schema_version(&self) -> StoreResult<u32> {
        read_schema_version(&self.root).await
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    fn file_path(&self, id: &str) -> StoreResult<PathBuf> {
        let corrupt = |message: &str| StorageError::Corrupt {
            key: id.to_string(),
            message: message.to_string(),
        };
        if validate_file_name(id).is_err() {
            return Err(corrupt("not a valid record key"));
        }
        let name = format!("{}.{}", encode_key(id), RECORD_EXT);
        // The temporary sibling must fit as well
        if name.len() + TEMP_SUFFIX.len() > MAX_FILE_NAME_LEN {
            return Err(corrupt("record key too long for the store"));
        }
        Ok(self.root.join(Collection::Files.name()).join(name))
    }

    fn meta_path(&self) -> PathBuf {
        self.root
            .join(Collection::Meta.name())
            .join(format!("{}.{}", META_ID, RECORD_EXT))
    }
}

impl DurableStore for JsonStore {
    async fn get_all_files(&self) -> StoreResult<Vec<FileRecord>> {
        self.ensure_open()?;
        let dir = self.root.join(Collection::Files.name());
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| StorageError::from_io(format!("list {}", dir.display()), e))?;

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::from_io(format!("list {}", dir.display()), e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            match read_json::<FileRecord>(&path).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable file record {}: {}", path.display(), e),
            }
        }

        records.sort_by(|a, b| a.id.cmp(&b.id));
        debug!("Loaded {} file record(s)", records.len());
        Ok(records)
    }

    async fn get_file(&self, id: &str) -> StoreResult<Option<FileRecord>> {
        self.ensure_open()?;
        let path = self.file_path(id)?;
        read_json(&path).await
    }

    async fn put_file(&self, record: &FileRecord) -> StoreResult<()> {
        self.ensure_open()?;
        let path = self.file_path(&record.id)?;
        write_json_atomic(&path, record).await?;
        debug!("Stored file record '{}'", record.id);
        Ok(())
    }

    async fn delete_file(&self, id: &str) -> StoreResult<()> {
        self.ensure_open()?;
        let path = self.file_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted file record '{}'", id);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from_io(
                format!("delete {}", path.display()),
                e,
            )),
        }
    }

    async fn get_metadata(&self) -> StoreResult<Option<SessionMetadata>> {
        self.ensure_open()?;
        read_json(&self.meta_path()).await
    }

    async fn put_metadata(&self, meta: &SessionMetadata) -> StoreResult<()> {
        self.ensure_open()?;
        write_json_atomic(&self.meta_path(), meta).await
    }

    async fn close(&self) -> StoreResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("Closed store at {}", self.root.display());
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Document I/O
// ─────────────────────────────────────────────────────────────────────────────

async fn read_schema_version(root: &Path) -> StoreResult<u32> {
    Ok(read_json::<SchemaMarker>(&root.join(SCHEMA_FILE))
        .await?
        .map(|marker| marker.version)
        .unwrap_or(0))
}

/// Move records written under their raw id to their encoded name.
///
/// Records whose encoded name is already taken are left where they are.
async fn rename_legacy_records(dir: &Path) -> StoreResult<()> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(StorageError::from_io(format!("list {}", dir.display()), e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StorageError::from_io(format!("list {}", dir.display()), e))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if encode_key(stem) == stem {
            continue;
        }

        let record = match read_json::<FileRecord>(&path).await {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(e) => {
                warn!("Skipping unreadable file record {}: {}", path.display(), e);
                continue;
            }
        };
        let target = dir.join(format!("{}.{}", encode_key(&record.id), RECORD_EXT));
        if target == path {
            continue;
        }
        if fs::try_exists(&target).await.unwrap_or(true) {
            warn!(
                "Not renaming {}: {} already exists",
                path.display(),
                target.display()
            );
            continue;
        }
        fs::rename(&path, &target)
            .await
            .map_err(|e| StorageError::from_io(format!("rename {}", path.display()), e))?;
        info!("Renamed file record '{}' to {}", record.id, target.display());
    }
    Ok(())
}

/// Read and decode a document; a missing file yields `None`.
async fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StorageError::from_io(
                format!("read {}", path.display()),
                e,
            ))
        }
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| StorageError::Corrupt {
            key: path.display().to_string(),
            message: e.to_string(),
        })
}

/// Write a document to a temporary sibling, then rename it into place.
async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| StorageError::Corrupt {
        key: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut temp = path.as_os_str().to_owned();
    temp.push(TEMP_SUFFIX);
    let temp = PathBuf::from(temp);

    fs::write(&temp, json)
        .await
        .map_err(|e| StorageError::from_io(format!("write {}", temp.display()), e))?;
    fs::rename(&temp, path)
        .await
        .map_err(|e| StorageError::from_io(format!("replace {}", path.display()), e))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
