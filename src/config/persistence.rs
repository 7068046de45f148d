//! Where codepad keeps its settings and its durable store.
//!
//! `config.json` lives in the per-user config directory and is written once,
//! with defaults, on first run so users have a file to edit. The store
//! directory comes from `store_dir` in that file, or the per-user data
//! directory otherwise.

use crate::config::Settings;
use crate::error::{Error, Result, ResultExt};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Directory name under the platform config and data directories
const APP_NAME: &str = "codepad";

const CONFIG_FILE_NAME: &str = "config.json";

/// Written first, then renamed over `config.json`
const CONFIG_BACKUP_NAME: &str = "config.json.bak";

/// Store directory under `<data_dir>/codepad` when `store_dir` is unset
const STORE_DIR_NAME: &str = "store";

// ─────────────────────────────────────────────────────────────────────────────
// Locations
// ─────────────────────────────────────────────────────────────────────────────

/// `<config_dir>/codepad`, e.g. `~/.config/codepad` on Linux.
///
/// Fails with `Error::ConfigDirNotFound` when the platform reports no
/// config directory (no home directory).
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|base| base.join(APP_NAME))
        .ok_or(Error::ConfigDirNotFound)
}

/// `<config_dir>/codepad/config.json`.
pub fn get_config_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Directory of the durable store: `store_dir` from the settings, else
/// `<data_dir>/codepad/store`.
pub fn resolve_store_dir(settings: &Settings) -> Result<PathBuf> {
    if let Some(dir) = &settings.store_dir {
        return Ok(dir.clone());
    }
    dirs::data_dir()
        .map(|base| base.join(APP_NAME).join(STORE_DIR_NAME))
        .ok_or(Error::ConfigDirNotFound)
}

// ─────────────────────────────────────────────────────────────────────────────
// Reading
// ─────────────────────────────────────────────────────────────────────────────

/// Settings for this run. Never fails.
///
/// A missing or empty `config.json` gives the defaults silently; an
/// unreadable or malformed one gives the defaults with a warning, so a bad
/// edit never keeps the editor from starting.
pub fn load_config() -> Settings {
    get_config_file_path()
        .and_then(|path| load_config_from(&path))
        .unwrap_or_warn_default(Settings::default(), "Ignoring codepad config")
}

/// Read and sanitize the settings in `config_path`.
pub fn load_config_from(config_path: &Path) -> Result<Settings> {
    if !config_path.exists() {
        debug!("No config at {}; using defaults", config_path.display());
        return Ok(Settings::default());
    }

    let contents = fs::read_to_string(config_path).map_err(|e| Error::ConfigLoad {
        path: config_path.to_path_buf(),
        source: Box::new(e),
    })?;

    if contents.trim().is_empty() {
        debug!("Config at {} is empty; using defaults", config_path.display());
        return Ok(Settings::default());
    }

    let settings = Settings::from_json_sanitized(&contents).map_err(|e| {
        warn!("Config at {} is not valid JSON: {}", config_path.display(), e);
        Error::ConfigParse {
            message: format!("{}: {}", config_path.display(), e),
            source: Some(Box::new(e)),
        }
    })?;

    info!("Read settings from {}", config_path.display());
    Ok(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// First Run
// ─────────────────────────────────────────────────────────────────────────────

/// Write `settings` to `config.json` in the config directory unless a config
/// file already exists. Returns whether a file was written.
pub fn write_default_config(settings: &Settings) -> Result<bool> {
    write_default_config_in(&get_config_dir()?, settings)
}

/// Like [`write_default_config`], into `config_dir`.
pub fn write_default_config_in(config_dir: &Path, settings: &Settings) -> Result<bool> {
    let config_path = config_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        return Ok(false);
    }

    fs::create_dir_all(config_dir).map_err(|e| save_error(config_dir, e))?;

    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| save_error(&config_path, e))?;

    // A crash mid-write leaves only the backup, never a truncated config
    let backup_path = config_dir.join(CONFIG_BACKUP_NAME);
    fs::write(&backup_path, json).map_err(|e| save_error(&backup_path, e))?;
    fs::rename(&backup_path, &config_path).map_err(|e| save_error(&config_path, e))?;

    info!("Wrote default settings to {}", config_path.display());
    Ok(true)
}

fn save_error(path: &Path, source: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::ConfigSave {
        path: path.to_path_buf(),
        source: Box::new(source),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
