//! User settings and preferences for codepad
//!
//! This module defines the `Settings` struct that holds all user-configurable
//! options, with serde support for JSON persistence.

use crate::model::validate_file_name;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Theme Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Available color themes for the editing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    /// Get a display label for the theme.
    pub fn label(&self) -> &'static str {
        match self {
            Theme::Light => "Light",
            Theme::Dark => "Dark",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Main Settings Struct
// ─────────────────────────────────────────────────────────────────────────────

/// User preferences and application settings.
///
/// This struct is serialized to JSON and persisted to the user's config directory.
/// All fields have sensible defaults via the `Default` trait and `#[serde(default)]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Color theme handed to the editor
    pub theme: Theme,

    /// Quiet period after the last edit before content is persisted
    pub debounce_ms: u64,

    /// File seeded into an empty store on first run
    pub default_file_name: String,

    /// Override for the durable store location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,

    /// Indentation width used when formatting structured documents
    pub format_indent: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            debounce_ms: 750,
            default_file_name: String::from(Self::DEFAULT_FILE_NAME),
            store_dir: None,
            format_indent: 2,
        }
    }
}

impl Settings {
    // ─────────────────────────────────────────────────────────────────────────
    // Validation Constants and Sanitization
    // ─────────────────────────────────────────────────────────────────────────

    /// File seeded when nothing else is configured.
    pub const DEFAULT_FILE_NAME: &'static str = "index.js";
    /// Minimum debounce window.
    pub const MIN_DEBOUNCE_MS: u64 = 100;
    /// Maximum debounce window.
    pub const MAX_DEBOUNCE_MS: u64 = 5000;
    /// Minimum formatter indentation.
    pub const MIN_FORMAT_INDENT: usize = 1;
    /// Maximum formatter indentation.
    pub const MAX_FORMAT_INDENT: usize = 8;

    /// The debounce window as a `Duration`.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Sanitize settings by clamping values to valid ranges.
    ///
    /// This is useful after loading settings from a file that might have
    /// been manually edited with invalid values.
    pub fn sanitize(&mut self) {
        self.debounce_ms = self
            .debounce_ms
            .clamp(Self::MIN_DEBOUNCE_MS, Self::MAX_DEBOUNCE_MS);

        self.format_indent = self
            .format_indent
            .clamp(Self::MIN_FORMAT_INDENT, Self::MAX_FORMAT_INDENT);

        if let Err(e) = validate_file_name(&self.default_file_name) {
            warn!("Ignoring configured default file name: {}", e);
            self.default_file_name = String::from(Self::DEFAULT_FILE_NAME);
        }
    }

    /// Load settings and sanitize them to ensure validity.
    ///
    /// This is a convenience method that deserializes and then sanitizes.
    pub fn from_json_sanitized(json: &str) -> Result<Self, serde_json::Error> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.sanitize();
        Ok(settings)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
