//! File records and language detection.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ─────────────────────────────────────────────────────────────────────────────
// Language Detection
// ─────────────────────────────────────────────────────────────────────────────

/// Language tag derived from a file's extension.
///
/// Selects syntax highlighting in the editor and the formatter used by
/// "Format active file". Serialized as a lowercase tag in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Css,
    Scss,
    Html,
    Json,
    Markdown,
    Yaml,
    Toml,
    Python,
    Rust,
    /// Unknown or missing extension
    #[default]
    PlainText,
}

impl Language {
    /// Detect the language from a file name based on its extension.
    pub fn from_file_name(name: &str) -> Self {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or_default()
    }

    /// Detect the language from a file extension string.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" | "jsx" => Self::JavaScript,
            "ts" | "tsx" => Self::TypeScript,
            "css" => Self::Css,
            "scss" => Self::Scss,
            "html" | "htm" => Self::Html,
            "json" => Self::Json,
            "md" | "markdown" => Self::Markdown,
            "yaml" | "yml" => Self::Yaml,
            "toml" => Self::Toml,
            "py" => Self::Python,
            "rs" => Self::Rust,
            _ => Self::PlainText,
        }
    }

    /// Get a display name for this language.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::JavaScript => "JavaScript",
            Self::TypeScript => "TypeScript",
            Self::Css => "CSS",
            Self::Scss => "SCSS",
            Self::Html => "HTML",
            Self::Json => "JSON",
            Self::Markdown => "Markdown",
            Self::Yaml => "YAML",
            Self::Toml => "TOML",
            Self::Python => "Python",
            Self::Rust => "Rust",
            Self::PlainText => "Plain Text",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Names
// ─────────────────────────────────────────────────────────────────────────────

/// Longest accepted file name, in bytes.
pub const MAX_FILE_NAME_LEN: usize = 255;

const FORBIDDEN_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Check that `name` can be used as a file id.
///
/// Ids double as record keys in the durable store, so anything that could
/// escape a collection directory is refused.
pub fn validate_file_name(name: &str) -> Result<()> {
    let invalid = |reason| {
        Err(Error::InvalidName {
            name: name.to_string(),
            reason,
        })
    };

    if name.trim().is_empty() {
        return invalid("name is empty");
    }
    if name != name.trim() {
        return invalid("leading or trailing whitespace");
    }
    if name.len() > MAX_FILE_NAME_LEN {
        return invalid("name is too long");
    }
    if name == "." || name == ".." {
        return invalid("reserved name");
    }
    if name.chars().any(|c| c.is_control() || FORBIDDEN_CHARS.contains(&c)) {
        return invalid("contains a forbidden character");
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// File Record
// ─────────────────────────────────────────────────────────────────────────────

/// One open file as stored in the `files` collection.
///
/// The id is the file name; renaming a file means creating a new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub language: Language,
    /// Last known cursor line, best effort
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_position: Option<usize>,
}

impl FileRecord {
    /// Create an empty record for `name`.
    ///
    /// Surrounding whitespace is trimmed before validation.
    pub fn new(name: &str) -> Result<Self> {
        let name = name.trim();
        validate_file_name(name)?;
        Ok(Self::with_content(name, String::new()))
    }

    /// Create a record without validating the name.
    pub(crate) fn with_content(name: &str, content: String) -> Self {
        Self {
            id: name.to_string(),
            name: name.to_string(),
            content,
            language: Language::from_file_name(name),
            cursor_position: None,
        }
    }
}

/// Persistence state of an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Created in memory, no successful write yet
    Unsaved,
    /// Store and memory agree
    Persisted,
    /// Edited, write pending
    Dirty,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_file_name() {
        assert_eq!(Language::from_file_name("index.js"), Language::JavaScript);
        assert_eq!(Language::from_file_name("style.CSS"), Language::Css);
        assert_eq!(Language::from_file_name("page.htm"), Language::Html);
        assert_eq!(Language::from_file_name("data.yml"), Language::Yaml);
        assert_eq!(Language::from_file_name("Cargo.toml"), Language::Toml);
        assert_eq!(Language::from_file_name("README.md"), Language::Markdown);
    }

    #[test]
    fn test_unknown_extension_is_plain_text() {
        assert_eq!(Language::from_file_name("notes.xyz"), Language::PlainText);
        assert_eq!(Language::from_file_name("Makefile"), Language::PlainText);
        assert_eq!(Language::from_file_name(".gitignore"), Language::PlainText);
    }

    #[test]
    fn test_language_serializes_as_lowercase_tag() {
        let json = serde_json::to_string(&Language::JavaScript).unwrap();
        assert_eq!(json, "\"javascript\"");
        let parsed: Language = serde_json::from_str("\"plaintext\"").unwrap();
        assert_eq!(parsed, Language::PlainText);
    }

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("index.js").is_ok());
        assert!(validate_file_name("my notes.md").is_ok());
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("   ").is_err());
        assert!(validate_file_name(" a.js").is_err());
        assert!(validate_file_name("..").is_err());
        assert!(validate_file_name("src/main.rs").is_err());
        assert!(validate_file_name("a\\b").is_err());
        assert!(validate_file_name("what?.txt").is_err());
        assert!(validate_file_name("tab\there").is_err());
        assert!(validate_file_name(&"x".repeat(MAX_FILE_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_file_record_new() {
        let record = FileRecord::new("  style.css ").unwrap();
        assert_eq!(record.id, "style.css");
        assert_eq!(record.name, "style.css");
        assert!(record.content.is_empty());
        assert_eq!(record.language, Language::Css);
        assert_eq!(record.cursor_position, None);
    }

    #[test]
    fn test_file_record_new_rejects_invalid_name() {
        let err = FileRecord::new("a/b.js").unwrap_err();
        assert!(matches!(err, Error::InvalidName { .. }));
    }

    #[test]
    fn test_file_record_json_shape() {
        let mut record = FileRecord::new("index.js").unwrap();
        record.content = "let x = 1;".to_string();
        record.cursor_position = Some(4);

        let value: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], "index.js");
        assert_eq!(value["language"], "javascript");
        assert_eq!(value["cursorPosition"], 4);

        record.cursor_position = None;
        let value: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert!(value.get("cursorPosition").is_none());
    }
}
