//! Collaborators the session drives: the text editor and the formatter.
//!
//! The session only needs a narrow view of each. `BufferEditor` is a plain
//! in-memory editor used by the command-line front end and the tests;
//! `StructuredFormatter` pretty-prints the document languages codepad can
//! parse itself.

use crate::config::Theme;
use crate::error::FormatError;
use crate::model::Language;
use comrak::{markdown_to_commonmark, Options};
use log::debug;
use serde::Serialize;

// ─────────────────────────────────────────────────────────────────────────────
// Editor
// ─────────────────────────────────────────────────────────────────────────────

/// Text editing surface bound to the active file.
///
/// Changes made by the user are reported back by calling
/// `Session::on_editor_change`, which reads `content` and `cursor`.
pub trait EditorAdapter {
    /// Replace the whole buffer.
    fn set_content(&mut self, text: &str);

    /// Current buffer text.
    fn content(&self) -> &str;

    /// Move the cursor to a line.
    fn set_cursor(&mut self, line: usize);

    /// Current cursor line, if the editor tracks one.
    fn cursor(&self) -> Option<usize>;

    /// Select highlighting and colors.
    fn configure(&mut self, language: Language, theme: Theme);
}

/// Editor that keeps its buffer in memory.
#[derive(Debug, Clone, Default)]
pub struct BufferEditor {
    content: String,
    cursor: Option<usize>,
    language: Language,
    theme: Theme,
}

impl BufferEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text at the end of the buffer, as if typed.
    pub fn append(&mut self, text: &str) {
        self.content.push_str(text);
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }
}

impl EditorAdapter for BufferEditor {
    fn set_content(&mut self, text: &str) {
        if self.content != text {
            self.content = text.to_string();
        }
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn set_cursor(&mut self, line: usize) {
        self.cursor = Some(line);
    }

    fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    fn configure(&mut self, language: Language, theme: Theme) {
        self.language = language;
        self.theme = theme;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Formatter
// ─────────────────────────────────────────────────────────────────────────────

/// Pretty-printer for file content. Must not have side effects.
pub trait Formatter {
    fn format(&self, text: &str, language: Language) -> Result<String, FormatError>;
}

/// Formatter for JSON, YAML, TOML and Markdown.
///
/// Documents are parsed and serialized again, so comments in YAML and TOML
/// do not survive formatting. JSON keeps its key order.
#[derive(Debug, Clone)]
pub struct StructuredFormatter {
    indent: usize,
}

impl Default for StructuredFormatter {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

impl StructuredFormatter {
    /// Formatter indenting JSON with `indent` spaces.
    pub fn new(indent: usize) -> Self {
        Self {
            indent: indent.max(1),
        }
    }

    fn format_json(&self, text: &str) -> Result<String, FormatError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            let line = e.line();
            syntax_error(
                Language::Json,
                e.to_string(),
                if line > 0 { Some(line) } else { None },
            )
        })?;

        let indent = " ".repeat(self.indent);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut out = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        value
            .serialize(&mut serializer)
            .map_err(|e| syntax_error(Language::Json, e.to_string(), None))?;

        let mut formatted = String::from_utf8(out)
            .map_err(|e| syntax_error(Language::Json, e.to_string(), None))?;
        formatted.push('\n');
        Ok(formatted)
    }

    fn format_yaml(&self, text: &str) -> Result<String, FormatError> {
        let value: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| {
            let line = e.location().map(|loc| loc.line());
            syntax_error(Language::Yaml, e.to_string(), line)
        })?;
        serde_yaml::to_string(&value).map_err(|e| syntax_error(Language::Yaml, e.to_string(), None))
    }

    fn format_toml(&self, text: &str) -> Result<String, FormatError> {
        let table: toml::Table = toml::from_str(text).map_err(|e| {
            let line = e.span().map(|span| line_of_offset(text, span.start));
            syntax_error(Language::Toml, e.message().to_string(), line)
        })?;
        toml::to_string_pretty(&table).map_err(|e| syntax_error(Language::Toml, e.to_string(), None))
    }

    fn format_markdown(&self, text: &str) -> Result<String, FormatError> {
        let mut options = Options::default();
        options.extension.table = true;
        options.extension.strikethrough = true;
        options.extension.tasklist = true;
        options.extension.footnotes = true;
        Ok(markdown_to_commonmark(text, &options))
    }
}

impl Formatter for StructuredFormatter {
    fn format(&self, text: &str, language: Language) -> Result<String, FormatError> {
        debug!("Formatting {} bytes of {}", text.len(), language.display_name());
        match language {
            Language::Json => self.format_json(text),
            Language::Yaml => self.format_yaml(text),
            Language::Toml => self.format_toml(text),
            Language::Markdown => self.format_markdown(text),
            other => Err(FormatError::Unsupported {
                language: other.display_name(),
            }),
        }
    }
}

fn syntax_error(language: Language, message: String, line: Option<usize>) -> FormatError {
    FormatError::Syntax {
        language: language.display_name(),
        message,
        line,
    }
}

/// 1-based line containing byte `offset`.
fn line_of_offset(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_editor_tracks_changes() {
        let mut editor = BufferEditor::new();
        editor.set_content("a");
        editor.append("b");
        assert_eq!(editor.content(), "ab");
        editor.set_cursor(3);
        assert_eq!(editor.cursor(), Some(3));

        editor.configure(Language::Css, Theme::Dark);
        assert_eq!(editor.language(), Language::Css);
        assert_eq!(editor.theme(), Theme::Dark);
    }

    #[test]
    fn test_format_json_keeps_key_order() {
        let formatter = StructuredFormatter::default();
        let out = formatter
            .format(r#"{"b":1,"a":[true,null]}"#, Language::Json)
            .unwrap();
        assert_eq!(
            out,
            "{\n  \"b\": 1,\n  \"a\": [\n    true,\n    null\n  ]\n}\n"
        );
    }

    #[test]
    fn test_format_json_custom_indent() {
        let formatter = StructuredFormatter::new(4);
        let out = formatter.format(r#"{"a":1}"#, Language::Json).unwrap();
        assert_eq!(out, "{\n    \"a\": 1\n}\n");
    }

    #[test]
    fn test_format_json_is_stable() {
        let formatter = StructuredFormatter::default();
        let once = formatter.format(r#"{"a": {"b": 2}}"#, Language::Json).unwrap();
        let twice = formatter.format(&once, Language::Json).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_format_invalid_json_reports_line() {
        let formatter = StructuredFormatter::default();
        let err = formatter
            .format("{\n  \"a\": 1,\n  oops\n}", Language::Json)
            .unwrap_err();
        match err {
            FormatError::Syntax { language, line, .. } => {
                assert_eq!(language, "JSON");
                assert_eq!(line, Some(3));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_format_yaml() {
        let formatter = StructuredFormatter::default();
        let out = formatter.format("a:   1\nb: [x, y]\n", Language::Yaml).unwrap();
        assert_eq!(out, "a: 1\nb:\n- x\n- y\n");
    }

    #[test]
    fn test_format_invalid_yaml() {
        let formatter = StructuredFormatter::default();
        let err = formatter.format("a: [1, 2\n", Language::Yaml).unwrap_err();
        assert!(matches!(err, FormatError::Syntax { language: "YAML", .. }));
    }

    #[test]
    fn test_format_toml() {
        let formatter = StructuredFormatter::default();
        let out = formatter.format("title=\"x\"\n", Language::Toml).unwrap();
        assert_eq!(out, "title = \"x\"\n");
    }

    #[test]
    fn test_format_invalid_toml_reports_line() {
        let formatter = StructuredFormatter::default();
        let err = formatter
            .format("a = 1\nb = = 2\n", Language::Toml)
            .unwrap_err();
        match err {
            FormatError::Syntax { language, line, .. } => {
                assert_eq!(language, "TOML");
                assert_eq!(line, Some(2));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_format_markdown() {
        let formatter = StructuredFormatter::default();
        let out = formatter.format("Title\n=====\n", Language::Markdown).unwrap();
        assert_eq!(out, "# Title\n");
    }

    #[test]
    fn test_format_unsupported_language() {
        let formatter = StructuredFormatter::default();
        assert_eq!(
            formatter.format("let a = 1", Language::JavaScript),
            Err(FormatError::Unsupported {
                language: "JavaScript"
            })
        );
    }

    #[test]
    fn test_line_of_offset() {
        assert_eq!(line_of_offset("a\nb\nc", 0), 1);
        assert_eq!(line_of_offset("a\nb\nc", 2), 2);
        assert_eq!(line_of_offset("a\nb\nc", 99), 3);
    }
}
