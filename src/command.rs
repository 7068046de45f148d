//! Line-oriented user commands.
//!
//! One command per line, first word is the verb. Text arguments of `write`
//! and `append` take the rest of the line verbatim with `\n`, `\t` and `\\`
//! escapes expanded.

use crate::error::{Error, Result};

/// A parsed user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a file and make it active
    New(String),
    /// Delete a file
    Delete(String),
    /// Activate a file
    Switch(String),
    /// Move a tab from one index to another
    Move { from: usize, to: usize },
    /// Format the active file
    Format,
    /// Replace the active file's content
    Write(String),
    /// Append to the active file's content
    Append(String),
    /// Move the cursor of the active file
    Cursor(usize),
    /// Print the active file
    Show,
    /// Print the tab strip
    Tabs,
    /// Force pending writes
    Flush,
    Help,
    Quit,
}

/// Usage text printed by `help`.
pub const HELP: &str = "\
Commands:
  new <name>        create a file and switch to it
  delete <id>       delete a file (the last file cannot be deleted)
  switch <id>       switch to a file
  move <from> <to>  move a tab (0-based indices)
  format            format the active file
  write <text>      replace the active file's content (\\n for newlines)
  append <text>     append to the active file's content
  cursor <line>     move the cursor
  show              print the active file
  tabs              print the tab strip
  flush             write pending edits now
  help              show this help
  quit              flush and exit";

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim_start();
        if line.trim().is_empty() {
            return Ok(None);
        }

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest),
            None => (line, ""),
        };
        let arg = rest.trim();

        let command = match verb.to_lowercase().as_str() {
            "new" | "n" => Self::New(required(verb, arg)?.to_string()),
            "delete" | "rm" => Self::Delete(required(verb, arg)?.to_string()),
            "switch" | "s" => Self::Switch(required(verb, arg)?.to_string()),
            "move" | "mv" => {
                let mut parts = arg.split_whitespace();
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(from), Some(to), None) => Self::Move {
                        from: index(verb, from)?,
                        to: index(verb, to)?,
                    },
                    _ => return Err(Error::Command("usage: move <from> <to>".to_string())),
                }
            }
            "format" | "fmt" => Self::Format,
            "write" => Self::Write(unescape(rest)),
            "append" => Self::Append(unescape(rest)),
            "cursor" => Self::Cursor(index(verb, required(verb, arg)?)?),
            "show" | "cat" => Self::Show,
            "tabs" | "ls" => Self::Tabs,
            "flush" | "sync" => Self::Flush,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => {
                return Err(Error::Command(format!(
                    "Unknown command '{}' (try 'help')",
                    other
                )))
            }
        };
        Ok(Some(command))
    }

    /// Whether the command changes the session.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::New(_)
                | Self::Delete(_)
                | Self::Switch(_)
                | Self::Move { .. }
                | Self::Format
                | Self::Write(_)
                | Self::Append(_)
                | Self::Cursor(_)
        )
    }
}

fn required<'a>(verb: &str, arg: &'a str) -> Result<&'a str> {
    if arg.is_empty() {
        Err(Error::Command(format!("'{}' needs an argument", verb)))
    } else {
        Ok(arg)
    }
}

fn index(verb: &str, arg: &str) -> Result<usize> {
    arg.parse()
        .map_err(|_| Error::Command(format!("'{}': '{}' is not a valid number", verb, arg)))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        Command::parse(line).unwrap().unwrap()
    }

    #[test]
    fn test_blank_lines() {
        assert_eq!(Command::parse("").unwrap(), None);
        assert_eq!(Command::parse("   \t").unwrap(), None);
    }

    #[test]
    fn test_file_commands() {
        assert_eq!(parse("new style.css"), Command::New("style.css".to_string()));
        assert_eq!(parse("  delete  a.js "), Command::Delete("a.js".to_string()));
        assert_eq!(parse("switch my notes.md"), Command::Switch("my notes.md".to_string()));
        assert_eq!(parse("mv 2 0"), Command::Move { from: 2, to: 0 });
    }

    #[test]
    fn test_missing_argument() {
        assert!(matches!(Command::parse("new"), Err(Error::Command(_))));
        assert!(matches!(Command::parse("move 1"), Err(Error::Command(_))));
        assert!(matches!(Command::parse("move a b"), Err(Error::Command(_))));
        assert!(matches!(Command::parse("cursor -1"), Err(Error::Command(_))));
    }

    #[test]
    fn test_unknown_command() {
        let err = Command::parse("frobnicate").unwrap_err();
        assert_eq!(err.to_string(), "Unknown command 'frobnicate' (try 'help')");
    }

    #[test]
    fn test_text_escapes() {
        assert_eq!(
            parse(r"write let a = 1;\nlet b = '\\n';"),
            Command::Write("let a = 1;\nlet b = '\\n';".to_string())
        );
        assert_eq!(parse("append   x "), Command::Append("  x ".to_string()));
        assert_eq!(parse("write"), Command::Write(String::new()));
        assert_eq!(parse(r"write a\qb\"), Command::Write(r"a\qb\".to_string()));
    }

    #[test]
    fn test_verbs_are_case_insensitive() {
        assert_eq!(parse("FORMAT"), Command::Format);
        assert_eq!(parse("Quit"), Command::Quit);
    }

    #[test]
    fn test_is_mutation() {
        assert!(parse("cursor 3").is_mutation());
        assert!(!parse("tabs").is_mutation());
        assert!(!parse("flush").is_mutation());
    }
}
