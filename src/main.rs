//! codepad - Main Entry Point
//!
//! Restores the editing session from the durable store and reads commands
//! from stdin, one per line. Logging goes to stderr; set `RUST_LOG=debug`
//! for state transitions.

use codepad::command::{Command, HELP};
use codepad::config::{load_config, resolve_store_dir, write_default_config};
use codepad::error::ResultExt;
use codepad::{BufferEditor, EditorAdapter, JsonStore, Session, StructuredFormatter};
use log::{error, info};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Application name constant.
const APP_NAME: &str = "codepad";

type CliSession = Session<JsonStore, BufferEditor, StructuredFormatter>;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting {}", APP_NAME);

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}: {}", APP_NAME, e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> codepad::Result<()> {
    let settings = load_config();
    write_default_config(&settings)
        .unwrap_or_warn_default(false, "Could not write default config");
    let store_dir = resolve_store_dir(&settings)?;
    info!("Using store at {}", store_dir.display());

    let store = Arc::new(JsonStore::open(store_dir).await?);
    let mut session = Session::open(
        store,
        BufferEditor::new(),
        StructuredFormatter::new(settings.format_indent),
        &settings,
    )
    .await?;

    print_tabs(&session);
    print_notices(&mut session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("error: {}", e);
                continue;
            }
        };

        match &command {
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            Command::Show => print_active(&session),
            Command::Tabs => print_tabs(&session),
            other => {
                session.execute(other).await;
                if other.is_mutation() {
                    print_tabs(&session);
                }
            }
        }
        print_notices(&mut session);
    }

    for notice in session.close().await? {
        println!("{}", notice);
    }
    info!("{} exited", APP_NAME);
    Ok(())
}

fn print_tabs(session: &CliSession) {
    let strip: Vec<String> = session
        .tabs()
        .iter()
        .enumerate()
        .map(|(index, tab)| {
            let marker = match tab.state {
                codepad::FileState::Persisted => "",
                codepad::FileState::Dirty => "*",
                codepad::FileState::Unsaved => "!",
            };
            if tab.active {
                format!("{}:[{}{}]", index, tab.id, marker)
            } else {
                format!("{}:{}{}", index, tab.id, marker)
            }
        })
        .collect();
    println!("{}", strip.join("  "));
}

fn print_active(session: &CliSession) {
    let Some(file) = session.active_file() else {
        println!("(no active file)");
        return;
    };
    println!(
        "--- {} ({}, line {}) ---",
        file.name,
        file.language.display_name(),
        session.editor().cursor().unwrap_or(0)
    );
    println!("{}", session.editor().content());
}

fn print_notices(session: &mut CliSession) {
    for notice in session.take_notices() {
        println!("{}", notice);
    }
}
