//! swap-hooks — host hook adapter for the context-swap engine
//!
//! # Usage
//!
//! ```bash
//! # Post-tool-use: prints {"action":"replace",...} or {"action":"passthrough"}
//! echo '{"session_id":"s1","tool_name":"Grep","tool_response":"..."}' | swap-hooks post-tool-use
//!
//! # Session start: sweeps stale sessions, prints an inventory
//! echo '{"session_id":"s1","source":"resume"}' | swap-hooks session-start
//!
//! # Session end: full delete on reset reasons, age-based cleanup otherwise
//! echo '{"session_id":"s1","reason":"clear"}' | swap-hooks session-end
//!
//! # Print one stored payload
//! swap-hooks recall s1 swap-20261017T101500123-a1b2c3d4
//!
//! # Verbose logging (stderr)
//! CONTEXT_SWAP_LOG=debug swap-hooks --config ./swap.toml post-tool-use < event.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use context_swap::SwapEngine;
use std::io::{Read, Write};
use std::path::PathBuf;
use swap_hooks::{
    handle_post_tool_use, handle_session_end, handle_session_start, load_config, parse_event,
    HookEvent, PostToolUseResponse,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Log filter environment variable
const LOG_ENV: &str = "CONTEXT_SWAP_LOG";

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (default: <project-dir>/.context-swap.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project directory (default: the event's `cwd`, then the current directory)
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Externalize an oversized tool result
    PostToolUse,
    /// Sweep stale sessions and list recoverable entries
    SessionStart,
    /// Delete or clean up the ending session
    SessionEnd,
    /// Print the stored content of one entry
    Recall {
        /// Session id
        session: String,
        /// Swap id from the pointer
        swap_id: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    if let Command::Recall { session, swap_id } = &args.command {
        return recall(&args, session, swap_id);
    }

    // Hook events never fail the host
    if let Err(e) = run_hook(&args) {
        warn!(command = ?args.command, error = %e, "Swap hook failed, passing through");
        if args.command == Command::PostToolUse {
            print_json(&PostToolUseResponse::Passthrough)?;
        }
    }
    Ok(())
}

fn run_hook(args: &Args) -> Result<()> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read hook event from stdin")?;

    let event = parse_event(&input).unwrap_or_else(|e| {
        warn!(error = %e, "Unreadable hook event, treating as empty");
        HookEvent::default()
    });
    let engine = build_engine(args, event.cwd.clone())?;

    match args.command {
        Command::PostToolUse => {
            let response = handle_post_tool_use(&engine, &event);
            print_json(&response)?;
        }
        Command::SessionStart => {
            if let Some(inventory) = handle_session_start(&engine, &event) {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(inventory.as_bytes())?;
                stdout.flush()?;
            }
        }
        Command::SessionEnd => {
            let action = handle_session_end(&engine, &event);
            debug!(%action, "Session end handled");
        }
        Command::Recall { .. } => {}
    }
    Ok(())
}

fn recall(args: &Args, session: &str, swap_id: &str) -> Result<()> {
    let engine = build_engine(args, None)?;
    let content = engine
        .recall(Some(session), swap_id)
        .with_context(|| format!("Cannot recall {} in session {}", swap_id, session))?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(content.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn build_engine(args: &Args, event_cwd: Option<PathBuf>) -> Result<SwapEngine> {
    let project_dir = match args.project_dir.clone().or(event_cwd) {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine project directory")?,
    };
    let config = load_config(args.config.as_deref(), &project_dir);
    Ok(SwapEngine::new(config))
}

fn print_json(response: &PostToolUseResponse) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, response)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
