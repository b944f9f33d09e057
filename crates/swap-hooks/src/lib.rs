//! Hook handlers bridging host events to the swap engine.
//!
//! Each host hook runs `swap-hooks <event>` as a fresh process with the event
//! JSON on stdin. Handlers here are pure over an engine and a parsed event so
//! they can be driven from tests without a process boundary.

use anyhow::{Context, Result};
use context_swap::{
    Payload, SessionEndAction, SwapConfig, SwapEngine, SwapEntryView, ToolCall,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file looked up in the project directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = ".context-swap.toml";

/// Host hook event. Every field is optional; hosts send different subsets
/// per event.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HookEvent {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<Value>,
    #[serde(default)]
    pub tool_response: Option<Value>,
    /// Session-end reason (`clear`, `logout`, ...)
    #[serde(default)]
    pub reason: Option<String>,
    /// Session-start source (`startup`, `resume`, `clear`, ...)
    #[serde(default)]
    pub source: Option<String>,
    /// Host working directory
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

/// Reply to a post-tool-use event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PostToolUseResponse {
    /// Show `content` instead of the tool result
    Replace { swap_id: String, content: String },
    /// Deliver the tool result unchanged
    Passthrough,
}

/// Parse stdin. Blank input is an empty event.
pub fn parse_event(input: &str) -> Result<HookEvent> {
    if input.trim().is_empty() {
        return Ok(HookEvent::default());
    }
    serde_json::from_str(input).context("Failed to parse hook event JSON")
}

/// Build the engine config for one invocation: file, then env, then paths
/// resolved against the project directory.
pub fn load_config(config_path: Option<&Path>, project_dir: &Path) -> SwapConfig {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| project_dir.join(DEFAULT_CONFIG_FILE));
    let mut config = SwapConfig::load_or_disabled(&path);
    config.apply_env_overrides();
    config.resolve_paths(project_dir);
    debug!(
        path = %path.display(),
        enabled = config.enabled,
        storage_root = %config.storage_root.display(),
        "Swap config loaded"
    );
    config
}

/// Externalize an oversized tool result, or pass it through.
pub fn handle_post_tool_use(engine: &SwapEngine, event: &HookEvent) -> PostToolUseResponse {
    let (Some(tool_name), Some(response)) = (&event.tool_name, &event.tool_response) else {
        return PostToolUseResponse::Passthrough;
    };
    if response.is_null() {
        return PostToolUseResponse::Passthrough;
    }

    let call = ToolCall {
        session_id: event.session_id.clone(),
        tool_name: tool_name.clone(),
        tool_input: event.tool_input.clone(),
        result: Payload::from_json_value(response.clone()),
    };
    match engine.process_tool_result(&call) {
        Some(outcome) => PostToolUseResponse::Replace {
            swap_id: outcome.entry.swap_id,
            content: outcome.pointer,
        },
        None => PostToolUseResponse::Passthrough,
    }
}

/// Sweep stale sessions and describe what this session can recover.
/// `None` when there is nothing to show.
pub fn handle_session_start(engine: &SwapEngine, event: &HookEvent) -> Option<String> {
    let entries = engine.on_session_start(event.session_id.as_deref());
    if entries.is_empty() {
        return None;
    }
    Some(format_inventory(&entries))
}

/// Full delete or age-based cleanup, by reason
pub fn handle_session_end(engine: &SwapEngine, event: &HookEvent) -> SessionEndAction {
    engine.on_session_end(event.session_id.as_deref(), event.reason.as_deref())
}

/// Human-readable list of recoverable entries
pub fn format_inventory(entries: &[SwapEntryView]) -> String {
    let mut output = format!(
        "## Swapped context ({} entr{})\n\n",
        entries.len(),
        if entries.len() == 1 { "y" } else { "ies" }
    );
    output.push_str("Earlier tool output was moved to disk. Read a file to recover it.\n\n");

    for entry in entries {
        output.push_str(&format!(
            "- {} [{}] {} ({} bytes, {})\n  Read: {}\n",
            entry.id,
            entry.tool,
            entry.summary,
            entry.byte_size,
            entry.created_at.format("%Y-%m-%d %H:%M UTC"),
            entry.retrieve_path.display()
        ));
    }
    output
}
