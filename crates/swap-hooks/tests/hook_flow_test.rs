//! Hook handler flow — JSON event fixtures through a real engine.
//!
//! Config is written into a temp project directory and loaded the same way
//! the binary loads it.

use context_swap::pointer::retrieve_path;
use context_swap::{SessionEndAction, SwapEngine};
use serde_json::json;
use std::path::Path;
use swap_hooks::{
    handle_post_tool_use, handle_session_end, handle_session_start, load_config, parse_event,
    PostToolUseResponse, DEFAULT_CONFIG_FILE,
};
use tempfile::tempdir;

fn engine_for(project: &Path, config_toml: &str) -> SwapEngine {
    std::fs::write(project.join(DEFAULT_CONFIG_FILE), config_toml).unwrap();
    SwapEngine::new(load_config(None, project))
}

const ENABLED: &str = r#"
enabled = true
storage_root = "swap-store"

[thresholds]
default = 100
Read = 500
"#;

fn post_tool_use_event(session: &str, tool: &str, response: serde_json::Value) -> String {
    json!({
        "session_id": session,
        "hook_event_name": "PostToolUse",
        "tool_name": tool,
        "tool_input": {"command": "cargo test"},
        "tool_response": response,
    })
    .to_string()
}

// ── post-tool-use ──────────────────────────────────────────────────

#[test]
fn oversized_result_is_replaced_by_pointer() {
    let project = tempdir().unwrap();
    let engine = engine_for(project.path(), ENABLED);
    let output = "test result: ok. 1 passed\n".repeat(20);

    let event = parse_event(&post_tool_use_event("sess-a", "Bash", json!(output))).unwrap();
    let PostToolUseResponse::Replace { swap_id, content } = handle_post_tool_use(&engine, &event)
    else {
        panic!("expected replace");
    };

    assert!(content.contains(&swap_id));
    let path = retrieve_path(&content).expect("pointer names a path");
    assert!(path.starts_with(&project.path().join("swap-store").display().to_string()));
    assert_eq!(std::fs::read_to_string(path).unwrap(), output);
}

#[test]
fn small_result_passes_through() {
    let project = tempdir().unwrap();
    let engine = engine_for(project.path(), ENABLED);
    let event = parse_event(&post_tool_use_event("sess-a", "Read", json!("x".repeat(400)))).unwrap();
    assert_eq!(handle_post_tool_use(&engine, &event), PostToolUseResponse::Passthrough);
}

#[test]
fn missing_fields_pass_through() {
    let project = tempdir().unwrap();
    let engine = engine_for(project.path(), ENABLED);

    let no_response = parse_event(r#"{"session_id":"s","tool_name":"Bash"}"#).unwrap();
    assert_eq!(handle_post_tool_use(&engine, &no_response), PostToolUseResponse::Passthrough);

    let null_response =
        parse_event(r#"{"session_id":"s","tool_name":"Bash","tool_response":null}"#).unwrap();
    assert_eq!(handle_post_tool_use(&engine, &null_response), PostToolUseResponse::Passthrough);
}

#[test]
fn structured_response_is_swapped() {
    let project = tempdir().unwrap();
    let engine = engine_for(project.path(), ENABLED);
    let response = json!({
        "stdout": "line\n".repeat(50),
        "stderr": "",
        "interrupted": false,
    });

    let event = parse_event(&post_tool_use_event("s", "Bash", response.clone())).unwrap();
    let PostToolUseResponse::Replace { swap_id, .. } = handle_post_tool_use(&engine, &event) else {
        panic!("expected replace");
    };
    let stored: serde_json::Value =
        serde_json::from_str(&engine.recall(Some("s"), &swap_id).unwrap()).unwrap();
    assert_eq!(stored, response);
}

// ── config ─────────────────────────────────────────────────────────

#[test]
fn missing_config_disables_engine() {
    let project = tempdir().unwrap();
    let config = load_config(None, project.path());
    assert!(!config.enabled);

    let engine = SwapEngine::new(config);
    let event = parse_event(&post_tool_use_event("s", "Bash", json!("y".repeat(100_000)))).unwrap();
    assert_eq!(handle_post_tool_use(&engine, &event), PostToolUseResponse::Passthrough);
}

#[test]
fn malformed_config_disables_engine() {
    let project = tempdir().unwrap();
    let engine = engine_for(project.path(), "enabled = = true");
    assert!(!engine.config().enabled);
}

#[test]
fn explicit_config_path_wins() {
    let project = tempdir().unwrap();
    let custom = project.path().join("custom.json");
    std::fs::write(&custom, r#"{"enabled": true, "storage_root": "elsewhere"}"#).unwrap();

    let config = load_config(Some(&custom), project.path());
    assert!(config.enabled);
    assert_eq!(config.storage_root, project.path().join("elsewhere"));
}

// ── session lifecycle ──────────────────────────────────────────────

#[test]
fn session_start_lists_recoverable_entries() {
    let project = tempdir().unwrap();
    let engine = engine_for(project.path(), ENABLED);
    let start = parse_event(r#"{"session_id":"life","source":"resume"}"#).unwrap();
    assert_eq!(handle_session_start(&engine, &start), None);

    let event = parse_event(&post_tool_use_event("life", "Grep", json!("m\n".repeat(80)))).unwrap();
    let PostToolUseResponse::Replace { swap_id, .. } = handle_post_tool_use(&engine, &event) else {
        panic!("expected replace");
    };

    let inventory = handle_session_start(&engine, &start).expect("one entry to list");
    assert!(inventory.contains(&swap_id));
    assert!(inventory.contains("[Grep] 80 matches"));
}

#[test]
fn session_end_clear_deletes_everything() {
    let project = tempdir().unwrap();
    let engine = engine_for(project.path(), ENABLED);
    let event = parse_event(&post_tool_use_event("bye", "Bash", json!("z".repeat(1000)))).unwrap();
    handle_post_tool_use(&engine, &event);

    let other = parse_event(r#"{"session_id":"bye","reason":"other"}"#).unwrap();
    assert!(matches!(
        handle_session_end(&engine, &other),
        SessionEndAction::Cleaned(report) if report.retained == 1
    ));

    let clear = parse_event(r#"{"session_id":"bye","reason":"clear"}"#).unwrap();
    assert_eq!(handle_session_end(&engine, &clear), SessionEndAction::Deleted(true));
    assert!(!project.path().join("swap-store").join("bye").exists());
    assert_eq!(handle_session_end(&engine, &clear), SessionEndAction::Deleted(false));
}
