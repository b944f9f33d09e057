//! Swap engine facade
//!
//! One `SwapEngine` is built per hook invocation from a loaded config and
//! driven through the three collaborator entry points:
//! 1. post-tool-use: `process_tool_result`
//! 2. session start/resume: `on_session_start` / `inventory`
//! 3. session end: `on_session_end`

use crate::config::SwapConfig;
use crate::error::SwapResult;
use crate::payload::Payload;
use crate::pointer::{build_pointer, is_pointer};
use crate::retention::{CleanupReport, RetentionManager};
use crate::sanitize::sanitize_session_id;
use crate::store::SwapStore;
use crate::threshold::ThresholdDecider;
use crate::types::{SwapEntry, SwapEntryView};
use serde_json::Value;
use tracing::{debug, warn};

/// A completed tool call as seen by the post-tool-use collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Host session id, unsanitized
    pub session_id: Option<String>,
    /// Tool name (`Read`, `Grep`, ...)
    pub tool_name: String,
    /// Tool arguments, if any
    pub tool_input: Option<Value>,
    /// Raw tool result
    pub result: Payload,
}

impl ToolCall {
    /// Tool call from borrowed parts
    pub fn new(
        session_id: Option<&str>,
        tool_name: impl Into<String>,
        tool_input: Option<Value>,
        result: impl Into<Payload>,
    ) -> Self {
        Self {
            session_id: session_id.map(str::to_string),
            tool_name: tool_name.into(),
            tool_input,
            result: result.into(),
        }
    }
}

/// An externalized result and the text that replaces it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    /// Stored entry
    pub entry: SwapEntry,
    /// Text shown in place of the tool result
    pub pointer: String,
}

/// What session end did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndAction {
    /// Engine switched off; nothing touched
    Skipped,
    /// Full reset: the session directory was deleted (`true` if it existed)
    Deleted(bool),
    /// Age-based cleanup
    Cleaned(CleanupReport),
}

impl std::fmt::Display for SessionEndAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skipped => write!(f, "skipped"),
            Self::Deleted(existed) => write!(f, "deleted (existed: {})", existed),
            Self::Cleaned(report) => write!(f, "cleaned ({})", report),
        }
    }
}

/// Externalization engine over one config
#[derive(Debug, Clone)]
pub struct SwapEngine {
    config: SwapConfig,
    store: SwapStore,
}

impl SwapEngine {
    /// Engine over a loaded, path-resolved config
    pub fn new(config: SwapConfig) -> Self {
        let store = SwapStore::from_config(&config);
        Self { config, store }
    }

    /// Config in use
    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    /// Underlying store
    pub fn store(&self) -> &SwapStore {
        &self.store
    }

    /// Decide, externalize, and build the pointer for one tool result.
    ///
    /// `None` means the caller delivers the original result unchanged.
    pub fn process_tool_result(&self, call: &ToolCall) -> Option<SwapOutcome> {
        if !self.config.enabled {
            return None;
        }

        // Step 1: Canonical text is what gets measured and stored
        let canonical = match call.result.canonicalize() {
            Ok(canonical) => canonical,
            Err(e) => {
                warn!(tool = %call.tool_name, error = %e, "Unserializable tool result passes through");
                return None;
            }
        };
        if is_pointer(&canonical.text) {
            debug!(tool = %call.tool_name, "Result is already a swap pointer");
            return None;
        }

        // Step 2: Threshold and recursion guard
        let decision = ThresholdDecider::new(&self.config).evaluate(
            &call.tool_name,
            &canonical.text,
            call.tool_input.as_ref(),
        );
        debug!(tool = %call.tool_name, %decision, "Swap decision");
        if !decision.should_externalize() {
            return None;
        }

        // Step 3: Persist
        let session_id = sanitize_session_id(call.session_id.as_deref());
        let entry = self.store.externalize_canonical(
            &session_id,
            &call.tool_name,
            call.tool_input.as_ref(),
            &canonical,
        )?;

        // Step 4: Pointer replaces the visible result
        let pointer = build_pointer(&entry);
        Some(SwapOutcome { entry, pointer })
    }

    /// Entries recoverable in a session, in append order
    pub fn inventory(&self, session_id: Option<&str>) -> Vec<SwapEntryView> {
        self.store
            .get_swap_entries(&sanitize_session_id(session_id))
    }

    /// Sweep other stale sessions, then list what this session can recover.
    pub fn on_session_start(&self, session_id: Option<&str>) -> Vec<SwapEntryView> {
        if !self.config.enabled {
            return Vec::new();
        }
        let session_id = sanitize_session_id(session_id);
        RetentionManager::new(&self.store)
            .sweep_stale_sessions(self.config.retention.max_age_hours, Some(&session_id));
        self.store.get_swap_entries(&session_id)
    }

    /// Full delete for reset reasons, age-based cleanup otherwise
    pub fn on_session_end(&self, session_id: Option<&str>, reason: Option<&str>) -> SessionEndAction {
        if !self.config.enabled {
            return SessionEndAction::Skipped;
        }
        let session_id = sanitize_session_id(session_id);
        let retention = RetentionManager::new(&self.store);

        let action = if reason.is_some_and(|r| self.config.is_full_reset(r)) {
            SessionEndAction::Deleted(retention.delete_session_swap(&session_id))
        } else {
            SessionEndAction::Cleaned(
                retention.cleanup_swap_files(&session_id, self.config.retention.max_age_hours),
            )
        };
        debug!(session_id = %session_id, reason = reason.unwrap_or(""), %action, "Session end");
        action
    }

    /// Stored content of one entry, byte-exact
    pub fn recall(&self, session_id: Option<&str>, swap_id: &str) -> SwapResult<String> {
        self.store
            .read_content(&sanitize_session_id(session_id), swap_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::RETRIEVE_PREFIX;
    use serde_json::json;
    use std::path::Path;
    use tempfile::tempdir;

    fn engine_at(root: &Path) -> SwapEngine {
        let mut config = SwapConfig::default();
        config.storage_root = root.to_path_buf();
        SwapEngine::new(config)
    }

    #[test]
    fn test_small_result_passes_through() {
        let dir = tempdir().unwrap();
        let engine = engine_at(dir.path());
        let call = ToolCall::new(Some("s"), "Grep", None, "one match");
        assert!(engine.process_tool_result(&call).is_none());
        assert!(engine.inventory(Some("s")).is_empty());
    }

    #[test]
    fn test_large_result_is_swapped() {
        let dir = tempdir().unwrap();
        let engine = engine_at(dir.path());
        let content = "x".repeat(3000);
        let call = ToolCall::new(Some("s"), "Glob", Some(json!({"pattern": "**/*"})), content.as_str());

        let outcome = engine.process_tool_result(&call).expect("over Glob threshold");
        assert!(outcome.pointer.contains(&outcome.entry.swap_id));
        assert!(outcome
            .pointer
            .contains(&format!("{} {}", RETRIEVE_PREFIX, outcome.entry.content_path.display())));
        assert_eq!(engine.recall(Some("s"), &outcome.entry.swap_id).unwrap(), content);

        // Same size stays inline for Read (8192)
        let read = ToolCall::new(Some("s"), "Read", None, content.as_str());
        assert!(engine.process_tool_result(&read).is_none());
    }

    #[test]
    fn test_structured_result_measured_as_json() {
        let dir = tempdir().unwrap();
        let engine = engine_at(dir.path());
        let files: Vec<String> = (0..200).map(|i| format!("src/module_{}.rs", i)).collect();
        let call = ToolCall::new(Some("s"), "Glob", None, json!({ "files": files }));

        let outcome = engine.process_tool_result(&call).unwrap();
        let stored: Value =
            serde_json::from_str(&engine.recall(Some("s"), &outcome.entry.swap_id).unwrap())
                .unwrap();
        assert_eq!(stored["files"][199], "src/module_199.rs");
    }

    #[test]
    fn test_disabled_engine_does_nothing() {
        let dir = tempdir().unwrap();
        let mut config = SwapConfig::disabled();
        config.storage_root = dir.path().to_path_buf();
        let engine = SwapEngine::new(config);

        let call = ToolCall::new(Some("s"), "Bash", None, "y".repeat(10_000));
        assert!(engine.process_tool_result(&call).is_none());
        assert_eq!(engine.on_session_end(Some("s"), Some("clear")), SessionEndAction::Skipped);
        assert!(!dir.path().join("s").exists());
    }

    #[test]
    fn test_reading_swap_store_is_never_swapped() {
        let dir = tempdir().unwrap();
        let engine = engine_at(dir.path());
        let first = engine
            .process_tool_result(&ToolCall::new(Some("s"), "Bash", None, "z".repeat(9000)))
            .unwrap();

        let path = first.entry.content_path.to_string_lossy().to_string();
        let reread = ToolCall::new(
            Some("s"),
            "Read",
            Some(json!({ "file_path": path })),
            "z".repeat(20_000),
        );
        assert!(engine.process_tool_result(&reread).is_none());

        let pointer_again = ToolCall::new(Some("s"), "Bash", None, first.pointer.repeat(100));
        assert!(engine.process_tool_result(&pointer_again).is_none());
    }

    #[test]
    fn test_relative_reread_of_swap_store_is_not_swapped() {
        let project = tempdir().unwrap();
        let mut config = SwapConfig::default();
        config.resolve_paths(project.path());
        let engine = SwapEngine::new(config);

        let first = engine
            .process_tool_result(&ToolCall::new(Some("s1"), "Bash", None, "r".repeat(9000)))
            .unwrap();
        let relative = format!(".context-swap/s1/{}.txt", first.entry.swap_id);

        let cat = ToolCall::new(
            Some("s1"),
            "Bash",
            Some(json!({ "command": format!("cat {}", relative) })),
            "r".repeat(100_000),
        );
        assert!(engine.process_tool_result(&cat).is_none());

        let read = ToolCall::new(
            Some("s1"),
            "Read",
            Some(json!({ "file_path": relative })),
            "r".repeat(100_000),
        );
        assert!(engine.process_tool_result(&read).is_none());
        assert_eq!(engine.inventory(Some("s1")).len(), 1);
    }

    #[test]
    fn test_session_end_actions() {
        let dir = tempdir().unwrap();
        let engine = engine_at(dir.path());
        engine
            .process_tool_result(&ToolCall::new(Some("s"), "Bash", None, "b".repeat(5000)))
            .unwrap();

        match engine.on_session_end(Some("s"), Some("logout")) {
            SessionEndAction::Cleaned(report) => assert_eq!(report.retained, 1),
            other => panic!("expected cleanup, got {}", other),
        }
        assert_eq!(engine.inventory(Some("s")).len(), 1);

        assert_eq!(
            engine.on_session_end(Some("s"), Some("clear")),
            SessionEndAction::Deleted(true)
        );
        assert_eq!(
            engine.on_session_end(Some("s"), Some("clear")),
            SessionEndAction::Deleted(false)
        );
        assert!(engine.inventory(Some("s")).is_empty());
    }

    #[test]
    fn test_missing_session_id_uses_default() {
        let dir = tempdir().unwrap();
        let engine = engine_at(dir.path());
        let outcome = engine
            .process_tool_result(&ToolCall::new(None, "Bash", None, "d".repeat(5000)))
            .unwrap();
        assert_eq!(outcome.entry.session_id, "default");
        assert_eq!(engine.on_session_start(None).len(), 1);
    }
}
