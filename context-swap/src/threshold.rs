//! Threshold decider — whether a tool result is large enough to externalize.
//!
//! Size is measured in bytes of the UTF-8 text, not characters, and the
//! comparison is strict: a payload exactly at the threshold stays inline.

use crate::config::SwapConfig;
use crate::sanitize::is_within_root;
use serde_json::Value;

/// Tool-input keys that may name a file the tool reads
const PATH_KEYS: [&str; 3] = ["file_path", "path", "notebook_path"];

/// Decision from the threshold check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapDecision {
    /// Engine switched off in config.
    Disabled,
    /// Nothing to externalize.
    EmptyContent,
    /// The call reads from the swap store itself.
    RecursionGuard,
    /// At or below the tool's threshold.
    BelowThreshold {
        /// Payload size in bytes.
        size: u64,
        /// Threshold applied.
        threshold: u64,
    },
    /// Above the threshold: externalize.
    Externalize {
        /// Payload size in bytes.
        size: u64,
        /// Threshold applied.
        threshold: u64,
    },
}

impl SwapDecision {
    /// Whether the payload should be moved to external storage.
    pub fn should_externalize(&self) -> bool {
        matches!(self, Self::Externalize { .. })
    }
}

impl std::fmt::Display for SwapDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::EmptyContent => write!(f, "empty_content"),
            Self::RecursionGuard => write!(f, "recursion_guard"),
            Self::BelowThreshold { size, threshold } => {
                write!(f, "below_threshold ({} <= {} bytes)", size, threshold)
            }
            Self::Externalize { size, threshold } => {
                write!(f, "externalize ({} > {} bytes)", size, threshold)
            }
        }
    }
}

/// Evaluates payloads against the configured per-tool thresholds.
pub struct ThresholdDecider<'a> {
    config: &'a SwapConfig,
}

impl<'a> ThresholdDecider<'a> {
    /// Create a decider over the given config
    pub fn new(config: &'a SwapConfig) -> Self {
        Self { config }
    }

    /// Full decision with its reason
    pub fn evaluate(&self, tool: &str, content: &str, tool_input: Option<&Value>) -> SwapDecision {
        if !self.config.enabled {
            return SwapDecision::Disabled;
        }
        if content.is_empty() {
            return SwapDecision::EmptyContent;
        }
        if tool_input.is_some_and(|input| self.targets_storage_root(input)) {
            return SwapDecision::RecursionGuard;
        }

        let size = content.len() as u64;
        let threshold = self.config.thresholds.for_tool(tool);
        if size > threshold {
            SwapDecision::Externalize { size, threshold }
        } else {
            SwapDecision::BelowThreshold { size, threshold }
        }
    }

    /// `evaluate(..).should_externalize()`
    pub fn should_externalize(&self, tool: &str, content: &str, tool_input: Option<&Value>) -> bool {
        self.evaluate(tool, content, tool_input).should_externalize()
    }

    /// Whether the tool input points inside the swap store.
    ///
    /// Path-like keys must resolve under the root; a shell `command` only
    /// needs to mention it.
    fn targets_storage_root(&self, tool_input: &Value) -> bool {
        let root = self.config.storage_root.to_string_lossy();

        let path_hit = PATH_KEYS
            .iter()
            .filter_map(|key| tool_input.get(*key).and_then(Value::as_str))
            .any(|target| is_within_root(target, &root));
        if path_hit {
            return true;
        }

        tool_input
            .get("command")
            .and_then(Value::as_str)
            .is_some_and(|command| command_mentions_root(command, &root))
    }
}

fn command_mentions_root(command: &str, root: &str) -> bool {
    command
        .split(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | ';' | '|' | '&'))
        .filter(|token| !token.is_empty())
        .any(|token| is_within_root(token, root))
}
