//! Tool result payloads and tool-input descriptors.
//!
//! Host tool results are either plain text or arbitrary JSON. Both resolve
//! to one canonical text form at the storage boundary: text verbatim,
//! structured values pretty-printed.

use crate::error::{SwapError, SwapResult};
use crate::extract::truncate_chars;
use crate::types::ContentKind;
use serde_json::Value;
use std::borrow::Cow;

/// Longest tool-input descriptor kept in metadata
const MAX_DESCRIPTOR_CHARS: usize = 200;

/// Tool-input keys worth naming, most specific first
const DESCRIPTOR_KEYS: [&str; 8] = [
    "file_path",
    "notebook_path",
    "path",
    "command",
    "pattern",
    "url",
    "query",
    "prompt",
];

/// A raw tool result.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Textual result, stored byte-exact
    Text(String),
    /// Structured result, stored as canonical JSON
    Structured(Value),
}

/// A payload resolved to the exact text that will be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPayload<'a> {
    /// Text or structured
    pub kind: ContentKind,
    /// Bytes of the content artifact
    pub text: Cow<'a, str>,
}

impl Payload {
    /// Split a host JSON value: strings are text, everything else structured
    pub fn from_json_value(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s),
            other => Self::Structured(other),
        }
    }

    /// Shape of the stored blob
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Text(_) => ContentKind::Text,
            Self::Structured(_) => ContentKind::Structured,
        }
    }

    /// Resolve to canonical text. Text borrows; structured values serialize.
    pub fn canonicalize(&self) -> SwapResult<CanonicalPayload<'_>> {
        let text = match self {
            Self::Text(s) => Cow::Borrowed(s.as_str()),
            Self::Structured(value) => Cow::Owned(
                serde_json::to_string_pretty(value)
                    .map_err(|e| SwapError::serialization(e.to_string()))?,
            ),
        };
        Ok(CanonicalPayload {
            kind: self.kind(),
            text,
        })
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::from_json_value(value)
    }
}

/// Best-effort one-line description of a tool call (file path, command, ...).
pub fn describe_tool_input(tool_input: Option<&Value>) -> String {
    let Some(input) = tool_input else {
        return String::new();
    };

    let described = match input {
        Value::Null => return String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) => DESCRIPTOR_KEYS
            .iter()
            .find_map(|key| {
                map.get(*key)
                    .and_then(Value::as_str)
                    .map(|v| format!("{}: {}", key, v))
            })
            .unwrap_or_else(|| input.to_string()),
        other => other.to_string(),
    };

    let single_line = described.replace(['\n', '\r'], " ");
    truncate_chars(&single_line, MAX_DESCRIPTOR_CHARS)
}
