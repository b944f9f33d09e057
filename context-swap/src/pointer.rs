//! Pointer text that replaces an externalized tool result.
//!
//! The layout is a literal contract: consumers match on the header line and
//! on the `Read:` prefix.

use crate::types::SwapEntry;

/// First token of every pointer
pub const POINTER_HEADER: &str = "[CONTEXT SWAPPED]";

/// Prefix of the retrieval line; the content path follows
pub const RETRIEVE_PREFIX: &str = "Read:";

/// Build the pointer for an entry. Pure.
pub fn build_pointer(entry: &SwapEntry) -> String {
    let mut lines = vec![
        format!("{} Tool output moved to external memory", POINTER_HEADER),
        format!("Swap ID: {}", entry.swap_id),
        format!("Tool: {}", entry.tool),
        format!("{} {}", RETRIEVE_PREFIX, entry.content_path.display()),
        format!("Summary: {}", entry.summary),
        format!(
            "Size: {} bytes ({} chars)",
            entry.metrics.byte_size, entry.metrics.char_count
        ),
    ];
    if !entry.patterns.is_empty() {
        lines.push(format!("Patterns: {}", entry.patterns.join(", ")));
    }
    lines.join("\n")
}

/// Whether `text` is a pointer produced by [`build_pointer`]
pub fn is_pointer(text: &str) -> bool {
    text.starts_with(POINTER_HEADER)
}

/// Content path named by a pointer's retrieval line
pub fn retrieve_path(pointer: &str) -> Option<&str> {
    pointer
        .lines()
        .find_map(|line| line.strip_prefix(RETRIEVE_PREFIX))
        .map(str::trim)
        .filter(|path| !path.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentKind, SwapMetrics};
    use chrono::Utc;
    use std::path::PathBuf;

    fn entry(patterns: Vec<String>) -> SwapEntry {
        SwapEntry {
            swap_id: "swap-20261017T101500123-a1b2c3d4".to_string(),
            session_id: "s".to_string(),
            seq: 1,
            tool: "Read".to_string(),
            tool_input_descriptor: "file_path: src/lib.rs".to_string(),
            content_kind: ContentKind::Text,
            content_path: PathBuf::from("/p/.context-swap/s/swap-20261017T101500123-a1b2c3d4.txt"),
            metadata_path: PathBuf::from(
                "/p/.context-swap/s/swap-20261017T101500123-a1b2c3d4.meta.json",
            ),
            summary: "120 lines; declares: SwapStore".to_string(),
            patterns,
            metrics: SwapMetrics {
                char_count: 9000,
                byte_size: 9010,
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_pointer_layout() {
        let pointer = build_pointer(&entry(vec![]));
        let lines: Vec<&str> = pointer.lines().collect();
        assert_eq!(
            lines,
            vec![
                "[CONTEXT SWAPPED] Tool output moved to external memory",
                "Swap ID: swap-20261017T101500123-a1b2c3d4",
                "Tool: Read",
                "Read: /p/.context-swap/s/swap-20261017T101500123-a1b2c3d4.txt",
                "Summary: 120 lines; declares: SwapStore",
                "Size: 9010 bytes (9000 chars)",
            ]
        );
    }

    #[test]
    fn test_pointer_lists_patterns() {
        let pointer = build_pointer(&entry(vec!["SwapStore".into(), "externalize".into()]));
        assert!(pointer.ends_with("\nPatterns: SwapStore, externalize"));
    }

    #[test]
    fn test_pointer_helpers() {
        let pointer = build_pointer(&entry(vec![]));
        assert!(is_pointer(&pointer));
        assert!(!is_pointer("plain tool output"));
        assert_eq!(
            retrieve_path(&pointer),
            Some("/p/.context-swap/s/swap-20261017T101500123-a1b2c3d4.txt")
        );
        assert_eq!(retrieve_path("no pointer here"), None);
    }
}
