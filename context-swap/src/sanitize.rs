//! Path sanitizer
//!
//! Session ids arrive from the host and end up as directory names, so they
//! are reduced to `[A-Za-z0-9-]`. Paths are normalized only for comparison
//! (recursion guard, threshold lookups) and never used to open files.

/// Fallback session id for missing or fully-stripped input
pub const DEFAULT_SESSION_ID: &str = "default";

/// Longest sanitized session id kept as a directory name
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Reduce a session id to alphanumerics and dashes.
///
/// Traversal sequences (`..`, `/`, `\`) are removed rather than rejected.
/// `None`, empty input, or input with nothing left after stripping yields
/// [`DEFAULT_SESSION_ID`].
pub fn sanitize_session_id(id: Option<&str>) -> String {
    let cleaned: String = id
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .take(MAX_SESSION_ID_LEN)
        .collect();

    if cleaned.is_empty() {
        DEFAULT_SESSION_ID.to_string()
    } else {
        cleaned
    }
}

/// Canonicalize separators to `/`, collapse repeats, and lowercase.
///
/// For comparisons only. `None` or empty input yields an empty string.
pub fn normalize_path(path: Option<&str>) -> String {
    let Some(path) = path else {
        return String::new();
    };

    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        let c = if c == '\\' { '/' } else { c };
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Whether `target` names `root` itself or something beneath it.
///
/// Both sides go through [`normalize_path`] and have `.`/`..` segments
/// resolved lexically. Absolute paths compare by prefix. A relative root
/// also matches as an interior run of segments in an absolute target. A
/// relative target (as a tool sees it from the project directory) matches
/// an absolute root when it starts with a trailing run of the root's
/// segments, so `.context-swap/s1/x.txt` lies within `/proj/.context-swap`.
pub fn is_within_root(target: &str, root: &str) -> bool {
    let (target_absolute, target) = lexical_segments(target);
    let (root_absolute, root) = lexical_segments(root);
    if root.is_empty() || target.is_empty() {
        return false;
    }

    match (target_absolute, root_absolute) {
        (true, true) | (false, false) if target.starts_with(&root) => true,
        (_, false) => target.windows(root.len()).any(|window| window == root.as_slice()),
        (false, true) => {
            let target: Vec<&str> = target
                .iter()
                .map(String::as_str)
                .skip_while(|segment| *segment == "..")
                .collect();
            (0..root.len()).any(|start| {
                let tail = &root[start..];
                tail.len() <= target.len()
                    && tail.iter().zip(&target).all(|(a, b)| a.as_str() == *b)
            })
        }
        (true, true) => false,
    }
}

/// Normalized path split into segments, with `.` dropped and `..` applied.
/// Leading `..` of a relative path are kept. Returns whether it is absolute.
fn lexical_segments(path: &str) -> (bool, Vec<String>) {
    let normalized = normalize_path(Some(path));
    let bytes = normalized.as_bytes();
    let absolute = normalized.starts_with('/')
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':');

    let mut segments: Vec<String> = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| last != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..".to_string());
                }
            }
            other => segments.push(other.to_string()),
        }
    }
    (absolute, segments)
}

/// Swap ids are generated as `swap-<timestamp>-<hex>`; anything else cannot
/// name a stored entry and must not be turned into a path.
pub fn is_valid_swap_id(swap_id: &str) -> bool {
    !swap_id.is_empty()
        && swap_id.len() <= MAX_SESSION_ID_LEN
        && swap_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}
