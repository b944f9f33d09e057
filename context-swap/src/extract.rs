//! Content extractor — lossy, bounded previews of externalized payloads.
//!
//! Everything here is shallow lexical scanning. It must never fail and its
//! output size does not depend on input size. The stored blob, not the
//! summary, is the source of truth.

use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

/// Maximum summary body length in characters
pub const MAX_SUMMARY_CHARS: usize = 200;

/// Maximum number of key patterns
pub const MAX_PATTERNS: usize = 10;

/// Maximum length of a single pattern
pub const MAX_PATTERN_CHARS: usize = 64;

/// Declaration scans look only at this prefix of the content
pub const MAX_SCAN_BYTES: usize = 64 * 1024;

/// Extensions listed in a listing summary
const MAX_EXTENSIONS_SHOWN: usize = 10;

/// Declarations listed in a file-read summary
const MAX_DECLARATIONS_SHOWN: usize = 8;

/// Declaration keywords across common languages, capturing the identifier.
static DECLARATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:(?:pub(?:\([^)]*\))?|export|default|async|public|private|protected|static|abstract|final|unsafe)\s+)*(?:fn|struct|enum|trait|impl|mod|type|interface|class|def|function|func|module)\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("DECLARATION_PATTERN regex should compile")
});

/// `const`/`let` bindings whose value is a function (`const foo = (..) =>`).
static ARROW_FN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][A-Za-z0-9_$]*)\s*=>")
        .expect("ARROW_FN_PATTERN regex should compile")
});

/// Grep-style `path:line:` or `path:` prefixes.
static MATCH_FILE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\s:]+\.[A-Za-z0-9]+):(?:\d+[:-])?")
        .expect("MATCH_FILE_PREFIX regex should compile")
});

/// How a tool's output is shaped, for summary purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Line-per-match search output (Grep).
    Search,
    /// Line-per-path listing output (Glob, LS).
    Listing,
    /// Raw file content (Read).
    FileRead,
    /// Anything else.
    Generic,
}

impl ToolKind {
    /// Classify a tool by name
    pub fn classify(tool: &str) -> Self {
        match tool.to_ascii_lowercase().as_str() {
            "grep" | "search" | "rg" | "ripgrep" | "search_code" => Self::Search,
            "glob" | "ls" | "list" | "list_files" | "find" => Self::Listing,
            "read" | "read_file" | "view" | "notebookread" => Self::FileRead,
            _ => Self::Generic,
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Search => write!(f, "search"),
            Self::Listing => write!(f, "listing"),
            Self::FileRead => write!(f, "file_read"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

/// Summary and key patterns for one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Short lossy summary.
    pub summary: String,
    /// Declaration-like identifiers in first-seen order.
    pub patterns: Vec<String>,
}

/// Produce both the summary and the key patterns.
pub fn extract(content: &str, tool: &str) -> Extraction {
    Extraction {
        summary: extract_summary(content, tool),
        patterns: extract_key_patterns(content),
    }
}

/// Tool-dependent lossy summary, bounded in length.
pub fn extract_summary(content: &str, tool: &str) -> String {
    match ToolKind::classify(tool) {
        ToolKind::Search => summarize_search(content),
        ToolKind::Listing => summarize_listing(content),
        ToolKind::FileRead => summarize_file(content),
        ToolKind::Generic => truncate_chars(first_text(content), MAX_SUMMARY_CHARS),
    }
}

/// Declaration-like identifiers, deduplicated in first-seen order, at most
/// [`MAX_PATTERNS`].
pub fn extract_key_patterns(content: &str) -> Vec<String> {
    let scanned = scan_prefix(content);
    let mut seen = HashSet::new();
    let mut patterns = Vec::new();

    let mut candidates: Vec<(usize, &str)> = DECLARATION_PATTERN
        .captures_iter(scanned)
        .chain(ARROW_FN_PATTERN.captures_iter(scanned))
        .filter_map(|caps| caps.get(1))
        .map(|m| (m.start(), m.as_str()))
        .collect();
    candidates.sort_by_key(|(start, _)| *start);

    for (_, name) in candidates {
        if patterns.len() >= MAX_PATTERNS {
            break;
        }
        if name.chars().count() > MAX_PATTERN_CHARS {
            continue;
        }
        if seen.insert(name) {
            patterns.push(name.to_string());
        }
    }
    patterns
}

fn summarize_search(content: &str) -> String {
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    let files: HashSet<&str> = lines
        .iter()
        .filter_map(|line| MATCH_FILE_PREFIX.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();

    let noun = if lines.len() == 1 { "match" } else { "matches" };
    if files.is_empty() {
        format!("{} {}", lines.len(), noun)
    } else {
        let file_noun = if files.len() == 1 { "file" } else { "files" };
        format!("{} {} in {} {}", lines.len(), noun, files.len(), file_noun)
    }
}

fn summarize_listing(content: &str) -> String {
    let paths: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let extensions: BTreeSet<String> = paths
        .iter()
        .filter_map(|p| extension_of(p))
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .collect();

    let noun = if paths.len() == 1 { "file" } else { "files" };
    if extensions.is_empty() {
        return format!("{} {}", paths.len(), noun);
    }

    let shown: Vec<&str> = extensions
        .iter()
        .take(MAX_EXTENSIONS_SHOWN)
        .map(String::as_str)
        .collect();
    let more = extensions.len().saturating_sub(MAX_EXTENSIONS_SHOWN);
    let suffix = if more > 0 {
        format!(", +{} more", more)
    } else {
        String::new()
    };
    format!("{} {} ({}{})", paths.len(), noun, shown.join(", "), suffix)
}

fn summarize_file(content: &str) -> String {
    let line_count = content.lines().count();
    let declarations = extract_declarations(content);
    if declarations.is_empty() {
        return truncate_chars(first_text(content), MAX_SUMMARY_CHARS);
    }

    let shown: Vec<&str> = declarations
        .iter()
        .take(MAX_DECLARATIONS_SHOWN)
        .map(String::as_str)
        .collect();
    let more = declarations.len().saturating_sub(MAX_DECLARATIONS_SHOWN);
    let mut summary = format!("{} lines; declares: {}", line_count, shown.join(", "));
    if more > 0 {
        summary.push_str(&format!(" (+{} more)", more));
    }
    truncate_chars(&summary, MAX_SUMMARY_CHARS)
}

/// Every distinct declaration name in the scanned prefix, in order.
fn extract_declarations(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    DECLARATION_PATTERN
        .captures_iter(scan_prefix(content))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|name| name.chars().count() <= MAX_PATTERN_CHARS)
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

fn extension_of(path: &str) -> Option<&str> {
    let file_name = path.rsplit(|c: char| c == '/' || c == '\\').next()?;
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 10 {
        return None;
    }
    ext.chars()
        .all(|c| c.is_ascii_alphanumeric())
        .then_some(ext)
}

/// Content with leading blank lines removed
fn first_text(content: &str) -> &str {
    content.trim_start()
}

fn scan_prefix(content: &str) -> &str {
    if content.len() <= MAX_SCAN_BYTES {
        return content;
    }
    let mut end = MAX_SCAN_BYTES;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}

/// Truncate to `max` characters, appending `...` when anything was cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((byte_idx, _)) => format!("{}...", &s[..byte_idx]),
    }
}
