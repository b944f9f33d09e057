//! Swap store — blobs, metadata documents, and the per-session index.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<session>/index.json
//! <root>/<session>/.index.lock
//! <root>/<session>/<swap_id>.txt | <swap_id>.json   content
//! <root>/<session>/<swap_id>.meta.json              metadata
//! ```
//!
//! Every collaborator-facing operation is fail-open: errors are logged and
//! turned into "no entry" or "empty". The `try_*` variants return them.

use crate::config::SwapConfig;
use crate::error::{SwapError, SwapResult};
use crate::extract;
use crate::index::{write_json_atomic, IndexFile, INDEX_FILE, LOCK_FILE};
use crate::payload::{describe_tool_input, CanonicalPayload, Payload};
use crate::sanitize::{is_valid_swap_id, sanitize_session_id};
use crate::types::{ContentKind, IndexRecord, SwapEntry, SwapEntryView, SwapMetrics};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Attempts at allocating a fresh swap id before giving up
pub const MAX_ID_ATTEMPTS: u32 = 8;

/// Metadata document suffix
pub const METADATA_SUFFIX: &str = ".meta.json";

/// Persists externalized payloads for any number of sessions.
#[derive(Debug, Clone)]
pub struct SwapStore {
    root: PathBuf,
    max_entries_per_session: usize,
}

impl SwapStore {
    /// Store rooted at `root`, keeping at most `max_entries_per_session`
    pub fn new(root: impl Into<PathBuf>, max_entries_per_session: usize) -> Self {
        Self {
            root: root.into(),
            max_entries_per_session: max_entries_per_session.max(1),
        }
    }

    /// Store described by a config
    pub fn from_config(config: &SwapConfig) -> Self {
        Self::new(
            config.storage_root.clone(),
            config.limits.max_entries_per_session,
        )
    }

    /// Storage root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Capacity limit per session
    pub fn max_entries_per_session(&self) -> usize {
        self.max_entries_per_session
    }

    /// Directory for a (raw, unsanitized) session id
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(sanitize_session_id(Some(session_id)))
    }

    // ---------------------------------------------------------------------
    // Externalize
    // ---------------------------------------------------------------------

    /// Persist a payload and return its entry, or `None` on any failure.
    pub fn externalize(
        &self,
        session_id: &str,
        tool: &str,
        tool_input: Option<&Value>,
        payload: &Payload,
    ) -> Option<SwapEntry> {
        let result = payload
            .canonicalize()
            .and_then(|canonical| self.try_externalize(session_id, tool, tool_input, &canonical));
        self.contain_externalize(session_id, tool, result)
    }

    /// [`SwapStore::externalize`] for a payload already resolved to canonical text
    pub fn externalize_canonical(
        &self,
        session_id: &str,
        tool: &str,
        tool_input: Option<&Value>,
        canonical: &CanonicalPayload<'_>,
    ) -> Option<SwapEntry> {
        let result = self.try_externalize(session_id, tool, tool_input, canonical);
        self.contain_externalize(session_id, tool, result)
    }

    fn contain_externalize(
        &self,
        session_id: &str,
        tool: &str,
        result: SwapResult<SwapEntry>,
    ) -> Option<SwapEntry> {
        match result {
            Ok(entry) => {
                info!(
                    session_id = %entry.session_id,
                    swap_id = %entry.swap_id,
                    tool = %entry.tool,
                    byte_size = entry.metrics.byte_size,
                    "Tool output externalized"
                );
                Some(entry)
            }
            Err(e) => {
                warn!(
                    session_id,
                    tool,
                    code = e.error_code(),
                    error = %e,
                    "Externalize failed, payload passes through"
                );
                None
            }
        }
    }

    /// Persist a canonical payload: blob, then metadata and index append
    /// under the session lock, then capacity eviction.
    pub fn try_externalize(
        &self,
        session_id: &str,
        tool: &str,
        tool_input: Option<&Value>,
        canonical: &CanonicalPayload<'_>,
    ) -> SwapResult<SwapEntry> {
        let session = sanitize_session_id(Some(session_id));
        let dir = self.root.join(&session);
        std::fs::create_dir_all(&dir)
            .map_err(|e| SwapError::storage("create session dir", &dir, e))?;

        let text: &str = &canonical.text;
        let extraction = extract::extract(text, tool);
        let (swap_id, created_at, content_path) = write_content(&dir, canonical.kind, text)?;

        let mut entry = SwapEntry {
            metadata_path: dir.join(format!("{}{}", swap_id, METADATA_SUFFIX)),
            swap_id,
            session_id: session,
            seq: 0,
            tool: tool.to_string(),
            tool_input_descriptor: describe_tool_input(tool_input),
            content_kind: canonical.kind,
            content_path,
            summary: extraction.summary,
            patterns: extraction.patterns,
            metrics: SwapMetrics::of(text),
            created_at,
        };

        match self.commit(&dir, &mut entry) {
            Ok(()) => Ok(entry),
            Err(e) => {
                if !matches!(e, SwapError::Evicted { .. }) {
                    remove_artifacts(&dir, &entry.swap_id);
                }
                Err(e)
            }
        }
    }

    /// Append under the lock, then delete whatever the capacity limit evicted.
    fn commit(&self, dir: &Path, entry: &mut SwapEntry) -> SwapResult<()> {
        let max = self.max_entries_per_session;
        let evicted = IndexFile::new(dir).update(|index| {
            entry.seq = index.push(entry.index_record());
            write_json_atomic(&entry.metadata_path, &*entry)?;
            Ok(index.evict_over_capacity(max))
        })?;

        for record in &evicted {
            debug!(
                session_id = %entry.session_id,
                swap_id = %record.swap_id,
                "Evicting oldest swap entry over capacity"
            );
            remove_artifacts(dir, &record.swap_id);
        }

        if evicted.iter().any(|r| r.swap_id == entry.swap_id) {
            return Err(SwapError::Evicted {
                swap_id: entry.swap_id.clone(),
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Read side
    // ---------------------------------------------------------------------

    /// Index records in append order; empty on any failure.
    pub fn read_index(&self, session_id: &str) -> Vec<IndexRecord> {
        IndexFile::new(self.session_dir(session_id))
            .read_lenient()
            .entries
    }

    /// Display projection of the index.
    pub fn get_swap_entries(&self, session_id: &str) -> Vec<SwapEntryView> {
        self.read_index(session_id)
            .iter()
            .map(SwapEntryView::from)
            .collect()
    }

    /// Full metadata for one entry
    pub fn load_entry(&self, session_id: &str, swap_id: &str) -> SwapResult<SwapEntry> {
        if !is_valid_swap_id(swap_id) {
            return Err(SwapError::InvalidSwapId {
                swap_id: swap_id.to_string(),
            });
        }
        let dir = self.session_dir(session_id);
        let path = dir.join(format!("{}{}", swap_id, METADATA_SUFFIX));
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SwapError::entry_not_found(sanitize_session_id(Some(session_id)), swap_id)
            } else {
                SwapError::storage("read metadata", &path, e)
            }
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// The stored payload, byte-exact
    pub fn read_content(&self, session_id: &str, swap_id: &str) -> SwapResult<String> {
        let entry = self.load_entry(session_id, swap_id)?;
        let path = self
            .session_dir(session_id)
            .join(format!("{}.{}", swap_id, entry.content_kind.extension()));
        std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SwapError::entry_not_found(entry.session_id.clone(), swap_id)
            } else {
                SwapError::storage("read content", &path, e)
            }
        })
    }

    /// Sanitized ids of every session with a storage directory, sorted
    pub fn list_sessions(&self) -> Vec<String> {
        let Ok(read_dir) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut sessions: Vec<String> = read_dir
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|name| sanitize_session_id(Some(name)) == *name)
            .collect();
        sessions.sort();
        sessions
    }

    // ---------------------------------------------------------------------
    // Delete
    // ---------------------------------------------------------------------

    /// Remove a session's whole storage directory. Missing is not an error.
    pub fn try_delete_session_swap(&self, session_id: &str) -> SwapResult<bool> {
        let dir = self.session_dir(session_id);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SwapError::storage("delete session dir", &dir, e)),
        }
    }

    /// Fail-open [`SwapStore::try_delete_session_swap`]; true when something was removed
    pub fn delete_session_swap(&self, session_id: &str) -> bool {
        match self.try_delete_session_swap(session_id) {
            Ok(removed) => {
                if removed {
                    info!(session_id, "Session swap store deleted");
                }
                removed
            }
            Err(e) => {
                warn!(session_id, error = %e, "Failed to delete session swap store");
                false
            }
        }
    }
}

/// `swap-<UTC yyyymmddTHHMMSSmmm>-<8 hex>`
pub fn generate_swap_id(created_at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "swap-{}-{}",
        created_at.format("%Y%m%dT%H%M%S%3f"),
        &suffix[..8]
    )
}

/// Create the content artifact under a fresh id.
///
/// `create_new` makes id collisions visible as `AlreadyExists`; each
/// collision retries with a new id.
fn write_content(
    dir: &Path,
    kind: ContentKind,
    text: &str,
) -> SwapResult<(String, DateTime<Utc>, PathBuf)> {
    for attempt in 1..=MAX_ID_ATTEMPTS {
        let created_at = Utc::now();
        let swap_id = generate_swap_id(created_at);
        let path = dir.join(format!("{}.{}", swap_id, kind.extension()));

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(swap_id = %swap_id, attempt, "Swap id collision, retrying");
                continue;
            }
            Err(e) => return Err(SwapError::storage("create content", &path, e)),
        };

        let written = file
            .write_all(text.as_bytes())
            .and_then(|()| file.sync_all());
        if let Err(e) = written {
            remove_if_present(&path);
            return Err(SwapError::storage("write content", &path, e));
        }
        return Ok((swap_id, created_at, path));
    }

    Err(SwapError::IdExhausted {
        attempts: MAX_ID_ATTEMPTS,
    })
}

/// Every file an entry may own. Ids are validated before any path is built.
pub(crate) fn artifact_paths(dir: &Path, swap_id: &str) -> Vec<PathBuf> {
    if !is_valid_swap_id(swap_id) {
        return Vec::new();
    }
    vec![
        dir.join(format!("{}.{}", swap_id, ContentKind::Text.extension())),
        dir.join(format!("{}.{}", swap_id, ContentKind::Structured.extension())),
        dir.join(format!("{}{}", swap_id, METADATA_SUFFIX)),
    ]
}

/// Delete an entry's blob and metadata; already-missing files are fine.
pub(crate) fn remove_artifacts(dir: &Path, swap_id: &str) {
    for path in artifact_paths(dir, swap_id) {
        remove_if_present(&path);
    }
}

fn remove_if_present(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove swap artifact");
        }
    }
}

/// Swap id owning a file in a session directory, if the file is an entry artifact
pub(crate) fn swap_id_of_artifact(file_name: &str) -> Option<&str> {
    if file_name == INDEX_FILE || file_name == LOCK_FILE {
        return None;
    }
    let id = file_name
        .strip_suffix(METADATA_SUFFIX)
        .or_else(|| file_name.strip_suffix(".txt"))
        .or_else(|| file_name.strip_suffix(".json"))?;
    (id.starts_with("swap-") && is_valid_swap_id(id)).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_generate_swap_id_shape() {
        let id = generate_swap_id(Utc::now());
        assert!(id.starts_with("swap-"));
        assert!(is_valid_swap_id(&id));
        // swap- + 8 date + T + 9 time/millis + - + 8 hex
        assert_eq!(id.len(), 5 + 8 + 1 + 9 + 1 + 8);
        assert_ne!(id, generate_swap_id(Utc::now()));
    }

    #[test]
    fn test_externalize_writes_blob_metadata_and_index() {
        let dir = tempdir().unwrap();
        let store = SwapStore::new(dir.path(), 10);
        let content = "line1\nline2\nline3\nline4\nline5";

        let entry = store
            .externalize("sess-1", "Grep", Some(&json!({"pattern": "test"})), &content.into())
            .expect("externalize should succeed");

        assert_eq!(entry.session_id, "sess-1");
        assert_eq!(entry.seq, 1);
        assert!(entry.summary.contains("5 matches"));
        assert_eq!(entry.tool_input_descriptor, "pattern: test");
        assert_eq!(std::fs::read_to_string(&entry.content_path).unwrap(), content);
        assert!(entry.metadata_path.exists());

        let index = store.read_index("sess-1");
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].swap_id, entry.swap_id);
        assert_eq!(store.load_entry("sess-1", &entry.swap_id).unwrap(), entry);
    }

    #[test]
    fn test_structured_payload_stored_as_json() {
        let dir = tempdir().unwrap();
        let store = SwapStore::new(dir.path(), 10);
        let value = json!({"matches": [1, 2, 3]});

        let entry = store
            .externalize("s", "Custom", None, &Payload::from_json_value(value.clone()))
            .unwrap();
        assert_eq!(entry.content_kind, ContentKind::Structured);
        assert_eq!(entry.content_path.extension().unwrap(), "json");

        let stored: Value =
            serde_json::from_str(&store.read_content("s", &entry.swap_id).unwrap()).unwrap();
        assert_eq!(stored, value);
    }

    #[test]
    fn test_session_id_is_sanitized() {
        let dir = tempdir().unwrap();
        let store = SwapStore::new(dir.path(), 10);
        let entry = store
            .externalize("../../evil/..", "Bash", None, &"x".into())
            .unwrap();
        assert_eq!(entry.session_id, "evil");
        assert!(entry.content_path.starts_with(dir.path().join("evil")));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let dir = tempdir().unwrap();
        let store = SwapStore::new(dir.path(), 2);
        let entries: Vec<SwapEntry> = (0..4)
            .map(|i| {
                store
                    .externalize("s", "Bash", None, &format!("payload {}", i).into())
                    .unwrap()
            })
            .collect();

        let ids: Vec<String> = store.read_index("s").into_iter().map(|r| r.swap_id).collect();
        assert_eq!(ids, vec![entries[2].swap_id.clone(), entries[3].swap_id.clone()]);
        assert!(!entries[0].content_path.exists());
        assert!(!entries[0].metadata_path.exists());
        assert!(entries[3].content_path.exists());
    }

    #[test]
    fn test_io_failure_returns_none() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file in the way").unwrap();
        let store = SwapStore::new(&blocker, 10);

        assert!(store.externalize("s", "Bash", None, &"payload".into()).is_none());
        assert!(store.read_index("s").is_empty());
    }

    #[test]
    fn test_load_entry_rejects_bad_ids() {
        let dir = tempdir().unwrap();
        let store = SwapStore::new(dir.path(), 10);
        assert!(matches!(
            store.load_entry("s", "../index"),
            Err(SwapError::InvalidSwapId { .. })
        ));
        assert!(store
            .load_entry("s", "swap-20260101T000000000-00000000")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_delete_session_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = SwapStore::new(dir.path(), 10);
        store.externalize("s", "Bash", None, &"x".into()).unwrap();

        assert!(store.delete_session_swap("s"));
        assert!(!store.delete_session_swap("s"));
        assert!(!store.session_dir("s").exists());
        assert!(store.read_index("s").is_empty());
    }

    #[test]
    fn test_list_sessions() {
        let dir = tempdir().unwrap();
        let store = SwapStore::new(dir.path(), 10);
        assert!(store.list_sessions().is_empty());
        store.externalize("b", "Bash", None, &"x".into()).unwrap();
        store.externalize("a", "Bash", None, &"x".into()).unwrap();
        assert_eq!(store.list_sessions(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_swap_id_of_artifact() {
        let id = "swap-20260101T000000000-0a0b0c0d";
        assert_eq!(swap_id_of_artifact(&format!("{}.txt", id)), Some(id));
        assert_eq!(swap_id_of_artifact(&format!("{}.json", id)), Some(id));
        assert_eq!(swap_id_of_artifact(&format!("{}.meta.json", id)), Some(id));
        assert_eq!(swap_id_of_artifact("index.json"), None);
        assert_eq!(swap_id_of_artifact(".index.lock"), None);
        assert_eq!(swap_id_of_artifact("notes.txt"), None);
    }
}
