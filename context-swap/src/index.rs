//! Per-session index — the only contended artifact.
//!
//! Writers take an exclusive advisory lock on `.index.lock`, read the index,
//! modify it, write a temp file in the same directory and rename it over
//! `index.json`. Readers never lock: the rename guarantees they see either
//! the old or the new document, never a partial one.

use crate::error::{SwapError, SwapResult};
use crate::types::IndexRecord;
use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Index document file name
pub const INDEX_FILE: &str = "index.json";

/// Advisory lock file name
pub const LOCK_FILE: &str = ".index.lock";

/// Where a corrupt index is moved before starting over
pub const CORRUPT_SUFFIX: &str = "corrupt";

const INDEX_VERSION: u32 = 1;

/// Ordered, append-only list of entry references for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIndex {
    /// Document format version
    pub version: u32,
    /// Next sequence number to hand out
    pub next_seq: u64,
    /// Records in append order
    pub entries: Vec<IndexRecord>,
}

impl Default for SessionIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            next_seq: 1,
            entries: Vec::new(),
        }
    }
}

impl SessionIndex {
    /// Number of records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no records
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a record, assigning it the next sequence number
    pub fn push(&mut self, mut record: IndexRecord) -> u64 {
        record.seq = self.next_seq;
        self.next_seq += 1;
        let seq = record.seq;
        self.entries.push(record);
        seq
    }

    /// Whether a record with this id exists
    pub fn contains(&self, swap_id: &str) -> bool {
        self.entries.iter().any(|r| r.swap_id == swap_id)
    }

    /// Remove the oldest records (by creation time, then sequence) until at
    /// most `max_entries` remain. Returns the removed records oldest first.
    pub fn evict_over_capacity(&mut self, max_entries: usize) -> Vec<IndexRecord> {
        if self.entries.len() <= max_entries {
            return Vec::new();
        }

        let excess = self.entries.len() - max_entries;
        let mut by_age: Vec<(DateTime<Utc>, u64)> =
            self.entries.iter().map(IndexRecord::eviction_key).collect();
        by_age.sort();
        let doomed: Vec<u64> = by_age.iter().take(excess).map(|(_, seq)| *seq).collect();

        let (mut evicted, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|r| doomed.contains(&r.seq));
        self.entries = kept;
        evicted.sort_by_key(IndexRecord::eviction_key);
        evicted
    }

    /// Remove records created strictly before `cutoff`; `None` removes all.
    pub fn take_expired(&mut self, cutoff: Option<DateTime<Utc>>) -> Vec<IndexRecord> {
        let (expired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|r| cutoff.map_or(true, |c| r.created_at < c));
        self.entries = kept;
        expired
    }

    /// Most recent creation time
    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.entries.iter().map(|r| r.created_at).max()
    }
}

/// Handle on one session directory's index and lock files.
pub struct IndexFile {
    dir: PathBuf,
}

impl IndexFile {
    /// Index inside `session_dir`
    pub fn new(session_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: session_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of `index.json`
    pub fn path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    /// Read the index. Missing file is an empty index; a parse failure is an error.
    pub fn read(&self) -> SwapResult<SessionIndex> {
        let path = self.path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionIndex::default())
            }
            Err(e) => return Err(SwapError::storage("read index", &path, e)),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// Read without failing: any error is logged and treated as empty.
    pub fn read_lenient(&self) -> SessionIndex {
        self.read().unwrap_or_else(|e| {
            warn!(
                path = %self.path().display(),
                code = e.error_code(),
                error = %e,
                "Unreadable swap index treated as empty"
            );
            SessionIndex::default()
        })
    }

    /// Locked read-modify-write.
    ///
    /// `f` runs while the exclusive lock is held. The index is rewritten only
    /// when `f` succeeds; on error the on-disk index is left untouched.
    pub fn update<T>(
        &self,
        f: impl FnOnce(&mut SessionIndex) -> SwapResult<T>,
    ) -> SwapResult<T> {
        let _lock = IndexLock::acquire(&self.dir)?;

        let mut index = match self.read() {
            Ok(index) => index,
            Err(SwapError::Json(e)) => {
                self.quarantine_corrupt(&e.to_string());
                SessionIndex::default()
            }
            Err(e) => return Err(e),
        };

        let out = f(&mut index)?;
        write_json_atomic(&self.path(), &index)?;
        debug!(
            path = %self.path().display(),
            entries = index.len(),
            "Swap index written"
        );
        Ok(out)
    }

    /// Move a corrupt index aside so a fresh one can be written
    fn quarantine_corrupt(&self, reason: &str) {
        let path = self.path();
        let aside = path.with_extension(format!("json.{}", CORRUPT_SUFFIX));
        warn!(
            path = %path.display(),
            reason,
            "Swap index is corrupt, moving aside and starting empty"
        );
        if let Err(e) = std::fs::rename(&path, &aside) {
            warn!(error = %e, "Failed to move corrupt swap index aside");
        }
    }
}

/// Exclusive advisory lock, released on drop.
struct IndexLock {
    file: File,
}

impl IndexLock {
    fn acquire(dir: &Path) -> SwapResult<Self> {
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| SwapError::storage("open index lock", &path, e))?;
        file.lock_exclusive()
            .map_err(|e| SwapError::storage("lock index", &path, e))?;
        Ok(Self { file })
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(error = %e, "Index unlock failed; released on close");
        }
    }
}

/// Serialize `value` to a temp file beside `path`, then rename it into place.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> SwapResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| SwapError::storage("create temp file", dir, e))?;

    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.flush()
        .map_err(|e| SwapError::storage("flush temp file", tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| SwapError::storage("sync temp file", tmp.path(), e))?;

    tmp.persist(path)
        .map_err(|e| SwapError::storage("rename temp file", path, e.error))?;
    Ok(())
}
