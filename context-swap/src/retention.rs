//! Age-based retention for swap sessions.
//!
//! Cleanup runs from short-lived hook processes and may race an in-flight
//! externalize in another process. Every delete treats "already missing" as
//! done, and orphaned artifacts get a grace period before they are swept.

use crate::error::{SwapError, SwapResult};
use crate::index::IndexFile;
use crate::store::{remove_artifacts, swap_id_of_artifact, SwapStore};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Unreferenced artifacts younger than this are left alone
pub const ORPHAN_GRACE_MINUTES: i64 = 5;

/// Outcome of one session cleanup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Index entries removed (with their artifacts)
    pub removed: usize,
    /// Index entries still present
    pub retained: usize,
    /// Unreferenced artifact files removed
    pub orphans_removed: usize,
}

impl std::fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "removed {}, retained {}, orphans {}",
            self.removed, self.retained, self.orphans_removed
        )
    }
}

/// Cutoff for `max_age_hours` before `now`. `None` means everything is expired.
pub fn expiry_cutoff(now: DateTime<Utc>, max_age_hours: u64) -> Option<DateTime<Utc>> {
    if max_age_hours == 0 {
        return None;
    }
    let cutoff = i64::try_from(max_age_hours)
        .ok()
        .and_then(Duration::try_hours)
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    Some(cutoff)
}

/// Retention operations over a [`SwapStore`]
pub struct RetentionManager<'a> {
    store: &'a SwapStore,
}

impl<'a> RetentionManager<'a> {
    /// Manager over a store
    pub fn new(store: &'a SwapStore) -> Self {
        Self { store }
    }

    /// Remove entries older than `max_age_hours` (0 removes all). Never fails.
    pub fn cleanup_swap_files(&self, session_id: &str, max_age_hours: u64) -> CleanupReport {
        match self.try_cleanup_swap_files(session_id, max_age_hours, Utc::now()) {
            Ok(report) => {
                if report.removed > 0 || report.orphans_removed > 0 {
                    info!(session_id, max_age_hours, %report, "Swap retention cleanup");
                }
                report
            }
            Err(e) => {
                warn!(
                    session_id,
                    code = e.error_code(),
                    error = %e,
                    "Swap retention cleanup failed"
                );
                CleanupReport::default()
            }
        }
    }

    /// Cleanup against an explicit clock
    pub fn try_cleanup_swap_files(
        &self,
        session_id: &str,
        max_age_hours: u64,
        now: DateTime<Utc>,
    ) -> SwapResult<CleanupReport> {
        let dir = self.store.session_dir(session_id);
        if !dir.is_dir() {
            return Ok(CleanupReport::default());
        }

        let cutoff = expiry_cutoff(now, max_age_hours);
        let (expired, referenced) = IndexFile::new(&dir).update(|index| {
            let expired = index.take_expired(cutoff);
            let referenced: HashSet<String> =
                index.entries.iter().map(|r| r.swap_id.clone()).collect();
            Ok((expired, referenced))
        })?;

        for record in &expired {
            debug!(session_id, swap_id = %record.swap_id, "Expiring swap entry");
            remove_artifacts(&dir, &record.swap_id);
        }

        let grace_cutoff = now - Duration::minutes(ORPHAN_GRACE_MINUTES);
        let orphan_cutoff = cutoff.map_or(grace_cutoff, |c| c.min(grace_cutoff));
        let orphans_removed = sweep_orphans(&dir, &referenced, orphan_cutoff)?;

        Ok(CleanupReport {
            removed: expired.len(),
            retained: referenced.len(),
            orphans_removed,
        })
    }

    /// Delete whole session directories whose newest entry is older than the
    /// cutoff. `keep` (usually the session being started) is never touched.
    pub fn sweep_stale_sessions(&self, max_age_hours: u64, keep: Option<&str>) -> Vec<String> {
        let now = Utc::now();
        let cutoff = expiry_cutoff(now, max_age_hours);
        let keep = keep.map(|k| crate::sanitize::sanitize_session_id(Some(k)));

        let mut deleted = Vec::new();
        for session in self.store.list_sessions() {
            if keep.as_deref() == Some(session.as_str()) {
                continue;
            }
            let dir = self.store.session_dir(&session);
            let Some(last_activity) = last_activity(&dir) else {
                continue;
            };
            if cutoff.is_some_and(|c| last_activity >= c) {
                continue;
            }
            if self.store.delete_session_swap(&session) {
                deleted.push(session);
            }
        }

        if !deleted.is_empty() {
            info!(count = deleted.len(), max_age_hours, "Stale swap sessions removed");
        }
        deleted
    }

    /// Full, idempotent teardown of one session
    pub fn delete_session_swap(&self, session_id: &str) -> bool {
        self.store.delete_session_swap(session_id)
    }
}

/// Newest index entry, or the directory mtime when the index is empty
fn last_activity(dir: &Path) -> Option<DateTime<Utc>> {
    if let Some(newest) = IndexFile::new(dir).read_lenient().newest() {
        return Some(newest);
    }
    let modified = std::fs::metadata(dir).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// Remove artifact files no index record references and that were last
/// modified before `older_than`. Returns the number of files removed.
fn sweep_orphans(
    dir: &Path,
    referenced: &HashSet<String>,
    older_than: DateTime<Utc>,
) -> SwapResult<usize> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(SwapError::storage("list session dir", dir, e)),
    };

    let mut removed = 0;
    for dir_entry in read_dir.filter_map(Result::ok) {
        let file_name = dir_entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(swap_id) = swap_id_of_artifact(name) else {
            continue;
        };
        if referenced.contains(swap_id) {
            continue;
        }
        let Ok(modified) = dir_entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        if DateTime::<Utc>::from(modified) >= older_than {
            continue;
        }
        match std::fs::remove_file(dir_entry.path()) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(file = name, error = %e, "Failed to remove orphaned swap artifact"),
        }
    }
    Ok(removed)
}
