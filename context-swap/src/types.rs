//! Swap engine data types
//!
//! `SwapEntry` is the full record written as the metadata document;
//! `IndexRecord` is the lightweight reference kept in the session index;
//! `SwapEntryView` is the display projection handed to the resume hook.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Shape of the stored blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// String payload stored verbatim
    Text,
    /// Structured payload stored as pretty-printed JSON
    Structured,
}

impl ContentKind {
    /// File extension of the content artifact
    pub fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Structured => "json",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Structured => write!(f, "structured"),
        }
    }
}

/// Size of a stored payload. Characters and bytes differ for multi-byte text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapMetrics {
    /// Unicode scalar values
    pub char_count: u64,
    /// UTF-8 bytes
    pub byte_size: u64,
}

impl SwapMetrics {
    /// Measure a canonical text payload
    pub fn of(text: &str) -> Self {
        Self {
            char_count: text.chars().count() as u64,
            byte_size: text.len() as u64,
        }
    }
}

/// One externalized payload. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapEntry {
    /// Unique within the session
    pub swap_id: String,
    /// Sanitized session id
    pub session_id: String,
    /// Append order within the session index
    pub seq: u64,
    /// Originating tool
    pub tool: String,
    /// Best-effort description of the originating call
    pub tool_input_descriptor: String,
    /// Text or structured blob
    pub content_kind: ContentKind,
    /// Where the blob lives
    pub content_path: PathBuf,
    /// Where this document lives
    pub metadata_path: PathBuf,
    /// Lossy preview
    pub summary: String,
    /// Declaration-like identifiers, lossy
    pub patterns: Vec<String>,
    /// Payload size
    pub metrics: SwapMetrics,
    /// Creation time as recorded (full precision; `seq` breaks ties)
    pub created_at: DateTime<Utc>,
}

impl SwapEntry {
    /// Reference stored in the session index
    pub fn index_record(&self) -> IndexRecord {
        IndexRecord {
            swap_id: self.swap_id.clone(),
            seq: self.seq,
            tool: self.tool.clone(),
            summary: self.summary.clone(),
            content_path: self.content_path.clone(),
            byte_size: self.metrics.byte_size,
            created_at: self.created_at,
        }
    }
}

/// Lightweight reference to a `SwapEntry`, in index order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Entry id
    pub swap_id: String,
    /// Monotonic append sequence (assigned under the index lock)
    pub seq: u64,
    /// Originating tool
    pub tool: String,
    /// Lossy preview, copied so listings need no metadata reads
    pub summary: String,
    /// Blob location
    pub content_path: PathBuf,
    /// Blob size in bytes
    pub byte_size: u64,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl IndexRecord {
    /// FIFO eviction order: creation time, then append sequence
    pub fn eviction_key(&self) -> (DateTime<Utc>, u64) {
        (self.created_at, self.seq)
    }
}

/// Display projection of an index record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapEntryView {
    /// Entry id
    pub id: String,
    /// Originating tool
    pub tool: String,
    /// Lossy preview
    pub summary: String,
    /// Path to hand to a file-read tool
    pub retrieve_path: PathBuf,
    /// Blob size in bytes
    pub byte_size: u64,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl From<&IndexRecord> for SwapEntryView {
    fn from(record: &IndexRecord) -> Self {
        Self {
            id: record.swap_id.clone(),
            tool: record.tool.clone(),
            summary: record.summary.clone(),
            retrieve_path: record.content_path.clone(),
            byte_size: record.byte_size,
            created_at: record.created_at,
        }
    }
}
