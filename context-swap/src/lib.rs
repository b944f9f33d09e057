//! Context Swap — external memory for oversized tool results.
//!
//! Tool results above a per-tool byte threshold are moved out of an agent's
//! active context into per-session files on disk and replaced by a short
//! pointer naming where the full content lives. Every call comes from an
//! independent short-lived hook process, so all coordination goes through
//! the filesystem.
//!
//! # Modules
//!
//! - [`config`] — Thresholds, limits, retention; TOML/JSON loading with env overrides
//! - [`sanitize`] — Session id and path normalization
//! - [`threshold`] — Externalize-or-not decision with recursion guard
//! - [`extract`] — Lossy summaries and declaration-like identifiers
//! - [`payload`] — Text vs. structured tool results
//! - [`index`] — Locked, atomically rewritten per-session index
//! - [`store`] — Content, metadata and index artifacts
//! - [`pointer`] — Pointer text replacing a swapped result
//! - [`retention`] — Age-based cleanup and stale session sweep
//! - [`engine`] — Facade used by the hook binary

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod index;
pub mod payload;
pub mod pointer;
pub mod retention;
pub mod sanitize;
pub mod store;
pub mod threshold;
pub mod types;

pub use config::{Limits, RetentionConfig, SwapConfig, Thresholds};
pub use engine::{SessionEndAction, SwapEngine, SwapOutcome, ToolCall};
pub use error::{SwapError, SwapResult};
pub use extract::{extract, extract_key_patterns, extract_summary, Extraction, ToolKind};
pub use payload::{describe_tool_input, CanonicalPayload, Payload};
pub use pointer::{build_pointer, POINTER_HEADER, RETRIEVE_PREFIX};
pub use retention::{CleanupReport, RetentionManager};
pub use sanitize::{normalize_path, sanitize_session_id};
pub use store::SwapStore;
pub use threshold::{SwapDecision, ThresholdDecider};
pub use types::{ContentKind, IndexRecord, SwapEntry, SwapEntryView, SwapMetrics};
