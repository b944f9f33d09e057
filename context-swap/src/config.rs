//! Swap engine configuration
//!
//! Loaded once per invocation and passed by reference into every component.
//! A config that cannot be read is not an error for the host: it simply
//! turns the engine off.

use crate::error::{SwapError, SwapResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default storage directory, relative to the project directory
pub const DEFAULT_STORAGE_DIR: &str = ".context-swap";

/// Per-tool byte thresholds with a `default` fallback.
///
/// Serialized flat, so a TOML table reads naturally:
///
/// ```toml
/// [thresholds]
/// default = 4096
/// Read = 8192
/// Glob = 2048
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Fallback threshold for tools without an entry
    #[serde(default = "default_threshold")]
    pub default: u64,

    /// Tool name -> threshold in bytes
    #[serde(flatten)]
    pub per_tool: HashMap<String, u64>,
}

fn default_threshold() -> u64 {
    4096
}

impl Default for Thresholds {
    fn default() -> Self {
        let per_tool = [("Read", 8192), ("Grep", 4096), ("Glob", 2048), ("Bash", 4096)]
            .into_iter()
            .map(|(tool, bytes)| (tool.to_string(), bytes))
            .collect();
        Self {
            default: default_threshold(),
            per_tool,
        }
    }
}

impl Thresholds {
    /// Threshold for `tool`: exact name, then ASCII case-insensitive, then default
    pub fn for_tool(&self, tool: &str) -> u64 {
        if let Some(bytes) = self.per_tool.get(tool) {
            return *bytes;
        }
        self.per_tool
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(tool))
            .map(|(_, bytes)| *bytes)
            .unwrap_or(self.default)
    }
}

/// Capacity limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum index entries kept per session (oldest evicted first)
    pub max_entries_per_session: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_entries_per_session: 50,
        }
    }
}

/// Retention parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Entries older than this are removed by the retention sweep
    pub max_age_hours: u64,

    /// Session-end reasons that delete the whole session store
    pub full_reset_reasons: Vec<String>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_hours: 24,
            full_reset_reasons: vec!["clear".to_string()],
        }
    }
}

/// Top-level swap engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    /// Master switch
    pub enabled: bool,

    /// Root directory holding one subdirectory per session
    pub storage_root: PathBuf,

    /// Per-tool size thresholds
    pub thresholds: Thresholds,

    /// Capacity limits
    pub limits: Limits,

    /// Age-based cleanup parameters
    pub retention: RetentionConfig,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            storage_root: PathBuf::from(DEFAULT_STORAGE_DIR),
            thresholds: Thresholds::default(),
            limits: Limits::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl SwapConfig {
    /// Default config with the engine switched off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Parse a config file. `.json` files are read as JSON, anything else as TOML.
    pub fn try_load(path: impl AsRef<Path>) -> SwapResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SwapError::config(format!("cannot read {}: {}", path.display(), e)))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let mut config: Self = if is_json {
            serde_json::from_str(&content)
                .map_err(|e| SwapError::config(format!("invalid JSON config: {}", e)))?
        } else {
            toml::from_str(&content)
                .map_err(|e| SwapError::config(format!("invalid TOML config: {}", e)))?
        };

        config.validate();
        Ok(config)
    }

    /// Load a config for a hook invocation. Missing or malformed config
    /// disables the engine.
    pub fn load_or_disabled(path: impl AsRef<Path>) -> Self {
        match Self::try_load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    path = %path.as_ref().display(),
                    error = %e,
                    "Swap config unavailable, engine disabled"
                );
                Self::disabled()
            }
        }
    }

    /// Apply `CONTEXT_SWAP_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CONTEXT_SWAP_ENABLED") {
            self.enabled = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(root) = std::env::var("CONTEXT_SWAP_ROOT") {
            self.storage_root = PathBuf::from(root);
        }
        if let Ok(max) = std::env::var("CONTEXT_SWAP_MAX_ENTRIES") {
            if let Ok(n) = max.parse() {
                self.limits.max_entries_per_session = n;
            }
        }
        if let Ok(hours) = std::env::var("CONTEXT_SWAP_MAX_AGE_HOURS") {
            if let Ok(n) = hours.parse() {
                self.retention.max_age_hours = n;
            }
        }
        if let Ok(bytes) = std::env::var("CONTEXT_SWAP_THRESHOLD_DEFAULT") {
            if let Ok(n) = bytes.parse() {
                self.thresholds.default = n;
            }
        }
        self.validate();
    }

    /// Fix up values that would break the store. Returns the adjustments made.
    pub fn validate(&mut self) -> Vec<String> {
        let mut adjustments = Vec::new();
        if self.limits.max_entries_per_session == 0 {
            self.limits.max_entries_per_session = 1;
            adjustments.push("max_entries_per_session raised from 0 to 1".to_string());
        }
        for adjustment in &adjustments {
            warn!(adjustment = %adjustment, "Swap config adjusted");
        }
        adjustments
    }

    /// Resolve `storage_root` relative to the project directory
    pub fn resolve_paths(&mut self, working_dir: impl AsRef<Path>) {
        if self.storage_root.is_relative() {
            self.storage_root = working_dir.as_ref().join(&self.storage_root);
        }
    }

    /// Whether a session-end reason calls for deleting the whole session store
    pub fn is_full_reset(&self, reason: &str) -> bool {
        self.retention
            .full_reset_reasons
            .iter()
            .any(|r| r.eq_ignore_ascii_case(reason))
    }
}
