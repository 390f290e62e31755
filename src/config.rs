//! Run configuration.
//!
//! A run is described by two things: the **target size** (the one required
//! positional argument) and a set of optional **settings** that have stock
//! defaults reproducing the classic behaviour: Lanczos3, `.jpg` only,
//! traversal errors skipped.
//!
//! ## Settings File
//!
//! Settings may be overridden by a `longedge.toml` in the scan root, or by a
//! file passed with `--config`. Command-line flags override both.
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [resize]
//! algorithm = "lanczos3"   # nearest-neighbor | bilinear | bicubic | gaussian | lanczos3
//! quality = 75             # JPEG quality (1-100)
//!
//! [scan]
//! suffixes = [".jpg"]      # Case-insensitive file name suffixes to process
//! follow_links = false     # Descend into symlinked directories
//! on_error = "skip"        # skip | abort: unreadable directory entries
//!
//! [processing]
//! max_processes = 4        # Max parallel workers (omit for auto = CPU cores)
//! on_failure = "isolate"   # isolate | fail-fast: a file that fails to resize
//! ```
//!
//! Config files are sparse; unknown keys are rejected to catch typos early.

use crate::imaging::{Algorithm, supported_extensions};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Name of the settings file looked up in the scan root.
pub const SETTINGS_FILE: &str = "longedge.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid target size {0:?}: expected a positive integer")]
    TargetSize(String),
    #[error("scan root {0} is not a directory")]
    Root(PathBuf),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Desired length of the longer edge, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetSize(NonZeroU32);

impl TargetSize {
    pub fn new(pixels: u32) -> Option<Self> {
        NonZeroU32::new(pixels).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl FromStr for TargetSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .ok()
            .and_then(TargetSize::new)
            .ok_or_else(|| ConfigError::TargetSize(s.to_string()))
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px", self.get())
    }
}

/// What to do with a directory entry the walker cannot read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraversalPolicy {
    /// Log it and keep walking sibling entries.
    #[default]
    Skip,
    /// Stop dispatching new files; in-flight files still finish.
    Abort,
}

/// What to do when a single file fails to resize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Record the failure and carry on with every other file.
    #[default]
    Isolate,
    /// Cancel the run: queued files are skipped, in-flight ones stop at
    /// their next step boundary.
    FailFast,
}

/// Settings that can come from `longedge.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub resize: ResizeConfig,
    pub scan: ScanConfig,
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    pub algorithm: Algorithm,
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub quality: u8,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            quality: 75,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// File name suffixes, matched case-insensitively. A leading dot is
    /// optional in the file and added on normalisation.
    pub suffixes: Vec<String>,
    pub follow_links: bool,
    pub on_error: TraversalPolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            suffixes: vec![".jpg".to_string()],
            follow_links: false,
            on_error: TraversalPolicy::Skip,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
    pub on_failure: FailurePolicy,
}

/// Resolve the effective worker count from config.
///
/// - `None`: use all available cores
/// - `Some(n)`: use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Lowercase a suffix and make sure it starts with a dot.
pub fn normalize_suffix(suffix: &str) -> String {
    let lower = suffix.trim().to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

impl Settings {
    /// Validate values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.resize.quality) {
            return Err(ConfigError::Validation(
                "resize.quality must be 1-100".into(),
            ));
        }
        if self.scan.suffixes.is_empty() {
            return Err(ConfigError::Validation(
                "scan.suffixes must not be empty".into(),
            ));
        }
        for suffix in &self.scan.suffixes {
            let normalized = normalize_suffix(suffix);
            let ext = &normalized[1..];
            if !supported_extensions().contains(&ext) {
                return Err(ConfigError::Validation(format!(
                    "scan.suffixes: {suffix:?} is not a format that can be rewritten (supported: {})",
                    supported_extensions().join(", ")
                )));
            }
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Normalised, de-duplicated suffix list.
    pub fn suffixes(&self) -> Vec<String> {
        let mut suffixes: Vec<String> =
            self.scan.suffixes.iter().map(|s| normalize_suffix(s)).collect();
        suffixes.sort();
        suffixes.dedup();
        suffixes
    }
}

/// Everything a run needs, fully resolved and validated.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub root: PathBuf,
    pub target_size: TargetSize,
    pub settings: Settings,
}

impl RunConfig {
    /// Build a config with stock settings.
    pub fn new(root: impl Into<PathBuf>, target_size: TargetSize) -> Self {
        Self {
            root: root.into(),
            target_size,
            settings: Settings::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.root.is_dir() {
            return Err(ConfigError::Root(self.root.clone()));
        }
        self.settings.validate()
    }
}

// =============================================================================
// Settings loading and merging
// =============================================================================

/// Returns the stock default settings as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(Settings::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults do not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a settings file as a raw TOML value.
pub fn load_raw_settings(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_settings(overlay: Option<toml::Value>) -> Result<Settings, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let settings: Settings = merged.try_into()?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings for a run.
///
/// An explicit path must exist. Without one, `<root>/longedge.toml` is used
/// when present and stock defaults otherwise.
pub fn load_settings(root: &Path, explicit: Option<&Path>) -> Result<Settings, ConfigError> {
    let overlay = match explicit {
        Some(path) => Some(load_raw_settings(path)?),
        None => {
            let implicit = root.join(SETTINGS_FILE);
            if implicit.is_file() {
                log::debug!("using settings from {}", implicit.display());
                Some(load_raw_settings(&implicit)?)
            } else {
                None
            }
        }
    };
    resolve_settings(overlay)
}
