//! tonearm-player configuration
//!
//! Runtime settings come from command-line arguments (with env fallbacks)
//! plus an optional TOML file for engine tuning. The end-of-track epsilon
//! and minimum-elapsed threshold are configuration, not constants.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Player service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Root folder containing music files; also the escape-check root for
    /// path-kind depot entries
    pub music_dir: PathBuf,
    pub tuning: EngineTuning,
}

/// Engine timing and queue tuning, loadable from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineTuning {
    /// Progress report period in milliseconds
    pub progress_interval_ms: u64,

    /// A completion signal counts as a natural end only when elapsed time
    /// is within this window of the buffer duration...
    pub completion_epsilon_ms: u64,

    /// ...and elapsed time exceeds this minimum. Filters spurious
    /// completion signals from stop/seek-triggered output restarts.
    pub completion_min_elapsed_ms: u64,

    /// Number of library tracks scheduled after the current one when the
    /// lookahead queue is rebuilt
    pub lookahead_len: usize,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            progress_interval_ms: 50,
            completion_epsilon_ms: 500,
            completion_min_elapsed_ms: 500,
            lookahead_len: 5,
        }
    }
}

impl EngineTuning {
    /// Load tuning from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&text)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }
}
