//! Queue configuration.
//!
//! Loaded from a YAML file by the inspection binary; embedders construct
//! `QueueConfig` directly.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{QueueError, Result};

/// Default score threshold for scheduling builds. This is "essentially zero",
/// allowing for significant floating point error, which indicates that we
/// will backfill builds for all commits except for those at which we've
/// already built.
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.0001;

/// Don't bisect builds with greater than this many commits. This prevents
/// spending lots of time computing giant blamelists.
pub const DEFAULT_BISECT_COMMIT_LIMIT: usize = 100;

/// If this period is used, include commits from the beginning of time.
pub const PERIOD_FOREVER: u64 = 0;

/// Branch heads excluded from the commit walk by default.
pub const DEFAULT_BLACKLISTED_BRANCHES: &[&str] = &["infra/config"];

/// Configuration for a [`BuildQueue`](crate::queue::BuildQueue).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Analysis window in seconds. The sentinel `0` means all history.
    pub period_secs: u64,

    /// Candidates scoring below this threshold are not queued.
    pub score_threshold: f64,

    /// Multiplicative score factor after a commit is 24 hours old.
    /// Must satisfy `0 < d <= 1`; `1` disables decay.
    pub decay_at_24h: f64,

    /// Branch heads excluded from the commit walk.
    pub blacklisted_branches: Vec<String>,

    /// Builds whose blamelists exceed this size are not bisected.
    pub bisect_commit_limit: usize,

    /// Repo whose default-branch head is scheduled for builders with no
    /// observed history.
    pub default_repo: String,

    /// Branch resolved for the unknown-builder fallback.
    pub default_branch: String,

    /// Optional path to a JSON blacklist rule file.
    pub blacklist_file: Option<PathBuf>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            period_secs: PERIOD_FOREVER,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            decay_at_24h: 1.0,
            blacklisted_branches: DEFAULT_BLACKLISTED_BRANCHES.iter().map(|s| s.to_string()).collect(),
            bisect_commit_limit: DEFAULT_BISECT_COMMIT_LIMIT,
            default_repo: String::new(),
            default_branch: "master".to_string(),
            blacklist_file: None,
        }
    }
}

impl QueueConfig {
    /// Load configuration from a YAML file, falling back to defaults when no
    /// path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            log::info!("No config file given, using defaults");
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| QueueError::Storage(format!("failed to parse config: {e}")))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.decay_at_24h <= 0.0 || self.decay_at_24h > 1.0 {
            return Err(QueueError::InvalidDecay(self.decay_at_24h));
        }
        Ok(())
    }
}
