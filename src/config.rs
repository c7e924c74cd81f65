//! Static pipeline configuration, loaded once at startup.
//! Purity thresholds, retry budgets, cache sizing, and the contamination
//! pattern file are all injected here; nothing reconfigures mid-request.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the script-interleave pass treats glued foreign runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterleavePolicy {
    /// Remove the minority-script run (default: glued runs are UI-string
    /// concatenation artifacts, not content).
    DropMinority,
    /// Keep the run and insert a whitespace separator at each boundary.
    InsertSeparator,
}

/// Purity validation thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PurityConfig {
    /// Minimum dominant-script share over letter codepoints.
    pub threshold: f32,
    /// Maximum share of the opposing letter script.
    pub foreign_ceiling: f32,
    /// Fewer non-whitespace codepoints than this cannot be validated.
    pub min_viable_chars: usize,
}

impl Default for PurityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.95,
            foreign_ceiling: 0.05,
            min_viable_chars: 20,
        }
    }
}

/// Quality cache sizing and sweep cadence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
    /// Entries re-validated per revalidation sweep.
    pub revalidate_sample: usize,
    pub revalidate_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 512,
            ttl_secs: 600,
            revalidate_sample: 16,
            revalidate_interval_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn revalidate_interval(&self) -> Duration {
        Duration::from_secs(self.revalidate_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub purity: PurityConfig,
    /// Oracle re-invocations after the first attempt.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
    #[serde(default = "default_oracle_timeout_secs")]
    pub oracle_timeout_secs: u64,
    #[serde(default = "default_interleave_policy")]
    pub interleave_policy: InterleavePolicy,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Optional JSON file of additional contamination signatures.
    #[serde(default)]
    pub pattern_file: Option<PathBuf>,
}

fn default_retry_budget() -> u32 {
    2
}

fn default_oracle_timeout_secs() -> u64 {
    30
}

fn default_interleave_policy() -> InterleavePolicy {
    InterleavePolicy::DropMinority
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            purity: PurityConfig::default(),
            retry_budget: default_retry_budget(),
            oracle_timeout_secs: default_oracle_timeout_secs(),
            interleave_policy: default_interleave_policy(),
            cache: CacheConfig::default(),
            pattern_file: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config IO error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file. Failures here are fatal at
    /// process start, never per-request.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }
}
