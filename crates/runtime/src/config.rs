//! Runner configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is valid:
//!
//! ```toml
//! iterations = 2000
//! base_seed = 42
//! workers = 4
//! duration_secs = 120.0
//! trace = "digest"
//! log_filter = "info,sim_core=warn"
//! ```
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sim_core::{SimTime, TraceMode};

use crate::error::{Result, RuntimeError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Number of trials to run.
    pub iterations: u64,
    /// Seed every trial seed is derived from. Drawn at random when absent.
    pub base_seed: Option<u64>,
    /// Blocking worker tasks; 0 uses the available parallelism.
    pub workers: usize,
    /// Simulated length of one trial.
    pub duration_secs: f64,
    pub trace: TraceMode,
    /// Default `EnvFilter` directive; `RUST_LOG` wins when set.
    pub log_filter: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            base_seed: None,
            workers: 0,
            duration_secs: 180.0,
            trace: TraceMode::Digest,
            log_filter: "info".to_string(),
        }
    }
}

impl RunnerConfig {
    /// Load and validate a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| RuntimeError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(RuntimeError::InvalidConfig(format!(
                "duration_secs must be positive, got {}",
                self.duration_secs
            )));
        }
        if self.trial_duration() <= SimTime::ZERO {
            return Err(RuntimeError::InvalidConfig(
                "duration_secs rounds to zero milliseconds".to_string(),
            ));
        }
        Ok(())
    }

    pub fn trial_duration(&self) -> SimTime {
        SimTime::from_secs_f64(self.duration_secs)
    }

    /// Resolved worker count, never more than there are trials and never zero.
    pub fn worker_count(&self) -> usize {
        let requested = if self.workers == 0 {
            std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
        } else {
            self.workers
        };
        let cap = usize::try_from(self.iterations).unwrap_or(usize::MAX).max(1);
        requested.min(cap)
    }

    /// The configured seed, or a fresh random one.
    pub fn resolve_seed(&self) -> u64 {
        self.base_seed.unwrap_or_else(rand::random)
    }
}
