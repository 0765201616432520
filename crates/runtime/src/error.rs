//! Error types surfaced by the trial runner.
//!
//! Engine contract violations arrive with the trial they aborted so a failing
//! seed can be replayed in isolation.
use std::path::PathBuf;

use sim_core::{ContractError, ErrorSeverity, SimError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("trial {iteration} (seed {seed:#018x}) aborted")]
    Trial {
        iteration: u64,
        seed: u64,
        #[source]
        source: ContractError,
    },

    #[error("worker {worker} failed to build its simulation")]
    Build {
        worker: usize,
        #[source]
        source: ContractError,
    },

    #[error("worker {worker} built a roster that differs from worker 0")]
    RosterMismatch { worker: usize },

    #[error("trial worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error("failed to read config {path}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid runner config: {0}")]
    InvalidConfig(String),
}

impl RuntimeError {
    /// The engine error behind this failure, if any.
    pub fn contract(&self) -> Option<&ContractError> {
        match self {
            Self::Trial { source, .. } | Self::Build { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl SimError for RuntimeError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Trial { source, .. } | Self::Build { source, .. } => source.severity(),
            Self::RosterMismatch { .. } | Self::WorkerJoin(_) => ErrorSeverity::Internal,
            Self::ConfigIo { .. } | Self::ConfigParse(_) | Self::InvalidConfig(_) => {
                ErrorSeverity::Validation
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Trial { source, .. } | Self::Build { source, .. } => source.error_code(),
            Self::RosterMismatch { .. } => "RUNNER_ROSTER_MISMATCH",
            Self::WorkerJoin(_) => "RUNNER_WORKER_JOIN",
            Self::ConfigIo { .. } => "RUNNER_CONFIG_IO",
            Self::ConfigParse(_) => "RUNNER_CONFIG_PARSE",
            Self::InvalidConfig(_) => "RUNNER_CONFIG_INVALID",
        }
    }
}
