//! Trial orchestration on top of `sim-core`.
//!
//! [`TrialRunner`] fans a batch of seeded trials out over blocking worker
//! tasks, each owning its own [`Simulation`](sim_core::Simulation), and folds
//! the per-trial results into an [`AggregateReport`] in iteration order so
//! the report does not depend on how many workers ran it.
//!
//! ```no_run
//! # async fn demo(factory: sim_runtime::SimFactory) -> sim_runtime::Result<()> {
//! use sim_runtime::{RunnerConfig, TrialRunner};
//!
//! let report = TrialRunner::new(RunnerConfig::default(), factory).run().await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod demo;
pub mod error;
pub mod report;
pub mod runner;
pub mod telemetry;

pub use config::RunnerConfig;
pub use error::{Result, RuntimeError};
pub use report::{AbilityReport, AggregateReport, UnitReport};
pub use runner::{SimFactory, TrialRunner, batch_ranges};
pub use telemetry::init_tracing;
