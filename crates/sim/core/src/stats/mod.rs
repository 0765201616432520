//! Stat system.
//!
//! ```text
//! [ without_deps ]  raw contributions (gear, buffs)
//!        ↓  StatDependencyManager::apply
//! [ current ]       what formulas read
//!
//! [ initial ]       frozen copy of `current` taken at finalize
//! ```
//!
//! `current` is always recomputed from `without_deps` rather than patched
//! incrementally, so toggling a multiplicative rule leaves no drift.

pub mod dependency;
pub mod kind;
pub mod pseudo;
pub mod vector;

pub use dependency::{StatDependency, StatDependencyManager};
pub use kind::Stat;
pub use pseudo::{PseudoStat, PseudoStats};
pub use vector::Stats;
