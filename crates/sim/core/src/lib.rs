//! Deterministic combat-trial engine.
//!
//! `sim-core` runs one trial at a time: a fixed roster of units with stats,
//! resource pools, auras and abilities, driven by a discrete-event scheduler
//! and a single seeded RNG. Setup is done through build APIs, frozen by
//! [`Simulation::finalize`], and every trial starts from that frozen state,
//! so the same seed always reproduces the same trial.
//!
//! The crate performs no I/O. Orchestration across many trials lives in
//! `sim-runtime`.
pub mod ability;
pub mod aura;
pub mod config;
pub mod env;
pub mod error;
pub mod ids;
pub mod metrics;
pub mod registry;
pub mod resources;
pub mod scheduler;
pub mod sim;
pub mod stats;
pub mod time;
pub mod timer;
pub mod unit;
pub use ability::{
    Ability, AbilityConfig, AbilityFlags, CastCategory, CastOutcome, CastPhase, CastRejection,
    CostConfig, CostTiming, DotConfig, DotState, EffectKind, Gcd, HitEvent, HitOutcome,
    SnapshotPolicy,
};
pub use aura::{
    AuraConfig, AuraState, CategoryMask, OutcomeMask, ProcTriggerConfig, stacking_multiplier_aura,
    stat_bonus_aura,
};
pub use config::SimConfig;
pub use env::{Roster, SimRng, UnitKind, trial_seed};
pub use error::{ContractError, ErrorSeverity, SimError, SimResult};
pub use ids::{AbilityId, AbilityRef, AuraId, AuraRef, CastContext, DepId, TimerId, UnitId};
pub use metrics::{AbilityMetrics, AuraMetrics, ResourceMetrics, TrialMetrics, UnitMetrics};
pub use registry::{EffectKey, EffectRegistry};
pub use resources::{PowerKind, ResourcePool};
pub use scheduler::{EventHandle, Scheduler};
pub use sim::{Agent, PriorityAgent, Simulation, TraceKind, TraceMode, TrialSummary};
pub use stats::{PseudoStat, PseudoStats, Stat, StatDependency, Stats};
pub use time::SimTime;
pub use unit::{Unit, UnitSnapshot};
