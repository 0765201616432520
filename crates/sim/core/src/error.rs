//! Common error infrastructure for sim-core.
//!
//! The engine distinguishes two tiers of failure:
//!
//! - **Contract violations** ([`ContractError`]): misuse of the build/finalize
//!   protocol or an internal desync. These abort the trial immediately and are
//!   never folded into statistics.
//! - **Expected outcomes** (`CastOutcome`, `HitOutcome`): an ability on cooldown,
//!   an empty resource pool, a miss. These are ordinary enum results.
//!
//! Every fallible core API returns [`SimResult`], and every hook returns
//! `SimResult<()>` so a violation inside a callback propagates with `?`.

use crate::ids::{AbilityId, AuraId, DepId, TimerId, UnitId};
use crate::resources::PowerKind;
use crate::time::SimTime;

/// Severity level of an error, used for categorization and recovery strategies.
///
/// - **Recoverable**: may succeed on retry or with an alternative action
/// - **Validation**: invalid input, reject without retry
/// - **Internal**: unexpected state inconsistency, indicates a bug
/// - **Fatal**: the trial cannot continue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    Recoverable,
    Validation,
    Internal,
    Fatal,
}

impl ErrorSeverity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    /// Returns true if this error indicates a bug or a corrupted trial.
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal | Self::Fatal)
    }
}

/// Common trait for engine errors.
pub trait SimError: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns a static string identifier for this error variant.
    ///
    /// Useful for metrics and assertions in tests.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

/// Violations of the engine's usage contract.
///
/// All variants are fatal: the current trial is aborted and the error is
/// surfaced to whoever drives the simulation.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ContractError {
    #[error("{what} cannot be modified after finalize")]
    AlreadyFinalized { what: &'static str },

    #[error("{what} requires a finalized simulation")]
    NotFinalized { what: &'static str },

    #[error("{unit} already has an aura labelled {label:?}")]
    DuplicateAuraLabel { unit: UnitId, label: String },

    #[error("{unit} has no {aura}")]
    UnknownAura { unit: UnitId, aura: AuraId },

    #[error("{unit} has no {ability}")]
    UnknownAbility { unit: UnitId, ability: AbilityId },

    #[error("no such unit {0}")]
    UnknownUnit(UnitId),

    #[error("{unit} has no {timer}")]
    UnknownTimer { unit: UnitId, timer: TimerId },

    #[error("{unit} has no {dep}")]
    UnknownDependency { unit: UnitId, dep: DepId },

    #[error("{aura} on {unit}: {requested} stacks exceeds maximum {max}")]
    StackOverflow {
        unit: UnitId,
        aura: AuraId,
        requested: u32,
        max: u32,
    },

    #[error("{unit} spent {requested} {kind} with only {available} available")]
    InsufficientResource {
        unit: UnitId,
        kind: PowerKind,
        requested: f64,
        available: f64,
    },

    #[error("event scheduled at {at} but the clock is already at {now}")]
    ScheduleInPast { at: SimTime, now: SimTime },

    #[error("{unit} started a cast while another hardcast is in flight")]
    CastWhileCasting { unit: UnitId },

    #[error("periodic effect {label:?} has a non-positive tick interval")]
    NonPositiveTickInterval { label: String },

    #[error("periodic effect {label:?} has zero ticks")]
    ZeroTickCount { label: String },

    #[error("{what} is not valid on an inactive aura ({aura} on {unit})")]
    AuraInactive {
        unit: UnitId,
        aura: AuraId,
        what: &'static str,
    },

    #[error("roster is full ({max} units)")]
    TooManyUnits { max: usize },

    #[error("{unit} has no {kind} pool")]
    MissingPool { unit: UnitId, kind: PowerKind },

    #[error("{ability} on {unit} has no periodic effect")]
    NoPeriodicEffect { unit: UnitId, ability: AbilityId },

    #[error("{unit} exceeds the limit of {max} auras")]
    TooManyAuras { unit: UnitId, max: usize },

    #[error("effect key {0} is already registered")]
    DuplicateEffectKey(String),
}

impl SimError for ContractError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Fatal
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyFinalized { .. } => "ALREADY_FINALIZED",
            Self::NotFinalized { .. } => "NOT_FINALIZED",
            Self::DuplicateAuraLabel { .. } => "DUPLICATE_AURA_LABEL",
            Self::UnknownAura { .. } => "UNKNOWN_AURA",
            Self::UnknownAbility { .. } => "UNKNOWN_ABILITY",
            Self::UnknownUnit(_) => "UNKNOWN_UNIT",
            Self::UnknownTimer { .. } => "UNKNOWN_TIMER",
            Self::UnknownDependency { .. } => "UNKNOWN_DEPENDENCY",
            Self::StackOverflow { .. } => "STACK_OVERFLOW",
            Self::InsufficientResource { .. } => "INSUFFICIENT_RESOURCE",
            Self::ScheduleInPast { .. } => "SCHEDULE_IN_PAST",
            Self::CastWhileCasting { .. } => "CAST_WHILE_CASTING",
            Self::NonPositiveTickInterval { .. } => "NON_POSITIVE_TICK_INTERVAL",
            Self::ZeroTickCount { .. } => "ZERO_TICK_COUNT",
            Self::AuraInactive { .. } => "AURA_INACTIVE",
            Self::TooManyUnits { .. } => "TOO_MANY_UNITS",
            Self::MissingPool { .. } => "MISSING_POOL",
            Self::NoPeriodicEffect { .. } => "NO_PERIODIC_EFFECT",
            Self::TooManyAuras { .. } => "TOO_MANY_AURAS",
            Self::DuplicateEffectKey(_) => "DUPLICATE_EFFECT_KEY",
        }
    }
}

pub type SimResult<T> = Result<T, ContractError>;
