//! Ability runtime.
//!
//! An ability is an immutable [`AbilityConfig`] plus per-target runtime state
//! held in the caster's [`Spellbook`]. Casting walks a small state machine:
//!
//! ```text
//! Idle ─► Casting ─► EffectApplication ─► Ticking ─► Completed
//!   └──────────────────────┘ (instant)       └─ only with a periodic effect
//! ```
//!
//! Rejections (cooldown, empty pool, busy caster) are [`CastOutcome`] values.
//! Only contract violations surface as errors.

mod cast;
mod damage;
mod dot;
mod outcome;
mod spellbook;

use std::sync::Arc;

use bitflags::bitflags;

use crate::error::SimResult;
use crate::ids::{CastContext, TimerId};
use crate::resources::PowerKind;
use crate::sim::Simulation;
use crate::time::SimTime;

pub use outcome::{HitEvent, HitOutcome, OutcomeTable, OutcomeTables};
pub use spellbook::{Ability, DotSnapshot, DotState, Spellbook};

/// Which defence table an ability is resolved against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::EnumCount, strum::IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum CastCategory {
    Melee,
    Ranged,
    Spell,
}

impl CastCategory {
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// What the default effect does to the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EffectKind {
    Damage,
    Heal,
    /// No direct amount; the ability works through hooks or its periodic effect.
    None,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct AbilityFlags: u16 {
        /// The periodic effect occupies the caster until its last tick.
        const CHANNELED = 1 << 0;
        /// Casting this cancels the caster's channel instead of being rejected.
        const INTERRUPTS_CHANNEL = 1 << 1;
        /// Completing this cast does not notify the caster's on-cast-complete auras.
        const NO_ON_CAST_COMPLETE = 1 << 2;
        /// Periodic ticks roll for critical strikes.
        const TICKS_CAN_CRIT = 1 << 3;
        /// Skips the outcome roll; the effect always lands as a normal hit.
        const CANNOT_MISS = 1 << 4;
    }
}

/// When the resource cost is taken.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CostTiming {
    #[default]
    OnCastStart,
    /// Deducted when the effect applies; a hardcast that can no longer pay fizzles.
    OnEffect,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CostConfig {
    pub kind: PowerKind,
    pub amount: f64,
    /// Fraction of the paid cost returned when the outcome roll does not land.
    pub refund: f64,
    pub timing: CostTiming,
}

impl CostConfig {
    pub const fn new(kind: PowerKind, amount: f64) -> Self {
        Self {
            kind,
            amount,
            refund: 0.0,
            timing: CostTiming::OnCastStart,
        }
    }

    #[must_use]
    pub const fn with_refund(mut self, refund: f64) -> Self {
        self.refund = refund;
        self
    }

    #[must_use]
    pub const fn on_effect(mut self) -> Self {
        self.timing = CostTiming::OnEffect;
        self
    }
}

/// Global cooldown triggered by a cast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Gcd {
    /// Off the global cooldown.
    Off,
    /// The simulation's default global cooldown.
    #[default]
    Default,
    Fixed(SimTime),
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CastConfig {
    pub gcd: Gcd,
    pub cast_time: SimTime,
    /// Cast time and GCD are not scaled by haste or cast speed.
    pub ignore_haste: bool,
    pub cooldown: SimTime,
    /// Cooldown group shared with other abilities; a private timer is created otherwise.
    pub shared_cooldown: Option<TimerId>,
}

/// How a periodic effect computes its per-tick amount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SnapshotPolicy {
    /// Capture formula inputs once at application and reuse them.
    #[default]
    Snapshot,
    /// Recompute the inputs before every tick.
    Rollover,
}

pub type DotTickHook = Arc<dyn Fn(&mut Simulation, CastContext, u32) -> SimResult<()> + Send + Sync>;

/// Periodic-tick descriptor.
#[derive(Clone)]
pub struct DotConfig {
    pub label: String,
    pub ticks: u32,
    pub tick_interval: SimTime,
    pub haste_affects: bool,
    pub policy: SnapshotPolicy,
    /// What each tick does, independent of the ability's direct effect.
    pub kind: EffectKind,
    pub base_tick: f64,
    /// Power coefficient per tick.
    pub coefficient: f64,
    /// Replaces the default tick damage. Receives the 1-based tick number.
    pub on_tick: Option<DotTickHook>,
}

impl DotConfig {
    pub fn new(label: impl Into<String>, ticks: u32, tick_interval: SimTime) -> Self {
        Self {
            label: label.into(),
            ticks,
            tick_interval,
            haste_affects: false,
            policy: SnapshotPolicy::Snapshot,
            kind: EffectKind::Damage,
            base_tick: 0.0,
            coefficient: 0.0,
            on_tick: None,
        }
    }

    #[must_use]
    pub fn with_damage(mut self, base_tick: f64, coefficient: f64) -> Self {
        self.kind = EffectKind::Damage;
        self.base_tick = base_tick;
        self.coefficient = coefficient;
        self
    }

    #[must_use]
    pub fn with_healing(mut self, base_tick: f64, coefficient: f64) -> Self {
        self.kind = EffectKind::Heal;
        self.base_tick = base_tick;
        self.coefficient = coefficient;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: SnapshotPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn hasted(mut self) -> Self {
        self.haste_affects = true;
        self
    }

    #[must_use]
    pub fn on_tick(
        mut self,
        hook: impl Fn(&mut Simulation, CastContext, u32) -> SimResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.on_tick = Some(Arc::new(hook));
        self
    }
}

impl core::fmt::Debug for DotConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DotConfig")
            .field("label", &self.label)
            .field("ticks", &self.ticks)
            .field("tick_interval", &self.tick_interval)
            .field("haste_affects", &self.haste_affects)
            .field("policy", &self.policy)
            .field("kind", &self.kind)
            .field("base_tick", &self.base_tick)
            .field("coefficient", &self.coefficient)
            .field("on_tick", &self.on_tick.is_some())
            .finish()
    }
}

pub type AbilityHook = Arc<dyn Fn(&mut Simulation, CastContext) -> SimResult<()> + Send + Sync>;
pub type CastCondition = Arc<dyn Fn(&Simulation, CastContext) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub struct AbilityHooks {
    pub on_cast_start: Vec<AbilityHook>,
    /// Replaces the default effect (outcome roll, amount, periodic application, refund).
    pub on_effect_apply: Option<AbilityHook>,
    pub on_cast_complete: Vec<AbilityHook>,
    pub cast_condition: Option<CastCondition>,
}

impl core::fmt::Debug for AbilityHooks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AbilityHooks")
            .field("on_cast_start", &self.on_cast_start.len())
            .field("on_effect_apply", &self.on_effect_apply.is_some())
            .field("on_cast_complete", &self.on_cast_complete.len())
            .field("cast_condition", &self.cast_condition.is_some())
            .finish()
    }
}

/// Declarative description of an ability.
///
/// Direct amount: `(base_amount + coefficient * power) * damage_multiplier`,
/// then scaled by caster and target pseudo-stats and, for physical
/// categories, armor.
#[derive(Clone, Debug)]
pub struct AbilityConfig {
    pub label: String,
    pub category: CastCategory,
    pub effect: EffectKind,
    pub flags: AbilityFlags,
    pub cost: Option<CostConfig>,
    pub cast: CastConfig,
    pub base_amount: f64,
    pub coefficient: f64,
    pub damage_multiplier: f64,
    /// Percentage points added to the caster's crit chance.
    pub bonus_crit: f64,
    /// Percentage points added to the caster's hit chance.
    pub bonus_hit: f64,
    pub crit_damage_bonus: f64,
    pub dot: Option<DotConfig>,
    pub hooks: AbilityHooks,
}

impl AbilityConfig {
    pub fn new(label: impl Into<String>, category: CastCategory) -> Self {
        Self {
            label: label.into(),
            category,
            effect: EffectKind::Damage,
            flags: AbilityFlags::empty(),
            cost: None,
            cast: CastConfig::default(),
            base_amount: 0.0,
            coefficient: 0.0,
            damage_multiplier: 1.0,
            bonus_crit: 0.0,
            bonus_hit: 0.0,
            crit_damage_bonus: 0.0,
            dot: None,
            hooks: AbilityHooks::default(),
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: EffectKind) -> Self {
        self.effect = effect;
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: AbilityFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[must_use]
    pub fn with_cost(mut self, cost: CostConfig) -> Self {
        self.cost = Some(cost);
        self
    }

    #[must_use]
    pub fn with_cast_time(mut self, cast_time: SimTime) -> Self {
        self.cast.cast_time = cast_time;
        self
    }

    #[must_use]
    pub fn with_gcd(mut self, gcd: Gcd) -> Self {
        self.cast.gcd = gcd;
        self
    }

    #[must_use]
    pub fn with_cooldown(mut self, cooldown: SimTime) -> Self {
        self.cast.cooldown = cooldown;
        self
    }

    #[must_use]
    pub fn with_shared_cooldown(mut self, timer: TimerId, cooldown: SimTime) -> Self {
        self.cast.shared_cooldown = Some(timer);
        self.cast.cooldown = cooldown;
        self
    }

    #[must_use]
    pub fn ignoring_haste(mut self) -> Self {
        self.cast.ignore_haste = true;
        self
    }

    #[must_use]
    pub fn with_amount(mut self, base_amount: f64, coefficient: f64) -> Self {
        self.base_amount = base_amount;
        self.coefficient = coefficient;
        self
    }

    #[must_use]
    pub fn with_damage_multiplier(mut self, multiplier: f64) -> Self {
        self.damage_multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn with_bonus_crit(mut self, percent: f64) -> Self {
        self.bonus_crit = percent;
        self
    }

    #[must_use]
    pub fn with_dot(mut self, dot: DotConfig) -> Self {
        self.dot = Some(dot);
        self
    }

    #[must_use]
    pub fn on_cast_start(
        mut self,
        hook: impl Fn(&mut Simulation, CastContext) -> SimResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_cast_start.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_effect_apply(
        mut self,
        hook: impl Fn(&mut Simulation, CastContext) -> SimResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_effect_apply = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_cast_complete(
        mut self,
        hook: impl Fn(&mut Simulation, CastContext) -> SimResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_cast_complete.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn with_condition(
        mut self,
        condition: impl Fn(&Simulation, CastContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.hooks.cast_condition = Some(Arc::new(condition));
        self
    }
}

/// Cast state machine position of an ability's most recent cast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CastPhase {
    #[default]
    Idle,
    Casting,
    EffectApplication,
    Ticking,
    Completed,
}

/// Why a cast attempt was refused. No state changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CastRejection {
    OnCooldown,
    GcdNotReady,
    AlreadyCasting,
    InsufficientResource,
    ConditionFailed,
    Disabled,
}

/// Result of [`Simulation::cast`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CastOutcome {
    /// Instant cast; the effect has already applied.
    Completed,
    /// Hardcast in flight; the effect applies when the cast finishes.
    Started,
    Rejected(CastRejection),
}

impl CastOutcome {
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}
