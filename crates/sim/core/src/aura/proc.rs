//! Chance-on-hit triggers gated by an internal cooldown.

use std::sync::Arc;

use bitflags::bitflags;

use crate::ability::{CastCategory, HitEvent, HitOutcome};
use crate::error::SimResult;
use crate::ids::{AuraRef, TimerId};
use crate::sim::Simulation;
use crate::time::SimTime;

use super::AuraConfig;

bitflags! {
    /// Outcomes a trigger reacts to.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct OutcomeMask: u8 {
        const MISS = 1 << 0;
        const DODGE = 1 << 1;
        const PARRY = 1 << 2;
        const HIT = 1 << 3;
        const CRIT = 1 << 4;

        const LANDED = Self::HIT.bits() | Self::CRIT.bits();
        const AVOIDED = Self::MISS.bits() | Self::DODGE.bits() | Self::PARRY.bits();
    }
}

impl OutcomeMask {
    pub fn matches(self, outcome: HitOutcome) -> bool {
        let bit = match outcome {
            HitOutcome::Miss => Self::MISS,
            HitOutcome::Dodge => Self::DODGE,
            HitOutcome::Parry => Self::PARRY,
            HitOutcome::Hit => Self::HIT,
            HitOutcome::Crit => Self::CRIT,
        };
        self.contains(bit)
    }
}

bitflags! {
    /// Cast categories a trigger reacts to.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct CategoryMask: u8 {
        const MELEE = 1 << 0;
        const RANGED = 1 << 1;
        const SPELL = 1 << 2;
    }
}

impl CategoryMask {
    pub fn matches(self, category: CastCategory) -> bool {
        let bit = match category {
            CastCategory::Melee => Self::MELEE,
            CastCategory::Ranged => Self::RANGED,
            CastCategory::Spell => Self::SPELL,
        };
        self.contains(bit)
    }
}

/// Called when a trigger fires.
pub type ProcHandler = Arc<dyn Fn(&mut Simulation, AuraRef, &HitEvent) -> SimResult<()> + Send + Sync>;

/// A permanent aura that reacts to its owner's hits.
///
/// The trigger fires when the hit matches both masks, the internal cooldown
/// is ready, and a draw from the trial RNG passes `chance`. Qualifying hits
/// during the cooldown window are ignored without drawing.
#[derive(Clone)]
pub struct ProcTriggerConfig {
    pub label: String,
    pub outcomes: OutcomeMask,
    pub categories: CategoryMask,
    /// Also react to periodic ticks.
    pub include_periodic: bool,
    /// Probability in `[0, 1]`; `1.0` skips the draw.
    pub chance: f64,
    pub icd: Option<SimTime>,
    pub handler: ProcHandler,
}

impl ProcTriggerConfig {
    pub fn new(
        label: impl Into<String>,
        handler: impl Fn(&mut Simulation, AuraRef, &HitEvent) -> SimResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            outcomes: OutcomeMask::LANDED,
            categories: CategoryMask::all(),
            include_periodic: false,
            chance: 1.0,
            icd: None,
            handler: Arc::new(handler),
        }
    }

    #[must_use]
    pub fn with_outcomes(mut self, outcomes: OutcomeMask) -> Self {
        self.outcomes = outcomes;
        self
    }

    #[must_use]
    pub fn with_categories(mut self, categories: CategoryMask) -> Self {
        self.categories = categories;
        self
    }

    #[must_use]
    pub fn with_chance(mut self, chance: f64) -> Self {
        self.chance = chance;
        self
    }

    #[must_use]
    pub fn with_icd(mut self, icd: SimTime) -> Self {
        self.icd = Some(icd);
        self
    }

    #[must_use]
    pub fn including_periodic(mut self) -> Self {
        self.include_periodic = true;
        self
    }

    /// Builds the permanent aura. `icd_timer` must belong to the aura's owner.
    pub(crate) fn into_aura(self, icd_timer: Option<TimerId>) -> AuraConfig {
        let Self {
            label,
            outcomes,
            categories,
            include_periodic,
            chance,
            icd,
            handler,
        } = self;

        let check = Arc::new(move |sim: &mut Simulation, aura: AuraRef, hit: &HitEvent| -> SimResult<()> {
            if !outcomes.matches(hit.outcome) || !categories.matches(hit.category) {
                return Ok(());
            }
            if let (Some(timer), Some(icd)) = (icd_timer, icd) {
                let now = sim.now();
                if !sim.timer(aura.unit, timer)?.is_ready(now) {
                    return Ok(());
                }
                if chance < 1.0 && !sim.rng_mut().chance(chance) {
                    return Ok(());
                }
                sim.use_timer(aura.unit, timer, icd)?;
            } else if chance < 1.0 && !sim.rng_mut().chance(chance) {
                return Ok(());
            }
            handler(sim, aura, hit)
        });

        let on_hit = Arc::clone(&check);
        let mut config = AuraConfig::new(label)
            .permanent()
            .on_hit_dealt(move |sim, aura, hit| on_hit(sim, aura, hit));
        if include_periodic {
            config = config.on_periodic_dealt(move |sim, aura, hit| check(sim, aura, hit));
        }
        config
    }
}

impl core::fmt::Debug for ProcTriggerConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProcTriggerConfig")
            .field("label", &self.label)
            .field("outcomes", &self.outcomes)
            .field("categories", &self.categories)
            .field("include_periodic", &self.include_periodic)
            .field("chance", &self.chance)
            .field("icd", &self.icd)
            .finish_non_exhaustive()
    }
}
