//! Per-trial counters.
//!
//! The shape (units × abilities, units × auras) is fixed at finalize. Reset
//! zeroes the values in place so a runner can read one trial's numbers and
//! move on without reallocating.

use strum::EnumCount;

use crate::ability::{EffectKind, HitEvent, HitOutcome};
use crate::ids::{AbilityRef, AuraRef, UnitId};
use crate::resources::PowerKind;
use crate::time::SimTime;
use crate::unit::Unit;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AbilityMetrics {
    pub casts: u64,
    pub hits: u64,
    pub crits: u64,
    pub misses: u64,
    pub dodges: u64,
    pub parries: u64,
    pub ticks: u64,
    pub tick_crits: u64,
    pub damage: f64,
    pub healing: f64,
    pub resource_spent: f64,
    pub refunded: f64,
}

impl AbilityMetrics {
    fn record(&mut self, hit: &HitEvent) {
        if hit.periodic {
            self.ticks += 1;
            if hit.outcome == HitOutcome::Crit {
                self.tick_crits += 1;
            }
        } else {
            match hit.outcome {
                HitOutcome::Miss => self.misses += 1,
                HitOutcome::Dodge => self.dodges += 1,
                HitOutcome::Parry => self.parries += 1,
                HitOutcome::Hit => self.hits += 1,
                HitOutcome::Crit => {
                    self.hits += 1;
                    self.crits += 1;
                }
            }
        }
        match hit.kind {
            EffectKind::Heal => self.healing += hit.amount,
            EffectKind::Damage => self.damage += hit.amount,
            EffectKind::None => {}
        }
    }

    /// Direct hits that landed, as a fraction of resolved casts.
    pub fn landed_rate(&self) -> f64 {
        let resolved = self.hits + self.misses + self.dodges + self.parries;
        if resolved == 0 {
            0.0
        } else {
            self.hits as f64 / resolved as f64
        }
    }

    pub fn merge(&mut self, other: &Self) {
        self.casts += other.casts;
        self.hits += other.hits;
        self.crits += other.crits;
        self.misses += other.misses;
        self.dodges += other.dodges;
        self.parries += other.parries;
        self.ticks += other.ticks;
        self.tick_crits += other.tick_crits;
        self.damage += other.damage;
        self.healing += other.healing;
        self.resource_spent += other.resource_spent;
        self.refunded += other.refunded;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceMetrics {
    pub gained: f64,
    pub spent: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuraMetrics {
    pub activations: u64,
    pub uptime: SimTime,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnitMetrics {
    pub label: String,
    pub abilities: Vec<AbilityMetrics>,
    pub resources: [ResourceMetrics; PowerKind::COUNT],
    pub auras: Vec<AuraMetrics>,
    pub damage_done: f64,
    pub healing_done: f64,
    pub damage_taken: f64,
}

impl UnitMetrics {
    fn shaped(unit: &Unit) -> Self {
        Self {
            label: unit.label().to_owned(),
            abilities: vec![AbilityMetrics::default(); unit.spellbook().len()],
            resources: Default::default(),
            auras: vec![AuraMetrics::default(); unit.auras().len()],
            ..Self::default()
        }
    }

    fn clear(&mut self) {
        self.abilities.fill(AbilityMetrics::default());
        self.resources = Default::default();
        self.auras.fill(AuraMetrics::default());
        self.damage_done = 0.0;
        self.healing_done = 0.0;
        self.damage_taken = 0.0;
    }

    pub fn resource(&self, kind: PowerKind) -> &ResourceMetrics {
        &self.resources[kind.index()]
    }
}

/// Everything one trial measured.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrialMetrics {
    units: Vec<UnitMetrics>,
    elapsed: SimTime,
}

impl TrialMetrics {
    pub(crate) fn shaped(units: &[Unit]) -> Self {
        Self {
            units: units.iter().map(UnitMetrics::shaped).collect(),
            elapsed: SimTime::ZERO,
        }
    }

    pub(crate) fn reset(&mut self) {
        for unit in &mut self.units {
            unit.clear();
        }
        self.elapsed = SimTime::ZERO;
    }

    pub fn units(&self) -> &[UnitMetrics] {
        &self.units
    }

    pub fn unit(&self, unit: UnitId) -> Option<&UnitMetrics> {
        self.units.get(unit.index())
    }

    pub fn ability(&self, ability: AbilityRef) -> Option<&AbilityMetrics> {
        self.unit(ability.unit)?.abilities.get(ability.ability.index())
    }

    pub fn aura(&self, aura: AuraRef) -> Option<&AuraMetrics> {
        self.unit(aura.unit)?.auras.get(aura.aura.index())
    }

    /// Simulated time covered by the trial.
    pub fn elapsed(&self) -> SimTime {
        self.elapsed
    }

    /// Damage per simulated second, zero for an empty trial.
    pub fn dps(&self, unit: UnitId) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        match self.unit(unit) {
            Some(metrics) if secs > 0.0 => metrics.damage_done / secs,
            _ => 0.0,
        }
    }

    // ===== recording =====

    fn ability_mut(&mut self, ability: AbilityRef) -> Option<&mut AbilityMetrics> {
        self.units
            .get_mut(ability.unit.index())?
            .abilities
            .get_mut(ability.ability.index())
    }

    pub(crate) fn record_cast(&mut self, ability: AbilityRef) {
        if let Some(metrics) = self.ability_mut(ability) {
            metrics.casts += 1;
        }
    }

    pub(crate) fn record_hit(&mut self, hit: &HitEvent) {
        if let Some(metrics) = self.ability_mut(hit.ctx.ability) {
            metrics.record(hit);
        }
        let (caster, target) = (hit.ctx.caster().index(), hit.ctx.target.index());
        match hit.kind {
            EffectKind::Damage => {
                if let Some(unit) = self.units.get_mut(caster) {
                    unit.damage_done += hit.amount;
                }
                if let Some(unit) = self.units.get_mut(target) {
                    unit.damage_taken += hit.amount;
                }
            }
            EffectKind::Heal => {
                if let Some(unit) = self.units.get_mut(caster) {
                    unit.healing_done += hit.amount;
                }
            }
            EffectKind::None => {}
        }
    }

    pub(crate) fn record_spend(&mut self, unit: UnitId, kind: PowerKind, amount: f64, ability: Option<AbilityRef>) {
        if let Some(metrics) = self.units.get_mut(unit.index()) {
            metrics.resources[kind.index()].spent += amount;
        }
        if let Some(metrics) = ability.and_then(|a| self.ability_mut(a)) {
            metrics.resource_spent += amount;
        }
    }

    pub(crate) fn record_gain(&mut self, unit: UnitId, kind: PowerKind, amount: f64) {
        if let Some(metrics) = self.units.get_mut(unit.index()) {
            metrics.resources[kind.index()].gained += amount;
        }
    }

    pub(crate) fn record_refund(&mut self, ability: AbilityRef, kind: PowerKind, amount: f64) {
        if let Some(metrics) = self.ability_mut(ability) {
            metrics.refunded += amount;
        }
        self.record_gain(ability.unit, kind, amount);
    }

    pub(crate) fn record_aura_gain(&mut self, aura: AuraRef) {
        if let Some(metrics) = self.aura_mut(aura) {
            metrics.activations += 1;
        }
    }

    pub(crate) fn record_aura_uptime(&mut self, aura: AuraRef, span: SimTime) {
        if let Some(metrics) = self.aura_mut(aura) {
            metrics.uptime = metrics.uptime + span;
        }
    }

    fn aura_mut(&mut self, aura: AuraRef) -> Option<&mut AuraMetrics> {
        self.units
            .get_mut(aura.unit.index())?
            .auras
            .get_mut(aura.aura.index())
    }

    pub(crate) fn set_elapsed(&mut self, elapsed: SimTime) {
        self.elapsed = elapsed;
    }
}
