//! Amount formulas and hit application.

use tracing::trace;

use crate::aura::HitPoint;
use crate::error::SimResult;
use crate::ids::{CastContext, UnitId};
use crate::resources::PowerKind;
use crate::sim::{Simulation, TraceKind};
use crate::stats::Stat;
use crate::unit::Unit;

use super::{
    AbilityConfig, AbilityFlags, CastCategory, DotConfig, DotSnapshot, EffectKind, HitEvent,
    HitOutcome, OutcomeTable,
};

/// Stat that scales the amount for this category and effect.
fn power_stat(category: CastCategory, effect: EffectKind) -> Stat {
    match (category, effect) {
        (CastCategory::Spell, EffectKind::Heal) => Stat::HealingPower,
        (CastCategory::Spell, _) => Stat::SpellPower,
        (CastCategory::Melee, _) => Stat::AttackPower,
        (CastCategory::Ranged, _) => Stat::RangedAttackPower,
    }
}

fn crit_stat(category: CastCategory) -> Stat {
    match category {
        CastCategory::Spell => Stat::SpellCrit,
        CastCategory::Melee | CastCategory::Ranged => Stat::MeleeCrit,
    }
}

fn hit_stat(category: CastCategory) -> Stat {
    match category {
        CastCategory::Spell => Stat::SpellHit,
        CastCategory::Melee | CastCategory::Ranged => Stat::MeleeHit,
    }
}

impl Simulation {
    /// Rolls the outcome of a direct effect, computes the amount, and
    /// applies it. Consumes exactly one RNG draw unless the ability cannot
    /// miss.
    pub fn calc_and_deal(&mut self, ctx: CastContext) -> SimResult<HitEvent> {
        let config = self.ability_config(ctx)?;
        let outcome = self.roll_outcome(ctx, &config)?;
        let amount = if outcome.landed() {
            self.direct_amount(ctx, &config, outcome)?
        } else {
            0.0
        };
        let hit = HitEvent {
            ctx,
            category: config.category,
            kind: config.effect,
            outcome,
            amount,
            periodic: false,
        };
        self.apply_hit(&hit)?;
        Ok(hit)
    }

    /// The cached attack table for this pairing.
    pub fn outcome_table(
        &mut self,
        attacker: UnitId,
        defender: UnitId,
        category: CastCategory,
    ) -> SimResult<OutcomeTable> {
        let attacker_level = self.unit(attacker)?.level();
        let defender = self.unit(defender)?;
        let (defender_id, defender_level, defender_stats) =
            (defender.id(), defender.level(), *defender.initial_stats());
        let config = &self.config;
        Ok(self
            .outcomes
            .get_or_build(attacker, defender_id, category, || {
                OutcomeTable::build(config, category, attacker_level, defender_level, &defender_stats)
            }))
    }

    fn roll_outcome(&mut self, ctx: CastContext, config: &AbilityConfig) -> SimResult<HitOutcome> {
        if config.flags.contains(AbilityFlags::CANNOT_MISS) {
            return Ok(HitOutcome::Hit);
        }
        let caster = self.unit(ctx.caster())?;
        let hit_bonus = caster.stat(hit_stat(config.category)) + config.bonus_hit;
        let crit_chance = caster.stat(crit_stat(config.category)) + config.bonus_crit;
        let roll = self.rng_mut().next_f64() * 100.0;

        if config.effect == EffectKind::Heal {
            return Ok(OutcomeTable::resolve_heal(roll, crit_chance));
        }
        let table = self.outcome_table(ctx.caster(), ctx.target, config.category)?;
        Ok(table.resolve(roll, hit_bonus, crit_chance))
    }

    fn direct_amount(&mut self, ctx: CastContext, config: &AbilityConfig, outcome: HitOutcome) -> SimResult<f64> {
        let armor = match (config.effect, config.category) {
            (EffectKind::Damage, CastCategory::Melee | CastCategory::Ranged) => {
                self.outcome_table(ctx.caster(), ctx.target, config.category)?
                    .armor_mitigation
            }
            _ => 0.0,
        };
        let caster = self.unit(ctx.caster())?;
        let target = self.unit(ctx.target)?;

        let power = caster.stat(power_stat(config.category, config.effect));
        let mut amount = (config.base_amount + config.coefficient * power)
            * config.damage_multiplier
            * caster_multiplier(caster, config.effect)
            * target_multiplier(target, config.effect)
            * (1.0 - armor);
        if outcome == HitOutcome::Crit {
            amount *= self.crit_multiplier(caster, config);
        }
        Ok(amount.max(0.0))
    }

    /// `1 + (base - 1) * (1 + caster bonus + ability bonus)`.
    fn crit_multiplier(&self, caster: &Unit, config: &AbilityConfig) -> f64 {
        let base = match config.category {
            CastCategory::Spell => self.config.spell_crit_multiplier,
            CastCategory::Melee | CastCategory::Ranged => self.config.physical_crit_multiplier,
        };
        1.0 + (base - 1.0) * (1.0 + caster.pseudo().crit_damage_bonus + config.crit_damage_bonus)
    }

    /// Captures per-tick formula inputs for a periodic effect.
    pub(crate) fn dot_snapshot(&self, ctx: CastContext, config: &AbilityConfig, dot: &DotConfig) -> SimResult<DotSnapshot> {
        let caster = self.unit(ctx.caster())?;
        let power = caster.stat(power_stat(config.category, dot.kind));
        Ok(DotSnapshot {
            per_tick: (dot.base_tick + dot.coefficient * power)
                * config.damage_multiplier
                * caster_multiplier(caster, dot.kind),
            crit_chance: caster.stat(crit_stat(config.category)) + config.bonus_crit,
            crit_multiplier: self.crit_multiplier(caster, config),
        })
    }

    /// Deals one tick of the periodic effect `ctx` from its snapshot.
    /// Ticks only roll (once) when the ability allows them to crit.
    pub fn deal_dot_tick(&mut self, ctx: CastContext) -> SimResult<HitEvent> {
        let config = self.ability_config(ctx)?;
        let kind = config.dot.as_ref().map_or(config.effect, |dot| dot.kind);
        let snapshot = self
            .ability(ctx.caster(), ctx.ability.ability)?
            .dot(ctx.target)
            .map(|dot| dot.snapshot)
            .unwrap_or_default();

        let outcome = if config.flags.contains(AbilityFlags::TICKS_CAN_CRIT)
            && self.rng_mut().next_f64() * 100.0 < snapshot.crit_chance
        {
            HitOutcome::Crit
        } else {
            HitOutcome::Hit
        };
        let target = self.unit(ctx.target)?;
        let mut amount = snapshot.per_tick * target_multiplier(target, kind);
        if outcome == HitOutcome::Crit {
            amount *= snapshot.crit_multiplier;
        }
        let hit = HitEvent {
            ctx,
            category: config.category,
            kind,
            outcome,
            amount: amount.max(0.0),
            periodic: true,
        };
        self.apply_hit(&hit)?;
        Ok(hit)
    }

    /// Books a resolved hit: metrics, the target's health, the trace, then
    /// observers on both sides.
    pub(crate) fn apply_hit(&mut self, hit: &HitEvent) -> SimResult<()> {
        let now = self.now();
        self.metrics.record_hit(hit);
        if hit.amount > 0.0 {
            let delta = match hit.kind {
                EffectKind::Damage => -hit.amount,
                EffectKind::Heal => hit.amount,
                EffectKind::None => 0.0,
            };
            if let Some(health) = self.unit_mut(hit.ctx.target)?.pool_mut(PowerKind::Health) {
                health.gain(now, delta);
            }
        }
        trace!(
            caster = %hit.ctx.caster(),
            target = %hit.ctx.target,
            outcome = <&str>::from(hit.outcome),
            amount = hit.amount,
            periodic = hit.periodic,
            "hit resolved"
        );
        self.trace.record(
            now,
            hit.ctx.caster(),
            TraceKind::Outcome,
            hit.amount.to_bits() ^ hit.outcome.code(),
        );

        let point = if hit.periodic {
            HitPoint::PeriodicDealt
        } else {
            HitPoint::Dealt
        };
        self.notify_hit(hit.ctx.caster(), point, hit)?;
        self.notify_hit(hit.ctx.target, HitPoint::Taken, hit)
    }

    /// Returns the configured fraction of the last paid cost. Returns the
    /// amount actually restored.
    pub fn refund_cost(&mut self, ctx: CastContext) -> SimResult<f64> {
        let config = self.ability_config(ctx)?;
        let Some(cost) = config.cost else {
            return Ok(0.0);
        };
        let paid = self.ability(ctx.caster(), ctx.ability.ability)?.paid;
        let amount = paid * cost.refund;
        if amount <= 0.0 {
            return Ok(0.0);
        }
        let now = self.now();
        let restored = self.pool_mut(ctx.caster(), cost.kind)?.gain(now, amount);
        self.metrics.record_refund(ctx.ability, cost.kind, restored);
        self.trace
            .record(now, ctx.caster(), TraceKind::Refund, restored.to_bits());
        Ok(restored)
    }
}

fn caster_multiplier(caster: &Unit, effect: EffectKind) -> f64 {
    match effect {
        EffectKind::Heal => caster.pseudo().healing_dealt_multiplier,
        EffectKind::Damage | EffectKind::None => caster.pseudo().damage_dealt_multiplier,
    }
}

fn target_multiplier(target: &Unit, effect: EffectKind) -> f64 {
    match effect {
        EffectKind::Heal => 1.0,
        EffectKind::Damage | EffectKind::None => target.pseudo().damage_taken_multiplier,
    }
}
