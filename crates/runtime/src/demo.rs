//! Built-in demonstration roster: an affliction-style caster against a
//! level 63 training dummy.

use std::sync::Arc;

use sim_core::{
    AbilityConfig, AbilityFlags, AuraRef, CastCategory, CostConfig, DotConfig, EffectKind,
    PowerKind, PriorityAgent, ProcTriggerConfig, SimConfig, SimResult, SimTime, Simulation, Stat,
    Stats, UnitKind, stat_bonus_aura,
};

use crate::runner::SimFactory;

pub const CASTER: &str = "Warlock";
pub const DUMMY: &str = "Training Dummy";

/// Mana below which the caster converts health into mana.
const LIFE_TAP_BELOW: f64 = 1_000.0;

pub fn factory() -> SimFactory {
    Arc::new(build)
}

/// Builds and finalizes the demonstration roster.
pub fn build() -> SimResult<Simulation> {
    let mut sim = Simulation::new(SimConfig::default());
    let caster = sim.add_unit(CASTER, UnitKind::Player, 60)?;
    let dummy = sim.add_unit(DUMMY, UnitKind::Opponent, 63)?;

    sim.unit_mut(dummy)?.add_stat(Stat::Health, 10_000_000.0)?;

    let unit = sim.unit_mut(caster)?;
    unit.add_stats(&Stats::from_pairs([
        (Stat::Health, 4_200.0),
        (Stat::Mana, 6_500.0),
        (Stat::Spirit, 130.0),
        (Stat::Mp5, 40.0),
        (Stat::SpellPower, 620.0),
        (Stat::SpellCrit, 8.5),
        (Stat::SpellHit, 4.0),
    ]))?;
    unit.enable_power(PowerKind::Mana, None)?;
    unit.set_default_target(dummy)?;

    let corruption = unit.register_ability(
        AbilityConfig::new("Corruption", CastCategory::Spell)
            .with_effect(EffectKind::None)
            .with_cost(CostConfig::new(PowerKind::Mana, 290.0))
            .with_dot(DotConfig::new("Corruption", 6, SimTime::from_secs(3)).with_damage(137.0, 0.156))
            .with_condition(|sim, ctx| sim.dot_state(ctx).is_ok_and(|dot| !dot.active)),
    )?;
    let agony = unit.register_ability(
        AbilityConfig::new("Curse of Agony", CastCategory::Spell)
            .with_effect(EffectKind::None)
            .with_cost(CostConfig::new(PowerKind::Mana, 265.0))
            .with_dot(DotConfig::new("Curse of Agony", 12, SimTime::from_secs(2)).with_damage(87.0, 0.083))
            .with_condition(|sim, ctx| sim.dot_state(ctx).is_ok_and(|dot| !dot.active)),
    )?;
    let life_tap = unit.register_ability(
        AbilityConfig::new("Life Tap", CastCategory::Spell)
            .with_effect(EffectKind::None)
            .with_flags(AbilityFlags::CANNOT_MISS)
            .with_cost(CostConfig::new(PowerKind::Health, 582.0))
            .with_condition(|sim, ctx| {
                sim.unit(ctx.caster())
                    .ok()
                    .and_then(|unit| unit.pool(PowerKind::Mana))
                    .is_some_and(|mana| mana.peek() < LIFE_TAP_BELOW)
            })
            .on_effect_apply(|sim, ctx| {
                sim.gain_power(ctx.caster(), PowerKind::Mana, 582.0)?;
                Ok(())
            }),
    )?;
    let shadow_bolt = unit.register_ability(
        AbilityConfig::new("Shadow Bolt", CastCategory::Spell)
            .with_cost(CostConfig::new(PowerKind::Mana, 380.0))
            .with_cast_time(SimTime::from_millis(2500))
            .with_amount(510.0, 0.857),
    )?;

    let trance = unit.register_aura(stat_bonus_aura(
        "Shadow Trance",
        Some(SimTime::from_secs(10)),
        Stats::from_pairs([(Stat::SpellPower, 100.0)]),
    ))?;
    unit.register_proc_trigger(
        ProcTriggerConfig::new("Nightfall", move |sim, aura, _hit| {
            sim.activate_aura(AuraRef::new(aura.unit, trance))
        })
        .with_chance(0.04)
        .with_icd(SimTime::from_secs(1))
        .including_periodic(),
    )?;

    sim.set_agent(
        caster,
        Box::new(PriorityAgent::new([life_tap, corruption, agony, shadow_bolt])),
    )?;
    sim.finalize()?;
    Ok(sim)
}
