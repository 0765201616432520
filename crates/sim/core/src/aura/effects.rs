//! Ready-made aura configurations for the two most common effect shapes.

use crate::stats::{PseudoStat, Stats};
use crate::time::SimTime;

use super::AuraConfig;

/// Adds `bonus` to the owner's stats while active.
///
/// Applied through the dynamic stat path, so dependencies (e.g. Intellect →
/// SpellCrit) are recomputed on gain and on expire.
pub fn stat_bonus_aura(label: impl Into<String>, duration: Option<SimTime>, bonus: Stats) -> AuraConfig {
    let removal = Stats::new().subtract(&bonus);
    let mut config = AuraConfig::new(label)
        .on_gain(move |sim, aura| sim.add_stats_dynamic(aura.unit, &bonus).map(|_| ()))
        .on_expire(move |sim, aura| sim.add_stats_dynamic(aura.unit, &removal).map(|_| ()));
    config.duration = duration;
    config
}

/// Multiplies a pseudo-stat by `1 + per_stack * stacks`.
///
/// On every stack change the current factor is replaced by the new one via
/// the ratio `(1 + per_stack * new) / (1 + per_stack * old)`, so several of
/// these auras on the same pseudo-stat compose multiplicatively.
pub fn stacking_multiplier_aura(
    label: impl Into<String>,
    duration: Option<SimTime>,
    max_stacks: u32,
    per_stack: f64,
    target: PseudoStat,
) -> AuraConfig {
    let mut config = AuraConfig::new(label)
        .with_max_stacks(max_stacks)
        .on_stacks_change(move |sim, aura, old, new| {
            let ratio = (1.0 + per_stack * f64::from(new)) / (1.0 + per_stack * f64::from(old));
            sim.multiply_pseudo(aura.unit, target, ratio)
        });
    config.duration = duration;
    config
}
