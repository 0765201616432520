//! Derived-stat rules.
//!
//! A [`StatDependency`] turns raw contributions into derived values:
//!
//! - **Additive**: `out[target] += out[source] * ratio` (e.g. 1 Intellect → 0.0167% SpellCrit)
//! - **Multiplier**: `out[target] *= factor` (e.g. +10% Stamina)
//!
//! Rules run in registration order over a copy of the input, so a multiplier
//! registered before an additive rule on the same source feeds the scaled
//! value forward. Order is frozen at finalize.

use tracing::trace;

use crate::error::{ContractError, SimResult};
use crate::ids::{DepId, UnitId};

use super::kind::Stat;
use super::vector::Stats;

/// A single derivation rule.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StatDependency {
    Additive { source: Stat, target: Stat, ratio: f64 },
    Multiplier { target: Stat, factor: f64 },
}

impl StatDependency {
    pub const fn additive(source: Stat, target: Stat, ratio: f64) -> Self {
        Self::Additive {
            source,
            target,
            ratio,
        }
    }

    pub const fn multiplier(target: Stat, factor: f64) -> Self {
        Self::Multiplier { target, factor }
    }

    #[inline]
    fn apply(&self, stats: &mut Stats) {
        match *self {
            Self::Additive {
                source,
                target,
                ratio,
            } => stats[target] += stats[source] * ratio,
            Self::Multiplier { target, factor } => stats[target] *= factor,
        }
    }
}

impl core::fmt::Display for StatDependency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Additive {
                source,
                target,
                ratio,
            } => write!(f, "{source} -> {target} x{ratio}"),
            Self::Multiplier { target, factor } => write!(f, "{target} *{factor}"),
        }
    }
}

#[derive(Clone, Debug)]
struct Entry {
    dep: StatDependency,
    enabled: bool,
    baseline: bool,
}

/// Ordered, togglable set of [`StatDependency`] rules for one unit.
#[derive(Clone, Debug)]
pub struct StatDependencyManager {
    owner: UnitId,
    entries: Vec<Entry>,
    finalized: bool,
}

impl StatDependencyManager {
    pub fn new(owner: UnitId) -> Self {
        Self {
            owner,
            entries: Vec::new(),
            finalized: false,
        }
    }

    /// Registers a rule that is active from the start of every trial.
    pub fn register(&mut self, dep: StatDependency) -> SimResult<DepId> {
        self.push(dep, true)
    }

    /// Registers a rule that starts every trial disabled and is toggled
    /// with [`enable_dynamic`](Self::enable_dynamic).
    pub fn register_dynamic(&mut self, dep: StatDependency) -> SimResult<DepId> {
        self.push(dep, false)
    }

    fn push(&mut self, dep: StatDependency, enabled: bool) -> SimResult<DepId> {
        if self.finalized {
            return Err(ContractError::AlreadyFinalized {
                what: "stat dependencies",
            });
        }
        let id = DepId(self.entries.len() as u32);
        self.entries.push(Entry {
            dep,
            enabled,
            baseline: enabled,
        });
        Ok(id)
    }

    /// Freezes rule order. Calling it twice is a contract violation.
    pub fn finalize(&mut self) -> SimResult<()> {
        if self.finalized {
            return Err(ContractError::AlreadyFinalized {
                what: "stat dependency manager",
            });
        }
        self.finalized = true;
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Returns the derived vector for `base`. Does not mutate `base`.
    pub fn apply(&self, base: &Stats) -> Stats {
        let mut out = *base;
        for entry in self.entries.iter().filter(|e| e.enabled) {
            entry.dep.apply(&mut out);
        }
        out
    }

    /// Enables `dep`. Returns `false` if it was already enabled.
    pub fn enable_dynamic(&mut self, dep: DepId) -> SimResult<bool> {
        self.toggle(dep, true)
    }

    /// Disables `dep`. Returns `false` if it was already disabled.
    pub fn disable_dynamic(&mut self, dep: DepId) -> SimResult<bool> {
        self.toggle(dep, false)
    }

    fn toggle(&mut self, dep: DepId, enabled: bool) -> SimResult<bool> {
        if !self.finalized {
            return Err(ContractError::NotFinalized {
                what: "dynamic stat dependency toggle",
            });
        }
        let owner = self.owner;
        let entry = self
            .entries
            .get_mut(dep.index())
            .ok_or(ContractError::UnknownDependency { unit: owner, dep })?;
        if entry.enabled == enabled {
            return Ok(false);
        }
        entry.enabled = enabled;
        trace!(unit = %owner, %dep, rule = %entry.dep, enabled, "stat dependency toggled");
        Ok(true)
    }

    pub fn is_enabled(&self, dep: DepId) -> Option<bool> {
        self.entries.get(dep.index()).map(|e| e.enabled)
    }

    pub fn get(&self, dep: DepId) -> Option<&StatDependency> {
        self.entries.get(dep.index()).map(|e| &e.dep)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restores every rule to its registration-time enabled flag.
    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.enabled = entry.baseline;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caster_deps() -> (StatDependencyManager, DepId) {
        let mut deps = StatDependencyManager::new(UnitId(0));
        // +10% Intellect, then 1 Intellect → 0.5 SpellPower
        deps.register(StatDependency::multiplier(Stat::Intellect, 1.1))
            .unwrap();
        deps.register(StatDependency::additive(Stat::Intellect, Stat::SpellPower, 0.5))
            .unwrap();
        let dynamic = deps
            .register_dynamic(StatDependency::multiplier(Stat::SpellPower, 1.2))
            .unwrap();
        deps.finalize().unwrap();
        (deps, dynamic)
    }

    #[test]
    fn rules_apply_in_registration_order() {
        let (deps, _) = caster_deps();
        let base = Stats::from_pairs([(Stat::Intellect, 100.0), (Stat::SpellPower, 10.0)]);

        let out = deps.apply(&base);
        // Intellect: 100 × 1.1 = 110
        // SpellPower: 10 + 110 × 0.5 = 65
        assert!((out[Stat::Intellect] - 110.0).abs() < 1e-9);
        assert!((out[Stat::SpellPower] - 65.0).abs() < 1e-9);
        // input untouched
        assert_eq!(base[Stat::Intellect], 100.0);
    }

    #[test]
    fn toggle_is_idempotent_and_reports_change() {
        let (mut deps, dynamic) = caster_deps();
        let base = Stats::from_pairs([(Stat::Intellect, 100.0)]);
        let before = deps.apply(&base);

        assert!(deps.enable_dynamic(dynamic).unwrap());
        assert!(!deps.enable_dynamic(dynamic).unwrap());
        // 55 × 1.2 = 66
        assert!((deps.apply(&base)[Stat::SpellPower] - 66.0).abs() < 1e-9);

        assert!(deps.disable_dynamic(dynamic).unwrap());
        assert!(!deps.disable_dynamic(dynamic).unwrap());
        assert_eq!(deps.apply(&base), before);
    }

    #[test]
    fn phase_violations_are_contract_errors() {
        let (mut deps, dynamic) = caster_deps();
        assert!(matches!(
            deps.register(StatDependency::multiplier(Stat::Armor, 2.0)),
            Err(ContractError::AlreadyFinalized { .. })
        ));
        assert!(deps.finalize().is_err());

        let mut fresh = StatDependencyManager::new(UnitId(1));
        let id = fresh
            .register_dynamic(StatDependency::multiplier(Stat::Armor, 2.0))
            .unwrap();
        assert!(matches!(
            fresh.enable_dynamic(id),
            Err(ContractError::NotFinalized { .. })
        ));

        assert!(matches!(
            deps.enable_dynamic(DepId(99)),
            Err(ContractError::UnknownDependency { .. })
        ));
        let _ = dynamic;
    }

    #[test]
    fn reset_restores_baseline_flags() {
        let (mut deps, dynamic) = caster_deps();
        deps.enable_dynamic(dynamic).unwrap();
        deps.disable_dynamic(DepId(0)).unwrap();

        deps.reset();
        assert_eq!(deps.is_enabled(DepId(0)), Some(true));
        assert_eq!(deps.is_enabled(dynamic), Some(false));
    }
}
