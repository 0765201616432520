//! Attack tables.
//!
//! A table holds the defender-side chances for one (attacker, defender,
//! category) tuple. Tables are derived from `initial` stats and levels only,
//! so they are built once on first use and kept across trials. The
//! attacker's live hit and crit are added at roll time.
//!
//! Resolution is a single roll `r` in `[0, 100)` walked through the table:
//!
//! ```text
//! [ miss | dodge | parry | crit | hit ]
//! ```

use strum::EnumCount;

use crate::config::SimConfig;
use crate::ids::{CastContext, UnitId};
use crate::stats::{Stat, Stats};

use super::{CastCategory, EffectKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum HitOutcome {
    Miss,
    Dodge,
    Parry,
    Hit,
    Crit,
}

impl HitOutcome {
    pub const fn landed(self) -> bool {
        matches!(self, Self::Hit | Self::Crit)
    }

    pub(crate) const fn code(self) -> u64 {
        self as u64
    }
}

/// A resolved hit, passed to observers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitEvent {
    pub ctx: CastContext,
    pub category: CastCategory,
    pub kind: EffectKind,
    pub outcome: HitOutcome,
    /// Final amount after every multiplier; zero when avoided.
    pub amount: f64,
    pub periodic: bool,
}

/// Defender-side chances, in percentage points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutcomeTable {
    pub miss: f64,
    pub dodge: f64,
    pub parry: f64,
    /// Subtracted from the attacker's crit chance.
    pub crit_suppression: f64,
    /// Fraction of physical damage removed by armor.
    pub armor_mitigation: f64,
}

impl OutcomeTable {
    /// Builds the table for an attacker of `attacker_level` against a
    /// defender of `defender_level` with `defender` initial stats.
    pub fn build(
        config: &SimConfig,
        category: CastCategory,
        attacker_level: u32,
        defender_level: u32,
        defender: &Stats,
    ) -> Self {
        let diff = defender_level as i32 - attacker_level as i32;
        let above = f64::from(diff.max(0));
        let crit_suppression = config.crit_suppression_per_level * above;

        match category {
            CastCategory::Spell => Self {
                miss: config.spell_miss(diff),
                dodge: 0.0,
                parry: 0.0,
                crit_suppression,
                armor_mitigation: 0.0,
            },
            CastCategory::Melee | CastCategory::Ranged => {
                let armor = defender[Stat::Armor].max(0.0);
                let mitigation = armor
                    / (armor + config.armor_constant + 85.0 * f64::from(attacker_level));
                Self {
                    miss: config.physical_miss_base + config.physical_miss_per_level * above,
                    dodge: (defender[Stat::Dodge] + config.dodge_per_level * above).max(0.0),
                    parry: if category == CastCategory::Melee {
                        defender[Stat::Parry].max(0.0)
                    } else {
                        0.0
                    },
                    crit_suppression,
                    armor_mitigation: mitigation.clamp(0.0, config.armor_cap),
                }
            }
        }
    }

    /// Walks the table with one roll `r` in `[0, 100)`.
    pub fn resolve(&self, roll: f64, hit_bonus: f64, crit_chance: f64) -> HitOutcome {
        let miss = (self.miss - hit_bonus).max(0.0);
        let dodge = miss + self.dodge;
        let parry = dodge + self.parry;
        let crit = parry + (crit_chance - self.crit_suppression).max(0.0);

        if roll < miss {
            HitOutcome::Miss
        } else if roll < dodge {
            HitOutcome::Dodge
        } else if roll < parry {
            HitOutcome::Parry
        } else if roll < crit {
            HitOutcome::Crit
        } else {
            HitOutcome::Hit
        }
    }

    /// Heals cannot be avoided; the roll only decides the crit.
    pub fn resolve_heal(roll: f64, crit_chance: f64) -> HitOutcome {
        if roll < crit_chance.max(0.0) {
            HitOutcome::Crit
        } else {
            HitOutcome::Hit
        }
    }
}

/// Lazily built tables for every (attacker, defender, category) tuple.
#[derive(Clone, Debug, Default)]
pub struct OutcomeTables {
    units: usize,
    tables: Vec<Option<OutcomeTable>>,
}

impl OutcomeTables {
    pub fn new(units: usize) -> Self {
        Self {
            units,
            tables: vec![None; units * units * CastCategory::COUNT],
        }
    }

    fn slot(&self, attacker: UnitId, defender: UnitId, category: CastCategory) -> usize {
        (attacker.index() * self.units + defender.index()) * CastCategory::COUNT + category.index()
    }

    pub fn get(&self, attacker: UnitId, defender: UnitId, category: CastCategory) -> Option<&OutcomeTable> {
        self.tables
            .get(self.slot(attacker, defender, category))
            .and_then(Option::as_ref)
    }

    /// Returns the cached table or builds it with `build`.
    pub fn get_or_build(
        &mut self,
        attacker: UnitId,
        defender: UnitId,
        category: CastCategory,
        build: impl FnOnce() -> OutcomeTable,
    ) -> OutcomeTable {
        let slot = self.slot(attacker, defender, category);
        match self.tables.get_mut(slot) {
            Some(Some(table)) => *table,
            Some(entry) => *entry.insert(build()),
            None => build(),
        }
    }

    pub fn built(&self) -> usize {
        self.tables.iter().filter(|t| t.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boss() -> Stats {
        Stats::from_pairs([(Stat::Armor, 3000.0), (Stat::Dodge, 5.0), (Stat::Parry, 5.0)])
    }

    #[test]
    fn melee_table_against_higher_level() {
        let config = SimConfig::default();
        let table = OutcomeTable::build(&config, CastCategory::Melee, 60, 63, &boss());

        // miss: 5 + 1 × 3 = 8
        assert_eq!(table.miss, 8.0);
        // dodge: 5 + 0.5 × 3 = 6.5
        assert_eq!(table.dodge, 6.5);
        assert_eq!(table.parry, 5.0);
        assert_eq!(table.crit_suppression, 3.0);
        // 3000 / (3000 + 400 + 85 × 60) = 3000 / 8500
        assert!((table.armor_mitigation - 3000.0 / 8500.0).abs() < 1e-12);
    }

    #[test]
    fn spell_table_uses_level_lookup() {
        let config = SimConfig::default();
        let table = OutcomeTable::build(&config, CastCategory::Spell, 60, 63, &boss());
        assert_eq!(table.miss, 17.0);
        assert_eq!(table.dodge, 0.0);
        assert_eq!(table.armor_mitigation, 0.0);

        let table = OutcomeTable::build(&config, CastCategory::Spell, 60, 70, &boss());
        assert_eq!(table.miss, 17.0);
    }

    #[test]
    fn resolve_walks_table_in_order() {
        let table = OutcomeTable {
            miss: 8.0,
            dodge: 6.5,
            parry: 5.0,
            crit_suppression: 3.0,
            armor_mitigation: 0.0,
        };
        // hit bonus 3 → miss 5; dodge to 11.5; parry to 16.5; crit 20 - 3 = 17 → 33.5
        assert_eq!(table.resolve(4.99, 3.0, 20.0), HitOutcome::Miss);
        assert_eq!(table.resolve(5.0, 3.0, 20.0), HitOutcome::Dodge);
        assert_eq!(table.resolve(16.0, 3.0, 20.0), HitOutcome::Parry);
        assert_eq!(table.resolve(33.0, 3.0, 20.0), HitOutcome::Crit);
        assert_eq!(table.resolve(33.5, 3.0, 20.0), HitOutcome::Hit);
    }

    #[test]
    fn tables_are_cached() {
        let mut tables = OutcomeTables::new(2);
        let mut builds = 0;
        for _ in 0..3 {
            tables.get_or_build(UnitId(0), UnitId(1), CastCategory::Spell, || {
                builds += 1;
                OutcomeTable::build(&SimConfig::default(), CastCategory::Spell, 60, 63, &boss())
            });
        }
        assert_eq!(builds, 1);
        assert_eq!(tables.built(), 1);
        assert!(tables.get(UnitId(1), UnitId(0), CastCategory::Spell).is_none());
    }
}
