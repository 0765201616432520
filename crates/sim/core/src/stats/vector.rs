use core::fmt;
use core::ops::{Index, IndexMut};

use strum::{EnumCount, IntoEnumIterator};

use super::kind::Stat;

/// Dense stat vector indexed by [`Stat`].
///
/// Copy-sized so the three per-unit forms (`without_deps`, `current`,
/// `initial`) can be snapshotted and restored without allocation.
#[derive(Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stats([f64; Stat::COUNT]);

impl Stats {
    pub const fn new() -> Self {
        Self([0.0; Stat::COUNT])
    }

    /// Builds a vector from `(stat, value)` pairs; later pairs overwrite earlier ones.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Stat, f64)>) -> Self {
        let mut stats = Self::new();
        for (stat, value) in pairs {
            stats[stat] = value;
        }
        stats
    }

    pub fn get(&self, stat: Stat) -> f64 {
        self.0[stat.index()]
    }

    #[must_use]
    pub fn add(&self, other: &Stats) -> Stats {
        let mut out = *self;
        out.add_inplace(other);
        out
    }

    #[must_use]
    pub fn subtract(&self, other: &Stats) -> Stats {
        let mut out = *self;
        for (lhs, rhs) in out.0.iter_mut().zip(other.0.iter()) {
            *lhs -= rhs;
        }
        out
    }

    pub fn add_inplace(&mut self, other: &Stats) {
        for (lhs, rhs) in self.0.iter_mut().zip(other.0.iter()) {
            *lhs += rhs;
        }
    }

    /// Non-zero entries, in [`Stat`] declaration order.
    pub fn iter_nonzero(&self) -> impl Iterator<Item = (Stat, f64)> + '_ {
        Stat::iter()
            .map(|stat| (stat, self[stat]))
            .filter(|(_, value)| *value != 0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<Stat> for Stats {
    type Output = f64;

    fn index(&self, stat: Stat) -> &f64 {
        &self.0[stat.index()]
    }
}

impl IndexMut<Stat> for Stats {
    fn index_mut(&mut self, stat: Stat) -> &mut f64 {
        &mut self.0[stat.index()]
    }
}

impl fmt::Debug for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter_nonzero()).finish()
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (stat, value)) in self.iter_nonzero().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{stat}: {value:.2}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_subtract_are_inverse() {
        let base = Stats::from_pairs([(Stat::Intellect, 100.0), (Stat::SpellPower, 50.0)]);
        let bonus = Stats::from_pairs([(Stat::SpellPower, 25.0)]);

        let buffed = base.add(&bonus);
        assert_eq!(buffed[Stat::SpellPower], 75.0);
        assert_eq!(buffed.subtract(&bonus), base);
    }

    #[test]
    fn display_lists_only_nonzero() {
        let stats = Stats::from_pairs([(Stat::Stamina, 10.0), (Stat::Armor, 250.0)]);
        assert_eq!(stats.to_string(), "{stamina: 10.00, armor: 250.00}");
        assert!(Stats::new().is_zero());
    }
}
