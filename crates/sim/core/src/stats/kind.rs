use strum::{EnumCount, EnumIter, IntoStaticStr};

/// Every stat a unit can carry.
///
/// Rating-style stats (hit, crit, haste, dodge, parry) are stored directly
/// as percentage points; `Armor` is a raw value converted to a damage
/// reduction by the outcome table.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, EnumCount, EnumIter, IntoStaticStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum Stat {
    // Primary
    Strength,
    Agility,
    Stamina,
    Intellect,
    Spirit,

    // Power
    AttackPower,
    RangedAttackPower,
    SpellPower,
    HealingPower,

    // Percent points
    MeleeHit,
    SpellHit,
    MeleeCrit,
    SpellCrit,
    MeleeHaste,
    SpellHaste,
    Dodge,
    Parry,

    // Defense
    Armor,

    // Pools
    Health,
    Mana,
    Mp5,
}

impl Stat {
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl core::fmt::Display for Stat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
