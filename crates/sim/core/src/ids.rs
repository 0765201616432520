use std::fmt;

/// Index of a unit within its [`Simulation`](crate::Simulation).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnitId(pub u32);

impl UnitId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

/// Index of an aura within a unit's aura tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AuraId(pub u32);

impl AuraId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AuraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aura#{}", self.0)
    }
}

/// Index of an ability within a unit's spellbook.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AbilityId(pub u32);

impl AbilityId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AbilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ability#{}", self.0)
    }
}

/// Index of a cooldown timer within a unit's timer registry.
///
/// Timers are independent of abilities; several abilities may hold the
/// same `TimerId` to share a cooldown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u32);

impl TimerId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Index of a stat dependency within a unit's dependency manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepId(pub u32);

impl DepId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dep#{}", self.0)
    }
}

/// Fully-qualified aura reference: which unit, which aura.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AuraRef {
    pub unit: UnitId,
    pub aura: AuraId,
}

impl AuraRef {
    pub const fn new(unit: UnitId, aura: AuraId) -> Self {
        Self { unit, aura }
    }
}

/// Fully-qualified ability reference: which unit owns it, which ability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AbilityRef {
    pub unit: UnitId,
    pub ability: AbilityId,
}

impl AbilityRef {
    pub const fn new(unit: UnitId, ability: AbilityId) -> Self {
        Self { unit, ability }
    }
}

/// An ability aimed at a target. Passed to every ability hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CastContext {
    pub ability: AbilityRef,
    pub target: UnitId,
}

impl CastContext {
    pub const fn new(caster: UnitId, ability: AbilityId, target: UnitId) -> Self {
        Self {
            ability: AbilityRef::new(caster, ability),
            target,
        }
    }

    #[inline]
    pub const fn caster(&self) -> UnitId {
        self.ability.unit
    }
}
