//! External effect lookup.
//!
//! Maps identifiers from outside the engine (item ids, set bonuses) to
//! build-phase closures that configure a unit. Built once by the caller,
//! applied before finalize, then dropped; the simulation never holds it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{ContractError, SimResult};
use crate::unit::Unit;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EffectKey {
    Item(u32),
    /// Bonus granted once `pieces` items of `set` are equipped.
    SetBonus { set: u32, pieces: u32 },
}

impl fmt::Display for EffectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item(id) => write!(f, "item:{id}"),
            Self::SetBonus { set, pieces } => write!(f, "set:{set}/{pieces}"),
        }
    }
}

pub type ApplyEffect = Arc<dyn Fn(&mut Unit) -> SimResult<()> + Send + Sync>;

#[derive(Clone, Default)]
pub struct EffectRegistry {
    effects: BTreeMap<EffectKey, ApplyEffect>,
}

impl fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("keys", &self.effects.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        key: EffectKey,
        apply: impl Fn(&mut Unit) -> SimResult<()> + Send + Sync + 'static,
    ) -> SimResult<()> {
        if self.effects.contains_key(&key) {
            return Err(ContractError::DuplicateEffectKey(key.to_string()));
        }
        self.effects.insert(key, Arc::new(apply));
        Ok(())
    }

    pub fn contains(&self, key: EffectKey) -> bool {
        self.effects.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Applies every registered effect among `keys`, in the given order.
    /// Unknown keys are skipped. Returns how many were applied.
    pub fn apply(&self, unit: &mut Unit, keys: &[EffectKey]) -> SimResult<usize> {
        let mut applied = 0;
        for key in keys {
            if let Some(effect) = self.effects.get(key) {
                effect(unit)?;
                applied += 1;
            }
        }
        debug!(unit = %unit.id(), applied, requested = keys.len(), "effects applied");
        Ok(applied)
    }

    /// Applies every bonus of `set` whose piece threshold `equipped` meets,
    /// lowest threshold first.
    pub fn apply_set(&self, unit: &mut Unit, set: u32, equipped: u32) -> SimResult<usize> {
        let bonuses: Vec<EffectKey> = self
            .effects
            .range(EffectKey::SetBonus { set, pieces: 0 }..=EffectKey::SetBonus { set, pieces: equipped })
            .map(|(key, _)| *key)
            .collect();
        self.apply(unit, &bonuses)
    }
}
