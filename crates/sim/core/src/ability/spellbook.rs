use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ContractError, SimResult};
use crate::ids::{AbilityId, TimerId, UnitId};
use crate::scheduler::EventHandle;
use crate::time::SimTime;

use super::{AbilityConfig, CastPhase};

/// Formula inputs captured when a periodic effect is applied.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DotSnapshot {
    /// Amount per tick before target-side multipliers.
    pub per_tick: f64,
    pub crit_chance: f64,
    pub crit_multiplier: f64,
}

/// Runtime state of one periodic effect on one target.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DotState {
    pub active: bool,
    pub ticks_total: u32,
    pub ticks_fired: u32,
    pub interval: SimTime,
    pub applied_at: SimTime,
    pub snapshot: DotSnapshot,
    /// Bumped on every application so a tick can tell it was overwritten.
    pub(crate) application: u32,
    pub(crate) handle: Option<EventHandle>,
}

impl DotState {
    pub fn remaining_ticks(&self) -> u32 {
        self.ticks_total.saturating_sub(self.ticks_fired)
    }

    /// Timestamp of tick `n` (1-based) of the current application.
    pub fn tick_time(&self, n: u32) -> SimTime {
        self.applied_at + self.interval.times(n)
    }

    pub fn ends_at(&self) -> SimTime {
        self.tick_time(self.ticks_total)
    }

    pub(crate) fn clear(&mut self) {
        let application = self.application;
        *self = Self {
            application,
            ..Self::default()
        };
    }
}

/// One ability in a unit's spellbook.
#[derive(Debug)]
pub struct Ability {
    id: AbilityId,
    pub(crate) config: Arc<AbilityConfig>,
    cooldown: TimerId,
    pub(crate) enabled: bool,
    pub(crate) phase: CastPhase,
    /// Cost paid by the most recent cast, for refunds.
    pub(crate) paid: f64,
    /// Indexed by target unit; sized at finalize.
    pub(crate) dots: Vec<DotState>,
}

impl Ability {
    pub fn id(&self) -> AbilityId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    pub fn config(&self) -> &AbilityConfig {
        &self.config
    }

    pub fn cooldown_timer(&self) -> TimerId {
        self.cooldown
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn phase(&self) -> CastPhase {
        self.phase
    }

    pub fn dot(&self, target: UnitId) -> Option<&DotState> {
        self.dots.get(target.index())
    }

    pub(crate) fn dot_mut(&mut self, target: UnitId) -> Option<&mut DotState> {
        self.dots.get_mut(target.index())
    }

    fn reset(&mut self) {
        self.enabled = true;
        self.phase = CastPhase::Idle;
        self.paid = 0.0;
        for dot in &mut self.dots {
            *dot = DotState::default();
        }
    }
}

/// Every ability registered on one unit.
#[derive(Debug)]
pub struct Spellbook {
    owner: UnitId,
    abilities: Vec<Ability>,
    by_label: HashMap<String, AbilityId>,
}

impl Spellbook {
    pub fn new(owner: UnitId) -> Self {
        Self {
            owner,
            abilities: Vec::new(),
            by_label: HashMap::new(),
        }
    }

    pub(crate) fn register(&mut self, config: AbilityConfig, cooldown: TimerId) -> AbilityId {
        let id = AbilityId(self.abilities.len() as u32);
        self.by_label.insert(config.label.clone(), id);
        self.abilities.push(Ability {
            id,
            config: Arc::new(config),
            cooldown,
            enabled: true,
            phase: CastPhase::Idle,
            paid: 0.0,
            dots: Vec::new(),
        });
        id
    }

    /// Allocates one periodic-effect slot per potential target.
    pub(crate) fn allocate_dots(&mut self, units: usize) {
        for ability in &mut self.abilities {
            if ability.config.dot.is_some() {
                ability.dots = vec![DotState::default(); units];
            }
        }
    }

    pub fn get(&self, id: AbilityId) -> SimResult<&Ability> {
        self.abilities
            .get(id.index())
            .ok_or(ContractError::UnknownAbility {
                unit: self.owner,
                ability: id,
            })
    }

    pub(crate) fn get_mut(&mut self, id: AbilityId) -> SimResult<&mut Ability> {
        let owner = self.owner;
        self.abilities
            .get_mut(id.index())
            .ok_or(ContractError::UnknownAbility {
                unit: owner,
                ability: id,
            })
    }

    pub fn find(&self, label: &str) -> Option<AbilityId> {
        self.by_label.get(label).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ability> {
        self.abilities.iter()
    }

    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }

    pub fn active_dots(&self) -> usize {
        self.abilities
            .iter()
            .flat_map(|a| a.dots.iter())
            .filter(|d| d.active)
            .count()
    }

    pub(crate) fn reset(&mut self) {
        for ability in &mut self.abilities {
            ability.reset();
        }
    }
}
