//! Timed modifiers.
//!
//! An aura is registered once during the build phase with an [`AuraConfig`]
//! and is then armed, refreshed, stacked and expired by the lifecycle
//! methods on [`Simulation`](crate::Simulation). Between trials every aura
//! returns to inactive without reallocating.

mod effects;
mod lifecycle;
mod proc;

use std::collections::HashMap;
use std::sync::Arc;

use crate::ability::HitEvent;
use crate::error::{ContractError, SimResult};
use crate::ids::{AuraId, AuraRef, CastContext, UnitId};
use crate::scheduler::EventHandle;
use crate::sim::Simulation;
use crate::time::SimTime;

pub use effects::{stacking_multiplier_aura, stat_bonus_aura};
pub use proc::{CategoryMask, OutcomeMask, ProcHandler, ProcTriggerConfig};
pub(crate) use lifecycle::HitPoint;

/// Fired on gain, expire, refresh and per-trial reset.
pub type AuraHook = Arc<dyn Fn(&mut Simulation, AuraRef) -> SimResult<()> + Send + Sync>;
/// Fired with `(old, new)` stack counts.
pub type StacksHook = Arc<dyn Fn(&mut Simulation, AuraRef, u32, u32) -> SimResult<()> + Send + Sync>;
/// Fired when the aura's owner lands, takes or ticks a hit.
pub type HitHook = Arc<dyn Fn(&mut Simulation, AuraRef, &HitEvent) -> SimResult<()> + Send + Sync>;
/// Fired after the aura's owner completes a cast.
pub type CastHook = Arc<dyn Fn(&mut Simulation, AuraRef, CastContext) -> SimResult<()> + Send + Sync>;

/// Lifecycle hook points. Each point runs its hooks in registration order.
#[derive(Clone, Default)]
pub struct AuraHooks {
    pub on_gain: Vec<AuraHook>,
    pub on_expire: Vec<AuraHook>,
    pub on_refresh: Vec<AuraHook>,
    pub on_reset: Vec<AuraHook>,
    pub on_stacks_change: Vec<StacksHook>,
    pub on_hit_dealt: Vec<HitHook>,
    pub on_hit_taken: Vec<HitHook>,
    pub on_periodic_dealt: Vec<HitHook>,
    pub on_cast_complete: Vec<CastHook>,
}

impl core::fmt::Debug for AuraHooks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuraHooks")
            .field("on_gain", &self.on_gain.len())
            .field("on_expire", &self.on_expire.len())
            .field("on_refresh", &self.on_refresh.len())
            .field("on_reset", &self.on_reset.len())
            .field("on_stacks_change", &self.on_stacks_change.len())
            .field("on_hit_dealt", &self.on_hit_dealt.len())
            .field("on_hit_taken", &self.on_hit_taken.len())
            .field("on_periodic_dealt", &self.on_periodic_dealt.len())
            .field("on_cast_complete", &self.on_cast_complete.len())
            .finish()
    }
}

/// Declarative description of an aura.
#[derive(Clone, Debug)]
pub struct AuraConfig {
    pub label: String,
    /// `None` lasts until explicitly deactivated.
    pub duration: Option<SimTime>,
    /// Zero means the aura does not stack.
    pub max_stacks: u32,
    /// Activated at the start of every trial and never expires on its own.
    pub permanent: bool,
    pub hooks: AuraHooks,
}

impl AuraConfig {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            duration: None,
            max_stacks: 0,
            permanent: false,
            hooks: AuraHooks::default(),
        }
    }

    #[must_use]
    pub fn with_duration(mut self, duration: SimTime) -> Self {
        self.duration = Some(duration);
        self
    }

    #[must_use]
    pub fn with_max_stacks(mut self, max_stacks: u32) -> Self {
        self.max_stacks = max_stacks;
        self
    }

    #[must_use]
    pub fn permanent(mut self) -> Self {
        self.permanent = true;
        self.duration = None;
        self
    }

    #[must_use]
    pub fn on_gain(
        mut self,
        hook: impl Fn(&mut Simulation, AuraRef) -> SimResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_gain.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_expire(
        mut self,
        hook: impl Fn(&mut Simulation, AuraRef) -> SimResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_expire.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_refresh(
        mut self,
        hook: impl Fn(&mut Simulation, AuraRef) -> SimResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_refresh.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_reset(
        mut self,
        hook: impl Fn(&mut Simulation, AuraRef) -> SimResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_reset.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_stacks_change(
        mut self,
        hook: impl Fn(&mut Simulation, AuraRef, u32, u32) -> SimResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_stacks_change.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_hit_dealt(
        mut self,
        hook: impl Fn(&mut Simulation, AuraRef, &HitEvent) -> SimResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_hit_dealt.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_hit_taken(
        mut self,
        hook: impl Fn(&mut Simulation, AuraRef, &HitEvent) -> SimResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_hit_taken.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_periodic_dealt(
        mut self,
        hook: impl Fn(&mut Simulation, AuraRef, &HitEvent) -> SimResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_periodic_dealt.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_cast_complete(
        mut self,
        hook: impl Fn(&mut Simulation, AuraRef, CastContext) -> SimResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_cast_complete.push(Arc::new(hook));
        self
    }
}

/// Per-trial mutable state of one aura.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AuraState {
    pub active: bool,
    pub stacks: u32,
    pub gained_at: SimTime,
    /// [`SimTime::NEVER`] when the aura has no duration.
    pub expires_at: SimTime,
    pub(crate) expire_handle: Option<EventHandle>,
}

#[derive(Debug)]
pub struct Aura {
    id: AuraId,
    config: Arc<AuraConfig>,
    state: AuraState,
}

impl Aura {
    pub fn id(&self) -> AuraId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    pub fn config(&self) -> &AuraConfig {
        &self.config
    }

    pub fn state(&self) -> &AuraState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn stacks(&self) -> u32 {
        self.state.stacks
    }

    /// Time left before expiry; zero when inactive.
    pub fn remaining(&self, now: SimTime) -> SimTime {
        if !self.state.active {
            return SimTime::ZERO;
        }
        self.state.expires_at.since(now)
    }
}

/// Every aura registered on one unit, plus observer indexes per hit hook point.
#[derive(Debug)]
pub struct AuraTracker {
    owner: UnitId,
    auras: Vec<Aura>,
    by_label: HashMap<String, AuraId>,
    pub(crate) hit_dealt: Vec<AuraId>,
    pub(crate) hit_taken: Vec<AuraId>,
    pub(crate) periodic_dealt: Vec<AuraId>,
    pub(crate) cast_complete: Vec<AuraId>,
    pub(crate) permanent: Vec<AuraId>,
    pub(crate) resettable: Vec<AuraId>,
}

impl AuraTracker {
    pub fn new(owner: UnitId) -> Self {
        Self {
            owner,
            auras: Vec::new(),
            by_label: HashMap::new(),
            hit_dealt: Vec::new(),
            hit_taken: Vec::new(),
            periodic_dealt: Vec::new(),
            cast_complete: Vec::new(),
            permanent: Vec::new(),
            resettable: Vec::new(),
        }
    }

    pub(crate) fn register(&mut self, config: AuraConfig, limit: usize) -> SimResult<AuraId> {
        if self.by_label.contains_key(&config.label) {
            return Err(ContractError::DuplicateAuraLabel {
                unit: self.owner,
                label: config.label,
            });
        }
        if self.auras.len() >= limit {
            return Err(ContractError::TooManyAuras {
                unit: self.owner,
                max: limit,
            });
        }

        let id = AuraId(self.auras.len() as u32);
        let hooks = &config.hooks;
        if !hooks.on_hit_dealt.is_empty() {
            self.hit_dealt.push(id);
        }
        if !hooks.on_hit_taken.is_empty() {
            self.hit_taken.push(id);
        }
        if !hooks.on_periodic_dealt.is_empty() {
            self.periodic_dealt.push(id);
        }
        if !hooks.on_cast_complete.is_empty() {
            self.cast_complete.push(id);
        }
        if !hooks.on_reset.is_empty() {
            self.resettable.push(id);
        }
        if config.permanent {
            self.permanent.push(id);
        }

        self.by_label.insert(config.label.clone(), id);
        self.auras.push(Aura {
            id,
            config: Arc::new(config),
            state: AuraState {
                expires_at: SimTime::NEVER,
                ..AuraState::default()
            },
        });
        Ok(id)
    }

    pub fn get(&self, id: AuraId) -> SimResult<&Aura> {
        self.auras.get(id.index()).ok_or(ContractError::UnknownAura {
            unit: self.owner,
            aura: id,
        })
    }

    pub(crate) fn get_mut(&mut self, id: AuraId) -> SimResult<&mut Aura> {
        let owner = self.owner;
        self.auras
            .get_mut(id.index())
            .ok_or(ContractError::UnknownAura {
                unit: owner,
                aura: id,
            })
    }

    pub(crate) fn config_of(&self, id: AuraId) -> SimResult<Arc<AuraConfig>> {
        self.get(id).map(|a| Arc::clone(&a.config))
    }

    pub fn find(&self, label: &str) -> Option<AuraId> {
        self.by_label.get(label).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Aura> {
        self.auras.iter()
    }

    pub fn len(&self) -> usize {
        self.auras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.auras.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.auras.iter().filter(|a| a.state.active).count()
    }

    /// Returns every aura to inactive without firing hooks. Pending expiry
    /// events must already have been dropped by clearing the scheduler.
    pub(crate) fn reset(&mut self) {
        for aura in &mut self.auras {
            aura.state = AuraState {
                expires_at: SimTime::NEVER,
                ..AuraState::default()
            };
        }
    }
}
