//! The trial driver.
//!
//! [`Simulation`] owns every unit, the scheduler and the RNG. Setup happens
//! through the build APIs, [`Simulation::finalize`] freezes it, and each
//! trial is `reset(seed)` followed by the event loop up to the configured
//! duration. All state lives here; hooks receive `&mut Simulation` and reach
//! units through ids.

mod agent;
mod trace;

use tracing::{debug, error, trace};

use crate::ability::OutcomeTables;
use crate::config::SimConfig;
use crate::env::{Roster, SimRng, UnitKind};
use crate::error::{ContractError, SimError, SimResult};
use crate::ids::{AbilityId, AbilityRef, AuraRef, CastContext, DepId, TimerId, UnitId};
use crate::metrics::TrialMetrics;
use crate::resources::{PowerKind, ResourcePool};
use crate::scheduler::{EventHandle, Scheduler};
use crate::stats::{PseudoStat, Stats};
use crate::time::SimTime;
use crate::timer::Timer;
use crate::unit::Unit;

pub use agent::{Agent, PriorityAgent};
pub use trace::{EventTrace, TraceEntry, TraceKind, TraceMode};

/// Deferred closure run by the event loop.
pub type DelayedAction = Box<dyn FnOnce(&mut Simulation) -> SimResult<()> + Send>;

pub(crate) enum SimEvent {
    AuraExpire(AuraRef),
    DotTick(CastContext),
    CastComplete(UnitId),
    UnitReady(UnitId),
    Delayed { unit: UnitId, action: DelayedAction },
}

impl core::fmt::Debug for SimEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AuraExpire(aura) => f.debug_tuple("AuraExpire").field(aura).finish(),
            Self::DotTick(ctx) => f.debug_tuple("DotTick").field(ctx).finish(),
            Self::CastComplete(unit) => f.debug_tuple("CastComplete").field(unit).finish(),
            Self::UnitReady(unit) => f.debug_tuple("UnitReady").field(unit).finish(),
            Self::Delayed { unit, .. } => f.debug_struct("Delayed").field("unit", unit).finish(),
        }
    }
}

/// What a finished trial reports besides its metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrialSummary {
    pub seed: u64,
    pub duration: SimTime,
    pub events: u64,
    /// `None` when tracing is off.
    pub digest: Option<[u8; 32]>,
}

pub struct Simulation {
    pub(crate) config: SimConfig,
    pub(crate) units: Vec<Unit>,
    roster: Roster,
    pub(crate) scheduler: Scheduler<SimEvent>,
    rng: SimRng,
    pub(crate) outcomes: OutcomeTables,
    pub(crate) metrics: TrialMetrics,
    pub(crate) trace: EventTrace,
    agents: Vec<Option<Box<dyn Agent>>>,
    duration: SimTime,
    seed: u64,
    events: u64,
    finalized: bool,
}

impl core::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Simulation")
            .field("units", &self.units.len())
            .field("now", &self.now())
            .field("pending", &self.scheduler.len())
            .field("duration", &self.duration)
            .field("seed", &self.seed)
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            units: Vec::new(),
            roster: Roster::new(),
            scheduler: Scheduler::new(),
            rng: SimRng::new(0),
            outcomes: OutcomeTables::default(),
            metrics: TrialMetrics::default(),
            trace: EventTrace::new(TraceMode::default()),
            agents: Vec::new(),
            duration: SimTime::from_secs(180),
            seed: 0,
            events: 0,
            finalized: false,
        }
    }

    #[must_use]
    pub fn with_duration(mut self, duration: SimTime) -> Self {
        self.duration = duration;
        self
    }

    pub fn set_duration(&mut self, duration: SimTime) {
        self.duration = duration;
    }

    pub fn set_trace_mode(&mut self, mode: TraceMode) {
        self.trace.set_mode(mode);
    }

    // ===== queries =====

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    pub fn duration(&self) -> SimTime {
        self.duration
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, id: UnitId) -> SimResult<&Unit> {
        self.units.get(id.index()).ok_or(ContractError::UnknownUnit(id))
    }

    /// Build-phase access. Dynamic changes go through the simulation so
    /// that pools, metrics and the trace stay in step.
    pub fn unit_mut(&mut self, id: UnitId) -> SimResult<&mut Unit> {
        self.units
            .get_mut(id.index())
            .ok_or(ContractError::UnknownUnit(id))
    }

    pub fn metrics(&self) -> &TrialMetrics {
        &self.metrics
    }

    pub fn trace(&self) -> &EventTrace {
        &self.trace
    }

    pub fn outcome_tables(&self) -> &OutcomeTables {
        &self.outcomes
    }

    pub fn rng_mut(&mut self) -> &mut SimRng {
        &mut self.rng
    }

    pub fn pending_events(&self) -> usize {
        self.scheduler.len()
    }

    pub(crate) fn ensure_finalized(&self, what: &'static str) -> SimResult<()> {
        if !self.finalized {
            return Err(ContractError::NotFinalized { what });
        }
        Ok(())
    }

    fn ensure_building(&self, what: &'static str) -> SimResult<()> {
        if self.finalized {
            return Err(ContractError::AlreadyFinalized { what });
        }
        Ok(())
    }

    // ===== build phase =====

    /// Adds a unit. Companions must name an existing owner.
    pub fn add_unit(&mut self, label: impl Into<String>, kind: UnitKind, level: u32) -> SimResult<UnitId> {
        self.ensure_building("roster")?;
        if let UnitKind::Companion { owner } = kind {
            self.unit(owner)?;
        }
        if self.units.len() >= SimConfig::MAX_UNITS {
            return Err(ContractError::TooManyUnits {
                max: SimConfig::MAX_UNITS,
            });
        }
        let id = self.roster.push(kind);
        let label = label.into();
        debug!(unit = %id, %label, ?kind, level, "unit added");
        self.units.push(Unit::new(
            id,
            label,
            kind,
            level,
            self.config.max_auras_per_unit,
        ));
        self.agents.push(None);
        Ok(id)
    }

    pub fn set_agent(&mut self, unit: UnitId, agent: Box<dyn Agent>) -> SimResult<()> {
        self.ensure_building("agent")?;
        self.unit(unit)?;
        self.agents[unit.index()] = Some(agent);
        Ok(())
    }

    /// Freezes every unit and sizes the per-trial tables.
    pub fn finalize(&mut self) -> SimResult<()> {
        self.ensure_building("simulation")?;
        let count = self.units.len();
        for unit in &mut self.units {
            unit.finalize(&self.config, count)?;
        }
        self.outcomes = OutcomeTables::new(count);
        self.metrics = TrialMetrics::shaped(&self.units);
        self.finalized = true;
        debug!(units = count, duration = %self.duration, "simulation finalized");
        Ok(())
    }

    // ===== trial lifecycle =====

    /// Restores every unit to its finalize-time state and reseeds the RNG.
    pub fn reset(&mut self, seed: u64) -> SimResult<()> {
        self.ensure_finalized("reset")?;
        self.scheduler.clear();
        self.rng.reseed(seed);
        self.seed = seed;
        self.events = 0;
        self.metrics.reset();
        self.trace.reset();
        for unit in &mut self.units {
            unit.reset();
        }
        for agent in self.agents.iter_mut().flatten() {
            agent.reset();
        }
        Ok(())
    }

    /// Arms permanent auras and wakes every unit that has an agent.
    pub fn begin_trial(&mut self) -> SimResult<()> {
        self.ensure_finalized("trial start")?;
        self.arm_auras_for_trial()?;
        for index in 0..self.agents.len() {
            if self.agents[index].is_some() {
                self.schedule_ready(UnitId(index as u32), SimTime::ZERO)?;
            }
        }
        Ok(())
    }

    /// Fires every event due at or before `end`, then advances the clock to `end`.
    pub fn run_until(&mut self, end: SimTime) -> SimResult<()> {
        while let Some((at, event)) = self.scheduler.pop_next(end) {
            self.events += 1;
            self.dispatch(at, event)?;
        }
        self.scheduler.advance_to(end);
        Ok(())
    }

    /// Expires remaining auras and closes the metrics at the current time.
    pub fn finish_trial(&mut self) -> SimResult<()> {
        let now = self.now();
        self.expire_all_auras()?;
        self.metrics.set_elapsed(now);
        self.trace.record(now, UnitId(0), TraceKind::TrialEnd, self.events);
        Ok(())
    }

    /// Runs one complete trial: reset, start, event loop, finish.
    pub fn run_trial(&mut self, seed: u64) -> SimResult<TrialSummary> {
        self.reset(seed)?;
        let duration = self.duration;
        let result = self
            .begin_trial()
            .and_then(|()| self.run_until(duration))
            .and_then(|()| self.finish_trial());
        if let Err(err) = &result {
            error!(
                seed,
                now = %self.now(),
                code = err.error_code(),
                error = %err,
                "trial aborted"
            );
        }
        result?;

        let summary = TrialSummary {
            seed,
            duration,
            events: self.events,
            digest: self.trace.digest(),
        };
        debug!(seed, events = summary.events, "trial finished");
        Ok(summary)
    }

    fn dispatch(&mut self, at: SimTime, event: SimEvent) -> SimResult<()> {
        trace!(%at, ?event, "dispatch");
        match event {
            SimEvent::AuraExpire(aura) => self.on_aura_expire_event(aura),
            SimEvent::DotTick(ctx) => self.on_dot_tick(ctx),
            SimEvent::CastComplete(unit) => self.on_cast_complete_event(unit),
            SimEvent::UnitReady(unit) => self.on_unit_ready(unit),
            SimEvent::Delayed { unit, action } => {
                self.trace.record(at, unit, TraceKind::Action, 0);
                action(self)
            }
        }
    }

    // ===== agents & readiness =====

    /// (Re)schedules the unit's ready event at `at`, or later if the unit is busy.
    pub(crate) fn schedule_ready(&mut self, unit: UnitId, at: SimTime) -> SimResult<()> {
        let now = self.now();
        let (at, previous) = {
            let entry = self.unit_mut(unit)?;
            (at.max(now).max(entry.ready_at()), entry.ready_handle.take())
        };
        if let Some(handle) = previous {
            self.scheduler.cancel(handle);
        }
        let handle = self.scheduler.schedule(at, SimEvent::UnitReady(unit))?;
        self.unit_mut(unit)?.ready_handle = Some(handle);
        Ok(())
    }

    /// Asks the unit's agent to act again at `at`.
    pub fn wait_until(&mut self, unit: UnitId, at: SimTime) -> SimResult<()> {
        self.ensure_finalized("wait")?;
        self.schedule_ready(unit, at)
    }

    fn on_unit_ready(&mut self, unit: UnitId) -> SimResult<()> {
        self.unit_mut(unit)?.ready_handle = None;
        let now = self.now();
        let ready_at = self.unit(unit)?.ready_at();
        if ready_at > now {
            return self.schedule_ready(unit, ready_at);
        }
        self.trace.record(now, unit, TraceKind::UnitReady, 0);

        // the agent is out of its slot while it runs
        let Some(mut agent) = self.agents[unit.index()].take() else {
            return Ok(());
        };
        let result = agent.on_ready(self, unit);
        self.agents[unit.index()] = Some(agent);
        result
    }

    // ===== scheduled actions =====

    /// Runs `action` at `at`, attributed to `unit` in the trace.
    pub fn schedule_action(
        &mut self,
        unit: UnitId,
        at: SimTime,
        action: impl FnOnce(&mut Simulation) -> SimResult<()> + Send + 'static,
    ) -> SimResult<EventHandle> {
        self.ensure_finalized("scheduled action")?;
        self.unit(unit)?;
        self.scheduler.schedule(
            at,
            SimEvent::Delayed {
                unit,
                action: Box::new(action),
            },
        )
    }

    /// Returns `false` if the action already ran or was cancelled.
    pub fn cancel_action(&mut self, handle: EventHandle) -> bool {
        self.scheduler.cancel(handle)
    }

    // ===== targets =====

    pub fn target_of(&self, unit: UnitId) -> SimResult<Option<UnitId>> {
        Ok(self.unit(unit)?.target())
    }

    pub fn set_target(&mut self, unit: UnitId, target: Option<UnitId>) -> SimResult<()> {
        if let Some(target) = target {
            self.unit(target)?;
        }
        self.unit_mut(unit)?.set_target(target);
        Ok(())
    }

    pub fn opponents_of(&self, unit: UnitId) -> impl Iterator<Item = UnitId> + '_ {
        self.roster.opponents_of(unit)
    }

    // ===== timers =====

    pub fn timer(&self, unit: UnitId, timer: TimerId) -> SimResult<&Timer> {
        self.unit(unit)?.timers.get(timer)
    }

    pub fn use_timer(&mut self, unit: UnitId, timer: TimerId, duration: SimTime) -> SimResult<()> {
        let now = self.now();
        self.unit_mut(unit)?.timers.get_mut(timer)?.use_for(now, duration);
        Ok(())
    }

    // ===== dynamic stats =====

    /// Adds `bonus` to the unit's raw stats mid-trial and returns the
    /// change in derived stats. Dependent pools follow.
    pub fn add_stats_dynamic(&mut self, unit: UnitId, bonus: &Stats) -> SimResult<Stats> {
        self.ensure_finalized("dynamic stat change")?;
        let delta = self.unit_mut(unit)?.add_stats_dynamic(bonus)?;
        self.after_stat_change(unit, &delta)?;
        Ok(delta)
    }

    pub fn enable_dynamic_dep(&mut self, unit: UnitId, dep: DepId) -> SimResult<bool> {
        self.ensure_finalized("dynamic stat dependency")?;
        match self.unit_mut(unit)?.enable_dynamic_dep(dep)? {
            Some(delta) => self.after_stat_change(unit, &delta).map(|()| true),
            None => Ok(false),
        }
    }

    pub fn disable_dynamic_dep(&mut self, unit: UnitId, dep: DepId) -> SimResult<bool> {
        self.ensure_finalized("dynamic stat dependency")?;
        match self.unit_mut(unit)?.disable_dynamic_dep(dep)? {
            Some(delta) => self.after_stat_change(unit, &delta).map(|()| true),
            None => Ok(false),
        }
    }

    fn after_stat_change(&mut self, unit: UnitId, delta: &Stats) -> SimResult<()> {
        if delta.is_zero() {
            return Ok(());
        }
        let now = self.now();
        let config = &self.config;
        self.units
            .get_mut(unit.index())
            .ok_or(ContractError::UnknownUnit(unit))?
            .sync_pools(now, delta, config);
        trace!(%unit, %delta, "stats changed");
        self.trace
            .record(now, unit, TraceKind::StatChange, delta.iter_nonzero().count() as u64);
        Ok(())
    }

    /// Multiplies one pseudo-stat by `factor`.
    pub fn multiply_pseudo(&mut self, unit: UnitId, which: PseudoStat, factor: f64) -> SimResult<()> {
        *self.unit_mut(unit)?.pseudo_dynamic()?.get_mut(which) *= factor;
        Ok(())
    }

    /// Adds `amount` to one pseudo-stat.
    pub fn add_pseudo(&mut self, unit: UnitId, which: PseudoStat, amount: f64) -> SimResult<()> {
        *self.unit_mut(unit)?.pseudo_dynamic()?.get_mut(which) += amount;
        Ok(())
    }

    pub fn multiply_cast_speed(&mut self, unit: UnitId, factor: f64) -> SimResult<()> {
        self.multiply_pseudo(unit, PseudoStat::CastSpeed, factor)
    }

    pub fn multiply_attack_speed(&mut self, unit: UnitId, factor: f64) -> SimResult<()> {
        self.multiply_pseudo(unit, PseudoStat::AttackSpeed, factor)
    }

    // ===== resources =====

    pub(crate) fn pool_mut(&mut self, unit: UnitId, kind: PowerKind) -> SimResult<&mut ResourcePool> {
        self.unit_mut(unit)?
            .pool_mut(kind)
            .ok_or(ContractError::MissingPool { unit, kind })
    }

    /// Current value of the pool, settled to now.
    pub fn power(&mut self, unit: UnitId, kind: PowerKind) -> SimResult<f64> {
        let now = self.now();
        Ok(self.pool_mut(unit, kind)?.current(now))
    }

    pub fn time_until_power(&mut self, unit: UnitId, kind: PowerKind, amount: f64) -> SimResult<Option<SimTime>> {
        let now = self.now();
        Ok(self.pool_mut(unit, kind)?.time_until(now, amount))
    }

    /// Adds to the pool, clamped at its max. Returns the amount actually gained.
    pub fn gain_power(&mut self, unit: UnitId, kind: PowerKind, amount: f64) -> SimResult<f64> {
        self.ensure_finalized("resource gain")?;
        let now = self.now();
        let gained = self.pool_mut(unit, kind)?.gain(now, amount);
        self.metrics.record_gain(unit, kind, gained);
        Ok(gained)
    }

    /// Fails with [`ContractError::InsufficientResource`]; callers that
    /// expect to be refused check [`can_afford`](crate::resources::ResourcePool::can_afford) first.
    pub fn spend_power(&mut self, unit: UnitId, kind: PowerKind, amount: f64) -> SimResult<()> {
        self.spend_for(unit, kind, amount, None)
    }

    pub(crate) fn spend_for(
        &mut self,
        unit: UnitId,
        kind: PowerKind,
        amount: f64,
        ability: Option<AbilityId>,
    ) -> SimResult<()> {
        self.ensure_finalized("resource spend")?;
        let now = self.now();
        self.pool_mut(unit, kind)?.spend(now, amount, unit)?;
        self.metrics.record_spend(
            unit,
            kind,
            amount,
            ability.map(|ability| AbilityRef::new(unit, ability)),
        );
        Ok(())
    }
}
