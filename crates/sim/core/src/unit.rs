//! Per-combatant state.
//!
//! A [`Unit`] is built once (static APIs), frozen by finalize, and then
//! reset to that frozen baseline before every trial. Static mutators fail
//! after finalize and dynamic mutators fail before it; neither silently
//! falls back to the other.

use strum::EnumCount;
use tracing::trace;

use crate::ability::{AbilityConfig, CastCategory, Spellbook};
use crate::aura::{AuraConfig, AuraTracker, ProcTriggerConfig};
use crate::config::SimConfig;
use crate::env::UnitKind;
use crate::error::{ContractError, SimResult};
use crate::ids::{AbilityId, AuraId, CastContext, DepId, TimerId, UnitId};
use crate::resources::{PowerKind, ResourcePool};
use crate::scheduler::EventHandle;
use crate::stats::{PseudoStats, Stat, StatDependency, StatDependencyManager, Stats};
use crate::time::SimTime;
use crate::timer::{Timer, TimerRegistry};

/// The one non-instant cast a unit may have in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Hardcast {
    pub ctx: CastContext,
    pub ends_at: SimTime,
    pub handle: EventHandle,
}

/// A channeled periodic effect occupying the unit until its last tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Channel {
    pub ctx: CastContext,
    pub ends_at: SimTime,
}

/// Comparable view of everything a reset must restore.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitSnapshot {
    pub stats: Stats,
    pub stats_without_deps: Stats,
    pub pseudo: PseudoStats,
    pub dependencies: Vec<bool>,
    /// `(active, stacks, expires_at)` per aura.
    pub auras: Vec<(bool, u32, SimTime)>,
    pub timers: Vec<SimTime>,
    /// `(kind, current, max, rate)` per pool.
    pub pools: Vec<(PowerKind, f64, f64, f64)>,
    pub casting: bool,
    pub channeling: bool,
    pub active_dots: usize,
    pub target: Option<UnitId>,
}

#[derive(Debug)]
pub struct Unit {
    id: UnitId,
    label: String,
    kind: UnitKind,
    level: u32,

    stats_without_deps: Stats,
    stats: Stats,
    initial_stats_without_deps: Stats,
    initial_stats: Stats,
    pub(crate) deps: StatDependencyManager,

    pseudo: PseudoStats,
    initial_pseudo: PseudoStats,

    power_specs: Vec<(PowerKind, Option<f64>)>,
    pools: [Option<ResourcePool>; PowerKind::COUNT],

    pub(crate) auras: AuraTracker,
    pub(crate) spellbook: Spellbook,
    pub(crate) timers: TimerRegistry,
    gcd: TimerId,

    pub(crate) hardcast: Option<Hardcast>,
    pub(crate) channel: Option<Channel>,
    pub(crate) ready_handle: Option<EventHandle>,

    target: Option<UnitId>,
    default_target: Option<UnitId>,

    aura_limit: usize,
    finalized: bool,
}

impl Unit {
    pub(crate) fn new(id: UnitId, label: String, kind: UnitKind, level: u32, aura_limit: usize) -> Self {
        let mut timers = TimerRegistry::new(id);
        let gcd = timers.new_timer();
        Self {
            id,
            label,
            kind,
            level,
            stats_without_deps: Stats::new(),
            stats: Stats::new(),
            initial_stats_without_deps: Stats::new(),
            initial_stats: Stats::new(),
            deps: StatDependencyManager::new(id),
            pseudo: PseudoStats::new(),
            initial_pseudo: PseudoStats::new(),
            power_specs: Vec::new(),
            pools: Default::default(),
            auras: AuraTracker::new(id),
            spellbook: Spellbook::new(id),
            timers,
            gcd,
            hardcast: None,
            channel: None,
            ready_handle: None,
            target: None,
            default_target: None,
            aura_limit,
            finalized: false,
        }
    }

    // ===== identity & queries =====

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn stat(&self, stat: Stat) -> f64 {
        self.stats[stat]
    }

    pub fn stats_without_deps(&self) -> &Stats {
        &self.stats_without_deps
    }

    pub fn initial_stats(&self) -> &Stats {
        &self.initial_stats
    }

    pub fn initial_stat(&self, stat: Stat) -> f64 {
        self.initial_stats[stat]
    }

    /// True while something temporary moves `stat` away from its frozen value.
    pub fn has_temporary_bonus(&self, stat: Stat) -> bool {
        self.initial_stats[stat] != self.stats[stat]
    }

    pub fn pseudo(&self) -> &PseudoStats {
        &self.pseudo
    }

    pub fn initial_pseudo(&self) -> &PseudoStats {
        &self.initial_pseudo
    }

    pub fn dependencies(&self) -> &StatDependencyManager {
        &self.deps
    }

    pub fn auras(&self) -> &AuraTracker {
        &self.auras
    }

    pub fn spellbook(&self) -> &Spellbook {
        &self.spellbook
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    pub fn gcd_timer(&self) -> TimerId {
        self.gcd
    }

    pub(crate) fn gcd(&self) -> &Timer {
        // created in `new`, never removed
        &self.timers.as_slice()[self.gcd.index()]
    }

    pub fn pool(&self, kind: PowerKind) -> Option<&ResourcePool> {
        self.pools[kind.index()].as_ref()
    }

    pub(crate) fn pool_mut(&mut self, kind: PowerKind) -> Option<&mut ResourcePool> {
        self.pools[kind.index()].as_mut()
    }

    pub fn target(&self) -> Option<UnitId> {
        self.target
    }

    pub fn set_target(&mut self, target: Option<UnitId>) {
        self.target = target;
    }

    pub fn is_casting(&self) -> bool {
        self.hardcast.is_some()
    }

    pub fn is_channeling(&self) -> bool {
        self.channel.is_some()
    }

    /// Earliest time the unit can start a GCD-bound cast.
    pub fn ready_at(&self) -> SimTime {
        let mut at = self.gcd().ready_at();
        if let Some(hardcast) = &self.hardcast {
            at = at.max(hardcast.ends_at);
        }
        if let Some(channel) = &self.channel {
            at = at.max(channel.ends_at);
        }
        at
    }

    /// Divisor applied to cast times and GCDs:
    /// `cast_speed_multiplier × (1 + haste% / 100)`.
    pub fn cast_speed(&self, category: CastCategory) -> f64 {
        let haste = match category {
            CastCategory::Spell => self.stats[Stat::SpellHaste],
            CastCategory::Melee | CastCategory::Ranged => self.stats[Stat::MeleeHaste],
        };
        self.pseudo.cast_speed_multiplier * (1.0 + haste / 100.0)
    }

    /// `duration` scaled by [`cast_speed`](Self::cast_speed).
    pub fn apply_cast_speed(&self, duration: SimTime, category: CastCategory) -> SimTime {
        duration.scale(1.0 / self.cast_speed(category))
    }

    // ===== build phase =====

    fn ensure_building(&self, what: &'static str) -> SimResult<()> {
        if self.finalized {
            return Err(ContractError::AlreadyFinalized { what });
        }
        Ok(())
    }

    pub fn add_stats(&mut self, bonus: &Stats) -> SimResult<()> {
        self.ensure_building("unit stats")?;
        self.stats_without_deps.add_inplace(bonus);
        Ok(())
    }

    pub fn add_stat(&mut self, stat: Stat, amount: f64) -> SimResult<()> {
        self.ensure_building("unit stats")?;
        self.stats_without_deps[stat] += amount;
        Ok(())
    }

    pub fn register_dependency(&mut self, dep: StatDependency) -> SimResult<DepId> {
        self.deps.register(dep)
    }

    pub fn register_dynamic_dependency(&mut self, dep: StatDependency) -> SimResult<DepId> {
        self.deps.register_dynamic(dep)
    }

    /// Baseline pseudo-stats, editable until finalize.
    pub fn pseudo_mut(&mut self) -> SimResult<&mut PseudoStats> {
        self.ensure_building("pseudo stats")?;
        Ok(&mut self.pseudo)
    }

    /// Gives the unit a pool of `kind`. `starting` defaults to full
    /// (empty for Rage).
    pub fn enable_power(&mut self, kind: PowerKind, starting: Option<f64>) -> SimResult<()> {
        self.ensure_building("resource pools")?;
        self.power_specs.retain(|(k, _)| *k != kind);
        self.power_specs.push((kind, starting));
        Ok(())
    }

    pub fn new_timer(&mut self) -> SimResult<TimerId> {
        self.ensure_building("timers")?;
        Ok(self.timers.new_timer())
    }

    pub fn register_aura(&mut self, config: AuraConfig) -> SimResult<AuraId> {
        self.ensure_building("auras")?;
        self.auras.register(config, self.aura_limit)
    }

    /// Registers a chance-on-hit trigger as a permanent aura.
    pub fn register_proc_trigger(&mut self, config: ProcTriggerConfig) -> SimResult<AuraId> {
        self.ensure_building("auras")?;
        let icd_timer = match config.icd {
            Some(_) => Some(self.timers.new_timer()),
            None => None,
        };
        self.auras.register(config.into_aura(icd_timer), self.aura_limit)
    }

    pub fn register_ability(&mut self, config: AbilityConfig) -> SimResult<AbilityId> {
        self.ensure_building("spellbook")?;
        let cooldown = match config.cast.shared_cooldown {
            Some(shared) => {
                self.timers.get(shared)?;
                shared
            }
            None => self.timers.new_timer(),
        };
        Ok(self.spellbook.register(config, cooldown))
    }

    pub fn set_default_target(&mut self, target: UnitId) -> SimResult<()> {
        self.ensure_building("default target")?;
        self.default_target = Some(target);
        self.target = Some(target);
        Ok(())
    }

    // ===== finalize / reset =====

    pub(crate) fn finalize(&mut self, config: &SimConfig, units: usize) -> SimResult<()> {
        self.ensure_building("unit")?;
        self.deps.finalize()?;

        self.stats = self.deps.apply(&self.stats_without_deps);
        self.initial_stats_without_deps = self.stats_without_deps;
        self.initial_stats = self.stats;
        self.initial_pseudo = self.pseudo;

        let health = self.stats[Stat::Health];
        self.pools[PowerKind::Health.index()] =
            Some(ResourcePool::new(PowerKind::Health, health, 0.0));
        for &(kind, starting) in &self.power_specs {
            let (max, rate) = match kind {
                PowerKind::Health => (health, 0.0),
                PowerKind::Mana => (self.stats[Stat::Mana], mana_regen(&self.stats, config)),
                PowerKind::Energy => (config.max_energy, config.energy_regen_per_sec),
                PowerKind::Rage => (config.max_rage, -config.rage_decay_per_sec),
                PowerKind::Focus => (config.max_focus, config.focus_regen_per_sec),
            };
            let current = starting.unwrap_or(if kind == PowerKind::Rage { 0.0 } else { max });
            self.pools[kind.index()] = Some(ResourcePool::with_current(kind, current, max, rate));
        }
        for pool in self.pools.iter_mut().flatten() {
            pool.finalize();
        }

        self.spellbook.allocate_dots(units);
        self.finalized = true;
        trace!(unit = %self.id, label = %self.label, stats = %self.initial_stats, "unit finalized");
        Ok(())
    }

    /// Restores the finalize-time baseline. Auras go inactive before the
    /// spellbook is reset. Pending events must already be dropped.
    pub(crate) fn reset(&mut self) {
        self.timers.reset();
        self.hardcast = None;
        self.channel = None;
        self.ready_handle = None;

        self.deps.reset();
        self.stats_without_deps = self.initial_stats_without_deps;
        self.stats = self.initial_stats;
        self.pseudo = self.initial_pseudo;

        self.auras.reset();
        self.spellbook.reset();
        for pool in self.pools.iter_mut().flatten() {
            pool.reset();
        }
        self.target = self.default_target;
    }

    // ===== dynamic phase =====

    fn ensure_finalized(&self, what: &'static str) -> SimResult<()> {
        if !self.finalized {
            return Err(ContractError::NotFinalized { what });
        }
        Ok(())
    }

    /// Adds `bonus` to raw stats and recomputes derived stats.
    /// Returns the change in derived stats.
    pub(crate) fn add_stats_dynamic(&mut self, bonus: &Stats) -> SimResult<Stats> {
        self.ensure_finalized("dynamic stat change")?;
        self.stats_without_deps.add_inplace(bonus);
        Ok(self.recompute())
    }

    /// Returns the derived-stat delta, or `None` if the rule was already enabled.
    pub(crate) fn enable_dynamic_dep(&mut self, dep: DepId) -> SimResult<Option<Stats>> {
        self.ensure_finalized("dynamic stat dependency")?;
        Ok(self.deps.enable_dynamic(dep)?.then(|| self.recompute()))
    }

    pub(crate) fn disable_dynamic_dep(&mut self, dep: DepId) -> SimResult<Option<Stats>> {
        self.ensure_finalized("dynamic stat dependency")?;
        Ok(self.deps.disable_dynamic(dep)?.then(|| self.recompute()))
    }

    pub(crate) fn pseudo_dynamic(&mut self) -> SimResult<&mut PseudoStats> {
        self.ensure_finalized("dynamic pseudo stat change")?;
        Ok(&mut self.pseudo)
    }

    fn recompute(&mut self) -> Stats {
        let old = self.stats;
        self.stats = self.deps.apply(&self.stats_without_deps);
        self.stats.subtract(&old)
    }

    /// Pushes stat changes into the pools that derive from them.
    pub(crate) fn sync_pools(&mut self, now: SimTime, delta: &Stats, config: &SimConfig) {
        if delta[Stat::Health] != 0.0 {
            let max = self.stats[Stat::Health];
            if let Some(pool) = self.pool_mut(PowerKind::Health) {
                pool.set_max(now, max);
            }
        }
        if delta[Stat::Mana] != 0.0 || delta[Stat::Mp5] != 0.0 || delta[Stat::Spirit] != 0.0 {
            let max = self.stats[Stat::Mana];
            let rate = mana_regen(&self.stats, config);
            if let Some(pool) = self.pool_mut(PowerKind::Mana) {
                pool.set_max(now, max);
                pool.set_rate(now, rate);
            }
        }
    }

    pub fn snapshot(&self) -> UnitSnapshot {
        UnitSnapshot {
            stats: self.stats,
            stats_without_deps: self.stats_without_deps,
            pseudo: self.pseudo,
            dependencies: (0..self.deps.len())
                .map(|i| self.deps.is_enabled(DepId(i as u32)).unwrap_or(false))
                .collect(),
            auras: self
                .auras
                .iter()
                .map(|a| (a.is_active(), a.stacks(), a.state().expires_at))
                .collect(),
            timers: self.timers.as_slice().iter().map(Timer::ready_at).collect(),
            pools: self
                .pools
                .iter()
                .flatten()
                .map(|p| (p.kind(), p.peek(), p.max(), p.rate()))
                .collect(),
            casting: self.is_casting(),
            channeling: self.is_channeling(),
            active_dots: self.spellbook.active_dots(),
            target: self.target,
        }
    }
}

/// Mana per second from Mp5 and Spirit.
fn mana_regen(stats: &Stats, config: &SimConfig) -> f64 {
    stats[Stat::Mp5] / 5.0 + stats[Stat::Spirit] * config.mana_per_spirit_per_sec
}
