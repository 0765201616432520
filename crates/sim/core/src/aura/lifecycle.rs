use std::sync::Arc;

use tracing::trace;

use crate::ability::HitEvent;
use crate::error::{ContractError, SimResult};
use crate::ids::{AuraId, AuraRef, CastContext, UnitId};
use crate::sim::{SimEvent, Simulation, TraceKind};
use crate::time::SimTime;

use super::AuraConfig;

/// Which observer list a hit is dispatched to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HitPoint {
    Dealt,
    Taken,
    PeriodicDealt,
}

impl Simulation {
    /// Arms `aura`, or refreshes it if already active.
    ///
    /// A fresh activation sets `expires_at = now + duration` and fires
    /// `on_gain`. A refresh re-arms expiry from `now` and fires only
    /// `on_refresh`; stacks are left untouched.
    pub fn activate_aura(&mut self, aura: AuraRef) -> SimResult<()> {
        self.ensure_finalized("aura activation")?;
        let now = self.now();
        let config = self.aura_config(aura)?;
        let expires_at = match config.duration {
            Some(duration) if !config.permanent => now + duration,
            _ => SimTime::NEVER,
        };

        let state = *self.unit(aura.unit)?.auras.get(aura.aura)?.state();
        if let Some(handle) = state.expire_handle {
            self.scheduler.cancel(handle);
        }
        let expire_handle = if expires_at.is_never() {
            None
        } else {
            Some(
                self.scheduler
                    .schedule(expires_at, SimEvent::AuraExpire(aura))?,
            )
        };

        let refreshed = state.active;
        {
            let entry = self.unit_mut(aura.unit)?.auras.get_mut(aura.aura)?;
            entry.state.expires_at = expires_at;
            entry.state.expire_handle = expire_handle;
            if !refreshed {
                entry.state.active = true;
                entry.state.stacks = 0;
                entry.state.gained_at = now;
            }
        }

        if refreshed {
            trace!(unit = %aura.unit, label = %config.label, %expires_at, "aura refreshed");
            self.trace.record(now, aura.unit, TraceKind::AuraRefresh, aura.aura.0 as u64);
            for hook in &config.hooks.on_refresh {
                hook(self, aura)?;
            }
        } else {
            trace!(unit = %aura.unit, label = %config.label, %expires_at, "aura gained");
            self.trace.record(now, aura.unit, TraceKind::AuraGain, aura.aura.0 as u64);
            self.metrics.record_aura_gain(aura);
            for hook in &config.hooks.on_gain {
                hook(self, aura)?;
            }
        }
        Ok(())
    }

    /// Expires `aura` now. Returns `false` if it was not active.
    ///
    /// Remaining stacks are dropped to zero first (firing `on_stacks_change`),
    /// then the pending expiry is cancelled and `on_expire` fires.
    pub fn deactivate_aura(&mut self, aura: AuraRef) -> SimResult<bool> {
        let config = self.aura_config(aura)?;
        let state = *self.unit(aura.unit)?.auras.get(aura.aura)?.state();
        if !state.active {
            return Ok(false);
        }
        if state.stacks > 0 {
            self.apply_stacks(aura, &config, state.stacks, 0)?;
        }

        let now = self.now();
        let handle = {
            let entry = self.unit_mut(aura.unit)?.auras.get_mut(aura.aura)?;
            entry.state.active = false;
            entry.state.stacks = 0;
            entry.state.expires_at = SimTime::NEVER;
            entry.state.expire_handle.take()
        };
        if let Some(handle) = handle {
            self.scheduler.cancel(handle);
        }

        trace!(unit = %aura.unit, label = %config.label, "aura expired");
        self.trace.record(now, aura.unit, TraceKind::AuraExpire, aura.aura.0 as u64);
        self.metrics.record_aura_uptime(aura, now.since(state.gained_at));
        for hook in &config.hooks.on_expire {
            hook(self, aura)?;
        }
        Ok(true)
    }

    /// Adds one stack, saturating at the aura's maximum. Returns the new count.
    pub fn add_stack(&mut self, aura: AuraRef) -> SimResult<u32> {
        let config = self.aura_config(aura)?;
        let old = self.active_stacks(aura, "add_stack")?;
        let new = (old + 1).min(config.max_stacks);
        self.apply_stacks(aura, &config, old, new)?;
        Ok(new)
    }

    /// Removes one stack, saturating at zero. Returns the new count.
    pub fn remove_stack(&mut self, aura: AuraRef) -> SimResult<u32> {
        let config = self.aura_config(aura)?;
        let old = self.active_stacks(aura, "remove_stack")?;
        let new = old.saturating_sub(1);
        self.apply_stacks(aura, &config, old, new)?;
        Ok(new)
    }

    /// Sets the stack count. Requesting more than the maximum is a contract violation.
    pub fn set_stacks(&mut self, aura: AuraRef, stacks: u32) -> SimResult<()> {
        let config = self.aura_config(aura)?;
        if stacks > config.max_stacks {
            return Err(ContractError::StackOverflow {
                unit: aura.unit,
                aura: aura.aura,
                requested: stacks,
                max: config.max_stacks,
            });
        }
        let old = self.active_stacks(aura, "set_stacks")?;
        self.apply_stacks(aura, &config, old, stacks)
    }

    pub fn is_aura_active(&self, aura: AuraRef) -> SimResult<bool> {
        Ok(self.unit(aura.unit)?.auras.get(aura.aura)?.is_active())
    }

    pub fn aura_stacks(&self, aura: AuraRef) -> SimResult<u32> {
        Ok(self.unit(aura.unit)?.auras.get(aura.aura)?.stacks())
    }

    fn active_stacks(&self, aura: AuraRef, what: &'static str) -> SimResult<u32> {
        let entry = self.unit(aura.unit)?.auras.get(aura.aura)?;
        if !entry.is_active() {
            return Err(ContractError::AuraInactive {
                unit: aura.unit,
                aura: aura.aura,
                what,
            });
        }
        Ok(entry.stacks())
    }

    fn apply_stacks(
        &mut self,
        aura: AuraRef,
        config: &AuraConfig,
        old: u32,
        new: u32,
    ) -> SimResult<()> {
        if old == new {
            return Ok(());
        }
        self.unit_mut(aura.unit)?.auras.get_mut(aura.aura)?.state.stacks = new;
        trace!(unit = %aura.unit, label = %config.label, old, new, "aura stacks changed");
        let now = self.now();
        self.trace
            .record(now, aura.unit, TraceKind::AuraStacks, u64::from(new));
        for hook in &config.hooks.on_stacks_change {
            hook(self, aura, old, new)?;
        }
        Ok(())
    }

    fn aura_config(&self, aura: AuraRef) -> SimResult<Arc<AuraConfig>> {
        self.unit(aura.unit)?.auras.config_of(aura.aura)
    }

    /// Expiry event handler. The handle has already fired.
    pub(crate) fn on_aura_expire_event(&mut self, aura: AuraRef) -> SimResult<()> {
        self.unit_mut(aura.unit)?
            .auras
            .get_mut(aura.aura)?
            .state
            .expire_handle = None;
        self.deactivate_aura(aura)?;
        Ok(())
    }

    /// Dispatches `hit` to every active aura on `unit` observing `point`.
    pub(crate) fn notify_hit(&mut self, unit: UnitId, point: HitPoint, hit: &HitEvent) -> SimResult<()> {
        let count = self.observers(unit, point)?.len();
        for i in 0..count {
            let id = self.observers(unit, point)?[i];
            let aura = AuraRef::new(unit, id);
            let entry = self.unit(unit)?.auras.get(id)?;
            if !entry.is_active() {
                continue;
            }
            let config = Arc::clone(&entry.config);
            let hooks = match point {
                HitPoint::Dealt => &config.hooks.on_hit_dealt,
                HitPoint::Taken => &config.hooks.on_hit_taken,
                HitPoint::PeriodicDealt => &config.hooks.on_periodic_dealt,
            };
            for hook in hooks {
                hook(self, aura, hit)?;
            }
        }
        Ok(())
    }

    fn observers(&self, unit: UnitId, point: HitPoint) -> SimResult<&[AuraId]> {
        let auras = &self.unit(unit)?.auras;
        Ok(match point {
            HitPoint::Dealt => &auras.hit_dealt,
            HitPoint::Taken => &auras.hit_taken,
            HitPoint::PeriodicDealt => &auras.periodic_dealt,
        })
    }

    pub(crate) fn notify_cast_complete(&mut self, ctx: CastContext) -> SimResult<()> {
        let unit = ctx.caster();
        let count = self.unit(unit)?.auras.cast_complete.len();
        for i in 0..count {
            let id = self.unit(unit)?.auras.cast_complete[i];
            let entry = self.unit(unit)?.auras.get(id)?;
            if !entry.is_active() {
                continue;
            }
            let config = Arc::clone(&entry.config);
            for hook in &config.hooks.on_cast_complete {
                hook(self, AuraRef::new(unit, id), ctx)?;
            }
        }
        Ok(())
    }

    /// Trial start: `on_reset` hooks, then permanent auras, unit by unit.
    pub(crate) fn arm_auras_for_trial(&mut self) -> SimResult<()> {
        for index in 0..self.units.len() {
            let unit = UnitId(index as u32);
            let count = self.units[index].auras.resettable.len();
            for i in 0..count {
                let id = self.units[index].auras.resettable[i];
                let config = self.aura_config(AuraRef::new(unit, id))?;
                for hook in &config.hooks.on_reset {
                    hook(self, AuraRef::new(unit, id))?;
                }
            }
            let count = self.units[index].auras.permanent.len();
            for i in 0..count {
                let id = self.units[index].auras.permanent[i];
                self.activate_aura(AuraRef::new(unit, id))?;
            }
        }
        Ok(())
    }

    /// Trial end: expire everything still active so uptime closes out.
    pub(crate) fn expire_all_auras(&mut self) -> SimResult<()> {
        for index in 0..self.units.len() {
            let unit = UnitId(index as u32);
            for i in 0..self.units[index].auras.len() {
                self.deactivate_aura(AuraRef::new(unit, AuraId(i as u32)))?;
            }
        }
        Ok(())
    }
}
