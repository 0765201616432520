//! Periodic effects.
//!
//! One [`DotState`](super::DotState) per (ability, target). Re-applying
//! overwrites the running effect: pending ticks are cancelled and the
//! schedule restarts from now. Tick `n` of an application lands at
//! `applied_at + n * interval`, so a delayed event never drifts the rest
//! of the schedule.

use tracing::trace;

use crate::error::{ContractError, SimResult};
use crate::ids::CastContext;
use crate::sim::{SimEvent, Simulation, TraceKind};
use crate::time::SimTime;
use crate::unit::Channel;

use super::{AbilityFlags, CastPhase, DotState, SnapshotPolicy};

impl Simulation {
    /// Starts (or restarts) the periodic effect of `ctx` on its target.
    pub fn apply_dot(&mut self, ctx: CastContext) -> SimResult<()> {
        let caster = ctx.caster();
        let config = self.ability_config(ctx)?;
        let Some(dot) = &config.dot else {
            return Err(ContractError::NoPeriodicEffect {
                unit: caster,
                ability: ctx.ability.ability,
            });
        };
        let interval = if dot.haste_affects {
            self.unit(caster)?
                .apply_cast_speed(dot.tick_interval, config.category)
        } else {
            dot.tick_interval
        };
        if interval <= SimTime::ZERO {
            return Err(ContractError::NonPositiveTickInterval {
                label: dot.label.clone(),
            });
        }
        if dot.ticks == 0 {
            return Err(ContractError::ZeroTickCount {
                label: dot.label.clone(),
            });
        }

        let now = self.now();
        let snapshot = self.dot_snapshot(ctx, &config, dot)?;
        let previous = self.dot_state(ctx)?;
        if let Some(handle) = previous.handle {
            self.scheduler.cancel(handle);
        }
        let handle = self
            .scheduler
            .schedule(now + interval, SimEvent::DotTick(ctx))?;
        let state = DotState {
            active: true,
            ticks_total: dot.ticks,
            ticks_fired: 0,
            interval,
            applied_at: now,
            snapshot,
            application: previous.application.wrapping_add(1),
            handle: Some(handle),
        };
        *self.dot_state_mut(ctx)? = state;
        trace!(%caster, label = %dot.label, target = %ctx.target, ticks = dot.ticks, %interval, refreshed = previous.active, "dot applied");
        self.trace
            .record(now, caster, TraceKind::DotApply, u64::from(ctx.target.0));

        if config.flags.contains(AbilityFlags::CHANNELED) {
            self.unit_mut(caster)?.channel = Some(Channel {
                ctx,
                ends_at: state.ends_at(),
            });
        }
        Ok(())
    }

    /// Tick event handler.
    pub(crate) fn on_dot_tick(&mut self, ctx: CastContext) -> SimResult<()> {
        let config = self.ability_config(ctx)?;
        let Some(dot) = &config.dot else {
            return Ok(());
        };
        let (tick, application) = {
            let state = self.dot_state_mut(ctx)?;
            if !state.active {
                return Ok(());
            }
            state.handle = None;
            state.ticks_fired += 1;
            (state.ticks_fired, state.application)
        };
        if dot.policy == SnapshotPolicy::Rollover {
            let snapshot = self.dot_snapshot(ctx, &config, dot)?;
            self.dot_state_mut(ctx)?.snapshot = snapshot;
        }

        let now = self.now();
        self.trace
            .record(now, ctx.caster(), TraceKind::DotTick, u64::from(tick));
        match &dot.on_tick {
            Some(hook) => hook(self, ctx, tick)?,
            None => {
                self.deal_dot_tick(ctx)?;
            }
        }

        // the hook may have re-applied or cancelled the effect
        let state = self.dot_state(ctx)?;
        if !state.active || state.application != application {
            return Ok(());
        }
        if tick < state.ticks_total {
            let handle = self
                .scheduler
                .schedule(state.tick_time(tick + 1), SimEvent::DotTick(ctx))?;
            self.dot_state_mut(ctx)?.handle = Some(handle);
            Ok(())
        } else {
            self.end_dot(ctx)
        }
    }

    /// Stops the effect early. Returns `false` if it was not running.
    pub fn cancel_dot(&mut self, ctx: CastContext) -> SimResult<bool> {
        let state = self.dot_state(ctx)?;
        if !state.active {
            return Ok(false);
        }
        if let Some(handle) = state.handle {
            self.scheduler.cancel(handle);
        }
        let now = self.now();
        self.trace
            .record(now, ctx.caster(), TraceKind::DotCancel, u64::from(state.ticks_fired));
        self.end_dot(ctx)?;
        Ok(true)
    }

    fn end_dot(&mut self, ctx: CastContext) -> SimResult<()> {
        let caster = ctx.caster();
        self.dot_state_mut(ctx)?.clear();

        let ability = self.ability_mut(caster, ctx.ability.ability)?;
        if ability.phase == CastPhase::Ticking {
            ability.phase = CastPhase::Completed;
        }

        let now = self.now();
        let unit = self.unit_mut(caster)?;
        if unit.channel.is_some_and(|channel| channel.ctx == ctx) {
            unit.channel = None;
            self.schedule_ready(caster, now)?;
        }
        Ok(())
    }

    /// Copy of the periodic state of `ctx`.
    pub fn dot_state(&self, ctx: CastContext) -> SimResult<DotState> {
        let ability = self.ability(ctx.caster(), ctx.ability.ability)?;
        match ability.dot(ctx.target) {
            Some(state) => Ok(*state),
            None => Err(ContractError::NoPeriodicEffect {
                unit: ctx.caster(),
                ability: ctx.ability.ability,
            }),
        }
    }

    fn dot_state_mut(&mut self, ctx: CastContext) -> SimResult<&mut DotState> {
        let (caster, ability) = (ctx.caster(), ctx.ability.ability);
        self.ability_mut(caster, ability)?
            .dot_mut(ctx.target)
            .ok_or(ContractError::NoPeriodicEffect {
                unit: caster,
                ability,
            })
    }
}
