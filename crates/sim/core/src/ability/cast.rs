use std::sync::Arc;

use tracing::trace;

use crate::error::{ContractError, SimResult};
use crate::ids::{AbilityId, CastContext, UnitId};
use crate::resources::PowerKind;
use crate::sim::{SimEvent, Simulation, TraceKind};
use crate::time::SimTime;
use crate::unit::Hardcast;

use super::{
    Ability, AbilityConfig, AbilityFlags, CastCategory, CastOutcome, CastPhase, CastRejection,
    CostTiming, EffectKind, Gcd,
};

impl Simulation {
    /// Attempts to cast `ability` from `caster` at `target`.
    ///
    /// Checks run in a fixed order and the first failure is returned as
    /// [`CastOutcome::Rejected`] with no state changed. On success the cost
    /// (if paid at cast start), the cooldown and the GCD are committed
    /// before any effect applies.
    pub fn cast(&mut self, caster: UnitId, ability: AbilityId, target: UnitId) -> SimResult<CastOutcome> {
        self.ensure_finalized("cast")?;
        self.unit(target)?;
        let ctx = CastContext::new(caster, ability, target);
        let now = self.now();

        let (config, cooldown) = {
            let entry = self.ability(caster, ability)?;
            if !entry.is_enabled() {
                return Ok(rejected(ctx, CastRejection::Disabled));
            }
            (Arc::clone(&entry.config), entry.cooldown_timer())
        };

        let interrupted = {
            let unit = self.unit(caster)?;
            if !unit.timers.get(cooldown)?.is_ready(now) {
                return Ok(rejected(ctx, CastRejection::OnCooldown));
            }
            if config.cast.gcd != Gcd::Off && !unit.gcd().is_ready(now) {
                return Ok(rejected(ctx, CastRejection::GcdNotReady));
            }
            if unit.hardcast.is_some() {
                return Ok(rejected(ctx, CastRejection::AlreadyCasting));
            }
            match unit.channel {
                Some(channel) if config.flags.contains(AbilityFlags::INTERRUPTS_CHANNEL) => Some(channel.ctx),
                Some(_) => return Ok(rejected(ctx, CastRejection::AlreadyCasting)),
                None => None,
            }
        };

        if let Some(condition) = &config.hooks.cast_condition
            && !condition(self, ctx)
        {
            return Ok(rejected(ctx, CastRejection::ConditionFailed));
        }

        let cost = self.cost_of(caster, &config)?;
        if let Some((kind, amount)) = cost
            && !self.pool_mut(caster, kind)?.can_afford(now, amount)
        {
            return Ok(rejected(ctx, CastRejection::InsufficientResource));
        }

        // committed from here on
        if let Some(channel) = interrupted {
            self.cancel_dot(channel)?;
        }
        trace!(%caster, ability = %config.label, %target, "cast started");
        self.trace.record(now, caster, TraceKind::CastStart, u64::from(ability.0));
        self.metrics.record_cast(ctx.ability);
        self.ability_mut(caster, ability)?.paid = 0.0;

        for hook in &config.hooks.on_cast_start {
            hook(self, ctx)?;
        }

        if let Some((kind, amount)) = cost
            && config.cost.is_some_and(|c| c.timing == CostTiming::OnCastStart)
        {
            self.pay(ctx, kind, amount)?;
        }
        if config.cast.cooldown > SimTime::ZERO {
            self.use_timer(caster, cooldown, config.cast.cooldown)?;
        }
        let gcd = self.gcd_for(caster, &config)?;
        if let Some(gcd) = gcd {
            let timer = self.unit(caster)?.gcd_timer();
            self.use_timer(caster, timer, gcd)?;
        }

        let cast_time = self.cast_time_for(caster, &config)?;
        if cast_time > SimTime::ZERO {
            if self.unit(caster)?.hardcast.is_some() {
                return Err(ContractError::CastWhileCasting { unit: caster });
            }
            let ends_at = now + cast_time;
            let handle = self.scheduler.schedule(ends_at, SimEvent::CastComplete(caster))?;
            self.unit_mut(caster)?.hardcast = Some(Hardcast { ctx, ends_at, handle });
            self.ability_mut(caster, ability)?.phase = CastPhase::Casting;
            self.schedule_ready(caster, ends_at)?;
            return Ok(CastOutcome::Started);
        }

        self.complete_cast(ctx)?;
        // clamped to the GCD or channel end, so off-GCD casts act again at once
        self.schedule_ready(caster, now)?;
        Ok(CastOutcome::Completed)
    }

    /// Hardcast timer fired.
    pub(crate) fn on_cast_complete_event(&mut self, caster: UnitId) -> SimResult<()> {
        let Some(hardcast) = self.unit_mut(caster)?.hardcast.take() else {
            return Ok(());
        };
        self.complete_cast(hardcast.ctx)?;
        let now = self.now();
        self.schedule_ready(caster, now)
    }

    /// Cancels an in-flight hardcast. The cost already paid is kept.
    pub fn interrupt_cast(&mut self, caster: UnitId) -> SimResult<bool> {
        let Some(hardcast) = self.unit_mut(caster)?.hardcast.take() else {
            return Ok(false);
        };
        self.scheduler.cancel(hardcast.handle);
        let ability = hardcast.ctx.ability.ability;
        self.ability_mut(caster, ability)?.phase = CastPhase::Completed;
        let now = self.now();
        self.trace.record(now, caster, TraceKind::CastFizzle, u64::from(ability.0));
        self.schedule_ready(caster, now)?;
        Ok(true)
    }

    /// Effect application and completion bookkeeping shared by instant casts
    /// and finished hardcasts.
    fn complete_cast(&mut self, ctx: CastContext) -> SimResult<()> {
        let caster = ctx.caster();
        let ability = ctx.ability.ability;
        let config = self.ability_config(ctx)?;
        let now = self.now();

        if let Some(cost) = config.cost
            && cost.timing == CostTiming::OnEffect
        {
            let amount = cost.amount * self.unit(caster)?.pseudo().cost_multiplier;
            if !self.pool_mut(caster, cost.kind)?.can_afford(now, amount) {
                trace!(%caster, ability = %config.label, "cast fizzled");
                self.trace.record(now, caster, TraceKind::CastFizzle, u64::from(ability.0));
                self.ability_mut(caster, ability)?.phase = CastPhase::Completed;
                return Ok(());
            }
            self.pay(ctx, cost.kind, amount)?;
        }

        self.ability_mut(caster, ability)?.phase = CastPhase::EffectApplication;
        match &config.hooks.on_effect_apply {
            Some(hook) => hook(self, ctx)?,
            None => self.apply_default_effect(ctx, &config)?,
        }

        let ticking = self
            .ability(caster, ability)?
            .dot(ctx.target)
            .is_some_and(|dot| dot.active);
        self.ability_mut(caster, ability)?.phase = if ticking {
            CastPhase::Ticking
        } else {
            CastPhase::Completed
        };
        self.trace.record(now, caster, TraceKind::CastComplete, u64::from(ability.0));

        for hook in &config.hooks.on_cast_complete {
            hook(self, ctx)?;
        }
        if !config.flags.contains(AbilityFlags::NO_ON_CAST_COMPLETE) {
            self.notify_cast_complete(ctx)?;
        }
        Ok(())
    }

    fn apply_default_effect(&mut self, ctx: CastContext, config: &AbilityConfig) -> SimResult<()> {
        if config.effect == EffectKind::None {
            if config.dot.is_some() {
                self.apply_dot(ctx)?;
            }
            return Ok(());
        }
        let hit = self.calc_and_deal(ctx)?;
        if hit.outcome.landed() {
            if config.dot.is_some() {
                self.apply_dot(ctx)?;
            }
        } else {
            self.refund_cost(ctx)?;
        }
        Ok(())
    }

    fn pay(&mut self, ctx: CastContext, kind: PowerKind, amount: f64) -> SimResult<()> {
        let ability = ctx.ability.ability;
        self.spend_for(ctx.caster(), kind, amount, Some(ability))?;
        self.ability_mut(ctx.caster(), ability)?.paid = amount;
        Ok(())
    }

    /// `(kind, amount)` after the caster's cost multiplier.
    fn cost_of(&self, caster: UnitId, config: &AbilityConfig) -> SimResult<Option<(PowerKind, f64)>> {
        let Some(cost) = config.cost else {
            return Ok(None);
        };
        let unit = self.unit(caster)?;
        if unit.pool(cost.kind).is_none() {
            return Err(ContractError::MissingPool {
                unit: caster,
                kind: cost.kind,
            });
        }
        Ok(Some((cost.kind, cost.amount * unit.pseudo().cost_multiplier)))
    }

    /// Spell GCDs shrink with haste but never below `min_gcd`.
    fn gcd_for(&self, caster: UnitId, config: &AbilityConfig) -> SimResult<Option<SimTime>> {
        let base = match config.cast.gcd {
            Gcd::Off => return Ok(None),
            Gcd::Default => self.config.default_gcd,
            Gcd::Fixed(gcd) => gcd,
        };
        if config.cast.ignore_haste || config.category != CastCategory::Spell {
            return Ok(Some(base));
        }
        let scaled = self.unit(caster)?.apply_cast_speed(base, CastCategory::Spell);
        Ok(Some(scaled.max(self.config.min_gcd.min(base))))
    }

    fn cast_time_for(&self, caster: UnitId, config: &AbilityConfig) -> SimResult<SimTime> {
        let base = config.cast.cast_time;
        if base <= SimTime::ZERO || config.cast.ignore_haste {
            return Ok(base);
        }
        Ok(self.unit(caster)?.apply_cast_speed(base, config.category))
    }

    // ===== spellbook access =====

    pub fn ability(&self, unit: UnitId, ability: AbilityId) -> SimResult<&Ability> {
        self.unit(unit)?.spellbook.get(ability)
    }

    pub(crate) fn ability_mut(&mut self, unit: UnitId, ability: AbilityId) -> SimResult<&mut Ability> {
        self.unit_mut(unit)?.spellbook.get_mut(ability)
    }

    pub(crate) fn ability_config(&self, ctx: CastContext) -> SimResult<Arc<AbilityConfig>> {
        Ok(Arc::clone(&self.ability(ctx.caster(), ctx.ability.ability)?.config))
    }

    /// Disabled abilities reject every cast until re-enabled or reset.
    pub fn set_ability_enabled(&mut self, unit: UnitId, ability: AbilityId, enabled: bool) -> SimResult<()> {
        self.ensure_finalized("ability toggle")?;
        self.ability_mut(unit, ability)?.enabled = enabled;
        Ok(())
    }
}

fn rejected(ctx: CastContext, why: CastRejection) -> CastOutcome {
    trace!(caster = %ctx.caster(), ability = %ctx.ability.ability, reason = <&str>::from(why), "cast rejected");
    CastOutcome::Rejected(why)
}
