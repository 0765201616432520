//! Decision makers.
//!
//! The core never decides what a unit does next. An [`Agent`] is asked on
//! every ready event and either casts something that schedules the next
//! ready event, or calls [`Simulation::wait_until`]. An agent that does
//! neither leaves its unit idle for the rest of the trial.

use crate::ability::{CastOutcome, CastRejection};
use crate::error::SimResult;
use crate::ids::{AbilityId, UnitId};
use crate::time::SimTime;

use super::Simulation;

pub trait Agent: Send {
    fn on_ready(&mut self, sim: &mut Simulation, unit: UnitId) -> SimResult<()>;

    /// Called between trials.
    fn reset(&mut self) {}
}

/// Casts the first usable ability from a fixed list at the unit's target.
///
/// Off-GCD instants make the unit ready again at the same instant, so an
/// off-GCD entry with no cooldown, cost or condition is recast forever
/// without the clock advancing.
#[derive(Clone, Debug)]
pub struct PriorityAgent {
    priorities: Vec<AbilityId>,
    /// Poll interval when nothing is castable and nothing predicts when it will be.
    poll: SimTime,
}

impl PriorityAgent {
    pub fn new(priorities: impl IntoIterator<Item = AbilityId>) -> Self {
        Self {
            priorities: priorities.into_iter().collect(),
            poll: SimTime::from_millis(100),
        }
    }

    #[must_use]
    pub fn with_poll(mut self, poll: SimTime) -> Self {
        self.poll = poll;
        self
    }

    /// Earliest time a rejected ability could become castable.
    fn retry_at(&self, sim: &mut Simulation, unit: UnitId, ability: AbilityId, why: CastRejection) -> SimResult<Option<SimTime>> {
        let now = sim.now();
        Ok(match why {
            CastRejection::OnCooldown => {
                let timer = sim.unit(unit)?.spellbook().get(ability)?.cooldown_timer();
                Some(sim.timer(unit, timer)?.ready_at())
            }
            CastRejection::GcdNotReady | CastRejection::AlreadyCasting => Some(sim.unit(unit)?.ready_at()),
            CastRejection::InsufficientResource => {
                let cost = sim.unit(unit)?.spellbook().get(ability)?.config().cost;
                match cost {
                    Some(cost) => {
                        let amount = cost.amount * sim.unit(unit)?.pseudo().cost_multiplier;
                        sim.time_until_power(unit, cost.kind, amount)?.map(|wait| now + wait)
                    }
                    None => None,
                }
            }
            CastRejection::ConditionFailed | CastRejection::Disabled => None,
        })
    }
}

impl Agent for PriorityAgent {
    fn on_ready(&mut self, sim: &mut Simulation, unit: UnitId) -> SimResult<()> {
        let Some(target) = sim.target_of(unit)? else {
            return Ok(());
        };
        let now = sim.now();
        let mut wake = SimTime::NEVER;
        for &ability in &self.priorities {
            let CastOutcome::Rejected(why) = sim.cast(unit, ability, target)? else {
                return Ok(());
            };
            if let Some(at) = self.retry_at(sim, unit, ability, why)?
                && at > now
            {
                wake = wake.min(at);
            }
        }
        let at = if wake.is_never() { now + self.poll } else { wake };
        sim.wait_until(unit, at)
    }
}
