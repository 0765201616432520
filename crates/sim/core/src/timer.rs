//! Cooldown clocks.
//!
//! Timers are standalone objects addressed by [`TimerId`], not keyed by
//! ability, so several abilities can share one cooldown group.

use crate::error::{ContractError, SimResult};
use crate::ids::{TimerId, UnitId};
use crate::time::SimTime;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timer {
    ready_at: SimTime,
}

impl Timer {
    pub const fn new() -> Self {
        Self {
            ready_at: SimTime::ZERO,
        }
    }

    pub fn ready_at(&self) -> SimTime {
        self.ready_at
    }

    pub fn is_ready(&self, now: SimTime) -> bool {
        self.ready_at <= now
    }

    /// Time left until ready, zero if already ready.
    pub fn remaining(&self, now: SimTime) -> SimTime {
        self.ready_at.since(now)
    }

    /// Starts the cooldown: ready again at `now + duration`.
    pub fn use_for(&mut self, now: SimTime, duration: SimTime) {
        self.ready_at = now + duration;
    }

    /// Pushes readiness to `at` unless it is already later.
    pub fn extend_to(&mut self, at: SimTime) {
        self.ready_at = self.ready_at.max(at);
    }

    pub fn reset(&mut self) {
        self.ready_at = SimTime::ZERO;
    }
}

/// Every timer owned by one unit.
#[derive(Clone, Debug)]
pub struct TimerRegistry {
    owner: UnitId,
    timers: Vec<Timer>,
}

impl TimerRegistry {
    pub fn new(owner: UnitId) -> Self {
        Self {
            owner,
            timers: Vec::new(),
        }
    }

    pub fn new_timer(&mut self) -> TimerId {
        let id = TimerId(self.timers.len() as u32);
        self.timers.push(Timer::new());
        id
    }

    pub fn get(&self, id: TimerId) -> SimResult<&Timer> {
        self.timers.get(id.index()).ok_or(ContractError::UnknownTimer {
            unit: self.owner,
            timer: id,
        })
    }

    pub fn get_mut(&mut self, id: TimerId) -> SimResult<&mut Timer> {
        let owner = self.owner;
        self.timers
            .get_mut(id.index())
            .ok_or(ContractError::UnknownTimer {
                unit: owner,
                timer: id,
            })
    }

    pub fn as_slice(&self) -> &[Timer] {
        &self.timers
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn all_ready(&self) -> bool {
        self.timers.iter().all(|t| t.ready_at == SimTime::ZERO)
    }

    pub fn reset(&mut self) {
        for timer in &mut self.timers {
            timer.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn use_arms_cooldown() {
        let mut timer = Timer::new();
        assert!(timer.is_ready(SimTime::ZERO));

        timer.use_for(SimTime::from_secs(2), SimTime::from_secs(10));
        assert_eq!(timer.ready_at(), SimTime::from_secs(12));
        assert!(!timer.is_ready(SimTime::from_millis(11_999)));
        assert!(timer.is_ready(SimTime::from_secs(12)));
        assert_eq!(timer.remaining(SimTime::from_secs(7)), SimTime::from_secs(5));
    }

    #[test]
    fn shared_timer_blocks_both_users() {
        let mut timers = TimerRegistry::new(UnitId(0));
        let shared = timers.new_timer();

        timers
            .get_mut(shared)
            .unwrap()
            .use_for(SimTime::ZERO, SimTime::from_secs(30));
        // a second ability holding the same id sees the cooldown
        assert!(!timers.get(shared).unwrap().is_ready(SimTime::from_secs(1)));

        timers.reset();
        assert!(timers.all_ready());
        assert!(timers.get(TimerId(7)).is_err());
    }
}
