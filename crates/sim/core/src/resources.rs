//! Resource pools.
//!
//! Regeneration and decay are computed lazily: a pool remembers when it was
//! last touched and settles the elapsed time on the next access, so no
//! recurring tick events are needed.
//!
//! Formula on every access at time `now`:
//! `current = clamp(current + rate * (now - last_sync), 0, max)`
//!
//! A negative `rate` models decay (Rage).

use strum::{EnumCount, EnumIter, IntoStaticStr};

use crate::error::{ContractError, SimResult};
use crate::ids::UnitId;
use crate::time::SimTime;

/// Power types a unit can spend.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, EnumCount, EnumIter, IntoStaticStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum PowerKind {
    Health,
    Mana,
    Energy,
    Rage,
    Focus,
}

impl PowerKind {
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl core::fmt::Display for PowerKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name: &'static str = self.into();
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct PoolBaseline {
    current: f64,
    max: f64,
    rate: f64,
}

/// One lazily regenerating pool.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourcePool {
    kind: PowerKind,
    current: f64,
    max: f64,
    /// Units per second; negative for decay.
    rate: f64,
    last_sync: SimTime,
    baseline: Option<PoolBaseline>,
}

impl ResourcePool {
    /// A pool starting full.
    pub fn new(kind: PowerKind, max: f64, rate: f64) -> Self {
        Self::with_current(kind, max, max, rate)
    }

    pub fn with_current(kind: PowerKind, current: f64, max: f64, rate: f64) -> Self {
        Self {
            kind,
            current: current.clamp(0.0, max),
            max,
            rate,
            last_sync: SimTime::ZERO,
            baseline: None,
        }
    }

    pub fn kind(&self) -> PowerKind {
        self.kind
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Settles regeneration up to `now`.
    pub fn sync(&mut self, now: SimTime) {
        if now <= self.last_sync {
            return;
        }
        if self.rate != 0.0 {
            let elapsed = now.since(self.last_sync).as_secs_f64();
            self.current = (self.current + self.rate * elapsed).clamp(0.0, self.max);
        }
        self.last_sync = now;
    }

    /// Current amount after settling regeneration.
    pub fn current(&mut self, now: SimTime) -> f64 {
        self.sync(now);
        self.current
    }

    /// Amount as of the last sync.
    pub fn peek(&self) -> f64 {
        self.current
    }

    pub fn can_afford(&mut self, now: SimTime, amount: f64) -> bool {
        self.current(now) >= amount
    }

    /// Deducts `amount`. Spending more than is available is a contract
    /// violation: callers check [`can_afford`](Self::can_afford) first.
    pub fn spend(&mut self, now: SimTime, amount: f64, owner: UnitId) -> SimResult<()> {
        let available = self.current(now);
        if amount > available {
            return Err(ContractError::InsufficientResource {
                unit: owner,
                kind: self.kind,
                requested: amount,
                available,
            });
        }
        self.current -= amount;
        Ok(())
    }

    /// Adds up to `amount` and returns what actually fit under the cap.
    pub fn gain(&mut self, now: SimTime, amount: f64) -> f64 {
        let before = self.current(now);
        self.current = (before + amount).clamp(0.0, self.max);
        self.current - before
    }

    pub fn set_max(&mut self, now: SimTime, max: f64) {
        self.sync(now);
        self.max = max.max(0.0);
        self.current = self.current.min(self.max);
    }

    /// Changes the regeneration rate from `now` on; time before `now` is
    /// settled at the old rate.
    pub fn set_rate(&mut self, now: SimTime, rate: f64) {
        self.sync(now);
        self.rate = rate;
    }

    /// Time until `amount` will be available, or `None` if it never will.
    pub fn time_until(&mut self, now: SimTime, amount: f64) -> Option<SimTime> {
        let current = self.current(now);
        if current >= amount {
            return Some(SimTime::ZERO);
        }
        if self.rate <= 0.0 || amount > self.max {
            return None;
        }
        let millis = ((amount - current) / self.rate * 1000.0).ceil() as i64;
        Some(SimTime::from_millis(millis))
    }

    /// Captures the trial baseline.
    pub fn finalize(&mut self) {
        self.baseline = Some(PoolBaseline {
            current: self.current,
            max: self.max,
            rate: self.rate,
        });
        self.last_sync = SimTime::ZERO;
    }

    pub fn reset(&mut self) {
        if let Some(baseline) = self.baseline {
            self.current = baseline.current;
            self.max = baseline.max;
            self.rate = baseline.rate;
        }
        self.last_sync = SimTime::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: UnitId = UnitId(0);

    #[test]
    fn energy_regenerates_lazily() {
        let mut energy = ResourcePool::with_current(PowerKind::Energy, 0.0, 100.0, 10.0);
        // 2.5s × 10/s = 25
        assert_eq!(energy.current(SimTime::from_millis(2500)), 25.0);
        // caps at max
        assert_eq!(energy.current(SimTime::from_secs(60)), 100.0);
    }

    #[test]
    fn rage_decays_to_zero() {
        let mut rage = ResourcePool::with_current(PowerKind::Rage, 20.0, 100.0, -1.0);
        assert_eq!(rage.current(SimTime::from_secs(5)), 15.0);
        assert_eq!(rage.current(SimTime::from_secs(100)), 0.0);
    }

    #[test]
    fn spend_beyond_available_is_contract_error() {
        let mut energy = ResourcePool::with_current(PowerKind::Energy, 40.0, 100.0, 0.0);
        assert!(!energy.can_afford(SimTime::ZERO, 60.0));
        let err = energy.spend(SimTime::ZERO, 60.0, OWNER).unwrap_err();
        assert!(matches!(err, ContractError::InsufficientResource { .. }));
        assert_eq!(energy.peek(), 40.0);

        energy.spend(SimTime::ZERO, 40.0, OWNER).unwrap();
        assert_eq!(energy.peek(), 0.0);
    }

    #[test]
    fn rate_change_settles_at_old_rate_first() {
        let mut mana = ResourcePool::with_current(PowerKind::Mana, 0.0, 1000.0, 2.0);
        mana.set_rate(SimTime::from_secs(10), 5.0); // 20 at old rate
        // 20 + 10s × 5 = 70
        assert_eq!(mana.current(SimTime::from_secs(20)), 70.0);
    }

    #[test]
    fn time_until_rounds_up() {
        let mut energy = ResourcePool::with_current(PowerKind::Energy, 35.0, 100.0, 10.0);
        // need 25 more at 10/s = 2.5s
        assert_eq!(
            energy.time_until(SimTime::ZERO, 60.0),
            Some(SimTime::from_millis(2500))
        );
        assert_eq!(energy.time_until(SimTime::ZERO, 150.0), None);
    }

    #[test]
    fn reset_restores_finalized_baseline() {
        let mut mana = ResourcePool::new(PowerKind::Mana, 500.0, 1.0);
        mana.finalize();
        mana.spend(SimTime::from_secs(1), 300.0, OWNER).unwrap();
        mana.set_rate(SimTime::from_secs(2), 9.0);

        mana.reset();
        assert_eq!(mana, {
            let mut fresh = ResourcePool::new(PowerKind::Mana, 500.0, 1.0);
            fresh.finalize();
            fresh
        });
    }
}
