//! Discrete-event queue.
//!
//! Events are ordered by `(time, seq)` where `seq` is a global insertion
//! counter, so equal-timestamp events fire in the order they were scheduled
//! regardless of which unit scheduled them.
//!
//! Payloads live in a slot table; the heap only holds keys. Cancelling bumps
//! the slot generation, which turns the heap key stale. Stale keys are
//! discarded lazily when they reach the top. Slots are recycled across
//! trials, so a warmed-up scheduler does not allocate.

use core::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::error::{ContractError, SimResult};
use crate::time::SimTime;

/// Handle returned by [`Scheduler::schedule`]. Copyable; outliving the event is harmless.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventHandle {
    slot: u32,
    generation: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct EventKey {
    at: SimTime,
    seq: u64,
    slot: u32,
    generation: u32,
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Debug)]
struct Slot<E> {
    generation: u32,
    event: Option<E>,
}

#[derive(Clone, Debug)]
pub struct Scheduler<E> {
    heap: BinaryHeap<Reverse<EventKey>>,
    slots: Vec<Slot<E>>,
    free: Vec<u32>,
    now: SimTime,
    seq: u64,
    pending: usize,
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            now: SimTime::ZERO,
            seq: 0,
            pending: 0,
        }
    }

    /// Timestamp of the last event handed out by [`pop_next`](Self::pop_next).
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Number of live (scheduled, not cancelled, not fired) events.
    pub fn len(&self) -> usize {
        self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }

    /// Queues `event` at `at`. `at == now` is allowed and fires within the
    /// current processing step; `at < now` is a contract violation.
    pub fn schedule(&mut self, at: SimTime, event: E) -> SimResult<EventHandle> {
        if at < self.now {
            return Err(ContractError::ScheduleInPast { at, now: self.now });
        }
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    event: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let entry = &mut self.slots[slot as usize];
        entry.event = Some(event);
        let handle = EventHandle {
            slot,
            generation: entry.generation,
        };
        self.heap.push(Reverse(EventKey {
            at,
            seq: self.seq,
            slot,
            generation: entry.generation,
        }));
        self.seq += 1;
        self.pending += 1;
        Ok(handle)
    }

    /// Invalidates `handle`. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.take(handle).is_some()
    }

    /// Cancels `handle` and hands back its payload.
    pub fn take(&mut self, handle: EventHandle) -> Option<E> {
        let slot = self.slots.get_mut(handle.slot as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let event = slot.event.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.slot);
        self.pending -= 1;
        Some(event)
    }

    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.slots
            .get(handle.slot as usize)
            .is_some_and(|s| s.generation == handle.generation && s.event.is_some())
    }

    /// Timestamp of the next live event.
    pub fn peek_time(&mut self) -> Option<SimTime> {
        self.discard_stale();
        self.heap.peek().map(|Reverse(key)| key.at)
    }

    /// Removes and returns the next live event if it is due at or before
    /// `until`, advancing the clock to its timestamp.
    pub fn pop_next(&mut self, until: SimTime) -> Option<(SimTime, E)> {
        self.discard_stale();
        let Reverse(key) = *self.heap.peek()?;
        if key.at > until {
            return None;
        }
        self.heap.pop();
        let slot = &mut self.slots[key.slot as usize];
        let event = slot.event.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.slot);
        self.pending -= 1;
        self.now = key.at;
        Some((key.at, event))
    }

    /// Moves the clock forward without firing anything. Never moves it back.
    pub fn advance_to(&mut self, at: SimTime) {
        self.now = self.now.max(at);
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse(key)) = self.heap.peek() {
            let live = self
                .slots
                .get(key.slot as usize)
                .is_some_and(|s| s.generation == key.generation && s.event.is_some());
            if live {
                break;
            }
            self.heap.pop();
        }
    }

    /// Drops every pending event and rewinds the clock, keeping allocations.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.free.clear();
        for slot in self.slots.iter_mut() {
            if slot.event.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        // lowest slot index is handed out first
        self.free.extend((0..self.slots.len() as u32).rev());
        self.now = SimTime::ZERO;
        self.seq = 0;
        self.pending = 0;
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(s: &mut Scheduler<&'static str>) -> Vec<(i64, &'static str)> {
        let mut out = Vec::new();
        while let Some((at, e)) = s.pop_next(SimTime::NEVER) {
            out.push((at.as_millis(), e));
        }
        out
    }

    #[test]
    fn equal_timestamps_fire_in_insertion_order() {
        let mut s = Scheduler::new();
        s.schedule(SimTime(100), "b1").unwrap();
        s.schedule(SimTime(50), "a").unwrap();
        s.schedule(SimTime(100), "b2").unwrap();
        s.schedule(SimTime(100), "b3").unwrap();

        assert_eq!(drain(&mut s), vec![(50, "a"), (100, "b1"), (100, "b2"), (100, "b3")]);
        assert_eq!(s.now(), SimTime(100));
    }

    #[test]
    fn cancel_is_idempotent_and_skips_event() {
        let mut s = Scheduler::new();
        let keep = s.schedule(SimTime(10), "keep").unwrap();
        let drop = s.schedule(SimTime(5), "drop").unwrap();

        assert!(s.cancel(drop));
        assert!(!s.cancel(drop));
        assert!(!s.is_pending(drop));
        assert!(s.is_pending(keep));
        assert_eq!(s.len(), 1);

        assert_eq!(drain(&mut s), vec![(10, "keep")]);
        // already fired
        assert!(!s.cancel(keep));
    }

    #[test]
    fn reused_slot_does_not_resurrect_cancelled_handle() {
        let mut s = Scheduler::new();
        let old = s.schedule(SimTime(10), "old").unwrap();
        s.cancel(old);
        let new = s.schedule(SimTime(20), "new").unwrap();

        assert!(!s.cancel(old));
        assert!(s.is_pending(new));
        assert_eq!(drain(&mut s), vec![(20, "new")]);
    }

    #[test]
    fn pop_respects_horizon_and_past_is_rejected() {
        let mut s = Scheduler::new();
        s.schedule(SimTime(100), "late").unwrap();
        assert!(s.pop_next(SimTime(99)).is_none());
        assert_eq!(s.pop_next(SimTime(100)), Some((SimTime(100), "late")));

        // same timestamp as now is fine
        s.schedule(SimTime(100), "now").unwrap();
        assert!(matches!(
            s.schedule(SimTime(99), "past"),
            Err(ContractError::ScheduleInPast { .. })
        ));
        assert_eq!(s.peek_time(), Some(SimTime(100)));
    }

    #[test]
    fn clear_rewinds_and_invalidates() {
        let mut s = Scheduler::new();
        let h = s.schedule(SimTime(10), "x").unwrap();
        s.schedule(SimTime(20), "y").unwrap();
        s.pop_next(SimTime(10));

        s.clear();
        assert!(s.is_empty());
        assert_eq!(s.now(), SimTime::ZERO);
        assert!(!s.cancel(h));
        assert_eq!(s.peek_time(), None);
    }
}
