//! Event trace and reproducibility digest.
//!
//! Every fired event is folded into a SHA-256 digest as
//! `(at, unit, kind, detail)` in little-endian. Two trials with the same
//! seed and setup produce the same digest; the runner compares digests
//! instead of full traces.

use sha2::{Digest, Sha256};

use crate::ids::UnitId;
use crate::time::SimTime;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TraceMode {
    /// Nothing is recorded.
    Off,
    /// Only the running digest.
    #[default]
    Digest,
    /// Digest plus every entry, for debugging.
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum TraceKind {
    AuraGain,
    AuraRefresh,
    AuraExpire,
    AuraStacks,
    CastStart,
    CastComplete,
    CastFizzle,
    Outcome,
    Refund,
    DotApply,
    DotTick,
    DotCancel,
    StatChange,
    UnitReady,
    Action,
    TrialEnd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceEntry {
    pub at: SimTime,
    pub unit: UnitId,
    pub kind: TraceKind,
    pub detail: u64,
}

#[derive(Clone, Debug, Default)]
pub struct EventTrace {
    mode: TraceMode,
    hasher: Sha256,
    recorded: u64,
    entries: Vec<TraceEntry>,
}

impl EventTrace {
    pub fn new(mode: TraceMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> TraceMode {
        self.mode
    }

    pub(crate) fn set_mode(&mut self, mode: TraceMode) {
        self.mode = mode;
        self.reset();
    }

    pub fn record(&mut self, at: SimTime, unit: UnitId, kind: TraceKind, detail: u64) {
        if self.mode == TraceMode::Off {
            return;
        }
        self.hasher.update(at.as_millis().to_le_bytes());
        self.hasher.update(unit.0.to_le_bytes());
        self.hasher.update([kind as u8]);
        self.hasher.update(detail.to_le_bytes());
        self.recorded += 1;

        if self.mode == TraceMode::Full {
            self.entries.push(TraceEntry {
                at,
                unit,
                kind,
                detail,
            });
        }
    }

    /// Entries recorded so far; empty unless the mode is [`TraceMode::Full`].
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    /// Digest of everything recorded since the last reset, `None` when off.
    pub fn digest(&self) -> Option<[u8; 32]> {
        match self.mode {
            TraceMode::Off => None,
            _ => Some(self.hasher.clone().finalize().into()),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.hasher = Sha256::new();
        self.recorded = 0;
        self.entries.clear();
    }
}
