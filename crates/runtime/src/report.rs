//! Aggregation of per-trial results.
//!
//! Trials are folded strictly in iteration order, so floating point sums and
//! the combined digest come out bit-identical for any worker count.
use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};
use sim_core::{AbilityMetrics, SimTime, Simulation, TraceMode, TrialMetrics, TrialSummary, UnitId};

use crate::error::{Result, RuntimeError};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AbilityReport {
    pub label: String,
    /// Counters and amounts summed over every trial.
    pub totals: AbilityMetrics,
}

impl AbilityReport {
    pub fn casts_per_trial(&self, iterations: u64) -> f64 {
        if iterations == 0 {
            return 0.0;
        }
        self.totals.casts as f64 / iterations as f64
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnitReport {
    pub label: String,
    pub dps_mean: f64,
    /// Sample standard deviation; zero below two trials.
    pub dps_stddev: f64,
    pub dps_min: f64,
    pub dps_max: f64,
    pub abilities: Vec<AbilityReport>,
}

impl UnitReport {
    pub fn ability(&self, label: &str) -> Option<&AbilityReport> {
        self.abilities.iter().find(|a| a.label == label)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregateReport {
    pub iterations: u64,
    pub base_seed: u64,
    pub trial_duration: SimTime,
    pub units: Vec<UnitReport>,
    /// Hex SHA-256 over every trial digest in iteration order. `None` when
    /// tracing was off.
    pub digest: Option<String>,
}

impl AggregateReport {
    pub fn unit(&self, label: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.label == label)
    }

    /// Pretty-printed JSON for downstream tooling. Durations are milliseconds.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for AggregateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} trials of {} (base seed {:#018x})",
            self.iterations, self.trial_duration, self.base_seed
        )?;
        for unit in &self.units {
            writeln!(
                f,
                "{}: {:.1} dps (sd {:.1}, min {:.1}, max {:.1})",
                unit.label, unit.dps_mean, unit.dps_stddev, unit.dps_min, unit.dps_max
            )?;
            for ability in unit.abilities.iter().filter(|a| a.totals.casts > 0 || a.totals.ticks > 0) {
                let totals = &ability.totals;
                writeln!(
                    f,
                    "  {:<24} casts/trial {:>7.2}  landed {:>5.1}%  crits {:>8}  ticks {:>8}  damage {:>14.0}",
                    ability.label,
                    ability.casts_per_trial(self.iterations),
                    totals.landed_rate() * 100.0,
                    totals.crits + totals.tick_crits,
                    totals.ticks,
                    totals.damage,
                )?;
            }
        }
        match &self.digest {
            Some(digest) => write!(f, "digest {digest}"),
            None => write!(f, "digest off"),
        }
    }
}

// ===== accumulation =====

/// Unit and ability labels of a finalized roster. Every worker must build
/// the same shape for its results to be mergeable.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RosterShape {
    units: Vec<(String, Vec<String>)>,
}

impl RosterShape {
    pub(crate) fn of(sim: &Simulation) -> Self {
        let units = sim
            .units()
            .iter()
            .map(|unit| {
                let abilities = unit.spellbook().iter().map(|a| a.label().to_string()).collect();
                (unit.label().to_string(), abilities)
            })
            .collect();
        Self { units }
    }
}

/// What one trial contributes to the report.
#[derive(Clone, Debug)]
pub(crate) struct TrialRecord {
    pub(crate) iteration: u64,
    dps: Vec<f64>,
    abilities: Vec<Vec<AbilityMetrics>>,
    digest: Option<[u8; 32]>,
}

impl TrialRecord {
    pub(crate) fn capture(iteration: u64, summary: &TrialSummary, metrics: &TrialMetrics) -> Self {
        let dps = (0..metrics.units().len())
            .map(|index| metrics.dps(UnitId(index as u32)))
            .collect();
        let abilities = metrics
            .units()
            .iter()
            .map(|unit| unit.abilities.clone())
            .collect();
        Self {
            iteration,
            dps,
            abilities,
            digest: summary.digest,
        }
    }
}

/// Running mean and variance (Welford).
#[derive(Clone, Copy, Debug, Default)]
struct Spread {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Spread {
    fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn stddev(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / (self.count - 1) as f64).sqrt()
    }
}

pub(crate) struct ReportBuilder {
    base_seed: u64,
    trial_duration: SimTime,
    shape: Option<RosterShape>,
    next_iteration: u64,
    dps: Vec<Spread>,
    abilities: Vec<Vec<AbilityMetrics>>,
    hasher: Option<Sha256>,
}

impl ReportBuilder {
    pub(crate) fn new(base_seed: u64, trial_duration: SimTime, trace: TraceMode) -> Self {
        Self {
            base_seed,
            trial_duration,
            shape: None,
            next_iteration: 0,
            dps: Vec::new(),
            abilities: Vec::new(),
            hasher: (trace != TraceMode::Off).then(Sha256::new),
        }
    }

    /// Fixes the roster shape from the first worker; later workers must match.
    pub(crate) fn expect_shape(&mut self, worker: usize, shape: RosterShape) -> Result<()> {
        match &self.shape {
            Some(known) if *known != shape => Err(RuntimeError::RosterMismatch { worker }),
            Some(_) => Ok(()),
            None => {
                self.dps = vec![Spread::default(); shape.units.len()];
                self.abilities = shape
                    .units
                    .iter()
                    .map(|(_, abilities)| vec![AbilityMetrics::default(); abilities.len()])
                    .collect();
                self.shape = Some(shape);
                Ok(())
            }
        }
    }

    pub(crate) fn push(&mut self, record: &TrialRecord) {
        debug_assert_eq!(record.iteration, self.next_iteration, "trials folded out of order");
        self.next_iteration += 1;

        for (spread, dps) in self.dps.iter_mut().zip(&record.dps) {
            spread.push(*dps);
        }
        for (totals, trial) in self.abilities.iter_mut().zip(&record.abilities) {
            for (total, metrics) in totals.iter_mut().zip(trial) {
                total.merge(metrics);
            }
        }
        if let (Some(hasher), Some(digest)) = (self.hasher.as_mut(), record.digest) {
            hasher.update(digest);
        }
    }

    pub(crate) fn finish(self) -> AggregateReport {
        let units = match self.shape {
            Some(shape) => shape
                .units
                .into_iter()
                .zip(self.dps)
                .zip(self.abilities)
                .map(|(((label, ability_labels), spread), totals)| UnitReport {
                    label,
                    dps_mean: spread.mean,
                    dps_stddev: spread.stddev(),
                    dps_min: spread.min,
                    dps_max: spread.max,
                    abilities: ability_labels
                        .into_iter()
                        .zip(totals)
                        .map(|(label, totals)| AbilityReport { label, totals })
                        .collect(),
                })
                .collect(),
            None => Vec::new(),
        };
        AggregateReport {
            iterations: self.next_iteration,
            base_seed: self.base_seed,
            trial_duration: self.trial_duration,
            units,
            digest: self.hasher.map(|hasher| hex::encode(hasher.finalize())),
        }
    }
}
