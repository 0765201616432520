//! Parallel trial execution.
//!
//! Iterations are split into contiguous ranges, one per worker. Each worker
//! builds its own simulation from the factory and runs its range on a
//! blocking task; nothing is shared between workers but the factory and a
//! cancellation flag that the first failure raises.
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use sim_core::{SimResult, SimTime, Simulation, TraceMode, trial_seed};
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::error::{Result, RuntimeError};
use crate::report::{AggregateReport, ReportBuilder, RosterShape, TrialRecord};

/// Builds one independent, finalized simulation per worker.
pub type SimFactory = Arc<dyn Fn() -> SimResult<Simulation> + Send + Sync>;

/// Splits `0..iterations` into at most `workers` contiguous ranges whose
/// lengths differ by at most one. Earlier ranges take the remainder.
pub fn batch_ranges(iterations: u64, workers: usize) -> Vec<Range<u64>> {
    if iterations == 0 || workers == 0 {
        return Vec::new();
    }
    let workers = u64::try_from(workers).unwrap_or(u64::MAX).min(iterations);
    let (base, extra) = (iterations / workers, iterations % workers);

    let mut start = 0;
    (0..workers)
        .map(|worker| {
            let len = base + u64::from(worker < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Settings every worker needs, copied into its task.
#[derive(Clone, Copy, Debug)]
struct TrialPlan {
    base_seed: u64,
    duration: SimTime,
    trace: TraceMode,
}

struct Batch {
    worker: usize,
    shape: RosterShape,
    records: Vec<TrialRecord>,
}

pub struct TrialRunner {
    config: RunnerConfig,
    factory: SimFactory,
}

impl TrialRunner {
    pub fn new(config: RunnerConfig, factory: SimFactory) -> Self {
        Self { config, factory }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs every configured trial and aggregates the results.
    ///
    /// The report depends only on the config and the factory, not on the
    /// worker count. The first failing worker (in worker order) aborts the
    /// run; the others stop before their next trial and are joined before
    /// the error is returned.
    pub async fn run(&self) -> Result<AggregateReport> {
        self.config.validate()?;
        let plan = TrialPlan {
            base_seed: self.config.resolve_seed(),
            duration: self.config.trial_duration(),
            trace: self.config.trace,
        };
        let ranges = batch_ranges(self.config.iterations, self.config.worker_count());
        info!(
            iterations = self.config.iterations,
            workers = ranges.len(),
            base_seed = plan.base_seed,
            duration = %plan.duration,
            "starting trials"
        );
        let started = Instant::now();

        let cancelled = Arc::new(AtomicBool::new(false));
        let handles: Vec<_> = ranges
            .into_iter()
            .enumerate()
            .map(|(worker, range)| {
                let factory = Arc::clone(&self.factory);
                let cancelled = Arc::clone(&cancelled);
                tokio::task::spawn_blocking(move || {
                    let batch = run_batch(worker, &factory, plan, range, &cancelled);
                    if batch.is_err() {
                        cancelled.store(true, Ordering::Relaxed);
                    }
                    batch
                })
            })
            .collect();

        // every handle is awaited, even after a failure, so no worker
        // outlives the run
        let mut builder = ReportBuilder::new(plan.base_seed, plan.duration, plan.trace);
        let mut failure = None;
        for handle in handles {
            let folded = match handle.await.map_err(RuntimeError::WorkerJoin).and_then(|batch| batch) {
                Ok(Some(batch)) if failure.is_none() => fold_batch(&mut builder, batch),
                Ok(_) => Ok(()),
                Err(err) => Err(err),
            };
            if let Err(err) = folded {
                cancelled.store(true, Ordering::Relaxed);
                if failure.is_none() {
                    warn!(error = %err, "trial run failed, cancelling remaining workers");
                    failure = Some(err);
                }
            }
        }
        if let Some(err) = failure {
            return Err(err);
        }

        let report = builder.finish();
        info!(
            iterations = report.iterations,
            elapsed_ms = started.elapsed().as_millis() as u64,
            digest = report.digest.as_deref().unwrap_or("off"),
            "trials finished"
        );
        Ok(report)
    }
}

fn fold_batch(builder: &mut ReportBuilder, batch: Batch) -> Result<()> {
    builder.expect_shape(batch.worker, batch.shape)?;
    for record in &batch.records {
        builder.push(record);
    }
    Ok(())
}

/// Runs `range` on a fresh simulation. Returns `None` once `cancelled` is
/// raised by another worker's failure.
fn run_batch(
    worker: usize,
    factory: &SimFactory,
    plan: TrialPlan,
    range: Range<u64>,
    cancelled: &AtomicBool,
) -> Result<Option<Batch>> {
    let build = |source| RuntimeError::Build { worker, source };
    let mut sim = factory().map_err(build)?;
    if !sim.is_finalized() {
        sim.finalize().map_err(build)?;
    }
    sim.set_duration(plan.duration);
    sim.set_trace_mode(plan.trace);

    debug!(worker, first = range.start, trials = range.end - range.start, "batch started");
    let shape = RosterShape::of(&sim);
    let mut records = Vec::with_capacity(usize::try_from(range.end - range.start).unwrap_or(0));
    for iteration in range {
        if cancelled.load(Ordering::Relaxed) {
            debug!(worker, iteration, "batch cancelled");
            return Ok(None);
        }
        let seed = trial_seed(plan.base_seed, iteration);
        let summary = sim
            .run_trial(seed)
            .map_err(|source| RuntimeError::Trial { iteration, seed, source })?;
        records.push(TrialRecord::capture(iteration, &summary, sim.metrics()));
    }
    debug!(worker, trials = records.len(), "batch finished");

    Ok(Some(Batch { worker, shape, records }))
}
