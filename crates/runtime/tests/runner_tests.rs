//! Runner integration tests: determinism across worker counts, error
//! propagation, and config loading.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use sim_core::{
    AbilityConfig, Agent, CastCategory, ContractError, CostConfig, PowerKind, PriorityAgent, SimConfig,
    SimResult, SimTime, Simulation, Stat, TraceMode, UnitId, UnitKind,
};
use sim_runtime::{RunnerConfig, RuntimeError, SimFactory, TrialRunner, demo};

fn config(workers: usize, seed: u64) -> RunnerConfig {
    RunnerConfig {
        iterations: 12,
        base_seed: Some(seed),
        workers,
        duration_secs: 30.0,
        trace: TraceMode::Digest,
        log_filter: "warn".to_string(),
    }
}

/// A caster whose only ability violates a resource contract on landing.
fn faulty_factory() -> SimFactory {
    Arc::new(|| -> SimResult<Simulation> {
        let mut sim = Simulation::new(SimConfig::default());
        let caster = sim.add_unit("Caster", UnitKind::Player, 60)?;
        let dummy = sim.add_unit("Dummy", UnitKind::Opponent, 60)?;
        let unit = sim.unit_mut(caster)?;
        unit.add_stat(Stat::Mana, 1_000.0)?;
        unit.enable_power(PowerKind::Mana, None)?;
        unit.set_default_target(dummy)?;
        let drain = unit.register_ability(
            AbilityConfig::new("Overdraw", CastCategory::Spell)
                .with_cost(CostConfig::new(PowerKind::Mana, 10.0))
                .on_effect_apply(|sim, ctx| sim.spend_power(ctx.caster(), PowerKind::Mana, 1.0e9)),
        )?;
        sim.set_agent(caster, Box::new(PriorityAgent::new([drain])))?;
        sim.finalize()?;
        Ok(sim)
    })
}

/// Counts simulations that are still alive: one guard per built roster,
/// released when the worker drops its simulation.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(live))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct TrackedAgent {
    inner: PriorityAgent,
    _live: LiveGuard,
}

impl Agent for TrackedAgent {
    fn on_ready(&mut self, sim: &mut Simulation, unit: UnitId) -> SimResult<()> {
        self.inner.on_ready(sim, unit)
    }
}

/// The first roster built fails on its first trial; every other one is the
/// demonstration roster wearing a live guard.
fn one_bad_worker_factory(live: &Arc<AtomicUsize>) -> SimFactory {
    let live = Arc::clone(live);
    let builds = Arc::new(AtomicUsize::new(0));
    let faulty = faulty_factory();
    Arc::new(move || -> SimResult<Simulation> {
        if builds.fetch_add(1, Ordering::SeqCst) == 0 {
            return faulty();
        }
        let mut sim = Simulation::new(SimConfig::default());
        let caster = sim.add_unit("Caster", UnitKind::Player, 60)?;
        let dummy = sim.add_unit("Dummy", UnitKind::Opponent, 60)?;
        sim.unit_mut(dummy)?.add_stat(Stat::Health, 1.0e7)?;
        let unit = sim.unit_mut(caster)?;
        unit.set_default_target(dummy)?;
        let wand = unit.register_ability(AbilityConfig::new("Wand", CastCategory::Ranged).with_amount(50.0, 0.0))?;
        sim.set_agent(
            caster,
            Box::new(TrackedAgent {
                inner: PriorityAgent::new([wand]),
                _live: LiveGuard::new(&live),
            }),
        )?;
        sim.finalize()?;
        Ok(sim)
    })
}

// ================================================================
// Determinism
// ================================================================

#[tokio::test]
async fn report_is_independent_of_worker_count() {
    let serial = TrialRunner::new(config(1, 42), demo::factory())
        .run()
        .await
        .expect("serial run should succeed");
    let parallel = TrialRunner::new(config(4, 42), demo::factory())
        .run()
        .await
        .expect("parallel run should succeed");

    assert_eq!(serial.iterations, 12);
    assert_eq!(serial, parallel);
    assert!(serial.digest.is_some());

    let caster = serial.unit(demo::CASTER).expect("caster in report");
    assert!(caster.dps_mean > 0.0);
    assert!(caster.dps_min <= caster.dps_mean && caster.dps_mean <= caster.dps_max);
    let bolt = caster.ability("Shadow Bolt").expect("ability in report");
    assert!(bolt.totals.casts >= 12);
}

#[tokio::test]
async fn different_base_seeds_diverge() {
    let first = TrialRunner::new(config(2, 1), demo::factory())
        .run()
        .await
        .expect("run should succeed");
    let second = TrialRunner::new(config(2, 2), demo::factory())
        .run()
        .await
        .expect("run should succeed");

    assert_ne!(first.digest, second.digest);
}

#[tokio::test]
async fn trace_off_reports_no_digest() {
    let config = RunnerConfig {
        trace: TraceMode::Off,
        iterations: 3,
        ..config(2, 5)
    };
    let report = TrialRunner::new(config, demo::factory())
        .run()
        .await
        .expect("run should succeed");
    assert_eq!(report.digest, None);
    assert_eq!(report.iterations, 3);
}

#[tokio::test]
async fn zero_iterations_give_empty_report() {
    let config = RunnerConfig {
        iterations: 0,
        ..config(4, 5)
    };
    let report = TrialRunner::new(config, demo::factory())
        .run()
        .await
        .expect("empty run should succeed");
    assert_eq!(report.iterations, 0);
    assert!(report.units.is_empty());
}

// ================================================================
// Error propagation
// ================================================================

#[tokio::test]
async fn contract_violation_aborts_with_trial_context() {
    let err = TrialRunner::new(config(2, 9), faulty_factory())
        .run()
        .await
        .expect_err("overdraw must abort the run");

    match err {
        RuntimeError::Trial { iteration, source, .. } => {
            assert_eq!(iteration, 0);
            assert!(matches!(source, ContractError::InsufficientResource { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failure_joins_every_worker_before_returning() {
    let live = Arc::new(AtomicUsize::new(0));
    let config = RunnerConfig {
        iterations: 400,
        duration_secs: 600.0,
        ..config(4, 17)
    };
    let err = TrialRunner::new(config, one_bad_worker_factory(&live))
        .run()
        .await
        .expect_err("one worker overdraws");

    assert!(matches!(
        err,
        RuntimeError::Trial {
            source: ContractError::InsufficientResource { .. },
            ..
        }
    ));
    assert_eq!(live.load(Ordering::SeqCst), 0, "a worker was still running after the error");
}

#[tokio::test]
async fn factory_failure_is_a_build_error() {
    let factory: SimFactory = Arc::new(|| -> SimResult<Simulation> {
        let mut sim = Simulation::new(SimConfig::default());
        sim.finalize()?;
        sim.finalize()?;
        Ok(sim)
    });
    let err = TrialRunner::new(config(1, 3), factory)
        .run()
        .await
        .expect_err("double finalize must fail");
    assert!(matches!(err, RuntimeError::Build { worker: 0, .. }));
    assert!(err.contract().is_some());
}

// ================================================================
// Config loading
// ================================================================

#[test]
fn loads_config_from_toml_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        r#"
iterations = 250
base_seed = 7
workers = 3
duration_secs = 90.5
trace = "full"
log_filter = "debug"
"#
    )
    .expect("write config");

    let config = RunnerConfig::load(file.path()).expect("config should load");
    assert_eq!(config.iterations, 250);
    assert_eq!(config.base_seed, Some(7));
    assert_eq!(config.worker_count(), 3);
    assert_eq!(config.trial_duration(), SimTime::from_millis(90_500));
    assert_eq!(config.trace, TraceMode::Full);
    assert_eq!(config.log_filter, "debug");
}

#[test]
fn partial_config_keeps_defaults() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "iterations = 5").expect("write config");

    let config = RunnerConfig::load(file.path()).expect("config should load");
    assert_eq!(config.iterations, 5);
    assert_eq!(config.base_seed, None);
    assert_eq!(config.trace, TraceMode::Digest);
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = RunnerConfig::load(dir.path().join("absent.toml")).expect_err("file is missing");
    assert!(matches!(err, RuntimeError::ConfigIo { .. }));
}

#[test]
fn malformed_config_is_a_parse_error() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "iterations = \"many\"").expect("write config");

    let err = RunnerConfig::load(file.path()).expect_err("wrong type");
    assert!(matches!(err, RuntimeError::ConfigParse(_)));
}
