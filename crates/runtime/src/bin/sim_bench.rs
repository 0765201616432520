//! Runs the demonstration roster through the parallel trial runner.
//!
//! Usage: `sim-bench [--json] [config.toml]`

use std::ffi::OsString;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use sim_runtime::{RunnerConfig, TrialRunner, demo, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    let mut json = false;
    let mut path: Option<OsString> = None;
    for arg in std::env::args_os().skip(1) {
        if arg == "--json" {
            json = true;
        } else if path.is_none() {
            path = Some(arg);
        } else {
            bail!("unexpected argument {}", arg.to_string_lossy());
        }
    }

    let config = match &path {
        Some(path) => RunnerConfig::load(path)
            .with_context(|| format!("loading {}", path.to_string_lossy()))?,
        None => RunnerConfig::default(),
    };
    init_tracing(&config.log_filter);

    let started = Instant::now();
    let report = TrialRunner::new(config, demo::factory())
        .run()
        .await
        .context("trial run failed")?;

    if json {
        println!("{}", report.to_json().context("serializing report")?);
    } else {
        println!("{report}");
        println!("wall time {:.2?}", started.elapsed());
    }
    Ok(())
}
