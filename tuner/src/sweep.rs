//! Orchestration for `tuner run`: plan a document, then schedule its jobs.

use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::io::config::TunerConfig;
use crate::io::interrupt::Interrupt;
use crate::io::metrics::{HttpMetrics, MetricsSource};
use crate::io::process::{Launcher, TrainerLauncher};
use crate::plan::{WrittenPlan, write_plan};
use crate::schedule::{ScheduleConfig, ScheduleOutcome, SlotScheduler};

/// Subdirectory of the output directory receiving run logs.
pub const LOG_DIR: &str = "logs";

/// Per-invocation inputs for a sweep.
#[derive(Debug, Clone)]
pub struct SweepRequest<'a> {
    pub document: &'a Path,
    pub base_run_id: &'a str,
    pub out_dir: Option<&'a Path>,
}

/// Plan `request.document` and run every job with the trainer and metrics
/// service named in `config`.
pub fn run_sweep(request: &SweepRequest<'_>, config: &TunerConfig, interrupt: Interrupt) -> Result<ScheduleOutcome> {
    config.validate()?;
    let launcher = TrainerLauncher::new(config.trainer.program.clone(), config.trainer.args.clone());
    let metrics = HttpMetrics::new(config.metrics.endpoint.clone(), config.metrics_timeout())?;
    run_sweep_with(request, config, &launcher, &metrics, interrupt)
}

/// [`run_sweep`] with explicit launcher and metrics source.
pub fn run_sweep_with<L: Launcher, M: MetricsSource + ?Sized>(
    request: &SweepRequest<'_>,
    config: &TunerConfig,
    launcher: &L,
    metrics: &M,
    interrupt: Interrupt,
) -> Result<ScheduleOutcome> {
    let plan = write_plan(request.document, request.base_run_id, request.out_dir)?;
    schedule_plan(plan, config, launcher, metrics, interrupt)
}

fn schedule_plan<L: Launcher, M: MetricsSource + ?Sized>(
    plan: WrittenPlan,
    config: &TunerConfig,
    launcher: &L,
    metrics: &M,
    interrupt: Interrupt,
) -> Result<ScheduleOutcome> {
    let schedule = ScheduleConfig {
        slots: config.effective_slots(),
        poll_interval: config.poll_interval(),
        base_port: config.trainer.base_port,
        log_dir: plan.out_dir.join(LOG_DIR),
    };
    for stop in &plan.stops {
        info!(%stop, "stop condition active");
    }
    info!(
        runs = plan.runs.len(),
        slots = schedule.slots,
        poll_secs = schedule.poll_interval.as_secs(),
        "starting training runs"
    );
    let outcome = SlotScheduler::new(launcher, metrics, &plan.stops, plan.runs, schedule, interrupt)?.run()?;
    if !outcome.failed.is_empty() {
        warn!(failed = ?outcome.failed, "some training runs failed");
    }
    Ok(outcome)
}
