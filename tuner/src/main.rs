//! Hyperparameter sweep tool.
//!
//! `tuner plan` expands a configuration document into one job file per
//! combination of option values. `tuner run` does the same and then trains
//! every job through a fixed number of slots, stopping runs whose metrics
//! leave their bounds.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tuner::exit_codes;
use tuner::io::config::load_config;
use tuner::io::interrupt::{Interrupt, install_ctrl_c};
use tuner::logging;
use tuner::plan::write_plan;
use tuner::schedule::{ScheduleOutcome, ScheduleStop};
use tuner::sweep::{SweepRequest, run_sweep};

#[derive(Parser)]
#[command(
    name = "tuner",
    version,
    about = "Expand option fields into training jobs and run them in parallel"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
struct PlanArgs {
    /// Configuration document (YAML) with `opt_values` / `opt_stop` fields.
    document: PathBuf,
    /// Base run id; jobs are named `<run-id>-<n>`.
    #[arg(long, default_value = "run")]
    run_id: String,
    /// Directory for job files (default: the document's directory).
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Write one job file per combination plus `config_info.txt`.
    Plan(PlanArgs),
    /// Plan, then train every job and enforce stop conditions.
    Run {
        #[command(flatten)]
        plan: PlanArgs,
        /// Tuner config file.
        #[arg(long, default_value = "tuner.toml")]
        config: PathBuf,
        /// Concurrent runs (0 = one per CPU). Overrides the config file.
        #[arg(long)]
        slots: Option<usize>,
        /// First trainer port. Overrides the config file.
        #[arg(long)]
        base_port: Option<u16>,
        /// Training program. Overrides the config file.
        #[arg(long)]
        trainer: Option<String>,
        /// Extra arguments passed to every trainer launch.
        #[arg(last = true)]
        trainer_args: Vec<String>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Plan(args) => cmd_plan(&args),
        Command::Run {
            plan,
            config,
            slots,
            base_port,
            trainer,
            trainer_args,
        } => cmd_run(&plan, &config, slots, base_port, trainer, trainer_args),
    }
}

fn cmd_plan(args: &PlanArgs) -> Result<i32> {
    let written = write_plan(&args.document, &args.run_id, args.out_dir.as_deref())?;
    for run in &written.runs {
        println!("{}\t{}", run.run_id, run.config_path.display());
    }
    println!(
        "planned {} jobs, description in {}",
        written.runs.len(),
        written.info_path.display()
    );
    Ok(exit_codes::OK)
}

fn cmd_run(
    args: &PlanArgs,
    config_path: &Path,
    slots: Option<usize>,
    base_port: Option<u16>,
    trainer: Option<String>,
    trainer_args: Vec<String>,
) -> Result<i32> {
    let mut config = load_config(config_path)?;
    if let Some(slots) = slots {
        config.slots = slots;
    }
    if let Some(port) = base_port {
        config.trainer.base_port = port;
    }
    if let Some(program) = trainer {
        config.trainer.program = program;
    }
    config.trainer.args.extend(trainer_args);

    let interrupt = Interrupt::new();
    install_ctrl_c(interrupt.clone())?;
    let request = SweepRequest {
        document: &args.document,
        base_run_id: &args.run_id,
        out_dir: args.out_dir.as_deref(),
    };
    let outcome = run_sweep(&request, &config, interrupt)?;
    print_summary(&outcome);
    Ok(match outcome.stop {
        ScheduleStop::Complete => exit_codes::OK,
        ScheduleStop::Interrupted => exit_codes::INTERRUPTED,
    })
}

fn print_summary(outcome: &ScheduleOutcome) {
    println!(
        "launched {}, succeeded {}, failed {}, stopped early {}",
        outcome.launched,
        outcome.succeeded.len(),
        outcome.failed.len(),
        outcome.stopped_early.len()
    );
    for stop in &outcome.stopped_early {
        println!("stopped {}: {}", stop.run_id, stop.reason);
    }
    for run_id in &outcome.failed {
        println!("failed {run_id}");
    }
    if outcome.stop == ScheduleStop::Interrupted {
        println!("interrupted with {} runs not started", outcome.not_started);
    }
}
