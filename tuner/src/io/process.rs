//! Training subprocess launch, liveness polling and termination.
//!
//! The [`Launcher`] and [`RunHandle`] traits decouple the scheduler from real
//! processes. Tests use scripted launchers that never spawn anything.

use std::fs::{self, File};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};
use wait_timeout::ChildExt;

/// How long to wait for a killed trainer to be reaped.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Everything needed to start one job in one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub ordinal: usize,
    pub run_id: String,
    pub config_path: PathBuf,
    pub slot: usize,
    /// `base_port + slot`.
    pub port: u16,
    /// Destination for the trainer's stdout/stderr.
    pub log_path: PathBuf,
}

/// How a finished run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Success,
    /// Nonzero exit; `code` is `None` when terminated by a signal.
    Failed { code: Option<i32> },
}

/// A live run owned by a slot.
pub trait RunHandle {
    /// Non-blocking exit check.
    fn try_exit(&mut self) -> Result<Option<RunExit>>;
    /// Force the run to stop.
    fn terminate(&mut self) -> Result<()>;
}

/// Starts runs.
pub trait Launcher {
    type Handle: RunHandle;

    fn launch(&self, request: &LaunchRequest) -> Result<Self::Handle>;
}

/// Launches the external training program once per job.
#[derive(Debug, Clone)]
pub struct TrainerLauncher {
    pub program: String,
    /// Flags appended after the generated arguments.
    pub extra_args: Vec<String>,
}

impl TrainerLauncher {
    pub fn new(program: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            extra_args,
        }
    }

    /// Arguments for one launch: config path, run id, port, pass-through flags.
    pub fn args(&self, request: &LaunchRequest) -> Vec<String> {
        let mut args = vec![
            request.config_path.display().to_string(),
            format!("--run-id={}", request.run_id),
            format!("--base-port={}", request.port),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

impl Launcher for TrainerLauncher {
    type Handle = TrainerProcess;

    #[instrument(skip_all, fields(run_id = %request.run_id, slot = request.slot))]
    fn launch(&self, request: &LaunchRequest) -> Result<TrainerProcess> {
        if let Some(parent) = request.log_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create log dir {}", parent.display()))?;
        }
        let log = File::create(&request.log_path)
            .with_context(|| format!("create run log {}", request.log_path.display()))?;
        let log_err = log.try_clone().context("clone run log handle")?;

        let args = self.args(request);
        debug!(program = %self.program, ?args, "spawning trainer");
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .with_context(|| format!("spawn {}", self.program))?;
        info!(pid = child.id(), log = %request.log_path.display(), "trainer started");
        Ok(TrainerProcess { child })
    }
}

/// A spawned trainer process.
#[derive(Debug)]
pub struct TrainerProcess {
    child: Child,
}

impl RunHandle for TrainerProcess {
    fn try_exit(&mut self) -> Result<Option<RunExit>> {
        let status = self.child.try_wait().context("poll trainer")?;
        Ok(status.map(|status| {
            if status.success() {
                RunExit::Success
            } else {
                RunExit::Failed {
                    code: status.code(),
                }
            }
        }))
    }

    fn terminate(&mut self) -> Result<()> {
        if self.child.try_wait().context("poll trainer")?.is_some() {
            return Ok(());
        }
        self.child.kill().context("kill trainer")?;
        if self
            .child
            .wait_timeout(TERMINATE_GRACE)
            .context("wait for trainer after kill")?
            .is_none()
        {
            warn!(
                pid = self.child.id(),
                grace_secs = TERMINATE_GRACE.as_secs(),
                "trainer not reaped after kill"
            );
        }
        Ok(())
    }
}
