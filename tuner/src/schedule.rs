//! Slot scheduler: keeps a bounded number of training runs alive.
//!
//! A single control thread alternates between filling empty slots from the
//! queue and watching the running ones. Watching sleeps for the poll interval,
//! then checks every running slot for exit and for stop-bound breaches. As
//! soon as one tick frees a slot the loop goes back to filling. An interrupt
//! terminates every running process and ends the loop.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{debug, error, info, instrument, warn};

use crate::core::slots::{RunIdentity, Slot, any_running, first_empty};
use crate::core::stop::StopBound;
use crate::io::interrupt::Interrupt;
use crate::io::metrics::{MetricsSource, first_breach};
use crate::io::process::{LaunchRequest, Launcher, RunExit, RunHandle};
use crate::plan::PlannedRun;

/// Scheduler settings that do not come from the plan.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub slots: usize,
    pub poll_interval: Duration,
    /// Slot `i` passes `base_port + i` to its trainer.
    pub base_port: u16,
    /// Directory receiving one output log per run.
    pub log_dir: PathBuf,
}

/// Why the scheduler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleStop {
    /// Every job was dispatched and every slot is empty.
    Complete,
    /// An interrupt arrived; running jobs were terminated.
    Interrupted,
}

/// A run terminated because a stop bound was breached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EarlyStop {
    pub run_id: String,
    pub reason: String,
}

/// Summary of a scheduler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleOutcome {
    pub stop: ScheduleStop,
    pub launched: usize,
    pub succeeded: Vec<String>,
    /// Nonzero exits and launch failures.
    pub failed: Vec<String>,
    pub stopped_early: Vec<EarlyStop>,
    /// Runs still queued when the loop ended (only after an interrupt).
    pub not_started: usize,
}

/// Owns the slots and the job queue for one sweep.
pub struct SlotScheduler<'a, L: Launcher, M: MetricsSource + ?Sized> {
    launcher: &'a L,
    metrics: &'a M,
    stops: &'a [StopBound],
    config: ScheduleConfig,
    interrupt: Interrupt,
    queue: VecDeque<PlannedRun>,
    slots: Vec<Slot<L::Handle>>,
    launched: usize,
    succeeded: Vec<String>,
    failed: Vec<String>,
    stopped_early: Vec<EarlyStop>,
}

impl<'a, L: Launcher, M: MetricsSource + ?Sized> SlotScheduler<'a, L, M> {
    pub fn new(
        launcher: &'a L,
        metrics: &'a M,
        stops: &'a [StopBound],
        runs: Vec<PlannedRun>,
        config: ScheduleConfig,
        interrupt: Interrupt,
    ) -> Result<Self> {
        if config.slots == 0 {
            bail!("scheduler needs at least one slot");
        }
        if config.slots - 1 > usize::from(u16::MAX - config.base_port) {
            bail!(
                "base port {} leaves no room for {} slots",
                config.base_port,
                config.slots
            );
        }
        let slots = (0..config.slots).map(|_| Slot::Empty).collect();
        Ok(Self {
            launcher,
            metrics,
            stops,
            config,
            interrupt,
            queue: runs.into(),
            slots,
            launched: 0,
            succeeded: Vec::new(),
            failed: Vec::new(),
            stopped_early: Vec::new(),
        })
    }

    /// Drive the fill/watch loop until the queue is exhausted or interrupted.
    #[instrument(skip_all, fields(slots = self.slots.len(), queued = self.queue.len()))]
    pub fn run(mut self) -> Result<ScheduleOutcome> {
        loop {
            if self.interrupt.is_triggered() {
                return Ok(self.drain());
            }
            self.fill();
            if self.queue.is_empty() && !any_running(&self.slots) {
                info!(
                    succeeded = self.succeeded.len(),
                    failed = self.failed.len(),
                    stopped_early = self.stopped_early.len(),
                    "all training runs complete"
                );
                return Ok(self.finish(ScheduleStop::Complete));
            }
            loop {
                if self.interrupt.sleep(self.config.poll_interval) {
                    return Ok(self.drain());
                }
                if self.tick() {
                    break;
                }
            }
        }
    }

    /// Dispatch queued runs into empty slots until one side runs out.
    fn fill(&mut self) {
        while let Some(index) = first_empty(&self.slots) {
            let Some(run) = self.queue.pop_front() else {
                return;
            };
            let request = LaunchRequest {
                ordinal: run.ordinal,
                run_id: run.run_id.clone(),
                config_path: run.config_path.clone(),
                slot: index,
                port: self.config.base_port + index as u16,
                log_path: self.config.log_dir.join(format!("{}.log", run.run_id)),
            };
            match self.launcher.launch(&request) {
                Ok(handle) => {
                    self.launched += 1;
                    info!(run_id = %run.run_id, slot = index, port = request.port, "run started");
                    self.slots[index] = Slot::Running {
                        handle,
                        run: RunIdentity {
                            ordinal: run.ordinal,
                            run_id: run.run_id,
                            composite_ids: run.composite_ids,
                        },
                    };
                }
                Err(err) => {
                    error!(run_id = %run.run_id, err = %format!("{err:#}"), "could not start run");
                    self.failed.push(run.run_id);
                }
            }
        }
    }

    /// Poll every running slot once. Returns whether any slot was freed.
    fn tick(&mut self) -> bool {
        let mut changed = false;
        for index in 0..self.slots.len() {
            let Slot::Running { handle, run } = &mut self.slots[index] else {
                continue;
            };
            debug!(run_id = %run.run_id, slot = index, "checking progress");
            match handle.try_exit() {
                Ok(Some(RunExit::Success)) => {
                    info!(run_id = %run.run_id, "run complete");
                    self.succeeded.push(run.run_id.clone());
                }
                Ok(Some(RunExit::Failed { code })) => {
                    warn!(run_id = %run.run_id, exit_code = ?code, "run failed");
                    self.failed.push(run.run_id.clone());
                }
                Ok(None) => {
                    let Some(breach) = first_breach(self.stops, self.metrics, &run.composite_ids)
                    else {
                        continue;
                    };
                    info!(run_id = %run.run_id, reason = %breach.reason, "stopping run");
                    if let Err(err) = handle.terminate() {
                        warn!(run_id = %run.run_id, err = %format!("{err:#}"), "terminate failed");
                    }
                    self.stopped_early.push(EarlyStop {
                        run_id: run.run_id.clone(),
                        reason: breach.reason,
                    });
                }
                Err(err) => {
                    warn!(run_id = %run.run_id, err = %format!("{err:#}"), "could not poll run, terminating");
                    if let Err(err) = handle.terminate() {
                        warn!(run_id = %run.run_id, err = %format!("{err:#}"), "terminate failed");
                    }
                    self.failed.push(run.run_id.clone());
                }
            }
            self.slots[index].clear();
            changed = true;
        }
        changed
    }

    /// Terminate every running slot and report the interruption.
    fn drain(mut self) -> ScheduleOutcome {
        for slot in &mut self.slots {
            if let Some((mut handle, run)) = slot.clear() {
                info!(run_id = %run.run_id, "terminating run");
                if let Err(err) = handle.terminate() {
                    warn!(run_id = %run.run_id, err = %format!("{err:#}"), "terminate failed");
                }
            }
        }
        warn!(not_started = self.queue.len(), "training was interrupted");
        self.finish(ScheduleStop::Interrupted)
    }

    fn finish(self, stop: ScheduleStop) -> ScheduleOutcome {
        ScheduleOutcome {
            stop,
            launched: self.launched,
            succeeded: self.succeeded,
            failed: self.failed,
            stopped_early: self.stopped_early,
            not_started: self.queue.len(),
        }
    }
}
