//! Test-only helpers: document fixtures and scripted stand-ins for the
//! trainer launcher and the metrics service.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Result, bail};
use tempfile::TempDir;

use crate::core::combine::{composite_id, run_id};
use crate::core::node::ConfigMap;
use crate::core::stop::ScalarPoint;
use crate::io::document::parse_document;
use crate::io::interrupt::Interrupt;
use crate::io::metrics::MetricsSource;
use crate::io::process::{LaunchRequest, Launcher, RunExit, RunHandle};
use crate::plan::PlannedRun;

/// Parse an inline YAML document, panicking on invalid input.
pub fn doc(yaml: &str) -> ConfigMap {
    parse_document(yaml).expect("test document should parse")
}

/// `count` dispatchable runs whose composite ids cover `entities`.
pub fn planned_runs(base: &str, count: usize, entities: &[&str]) -> Vec<PlannedRun> {
    (0..count)
        .map(|n| PlannedRun {
            ordinal: n,
            run_id: run_id(base, n),
            composite_ids: entities
                .iter()
                .map(|entity| composite_id(base, n, entity))
                .collect(),
            config_path: PathBuf::from(format!("job-{n}.yaml")),
        })
        .collect()
}

/// A temporary directory holding one configuration document.
pub struct SweepFixture {
    pub dir: TempDir,
    pub document: PathBuf,
}

impl SweepFixture {
    /// Write `yaml` as `{name}` inside a fresh temporary directory.
    pub fn new(name: &str, yaml: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let document = dir.path().join(name);
        fs::write(&document, yaml).expect("write document fixture");
        Self { dir, document }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Metrics keyed by `(run, tag)`; `latest` returns the last scripted point.
#[derive(Debug, Default)]
pub struct ScriptedMetrics {
    series: HashMap<(String, String), Vec<ScalarPoint>>,
}

impl ScriptedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add points as `(wall_time, step, value)` triples.
    pub fn series(mut self, run: &str, tag: &str, points: &[(f64, u64, f64)]) -> Self {
        let points = points
            .iter()
            .map(|&(wall_time, step, value)| ScalarPoint {
                wall_time,
                step,
                value,
            })
            .collect();
        self.series.insert((run.to_string(), tag.to_string()), points);
        self
    }
}

impl MetricsSource for ScriptedMetrics {
    fn latest(&self, run: &str, tag: &str) -> Option<ScalarPoint> {
        self.series
            .get(&(run.to_string(), tag.to_string()))
            .and_then(|points| points.last().copied())
    }
}

/// Observable events from [`ScriptedLauncher`] and its handles, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchEvent {
    Launched { ordinal: usize, slot: usize, port: u16 },
    Polled { ordinal: usize },
    Terminated { ordinal: usize },
}

type EventLog = Rc<RefCell<Vec<LaunchEvent>>>;

/// Launcher whose runs follow per-ordinal exit scripts.
///
/// Each poll consumes one script entry. A run with an exhausted (or missing)
/// script keeps running until terminated.
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    scripts: RefCell<HashMap<usize, VecDeque<Option<RunExit>>>>,
    failing: HashSet<usize>,
    interrupt_after: Option<(usize, Interrupt)>,
    launches: RefCell<usize>,
    events: EventLog,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, ordinal: usize, polls: &[Option<RunExit>]) -> Self {
        self.scripts
            .borrow_mut()
            .insert(ordinal, polls.iter().copied().collect());
        self
    }

    /// Make the launch of `ordinal` fail.
    pub fn fail_launch(mut self, ordinal: usize) -> Self {
        self.failing.insert(ordinal);
        self
    }

    /// Trigger `interrupt` once `launches` runs have started.
    pub fn interrupt_after(mut self, launches: usize, interrupt: Interrupt) -> Self {
        self.interrupt_after = Some((launches, interrupt));
        self
    }

    pub fn events(&self) -> Vec<LaunchEvent> {
        self.events.borrow().clone()
    }
}

impl Launcher for ScriptedLauncher {
    type Handle = ScriptedRun;

    fn launch(&self, request: &LaunchRequest) -> Result<ScriptedRun> {
        if self.failing.contains(&request.ordinal) {
            bail!("scripted launch failure for {}", request.run_id);
        }
        self.events.borrow_mut().push(LaunchEvent::Launched {
            ordinal: request.ordinal,
            slot: request.slot,
            port: request.port,
        });
        let launched = {
            let mut launches = self.launches.borrow_mut();
            *launches += 1;
            *launches
        };
        if let Some((after, interrupt)) = &self.interrupt_after {
            if launched >= *after {
                interrupt.trigger();
            }
        }
        let script = self
            .scripts
            .borrow_mut()
            .remove(&request.ordinal)
            .unwrap_or_default();
        Ok(ScriptedRun {
            ordinal: request.ordinal,
            script,
            events: Rc::clone(&self.events),
        })
    }
}

/// Handle produced by [`ScriptedLauncher`].
#[derive(Debug)]
pub struct ScriptedRun {
    ordinal: usize,
    script: VecDeque<Option<RunExit>>,
    events: EventLog,
}

impl RunHandle for ScriptedRun {
    fn try_exit(&mut self) -> Result<Option<RunExit>> {
        self.events.borrow_mut().push(LaunchEvent::Polled {
            ordinal: self.ordinal,
        });
        Ok(self.script.pop_front().flatten())
    }

    fn terminate(&mut self) -> Result<()> {
        self.events.borrow_mut().push(LaunchEvent::Terminated {
            ordinal: self.ordinal,
        });
        Ok(())
    }
}
