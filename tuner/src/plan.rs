//! Orchestration for expanding a configuration document into job files.
//!
//! Planning is pure up to the final write: the document is split into
//! entities, each entity is expanded into its variants, the variants are
//! combined across entities and only then are the job files and the
//! description file written. Nothing is launched here.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info};

use crate::core::combine::{JobPlan, combine, describe};
use crate::core::defaults::apply_defaults;
use crate::core::expand::VariantExpander;
use crate::core::node::{ConfigMap, ConfigNode};
use crate::core::stop::StopBound;
use crate::io::document::{load_document, write_document};

/// Top-level section holding the entity documents.
pub const ENTITY_SECTION: &str = "behaviors";
/// Top-level section merged into every entity.
pub const DEFAULTS_SECTION: &str = "default_settings";
/// File name of the description index.
pub const INFO_FILE: &str = "config_info.txt";

/// Build every job for `doc` without touching the filesystem.
pub fn build_plan(doc: &ConfigMap, base_run_id: &str) -> Result<JobPlan> {
    let entities = doc
        .get(ENTITY_SECTION)
        .ok_or_else(|| anyhow!("missing `{ENTITY_SECTION}` section"))?
        .as_map()
        .ok_or_else(|| anyhow!("`{ENTITY_SECTION}` must be a mapping"))?;
    if entities.is_empty() {
        bail!("`{ENTITY_SECTION}` must define at least one entry");
    }
    let defaults = match doc.get(DEFAULTS_SECTION) {
        None => None,
        Some(ConfigNode::Map(map)) => Some(map),
        Some(_) => bail!("`{DEFAULTS_SECTION}` must be a mapping"),
    };

    let mut expander = VariantExpander::new();
    let mut expanded = Vec::with_capacity(entities.len());
    for (name, node) in entities.iter() {
        let own = node
            .as_map()
            .ok_or_else(|| anyhow!("`{ENTITY_SECTION}.{name}` must be a mapping"))?;
        let merged = match defaults {
            Some(defaults) => apply_defaults(own, defaults),
            None => own.clone(),
        };
        let entity = expander
            .expand_entity(name, &merged)
            .with_context(|| format!("expand `{ENTITY_SECTION}.{name}`"))?;
        expanded.push(entity);
    }

    let frame: ConfigMap = doc
        .iter()
        .filter(|(key, _)| *key != DEFAULTS_SECTION)
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect();
    combine(base_run_id, &frame, ENTITY_SECTION, &expanded)
}

/// A job written to disk and ready to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRun {
    pub ordinal: usize,
    pub run_id: String,
    pub composite_ids: Vec<String>,
    pub config_path: PathBuf,
}

/// Result of planning a document on disk.
#[derive(Debug, Clone)]
pub struct WrittenPlan {
    pub runs: Vec<PlannedRun>,
    pub stops: Vec<StopBound>,
    pub info_path: PathBuf,
    pub out_dir: PathBuf,
}

/// Load `document`, expand it and write one YAML file per job plus the
/// description file into `out_dir` (default: the document's directory).
pub fn write_plan(document: &Path, base_run_id: &str, out_dir: Option<&Path>) -> Result<WrittenPlan> {
    let doc = load_document(document)?;
    let stem = document
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("document path has no file name: {}", document.display()))?;
    let out_dir = match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => document
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    debug!(document = %document.display(), out_dir = %out_dir.display(), "planning");

    let plan = build_plan(&doc, base_run_id).with_context(|| format!("plan {}", document.display()))?;

    fs::create_dir_all(&out_dir).with_context(|| format!("create {}", out_dir.display()))?;
    let info_path = out_dir.join(INFO_FILE);
    fs::write(&info_path, describe(&plan.jobs))
        .with_context(|| format!("write {}", info_path.display()))?;

    let mut runs = Vec::with_capacity(plan.jobs.len());
    for job in &plan.jobs {
        let config_path = out_dir.join(format!("{stem}-{}.yaml", job.ordinal));
        write_document(&config_path, &job.document)?;
        runs.push(PlannedRun {
            ordinal: job.ordinal,
            run_id: job.run_id.clone(),
            composite_ids: job.composite_ids(),
            config_path,
        });
    }

    info!(
        runs = runs.len(),
        info = %info_path.display(),
        "training runs planned"
    );
    Ok(WrittenPlan {
        runs,
        stops: plan.stops,
        info_path,
        out_dir,
    })
}
