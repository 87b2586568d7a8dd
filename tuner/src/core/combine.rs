//! Cross-entity combination into launchable jobs.
//!
//! Every variant of every entity is paired with every variant of every other
//! entity. The job count is the product of the per-entity variant counts and
//! is intentionally not capped.

use std::fmt;

use anyhow::{Result, anyhow};
use tracing::info;

use crate::core::expand::{Choice, Entity};
use crate::core::node::{ConfigMap, ConfigNode};
use crate::core::product::{index_tuples, tuple_count};
use crate::core::stop::{StopBound, merge_unique};

/// Raised when the produced job count disagrees with the expected product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionMismatch {
    pub expected: usize,
    pub actual: usize,
}

impl fmt::Display for ExpansionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wrong number of job configs {}, should be {}",
            self.actual, self.expected
        )
    }
}

impl std::error::Error for ExpansionMismatch {}

/// The variant of one entity present in a job.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPick {
    pub entity: String,
    /// Identifier under which this entity's metrics are reported.
    pub composite_id: String,
    pub choices: Vec<Choice>,
}

/// One fully expanded configuration covering all entities.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub ordinal: usize,
    /// `{base}-{ordinal}`, passed to the trainer.
    pub run_id: String,
    pub document: ConfigMap,
    pub picks: Vec<EntityPick>,
}

impl Job {
    pub fn composite_ids(&self) -> Vec<String> {
        self.picks.iter().map(|p| p.composite_id.clone()).collect()
    }
}

/// All jobs of one expansion plus the deduplicated stop bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPlan {
    pub jobs: Vec<Job>,
    pub stops: Vec<StopBound>,
}

pub fn run_id(base: &str, ordinal: usize) -> String {
    format!("{base}-{ordinal}")
}

pub fn composite_id(base: &str, ordinal: usize, entity: &str) -> String {
    format!("{}/{entity}", run_id(base, ordinal))
}

/// Combine entity variants into jobs.
///
/// `frame` is the top-level document every job starts from; the combined
/// entity documents are inserted into it under `section`, keeping the
/// section's position if `frame` already holds it.
pub fn combine(base_run_id: &str, frame: &ConfigMap, section: &str, entities: &[Entity]) -> Result<JobPlan> {
    let sizes: Vec<usize> = entities.iter().map(|e| e.variants.len()).collect();
    let expected = tuple_count(&sizes)
        .ok_or_else(|| anyhow!("job count overflows for variant counts {sizes:?}"))?;

    let mut jobs = Vec::with_capacity(expected);
    for (ordinal, tuple) in index_tuples(&sizes).into_iter().enumerate() {
        let mut combined = ConfigMap::new();
        let mut picks = Vec::with_capacity(entities.len());
        for (entity, &index) in entities.iter().zip(&tuple) {
            let variant = &entity.variants[index];
            combined.insert(entity.name.clone(), ConfigNode::Map(variant.document.clone()));
            picks.push(EntityPick {
                entity: entity.name.clone(),
                composite_id: composite_id(base_run_id, ordinal, &entity.name),
                choices: variant.choices.clone(),
            });
        }
        let mut document = frame.clone();
        document.insert(section, ConfigNode::Map(combined));
        jobs.push(Job {
            ordinal,
            run_id: run_id(base_run_id, ordinal),
            document,
            picks,
        });
    }

    if jobs.len() != expected {
        return Err(ExpansionMismatch {
            expected,
            actual: jobs.len(),
        }
        .into());
    }

    let mut stops = Vec::new();
    for entity in entities {
        merge_unique(&mut stops, &entity.stops);
    }

    info!(jobs = jobs.len(), stops = stops.len(), "training runs queued");
    Ok(JobPlan { jobs, stops })
}

/// Render the human-readable index of which values produced each job.
pub fn describe(jobs: &[Job]) -> String {
    let mut out = String::new();
    for (i, job) in jobs.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("{}\n", job.run_id));
        for pick in &job.picks {
            out.push_str(&format!("- {} ({})\n", pick.entity, pick.composite_id));
            if pick.choices.is_empty() {
                out.push_str("  - no value options\n");
            }
            for choice in &pick.choices {
                out.push_str(&format!("  - {}: {}\n", choice.param, choice.value));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::core::expand::Variant;
    use crate::test_support::doc;

    fn entity(name: &str, values: &[i64], stop_tag: Option<&str>) -> Entity {
        Entity {
            name: name.to_string(),
            variants: values
                .iter()
                .map(|v| Variant {
                    document: doc(&format!("units: {v}\n")),
                    choices: vec![Choice {
                        param: "units".to_string(),
                        value: ConfigNode::int(*v),
                    }],
                })
                .collect(),
            stops: stop_tag
                .map(|tag| vec![StopBound::new(tag, Some(0.0), None, None)])
                .unwrap_or_default(),
        }
    }

    #[test]
    fn three_by_two_yields_six_distinct_jobs() {
        let entities = vec![entity("A", &[1, 2, 3], None), entity("B", &[10, 20], None)];
        let plan = combine("run", &ConfigMap::new(), "behaviors", &entities).expect("combine");
        assert_eq!(plan.jobs.len(), 6);

        let ids: Vec<String> = plan.jobs.iter().flat_map(Job::composite_ids).collect();
        let unique: BTreeSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        assert_eq!(plan.jobs[4].composite_ids(), vec!["run-4/A", "run-4/B"]);
        assert_eq!(plan.jobs[4].run_id, "run-4");
    }

    #[test]
    fn last_entity_varies_fastest() {
        let entities = vec![entity("A", &[1, 2], None), entity("B", &[10, 20], None)];
        let plan = combine("run", &ConfigMap::new(), "behaviors", &entities).expect("combine");
        let picked: Vec<(String, String)> = plan
            .jobs
            .iter()
            .map(|job| {
                (
                    job.picks[0].choices[0].value.to_string(),
                    job.picks[1].choices[0].value.to_string(),
                )
            })
            .collect();
        assert_eq!(
            picked,
            vec![
                ("1".to_string(), "10".to_string()),
                ("1".to_string(), "20".to_string()),
                ("2".to_string(), "10".to_string()),
                ("2".to_string(), "20".to_string()),
            ]
        );
    }

    #[test]
    fn documents_merge_under_section_inside_frame() {
        let frame = doc("env_settings:\n  env_path: build\nbehaviors: {}\nengine_settings:\n  time_scale: 20\n");
        let entities = vec![entity("A", &[1], None), entity("B", &[2], None)];
        let plan = combine("run", &frame, "behaviors", &entities).expect("combine");
        assert_eq!(
            plan.jobs[0].document,
            doc(
                "env_settings:\n  env_path: build\nbehaviors:\n  A:\n    units: 1\n  B:\n    units: 2\nengine_settings:\n  time_scale: 20\n"
            )
        );
    }

    #[test]
    fn stops_are_deduplicated_by_tag() {
        let entities = vec![
            entity("A", &[1], Some("reward")),
            entity("B", &[2], Some("reward")),
            entity("C", &[3], Some("length")),
        ];
        let plan = combine("run", &ConfigMap::new(), "behaviors", &entities).expect("combine");
        let tags: Vec<&str> = plan.stops.iter().map(|s| s.tag.as_str()).collect();
        assert_eq!(tags, vec!["reward", "length"]);
    }

    #[test]
    fn description_lists_ids_and_values() {
        let mut plain = entity("B", &[0], None);
        plain.variants[0].choices.clear();
        let entities = vec![entity("A", &[1, 2], None), plain];
        let plan = combine("ppo", &ConfigMap::new(), "behaviors", &entities).expect("combine");
        let text = describe(&plan.jobs);
        assert_eq!(
            text,
            "ppo-0\n- A (ppo-0/A)\n  - units: 1\n- B (ppo-0/B)\n  - no value options\n\n\
             ppo-1\n- A (ppo-1/A)\n  - units: 2\n- B (ppo-1/B)\n  - no value options\n"
        );
    }

    #[test]
    fn mismatch_error_is_downcastable() {
        let err: anyhow::Error = ExpansionMismatch {
            expected: 6,
            actual: 5,
        }
        .into();
        let mismatch = err.downcast_ref::<ExpansionMismatch>().expect("downcast");
        assert_eq!(mismatch.expected, 6);
        assert!(err.to_string().contains("should be 6"));
    }
}
