//! Stop bounds: early-termination rules on externally reported metrics.

use std::fmt;

use anyhow::{Result, anyhow, bail};

use crate::core::node::{ConfigNode, Scalar};

/// Latest scalar reported for a run/tag pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarPoint {
    pub wall_time: f64,
    pub step: u64,
    pub value: f64,
}

/// A metric bound enforced once a run has reported at least `min_step` steps.
///
/// Equality is by `tag` only; bounds sharing a tag are treated as duplicates.
#[derive(Debug, Clone)]
pub struct StopBound {
    pub tag: String,
    pub min: f64,
    pub max: f64,
    pub min_step: u64,
}

impl PartialEq for StopBound {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
    }
}

impl fmt::Display for StopBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tag: {}, step: {}, min: {}, max: {}",
            self.tag, self.min_step, self.min, self.max
        )
    }
}

/// Why a run must stop.
#[derive(Debug, Clone, PartialEq)]
pub struct Breach {
    pub tag: String,
    pub reason: String,
}

impl StopBound {
    /// Build a bound; absent limits are unbounded and `max` is raised to `min`.
    pub fn new(tag: impl Into<String>, min: Option<f64>, max: Option<f64>, step: Option<u64>) -> Self {
        let min = min.unwrap_or(f64::NEG_INFINITY);
        let max = max.unwrap_or(f64::INFINITY).max(min);
        Self {
            tag: tag.into(),
            min,
            max,
            min_step: step.unwrap_or(0),
        }
    }

    /// Parse an `opt_stop` mapping: `tag` is required, `min`/`max`/`step` optional.
    pub fn from_node(node: &ConfigNode) -> Result<Self> {
        let map = node
            .as_map()
            .ok_or_else(|| anyhow!("stop condition must be a mapping, got {node}"))?;
        let tag = match map.get("tag").and_then(ConfigNode::as_scalar) {
            Some(Scalar::Str(tag)) if !tag.trim().is_empty() => tag.clone(),
            Some(Scalar::Null) | None => bail!("no tag found in stop condition"),
            Some(other) => other.to_string(),
        };
        let min = number_field(map.get("min"), "min")?;
        let max = number_field(map.get("max"), "max")?;
        let step = match number_field(map.get("step"), "step")? {
            Some(step) if step < 0.0 => bail!("stop condition step must be >= 0, got {step}"),
            Some(step) => Some(step as u64),
            None => None,
        };
        Ok(Self::new(tag, min, max, step))
    }

    /// Check the latest reported point against this bound.
    ///
    /// Points below `min_step` are never a breach.
    pub fn check(&self, point: &ScalarPoint) -> Option<Breach> {
        if point.step < self.min_step {
            return None;
        }
        let reason = if point.value < self.min {
            format!(
                "{}: {} < {} (lower bound) [step: {}]",
                self.tag, point.value, self.min, point.step
            )
        } else if point.value > self.max {
            format!(
                "{}: {} > {} (upper bound) [step: {}]",
                self.tag, point.value, self.max, point.step
            )
        } else {
            return None;
        };
        Some(Breach {
            tag: self.tag.clone(),
            reason,
        })
    }
}

fn number_field(node: Option<&ConfigNode>, name: &str) -> Result<Option<f64>> {
    match node {
        None | Some(ConfigNode::Scalar(Scalar::Null)) => Ok(None),
        Some(ConfigNode::Scalar(scalar)) => scalar
            .as_f64()
            .map(Some)
            .ok_or_else(|| anyhow!("stop condition {name} must be numeric, got {scalar}")),
        Some(other) => Err(anyhow!("stop condition {name} must be numeric, got {other}")),
    }
}

/// Append `bounds` to `into`, skipping tags already present.
pub fn merge_unique(into: &mut Vec<StopBound>, bounds: &[StopBound]) {
    for bound in bounds {
        if !into.contains(bound) {
            into.push(bound.clone());
        }
    }
}
