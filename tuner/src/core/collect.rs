//! Extraction of option lists and stop conditions from an entity document.

use anyhow::{Context, Result, anyhow, bail};
use tracing::{info, warn};

use crate::core::keys::{is_reserved, simple_key};
use crate::core::node::{ConfigMap, ConfigNode};
use crate::core::stop::StopBound;

/// Key marker for a list of candidate values.
pub const OPTION_MARKER: &str = "opt_values";
/// Key marker for a stop condition.
pub const STOP_MARKER: &str = "opt_stop";

/// Candidate values for the field identified by `key` (disambiguated).
#[derive(Debug, Clone, PartialEq)]
pub struct OptionField {
    pub key: String,
    pub values: Vec<ConfigNode>,
}

impl OptionField {
    /// The field name as written in the document.
    pub fn name(&self) -> &str {
        simple_key(&self.key)
    }
}

/// Result of walking an entity document.
#[derive(Debug, Clone, PartialEq)]
pub struct Collected {
    /// The document with every reserved field removed.
    pub residual: ConfigMap,
    pub options: Vec<OptionField>,
    pub stops: Vec<StopBound>,
}

/// Walk `doc` depth-first in declaration order, pulling out option and stop fields.
pub fn collect(doc: &ConfigMap) -> Result<Collected> {
    let mut collected = Collected {
        residual: ConfigMap::new(),
        options: Vec::new(),
        stops: Vec::new(),
    };
    collected.residual = walk(doc, None, &mut collected.options, &mut collected.stops)?;
    Ok(collected)
}

fn walk(
    doc: &ConfigMap,
    parent: Option<&str>,
    options: &mut Vec<OptionField>,
    stops: &mut Vec<StopBound>,
) -> Result<ConfigMap> {
    let mut residual = ConfigMap::new();
    for (key, value) in doc.iter() {
        if key.contains(OPTION_MARKER) {
            let parent = parent.ok_or_else(|| {
                anyhow!("`{key}` must be nested under the field it provides values for")
            })?;
            let values = value
                .as_list()
                .ok_or_else(|| anyhow!("`{}.{key}` must be a list, got {value}", simple_key(parent)))?;
            if values.is_empty() {
                bail!("`{}.{key}` must list at least one value", simple_key(parent));
            }
            let field = OptionField {
                key: parent.to_string(),
                values: values.to_vec(),
            };
            info!(param = field.name(), values = %value, "found config param option");
            options.push(field);
        } else if key.contains(STOP_MARKER) {
            let bound = StopBound::from_node(value).with_context(|| format!("parse `{key}`"))?;
            info!(%bound, "found stop condition");
            stops.push(bound);
        } else if is_reserved(key) {
            warn!(key, "dropping unrecognised reserved field");
        } else {
            let value = match value {
                ConfigNode::Map(map) => ConfigNode::Map(walk(map, Some(key), options, stops)?),
                other => other.clone(),
            };
            residual.insert(key, value);
        }
    }
    Ok(residual)
}
