//! YAML load/save for configuration documents.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde_yaml::{Mapping, Number, Value};
use tracing::debug;

use crate::core::node::{ConfigMap, ConfigNode, Scalar};

/// Parse a YAML document whose root must be a mapping.
pub fn parse_document(raw: &str) -> Result<ConfigMap> {
    let value: Value = serde_yaml::from_str(raw).context("parse yaml")?;
    match from_yaml(&value)? {
        ConfigNode::Map(map) => Ok(map),
        other => Err(anyhow!("document root must be a mapping, got {other}")),
    }
}

/// Load a YAML configuration document from disk.
pub fn load_document(path: &Path) -> Result<ConfigMap> {
    debug!(path = %path.display(), "loading document");
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_document(&raw).with_context(|| format!("parse {}", path.display()))
}

/// Serialize a document to YAML text.
pub fn render_document(doc: &ConfigMap) -> Result<String> {
    serde_yaml::to_string(&map_to_yaml(doc)).context("serialize yaml")
}

/// Write a document as YAML, creating parent directories.
pub fn write_document(path: &Path, doc: &ConfigMap) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let payload = render_document(doc)?;
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))
}

/// Convert a parsed YAML value into a configuration node.
pub fn from_yaml(value: &Value) -> Result<ConfigNode> {
    let node = match value {
        Value::Null => ConfigNode::Scalar(Scalar::Null),
        Value::Bool(v) => ConfigNode::Scalar(Scalar::Bool(*v)),
        Value::Number(n) => ConfigNode::Scalar(number_to_scalar(n)?),
        Value::String(s) => ConfigNode::Scalar(Scalar::Str(s.clone())),
        Value::Sequence(items) => {
            ConfigNode::List(items.iter().map(from_yaml).collect::<Result<Vec<_>>>()?)
        }
        Value::Mapping(mapping) => {
            let mut map = ConfigMap::new();
            for (key, value) in mapping {
                let key = match key {
                    Value::String(key) => key.clone(),
                    other => bail!("mapping keys must be strings, got {other:?}"),
                };
                map.insert(key, from_yaml(value)?);
            }
            ConfigNode::Map(map)
        }
        Value::Tagged(tagged) => bail!("tagged values are not supported ({})", tagged.tag),
    };
    Ok(node)
}

fn number_to_scalar(n: &Number) -> Result<Scalar> {
    if let Some(v) = n.as_i64() {
        Ok(Scalar::Int(v))
    } else if let Some(v) = n.as_f64() {
        Ok(Scalar::Float(v))
    } else {
        Err(anyhow!("number out of range: {n}"))
    }
}

/// Convert a configuration node back into a YAML value.
pub fn to_yaml(node: &ConfigNode) -> Value {
    match node {
        ConfigNode::Scalar(Scalar::Null) => Value::Null,
        ConfigNode::Scalar(Scalar::Bool(v)) => Value::Bool(*v),
        ConfigNode::Scalar(Scalar::Int(v)) => Value::Number((*v).into()),
        ConfigNode::Scalar(Scalar::Float(v)) => Value::Number((*v).into()),
        ConfigNode::Scalar(Scalar::Str(s)) => Value::String(s.clone()),
        ConfigNode::List(items) => Value::Sequence(items.iter().map(to_yaml).collect()),
        ConfigNode::Map(map) => map_to_yaml(map),
    }
}

fn map_to_yaml(map: &ConfigMap) -> Value {
    let mut mapping = Mapping::new();
    for (key, value) in map.iter() {
        mapping.insert(Value::String(key.to_string()), to_yaml(value));
    }
    Value::Mapping(mapping)
}
