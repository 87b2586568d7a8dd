//! Key disambiguation for variant expansion.
//!
//! The same key name may appear at several depths of one entity document
//! (`hyperparameters.learning_rate` and `reward_signals.curiosity.learning_rate`).
//! Option substitution addresses fields by key, so every key is first made
//! unique by appending a counter suffix and restored afterwards.

use crate::core::node::{ConfigMap, ConfigNode};

/// Separator between a key and its disambiguation counter.
pub const SUFFIX_JOIN: &str = "___";

/// Substring marking keys reserved for option and stop fields.
pub const RESERVED_MARKER: &str = "opt_";

/// Single-use key renamer. The counter is owned by the instance, so separate
/// expansions never share state; it only ever increases.
#[derive(Debug, Default)]
pub struct KeyDisambiguator {
    counter: u64,
}

impl KeyDisambiguator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of `doc` with every non-reserved key suffixed by a unique
    /// counter. Reserved keys and everything nested under them are left as is.
    pub fn disambiguate(&mut self, doc: &ConfigMap) -> ConfigMap {
        self.walk(doc, false)
    }

    fn walk(&mut self, doc: &ConfigMap, exempt: bool) -> ConfigMap {
        let mut result = ConfigMap::new();
        for (key, value) in doc.iter() {
            let exempt_here = exempt || is_reserved(key);
            let value = match value {
                ConfigNode::Map(map) => ConfigNode::Map(self.walk(map, exempt_here)),
                other => other.clone(),
            };
            if exempt_here {
                result.insert(key, value);
            } else {
                self.counter += 1;
                result.insert(format!("{key}{SUFFIX_JOIN}{}", self.counter), value);
            }
        }
        result
    }
}

/// Strip the disambiguation suffix from every key, recursively.
pub fn restore(doc: &ConfigMap) -> ConfigMap {
    doc.iter()
        .map(|(key, value)| {
            let value = match value {
                ConfigNode::Map(map) => ConfigNode::Map(restore(map)),
                other => other.clone(),
            };
            (simple_key(key).to_string(), value)
        })
        .collect()
}

/// The key name without its disambiguation suffix.
pub fn simple_key(key: &str) -> &str {
    key.split(SUFFIX_JOIN).next().unwrap_or(key)
}

pub fn is_reserved(key: &str) -> bool {
    key.contains(RESERVED_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::doc;

    #[test]
    fn restore_inverts_disambiguate() {
        let original = doc(
            "trainer: ppo\nhyperparameters:\n  learning_rate: 0.001\n  batch_size: 64\nreward_signals:\n  extrinsic:\n    learning_rate: 0.5\n",
        );
        let mut keys = KeyDisambiguator::new();
        let unique = keys.disambiguate(&original);
        assert_ne!(unique, original);
        assert_eq!(restore(&unique), original);
    }

    #[test]
    fn repeated_names_become_distinct() {
        let original = doc("a:\n  lr: 1\nb:\n  lr: 2\n");
        let mut keys = KeyDisambiguator::new();
        let unique = keys.disambiguate(&original);

        let mut nested = Vec::new();
        for (_, value) in unique.iter() {
            let map = value.as_map().expect("map");
            nested.extend(map.keys().map(str::to_string));
        }
        assert_eq!(nested.len(), 2);
        assert_ne!(nested[0], nested[1]);
        assert!(nested.iter().all(|k| simple_key(k) == "lr"));
    }

    #[test]
    fn reserved_subtrees_are_untouched() {
        let original = doc("beta:\n  opt_values: [1, 2]\nopt_stop:\n  tag: reward\n  min: 0\n");
        let mut keys = KeyDisambiguator::new();
        let unique = keys.disambiguate(&original);

        let stop = unique.get("opt_stop").and_then(ConfigNode::as_map).expect("stop kept");
        assert!(stop.contains_key("tag"));
        assert!(stop.contains_key("min"));

        let (beta_key, beta) = unique.iter().next().expect("beta");
        assert_ne!(beta_key, "beta");
        assert!(beta.as_map().expect("map").contains_key("opt_values"));
    }

    #[test]
    fn counter_continues_across_calls() {
        let original = doc("a: 1\n");
        let mut keys = KeyDisambiguator::new();
        let first = keys.disambiguate(&original);
        let second = keys.disambiguate(&original);
        assert_ne!(first, second);
        assert_eq!(restore(&first), restore(&second));
    }
}
