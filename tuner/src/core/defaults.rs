//! Merging of shared `default_settings` into entity documents.

use crate::core::node::{ConfigMap, ConfigNode};

/// Fill keys missing from `entity` with values from `defaults`, recursing where
/// both sides hold mappings. Entity values always win.
pub fn apply_defaults(entity: &ConfigMap, defaults: &ConfigMap) -> ConfigMap {
    let mut merged = entity.clone();
    for (key, default) in defaults.iter() {
        let value = match (entity.get(key), default) {
            (None, _) => default.clone(),
            (Some(ConfigNode::Map(own)), ConfigNode::Map(shared)) => {
                ConfigNode::Map(apply_defaults(own, shared))
            }
            (Some(_), _) => continue,
        };
        merged.insert(key, value);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::doc;

    #[test]
    fn entity_values_win_and_gaps_are_filled() {
        let defaults = doc("trainer: ppo\nhyperparameters:\n  batch_size: 64\n  beta: 0.005\nmax_steps: 1000\n");
        let entity = doc("hyperparameters:\n  beta: 0.01\nmax_steps: 50\n");

        let merged = apply_defaults(&entity, &defaults);
        assert_eq!(
            merged,
            doc("hyperparameters:\n  beta: 0.01\n  batch_size: 64\nmax_steps: 50\ntrainer: ppo\n")
        );
    }

    #[test]
    fn option_fields_in_defaults_are_copied() {
        let defaults = doc("hyperparameters:\n  gamma:\n    opt_values: [0.9, 0.99]\n");
        let entity = doc("hyperparameters:\n  beta: 0.01\n");

        let merged = apply_defaults(&entity, &defaults);
        let hyper = merged
            .get("hyperparameters")
            .and_then(ConfigNode::as_map)
            .expect("hyperparameters");
        assert!(hyper.contains_key("gamma"));
    }

    #[test]
    fn scalar_does_not_absorb_mapping_default() {
        let defaults = doc("network:\n  hidden_units: 128\n");
        let entity = doc("network: none\n");
        assert_eq!(apply_defaults(&entity, &defaults), entity);
    }
}
