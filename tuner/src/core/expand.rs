//! Expansion of one entity document into its concrete variants.
//!
//! Pipeline per entity: disambiguate keys, collect option/stop fields, take the
//! Cartesian product of the option values, substitute each combination into
//! the residual document and restore the original key names.

use anyhow::Result;
use tracing::debug;

use crate::core::collect::{OptionField, collect};
use crate::core::keys::{KeyDisambiguator, restore};
use crate::core::node::{ConfigMap, ConfigNode};
use crate::core::product::index_tuples;
use crate::core::stop::StopBound;

/// One chosen parameter value, named by its simple key.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub param: String,
    pub value: ConfigNode,
}

/// One concrete configuration of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub document: ConfigMap,
    /// Empty when the entity declares no option fields.
    pub choices: Vec<Choice>,
}

/// A named entity with all of its variants, in enumeration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub name: String,
    pub variants: Vec<Variant>,
    pub stops: Vec<StopBound>,
}

/// Produce one document per combination of option values.
///
/// `residual` and the option keys must come from the same disambiguated
/// document. The first option varies slowest. Keys are restored before return;
/// with no options the result is the residual alone.
pub fn expand(residual: &ConfigMap, options: &[OptionField]) -> Vec<ConfigMap> {
    combinations(options)
        .iter()
        .map(|combo| restore(&substitute(residual, options, combo)))
        .collect()
}

/// Every combination of option values, first option slowest.
pub fn combinations(options: &[OptionField]) -> Vec<Vec<&ConfigNode>> {
    let sizes: Vec<usize> = options.iter().map(|o| o.values.len()).collect();
    index_tuples(&sizes)
        .into_iter()
        .map(|tuple| {
            tuple
                .iter()
                .zip(options)
                .map(|(&i, option)| &option.values[i])
                .collect()
        })
        .collect()
}

/// Replace every field keyed by an option with that option's chosen value.
pub fn substitute(doc: &ConfigMap, options: &[OptionField], combo: &[&ConfigNode]) -> ConfigMap {
    doc.iter()
        .map(|(key, value)| {
            let value = match options.iter().position(|o| o.key == key) {
                Some(i) => combo[i].clone(),
                None => match value {
                    ConfigNode::Map(map) => ConfigNode::Map(substitute(map, options, combo)),
                    other => other.clone(),
                },
            };
            (key.to_string(), value)
        })
        .collect()
}

/// Single-use expander; owns the key counter for every entity it expands.
#[derive(Debug, Default)]
pub struct VariantExpander {
    keys: KeyDisambiguator,
}

impl VariantExpander {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand one entity document into its variants and stop bounds.
    pub fn expand_entity(&mut self, name: &str, doc: &ConfigMap) -> Result<Entity> {
        let unique = self.keys.disambiguate(doc);
        let collected = collect(&unique)?;

        // With no options there is exactly one (empty) combination.
        let documents = expand(&collected.residual, &collected.options);
        let variants: Vec<Variant> = documents
            .into_iter()
            .zip(combinations(&collected.options))
            .map(|(document, combo)| Variant {
                document,
                choices: collected
                    .options
                    .iter()
                    .zip(combo)
                    .map(|(option, value)| Choice {
                        param: option.name().to_string(),
                        value: value.clone(),
                    })
                    .collect(),
            })
            .collect();

        debug!(
            entity = name,
            options = collected.options.len(),
            variants = variants.len(),
            "expanded entity"
        );
        Ok(Entity {
            name: name.to_string(),
            variants,
            stops: collected.stops,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::doc;

    fn floats(values: &[f64]) -> Vec<ConfigNode> {
        values.iter().map(|v| ConfigNode::float(*v)).collect()
    }

    #[test]
    fn produces_product_of_option_sizes_in_row_major_order() {
        let input = doc(
            "hyperparameters:\n  beta:\n    opt_values: [0.1, 0.2]\n  gamma:\n    opt_values: [0.8, 0.9, 0.99]\n  lambd: 0.95\n",
        );
        let entity = VariantExpander::new()
            .expand_entity("Walker", &input)
            .expect("expand");
        assert_eq!(entity.variants.len(), 6);

        let picked: Vec<(String, String)> = entity
            .variants
            .iter()
            .map(|v| (v.choices[0].value.to_string(), v.choices[1].value.to_string()))
            .collect();
        assert_eq!(picked[0], ("0.1".to_string(), "0.8".to_string()));
        assert_eq!(picked[1], ("0.1".to_string(), "0.9".to_string()));
        assert_eq!(picked[3], ("0.2".to_string(), "0.8".to_string()));
        assert_eq!(picked[5], ("0.2".to_string(), "0.99".to_string()));

        let last = &entity.variants[5].document;
        assert_eq!(
            *last,
            doc("hyperparameters:\n  beta: 0.2\n  gamma: 0.99\n  lambd: 0.95\n")
        );
    }

    #[test]
    fn same_name_at_different_depths_varies_independently() {
        let input = doc(
            "hyperparameters:\n  learning_rate:\n    opt_values: [1, 2]\n\
             reward_signals:\n  curiosity:\n    learning_rate:\n      opt_values: [3, 4]\n",
        );
        let entity = VariantExpander::new()
            .expand_entity("Crawler", &input)
            .expect("expand");
        assert_eq!(entity.variants.len(), 4);
        assert_eq!(
            entity.variants[1].document,
            doc("hyperparameters:\n  learning_rate: 1\nreward_signals:\n  curiosity:\n    learning_rate: 4\n")
        );
    }

    #[test]
    fn no_options_yields_residual_only() {
        let input = doc("trainer: sac\nopt_stop:\n  tag: reward\n  min: 0\n");
        let entity = VariantExpander::new()
            .expand_entity("Ball", &input)
            .expect("expand");
        assert_eq!(entity.variants.len(), 1);
        assert!(entity.variants[0].choices.is_empty());
        assert_eq!(entity.variants[0].document, doc("trainer: sac\n"));
        assert_eq!(entity.stops.len(), 1);
    }

    #[test]
    fn expand_without_options_returns_residual() {
        let residual = doc("a: 1\n");
        assert_eq!(expand(&residual, &[]), vec![residual]);
    }

    #[test]
    fn expand_substitutes_and_restores() {
        let mut keys = KeyDisambiguator::new();
        let unique = keys.disambiguate(&doc("beta:\n  opt_values: [0.5, 0.25]\n"));
        let collected = collect(&unique).expect("collect");
        let docs = expand(&collected.residual, &collected.options);
        assert_eq!(docs, vec![doc("beta: 0.5\n"), doc("beta: 0.25\n")]);
        assert_eq!(collected.options[0].values, floats(&[0.5, 0.25]));
    }

    #[test]
    fn variant_documents_carry_their_recorded_choices() {
        let input = doc("units:\n  opt_values: [64, 128]\nlayers:\n  opt_values: [1, 2, 3]\n");
        let entity = VariantExpander::new()
            .expand_entity("Pusher", &input)
            .expect("expand");
        assert_eq!(entity.variants.len(), 6);
        for variant in &entity.variants {
            for choice in &variant.choices {
                assert_eq!(variant.document.get(&choice.param), Some(&choice.value));
            }
        }
        assert_eq!(entity.variants[4].document, doc("units: 128\nlayers: 2\n"));
    }
}
