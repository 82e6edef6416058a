//! `substitute`: replaces a node's content with a configured literal.
//! Scalar literals replace a primitive's value; an object literal shaped
//! like an `ElementNode` fragment (`{"value":..., "children":[...]}`)
//! replaces a compound node's own subtree. This is a deliberately bounded
//! reading of "a structured subtree which must conform to the target
//! node's schema type" — see DESIGN.md.

use super::{ProcessorContext, ProcessorOutput};
use crate::error::AnonymizeError;
use crate::model::{ElementNode, NodePath};
use serde_json::Value;

pub struct Substitute;

impl super::Processor for Substitute {
    fn method_name(&self) -> &'static str {
        "substitute"
    }

    fn process(
        &self,
        node: &mut ElementNode,
        _path: &NodePath,
        _ctx: &mut ProcessorContext<'_>,
        settings: &serde_json::Map<String, Value>,
    ) -> Result<ProcessorOutput, AnonymizeError> {
        if node.value.is_none() && node.children.is_empty() {
            return Ok(ProcessorOutput::no_op());
        }

        let Some(replacement) = settings.get("replaceWith") else {
            return Err(AnonymizeError::Configuration(
                "substitute rule requires a replaceWith setting".into(),
            ));
        };

        match replacement {
            Value::Object(obj) => {
                if let Some(value) = obj.get("value") {
                    node.value = Some(value.clone());
                }
                if let Some(Value::Array(children)) = obj.get("children") {
                    let parsed: Result<Vec<ElementNode>, _> = children
                        .iter()
                        .cloned()
                        .map(serde_json::from_value)
                        .collect();
                    node.children = parsed.map_err(|e| {
                        AnonymizeError::Configuration(format!(
                            "substitute replacement children do not match the node schema: {e}"
                        ))
                    })?;
                }
            }
            scalar => {
                node.value = Some(scalar.clone());
            }
        }

        Ok(ProcessorOutput::applied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::Processor;
    use std::collections::HashSet;

    #[test]
    fn scalar_replacement_sets_value() {
        let mut node = ElementNode::new_leaf("string", "family", "Doe".into());
        let snapshot = node.clone();
        let key_store = crate::keystore::KeyStore::new(
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            &[],
        )
        .unwrap();
        let budget = crate::budget::BudgetAccountant::new();
        let rng = crate::rng::SecureRng::new();
        let mut visited: HashSet<NodePath> = HashSet::new();
        let params = crate::config::Parameters::default();
        let mut ctx = ProcessorContext {
            resource_id: "p1",
            subject_id: "p1",
            key_store: &key_store,
            budget: &budget,
            rng: &rng,
            resource_snapshot: &snapshot,
            visited: &mut visited,
            advanced_composition: false,
            global_parameters: &params,
        };
        let mut settings = serde_json::Map::new();
        settings.insert("replaceWith".into(), Value::String("ANONYMOUS".into()));
        Substitute
            .process(&mut node, &NodePath::root(), &mut ctx, &settings)
            .unwrap();
        assert_eq!(node.value_as_str(), Some("ANONYMOUS"));
    }

    #[test]
    fn already_empty_node_is_a_no_op() {
        let mut node = ElementNode::new_compound("HumanName", "name");
        let snapshot = node.clone();
        let key_store = crate::keystore::KeyStore::new(
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            &[],
        )
        .unwrap();
        let budget = crate::budget::BudgetAccountant::new();
        let rng = crate::rng::SecureRng::new();
        let mut visited: HashSet<NodePath> = HashSet::new();
        let params = crate::config::Parameters::default();
        let mut ctx = ProcessorContext {
            resource_id: "p1",
            subject_id: "p1",
            key_store: &key_store,
            budget: &budget,
            rng: &rng,
            resource_snapshot: &snapshot,
            visited: &mut visited,
            advanced_composition: false,
            global_parameters: &params,
        };
        let mut settings = serde_json::Map::new();
        settings.insert("replaceWith".into(), Value::String("ANONYMOUS".into()));
        let out = Substitute
            .process(&mut node, &NodePath::root(), &mut ctx, &settings)
            .unwrap();
        assert!(!out.delete_node);
        assert_eq!(out.outcome, Some(crate::processors::OutcomeKind::NoOp));
        assert!(node.value.is_none());
    }
}
