//! `kanonymity`: marks a node with the equivalence-class identity derived
//! from a configured set of quasi-identifier paths (read from a snapshot
//! of the whole resource, since quasi-identifiers are typically spread
//! across several fields, not just the matched node itself).

use super::{ProcessorContext, ProcessorOutput};
use crate::error::AnonymizeError;
use crate::model::{ElementNode, NodePath};
use serde_json::Value;
use std::collections::BTreeMap;

pub struct KAnonymity;

/// Reads a dotted field path (`"address.postalCode"`) out of a generic
/// element tree, returning the first matching leaf's value as a string,
/// or `None` if any step of the path is absent. Used identically by the
/// equivalence-class builder (C8).
pub fn extract_by_dotted_path(root: &ElementNode, path: &str) -> Option<String> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.children.iter().find(|c| c.name == segment)?;
    }
    current.value.as_ref().map(scalar_to_string)
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl super::Processor for KAnonymity {
    fn method_name(&self) -> &'static str {
        "kanonymity"
    }

    fn process(
        &self,
        _node: &mut ElementNode,
        _path: &NodePath,
        ctx: &mut ProcessorContext<'_>,
        settings: &serde_json::Map<String, Value>,
    ) -> Result<ProcessorOutput, AnonymizeError> {
        // A per-rule `quasiIdentifierPaths` overrides the corpus-wide
        // `kAnonymitySettings.quasiIdentifierPaths`; when the rule is
        // silent, the global setting applies.
        let qi_paths: Vec<String> = settings
            .get("quasiIdentifierPaths")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_else(|| {
                ctx.global_parameters
                    .k_anonymity_settings
                    .as_ref()
                    .map(|s| s.quasi_identifier_paths.clone())
                    .unwrap_or_default()
            });

        if qi_paths.is_empty() {
            return Err(AnonymizeError::Configuration(
                "kanonymity rule requires quasiIdentifierPaths".into(),
            ));
        }

        let mut tuple: BTreeMap<String, String> = BTreeMap::new();
        for qi_path in &qi_paths {
            let leaf_name = qi_path.rsplit('.').next().unwrap_or(qi_path);
            let value = extract_by_dotted_path(ctx.resource_snapshot, qi_path).unwrap_or_else(|| {
                tracing::debug!(
                    target: "fhir_anon::kanonymity",
                    path = qi_path.as_str(),
                    "quasi-identifier field missing, using redacted sentinel"
                );
                "[REDACTED]".to_string()
            });
            tuple.insert(leaf_name.to_string(), value);
        }

        // The equivalence class's identity key is the lexicographically
        // sorted `key:value|...` signature over the quasi-identifier map.
        let signature = tuple
            .iter()
            .map(|(k, v)| format!("{k}:{v}"))
            .collect::<Vec<_>>()
            .join("|");

        let mut metrics = serde_json::Map::new();
        metrics.insert("equivalenceClassId".into(), Value::String(signature));
        metrics.insert(
            "quasiIdentifiers".into(),
            Value::Object(
                tuple
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
            ),
        );

        Ok(ProcessorOutput::applied().with_metrics(metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_nested_field_by_dotted_path() {
        let mut root = ElementNode::new_compound("Patient", "Patient");
        let mut address = ElementNode::new_compound("Address", "address");
        address
            .children
            .push(ElementNode::new_leaf("postalCode", "postalCode", "02139".into()));
        root.children.push(address);
        assert_eq!(
            extract_by_dotted_path(&root, "address.postalCode"),
            Some("02139".to_string())
        );
    }

    #[test]
    fn missing_field_returns_none() {
        let root = ElementNode::new_compound("Patient", "Patient");
        assert_eq!(extract_by_dotted_path(&root, "address.postalCode"), None);
    }

    #[test]
    fn falls_back_to_global_quasi_identifier_paths_when_rule_is_silent() {
        use crate::processors::Processor;
        use std::collections::HashSet;

        let mut root = ElementNode::new_compound("Patient", "Patient");
        root.children
            .push(ElementNode::new_leaf("code", "gender", "female".into()));
        let snapshot = root.clone();
        let mut node = root.children[0].clone();

        let key_store =
            crate::keystore::KeyStore::new(String::new(), String::new(), String::new(), String::new(), &[])
                .unwrap();
        let budget = crate::budget::BudgetAccountant::new();
        let rng = crate::rng::SecureRng::new();
        let mut visited: HashSet<NodePath> = HashSet::new();
        let mut params = crate::config::Parameters::default();
        params.k_anonymity_settings = Some(crate::config::KAnonymitySettings {
            required_k: 5,
            quasi_identifier_paths: vec!["gender".to_string()],
        });
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
        let out = KAnonymity
            .process(&mut node, &NodePath::root(), &mut ctx, &Default::default())
            .unwrap();
        let metrics = out.privacy_metrics.unwrap();
        assert_eq!(
            metrics.get("equivalenceClassId").and_then(Value::as_str),
            Some("gender:female")
        );
    }
}
