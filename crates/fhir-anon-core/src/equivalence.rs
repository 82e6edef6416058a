//! Equivalence-Class Builder (C8): groups a corpus of documents by their
//! quasi-identifier signature, the input the k-anonymity validator and
//! re-identification risk assessor (C7) both consume.

use crate::processors::kanonymity::extract_by_dotted_path;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquivalenceClass {
    pub signature: String,
    pub member_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct EquivalenceBuildReport {
    pub classes: Vec<EquivalenceClass>,
    pub parse_failures: usize,
}

pub struct EquivalenceClassBuilder {
    pub quasi_identifier_paths: Vec<String>,
}

impl EquivalenceClassBuilder {
    pub fn new(quasi_identifier_paths: Vec<String>) -> Self {
        EquivalenceClassBuilder {
            quasi_identifier_paths,
        }
    }

    /// Builds equivalence classes from raw JSON document text. A document
    /// that fails to parse, or that is missing a quasi-identifier field,
    /// is never allowed to abort the batch: parse failures are counted,
    /// and missing fields fall back to the `[REDACTED]` sentinel (logged
    /// at debug level), consistent with the per-node k-anonymity marker.
    pub fn build_from_raw(&self, raw_documents: &[String]) -> EquivalenceBuildReport {
        let mut groups: HashMap<String, usize> = HashMap::new();
        let mut parse_failures = 0usize;

        for raw in raw_documents {
            let parsed: Result<crate::model::ElementNode, _> = serde_json::from_str(raw);
            let node = match parsed {
                Ok(node) => node,
                Err(e) => {
                    tracing::debug!(
                        target: "fhir_anon::equivalence",
                        error = %e,
                        "failed to parse document for equivalence-class extraction, skipping"
                    );
                    parse_failures += 1;
                    continue;
                }
            };

            let mut tuple: std::collections::BTreeMap<String, String> = Default::default();
            for qi_path in &self.quasi_identifier_paths {
                let leaf_name = qi_path.rsplit('.').next().unwrap_or(qi_path);
                let value = extract_by_dotted_path(&node, qi_path).unwrap_or_else(|| {
                    tracing::debug!(
                        target: "fhir_anon::equivalence",
                        path = qi_path.as_str(),
                        "quasi-identifier field missing on document, using redacted sentinel"
                    );
                    "[REDACTED]".to_string()
                });
                tuple.insert(leaf_name.to_string(), value);
            }

            let signature = tuple
                .iter()
                .map(|(k, v)| format!("{k}:{v}"))
                .collect::<Vec<_>>()
                .join("|");
            *groups.entry(signature).or_insert(0) += 1;
        }

        let classes = groups
            .into_iter()
            .map(|(signature, member_count)| EquivalenceClass {
                signature,
                member_count,
            })
            .collect();

        EquivalenceBuildReport {
            classes,
            parse_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_documents_by_signature() {
        let builder = EquivalenceClassBuilder::new(vec!["gender".to_string()]);
        let docs = vec![
            r#"{"instanceType":"Patient","name":"Patient","children":[{"instanceType":"code","name":"gender","value":"female","children":[]}]}"#.to_string(),
            r#"{"instanceType":"Patient","name":"Patient","children":[{"instanceType":"code","name":"gender","value":"female","children":[]}]}"#.to_string(),
            r#"{"instanceType":"Patient","name":"Patient","children":[{"instanceType":"code","name":"gender","value":"male","children":[]}]}"#.to_string(),
        ];
        let report = builder.build_from_raw(&docs);
        assert_eq!(report.parse_failures, 0);
        assert_eq!(report.classes.len(), 2);
        let female = report.classes.iter().find(|c| c.signature.contains("female")).unwrap();
        assert_eq!(female.member_count, 2);
    }

    #[test]
    fn unparseable_documents_are_counted_not_fatal() {
        let builder = EquivalenceClassBuilder::new(vec!["gender".to_string()]);
        let docs = vec!["not json".to_string()];
        let report = builder.build_from_raw(&docs);
        assert_eq!(report.parse_failures, 1);
        assert!(report.classes.is_empty());
    }
}
