//! The Rule Engine (C6): applies a resource's compiled rules in order,
//! tracking a visited set from `keep` rules, stripping `meta` unless
//! anything was kept, and aggregating every processor's verdict into a
//! `ProcessResult`.

use crate::budget::BudgetAccountant;
use crate::config::{AnonymizerConfig, Parameters, ProcessingErrorsPolicy};
use crate::error::AnonymizeError;
use crate::keystore::KeyStore;
use crate::model::{ElementNode, NodePath, Resource};
use crate::path::matcher::{compile_rule, match_rule, CompiledRule, DescendantIndexes};
use crate::processors::{build_registry, OutcomeKind, Processor, ProcessorContext};
use crate::report::{Outcome, ProcessRecord, ProcessResult};
use crate::rng::SecureRng;
use std::collections::HashMap;
use std::collections::HashSet;

pub struct Engine {
    rules: Vec<CompiledRule>,
    key_store: KeyStore,
    budget: BudgetAccountant,
    registry: HashMap<&'static str, Box<dyn Processor>>,
    rng: SecureRng,
    processing_errors_policy: ProcessingErrorsPolicy,
    advanced_composition: bool,
    file_name: Option<String>,
    folder_name: Option<String>,
    date_shift_scope: crate::config::DateShiftScope,
    parameters: Parameters,
    /// Whether any compiled rule's method is `keep`. Decided once from the
    /// rule list itself, not from whether a `keep` rule actually matched
    /// anything on a given resource — a `keep` rule scoped to a different
    /// resource type, or whose path never resolves, still counts.
    any_keep_rule: bool,
}

impl Engine {
    pub fn new(config: AnonymizerConfig) -> Result<Self, AnonymizeError> {
        let rules: Vec<CompiledRule> = config
            .fhir_path_rules
            .iter()
            .map(compile_rule)
            .collect::<Result<_, _>>()?;

        let methods_in_use: Vec<&str> = rules.iter().map(|r| r.method.as_str()).collect();
        let key_store = KeyStore::new(
            config.parameters.date_shift_key.clone(),
            config.parameters.date_shift_key_prefix.clone(),
            config.parameters.crypto_hash_key.clone(),
            config.parameters.encrypt_key.clone(),
            &methods_in_use,
        )?;

        let budget = BudgetAccountant::new();
        let mut advanced_composition = false;
        if let Some(dp_settings) = &config.parameters.differential_privacy_settings {
            advanced_composition = dp_settings.advanced_composition;
            for (context, total) in &dp_settings.budgets {
                budget.initialize(context, *total);
            }
        }

        let any_keep_rule = rules.iter().any(|r| r.method == "keep");

        Ok(Engine {
            rules,
            key_store,
            budget,
            registry: build_registry(),
            rng: SecureRng::new(),
            processing_errors_policy: config.processing_errors,
            advanced_composition,
            file_name: None,
            folder_name: None,
            date_shift_scope: config.parameters.date_shift_scope,
            parameters: config.parameters,
            any_keep_rule,
        })
    }

    /// Returns a copy of this engine scoped to a particular file/folder,
    /// used by the `File`/`Folder` date-shift scopes a batch driver needs.
    pub fn with_file_context(
        &self,
        file_name: impl Into<String>,
        folder_name: impl Into<String>,
    ) -> Engine {
        Engine {
            rules: self.rules.clone(),
            key_store: self.key_store.clone(),
            budget: BudgetAccountant::new(),
            registry: build_registry(),
            rng: SecureRng::new(),
            processing_errors_policy: self.processing_errors_policy,
            advanced_composition: self.advanced_composition,
            file_name: Some(file_name.into()),
            folder_name: Some(folder_name.into()),
            date_shift_scope: self.date_shift_scope,
            parameters: self.parameters.clone(),
            any_keep_rule: self.any_keep_rule,
        }
    }

    fn subject_id(&self, resource: &Resource) -> String {
        match self.date_shift_scope {
            crate::config::DateShiftScope::Resource => resource.id().unwrap_or_default().to_string(),
            crate::config::DateShiftScope::File => self.file_name.clone().unwrap_or_default(),
            crate::config::DateShiftScope::Folder => self.folder_name.clone().unwrap_or_default(),
        }
    }

    pub fn anonymize_resource(&self, mut resource: Resource) -> Result<(Resource, ProcessResult), AnonymizeError> {
        let indexes = DescendantIndexes::build(&resource.root);
        let mut result = ProcessResult::default();
        let mut visited: HashSet<NodePath> = HashSet::new();
        let resource_id = resource.id().unwrap_or_default().to_string();
        let subject_id = self.subject_id(&resource);

        for rule in &self.rules {
            let matched = match_rule(rule, &resource, &indexes);
            for path in matched {
                if is_visited(&path, &visited) {
                    continue;
                }

                let snapshot = resource.root.clone();
                let Some(node) = resource.root.get_mut(&path) else {
                    continue;
                };
                let processor = self.registry.get(rule.method.as_str()).ok_or_else(|| {
                    AnonymizeError::Configuration(format!("unknown method '{}'", rule.method))
                })?;

                let outcome = {
                    let mut pctx = ProcessorContext {
                        resource_id: &resource_id,
                        subject_id: &subject_id,
                        key_store: &self.key_store,
                        budget: &self.budget,
                        rng: &self.rng,
                        resource_snapshot: &snapshot,
                        visited: &mut visited,
                        advanced_composition: self.advanced_composition,
                        global_parameters: &self.parameters,
                    };
                    processor.process(node, &path, &mut pctx, &rule.settings)
                };

                match outcome {
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        result.errors.push(e.to_string());
                        result.records.push(ProcessRecord {
                            resource_id: resource_id.clone(),
                            path: path.to_pointer(),
                            method: rule.method.clone(),
                            outcome: Outcome::Error { message: e.to_string() },
                            privacy_metrics: None,
                        });
                        if self.processing_errors_policy == ProcessingErrorsPolicy::Raise {
                            return Err(e);
                        }
                    }
                    Ok(output) => {
                        if output.delete_node {
                            resource.root.delete_at(&path);
                        }
                        if output.marks_differentially_private {
                            result.is_differentially_private = true;
                        }
                        result.records.push(ProcessRecord {
                            resource_id: resource_id.clone(),
                            path: path.to_pointer(),
                            method: rule.method.clone(),
                            outcome: match output.outcome {
                                Some(OutcomeKind::Applied) => Outcome::Applied,
                                _ => Outcome::NoOp,
                            },
                            privacy_metrics: output.privacy_metrics,
                        });
                    }
                }
            }
        }

        if !self.any_keep_rule {
            resource.root.strip_named("meta");
        }

        if self.processing_errors_policy == ProcessingErrorsPolicy::Skip && !result.errors.is_empty() {
            resource.root = ElementNode::empty_shell(resource.instance_type());
            result.replaced_with_empty_shell = true;
        }

        Ok((resource, result))
    }

    /// Anonymizes an arbitrary element, not necessarily a resource root,
    /// by treating it as the root of a throwaway single-node resource.
    pub fn anonymize_element(&self, node: ElementNode) -> Result<(ElementNode, ProcessResult), AnonymizeError> {
        let (resource, result) = self.anonymize_resource(Resource::new(node))?;
        Ok((resource.root, result))
    }
}

fn is_visited(path: &NodePath, visited: &HashSet<NodePath>) -> bool {
    visited.iter().any(|v| path.starts_with(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnonymizerConfig, Parameters, RawRule};
    use serde_json::json;

    fn patient_resource() -> Resource {
        let mut root = ElementNode::new_compound("Patient", "Patient");
        root.children.push(ElementNode::new_leaf("id", "id", "p1".into()));
        let mut name = ElementNode::new_compound("HumanName", "name");
        name.children
            .push(ElementNode::new_leaf("string", "family", "Doe".into()));
        root.children.push(name);
        Resource::new(root)
    }

    fn config_with_rule(path: &str, method: &str) -> AnonymizerConfig {
        AnonymizerConfig {
            fhir_version: "4.0".into(),
            fhir_path_rules: vec![RawRule {
                path: path.into(),
                method: method.into(),
                resource_type: None,
                settings: Default::default(),
            }],
            parameters: Parameters::default(),
            processing_errors: crate::config::ProcessingErrorsPolicy::Skip,
        }
    }

    #[test]
    fn redact_rule_clears_matched_field() {
        let config = config_with_rule("Patient.name.family", "redact");
        let engine = Engine::new(config).unwrap();
        let (resource, result) = engine.anonymize_resource(patient_resource()).unwrap();
        assert!(result.errors.is_empty());
        let name = resource.root.get(&NodePath::root().child("name", 0)).unwrap();
        assert!(name.children.is_empty());
    }

    #[test]
    fn keep_rule_prevents_meta_strip_only_when_present() {
        let mut config = config_with_rule("Patient.name", "keep");
        config.fhir_path_rules[0].settings = Default::default();
        let engine = Engine::new(config).unwrap();
        let mut resource = patient_resource();
        resource.root.children.push(ElementNode::new_compound("Meta", "meta"));
        let (resource, _) = engine.anonymize_resource(resource).unwrap();
        assert!(resource.root.children.iter().any(|c| c.name == "meta"));
    }

    #[test]
    fn keep_rule_prevents_meta_strip_even_when_it_matches_nothing() {
        // A `keep` rule scoped to a field this resource doesn't have still
        // counts: whether `meta` survives is a property of the configured
        // rule list, not of whether anything was actually kept this run.
        let mut config = config_with_rule("Patient.telecom", "keep");
        config.fhir_path_rules[0].settings = Default::default();
        let engine = Engine::new(config).unwrap();
        let mut resource = patient_resource();
        resource.root.children.push(ElementNode::new_compound("Meta", "meta"));
        let (resource, _) = engine.anonymize_resource(resource).unwrap();
        assert!(resource.root.children.iter().any(|c| c.name == "meta"));
    }

    #[test]
    fn meta_is_stripped_when_nothing_kept() {
        let mut config = config_with_rule("Patient.name.family", "redact");
        config.fhir_path_rules[0].settings = Default::default();
        let engine = Engine::new(config).unwrap();
        let mut resource = patient_resource();
        resource.root.children.push(ElementNode::new_compound("Meta", "meta"));
        let (resource, _) = engine.anonymize_resource(resource).unwrap();
        assert!(!resource.root.children.iter().any(|c| c.name == "meta"));
    }

    #[test]
    fn cryptohash_reference_preserves_prefix() {
        let mut config = config_with_rule("Patient.managingOrganization", "cryptohash");
        config.parameters.crypto_hash_key = "a-sufficiently-long-secret-key".into();
        let engine = Engine::new(config).unwrap();
        let mut resource = patient_resource();
        resource.root.children.push(ElementNode::new_leaf(
            "Reference",
            "managingOrganization",
            json!("Organization/org-42"),
        ));
        let (resource, _) = engine.anonymize_resource(resource).unwrap();
        let reference = resource
            .root
            .get(&NodePath::root().child("managingOrganization", 0))
            .unwrap();
        assert!(reference.value_as_str().unwrap().starts_with("Organization/"));
        assert_ne!(reference.value_as_str().unwrap(), "Organization/org-42");
    }

    #[test]
    fn budget_exhaustion_propagates_without_mutation() {
        let mut config = config_with_rule("Patient.weight", "differentialprivacy");
        config.fhir_path_rules[0]
            .settings
            .insert("epsilon".into(), json!(1.0));
        config.fhir_path_rules[0]
            .settings
            .insert("budgetContext".into(), json!("weight"));
        config.parameters.differential_privacy_settings = Some(crate::config::DifferentialPrivacySettings {
            budgets: [("weight".to_string(), 0.5)].into_iter().collect(),
            advanced_composition: false,
        });
        let engine = Engine::new(config).unwrap();
        let mut resource = patient_resource();
        resource
            .root
            .children
            .push(ElementNode::new_leaf("decimal", "weight", json!(70.0)));
        let err = engine.anonymize_resource(resource).unwrap_err();
        assert!(matches!(err, AnonymizeError::BudgetExhausted { .. }));
    }
}
