//! `redact`: clears or removes a node, with narrow carve-outs for
//! partial retention of dates, ages, and postal codes when the
//! corresponding `enablePartial*ForRedact` parameter is set.

use super::{ProcessorContext, ProcessorOutput};
use crate::error::AnonymizeError;
use crate::model::{ElementNode, NodePath};
use chrono::Datelike;
use serde_json::Value;

pub struct Redact;

const MAX_AGE_FOR_PARTIAL_RETENTION: i64 = 89;

impl super::Processor for Redact {
    fn method_name(&self) -> &'static str {
        "redact"
    }

    fn process(
        &self,
        node: &mut ElementNode,
        _path: &NodePath,
        ctx: &mut ProcessorContext<'_>,
        settings: &serde_json::Map<String, Value>,
    ) -> Result<ProcessorOutput, AnonymizeError> {
        if node.value.is_none() && node.children.is_empty() {
            return Ok(ProcessorOutput::no_op());
        }

        let params = ctx.global_parameters;
        // A per-rule setting overrides the corpus-wide parameter of the same
        // name; when the rule is silent, the global tunable applies.
        let enable_partial_dates = settings
            .get("enablePartialDatesForRedact")
            .and_then(Value::as_bool)
            .unwrap_or(params.enable_partial_dates_for_redact);
        let enable_partial_ages = settings
            .get("enablePartialAgesForRedact")
            .and_then(Value::as_bool)
            .unwrap_or(params.enable_partial_ages_for_redact);
        let enable_partial_zips = settings
            .get("enablePartialZipCodesForRedact")
            .and_then(Value::as_bool)
            .unwrap_or(params.enable_partial_zip_codes_for_redact);
        let restricted_zip_prefixes: Vec<String> = settings
            .get("restrictedZipCodeTabulationAreas")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_else(|| params.restricted_zip_code_tabulation_areas.clone());

        match node.instance_type.as_str() {
            "date" | "dateTime" | "instant" if enable_partial_dates => {
                if let Some(year) = node.value_as_str().and_then(extract_year) {
                    let current_year = chrono::Local::now().year();
                    if (current_year - year) <= MAX_AGE_FOR_PARTIAL_RETENTION as i32 {
                        node.value = Some(Value::String(year.to_string()));
                        return Ok(ProcessorOutput::applied());
                    }
                }
                Ok(ProcessorOutput::applied().delete())
            }
            "age" if enable_partial_ages => {
                let age = node.value.as_ref().and_then(Value::as_i64);
                match age {
                    Some(a) if a <= MAX_AGE_FOR_PARTIAL_RETENTION => Ok(ProcessorOutput::applied()),
                    _ => Ok(ProcessorOutput::applied().delete()),
                }
            }
            "postalCode" | "zipCode" if enable_partial_zips => {
                let zip = node.value_as_str().unwrap_or_default().to_string();
                let digits: String = zip.chars().filter(char::is_ascii_digit).collect();
                if digits.len() >= 3 {
                    let prefix = &digits[0..3];
                    if !restricted_zip_prefixes.iter().any(|p| p == prefix) {
                        let zeroed = format!("{}{}", prefix, "0".repeat(digits.len() - 3));
                        node.value = Some(Value::String(zeroed));
                        return Ok(ProcessorOutput::applied());
                    }
                }
                Ok(ProcessorOutput::applied().delete())
            }
            _ if node.is_primitive() => {
                node.value = None;
                Ok(ProcessorOutput::applied().delete())
            }
            _ => Ok(ProcessorOutput::applied().delete()),
        }
    }
}

fn extract_year(value: &str) -> Option<i32> {
    value.get(0..4)?.parse::<i32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::{Processor, ProcessorContext};

    fn ctx<'a>(
        visited: &'a mut std::collections::HashSet<NodePath>,
        snapshot: &'a ElementNode,
        key_store: &'a crate::keystore::KeyStore,
        budget: &'a crate::budget::BudgetAccountant,
        rng: &'a crate::rng::SecureRng,
        params: &'a crate::config::Parameters,
    ) -> ProcessorContext<'a> {
        ProcessorContext {
            resource_id: "p1",
            subject_id: "p1",
            key_store,
            budget,
            rng,
            resource_snapshot: snapshot,
            visited,
            advanced_composition: false,
            global_parameters: params,
        }
    }

    #[test]
    fn full_redact_clears_primitive_and_deletes() {
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
        let mut visited = Default::default();
        let params = crate::config::Parameters::default();
        let mut c = ctx(&mut visited, &snapshot, &key_store, &budget, &rng, &params);
        let out = Redact
            .process(&mut node, &NodePath::root(), &mut c, &Default::default())
            .unwrap();
        assert!(out.delete_node);
        assert!(node.value.is_none());
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
        let mut visited = Default::default();
        let params = crate::config::Parameters::default();
        let mut c = ctx(&mut visited, &snapshot, &key_store, &budget, &rng, &params);
        let out = Redact
            .process(&mut node, &NodePath::root(), &mut c, &Default::default())
            .unwrap();
        assert!(!out.delete_node);
        assert_eq!(out.outcome, Some(crate::processors::OutcomeKind::NoOp));
    }

    #[test]
    fn partial_date_retains_recent_year() {
        let current_year = chrono::Local::now().year();
        let mut node = ElementNode::new_leaf(
            "date",
            "birthDate",
            Value::String(format!("{current_year}-05-01")),
        );
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
        let mut visited = Default::default();
        let params = crate::config::Parameters::default();
        let mut c = ctx(&mut visited, &snapshot, &key_store, &budget, &rng, &params);
        let mut settings = serde_json::Map::new();
        settings.insert("enablePartialDatesForRedact".into(), Value::Bool(true));
        let out = Redact
            .process(&mut node, &NodePath::root(), &mut c, &settings)
            .unwrap();
        assert!(!out.delete_node);
        assert_eq!(node.value_as_str(), Some(current_year.to_string().as_str()));
    }
}
