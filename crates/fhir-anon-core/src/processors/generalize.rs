//! `generalize`: replaces a node's value with a coarser category chosen
//! from an ordered list of `{condition, replacement}` cases, the first
//! matching case winning.
//!
//! The originating specification describes conditions as "tree-navigation
//! expressions over the current node" without naming the boolean grammar
//! those expressions evaluate to — one of its explicit open questions.
//! Rather than guess at an unbounded FHIRPath-like boolean language, this
//! implementation supports a small, explicit predicate shape against the
//! node's own scalar value: `{"equals": <value>}` and `{"range": {"min":,
//! "max":}}`. This is recorded as a resolved open question in DESIGN.md.

use super::{ProcessorContext, ProcessorOutput};
use crate::error::AnonymizeError;
use crate::model::{ElementNode, NodePath};
use serde_json::Value;

pub struct Generalize;

#[derive(Debug, Clone, PartialEq)]
enum OtherValuesPolicy {
    Keep,
    Redact,
}

fn condition_matches(condition: &Value, value: &Value) -> bool {
    let Some(obj) = condition.as_object() else {
        return false;
    };
    if let Some(expected) = obj.get("equals") {
        return expected == value;
    }
    if let Some(range) = obj.get("range").and_then(Value::as_object) {
        let Some(n) = value.as_f64() else { return false };
        let min = range.get("min").and_then(Value::as_f64).unwrap_or(f64::NEG_INFINITY);
        let max = range.get("max").and_then(Value::as_f64).unwrap_or(f64::INFINITY);
        return n >= min && n < max;
    }
    false
}

impl super::Processor for Generalize {
    fn method_name(&self) -> &'static str {
        "generalize"
    }

    fn process(
        &self,
        node: &mut ElementNode,
        _path: &NodePath,
        _ctx: &mut ProcessorContext<'_>,
        settings: &serde_json::Map<String, Value>,
    ) -> Result<ProcessorOutput, AnonymizeError> {
        let cases = settings
            .get("cases")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let other_values = match settings.get("otherValues").and_then(Value::as_str) {
            Some("redact") => OtherValuesPolicy::Redact,
            _ => OtherValuesPolicy::Keep,
        };

        let Some(current_value) = node.value.clone() else {
            return Ok(ProcessorOutput::no_op());
        };

        for case in &cases {
            let Some(case_obj) = case.as_object() else {
                continue;
            };
            let Some(condition) = case_obj.get("condition") else {
                continue;
            };
            if condition_matches(condition, &current_value) {
                if let Some(replacement) = case_obj.get("replacement") {
                    node.value = Some(replacement.clone());
                }
                return Ok(ProcessorOutput::applied());
            }
        }

        match other_values {
            OtherValuesPolicy::Keep => Ok(ProcessorOutput::no_op()),
            OtherValuesPolicy::Redact => {
                node.value = None;
                Ok(ProcessorOutput::applied().delete())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_condition_selects_bucket() {
        let condition = serde_json::json!({"range": {"min": 0, "max": 18}});
        assert!(condition_matches(&condition, &Value::from(12)));
        assert!(!condition_matches(&condition, &Value::from(25)));
    }

    #[test]
    fn equals_condition_matches_exact_value() {
        let condition = serde_json::json!({"equals": "M"});
        assert!(condition_matches(&condition, &Value::String("M".into())));
        assert!(!condition_matches(&condition, &Value::String("F".into())));
    }
}
