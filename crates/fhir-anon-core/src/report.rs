//! The structured audit trail a rule application produces: one
//! `ProcessRecord` per top-level touched node, aggregated into a
//! `ProcessResult` per resource.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    NoOp,
    Applied,
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub resource_id: String,
    pub path: String,
    pub method: String,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_metrics: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub records: Vec<ProcessRecord>,
    pub errors: Vec<String>,
    pub is_differentially_private: bool,
    pub replaced_with_empty_shell: bool,
}

impl ProcessResult {
    pub fn merge(&mut self, other: ProcessResult) {
        self.records.extend(other.records);
        self.errors.extend(other.errors);
        self.is_differentially_private |= other.is_differentially_private;
        self.replaced_with_empty_shell |= other.replaced_with_empty_shell;
    }
}

/// A rollup over a `ProcessResult`: counts per method, per outcome kind,
/// and the total error count. Not part of the originating specification;
/// added so the CLI's human-readable report and tests that assert on
/// aggregate behavior don't need to walk every record by hand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSummary {
    pub total_records: usize,
    pub applied_by_method: BTreeMap<String, usize>,
    pub no_op_count: usize,
    pub error_count: usize,
    pub is_differentially_private: bool,
    pub replaced_with_empty_shell: bool,
}

impl ProcessResult {
    pub fn summary(&self) -> ProcessSummary {
        let mut summary = ProcessSummary {
            total_records: self.records.len(),
            is_differentially_private: self.is_differentially_private,
            replaced_with_empty_shell: self.replaced_with_empty_shell,
            ..Default::default()
        };
        for record in &self.records {
            match &record.outcome {
                Outcome::Applied => {
                    *summary
                        .applied_by_method
                        .entry(record.method.clone())
                        .or_insert(0) += 1;
                }
                Outcome::NoOp => summary.no_op_count += 1,
                Outcome::Error { .. } => summary.error_count += 1,
            }
        }
        summary.error_count += self.errors.len();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_by_method_and_outcome() {
        let mut result = ProcessResult::default();
        result.records.push(ProcessRecord {
            resource_id: "p1".into(),
            path: "/name".into(),
            method: "redact".into(),
            outcome: Outcome::Applied,
            privacy_metrics: None,
        });
        result.records.push(ProcessRecord {
            resource_id: "p1".into(),
            path: "/gender".into(),
            method: "keep".into(),
            outcome: Outcome::NoOp,
            privacy_metrics: None,
        });
        let summary = result.summary();
        assert_eq!(summary.total_records, 2);
        assert_eq!(summary.applied_by_method.get("redact"), Some(&1));
        assert_eq!(summary.no_op_count, 1);
    }
}
