//! Human-readable rendering of a `ProcessResult` summary for the CLI's
//! terminal output.

use fhir_anon_core::ProcessSummary;
use std::fmt::Write as _;

pub fn render_summary(resource_id: &str, summary: &ProcessSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "resource {resource_id}: {} records", summary.total_records);
    for (method, count) in &summary.applied_by_method {
        let _ = writeln!(out, "  {method}: {count} applied");
    }
    if summary.no_op_count > 0 {
        let _ = writeln!(out, "  no-op: {}", summary.no_op_count);
    }
    if summary.error_count > 0 {
        let _ = writeln!(out, "  errors: {}", summary.error_count);
    }
    if summary.is_differentially_private {
        let _ = writeln!(out, "  differentially private: yes");
    }
    if summary.replaced_with_empty_shell {
        let _ = writeln!(out, "  replaced with empty shell due to processing errors");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_non_empty_summary() {
        let summary = ProcessSummary {
            total_records: 1,
            applied_by_method: [("redact".to_string(), 1)].into_iter().collect(),
            no_op_count: 0,
            error_count: 0,
            is_differentially_private: false,
            replaced_with_empty_shell: false,
        };
        let rendered = render_summary("p1", &summary);
        assert!(rendered.contains("redact: 1 applied"));
    }
}
