//! Re-identification Risk Assessor (C7): prosecutor, journalist, and
//! marketer re-identification risk over a set of equivalence classes,
//! plus a summary risk level.

use crate::equivalence::EquivalenceClass;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskReport {
    pub prosecutor_risk: f64,
    pub journalist_risk: f64,
    pub marketer_risk: f64,
    pub uniqueness_ratio: f64,
    pub risk_level: RiskLevel,
}

const HIGH_RISK_THRESHOLD: f64 = 0.20;
const MEDIUM_RISK_THRESHOLD: f64 = 0.10;

/// Computes the three standard re-identification risk metrics plus a
/// uniqueness ratio, over a corpus already partitioned into equivalence
/// classes.
///
/// The uniqueness ratio is defined here as the fraction of classes whose
/// size equals the corpus-wide minimum class size, following the worked
/// example in the originating specification's testable properties rather
/// than its looser parenthetical description ("class of size 1") — the
/// two disagree when no class has size 1, and the worked example is taken
/// as ground truth. See DESIGN.md.
pub fn assess_risk(classes: &[EquivalenceClass]) -> RiskReport {
    if classes.is_empty() {
        return RiskReport {
            prosecutor_risk: 0.0,
            journalist_risk: 0.0,
            marketer_risk: 0.0,
            uniqueness_ratio: 0.0,
            risk_level: RiskLevel::Low,
        };
    }

    let sizes: Vec<usize> = classes.iter().map(|c| c.member_count.max(1)).collect();
    let total_records: usize = sizes.iter().sum();
    let class_count = sizes.len();

    let prosecutor_risk = sizes
        .iter()
        .map(|&s| 1.0 / s as f64)
        .fold(0.0_f64, f64::max);

    let journalist_risk = sizes.iter().map(|&s| 1.0 / s as f64).sum::<f64>() / class_count as f64;

    let marketer_risk = sizes
        .iter()
        .filter(|&&s| (1.0 / s as f64) >= HIGH_RISK_THRESHOLD)
        .sum::<usize>() as f64
        / total_records as f64;

    let min_size = *sizes.iter().min().unwrap();
    let unique_classes = sizes.iter().filter(|&&s| s == min_size).count();
    let uniqueness_ratio = unique_classes as f64 / class_count as f64;

    let worst = prosecutor_risk.max(journalist_risk).max(marketer_risk);
    let risk_level = if worst >= HIGH_RISK_THRESHOLD {
        RiskLevel::High
    } else if worst >= MEDIUM_RISK_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    RiskReport {
        prosecutor_risk,
        journalist_risk,
        marketer_risk,
        uniqueness_ratio,
        risk_level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(sizes: &[usize]) -> Vec<EquivalenceClass> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| EquivalenceClass {
                signature: format!("class-{i}"),
                member_count: size,
            })
            .collect()
    }

    #[test]
    fn uniqueness_ratio_counts_min_size_classes() {
        let report = assess_risk(&classes(&[2, 4]));
        assert!((report.uniqueness_ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn high_risk_when_prosecutor_risk_crosses_threshold() {
        let report = assess_risk(&classes(&[1, 10]));
        assert_eq!(report.risk_level, RiskLevel::High);
    }

    #[test]
    fn low_risk_for_large_uniform_classes() {
        let report = assess_risk(&classes(&[20, 20, 20]));
        assert_eq!(report.risk_level, RiskLevel::Low);
    }

    #[test]
    fn empty_corpus_is_low_risk() {
        let report = assess_risk(&[]);
        assert_eq!(report.risk_level, RiskLevel::Low);
    }
}
