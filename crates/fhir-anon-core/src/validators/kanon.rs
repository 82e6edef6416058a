//! k-Anonymity Validator (C7): checks that every equivalence class a
//! corpus was partitioned into meets a required minimum size.

use crate::equivalence::EquivalenceClass;
use crate::error::AnonymizeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KAnonymityViolation {
    pub signature: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KAnonymityReport {
    pub min_class_size: usize,
    pub max_class_size: usize,
    pub avg_class_size: f64,
    pub median_class_size: f64,
    pub class_size_distribution: BTreeMap<usize, usize>,
    pub violations: Vec<KAnonymityViolation>,
    pub is_valid: bool,
}

pub fn validate_k_anonymity(
    classes: &[EquivalenceClass],
    required_k: usize,
) -> Result<KAnonymityReport, AnonymizeError> {
    if required_k < 2 {
        return Err(AnonymizeError::Configuration(
            "k-anonymity requires k >= 2".into(),
        ));
    }

    if classes.is_empty() {
        return Ok(KAnonymityReport {
            min_class_size: 0,
            max_class_size: 0,
            avg_class_size: 0.0,
            median_class_size: 0.0,
            class_size_distribution: BTreeMap::new(),
            violations: Vec::new(),
            is_valid: true,
        });
    }

    let mut sizes: Vec<usize> = classes.iter().map(|c| c.member_count).collect();
    sizes.sort_unstable();

    let min_class_size = *sizes.first().unwrap();
    let max_class_size = *sizes.last().unwrap();
    let avg_class_size = sizes.iter().sum::<usize>() as f64 / sizes.len() as f64;
    let median_class_size = median(&sizes);

    let mut class_size_distribution: BTreeMap<usize, usize> = BTreeMap::new();
    for &size in &sizes {
        *class_size_distribution.entry(size).or_insert(0) += 1;
    }

    let violations: Vec<KAnonymityViolation> = classes
        .iter()
        .filter(|c| c.member_count < required_k)
        .map(|c| KAnonymityViolation {
            signature: c.signature.clone(),
            size: c.member_count,
        })
        .collect();

    Ok(KAnonymityReport {
        min_class_size,
        max_class_size,
        avg_class_size,
        median_class_size,
        class_size_distribution,
        is_valid: violations.is_empty(),
        violations,
    })
}

fn median(sorted_sizes: &[usize]) -> f64 {
    let n = sorted_sizes.len();
    if n % 2 == 1 {
        sorted_sizes[n / 2] as f64
    } else {
        (sorted_sizes[n / 2 - 1] + sorted_sizes[n / 2]) as f64 / 2.0
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
    fn valid_when_every_class_meets_k() {
        let report = validate_k_anonymity(&classes(&[2, 3, 4]), 2).unwrap();
        assert!(report.is_valid);
        assert!(report.violations.is_empty());
        assert_eq!(report.min_class_size, 2);
        assert_eq!(report.max_class_size, 4);
        assert_eq!(report.median_class_size, 3.0);
    }

    #[test]
    fn flags_classes_below_k() {
        let report = validate_k_anonymity(&classes(&[1, 2, 5]), 2).unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].size, 1);
    }

    #[test]
    fn rejects_k_below_two() {
        assert!(validate_k_anonymity(&classes(&[2, 3]), 1).is_err());
    }
}
