//! The anonymizer configuration document: the rule list and the tunable
//! parameters every processor reads its settings from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum DateShiftScope {
    #[default]
    Resource,
    File,
    Folder,
}

/// What the engine does with a resource once at least one `ProcessingError`
/// has been recorded against it. `Raise` propagates the first error to the
/// caller immediately, the same as the genuinely fatal error kinds. `Skip`
/// lets every rule finish running, then swaps the resource for an empty
/// shell of the same type so the caller never sees partially-anonymized
/// content. Neither variant is named as a default in the originating
/// specification; `Skip` is chosen here as the safer default for a batch
/// tool that should not abort a whole run over one malformed resource (see
/// DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum ProcessingErrorsPolicy {
    Raise,
    #[default]
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KAnonymitySettings {
    pub required_k: usize,
    pub quasi_identifier_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifferentialPrivacySettings {
    /// Per-context total epsilon budgets, seeded into the budget
    /// accountant when the engine is constructed.
    #[serde(default)]
    pub budgets: BTreeMap<String, f64>,
    #[serde(default)]
    pub advanced_composition: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    #[serde(default)]
    pub date_shift_key: String,
    #[serde(default)]
    pub date_shift_scope: DateShiftScope,
    #[serde(default)]
    pub date_shift_key_prefix: String,
    pub date_shift_fixed_offset_in_days: Option<i64>,

    #[serde(default)]
    pub crypto_hash_key: String,

    #[serde(default)]
    pub encrypt_key: String,

    #[serde(default)]
    pub enable_partial_ages_for_redact: bool,
    #[serde(default)]
    pub enable_partial_dates_for_redact: bool,
    #[serde(default)]
    pub enable_partial_zip_codes_for_redact: bool,
    #[serde(default)]
    pub restricted_zip_code_tabulation_areas: Vec<String>,

    #[serde(default)]
    pub k_anonymity_settings: Option<KAnonymitySettings>,
    #[serde(default)]
    pub differential_privacy_settings: Option<DifferentialPrivacySettings>,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            date_shift_key: String::new(),
            date_shift_scope: DateShiftScope::default(),
            date_shift_key_prefix: String::new(),
            date_shift_fixed_offset_in_days: None,
            crypto_hash_key: String::new(),
            encrypt_key: String::new(),
            enable_partial_ages_for_redact: false,
            enable_partial_dates_for_redact: false,
            enable_partial_zip_codes_for_redact: false,
            restricted_zip_code_tabulation_areas: Vec::new(),
            k_anonymity_settings: None,
            differential_privacy_settings: None,
        }
    }
}

/// One entry of `fhirPathRules` as it appears in the configuration
/// document, before it is compiled into a `CompiledRule`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRule {
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymizerConfig {
    pub fhir_version: String,
    pub fhir_path_rules: Vec<RawRule>,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub processing_errors: ProcessingErrorsPolicy,
}
