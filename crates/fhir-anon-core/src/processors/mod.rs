//! Processor Set (C5): one handler per anonymization method. Each
//! processor is pure with respect to its siblings — it only ever reads or
//! mutates the single node it was matched against, plus (for methods that
//! need cross-field context, like k-anonymity marking) a read-only
//! snapshot of the resource it belongs to.

pub mod cryptohash;
pub mod dateshift;
pub mod dp;
pub mod encrypt;
pub mod generalize;
pub mod kanonymity;
pub mod keep;
pub mod perturb;
pub mod redact;
pub mod substitute;

use crate::budget::BudgetAccountant;
use crate::config::Parameters;
use crate::error::AnonymizeError;
use crate::keystore::KeyStore;
use crate::model::{ElementNode, NodePath};
use crate::rng::SecureRng;
use std::collections::HashMap;
use std::collections::HashSet;

/// What a processor decided to do with the node it was handed.
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeKind {
    NoOp,
    Applied,
}

/// A processor's verdict. The engine performs the actual node deletion
/// (processors never see their own parent, only the matched node) and
/// folds `privacy_metrics` into the resulting `ProcessRecord`.
#[derive(Debug, Clone, Default)]
pub struct ProcessorOutput {
    pub outcome: Option<OutcomeKind>,
    pub delete_node: bool,
    pub privacy_metrics: Option<serde_json::Map<String, serde_json::Value>>,
    pub marks_differentially_private: bool,
}

impl ProcessorOutput {
    pub fn no_op() -> Self {
        ProcessorOutput {
            outcome: Some(OutcomeKind::NoOp),
            ..Default::default()
        }
    }

    pub fn applied() -> Self {
        ProcessorOutput {
            outcome: Some(OutcomeKind::Applied),
            ..Default::default()
        }
    }

    pub fn delete(mut self) -> Self {
        self.delete_node = true;
        self
    }

    pub fn with_metrics(mut self, metrics: serde_json::Map<String, serde_json::Value>) -> Self {
        self.privacy_metrics = Some(metrics);
        self
    }

    pub fn mark_dp(mut self) -> Self {
        self.marks_differentially_private = true;
        self
    }
}

/// Shared, read-only collaborators every processor may need, plus the
/// mutable visited-set a `keep` rule writes into.
pub struct ProcessorContext<'a> {
    pub resource_id: &'a str,
    pub subject_id: &'a str,
    pub key_store: &'a KeyStore,
    pub budget: &'a BudgetAccountant,
    pub rng: &'a SecureRng,
    /// A pre-mutation snapshot of the whole resource, for processors (like
    /// k-anonymity marking) that read sibling fields beyond their own
    /// matched node.
    pub resource_snapshot: &'a ElementNode,
    pub visited: &'a mut HashSet<NodePath>,
    pub advanced_composition: bool,
    /// The configuration document's top-level `parameters` object, for
    /// processors (like `redact`'s partial-retention flags) that are
    /// configured globally rather than per-rule.
    pub global_parameters: &'a Parameters,
}

pub trait Processor: Send + Sync {
    fn method_name(&self) -> &'static str;

    fn process(
        &self,
        node: &mut ElementNode,
        path: &NodePath,
        ctx: &mut ProcessorContext<'_>,
        settings: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ProcessorOutput, AnonymizeError>;
}

/// Builds the fixed registry of the ten processors, keyed by lower-cased
/// method name, the same trait-object-registry idiom the orchestrator's
/// skill registry uses for its dispatch table.
pub fn build_registry() -> HashMap<&'static str, Box<dyn Processor>> {
    let mut registry: HashMap<&'static str, Box<dyn Processor>> = HashMap::new();
    registry.insert("keep", Box::new(keep::Keep));
    registry.insert("redact", Box::new(redact::Redact));
    registry.insert("substitute", Box::new(substitute::Substitute));
    registry.insert("generalize", Box::new(generalize::Generalize));
    registry.insert("perturb", Box::new(perturb::Perturb));
    registry.insert("dateshift", Box::new(dateshift::DateShift));
    registry.insert("cryptohash", Box::new(cryptohash::CryptoHash));
    registry.insert("encrypt", Box::new(encrypt::Encrypt));
    registry.insert("kanonymity", Box::new(kanonymity::KAnonymity));
    registry.insert("differentialprivacy", Box::new(dp::DifferentialPrivacy));
    registry
}
