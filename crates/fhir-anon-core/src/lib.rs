//! Rule-driven anonymization engine for FHIR-shaped resource trees.
//!
//! The engine is synchronous, has no I/O of its own, and treats the
//! resource schema (what fields a `Patient` or an `Observation` has) as
//! someone else's problem: every resource is a generic [`model::ElementNode`]
//! tree, and every transformation is driven by a configured rule set
//! rather than by compiled-in knowledge of any particular FHIR version.

pub mod budget;
pub mod config;
pub mod engine;
pub mod equivalence;
pub mod error;
pub mod keystore;
pub mod model;
pub mod path;
pub mod processors;
pub mod report;
pub mod rng;
pub mod validators;

pub use config::AnonymizerConfig;
pub use engine::Engine;
pub use error::{AnonymizeError, AnonymizeResult};
pub use model::{ElementNode, NodePath, Resource};
pub use report::{Outcome, ProcessRecord, ProcessResult, ProcessSummary};
