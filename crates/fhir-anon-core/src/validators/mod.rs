pub mod kanon;
pub mod risk;

pub use kanon::{validate_k_anonymity, KAnonymityReport, KAnonymityViolation};
pub use risk::{assess_risk, RiskLevel, RiskReport};
