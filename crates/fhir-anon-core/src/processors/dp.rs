//! `differentialprivacy`: adds calibrated noise to a numeric value under
//! an epsilon-differential-privacy guarantee, consuming the matching
//! privacy-budget context before any mutation happens.

use super::{ProcessorContext, ProcessorOutput};
use crate::error::AnonymizeError;
use crate::model::{ElementNode, NodePath};
use serde_json::Value;

pub struct DifferentialPrivacy;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mechanism {
    Laplace,
    Gaussian,
    /// Not independently implemented; currently aliases Laplace with a
    /// warning, as resolved in DESIGN.md.
    Exponential,
}

fn round_half_even(x: f64) -> f64 {
    let floor = x.floor();
    let diff = x - floor;
    if diff < 0.5 {
        floor
    } else if diff > 0.5 {
        floor + 1.0
    } else if (floor as i64) % 2 == 0 {
        floor
    } else {
        floor + 1.0
    }
}

impl super::Processor for DifferentialPrivacy {
    fn method_name(&self) -> &'static str {
        "differentialprivacy"
    }

    fn process(
        &self,
        node: &mut ElementNode,
        path: &NodePath,
        ctx: &mut ProcessorContext<'_>,
        settings: &serde_json::Map<String, Value>,
    ) -> Result<ProcessorOutput, AnonymizeError> {
        let epsilon = settings.get("epsilon").and_then(Value::as_f64);
        let epsilon = match epsilon {
            Some(e) if e > 0.0 => e,
            _ => {
                return Err(AnonymizeError::Processing {
                    path: path.to_pointer(),
                    message: "differentialprivacy rule requires a positive epsilon".into(),
                })
            }
        };

        let sensitivity = settings
            .get("sensitivity")
            .and_then(Value::as_f64)
            .unwrap_or(1.0);

        let budget_context = settings
            .get("budgetContext")
            .and_then(Value::as_str)
            .unwrap_or("default")
            .to_string();

        let mechanism = match settings.get("mechanism").and_then(Value::as_str) {
            Some("gaussian") => Mechanism::Gaussian,
            Some("exponential") => Mechanism::Exponential,
            _ => Mechanism::Laplace,
        };

        // Budget consumption happens before any mutation: a rejected
        // request must never be masked, never applied, and must leave the
        // node untouched.
        let remaining = ctx
            .budget
            .consume(&budget_context, epsilon, ctx.advanced_composition)?;

        let Some(original) = node.value.as_ref().and_then(Value::as_f64) else {
            return Ok(ProcessorOutput::no_op());
        };
        let was_integer = node.value.as_ref().map(Value::is_i64).unwrap_or(false)
            || node.value.as_ref().map(Value::is_u64).unwrap_or(false);

        let noise = match mechanism {
            Mechanism::Laplace => ctx.rng.laplace(sensitivity / epsilon),
            Mechanism::Gaussian => {
                let delta = settings.get("delta").and_then(Value::as_f64).unwrap_or(1e-5);
                let sigma = sensitivity * (2.0 * (1.25 / delta).ln()).sqrt() / epsilon;
                ctx.rng.gaussian(0.0, sigma)
            }
            Mechanism::Exponential => {
                tracing::warn!(
                    target: "fhir_anon::dp",
                    "exponential mechanism is not independently implemented; reusing Laplace"
                );
                ctx.rng.laplace(sensitivity / epsilon)
            }
        };

        let noised = original + noise;
        node.value = if was_integer {
            Value::from(round_half_even(noised) as i64)
        } else {
            serde_json::Number::from_f64(noised)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        };

        let mut metrics = serde_json::Map::new();
        metrics.insert("epsilonConsumed".into(), Value::from(epsilon));
        metrics.insert("budgetRemaining".into(), Value::from(remaining));
        metrics.insert(
            "mechanism".into(),
            Value::String(
                match mechanism {
                    Mechanism::Laplace => "laplace",
                    Mechanism::Gaussian => "gaussian",
                    Mechanism::Exponential => "exponential",
                }
                .to_string(),
            ),
        );

        Ok(ProcessorOutput::applied().with_metrics(metrics).mark_dp())
    }
}
