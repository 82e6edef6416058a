//! `perturb`: adds bounded random noise to a numeric value, drawn from the
//! same CSPRNG-backed source the differential-privacy processor uses.

use super::{ProcessorContext, ProcessorOutput};
use crate::error::AnonymizeError;
use crate::model::{ElementNode, NodePath};
use serde_json::Value;

pub struct Perturb;

#[derive(Debug, Clone, Copy, PartialEq)]
enum RangeType {
    Fixed,
    Proportional,
}

impl super::Processor for Perturb {
    fn method_name(&self) -> &'static str {
        "perturb"
    }

    fn process(
        &self,
        node: &mut ElementNode,
        _path: &NodePath,
        ctx: &mut ProcessorContext<'_>,
        settings: &serde_json::Map<String, Value>,
    ) -> Result<ProcessorOutput, AnonymizeError> {
        let span = settings
            .get("span")
            .and_then(Value::as_f64)
            .ok_or_else(|| AnonymizeError::Configuration("perturb rule requires a span".into()))?;
        if span <= 0.0 {
            return Err(AnonymizeError::Configuration(
                "perturb span must be positive".into(),
            ));
        }
        let range_type = match settings.get("rangeType").and_then(Value::as_str) {
            Some("proportional") => RangeType::Proportional,
            _ => RangeType::Fixed,
        };
        let round_to = settings
            .get("roundTo")
            .and_then(Value::as_u64)
            .unwrap_or(0) as i32;

        let Some(original) = node.value.as_ref().and_then(Value::as_f64) else {
            return Ok(ProcessorOutput::no_op());
        };
        let was_integer = node.value.as_ref().map(Value::is_i64).unwrap_or(false)
            || node.value.as_ref().map(Value::is_u64).unwrap_or(false);

        let half_span = match range_type {
            RangeType::Fixed => span / 2.0,
            RangeType::Proportional => (original.abs() * span) / 2.0,
        };
        let noise = ctx.rng.uniform_range(-half_span, half_span);
        let mut perturbed = original + noise;

        let decimals = if was_integer { 0 } else { round_to };
        let factor = 10f64.powi(decimals);
        perturbed = (perturbed * factor).round() / factor;

        node.value = if was_integer {
            Value::from(perturbed as i64)
        } else {
            serde_json::Number::from_f64(perturbed)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        };

        Ok(ProcessorOutput::applied())
    }
}
