//! `dateshift`: shifts date/dateTime/instant values by a deterministic,
//! per-subject offset in `[-50, 50] \ {0}` days, derived from a keyed hash
//! of `key || key_prefix || subject_id`, unless a fixed offset override is
//! configured.

use super::{ProcessorContext, ProcessorOutput};
use crate::error::AnonymizeError;
use crate::model::{ElementNode, NodePath};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub struct DateShift;

/// Derives a deterministic, non-zero day offset in `[-50, 50]` from a
/// keyed hash of `key || key_prefix || subject_id`.
pub fn derive_offset_days(key: &str, key_prefix: &str, subject_id: &str) -> Result<i64, AnonymizeError> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| AnonymizeError::Cryptographic(format!("invalid dateShiftKey: {e}")))?;
    mac.update(key_prefix.as_bytes());
    mac.update(subject_id.as_bytes());
    let digest = mac.finalize().into_bytes();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[0..8]);
    let value = u64::from_be_bytes(bytes);
    let r = (value % 100) as i64;
    // r in 0..49 -> -50..-1 ; r in 50..99 -> 1..50. Zero is structurally
    // excluded rather than re-rolled.
    Ok(if r < 50 { r - 50 } else { r - 49 })
}

fn shift_date_string(value: &str, offset_days: i64) -> Option<String> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        let shifted = dt + Duration::days(offset_days);
        return Some(shifted.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let shifted = date + Duration::days(offset_days);
        return Some(shifted.format("%Y-%m-%d").to_string());
    }
    if value.len() == 4 {
        // year-only precision: no day component to shift, left unchanged
        return Some(value.to_string());
    }
    None
}

impl super::Processor for DateShift {
    fn method_name(&self) -> &'static str {
        "dateshift"
    }

    fn process(
        &self,
        node: &mut ElementNode,
        _path: &NodePath,
        ctx: &mut ProcessorContext<'_>,
        settings: &serde_json::Map<String, Value>,
    ) -> Result<ProcessorOutput, AnonymizeError> {
        let Some(original) = node.value_as_str().map(String::from) else {
            return Ok(ProcessorOutput::no_op());
        };

        let fixed_offset = settings
            .get("fixedOffsetInDays")
            .and_then(Value::as_i64);

        let offset = match fixed_offset {
            Some(o) => o,
            None => derive_offset_days(
                &ctx.key_store.date_shift_key,
                &ctx.key_store.date_shift_key_prefix,
                ctx.subject_id,
            )?,
        };

        let Some(shifted) = shift_date_string(&original, offset) else {
            return Err(AnonymizeError::Processing {
                path: String::new(),
                message: format!("unrecognized date format: {original}"),
            });
        };

        node.value = Some(Value::String(shifted));
        let mut metrics = serde_json::Map::new();
        metrics.insert("offsetDays".into(), Value::from(offset));
        Ok(ProcessorOutput::applied().with_metrics(metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_never_zero_and_bounded() {
        for i in 0..500 {
            let offset =
                derive_offset_days("a-strong-key", "prefix", &format!("subject-{i}")).unwrap();
            assert_ne!(offset, 0);
            assert!((-50..=50).contains(&offset));
        }
    }

    #[test]
    fn offset_is_deterministic_per_subject() {
        let a = derive_offset_days("k", "p", "subject-1").unwrap();
        let b = derive_offset_days("k", "p", "subject-1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn shift_preserves_date_only_precision() {
        let shifted = shift_date_string("2020-01-01", 5).unwrap();
        assert_eq!(shifted, "2020-01-06");
    }
}
