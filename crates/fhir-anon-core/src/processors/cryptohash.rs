//! `cryptohash`: replaces a value with its HMAC-SHA-256 hex digest.
//! `Reference` values in `ResourceType/id` form are special-cased so only
//! the `id` portion is hashed, preserving the resource-type prefix.

use super::{ProcessorContext, ProcessorOutput};
use crate::error::AnonymizeError;
use crate::model::{ElementNode, NodePath};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub struct CryptoHash;

fn hmac_hex(key: &str, data: &str) -> Result<String, AnonymizeError> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| AnonymizeError::Cryptographic(format!("invalid cryptoHashKey: {e}")))?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

impl super::Processor for CryptoHash {
    fn method_name(&self) -> &'static str {
        "cryptohash"
    }

    fn process(
        &self,
        node: &mut ElementNode,
        _path: &NodePath,
        ctx: &mut ProcessorContext<'_>,
        _settings: &serde_json::Map<String, Value>,
    ) -> Result<ProcessorOutput, AnonymizeError> {
        let Some(original) = node.value_as_str().map(String::from) else {
            return Ok(ProcessorOutput::no_op());
        };

        let key = &ctx.key_store.crypto_hash_key;

        if node.instance_type == "Reference" {
            if let Some((resource_type, id)) = original.split_once('/') {
                let hashed_id = hmac_hex(key, id)?;
                node.value = Some(Value::String(format!("{resource_type}/{hashed_id}")));
                return Ok(ProcessorOutput::applied());
            }
        }

        let hashed = hmac_hex(key, &original)?;
        node.value = Some(Value::String(hashed));
        Ok(ProcessorOutput::applied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_hash_preserves_type_prefix() {
        let hashed_id = hmac_hex("k", "123").unwrap();
        let expected = format!("Patient/{hashed_id}");
        let mut node = ElementNode::new_leaf("Reference", "subject", "Patient/123".into());
        let hashed = if node.instance_type == "Reference" {
            let (rt, id) = node.value_as_str().unwrap().split_once('/').unwrap();
            format!("{rt}/{}", hmac_hex("k", id).unwrap())
        } else {
            unreachable!()
        };
        assert_eq!(hashed, expected);
        node.value = Some(Value::String(hashed));
        assert_eq!(node.value_as_str(), Some(expected.as_str()));
    }

    #[test]
    fn same_input_hashes_deterministically() {
        let a = hmac_hex("key", "value").unwrap();
        let b = hmac_hex("key", "value").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_keys_hash_differently() {
        let a = hmac_hex("key-one", "value").unwrap();
        let b = hmac_hex("key-two", "value").unwrap();
        assert_ne!(a, b);
    }
}
