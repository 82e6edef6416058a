//! `encrypt`: AES-256-GCM encrypts a value, producing a single base64
//! blob of `nonce || ciphertext || tag`. The configured encrypt key is
//! base64-decoded and must yield exactly 32 bytes.

use super::{ProcessorContext, ProcessorOutput};
use crate::error::AnonymizeError;
use crate::model::{ElementNode, NodePath};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;

pub struct Encrypt;

const NONCE_LEN: usize = 12;

fn decode_key(encoded: &str) -> Result<[u8; 32], AnonymizeError> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| AnonymizeError::Cryptographic(format!("encryptKey is not valid base64: {e}")))?;
    if bytes.len() != 32 {
        return Err(AnonymizeError::Cryptographic(format!(
            "encryptKey must decode to exactly 32 bytes, got {}",
            bytes.len()
        )));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

impl super::Processor for Encrypt {
    fn method_name(&self) -> &'static str {
        "encrypt"
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

        let key_bytes = decode_key(&ctx.key_store.encrypt_key)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        ctx.rng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(
                nonce,
                Payload {
                    msg: original.as_bytes(),
                    aad: &[],
                },
            )
            .map_err(|e| AnonymizeError::Cryptographic(format!("AES-256-GCM encryption failed: {e}")))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        node.value = Some(Value::String(BASE64.encode(blob)));
        Ok(ProcessorOutput::applied())
    }
}
