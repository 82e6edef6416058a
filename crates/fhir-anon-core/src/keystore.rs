//! Key & Parameter Store (C1): validates the secrets the configuration
//! hands in before any rule runs, rejecting obvious placeholders and weak
//! keys, and warning on short-but-plausible ones.

use crate::error::AnonymizeError;

/// Case-insensitive substrings that mark a configured key as a copy-pasted
/// placeholder rather than a real secret.
const PLACEHOLDER_TOKENS: &[&str] = &[
    "$HMAC_KEY",
    "YOUR_KEY_HERE",
    "YOUR_SECRET_HERE",
    "CHANGE_ME",
    "CHANGEME",
    "REPLACE_ME",
    "TODO",
    "FIXME",
    "EXAMPLE_KEY",
    "SAMPLE_KEY",
];

/// Exact (lower-cased) matches that are rejected outright regardless of
/// length, because they are dictionary words rather than secrets.
const WEAK_EXACT: &[&str] = &["password", "secret", "key", "12345678", "00000000", "changeit"];

const MIN_RECOMMENDED_LEN: usize = 16;

fn validate_key(key: &str, feature: &str) -> Result<(), AnonymizeError> {
    if key.is_empty() {
        // An empty key is only tolerated when the caller confirms the
        // corresponding feature is unused; see `KeyStore::new`.
        return Ok(());
    }

    let upper = key.to_uppercase();
    for token in PLACEHOLDER_TOKENS {
        if upper.contains(token) {
            return Err(AnonymizeError::Security(format!(
                "{feature} looks like an unfilled placeholder"
            )));
        }
    }

    let lower = key.to_lowercase();
    if WEAK_EXACT.contains(&lower.as_str()) {
        return Err(AnonymizeError::Security(format!(
            "{feature} is a well-known weak key"
        )));
    }

    if let Some(first) = key.chars().next() {
        if key.chars().all(|c| c == first) {
            return Err(AnonymizeError::Security(format!(
                "{feature} is a single repeated character"
            )));
        }
    }

    if key.len() < MIN_RECOMMENDED_LEN {
        tracing::warn!(
            target: "fhir_anon::keystore",
            feature,
            len = key.len(),
            recommended = MIN_RECOMMENDED_LEN,
            "configured key is shorter than recommended"
        );
    }

    Ok(())
}

/// Holds the three secrets the processor set consumes: the date-shift key,
/// the crypto-hash HMAC key, and the AES-256-GCM encryption key.
#[derive(Debug, Clone)]
pub struct KeyStore {
    pub date_shift_key: String,
    pub date_shift_key_prefix: String,
    pub crypto_hash_key: String,
    pub encrypt_key: String,
}

impl KeyStore {
    pub fn new(
        date_shift_key: String,
        date_shift_key_prefix: String,
        crypto_hash_key: String,
        encrypt_key: String,
        methods_in_use: &[&str],
    ) -> Result<Self, AnonymizeError> {
        validate_key(&date_shift_key, "dateShiftKey")?;
        validate_key(&crypto_hash_key, "cryptoHashKey")?;
        validate_key(&encrypt_key, "encryptKey")?;

        if methods_in_use.contains(&"dateshift") && date_shift_key.is_empty() {
            return Err(AnonymizeError::Configuration(
                "dateShiftKey is required because a dateshift rule is configured".into(),
            ));
        }
        if methods_in_use.contains(&"cryptohash") && crypto_hash_key.is_empty() {
            return Err(AnonymizeError::Configuration(
                "cryptoHashKey is required because a cryptohash rule is configured".into(),
            ));
        }
        if methods_in_use.contains(&"encrypt") && encrypt_key.is_empty() {
            return Err(AnonymizeError::Configuration(
                "encryptKey is required because an encrypt rule is configured".into(),
            ));
        }

        Ok(KeyStore {
            date_shift_key,
            date_shift_key_prefix,
            crypto_hash_key,
            encrypt_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_placeholder_tokens() {
        let err = validate_key("please_$HMAC_KEY_fill_in", "dateShiftKey").unwrap_err();
        assert!(matches!(err, AnonymizeError::Security(_)));
    }

    #[test]
    fn rejects_repeated_character_keys() {
        assert!(validate_key("aaaaaaaaaaaaaaaa", "encryptKey").is_err());
    }

    #[test]
    fn accepts_reasonable_key() {
        assert!(validate_key("a-much-more-plausible-32-byte-secret", "encryptKey").is_ok());
    }

    #[test]
    fn empty_key_is_tolerated_pending_usage_check() {
        assert!(validate_key("", "encryptKey").is_ok());
    }

    #[test]
    fn requires_key_when_method_in_use() {
        let err = KeyStore::new(
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            &["dateshift"],
        )
        .unwrap_err();
        assert!(matches!(err, AnonymizeError::Configuration(_)));
    }
}
