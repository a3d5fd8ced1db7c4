//! # Salted Content Hashing
//!
//! Every identifier and every party signature in Tally is a
//! [`ContentHash`]: `hex(SHA-256(salt || value))`. No timestamps, no nonces,
//! no randomness inside the hash itself. The same inputs always produce the
//! same output, because these values are lookup keys, not session tokens.
//!
//! Two kinds of salt feed this module:
//!
//! - **Global salt**: one per deployment, from [`crate::config::EngineConfig`].
//!   Used for user identifiers, so the same email+password always resolves
//!   to the same user.
//! - **Record salt**: 16 random bytes minted when a row is created and
//!   stored on that row. Used for card, profile, transaction and contract
//!   identifiers, party signatures and PIN hashes.
//!
//! ## Inputs are text, full stop
//!
//! The hash takes `&str` and rejects empty strings. The dynamic entry point
//! [`hash_field`] refuses anything that isn't [`FieldValue::Text`]; we never
//! quietly format a number into a string and hash that.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{HASH_HEX_LENGTH, RECORD_SALT_BYTES};
use crate::error::{EngineError, EngineResult};
use crate::validation::FieldValue;

// ---------------------------------------------------------------------------
// ContentHash
// ---------------------------------------------------------------------------

/// A 64-character lowercase hex SHA-256 digest.
///
/// Not reversible. Equality is the only operation that means anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Borrow the hex form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentHash {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == HASH_HEX_LENGTH
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(EngineError::type_mismatch(
                "identifier",
                format!("expected {HASH_HEX_LENGTH} lowercase hex characters"),
            ));
        }
        Ok(ContentHash(s.to_string()))
    }
}

impl TryFrom<String> for ContentHash {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Core hash
// ---------------------------------------------------------------------------

/// Compute the raw SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `hex(SHA-256(salt || value))`.
///
/// # Errors
///
/// [`EngineError::TypeMismatch`] if either input is empty.
///
/// # Example
///
/// ```
/// use tally_protocol::crypto::salted_hash;
///
/// let a = salted_hash("alice@example.com", "pepper").unwrap();
/// let b = salted_hash("alice@example.com", "pepper").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.as_str().len(), 64);
/// ```
pub fn salted_hash(value: &str, salt: &str) -> EngineResult<ContentHash> {
    if value.is_empty() {
        return Err(EngineError::type_mismatch("value", "hash input must be non-empty text"));
    }
    if salt.is_empty() {
        return Err(EngineError::type_mismatch("salt", "hash salt must be non-empty text"));
    }

    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(value.as_bytes());
    Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash a dynamically-typed field value.
///
/// Only [`FieldValue::Text`] is accepted. Numbers, booleans and null are a
/// [`EngineError::TypeMismatch`] naming `field`.
pub fn hash_field(field: &str, value: &FieldValue, salt: &str) -> EngineResult<ContentHash> {
    match value {
        FieldValue::Text(text) if !text.is_empty() => salted_hash(text, salt),
        FieldValue::Text(_) => Err(EngineError::type_mismatch(field, "cannot hash empty text")),
        other => Err(EngineError::type_mismatch(
            field,
            format!("cannot hash a {} value, expected text", other.type_name()),
        )),
    }
}

// ---------------------------------------------------------------------------
// Derivations
// ---------------------------------------------------------------------------

/// User identifier: `hash(email + password, global_salt)`.
pub fn user_identifier(email: &str, password: &str, global_salt: &str) -> EngineResult<ContentHash> {
    salted_hash(&format!("{email}{password}"), global_salt)
}

/// Card identifier: `hash(number + cvv + MM/YY, record_salt)`.
pub fn card_identifier(
    number: &str,
    cvv: &str,
    expiry_short_date: &str,
    record_salt: &str,
) -> EngineResult<ContentHash> {
    salted_hash(&format!("{number}{cvv}{expiry_short_date}"), record_salt)
}

/// Contract identifier: `hash(body, record_salt)`.
pub fn contract_identifier(body: &str, record_salt: &str) -> EngineResult<ContentHash> {
    salted_hash(body, record_salt)
}

/// Party signature: `hash(counterparty_card_id, record_salt)`.
///
/// Not a digital signature. It's a lightweight bearer token tying a
/// transaction or contract to the cards of its two parties.
pub fn party_signature(counterparty_card_id: &ContentHash, record_salt: &str) -> EngineResult<ContentHash> {
    salted_hash(counterparty_card_id.as_str(), record_salt)
}

/// PIN hash: `hash(pin, record_salt)` using the card's own salt.
pub fn pin_hash(pin: &str, record_salt: &str) -> EngineResult<ContentHash> {
    salted_hash(pin, record_salt)
}

/// Payment profile identifier: `hash(user_identifier + card_identifier, record_salt)`.
pub fn profile_identifier(
    user_identifier: &ContentHash,
    card_identifier: &ContentHash,
    record_salt: &str,
) -> EngineResult<ContentHash> {
    salted_hash(&format!("{user_identifier}{card_identifier}"), record_salt)
}

/// Transaction identifier over the row's defining content.
pub fn transaction_identifier(
    sender: &ContentHash,
    receiver: &ContentHash,
    amount: u64,
    currency: &str,
    created_at_millis: i64,
    record_salt: &str,
) -> EngineResult<ContentHash> {
    salted_hash(
        &format!("{sender}{receiver}{amount}{currency}{created_at_millis}"),
        record_salt,
    )
}

/// Mint a fresh per-record salt: 16 bytes from the OS RNG, hex-encoded.
pub fn new_record_salt() -> String {
    let mut bytes = [0u8; RECORD_SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string.
        let hash = sha256(b"");
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(hash.as_slice(), expected.as_slice());
    }

    #[test]
    fn salted_hash_is_salt_then_value() {
        let expected = hex::encode(sha256(b"pepperalice"));
        let hash = salted_hash("alice", "pepper").unwrap();
        assert_eq!(hash.as_str(), expected);
    }

    #[test]
    fn salted_hash_deterministic() {
        let a = salted_hash("tally", "salt").unwrap();
        let b = salted_hash("tally", "salt").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), HASH_HEX_LENGTH);
    }

    #[test]
    fn salt_changes_the_output() {
        let a = salted_hash("tally", "salt-a").unwrap();
        let b = salted_hash("tally", "salt-b").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_inputs_are_type_mismatches() {
        assert!(matches!(
            salted_hash("", "salt"),
            Err(EngineError::TypeMismatch { .. })
        ));
        assert!(matches!(
            salted_hash("value", ""),
            Err(EngineError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn hash_field_refuses_non_text() {
        for value in [
            FieldValue::Unsigned(42),
            FieldValue::Integer(-1),
            FieldValue::Boolean(true),
            FieldValue::Null,
        ] {
            let err = hash_field("amount", &value, "salt").unwrap_err();
            match err {
                EngineError::TypeMismatch { field, .. } => assert_eq!(field, "amount"),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn hash_field_matches_salted_hash_for_text() {
        let via_field = hash_field("email", &FieldValue::Text("x@y.io".into()), "s").unwrap();
        assert_eq!(via_field, salted_hash("x@y.io", "s").unwrap());
    }

    #[test]
    fn user_identifier_concatenates_email_and_password() {
        let id = user_identifier("a@b.co", "hunter22", "global").unwrap();
        assert_eq!(id, salted_hash("a@b.cohunter22", "global").unwrap());
    }

    #[test]
    fn party_signature_depends_on_counterparty_card() {
        let card_a = salted_hash("card-a", "s").unwrap();
        let card_b = salted_hash("card-b", "s").unwrap();
        let sig_a = party_signature(&card_a, "row-salt").unwrap();
        let sig_b = party_signature(&card_b, "row-salt").unwrap();
        assert_ne!(sig_a, sig_b);
    }

    #[test]
    fn content_hash_parse_validates_shape() {
        let good = salted_hash("x", "y").unwrap();
        let parsed: ContentHash = good.as_str().parse().unwrap();
        assert_eq!(parsed, good);

        assert!("abc".parse::<ContentHash>().is_err());
        assert!(good.as_str().to_uppercase().parse::<ContentHash>().is_err());
        let not_hex = "g".repeat(HASH_HEX_LENGTH);
        assert!(not_hex.parse::<ContentHash>().is_err());
    }

    #[test]
    fn content_hash_serde_rejects_garbage() {
        let good = salted_hash("x", "y").unwrap();
        let json = serde_json::to_string(&good).unwrap();
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, good);
        assert!(serde_json::from_str::<ContentHash>("\"nope\"").is_err());
    }

    #[test]
    fn record_salts_are_fresh() {
        let a = new_record_salt();
        let b = new_record_salt();
        assert_ne!(a, b);
        assert_eq!(a.len(), RECORD_SALT_BYTES * 2);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_hash_is_deterministic(value in ".{1,64}", salt in ".{1,32}") {
                let a = salted_hash(&value, &salt).unwrap();
                let b = salted_hash(&value, &salt).unwrap();
                prop_assert_eq!(a, b);
            }

            #[test]
            fn prop_distinct_values_distinct_hashes(
                a in "[a-z0-9]{1,32}",
                b in "[a-z0-9]{1,32}",
                salt in "[a-z]{1,16}",
            ) {
                prop_assume!(a != b);
                prop_assert_ne!(salted_hash(&a, &salt).unwrap(), salted_hash(&b, &salt).unwrap());
            }
        }
    }
}
