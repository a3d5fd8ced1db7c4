//! # Record Envelope (AES-256-GCM)
//!
//! Every outward-facing "get record" goes through here: the record's public
//! view is serialized to canonical JSON, sealed with the deployment's
//! symmetric key, and handed back as an opaque [`EncryptedPayload`].
//!
//! ## Nonce management
//!
//! GCM is unforgiving about nonce reuse. Two messages under the same key and
//! nonce leak the XOR of the plaintexts and let an attacker forge tags.
//! Our strategy: a random 96-bit nonce from the OS RNG for every seal. The
//! birthday bound for 96-bit nonces is ~2^48 messages per key, far beyond
//! anything a single deployment will seal.
//!
//! ## Wire format
//!
//! ```text
//! hex( nonce (12B) || ciphertext || tag (16B) )
//! ```
//!
//! ## Failure modes
//!
//! [`Envelope::open`] fails with [`EngineError::Crypto`] for a bad hex
//! string, a truncated payload, a wrong key, or a flipped bit. All of them
//! look identical from the outside. The difference between "wrong key" and
//! "corrupted ciphertext" is none of an attacker's business.

use std::fmt;
use std::str::FromStr;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH, AES_TAG_LENGTH};
use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// SymmetricKey
// ---------------------------------------------------------------------------

/// The deployment's 256-bit envelope key. Zeroed when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; AES_KEY_LENGTH]);

impl SymmetricKey {
    /// Fresh key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; AES_KEY_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; AES_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse a hex-encoded key.
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] if the string isn't hex or isn't 32 bytes.
    pub fn from_hex(encoded: &str) -> EngineResult<Self> {
        let mut raw = hex::decode(encoded.trim())
            .map_err(|_| EngineError::Config("symmetric key is not valid hex".into()))?;
        if raw.len() != AES_KEY_LENGTH {
            raw.zeroize();
            return Err(EngineError::Config(format!(
                "symmetric key must be {AES_KEY_LENGTH} bytes"
            )));
        }
        let mut bytes = [0u8; AES_KEY_LENGTH];
        bytes.copy_from_slice(&raw);
        raw.zeroize();
        Ok(Self(bytes))
    }

    /// Hex form, for writing config files.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn as_bytes(&self) -> &[u8; AES_KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// EncryptedPayload
// ---------------------------------------------------------------------------

/// Opaque sealed text handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedPayload(String);

impl EncryptedPayload {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EncryptedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EncryptedPayload {
    type Err = std::convert::Infallible;

    /// Any text is accepted here; validity is only decided by [`Envelope::open`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_string()))
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Seals and opens record snapshots under a single process-wide key.
#[derive(Clone)]
pub struct Envelope {
    cipher: Aes256Gcm,
}

impl Envelope {
    pub fn new(key: &SymmetricKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
        }
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    ///
    /// Well-formed input never fails; the `Result` only exists because the
    /// AEAD API reports absurd (multi-gigabyte) lengths as errors.
    pub fn seal(&self, plaintext: &[u8]) -> EngineResult<EncryptedPayload> {
        let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| EngineError::Crypto)?;

        let mut out = Vec::with_capacity(AES_NONCE_LENGTH + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(EncryptedPayload(hex::encode(out)))
    }

    /// Decrypt a payload produced by [`seal`](Self::seal).
    ///
    /// Fails closed with [`EngineError::Crypto`]; never returns partial data.
    pub fn open(&self, payload: &EncryptedPayload) -> EngineResult<Vec<u8>> {
        let data = hex::decode(payload.as_str()).map_err(|_| EngineError::Crypto)?;
        if data.len() < AES_NONCE_LENGTH + AES_TAG_LENGTH {
            return Err(EngineError::Crypto);
        }

        let (nonce_bytes, ciphertext) = data.split_at(AES_NONCE_LENGTH);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| EngineError::Crypto)
    }

    /// Serialize `value` to canonical JSON and seal it.
    pub fn seal_json<T: Serialize>(&self, value: &T) -> EngineResult<EncryptedPayload> {
        let mut json = serde_json::to_vec(value)
            .map_err(|e| EngineError::Storage(format!("snapshot encoding: {e}")))?;
        let sealed = self.seal(&json);
        json.zeroize();
        sealed
    }

    /// Open a payload and decode its JSON body.
    ///
    /// A payload that decrypts but doesn't decode as `T` is still a
    /// [`EngineError::Crypto`]: to the caller it is simply not a valid envelope.
    pub fn open_json<T: DeserializeOwned>(&self, payload: &EncryptedPayload) -> EngineResult<T> {
        let mut plaintext = self.open(payload)?;
        let decoded = serde_json::from_slice(&plaintext).map_err(|_| EngineError::Crypto);
        plaintext.zeroize();
        decoded
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Envelope(AES-256-GCM)")
    }
}
