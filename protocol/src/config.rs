//! # Engine Configuration & Constants
//!
//! Every magic number in Tally lives here. If you're hardcoding a card
//! length or a nonce size somewhere else, you're doing it wrong.
//!
//! The second half of this module is [`EngineConfig`]: the process-wide,
//! read-only settings (global salt, symmetric key, card geometry) that are
//! loaded once at startup and handed to the [`crate::engine::Engine`] by
//! value. There is no global singleton. If a component needs the salt, it
//! gets a reference to the config that owns it.
//!
//! Changing the global salt after the first user registers invalidates every
//! identifier ever minted. Treat it like a database password that can never
//! be rotated.

use std::io::Write;
use std::path::Path;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::crypto::encryption::SymmetricKey;
use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. Twelve. Not sixteen.
pub const AES_NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const AES_TAG_LENGTH: usize = 16;

/// SHA-256 digest length in bytes.
pub const HASH_OUTPUT_LENGTH: usize = 32;

/// Length of a [`crate::crypto::ContentHash`] rendered as lowercase hex.
pub const HASH_HEX_LENGTH: usize = HASH_OUTPUT_LENGTH * 2;

/// Random bytes behind a per-record salt (hex-encoded on the row).
pub const RECORD_SALT_BYTES: usize = 16;

// ---------------------------------------------------------------------------
// Card Allocation
// ---------------------------------------------------------------------------

/// Card number length when the deployment doesn't override it. Sixteen
/// digits is what every payment terminal on the planet expects.
pub const DEFAULT_CARD_NUMBER_LENGTH: usize = 16;

/// Shortest card number we are willing to mint (prefix + body + check digit).
pub const MIN_CARD_NUMBER_LENGTH: usize = 12;

/// Longest card number we are willing to mint.
pub const MAX_CARD_NUMBER_LENGTH: usize = 19;

/// CVV length when the deployment doesn't override it.
pub const DEFAULT_CVV_LENGTH: usize = 3;

/// Accepted CVV lengths. Three for most networks, four for the fancy ones.
pub const MIN_CVV_LENGTH: usize = 3;
pub const MAX_CVV_LENGTH: usize = 4;

/// PIN length. Four digits, hashed on arrival, never stored in clear.
pub const PIN_LENGTH: usize = 4;

/// How many fresh candidates the allocator draws before giving up on a
/// card number. Collisions at 16 digits are astronomically rare, so
/// exhausting this budget means something is badly wrong with the RNG
/// or the store.
pub const CARD_ALLOCATION_ATTEMPTS: usize = 3;

/// Card validity window, in months from issue.
pub const CARD_VALIDITY_MONTHS: u32 = 60;

// ---------------------------------------------------------------------------
// Field Limits
// ---------------------------------------------------------------------------

/// Longest accepted person name (first or last), after trimming.
pub const MAX_NAME_LENGTH: usize = 64;

/// Accepted password length bounds. Passwords are hashed into the user
/// identifier and then forgotten.
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Longest accepted alias or contract title.
pub const MAX_TITLE_LENGTH: usize = 120;

/// Longest accepted free-form description.
pub const MAX_DESCRIPTION_LENGTH: usize = 2_000;

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Environment variable holding the global salt.
pub const ENV_GLOBAL_SALT: &str = "TALLY_GLOBAL_SALT";

/// Environment variable holding the hex-encoded symmetric key.
pub const ENV_SYMMETRIC_KEY: &str = "TALLY_SYMMETRIC_KEY";

/// Optional override for the card number length.
pub const ENV_CARD_NUMBER_LENGTH: &str = "TALLY_CARD_NUMBER_LENGTH";

/// Optional override for the CVV length.
pub const ENV_CVV_LENGTH: &str = "TALLY_CVV_LENGTH";

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Process-scoped, read-only engine settings.
///
/// Construct it once (from a file, the environment, or [`generate`](Self::generate)
/// for a fresh deployment) and hand it to the engine. Nothing mutates it
/// afterwards.
#[derive(Clone)]
pub struct EngineConfig {
    global_salt: String,
    symmetric_key: SymmetricKey,
    card_number_length: usize,
    cvv_length: usize,
}

/// On-disk form of [`EngineConfig`]. The key travels as hex.
#[derive(Serialize, Deserialize)]
struct ConfigFile {
    global_salt: String,
    symmetric_key: String,
    #[serde(default = "default_card_number_length")]
    card_number_length: usize,
    #[serde(default = "default_cvv_length")]
    cvv_length: usize,
}

fn default_card_number_length() -> usize {
    DEFAULT_CARD_NUMBER_LENGTH
}

fn default_cvv_length() -> usize {
    DEFAULT_CVV_LENGTH
}

impl EngineConfig {
    /// Build a config, validating every field.
    pub fn new(
        global_salt: impl Into<String>,
        symmetric_key: SymmetricKey,
        card_number_length: usize,
        cvv_length: usize,
    ) -> EngineResult<Self> {
        let global_salt = global_salt.into();
        if global_salt.is_empty() {
            return Err(EngineError::Config("global salt must not be empty".into()));
        }
        if !(MIN_CARD_NUMBER_LENGTH..=MAX_CARD_NUMBER_LENGTH).contains(&card_number_length) {
            return Err(EngineError::Config(format!(
                "card number length must be within {MIN_CARD_NUMBER_LENGTH}..={MAX_CARD_NUMBER_LENGTH}, got {card_number_length}"
            )));
        }
        if !(MIN_CVV_LENGTH..=MAX_CVV_LENGTH).contains(&cvv_length) {
            return Err(EngineError::Config(format!(
                "cvv length must be within {MIN_CVV_LENGTH}..={MAX_CVV_LENGTH}, got {cvv_length}"
            )));
        }

        Ok(Self {
            global_salt,
            symmetric_key,
            card_number_length,
            cvv_length,
        })
    }

    /// A brand-new deployment: random global salt, random key, default
    /// card geometry.
    pub fn generate() -> Self {
        let mut salt = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        Self {
            global_salt: hex::encode(salt),
            symmetric_key: SymmetricKey::generate(),
            card_number_length: DEFAULT_CARD_NUMBER_LENGTH,
            cvv_length: DEFAULT_CVV_LENGTH,
        }
    }

    /// Read the config from the environment.
    ///
    /// `TALLY_GLOBAL_SALT` and `TALLY_SYMMETRIC_KEY` are required; the
    /// card geometry falls back to the defaults.
    pub fn from_env() -> EngineResult<Self> {
        let salt = std::env::var(ENV_GLOBAL_SALT)
            .map_err(|_| EngineError::Config(format!("{ENV_GLOBAL_SALT} is not set")))?;
        let key_hex = std::env::var(ENV_SYMMETRIC_KEY)
            .map_err(|_| EngineError::Config(format!("{ENV_SYMMETRIC_KEY} is not set")))?;
        let key = SymmetricKey::from_hex(&key_hex)?;

        let card_number_length = env_usize(ENV_CARD_NUMBER_LENGTH, DEFAULT_CARD_NUMBER_LENGTH)?;
        let cvv_length = env_usize(ENV_CVV_LENGTH, DEFAULT_CVV_LENGTH)?;

        Self::new(salt, key, card_number_length, cvv_length)
    }

    /// Load a JSON config file written by [`save`](Self::save).
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let file: ConfigFile = serde_json::from_str(&raw).map_err(|e| {
            EngineError::Config(format!("malformed config {}: {e}", path.display()))
        })?;
        let key = SymmetricKey::from_hex(&file.symmetric_key)?;
        Self::new(file.global_salt, key, file.card_number_length, file.cvv_length)
    }

    /// Write the config as JSON. On unix the file is restricted to the
    /// owner, since it holds the salt and the key.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> EngineResult<()> {
        let path = path.as_ref();
        let file = ConfigFile {
            global_salt: self.global_salt.clone(),
            symmetric_key: self.symmetric_key.to_hex(),
            card_number_length: self.card_number_length,
            cvv_length: self.cvv_length,
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| EngineError::Config(e.to_string()))?;
        let write_err =
            |e: std::io::Error| EngineError::Config(format!("cannot write {}: {e}", path.display()));

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut out = options.open(path).map_err(write_err)?;

        // `mode` only applies on creation; an overwritten file keeps its bits.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            out.set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }
        out.write_all(json.as_bytes()).map_err(write_err)?;
        out.sync_all().map_err(write_err)?;

        Ok(())
    }

    pub fn global_salt(&self) -> &str {
        &self.global_salt
    }

    pub fn symmetric_key(&self) -> &SymmetricKey {
        &self.symmetric_key
    }

    pub fn card_number_length(&self) -> usize {
        self.card_number_length
    }

    pub fn cvv_length(&self) -> usize {
        self.cvv_length
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("global_salt", &"<redacted>")
            .field("symmetric_key", &self.symmetric_key)
            .field("card_number_length", &self.card_number_length)
            .field("cvv_length", &self.cvv_length)
            .finish()
    }
}

fn env_usize(name: &str, default: usize) -> EngineResult<usize> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| EngineError::Config(format!("{name} must be a positive integer"))),
        Err(_) => Ok(default),
    }
}
