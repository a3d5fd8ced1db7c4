//! # Cryptographic Primitives for Tally
//!
//! Two things live here, and only two:
//!
//! - **Salted SHA-256** ([`hash`]) for identifiers, party signatures and PIN
//!   hashes. Deterministic on purpose, since these are lookup keys.
//! - **AES-256-GCM** ([`encryption`]) for sealing record snapshots before
//!   they leave the engine.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. Everything here is a thin, type-safe wrapper around audited
//! implementations. If you're tempted to optimize these functions, please
//! reconsider. Then go read about timing attacks and come back when you've
//! lost the urge.

pub mod encryption;
pub mod hash;

// Re-export the things people actually need so they don't have to memorize
// our module hierarchy.
pub use encryption::{EncryptedPayload, Envelope, SymmetricKey};
pub use hash::{
    card_identifier, contract_identifier, hash_field, new_record_salt, party_signature, pin_hash,
    profile_identifier, salted_hash, sha256, transaction_identifier, user_identifier, ContentHash,
};
