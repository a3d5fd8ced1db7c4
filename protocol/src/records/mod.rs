//! # Records
//!
//! Plain data, one struct per record kind, plus a closed field enum per
//! kind naming what an update is allowed to touch. No record validates or
//! serializes itself through inheritance tricks. The gateway in
//! [`crate::validation`] does the checking, [`crate::storage`] does the
//! persisting, and the engine glues them together.
//!
//! ## Architecture
//!
//! ```text
//! user.rs     - User, UserField, NewUser
//! card.rs     - Card, CardStatus, CardField
//! profile.rs  - PaymentProfile, ProfileField, NewProfile
//! ```
//!
//! Transactions live in [`crate::transaction`], contracts in the
//! `tally-contracts` crate. Both bind their two parties with
//! [`PartySignatures`], defined here.

pub mod card;
pub mod profile;
pub mod user;

pub use card::{Card, CardField, CardStatus, CardView};
pub use profile::{NewProfile, PaymentProfile, ProfileField, ProfileView};
pub use user::{NewUser, User, UserField, UserView};

use serde::{Deserialize, Serialize};

use crate::crypto::{party_signature, ContentHash};
use crate::error::{EngineError, EngineResult};
use crate::validation::FieldValue;

// ---------------------------------------------------------------------------
// Party signatures
// ---------------------------------------------------------------------------

/// The two bearer tokens binding a two-party record to its parties' cards.
///
/// The initiator (sender, contractor) holds `hash(counterparty_card, salt)`
/// and the counterparty (receiver, contractee) holds
/// `hash(initiator_card, salt)`. Every later mutation must present both,
/// byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySignatures {
    pub initiator: ContentHash,
    pub counterparty: ContentHash,
}

impl PartySignatures {
    /// Mint the pair for a new record.
    pub fn bind(
        initiator_card: &ContentHash,
        counterparty_card: &ContentHash,
        record_salt: &str,
    ) -> EngineResult<Self> {
        Ok(Self {
            initiator: party_signature(counterparty_card, record_salt)?,
            counterparty: party_signature(initiator_card, record_salt)?,
        })
    }

    /// Check a presented pair against the stored one.
    pub fn authorize(&self, presented: &PartySignatures) -> EngineResult<()> {
        if self == presented {
            Ok(())
        } else {
            Err(EngineError::Authorization)
        }
    }
}

// ---------------------------------------------------------------------------
// Value extraction
// ---------------------------------------------------------------------------
//
// By the time a record applies an update the gateway has already checked
// every type, so these only fail if a field spec and its record disagree.

pub fn take_text(field: &str, value: &FieldValue) -> EngineResult<String> {
    value
        .as_text()
        .map(str::to_string)
        .ok_or_else(|| EngineError::type_mismatch(field, format!("expected text, got {}", value.type_name())))
}

pub fn take_optional_text(field: &str, value: &FieldValue) -> EngineResult<Option<String>> {
    match value {
        FieldValue::Null => Ok(None),
        other => take_text(field, other).map(Some),
    }
}

pub fn take_unsigned(field: &str, value: &FieldValue) -> EngineResult<u64> {
    value.as_unsigned().ok_or_else(|| {
        EngineError::type_mismatch(field, format!("expected unsigned integer, got {}", value.type_name()))
    })
}

pub fn optional_text_value(value: &Option<String>) -> FieldValue {
    match value {
        Some(text) => FieldValue::Text(text.clone()),
        None => FieldValue::Null,
    }
}
