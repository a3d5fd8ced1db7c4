//! Cards.
//!
//! Number, CVV and expiry are fixed at issue and feed the card identifier
//! (`hash(number + cvv + MM/YY, record_salt)`). After that only two things
//! can change: the status and the PIN. The PIN arrives in clear through
//! the update path and is hashed with the card's own salt before the row
//! is written.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::take_text;
use crate::allocation::{CardExpiry, CardType};
use crate::crypto::{pin_hash, ContentHash};
use crate::error::{EngineError, EngineResult};
use crate::storage::{Record, RecordKind};
use crate::validation::{validators, FieldSchema, FieldSpec, FieldType, FieldValue, ValidatedChanges};

// ---------------------------------------------------------------------------
// CardStatus
// ---------------------------------------------------------------------------

/// Whether a card can be used. A plain field, no lifecycle table: an
/// operator may move a card between any two of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardStatus {
    Active,
    Blocked,
    Inactive,
}

impl CardStatus {
    pub const ALL: [CardStatus; 3] = [CardStatus::Active, CardStatus::Blocked, CardStatus::Inactive];

    pub fn as_str(self) -> &'static str {
        match self {
            CardStatus::Active => "Active",
            CardStatus::Blocked => "Blocked",
            CardStatus::Inactive => "Inactive",
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CardStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::type_mismatch("status", format!("unknown card status '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Card
// ---------------------------------------------------------------------------

/// A stored card row. Holds secrets; never leaves the engine unsealed, and
/// even sealed only as a [`CardView`].
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub identifier: ContentHash,
    pub number: String,
    pub cvv: String,
    pub card_type: CardType,
    pub expiry: CardExpiry,
    pub status: CardStatus,
    pub pin_hash: ContentHash,
    pub salt: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Last four digits, for display.
    pub fn last_four(&self) -> &str {
        self.number
            .get(self.number.len().saturating_sub(4)..)
            .unwrap_or("")
    }

    pub fn is_active(&self) -> bool {
        self.status == CardStatus::Active
    }

    /// Apply an update that already passed the gateway. PINs are hashed
    /// here, with this card's salt.
    pub fn apply(&mut self, changes: &ValidatedChanges<CardField>) -> EngineResult<()> {
        for (field, value) in changes.iter() {
            let name = field.name();
            match field {
                CardField::Status => self.status = take_text(name, value)?.parse()?,
                CardField::Pin => {
                    let pin = zeroize::Zeroizing::new(take_text(name, value)?);
                    self.pin_hash = pin_hash(&pin, &self.salt)?;
                }
            }
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Card")
            .field("id", &self.id)
            .field("identifier", &self.identifier)
            .field("number", &format_args!("****{}", self.last_four()))
            .field("card_type", &self.card_type)
            .field("expiry", &self.expiry)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// What `get_card` seals: no number, no CVV, no PIN hash, no salt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardView {
    pub identifier: ContentHash,
    pub card_type: CardType,
    pub last_four: String,
    pub expiry: String,
    pub status: CardStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The card's mutable allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardField {
    Status,
    Pin,
}

impl FieldSchema for CardField {
    const KIND: RecordKind = RecordKind::Card;
    const ALL: &'static [Self] = &[CardField::Status, CardField::Pin];

    fn name(self) -> &'static str {
        match self {
            CardField::Status => "status",
            CardField::Pin => "pin",
        }
    }

    fn spec(self) -> FieldSpec {
        match self {
            CardField::Status => {
                FieldSpec::required(FieldType::Text).checked(validators::status_name::<CardStatus>)
            }
            CardField::Pin => FieldSpec::required(FieldType::Text).checked(validators::pin),
        }
    }
}

impl Record for Card {
    const KIND: RecordKind = RecordKind::Card;
    type Public = CardView;

    fn id(&self) -> Uuid {
        self.id
    }

    fn identifier(&self) -> &ContentHash {
        &self.identifier
    }

    fn public_view(&self) -> CardView {
        CardView {
            identifier: self.identifier.clone(),
            card_type: self.card_type,
            last_four: self.last_four().to_string(),
            expiry: self.expiry.short_date(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn attribute(&self, name: &str) -> Option<FieldValue> {
        match name {
            "number" => Some(FieldValue::Text(self.number.clone())),
            "cvv" => Some(FieldValue::Text(self.cvv.clone())),
            "card_type" => Some(FieldValue::Text(self.card_type.to_string())),
            "expiry" => Some(FieldValue::Text(self.expiry.short_date())),
            "status" => Some(FieldValue::Text(self.status.to_string())),
            _ => None,
        }
    }
}
