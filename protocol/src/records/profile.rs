//! Payment profiles: a user plus exactly one card, under a currency.
//!
//! Profiles are the parties of transactions and contracts. The identifier
//! is `hash(user_identifier + card_identifier, record_salt)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{optional_text_value, take_optional_text, take_text};
use crate::allocation::CardType;
use crate::crypto::ContentHash;
use crate::error::EngineResult;
use crate::storage::{Record, RecordKind};
use crate::validation::{validators, FieldSchema, FieldSpec, FieldType, FieldValue, ValidatedChanges};

/// Input for `create_profile`. The card is issued as part of creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProfile {
    /// Public identifier of an existing user.
    pub user: ContentHash,
    pub card_type: CardType,
    pub currency: String,
    pub alias: Option<String>,
}

/// A stored profile row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentProfile {
    pub id: Uuid,
    pub identifier: ContentHash,
    /// Owning user's public identifier.
    pub user: ContentHash,
    /// The profile's card, by public identifier and private id.
    pub card: ContentHash,
    pub card_id: Uuid,
    pub alias: Option<String>,
    pub currency: String,
    pub salt: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What `get_profile` seals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileView {
    pub identifier: ContentHash,
    pub user: ContentHash,
    pub card: ContentHash,
    pub alias: Option<String>,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The profile's mutable allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Alias,
    Currency,
}

impl FieldSchema for ProfileField {
    const KIND: RecordKind = RecordKind::PaymentProfile;
    const ALL: &'static [Self] = &[ProfileField::Alias, ProfileField::Currency];

    fn name(self) -> &'static str {
        match self {
            ProfileField::Alias => "alias",
            ProfileField::Currency => "currency",
        }
    }

    fn spec(self) -> FieldSpec {
        match self {
            ProfileField::Alias => FieldSpec::nullable(FieldType::Text).checked(validators::title),
            ProfileField::Currency => {
                FieldSpec::required(FieldType::Text).checked(validators::currency_code)
            }
        }
    }
}

impl PaymentProfile {
    pub fn apply(&mut self, changes: &ValidatedChanges<ProfileField>) -> EngineResult<()> {
        for (field, value) in changes.iter() {
            let name = field.name();
            match field {
                ProfileField::Alias => self.alias = take_optional_text(name, value)?,
                ProfileField::Currency => self.currency = take_text(name, value)?,
            }
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Record for PaymentProfile {
    const KIND: RecordKind = RecordKind::PaymentProfile;
    type Public = ProfileView;

    fn id(&self) -> Uuid {
        self.id
    }

    fn identifier(&self) -> &ContentHash {
        &self.identifier
    }

    fn public_view(&self) -> ProfileView {
        ProfileView {
            identifier: self.identifier.clone(),
            user: self.user.clone(),
            card: self.card.clone(),
            alias: self.alias.clone(),
            currency: self.currency.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn attribute(&self, name: &str) -> Option<FieldValue> {
        match name {
            "user" => Some(FieldValue::Text(self.user.to_string())),
            "card" => Some(FieldValue::Text(self.card.to_string())),
            "alias" => Some(optional_text_value(&self.alias)),
            "currency" => Some(FieldValue::Text(self.currency.clone())),
            _ => None,
        }
    }
}
