//! # Contract Record
//!
//! A contract is an agreement between two payment profiles: a contractor
//! who drafts it and a contractee who accepts it. The body is the
//! agreement itself and it never changes; the identifier is a salted hash
//! of it, so editing the body would mean a different contract anyway.
//!
//! Title and description are cosmetic and can be edited in any status.
//! Status follows [`ContractStatus`]'s table and nothing else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tally_protocol::crypto::ContentHash;
use tally_protocol::lifecycle::attempt_transition;
use tally_protocol::records::{optional_text_value, take_optional_text, take_text, PartySignatures};
use tally_protocol::storage::{Record, RecordKind};
use tally_protocol::validation::{
    validators, FieldSchema, FieldSpec, FieldType, FieldValue, ValidatedChanges,
};
use tally_protocol::{EngineError, EngineResult};

use crate::status::ContractStatus;

/// Longest body we are willing to hash and store, in characters.
pub const MAX_BODY_LENGTH: usize = 20_000;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for `create_contract`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContract {
    /// Contractor's payment profile identifier.
    pub contractor: ContentHash,
    /// Contractee's payment profile identifier.
    pub contractee: ContentHash,
    pub title: String,
    pub description: Option<String>,
    /// The agreement text. Hashed into the identifier.
    pub body: String,
}

/// A stored contract row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub identifier: ContentHash,
    pub contractor: ContentHash,
    pub contractee: ContentHash,
    pub title: String,
    pub description: Option<String>,
    pub body: String,
    pub status: ContractStatus,
    pub contractor_signature: ContentHash,
    pub contractee_signature: ContentHash,
    pub salt: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What `get_contract` seals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractView {
    pub identifier: ContentHash,
    pub contractor: ContentHash,
    pub contractee: ContentHash,
    pub title: String,
    pub description: Option<String>,
    pub body: String,
    pub status: ContractStatus,
    pub contractor_signature: ContentHash,
    pub contractee_signature: ContentHash,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The contract's mutable allow-list. The body is not on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractField {
    Title,
    Description,
    Status,
}

impl FieldSchema for ContractField {
    const KIND: RecordKind = RecordKind::Contract;
    const ALL: &'static [Self] = &[
        ContractField::Title,
        ContractField::Description,
        ContractField::Status,
    ];

    fn name(self) -> &'static str {
        match self {
            ContractField::Title => "title",
            ContractField::Description => "description",
            ContractField::Status => "status",
        }
    }

    fn spec(self) -> FieldSpec {
        match self {
            ContractField::Title => FieldSpec::required(FieldType::Text).checked(validators::title),
            ContractField::Description => {
                FieldSpec::nullable(FieldType::Text).checked(validators::description)
            }
            ContractField::Status => FieldSpec::required(FieldType::Text)
                .checked(validators::status_name::<ContractStatus>),
        }
    }
}

/// Body: non-empty once trimmed, at most [`MAX_BODY_LENGTH`] characters.
pub fn contract_body(value: &FieldValue) -> Result<FieldValue, String> {
    let body = value
        .as_text()
        .ok_or_else(|| format!("expected text, got {}", value.type_name()))?
        .trim();
    if body.is_empty() || body.chars().count() > MAX_BODY_LENGTH {
        return Err(format!("body must be 1 to {MAX_BODY_LENGTH} characters"));
    }
    Ok(FieldValue::Text(body.to_string()))
}

// ---------------------------------------------------------------------------
// Update rules
// ---------------------------------------------------------------------------

impl Contract {
    pub fn signatures(&self) -> PartySignatures {
        PartySignatures {
            initiator: self.contractor_signature.clone(),
            counterparty: self.contractee_signature.clone(),
        }
    }

    /// Apply a gateway-approved update. Signatures first, then the status
    /// table; nothing is assigned until both pass.
    pub fn apply_update(
        &mut self,
        presented: &PartySignatures,
        changes: &ValidatedChanges<ContractField>,
    ) -> EngineResult<()> {
        self.signatures().authorize(presented)?;

        let status = match changes.get(ContractField::Status) {
            Some(value) => {
                let requested: ContractStatus = take_text("status", value)?.parse()?;
                attempt_transition(self.status, requested)
                    .map_err(|denied| EngineError::InvalidContract(denied.to_string()))?
                    .target()
            }
            None => self.status,
        };
        let title = match changes.get(ContractField::Title) {
            Some(value) => Some(take_text("title", value)?),
            None => None,
        };
        let description = match changes.get(ContractField::Description) {
            Some(value) => Some(take_optional_text("description", value)?),
            None => None,
        };

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = description {
            self.description = description;
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Record for Contract {
    const KIND: RecordKind = RecordKind::Contract;
    type Public = ContractView;

    fn id(&self) -> Uuid {
        self.id
    }

    fn identifier(&self) -> &ContentHash {
        &self.identifier
    }

    fn public_view(&self) -> ContractView {
        ContractView {
            identifier: self.identifier.clone(),
            contractor: self.contractor.clone(),
            contractee: self.contractee.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            body: self.body.clone(),
            status: self.status,
            contractor_signature: self.contractor_signature.clone(),
            contractee_signature: self.contractee_signature.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn attribute(&self, name: &str) -> Option<FieldValue> {
        match name {
            "contractor" => Some(FieldValue::Text(self.contractor.to_string())),
            "contractee" => Some(FieldValue::Text(self.contractee.to_string())),
            "title" => Some(FieldValue::Text(self.title.clone())),
            "description" => Some(optional_text_value(&self.description)),
            "status" => Some(FieldValue::Text(self.status.to_string())),
            _ => None,
        }
    }
}
