//! The transaction row and its update rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::TransactionStatus;
use crate::crypto::ContentHash;
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::{attempt_transition, Lifecycle};
use crate::records::{
    optional_text_value, take_optional_text, take_text, take_unsigned, PartySignatures,
};
use crate::storage::{Record, RecordKind};
use crate::validation::{validators, FieldSchema, FieldSpec, FieldType, FieldValue, ValidatedChanges};

/// Input for `create_transaction`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// Sender's payment profile identifier.
    pub sender: ContentHash,
    /// Receiver's payment profile identifier.
    pub receiver: ContentHash,
    /// Minor units. Must be greater than zero.
    pub amount: u64,
    pub currency: String,
    pub description: Option<String>,
}

/// A stored transaction row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub identifier: ContentHash,
    pub sender: ContentHash,
    pub receiver: ContentHash,
    pub amount: u64,
    pub currency: String,
    pub description: Option<String>,
    /// `None` means "not yet drafted" and reads as Draft.
    pub status: Option<TransactionStatus>,
    pub sender_signature: ContentHash,
    pub receiver_signature: ContentHash,
    pub salt: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What `get_transaction` seals. Signatures included: the parties need
/// them to authorize later updates, and the payload is encrypted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionView {
    pub identifier: ContentHash,
    pub sender: ContentHash,
    pub receiver: ContentHash,
    pub amount: u64,
    pub currency: String,
    pub description: Option<String>,
    pub status: TransactionStatus,
    pub sender_signature: ContentHash,
    pub receiver_signature: ContentHash,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The transaction's mutable allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionField {
    Amount,
    Status,
    Description,
}

impl FieldSchema for TransactionField {
    const KIND: RecordKind = RecordKind::Transaction;
    const ALL: &'static [Self] = &[
        TransactionField::Amount,
        TransactionField::Status,
        TransactionField::Description,
    ];

    fn name(self) -> &'static str {
        match self {
            TransactionField::Amount => "amount",
            TransactionField::Status => "status",
            TransactionField::Description => "description",
        }
    }

    fn spec(self) -> FieldSpec {
        match self {
            TransactionField::Amount => {
                FieldSpec::required(FieldType::Unsigned).checked(validators::amount)
            }
            TransactionField::Status => FieldSpec::required(FieldType::Text)
                .checked(validators::status_name::<TransactionStatus>),
            TransactionField::Description => {
                FieldSpec::nullable(FieldType::Text).checked(validators::description)
            }
        }
    }
}

impl Transaction {
    /// Current status, with `None` read as Draft.
    pub fn current_status(&self) -> TransactionStatus {
        self.status.unwrap_or(TransactionStatus::INITIAL)
    }

    pub fn signatures(&self) -> PartySignatures {
        PartySignatures {
            initiator: self.sender_signature.clone(),
            counterparty: self.receiver_signature.clone(),
        }
    }

    /// Apply a gateway-approved update to this row.
    ///
    /// Checks run against the row as stored, in this order: signatures,
    /// the amount rule, the status table. Nothing is assigned until all of
    /// them pass, so an `Err` leaves the row untouched.
    pub fn apply_update(
        &mut self,
        presented: &PartySignatures,
        changes: &ValidatedChanges<TransactionField>,
    ) -> EngineResult<()> {
        self.signatures().authorize(presented)?;

        let current = self.current_status();

        let amount = match changes.get(TransactionField::Amount) {
            Some(value) => Some(take_unsigned("amount", value)?),
            None => None,
        };
        if let Some(amount) = amount {
            if amount != self.amount && current != TransactionStatus::Draft {
                return Err(EngineError::InvalidTransaction(format!(
                    "amount can only change while Draft, transaction is {current}"
                )));
            }
        }

        let status = match changes.get(TransactionField::Status) {
            Some(value) => {
                let requested: TransactionStatus = take_text("status", value)?.parse()?;
                let transition = attempt_transition(current, requested)
                    .map_err(|denied| EngineError::InvalidTransaction(denied.to_string()))?;
                transition.target()
            }
            None => current,
        };

        let description = match changes.get(TransactionField::Description) {
            Some(value) => Some(take_optional_text("description", value)?),
            None => None,
        };

        if let Some(amount) = amount {
            self.amount = amount;
        }
        if let Some(description) = description {
            self.description = description;
        }
        self.status = Some(status);
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Record for Transaction {
    const KIND: RecordKind = RecordKind::Transaction;
    type Public = TransactionView;

    fn id(&self) -> Uuid {
        self.id
    }

    fn identifier(&self) -> &ContentHash {
        &self.identifier
    }

    fn public_view(&self) -> TransactionView {
        TransactionView {
            identifier: self.identifier.clone(),
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            description: self.description.clone(),
            status: self.current_status(),
            sender_signature: self.sender_signature.clone(),
            receiver_signature: self.receiver_signature.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn attribute(&self, name: &str) -> Option<FieldValue> {
        match name {
            "sender" => Some(FieldValue::Text(self.sender.to_string())),
            "receiver" => Some(FieldValue::Text(self.receiver.to_string())),
            "amount" => Some(FieldValue::Unsigned(self.amount)),
            "currency" => Some(FieldValue::Text(self.currency.clone())),
            "description" => Some(optional_text_value(&self.description)),
            "status" => Some(FieldValue::Text(self.current_status().to_string())),
            _ => None,
        }
    }
}
