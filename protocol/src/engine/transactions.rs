//! Transaction operations.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::{Deletion, Engine};
use crate::crypto::{new_record_salt, transaction_identifier, ContentHash, EncryptedPayload};
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::Lifecycle;
use crate::records::{take_optional_text, take_unsigned, PartySignatures};
use crate::storage::RecordStore;
use crate::transaction::{NewTransaction, Transaction, TransactionField, TransactionStatus};
use crate::validation::{require_text, validate_value, validators, Changes, FieldSchema, FieldValue};

impl<S: RecordStore> Engine<S> {
    /// Draft a transaction between two distinct profiles with Active cards.
    pub fn create_transaction(&self, input: &NewTransaction) -> EngineResult<ContentHash> {
        let amount_spec = TransactionField::Amount.spec();
        let amount = take_unsigned(
            "amount",
            &validate_value("amount", &amount_spec, FieldValue::Unsigned(input.amount))?,
        )?;
        let currency = require_text("currency", &input.currency, validators::currency_code)?;
        let description_value = match &input.description {
            Some(text) => FieldValue::Text(text.clone()),
            None => FieldValue::Null,
        };
        let description_spec = TransactionField::Description.spec();
        let description = take_optional_text(
            "description",
            &validate_value("description", &description_spec, description_value)?,
        )?;

        let parties =
            self.resolve_parties(&input.sender, &input.receiver, EngineError::InvalidTransaction)?;

        let salt = new_record_salt();
        let created_at = Utc::now();
        let identifier = transaction_identifier(
            &parties.initiator.identifier,
            &parties.counterparty.identifier,
            amount,
            &currency,
            created_at.timestamp_millis(),
            &salt,
        )?;
        let signatures = PartySignatures::bind(
            &parties.initiator_card.identifier,
            &parties.counterparty_card.identifier,
            &salt,
        )?;

        let transaction = Transaction {
            id: Uuid::new_v4(),
            identifier,
            sender: parties.initiator.identifier,
            receiver: parties.counterparty.identifier,
            amount,
            currency,
            description,
            status: Some(TransactionStatus::INITIAL),
            sender_signature: signatures.initiator,
            receiver_signature: signatures.counterparty,
            salt,
            created_at,
            updated_at: created_at,
        };
        self.commit_new(&transaction)
    }

    pub fn get_transaction(&self, identifier: &ContentHash) -> EngineResult<EncryptedPayload> {
        self.get_sealed::<Transaction>(identifier)
    }

    /// Update amount, status and/or description. Both party signatures
    /// must be presented exactly as stored.
    pub fn update_transaction(
        &self,
        id: Uuid,
        signatures: &PartySignatures,
        changes: Changes,
    ) -> EngineResult<ContentHash> {
        let transaction = self.update_record::<Transaction, TransactionField, _>(
            id,
            changes,
            |transaction, validated| transaction.apply_update(signatures, validated),
        )?;
        debug!(
            identifier = %transaction.identifier.short(),
            status = %transaction.current_status(),
            "transaction status"
        );
        Ok(transaction.identifier)
    }

    pub fn delete_transaction(&self, id: Uuid) -> EngineResult<Deletion> {
        self.delete_record::<Transaction>(id)
    }
}
