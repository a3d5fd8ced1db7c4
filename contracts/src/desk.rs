//! # Contract Desk
//!
//! The contract counterpart of the engine's per-kind operations. It borrows
//! an [`Engine`] and goes through exactly the same doors the engine's own
//! transaction code does: the same party resolution, the same gateway, the
//! same sealed reads. Contracts just happen to live in their own crate.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use tally_protocol::crypto::{contract_identifier, new_record_salt, ContentHash, EncryptedPayload};
use tally_protocol::engine::Deletion;
use tally_protocol::lifecycle::Lifecycle;
use tally_protocol::records::{take_optional_text, PartySignatures};
use tally_protocol::storage::RecordStore;
use tally_protocol::validation::{
    require_text, validate_value, validators, Changes, FieldSchema, FieldValue,
};
use tally_protocol::{Engine, EngineError, EngineResult};

use crate::contract::{contract_body, Contract, ContractField, NewContract};
use crate::status::ContractStatus;

/// Create, read, update and delete contracts through a borrowed engine.
#[derive(Debug)]
pub struct ContractDesk<'a, S> {
    engine: &'a Engine<S>,
}

impl<'a, S: RecordStore> ContractDesk<'a, S> {
    pub fn new(engine: &'a Engine<S>) -> Self {
        Self { engine }
    }

    /// Draft a contract between two distinct profiles with Active cards.
    pub fn create_contract(&self, input: &NewContract) -> EngineResult<ContentHash> {
        let title = require_text("title", &input.title, validators::title)?;
        let description_value = match &input.description {
            Some(text) => FieldValue::Text(text.clone()),
            None => FieldValue::Null,
        };
        let description = take_optional_text(
            "description",
            &validate_value(
                "description",
                &ContractField::Description.spec(),
                description_value,
            )?,
        )?;
        let body = require_text("body", &input.body, contract_body)?;

        let parties = self.engine.resolve_parties(
            &input.contractor,
            &input.contractee,
            EngineError::InvalidContract,
        )?;

        let salt = new_record_salt();
        let identifier = contract_identifier(&body, &salt)?;
        let signatures = PartySignatures::bind(
            &parties.initiator_card.identifier,
            &parties.counterparty_card.identifier,
            &salt,
        )?;

        let now = Utc::now();
        let contract = Contract {
            id: Uuid::new_v4(),
            identifier,
            contractor: parties.initiator.identifier,
            contractee: parties.counterparty.identifier,
            title,
            description,
            body,
            status: ContractStatus::INITIAL,
            contractor_signature: signatures.initiator,
            contractee_signature: signatures.counterparty,
            salt,
            created_at: now,
            updated_at: now,
        };
        self.engine.commit_new(&contract)
    }

    pub fn get_contract(&self, identifier: &ContentHash) -> EngineResult<EncryptedPayload> {
        self.engine.get_sealed::<Contract>(identifier)
    }

    /// Update title, description and/or status. Both party signatures
    /// must be presented exactly as stored.
    pub fn update_contract(
        &self,
        id: Uuid,
        signatures: &PartySignatures,
        changes: Changes,
    ) -> EngineResult<ContentHash> {
        let contract = self.engine.update_record::<Contract, ContractField, _>(
            id,
            changes,
            |contract, validated| contract.apply_update(signatures, validated),
        )?;
        debug!(
            identifier = %contract.identifier.short(),
            status = %contract.status,
            "contract status"
        );
        Ok(contract.identifier)
    }

    pub fn delete_contract(&self, id: Uuid) -> EngineResult<Deletion> {
        self.engine.delete_record::<Contract>(id)
    }
}
