//! Card operations.

use chrono::Utc;
use rand::Rng;
use tracing::debug;
use uuid::Uuid;

use super::{Deletion, Engine, StoreRegistry};
use crate::allocation::{issue_pin, CardExpiry, CardType};
use crate::crypto::{card_identifier, new_record_salt, ContentHash, EncryptedPayload};
use crate::error::EngineResult;
use crate::records::{Card, CardField, CardStatus};
use crate::storage::RecordStore;
use crate::validation::Changes;

impl<S: RecordStore> Engine<S> {
    /// Issue a standalone card with fresh OS-seeded randomness.
    pub fn issue_card(&self, card_type: CardType) -> EngineResult<ContentHash> {
        self.issue_card_with(card_type, &mut rand::thread_rng())
    }

    /// Issue a card drawing from `rng`.
    pub fn issue_card_with<R: Rng + ?Sized>(
        &self,
        card_type: CardType,
        rng: &mut R,
    ) -> EngineResult<ContentHash> {
        let card = self.mint_card(card_type, rng)?;
        self.commit_new(&card)
    }

    pub fn get_card(&self, identifier: &ContentHash) -> EngineResult<EncryptedPayload> {
        self.get_sealed::<Card>(identifier)
    }

    /// Change status and/or PIN. A PIN arrives in clear and is stored only
    /// as `hash(pin, card_salt)`.
    pub fn update_card(&self, id: Uuid, changes: Changes) -> EngineResult<ContentHash> {
        let card = self.update_record::<Card, CardField, _>(id, changes, |card, validated| {
            card.apply(validated)
        })?;
        Ok(card.identifier)
    }

    pub fn delete_card(&self, id: Uuid) -> EngineResult<Deletion> {
        self.delete_record::<Card>(id)
    }

    /// Allocate number, CVV, expiry and PIN for a new Active card. Not yet
    /// persisted.
    pub(crate) fn mint_card<R: Rng + ?Sized>(
        &self,
        card_type: CardType,
        rng: &mut R,
    ) -> EngineResult<Card> {
        let expiry = CardExpiry::for_card_issued_today()?;
        let candidate =
            self.allocator
                .allocate(&StoreRegistry(&self.store), card_type, expiry, rng)?;

        let salt = new_record_salt();
        let identifier =
            card_identifier(&candidate.number, &candidate.cvv, &expiry.short_date(), &salt)?;
        let pin_hash = issue_pin(rng, &salt)?;
        debug!(card_type = %card_type, identifier = %identifier.short(), "card minted");

        let now = Utc::now();
        Ok(Card {
            id: Uuid::new_v4(),
            identifier,
            number: candidate.number,
            cvv: candidate.cvv,
            card_type,
            expiry,
            status: CardStatus::Active,
            pin_hash,
            salt,
            created_at: now,
            updated_at: now,
        })
    }
}
