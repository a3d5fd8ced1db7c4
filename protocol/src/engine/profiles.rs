//! Payment profile operations.
//!
//! A profile owns exactly one card, issued when the profile is created.
//! Deleting the profile deactivates that card, so its number stops
//! counting as live for the allocator.

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Deletion, Engine};
use crate::crypto::{new_record_salt, profile_identifier, ContentHash, EncryptedPayload};
use crate::error::{EngineError, EngineResult};
use crate::records::{take_optional_text, Card, CardStatus, NewProfile, PaymentProfile, ProfileField, User};
use crate::storage::{Record, RecordStore};
use crate::validation::{require_text, validate_value, validators, Changes, FieldSchema, FieldValue};

impl<S: RecordStore> Engine<S> {
    /// Create a profile for an existing user and issue its card.
    pub fn create_profile(&self, input: &NewProfile) -> EngineResult<ContentHash> {
        let currency = require_text("currency", &input.currency, validators::currency_code)?;
        let alias_value = match &input.alias {
            Some(alias) => FieldValue::Text(alias.clone()),
            None => FieldValue::Null,
        };
        let alias_spec = ProfileField::Alias.spec();
        let alias = take_optional_text("alias", &validate_value("alias", &alias_spec, alias_value)?)?;

        let user: User = self
            .store
            .fetch_by_identifier(&input.user)?
            .ok_or_else(|| EngineError::not_found(User::KIND, &input.user))?;

        let card = self.mint_card(input.card_type, &mut rand::thread_rng())?;
        self.commit_new(&card)?;

        let salt = new_record_salt();
        let now = Utc::now();
        let profile = PaymentProfile {
            id: Uuid::new_v4(),
            identifier: profile_identifier(&user.identifier, &card.identifier, &salt)?,
            user: user.identifier,
            card: card.identifier.clone(),
            card_id: card.id,
            alias,
            currency,
            salt,
            created_at: now,
            updated_at: now,
        };

        match self.commit_new(&profile) {
            Ok(identifier) => Ok(identifier),
            Err(e) => {
                // Don't leave an orphaned live card behind.
                if let Err(cleanup) = self.store.remove::<Card>(card.id) {
                    warn!(error = %cleanup, "could not roll back card of failed profile");
                }
                Err(e)
            }
        }
    }

    pub fn get_profile(&self, identifier: &ContentHash) -> EngineResult<EncryptedPayload> {
        self.get_sealed::<PaymentProfile>(identifier)
    }

    pub fn update_profile(&self, id: Uuid, changes: Changes) -> EngineResult<ContentHash> {
        let profile = self.update_record::<PaymentProfile, ProfileField, _>(
            id,
            changes,
            |profile, validated| profile.apply(validated),
        )?;
        Ok(profile.identifier)
    }

    /// Deactivate the profile's card, then delete the profile. A failure in
    /// between leaves the profile in place with an already-dead card.
    pub fn delete_profile(&self, id: Uuid) -> EngineResult<Deletion> {
        let profile: PaymentProfile = self
            .store
            .fetch(id)?
            .ok_or_else(|| EngineError::not_found(PaymentProfile::KIND, id))?;

        let deactivated = self.store.modify(profile.card_id, |card: &mut Card| {
            card.status = CardStatus::Inactive;
            card.updated_at = Utc::now();
            Ok(())
        });
        match deactivated {
            Ok(card) => debug!(identifier = %card.identifier.short(), "card deactivated"),
            // Already deleted by an operator: nothing left to deactivate.
            Err(EngineError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        self.delete_record::<PaymentProfile>(id)
    }
}
