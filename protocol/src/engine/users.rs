//! User operations.

use chrono::Utc;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::{Deletion, Engine};
use crate::crypto::{user_identifier, ContentHash, EncryptedPayload};
use crate::error::EngineResult;
use crate::records::{take_optional_text, NewUser, User, UserField};
use crate::storage::RecordStore;
use crate::validation::{require_text, validate_value, validators, Changes, FieldSchema, FieldValue};

impl<S: RecordStore> Engine<S> {
    /// Register a user. Returns `hash(email + password, global_salt)`, with
    /// the email already trimmed and lowercased.
    ///
    /// Registering the same credentials twice is `AlreadyExists`.
    pub fn create_user(&self, input: &NewUser) -> EngineResult<ContentHash> {
        let email = require_text("email", &input.email, validators::email)?;
        let password = Zeroizing::new(require_text("password", &input.password, validators::password)?);
        let first_name = require_text("first_name", &input.first_name, validators::person_name)?;
        let last_name = require_text("last_name", &input.last_name, validators::person_name)?;
        let mobile_number = optional_user_field(UserField::MobileNumber, &input.mobile_number)?;
        let country = optional_user_field(UserField::Country, &input.country)?;
        let language = optional_user_field(UserField::Language, &input.language)?;

        let identifier = user_identifier(&email, &password, self.config.global_salt())?;
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            identifier,
            email,
            first_name,
            last_name,
            mobile_number,
            country,
            language,
            created_at: now,
            updated_at: now,
        };
        self.commit_new(&user)
    }

    pub fn get_user(&self, identifier: &ContentHash) -> EngineResult<EncryptedPayload> {
        self.get_sealed::<User>(identifier)
    }

    pub fn update_user(&self, id: Uuid, changes: Changes) -> EngineResult<ContentHash> {
        let user = self.update_record::<User, UserField, _>(id, changes, |user, validated| {
            user.apply(validated)
        })?;
        Ok(user.identifier)
    }

    pub fn delete_user(&self, id: Uuid) -> EngineResult<Deletion> {
        self.delete_record::<User>(id)
    }
}

/// Optional create-time inputs use the same spec as their update path.
fn optional_user_field(field: UserField, value: &Option<String>) -> EngineResult<Option<String>> {
    let candidate = match value {
        Some(text) => FieldValue::Text(text.clone()),
        None => FieldValue::Null,
    };
    let normalized = validate_value(field.name(), &field.spec(), candidate)?;
    take_optional_text(field.name(), &normalized)
}
