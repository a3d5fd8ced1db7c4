//! Users.
//!
//! A user is identified by `hash(email + password, global_salt)`. The
//! password itself is never stored: it goes into the hash and is wiped.
//! Logging in again with the same credentials lands on the same
//! identifier, which is the whole point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{optional_text_value, take_optional_text, take_text};
use crate::crypto::ContentHash;
use crate::error::EngineResult;
use crate::storage::{Record, RecordKind};
use crate::validation::{
    validators, FieldSchema, FieldSpec, FieldType, FieldValue, ValidatedChanges,
};

/// Registration input. Wiped from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub mobile_number: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish_non_exhaustive()
    }
}

/// A stored user row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub identifier: ContentHash,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub mobile_number: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What `get_user` seals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub identifier: ContentHash,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub mobile_number: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The user's mutable allow-list. Email and password are not on it: they
/// define the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    FirstName,
    LastName,
    MobileNumber,
    Country,
    Language,
}

impl FieldSchema for UserField {
    const KIND: RecordKind = RecordKind::User;
    const ALL: &'static [Self] = &[
        UserField::FirstName,
        UserField::LastName,
        UserField::MobileNumber,
        UserField::Country,
        UserField::Language,
    ];

    fn name(self) -> &'static str {
        match self {
            UserField::FirstName => "first_name",
            UserField::LastName => "last_name",
            UserField::MobileNumber => "mobile_number",
            UserField::Country => "country",
            UserField::Language => "language",
        }
    }

    fn spec(self) -> FieldSpec {
        match self {
            UserField::FirstName | UserField::LastName => {
                FieldSpec::required(FieldType::Text).checked(validators::person_name)
            }
            UserField::MobileNumber => {
                FieldSpec::nullable(FieldType::Text).checked(validators::mobile_number)
            }
            UserField::Country => FieldSpec::nullable(FieldType::Text).checked(validators::country_code),
            UserField::Language => {
                FieldSpec::nullable(FieldType::Text).checked(validators::language_code)
            }
        }
    }
}

impl User {
    /// Apply an update that already passed the gateway.
    pub fn apply(&mut self, changes: &ValidatedChanges<UserField>) -> EngineResult<()> {
        for (field, value) in changes.iter() {
            let name = field.name();
            match field {
                UserField::FirstName => self.first_name = take_text(name, value)?,
                UserField::LastName => self.last_name = take_text(name, value)?,
                UserField::MobileNumber => self.mobile_number = take_optional_text(name, value)?,
                UserField::Country => self.country = take_optional_text(name, value)?,
                UserField::Language => self.language = take_optional_text(name, value)?,
            }
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Record for User {
    const KIND: RecordKind = RecordKind::User;
    type Public = UserView;

    fn id(&self) -> Uuid {
        self.id
    }

    fn identifier(&self) -> &ContentHash {
        &self.identifier
    }

    fn public_view(&self) -> UserView {
        UserView {
            identifier: self.identifier.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            mobile_number: self.mobile_number.clone(),
            country: self.country.clone(),
            language: self.language.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn attribute(&self, name: &str) -> Option<FieldValue> {
        match name {
            "email" => Some(FieldValue::Text(self.email.clone())),
            "first_name" => Some(FieldValue::Text(self.first_name.clone())),
            "last_name" => Some(FieldValue::Text(self.last_name.clone())),
            "mobile_number" => Some(optional_text_value(&self.mobile_number)),
            "country" => Some(optional_text_value(&self.country)),
            "language" => Some(optional_text_value(&self.language)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::salted_hash;
    use crate::error::EngineError;
    use crate::validation::{validate_changes, Changes};

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            identifier: salted_hash("ada@example.comhunter22", "g").unwrap(),
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            mobile_number: None,
            country: Some("GB".into()),
            language: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn apply_sets_normalized_values() {
        let mut u = user();
        let changes: Changes = [
            ("language".to_string(), FieldValue::from("EN")),
            ("country".to_string(), FieldValue::Null),
        ]
        .into_iter()
        .collect();
        let validated = validate_changes::<UserField>(changes).unwrap();
        u.apply(&validated).unwrap();

        assert_eq!(u.language.as_deref(), Some("en"));
        assert_eq!(u.country, None);
    }

    #[test]
    fn email_and_password_are_not_mutable() {
        for name in ["email", "password", "identifier"] {
            let changes: Changes = [(name.to_string(), FieldValue::from("x@y.io"))]
                .into_iter()
                .collect();
            assert!(matches!(
                validate_changes::<UserField>(changes),
                Err(EngineError::InvalidAttribute { .. })
            ));
        }
    }

    #[test]
    fn new_user_debug_hides_password() {
        let input = NewUser {
            email: "ada@example.com".into(),
            password: "correct horse".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            mobile_number: None,
            country: None,
            language: None,
        };
        assert!(!format!("{input:?}").contains("correct horse"));
    }
}
