//! What the store needs to know about a record, and nothing more.

use std::fmt;
use std::str::FromStr;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::ContentHash;
use crate::error::EngineError;
use crate::validation::FieldValue;

/// The five record kinds the engine manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    User,
    Card,
    PaymentProfile,
    Transaction,
    Contract,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::User,
        RecordKind::Card,
        RecordKind::PaymentProfile,
        RecordKind::Transaction,
        RecordKind::Contract,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::User => "user",
            RecordKind::Card => "card",
            RecordKind::PaymentProfile => "profile",
            RecordKind::Transaction => "transaction",
            RecordKind::Contract => "contract",
        }
    }

    /// Name of the sled tree holding rows of this kind.
    pub fn tree_name(self) -> &'static str {
        match self {
            RecordKind::User => "users",
            RecordKind::Card => "cards",
            RecordKind::PaymentProfile => "profiles",
            RecordKind::Transaction => "transactions",
            RecordKind::Contract => "contracts",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        RecordKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted || kind.tree_name() == wanted)
            .ok_or_else(|| EngineError::type_mismatch("kind", format!("unknown record kind '{s}'")))
    }
}

/// A persistable row.
///
/// `id` is the private primary key. `identifier` is the public,
/// content-derived secondary key and must be unique per kind.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: RecordKind;

    /// The sealed, outward-facing snapshot. Never carries secrets.
    type Public: Serialize + DeserializeOwned;

    fn id(&self) -> Uuid;

    fn identifier(&self) -> &ContentHash;

    fn public_view(&self) -> Self::Public;

    /// Attribute lookup for [`Predicate`] evaluation. `None` for names the
    /// record doesn't expose to queries.
    fn attribute(&self, name: &str) -> Option<FieldValue>;
}

/// One equality condition in an existence-count query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Eq(&'static str, FieldValue),
    Ne(&'static str, FieldValue),
}

impl Predicate {
    /// An attribute the record doesn't expose never satisfies either form.
    pub fn matches<R: Record>(&self, record: &R) -> bool {
        match self {
            Predicate::Eq(name, value) => record.attribute(name).as_ref() == Some(value),
            Predicate::Ne(name, value) => record
                .attribute(name)
                .map(|actual| &actual != value)
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_from_either_name() {
        assert_eq!("profile".parse::<RecordKind>().unwrap(), RecordKind::PaymentProfile);
        assert_eq!("Cards".parse::<RecordKind>().unwrap(), RecordKind::Card);
        assert!("ledger".parse::<RecordKind>().is_err());
    }

    #[test]
    fn tree_names_are_distinct() {
        let mut names: Vec<_> = RecordKind::ALL.iter().map(|k| k.tree_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), RecordKind::ALL.len());
    }
}
