//! Error taxonomy for the engine.
//!
//! Every public operation either returns a value or fails with exactly one
//! [`EngineError`]. The variants map one-to-one onto the failure kinds a
//! caller is expected to handle; storage and configuration problems get
//! their own variants so they never masquerade as validation failures.

use thiserror::Error;

use crate::storage::RecordKind;

/// Errors produced by the integrity and transition engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A value had the wrong runtime shape for its field: wrong type,
    /// missing where required, or rejected by the field's validator.
    #[error("type mismatch on `{field}`: {reason}")]
    TypeMismatch {
        /// The field that was being checked.
        field: String,
        /// What was wrong with the value.
        reason: String,
    },

    /// The field is not in the record kind's mutable allow-list.
    #[error("`{field}` is not a mutable attribute of {kind}")]
    InvalidAttribute {
        /// Record kind the update targeted.
        kind: RecordKind,
        /// The offending field name.
        field: String,
    },

    /// Illegal transaction status transition, or an amount change after
    /// the transaction left Draft.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Illegal contract status transition or contract setup.
    #[error("invalid contract: {0}")]
    InvalidContract(String),

    /// The presented party signatures do not match the stored ones.
    #[error("authorization failed: party signatures do not match")]
    Authorization,

    /// The allocator could not find a free card number within its budget.
    #[error("card allocation failed after {attempts} attempts")]
    Allocation {
        /// How many candidates were tried.
        attempts: usize,
    },

    /// Envelope failure. Deliberately says nothing about *why*.
    #[error("cryptographic envelope failure")]
    Crypto,

    /// Lookup miss on a primary or secondary key.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// Record kind that was looked up.
        kind: RecordKind,
        /// The key that missed.
        key: String,
    },

    /// A record with the same public identifier already exists.
    #[error("{kind} already exists: {identifier}")]
    AlreadyExists {
        /// Record kind being inserted.
        kind: RecordKind,
        /// The colliding identifier.
        identifier: String,
    },

    /// The persistence collaborator failed (I/O, corrupt row, ...).
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Shorthand for a [`EngineError::TypeMismatch`].
    pub fn type_mismatch(field: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::TypeMismatch {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`EngineError::NotFound`].
    pub fn not_found(kind: RecordKind, key: impl ToString) -> Self {
        EngineError::NotFound {
            kind,
            key: key.to_string(),
        }
    }
}

impl From<sled::Error> for EngineError {
    fn from(e: sled::Error) -> Self {
        EngineError::Storage(e.to_string())
    }
}

impl From<bincode::Error> for EngineError {
    fn from(e: bincode::Error) -> Self {
        EngineError::Storage(format!("row encoding: {e}"))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
