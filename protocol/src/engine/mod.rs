//! # The Engine
//!
//! One explicitly constructed service value per process. It owns the
//! config (shared, read-only), the envelope built from the config's key,
//! the card allocator, and a [`RecordStore`]. Every create/get/update/delete
//! in the system goes through it. There is no global instance: if something
//! needs the engine, somebody hands it one.
//!
//! ## Control flow
//!
//! ```text
//! update(id, [signatures], changes)
//!   │
//!   ├─ validate_changes   → InvalidAttribute / TypeMismatch   (nothing read yet)
//!   │
//!   └─ store.modify(id, |row| ...)                             (atomic)
//!        ├─ row lookup     → NotFound
//!        ├─ signatures     → Authorization
//!        ├─ lifecycle rules→ InvalidTransaction / InvalidContract
//!        └─ apply + commit
//!
//! get(identifier) → fetch_by_identifier → public_view → seal → EncryptedPayload
//! ```
//!
//! The per-kind operations live in submodules; this file holds what they
//! share.

mod cards;
mod profiles;
mod transactions;
mod users;

use std::fmt;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::allocation::{CardAllocator, CardCandidate, CardRegistry};
use crate::config::EngineConfig;
use crate::crypto::{ContentHash, EncryptedPayload, Envelope};
use crate::error::{EngineError, EngineResult};
use crate::records::{Card, CardStatus, PaymentProfile};
use crate::storage::{Predicate, Record, RecordKind, RecordStore};
use crate::validation::{validate_changes, Changes, FieldSchema, ValidatedChanges};

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The record integrity and transition engine.
pub struct Engine<S> {
    config: Arc<EngineConfig>,
    envelope: Envelope,
    allocator: CardAllocator,
    store: S,
}

impl<S: RecordStore> Engine<S> {
    pub fn new(config: Arc<EngineConfig>, store: S) -> Self {
        let envelope = Envelope::new(config.symmetric_key());
        let allocator = CardAllocator::new(&config);
        Self {
            config,
            envelope,
            allocator,
            store,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    // -- Shared operations --------------------------------------------------

    /// Seal a record's public view.
    pub fn seal<R: Record>(&self, record: &R) -> EngineResult<EncryptedPayload> {
        self.envelope.seal_json(&record.public_view())
    }

    /// Look a record up by public identifier and seal it.
    pub fn get_sealed<R: Record>(&self, identifier: &ContentHash) -> EngineResult<EncryptedPayload> {
        let record: R = self
            .store
            .fetch_by_identifier(identifier)?
            .ok_or_else(|| EngineError::not_found(R::KIND, identifier))?;
        self.seal(&record)
    }

    /// Operator lookup: public identifier to private id.
    pub fn locate<R: Record>(&self, identifier: &ContentHash) -> EngineResult<Uuid> {
        self.store
            .fetch_by_identifier::<R>(identifier)?
            .map(|record| record.id())
            .ok_or_else(|| EngineError::not_found(R::KIND, identifier))
    }

    /// Decrypt a payload produced by this engine's `get_*` operations.
    pub fn open_payload<T: DeserializeOwned>(&self, payload: &EncryptedPayload) -> EngineResult<T> {
        self.envelope.open_json(payload)
    }

    /// Validate `changes` against `F`, then run `apply` on the stored row
    /// inside the store's read-modify-write.
    ///
    /// `apply` must be free of side effects; the store may run it again.
    pub fn update_record<R, F, A>(&self, id: Uuid, changes: Changes, apply: A) -> EngineResult<R>
    where
        R: Record,
        F: FieldSchema,
        A: Fn(&mut R, &ValidatedChanges<F>) -> EngineResult<()>,
    {
        let validated = validate_changes::<F>(changes)?;
        let fields = validated.field_names();

        match self.store.modify(id, |record: &mut R| apply(record, &validated)) {
            Ok(record) => {
                info!(
                    kind = %R::KIND,
                    identifier = %record.identifier(),
                    fields = ?fields,
                    "record updated"
                );
                Ok(record)
            }
            Err(EngineError::Authorization) => {
                warn!(kind = %R::KIND, id = %id, "update rejected: signature mismatch");
                Err(EngineError::Authorization)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete a row by private id.
    pub fn delete_record<R: Record>(&self, id: Uuid) -> EngineResult<Deletion> {
        let removed: R = self.store.remove(id)?;
        info!(kind = %R::KIND, identifier = %removed.identifier(), "record deleted");
        Ok(Deletion {
            kind: R::KIND,
            id,
            identifier: removed.identifier().clone(),
        })
    }

    /// Insert a freshly built row and log the commit.
    pub fn commit_new<R: Record>(&self, record: &R) -> EngineResult<ContentHash> {
        self.store.insert(record)?;
        info!(kind = %R::KIND, identifier = %record.identifier(), "record created");
        Ok(record.identifier().clone())
    }

    /// Resolve the two profiles of a two-party record.
    ///
    /// Both must exist, they must differ, and both cards must be Active.
    /// Any violation goes through `reject`, so transactions report
    /// `InvalidTransaction` and contracts `InvalidContract`.
    pub fn resolve_parties(
        &self,
        initiator: &ContentHash,
        counterparty: &ContentHash,
        reject: fn(String) -> EngineError,
    ) -> EngineResult<Parties> {
        if initiator == counterparty {
            return Err(reject("the two parties must be different profiles".into()));
        }
        let (initiator, initiator_card) = self.party(initiator, reject)?;
        let (counterparty, counterparty_card) = self.party(counterparty, reject)?;
        Ok(Parties {
            initiator,
            initiator_card,
            counterparty,
            counterparty_card,
        })
    }

    fn party(
        &self,
        identifier: &ContentHash,
        reject: fn(String) -> EngineError,
    ) -> EngineResult<(PaymentProfile, Card)> {
        let profile: PaymentProfile = self
            .store
            .fetch_by_identifier(identifier)?
            .ok_or_else(|| reject(format!("profile {} does not exist", identifier.short())))?;
        let card: Card = self
            .store
            .fetch(profile.card_id)?
            .ok_or_else(|| reject(format!("profile {} has no card", identifier.short())))?;
        if !card.is_active() {
            return Err(reject(format!(
                "card of profile {} is {}",
                identifier.short(),
                card.status
            )));
        }
        Ok((profile, card))
    }
}

impl<S> fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("allocator", &self.allocator)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Confirmation returned by every delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deletion {
    pub kind: RecordKind,
    pub id: Uuid,
    pub identifier: ContentHash,
}

impl fmt::Display for Deletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deleted {} {} ({})", self.kind, self.id, self.identifier.short())
    }
}

/// Both sides of a transaction or contract, resolved and checked.
#[derive(Debug, Clone)]
pub struct Parties {
    pub initiator: PaymentProfile,
    pub initiator_card: Card,
    pub counterparty: PaymentProfile,
    pub counterparty_card: Card,
}

/// The allocator's view of the store: the existence-count query.
struct StoreRegistry<'a, S>(&'a S);

impl<S: RecordStore> CardRegistry for StoreRegistry<'_, S> {
    fn live_card_exists(&self, candidate: &CardCandidate) -> EngineResult<bool> {
        let predicates = [
            Predicate::Eq("number", candidate.number.clone().into()),
            Predicate::Eq("card_type", candidate.card_type.to_string().into()),
            Predicate::Eq("cvv", candidate.cvv.clone().into()),
            Predicate::Eq("expiry", candidate.expiry.short_date().into()),
            Predicate::Ne("status", CardStatus::Inactive.to_string().into()),
        ];
        Ok(self.0.count_where::<Card>(&predicates)? > 0)
    }
}
