//! # LedgerDb: Persistent Record Store
//!
//! The sled-backed [`RecordStore`]. All on-disk rows flow through here.
//!
//! ## Tree Layout
//!
//! Each record kind gets two trees:
//!
//! | Tree                   | Key                      | Value              |
//! |------------------------|--------------------------|--------------------|
//! | `<kind>`               | `id` (16 uuid bytes)     | `bincode(Record)`  |
//! | `<kind>_identifiers`   | `identifier` (hex UTF-8) | `id` (16 bytes)    |
//!
//! So `users` + `users_identifiers`, `cards` + `cards_identifiers`, and so on.
//!
//! ## Atomicity
//!
//! Insert and remove touch both trees inside one multi-tree sled
//! transaction: either the row and its identifier mapping both land, or
//! neither does. Updates go through [`RecordStore::modify`], a single-tree
//! transaction that sled retries on conflict, which is why the closure has
//! to be `Fn` and free of side effects.

use std::path::Path;

use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionResult, TransactionalTree,
};
use sled::{Db, Transactional, Tree};
use tracing::debug;
use uuid::Uuid;

use super::{Predicate, Record, RecordKind, RecordStore};
use crate::crypto::ContentHash;
use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// Tree pairs
// ---------------------------------------------------------------------------

/// Row tree plus its identifier index.
#[derive(Debug, Clone)]
struct KindTrees {
    rows: Tree,
    identifiers: Tree,
}

impl KindTrees {
    fn open(db: &Db, kind: RecordKind) -> EngineResult<Self> {
        Ok(Self {
            rows: db.open_tree(kind.tree_name())?,
            identifiers: db.open_tree(format!("{}_identifiers", kind.tree_name()))?,
        })
    }
}

// ---------------------------------------------------------------------------
// LedgerDb
// ---------------------------------------------------------------------------

/// Persistent record store.
///
/// # Thread Safety
///
/// sled trees support lock-free concurrent reads and serialized writes.
/// `LedgerDb` is cheap to clone and can be shared across threads without
/// external synchronization.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: Db,
    users: KindTrees,
    cards: KindTrees,
    profiles: KindTrees,
    transactions: KindTrees,
    contracts: KindTrees,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A throwaway database, removed when the last handle drops.
    ///
    /// Ideal for tests: no filesystem side effects, no cleanup needed.
    pub fn open_temporary() -> EngineResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> EngineResult<Self> {
        Ok(Self {
            users: KindTrees::open(&db, RecordKind::User)?,
            cards: KindTrees::open(&db, RecordKind::Card)?,
            profiles: KindTrees::open(&db, RecordKind::PaymentProfile)?,
            transactions: KindTrees::open(&db, RecordKind::Transaction)?,
            contracts: KindTrees::open(&db, RecordKind::Contract)?,
            db,
        })
    }

    fn trees(&self, kind: RecordKind) -> &KindTrees {
        match kind {
            RecordKind::User => &self.users,
            RecordKind::Card => &self.cards,
            RecordKind::PaymentProfile => &self.profiles,
            RecordKind::Transaction => &self.transactions,
            RecordKind::Contract => &self.contracts,
        }
    }

    /// Number of stored rows of kind `R`.
    pub fn count<R: Record>(&self) -> usize {
        self.trees(R::KIND).rows.len()
    }

    /// Block until every pending write is durable.
    pub fn flush(&self) -> EngineResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn decode<R: Record>(bytes: &[u8]) -> EngineResult<R> {
    Ok(bincode::deserialize(bytes)?)
}

fn decode_id(bytes: &[u8]) -> EngineResult<Uuid> {
    Uuid::from_slice(bytes).map_err(|e| EngineError::Storage(format!("corrupt id index: {e}")))
}

fn abort<T>(e: EngineError) -> Result<T, ConflictableTransactionError<EngineError>> {
    Err(ConflictableTransactionError::Abort(e))
}

/// Read and decode a row inside a transaction.
fn load_in_tx<R: Record>(
    rows: &TransactionalTree,
    id: Uuid,
) -> Result<R, ConflictableTransactionError<EngineError>> {
    match rows.get(id.as_bytes())? {
        Some(bytes) => decode(&bytes).or_else(abort),
        None => abort(EngineError::not_found(R::KIND, id)),
    }
}

fn settle<T>(result: TransactionResult<T, EngineError>) -> EngineResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

impl RecordStore for LedgerDb {
    fn fetch<R: Record>(&self, id: Uuid) -> EngineResult<Option<R>> {
        match self.trees(R::KIND).rows.get(id.as_bytes())? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn fetch_by_identifier<R: Record>(&self, identifier: &ContentHash) -> EngineResult<Option<R>> {
        match self.trees(R::KIND).identifiers.get(identifier.as_str())? {
            Some(id_bytes) => self.fetch(decode_id(&id_bytes)?),
            None => Ok(None),
        }
    }

    fn insert<R: Record>(&self, record: &R) -> EngineResult<()> {
        let trees = self.trees(R::KIND);
        let id = record.id();
        let identifier = record.identifier().as_str();
        let row = bincode::serialize(record)?;

        let result = (&trees.rows, &trees.identifiers).transaction(|(rows, identifiers)| {
            if identifiers.get(identifier)?.is_some() || rows.get(id.as_bytes())?.is_some() {
                return abort(EngineError::AlreadyExists {
                    kind: R::KIND,
                    identifier: identifier.to_string(),
                });
            }
            rows.insert(&id.as_bytes()[..], row.as_slice())?;
            identifiers.insert(identifier, &id.as_bytes()[..])?;
            Ok(())
        });
        settle(result)?;

        debug!(kind = %R::KIND, id = %id, "row inserted");
        Ok(())
    }

    fn modify<R, F>(&self, id: Uuid, apply: F) -> EngineResult<R>
    where
        R: Record,
        F: Fn(&mut R) -> EngineResult<()>,
    {
        let trees = self.trees(R::KIND);
        let result = trees.rows.transaction(|rows| {
            let stored: R = load_in_tx(rows, id)?;
            let mut updated = stored.clone();
            apply(&mut updated).or_else(abort)?;

            if updated.id() != stored.id() || updated.identifier() != stored.identifier() {
                return abort(EngineError::Storage(format!(
                    "{} update tried to change its keys",
                    R::KIND
                )));
            }

            let row = bincode::serialize(&updated)
                .map_err(|e| ConflictableTransactionError::Abort(EngineError::from(e)))?;
            rows.insert(&id.as_bytes()[..], row)?;
            Ok(updated)
        });
        settle(result)
    }

    fn remove<R: Record>(&self, id: Uuid) -> EngineResult<R> {
        let trees = self.trees(R::KIND);
        let result = (&trees.rows, &trees.identifiers).transaction(|(rows, identifiers)| {
            let stored: R = load_in_tx(rows, id)?;
            rows.remove(&id.as_bytes()[..])?;
            identifiers.remove(stored.identifier().as_str())?;
            Ok(stored)
        });
        let removed = settle(result)?;

        debug!(kind = %R::KIND, id = %id, "row removed");
        Ok(removed)
    }

    // Full scan of the kind's tree. Fine at the sizes an operator ledger
    // reaches; a secondary index per predicate would be the next step.
    fn count_where<R: Record>(&self, predicates: &[Predicate]) -> EngineResult<usize> {
        let mut count = 0;
        for entry in self.trees(R::KIND).rows.iter() {
            let (_key, bytes) = entry?;
            let record: R = decode(&bytes)?;
            if predicates.iter().all(|p| p.matches(&record)) {
                count += 1;
            }
        }
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
