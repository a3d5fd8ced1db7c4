//! # Storage Module
//!
//! The engine doesn't care where rows live. It talks to a [`RecordStore`]:
//! point lookup by primary key, point lookup by the public identifier,
//! insert, atomic read-modify-write, delete, and an existence count over a
//! handful of equality predicates. That's the whole contract.
//!
//! ## Architecture
//!
//! ```text
//! record.rs  - RecordKind, the Record trait, query predicates
//! db.rs      - LedgerDb, the sled-backed RecordStore
//! ```
//!
//! ## Design Decisions
//!
//! 1. **The store serializes writers, not the engine.** Every update runs
//!    inside [`RecordStore::modify`], which re-reads the row, applies the
//!    closure, and commits atomically. Two callers racing on the same row
//!    are serialized; the loser re-runs against the winner's state and
//!    sees a stale-state failure rather than silently overwriting it.
//!
//! 2. **Bincode for rows.** Compact, fast, deterministic. JSON is for
//!    sealed snapshots and config files; bincode is for storage.

pub mod db;
pub mod record;

use uuid::Uuid;

use crate::crypto::ContentHash;
use crate::error::EngineResult;

pub use db::LedgerDb;
pub use record::{Predicate, Record, RecordKind};

/// The persistence collaborator.
pub trait RecordStore {
    /// Point lookup by private id.
    fn fetch<R: Record>(&self, id: Uuid) -> EngineResult<Option<R>>;

    /// Point lookup by public identifier.
    fn fetch_by_identifier<R: Record>(&self, identifier: &ContentHash) -> EngineResult<Option<R>>;

    /// Insert a new row. A row with the same identifier (or id) already
    /// present fails with `AlreadyExists`.
    fn insert<R: Record>(&self, record: &R) -> EngineResult<()>;

    /// Atomic read-modify-write of one row.
    ///
    /// `apply` runs against a fresh copy of the stored row and may run more
    /// than once if the store detects a conflicting writer. An `Err` from it
    /// aborts with nothing written. Returns the committed row. A missing
    /// row is `NotFound`; `apply` may not change the row's keys.
    fn modify<R, F>(&self, id: Uuid, apply: F) -> EngineResult<R>
    where
        R: Record,
        F: Fn(&mut R) -> EngineResult<()>;

    /// Delete a row and its identifier mapping. Returns the removed row.
    fn remove<R: Record>(&self, id: Uuid) -> EngineResult<R>;

    /// How many rows of kind `R` satisfy every predicate.
    fn count_where<R: Record>(&self, predicates: &[Predicate]) -> EngineResult<usize>;
}
