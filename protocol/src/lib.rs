// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Tally Protocol: Record Integrity & Transition Engine
//!
//! Tally keeps financial-style records (users, payment profiles, cards,
//! transactions, contracts) and is paranoid about exactly three things:
//!
//! 1. **Identity.** Identifiers and cross-party "signatures" are salted
//!    SHA-256 digests of the values that define a record. No raw secret is
//!    ever needed to find a row, and no raw secret is ever stored.
//! 2. **Confidentiality.** Everything that leaves the engine is sealed with
//!    AES-256-GCM. Tampered or wrong-key payloads fail closed, and they all
//!    fail the same way.
//! 3. **Lifecycles.** Transaction and contract status move only along
//!    explicit transition tables. No skipping ahead, no going back, no
//!    "just this once".
//!
//! ## Architecture
//!
//! - **config** - Constants and the process-wide, read-only [`EngineConfig`].
//! - **error** - One error enum for the whole engine.
//! - **crypto** - Salted hashing and the sealing envelope. Don't roll your own.
//! - **validation** - The attribute gateway every mutation passes through.
//! - **lifecycle** - Transition tables as data, one shared transition function.
//! - **allocation** - Card numbers, CVVs and PINs, collision-checked.
//! - **records** - User, card and payment profile rows.
//! - **transaction** - Transaction rows and their state machine.
//! - **storage** - The persistence trait and its sled implementation.
//! - **engine** - The service that glues it all together.
//!
//! ## Design Philosophy
//!
//! 1. Validate everything before writing anything.
//! 2. Deterministic where it's a lookup key, random where it's a secret.
//! 3. If it touches money, it has tests. Plural.

pub mod allocation;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod records;
pub mod storage;
pub mod transaction;
pub mod validation;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
