//! # Transaction Module
//!
//! A transaction moves an amount from one payment profile to another. Its
//! status is one of the two lifecycle fields in the system, governed by the
//! table in [`types`].
//!
//! ## Architecture
//!
//! ```text
//! types.rs   - TransactionStatus and its transition table
//! record.rs  - Transaction row, allow-list, update rules
//! ```
//!
//! ## Update rules
//!
//! 1. **Authorize.** The caller presents the sender and receiver
//!    signatures. Both must match the stored pair exactly, or nothing else
//!    is even looked at.
//! 2. **Amount.** A different amount is accepted only while the row is
//!    Draft (a missing status counts as Draft). Re-sending the current
//!    amount is always fine.
//! 3. **Status.** Through [`crate::lifecycle::attempt_transition`]. Asking
//!    for the current status is a no-op; anything off the table is
//!    [`crate::error::EngineError::InvalidTransaction`].
//!
//! All amounts are `u64` in minor units. No floating point anywhere near
//! money.

pub mod record;
pub mod types;

pub use record::{NewTransaction, Transaction, TransactionField, TransactionView};
pub use types::TransactionStatus;
