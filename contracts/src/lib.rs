//! # Tally Contracts
//!
//! Two-party agreements on top of the Tally engine. A contract binds a
//! contractor profile and a contractee profile the same way a transaction
//! binds a sender and a receiver, with salted party signatures tied to each
//! other's cards, but instead of moving money it moves through its own
//! status table:
//!
//! - **status** - [`ContractStatus`] and its transition table.
//! - **contract** - The [`Contract`] row, its allow-list and update rules.
//! - **desk** - [`ContractDesk`], create/get/update/delete over a borrowed
//!   [`Engine`](tally_protocol::Engine).
//!
//! ## Design Principles
//!
//! 1. The body is the contract. It is hashed into the identifier at
//!    creation and never edited afterwards.
//! 2. State transitions are explicit: enum variants and a table, not
//!    boolean flags.
//! 3. Every mutation presents both signatures, or it doesn't happen.

pub mod contract;
pub mod desk;
pub mod status;

pub use contract::{Contract, ContractField, ContractView, NewContract};
pub use desk::ContractDesk;
pub use status::ContractStatus;
