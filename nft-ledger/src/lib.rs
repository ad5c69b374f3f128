//! # NFT Ledger Core
//!
//! A minimal non-fungible/semi-fungible token ledger. Collections group
//! assets under an author, assets carry an immutable supply cap, and
//! balance rows track per-owner holdings. Every mutation appends an
//! immutable, hash-chained event record.
//!
//! ## Architecture
//!
//! - **Validate-then-apply**: an operation checks all preconditions, then
//!   commits its complete write set in one atomic batch; rejected
//!   operations leave no trace
//! - **Single writer**: all mutations run on one actor task, so
//!   read-modify-write races cannot occur
//! - **Direct reads**: queries bypass the actor and hit storage, which is
//!   consistent because operations are acknowledged only after their
//!   batch is durable
//! - **Host seams**: authorization, principal existence, and notification
//!   delivery are traits implemented by the embedding environment
//!
//! ## Invariants
//!
//! - Per asset, balances across all owners sum to exactly the recorded
//!   supply
//! - `0 <= supply <= max_supply` at all times
//! - A balance row exists iff its quantity is positive
//! - Event records are append-only; each links to its predecessor by hash
//!
//! See [`Ledger`] for the entry point.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod actor;
pub mod audit;
pub mod config;
pub mod error;
pub mod host;
pub mod ledger;
pub mod metrics;
pub mod ops;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use host::{Authorization, CallAuth, Host, MemoryHost, Notification};
pub use ledger::Ledger;
pub use metrics::Metrics;
pub use ops::{Applied, StateMachine};
pub use types::{Asset, Balance, Collection, EventKind, Principal, TokenEvent};
