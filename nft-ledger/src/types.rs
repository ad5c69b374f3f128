//! Core types for the token ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact integer arithmetic for token quantities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Royalty upper bound, in basis points
pub const MAX_ROYALTY_BPS: u16 = 1000;

/// Maximum size of a collection's or asset's opaque payload, in bytes
pub const MAX_DATA_BYTES: usize = 65535;

/// Maximum size of a transfer memo, in bytes
pub const MAX_MEMO_BYTES: usize = 256;

/// Principal identifier (an account capable of holding authorization and
/// assets)
///
/// The empty string is the null principal: the sentinel standing for
/// "no principal" in mint and burn event records. It never owns balances
/// and is never a valid operation party.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Principal(String);

impl Principal {
    /// Create new principal identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The null principal sentinel
    pub fn null() -> Self {
        Self(String::new())
    }

    /// True for the null principal sentinel
    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get as bytes (used in storage keys)
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "<null>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A collection: a named grouping of assets sharing an author and royalty
/// rate
///
/// Immutable after creation except as a foreign-key target; never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Unique, monotonically allocated identifier (never 0)
    pub collection_id: u64,

    /// Principal that authors assets in this collection
    pub author: Principal,

    /// Royalty in basis points, 0..=1000
    pub royalty: u16,

    /// Opaque payload, at most 65535 bytes
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

/// An asset: a mintable item type with a capped total supply, belonging to
/// one collection
///
/// Invariant: `0 <= supply <= max_supply` at all times; `supply` is mutated
/// only by mint and burn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Unique, monotonically allocated identifier (never 0)
    pub asset_id: u64,

    /// Owning collection
    pub collection_id: u64,

    /// Currently minted-and-not-burned quantity
    pub supply: u64,

    /// Supply cap, fixed at creation, always positive
    pub max_supply: u64,

    /// Opaque payload, at most 65535 bytes
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

/// A principal's held quantity of a specific asset
///
/// A record exists iff `quantity > 0`; rows reaching zero are deleted, not
/// stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Owning principal (the storage namespace this row lives in)
    pub owner: Principal,

    /// Asset held
    pub asset_id: u64,

    /// Held quantity, strictly positive while the record exists
    pub quantity: i64,

    /// Principal the row's storage cost is attributed to
    ///
    /// Set when the row is created and never changed by later updates.
    pub payer: Principal,
}

/// State change described by an event record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A collection was registered
    CollectionCreated {
        /// New collection id
        collection_id: u64,
        /// Collection author
        author: Principal,
        /// Royalty in basis points
        royalty: u16,
        /// Opaque collection payload
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    },

    /// An asset was registered under a collection
    AssetCreated {
        /// New asset id
        asset_id: u64,
        /// Owning collection
        collection_id: u64,
        /// Supply cap
        max_supply: u64,
        /// Opaque asset payload
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    },

    /// Balance moved between principals
    ///
    /// Mint is a transfer from the null principal (from-balance reported as
    /// 0); burn is a transfer to the null principal (to-balance reported as
    /// 0).
    BalanceTransferred {
        /// Sender, or the null principal for a mint
        from: Principal,
        /// Recipient, or the null principal for a burn
        to: Principal,
        /// Asset moved
        asset_id: u64,
        /// Quantity moved, always positive
        amount: i64,
        /// Sender balance after the operation
        from_balance_after: i64,
        /// Recipient balance after the operation
        to_balance_after: i64,
        /// Caller-supplied memo, at most 256 bytes
        memo: String,
    },
}

impl EventKind {
    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::CollectionCreated { .. } => "collection_created",
            EventKind::AssetCreated { .. } => "asset_created",
            EventKind::BalanceTransferred { .. } => "balance_transferred",
        }
    }

    /// Asset this record concerns, if any
    pub fn asset_id(&self) -> Option<u64> {
        match self {
            EventKind::CollectionCreated { .. } => None,
            EventKind::AssetCreated { asset_id, .. } => Some(*asset_id),
            EventKind::BalanceTransferred { asset_id, .. } => Some(*asset_id),
        }
    }

    /// Non-null principals named by this record (used for index rows)
    pub fn participants(&self) -> Vec<&Principal> {
        let named: Vec<&Principal> = match self {
            EventKind::CollectionCreated { author, .. } => vec![author],
            EventKind::AssetCreated { .. } => vec![],
            EventKind::BalanceTransferred { from, to, .. } => vec![from, to],
        };
        named.into_iter().filter(|p| !p.is_null()).collect()
    }
}

/// Immutable event record: the ledger's audit trail entry
///
/// Records are append-only, never mutated or deleted. `prev_hash` chains
/// each record to its predecessor; the chain head is stored alongside the
/// log and advanced in the same atomic write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEvent {
    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Position in the append-only log, starting at 0
    pub sequence: u64,

    /// Record timestamp
    pub recorded_at: DateTime<Utc>,

    /// SHA-256 hash of the previous record (all zeroes for the first)
    pub prev_hash: [u8; 32],

    /// The state change described
    pub kind: EventKind,
}

impl TokenEvent {
    /// Canonical bytes for hashing
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // Deterministic serialization; TokenEvent contains no maps or
        // other order-unstable containers.
        bincode::serialize(self).expect("event serialization cannot fail")
    }
}
