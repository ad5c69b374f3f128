//! Error types for the token ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// The first group mirrors the failure kinds callers can observe from the
/// five ledger operations; every variant carries a human-readable reason.
/// The second group covers the ambient machinery (storage, serialization,
/// actor plumbing).
#[derive(Error, Debug)]
pub enum Error {
    /// Size, range, or positivity violation on an input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing required authorization
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Referenced principal is not a registered identity
    #[error("Unknown principal: {0}")]
    UnknownPrincipal(String),

    /// Referenced collection does not exist (creation path)
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// Referenced asset does not exist
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// Asset points at a collection that does not exist (mint path)
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Mint would push supply past the asset's cap
    #[error("Supply exceeded: {0}")]
    SupplyExceeded(String),

    /// Burn amount exceeds the asset's outstanding supply
    #[error("Insufficient supply: {0}")]
    InsufficientSupply(String),

    /// Debit exceeds the owner's balance
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Transfer with identical sender and recipient
    #[error("Self transfer: {0}")]
    SelfTransfer(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Invariant violation (supply conservation, audit chain break)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
