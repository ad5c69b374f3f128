//! Audit chain hashing
//!
//! Every event record carries the SHA-256 hash of its predecessor, which
//! makes the append-only log tamper evident: editing or dropping a record
//! breaks the chain for everything after it. The chain head is persisted
//! next to the log and advanced in the same atomic batch as each append.

use crate::error::{Error, Result};
use crate::types::TokenEvent;
use sha2::{Digest, Sha256};

/// Chain head of an empty log, and `prev_hash` of the first event
pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash an event record
///
/// Creates a deterministic 32-byte hash from the event's canonical bytes.
pub fn hash_event(event: &TokenEvent) -> [u8; 32] {
    hash_bytes(&event.canonical_bytes())
}

/// Verify that a replayed log forms an unbroken hash chain
///
/// `events` must be the full log in ascending sequence order and `head`
/// the persisted chain head. Fails on the first gap, link mismatch, or
/// head mismatch found.
pub fn verify_chain(events: &[TokenEvent], head: [u8; 32]) -> Result<()> {
    let mut expected_prev = GENESIS_HASH;

    for (i, event) in events.iter().enumerate() {
        if event.sequence != i as u64 {
            return Err(Error::InvariantViolation(format!(
                "event log has a gap: expected sequence {}, found {}",
                i, event.sequence
            )));
        }
        if event.prev_hash != expected_prev {
            return Err(Error::InvariantViolation(format!(
                "hash chain broken at sequence {}",
                event.sequence
            )));
        }
        expected_prev = hash_event(event);
    }

    if expected_prev != head {
        return Err(Error::InvariantViolation(
            "stored chain head does not match replayed log".to_string(),
        ));
    }

    Ok(())
}
