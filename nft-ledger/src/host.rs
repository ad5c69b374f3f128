//! Host environment collaborator interfaces
//!
//! The ledger core does not verify signatures, track registered accounts,
//! or deliver messages; the hosting environment does. These traits are the
//! seams it plugs into:
//!
//! - [`Authorization`]: which principals the current call carries verified
//!   authorization for (a per-call capability predicate)
//! - [`Host`]: principal existence checks and best-effort notification
//!   delivery
//!
//! [`CallAuth`] and [`MemoryHost`] are bundled implementations for tests,
//! the demo binary, and embedders without their own infrastructure.

use crate::types::{Principal, TokenEvent};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Per-call capability predicate
///
/// An implementation answers true iff the current call carries verified
/// authorization for `principal`. Verification itself (signatures, session
/// tokens, ...) is the host's concern and happens before the ledger is
/// invoked.
pub trait Authorization: Send {
    /// True iff the call is authorized as `principal`
    fn authorize(&self, principal: &Principal) -> bool;
}

/// Verified authorizations carried by a single operation call
///
/// Most calls carry one principal; a transfer co-signed by its recipient
/// carries two (which decides who pays for a newly created balance row).
#[derive(Debug, Clone, Default)]
pub struct CallAuth {
    authorized: Vec<Principal>,
}

impl CallAuth {
    /// A call carrying no authorization at all
    pub fn none() -> Self {
        Self::default()
    }

    /// A call authorized as exactly one principal
    pub fn single(principal: Principal) -> Self {
        Self {
            authorized: vec![principal],
        }
    }

    /// A call co-signed by two principals
    pub fn cosigned(first: Principal, second: Principal) -> Self {
        Self {
            authorized: vec![first, second],
        }
    }
}

impl Authorization for CallAuth {
    fn authorize(&self, principal: &Principal) -> bool {
        // The null sentinel can never be authorized.
        !principal.is_null() && self.authorized.contains(principal)
    }
}

/// Host environment services held by the ledger
pub trait Host: Send + Sync {
    /// True iff `principal` is a valid registered identity
    fn principal_exists(&self, principal: &Principal) -> bool;

    /// Best-effort delivery of an event to an interested principal
    ///
    /// Called after the operation's state change is durable; a failing or
    /// slow implementation must not (and cannot) roll the operation back.
    fn notify(&self, principal: &Principal, event: &TokenEvent);
}

/// A notification addressed to one principal
#[derive(Debug, Clone)]
pub struct Notification {
    /// Principal the event is addressed to
    pub recipient: Principal,

    /// The event record delivered
    pub event: TokenEvent,
}

/// In-memory host: a principal directory plus a notification log and a
/// live broadcast feed
///
/// Suitable for tests and single-process embeddings. `notify` records the
/// delivery and publishes it on the feed; subscribers that lag are dropped
/// rather than ever blocking the ledger.
pub struct MemoryHost {
    principals: DashMap<Principal, ()>,
    delivered: Mutex<Vec<Notification>>,
    feed: broadcast::Sender<Notification>,
}

impl MemoryHost {
    /// Create an empty host with no registered principals
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(256);
        Self {
            principals: DashMap::new(),
            delivered: Mutex::new(Vec::new()),
            feed,
        }
    }

    /// Create a host with the given principals registered
    pub fn with_principals<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let host = Self::new();
        for name in names {
            host.register(Principal::new(name));
        }
        host
    }

    /// Register a principal
    pub fn register(&self, principal: Principal) {
        self.principals.insert(principal, ());
    }

    /// Notifications delivered so far, in delivery order
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().clone()
    }

    /// Subscribe to the live notification feed
    pub fn subscribe(&self) -> BroadcastStream<Notification> {
        BroadcastStream::new(self.feed.subscribe())
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for MemoryHost {
    fn principal_exists(&self, principal: &Principal) -> bool {
        !principal.is_null() && self.principals.contains_key(principal)
    }

    fn notify(&self, principal: &Principal, event: &TokenEvent) {
        let notification = Notification {
            recipient: principal.clone(),
            event: event.clone(),
        };
        self.delivered.lock().push(notification.clone());
        // No receivers (or lagged receivers) is fine; delivery is
        // best-effort.
        let _ = self.feed.send(notification);
    }
}
