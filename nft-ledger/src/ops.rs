//! The ledger state machine
//!
//! Implements the five mutating operations as validate-then-apply
//! transitions: each operation checks its preconditions against current
//! state, stages its complete write set (records, balance rows, allocator
//! advances, event records), and commits the set in one atomic batch.
//! A failed precondition returns before anything reaches storage, so no
//! operation ever applies partially. This covers composed operations too:
//! [`StateMachine::create_asset`] with an initial supply stages the asset
//! and its mint in the same batch.
//!
//! The state machine performs no locking of its own; callers must
//! serialize invocations. The [`Ledger`](crate::Ledger) facade does this
//! by running all mutations on a single writer task.

use crate::{
    audit,
    error::{Error, Result},
    host::{Authorization, Host},
    storage::{StateChanges, Storage},
    types::{
        Asset, Balance, Collection, EventKind, Principal, TokenEvent, MAX_DATA_BYTES,
        MAX_MEMO_BYTES, MAX_ROYALTY_BPS,
    },
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Memo recorded by the initial mint of `create_asset`
const CREATE_AND_MINT_MEMO: &str = "create and mint";

/// Outcome of a committed balance-moving operation
#[derive(Debug, Clone)]
pub struct Applied {
    /// The event record appended for the move
    pub event: TokenEvent,

    /// Principals owed a best-effort notification of `event`
    pub notify: Vec<Principal>,
}

/// Write set of one operation plus the log cursor stamping its events
///
/// Sequence numbers and `prev_hash` links are assigned here, so an
/// operation appending several records (asset creation with an initial
/// mint) stays correctly chained within its own batch.
struct Staging {
    changes: StateChanges,
    sequence: u64,
    prev_hash: [u8; 32],
}

impl Staging {
    fn load(storage: &Storage) -> Result<Self> {
        Ok(Self {
            changes: StateChanges::default(),
            sequence: storage.next_event_sequence()?,
            prev_hash: storage.head_hash()?,
        })
    }

    /// Stamp, chain, and stage an event record; returns a copy
    fn append_event(&mut self, kind: EventKind) -> TokenEvent {
        let event = TokenEvent {
            event_id: Uuid::now_v7(),
            sequence: self.sequence,
            recorded_at: Utc::now(),
            prev_hash: self.prev_hash,
            kind,
        };
        self.prev_hash = audit::hash_event(&event);
        self.sequence += 1;
        self.changes.events.push(event.clone());
        event
    }
}

/// The ledger state machine
///
/// Holds the storage it mutates, the host collaborators it consults, and
/// the administrative principal allowed to create collections.
pub struct StateMachine {
    storage: Arc<Storage>,
    host: Arc<dyn Host>,
    admin: Principal,
}

impl StateMachine {
    /// Create a state machine over open storage
    pub fn new(storage: Arc<Storage>, host: Arc<dyn Host>, admin: Principal) -> Self {
        Self {
            storage,
            host,
            admin,
        }
    }

    /// Register a new collection
    ///
    /// Requires administrative authorization. Returns the allocated
    /// collection id; ids start at 1 and are never reused.
    pub fn create_collection(
        &self,
        auth: &dyn Authorization,
        author: &Principal,
        royalty: u16,
        data: Vec<u8>,
    ) -> Result<u64> {
        if !auth.authorize(&self.admin) {
            return Err(Error::Unauthorized(format!(
                "missing authority of {}",
                self.admin
            )));
        }
        if royalty > MAX_ROYALTY_BPS {
            return Err(Error::InvalidInput(
                "royalty must be less than 1000".to_string(),
            ));
        }
        if data.len() > MAX_DATA_BYTES {
            return Err(Error::InvalidInput(
                "data has more than 65535 bytes".to_string(),
            ));
        }
        if !self.host.principal_exists(author) {
            return Err(Error::UnknownPrincipal(
                "author account does not exist".to_string(),
            ));
        }

        let collection_id = self.storage.next_collection_id()?;

        let mut staging = Staging::load(&self.storage)?;
        staging.append_event(EventKind::CollectionCreated {
            collection_id,
            author: author.clone(),
            royalty,
            data: data.clone(),
        });
        staging.changes.collections.push(Collection {
            collection_id,
            author: author.clone(),
            royalty,
            data,
        });
        staging.changes.next_collection_id = Some(collection_id + 1);

        self.storage.commit(&staging.changes)?;

        tracing::debug!(collection_id, author = %author, royalty, "collection created");

        Ok(collection_id)
    }

    /// Register a new asset under a collection
    ///
    /// Requires the collection author's authorization. A positive `supply`
    /// additionally mints that quantity to the author within the same
    /// commit; creation and initial mint succeed or fail together.
    /// Returns the allocated asset id.
    pub fn create_asset(
        &self,
        auth: &dyn Authorization,
        collection_id: u64,
        supply: u64,
        max_supply: u64,
        data: Vec<u8>,
    ) -> Result<u64> {
        if max_supply == 0 {
            return Err(Error::InvalidInput(
                "max-supply must be positive".to_string(),
            ));
        }
        if data.len() > MAX_DATA_BYTES {
            return Err(Error::InvalidInput(
                "data has more than 65535 bytes".to_string(),
            ));
        }
        let collection = self
            .storage
            .get_collection(collection_id)?
            .ok_or_else(|| Error::UnknownCollection("unable to find collection".to_string()))?;
        if !auth.authorize(&collection.author) {
            return Err(Error::Unauthorized(format!(
                "missing authority of {}",
                collection.author
            )));
        }

        let asset_id = self.storage.next_asset_id()?;
        let mut asset = Asset {
            asset_id,
            collection_id,
            supply: 0,
            max_supply,
            data: data.clone(),
        };

        let mut staging = Staging::load(&self.storage)?;
        staging.append_event(EventKind::AssetCreated {
            asset_id,
            collection_id,
            max_supply,
            data,
        });

        if supply > 0 {
            // Balance quantities are i64, which bounds a single mint.
            let amount = i64::try_from(supply)
                .map_err(|_| Error::InvalidInput("must issue positive amount".to_string()))?;
            self.stage_mint(
                &mut staging,
                &mut asset,
                &collection.author,
                &collection.author,
                amount,
                CREATE_AND_MINT_MEMO,
            )?;
        }

        staging.changes.assets.push(asset);
        staging.changes.next_asset_id = Some(asset_id + 1);

        self.storage.commit(&staging.changes)?;

        tracing::debug!(
            asset_id,
            collection_id,
            max_supply,
            initial_supply = supply,
            "asset created"
        );

        Ok(asset_id)
    }

    /// Mint `amount` units of an asset to `to`
    ///
    /// Requires the collection author's authorization and room under the
    /// asset's supply cap. The recipient does not have to be a registered
    /// principal, but the null principal is rejected.
    pub fn mint(
        &self,
        auth: &dyn Authorization,
        to: &Principal,
        asset_id: u64,
        amount: i64,
        memo: &str,
    ) -> Result<Applied> {
        if memo.len() > MAX_MEMO_BYTES {
            return Err(Error::InvalidInput(
                "memo has more than 256 bytes".to_string(),
            ));
        }
        let mut asset = self
            .storage
            .get_asset(asset_id)?
            .ok_or_else(|| Error::AssetNotFound("unable to find asset".to_string()))?;
        let collection = self
            .storage
            .get_collection(asset.collection_id)?
            .ok_or_else(|| Error::CollectionNotFound("unable to find collection".to_string()))?;
        if !auth.authorize(&collection.author) {
            return Err(Error::Unauthorized(format!(
                "missing authority of {}",
                collection.author
            )));
        }

        let mut staging = Staging::load(&self.storage)?;
        let event = self.stage_mint(
            &mut staging,
            &mut asset,
            &collection.author,
            to,
            amount,
            memo,
        )?;
        staging.changes.assets.push(asset);

        self.storage.commit(&staging.changes)?;

        tracing::debug!(asset_id, to = %to, amount, "minted");

        // A mint to someone other than the author is a receivable
        // transfer; both parties hear about it.
        let notify = if to != &collection.author {
            vec![collection.author, to.clone()]
        } else {
            Vec::new()
        };

        Ok(Applied { event, notify })
    }

    /// Burn `amount` units of an asset out of the author's own holding
    ///
    /// Requires the collection author's authorization; the author's
    /// balance funds the burn.
    pub fn burn(
        &self,
        auth: &dyn Authorization,
        asset_id: u64,
        amount: i64,
        memo: &str,
    ) -> Result<Applied> {
        if memo.len() > MAX_MEMO_BYTES {
            return Err(Error::InvalidInput(
                "memo has more than 256 bytes".to_string(),
            ));
        }
        if amount <= 0 {
            return Err(Error::InvalidInput(
                "must retire positive amount".to_string(),
            ));
        }
        let mut asset = self
            .storage
            .get_asset(asset_id)?
            .ok_or_else(|| Error::AssetNotFound("unable to find asset".to_string()))?;
        if asset.supply < amount as u64 {
            return Err(Error::InsufficientSupply("insufficient amount".to_string()));
        }
        let collection = self
            .storage
            .get_collection(asset.collection_id)?
            .ok_or_else(|| Error::CollectionNotFound("unable to find collection".to_string()))?;
        if !auth.authorize(&collection.author) {
            return Err(Error::Unauthorized(format!(
                "missing authority of {}",
                collection.author
            )));
        }

        let mut staging = Staging::load(&self.storage)?;
        asset.supply -= amount as u64;
        let from_balance = self.stage_debit(&mut staging, &collection.author, asset_id, amount)?;
        staging.changes.assets.push(asset);

        let event = staging.append_event(EventKind::BalanceTransferred {
            from: collection.author,
            to: Principal::null(),
            asset_id,
            amount,
            from_balance_after: from_balance,
            to_balance_after: 0,
            memo: memo.to_string(),
        });

        self.storage.commit(&staging.changes)?;

        tracing::debug!(asset_id, amount, "burned");

        Ok(Applied {
            event,
            notify: Vec::new(),
        })
    }

    /// Move `amount` units of an asset from `from` to `to`
    ///
    /// Requires `from`'s authorization; `to` must be a registered
    /// principal. When the call is co-signed by `to`, a newly created
    /// recipient row is attributed to `to` instead of `from`.
    pub fn transfer(
        &self,
        auth: &dyn Authorization,
        from: &Principal,
        to: &Principal,
        asset_id: u64,
        amount: i64,
        memo: &str,
    ) -> Result<Applied> {
        if from == to {
            return Err(Error::SelfTransfer("cannot transfer to self".to_string()));
        }
        if !auth.authorize(from) {
            return Err(Error::Unauthorized(format!(
                "missing authority of {}",
                from
            )));
        }
        if !self.host.principal_exists(to) {
            return Err(Error::UnknownPrincipal(
                "to account does not exist".to_string(),
            ));
        }
        if self.storage.get_asset(asset_id)?.is_none() {
            return Err(Error::AssetNotFound("unable to find asset".to_string()));
        }
        if amount <= 0 {
            return Err(Error::InvalidInput(
                "must transfer positive amount".to_string(),
            ));
        }
        if memo.len() > MAX_MEMO_BYTES {
            return Err(Error::InvalidInput(
                "memo has more than 256 bytes".to_string(),
            ));
        }

        // A recipient that co-signed the call pays for its own new row.
        let payer = if auth.authorize(to) { to } else { from };

        let mut staging = Staging::load(&self.storage)?;
        let from_balance = self.stage_debit(&mut staging, from, asset_id, amount)?;
        let to_balance = self.stage_credit(&mut staging, to, asset_id, amount, payer)?;

        let event = staging.append_event(EventKind::BalanceTransferred {
            from: from.clone(),
            to: to.clone(),
            asset_id,
            amount,
            from_balance_after: from_balance,
            to_balance_after: to_balance,
            memo: memo.to_string(),
        });

        self.storage.commit(&staging.changes)?;

        tracing::debug!(asset_id, from = %from, to = %to, amount, "transferred");

        Ok(Applied {
            event,
            notify: vec![from.clone(), to.clone()],
        })
    }

    /// Stage a mint against `asset`: validates the amount and the supply
    /// cap, bumps the supply, credits `to` (a new row is paid for by the
    /// author), and appends the transfer-shaped event record.
    fn stage_mint(
        &self,
        staging: &mut Staging,
        asset: &mut Asset,
        author: &Principal,
        to: &Principal,
        amount: i64,
        memo: &str,
    ) -> Result<TokenEvent> {
        if amount <= 0 {
            return Err(Error::InvalidInput(
                "must issue positive amount".to_string(),
            ));
        }
        if to.is_null() {
            return Err(Error::InvalidInput(
                "cannot mint to the null principal".to_string(),
            ));
        }
        asset.supply = asset
            .supply
            .checked_add(amount as u64)
            .filter(|supply| *supply <= asset.max_supply)
            .ok_or_else(|| Error::SupplyExceeded("amount exceeds available supply".to_string()))?;

        let to_balance = self.stage_credit(staging, to, asset.asset_id, amount, author)?;

        Ok(staging.append_event(EventKind::BalanceTransferred {
            from: Principal::null(),
            to: to.clone(),
            asset_id: asset.asset_id,
            amount,
            from_balance_after: 0,
            to_balance_after: to_balance,
            memo: memo.to_string(),
        }))
    }

    /// Credit `to` with `amount` of an asset, creating the row (paid for
    /// by `payer`) if absent. Returns the balance after the credit.
    fn stage_credit(
        &self,
        staging: &mut Staging,
        to: &Principal,
        asset_id: u64,
        amount: i64,
        payer: &Principal,
    ) -> Result<i64> {
        let (quantity, payer) = match self.storage.get_balance(to, asset_id)? {
            // An existing row keeps the payer it was created under.
            Some(row) => {
                let quantity = row
                    .quantity
                    .checked_add(amount)
                    .ok_or_else(|| Error::InvalidInput("balance overflow".to_string()))?;
                (quantity, row.payer)
            }
            None => (amount, payer.clone()),
        };
        staging.changes.balance_puts.push(Balance {
            owner: to.clone(),
            asset_id,
            quantity,
            payer,
        });
        Ok(quantity)
    }

    /// Debit `from` by `amount` of an asset, deleting the row when it
    /// reaches exactly zero. Returns the balance after the debit.
    fn stage_debit(
        &self,
        staging: &mut Staging,
        from: &Principal,
        asset_id: u64,
        amount: i64,
    ) -> Result<i64> {
        let row = self
            .storage
            .get_balance(from, asset_id)?
            .ok_or_else(|| Error::InsufficientBalance("no balance object found".to_string()))?;
        if row.quantity < amount {
            return Err(Error::InsufficientBalance("overdrawn balance".to_string()));
        }
        let quantity = row.quantity - amount;
        if quantity == 0 {
            staging
                .changes
                .balance_deletes
                .push((from.clone(), asset_id));
        } else {
            staging.changes.balance_puts.push(Balance {
                owner: from.clone(),
                asset_id,
                quantity,
                payer: row.payer,
            });
        }
        Ok(quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CallAuth, MemoryHost};
    use crate::Config;
    use tempfile::TempDir;

    fn test_machine() -> (StateMachine, Arc<Storage>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let storage = Arc::new(Storage::open(&config).unwrap());
        let host = Arc::new(MemoryHost::with_principals([
            "admin", "alice", "bob", "carol",
        ]));
        let machine = StateMachine::new(storage.clone(), host, Principal::new("admin"));
        (machine, storage, temp_dir)
    }

    fn admin() -> CallAuth {
        CallAuth::single(Principal::new("admin"))
    }

    fn as_principal(name: &str) -> (Principal, CallAuth) {
        let principal = Principal::new(name);
        (principal.clone(), CallAuth::single(principal))
    }

    /// Collection 1 authored by alice with one asset (cap 10, supply 0)
    fn seeded() -> (StateMachine, Arc<Storage>, TempDir) {
        let (machine, storage, temp) = test_machine();
        let (alice, alice_auth) = as_principal("alice");
        machine
            .create_collection(&admin(), &alice, 500, b"{}".to_vec())
            .unwrap();
        machine
            .create_asset(&alice_auth, 1, 0, 10, b"{}".to_vec())
            .unwrap();
        (machine, storage, temp)
    }

    #[test]
    fn test_collection_ids_allocate_from_one() {
        let (machine, storage, _temp) = test_machine();
        let (alice, _) = as_principal("alice");

        let first = machine
            .create_collection(&admin(), &alice, 500, b"{}".to_vec())
            .unwrap();
        let second = machine
            .create_collection(&admin(), &alice, 0, Vec::new())
            .unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);

        let stored = storage.get_collection(1).unwrap().unwrap();
        assert_eq!(stored.author, alice);
        assert_eq!(stored.royalty, 500);

        let events = storage.all_events().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0].kind,
            EventKind::CollectionCreated { collection_id: 1, .. }
        ));
    }

    #[test]
    fn test_create_collection_validation() {
        let (machine, _storage, _temp) = test_machine();
        let (alice, alice_auth) = as_principal("alice");

        let err = machine
            .create_collection(&admin(), &alice, 1001, b"{}".to_vec())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        // Royalty of exactly 1000 is within bounds.
        assert!(machine
            .create_collection(&admin(), &alice, 1000, b"{}".to_vec())
            .is_ok());

        let err = machine
            .create_collection(&admin(), &alice, 0, vec![0u8; MAX_DATA_BYTES + 1])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(machine
            .create_collection(&admin(), &alice, 0, vec![0u8; MAX_DATA_BYTES])
            .is_ok());

        let err = machine
            .create_collection(&admin(), &Principal::new("mallory"), 0, Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownPrincipal(_)));

        let err = machine
            .create_collection(&alice_auth, &alice, 0, Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn test_create_collection_checks_authorization_first() {
        let (machine, _storage, _temp) = test_machine();
        let (alice, alice_auth) = as_principal("alice");

        // Bad royalty and bad auth together: the auth failure wins.
        let err = machine
            .create_collection(&alice_auth, &alice, 1001, Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn test_create_asset_starts_with_zero_supply() {
        let (machine, storage, _temp) = test_machine();
        let (alice, alice_auth) = as_principal("alice");

        machine
            .create_collection(&admin(), &alice, 500, b"{}".to_vec())
            .unwrap();
        let asset_id = machine
            .create_asset(&alice_auth, 1, 0, 10, b"{}".to_vec())
            .unwrap();
        assert_eq!(asset_id, 1);

        let asset = storage.get_asset(1).unwrap().unwrap();
        assert_eq!(asset.supply, 0);
        assert_eq!(asset.max_supply, 10);
        assert_eq!(asset.collection_id, 1);

        let second = machine
            .create_asset(&alice_auth, 1, 0, 5, Vec::new())
            .unwrap();
        assert_eq!(second, 2);
    }

    #[test]
    fn test_create_asset_validation() {
        let (machine, _storage, _temp) = test_machine();
        let (alice, alice_auth) = as_principal("alice");
        let (_, bob_auth) = as_principal("bob");

        machine
            .create_collection(&admin(), &alice, 500, b"{}".to_vec())
            .unwrap();

        let err = machine
            .create_asset(&alice_auth, 1, 0, 0, Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = machine
            .create_asset(&alice_auth, 1, 0, 10, vec![0u8; MAX_DATA_BYTES + 1])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = machine
            .create_asset(&alice_auth, 99, 0, 10, Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownCollection(_)));

        let err = machine
            .create_asset(&bob_auth, 1, 0, 10, Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn test_create_asset_with_initial_supply() {
        let (machine, storage, _temp) = test_machine();
        let (alice, alice_auth) = as_principal("alice");

        machine
            .create_collection(&admin(), &alice, 500, b"{}".to_vec())
            .unwrap();
        machine
            .create_asset(&alice_auth, 1, 7, 10, b"{}".to_vec())
            .unwrap();

        let asset = storage.get_asset(1).unwrap().unwrap();
        assert_eq!(asset.supply, 7);

        let row = storage.get_balance(&alice, 1).unwrap().unwrap();
        assert_eq!(row.quantity, 7);
        assert_eq!(row.payer, alice);

        // One creation record plus the transfer-shaped mint record.
        let events = storage.all_events().unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1].kind, EventKind::AssetCreated { .. }));
        match &events[2].kind {
            EventKind::BalanceTransferred {
                from,
                to,
                amount,
                to_balance_after,
                memo,
                ..
            } => {
                assert!(from.is_null());
                assert_eq!(to, &alice);
                assert_eq!(*amount, 7);
                assert_eq!(*to_balance_after, 7);
                assert_eq!(memo, "create and mint");
            }
            other => panic!("unexpected event kind: {:?}", other),
        }
    }

    #[test]
    fn test_create_asset_initial_mint_is_atomic() {
        let (machine, storage, _temp) = test_machine();
        let (alice, alice_auth) = as_principal("alice");

        machine
            .create_collection(&admin(), &alice, 500, b"{}".to_vec())
            .unwrap();
        let events_before = storage.next_event_sequence().unwrap();

        // Initial supply over the cap: creation must fail with it.
        let err = machine
            .create_asset(&alice_auth, 1, 11, 10, b"{}".to_vec())
            .unwrap_err();
        assert!(matches!(err, Error::SupplyExceeded(_)));

        assert!(storage.get_asset(1).unwrap().is_none());
        assert!(storage.get_balance(&alice, 1).unwrap().is_none());
        assert_eq!(storage.next_asset_id().unwrap(), 1);
        assert_eq!(storage.next_event_sequence().unwrap(), events_before);
    }

    #[test]
    fn test_mint_to_cap_then_one_more_exceeds() {
        let (machine, storage, _temp) = seeded();
        let (alice, alice_auth) = as_principal("alice");

        machine.mint(&alice_auth, &alice, 1, 10, "m").unwrap();
        assert_eq!(storage.get_asset(1).unwrap().unwrap().supply, 10);

        let err = machine.mint(&alice_auth, &alice, 1, 1, "m").unwrap_err();
        assert!(matches!(err, Error::SupplyExceeded(_)));
        assert_eq!(storage.get_asset(1).unwrap().unwrap().supply, 10);
    }

    #[test]
    fn test_mint_validation() {
        let (machine, _storage, _temp) = seeded();
        let (alice, alice_auth) = as_principal("alice");
        let (bob, bob_auth) = as_principal("bob");

        let memo = "x".repeat(MAX_MEMO_BYTES + 1);
        let err = machine.mint(&alice_auth, &alice, 1, 1, &memo).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(machine
            .mint(&alice_auth, &alice, 1, 1, &"x".repeat(MAX_MEMO_BYTES))
            .is_ok());

        let err = machine.mint(&alice_auth, &alice, 99, 1, "m").unwrap_err();
        assert!(matches!(err, Error::AssetNotFound(_)));

        let err = machine.mint(&bob_auth, &bob, 1, 1, "m").unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        let err = machine.mint(&alice_auth, &alice, 1, 0, "m").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = machine
            .mint(&alice_auth, &Principal::null(), 1, 1, "m")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_mint_memo_checked_before_asset_lookup() {
        let (machine, _storage, _temp) = seeded();
        let (_, alice_auth) = as_principal("alice");

        let memo = "x".repeat(MAX_MEMO_BYTES + 1);
        let err = machine
            .mint(&alice_auth, &Principal::new("bob"), 99, 1, &memo)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_mint_recipient_need_not_be_registered() {
        let (machine, storage, _temp) = seeded();
        let (alice, alice_auth) = as_principal("alice");
        let zoe = Principal::new("zoe");

        let applied = machine.mint(&alice_auth, &zoe, 1, 3, "m").unwrap();
        assert_eq!(storage.get_balance(&zoe, 1).unwrap().unwrap().quantity, 3);

        // Both parties are owed a notification when the recipient is not
        // the author.
        assert_eq!(applied.notify, vec![alice, zoe]);
    }

    #[test]
    fn test_mint_to_author_notifies_nobody() {
        let (machine, _storage, _temp) = seeded();
        let (alice, alice_auth) = as_principal("alice");

        let applied = machine.mint(&alice_auth, &alice, 1, 3, "m").unwrap();
        assert!(applied.notify.is_empty());

        match applied.event.kind {
            EventKind::BalanceTransferred {
                ref from,
                ref to,
                from_balance_after,
                to_balance_after,
                ..
            } => {
                assert!(from.is_null());
                assert_eq!(to, &alice);
                assert_eq!(from_balance_after, 0);
                assert_eq!(to_balance_after, 3);
            }
            ref other => panic!("unexpected event kind: {:?}", other),
        }
    }

    #[test]
    fn test_transfer_moves_and_removes_at_zero() {
        let (machine, storage, _temp) = seeded();
        let (alice, alice_auth) = as_principal("alice");
        let (bob, bob_auth) = as_principal("bob");

        machine.mint(&alice_auth, &alice, 1, 10, "m").unwrap();

        let applied = machine
            .transfer(&alice_auth, &alice, &bob, 1, 4, "t")
            .unwrap();
        assert_eq!(storage.get_balance(&alice, 1).unwrap().unwrap().quantity, 6);
        assert_eq!(storage.get_balance(&bob, 1).unwrap().unwrap().quantity, 4);
        assert_eq!(applied.notify, vec![alice.clone(), bob.clone()]);
        match applied.event.kind {
            EventKind::BalanceTransferred {
                from_balance_after,
                to_balance_after,
                ..
            } => {
                assert_eq!(from_balance_after, 6);
                assert_eq!(to_balance_after, 4);
            }
            ref other => panic!("unexpected event kind: {:?}", other),
        }

        // Sending everything back removes bob's row only once it hits 0.
        machine
            .transfer(&bob_auth, &bob, &alice, 1, 3, "t")
            .unwrap();
        assert_eq!(storage.get_balance(&bob, 1).unwrap().unwrap().quantity, 1);
        machine
            .transfer(&bob_auth, &bob, &alice, 1, 1, "t")
            .unwrap();
        assert!(storage.get_balance(&bob, 1).unwrap().is_none());
        assert_eq!(
            storage.get_balance(&alice, 1).unwrap().unwrap().quantity,
            10
        );
    }

    #[test]
    fn test_transfer_validation() {
        let (machine, _storage, _temp) = seeded();
        let (alice, alice_auth) = as_principal("alice");
        let (bob, bob_auth) = as_principal("bob");

        machine.mint(&alice_auth, &alice, 1, 10, "m").unwrap();

        let err = machine
            .transfer(&alice_auth, &alice, &alice, 1, 1, "t")
            .unwrap_err();
        assert!(matches!(err, Error::SelfTransfer(_)));

        let err = machine
            .transfer(&bob_auth, &alice, &bob, 1, 1, "t")
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        let err = machine
            .transfer(&alice_auth, &alice, &Principal::new("zoe"), 1, 1, "t")
            .unwrap_err();
        assert!(matches!(err, Error::UnknownPrincipal(_)));

        let err = machine
            .transfer(&alice_auth, &alice, &bob, 99, 1, "t")
            .unwrap_err();
        assert!(matches!(err, Error::AssetNotFound(_)));

        let err = machine
            .transfer(&alice_auth, &alice, &bob, 1, 0, "t")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = machine
            .transfer(&alice_auth, &alice, &bob, 1, 11, "t")
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance(_)));

        // No balance row at all is reported distinctly from overdrawing.
        let err = machine
            .transfer(&bob_auth, &bob, &alice, 1, 1, "t")
            .unwrap_err();
        match err {
            Error::InsufficientBalance(reason) => {
                assert_eq!(reason, "no balance object found")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_self_transfer_rejected_before_anything_else() {
        let (machine, _storage, _temp) = seeded();
        let (alice, _) = as_principal("alice");

        // Even with no authorization and no balance, self-transfer wins.
        let err = machine
            .transfer(&CallAuth::none(), &alice, &alice, 99, 0, "t")
            .unwrap_err();
        assert!(matches!(err, Error::SelfTransfer(_)));
    }

    #[test]
    fn test_transfer_payer_attribution() {
        let (machine, storage, _temp) = seeded();
        let (alice, alice_auth) = as_principal("alice");
        let (bob, _) = as_principal("bob");
        let carol = Principal::new("carol");

        machine.mint(&alice_auth, &alice, 1, 10, "m").unwrap();

        // Plain call: the sender pays for the recipient's new row.
        machine
            .transfer(&alice_auth, &alice, &bob, 1, 2, "t")
            .unwrap();
        assert_eq!(storage.get_balance(&bob, 1).unwrap().unwrap().payer, alice);

        // Co-signed call: the recipient pays for its own new row.
        let cosigned = CallAuth::cosigned(alice.clone(), carol.clone());
        machine
            .transfer(&cosigned, &alice, &carol, 1, 2, "t")
            .unwrap();
        assert_eq!(
            storage.get_balance(&carol, 1).unwrap().unwrap().payer,
            carol
        );

        // Updates never reassign an existing row's payer.
        let cosigned = CallAuth::cosigned(alice.clone(), bob.clone());
        machine
            .transfer(&cosigned, &alice, &bob, 1, 2, "t")
            .unwrap();
        assert_eq!(storage.get_balance(&bob, 1).unwrap().unwrap().payer, alice);
    }

    #[test]
    fn test_transfer_replay_is_not_idempotent() {
        let (machine, storage, _temp) = seeded();
        let (alice, alice_auth) = as_principal("alice");
        let (bob, _) = as_principal("bob");

        machine.mint(&alice_auth, &alice, 1, 10, "m").unwrap();

        machine
            .transfer(&alice_auth, &alice, &bob, 1, 3, "same memo")
            .unwrap();
        machine
            .transfer(&alice_auth, &alice, &bob, 1, 3, "same memo")
            .unwrap();

        assert_eq!(storage.get_balance(&alice, 1).unwrap().unwrap().quantity, 4);
        assert_eq!(storage.get_balance(&bob, 1).unwrap().unwrap().quantity, 6);
    }

    #[test]
    fn test_burn_reduces_supply_and_removes_emptied_row() {
        let (machine, storage, _temp) = seeded();
        let (alice, alice_auth) = as_principal("alice");
        let (bob, _) = as_principal("bob");

        machine.mint(&alice_auth, &alice, 1, 10, "m").unwrap();
        machine
            .transfer(&alice_auth, &alice, &bob, 1, 4, "t")
            .unwrap();

        let applied = machine.burn(&alice_auth, 1, 6, "b").unwrap();
        assert_eq!(storage.get_asset(1).unwrap().unwrap().supply, 4);
        assert!(storage.get_balance(&alice, 1).unwrap().is_none());
        assert!(applied.notify.is_empty());
        match applied.event.kind {
            EventKind::BalanceTransferred {
                ref from,
                ref to,
                from_balance_after,
                to_balance_after,
                ..
            } => {
                assert_eq!(from, &alice);
                assert!(to.is_null());
                assert_eq!(from_balance_after, 0);
                assert_eq!(to_balance_after, 0);
            }
            ref other => panic!("unexpected event kind: {:?}", other),
        }

        // Conservation: bob's 4 is all that remains, matching the supply.
        assert_eq!(storage.sum_balances(1).unwrap(), 4);
    }

    #[test]
    fn test_burn_validation() {
        let (machine, _storage, _temp) = seeded();
        let (alice, alice_auth) = as_principal("alice");
        let (bob, bob_auth) = as_principal("bob");

        let err = machine.burn(&alice_auth, 1, 0, "b").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        // Amount positivity is checked before the asset lookup.
        let err = machine.burn(&alice_auth, 99, 0, "b").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = machine.burn(&alice_auth, 99, 1, "b").unwrap_err();
        assert!(matches!(err, Error::AssetNotFound(_)));

        // Supply is zero, so any burn outruns it.
        let err = machine.burn(&alice_auth, 1, 1, "b").unwrap_err();
        assert!(matches!(err, Error::InsufficientSupply(_)));

        machine.mint(&alice_auth, &bob, 1, 5, "m").unwrap();

        let err = machine.burn(&bob_auth, 1, 1, "b").unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        // The supply exists but sits with bob, not the author.
        let err = machine.burn(&alice_auth, 1, 1, "b").unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance(_)));
    }

    #[test]
    fn test_event_log_forms_valid_chain() {
        let (machine, storage, _temp) = seeded();
        let (alice, alice_auth) = as_principal("alice");
        let (bob, _) = as_principal("bob");

        machine.mint(&alice_auth, &alice, 1, 10, "m").unwrap();
        machine
            .transfer(&alice_auth, &alice, &bob, 1, 4, "t")
            .unwrap();
        machine.burn(&alice_auth, 1, 6, "b").unwrap();

        let events = storage.all_events().unwrap();
        assert_eq!(events.len(), 5);
        audit::verify_chain(&events, storage.head_hash().unwrap()).unwrap();
    }
}
