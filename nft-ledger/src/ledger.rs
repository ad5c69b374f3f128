//! Main ledger orchestration layer
//!
//! Ties storage, the state machine, the writer actor, and the host
//! collaborators together behind the public async API. Mutations are
//! serialized through the actor; reads go straight to storage, which is
//! consistent because an operation is only acknowledged once its batch is
//! durable. Notifications fan out on the caller's task after the
//! acknowledgement, so a slow host consumer can neither delay the writer
//! nor roll an operation back.
//!
//! # Example
//!
//! ```no_run
//! use nft_ledger::{CallAuth, Config, Ledger, MemoryHost, Principal};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> nft_ledger::Result<()> {
//!     let config = Config::default();
//!     let admin = config.admin.clone();
//!     let host = Arc::new(MemoryHost::with_principals(["alice"]));
//!     let ledger = Ledger::open(config, host).await?;
//!
//!     let alice = Principal::new("alice");
//!     let collection_id = ledger
//!         .create_collection(CallAuth::single(admin), alice.clone(), 250, b"{}".to_vec())
//!         .await?;
//!     let asset_id = ledger
//!         .create_asset(CallAuth::single(alice.clone()), collection_id, 0, 100, Vec::new())
//!         .await?;
//!     let minted = ledger
//!         .mint(CallAuth::single(alice.clone()), alice, asset_id, 10, "first mint")
//!         .await?;
//!     println!("minted at sequence {}", minted.sequence);
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    audit,
    config::Config,
    error::{Error, Result},
    host::{Authorization, Host},
    metrics::Metrics,
    ops::{Applied, StateMachine},
    storage::{Storage, StorageStats},
    types::{Asset, Balance, Collection, Principal, TokenEvent},
};
use std::sync::Arc;
use std::time::Instant;

/// The token ledger
///
/// Cheap to share behind an [`Arc`]; all methods take `&self`.
pub struct Ledger {
    handle: LedgerHandle,
    storage: Arc<Storage>,
    host: Arc<dyn Host>,
    metrics: Metrics,
    config: Config,
}

impl Ledger {
    /// Open storage under `config.data_dir` and start the writer actor
    pub async fn open(config: Config, host: Arc<dyn Host>) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("failed to register metrics: {}", e)))?;
        let machine = StateMachine::new(storage.clone(), host.clone(), config.admin.clone());
        let handle = spawn_ledger_actor(machine, config.mailbox_capacity);

        tracing::info!(
            data_dir = %config.data_dir.display(),
            admin = %config.admin,
            "Ledger opened"
        );

        Ok(Self {
            handle,
            storage,
            host,
            metrics,
            config,
        })
    }

    /// Register a collection; requires administrative authorization
    pub async fn create_collection(
        &self,
        auth: impl Authorization + 'static,
        author: Principal,
        royalty: u16,
        data: Vec<u8>,
    ) -> Result<u64> {
        let started = Instant::now();
        let result = self
            .handle
            .create_collection(Box::new(auth), author, royalty, data)
            .await;
        self.metrics
            .record_operation_duration(started.elapsed().as_secs_f64());
        match &result {
            Ok(_) => self.metrics.record_collection_created(),
            Err(_) => self.metrics.record_failure(),
        }
        result
    }

    /// Register an asset under a collection; requires the author's
    /// authorization
    ///
    /// A positive `supply` is minted to the author atomically with the
    /// creation.
    pub async fn create_asset(
        &self,
        auth: impl Authorization + 'static,
        collection_id: u64,
        supply: u64,
        max_supply: u64,
        data: Vec<u8>,
    ) -> Result<u64> {
        let started = Instant::now();
        let result = self
            .handle
            .create_asset(Box::new(auth), collection_id, supply, max_supply, data)
            .await;
        self.metrics
            .record_operation_duration(started.elapsed().as_secs_f64());
        match &result {
            Ok(_) => self.metrics.record_asset_created(),
            Err(_) => self.metrics.record_failure(),
        }
        result
    }

    /// Mint units of an asset to `to`; requires the author's authorization
    ///
    /// Returns the committed event record.
    pub async fn mint(
        &self,
        auth: impl Authorization + 'static,
        to: Principal,
        asset_id: u64,
        amount: i64,
        memo: impl Into<String>,
    ) -> Result<TokenEvent> {
        let started = Instant::now();
        let result = self
            .handle
            .mint(Box::new(auth), to, asset_id, amount, memo.into())
            .await;
        self.metrics
            .record_operation_duration(started.elapsed().as_secs_f64());
        match result {
            Ok(applied) => {
                self.metrics.record_mint();
                Ok(self.deliver(applied))
            }
            Err(e) => {
                self.metrics.record_failure();
                Err(e)
            }
        }
    }

    /// Burn units of an asset from the author's holding; requires the
    /// author's authorization
    ///
    /// Returns the committed event record.
    pub async fn burn(
        &self,
        auth: impl Authorization + 'static,
        asset_id: u64,
        amount: i64,
        memo: impl Into<String>,
    ) -> Result<TokenEvent> {
        let started = Instant::now();
        let result = self
            .handle
            .burn(Box::new(auth), asset_id, amount, memo.into())
            .await;
        self.metrics
            .record_operation_duration(started.elapsed().as_secs_f64());
        match result {
            Ok(applied) => {
                self.metrics.record_burn();
                Ok(self.deliver(applied))
            }
            Err(e) => {
                self.metrics.record_failure();
                Err(e)
            }
        }
    }

    /// Move units of an asset from `from` to `to`; requires `from`'s
    /// authorization
    ///
    /// Returns the committed event record.
    pub async fn transfer(
        &self,
        auth: impl Authorization + 'static,
        from: Principal,
        to: Principal,
        asset_id: u64,
        amount: i64,
        memo: impl Into<String>,
    ) -> Result<TokenEvent> {
        let started = Instant::now();
        let result = self
            .handle
            .transfer(Box::new(auth), from, to, asset_id, amount, memo.into())
            .await;
        self.metrics
            .record_operation_duration(started.elapsed().as_secs_f64());
        match result {
            Ok(applied) => {
                self.metrics.record_transfer();
                Ok(self.deliver(applied))
            }
            Err(e) => {
                self.metrics.record_failure();
                Err(e)
            }
        }
    }

    /// Fan out best-effort notifications for a committed operation
    fn deliver(&self, applied: Applied) -> TokenEvent {
        for principal in &applied.notify {
            self.host.notify(principal, &applied.event);
        }
        applied.event
    }

    /// Look up a collection
    pub fn collection(&self, collection_id: u64) -> Result<Option<Collection>> {
        self.storage.get_collection(collection_id)
    }

    /// Look up an asset
    pub fn asset(&self, asset_id: u64) -> Result<Option<Asset>> {
        self.storage.get_asset(asset_id)
    }

    /// Quantity of an asset held by `owner`; 0 when no row exists
    pub fn balance(&self, owner: &Principal, asset_id: u64) -> Result<i64> {
        Ok(self
            .storage
            .get_balance(owner, asset_id)?
            .map(|row| row.quantity)
            .unwrap_or(0))
    }

    /// Full balance row of `owner` for an asset, including the payer
    pub fn balance_record(&self, owner: &Principal, asset_id: u64) -> Result<Option<Balance>> {
        self.storage.get_balance(owner, asset_id)
    }

    /// All balance rows held by `owner`
    pub fn balances_of(&self, owner: &Principal) -> Result<Vec<Balance>> {
        self.storage.balances_of(owner)
    }

    /// All collections, ordered by id
    pub fn collections(&self) -> Result<Vec<Collection>> {
        self.storage.list_collections()
    }

    /// All assets in a collection, ordered by id
    pub fn assets_in_collection(&self, collection_id: u64) -> Result<Vec<Asset>> {
        self.storage.list_assets(collection_id)
    }

    /// Event record at `sequence`
    pub fn event(&self, sequence: u64) -> Result<Option<TokenEvent>> {
        self.storage.get_event(sequence)
    }

    /// The full event log in sequence order
    pub fn events(&self) -> Result<Vec<TokenEvent>> {
        self.storage.all_events()
    }

    /// Event records touching an asset, in sequence order
    pub fn events_for_asset(&self, asset_id: u64) -> Result<Vec<TokenEvent>> {
        self.storage.events_for_asset(asset_id)
    }

    /// Event records involving a principal, in sequence order
    pub fn events_for_principal(&self, principal: &Principal) -> Result<Vec<TokenEvent>> {
        self.storage.events_for_principal(principal)
    }

    /// Check supply conservation for one asset: the sum of all balance
    /// rows must equal the recorded supply
    pub fn check_supply_conservation(&self, asset_id: u64) -> Result<bool> {
        let asset = self
            .storage
            .get_asset(asset_id)?
            .ok_or_else(|| Error::AssetNotFound("unable to find asset".to_string()))?;
        Ok(self.storage.sum_balances(asset_id)? == i128::from(asset.supply))
    }

    /// Verify the hash chain over the full event log
    pub fn verify_audit_chain(&self) -> Result<()> {
        let events = self.storage.all_events()?;
        audit::verify_chain(&events, self.storage.head_hash()?)
    }

    /// Storage-level counters
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    /// Metrics registry and counters for this ledger
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration the ledger was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stop the writer actor; commands already queued are processed first
    pub async fn shutdown(self) -> Result<()> {
        tracing::info!("Ledger shutting down");
        self.handle.shutdown().await
    }
}
