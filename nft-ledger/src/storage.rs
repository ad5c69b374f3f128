//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `collections` - Collection records (key: collection_id, big-endian)
//! - `assets` - Asset records (key: asset_id, big-endian)
//! - `balances` - Balance rows (key: owner | asset_id); rows at zero are
//!   deleted, never stored
//! - `events` - Append-only event log (key: sequence, big-endian)
//! - `indices` - Secondary indices for per-asset and per-principal event
//!   lookups
//! - `meta` - Id allocators, event sequence counter, audit chain head
//!
//! All writes go through [`Storage::commit`], which applies the entire
//! write set of one operation in a single `WriteBatch`. There is no way to
//! persist half an operation.

use crate::{
    audit,
    error::{Error, Result},
    types::{Asset, Balance, Collection, Principal, TokenEvent},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, DB,
};
use std::sync::Arc;

/// Column family names
const CF_COLLECTIONS: &str = "collections";
const CF_ASSETS: &str = "assets";
const CF_BALANCES: &str = "balances";
const CF_EVENTS: &str = "events";
const CF_INDICES: &str = "indices";
const CF_META: &str = "meta";

/// Meta keys
const META_NEXT_COLLECTION_ID: &[u8] = b"next_collection_id";
const META_NEXT_ASSET_ID: &[u8] = b"next_asset_id";
const META_EVENT_SEQ: &[u8] = b"event_seq";
const META_HEAD_HASH: &[u8] = b"head_hash";

/// Index key tags (the `indices` family holds both index kinds)
const IDX_ASSET_TAG: u8 = b'a';
const IDX_PRINCIPAL_TAG: u8 = b'p';

/// Write set of one operation, committed atomically
///
/// Built by the operations layer after validation; a commit applies either
/// all of it or none of it.
#[derive(Debug, Default)]
pub struct StateChanges {
    /// Collection records to put
    pub collections: Vec<Collection>,

    /// Asset records to put
    pub assets: Vec<Asset>,

    /// Balance rows to put (quantity always positive)
    pub balance_puts: Vec<Balance>,

    /// Balance rows to delete (quantity reached zero)
    pub balance_deletes: Vec<(Principal, u64)>,

    /// New value of the collection id allocator, if it advanced
    pub next_collection_id: Option<u64>,

    /// New value of the asset id allocator, if it advanced
    pub next_asset_id: Option<u64>,

    /// Events to append, in sequence order with `prev_hash` already chained
    pub events: Vec<TokenEvent>,
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        db_opts.set_level_zero_file_num_compaction_trigger(
            config.rocksdb.level0_file_num_compaction_trigger,
        );

        // Universal compaction for an append-heavy workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_COLLECTIONS, Self::cf_options_collections()),
            ColumnFamilyDescriptor::new(CF_ASSETS, Self::cf_options_assets()),
            ColumnFamilyDescriptor::new(CF_BALANCES, Self::cf_options_balances()),
            ColumnFamilyDescriptor::new(CF_EVENTS, Self::cf_options_events()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_META, Self::cf_options_meta()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = %path.display(), "Opened RocksDB with 6 column families");

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_collections() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_assets() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_balances() -> Options {
        let mut opts = Options::default();
        // Balances are the hot read path, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_events() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Indices benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_options_meta() -> Options {
        Options::default()
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Key helpers

    fn balance_key(owner: &Principal, asset_id: u64) -> Vec<u8> {
        let mut key = owner.as_bytes().to_vec();
        key.push(b'|');
        key.extend_from_slice(&asset_id.to_be_bytes());
        key
    }

    fn balance_prefix(owner: &Principal) -> Vec<u8> {
        let mut key = owner.as_bytes().to_vec();
        key.push(b'|');
        key
    }

    fn index_key_asset_event(asset_id: u64, sequence: u64) -> Vec<u8> {
        let mut key = vec![IDX_ASSET_TAG];
        key.extend_from_slice(&asset_id.to_be_bytes());
        key.extend_from_slice(&sequence.to_be_bytes());
        key
    }

    fn index_prefix_asset(asset_id: u64) -> Vec<u8> {
        let mut key = vec![IDX_ASSET_TAG];
        key.extend_from_slice(&asset_id.to_be_bytes());
        key
    }

    fn index_key_principal_event(principal: &Principal, sequence: u64) -> Vec<u8> {
        let mut key = vec![IDX_PRINCIPAL_TAG];
        key.extend_from_slice(principal.as_bytes());
        key.push(b'|');
        key.extend_from_slice(&sequence.to_be_bytes());
        key
    }

    fn index_prefix_principal(principal: &Principal) -> Vec<u8> {
        let mut key = vec![IDX_PRINCIPAL_TAG];
        key.extend_from_slice(principal.as_bytes());
        key.push(b'|');
        key
    }

    // Meta counters

    fn meta_u64(&self, key: &[u8], default: u64) -> Result<u64> {
        let cf = self.cf_handle(CF_META)?;
        match self.db.get_cf(cf, key)? {
            Some(value) => {
                if value.len() != 8 {
                    return Err(Error::Storage(format!(
                        "Corrupt meta value for {}",
                        String::from_utf8_lossy(key)
                    )));
                }
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&value);
                Ok(u64::from_be_bytes(bytes))
            }
            None => Ok(default),
        }
    }

    /// Next collection id to allocate (ids start at 1, never reused)
    pub fn next_collection_id(&self) -> Result<u64> {
        self.meta_u64(META_NEXT_COLLECTION_ID, 1)
    }

    /// Next asset id to allocate (ids start at 1, never reused)
    pub fn next_asset_id(&self) -> Result<u64> {
        self.meta_u64(META_NEXT_ASSET_ID, 1)
    }

    /// Next event sequence to assign
    pub fn next_event_sequence(&self) -> Result<u64> {
        self.meta_u64(META_EVENT_SEQ, 0)
    }

    /// Current audit chain head
    pub fn head_hash(&self) -> Result<[u8; 32]> {
        let cf = self.cf_handle(CF_META)?;
        match self.db.get_cf(cf, META_HEAD_HASH)? {
            Some(value) => {
                if value.len() != 32 {
                    return Err(Error::Storage("Corrupt audit chain head".to_string()));
                }
                let mut hash = [0u8; 32];
                hash.copy_from_slice(&value);
                Ok(hash)
            }
            None => Ok(audit::GENESIS_HASH),
        }
    }

    // Record reads

    /// Get collection by id
    pub fn get_collection(&self, collection_id: u64) -> Result<Option<Collection>> {
        let cf = self.cf_handle(CF_COLLECTIONS)?;
        match self.db.get_cf(cf, collection_id.to_be_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Get asset by id
    pub fn get_asset(&self, asset_id: u64) -> Result<Option<Asset>> {
        let cf = self.cf_handle(CF_ASSETS)?;
        match self.db.get_cf(cf, asset_id.to_be_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Get one owner's balance row for an asset (absent means zero)
    pub fn get_balance(&self, owner: &Principal, asset_id: u64) -> Result<Option<Balance>> {
        let cf = self.cf_handle(CF_BALANCES)?;
        match self.db.get_cf(cf, Self::balance_key(owner, asset_id))? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// All balance rows of one owner, ascending by asset id
    pub fn balances_of(&self, owner: &Principal) -> Result<Vec<Balance>> {
        let cf = self.cf_handle(CF_BALANCES)?;
        let prefix = Self::balance_prefix(owner);
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut balances = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            balances.push(bincode::deserialize(&value)?);
        }

        Ok(balances)
    }

    /// All collections, ascending by id
    pub fn list_collections(&self) -> Result<Vec<Collection>> {
        let cf = self.cf_handle(CF_COLLECTIONS)?;
        let iter = self.db.iterator_cf(cf, IteratorMode::Start);

        let mut collections = Vec::new();
        for item in iter {
            let (_, value) = item?;
            collections.push(bincode::deserialize(&value)?);
        }

        Ok(collections)
    }

    /// All assets belonging to one collection, ascending by id
    pub fn list_assets(&self, collection_id: u64) -> Result<Vec<Asset>> {
        let cf = self.cf_handle(CF_ASSETS)?;
        let iter = self.db.iterator_cf(cf, IteratorMode::Start);

        let mut assets = Vec::new();
        for item in iter {
            let (_, value) = item?;
            let asset: Asset = bincode::deserialize(&value)?;
            if asset.collection_id == collection_id {
                assets.push(asset);
            }
        }

        Ok(assets)
    }

    /// Sum of all balance rows for an asset
    ///
    /// Widened to i128 so the audit never overflows regardless of how the
    /// supply is split.
    pub fn sum_balances(&self, asset_id: u64) -> Result<i128> {
        let cf = self.cf_handle(CF_BALANCES)?;
        let iter = self.db.iterator_cf(cf, IteratorMode::Start);

        let mut sum: i128 = 0;
        for item in iter {
            let (_, value) = item?;
            let balance: Balance = bincode::deserialize(&value)?;
            if balance.asset_id == asset_id {
                sum += i128::from(balance.quantity);
            }
        }

        Ok(sum)
    }

    // Event log reads

    /// Get event by sequence number
    pub fn get_event(&self, sequence: u64) -> Result<Option<TokenEvent>> {
        let cf = self.cf_handle(CF_EVENTS)?;
        match self.db.get_cf(cf, sequence.to_be_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// The full event log in sequence order
    pub fn all_events(&self) -> Result<Vec<TokenEvent>> {
        let cf = self.cf_handle(CF_EVENTS)?;
        let iter = self.db.iterator_cf(cf, IteratorMode::Start);

        let mut events = Vec::new();
        for item in iter {
            let (_, value) = item?;
            events.push(bincode::deserialize(&value)?);
        }

        Ok(events)
    }

    /// Events touching one asset, in sequence order (via index)
    pub fn events_for_asset(&self, asset_id: u64) -> Result<Vec<TokenEvent>> {
        let prefix = Self::index_prefix_asset(asset_id);
        self.events_by_index_prefix(&prefix)
    }

    /// Events in which one principal participated, in sequence order (via
    /// index)
    pub fn events_for_principal(&self, principal: &Principal) -> Result<Vec<TokenEvent>> {
        let prefix = Self::index_prefix_principal(principal);
        self.events_by_index_prefix(&prefix)
    }

    fn events_by_index_prefix(&self, prefix: &[u8]) -> Result<Vec<TokenEvent>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut events = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            if key.len() != prefix.len() + 8 {
                continue;
            }

            let mut seq_bytes = [0u8; 8];
            seq_bytes.copy_from_slice(&key[prefix.len()..]);
            let sequence = u64::from_be_bytes(seq_bytes);

            if let Some(event) = self.get_event(sequence)? {
                events.push(event);
            }
        }

        Ok(events)
    }

    // Atomic commit

    /// Apply one operation's write set in a single atomic batch
    ///
    /// Events carry their final sequence and chained `prev_hash`; the
    /// sequence counter and chain head in `meta` advance in the same batch.
    pub fn commit(&self, changes: &StateChanges) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_collections = self.cf_handle(CF_COLLECTIONS)?;
        for collection in &changes.collections {
            let value = bincode::serialize(collection)?;
            batch.put_cf(cf_collections, collection.collection_id.to_be_bytes(), &value);
        }

        let cf_assets = self.cf_handle(CF_ASSETS)?;
        for asset in &changes.assets {
            let value = bincode::serialize(asset)?;
            batch.put_cf(cf_assets, asset.asset_id.to_be_bytes(), &value);
        }

        let cf_balances = self.cf_handle(CF_BALANCES)?;
        for balance in &changes.balance_puts {
            let value = bincode::serialize(balance)?;
            batch.put_cf(
                cf_balances,
                Self::balance_key(&balance.owner, balance.asset_id),
                &value,
            );
        }
        for (owner, asset_id) in &changes.balance_deletes {
            batch.delete_cf(cf_balances, Self::balance_key(owner, *asset_id));
        }

        let cf_meta = self.cf_handle(CF_META)?;
        if let Some(next) = changes.next_collection_id {
            batch.put_cf(cf_meta, META_NEXT_COLLECTION_ID, next.to_be_bytes());
        }
        if let Some(next) = changes.next_asset_id {
            batch.put_cf(cf_meta, META_NEXT_ASSET_ID, next.to_be_bytes());
        }

        let cf_events = self.cf_handle(CF_EVENTS)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;
        for event in &changes.events {
            let value = bincode::serialize(event)?;
            batch.put_cf(cf_events, event.sequence.to_be_bytes(), &value);

            if let Some(asset_id) = event.kind.asset_id() {
                let idx_asset = Self::index_key_asset_event(asset_id, event.sequence);
                batch.put_cf(cf_indices, &idx_asset, &[]);
            }
            for principal in event.kind.participants() {
                let idx_principal = Self::index_key_principal_event(principal, event.sequence);
                batch.put_cf(cf_indices, &idx_principal, &[]);
            }
        }
        if let Some(last) = changes.events.last() {
            batch.put_cf(cf_meta, META_EVENT_SEQ, (last.sequence + 1).to_be_bytes());
            batch.put_cf(cf_meta, META_HEAD_HASH, audit::hash_event(last));
        }

        self.db.write(batch)?;

        tracing::debug!(
            events = changes.events.len(),
            balance_puts = changes.balance_puts.len(),
            balance_deletes = changes.balance_deletes.len(),
            "State changes committed"
        );

        Ok(())
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        let cf_collections = self.cf_handle(CF_COLLECTIONS)?;
        let cf_assets = self.cf_handle(CF_ASSETS)?;

        let total_collections = self.approximate_count(cf_collections)?;
        let total_assets = self.approximate_count(cf_assets)?;
        let total_events = self.next_event_sequence()?;

        Ok(StorageStats {
            total_collections,
            total_assets,
            total_events,
        })
    }

    fn approximate_count(&self, cf: &ColumnFamily) -> Result<u64> {
        // RocksDB property for approximate count
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub total_collections: u64,
    pub total_assets: u64,
    pub total_events: u64,
}
