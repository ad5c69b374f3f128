//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `nft_ledger_collections_created_total` - Collections created
//! - `nft_ledger_assets_created_total` - Assets created
//! - `nft_ledger_mints_total` - Successful mints
//! - `nft_ledger_burns_total` - Successful burns
//! - `nft_ledger_transfers_total` - Successful transfers
//! - `nft_ledger_failed_operations_total` - Rejected operations
//! - `nft_ledger_operation_duration_seconds` - Operation latency histogram
//!
//! Everything registers in a collector-local registry, so multiple ledgers
//! (and test runs) can coexist in one process.

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Collections created
    pub collections_created: IntCounter,

    /// Assets created
    pub assets_created: IntCounter,

    /// Successful mints
    pub mints_total: IntCounter,

    /// Successful burns
    pub burns_total: IntCounter,

    /// Successful transfers
    pub transfers_total: IntCounter,

    /// Operations rejected by validation
    pub failed_operations: IntCounter,

    /// Operation duration histogram
    pub operation_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let collections_created = IntCounter::new(
            "nft_ledger_collections_created_total",
            "Collections created",
        )?;
        registry.register(Box::new(collections_created.clone()))?;

        let assets_created =
            IntCounter::new("nft_ledger_assets_created_total", "Assets created")?;
        registry.register(Box::new(assets_created.clone()))?;

        let mints_total = IntCounter::new("nft_ledger_mints_total", "Successful mints")?;
        registry.register(Box::new(mints_total.clone()))?;

        let burns_total = IntCounter::new("nft_ledger_burns_total", "Successful burns")?;
        registry.register(Box::new(burns_total.clone()))?;

        let transfers_total =
            IntCounter::new("nft_ledger_transfers_total", "Successful transfers")?;
        registry.register(Box::new(transfers_total.clone()))?;

        let failed_operations = IntCounter::new(
            "nft_ledger_failed_operations_total",
            "Operations rejected by validation",
        )?;
        registry.register(Box::new(failed_operations.clone()))?;

        let operation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "nft_ledger_operation_duration_seconds",
                "Histogram of operation latencies",
            )
            .buckets(vec![
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0,
            ]),
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            collections_created,
            assets_created,
            mints_total,
            burns_total,
            transfers_total,
            failed_operations,
            operation_duration,
            registry,
        })
    }

    /// Record a successful collection creation
    pub fn record_collection_created(&self) {
        self.collections_created.inc();
    }

    /// Record a successful asset creation
    pub fn record_asset_created(&self) {
        self.assets_created.inc();
    }

    /// Record a successful mint
    pub fn record_mint(&self) {
        self.mints_total.inc();
    }

    /// Record a successful burn
    pub fn record_burn(&self) {
        self.burns_total.inc();
    }

    /// Record a successful transfer
    pub fn record_transfer(&self) {
        self.transfers_total.inc();
    }

    /// Record a rejected operation
    pub fn record_failure(&self) {
        self.failed_operations.inc();
    }

    /// Record operation duration
    pub fn record_operation_duration(&self, duration_seconds: f64) {
        self.operation_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
