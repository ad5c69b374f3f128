//! Configuration for the token ledger

use crate::types::Principal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Administrator principal (authorizes collection creation)
    pub admin: Principal,

    /// Bound of the writer mailbox (pending operations)
    pub mailbox_capacity: usize,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/nft-ledger"),
            service_name: "nft-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            admin: Principal::new("admin"),
            mailbox_capacity: 1000,
            rocksdb: RocksDBConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Target file size (MB)
    pub target_file_size_mb: u64,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Level 0 file num compaction trigger
    pub level0_file_num_compaction_trigger: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            target_file_size_mb: 64,
            max_background_jobs: 4,
            level0_file_num_compaction_trigger: 4,
            enable_statistics: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(admin) = std::env::var("LEDGER_ADMIN") {
            config.admin = Principal::new(admin);
        }

        if let Ok(capacity) = std::env::var("LEDGER_MAILBOX_CAPACITY") {
            config.mailbox_capacity = capacity.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid LEDGER_MAILBOX_CAPACITY: {}", e))
            })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "nft-ledger");
        assert_eq!(config.admin.as_str(), "admin");
        assert_eq!(config.mailbox_capacity, 1000);
        assert!(!config.rocksdb.enable_statistics);
    }

    #[test]
    fn test_parse_toml() {
        let raw = r#"
            data_dir = "/tmp/nft"
            service_name = "nft-ledger"
            service_version = "0.1.0"
            admin = "root"
            mailbox_capacity = 64

            [rocksdb]
            write_buffer_size_mb = 8
            max_write_buffer_number = 2
            target_file_size_mb = 8
            max_background_jobs = 2
            level0_file_num_compaction_trigger = 4
            enable_statistics = false
        "#;

        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/nft"));
        assert_eq!(config.admin.as_str(), "root");
        assert_eq!(config.mailbox_capacity, 64);
        assert_eq!(config.rocksdb.write_buffer_size_mb, 8);
    }
}
