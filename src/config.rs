//! Engine configuration
//!
//! Loaded from a JSON file:
//!
//! ```json
//! {
//!   "cache_policy": "retain",
//!   "scan_floor": 0,
//!   "read_chunk_size": 4096
//! }
//! ```
//!
//! Every field is optional; missing fields take the defaults shown.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::blocks::{BlockError, BlockResult};
use crate::store::{DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE};

/// What the engine does with decoded blocks between operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Keep decoded blocks across calls; cleared when consolidation appends
    #[default]
    Retain,
    /// Never cache; every scan decodes from the store
    Discard,
}

/// Configuration for a [`crate::blocks::Blocks`] engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocksConfig {
    /// Decode cache policy (default: retain)
    #[serde(default)]
    pub cache_policy: CachePolicy,

    /// Scans stop at this store offset (default: 0, the start of the store)
    #[serde(default)]
    pub scan_floor: u64,

    /// Bytes per backward read of the file store opened by
    /// [`crate::blocks::Blocks::open`] (default: 4096). Stores handed to
    /// `Blocks::with_config` keep their own chunk size.
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
}

fn default_read_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for BlocksConfig {
    fn default() -> Self {
        Self {
            cache_policy: CachePolicy::default(),
            scan_floor: 0,
            read_chunk_size: default_read_chunk_size(),
        }
    }
}

impl BlocksConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> BlockResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BlockError::invalid_argument(format!(
                "Failed to read config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&content)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json_str(content: &str) -> BlockResult<Self> {
        let config: BlocksConfig = serde_json::from_str(content)
            .map_err(|e| BlockError::invalid_argument(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the cache policy.
    pub fn with_cache_policy(mut self, cache_policy: CachePolicy) -> Self {
        self.cache_policy = cache_policy;
        self
    }

    /// Set the scan floor.
    pub fn with_scan_floor(mut self, scan_floor: u64) -> Self {
        self.scan_floor = scan_floor;
        self
    }

    /// Validate field ranges
    pub fn validate(&self) -> BlockResult<()> {
        if self.read_chunk_size < MIN_CHUNK_SIZE {
            return Err(BlockError::invalid_argument(format!(
                "read_chunk_size must be at least {}, got {}",
                MIN_CHUNK_SIZE, self.read_chunk_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockErrorCode;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = BlocksConfig::default();
        assert_eq!(config.cache_policy, CachePolicy::Retain);
        assert_eq!(config.scan_floor, 0);
        assert_eq!(config.read_chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = BlocksConfig::from_json_str("{}").unwrap();
        assert_eq!(config, BlocksConfig::default());
    }

    #[test]
    fn test_parse_all_fields() {
        let config = BlocksConfig::from_json_str(
            r#"{"cache_policy": "discard", "scan_floor": 128, "read_chunk_size": 512}"#,
        )
        .unwrap();

        assert_eq!(config.cache_policy, CachePolicy::Discard);
        assert_eq!(config.scan_floor, 128);
        assert_eq!(config.read_chunk_size, 512);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let err = BlocksConfig::from_json_str(r#"{"cache_policy": "sometimes"}"#).unwrap_err();
        assert_eq!(err.code(), BlockErrorCode::BlockInvalidArgument);
    }

    #[test]
    fn test_tiny_chunk_rejected() {
        let err = BlocksConfig::from_json_str(r#"{"read_chunk_size": 1}"#).unwrap_err();
        assert!(err.message().contains("read_chunk_size"));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blocklog.json");
        fs::write(&path, r#"{"cache_policy": "discard"}"#).unwrap();

        let config = BlocksConfig::load(&path).unwrap();
        assert_eq!(config.cache_policy, CachePolicy::Discard);

        assert!(BlocksConfig::load(&temp_dir.path().join("missing.json")).is_err());
    }
}
