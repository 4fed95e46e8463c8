//! Engine configuration
//!
//! Loaded from a JSON file. Every field except `data_dir` has a default.
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/stayindex",
//!   "cache": { "max_documents": 1000, "ttl_secs": 600 }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::index::{IndexError, IndexResult};

/// Cache tuning for one index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Max cached documents (default 1000)
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,

    /// Max cached field indices (default 100)
    #[serde(default = "default_max_field_indices")]
    pub max_field_indices: usize,

    /// Idle time before an entry expires (default 10 minutes)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Background sweep period (default 5 minutes)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_max_documents() -> usize {
    1000
}
fn default_max_field_indices() -> usize {
    100
}
fn default_ttl_secs() -> u64 {
    600
}
fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_documents: default_max_documents(),
            max_field_indices: default_max_field_indices(),
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Validate cache settings
    pub fn validate(&self) -> IndexResult<()> {
        if self.max_documents == 0 {
            return Err(IndexError::Configuration(
                "cache.max_documents must be > 0".to_string(),
            ));
        }
        if self.max_field_indices == 0 {
            return Err(IndexError::Configuration(
                "cache.max_field_indices must be > 0".to_string(),
            ));
        }
        if self.ttl_secs == 0 {
            return Err(IndexError::Configuration(
                "cache.ttl_secs must be > 0".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(IndexError::Configuration(
                "cache.sweep_interval_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root directory holding one subdirectory per index (required)
    pub data_dir: PathBuf,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl EngineConfig {
    /// Defaults rooted at `data_dir`
    pub fn default_for(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache: CacheConfig::default(),
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> IndexResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            IndexError::Configuration(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| IndexError::Configuration(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Write configuration to file
    pub fn save(&self, path: &Path) -> IndexResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| IndexError::Configuration(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
        }
        fs::write(path, json).map_err(|e| IndexError::io(path, e))
    }

    /// Validate configuration
    pub fn validate(&self) -> IndexResult<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(IndexError::Configuration("data_dir must not be empty".to_string()));
        }
        self.cache.validate()
    }
}
