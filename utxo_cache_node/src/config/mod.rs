// Configuration module for the UTXO cache node
//
// Settings come from an optional TOML file, then environment variables
// prefixed `UTXO_CACHE` with `__` between path segments, e.g.
// `UTXO_CACHE__API__PORT=9000`.

use crate::error::{NodeError, Result};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use utxo_token_cache::dispatcher::DEFAULT_QUEUE_DEPTH;
use utxo_token_cache::{CacheSettings, SelectionStrategy};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "UTXO_CACHE";

/// Cache node configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// API configuration
    pub api: ApiConfig,
    /// Token store configuration
    pub storage: StorageConfig,
    /// Token selection configuration
    pub selection: SelectionConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// API configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// IP address to bind the API server to
    pub bind_address: String,
    /// Port number for the API server
    pub port: u16,
}

/// Backing store for pool backfill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageEngine {
    Sqlite,
    Memory,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub engine: StorageEngine,
    /// SQLite database file, used by the `sqlite` engine
    pub database_path: PathBuf,
}

/// Selection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Strategy applied when a claim query names none
    pub default_strategy: SelectionStrategy,
    /// Per-pool queue depth
    pub queue_depth: usize,
    /// Fixed seed for the random strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    pub level: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            engine: StorageEngine::Sqlite,
            database_path: PathBuf::from("data/tokens.db"),
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            default_strategy: SelectionStrategy::LargestFirst,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            rng_seed: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ApiConfig {
    /// Socket address the API server listens on
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| NodeError::Config(format!("Invalid API address: {}", e)))
    }
}

impl SelectionConfig {
    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            default_strategy: self.default_strategy,
            queue_depth: self.queue_depth,
            rng_seed: self.rng_seed,
        }
    }
}

impl NodeConfig {
    /// Load configuration from an optional file plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize::<NodeConfig>()?)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}
