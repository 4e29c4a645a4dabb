// Storage module for the UTXO cache node
//
// Builds the token store the cache backfills from and loads seed files into
// it.

pub mod sql_storage;

use crate::config::{StorageConfig, StorageEngine};
use crate::error::{NodeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use utxo_token_cache::{MemoryTokenStore, Token, TokenPoolKey, TokenStore};

pub use sql_storage::SqliteTokenStore;

/// Tokens to load into one pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSeed {
    pub pool_key: TokenPoolKey,
    pub tokens: Vec<Token>,
}

/// Create the token store selected by the configuration
pub fn create_token_store(config: &StorageConfig) -> Result<Arc<dyn TokenStore>> {
    match config.engine {
        StorageEngine::Sqlite => {
            info!(
                "Using SQLite token store at {}",
                config.database_path.display()
            );
            let store = SqliteTokenStore::new(&config.database_path);
            store.initialize_schema()?;
            Ok(Arc::new(store))
        }
        StorageEngine::Memory => {
            info!("Using in-memory token store");
            Ok(Arc::new(MemoryTokenStore::new()))
        }
    }
}

/// Read a JSON array of `PoolSeed`s
pub fn read_seed_file(path: &Path) -> Result<Vec<PoolSeed>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Load seed pools into the configured SQLite store. Returns tokens written.
pub async fn seed_token_store(config: &StorageConfig, seeds: Vec<PoolSeed>) -> Result<usize> {
    if config.engine != StorageEngine::Sqlite {
        return Err(NodeError::Config(
            "seeding requires the sqlite storage engine".to_string(),
        ));
    }

    let store = SqliteTokenStore::new(&config.database_path);
    store.initialize_schema()?;

    let mut written = 0;
    for seed in seeds {
        written += store.insert_tokens(&seed.pool_key, seed.tokens).await?;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_seed_file_into_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let seed_path = dir.path().join("tokens.json");
        std::fs::write(
            &seed_path,
            r#"[{
                "pool_key": {
                    "holder_id": "alice",
                    "token_type": "cash",
                    "issuer_hash": "issuer",
                    "notary_name": "notary",
                    "symbol": "USD"
                },
                "tokens": [
                    { "state_ref": "tx1:0", "amount": "12.50", "tag": "gold" },
                    { "state_ref": "tx1:1", "amount": "3" }
                ]
            }]"#,
        )
        .unwrap();

        let config = StorageConfig {
            engine: StorageEngine::Sqlite,
            database_path: dir.path().join("tokens.db"),
        };
        let seeds = read_seed_file(&seed_path).unwrap();
        assert_eq!(seed_token_store(&config, seeds).await.unwrap(), 2);

        let store = create_token_store(&config).unwrap();
        let key = TokenPoolKey::new("alice", "cash", "issuer", "notary", "USD").unwrap();
        let tokens = store.fetch_unspent_tokens(&key).await.unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].amount(), dec!(12.50));
        assert_eq!(tokens[0].tag(), Some("gold"));
    }

    #[tokio::test]
    async fn test_seed_rejects_memory_engine() {
        let config = StorageConfig {
            engine: StorageEngine::Memory,
            database_path: "unused.db".into(),
        };
        let err = seed_token_store(&config, Vec::new()).await.unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }
}
