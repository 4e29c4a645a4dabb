// SQLite token store
//
// Unspent tokens keyed by (canonical pool key, state ref). Amounts are kept
// in scaled-integer form: the unscaled value as a big-endian two's
// complement BLOB and the scale as an INTEGER.

use crate::error::{NodeError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use utxo_token_cache::codec::ScaledDecimal;
use utxo_token_cache::{Token, TokenCacheError, TokenPoolKey, TokenStore};

/// Token store backed by a SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteTokenStore {
    db_path: PathBuf,
}

impl SqliteTokenStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Create the database file and tables if they don't exist.
    ///
    /// Must be called before the store is used.
    pub fn initialize_schema(&self) -> Result<()> {
        debug!("Initializing SQLite token store schema at {:?}", self.db_path);

        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS unspent_tokens (
                pool_key TEXT NOT NULL,
                state_ref TEXT NOT NULL,
                unscaled_value BLOB NOT NULL,
                scale INTEGER NOT NULL,
                tag TEXT,
                owner_hash TEXT,
                PRIMARY KEY (pool_key, state_ref)
            )",
            [],
        )?;

        Ok(())
    }

    /// Upsert tokens into a pool. Returns the number of rows written.
    pub async fn insert_tokens(&self, pool_key: &TokenPoolKey, tokens: Vec<Token>) -> Result<usize> {
        let db_path = self.db_path.clone();
        let pool = pool_key.canonical();

        let written = tokio::task::spawn_blocking(move || -> Result<usize> {
            let mut conn = Connection::open(&db_path)?;
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO unspent_tokens
                        (pool_key, state_ref, unscaled_value, scale, tag, owner_hash)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for token in &tokens {
                    let amount = ScaledDecimal::from_decimal(token.amount());
                    stmt.execute(params![
                        pool,
                        token.state_ref(),
                        amount.unscaled_value,
                        amount.scale,
                        token.tag(),
                        token.owner_hash(),
                    ])?;
                }
            }
            tx.commit()?;
            Ok(tokens.len())
        })
        .await
        .map_err(|e| NodeError::Database(format!("Task panicked: {}", e)))??;

        info!(pool = %pool_key, written, "Stored tokens");
        Ok(written)
    }

    fn load_pool(db_path: &Path, pool: &str) -> Result<Vec<Token>> {
        let conn = Connection::open(db_path)?;
        let mut stmt = conn.prepare(
            "SELECT state_ref, unscaled_value, scale, tag, owner_hash
             FROM unspent_tokens WHERE pool_key = ?1 ORDER BY state_ref",
        )?;

        let rows = stmt.query_map(params![pool], |row| {
            Ok((
                row.get::<_, String>(0)?,
                ScaledDecimal {
                    unscaled_value: row.get(1)?,
                    scale: row.get(2)?,
                },
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut tokens = Vec::new();
        for row in rows {
            let (state_ref, amount, tag, owner_hash) = row?;
            let mut token = Token::new(state_ref, amount.to_decimal()?);
            if let Some(tag) = tag {
                token = token.with_tag(tag);
            }
            if let Some(owner_hash) = owner_hash {
                token = token.with_owner_hash(owner_hash);
            }
            tokens.push(token);
        }
        Ok(tokens)
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn fetch_unspent_tokens(&self, pool_key: &TokenPoolKey) -> utxo_token_cache::Result<Vec<Token>> {
        let db_path = self.db_path.clone();
        let pool = pool_key.canonical();

        let result = tokio::task::spawn_blocking(move || Self::load_pool(&db_path, &pool))
            .await
            .map_err(|e| TokenCacheError::persistence(format!("Task failed: {}", e)))?;

        result.map_err(|e| match e {
            NodeError::Cache(inner) => inner,
            other => TokenCacheError::persistence(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn key(holder: &str) -> TokenPoolKey {
        TokenPoolKey::new(holder, "cash", "issuer", "notary", "USD").unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTokenStore::new(dir.path().join("db").join("tokens.db"));
        store.initialize_schema().unwrap();

        let alice = key("alice");
        store
            .insert_tokens(
                &alice,
                vec![
                    Token::new("b", dec!(-0.25)),
                    Token::new("a", dec!(1000.50)).with_tag("gold").with_owner_hash("o1"),
                ],
            )
            .await
            .unwrap();
        store
            .insert_tokens(&key("bob"), vec![Token::new("c", dec!(3))])
            .await
            .unwrap();

        let tokens = store.fetch_unspent_tokens(&alice).await.unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].state_ref(), "a");
        assert_eq!(tokens[0].amount(), dec!(1000.50));
        assert_eq!(tokens[0].amount().scale(), 2);
        assert_eq!(tokens[0].tag(), Some("gold"));
        assert_eq!(tokens[0].owner_hash(), Some("o1"));
        assert_eq!(tokens[1].amount(), dec!(-0.25));
        assert_eq!(tokens[1].tag(), None);
    }

    #[tokio::test]
    async fn test_upsert_replaces_amount() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTokenStore::new(dir.path().join("tokens.db"));
        store.initialize_schema().unwrap();

        let alice = key("alice");
        store
            .insert_tokens(&alice, vec![Token::new("a", dec!(1)), Token::new("b", dec!(2))])
            .await
            .unwrap();
        store
            .insert_tokens(&alice, vec![Token::new("a", dec!(5))])
            .await
            .unwrap();

        let tokens = store.fetch_unspent_tokens(&alice).await.unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].amount(), dec!(5));
        assert_eq!(tokens[1].amount(), dec!(2));
    }

    #[tokio::test]
    async fn test_missing_schema_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTokenStore::new(dir.path().join("empty.db"));

        let err = store.fetch_unspent_tokens(&key("alice")).await.unwrap_err();
        assert!(matches!(err, TokenCacheError::Persistence(_)));
        assert!(err.is_retryable());
    }
}
