//! Token store interface
//!
//! The durable store is the source of truth for which tokens are unspent. The
//! cache only reads from it, once per pool lifetime or after an invalidation.

use crate::error::{Result, TokenCacheError};
use crate::types::{Token, TokenPoolKey};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Source of the unspent-token set used to backfill a pool.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Fetch every unspent token of `pool_key`.
    ///
    /// An error leaves the pool un-backfilled; the next event for the pool
    /// retries.
    async fn fetch_unspent_tokens(&self, pool_key: &TokenPoolKey) -> Result<Vec<Token>>;
}

/// In-memory token store.
///
/// Backs the `memory` storage engine and the test suites. Cloning shares the
/// underlying maps.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    pools: Arc<DashMap<TokenPoolKey, BTreeMap<String, Token>>>,
    fetch_count: Arc<AtomicU64>,
    fail_fetches: Arc<AtomicBool>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert tokens into a pool
    pub fn insert_tokens(&self, pool_key: &TokenPoolKey, tokens: Vec<Token>) {
        let mut pool = self.pools.entry(pool_key.clone()).or_default();
        for token in tokens {
            pool.insert(token.state_ref().to_string(), token);
        }
    }

    /// Delete tokens from a pool, ignoring unknown refs
    pub fn remove_tokens<'a, I>(&self, pool_key: &TokenPoolKey, state_refs: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        if let Some(mut pool) = self.pools.get_mut(pool_key) {
            for state_ref in state_refs {
                pool.remove(state_ref);
            }
        }
    }

    /// Number of fetches served, successful or not
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Make subsequent fetches fail, to exercise backfill error handling
    pub fn set_failing(&self, failing: bool) {
        self.fail_fetches.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn fetch_unspent_tokens(&self, pool_key: &TokenPoolKey) -> Result<Vec<Token>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(TokenCacheError::persistence(format!(
                "token store unavailable for pool {}",
                pool_key
            )));
        }

        Ok(self
            .pools
            .get(pool_key)
            .map(|pool| pool.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_memory_store_fetch() {
        let store = MemoryTokenStore::new();
        let key = TokenPoolKey::new("alice", "cash", "issuer", "notary", "USD").unwrap();
        let other = TokenPoolKey::new("bob", "cash", "issuer", "notary", "USD").unwrap();

        store.insert_tokens(&key, vec![Token::new("a", dec!(1)), Token::new("b", dec!(2))]);
        store.remove_tokens(&key, &vec!["a".to_string()]);

        let tokens = store.fetch_unspent_tokens(&key).await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].state_ref(), "b");

        assert!(store.fetch_unspent_tokens(&other).await.unwrap().is_empty());
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_memory_store_failure() {
        let store = MemoryTokenStore::new();
        let key = TokenPoolKey::new("alice", "cash", "issuer", "notary", "USD").unwrap();
        store.set_failing(true);

        let err = store.fetch_unspent_tokens(&key).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
