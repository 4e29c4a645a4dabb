//! Token cache service
//!
//! Routes each event to the worker owning its pool. A worker is a tokio task
//! draining a bounded queue; it holds the pool's `PoolState` exclusively and
//! applies one event at a time, so two claim queries racing for the same
//! token are resolved purely by queue order. Different pools run in
//! parallel with no shared mutable state.
//!
//! Backfill happens inside the worker, before the event that triggered it,
//! so it never interleaves with the pool's other mutations.

use crate::cache::PoolState;
use crate::error::{Result, TokenCacheError};
use crate::handler::EventHandler;
use crate::persistence::TokenStore;
use crate::registry::{PoolCommand, PoolRegistry, PoolWorkerHandle};
use crate::selection::SelectionStrategy;
use crate::types::{
    BalanceQuery, BalanceResult, ClaimQuery, ClaimRelease, ClaimResult, ForceClaimRelease,
    InvalidateCache, LedgerChange, PoolStats, PoolStatsQuery, TokenPoolEvent, TokenPoolKey,
    TokenPoolResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Default depth of each pool worker's queue
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// Tunables for the cache service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Strategy for claim queries that do not name one
    pub default_strategy: SelectionStrategy,
    /// Events that may queue per pool before senders wait
    pub queue_depth: usize,
    /// Fixed seed for random selection; entropy when absent
    pub rng_seed: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_strategy: SelectionStrategy::default(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            rng_seed: None,
        }
    }
}

/// Entry point for requesters. Cloning shares the pools.
#[derive(Clone)]
pub struct TokenCacheService {
    registry: Arc<PoolRegistry>,
    store: Arc<dyn TokenStore>,
    handler: EventHandler,
    settings: CacheSettings,
}

impl TokenCacheService {
    /// Create a service backfilling from `store`.
    ///
    /// Must be used from within a tokio runtime; pool workers are spawned
    /// on first access.
    pub fn new(store: Arc<dyn TokenStore>, settings: CacheSettings) -> Self {
        Self {
            registry: Arc::new(PoolRegistry::new()),
            store,
            handler: EventHandler::new(settings.default_strategy),
            settings,
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Apply one event to its pool and wait for the result.
    pub async fn dispatch(&self, event: TokenPoolEvent) -> Result<TokenPoolResponse> {
        let pool_key = event.pool_key().clone();
        let handle = self.worker_for(&pool_key);

        let (reply, response) = oneshot::channel();
        if handle.send(PoolCommand { event, reply }).await.is_err() {
            self.registry.remove_if_closed(&pool_key);
            return Err(TokenCacheError::PoolUnavailable(format!(
                "worker for pool {} stopped",
                pool_key
            )));
        }

        response.await.map_err(|_| {
            TokenCacheError::PoolUnavailable(format!(
                "worker for pool {} dropped the request",
                pool_key
            ))
        })?
    }

    pub async fn claim(&self, query: ClaimQuery) -> Result<ClaimResult> {
        match self.dispatch(TokenPoolEvent::ClaimQuery(query)).await? {
            TokenPoolResponse::Claimed(result) => Ok(result),
            other => Err(unexpected_response("claim_query", &other)),
        }
    }

    pub async fn release(&self, release: ClaimRelease) -> Result<()> {
        self.dispatch(TokenPoolEvent::ClaimRelease(release))
            .await
            .map(|_| ())
    }

    pub async fn force_release(&self, release: ForceClaimRelease) -> Result<()> {
        self.dispatch(TokenPoolEvent::ForceClaimRelease(release))
            .await
            .map(|_| ())
    }

    pub async fn ledger_change(&self, change: LedgerChange) -> Result<()> {
        self.dispatch(TokenPoolEvent::LedgerChange(change))
            .await
            .map(|_| ())
    }

    pub async fn balance(&self, query: BalanceQuery) -> Result<BalanceResult> {
        match self.dispatch(TokenPoolEvent::BalanceQuery(query)).await? {
            TokenPoolResponse::Balance(result) => Ok(result),
            other => Err(unexpected_response("balance_query", &other)),
        }
    }

    pub async fn invalidate(&self, pool_key: TokenPoolKey) -> Result<()> {
        self.dispatch(TokenPoolEvent::InvalidateCache(InvalidateCache { pool_key }))
            .await
            .map(|_| ())
    }

    pub async fn stats(&self, query: PoolStatsQuery) -> Result<PoolStats> {
        match self.dispatch(TokenPoolEvent::PoolStats(query)).await? {
            TokenPoolResponse::Stats(stats) => Ok(stats),
            other => Err(unexpected_response("pool_stats", &other)),
        }
    }

    /// Number of pools with a live worker entry
    pub fn pool_count(&self) -> usize {
        self.registry.len()
    }

    pub fn pool_keys(&self) -> Vec<TokenPoolKey> {
        self.registry.pool_keys()
    }

    /// Stop accepting work for every pool. Workers finish queued events and
    /// exit; a later access starts a fresh, un-backfilled pool.
    pub fn shutdown(&self) {
        info!("Shutting down {} pool workers", self.registry.len());
        self.registry.clear();
    }

    fn worker_for(&self, pool_key: &TokenPoolKey) -> PoolWorkerHandle {
        self.registry.get_or_spawn(pool_key, || {
            let (sender, receiver) = mpsc::channel(self.settings.queue_depth.max(1));
            let state = match self.settings.rng_seed {
                Some(seed) => PoolState::with_seed(pool_key.clone(), seed),
                None => PoolState::new(pool_key.clone()),
            };
            info!(pool = %pool_key, "Starting pool worker");
            tokio::spawn(run_pool_worker(
                state,
                receiver,
                self.store.clone(),
                self.handler,
            ));
            PoolWorkerHandle::new(sender)
        })
    }
}

fn unexpected_response(kind: &str, response: &TokenPoolResponse) -> TokenCacheError {
    TokenCacheError::PoolUnavailable(format!(
        "unexpected response to {}: {:?}",
        kind, response
    ))
}

/// Pool worker loop. Exits when every sender is gone.
async fn run_pool_worker(
    mut state: PoolState,
    mut receiver: mpsc::Receiver<PoolCommand>,
    store: Arc<dyn TokenStore>,
    handler: EventHandler,
) {
    while let Some(PoolCommand { event, reply }) = receiver.recv().await {
        let result = process_event(&mut state, event, store.as_ref(), &handler).await;
        if reply.send(result).is_err() {
            debug!(pool = %state.pool_key(), "Requester went away before the result");
        }
    }
    debug!(pool = %state.pool_key(), "Pool worker stopped");
}

async fn process_event(
    state: &mut PoolState,
    event: TokenPoolEvent,
    store: &dyn TokenStore,
    handler: &EventHandler,
) -> Result<TokenPoolResponse> {
    if needs_backfill(&event) && !state.is_backfilled() {
        backfill(state, store).await?;
    }
    handler.handle(state, event)
}

/// Invalidation and stats work on whatever is cached; everything else needs
/// the store's view first.
fn needs_backfill(event: &TokenPoolEvent) -> bool {
    !matches!(
        event,
        TokenPoolEvent::InvalidateCache(_) | TokenPoolEvent::PoolStats(_)
    )
}

async fn backfill(state: &mut PoolState, store: &dyn TokenStore) -> Result<()> {
    match store.fetch_unspent_tokens(state.pool_key()).await {
        Ok(tokens) => {
            info!(
                pool = %state.pool_key(),
                token_count = tokens.len(),
                "Backfilled pool from token store"
            );
            state.complete_backfill(tokens);
            Ok(())
        }
        Err(e) => {
            warn!(pool = %state.pool_key(), error = %e, "Backfill failed");
            Err(e)
        }
    }
}
