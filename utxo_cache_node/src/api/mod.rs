// API module for the UTXO cache node
//
// HTTP front end over `TokenCacheService`. Each request becomes one pool
// event; the JSON bodies are the event structures themselves.

use crate::error::{NodeError, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;
use utxo_token_cache::TokenCacheService;

pub mod handlers;

/// Shared state handed to every handler
pub struct AppState {
    /// Pool dispatcher
    pub service: TokenCacheService,
    /// Identifier of this node process, regenerated on every start
    pub instance_id: String,
    /// Start time, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: TokenCacheService) -> Self {
        Self {
            service,
            instance_id: uuid::Uuid::new_v4().to_string(),
            started_at: Instant::now(),
        }
    }
}

/// Build the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/status", get(handlers::status))
        // Claims
        .route("/api/v1/claims", post(handlers::claim_tokens))
        .route("/api/v1/claims/release", post(handlers::release_claim))
        .route("/api/v1/claims/force-release", post(handlers::force_release_claim))
        // Ledger notifications
        .route("/api/v1/ledger-changes", post(handlers::ledger_change))
        // Queries and pool maintenance
        .route("/api/v1/balance", post(handlers::balance))
        .route("/api/v1/pools/invalidate", post(handlers::invalidate_pool))
        .route("/api/v1/pools/stats", post(handlers::pool_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// API Server
pub struct ApiServer {
    state: Arc<AppState>,
    bind_address: SocketAddr,
}

impl ApiServer {
    pub fn new(state: Arc<AppState>, bind_address: SocketAddr) -> Self {
        Self {
            state,
            bind_address,
        }
    }

    /// Serve until `shutdown` resolves, then stop the pool workers
    pub async fn start<F>(self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = create_router(self.state.clone());

        info!("Starting API server on {}", self.bind_address);
        axum::Server::try_bind(&self.bind_address)
            .map_err(|e| NodeError::Config(format!("Cannot bind {}: {}", self.bind_address, e)))?
            .serve(app.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| NodeError::IO(format!("Server error: {}", e)))?;

        self.state.service.shutdown();
        info!("API server stopped");
        Ok(())
    }
}
