// API handlers for the UTXO cache node

use crate::api::AppState;
use crate::error::Result;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use utxo_token_cache::{
    BalanceQuery, ClaimQuery, ClaimRelease, ForceClaimRelease, InvalidateCache, LedgerChange,
    PoolStatsQuery,
};

/// Node status
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub instance_id: String,
    pub uptime_secs: u64,
    /// Pools with a running worker
    pub pool_count: usize,
}

pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(StatusResponse {
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
        instance_id: state.instance_id.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        pool_count: state.service.pool_count(),
    })
}

/// Reserve tokens covering a target amount
#[axum::debug_handler]
pub async fn claim_tokens(
    State(state): State<Arc<AppState>>,
    Json(query): Json<ClaimQuery>,
) -> Result<impl IntoResponse> {
    debug!(
        pool = %query.pool_key,
        request = %query.context.external_request_id,
        flow = %query.context.flow_id,
        target = %query.target_amount,
        "Claim requested"
    );

    let result = state.service.claim(query).await?;
    Ok((StatusCode::OK, Json(result)))
}

#[axum::debug_handler]
pub async fn release_claim(
    State(state): State<Arc<AppState>>,
    Json(release): Json<ClaimRelease>,
) -> Result<impl IntoResponse> {
    debug!(
        pool = %release.pool_key,
        claim = %release.claim_id,
        used = release.used_tokens.len(),
        "Claim release requested"
    );

    state.service.release(release).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn force_release_claim(
    State(state): State<Arc<AppState>>,
    Json(release): Json<ForceClaimRelease>,
) -> Result<impl IntoResponse> {
    info!(pool = %release.pool_key, claim = %release.claim_id, "Forced claim release requested");

    state.service.force_release(release).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn ledger_change(
    State(state): State<Arc<AppState>>,
    Json(change): Json<LedgerChange>,
) -> Result<impl IntoResponse> {
    debug!(
        pool = %change.pool_key,
        consumed = change.consumed_tokens.len(),
        produced = change.produced_tokens.len(),
        "Ledger change received"
    );

    state.service.ledger_change(change).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn balance(
    State(state): State<Arc<AppState>>,
    Json(query): Json<BalanceQuery>,
) -> Result<impl IntoResponse> {
    let result = state.service.balance(query).await?;
    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn invalidate_pool(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InvalidateCache>,
) -> Result<impl IntoResponse> {
    info!(pool = %request.pool_key, "Pool invalidation requested");

    state.service.invalidate(request.pool_key).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn pool_stats(
    State(state): State<Arc<AppState>>,
    Json(query): Json<PoolStatsQuery>,
) -> Result<impl IntoResponse> {
    let stats = state.service.stats(query).await?;
    Ok(Json(stats))
}
