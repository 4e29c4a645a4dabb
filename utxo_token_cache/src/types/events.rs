//! Inbound pool events and their results
//!
//! Every event names exactly one pool. Events for the same pool are applied
//! one at a time, in delivery order.

use crate::selection::SelectionStrategy;
use crate::types::pool_key::TokenPoolKey;
use crate::types::token::Token;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Correlation data carried by requester-originated events
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Requester's id for this request; also the id of any claim it creates
    pub external_request_id: String,
    /// Workflow that issued the request, kept for audit logging
    pub flow_id: String,
}

impl RequestContext {
    pub fn new(external_request_id: impl Into<String>, flow_id: impl Into<String>) -> Self {
        Self {
            external_request_id: external_request_id.into(),
            flow_id: flow_id.into(),
        }
    }
}

/// Request to reserve tokens summing to at least `target_amount`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClaimQuery {
    pub context: RequestContext,
    pub pool_key: TokenPoolKey,
    pub target_amount: Decimal,
    /// Regular expression a token's tag must match
    #[serde(default)]
    pub tag_regex: Option<String>,
    /// Exact owner hash a token must carry
    #[serde(default)]
    pub owner_hash: Option<String>,
    /// Ordering to select with; the pool default applies when absent
    #[serde(default)]
    pub strategy: Option<SelectionStrategy>,
}

/// Requester hands a claim back, reporting which tokens it spent
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClaimRelease {
    pub context: RequestContext,
    pub pool_key: TokenPoolKey,
    pub claim_id: String,
    #[serde(default)]
    pub used_tokens: BTreeSet<String>,
}

/// Unconditional claim teardown issued by a timeout or crash supervisor
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForceClaimRelease {
    pub pool_key: TokenPoolKey,
    pub claim_id: String,
}

/// Ledger commit notification
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerChange {
    pub context: RequestContext,
    pub pool_key: TokenPoolKey,
    #[serde(default)]
    pub consumed_tokens: Vec<Token>,
    #[serde(default)]
    pub produced_tokens: Vec<Token>,
}

/// Read-only balance request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceQuery {
    pub context: RequestContext,
    pub pool_key: TokenPoolKey,
    #[serde(default)]
    pub tag_regex: Option<String>,
    #[serde(default)]
    pub owner_hash: Option<String>,
}

/// Drop the pool's cached tokens so they are rebuilt from the token store
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvalidateCache {
    pub pool_key: TokenPoolKey,
}

/// Read-only request for pool occupancy and stale claims
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolStatsQuery {
    pub pool_key: TokenPoolKey,
    /// Claims at least this old (seconds) are reported as stale
    #[serde(default)]
    pub stale_after_secs: Option<u64>,
}

/// Any event a pool worker can apply
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenPoolEvent {
    ClaimQuery(ClaimQuery),
    ClaimRelease(ClaimRelease),
    ForceClaimRelease(ForceClaimRelease),
    LedgerChange(LedgerChange),
    BalanceQuery(BalanceQuery),
    InvalidateCache(InvalidateCache),
    PoolStats(PoolStatsQuery),
}

impl TokenPoolEvent {
    /// Pool this event is addressed to
    pub fn pool_key(&self) -> &TokenPoolKey {
        match self {
            TokenPoolEvent::ClaimQuery(e) => &e.pool_key,
            TokenPoolEvent::ClaimRelease(e) => &e.pool_key,
            TokenPoolEvent::ForceClaimRelease(e) => &e.pool_key,
            TokenPoolEvent::LedgerChange(e) => &e.pool_key,
            TokenPoolEvent::BalanceQuery(e) => &e.pool_key,
            TokenPoolEvent::InvalidateCache(e) => &e.pool_key,
            TokenPoolEvent::PoolStats(e) => &e.pool_key,
        }
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            TokenPoolEvent::ClaimQuery(_) => "claim_query",
            TokenPoolEvent::ClaimRelease(_) => "claim_release",
            TokenPoolEvent::ForceClaimRelease(_) => "force_claim_release",
            TokenPoolEvent::LedgerChange(_) => "ledger_change",
            TokenPoolEvent::BalanceQuery(_) => "balance_query",
            TokenPoolEvent::InvalidateCache(_) => "invalidate_cache",
            TokenPoolEvent::PoolStats(_) => "pool_stats",
        }
    }

    /// Requester correlation, if the event carries any
    pub fn context(&self) -> Option<&RequestContext> {
        match self {
            TokenPoolEvent::ClaimQuery(e) => Some(&e.context),
            TokenPoolEvent::ClaimRelease(e) => Some(&e.context),
            TokenPoolEvent::LedgerChange(e) => Some(&e.context),
            TokenPoolEvent::BalanceQuery(e) => Some(&e.context),
            TokenPoolEvent::ForceClaimRelease(_)
            | TokenPoolEvent::InvalidateCache(_)
            | TokenPoolEvent::PoolStats(_) => None,
        }
    }
}

/// Tokens reserved for a requester
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClaimResult {
    pub claim_id: String,
    pub pool_key: TokenPoolKey,
    pub tokens: Vec<Token>,
}

/// Balances of the tokens matching a filter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResult {
    /// Matching tokens not held by any claim
    pub available_balance: Decimal,
    /// All matching tokens, claimed or not
    pub total_balance: Decimal,
}

/// Summary of one active claim
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSummary {
    pub claim_id: String,
    pub token_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Occupancy of one pool
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolStats {
    pub pool_key: TokenPoolKey,
    pub token_count: usize,
    pub claim_count: usize,
    pub claimed_token_count: usize,
    pub backfilled: bool,
    pub stale_claims: Vec<ClaimSummary>,
}

/// What a pool worker sends back for one event
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenPoolResponse {
    Claimed(ClaimResult),
    Balance(BalanceResult),
    Stats(PoolStats),
    Ack,
}
