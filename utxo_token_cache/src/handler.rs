//! Pool event handler
//!
//! Applies exactly one event to one pool's state and produces the result for
//! the requester. Each call runs to completion before the next event for the
//! pool is handled, so nothing here needs synchronization.
//!
//! Reconciliation rules:
//! - produced tokens are upserted into the token cache
//! - consumed and spent tokens leave the cache, and every claim holding them
//!   shrinks or disappears in the same step
//! - a claim query either creates a claim reaching its target or changes
//!   nothing

use crate::cache::PoolState;
use crate::error::{Result, TokenCacheError};
use crate::selection::{Selection, SelectionStrategy, TokenFilter};
use crate::types::{
    BalanceQuery, ClaimQuery, ClaimRelease, ClaimResult, ForceClaimRelease, LedgerChange,
    PoolStats, PoolStatsQuery, TokenPoolEvent, TokenPoolResponse,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// Stateless dispatcher from events to pool mutations
#[derive(Clone, Copy, Debug, Default)]
pub struct EventHandler {
    default_strategy: SelectionStrategy,
}

impl EventHandler {
    /// Create a handler that selects with `default_strategy` when a claim
    /// query does not name one
    pub fn new(default_strategy: SelectionStrategy) -> Self {
        Self { default_strategy }
    }

    pub fn default_strategy(&self) -> SelectionStrategy {
        self.default_strategy
    }

    /// Apply `event` to `state`.
    ///
    /// Errors are local to this event; the pool stays usable.
    pub fn handle(&self, state: &mut PoolState, event: TokenPoolEvent) -> Result<TokenPoolResponse> {
        debug_assert_eq!(event.pool_key(), state.pool_key());
        debug!(
            pool = %state.pool_key(),
            kind = event.kind(),
            "Handling pool event"
        );

        match event {
            TokenPoolEvent::ClaimQuery(query) => self.claim(state, query),
            TokenPoolEvent::ClaimRelease(release) => Ok(self.release(state, release)),
            TokenPoolEvent::ForceClaimRelease(release) => Ok(self.force_release(state, release)),
            TokenPoolEvent::LedgerChange(change) => Ok(self.ledger_change(state, change)),
            TokenPoolEvent::BalanceQuery(query) => self.balance(state, query),
            TokenPoolEvent::InvalidateCache(_) => Ok(self.invalidate(state)),
            TokenPoolEvent::PoolStats(query) => Ok(self.stats(state, query)),
        }
    }

    fn claim(&self, state: &mut PoolState, query: ClaimQuery) -> Result<TokenPoolResponse> {
        if query.target_amount <= Decimal::ZERO {
            return Err(TokenCacheError::InvalidClaimQuery(format!(
                "target amount must be positive, got {}",
                query.target_amount
            )));
        }
        let claim_id = query.context.external_request_id;
        if claim_id.is_empty() {
            return Err(TokenCacheError::InvalidClaimQuery(
                "external request id is empty".to_string(),
            ));
        }
        let filter = TokenFilter::new(query.tag_regex.as_deref(), query.owner_hash.as_deref())?;

        // At-least-once delivery: a redelivered query gets its claim back
        // instead of a second reservation.
        if let Some(existing) = state.claims().get(&claim_id) {
            info!(
                pool = %state.pool_key(),
                claim_id = %claim_id,
                flow_id = %query.context.flow_id,
                "Claim query redelivered, returning existing claim"
            );
            return Ok(TokenPoolResponse::Claimed(ClaimResult {
                claim_id,
                pool_key: state.pool_key().clone(),
                tokens: existing.tokens().cloned().collect(),
            }));
        }

        let strategy = query.strategy.unwrap_or(self.default_strategy);
        match state.select_unclaimed(strategy, &filter, query.target_amount) {
            Selection::Satisfied(tokens) => {
                state.claims_mut().add_new_claim(&claim_id, tokens.clone())?;
                info!(
                    pool = %state.pool_key(),
                    claim_id = %claim_id,
                    flow_id = %query.context.flow_id,
                    strategy = %strategy,
                    token_count = tokens.len(),
                    "Created claim"
                );
                Ok(TokenPoolResponse::Claimed(ClaimResult {
                    claim_id,
                    pool_key: state.pool_key().clone(),
                    tokens,
                }))
            }
            Selection::Insufficient { available } => {
                debug!(
                    pool = %state.pool_key(),
                    requested = %query.target_amount,
                    available = %available,
                    "Claim query cannot be satisfied"
                );
                Err(TokenCacheError::InsufficientBalance {
                    pool: state.pool_key().canonical(),
                    requested: query.target_amount,
                    available,
                })
            }
        }
    }

    fn release(&self, state: &mut PoolState, release: ClaimRelease) -> TokenPoolResponse {
        match state.claims_mut().remove_claim(&release.claim_id) {
            Some(claim) => debug!(
                pool = %state.pool_key(),
                claim_id = %release.claim_id,
                flow_id = %release.context.flow_id,
                released = claim.len(),
                used = release.used_tokens.len(),
                "Released claim"
            ),
            None => debug!(
                pool = %state.pool_key(),
                claim_id = %release.claim_id,
                "Release for unknown claim"
            ),
        }

        // spent tokens must never become selectable again
        if !release.used_tokens.is_empty() {
            state.remove_tokens(&release.used_tokens);
        }
        TokenPoolResponse::Ack
    }

    fn force_release(&self, state: &mut PoolState, release: ForceClaimRelease) -> TokenPoolResponse {
        match state.claims_mut().remove_claim(&release.claim_id) {
            Some(claim) => warn!(
                pool = %state.pool_key(),
                claim_id = %release.claim_id,
                age_secs = (Utc::now() - claim.created_at()).num_seconds(),
                "Force released claim"
            ),
            None => debug!(
                pool = %state.pool_key(),
                claim_id = %release.claim_id,
                "Force release for unknown claim"
            ),
        }
        TokenPoolResponse::Ack
    }

    fn ledger_change(&self, state: &mut PoolState, change: LedgerChange) -> TokenPoolResponse {
        let produced = change.produced_tokens.len();
        state.add_tokens(change.produced_tokens);

        let consumed: Vec<String> = change
            .consumed_tokens
            .iter()
            .map(|t| t.state_ref().to_string())
            .collect();
        let emptied = state.remove_tokens(&consumed);

        debug!(
            pool = %state.pool_key(),
            flow_id = %change.context.flow_id,
            produced,
            consumed = consumed.len(),
            emptied_claims = emptied.len(),
            "Applied ledger change"
        );
        TokenPoolResponse::Ack
    }

    fn balance(&self, state: &mut PoolState, query: BalanceQuery) -> Result<TokenPoolResponse> {
        let filter = TokenFilter::new(query.tag_regex.as_deref(), query.owner_hash.as_deref())?;
        Ok(TokenPoolResponse::Balance(state.balance(&filter)))
    }

    fn invalidate(&self, state: &mut PoolState) -> TokenPoolResponse {
        let emptied = state.invalidate();
        info!(
            pool = %state.pool_key(),
            dropped_claims = emptied.len(),
            "Invalidated pool cache"
        );
        TokenPoolResponse::Ack
    }

    fn stats(&self, state: &mut PoolState, query: PoolStatsQuery) -> TokenPoolResponse {
        let stale_claims = match query.stale_after_secs {
            Some(secs) => {
                let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
                Utc::now()
                    .checked_sub_signed(Duration::seconds(secs))
                    .map(|threshold| state.claims().claims_older_than(threshold))
                    .unwrap_or_default()
            }
            None => Vec::new(),
        };

        TokenPoolResponse::Stats(PoolStats {
            pool_key: state.pool_key().clone(),
            token_count: state.tokens().len(),
            claim_count: state.claims().len(),
            claimed_token_count: state.claims().claimed_token_count(),
            backfilled: state.is_backfilled(),
            stale_claims,
        })
    }
}
