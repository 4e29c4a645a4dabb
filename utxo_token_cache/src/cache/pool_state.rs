// Per-pool cache state
//
// The (TokenCache, ClaimTable) pair for one pool, plus the pool's random
// source and backfill flag. Exclusively owned by the pool's worker.

use crate::cache::claim_table::ClaimTable;
use crate::cache::token_cache::TokenCache;
use crate::selection::{select_tokens, Selection, SelectionStrategy, TokenFilter};
use crate::types::{BalanceResult, Token, TokenPoolKey};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use std::collections::HashSet;

/// Everything the cache knows about one pool
#[derive(Debug)]
pub struct PoolState {
    pool_key: TokenPoolKey,
    tokens: TokenCache,
    claims: ClaimTable,
    rng: ChaCha8Rng,
    backfilled: bool,
}

impl PoolState {
    /// New, un-backfilled pool with an entropy-seeded random source
    pub fn new(pool_key: TokenPoolKey) -> Self {
        Self::with_rng(pool_key, ChaCha8Rng::from_entropy())
    }

    /// New pool with a fixed seed, for reproducible random selection
    pub fn with_seed(pool_key: TokenPoolKey, seed: u64) -> Self {
        Self::with_rng(pool_key, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(pool_key: TokenPoolKey, rng: ChaCha8Rng) -> Self {
        Self {
            pool_key,
            tokens: TokenCache::new(),
            claims: ClaimTable::new(),
            rng,
            backfilled: false,
        }
    }

    pub fn pool_key(&self) -> &TokenPoolKey {
        &self.pool_key
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    pub fn claims(&self) -> &ClaimTable {
        &self.claims
    }

    pub fn claims_mut(&mut self) -> &mut ClaimTable {
        &mut self.claims
    }

    pub fn is_backfilled(&self) -> bool {
        self.backfilled
    }

    /// Install the token store's view of the pool and mark it backfilled.
    ///
    /// Tokens already cached (from a ledger change that arrived earlier) are
    /// kept; backfilled tokens with the same ref replace them.
    pub fn complete_backfill(&mut self, tokens: Vec<Token>) {
        self.add_tokens(tokens);
        self.backfilled = true;
    }

    /// Upsert tokens into the cache. Claims holding a replaced ref see the
    /// new version.
    pub fn add_tokens(&mut self, tokens: Vec<Token>) {
        self.claims.refresh_tokens(&tokens);
        self.tokens.add(tokens);
    }

    /// Remove refs from the cache and reconcile claims against what was
    /// removed. Returns the ids of claims that were emptied.
    pub fn remove_tokens<'a, I>(&mut self, state_refs: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let refs: Vec<&String> = state_refs.into_iter().collect();
        self.tokens.remove_all(refs.iter().copied());
        // claims are reconciled against the requested refs, not only those
        // found in the cache, so no claim can outlive its token
        self.claims.tokens_removed_from_cache(refs)
    }

    /// Drop every cached token and claim, and require a new backfill.
    pub fn invalidate(&mut self) -> Vec<String> {
        let mut removed: HashSet<String> = self.tokens.clear();
        // a claim on a ref that was never cached still has to go
        removed.extend(self.claims.claimed_tokens().map(|t| t.state_ref().to_string()));
        let emptied = self.claims.tokens_removed_from_cache(&removed);
        self.backfilled = false;
        emptied
    }

    /// Resolve a target amount against the unclaimed tokens of the pool.
    ///
    /// Read-only: creating the claim is the caller's job.
    pub fn select_unclaimed(
        &mut self,
        strategy: SelectionStrategy,
        filter: &TokenFilter,
        target: Decimal,
    ) -> Selection {
        let claims = &self.claims;
        let ordered = self
            .tokens
            .iterate(strategy, &mut self.rng)
            .filter(|t| !claims.is_claimed(t.state_ref()));
        select_tokens(ordered, filter, target)
    }

    /// Available and total balance of the tokens matching `filter`
    pub fn balance(&self, filter: &TokenFilter) -> BalanceResult {
        let mut available = Decimal::ZERO;
        let mut total = Decimal::ZERO;

        for token in self.tokens.values().filter(|t| filter.matches(t)) {
            total += token.amount();
            if !self.claims.is_claimed(token.state_ref()) {
                available += token.amount();
            }
        }

        BalanceResult {
            available_balance: available,
            total_balance: total,
        }
    }
}
