// UTXO Token Cache Library Entry Point
//
// Selects and reserves unspent tokens for requesters building transactions.
// Each pool (holder, token type, issuer, notary, symbol) is owned by a single
// worker; pools are created on first use and backfilled from a token store.

pub mod cache;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod persistence;
pub mod registry;
pub mod selection;
pub mod types;

// Re-export key components for easier access
pub use cache::{Claim, ClaimTable, PoolState, TokenCache};
pub use codec::{ScaledDecimal, WireClaim, WireToken};
pub use dispatcher::{CacheSettings, TokenCacheService};
pub use error::{Result, TokenCacheError};
pub use handler::EventHandler;
pub use persistence::{MemoryTokenStore, TokenStore};
pub use selection::{SelectionStrategy, TokenFilter};
pub use types::{
    BalanceQuery, BalanceResult, ClaimQuery, ClaimRelease, ClaimResult, ClaimSummary,
    ForceClaimRelease, InvalidateCache, LedgerChange, PoolStats, PoolStatsQuery, RequestContext,
    Token, TokenPoolEvent, TokenPoolKey, TokenPoolResponse, MAX_POOL_KEY_LENGTH,
};

/// Returns the version of the library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
