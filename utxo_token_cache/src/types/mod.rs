pub mod events;
pub mod pool_key;
pub mod token;

pub use events::{
    BalanceQuery, BalanceResult, ClaimQuery, ClaimRelease, ClaimResult, ClaimSummary,
    ForceClaimRelease, InvalidateCache, LedgerChange, PoolStats, PoolStatsQuery, RequestContext,
    TokenPoolEvent, TokenPoolResponse,
};
pub use pool_key::{TokenPoolKey, MAX_POOL_KEY_LENGTH};
pub use token::{total_amount, Token};
