//! Per-pool cache structures
//!
//! * `TokenCache`: tokens believed unspent
//! * `ClaimTable`: active reservations over those tokens
//! * `PoolState`: the pair, owned by one pool worker

pub mod claim_table;
pub mod pool_state;
pub mod token_cache;

pub use claim_table::{Claim, ClaimTable};
pub use pool_state::PoolState;
pub use token_cache::TokenCache;
