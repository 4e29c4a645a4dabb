// Error handling for the UTXO token cache
//
// Every failure is local to the single event being processed. None of these
// variants leave a pool unable to process the next event.

use rust_decimal::Decimal;
use std::result;
use thiserror::Error;

/// Result type for token cache operations
pub type Result<T> = result::Result<T, TokenCacheError>;

/// Error type for token cache operations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TokenCacheError {
    /// Canonical pool key form exceeds the maximum length
    #[error("Pool key too long: canonical form is {length} characters, maximum is {max}")]
    PoolKeyTooLong { length: usize, max: usize },

    /// Claim query could not reach its target amount
    #[error("Insufficient balance in pool {pool}: requested {requested}, selectable {available}")]
    InsufficientBalance {
        pool: String,
        requested: Decimal,
        available: Decimal,
    },

    /// Tag filter is not a valid regular expression
    #[error("Invalid tag filter: {0}")]
    InvalidTagFilter(String),

    /// Claim query was rejected before selection
    #[error("Invalid claim query: {0}")]
    InvalidClaimQuery(String),

    /// A claim with this id is already active in the pool
    #[error("Duplicate claim: {0}")]
    DuplicateClaim(String),

    /// A token offered to a new claim is already held by another claim
    #[error("Token {state_ref} is already claimed by {claim_id}")]
    TokenAlreadyClaimed { state_ref: String, claim_id: String },

    /// Backfill from the token store failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Wire encoding or decoding failed
    #[error("Codec error: {0}")]
    Codec(String),

    /// The pool worker could not accept or answer the event
    #[error("Pool unavailable: {0}")]
    PoolUnavailable(String),
}

impl TokenCacheError {
    /// Helper for returning a persistence error from any displayable source
    pub fn persistence(message: impl Into<String>) -> Self {
        TokenCacheError::Persistence(message.into())
    }

    /// Whether the requester may usefully resend the same event.
    ///
    /// Backfill failures leave the pool un-initialised, and a stopped worker
    /// is replaced on the next access, so both are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TokenCacheError::Persistence(_) | TokenCacheError::PoolUnavailable(_)
        )
    }
}

impl From<bincode::Error> for TokenCacheError {
    fn from(err: bincode::Error) -> Self {
        TokenCacheError::Codec(err.to_string())
    }
}

impl From<regex::Error> for TokenCacheError {
    fn from(err: regex::Error) -> Self {
        TokenCacheError::InvalidTagFilter(err.to_string())
    }
}
