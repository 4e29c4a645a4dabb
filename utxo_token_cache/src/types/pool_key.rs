//! Token pool keys
//!
//! A pool is the partition of tokens sharing holder, token type, issuer,
//! notary and symbol. Pools never share state, so the key is also the unit
//! of single-threaded processing.

use crate::error::{Result, TokenCacheError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length, in characters, of a pool key's canonical form.
pub const MAX_POOL_KEY_LENGTH: usize = 255;

/// Composite identifier of a token pool.
///
/// Construction validates the canonical form length, so a `TokenPoolKey`
/// that exists is always usable as a cache partition key. Deserialization
/// goes through the same check.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPoolKey", into = "RawPoolKey")]
pub struct TokenPoolKey {
    holder_id: String,
    token_type: String,
    issuer_hash: String,
    notary_name: String,
    symbol: String,
}

/// Unvalidated field set used for (de)serialization.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct RawPoolKey {
    holder_id: String,
    token_type: String,
    issuer_hash: String,
    notary_name: String,
    symbol: String,
}

impl TokenPoolKey {
    /// Create a pool key, rejecting keys whose canonical form is too long.
    pub fn new(
        holder_id: impl Into<String>,
        token_type: impl Into<String>,
        issuer_hash: impl Into<String>,
        notary_name: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Result<Self> {
        let key = Self {
            holder_id: holder_id.into(),
            token_type: token_type.into(),
            issuer_hash: issuer_hash.into(),
            notary_name: notary_name.into(),
            symbol: symbol.into(),
        };

        let length = key.canonical().chars().count();
        if length > MAX_POOL_KEY_LENGTH {
            return Err(TokenCacheError::PoolKeyTooLong {
                length,
                max: MAX_POOL_KEY_LENGTH,
            });
        }

        Ok(key)
    }

    /// Hyphen-joined `holder-type-issuer-notary-symbol` form.
    pub fn canonical(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.holder_id, self.token_type, self.issuer_hash, self.notary_name, self.symbol
        )
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn issuer_hash(&self) -> &str {
        &self.issuer_hash
    }

    pub fn notary_name(&self) -> &str {
        &self.notary_name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl fmt::Display for TokenPoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl TryFrom<RawPoolKey> for TokenPoolKey {
    type Error = TokenCacheError;

    fn try_from(raw: RawPoolKey) -> Result<Self> {
        TokenPoolKey::new(
            raw.holder_id,
            raw.token_type,
            raw.issuer_hash,
            raw.notary_name,
            raw.symbol,
        )
    }
}

impl From<TokenPoolKey> for RawPoolKey {
    fn from(key: TokenPoolKey) -> Self {
        RawPoolKey {
            holder_id: key.holder_id,
            token_type: key.token_type,
            issuer_hash: key.issuer_hash,
            notary_name: key.notary_name,
            symbol: key.symbol,
        }
    }
}
