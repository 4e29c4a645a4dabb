// Wire codec for tokens and claims
//
// Amounts cross the persistence and wire boundary as a scaled integer: the
// unscaled magnitude as minimal big-endian two's complement bytes plus an
// explicit decimal scale. `value = unscaled * 10^-scale`.

use crate::cache::Claim;
use crate::error::{Result, TokenCacheError};
use crate::types::{Token, TokenPoolKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Scaled-integer encoding of a decimal amount
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaledDecimal {
    pub unscaled_value: Vec<u8>,
    pub scale: u32,
}

impl ScaledDecimal {
    pub fn from_decimal(value: Decimal) -> Self {
        Self {
            unscaled_value: minimal_be_bytes(value.mantissa()),
            scale: value.scale(),
        }
    }

    /// Fails when the magnitude or scale is outside what `Decimal` holds.
    pub fn to_decimal(&self) -> Result<Decimal> {
        let bytes = &self.unscaled_value;
        if bytes.is_empty() || bytes.len() > 16 {
            return Err(TokenCacheError::Codec(format!(
                "unscaled value must be 1..=16 bytes, got {}",
                bytes.len()
            )));
        }

        let fill = if bytes[0] & 0x80 != 0 { 0xFF } else { 0x00 };
        let mut buf = [fill; 16];
        buf[16 - bytes.len()..].copy_from_slice(bytes);
        let unscaled = i128::from_be_bytes(buf);

        Decimal::try_from_i128_with_scale(unscaled, self.scale)
            .map_err(|e| TokenCacheError::Codec(format!("amount out of range: {}", e)))
    }
}

fn minimal_be_bytes(value: i128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

/// Wire form of a token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireToken {
    pub state_ref: String,
    pub amount: ScaledDecimal,
    pub tag: Option<String>,
    pub owner_hash: Option<String>,
}

impl From<&Token> for WireToken {
    fn from(token: &Token) -> Self {
        Self {
            state_ref: token.state_ref().to_string(),
            amount: ScaledDecimal::from_decimal(token.amount()),
            tag: token.tag().map(str::to_string),
            owner_hash: token.owner_hash().map(str::to_string),
        }
    }
}

impl TryFrom<WireToken> for Token {
    type Error = TokenCacheError;

    fn try_from(wire: WireToken) -> Result<Self> {
        let mut token = Token::new(wire.state_ref, wire.amount.to_decimal()?);
        if let Some(tag) = wire.tag {
            token = token.with_tag(tag);
        }
        if let Some(owner_hash) = wire.owner_hash {
            token = token.with_owner_hash(owner_hash);
        }
        Ok(token)
    }
}

/// Wire form of a claim
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireClaim {
    pub claim_id: String,
    pub pool_key: TokenPoolKey,
    pub tokens: Vec<WireToken>,
    pub created_at_millis: i64,
}

impl WireClaim {
    pub fn from_claim(pool_key: &TokenPoolKey, claim: &Claim) -> Self {
        Self {
            claim_id: claim.claim_id().to_string(),
            pool_key: pool_key.clone(),
            tokens: claim.tokens().map(WireToken::from).collect(),
            created_at_millis: claim.created_at().timestamp_millis(),
        }
    }

    /// Decode the claimed tokens
    pub fn into_tokens(self) -> Result<Vec<Token>> {
        self.tokens.into_iter().map(Token::try_from).collect()
    }
}

pub fn encode_token(token: &Token) -> Result<Vec<u8>> {
    Ok(bincode::serialize(&WireToken::from(token))?)
}

pub fn decode_token(bytes: &[u8]) -> Result<Token> {
    let wire: WireToken = bincode::deserialize(bytes)?;
    Token::try_from(wire)
}

pub fn encode_claim(pool_key: &TokenPoolKey, claim: &Claim) -> Result<Vec<u8>> {
    Ok(bincode::serialize(&WireClaim::from_claim(pool_key, claim))?)
}

pub fn decode_claim(bytes: &[u8]) -> Result<WireClaim> {
    Ok(bincode::deserialize(bytes)?)
}
