//! Token value objects
//!
//! A token is one unspent transaction output as the cache sees it: a unique
//! state reference and an amount, optionally tagged and owned.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// An immutable, uniquely referenced spendable value record.
///
/// Identity is the `state_ref` alone: two tokens with the same reference are
/// the same token, whatever their other fields say.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
    state_ref: String,
    amount: Decimal,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    owner_hash: Option<String>,
}

impl Token {
    /// Create an untagged, unowned token
    pub fn new(state_ref: impl Into<String>, amount: Decimal) -> Self {
        Self {
            state_ref: state_ref.into(),
            amount,
            tag: None,
            owner_hash: None,
        }
    }

    /// Builder-style tag setter
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Builder-style owner setter
    pub fn with_owner_hash(mut self, owner_hash: impl Into<String>) -> Self {
        self.owner_hash = Some(owner_hash.into());
        self
    }

    pub fn state_ref(&self) -> &str {
        &self.state_ref
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn owner_hash(&self) -> Option<&str> {
        self.owner_hash.as_deref()
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.state_ref == other.state_ref
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.state_ref.hash(state);
    }
}

/// Sum the amounts of a token collection
pub fn total_amount<'a>(tokens: impl IntoIterator<Item = &'a Token>) -> Decimal {
    tokens.into_iter().map(Token::amount).sum()
}
