// Tag and owner filters shared by claim and balance queries

use crate::error::Result;
use crate::types::Token;
use regex::Regex;

/// Compiled token filter. An absent criterion matches everything.
#[derive(Clone, Debug, Default)]
pub struct TokenFilter {
    tag: Option<Regex>,
    owner_hash: Option<String>,
}

impl TokenFilter {
    /// Compile a filter. Fails with `InvalidTagFilter` on a malformed regex.
    pub fn new(tag_regex: Option<&str>, owner_hash: Option<&str>) -> Result<Self> {
        let tag = tag_regex.map(Regex::new).transpose()?;
        Ok(Self {
            tag,
            owner_hash: owner_hash.map(str::to_string),
        })
    }

    /// A token without a tag never matches a tag filter.
    pub fn matches(&self, token: &Token) -> bool {
        let tag_ok = match &self.tag {
            Some(regex) => token.tag().map_or(false, |tag| regex.is_match(tag)),
            None => true,
        };
        let owner_ok = match &self.owner_hash {
            Some(owner) => token.owner_hash() == Some(owner.as_str()),
            None => true,
        };
        tag_ok && owner_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TokenCacheError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = TokenFilter::default();
        assert!(filter.matches(&Token::new("a", dec!(1))));
        assert!(filter.matches(&Token::new("b", dec!(1)).with_tag("x")));
    }

    #[test]
    fn test_tag_and_owner() {
        let filter = TokenFilter::new(Some("^gold"), Some("owner-1")).unwrap();

        let both = Token::new("a", dec!(1)).with_tag("gold-bar").with_owner_hash("owner-1");
        let wrong_owner = Token::new("b", dec!(1)).with_tag("gold-bar").with_owner_hash("owner-2");
        let untagged = Token::new("c", dec!(1)).with_owner_hash("owner-1");
        let wrong_tag = Token::new("d", dec!(1)).with_tag("silver").with_owner_hash("owner-1");

        assert!(filter.matches(&both));
        assert!(!filter.matches(&wrong_owner));
        assert!(!filter.matches(&untagged));
        assert!(!filter.matches(&wrong_tag));
    }

    #[test]
    fn test_malformed_regex() {
        let err = TokenFilter::new(Some("[unclosed"), None).unwrap_err();
        assert!(matches!(err, TokenCacheError::InvalidTagFilter(_)));
    }
}
