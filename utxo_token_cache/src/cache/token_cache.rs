// Per-pool token set
//
// Holds the tokens currently believed unspent for one pool, keyed by state
// ref. Owned by exactly one pool worker, so there is no internal locking.

use crate::selection::SelectionStrategy;
use crate::types::Token;
use rand::Rng;
use std::collections::{HashMap, HashSet};

/// Mutable `state_ref -> Token` mapping for a single pool
#[derive(Debug, Default, Clone)]
pub struct TokenCache {
    tokens: HashMap<String, Token>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert tokens by state ref. A token already present is replaced.
    pub fn add<I>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = Token>,
    {
        for token in tokens {
            self.tokens.insert(token.state_ref().to_string(), token);
        }
    }

    /// Remove the given refs. Missing refs are ignored.
    ///
    /// Returns the refs that were actually present.
    pub fn remove_all<'a, I>(&mut self, state_refs: I) -> HashSet<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        state_refs
            .into_iter()
            .filter_map(|state_ref| self.tokens.remove_entry(state_ref).map(|(k, _)| k))
            .collect()
    }

    /// Empty the pool, returning every ref that was removed
    pub fn clear(&mut self) -> HashSet<String> {
        self.tokens.drain().map(|(state_ref, _)| state_ref).collect()
    }

    /// Fresh traversal over the current tokens, ordered by `strategy`.
    pub fn iterate<'a, R>(
        &'a self,
        strategy: SelectionStrategy,
        rng: &mut R,
    ) -> std::vec::IntoIter<&'a Token>
    where
        R: Rng + ?Sized,
    {
        strategy
            .order(self.tokens.values().collect(), rng)
            .into_iter()
    }

    /// Unordered traversal, for balance sums and stats
    pub fn values(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }

    pub fn get(&self, state_ref: &str) -> Option<&Token> {
        self.tokens.get(state_ref)
    }

    pub fn contains(&self, state_ref: &str) -> bool {
        self.tokens.contains_key(state_ref)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rust_decimal_macros::dec;

    #[test]
    fn test_add_replaces_existing_ref() {
        let mut cache = TokenCache::new();
        cache.add(vec![Token::new("a", dec!(5))]);
        cache.add(vec![Token::new("a", dec!(6)).with_tag("refreshed")]);

        assert_eq!(cache.len(), 1);
        let token = cache.get("a").unwrap();
        assert_eq!(token.amount(), dec!(6));
        assert_eq!(token.tag(), Some("refreshed"));
    }

    #[test]
    fn test_remove_all_ignores_missing() {
        let mut cache = TokenCache::new();
        cache.add(vec![Token::new("a", dec!(1)), Token::new("b", dec!(2))]);

        let refs: Vec<String> = vec!["a".into(), "zzz".into()];
        let removed = cache.remove_all(&refs);
        assert_eq!(removed, HashSet::from(["a".to_string()]));
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));

        let removed_again = cache.remove_all(&refs);
        assert!(removed_again.is_empty());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_returns_removed_refs() {
        let mut cache = TokenCache::new();
        cache.add(vec![Token::new("a", dec!(1)), Token::new("b", dec!(2))]);
        let removed = cache.clear();
        assert_eq!(removed.len(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_iterate_is_restartable() {
        let mut cache = TokenCache::new();
        cache.add(vec![
            Token::new("a", dec!(5)),
            Token::new("b", dec!(3)),
            Token::new("c", dec!(10)),
        ]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let first: Vec<&str> = cache
            .iterate(SelectionStrategy::LargestFirst, &mut rng)
            .map(|t| t.state_ref())
            .collect();
        let second: Vec<&str> = cache
            .iterate(SelectionStrategy::LargestFirst, &mut rng)
            .map(|t| t.state_ref())
            .collect();

        assert_eq!(first, vec!["c", "a", "b"]);
        assert_eq!(first, second);
    }
}
