// Per-pool claim ledger
//
// A claim reserves specific tokens against double use. A state ref is held
// by at most one active claim; `claimed_index` is maintained alongside the
// claims so that check is O(1) per token.

use crate::error::{Result, TokenCacheError};
use crate::types::{ClaimSummary, Token};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// One active reservation
#[derive(Clone, Debug)]
pub struct Claim {
    claim_id: String,
    claimed_tokens: BTreeMap<String, Token>,
    created_at: DateTime<Utc>,
}

impl Claim {
    pub fn claim_id(&self) -> &str {
        &self.claim_id
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.claimed_tokens.values()
    }

    pub fn state_refs(&self) -> impl Iterator<Item = &String> {
        self.claimed_tokens.keys()
    }

    pub fn len(&self) -> usize {
        self.claimed_tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed_tokens.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn summary(&self) -> ClaimSummary {
        ClaimSummary {
            claim_id: self.claim_id.clone(),
            token_count: self.claimed_tokens.len(),
            created_at: self.created_at,
        }
    }
}

/// Active claims of one pool plus the derived `state_ref -> claim_id` index
#[derive(Debug, Default, Clone)]
pub struct ClaimTable {
    claims: HashMap<String, Claim>,
    claimed_index: HashMap<String, String>,
}

impl ClaimTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_claimed(&self, state_ref: &str) -> bool {
        self.claimed_index.contains_key(state_ref)
    }

    /// Id of the claim holding `state_ref`, if any
    pub fn claim_holding(&self, state_ref: &str) -> Option<&str> {
        self.claimed_index.get(state_ref).map(String::as_str)
    }

    pub fn claim_exists(&self, claim_id: &str) -> bool {
        self.claims.contains_key(claim_id)
    }

    pub fn get(&self, claim_id: &str) -> Option<&Claim> {
        self.claims.get(claim_id)
    }

    /// Register a new claim owning `tokens`.
    ///
    /// Rejects an id that is already active, an empty token set, and any
    /// token already held by another claim. Nothing is mutated on error.
    pub fn add_new_claim(&mut self, claim_id: &str, tokens: Vec<Token>) -> Result<()> {
        self.add_new_claim_at(claim_id, tokens, Utc::now())
    }

    pub(crate) fn add_new_claim_at(
        &mut self,
        claim_id: &str,
        tokens: Vec<Token>,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        if self.claims.contains_key(claim_id) {
            return Err(TokenCacheError::DuplicateClaim(claim_id.to_string()));
        }
        if tokens.is_empty() {
            return Err(TokenCacheError::InvalidClaimQuery(format!(
                "claim {} has no tokens",
                claim_id
            )));
        }
        if let Some((state_ref, holder)) = tokens
            .iter()
            .find_map(|t| self.claimed_index.get_key_value(t.state_ref()))
        {
            return Err(TokenCacheError::TokenAlreadyClaimed {
                state_ref: state_ref.clone(),
                claim_id: holder.clone(),
            });
        }

        let claimed_tokens: BTreeMap<String, Token> = tokens
            .into_iter()
            .map(|t| (t.state_ref().to_string(), t))
            .collect();
        for state_ref in claimed_tokens.keys() {
            self.claimed_index
                .insert(state_ref.clone(), claim_id.to_string());
        }
        self.claims.insert(
            claim_id.to_string(),
            Claim {
                claim_id: claim_id.to_string(),
                claimed_tokens,
                created_at,
            },
        );

        Ok(())
    }

    /// Delete a claim if present, returning it
    pub fn remove_claim(&mut self, claim_id: &str) -> Option<Claim> {
        let claim = self.claims.remove(claim_id)?;
        for state_ref in claim.claimed_tokens.keys() {
            self.claimed_index.remove(state_ref);
        }
        Some(claim)
    }

    /// Replace the held copy of any claimed token found in `tokens`.
    ///
    /// Keeps claims in step with upserts to the cache. Returns how many
    /// claimed tokens were refreshed.
    pub fn refresh_tokens<'a, I>(&mut self, tokens: I) -> usize
    where
        I: IntoIterator<Item = &'a Token>,
    {
        let mut refreshed = 0;
        for token in tokens {
            let Some(claim_id) = self.claimed_index.get(token.state_ref()) else {
                continue;
            };
            if let Some(held) = self
                .claims
                .get_mut(claim_id)
                .and_then(|c| c.claimed_tokens.get_mut(token.state_ref()))
            {
                *held = token.clone();
                refreshed += 1;
            }
        }
        refreshed
    }

    /// Strip removed refs from every claim holding them, deleting claims
    /// left empty. Returns the ids of deleted claims.
    pub fn tokens_removed_from_cache<'a, I>(&mut self, state_refs: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut emptied = Vec::new();

        for state_ref in state_refs {
            let Some(claim_id) = self.claimed_index.remove(state_ref) else {
                continue;
            };
            if let Some(claim) = self.claims.get_mut(&claim_id) {
                claim.claimed_tokens.remove(state_ref);
                if claim.claimed_tokens.is_empty() {
                    self.claims.remove(&claim_id);
                    emptied.push(claim_id);
                }
            }
        }

        if !emptied.is_empty() {
            debug!("Claims emptied by token removal: {:?}", emptied);
        }
        emptied
    }

    /// Union of the tokens held by every active claim
    pub fn claimed_tokens(&self) -> impl Iterator<Item = &Token> {
        self.claims.values().flat_map(|c| c.claimed_tokens.values())
    }

    /// Claims created at or before `threshold`, oldest first
    pub fn claims_older_than(&self, threshold: DateTime<Utc>) -> Vec<ClaimSummary> {
        let mut stale: Vec<ClaimSummary> = self
            .claims
            .values()
            .filter(|c| c.created_at <= threshold)
            .map(Claim::summary)
            .collect();
        stale.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.claim_id.cmp(&b.claim_id))
        });
        stale
    }

    /// Drop every claim. Used when the whole token set is discarded.
    pub fn clear(&mut self) {
        self.claims.clear();
        self.claimed_index.clear();
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn claimed_token_count(&self) -> usize {
        self.claimed_index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn tokens(refs: &[&str]) -> Vec<Token> {
        refs.iter().map(|r| Token::new(*r, dec!(1))).collect()
    }

    #[test]
    fn test_add_and_remove_claim() {
        let mut table = ClaimTable::new();
        table.add_new_claim("c1", tokens(&["a", "b"])).unwrap();

        assert!(table.claim_exists("c1"));
        assert!(table.is_claimed("a"));
        assert_eq!(table.claim_holding("b"), Some("c1"));
        assert_eq!(table.claimed_token_count(), 2);

        let removed = table.remove_claim("c1").unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!table.claim_exists("c1"));
        assert!(!table.is_claimed("a"));
        assert!(table.remove_claim("c1").is_none());
    }

    #[test]
    fn test_duplicate_claim_id_rejected() {
        let mut table = ClaimTable::new();
        table.add_new_claim("c1", tokens(&["a"])).unwrap();

        let err = table.add_new_claim("c1", tokens(&["b"])).unwrap_err();
        assert_eq!(err, TokenCacheError::DuplicateClaim("c1".into()));

        // original claim is untouched
        assert!(table.is_claimed("a"));
        assert!(!table.is_claimed("b"));
    }

    #[test]
    fn test_token_claimed_twice_rejected() {
        let mut table = ClaimTable::new();
        table.add_new_claim("c1", tokens(&["a"])).unwrap();

        let err = table.add_new_claim("c2", tokens(&["b", "a"])).unwrap_err();
        assert_eq!(
            err,
            TokenCacheError::TokenAlreadyClaimed {
                state_ref: "a".into(),
                claim_id: "c1".into()
            }
        );
        assert!(!table.claim_exists("c2"));
        assert!(!table.is_claimed("b"));
    }

    #[test]
    fn test_empty_claim_rejected() {
        let mut table = ClaimTable::new();
        assert!(table.add_new_claim("c1", Vec::new()).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_tokens_removed_shrinks_and_deletes() {
        let mut table = ClaimTable::new();
        table.add_new_claim("c1", tokens(&["a", "b"])).unwrap();
        table.add_new_claim("c2", tokens(&["c"])).unwrap();

        let removed: Vec<String> = vec!["a".into(), "c".into(), "unknown".into()];
        let emptied = table.tokens_removed_from_cache(&removed);

        assert_eq!(emptied, vec!["c2".to_string()]);
        assert!(table.claim_exists("c1"));
        assert_eq!(table.get("c1").unwrap().len(), 1);
        assert!(!table.claim_exists("c2"));
        assert!(!table.is_claimed("a"));
        assert!(table.is_claimed("b"));

        // second application is a no-op
        let emptied_again = table.tokens_removed_from_cache(&removed);
        assert!(emptied_again.is_empty());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_refresh_replaces_claimed_copies() {
        let mut table = ClaimTable::new();
        table.add_new_claim("c1", tokens(&["a", "b"])).unwrap();

        let upserted = vec![
            Token::new("a", dec!(7)).with_tag("refreshed"),
            Token::new("unclaimed", dec!(4)),
        ];
        assert_eq!(table.refresh_tokens(&upserted), 1);

        let claim = table.get("c1").unwrap();
        let held: Vec<(&str, Decimal)> = claim.tokens().map(|t| (t.state_ref(), t.amount())).collect();
        assert_eq!(held, vec![("a", dec!(7)), ("b", dec!(1))]);
        assert_eq!(claim.tokens().next().unwrap().tag(), Some("refreshed"));
        assert!(!table.is_claimed("unclaimed"));
    }

    #[test]
    fn test_claimed_tokens_union() {
        let mut table = ClaimTable::new();
        table.add_new_claim("c1", tokens(&["a", "b"])).unwrap();
        table.add_new_claim("c2", tokens(&["c"])).unwrap();

        let mut refs: Vec<&str> = table.claimed_tokens().map(|t| t.state_ref()).collect();
        refs.sort_unstable();
        assert_eq!(refs, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_claims_older_than() {
        let mut table = ClaimTable::new();
        let now = Utc::now();
        table
            .add_new_claim_at("old", tokens(&["a"]), now - Duration::seconds(120))
            .unwrap();
        table
            .add_new_claim_at("older", tokens(&["b"]), now - Duration::seconds(600))
            .unwrap();
        table.add_new_claim_at("fresh", tokens(&["c"]), now).unwrap();

        let stale = table.claims_older_than(now - Duration::seconds(60));
        let ids: Vec<&str> = stale.iter().map(|s| s.claim_id.as_str()).collect();
        assert_eq!(ids, vec!["older", "old"]);
    }
}
