// Selection strategies
//
// A strategy only decides the order in which unclaimed candidates are
// offered to the selector. Accumulation is the same for every strategy.

use crate::types::Token;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candidate ordering used when resolving a claim query
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Largest amount first, ties by ascending state ref. Minimizes the
    /// number of tokens a claim holds.
    #[default]
    LargestFirst,

    /// Uniformly shuffled. Spreads concurrent claims across the pool so
    /// they do not all contend for the same large token.
    Random,
}

impl SelectionStrategy {
    /// Order `tokens` for selection.
    pub fn order<'a, R>(&self, mut tokens: Vec<&'a Token>, rng: &mut R) -> Vec<&'a Token>
    where
        R: Rng + ?Sized,
    {
        match self {
            SelectionStrategy::LargestFirst => {
                tokens.sort_by(|a, b| {
                    b.amount()
                        .cmp(&a.amount())
                        .then_with(|| a.state_ref().cmp(b.state_ref()))
                });
            }
            SelectionStrategy::Random => {
                // fixed starting order, so a seeded rng replays the same picks
                tokens.sort_by(|a, b| a.state_ref().cmp(b.state_ref()));
                tokens.shuffle(rng);
            }
        }
        tokens
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStrategy::LargestFirst => "largest_first",
            SelectionStrategy::Random => "random",
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "largest_first" | "largest-first" => Ok(SelectionStrategy::LargestFirst),
            "random" => Ok(SelectionStrategy::Random),
            other => Err(format!("unknown selection strategy: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rust_decimal_macros::dec;

    fn sample() -> Vec<Token> {
        vec![
            Token::new("b", dec!(3)),
            Token::new("a", dec!(5)),
            Token::new("c", dec!(10)),
            Token::new("d", dec!(5)),
        ]
    }

    #[test]
    fn test_largest_first_order_with_ties() {
        let tokens = sample();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let ordered = SelectionStrategy::LargestFirst.order(tokens.iter().collect(), &mut rng);
        let refs: Vec<&str> = ordered.iter().map(|t| t.state_ref()).collect();
        assert_eq!(refs, vec!["c", "a", "d", "b"]);
    }

    #[test]
    fn test_random_order_is_a_permutation() {
        let tokens = sample();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let ordered = SelectionStrategy::Random.order(tokens.iter().collect(), &mut rng);
        assert_eq!(ordered.len(), tokens.len());

        let mut refs: Vec<&str> = ordered.iter().map(|t| t.state_ref()).collect();
        refs.sort_unstable();
        assert_eq!(refs, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_random_order_reproducible_with_seed() {
        let tokens = sample();
        let first = SelectionStrategy::Random
            .order(tokens.iter().collect(), &mut ChaCha8Rng::seed_from_u64(7));
        let second = SelectionStrategy::Random
            .order(tokens.iter().collect(), &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "largest_first".parse::<SelectionStrategy>().unwrap(),
            SelectionStrategy::LargestFirst
        );
        assert_eq!("Random".parse::<SelectionStrategy>().unwrap(), SelectionStrategy::Random);
        assert!("smallest".parse::<SelectionStrategy>().is_err());
    }
}
