// Claim query resolution
//
// Greedy accumulation over candidates already ordered by a strategy. The
// result is all-or-nothing: either a set reaching the target, or nothing.

use crate::selection::filter::TokenFilter;
use crate::types::Token;
use rust_decimal::Decimal;

/// Outcome of resolving a target amount against a candidate sequence
#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    /// Tokens whose amounts sum to at least the target
    Satisfied(Vec<Token>),

    /// Candidates ran out; `available` is the sum of every matching candidate
    Insufficient { available: Decimal },
}

/// Select tokens from `ordered` until their sum reaches `target`.
///
/// Candidates not matching `filter` are skipped. Accumulation stops at the
/// first token that brings the running sum to or above the target.
pub fn select_tokens<'a, I>(ordered: I, filter: &TokenFilter, target: Decimal) -> Selection
where
    I: IntoIterator<Item = &'a Token>,
{
    let mut selected = Vec::new();
    let mut running = Decimal::ZERO;

    for token in ordered.into_iter().filter(|t| filter.matches(t)) {
        selected.push(token.clone());
        running += token.amount();
        if running >= target {
            return Selection::Satisfied(selected);
        }
    }

    Selection::Insufficient { available: running }
}
