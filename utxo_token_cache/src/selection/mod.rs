//! Token selection
//!
//! Turns a target amount, a filter and a strategy into a concrete set of
//! unclaimed tokens, or a failure that leaves the pool untouched.

pub mod filter;
pub mod selector;
pub mod strategy;

pub use filter::TokenFilter;
pub use selector::{select_tokens, Selection};
pub use strategy::SelectionStrategy;
