// UTXO Cache Node Library
//
// Hosts the token selection cache behind an HTTP API, backed by a SQLite or
// in-memory token store.

pub mod api;
pub mod config;
pub mod error;
pub mod storage;

pub use error::{NodeError, Result};
