//! Bridge transaction history for an L1/L2 rollup pair.
//!
//! Pages of deposits and withdrawals come from two indexers, get enriched from
//! the chain RPCs and are merged with records tracked live.

pub mod api;
pub mod chain;
pub mod config;
pub mod error;
pub mod history;
pub mod indexer;
pub mod live;
pub mod model;
pub mod pagination;
pub mod resolver;
pub mod status;
pub mod transform;

#[cfg(test)]
mod testing;
