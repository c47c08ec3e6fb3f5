//! Order book module for managing market data.
//!
//! This module handles:
//! - Order book types and data structures
//! - The replace-semantics L2 book with sorted per-side views
//! - A shared handle fed by a single writer task

pub mod book;
pub mod shared;
pub mod types;

pub use book::OrderBook;
pub use shared::SharedOrderBook;
pub use types::{BookUpdate, LevelBatch, LevelUpdate, PriceLevel, Side, UpdateKind};
