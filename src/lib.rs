//! Live OKX order book mirror with market-order execution simulation.
//!
//! The crate keeps a local copy of one instrument's order book from the OKX
//! public WebSocket feed and periodically prices hypothetical market orders
//! against it: average fill price, slippage against the touch, and taker fee.
//!
//! ```text
//! asks  101.0 x 1.0     buy 2.0  ->  1.0 @ 101.0 + 1.0 @ 102.0
//!       102.0 x 2.0              avg 101.5, slippage 0.5
//! bids  100.0 x 1.0              fee  203.0 * 0.0006 = 0.1218
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`orderbook`]: Sorted bid/ask book and its shared handle
//! - [`simulator`]: Level walking, fill reports and the periodic scheduler
//! - [`feed`]: OKX message decoding and the WebSocket client
//! - [`api`]: HTTP API for health, book, simulation and metrics
//! - [`metrics`]: Prometheus metric names and helpers
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod orderbook;
pub mod simulator;
pub mod utils;

pub use config::Config;
pub use error::{Result, SimError};
