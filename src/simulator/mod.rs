//! Execution simulation module.
//!
//! This module handles:
//! - Fill reports and simulation directions
//! - Walking the book to price hypothetical market orders
//! - Scheduling periodic buy/sell rounds

pub mod engine;
pub mod report;
pub mod scheduler;

pub use engine::{walk_levels, ExecutionSimulator, LiquiditySource};
pub use report::{Direction, FillReport, SimulationRound};
pub use scheduler::{run_round, run_simulation_loop, LatestRound, ScheduleConfig};
