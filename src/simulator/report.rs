//! Simulation inputs and results.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::orderbook::Side;

/// Direction of a simulated market order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Market buy, lifts the asks.
    #[strum(to_string = "buy", serialize = "BUY")]
    Buy,
    /// Market sell, hits the bids.
    #[strum(to_string = "sell", serialize = "SELL")]
    Sell,
}

impl Direction {
    /// Book side this order consumes.
    pub fn opposite_side(&self) -> Side {
        match self {
            Direction::Buy => Side::Ask,
            Direction::Sell => Side::Bid,
        }
    }
}

/// Outcome of walking the book for one hypothetical market order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillReport {
    /// Buy or sell.
    pub direction: Direction,
    /// Quantity asked for.
    pub requested_quantity: Decimal,
    /// Quantity that found liquidity.
    pub executed_quantity: Decimal,
    /// Volume-weighted average fill price, zero when nothing executed.
    pub average_price: Decimal,
    /// Sum of price * quantity over consumed levels.
    pub total_cost: Decimal,
    /// `average_price - best_price`, zero when nothing executed.
    ///
    /// Positive is unfavourable for a buy; for a sell an unfavourable fill
    /// comes out negative.
    pub slippage: Decimal,
    /// Taker fee on `total_cost`.
    pub fee: Decimal,
    /// Quantity left unfilled for lack of depth.
    pub remaining_quantity: Decimal,
    /// Best opposite-side price when the walk started.
    pub best_price: Option<Decimal>,
    /// Number of price levels touched.
    pub levels_consumed: usize,
}

impl FillReport {
    /// Report for a book side with no liquidity.
    pub fn unfilled(direction: Direction, quantity: Decimal) -> Self {
        Self {
            direction,
            requested_quantity: quantity,
            executed_quantity: Decimal::ZERO,
            average_price: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            slippage: Decimal::ZERO,
            fee: Decimal::ZERO,
            remaining_quantity: quantity,
            best_price: None,
            levels_consumed: 0,
        }
    }

    /// Whole quantity executed.
    pub fn is_complete(&self) -> bool {
        self.remaining_quantity.is_zero()
    }

    /// Some but not all of the quantity executed.
    pub fn is_partial(&self) -> bool {
        !self.executed_quantity.is_zero() && !self.remaining_quantity.is_zero()
    }

    /// Nothing executed.
    pub fn is_empty(&self) -> bool {
        self.executed_quantity.is_zero()
    }

    /// Slippage in basis points of the best price.
    pub fn slippage_bps(&self) -> Decimal {
        match self.best_price {
            Some(best) if !best.is_zero() && !self.is_empty() => {
                self.slippage / best * Decimal::from(10_000)
            }
            _ => Decimal::ZERO,
        }
    }
}

/// One scheduled buy+sell pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationRound {
    /// Wall-clock time of the round (unix milliseconds).
    pub at_ms: i64,
    /// Quantity simulated in both directions.
    pub quantity: Decimal,
    /// Market buy result.
    pub buy: FillReport,
    /// Market sell result.
    pub sell: FillReport,
}
