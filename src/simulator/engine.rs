//! Market-order execution simulation by walking the book.

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use super::report::{Direction, FillReport};
use crate::error::SimulationError;
use crate::metrics;
use crate::orderbook::{OrderBook, PriceLevel, SharedOrderBook, Side};

/// Read access to sorted resting liquidity.
pub trait LiquiditySource {
    /// Bids, best (highest) first.
    fn sorted_bids(&self) -> Vec<PriceLevel>;

    /// Asks, best (lowest) first.
    fn sorted_asks(&self) -> Vec<PriceLevel>;

    /// Levels a market order in `direction` would consume, best first.
    fn opposite_levels(&self, direction: Direction) -> Vec<PriceLevel> {
        match direction.opposite_side() {
            Side::Ask => self.sorted_asks(),
            Side::Bid => self.sorted_bids(),
        }
    }
}

impl LiquiditySource for OrderBook {
    fn sorted_bids(&self) -> Vec<PriceLevel> {
        self.snapshot_bids()
    }

    fn sorted_asks(&self) -> Vec<PriceLevel> {
        self.snapshot_asks()
    }

    fn opposite_levels(&self, direction: Direction) -> Vec<PriceLevel> {
        self.snapshot(direction.opposite_side())
    }
}

impl LiquiditySource for SharedOrderBook {
    fn sorted_bids(&self) -> Vec<PriceLevel> {
        self.snapshot_bids()
    }

    fn sorted_asks(&self) -> Vec<PriceLevel> {
        self.snapshot_asks()
    }

    fn opposite_levels(&self, direction: Direction) -> Vec<PriceLevel> {
        self.with_book(|book| book.snapshot(direction.opposite_side()))
    }
}

impl<T: LiquiditySource + ?Sized> LiquiditySource for &T {
    fn sorted_bids(&self) -> Vec<PriceLevel> {
        (**self).sorted_bids()
    }

    fn sorted_asks(&self) -> Vec<PriceLevel> {
        (**self).sorted_asks()
    }

    fn opposite_levels(&self, direction: Direction) -> Vec<PriceLevel> {
        (**self).opposite_levels(direction)
    }
}

/// Fill `quantity` against `levels` (best first) and price the result.
///
/// An empty slice yields an unfilled report; running out of depth yields a
/// partial one. Only a non-positive quantity is an error.
pub fn walk_levels(
    direction: Direction,
    levels: &[PriceLevel],
    quantity: Decimal,
    taker_fee_rate: Decimal,
) -> Result<FillReport, SimulationError> {
    if quantity <= Decimal::ZERO {
        return Err(SimulationError::InvalidQuantity(quantity));
    }

    let Some(best) = levels.first() else {
        return Ok(FillReport::unfilled(direction, quantity));
    };

    let mut remaining = quantity;
    let mut executed = Decimal::ZERO;
    let mut total_cost = Decimal::ZERO;
    let mut levels_consumed = 0usize;

    for level in levels {
        if remaining.is_zero() {
            break;
        }

        let fill_size = remaining.min(level.size);
        total_cost += fill_size * level.price;
        executed += fill_size;
        remaining -= fill_size;
        levels_consumed += 1;
    }

    let (average_price, slippage) = if executed.is_zero() {
        (Decimal::ZERO, Decimal::ZERO)
    } else {
        let average_price = total_cost / executed;
        (average_price, average_price - best.price)
    };

    Ok(FillReport {
        direction,
        requested_quantity: quantity,
        executed_quantity: executed,
        average_price,
        total_cost,
        slippage,
        fee: total_cost * taker_fee_rate,
        remaining_quantity: remaining,
        best_price: Some(best.price),
        levels_consumed,
    })
}

/// Prices hypothetical market orders against a live book.
#[derive(Debug, Clone)]
pub struct ExecutionSimulator<S> {
    book: S,
    taker_fee_rate: Decimal,
}

impl<S: LiquiditySource> ExecutionSimulator<S> {
    /// Default taker fee: 0.06%.
    pub const DEFAULT_TAKER_FEE_RATE: Decimal = Decimal::from_parts(6, 0, 0, false, 4);

    /// Create a simulator with the default taker fee.
    pub fn new(book: S) -> Self {
        Self {
            book,
            taker_fee_rate: Self::DEFAULT_TAKER_FEE_RATE,
        }
    }

    /// Set the taker fee rate.
    pub fn with_fee_rate(mut self, taker_fee_rate: Decimal) -> Self {
        self.taker_fee_rate = taker_fee_rate;
        self
    }

    /// Configured taker fee rate.
    pub fn taker_fee_rate(&self) -> Decimal {
        self.taker_fee_rate
    }

    /// Liquidity source this simulator reads.
    pub fn book(&self) -> &S {
        &self.book
    }

    /// Simulate a market order of `quantity` in `direction`.
    ///
    /// Reads one sorted view of the opposite side and never mutates the book.
    #[instrument(skip(self), fields(direction = %direction, quantity = %quantity))]
    pub fn simulate(
        &self,
        direction: Direction,
        quantity: Decimal,
    ) -> Result<FillReport, SimulationError> {
        let _timer = metrics::timer_simulation();
        let levels = self.book.opposite_levels(direction);
        let report = walk_levels(direction, &levels, quantity, self.taker_fee_rate)?;

        metrics::inc_simulations(direction);
        if report.is_partial() {
            metrics::inc_partial_fills();
        }

        debug!(
            executed = %report.executed_quantity,
            avg_price = %report.average_price,
            remaining = %report.remaining_quantity,
            levels = report.levels_consumed,
            "Simulation complete"
        );

        Ok(report)
    }

    /// Simulate a market buy.
    pub fn simulate_buy(&self, quantity: Decimal) -> Result<FillReport, SimulationError> {
        self.simulate(Direction::Buy, quantity)
    }

    /// Simulate a market sell.
    pub fn simulate_sell(&self, quantity: Decimal) -> Result<FillReport, SimulationError> {
        self.simulate(Direction::Sell, quantity)
    }
}
