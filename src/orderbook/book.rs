//! Replace-semantics L2 order book for a single instrument.
//!
//! Each side is a `BTreeMap` keyed by price, so the sorted views are plain
//! in-order traversals: bids are read back to front, asks front to back.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use super::types::{BookUpdate, LevelUpdate, PriceLevel, Side};
use crate::metrics;

/// L2 book state maintained from feed updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBook {
    /// Bid levels: price -> size.
    bids: BTreeMap<Decimal, Decimal>,
    /// Ask levels: price -> size.
    asks: BTreeMap<Decimal, Decimal>,
    /// Venue timestamp of the last applied update (milliseconds).
    last_update_ms: Option<i64>,
    /// Number of feed messages applied.
    updates_applied: u64,
}

impl OrderBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the size resting at `price` on `side`.
    ///
    /// A zero (or negative) size removes the level; removing an absent level
    /// is a no-op. A non-positive price is ignored. Returns whether the book
    /// changed.
    pub fn apply_level_update(&mut self, side: Side, price: Decimal, size: Decimal) -> bool {
        if price <= Decimal::ZERO {
            debug!(%side, %price, %size, "Ignoring level with non-positive price");
            metrics::inc_levels_rejected();
            return false;
        }

        if size < Decimal::ZERO {
            debug!(%side, %price, %size, "Negative size treated as removal");
            metrics::inc_levels_rejected();
        }

        let levels = self.side_mut(side);
        if size <= Decimal::ZERO {
            levels.remove(&price).is_some()
        } else {
            levels.insert(price, size) != Some(size)
        }
    }

    /// Apply one decoded feed message.
    ///
    /// A snapshot clears both sides first. Returns the number of levels that
    /// changed the book.
    pub fn apply(&mut self, update: &BookUpdate) -> usize {
        if update.is_snapshot() {
            self.clear();
        }

        let changed = update
            .levels
            .iter()
            .filter(|level| self.apply_level(level))
            .count();

        if update.ts_ms.is_some() {
            self.last_update_ms = update.ts_ms;
        }
        self.updates_applied += 1;

        changed
    }

    fn apply_level(&mut self, level: &LevelUpdate) -> bool {
        self.apply_level_update(level.side, level.price, level.size)
    }

    /// Drop every level on both sides.
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    /// Bids sorted by price descending (best bid first).
    pub fn snapshot_bids(&self) -> Vec<PriceLevel> {
        self.bids
            .iter()
            .rev()
            .map(|(&price, &size)| PriceLevel { price, size })
            .collect()
    }

    /// Asks sorted by price ascending (best ask first).
    pub fn snapshot_asks(&self) -> Vec<PriceLevel> {
        self.asks
            .iter()
            .map(|(&price, &size)| PriceLevel { price, size })
            .collect()
    }

    /// Sorted view of one side.
    pub fn snapshot(&self, side: Side) -> Vec<PriceLevel> {
        match side {
            Side::Bid => self.snapshot_bids(),
            Side::Ask => self.snapshot_asks(),
        }
    }

    /// Best `n` bids.
    pub fn top_bids(&self, n: usize) -> Vec<PriceLevel> {
        self.bids
            .iter()
            .rev()
            .take(n)
            .map(|(&price, &size)| PriceLevel { price, size })
            .collect()
    }

    /// Best `n` asks.
    pub fn top_asks(&self, n: usize) -> Vec<PriceLevel> {
        self.asks
            .iter()
            .take(n)
            .map(|(&price, &size)| PriceLevel { price, size })
            .collect()
    }

    /// Get the best bid level.
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids
            .last_key_value()
            .map(|(&price, &size)| PriceLevel { price, size })
    }

    /// Get the best ask level.
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks
            .first_key_value()
            .map(|(&price, &size)| PriceLevel { price, size })
    }

    /// Get the spread between best bid and ask.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Midpoint of best bid and ask.
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::TWO),
            _ => None,
        }
    }

    /// Check if the book is crossed (best_ask <= best_bid).
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => ask.price <= bid.price,
            _ => false,
        }
    }

    /// Total resting size on the bid side.
    pub fn bid_depth(&self) -> Decimal {
        self.bids.values().copied().sum()
    }

    /// Total resting size on the ask side.
    pub fn ask_depth(&self) -> Decimal {
        self.asks.values().copied().sum()
    }

    /// Number of levels on a side.
    pub fn level_count(&self, side: Side) -> usize {
        self.side_ref(side).len()
    }

    /// Total number of levels across both sides.
    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    /// True when neither side has liquidity.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// True when both sides have liquidity.
    pub fn is_two_sided(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }

    /// Venue timestamp of the last applied update.
    pub fn last_update_ms(&self) -> Option<i64> {
        self.last_update_ms
    }

    /// Number of feed messages applied since creation.
    pub fn updates_applied(&self) -> u64 {
        self.updates_applied
    }

    fn side_ref(&self, side: Side) -> &BTreeMap<Decimal, Decimal> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<Decimal, Decimal> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }
}
