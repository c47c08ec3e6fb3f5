//! Order book types and data structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strum::{Display, EnumString};

/// Side of the book a level rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Resting buy interest.
    #[strum(to_string = "bid", serialize = "bids", serialize = "BID")]
    Bid,
    /// Resting sell interest.
    #[strum(to_string = "ask", serialize = "asks", serialize = "ASK")]
    Ask,
}

/// Single price level in an order book.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceLevel {
    /// Price at this level.
    pub price: Decimal,
    /// Total size available at this price.
    pub size: Decimal,
}

impl PriceLevel {
    /// Create a new price level.
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Replacement of one price level. A zero size removes the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelUpdate {
    /// Book side.
    pub side: Side,
    /// Level price.
    pub price: Decimal,
    /// New resting size.
    pub size: Decimal,
}

impl LevelUpdate {
    /// Update for the bid side.
    pub fn bid(price: Decimal, size: Decimal) -> Self {
        Self { side: Side::Bid, price, size }
    }

    /// Update for the ask side.
    pub fn ask(price: Decimal, size: Decimal) -> Self {
        Self { side: Side::Ask, price, size }
    }
}

/// How a [`BookUpdate`] relates to the current book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UpdateKind {
    /// Full image: the book is cleared before the levels are applied.
    #[strum(serialize = "snapshot")]
    Snapshot,
    /// Incremental change applied on top of the current book.
    #[strum(serialize = "delta")]
    Delta,
}

/// Levels carried by one feed message. `books5` pushes at most 10.
pub type LevelBatch = SmallVec<[LevelUpdate; 10]>;

/// One decoded feed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookUpdate {
    /// Snapshot or delta.
    pub kind: UpdateKind,
    /// Venue timestamp in milliseconds, when provided.
    pub ts_ms: Option<i64>,
    /// Level replacements, bids and asks mixed.
    pub levels: LevelBatch,
}

impl BookUpdate {
    /// Create a full-book snapshot.
    pub fn snapshot(levels: impl IntoIterator<Item = LevelUpdate>) -> Self {
        Self {
            kind: UpdateKind::Snapshot,
            ts_ms: None,
            levels: levels.into_iter().collect(),
        }
    }

    /// Create an incremental update.
    pub fn delta(levels: impl IntoIterator<Item = LevelUpdate>) -> Self {
        Self {
            kind: UpdateKind::Delta,
            ts_ms: None,
            levels: levels.into_iter().collect(),
        }
    }

    /// Attach the venue timestamp.
    pub fn with_timestamp(mut self, ts_ms: i64) -> Self {
        self.ts_ms = Some(ts_ms);
        self
    }

    /// Whether this update replaces the whole book.
    pub fn is_snapshot(&self) -> bool {
        self.kind == UpdateKind::Snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[test]
    fn price_level_creation() {
        let level = PriceLevel::new(dec!(100.5), dec!(2));
        assert_eq!(level.price, dec!(100.5));
        assert_eq!(level.size, dec!(2));
    }

    #[test]
    fn side_parses_feed_names() {
        assert_eq!(Side::from_str("bids").unwrap(), Side::Bid);
        assert_eq!(Side::from_str("asks").unwrap(), Side::Ask);
        assert_eq!(Side::Bid.to_string(), "bid");
        assert!(Side::from_str("mid").is_err());
    }

    #[test]
    fn book_update_builders() {
        let update = BookUpdate::delta([
            LevelUpdate::bid(dec!(99), dec!(1)),
            LevelUpdate::ask(dec!(101), dec!(0)),
        ])
        .with_timestamp(1_700_000_000_000);

        assert!(!update.is_snapshot());
        assert_eq!(update.ts_ms, Some(1_700_000_000_000));
        assert_eq!(update.levels.len(), 2);
        assert_eq!(update.levels[1].side, Side::Ask);
    }
}
