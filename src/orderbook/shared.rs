//! Shared handle to the live order book.
//!
//! The feed task is the only writer: decoded messages arrive over a channel
//! and each one is applied under a single write lock, so readers never see a
//! half-applied update. One update corresponds to one payload of a feed frame.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::book::OrderBook;
use super::types::{BookUpdate, PriceLevel, Side};
use crate::metrics;

/// Cloneable handle to one [`OrderBook`].
#[derive(Debug, Clone, Default)]
pub struct SharedOrderBook {
    inner: Arc<RwLock<OrderBook>>,
}

impl SharedOrderBook {
    /// Create a handle around an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle around an existing book.
    pub fn from_book(book: OrderBook) -> Self {
        Self {
            inner: Arc::new(RwLock::new(book)),
        }
    }

    // Nothing inside `OrderBook::apply` can panic: it only touches the two
    // maps and plain counters. A poisoned lock is therefore safe to reuse.
    fn read(&self) -> RwLockReadGuard<'_, OrderBook> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, OrderBook> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one feed message atomically with respect to readers.
    pub fn apply(&self, update: &BookUpdate) -> usize {
        let changed = self.write().apply(update);
        metrics::inc_book_updates_applied();
        changed
    }

    /// Replace a single level.
    pub fn apply_level_update(&self, side: Side, price: Decimal, size: Decimal) -> bool {
        self.write().apply_level_update(side, price, size)
    }

    /// Sorted bids at call time.
    pub fn snapshot_bids(&self) -> Vec<PriceLevel> {
        self.read().snapshot_bids()
    }

    /// Sorted asks at call time.
    pub fn snapshot_asks(&self) -> Vec<PriceLevel> {
        self.read().snapshot_asks()
    }

    /// Run a closure against a consistent view of the book.
    pub fn with_book<R>(&self, f: impl FnOnce(&OrderBook) -> R) -> R {
        f(&self.read())
    }

    /// True when both sides have liquidity.
    pub fn is_ready(&self) -> bool {
        self.read().is_two_sided()
    }

    /// Apply updates from the feed until the sender side closes.
    ///
    /// Returns the number of messages applied.
    pub async fn consume(self, mut updates: mpsc::Receiver<BookUpdate>) -> u64 {
        let mut applied = 0u64;

        while let Some(update) = updates.recv().await {
            let start = Instant::now();
            let changed = self.apply(&update);
            applied += 1;

            debug!(
                kind = %update.kind,
                levels = update.levels.len(),
                changed,
                elapsed_us = start.elapsed().as_micros() as u64,
                "Applied book update"
            );

            if applied == 1 {
                let (best_bid, best_ask, levels) =
                    self.with_book(|b| (b.best_bid(), b.best_ask(), b.len()));
                info!(?best_bid, ?best_ask, levels, "First book update applied");
            }
        }

        info!(applied, "Feed channel closed, book writer stopping");
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::types::LevelUpdate;
    use rust_decimal_macros::dec;

    #[test]
    fn handle_clones_share_state() {
        let book = SharedOrderBook::new();
        let reader = book.clone();

        book.apply(&BookUpdate::delta([LevelUpdate::ask(dec!(100), dec!(1))]));

        assert_eq!(reader.snapshot_asks(), vec![PriceLevel::new(dec!(100), dec!(1))]);
        assert!(!reader.is_ready());

        book.apply_level_update(Side::Bid, dec!(99), dec!(2));
        assert!(reader.is_ready());
    }

    #[test]
    fn readers_never_observe_partial_message() {
        let book = SharedOrderBook::new();
        book.apply(&BookUpdate::snapshot([
            LevelUpdate::bid(dec!(1), dec!(1)),
            LevelUpdate::ask(dec!(2), dec!(1)),
        ]));

        let writer = book.clone();
        let handle = std::thread::spawn(move || {
            for i in 0..500u32 {
                // Every message moves both sides together: bid = k, ask = k + 1.
                let k = Decimal::from(i % 50 + 1);
                writer.apply(&BookUpdate::snapshot([
                    LevelUpdate::bid(k, dec!(1)),
                    LevelUpdate::ask(k + dec!(1), dec!(1)),
                ]));
            }
        });

        for _ in 0..500 {
            let (bid, ask) = book.with_book(|b| (b.best_bid(), b.best_ask()));
            let (bid, ask) = (bid.expect("bid side"), ask.expect("ask side"));
            assert_eq!(ask.price - bid.price, dec!(1));
        }

        handle.join().expect("writer thread");
    }

    #[tokio::test]
    async fn consume_applies_until_channel_closes() {
        let book = SharedOrderBook::new();
        let (tx, rx) = mpsc::channel(8);

        let writer = tokio::spawn(book.clone().consume(rx));

        tx.send(BookUpdate::snapshot([
            LevelUpdate::bid(dec!(99), dec!(1)),
            LevelUpdate::ask(dec!(101), dec!(1)),
        ]))
        .await
        .unwrap();
        tx.send(BookUpdate::delta([LevelUpdate::ask(dec!(101), dec!(0))]))
            .await
            .unwrap();
        drop(tx);

        let applied = writer.await.unwrap();
        assert_eq!(applied, 2);
        assert!(book.snapshot_asks().is_empty());
        assert_eq!(book.snapshot_bids().len(), 1);
    }

    #[test]
    fn clones_share_one_book() {
        let book = SharedOrderBook::from_book(OrderBook::new());
        let reader = book.clone();
        book.apply_level_update(Side::Bid, dec!(10), dec!(1));

        assert_eq!(reader.with_book(|b| b.len()), 1);
        assert!(!reader.is_ready());
    }

    #[test]
    fn consume_drains_buffered_updates() {
        let book = SharedOrderBook::new();
        let (tx, rx) = mpsc::channel(4);
        tx.try_send(BookUpdate::delta([LevelUpdate::bid(dec!(5), dec!(1))]))
            .unwrap();
        tx.try_send(BookUpdate::delta([LevelUpdate::bid(dec!(6), dec!(1))]))
            .unwrap();
        drop(tx);

        let applied = tokio_test::block_on(book.clone().consume(rx));

        assert_eq!(applied, 2);
        assert_eq!(book.with_book(|b| b.best_bid()).map(|l| l.price), Some(dec!(6)));
    }
}
