//! Market snapshot capture.
//!
//! Connector-side tasks publish per-exchange order books into the
//! [`SnapshotStore`]; once per cycle the orchestrator captures a
//! [`MarketSnapshot`], a frozen clone of every book. Detectors and the
//! risk engine only ever see the frozen view, so a book updating mid-cycle
//! can never produce a signal priced against two different states.

use arb_engine_core::OrderBook;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// A frozen view of every known order book, captured at one instant.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    /// When the snapshot was captured.
    pub captured_at: DateTime<Utc>,
    books: HashMap<(String, String), OrderBook>,
}

impl MarketSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new(captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            books: HashMap::new(),
        }
    }

    /// Inserts a book, replacing any previous book for the same
    /// exchange/symbol.
    pub fn insert(&mut self, book: OrderBook) {
        self.books
            .insert((book.exchange.clone(), book.symbol.clone()), book);
    }

    /// Returns the book for an exchange/symbol, if present.
    #[must_use]
    pub fn get(&self, exchange: &str, symbol: &str) -> Option<&OrderBook> {
        self.books
            .get(&(exchange.to_string(), symbol.to_string()))
    }

    /// Returns every book for a symbol across exchanges, ordered by
    /// exchange name for deterministic pair enumeration.
    #[must_use]
    pub fn books_for_symbol(&self, symbol: &str) -> Vec<&OrderBook> {
        let mut books: Vec<&OrderBook> = self
            .books
            .values()
            .filter(|book| book.symbol == symbol)
            .collect();
        books.sort_by(|a, b| a.exchange.cmp(&b.exchange));
        books
    }

    /// Returns every distinct symbol, sorted.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .books
            .keys()
            .map(|(_, symbol)| symbol.clone())
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }

    /// Number of books in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// True when no books were captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

/// Shared store connector tasks write into and the cycle reads from.
///
/// Writers hold the lock per book; the reader clones the whole map once
/// per cycle. This is the engine's only concurrent boundary.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    books: RwLock<HashMap<(String, String), OrderBook>>,
}

impl SnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a book, replacing the previous one for its
    /// exchange/symbol.
    pub fn publish(&self, book: OrderBook) {
        self.books
            .write()
            .insert((book.exchange.clone(), book.symbol.clone()), book);
    }

    /// Captures a frozen snapshot of every published book.
    #[must_use]
    pub fn capture(&self, now: DateTime<Utc>) -> MarketSnapshot {
        MarketSnapshot {
            captured_at: now,
            books: self.books.read().clone(),
        }
    }

    /// Drops every published book.
    pub fn clear(&self) {
        self.books.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_engine_core::PriceLevel;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn book(exchange: &str, symbol: &str) -> OrderBook {
        OrderBook::new(
            exchange,
            symbol,
            t0(),
            vec![PriceLevel::new(dec!(99), dec!(1))],
            vec![PriceLevel::new(dec!(100), dec!(1))],
        )
    }

    #[test]
    fn test_publish_and_capture() {
        let store = SnapshotStore::new();
        store.publish(book("binance", "BTC/USDT"));
        store.publish(book("kraken", "BTC/USDT"));

        let snapshot = store.capture(t0());
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.get("binance", "BTC/USDT").is_some());
        assert!(snapshot.get("bybit", "BTC/USDT").is_none());
    }

    #[test]
    fn test_capture_is_frozen() {
        let store = SnapshotStore::new();
        store.publish(book("binance", "BTC/USDT"));
        let snapshot = store.capture(t0());

        // A publish after capture must not appear in the frozen view.
        store.publish(book("kraken", "BTC/USDT"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.capture(t0()).len(), 2);
    }

    #[test]
    fn test_republish_replaces() {
        let store = SnapshotStore::new();
        store.publish(book("binance", "BTC/USDT"));
        let mut updated = book("binance", "BTC/USDT");
        updated.asks[0].price = dec!(101);
        store.publish(updated);

        let snapshot = store.capture(t0());
        assert_eq!(snapshot.len(), 1);
        let stored = snapshot.get("binance", "BTC/USDT").unwrap();
        assert_eq!(stored.best_ask(), Some(dec!(101)));
    }

    #[test]
    fn test_books_for_symbol_sorted_by_exchange() {
        let store = SnapshotStore::new();
        store.publish(book("kraken", "BTC/USDT"));
        store.publish(book("binance", "BTC/USDT"));
        store.publish(book("binance", "ETH/USDT"));

        let snapshot = store.capture(t0());
        let books = snapshot.books_for_symbol("BTC/USDT");
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].exchange, "binance");
        assert_eq!(books[1].exchange, "kraken");
        assert_eq!(snapshot.symbols(), vec!["BTC/USDT", "ETH/USDT"]);
    }
}
