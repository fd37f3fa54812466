//! Historical tick loading.
//!
//! A tick is every order book recorded at one instant. Ticks replay in
//! chronological order through the same pipeline the live engine runs.

use anyhow::{Context, Result};
use arb_engine_core::{OrderBook, PriceLevel};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;

/// All order books recorded at one instant.
#[derive(Debug, Clone)]
pub struct RecordedTick {
    /// Recording timestamp, shared by every book in the tick.
    pub at: DateTime<Utc>,
    /// One book per exchange/symbol.
    pub books: Vec<OrderBook>,
}

/// Streams recorded ticks in chronological order.
#[async_trait]
pub trait TickProvider: Send {
    /// Returns the next tick, or `None` at end of data.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying source fails mid-stream.
    async fn next_tick(&mut self) -> Result<Option<RecordedTick>>;
}

/// In-memory tick provider over pre-loaded data.
pub struct HistoricalTickProvider {
    ticks: Vec<RecordedTick>,
    current_index: usize,
}

impl HistoricalTickProvider {
    /// Creates a provider over ticks already in chronological order.
    #[must_use]
    pub fn from_ticks(ticks: Vec<RecordedTick>) -> Self {
        Self {
            ticks,
            current_index: 0,
        }
    }

    /// Loads ticks from a CSV file.
    ///
    /// Expected columns:
    /// `timestamp,exchange,symbol,bid_price,bid_quantity,ask_price,ask_quantity`.
    /// Rows sharing a timestamp form one tick; repeated exchange/symbol
    /// rows within a tick add book levels. Rows may arrive in any order.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened, a row is missing
    /// columns, or timestamp/decimal parsing fails.
    pub fn from_csv(path: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("opening tick data at {path}"))?;

        // (timestamp, exchange, symbol) → (bids, asks); BTreeMap gives
        // chronological ticks for free.
        type SideLevels = (Vec<PriceLevel>, Vec<PriceLevel>);
        let mut grouped: BTreeMap<DateTime<Utc>, BTreeMap<(String, String), SideLevels>> =
            BTreeMap::new();

        for (line, result) in reader.records().enumerate() {
            let record = result?;
            let field = |i: usize| -> Result<&str> {
                record
                    .get(i)
                    .with_context(|| format!("row {line}: missing column {i}"))
            };
            let timestamp: DateTime<Utc> = field(0)?
                .parse()
                .with_context(|| format!("row {line}: bad timestamp"))?;
            let exchange = field(1)?.to_string();
            let symbol = field(2)?.to_string();
            let bid_price = Decimal::from_str(field(3)?)?;
            let bid_quantity = Decimal::from_str(field(4)?)?;
            let ask_price = Decimal::from_str(field(5)?)?;
            let ask_quantity = Decimal::from_str(field(6)?)?;

            let (bids, asks) = grouped
                .entry(timestamp)
                .or_default()
                .entry((exchange, symbol))
                .or_default();
            if bid_quantity > Decimal::ZERO {
                bids.push(PriceLevel::new(bid_price, bid_quantity));
            }
            if ask_quantity > Decimal::ZERO {
                asks.push(PriceLevel::new(ask_price, ask_quantity));
            }
        }

        let ticks = grouped
            .into_iter()
            .map(|(at, books)| {
                let books = books
                    .into_iter()
                    .map(|((exchange, symbol), (mut bids, mut asks))| {
                        // Book invariant: bids descending, asks ascending.
                        bids.sort_by(|a, b| b.price.cmp(&a.price));
                        asks.sort_by(|a, b| a.price.cmp(&b.price));
                        OrderBook::new(exchange, symbol, at, bids, asks)
                    })
                    .collect();
                RecordedTick { at, books }
            })
            .collect();

        Ok(Self::from_ticks(ticks))
    }

    /// Number of ticks remaining.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.ticks.len() - self.current_index
    }
}

#[async_trait]
impl TickProvider for HistoricalTickProvider {
    async fn next_tick(&mut self) -> Result<Option<RecordedTick>> {
        if self.current_index < self.ticks.len() {
            let tick = self.ticks[self.current_index].clone();
            self.current_index += 1;
            Ok(Some(tick))
        } else {
            Ok(None)
        }
    }
}
