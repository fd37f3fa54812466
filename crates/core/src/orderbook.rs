//! Order book snapshot data model.
//!
//! An [`OrderBook`] is an immutable per-exchange snapshot with bids sorted
//! strictly descending and asks strictly ascending. All derived quantities
//! degrade to zero on empty sides instead of failing, so detectors can run
//! against sparse connector data without special-casing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Side;

/// A single price level in an order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price of this level.
    pub price: Decimal,
    /// Quantity available at this price.
    pub quantity: Decimal,
}

impl PriceLevel {
    /// Creates a new price level.
    #[must_use]
    pub const fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }

    /// Returns the notional value (price × quantity) of this level.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// An immutable order book snapshot for one symbol on one exchange.
///
/// Invariant: `bids` are sorted descending by price, `asks` ascending.
/// Constructors from connector data are expected to uphold this; the fill
/// simulator and depth queries rely on it and never re-sort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    /// Exchange name (e.g., "binance").
    pub exchange: String,
    /// Trading pair symbol (e.g., "BTC/USDT").
    pub symbol: String,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Bid levels, descending by price.
    pub bids: Vec<PriceLevel>,
    /// Ask levels, ascending by price.
    pub asks: Vec<PriceLevel>,
}

impl OrderBook {
    /// Creates a new order book snapshot.
    #[must_use]
    pub fn new(
        exchange: impl Into<String>,
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            symbol: symbol.into(),
            timestamp,
            bids,
            asks,
        }
    }

    /// Returns the best (highest) bid price, if any.
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Returns the best (lowest) ask price, if any.
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Returns the mid price, or zero when either side is empty.
    #[must_use]
    pub fn mid_price(&self) -> Decimal {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => (bid + ask) / Decimal::TWO,
            _ => Decimal::ZERO,
        }
    }

    /// Returns the absolute bid/ask spread, or zero when either side is empty.
    #[must_use]
    pub fn spread_abs(&self) -> Decimal {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => ask - bid,
            _ => Decimal::ZERO,
        }
    }

    /// Returns the spread as a percentage of the mid price.
    ///
    /// Zero when the mid price is zero.
    #[must_use]
    pub fn spread_pct(&self) -> Decimal {
        let mid = self.mid_price();
        if mid == Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.spread_abs() / mid * Decimal::ONE_HUNDRED
    }

    /// Returns the levels that an order on `side` would consume.
    ///
    /// A buy consumes asks, a sell consumes bids. Both come pre-sorted in
    /// consumption order by the book invariant.
    #[must_use]
    pub fn levels_for(&self, side: Side) -> &[PriceLevel] {
        match side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        }
    }

    /// Returns the depth-weighted average price for taking liquidity on
    /// `side` up to `budget_usd` of notional.
    ///
    /// Walks levels in consumption order, accumulating notional until the
    /// budget is exhausted. Returns zero when the side is empty or the
    /// budget is non-positive.
    #[must_use]
    pub fn depth_weighted_price(&self, side: Side, budget_usd: Decimal) -> Decimal {
        if budget_usd <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let mut remaining = budget_usd;
        let mut total_cost = Decimal::ZERO;
        let mut total_qty = Decimal::ZERO;

        for level in self.levels_for(side) {
            if remaining <= Decimal::ZERO {
                break;
            }
            let level_notional = level.notional();
            if level_notional <= Decimal::ZERO {
                continue;
            }
            let take_notional = level_notional.min(remaining);
            let take_qty = take_notional / level.price;

            total_cost += take_notional;
            total_qty += take_qty;
            remaining -= take_notional;
        }

        if total_qty == Decimal::ZERO {
            Decimal::ZERO
        } else {
            total_cost / total_qty
        }
    }

    /// Returns the total notional depth available on `side`, in USD.
    #[must_use]
    pub fn total_depth_usd(&self, side: Side) -> Decimal {
        self.levels_for(side)
            .iter()
            .map(PriceLevel::notional)
            .sum()
    }

    /// Returns the total quantity available on `side`.
    #[must_use]
    pub fn total_quantity(&self, side: Side) -> Decimal {
        self.levels_for(side).iter().map(|l| l.quantity).sum()
    }

    /// Returns the snapshot age in whole seconds relative to `now`.
    ///
    /// Negative ages (snapshot from the future, e.g. clock skew) clamp to
    /// zero.
    #[must_use]
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.timestamp).num_seconds().max(0)
    }
}
