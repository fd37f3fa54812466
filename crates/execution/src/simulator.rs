//! Order-book-walking fill simulation.
//!
//! A market order consumes levels in the book's consumption order (asks
//! ascending for buys, bids descending for sells) until the requested
//! quantity is filled or liquidity runs out. The fill price is the
//! volume-weighted average over the consumed levels, so large orders pay
//! realistic slippage instead of the top-of-book price.

use arb_engine_core::{Order, OrderBook, OrderStatus, Side, TradeResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::time::Instant;
use tracing::debug;

/// Splits a "BASE/QUOTE" symbol. Symbols without a separator keep the
/// whole string as the base and an empty quote.
#[must_use]
pub fn split_symbol(symbol: &str) -> (&str, &str) {
    symbol.split_once('/').unwrap_or((symbol, ""))
}

/// Simulates market-order fills against order book snapshots.
#[derive(Debug, Clone)]
pub struct FillSimulator {
    /// Taker fee, percent of the received asset.
    taker_fee_pct: Decimal,
}

impl FillSimulator {
    /// Fills within this fraction of the requested quantity count as
    /// complete; guards quantization residue from level arithmetic.
    fn fill_epsilon() -> Decimal {
        Decimal::new(1, 9)
    }

    /// Creates a simulator charging `taker_fee_pct` percent per fill.
    #[must_use]
    pub const fn new(taker_fee_pct: Decimal) -> Self {
        Self { taker_fee_pct }
    }

    /// Simulates filling `order` against `book`, resolving at `now`.
    ///
    /// The fee is charged on the received asset: buys pay in the base
    /// asset on the filled quantity, sells pay in the quote asset on the
    /// proceeds. Wall-clock latency is recorded but never affects fills.
    #[must_use]
    pub fn simulate_fill(&self, order: Order, book: &OrderBook, now: DateTime<Utc>) -> TradeResult {
        let started = Instant::now();

        let mut remaining = order.quantity;
        let mut total_cost = Decimal::ZERO;
        let mut filled_quantity = Decimal::ZERO;

        for level in book.levels_for(order.side) {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = level.quantity.min(remaining);
            if take <= Decimal::ZERO {
                continue;
            }
            total_cost += take * level.price;
            filled_quantity += take;
            remaining -= take;
        }

        let filled_price = if filled_quantity > Decimal::ZERO {
            total_cost / filled_quantity
        } else {
            Decimal::ZERO
        };

        let status = if filled_quantity <= Decimal::ZERO {
            OrderStatus::Failed
        } else if order.quantity - filled_quantity > Self::fill_epsilon() {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::Filled
        };

        let (base, quote) = split_symbol(&order.symbol);
        let fee_rate = self.taker_fee_pct / Decimal::ONE_HUNDRED;
        let (fee, fee_asset) = match order.side {
            Side::Buy => (filled_quantity * fee_rate, base.to_string()),
            Side::Sell => (total_cost * fee_rate, quote.to_string()),
        };

        let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;
        debug!(
            exchange = %order.exchange,
            symbol = %order.symbol,
            side = %order.side,
            requested = %order.quantity,
            filled = %filled_quantity,
            vwap = %filled_price,
            status = %status,
            "Simulated fill"
        );

        let order = Order { status, ..order };
        TradeResult {
            order,
            filled_quantity,
            filled_price,
            fee,
            fee_asset,
            latency_ms,
            filled_at: now,
        }
    }
}
