//! Shared types for cross-exchange arbitrage operations.
//!
//! This module defines the signal, order, and fill structures that flow
//! between detectors, the risk engine, and executors.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// =============================================================================
// Side / Order Enums
// =============================================================================

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Taking liquidity from the ask side.
    Buy,
    /// Taking liquidity from the bid side.
    Sell,
}

impl Side {
    /// Returns the opposite side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Returns the display string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Execute immediately at the best available prices.
    Market,
    /// Execute at the given price or better.
    Limit,
}

/// Fill status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created but not yet resolved.
    Pending,
    /// Fully filled.
    Filled,
    /// Partially filled; the remainder could not be sourced.
    PartiallyFilled,
    /// Nothing filled (empty book side or no achievable liquidity).
    Failed,
}

impl OrderStatus {
    /// Returns the display string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Filled => "FILLED",
            Self::PartiallyFilled => "PARTIAL",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Orders and Fills
// =============================================================================

/// An order submitted to an executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order id.
    pub id: Uuid,
    /// Exchange the order targets.
    pub exchange: String,
    /// Trading pair symbol.
    pub symbol: String,
    /// Buy or sell.
    pub side: Side,
    /// Market or limit.
    pub order_type: OrderType,
    /// Requested quantity in the base asset.
    pub quantity: Decimal,
    /// Limit price; `None` for market orders.
    pub price: Option<Decimal>,
    /// Current status.
    pub status: OrderStatus,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new market order in the pending state.
    #[must_use]
    pub fn market(
        exchange: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            exchange: exchange.into(),
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            status: OrderStatus::Pending,
            created_at,
        }
    }
}

/// The immutable result of executing one order leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeResult {
    /// The order this result resolves, with final status.
    pub order: Order,
    /// Quantity actually filled (base asset).
    pub filled_quantity: Decimal,
    /// Volume-weighted fill price; zero when nothing filled.
    pub filled_price: Decimal,
    /// Fee charged on the received asset.
    pub fee: Decimal,
    /// Asset the fee was charged in (base for buys, quote for sells).
    pub fee_asset: String,
    /// Wall-clock execution latency in milliseconds. Informational only.
    pub latency_ms: f64,
    /// When the fill resolved.
    pub filled_at: DateTime<Utc>,
}

impl TradeResult {
    /// Returns true if the order filled completely.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.order.status == OrderStatus::Filled
    }

    /// Returns true if anything filled at all.
    #[must_use]
    pub fn has_fill(&self) -> bool {
        self.filled_quantity > Decimal::ZERO
    }

    /// Returns the notional value of the fill (price × quantity).
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.filled_price * self.filled_quantity
    }
}

/// Result of executing all legs of a signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// One result per leg, in submission order. Legs that filled (fully or
    /// partially) are always retained here for reconciliation, even when
    /// the overall execution is incomplete.
    pub trades: Vec<TradeResult>,
    /// True when every leg filled completely.
    pub complete: bool,
}

impl ExecutionOutcome {
    /// Builds an outcome from leg results, deriving completeness.
    #[must_use]
    pub fn from_legs(trades: Vec<TradeResult>) -> Self {
        let complete = !trades.is_empty() && trades.iter().all(TradeResult::is_filled);
        Self { trades, complete }
    }

    /// Returns the total fees across all legs.
    ///
    /// Note: legs may charge fees in different assets; callers needing an
    /// exact USD figure should convert per leg.
    #[must_use]
    pub fn total_fees(&self) -> Decimal {
        self.trades.iter().map(|t| t.fee).sum()
    }
}

// =============================================================================
// Arbitrage Signals
// =============================================================================

/// Which detector family produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Same symbol priced differently across two exchanges.
    Spatial,
    /// Cointegrated pair spread mean reversion.
    Statistical,
    /// Funding-rate differential between venues.
    Funding,
    /// Three-leg cycle on one venue.
    Triangular,
}

impl Strategy {
    /// Returns the display string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spatial => "spatial",
            Self::Statistical => "statistical",
            Self::Funding => "funding",
            Self::Triangular => "triangular",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a signal.
///
/// Signals are created `Detected`. The pipeline orchestrator is the only
/// writer of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalStatus {
    /// Freshly produced by a detector.
    Detected,
    /// Accepted by risk and fully executed.
    Executed,
    /// Accepted by risk but no achievable fill.
    Missed,
    /// Rejected by the risk engine.
    Rejected,
}

impl SignalStatus {
    /// Returns the display string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Detected => "DETECTED",
            Self::Executed => "EXECUTED",
            Self::Missed => "MISSED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A candidate arbitrage opportunity produced by a detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageSignal {
    /// Unique signal id.
    pub id: Uuid,
    /// Detector family that produced this signal.
    pub strategy: Strategy,
    /// Exchange to buy on.
    pub buy_exchange: String,
    /// Exchange to sell on.
    pub sell_exchange: String,
    /// Trading pair symbol.
    pub symbol: String,
    /// Expected buy fill price.
    pub buy_price: Decimal,
    /// Expected sell fill price.
    pub sell_price: Decimal,
    /// Quantity to trade (base asset).
    pub quantity: Decimal,
    /// Spread before fees, as a percentage of the buy price.
    pub gross_spread_pct: Decimal,
    /// Spread after fees, as a percentage of the buy price.
    pub net_spread_pct: Decimal,
    /// Expected profit in USD at the signalled quantity.
    pub estimated_profit_usd: Decimal,
    /// Detector confidence in [0, 1].
    pub confidence: f64,
    /// USD depth available on the thinner side.
    pub orderbook_depth_usd: Decimal,
    /// Lifecycle status; written only by the orchestrator after creation.
    pub status: SignalStatus,
    /// When the detector produced this signal.
    pub detected_at: DateTime<Utc>,
    /// Set when the signal reaches `Executed`.
    pub executed_at: Option<DateTime<Utc>>,
    /// Free-form detector/risk annotations.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ArbitrageSignal {
    /// Creates a new signal in the `Detected` state.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        strategy: Strategy,
        buy_exchange: impl Into<String>,
        sell_exchange: impl Into<String>,
        symbol: impl Into<String>,
        buy_price: Decimal,
        sell_price: Decimal,
        quantity: Decimal,
        detected_at: DateTime<Utc>,
    ) -> Self {
        let buy_exchange = buy_exchange.into();
        let sell_exchange = sell_exchange.into();
        let symbol = symbol.into();

        let gross_spread_pct = if buy_price > Decimal::ZERO {
            (sell_price - buy_price) / buy_price * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        Self {
            id: Uuid::new_v4(),
            strategy,
            buy_exchange,
            sell_exchange,
            symbol,
            buy_price,
            sell_price,
            quantity,
            gross_spread_pct,
            net_spread_pct: gross_spread_pct,
            estimated_profit_usd: (sell_price - buy_price) * quantity,
            confidence: 0.0,
            orderbook_depth_usd: Decimal::ZERO,
            status: SignalStatus::Detected,
            detected_at,
            executed_at: None,
            metadata: HashMap::new(),
        }
    }

    /// Sets the net spread and re-derives the profit estimate.
    #[must_use]
    pub fn with_net_spread_pct(mut self, net_spread_pct: Decimal) -> Self {
        self.net_spread_pct = net_spread_pct;
        self.estimated_profit_usd =
            self.buy_price * self.quantity * net_spread_pct / Decimal::ONE_HUNDRED;
        self
    }

    /// Sets the detector confidence.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Sets the available order book depth.
    #[must_use]
    pub fn with_depth_usd(mut self, depth_usd: Decimal) -> Self {
        self.orderbook_depth_usd = depth_usd;
        self
    }

    /// Adds a metadata annotation.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns true if the net spread is positive.
    #[must_use]
    pub fn is_profitable(&self) -> bool {
        self.net_spread_pct > Decimal::ZERO
    }

    /// Returns the notional value of the buy leg in USD.
    #[must_use]
    pub fn notional_usd(&self) -> Decimal {
        self.buy_price * self.quantity
    }
}

// =============================================================================
// Boundary Types
// =============================================================================

/// A funding-rate snapshot supplied by the connector layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingRateSnapshot {
    /// Exchange name.
    pub exchange: String,
    /// Perpetual symbol.
    pub symbol: String,
    /// Current funding rate (per funding interval, as a decimal).
    pub funding_rate: Decimal,
    /// Next funding settlement time.
    pub next_funding_time: DateTime<Utc>,
    /// Exchange mark price.
    pub mark_price: Decimal,
    /// Exchange index price.
    pub index_price: Decimal,
}

/// A point-in-time view of executor holdings, consumed by the risk engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    /// Total account equity in USD.
    pub equity_usd: Decimal,
    /// Per-asset free balances.
    pub balances: HashMap<String, Decimal>,
    /// Number of open positions.
    pub open_positions: u32,
    /// Realized PnL since the daily reset.
    pub daily_pnl_usd: Decimal,
}

impl PortfolioState {
    /// Creates a portfolio state with the given equity and no positions.
    #[must_use]
    pub fn with_equity(equity_usd: Decimal) -> Self {
        Self {
            equity_usd,
            balances: HashMap::new(),
            open_positions: 0,
            daily_pnl_usd: Decimal::ZERO,
        }
    }

    /// Returns the free balance for an asset, zero when absent.
    #[must_use]
    pub fn balance(&self, asset: &str) -> Decimal {
        self.balances.get(asset).copied().unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn sample_timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn sample_signal() -> ArbitrageSignal {
        ArbitrageSignal::new(
            Strategy::Spatial,
            "binance",
            "kraken",
            "BTC/USDT",
            dec!(100),
            dec!(103),
            dec!(1),
            sample_timestamp(),
        )
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_side_display() {
        assert_eq!(format!("{}", Side::Buy), "BUY");
        assert_eq!(format!("{}", Side::Sell), "SELL");
    }

    #[test]
    fn test_order_status_display() {
        assert_eq!(OrderStatus::PartiallyFilled.as_str(), "PARTIAL");
        assert_eq!(OrderStatus::Failed.as_str(), "FAILED");
    }

    #[test]
    fn test_market_order_starts_pending() {
        let order = Order::market("binance", "BTC/USDT", Side::Buy, dec!(1), sample_timestamp());
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.order_type, OrderType::Market);
        assert!(order.price.is_none());
    }

    #[test]
    fn test_signal_new_derives_gross_spread() {
        let signal = sample_signal();
        assert_eq!(signal.status, SignalStatus::Detected);
        assert_eq!(signal.gross_spread_pct, dec!(3));
        assert_eq!(signal.estimated_profit_usd, dec!(3));
        assert!(signal.executed_at.is_none());
    }

    #[test]
    fn test_signal_zero_buy_price_yields_zero_spread() {
        let signal = ArbitrageSignal::new(
            Strategy::Spatial,
            "binance",
            "kraken",
            "BTC/USDT",
            Decimal::ZERO,
            dec!(103),
            dec!(1),
            sample_timestamp(),
        );
        assert_eq!(signal.gross_spread_pct, Decimal::ZERO);
    }

    #[test]
    fn test_signal_with_net_spread_rederives_profit() {
        let signal = sample_signal().with_net_spread_pct(dec!(2));
        assert_eq!(signal.net_spread_pct, dec!(2));
        // 100 × 1 × 2% = 2
        assert_eq!(signal.estimated_profit_usd, dec!(2));
        assert!(signal.is_profitable());
    }

    #[test]
    fn test_signal_confidence_clamped() {
        let signal = sample_signal().with_confidence(1.7);
        assert!((signal.confidence - 1.0).abs() < f64::EPSILON);
        let signal = sample_signal().with_confidence(-0.5);
        assert!(signal.confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn test_signal_metadata() {
        let signal = sample_signal().with_metadata("zscore", "-2.41");
        assert_eq!(signal.metadata.get("zscore").map(String::as_str), Some("-2.41"));
    }

    #[test]
    fn test_execution_outcome_complete() {
        let order = Order {
            status: OrderStatus::Filled,
            ..Order::market("binance", "BTC/USDT", Side::Buy, dec!(1), sample_timestamp())
        };
        let trade = TradeResult {
            order,
            filled_quantity: dec!(1),
            filled_price: dec!(100),
            fee: dec!(0.001),
            fee_asset: "BTC".to_string(),
            latency_ms: 0.3,
            filled_at: sample_timestamp(),
        };
        let outcome = ExecutionOutcome::from_legs(vec![trade]);
        assert!(outcome.complete);
        assert_eq!(outcome.total_fees(), dec!(0.001));
    }

    #[test]
    fn test_execution_outcome_incomplete_on_partial() {
        let order = Order {
            status: OrderStatus::PartiallyFilled,
            ..Order::market("binance", "BTC/USDT", Side::Buy, dec!(2), sample_timestamp())
        };
        let trade = TradeResult {
            order,
            filled_quantity: dec!(1),
            filled_price: dec!(100),
            fee: dec!(0.001),
            fee_asset: "BTC".to_string(),
            latency_ms: 0.3,
            filled_at: sample_timestamp(),
        };
        let outcome = ExecutionOutcome::from_legs(vec![trade]);
        assert!(!outcome.complete);
        // The partial leg is retained for reconciliation.
        assert_eq!(outcome.trades.len(), 1);
        assert!(outcome.trades[0].has_fill());
    }

    #[test]
    fn test_execution_outcome_empty_is_incomplete() {
        let outcome = ExecutionOutcome::from_legs(vec![]);
        assert!(!outcome.complete);
    }

    #[test]
    fn test_portfolio_balance_lookup() {
        let mut state = PortfolioState::with_equity(dec!(10000));
        state.balances.insert("USDT".to_string(), dec!(5000));
        assert_eq!(state.balance("USDT"), dec!(5000));
        assert_eq!(state.balance("BTC"), Decimal::ZERO);
    }

    #[test]
    fn test_signal_serialization_roundtrip() {
        let signal = sample_signal().with_confidence(0.8).with_depth_usd(dec!(50000));
        let json = serde_json::to_string(&signal).unwrap();
        let deserialized: ArbitrageSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(signal.id, deserialized.id);
        assert_eq!(signal.gross_spread_pct, deserialized.gross_spread_pct);
        assert_eq!(signal.status, deserialized.status);
    }
}
