//! Capability traits at the engine's seams.
//!
//! Paper and live executors implement [`Executor`] against the same
//! `TradeResult` contract; notification channels implement [`Notifier`].
//! Variants are explicit implementations, never runtime attribute probing.

use crate::error::ExecutionError;
use crate::orderbook::OrderBook;
use crate::types::{ArbitrageSignal, ExecutionOutcome, PortfolioState, Side, TradeResult};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// One leg of a multi-leg execution, with the book it fills against.
#[derive(Debug, Clone)]
pub struct ExecutionLeg {
    /// Buy or sell.
    pub side: Side,
    /// Requested quantity in the base asset.
    pub quantity: Decimal,
    /// The order book this leg fills against.
    pub book: OrderBook,
}

impl ExecutionLeg {
    /// Creates a new execution leg.
    #[must_use]
    pub const fn new(side: Side, quantity: Decimal, book: OrderBook) -> Self {
        Self {
            side,
            quantity,
            book,
        }
    }
}

/// Executes accepted signals against a market, simulated or live.
///
/// Implementations must honor partial-fill semantics: legs that filled are
/// always reported in the outcome, even when the execution as a whole is
/// incomplete.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Executes the buy and sell legs of a two-leg signal.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] for recoverable failures (insufficient
    /// balance, missing book); the caller records the signal `Missed`.
    async fn execute(
        &mut self,
        signal: &ArbitrageSignal,
        buy_book: &OrderBook,
        sell_book: &OrderBook,
    ) -> Result<ExecutionOutcome, ExecutionError>;

    /// Executes an arbitrary sequence of legs (triangular and N-leg
    /// strategies). Each leg fills independently against its own book.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] for recoverable failures. Legs filled
    /// before the failure are retained in the outcome of a subsequent
    /// reconciliation query, never silently discarded.
    async fn execute_legs(
        &mut self,
        legs: &[ExecutionLeg],
    ) -> Result<ExecutionOutcome, ExecutionError>;

    /// Returns a point-in-time snapshot of holdings.
    fn portfolio(&self) -> PortfolioState;
}

/// Delivers per-signal outcomes to an external channel.
///
/// The engine makes no assumption about delivery success; failures are
/// logged by the caller and never propagate into the cycle.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Called once per resolved signal with its trades (empty for
    /// rejected/missed signals without fills).
    async fn notify_signal(&self, signal: &ArbitrageSignal, trades: &[TradeResult]) -> Result<()>;
}

/// A [`Notifier`] that writes to the tracing log. Default channel for
/// paper trading and backtests.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_signal(&self, signal: &ArbitrageSignal, trades: &[TradeResult]) -> Result<()> {
        tracing::info!(
            signal_id = %signal.id,
            strategy = %signal.strategy,
            symbol = %signal.symbol,
            status = %signal.status,
            net_spread_pct = %signal.net_spread_pct,
            legs = trades.len(),
            "Signal resolved"
        );
        Ok(())
    }
}
