//! Balance-tracked paper execution.
//!
//! [`PaperExecutor`] runs every leg through the [`FillSimulator`] and
//! settles the result against an in-memory balance sheet. Fills resolve at
//! the book's snapshot timestamp, so a backtest replaying recorded books
//! produces the same trade timeline on every run.

use crate::simulator::{split_symbol, FillSimulator};
use arb_engine_core::{
    ArbitrageSignal, ExecutionError, ExecutionLeg, ExecutionOutcome, Executor, Order, OrderBook,
    PortfolioState, Side, TradeResult,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};

/// Simulator-backed [`Executor`] over an in-memory balance sheet.
#[derive(Debug)]
pub struct PaperExecutor {
    simulator: FillSimulator,
    balances: HashMap<String, Decimal>,
    /// Last fill price per base asset, for marking holdings to market.
    /// Assets without an entry (quote currencies) count at face value.
    last_prices: HashMap<String, Decimal>,
    initial_equity_usd: Decimal,
    allow_short: bool,
    trade_log: Vec<TradeResult>,
}

impl PaperExecutor {
    /// Creates an executor with the given starting balances.
    ///
    /// Starting balances are taken at face value for the initial equity
    /// mark, so seed with quote-denominated assets (USD stablecoins);
    /// base assets only acquire a mark after their first fill.
    #[must_use]
    pub fn new(taker_fee_pct: Decimal, balances: HashMap<String, Decimal>) -> Self {
        let initial_equity_usd = balances.values().copied().sum();
        Self {
            simulator: FillSimulator::new(taker_fee_pct),
            balances,
            last_prices: HashMap::new(),
            initial_equity_usd,
            allow_short: false,
            trade_log: Vec::new(),
        }
    }

    /// Enables margin-style short sales: a sell leg may drive a base
    /// balance negative, modelling a borrow. The statistical pair path
    /// needs this for its sell leg, which trades an asset the balance
    /// sheet does not hold.
    #[must_use]
    pub fn with_margin(mut self) -> Self {
        self.allow_short = true;
        self
    }

    /// Creates an executor holding only `quote_asset` at `amount`.
    #[must_use]
    pub fn with_quote_balance(
        taker_fee_pct: Decimal,
        quote_asset: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self::new(taker_fee_pct, HashMap::from([(quote_asset.into(), amount)]))
    }

    /// Free balance for an asset, zero when absent.
    #[must_use]
    pub fn balance(&self, asset: &str) -> Decimal {
        self.balances.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// Every fill settled by this executor, in execution order. Legs that
    /// filled before a failed leg stay recorded here.
    #[must_use]
    pub fn trade_log(&self) -> &[TradeResult] {
        &self.trade_log
    }

    fn equity_usd(&self) -> Decimal {
        self.balances
            .iter()
            .map(|(asset, amount)| {
                let price = self
                    .last_prices
                    .get(asset)
                    .copied()
                    .unwrap_or(Decimal::ONE);
                *amount * price
            })
            .sum()
    }

    fn credit(&mut self, asset: &str, amount: Decimal) {
        *self
            .balances
            .entry(asset.to_string())
            .or_insert(Decimal::ZERO) += amount;
    }

    /// Settles one simulated fill against the balance sheet.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::InsufficientBalance`] when the paying
    /// asset cannot cover the fill; the balance sheet is left untouched.
    fn settle(&mut self, result: &TradeResult) -> Result<(), ExecutionError> {
        if !result.has_fill() {
            return Ok(());
        }
        let (base, quote) = split_symbol(&result.order.symbol);
        let cost = result.notional();

        match result.order.side {
            Side::Buy => {
                let available = self.balance(quote);
                if available < cost {
                    return Err(ExecutionError::InsufficientBalance {
                        asset: quote.to_string(),
                        needed: cost,
                        available,
                    });
                }
                self.credit(quote, -cost);
                self.credit(base, result.filled_quantity - result.fee);
            }
            Side::Sell => {
                let available = self.balance(base);
                if !self.allow_short && available < result.filled_quantity {
                    return Err(ExecutionError::InsufficientBalance {
                        asset: base.to_string(),
                        needed: result.filled_quantity,
                        available,
                    });
                }
                self.credit(base, -result.filled_quantity);
                self.credit(quote, cost - result.fee);
            }
        }

        if result.filled_price > Decimal::ZERO {
            self.last_prices
                .insert(base.to_string(), result.filled_price);
        }
        debug!(
            symbol = %result.order.symbol,
            side = %result.order.side,
            filled = %result.filled_quantity,
            price = %result.filled_price,
            equity_usd = %self.equity_usd(),
            "Paper fill settled"
        );
        Ok(())
    }

    fn run_leg(&mut self, leg: &ExecutionLeg) -> Result<TradeResult, ExecutionError> {
        let order = Order::market(
            leg.book.exchange.clone(),
            leg.book.symbol.clone(),
            leg.side,
            leg.quantity,
            leg.book.timestamp,
        );
        let result = self
            .simulator
            .simulate_fill(order, &leg.book, leg.book.timestamp);
        self.settle(&result)?;
        self.trade_log.push(result.clone());
        Ok(result)
    }
}

#[async_trait]
impl Executor for PaperExecutor {
    async fn execute(
        &mut self,
        signal: &ArbitrageSignal,
        buy_book: &OrderBook,
        sell_book: &OrderBook,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        info!(
            signal_id = %signal.id,
            symbol = %signal.symbol,
            buy_exchange = %buy_book.exchange,
            sell_exchange = %sell_book.exchange,
            quantity = %signal.quantity,
            "Executing paper arbitrage"
        );
        let buy = self.run_leg(&ExecutionLeg::new(
            Side::Buy,
            signal.quantity,
            buy_book.clone(),
        ))?;

        // The buy leg's base fee comes out of the received quantity; the
        // sell leg can only unload what actually landed in the balance.
        let sell_quantity = buy.filled_quantity - buy.fee;
        if sell_quantity <= Decimal::ZERO {
            return Ok(ExecutionOutcome::from_legs(vec![buy]));
        }
        let sell = self.run_leg(&ExecutionLeg::new(
            Side::Sell,
            sell_quantity,
            sell_book.clone(),
        ))?;
        Ok(ExecutionOutcome::from_legs(vec![buy, sell]))
    }

    async fn execute_legs(
        &mut self,
        legs: &[ExecutionLeg],
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let mut trades = Vec::with_capacity(legs.len());
        for leg in legs {
            trades.push(self.run_leg(leg)?);
        }
        Ok(ExecutionOutcome::from_legs(trades))
    }

    fn portfolio(&self) -> PortfolioState {
        PortfolioState {
            equity_usd: self.equity_usd(),
            balances: self.balances.clone(),
            open_positions: 0,
            daily_pnl_usd: self.equity_usd() - self.initial_equity_usd,
        }
    }
}
