//! Cycle orchestration.
//!
//! [`Pipeline::run_cycle`] is the engine's heartbeat: detectors scan the
//! frozen snapshot, each signal passes through the risk engine, approved
//! signals execute, and every resolved signal fans out to the notifiers.
//! The cycle is synchronous over one `&mut self`, so risk state always
//! mutates in detection order.

use crate::detectors::{Detector, SELL_QUANTITY_KEY, SELL_SYMBOL_KEY};
use crate::snapshot::MarketSnapshot;
use arb_engine_core::{
    ArbitrageSignal, EngineConfig, ExecutionError, ExecutionLeg, Executor, Notifier, OrderBook,
    Side, SignalStatus, TradeResult,
};
use arb_engine_risk::{RiskDecision, RiskEngine};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Cumulative counters across every cycle. Read-only to callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Cycles run.
    pub cycles: u64,
    /// Signals produced by detectors.
    pub signals_detected: u64,
    /// Signals fully executed.
    pub executed: u64,
    /// Signals rejected by the risk engine.
    pub rejected: u64,
    /// Signals approved but not (fully) fillable.
    pub missed: u64,
    /// Realized PnL across all executed signals, USD.
    pub total_pnl_usd: Decimal,
}

/// Everything one cycle resolved, for notification and backtest capture.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Cycle sequence number (1-based).
    pub cycle: u64,
    /// When the cycle ran.
    pub at: DateTime<Utc>,
    /// Every signal the cycle resolved, with terminal statuses.
    pub signals: Vec<ArbitrageSignal>,
    /// Every fill the cycle produced.
    pub trades: Vec<TradeResult>,
    /// Realized PnL per signal that resolved one, chronological.
    pub signal_pnls: Vec<Decimal>,
    /// Realized PnL of this cycle, USD.
    pub pnl_usd: Decimal,
}

/// The cycle orchestrator: detectors → risk → execution → notification.
pub struct Pipeline<E: Executor> {
    detectors: Vec<Box<dyn Detector>>,
    risk: RiskEngine,
    executor: E,
    notifiers: Vec<Box<dyn Notifier>>,
    stats: PipelineStats,
}

impl<E: Executor> Pipeline<E> {
    /// Creates a pipeline with no detectors or notifiers attached.
    #[must_use]
    pub fn new(risk: RiskEngine, executor: E) -> Self {
        Self {
            detectors: Vec::new(),
            risk,
            executor,
            notifiers: Vec::new(),
            stats: PipelineStats::default(),
        }
    }

    /// Creates a pipeline from the engine configuration, with the spatial
    /// and statistical detectors attached.
    #[must_use]
    pub fn from_config(config: &EngineConfig, executor: E) -> Self {
        let risk = RiskEngine::new(config.risk.clone(), config.initial_capital_usd);
        Self::new(risk, executor)
            .with_detector(Box::new(crate::detectors::SpatialDetector::new(
                config.detector.clone(),
            )))
            .with_detector(Box::new(crate::detectors::StatArbDetector::new(
                config.stat_arb.clone(),
                config.detector.trade_amount_usd,
            )))
    }

    /// Attaches a detector. Detectors run in attachment order.
    #[must_use]
    pub fn with_detector(mut self, detector: Box<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Attaches a notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Cumulative statistics.
    #[must_use]
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// The risk engine, for daily resets and state inspection.
    pub fn risk_mut(&mut self) -> &mut RiskEngine {
        &mut self.risk
    }

    /// The executor, for portfolio inspection.
    #[must_use]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Runs one full cycle against a frozen snapshot.
    pub async fn run_cycle(&mut self, snapshot: &MarketSnapshot, now: DateTime<Utc>) -> CycleReport {
        self.stats.cycles += 1;
        let cycle = self.stats.cycles;

        let mut signals = Vec::new();
        for detector in &mut self.detectors {
            let detected = detector.detect(snapshot);
            if !detected.is_empty() {
                info!(
                    detector = detector.name(),
                    signals = detected.len(),
                    cycle,
                    "Detector produced signals"
                );
            }
            signals.extend(detected);
        }
        self.stats.signals_detected += signals.len() as u64;

        let mut trades = Vec::new();
        let mut signal_pnls = Vec::new();
        let mut cycle_pnl = Decimal::ZERO;
        for signal in &mut signals {
            let signal_trades = Self::resolve_signal(
                &mut self.risk,
                &mut self.executor,
                &mut self.stats,
                signal,
                snapshot,
                now,
            )
            .await;
            if let Some(pnl) = Self::realized_pnl(&signal_trades) {
                signal_pnls.push(pnl);
                cycle_pnl += pnl;
            }

            for notifier in &self.notifiers {
                if let Err(e) = notifier.notify_signal(signal, &signal_trades).await {
                    warn!(error = %e, signal_id = %signal.id, "Notifier delivery failed");
                }
            }
            trades.extend(signal_trades);
        }

        self.stats.total_pnl_usd += cycle_pnl;
        let equity = self.executor.portfolio().equity_usd;
        self.risk.record_equity(equity, now);

        CycleReport {
            cycle,
            at: now,
            signals,
            trades,
            signal_pnls,
            pnl_usd: cycle_pnl,
        }
    }

    /// Takes one signal through risk and execution, writing its terminal
    /// status and returning its fills.
    async fn resolve_signal(
        risk: &mut RiskEngine,
        executor: &mut E,
        stats: &mut PipelineStats,
        signal: &mut ArbitrageSignal,
        snapshot: &MarketSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<TradeResult> {
        let sell_symbol = signal
            .metadata
            .get(SELL_SYMBOL_KEY)
            .cloned()
            .unwrap_or_else(|| signal.symbol.clone());

        let (buy_book, sell_book) = match (
            snapshot.get(&signal.buy_exchange, &signal.symbol),
            snapshot.get(&signal.sell_exchange, &sell_symbol),
        ) {
            (Some(buy), Some(sell)) => (buy.clone(), sell.clone()),
            (buy, _) => {
                let (exchange, symbol) = if buy.is_none() {
                    (signal.buy_exchange.clone(), signal.symbol.clone())
                } else {
                    (signal.sell_exchange.clone(), sell_symbol)
                };
                let e = ExecutionError::MissingOrderBook { exchange, symbol };
                signal.status = SignalStatus::Missed;
                signal.metadata.insert("miss_reason".into(), e.to_string());
                stats.missed += 1;
                warn!(signal_id = %signal.id, error = %e, "Signal missed: order book absent from snapshot");
                return Vec::new();
            }
        };

        let portfolio = executor.portfolio();
        match risk.evaluate(signal, &portfolio, &buy_book, &sell_book, now) {
            RiskDecision::Rejected(reason) => {
                signal.status = SignalStatus::Rejected;
                signal
                    .metadata
                    .insert("reject_reason".into(), reason.to_string());
                stats.rejected += 1;
                info!(signal_id = %signal.id, reason = %reason, "Signal rejected by risk");
                Vec::new()
            }
            RiskDecision::Approved => {
                Self::execute_signal(risk, executor, stats, signal, &buy_book, &sell_book, now)
                    .await
            }
        }
    }

    async fn execute_signal(
        risk: &mut RiskEngine,
        executor: &mut E,
        stats: &mut PipelineStats,
        signal: &mut ArbitrageSignal,
        buy_book: &OrderBook,
        sell_book: &OrderBook,
        now: DateTime<Utc>,
    ) -> Vec<TradeResult> {
        // Same-symbol signals ride the executor's two-leg path, which
        // sells exactly what the buy leg landed. Pair signals trade two
        // different symbols, so each leg carries its own quantity: the
        // detector sizes the sell leg with the hedge ratio.
        let result = if buy_book.symbol == sell_book.symbol {
            executor.execute(signal, buy_book, sell_book).await
        } else {
            let sell_quantity = signal
                .metadata
                .get(SELL_QUANTITY_KEY)
                .and_then(|q| q.parse::<Decimal>().ok())
                .unwrap_or(signal.quantity);
            let legs = [
                ExecutionLeg::new(Side::Buy, signal.quantity, buy_book.clone()),
                ExecutionLeg::new(Side::Sell, sell_quantity, sell_book.clone()),
            ];
            executor.execute_legs(&legs).await
        };

        match result {
            Ok(outcome) => {
                let pnl = Self::realized_pnl(&outcome.trades);
                if let Some(pnl) = pnl {
                    let equity = executor.portfolio().equity_usd;
                    risk.record_trade_outcome(pnl, equity, now);
                } else {
                    // No resolvable outcome: a half-open trial armed for
                    // this signal must not stay pending forever.
                    risk.release_trial(now);
                }

                if outcome.complete {
                    signal.status = SignalStatus::Executed;
                    signal.executed_at = Some(now);
                    stats.executed += 1;
                    info!(
                        signal_id = %signal.id,
                        pnl_usd = %pnl.unwrap_or_default(),
                        "Signal executed"
                    );
                } else {
                    signal.status = SignalStatus::Missed;
                    signal
                        .metadata
                        .insert("miss_reason".into(), "incomplete fill".into());
                    stats.missed += 1;
                    warn!(signal_id = %signal.id, "Signal missed: incomplete fill");
                }
                outcome.trades
            }
            Err(e) => {
                risk.release_trial(now);
                signal.status = SignalStatus::Missed;
                signal.metadata.insert("miss_reason".into(), e.to_string());
                stats.missed += 1;
                warn!(signal_id = %signal.id, error = %e, "Signal missed: execution failed");
                Vec::new()
            }
        }
    }

    /// Realized PnL over one signal's fills: matched quantity priced at
    /// the two VWAPs, minus fees (buy-leg base fees converted at the buy
    /// VWAP). `None` until both legs of the same symbol have fills; a
    /// pair entry's legs open a spread position whose PnL stays
    /// unrealized until the position unwinds, carried by the equity mark.
    fn realized_pnl(trades: &[TradeResult]) -> Option<Decimal> {
        let buy = trades
            .iter()
            .find(|t| t.order.side == Side::Buy && t.has_fill())?;
        let sell = trades
            .iter()
            .find(|t| {
                t.order.side == Side::Sell && t.has_fill() && t.order.symbol == buy.order.symbol
            })?;

        let matched = buy.filled_quantity.min(sell.filled_quantity);
        let gross = (sell.filled_price - buy.filled_price) * matched;
        let buy_fee_usd = buy.fee * buy.filled_price;
        Some(gross - buy_fee_usd - sell.fee)
    }
}
