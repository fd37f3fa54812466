//! Pre-trade risk evaluation.
//!
//! The engine owns the circuit breaker, the anomaly detector, and the
//! drawdown monitor, and exposes one `evaluate` call that the orchestrator
//! runs on every detected signal before execution. Checks are ordered so
//! that the breaker's half-open trial is armed only after every other gate
//! has passed.

use crate::anomaly::{AnomalyDetector, AnomalyKind};
use crate::breaker::{BreakerState, CircuitBreaker, TripReason};
use crate::drawdown::DrawdownMonitor;
use arb_engine_core::{ArbitrageSignal, OrderBook, PortfolioState, RiskConfig};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

/// Why a signal was rejected.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RejectReason {
    /// The circuit breaker is not permitting trades.
    #[error("circuit breaker is {state}")]
    CircuitOpen {
        /// Breaker state at evaluation time.
        state: BreakerState,
    },

    /// The breaker opened on the daily-loss cap and is still blocking.
    #[error("daily loss ${loss} exceeded cap ${cap}")]
    DailyLossExceeded {
        /// Realized loss at trip time.
        loss: Decimal,
        /// Configured cap.
        cap: Decimal,
    },

    /// The breaker opened on the drawdown cap and is still blocking.
    #[error("drawdown {drawdown_pct}% exceeded cap {cap_pct}%")]
    DrawdownExceeded {
        /// Drawdown at trip time.
        drawdown_pct: Decimal,
        /// Configured cap.
        cap_pct: Decimal,
    },

    /// An order book snapshot is too old.
    #[error("{exchange} order book stale: {age_seconds}s > {limit_seconds}s")]
    StaleOrderBook {
        /// Venue whose book failed.
        exchange: String,
        /// Snapshot age.
        age_seconds: i64,
        /// Configured limit.
        limit_seconds: i64,
    },

    /// Observed price deviates too far from the reference price.
    #[error("{exchange} price deviates {deviation_pct}% (limit {limit_pct}%)")]
    PriceDeviation {
        /// Venue whose book failed.
        exchange: String,
        /// Deviation percent.
        deviation_pct: Decimal,
        /// Configured limit.
        limit_pct: Decimal,
    },

    /// Bid/ask spread exceeds the absolute cap.
    #[error("{exchange} spread {spread_pct}% exceeds cap {limit_pct}%")]
    SpreadTooWide {
        /// Venue whose book failed.
        exchange: String,
        /// Observed spread percent.
        spread_pct: Decimal,
        /// Configured cap.
        limit_pct: Decimal,
    },

    /// Spread deviates too many standard deviations from its rolling mean.
    #[error("{exchange} spread z-score {zscore:.2} exceeds threshold {threshold:.2}")]
    SpreadAnomaly {
        /// Venue whose book failed.
        exchange: String,
        /// Z-score against the rolling history.
        zscore: f64,
        /// Configured threshold.
        threshold: f64,
    },

    /// Price dropped more than the flash-crash limit within the window.
    #[error("{exchange} price dropped {drop_pct}% within {window_seconds}s (limit {limit_pct}%)")]
    FlashCrash {
        /// Venue whose book failed.
        exchange: String,
        /// Observed drop percent.
        drop_pct: Decimal,
        /// Lookback window.
        window_seconds: i64,
        /// Configured limit.
        limit_pct: Decimal,
    },

    /// The signal's notional exceeds the per-position cap.
    #[error("position notional ${notional_usd} exceeds cap ${cap_usd}")]
    PositionLimitExceeded {
        /// Requested notional.
        notional_usd: Decimal,
        /// Configured cap.
        cap_usd: Decimal,
    },

    /// The portfolio already holds the maximum number of open positions.
    #[error("open positions at limit: {open} >= {limit}")]
    MaxOpenPositions {
        /// Currently open positions.
        open: u32,
        /// Configured limit.
        limit: u32,
    },
}

/// Outcome of a pre-trade evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskDecision {
    /// All checks passed; the signal may be executed.
    Approved,
    /// A check failed.
    Rejected(RejectReason),
}

impl RiskDecision {
    /// True when the signal may proceed.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Pre-trade risk engine.
#[derive(Debug)]
pub struct RiskEngine {
    config: RiskConfig,
    breaker: CircuitBreaker,
    anomaly: AnomalyDetector,
    drawdown: DrawdownMonitor,
}

impl RiskEngine {
    /// Creates an engine seeded with starting equity.
    #[must_use]
    pub fn new(config: RiskConfig, initial_equity_usd: Decimal) -> Self {
        Self {
            breaker: CircuitBreaker::new(config.clone()),
            anomaly: AnomalyDetector::new(config.clone()),
            drawdown: DrawdownMonitor::new(initial_equity_usd),
            config,
        }
    }

    /// Evaluates a signal against every pre-trade check.
    ///
    /// Each leg's book is anomaly-checked with the opposite leg's mid as
    /// its reference price. The breaker is consulted last so a half-open
    /// trial slot is only consumed by a signal that would otherwise trade.
    pub fn evaluate(
        &mut self,
        signal: &ArbitrageSignal,
        portfolio: &PortfolioState,
        buy_book: &OrderBook,
        sell_book: &OrderBook,
        now: DateTime<Utc>,
    ) -> RiskDecision {
        let notional_usd = signal.buy_price * signal.quantity;
        if notional_usd > self.config.max_position_usd {
            return RiskDecision::Rejected(RejectReason::PositionLimitExceeded {
                notional_usd,
                cap_usd: self.config.max_position_usd,
            });
        }

        if portfolio.open_positions >= self.config.max_open_positions {
            return RiskDecision::Rejected(RejectReason::MaxOpenPositions {
                open: portfolio.open_positions,
                limit: self.config.max_open_positions,
            });
        }

        // Cross-venue reference pricing only makes sense when both legs
        // trade the same symbol; a pair signal's legs are checked without
        // a reference.
        let same_symbol = buy_book.symbol == sell_book.symbol;
        let buy_reference = sell_book.mid_price();
        let sell_reference = buy_book.mid_price();
        for (book, reference) in [(buy_book, buy_reference), (sell_book, sell_reference)] {
            let reference = (same_symbol && reference > Decimal::ZERO).then_some(reference);
            if let Some(anomaly) = self.anomaly.check(book, reference, now) {
                return RiskDecision::Rejected(Self::anomaly_reason(&book.exchange, anomaly));
            }
        }

        if !self.breaker.permits(now) {
            return RiskDecision::Rejected(self.breaker_reason(now));
        }

        RiskDecision::Approved
    }

    fn anomaly_reason(exchange: &str, anomaly: AnomalyKind) -> RejectReason {
        let exchange = exchange.to_string();
        match anomaly {
            AnomalyKind::StaleOrderBook {
                age_seconds,
                limit_seconds,
            } => RejectReason::StaleOrderBook {
                exchange,
                age_seconds,
                limit_seconds,
            },
            AnomalyKind::PriceDeviation {
                deviation_pct,
                limit_pct,
            } => RejectReason::PriceDeviation {
                exchange,
                deviation_pct,
                limit_pct,
            },
            AnomalyKind::SpreadTooWide {
                spread_pct,
                limit_pct,
            } => RejectReason::SpreadTooWide {
                exchange,
                spread_pct,
                limit_pct,
            },
            AnomalyKind::SpreadAnomaly { zscore, threshold } => RejectReason::SpreadAnomaly {
                exchange,
                zscore,
                threshold,
            },
            AnomalyKind::FlashCrash {
                drop_pct,
                window_seconds,
                limit_pct,
            } => RejectReason::FlashCrash {
                exchange,
                drop_pct,
                window_seconds,
                limit_pct,
            },
        }
    }

    /// Names the caps whose trip is still blocking; generic `CircuitOpen`
    /// for loss-streak and failed-trial trips.
    fn breaker_reason(&mut self, now: DateTime<Utc>) -> RejectReason {
        match self.breaker.last_trip().cloned() {
            Some(TripReason::DailyLossUsd { loss, cap }) => {
                RejectReason::DailyLossExceeded { loss, cap }
            }
            Some(TripReason::DailyLossPct { loss_pct, cap_pct }) => {
                RejectReason::DailyLossExceeded {
                    loss: loss_pct,
                    cap: cap_pct,
                }
            }
            Some(TripReason::Drawdown {
                drawdown_pct,
                cap_pct,
            }) => RejectReason::DrawdownExceeded {
                drawdown_pct,
                cap_pct,
            },
            _ => RejectReason::CircuitOpen {
                state: self.breaker.state(now),
            },
        }
    }

    /// Releases an armed half-open trial whose signal produced no
    /// recordable outcome. Called by the orchestrator when an approved
    /// signal misses instead of trading.
    pub fn release_trial(&mut self, now: DateTime<Utc>) {
        self.breaker.release_trial(now);
    }

    /// Records a resolved trade's realized PnL.
    pub fn record_trade_outcome(&mut self, pnl_usd: Decimal, equity_usd: Decimal, now: DateTime<Utc>) {
        self.breaker.record_trade_outcome(pnl_usd, equity_usd, now);
        self.record_equity(equity_usd, now);
    }

    /// Records an equity observation, feeding the drawdown monitor and the
    /// breaker's drawdown cap. Logs when a limit is approached.
    pub fn record_equity(&mut self, equity_usd: Decimal, now: DateTime<Utc>) {
        self.drawdown.record_equity(equity_usd);
        let drawdown_pct = self.drawdown.drawdown_pct();
        self.breaker.record_drawdown(drawdown_pct, now);

        let warning_dd = self.config.max_drawdown_pct * self.config.warning_ratio;
        if drawdown_pct > warning_dd && drawdown_pct <= self.config.max_drawdown_pct {
            warn!(
                drawdown_pct = %drawdown_pct,
                cap_pct = %self.config.max_drawdown_pct,
                "Drawdown approaching cap"
            );
        }

        let daily_loss = -self.breaker.daily_pnl();
        let warning_loss = self.config.max_daily_loss_usd * self.config.warning_ratio;
        if daily_loss > warning_loss && daily_loss <= self.config.max_daily_loss_usd {
            warn!(
                daily_loss_usd = %daily_loss,
                cap_usd = %self.config.max_daily_loss_usd,
                "Daily loss approaching cap"
            );
        }
    }

    /// Resets daily PnL tracking at the day boundary.
    pub fn reset_daily(&mut self) {
        info!(daily_pnl = %self.breaker.daily_pnl(), "Resetting daily risk counters");
        self.breaker.reset_daily();
    }

    /// Current breaker state at `now`.
    pub fn breaker_state(&mut self, now: DateTime<Utc>) -> BreakerState {
        self.breaker.state(now)
    }

    /// Current drawdown from peak, percent.
    #[must_use]
    pub fn drawdown_pct(&self) -> Decimal {
        self.drawdown.drawdown_pct()
    }

    /// Realized PnL since the last daily reset.
    #[must_use]
    pub fn daily_pnl(&self) -> Decimal {
        self.breaker.daily_pnl()
    }
}
