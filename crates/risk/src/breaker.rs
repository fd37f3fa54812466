//! Trading circuit breaker.
//!
//! State machine `Closed → Open → HalfOpen → {Closed | Open}`. The breaker
//! opens on a loss streak, a daily-loss cap, or a drawdown cap; while open
//! it rejects everything until the cooldown elapses, then permits exactly
//! one trial trade. A profitable trial closes the breaker and resets the
//! streak; a losing trial re-opens it with a fresh cooldown (linear, no
//! backoff growth).
//!
//! The orchestrator's cycle loop exclusively owns this state, so methods
//! take `&mut self`; time is injected as `DateTime<Utc>` so backtests drive
//! the identical transition path.

use arb_engine_core::RiskConfig;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    /// Trading permitted.
    Closed,
    /// Trading blocked; cooldown timer running.
    Open,
    /// Cooldown elapsed; exactly one trial trade permitted.
    HalfOpen,
}

impl BreakerState {
    /// Returns the display string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why the breaker opened.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TripReason {
    /// Consecutive losing trades reached the configured limit.
    #[error("consecutive losses reached limit: {losses} >= {limit}")]
    ConsecutiveLosses {
        /// Current loss streak.
        losses: u32,
        /// Configured limit.
        limit: u32,
    },

    /// Realized daily loss exceeded the USD cap.
    #[error("daily loss ${loss} exceeded cap ${cap}")]
    DailyLossUsd {
        /// Realized loss.
        loss: Decimal,
        /// Configured cap.
        cap: Decimal,
    },

    /// Realized daily loss exceeded the percentage-of-equity cap.
    #[error("daily loss {loss_pct}% of equity exceeded cap {cap_pct}%")]
    DailyLossPct {
        /// Loss as percent of equity.
        loss_pct: Decimal,
        /// Configured cap.
        cap_pct: Decimal,
    },

    /// Drawdown from the equity peak exceeded the cap.
    #[error("drawdown {drawdown_pct}% exceeded cap {cap_pct}%")]
    Drawdown {
        /// Current drawdown percent.
        drawdown_pct: Decimal,
        /// Configured cap.
        cap_pct: Decimal,
    },

    /// The half-open trial trade lost.
    #[error("half-open trial trade lost")]
    FailedTrial,
}

/// Circuit breaker with injected time.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: RiskConfig,
    state: BreakerState,
    consecutive_losses: u32,
    daily_pnl: Decimal,
    cooldown_until: Option<DateTime<Utc>>,
    trial_pending: bool,
    last_trip: Option<TripReason>,
}

impl CircuitBreaker {
    /// Creates a closed breaker with the given thresholds.
    #[must_use]
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            state: BreakerState::Closed,
            consecutive_losses: 0,
            daily_pnl: Decimal::ZERO,
            cooldown_until: None,
            trial_pending: false,
            last_trip: None,
        }
    }

    /// Returns the current state, advancing `Open → HalfOpen` if the
    /// cooldown has elapsed at `now`.
    pub fn state(&mut self, now: DateTime<Utc>) -> BreakerState {
        if self.state == BreakerState::Open {
            if let Some(deadline) = self.cooldown_until {
                if now >= deadline {
                    self.state = BreakerState::HalfOpen;
                    self.trial_pending = false;
                    info!(state = %self.state, "Circuit breaker cooldown elapsed, permitting one trial trade");
                }
            }
        }
        self.state
    }

    /// Returns the current loss streak.
    #[must_use]
    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    /// Returns realized PnL since the last daily reset.
    #[must_use]
    pub fn daily_pnl(&self) -> Decimal {
        self.daily_pnl
    }

    /// Returns the reason for the most recent trip, if any.
    #[must_use]
    pub fn last_trip(&self) -> Option<&TripReason> {
        self.last_trip.as_ref()
    }

    /// True when a signal may proceed at `now`.
    ///
    /// In `HalfOpen`, permits exactly one trial: the first call returns
    /// true and arms the trial; further calls reject until the trial's
    /// outcome is recorded.
    pub fn permits(&mut self, now: DateTime<Utc>) -> bool {
        match self.state(now) {
            BreakerState::Closed => true,
            BreakerState::Open => false,
            BreakerState::HalfOpen => {
                if self.trial_pending {
                    false
                } else {
                    self.trial_pending = true;
                    true
                }
            }
        }
    }

    /// Releases an armed half-open trial whose signal never produced a
    /// recorded outcome (unfilled legs, execution failure). The next
    /// permitted signal arms a fresh trial; without this the breaker
    /// would stay half-open rejecting everything.
    pub fn release_trial(&mut self, now: DateTime<Utc>) {
        if self.state(now) == BreakerState::HalfOpen && self.trial_pending {
            self.trial_pending = false;
            info!("Half-open trial unresolved, releasing the trial slot");
        }
    }

    /// Records a resolved trade's PnL and applies transitions.
    ///
    /// `equity` is the account equity used for the percentage daily-loss
    /// cap.
    pub fn record_trade_outcome(&mut self, pnl: Decimal, equity: Decimal, now: DateTime<Utc>) {
        self.daily_pnl += pnl;
        let is_loss = pnl < Decimal::ZERO;

        if self.state == BreakerState::HalfOpen {
            if is_loss {
                self.trip(TripReason::FailedTrial, now);
            } else {
                self.state = BreakerState::Closed;
                self.consecutive_losses = 0;
                self.trial_pending = false;
                self.cooldown_until = None;
                info!(pnl = %pnl, "Trial trade profitable, circuit breaker closed");
            }
            return;
        }

        if is_loss {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }

        if self.state != BreakerState::Closed {
            return;
        }

        if self.consecutive_losses >= self.config.consecutive_loss_limit {
            self.trip(
                TripReason::ConsecutiveLosses {
                    losses: self.consecutive_losses,
                    limit: self.config.consecutive_loss_limit,
                },
                now,
            );
            return;
        }

        let daily_loss = -self.daily_pnl;
        if daily_loss > self.config.max_daily_loss_usd {
            self.trip(
                TripReason::DailyLossUsd {
                    loss: daily_loss,
                    cap: self.config.max_daily_loss_usd,
                },
                now,
            );
            return;
        }
        if equity > Decimal::ZERO {
            let loss_pct = daily_loss / equity * Decimal::ONE_HUNDRED;
            if loss_pct > self.config.max_daily_loss_pct {
                self.trip(
                    TripReason::DailyLossPct {
                        loss_pct,
                        cap_pct: self.config.max_daily_loss_pct,
                    },
                    now,
                );
            }
        }
    }

    /// Records the current drawdown; trips the breaker when it exceeds the
    /// cap while closed.
    pub fn record_drawdown(&mut self, drawdown_pct: Decimal, now: DateTime<Utc>) {
        if self.state == BreakerState::Closed && drawdown_pct > self.config.max_drawdown_pct {
            self.trip(
                TripReason::Drawdown {
                    drawdown_pct,
                    cap_pct: self.config.max_drawdown_pct,
                },
                now,
            );
        }
    }

    /// Resets daily PnL tracking. Called by the owner at the day boundary.
    pub fn reset_daily(&mut self) {
        self.daily_pnl = Decimal::ZERO;
    }

    fn trip(&mut self, reason: TripReason, now: DateTime<Utc>) {
        let cooldown = Duration::from_std(self.config.cooldown).unwrap_or(Duration::zero());
        self.state = BreakerState::Open;
        self.cooldown_until = Some(now + cooldown);
        self.trial_pending = false;
        warn!(
            reason = %reason,
            cooldown_until = ?self.cooldown_until,
            "Circuit breaker opened"
        );
        self.last_trip = Some(reason);
    }
}
