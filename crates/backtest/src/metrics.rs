//! Performance metrics over a backtest's trade PnL series.

use serde::{Deserialize, Serialize};

/// Annualization factor for the Sharpe ratio (trading days per year).
const ANNUALIZATION_PERIODS: f64 = 252.0;

/// Summary statistics for one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Trades with a resolved PnL.
    pub total_trades: usize,
    /// Trades with positive PnL.
    pub winning_trades: usize,
    /// Trades with negative PnL.
    pub losing_trades: usize,
    /// Fraction of trades that won, in [0, 1]. Zero with no trades.
    pub win_rate: f64,
    /// Sum of all trade PnL, USD.
    pub total_pnl_usd: f64,
    /// Gross profit / gross loss. `+∞` with wins and no losses, `0` with
    /// neither.
    pub profit_factor: f64,
    /// Annualized Sharpe ratio (×√252). Zero below two observations or
    /// with zero return variance.
    pub sharpe_ratio: f64,
    /// Largest peak-to-trough drop of the equity curve, as a percentage
    /// of starting capital.
    pub max_drawdown_pct: f64,
}

/// Computes [`PerformanceMetrics`] from per-trade PnL.
#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    starting_capital_usd: f64,
}

impl MetricsCalculator {
    /// Creates a calculator for a run that started with
    /// `starting_capital_usd`.
    #[must_use]
    pub const fn new(starting_capital_usd: f64) -> Self {
        Self {
            starting_capital_usd,
        }
    }

    /// Computes metrics over the chronological per-trade PnL series.
    #[must_use]
    pub fn calculate(&self, trade_pnls: &[f64]) -> PerformanceMetrics {
        let total_trades = trade_pnls.len();
        let winning_trades = trade_pnls.iter().filter(|p| **p > 0.0).count();
        let losing_trades = trade_pnls.iter().filter(|p| **p < 0.0).count();
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };
        let total_pnl_usd = trade_pnls.iter().sum();

        PerformanceMetrics {
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            total_pnl_usd,
            profit_factor: profit_factor(trade_pnls),
            sharpe_ratio: self.sharpe_ratio(trade_pnls),
            max_drawdown_pct: self.max_drawdown_pct(trade_pnls),
        }
    }

    fn sharpe_ratio(&self, trade_pnls: &[f64]) -> f64 {
        if trade_pnls.len() < 2 || self.starting_capital_usd <= 0.0 {
            return 0.0;
        }
        let returns: Vec<f64> = trade_pnls
            .iter()
            .map(|pnl| pnl / self.starting_capital_usd)
            .collect();
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let var = returns.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / (n - 1.0);
        let std = var.sqrt();
        if std <= 0.0 {
            return 0.0;
        }
        mean / std * ANNUALIZATION_PERIODS.sqrt()
    }

    fn max_drawdown_pct(&self, trade_pnls: &[f64]) -> f64 {
        if self.starting_capital_usd <= 0.0 {
            return 0.0;
        }
        let mut equity = self.starting_capital_usd;
        let mut peak = equity;
        let mut max_drawdown = 0.0_f64;
        for pnl in trade_pnls {
            equity += pnl;
            if equity > peak {
                peak = equity;
            }
            let drawdown = peak - equity;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }
        max_drawdown / self.starting_capital_usd * 100.0
    }
}

/// Gross profit over gross loss with the degenerate-case conventions:
/// wins and no losses gives `+∞`, neither gives `0`.
#[must_use]
pub fn profit_factor(trade_pnls: &[f64]) -> f64 {
    let gross_profit: f64 = trade_pnls.iter().filter(|p| **p > 0.0).sum();
    let gross_loss: f64 = trade_pnls.iter().filter(|p| **p < 0.0).map(|p| -p).sum();
    if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}
