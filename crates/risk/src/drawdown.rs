//! Peak-equity drawdown tracking.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tracks equity against its running peak and reports drawdown percent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownMonitor {
    peak_equity_usd: Decimal,
    current_equity_usd: Decimal,
}

impl DrawdownMonitor {
    /// Creates a monitor seeded with starting equity.
    #[must_use]
    pub fn new(initial_equity_usd: Decimal) -> Self {
        Self {
            peak_equity_usd: initial_equity_usd,
            current_equity_usd: initial_equity_usd,
        }
    }

    /// Records a new equity observation, raising the peak when equity makes
    /// a new high.
    pub fn record_equity(&mut self, equity_usd: Decimal) {
        self.current_equity_usd = equity_usd;
        if equity_usd > self.peak_equity_usd {
            self.peak_equity_usd = equity_usd;
        }
    }

    /// Current drawdown from peak, as a percentage of the peak.
    ///
    /// Returns zero at a fresh peak or when the peak is non-positive.
    #[must_use]
    pub fn drawdown_pct(&self) -> Decimal {
        if self.peak_equity_usd <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let dd = (self.peak_equity_usd - self.current_equity_usd) / self.peak_equity_usd
            * Decimal::ONE_HUNDRED;
        dd.max(Decimal::ZERO)
    }

    /// Running peak equity.
    #[must_use]
    pub fn peak_equity_usd(&self) -> Decimal {
        self.peak_equity_usd
    }

    /// Most recent equity observation.
    #[must_use]
    pub fn current_equity_usd(&self) -> Decimal {
        self.current_equity_usd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_no_drawdown_at_start() {
        let monitor = DrawdownMonitor::new(dec!(10000));
        assert_eq!(monitor.drawdown_pct(), Decimal::ZERO);
    }

    #[test]
    fn test_drawdown_from_peak() {
        let mut monitor = DrawdownMonitor::new(dec!(10000));
        monitor.record_equity(dec!(12000));
        monitor.record_equity(dec!(10800));
        assert_eq!(monitor.drawdown_pct(), dec!(10));
        assert_eq!(monitor.peak_equity_usd(), dec!(12000));
    }

    #[test]
    fn test_new_peak_resets_drawdown() {
        let mut monitor = DrawdownMonitor::new(dec!(10000));
        monitor.record_equity(dec!(9000));
        assert_eq!(monitor.drawdown_pct(), dec!(10));
        monitor.record_equity(dec!(10500));
        assert_eq!(monitor.drawdown_pct(), Decimal::ZERO);
        assert_eq!(monitor.peak_equity_usd(), dec!(10500));
    }

    #[test]
    fn test_equity_above_peak_never_negative() {
        let mut monitor = DrawdownMonitor::new(dec!(10000));
        monitor.record_equity(dec!(11000));
        assert_eq!(monitor.drawdown_pct(), Decimal::ZERO);
    }

    #[test]
    fn test_zero_peak_returns_zero() {
        let monitor = DrawdownMonitor::new(Decimal::ZERO);
        assert_eq!(monitor.drawdown_pct(), Decimal::ZERO);
    }
}
