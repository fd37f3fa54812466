//! Market-data anomaly detection.
//!
//! Every check is independent; the first failing check rejects the signal.
//! The detector keeps short rolling histories (spread percentages, recent
//! mid prices) per exchange/symbol so spread and flash-crash checks can
//! compare against recent behavior.

use arb_engine_core::{OrderBook, RiskConfig};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tracing::debug;

/// Lookback window for the flash-crash check, in seconds.
pub const FLASH_CRASH_WINDOW_SECONDS: i64 = 60;

/// Spread observations required before the statistical spread check is
/// meaningful.
const MIN_SPREAD_HISTORY: usize = 20;

/// Spread observations retained per book.
const MAX_SPREAD_HISTORY: usize = 500;

/// A failed anomaly check.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
pub enum AnomalyKind {
    /// The order book snapshot is older than the staleness limit.
    #[error("order book is stale: {age_seconds}s > {limit_seconds}s")]
    StaleOrderBook {
        /// Snapshot age in seconds.
        age_seconds: i64,
        /// Configured limit.
        limit_seconds: i64,
    },

    /// Observed price is too far from the reference price.
    #[error("price deviates {deviation_pct}% from reference (limit {limit_pct}%)")]
    PriceDeviation {
        /// Deviation percent.
        deviation_pct: Decimal,
        /// Configured limit.
        limit_pct: Decimal,
    },

    /// Bid/ask spread exceeds the absolute cap.
    #[error("spread {spread_pct}% exceeds cap {limit_pct}%")]
    SpreadTooWide {
        /// Observed spread percent.
        spread_pct: Decimal,
        /// Configured cap.
        limit_pct: Decimal,
    },

    /// Spread deviates too many standard deviations from its rolling mean.
    #[error("spread z-score {zscore:.2} exceeds threshold {threshold:.2}")]
    SpreadAnomaly {
        /// Z-score of the current spread against its history.
        zscore: f64,
        /// Configured threshold.
        threshold: f64,
    },

    /// Price dropped more than the flash-crash limit within the lookback
    /// window.
    #[error("price dropped {drop_pct}% within {window_seconds}s (limit {limit_pct}%)")]
    FlashCrash {
        /// Observed drop percent.
        drop_pct: Decimal,
        /// Lookback window.
        window_seconds: i64,
        /// Configured limit.
        limit_pct: Decimal,
    },
}

#[derive(Debug, Clone, Default)]
struct BookHistory {
    spread_pcts: VecDeque<f64>,
    mid_prices: VecDeque<(DateTime<Utc>, Decimal)>,
    last_observed: Option<DateTime<Utc>>,
}

/// Stateful anomaly detector over order book snapshots.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    config: RiskConfig,
    history: HashMap<(String, String), BookHistory>,
}

impl AnomalyDetector {
    /// Creates a detector with the given thresholds.
    #[must_use]
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            history: HashMap::new(),
        }
    }

    /// Checks one order book for anomalies at `now`, then folds its
    /// observation into the rolling history.
    ///
    /// `reference_price` is an external fair-value anchor (index price,
    /// other-venue mid); when absent the deviation check is skipped.
    pub fn check(
        &mut self,
        book: &OrderBook,
        reference_price: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Option<AnomalyKind> {
        let result = self.run_checks(book, reference_price, now);
        if let Some(ref anomaly) = result {
            debug!(
                exchange = %book.exchange,
                symbol = %book.symbol,
                anomaly = %anomaly,
                "Order book anomaly detected"
            );
        }
        self.observe(book, now);
        result
    }

    fn run_checks(
        &self,
        book: &OrderBook,
        reference_price: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Option<AnomalyKind> {
        let age = book.age_seconds(now);
        if age > self.config.stale_threshold_seconds {
            return Some(AnomalyKind::StaleOrderBook {
                age_seconds: age,
                limit_seconds: self.config.stale_threshold_seconds,
            });
        }

        let mid = book.mid_price();

        if let Some(reference) = reference_price {
            if reference > Decimal::ZERO && mid > Decimal::ZERO {
                let deviation_pct =
                    ((mid - reference).abs() / reference) * Decimal::ONE_HUNDRED;
                if deviation_pct > self.config.price_deviation_threshold_pct {
                    return Some(AnomalyKind::PriceDeviation {
                        deviation_pct,
                        limit_pct: self.config.price_deviation_threshold_pct,
                    });
                }
            }
        }

        let spread_pct = book.spread_pct();
        if spread_pct > self.config.max_spread_pct {
            return Some(AnomalyKind::SpreadTooWide {
                spread_pct,
                limit_pct: self.config.max_spread_pct,
            });
        }

        let key = (book.exchange.clone(), book.symbol.clone());
        if let Some(history) = self.history.get(&key) {
            if let Some(anomaly) = self.check_spread_history(history, spread_pct) {
                return Some(anomaly);
            }
            if let Some(anomaly) = self.check_flash_crash(history, mid, now) {
                return Some(anomaly);
            }
        }

        None
    }

    fn check_spread_history(&self, history: &BookHistory, spread_pct: Decimal) -> Option<AnomalyKind> {
        if history.spread_pcts.len() < MIN_SPREAD_HISTORY {
            return None;
        }
        let spread = spread_pct.to_f64().unwrap_or(0.0);
        let n = history.spread_pcts.len() as f64;
        let mean = history.spread_pcts.iter().sum::<f64>() / n;
        let var = history
            .spread_pcts
            .iter()
            .map(|s| (s - mean) * (s - mean))
            .sum::<f64>()
            / (n - 1.0);
        let std = var.sqrt();
        if std <= 0.0 {
            return None;
        }
        let zscore = (spread - mean) / std;
        if zscore.abs() > self.config.spread_std_threshold {
            return Some(AnomalyKind::SpreadAnomaly {
                zscore,
                threshold: self.config.spread_std_threshold,
            });
        }
        None
    }

    fn check_flash_crash(
        &self,
        history: &BookHistory,
        mid: Decimal,
        now: DateTime<Utc>,
    ) -> Option<AnomalyKind> {
        if mid <= Decimal::ZERO {
            return None;
        }
        let window_start = now - chrono::Duration::seconds(FLASH_CRASH_WINDOW_SECONDS);
        let recent_high = history
            .mid_prices
            .iter()
            .filter(|(ts, _)| *ts >= window_start)
            .map(|(_, price)| *price)
            .max()?;
        if recent_high <= Decimal::ZERO {
            return None;
        }
        let drop_pct = (recent_high - mid) / recent_high * Decimal::ONE_HUNDRED;
        if drop_pct > self.config.flash_crash_pct {
            return Some(AnomalyKind::FlashCrash {
                drop_pct,
                window_seconds: FLASH_CRASH_WINDOW_SECONDS,
                limit_pct: self.config.flash_crash_pct,
            });
        }
        None
    }

    fn observe(&mut self, book: &OrderBook, now: DateTime<Utc>) {
        let key = (book.exchange.clone(), book.symbol.clone());
        let history = self.history.entry(key).or_default();

        // A cycle checks the same snapshot once per signal; fold each
        // snapshot into the history only once.
        if history.last_observed.is_some_and(|ts| book.timestamp <= ts) {
            return;
        }
        history.last_observed = Some(book.timestamp);

        if let Some(spread) = book.spread_pct().to_f64() {
            history.spread_pcts.push_back(spread);
            while history.spread_pcts.len() > MAX_SPREAD_HISTORY {
                history.spread_pcts.pop_front();
            }
        }

        let mid = book.mid_price();
        if mid > Decimal::ZERO {
            history.mid_prices.push_back((now, mid));
            let window_start = now - chrono::Duration::seconds(FLASH_CRASH_WINDOW_SECONDS);
            while history
                .mid_prices
                .front()
                .is_some_and(|(ts, _)| *ts < window_start)
            {
                history.mid_prices.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_engine_core::PriceLevel;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn book_at(mid: Decimal, half_spread: Decimal, timestamp: DateTime<Utc>) -> OrderBook {
        OrderBook::new(
            "binance",
            "BTC/USDT",
            timestamp,
            vec![PriceLevel::new(mid - half_spread, dec!(10))],
            vec![PriceLevel::new(mid + half_spread, dec!(10))],
        )
    }

    fn detector() -> AnomalyDetector {
        AnomalyDetector::new(RiskConfig::default())
    }

    #[test]
    fn test_fresh_tight_book_passes() {
        let mut d = detector();
        let book = book_at(dec!(100), dec!(0.05), t0());
        assert_eq!(d.check(&book, None, t0()), None);
    }

    #[test]
    fn test_stale_book_rejected() {
        let mut d = detector();
        let book = book_at(dec!(100), dec!(0.05), t0());
        let later = t0() + chrono::Duration::seconds(11);
        assert!(matches!(
            d.check(&book, None, later),
            Some(AnomalyKind::StaleOrderBook { age_seconds: 11, .. })
        ));
    }

    #[test]
    fn test_price_deviation_rejected() {
        let mut d = detector();
        let book = book_at(dec!(110), dec!(0.05), t0());
        // Reference 100, mid 110: 10% deviation > 5% limit.
        assert!(matches!(
            d.check(&book, Some(dec!(100)), t0()),
            Some(AnomalyKind::PriceDeviation { .. })
        ));
    }

    #[test]
    fn test_wide_spread_rejected() {
        let mut d = detector();
        // Half-spread 2 on mid 100 → 4% spread > 3% cap.
        let book = book_at(dec!(100), dec!(2), t0());
        assert!(matches!(
            d.check(&book, None, t0()),
            Some(AnomalyKind::SpreadTooWide { .. })
        ));
    }

    #[test]
    fn test_spread_anomaly_needs_history() {
        let mut d = detector();
        // Build a tight-spread history with a little variance.
        let half_spreads = [dec!(0.04), dec!(0.05), dec!(0.06)];
        for i in 0..30i64 {
            let ts = t0() + chrono::Duration::seconds(i);
            let book = book_at(dec!(100), half_spreads[(i % 3) as usize], ts);
            assert_eq!(d.check(&book, None, ts), None);
        }
        // ...then a spread well within the absolute cap but far outside the
        // historical distribution.
        let ts = t0() + chrono::Duration::seconds(31);
        let book = book_at(dec!(100), dec!(1.2), ts);
        assert!(matches!(
            d.check(&book, None, ts),
            Some(AnomalyKind::SpreadAnomaly { .. })
        ));
    }

    #[test]
    fn test_repeated_checks_of_one_snapshot_observe_once() {
        let mut d = detector();
        let half_spreads = [dec!(0.04), dec!(0.05), dec!(0.06)];
        for i in 0..30i64 {
            let ts = t0() + chrono::Duration::seconds(i);
            let book = book_at(dec!(100), half_spreads[(i % 3) as usize], ts);
            assert_eq!(d.check(&book, None, ts), None);
        }
        // A cycle with many signals checks the same snapshot repeatedly;
        // the repeats must not flood the spread history.
        let ts = t0() + chrono::Duration::seconds(30);
        let repeated = book_at(dec!(100), dec!(0.06), ts);
        for _ in 0..200 {
            assert_eq!(d.check(&repeated, None, ts), None);
        }
        // A spread ordinary against the true history still passes.
        let ts = t0() + chrono::Duration::seconds(31);
        let book = book_at(dec!(100), dec!(0.04), ts);
        assert_eq!(d.check(&book, None, ts), None);
    }

    #[test]
    fn test_flash_crash_rejected() {
        let mut d = detector();
        let book = book_at(dec!(100), dec!(0.05), t0());
        assert_eq!(d.check(&book, None, t0()), None);

        // 12% drop 30 seconds later (limit 10%).
        let ts = t0() + chrono::Duration::seconds(30);
        let crashed = book_at(dec!(88), dec!(0.05), ts);
        assert!(matches!(
            d.check(&crashed, None, ts),
            Some(AnomalyKind::FlashCrash { .. })
        ));
    }

    #[test]
    fn test_gradual_drop_outside_window_passes() {
        let mut d = detector();
        let mut price = dec!(100);
        let mut ts = t0();
        // 2% steps, each 61 seconds apart: the window never sees more than
        // one step.
        for _ in 0..6 {
            let book = book_at(price, dec!(0.05), ts);
            assert_eq!(d.check(&book, None, ts), None);
            price -= dec!(2);
            ts += chrono::Duration::seconds(61);
        }
    }

    #[test]
    fn test_empty_book_not_flagged_as_crash() {
        let mut d = detector();
        let book = book_at(dec!(100), dec!(0.05), t0());
        assert_eq!(d.check(&book, None, t0()), None);
        let empty = OrderBook::new("binance", "BTC/USDT", t0(), vec![], vec![]);
        // Mid of zero skips price-based checks rather than flagging a 100%
        // drop.
        assert_eq!(d.check(&empty, None, t0()), None);
    }
}
