//! Pair scanning across a universe of price series.
//!
//! Enumerates every unordered pair of symbols exactly once, runs the
//! cointegration test, and keeps pairs whose p-value and half-life fall
//! inside tradable bounds. The scan is O(n²) in the universe size; it runs
//! periodically, not per tick.

use crate::cointegration::CointegrationAnalyzer;
use arb_engine_core::StatError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// An accepted cointegrated pair, valid for one scan cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CointegratedPair {
    /// First symbol (regressand).
    pub symbol_a: String,
    /// Second symbol (regressor).
    pub symbol_b: String,
    /// p-value of the stationarity test.
    pub p_value: f64,
    /// Hedge ratio of A on B.
    pub hedge_ratio: f64,
    /// Mean-reversion half-life in periods.
    pub half_life: f64,
}

/// Half-life bounds for tradable pairs.
///
/// Below the lower bound reversion is too fast to capture after fees;
/// above the upper bound it is too slow for the risk horizon.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HalfLifeBounds {
    /// Minimum acceptable half-life, in periods.
    pub min: f64,
    /// Maximum acceptable half-life, in periods.
    pub max: f64,
}

impl Default for HalfLifeBounds {
    fn default() -> Self {
        Self {
            min: 1.0,
            max: 100.0,
        }
    }
}

impl HalfLifeBounds {
    /// Returns true when a half-life is inside the tradable band.
    #[must_use]
    pub fn contains(&self, half_life: f64) -> bool {
        half_life >= self.min && half_life <= self.max
    }
}

/// Scans a symbol universe for cointegrated pairs.
#[derive(Debug, Clone)]
pub struct PairScanner {
    analyzer: CointegrationAnalyzer,
    half_life_bounds: HalfLifeBounds,
}

impl PairScanner {
    /// Creates a scanner around the given analyzer.
    #[must_use]
    pub fn new(analyzer: CointegrationAnalyzer) -> Self {
        Self {
            analyzer,
            half_life_bounds: HalfLifeBounds::default(),
        }
    }

    /// Sets the half-life bounds.
    #[must_use]
    pub fn with_half_life_bounds(mut self, bounds: HalfLifeBounds) -> Self {
        self.half_life_bounds = bounds;
        self
    }

    /// Scans every unordered pair of distinct symbols and returns the
    /// accepted pairs, sorted ascending by p-value (most significant
    /// first). Symbols with fewer than the analyzer's minimum observations
    /// are dropped up front so one short series cannot abort the scan.
    ///
    /// # Errors
    ///
    /// Propagates [`StatError`] from the analyzer (e.g. non-finite data in
    /// a series that passed the length filter).
    pub fn scan(
        &self,
        series_by_symbol: &HashMap<String, Vec<f64>>,
        p_value_threshold: f64,
    ) -> Result<Vec<CointegratedPair>, StatError> {
        // Sorted symbol order makes pair enumeration deterministic.
        let mut symbols: Vec<&String> = series_by_symbol
            .iter()
            .filter(|(_, series)| series.len() >= self.analyzer.min_points())
            .map(|(symbol, _)| symbol)
            .collect();
        symbols.sort();

        let mut accepted = Vec::new();
        let mut tested = 0usize;

        for (i, symbol_a) in symbols.iter().enumerate() {
            for symbol_b in &symbols[i + 1..] {
                let series_a = &series_by_symbol[*symbol_a];
                let series_b = &series_by_symbol[*symbol_b];

                // Pair tests need equal lengths; truncate to the shared
                // suffix so mixed-history universes still scan.
                let len = series_a.len().min(series_b.len());
                let a = &series_a[series_a.len() - len..];
                let b = &series_b[series_b.len() - len..];

                let result = self.analyzer.test(a, b)?;
                tested += 1;

                if !result.is_cointegrated || result.p_value >= p_value_threshold {
                    continue;
                }
                if !self.half_life_bounds.contains(result.half_life) {
                    debug!(
                        symbol_a = %symbol_a,
                        symbol_b = %symbol_b,
                        half_life = result.half_life,
                        "Pair rejected: half-life outside tradable band"
                    );
                    continue;
                }

                accepted.push(CointegratedPair {
                    symbol_a: (*symbol_a).clone(),
                    symbol_b: (*symbol_b).clone(),
                    p_value: result.p_value,
                    hedge_ratio: result.hedge_ratio,
                    half_life: result.half_life,
                });
            }
        }

        accepted.sort_by(|x, y| x.p_value.total_cmp(&y.p_value));

        info!(
            universe = symbols.len(),
            tested,
            accepted = accepted.len(),
            "Pair scan complete"
        );

        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(seed: u64, len: usize) -> Vec<f64> {
        let mut state = seed;
        let mut level = 100.0;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let step = (state >> 33) as f64 / f64::from(1u32 << 30) - 1.0;
                level += step;
                level
            })
            .collect()
    }

    fn universe() -> HashMap<String, Vec<f64>> {
        let base = walk(7, 250);
        // "ETH" tracks "BTC" with a small stationary offset.
        let tracker: Vec<f64> = base
            .iter()
            .enumerate()
            .map(|(i, x)| 1.5 * x + (i as f64 * 0.7).sin() * 0.3)
            .collect();
        let independent = walk(31, 250);

        let mut map = HashMap::new();
        map.insert("BTC".to_string(), base);
        map.insert("ETH".to_string(), tracker);
        map.insert("DOGE".to_string(), independent);
        map
    }

    #[test]
    fn test_scan_finds_cointegrated_pair() {
        let scanner = PairScanner::new(CointegrationAnalyzer::default())
            .with_half_life_bounds(HalfLifeBounds {
                min: 0.1,
                max: 500.0,
            });
        let pairs = scanner.scan(&universe(), 0.05).unwrap();

        assert!(!pairs.is_empty());
        let top = &pairs[0];
        assert_eq!(top.symbol_a, "BTC");
        assert_eq!(top.symbol_b, "ETH");
        assert!((top.hedge_ratio - 1.5).abs() < 0.1);
    }

    #[test]
    fn test_scan_no_self_pairs_no_duplicates() {
        let scanner = PairScanner::new(CointegrationAnalyzer::default());
        let pairs = scanner.scan(&universe(), 1.0).unwrap();

        for pair in &pairs {
            assert_ne!(pair.symbol_a, pair.symbol_b);
        }
        let mut keys: Vec<(String, String)> = pairs
            .iter()
            .map(|p| {
                let mut k = [p.symbol_a.clone(), p.symbol_b.clone()];
                k.sort();
                (k[0].clone(), k[1].clone())
            })
            .collect();
        let before = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), before);
    }

    #[test]
    fn test_scan_sorted_by_p_value() {
        let scanner = PairScanner::new(CointegrationAnalyzer::default())
            .with_half_life_bounds(HalfLifeBounds {
                min: 0.0,
                max: f64::MAX,
            });
        let pairs = scanner.scan(&universe(), 1.0).unwrap();
        for window in pairs.windows(2) {
            assert!(window[0].p_value <= window[1].p_value);
        }
    }

    #[test]
    fn test_scan_drops_short_series() {
        let mut map = universe();
        map.insert("STUB".to_string(), vec![1.0; 5]);
        let scanner = PairScanner::new(CointegrationAnalyzer::default());
        // Must not error out on the short series.
        let pairs = scanner.scan(&map, 0.05).unwrap();
        assert!(pairs.iter().all(|p| p.symbol_a != "STUB" && p.symbol_b != "STUB"));
    }

    #[test]
    fn test_scan_half_life_band_filters() {
        // An impossible band rejects everything.
        let scanner = PairScanner::new(CointegrationAnalyzer::default())
            .with_half_life_bounds(HalfLifeBounds {
                min: 1000.0,
                max: 2000.0,
            });
        let pairs = scanner.scan(&universe(), 0.05).unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_empty_universe() {
        let scanner = PairScanner::new(CointegrationAnalyzer::default());
        let pairs = scanner.scan(&HashMap::new(), 0.05).unwrap();
        assert!(pairs.is_empty());
    }
}
