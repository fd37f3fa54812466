//! Rolling z-score signal generation for cointegrated pairs.
//!
//! Converts the current spread of a pair into a normalized deviation from
//! its rolling mean and a discrete trading signal.

use arb_engine_core::StatError;
use serde::{Deserialize, Serialize};

/// Discrete trading signal derived from a spread z-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpreadSignal {
    /// Spread far below its mean: long the spread (buy A, sell hedge-ratio
    /// weighted B).
    EntryLong,
    /// Spread far above its mean: short the spread.
    EntryShort,
    /// Spread back near its mean: close any open position.
    Exit,
    /// No action.
    Hold,
}

impl SpreadSignal {
    /// Returns the display string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EntryLong => "ENTRY_LONG",
            Self::EntryShort => "ENTRY_SHORT",
            Self::Exit => "EXIT",
            Self::Hold => "HOLD",
        }
    }
}

impl std::fmt::Display for SpreadSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Z-score computation output, recomputed every cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZScoreResult {
    /// Normalized deviation of the current spread; 0 when the rolling
    /// standard deviation is 0.
    pub zscore: f64,
    /// Current spread value `a − β·b`.
    pub spread: f64,
    /// Rolling sample mean of the spread.
    pub mean: f64,
    /// Rolling sample standard deviation (n−1 denominator); 0 with fewer
    /// than two observations.
    pub std: f64,
    /// The derived trading signal.
    pub signal: SpreadSignal,
}

/// Computes rolling z-scores and threshold signals for a pair spread.
#[derive(Debug, Clone)]
pub struct ZScoreCalculator {
    entry_threshold: f64,
    exit_threshold: f64,
    lookback: usize,
}

impl ZScoreCalculator {
    /// Creates a calculator with the given thresholds and rolling window.
    ///
    /// `exit_threshold < entry_threshold` is expected but not enforced
    /// here; the caller's configuration owns that relationship.
    #[must_use]
    pub fn new(entry_threshold: f64, exit_threshold: f64, lookback: usize) -> Self {
        Self {
            entry_threshold,
            exit_threshold,
            lookback,
        }
    }

    /// Computes the current z-score and signal for a pair.
    ///
    /// The spread series is `a − hedge_ratio·b` over the last `lookback`
    /// observations; the final observation is "now".
    ///
    /// # Errors
    ///
    /// Returns [`StatError::MismatchedSeries`] when lengths differ and
    /// [`StatError::DataInsufficient`] when the series are empty.
    pub fn compute(
        &self,
        prices_a: &[f64],
        prices_b: &[f64],
        hedge_ratio: f64,
    ) -> Result<ZScoreResult, StatError> {
        if prices_a.len() != prices_b.len() {
            return Err(StatError::MismatchedSeries {
                len_a: prices_a.len(),
                len_b: prices_b.len(),
            });
        }
        if prices_a.is_empty() {
            return Err(StatError::DataInsufficient { needed: 1, got: 0 });
        }

        let start = prices_a.len().saturating_sub(self.lookback);
        let spread: Vec<f64> = prices_a[start..]
            .iter()
            .zip(&prices_b[start..])
            .map(|(a, b)| a - hedge_ratio * b)
            .collect();

        let current = *spread.last().expect("non-empty window");
        let mean = spread.iter().sum::<f64>() / spread.len() as f64;
        let std = sample_std(&spread, mean);

        // Undefined-variance guard: a flat spread carries no signal.
        let (zscore, signal) = if std > 0.0 {
            let z = (current - mean) / std;
            (z, self.classify(z))
        } else {
            (0.0, SpreadSignal::Hold)
        };

        Ok(ZScoreResult {
            zscore,
            spread: current,
            mean,
            std,
            signal,
        })
    }

    /// Maps a z-score to a signal. Entry checks take precedence over exit.
    #[must_use]
    pub fn classify(&self, zscore: f64) -> SpreadSignal {
        if zscore < -self.entry_threshold {
            SpreadSignal::EntryLong
        } else if zscore > self.entry_threshold {
            SpreadSignal::EntryShort
        } else if zscore.abs() < self.exit_threshold {
            SpreadSignal::Exit
        } else {
            SpreadSignal::Hold
        }
    }
}

impl Default for ZScoreCalculator {
    fn default() -> Self {
        Self::new(2.0, 0.5, 100)
    }
}

/// Sample standard deviation with the unbiased (n−1) denominator; 0 when
/// fewer than two observations exist.
#[must_use]
pub fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let var = values
        .iter()
        .map(|v| (v - mean) * (v - mean))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    var.sqrt()
}
