//! Cointegration testing for price series pairs.
//!
//! Tests whether two non-stationary price series share a stable linear
//! relationship: an OLS regression of A on B yields the hedge ratio, and an
//! augmented Dickey-Fuller style unit-root test on the residual spread
//! decides stationarity. Identical inputs always yield identical output;
//! there is no randomized sampling anywhere in this path.

use arb_engine_core::StatError;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Default minimum number of observations for a meaningful test.
pub const MIN_POINTS: usize = 20;

/// Result of a cointegration test on one pair of series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CointegrationResult {
    /// True when the residual spread tested stationary at the configured
    /// significance level.
    pub is_cointegrated: bool,
    /// Approximate p-value of the unit-root test on the residual.
    pub p_value: f64,
    /// OLS coefficient of A on B.
    pub hedge_ratio: f64,
    /// Mean-reversion half-life of the residual, in periods.
    /// `f64::INFINITY` when the spread never mean-reverts; callers must
    /// reject such pairs rather than clamp.
    pub half_life: f64,
}

/// Stationarity test for residual spreads between two price series.
#[derive(Debug, Clone)]
pub struct CointegrationAnalyzer {
    significance_level: f64,
    min_points: usize,
}

impl CointegrationAnalyzer {
    /// Creates an analyzer with the given significance level (e.g. 0.05).
    #[must_use]
    pub fn new(significance_level: f64) -> Self {
        Self {
            significance_level,
            min_points: MIN_POINTS,
        }
    }

    /// Overrides the minimum observation count.
    #[must_use]
    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }

    /// Returns the configured significance level.
    #[must_use]
    pub fn significance_level(&self) -> f64 {
        self.significance_level
    }

    /// Returns the minimum observation count.
    #[must_use]
    pub fn min_points(&self) -> usize {
        self.min_points
    }

    /// Tests two equal-length price series for cointegration.
    ///
    /// # Errors
    ///
    /// Returns [`StatError::MismatchedSeries`] when lengths differ,
    /// [`StatError::DataInsufficient`] when fewer than `min_points`
    /// observations are supplied, and [`StatError::NonFinite`] when either
    /// series contains NaN or infinite values.
    pub fn test(&self, series_a: &[f64], series_b: &[f64]) -> Result<CointegrationResult, StatError> {
        if series_a.len() != series_b.len() {
            return Err(StatError::MismatchedSeries {
                len_a: series_a.len(),
                len_b: series_b.len(),
            });
        }
        if series_a.len() < self.min_points {
            return Err(StatError::DataInsufficient {
                needed: self.min_points,
                got: series_a.len(),
            });
        }
        if !all_finite(series_a) || !all_finite(series_b) {
            return Err(StatError::NonFinite);
        }

        let hedge_ratio = ols_slope(series_a, series_b);

        let residual: Vec<f64> = series_a
            .iter()
            .zip(series_b)
            .map(|(a, b)| a - hedge_ratio * b)
            .collect();

        let t_stat = adf_t_statistic(&residual);
        let p_value = mackinnon_p_value(t_stat);
        let half_life = half_life(&residual);

        let result = CointegrationResult {
            is_cointegrated: p_value < self.significance_level,
            p_value,
            hedge_ratio,
            half_life,
        };

        tracing::debug!(
            hedge_ratio,
            p_value,
            half_life,
            is_cointegrated = result.is_cointegrated,
            "Cointegration test complete"
        );

        Ok(result)
    }
}

impl Default for CointegrationAnalyzer {
    fn default() -> Self {
        Self::new(0.05)
    }
}

fn all_finite(series: &[f64]) -> bool {
    series.iter().all(|x| x.is_finite())
}

/// OLS slope of `y` regressed on `x` with an intercept term.
#[must_use]
pub fn ols_slope(y: &[f64], x: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    for (yi, xi) in y.iter().zip(x) {
        cov += (xi - mean_x) * (yi - mean_y);
        var_x += (xi - mean_x) * (xi - mean_x);
    }

    if var_x.abs() < f64::EPSILON {
        0.0
    } else {
        cov / var_x
    }
}

/// Augmented Dickey-Fuller t-statistic for the residual series.
///
/// Fits `Δr_t = α + γ·r_{t-1} + δ·Δr_{t-1}` (one augmentation lag) and
/// returns the t-statistic of γ. Values far below zero reject the unit
/// root. A degenerate regression (constant residual) yields 0.0, which maps
/// to a p-value near 1 and therefore a non-cointegrated verdict.
#[must_use]
pub fn adf_t_statistic(residual: &[f64]) -> f64 {
    // Need r_{t-1}, Δr_{t-1}, Δr_t: three usable lags.
    if residual.len() < 4 {
        return 0.0;
    }

    let diffs: Vec<f64> = residual.windows(2).map(|w| w[1] - w[0]).collect();

    // Rows: t = 2..len(diffs); predictors [1, r_{t-1}, Δr_{t-1}].
    let rows = diffs.len() - 1;
    let mut x = DMatrix::<f64>::zeros(rows, 3);
    let mut y = DVector::<f64>::zeros(rows);
    for i in 0..rows {
        x[(i, 0)] = 1.0;
        x[(i, 1)] = residual[i + 1];
        x[(i, 2)] = diffs[i];
        y[i] = diffs[i + 1];
    }

    let xtx = x.transpose() * &x;
    let xty = x.transpose() * &y;
    let Some(xtx_inv) = xtx.try_inverse() else {
        return 0.0;
    };
    let beta = &xtx_inv * xty;

    let fitted = &x * &beta;
    let resid = &y - fitted;
    let dof = rows.saturating_sub(3);
    if dof == 0 {
        return 0.0;
    }
    let sigma2 = resid.dot(&resid) / dof as f64;
    let se_gamma = (sigma2 * xtx_inv[(1, 1)]).sqrt();

    if se_gamma < f64::EPSILON {
        0.0
    } else {
        beta[1] / se_gamma
    }
}

// MacKinnon (1994) approximate asymptotic p-value for the Dickey-Fuller
// t-distribution in the constant-only regression. The polynomial is
// evaluated in the t-statistic and pushed through the standard normal CDF.
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALLP: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGEP: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

/// Approximate p-value for an ADF t-statistic (constant-only regression).
#[must_use]
pub fn mackinnon_p_value(t_stat: f64) -> f64 {
    if t_stat > TAU_MAX {
        return 1.0;
    }
    if t_stat < TAU_MIN {
        return 0.0;
    }

    let z = if t_stat <= TAU_STAR {
        TAU_SMALLP[0] + TAU_SMALLP[1] * t_stat + TAU_SMALLP[2] * t_stat.powi(2)
    } else {
        TAU_LARGEP[0]
            + TAU_LARGEP[1] * t_stat
            + TAU_LARGEP[2] * t_stat.powi(2)
            + TAU_LARGEP[3] * t_stat.powi(3)
    };

    // Unit normal; construction cannot fail for these parameters.
    let normal = Normal::new(0.0, 1.0).expect("unit normal");
    normal.cdf(z)
}

/// Mean-reversion half-life of a residual spread, in periods.
///
/// Regresses `Δr_t` on `r_{t-1}`; the mean-reversion speed λ is the
/// negative of the slope. Returns `f64::INFINITY` when λ ≤ 0 (the spread
/// never mean-reverts).
#[must_use]
pub fn half_life(residual: &[f64]) -> f64 {
    if residual.len() < 3 {
        return f64::INFINITY;
    }

    let lagged = &residual[..residual.len() - 1];
    let diffs: Vec<f64> = residual.windows(2).map(|w| w[1] - w[0]).collect();

    let lambda = -ols_slope(&diffs, lagged);
    if lambda > f64::EPSILON {
        std::f64::consts::LN_2 / lambda
    } else {
        f64::INFINITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random sequence in [-1, 1] for test fixtures.
    fn noise(seed: u64, len: usize) -> Vec<f64> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                (state >> 33) as f64 / f64::from(1u32 << 30) - 1.0
            })
            .collect()
    }

    /// A deterministic random walk (non-stationary by construction).
    fn random_walk(seed: u64, len: usize, start: f64) -> Vec<f64> {
        let steps = noise(seed, len);
        let mut walk = Vec::with_capacity(len);
        let mut level = start;
        for step in steps {
            level += step;
            walk.push(level);
        }
        walk
    }

    fn cointegrated_pair(noise_amplitude: f64) -> (Vec<f64>, Vec<f64>) {
        let b = random_walk(7, 250, 100.0);
        let e = noise(99, 250);
        let a: Vec<f64> = b
            .iter()
            .zip(&e)
            .map(|(bi, ei)| 2.0 * bi + noise_amplitude * ei)
            .collect();
        (a, b)
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let analyzer = CointegrationAnalyzer::default();
        let err = analyzer.test(&[1.0; 30], &[1.0; 29]).unwrap_err();
        assert!(matches!(err, StatError::MismatchedSeries { .. }));
    }

    #[test]
    fn test_rejects_short_series() {
        let analyzer = CointegrationAnalyzer::default();
        let err = analyzer.test(&[1.0; 10], &[1.0; 10]).unwrap_err();
        assert_eq!(err, StatError::DataInsufficient { needed: 20, got: 10 });
    }

    #[test]
    fn test_rejects_non_finite() {
        let analyzer = CointegrationAnalyzer::default();
        let mut a = vec![1.0; 30];
        a[5] = f64::NAN;
        let err = analyzer.test(&a, &[1.0; 30]).unwrap_err();
        assert_eq!(err, StatError::NonFinite);
    }

    #[test]
    fn test_recovers_hedge_ratio_of_two() {
        let analyzer = CointegrationAnalyzer::default();
        let (a, b) = cointegrated_pair(0.5);
        let result = analyzer.test(&a, &b).unwrap();
        assert!(
            (result.hedge_ratio - 2.0).abs() < 0.05,
            "hedge ratio {} not near 2",
            result.hedge_ratio
        );
        assert!(result.is_cointegrated);
        assert!(result.half_life.is_finite());
    }

    #[test]
    fn test_p_value_decreases_with_noise() {
        let analyzer = CointegrationAnalyzer::default();
        let (a_noisy, b) = cointegrated_pair(8.0);
        let (a_clean, _) = cointegrated_pair(0.2);
        let noisy = analyzer.test(&a_noisy, &b).unwrap();
        let clean = analyzer.test(&a_clean, &b).unwrap();
        assert!(
            clean.p_value <= noisy.p_value,
            "clean p {} should not exceed noisy p {}",
            clean.p_value,
            noisy.p_value
        );
    }

    #[test]
    fn test_random_walks_not_cointegrated() {
        let analyzer = CointegrationAnalyzer::default();
        let a = random_walk(11, 250, 50.0);
        let b = random_walk(23, 250, 80.0);
        let result = analyzer.test(&a, &b).unwrap();
        assert!(!result.is_cointegrated, "p_value = {}", result.p_value);
    }

    #[test]
    fn test_determinism() {
        let analyzer = CointegrationAnalyzer::default();
        let (a, b) = cointegrated_pair(1.0);
        let r1 = analyzer.test(&a, &b).unwrap();
        let r2 = analyzer.test(&a, &b).unwrap();
        assert_eq!(r1.p_value.to_bits(), r2.p_value.to_bits());
        assert_eq!(r1.hedge_ratio.to_bits(), r2.hedge_ratio.to_bits());
    }

    #[test]
    fn test_half_life_infinite_for_trending_spread() {
        // A strictly trending residual drifts away from any mean.
        let trending: Vec<f64> = (0..100).map(|i| f64::from(i) * 1.5).collect();
        assert!(half_life(&trending).is_infinite());
    }

    #[test]
    fn test_half_life_finite_for_ar1_spread() {
        // AR(1) with coefficient 0.5: half-life = ln2 / ln... ≈ 1 period.
        let mut series = vec![10.0];
        for i in 1..200 {
            let shock = if i % 7 == 0 { 1.0 } else { -0.2 };
            series.push(0.5 * series[i - 1] + shock);
        }
        let hl = half_life(&series);
        assert!(hl.is_finite());
        assert!(hl > 0.5 && hl < 3.0, "half-life {hl}");
    }

    #[test]
    fn test_mackinnon_bounds() {
        assert!((mackinnon_p_value(5.0) - 1.0).abs() < f64::EPSILON);
        assert!(mackinnon_p_value(-25.0).abs() < f64::EPSILON);
        // A strongly negative t-statistic maps to a small p-value.
        assert!(mackinnon_p_value(-4.0) < 0.01);
        // Near-zero t-statistic maps to a large p-value.
        assert!(mackinnon_p_value(-0.5) > 0.5);
        // Monotone in t.
        assert!(mackinnon_p_value(-3.0) < mackinnon_p_value(-2.0));
    }

    #[test]
    fn test_ols_slope_exact() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let y = vec![3.0, 5.0, 7.0, 9.0];
        assert!((ols_slope(&y, &x) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_ols_slope_zero_variance() {
        let x = vec![2.0; 10];
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert!(ols_slope(&y, &x).abs() < f64::EPSILON);
    }
}
