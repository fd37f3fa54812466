//! Engine configuration.
//!
//! All thresholds are loaded once at startup and are read-only afterwards.
//! Presets follow the conservative/default split used for live experiments.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Risk thresholds consumed by the risk engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Maximum notional per position in USD.
    pub max_position_usd: Decimal,

    /// Maximum number of concurrently open positions.
    pub max_open_positions: u32,

    /// Maximum realized daily loss in USD before the breaker opens.
    pub max_daily_loss_usd: Decimal,

    /// Maximum realized daily loss as a percentage of equity.
    pub max_daily_loss_pct: Decimal,

    /// Maximum drawdown from the equity peak, in percent.
    pub max_drawdown_pct: Decimal,

    /// Consecutive losing trades before the breaker opens.
    pub consecutive_loss_limit: u32,

    /// Cooldown after the breaker opens, before a trial trade is allowed.
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,

    /// Maximum order book age in seconds before data is considered stale.
    pub stale_threshold_seconds: i64,

    /// Maximum deviation from the reference price, in percent.
    pub price_deviation_threshold_pct: Decimal,

    /// Maximum absolute bid/ask spread, in percent.
    pub max_spread_pct: Decimal,

    /// Spread anomaly threshold in standard deviations from its rolling mean.
    pub spread_std_threshold: f64,

    /// Price drop within the short lookback window treated as a flash
    /// crash, in percent.
    pub flash_crash_pct: Decimal,

    /// Fraction of a limit at which warnings are logged (e.g. 0.8).
    pub warning_ratio: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_usd: Decimal::from(10_000),
            max_open_positions: 5,
            max_daily_loss_usd: Decimal::from(500),
            max_daily_loss_pct: Decimal::from(5),
            max_drawdown_pct: Decimal::from(10),
            consecutive_loss_limit: 3,
            cooldown: Duration::from_secs(30 * 60),
            stale_threshold_seconds: 10,
            price_deviation_threshold_pct: Decimal::from(5),
            max_spread_pct: Decimal::from(3),
            spread_std_threshold: 4.0,
            flash_crash_pct: Decimal::from(10),
            warning_ratio: Decimal::new(8, 1),
        }
    }
}

impl RiskConfig {
    /// Creates a conservative preset for initial live testing.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            max_position_usd: Decimal::from(1_000),
            max_open_positions: 2,
            max_daily_loss_usd: Decimal::from(100),
            max_daily_loss_pct: Decimal::from(2),
            max_drawdown_pct: Decimal::from(5),
            consecutive_loss_limit: 2,
            cooldown: Duration::from_secs(60 * 60),
            stale_threshold_seconds: 5,
            price_deviation_threshold_pct: Decimal::from(3),
            max_spread_pct: Decimal::from(2),
            spread_std_threshold: 3.0,
            flash_crash_pct: Decimal::from(7),
            warning_ratio: Decimal::new(7, 1),
        }
    }

    /// Sets the consecutive loss limit.
    #[must_use]
    pub fn with_consecutive_loss_limit(mut self, limit: u32) -> Self {
        self.consecutive_loss_limit = limit;
        self
    }

    /// Sets the cooldown duration.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Sets the maximum daily loss in USD.
    #[must_use]
    pub fn with_max_daily_loss_usd(mut self, max: Decimal) -> Self {
        self.max_daily_loss_usd = max;
        self
    }
}

/// Thresholds for the statistical (cointegration) path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatArbConfig {
    /// Significance level for the cointegration test (e.g. 0.05).
    pub significance_level: f64,

    /// Minimum observations required for a cointegration test.
    pub min_points: usize,

    /// p-value cutoff applied by the pair scanner.
    pub p_value_threshold: f64,

    /// Minimum acceptable mean-reversion half-life, in periods.
    pub min_half_life: f64,

    /// Maximum acceptable mean-reversion half-life, in periods.
    pub max_half_life: f64,

    /// Z-score magnitude that opens a position.
    pub entry_threshold: f64,

    /// Z-score magnitude below which positions are closed.
    pub exit_threshold: f64,

    /// Rolling window length for spread statistics.
    pub lookback: usize,
}

impl Default for StatArbConfig {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            min_points: 20,
            p_value_threshold: 0.05,
            min_half_life: 1.0,
            max_half_life: 100.0,
            entry_threshold: 2.0,
            exit_threshold: 0.5,
            lookback: 100,
        }
    }
}

/// Thresholds for the spatial (cross-exchange price gap) detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Minimum net spread (after fees) to emit a signal, in percent.
    pub min_net_spread_pct: Decimal,

    /// Taker fee per leg, in percent.
    pub taker_fee_pct: Decimal,

    /// Notional per trade in USD; also the depth budget used for the
    /// depth-weighted price estimate.
    pub trade_amount_usd: Decimal,

    /// Minimum order book depth in USD on the thinner side.
    pub min_depth_usd: Decimal,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_net_spread_pct: Decimal::new(3, 1), // 0.3%
            taker_fee_pct: Decimal::new(1, 1),      // 0.1% per leg
            trade_amount_usd: Decimal::from(1_000),
            min_depth_usd: Decimal::from(5_000),
        }
    }
}

impl DetectorConfig {
    /// Sets the minimum net spread percentage.
    #[must_use]
    pub fn with_min_net_spread_pct(mut self, pct: Decimal) -> Self {
        self.min_net_spread_pct = pct;
        self
    }

    /// Sets the per-leg taker fee percentage.
    #[must_use]
    pub fn with_taker_fee_pct(mut self, pct: Decimal) -> Self {
        self.taker_fee_pct = pct;
        self
    }

    /// Sets the per-trade notional.
    #[must_use]
    pub fn with_trade_amount_usd(mut self, usd: Decimal) -> Self {
        self.trade_amount_usd = usd;
        self
    }

    /// Sets the minimum depth requirement.
    #[must_use]
    pub fn with_min_depth_usd(mut self, usd: Decimal) -> Self {
        self.min_depth_usd = usd;
        self
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Risk engine thresholds.
    pub risk: RiskConfig,
    /// Statistical path thresholds.
    pub stat_arb: StatArbConfig,
    /// Spatial detector thresholds.
    pub detector: DetectorConfig,
    /// Starting capital for paper trading and backtests, in USD.
    pub initial_capital_usd: Decimal,
}

impl EngineConfig {
    /// Creates a configuration with the given starting capital and defaults
    /// everywhere else.
    #[must_use]
    pub fn with_capital(initial_capital_usd: Decimal) -> Self {
        Self {
            initial_capital_usd,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_risk_config_defaults() {
        let config = RiskConfig::default();
        assert_eq!(config.consecutive_loss_limit, 3);
        assert_eq!(config.cooldown, Duration::from_secs(1800));
        assert_eq!(config.max_daily_loss_usd, dec!(500));
        // Same numeric type as the caps it scales.
        assert_eq!(config.max_drawdown_pct * config.warning_ratio, dec!(8.0));
    }

    #[test]
    fn test_risk_config_conservative_is_tighter() {
        let default = RiskConfig::default();
        let conservative = RiskConfig::conservative();
        assert!(conservative.max_position_usd < default.max_position_usd);
        assert!(conservative.consecutive_loss_limit <= default.consecutive_loss_limit);
        assert!(conservative.cooldown >= default.cooldown);
    }

    #[test]
    fn test_risk_config_builder() {
        let config = RiskConfig::default()
            .with_consecutive_loss_limit(5)
            .with_cooldown(Duration::from_secs(60))
            .with_max_daily_loss_usd(dec!(250));
        assert_eq!(config.consecutive_loss_limit, 5);
        assert_eq!(config.cooldown, Duration::from_secs(60));
        assert_eq!(config.max_daily_loss_usd, dec!(250));
    }

    #[test]
    fn test_stat_arb_defaults() {
        let config = StatArbConfig::default();
        assert!((config.significance_level - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.min_points, 20);
        assert_eq!(config.lookback, 100);
        assert!(config.exit_threshold < config.entry_threshold);
    }

    #[test]
    fn test_detector_defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.min_net_spread_pct, dec!(0.3));
        assert_eq!(config.taker_fee_pct, dec!(0.1));
    }

    #[test]
    fn test_engine_config_with_capital() {
        let config = EngineConfig::with_capital(dec!(25000));
        assert_eq!(config.initial_capital_usd, dec!(25000));
    }

    #[test]
    fn test_risk_config_serde_roundtrip_with_cooldown() {
        let config = RiskConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RiskConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.cooldown, config.cooldown);
        assert_eq!(deserialized.max_drawdown_pct, config.max_drawdown_pct);
    }
}
