//! Error types shared across the engine.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors from the statistical path (cointegration, scanning, z-scores).
///
/// These propagate to the caller; they are never swallowed into a zero
/// result.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StatError {
    /// Too few observations for the requested test.
    #[error("insufficient data: need at least {needed} points, got {got}")]
    DataInsufficient {
        /// Minimum number of points required.
        needed: usize,
        /// Number of points supplied.
        got: usize,
    },

    /// Series lengths do not match.
    #[error("mismatched series lengths: {len_a} vs {len_b}")]
    MismatchedSeries {
        /// Length of series A.
        len_a: usize,
        /// Length of series B.
        len_b: usize,
    },

    /// A series contains NaN or infinite values.
    #[error("series contains non-finite values")]
    NonFinite,
}

/// Recoverable execution failures.
///
/// These cause the affected signal to be recorded `Missed`; they never
/// abort a cycle.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// The executor cannot cover the requested quantity.
    #[error("insufficient {asset} balance: need {needed}, have {available}")]
    InsufficientBalance {
        /// Asset that fell short.
        asset: String,
        /// Amount required.
        needed: Decimal,
        /// Amount available.
        available: Decimal,
    },

    /// No order book available for a leg's exchange/symbol.
    #[error("no order book for {symbol} on {exchange}")]
    MissingOrderBook {
        /// Exchange the leg targets.
        exchange: String,
        /// Symbol the leg targets.
        symbol: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_stat_error_display() {
        let err = StatError::DataInsufficient { needed: 20, got: 5 };
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 20 points, got 5"
        );
    }

    #[test]
    fn test_execution_error_display() {
        let err = ExecutionError::InsufficientBalance {
            asset: "USDT".to_string(),
            needed: dec!(1000),
            available: dec!(250),
        };
        assert_eq!(
            err.to_string(),
            "insufficient USDT balance: need 1000, have 250"
        );
    }
}
