//! Statistical path of the arbitrage engine.
//!
//! Three stages, each deterministic and side-effect free:
//!
//! - [`cointegration`]: does a stable linear relationship exist between two
//!   price series? Produces hedge ratio, stationarity p-value, and
//!   mean-reversion half-life.
//! - [`scanner`]: which pairs in a symbol universe are tradable? Runs the
//!   cointegration test over every unordered pair and ranks survivors.
//! - [`zscore`]: where is a pair's spread right now? Rolling z-score plus a
//!   discrete entry/exit signal.

pub mod cointegration;
pub mod scanner;
pub mod zscore;

pub use cointegration::{CointegrationAnalyzer, CointegrationResult};
pub use scanner::{CointegratedPair, HalfLifeBounds, PairScanner};
pub use zscore::{SpreadSignal, ZScoreCalculator, ZScoreResult};
