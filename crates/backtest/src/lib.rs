//! Backtesting: historical tick replay through the live pipeline, plus
//! performance metrics over the resulting trade series.

pub mod data;
pub mod engine;
pub mod metrics;

pub use data::{HistoricalTickProvider, RecordedTick, TickProvider};
pub use engine::{BacktestEngine, BacktestReport};
pub use metrics::{profit_factor, MetricsCalculator, PerformanceMetrics};
