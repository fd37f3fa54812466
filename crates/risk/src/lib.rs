//! Pre-trade risk controls: circuit breaker, market-data anomaly
//! detection, drawdown tracking, and the engine that composes them.

pub mod anomaly;
pub mod breaker;
pub mod drawdown;
pub mod engine;

pub use anomaly::{AnomalyDetector, AnomalyKind};
pub use breaker::{BreakerState, CircuitBreaker, TripReason};
pub use drawdown::DrawdownMonitor;
pub use engine::{RejectReason, RiskDecision, RiskEngine};
