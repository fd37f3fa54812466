//! Core types, configuration, and capability traits for the arbitrage
//! engine.
//!
//! Everything downstream crates share lives here: the order book snapshot
//! model, the signal/order/fill data model, the immutable configuration
//! surface, the error taxonomy, and the [`Executor`]/[`Notifier`] seams.

pub mod config;
pub mod config_loader;
pub mod error;
pub mod orderbook;
pub mod traits;
pub mod types;

pub use config::{DetectorConfig, EngineConfig, RiskConfig, StatArbConfig};
pub use config_loader::ConfigLoader;
pub use error::{ExecutionError, StatError};
pub use orderbook::{OrderBook, PriceLevel};
pub use traits::{ExecutionLeg, Executor, LogNotifier, Notifier};
pub use types::{
    ArbitrageSignal, ExecutionOutcome, FundingRateSnapshot, Order, OrderStatus, OrderType,
    PortfolioState, Side, SignalStatus, Strategy, TradeResult,
};
