//! Cycle pipeline: snapshot capture, opportunity detection, risk gating,
//! and execution orchestration.

pub mod detectors;
pub mod orchestrator;
pub mod snapshot;

pub use detectors::{
    Detector, SpatialDetector, StatArbDetector, SELL_QUANTITY_KEY, SELL_SYMBOL_KEY,
};
pub use orchestrator::{CycleReport, Pipeline, PipelineStats};
pub use snapshot::{MarketSnapshot, SnapshotStore};
