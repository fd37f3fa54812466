//! Fill simulation and paper execution against order book snapshots.

pub mod paper;
pub mod simulator;

pub use paper::PaperExecutor;
pub use simulator::{split_symbol, FillSimulator};
