pub mod calc;
pub mod config;
pub mod engine;
pub mod lot;
pub mod signal;
pub mod sizing;

pub use config::TradingConfig;
pub use engine::{CycleOutcome, LifecycleEngine};
pub use signal::{RandomSignal, SignalSource};
pub use sizing::{SizingAdvisor, SizingDecision};
