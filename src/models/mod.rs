//! Data models for positions, trade records, and instrument limits.

mod limits;
mod position;
mod trade;

pub use limits::InstrumentLimits;
pub use position::{Position, Side};
pub use trade::{TradeAction, TradeRecord};
