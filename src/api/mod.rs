//! Exchange adapters and the capability trait the engine consumes.

mod bybit;
mod exchange;
mod paper;

pub use bybit::{testnet_from_env, BybitClient};
pub use exchange::{Exchange, OrderSide};
pub use paper::PaperExchange;
