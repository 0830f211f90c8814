//! The exchange capability consumed by the trading engine.
//!
//! Everything the engine needs from an exchange fits behind one trait,
//! so the concrete venue (live, testnet, paper, or a scripted test
//! double) is selected by configuration rather than a second engine.

use std::fmt;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::TradeError;
use crate::models::InstrumentLimits;

/// Order direction as the exchange sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "Buy",
            OrderSide::Sell => "Sell",
        }
    }

}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Blocking-from-the-engine's-point-of-view exchange operations. All
/// calls are awaited inline by the single polling task; failures are
/// converted into skip-this-cycle outcomes at the call site.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Latest traded price for a symbol.
    async fn get_price(&self, symbol: &str) -> Result<Decimal, TradeError>;

    /// Lot and leverage limits for a symbol.
    async fn get_instrument_limits(&self, symbol: &str)
        -> Result<InstrumentLimits, TradeError>;

    /// Available account balance in the quote currency.
    async fn get_balance(&self) -> Result<Decimal, TradeError>;

    /// Apply leverage for subsequent orders on a symbol.
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), TradeError>;

    /// Place a market order; returns the exchange order id.
    async fn place_order(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: Decimal,
    ) -> Result<String, TradeError>;
}
