//! Dry-run exchange adapter: live market data, simulated account.
//!
//! Wraps any real exchange for prices and instrument limits while
//! keeping balance, leverage, and orders entirely local. The engine
//! sees the same capability either way, so dry runs exercise the full
//! lifecycle without credentials or risk.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use crate::error::TradeError;
use crate::models::InstrumentLimits;

use super::exchange::{Exchange, OrderSide};

pub struct PaperExchange<E> {
    inner: E,
    balance: Decimal,
}

impl<E: Exchange> PaperExchange<E> {
    /// Wrap `inner` with a simulated account holding `balance`.
    pub fn new(inner: E, balance: Decimal) -> Self {
        Self { inner, balance }
    }
}

#[async_trait]
impl<E: Exchange> Exchange for PaperExchange<E> {
    async fn get_price(&self, symbol: &str) -> Result<Decimal, TradeError> {
        self.inner.get_price(symbol).await
    }

    async fn get_instrument_limits(
        &self,
        symbol: &str,
    ) -> Result<InstrumentLimits, TradeError> {
        self.inner.get_instrument_limits(symbol).await
    }

    async fn get_balance(&self) -> Result<Decimal, TradeError> {
        Ok(self.balance)
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), TradeError> {
        info!(symbol = %symbol, leverage = leverage, "[paper] leverage set");
        Ok(())
    }

    async fn place_order(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: Decimal,
    ) -> Result<String, TradeError> {
        let order_id = format!("paper-{}", uuid::Uuid::new_v4());
        info!(
            symbol = %symbol,
            side = %side,
            qty = %qty,
            order_id = %order_id,
            "[paper] market order filled"
        );
        Ok(order_id)
    }
}
