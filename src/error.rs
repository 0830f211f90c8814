//! Typed error kinds for trading operations.
//!
//! Transient exchange failures (price, limits, balance) are recoverable:
//! the run loop skips the cycle and retries later. Order placement
//! failures are rolled back by the lifecycle engine. Domain errors mean
//! the inputs to a computation were invalid and only that computation
//! fails, never the process.

use thiserror::Error;

use crate::api::OrderSide;

#[derive(Debug, Error)]
pub enum TradeError {
    /// Transient: skip this cycle and retry after a backoff delay.
    #[error("failed to fetch price for {symbol}: {reason}")]
    PriceFetch { symbol: String, reason: String },

    /// Transient: fall back to conservative instrument limits.
    #[error("failed to fetch instrument limits for {symbol}: {reason}")]
    LimitsFetch { symbol: String, reason: String },

    /// Transient: skip the open attempt this cycle.
    #[error("failed to fetch account balance: {reason}")]
    BalanceFetch { reason: String },

    /// Non-fatal: the open attempt for this cycle is aborted.
    #[error("failed to set leverage for {symbol}: {reason}")]
    Leverage { symbol: String, reason: String },

    /// Non-fatal: an open is rolled back, a close is retried later.
    #[error("failed to place {side} order for {symbol}: {reason}")]
    OrderPlacement {
        symbol: String,
        side: OrderSide,
        reason: String,
    },

    /// Invalid numeric input to a calculation (non-positive price,
    /// capital, or zero leverage).
    #[error("domain error: {0}")]
    Domain(String),

    /// Invalid or violated exchange limits (non-positive min_qty or
    /// qty_step, or an order below the minimum notional).
    #[error("invalid limits: {0}")]
    InvalidLimits(String),

    /// Journal write failure; reported but never rolls back an order.
    #[error("failed to write trade journal: {0}")]
    Journal(String),
}

impl TradeError {
    /// True for errors that should only skip the current poll cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TradeError::PriceFetch { .. }
                | TradeError::LimitsFetch { .. }
                | TradeError::BalanceFetch { .. }
        )
    }
}
