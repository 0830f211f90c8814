//! Trade records: the append-only history of opens and closes.

use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;

/// Whether a record opened or closed a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Open,
    Close,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Open => "OPEN",
            TradeAction::Close => "CLOSE",
        }
    }
}

/// One immutable entry in the trade history. Open records always carry
/// a zero pnl; close records carry the realized pnl of the round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Local>,
    pub symbol: String,
    pub side: Side,
    pub action: TradeAction,
    pub price: Decimal,
    pub leverage: u32,
    pub pnl: Decimal,
}

impl TradeRecord {
    /// Record for a freshly opened position.
    pub fn open(symbol: String, side: Side, price: Decimal, leverage: u32) -> Self {
        Self {
            timestamp: Local::now(),
            symbol,
            side,
            action: TradeAction::Open,
            price,
            leverage,
            pnl: Decimal::ZERO,
        }
    }

    /// Record for a closed position with its realized pnl.
    pub fn close(symbol: String, side: Side, price: Decimal, leverage: u32, pnl: Decimal) -> Self {
        Self {
            timestamp: Local::now(),
            symbol,
            side,
            action: TradeAction::Close,
            price,
            leverage,
            pnl,
        }
    }

    pub fn is_close(&self) -> bool {
        self.action == TradeAction::Close
    }
}
