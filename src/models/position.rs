//! Position model: the single open leveraged futures position.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a leveraged position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LONG" => Ok(Side::Long),
            "SHORT" => Ok(Side::Short),
            other => Err(format!("unknown side '{}', expected LONG or SHORT", other)),
        }
    }
}

/// An open futures position. At most one exists per engine; it is
/// created on the FLAT -> OPEN transition and dropped on close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Contract symbol, e.g. "BTCUSDT"
    pub symbol: String,

    /// Position direction
    pub side: Side,

    /// Price at which the position was opened
    pub entry_price: Decimal,

    /// Leverage applied to the allocated capital
    pub leverage: u32,

    /// Contract quantity, already normalized against lot limits
    pub quantity: Decimal,

    /// Capital allocated to this position
    pub capital: Decimal,

    /// When the position was opened
    pub opened_at: DateTime<Local>,
}

impl Position {
    pub fn new(
        symbol: String,
        side: Side,
        entry_price: Decimal,
        leverage: u32,
        quantity: Decimal,
        capital: Decimal,
    ) -> Self {
        Self {
            symbol,
            side,
            entry_price,
            leverage,
            quantity,
            capital,
            opened_at: Local::now(),
        }
    }

    /// Effective exposure: capital multiplied by leverage.
    pub fn notional(&self) -> Decimal {
        self.capital * Decimal::from(self.leverage)
    }
}
