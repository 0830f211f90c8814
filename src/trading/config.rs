//! Trading configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Configuration for signal thresholds and adaptive sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Signal score above which a flat engine opens a position (0-1)
    pub entry_threshold: f64,

    /// Signal score below which an open position is closed (0-1)
    pub exit_threshold: f64,

    /// Leverage for the first trade of a run
    pub default_leverage: u32,

    /// Leverage never drops below this, however long the losing streak
    pub leverage_floor: u32,

    /// Capital allocated to the first trade of a run
    pub default_capital: Decimal,

    /// Capital allocation never drops below this
    pub capital_floor: Decimal,

    /// Capital added after a winning round trip
    pub capital_step_up: Decimal,

    /// Capital removed after a losing round trip
    pub capital_step_down: Decimal,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            entry_threshold: 0.7,
            exit_threshold: 0.4,
            default_leverage: 3,
            leverage_floor: 1,
            default_capital: dec!(1000),
            capital_floor: dec!(100),
            capital_step_up: dec!(100),
            capital_step_down: dec!(100),
        }
    }
}
