//! Exchange-imposed lot and leverage limits for a traded instrument.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Read-only instrument facts fetched per symbol from the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentLimits {
    /// Smallest order quantity the exchange accepts
    pub min_qty: Decimal,

    /// Order quantity granularity
    pub qty_step: Decimal,

    /// Largest leverage allowed for the symbol
    pub max_leverage: u32,

    /// Smallest order value (qty * price) the exchange accepts
    pub min_notional: Decimal,
}

impl InstrumentLimits {
    /// Conservative fallback used when the limits fetch fails, so the
    /// engine never blocks indefinitely on instrument metadata. Tighter
    /// than any mainstream perpetual contract actually enforces.
    pub fn conservative() -> Self {
        Self {
            min_qty: dec!(0.001),
            qty_step: dec!(0.001),
            max_leverage: 5,
            min_notional: dec!(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conservative_defaults_are_valid() {
        let limits = InstrumentLimits::conservative();
        assert!(limits.min_qty > Decimal::ZERO);
        assert!(limits.qty_step > Decimal::ZERO);
        assert!(limits.max_leverage >= 1);
    }
}
