//! Order quantity normalization against exchange lot constraints.

use rust_decimal::Decimal;

use crate::error::TradeError;
use crate::models::InstrumentLimits;

/// Round a desired quantity to what the exchange will accept.
///
/// Quantities below `min_qty` are raised to it; anything else is rounded
/// DOWN to the nearest multiple of `qty_step`. Rounding never goes up,
/// so the order never allocates more capital than requested.
pub fn normalize(
    raw_qty: Decimal,
    min_qty: Decimal,
    qty_step: Decimal,
) -> Result<Decimal, TradeError> {
    if min_qty <= Decimal::ZERO || qty_step <= Decimal::ZERO {
        return Err(TradeError::InvalidLimits(format!(
            "min_qty {} and qty_step {} must both be positive",
            min_qty, qty_step
        )));
    }

    if raw_qty < min_qty {
        return Ok(min_qty);
    }

    let stepped = (raw_qty / qty_step).floor() * qty_step;

    // Stepping down can undercut min_qty when the minimum is not itself
    // on the step grid; the exchange's own minimum is always accepted.
    Ok(stepped.max(min_qty))
}

/// Verify the normalized order value still satisfies the exchange's
/// minimum notional. Rounding a quantity down against the step size can
/// otherwise produce an order the exchange rejects.
pub fn check_notional(
    qty: Decimal,
    price: Decimal,
    limits: &InstrumentLimits,
) -> Result<(), TradeError> {
    let notional = qty * price;
    if notional < limits.min_notional {
        return Err(TradeError::InvalidLimits(format!(
            "order notional {} below exchange minimum {}",
            notional, limits.min_notional
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rounds_down_to_step() {
        // 0.0172 / 0.005 = 3.44 -> 3 steps -> 0.015
        let qty = normalize(dec!(0.0172), dec!(0.01), dec!(0.005)).unwrap();
        assert_eq!(qty, dec!(0.015));
    }

    #[test]
    fn test_raises_to_min_qty() {
        let qty = normalize(dec!(0.004), dec!(0.01), dec!(0.005)).unwrap();
        assert_eq!(qty, dec!(0.01));
    }

    #[test]
    fn test_exact_multiple_unchanged() {
        let qty = normalize(dec!(0.025), dec!(0.01), dec!(0.005)).unwrap();
        assert_eq!(qty, dec!(0.025));
    }

    #[test]
    fn test_idempotent() {
        for raw in [dec!(0.0172), dec!(0.004), dec!(1.2345), dec!(0.01)] {
            let once = normalize(raw, dec!(0.01), dec!(0.005)).unwrap();
            let twice = normalize(once, dec!(0.01), dec!(0.005)).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_result_respects_both_constraints() {
        for raw in [dec!(0.011), dec!(0.09), dec!(7.7777)] {
            let qty = normalize(raw, dec!(0.01), dec!(0.005)).unwrap();
            assert!(qty >= dec!(0.01));
            assert_eq!((qty / dec!(0.005)).fract(), dec!(0));
        }
    }

    #[test]
    fn test_invalid_limits_rejected() {
        assert!(matches!(
            normalize(dec!(1), dec!(0), dec!(0.005)),
            Err(TradeError::InvalidLimits(_))
        ));
        assert!(matches!(
            normalize(dec!(1), dec!(0.01), dec!(-0.005)),
            Err(TradeError::InvalidLimits(_))
        ));
    }

    #[test]
    fn test_notional_check() {
        let limits = InstrumentLimits {
            min_qty: dec!(0.001),
            qty_step: dec!(0.001),
            max_leverage: 50,
            min_notional: dec!(5),
        };
        assert!(check_notional(dec!(0.001), dec!(100), &limits).is_err());
        assert!(check_notional(dec!(0.1), dec!(100), &limits).is_ok());
    }
}
