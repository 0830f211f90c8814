//! Pure profit/loss and liquidation arithmetic for leveraged positions.
//!
//! These formulas are a linear approximation: no fees, no funding, no
//! partial-liquidation buffer. That is a documented simplification of
//! how exchanges actually settle, not an oversight.

use rust_decimal::Decimal;

use crate::error::TradeError;
use crate::models::Side;

/// Realized or hypothetical profit for a position.
///
/// notional = capital * leverage; a long earns the fractional move
/// (exit - entry) / entry on that notional, a short the negation.
pub fn pnl(
    side: Side,
    entry: Decimal,
    exit: Decimal,
    leverage: u32,
    capital: Decimal,
) -> Result<Decimal, TradeError> {
    validate(entry, leverage)?;
    if exit <= Decimal::ZERO {
        return Err(TradeError::Domain(format!(
            "exit price must be positive, got {}",
            exit
        )));
    }
    if capital <= Decimal::ZERO {
        return Err(TradeError::Domain(format!(
            "capital must be positive, got {}",
            capital
        )));
    }

    let notional = capital * Decimal::from(leverage);
    let movement = match side {
        Side::Long => (exit - entry) / entry,
        Side::Short => (entry - exit) / entry,
    };

    Ok(notional * movement)
}

/// Price at which losses are projected to consume the allocated capital.
///
/// Long: entry * (1 - 1/leverage). Short: entry * (1 + 1/leverage).
pub fn liquidation(entry: Decimal, leverage: u32, side: Side) -> Result<Decimal, TradeError> {
    validate(entry, leverage)?;

    let inverse = Decimal::ONE / Decimal::from(leverage);
    Ok(match side {
        Side::Long => entry * (Decimal::ONE - inverse),
        Side::Short => entry * (Decimal::ONE + inverse),
    })
}

fn validate(entry: Decimal, leverage: u32) -> Result<(), TradeError> {
    if entry <= Decimal::ZERO {
        return Err(TradeError::Domain(format!(
            "entry price must be positive, got {}",
            entry
        )));
    }
    if leverage == 0 {
        return Err(TradeError::Domain("leverage must be at least 1".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_long_scenario() {
        // 1000 capital at 5x is 5000 notional; a 10% move earns 500
        let profit = pnl(Side::Long, dec!(100), dec!(110), 5, dec!(1000)).unwrap();
        assert_eq!(profit, dec!(500));

        let liq = liquidation(dec!(100), 5, Side::Long).unwrap();
        assert_eq!(liq, dec!(80));
    }

    #[test]
    fn test_long_short_antisymmetry() {
        let cases = [
            (dec!(100), dec!(110)),
            (dec!(250), dec!(237.5)),
            (dec!(0.085), dec!(0.091)),
        ];
        for (entry, exit) in cases {
            let long = pnl(Side::Long, entry, exit, 7, dec!(500)).unwrap();
            let short = pnl(Side::Short, entry, exit, 7, dec!(500)).unwrap();
            assert_eq!(long, -short);
        }
    }

    #[test]
    fn test_liquidation_brackets_entry() {
        for leverage in [2u32, 5, 10, 50] {
            let entry = dec!(30000);
            let long = liquidation(entry, leverage, Side::Long).unwrap();
            let short = liquidation(entry, leverage, Side::Short).unwrap();
            assert!(long < entry, "long liq {} must sit below entry", long);
            assert!(short > entry, "short liq {} must sit above entry", short);
        }
    }

    #[test]
    fn test_at_1x_long_liquidation_is_zero() {
        assert_eq!(liquidation(dec!(100), 1, Side::Long).unwrap(), dec!(0));
        assert_eq!(liquidation(dec!(100), 1, Side::Short).unwrap(), dec!(200));
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(matches!(
            pnl(Side::Long, dec!(0), dec!(110), 5, dec!(1000)),
            Err(TradeError::Domain(_))
        ));
        assert!(matches!(
            pnl(Side::Long, dec!(100), dec!(-1), 5, dec!(1000)),
            Err(TradeError::Domain(_))
        ));
        assert!(matches!(
            pnl(Side::Long, dec!(100), dec!(110), 0, dec!(1000)),
            Err(TradeError::Domain(_))
        ));
        assert!(matches!(
            pnl(Side::Long, dec!(100), dec!(110), 5, dec!(0)),
            Err(TradeError::Domain(_))
        ));
        assert!(matches!(
            liquidation(dec!(-5), 5, Side::Short),
            Err(TradeError::Domain(_))
        ));
    }
}
