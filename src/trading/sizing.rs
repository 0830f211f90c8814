//! Adaptive leverage and capital sizing for the next trade.

use rust_decimal::Decimal;

use crate::models::TradeRecord;

use super::TradingConfig;

/// Leverage and capital proposed for the next trade. Derived fresh for
/// each open; never persisted beyond the decision point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizingDecision {
    pub leverage: u32,
    pub capital: Decimal,
}

/// Proposes sizing from trade history, balance, and exchange limits.
///
/// The rule is deliberately simple momentum: one leverage step and one
/// capital step up after a winning round trip, down after a losing one,
/// always clamped into `[leverage_floor, max_leverage]` and
/// `[capital_floor, balance]`.
pub struct SizingAdvisor {
    config: TradingConfig,
}

impl SizingAdvisor {
    pub fn new(config: TradingConfig) -> Self {
        Self { config }
    }

    /// Suggest sizing for the next trade. `previous` is the decision
    /// used for the most recent trade, if any; pure over its inputs.
    pub fn suggest(
        &self,
        history: &[TradeRecord],
        previous: Option<SizingDecision>,
        balance: Decimal,
        max_leverage: u32,
    ) -> SizingDecision {
        let last_close = history.iter().rev().find(|r| r.is_close());

        let base = match (last_close, previous) {
            (Some(close), Some(prev)) if close.pnl > Decimal::ZERO => SizingDecision {
                leverage: prev.leverage.saturating_add(1),
                capital: prev.capital + self.config.capital_step_up,
            },
            (Some(_), Some(prev)) => SizingDecision {
                leverage: prev.leverage.saturating_sub(1),
                capital: prev.capital - self.config.capital_step_down,
            },
            _ => SizingDecision {
                leverage: self.config.default_leverage,
                capital: self.config.default_capital,
            },
        };

        self.clamp(base, balance, max_leverage)
    }

    /// Clamp a decision into the allowed bounds. Also applied to
    /// operator overrides before they are accepted.
    pub fn clamp(
        &self,
        decision: SizingDecision,
        balance: Decimal,
        max_leverage: u32,
    ) -> SizingDecision {
        let ceiling = max_leverage.max(self.config.leverage_floor);
        let leverage = decision.leverage.clamp(self.config.leverage_floor, ceiling);

        // The floor wins over balance when the account is nearly empty;
        // the engine's notional check rejects unaffordable orders later.
        let capital = decision
            .capital
            .min(balance)
            .max(self.config.capital_floor);

        SizingDecision { leverage, capital }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use rust_decimal_macros::dec;

    fn advisor() -> SizingAdvisor {
        SizingAdvisor::new(TradingConfig::default())
    }

    fn close_record(pnl: Decimal) -> TradeRecord {
        TradeRecord::close("BTCUSDT".to_string(), Side::Long, dec!(50000), 3, pnl)
    }

    #[test]
    fn test_base_case_uses_defaults() {
        let decision = advisor().suggest(&[], None, dec!(5000), 20);
        assert_eq!(decision.leverage, 3);
        assert_eq!(decision.capital, dec!(1000));
    }

    #[test]
    fn test_base_case_capped_by_balance_and_limits() {
        let decision = advisor().suggest(&[], None, dec!(400), 2);
        assert_eq!(decision.leverage, 2);
        assert_eq!(decision.capital, dec!(400));
    }

    #[test]
    fn test_win_steps_up() {
        let history = vec![close_record(dec!(120))];
        let previous = SizingDecision {
            leverage: 3,
            capital: dec!(1000),
        };
        let decision = advisor().suggest(&history, Some(previous), dec!(5000), 20);
        assert_eq!(decision.leverage, 4);
        assert_eq!(decision.capital, dec!(1100));
    }

    #[test]
    fn test_loss_steps_down() {
        let history = vec![close_record(dec!(-80))];
        let previous = SizingDecision {
            leverage: 3,
            capital: dec!(1000),
        };
        let decision = advisor().suggest(&history, Some(previous), dec!(5000), 20);
        assert_eq!(decision.leverage, 2);
        assert_eq!(decision.capital, dec!(900));
    }

    #[test]
    fn test_output_always_within_bounds() {
        let advisor = advisor();
        let wins: Vec<TradeRecord> = vec![close_record(dec!(50))];
        let losses: Vec<TradeRecord> = vec![close_record(dec!(-50))];

        let mut previous = SizingDecision {
            leverage: 3,
            capital: dec!(1000),
        };
        // A long winning streak saturates at the exchange cap and balance
        for _ in 0..50 {
            previous = advisor.suggest(&wins, Some(previous), dec!(1500), 10);
            assert!(previous.leverage <= 10);
            assert!(previous.capital <= dec!(1500));
        }
        assert_eq!(previous.leverage, 10);
        assert_eq!(previous.capital, dec!(1500));

        // A long losing streak saturates at the floors
        for _ in 0..50 {
            previous = advisor.suggest(&losses, Some(previous), dec!(1500), 10);
            assert!(previous.leverage >= 1);
            assert!(previous.capital >= dec!(100));
        }
        assert_eq!(previous.leverage, 1);
        assert_eq!(previous.capital, dec!(100));
    }

    #[test]
    fn test_override_reclamped() {
        let decision = advisor().clamp(
            SizingDecision {
                leverage: 100,
                capital: dec!(999999),
            },
            dec!(2000),
            25,
        );
        assert_eq!(decision.leverage, 25);
        assert_eq!(decision.capital, dec!(2000));
    }
}
