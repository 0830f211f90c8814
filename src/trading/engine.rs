//! Position lifecycle engine: the FLAT/OPEN state machine.
//!
//! Evaluated once per poll cycle with a fresh price and a signal score.
//! The engine owns the single position slot, the trade history, and the
//! running profit total; nothing about its state is global, so several
//! engines can coexist in one process (and in tests).
//!
//! Failure policy, in one place:
//! - a failed open leaves the engine FLAT (no position, no record)
//! - a failed close leaves the position OPEN for a later retry, so risk
//!   exposure is never silently dropped
//! - a journal write failure is reported but never rolls back an order

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::api::{Exchange, OrderSide};
use crate::error::TradeError;
use crate::journal::TradeSink;
use crate::models::{InstrumentLimits, Position, Side, TradeRecord};

use super::sizing::{SizingAdvisor, SizingDecision};
use super::{calc, lot, TradingConfig};

/// What a single evaluation cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A position was opened this cycle
    Opened,
    /// The open position was closed this cycle
    Closed,
    /// Thresholds unmet; nothing changed
    Idle,
}

pub struct LifecycleEngine {
    symbol: String,
    config: TradingConfig,
    advisor: SizingAdvisor,
    sink: Box<dyn TradeSink>,

    position: Option<Position>,
    history: Vec<TradeRecord>,
    total_profit: Decimal,

    // Instrument limits, cached after the first successful fetch
    limits: Option<InstrumentLimits>,

    // Sizing used for the most recent open; feeds the next suggestion
    last_sizing: Option<SizingDecision>,

    leverage_override: Option<u32>,
    capital_override: Option<Decimal>,
}

impl LifecycleEngine {
    pub fn new(symbol: String, config: TradingConfig, sink: Box<dyn TradeSink>) -> Self {
        let advisor = SizingAdvisor::new(config.clone());
        Self {
            symbol,
            config,
            advisor,
            sink,
            position: None,
            history: Vec::new(),
            total_profit: Decimal::ZERO,
            limits: None,
            last_sizing: None,
            leverage_override: None,
            capital_override: None,
        }
    }

    /// Operator overrides for the advisor's suggestion. Values are
    /// re-clamped against the same bounds before every open.
    pub fn with_overrides(
        mut self,
        leverage: Option<u32>,
        capital: Option<Decimal>,
    ) -> Self {
        self.leverage_override = leverage;
        self.capital_override = capital;
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.position.is_some()
    }

    pub fn history(&self) -> &[TradeRecord] {
        &self.history
    }

    pub fn total_profit(&self) -> Decimal {
        self.total_profit
    }

    /// Evaluate one cycle. `score` must already be in [0, 1]; the
    /// caller owns price fetching, so a fetch failure simply means this
    /// method is not called and the cycle is skipped.
    pub async fn evaluate(
        &mut self,
        exchange: &dyn Exchange,
        price: Decimal,
        score: f64,
    ) -> Result<CycleOutcome, TradeError> {
        if price <= Decimal::ZERO {
            return Err(TradeError::Domain(format!(
                "price must be positive, got {}",
                price
            )));
        }

        if !self.is_open() && score > self.config.entry_threshold {
            self.open(exchange, price).await
        } else if self.is_open() && score < self.config.exit_threshold {
            self.close(exchange, price).await
        } else {
            debug!(
                symbol = %self.symbol,
                price = %price,
                score = score,
                open = self.is_open(),
                "Idle cycle"
            );
            Ok(CycleOutcome::Idle)
        }
    }

    /// Close any open position regardless of the signal. Used by the
    /// shutdown path and at the end of a timed run.
    pub async fn force_close(
        &mut self,
        exchange: &dyn Exchange,
        price: Decimal,
    ) -> Result<CycleOutcome, TradeError> {
        if self.position.is_none() {
            return Ok(CycleOutcome::Idle);
        }
        self.close(exchange, price).await
    }

    async fn open(
        &mut self,
        exchange: &dyn Exchange,
        price: Decimal,
    ) -> Result<CycleOutcome, TradeError> {
        let limits = self.instrument_limits(exchange).await;
        let balance = exchange.get_balance().await?;

        let mut decision =
            self.advisor
                .suggest(&self.history, self.last_sizing, balance, limits.max_leverage);
        if let Some(leverage) = self.leverage_override {
            decision.leverage = leverage;
        }
        if let Some(capital) = self.capital_override {
            decision.capital = capital;
        }
        let decision = self.advisor.clamp(decision, balance, limits.max_leverage);

        let raw_qty = decision.capital * Decimal::from(decision.leverage) / price;
        let quantity = lot::normalize(raw_qty, limits.min_qty, limits.qty_step)?;
        lot::check_notional(quantity, price, &limits)?;
        let liq = calc::liquidation(price, decision.leverage, Side::Long)?;

        // Any failure from here on aborts the open; the engine stays
        // FLAT and no record is written.
        exchange.set_leverage(&self.symbol, decision.leverage).await?;
        let order_id = exchange
            .place_order(&self.symbol, OrderSide::Buy, quantity)
            .await?;

        self.record(TradeRecord::open(
            self.symbol.clone(),
            Side::Long,
            price,
            decision.leverage,
        ));
        self.position = Some(Position::new(
            self.symbol.clone(),
            Side::Long,
            price,
            decision.leverage,
            quantity,
            decision.capital,
        ));
        self.last_sizing = Some(decision);

        info!(
            symbol = %self.symbol,
            price = %price,
            leverage = decision.leverage,
            capital = %decision.capital,
            qty = %quantity,
            liquidation = %liq,
            order_id = %order_id,
            "Opened LONG position"
        );

        Ok(CycleOutcome::Opened)
    }

    async fn close(
        &mut self,
        exchange: &dyn Exchange,
        price: Decimal,
    ) -> Result<CycleOutcome, TradeError> {
        let position = match &self.position {
            Some(p) => p.clone(),
            None => return Ok(CycleOutcome::Idle),
        };

        let pnl = calc::pnl(
            position.side,
            position.entry_price,
            price,
            position.leverage,
            position.capital,
        )?;

        // If the closing order fails the position stays OPEN, so a
        // later cycle or the shutdown path retries it.
        let order_id = exchange
            .place_order(&self.symbol, close_side(position.side), position.quantity)
            .await?;

        self.record(TradeRecord::close(
            self.symbol.clone(),
            position.side,
            price,
            position.leverage,
            pnl,
        ));
        self.total_profit += pnl;
        self.position = None;

        info!(
            symbol = %self.symbol,
            entry = %position.entry_price,
            exit = %price,
            pnl = %pnl,
            total_profit = %self.total_profit,
            order_id = %order_id,
            "Closed position"
        );

        Ok(CycleOutcome::Closed)
    }

    async fn instrument_limits(&mut self, exchange: &dyn Exchange) -> InstrumentLimits {
        if let Some(limits) = &self.limits {
            return limits.clone();
        }

        match exchange.get_instrument_limits(&self.symbol).await {
            Ok(limits) => {
                self.limits = Some(limits.clone());
                limits
            }
            Err(e) => {
                // Conservative stand-in, not cached: a later successful
                // fetch replaces it.
                warn!(
                    symbol = %self.symbol,
                    error = %e,
                    "Limits fetch failed, using conservative defaults"
                );
                InstrumentLimits::conservative()
            }
        }
    }

    fn record(&mut self, record: TradeRecord) {
        if let Err(e) = self.sink.append(&record) {
            warn!(symbol = %self.symbol, error = %e, "Failed to journal trade");
        }
        self.history.push(record);
    }
}

fn close_side(side: Side) -> OrderSide {
    match side {
        Side::Long => OrderSide::Sell,
        Side::Short => OrderSide::Buy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeAction;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted exchange double: every call succeeds unless a failure
    /// flag is raised.
    #[derive(Default)]
    struct MockExchange {
        fail_limits: AtomicBool,
        fail_balance: AtomicBool,
        fail_leverage: AtomicBool,
        fail_order: AtomicBool,
        price: Mutex<Decimal>,
        orders: Mutex<Vec<(OrderSide, Decimal)>>,
        limits_calls: AtomicU64,
    }

    impl MockExchange {
        fn new(price: Decimal) -> Self {
            Self {
                price: Mutex::new(price),
                ..Default::default()
            }
        }

        fn orders(&self) -> Vec<(OrderSide, Decimal)> {
            self.orders.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Exchange for MockExchange {
        async fn get_price(&self, _symbol: &str) -> Result<Decimal, TradeError> {
            Ok(*self.price.lock().unwrap())
        }

        async fn get_instrument_limits(
            &self,
            symbol: &str,
        ) -> Result<InstrumentLimits, TradeError> {
            self.limits_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_limits.load(Ordering::SeqCst) {
                return Err(TradeError::LimitsFetch {
                    symbol: symbol.to_string(),
                    reason: "scripted failure".to_string(),
                });
            }
            Ok(InstrumentLimits {
                min_qty: dec!(0.001),
                qty_step: dec!(0.001),
                max_leverage: 20,
                min_notional: dec!(5),
            })
        }

        async fn get_balance(&self) -> Result<Decimal, TradeError> {
            if self.fail_balance.load(Ordering::SeqCst) {
                return Err(TradeError::BalanceFetch {
                    reason: "scripted failure".to_string(),
                });
            }
            Ok(dec!(5000))
        }

        async fn set_leverage(&self, symbol: &str, _leverage: u32) -> Result<(), TradeError> {
            if self.fail_leverage.load(Ordering::SeqCst) {
                return Err(TradeError::Leverage {
                    symbol: symbol.to_string(),
                    reason: "scripted failure".to_string(),
                });
            }
            Ok(())
        }

        async fn place_order(
            &self,
            symbol: &str,
            side: OrderSide,
            qty: Decimal,
        ) -> Result<String, TradeError> {
            if self.fail_order.load(Ordering::SeqCst) {
                return Err(TradeError::OrderPlacement {
                    symbol: symbol.to_string(),
                    side,
                    reason: "scripted failure".to_string(),
                });
            }
            self.orders.lock().unwrap().push((side, qty));
            Ok("mock-order-1".to_string())
        }
    }

    #[derive(Clone, Default)]
    struct MemorySink(Arc<Mutex<Vec<TradeRecord>>>);

    impl MemorySink {
        fn records(&self) -> Vec<TradeRecord> {
            self.0.lock().unwrap().clone()
        }
    }

    impl TradeSink for MemorySink {
        fn append(&mut self, record: &TradeRecord) -> Result<(), TradeError> {
            self.0.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn engine_with_sink() -> (LifecycleEngine, MemorySink) {
        let sink = MemorySink::default();
        let engine = LifecycleEngine::new(
            "BTCUSDT".to_string(),
            TradingConfig::default(),
            Box::new(sink.clone()),
        );
        (engine, sink)
    }

    #[tokio::test]
    async fn test_weak_signals_never_open() {
        let (mut engine, sink) = engine_with_sink();
        let exchange = MockExchange::new(dec!(50000));

        for score in [0.0, 0.3, 0.5, 0.69, 0.7] {
            let outcome = engine.evaluate(&exchange, dec!(50000), score).await.unwrap();
            assert_eq!(outcome, CycleOutcome::Idle);
        }

        assert!(!engine.is_open());
        assert!(sink.records().is_empty());
        assert!(exchange.orders().is_empty());
    }

    #[tokio::test]
    async fn test_open_close_round_trip() {
        let (mut engine, sink) = engine_with_sink();
        let exchange = MockExchange::new(dec!(100));

        let outcome = engine.evaluate(&exchange, dec!(100), 0.9).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Opened);
        assert!(engine.is_open());

        let pos = engine.position().unwrap();
        assert_eq!(pos.side, Side::Long);
        assert_eq!(pos.entry_price, dec!(100));
        assert_eq!(pos.leverage, 3);
        // 1000 * 3 / 100 = 30 contracts, already on the step grid
        assert_eq!(pos.quantity, dec!(30.000));

        // Holding range: neither threshold crossed
        let outcome = engine.evaluate(&exchange, dec!(105), 0.5).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Idle);
        assert!(engine.is_open());

        // Exit on weak signal at 110: 3000 notional * 10% = 300
        let outcome = engine.evaluate(&exchange, dec!(110), 0.2).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Closed);
        assert!(!engine.is_open());
        assert_eq!(engine.total_profit(), dec!(300));

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, TradeAction::Open);
        assert_eq!(records[0].pnl, Decimal::ZERO);
        assert_eq!(records[1].action, TradeAction::Close);
        assert_eq!(records[1].pnl, dec!(300));

        let orders = exchange.orders();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].0, OrderSide::Buy);
        assert_eq!(orders[1].0, OrderSide::Sell);
        // The close sells exactly the opened quantity
        assert_eq!(orders[0].1, orders[1].1);
    }

    #[tokio::test]
    async fn test_failed_open_rolls_back_to_flat() {
        let (mut engine, sink) = engine_with_sink();
        let exchange = MockExchange::new(dec!(100));
        exchange.fail_order.store(true, Ordering::SeqCst);

        let result = engine.evaluate(&exchange, dec!(100), 0.9).await;
        assert!(matches!(result, Err(TradeError::OrderPlacement { .. })));
        assert!(!engine.is_open());
        assert!(sink.records().is_empty());

        // Next cycle with a healthy exchange succeeds
        exchange.fail_order.store(false, Ordering::SeqCst);
        let outcome = engine.evaluate(&exchange, dec!(100), 0.9).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Opened);
    }

    #[tokio::test]
    async fn test_failed_leverage_aborts_open() {
        let (mut engine, sink) = engine_with_sink();
        let exchange = MockExchange::new(dec!(100));
        exchange.fail_leverage.store(true, Ordering::SeqCst);

        let result = engine.evaluate(&exchange, dec!(100), 0.9).await;
        assert!(matches!(result, Err(TradeError::Leverage { .. })));
        assert!(!engine.is_open());
        assert!(sink.records().is_empty());
        assert!(exchange.orders().is_empty());
    }

    #[tokio::test]
    async fn test_failed_close_keeps_position_open() {
        let (mut engine, sink) = engine_with_sink();
        let exchange = MockExchange::new(dec!(100));

        engine.evaluate(&exchange, dec!(100), 0.9).await.unwrap();
        assert!(engine.is_open());

        exchange.fail_order.store(true, Ordering::SeqCst);
        let result = engine.evaluate(&exchange, dec!(90), 0.1).await;
        assert!(matches!(result, Err(TradeError::OrderPlacement { .. })));
        assert!(engine.is_open(), "position must survive a failed close");
        assert_eq!(sink.records().len(), 1); // only the OPEN record

        // Retry on a later cycle succeeds and realizes the loss
        exchange.fail_order.store(false, Ordering::SeqCst);
        let outcome = engine.evaluate(&exchange, dec!(90), 0.1).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Closed);
        assert_eq!(engine.total_profit(), dec!(-300));
    }

    #[tokio::test]
    async fn test_balance_failure_skips_open() {
        let (mut engine, sink) = engine_with_sink();
        let exchange = MockExchange::new(dec!(100));
        exchange.fail_balance.store(true, Ordering::SeqCst);

        let result = engine.evaluate(&exchange, dec!(100), 0.9).await;
        assert!(matches!(result, Err(TradeError::BalanceFetch { .. })));
        assert!(!engine.is_open());
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_limits_failure_falls_back_and_retries() {
        let (mut engine, _sink) = engine_with_sink();
        let exchange = MockExchange::new(dec!(100));
        exchange.fail_limits.store(true, Ordering::SeqCst);

        // Opens despite the limits failure, on conservative defaults:
        // the max leverage cap is 5 but the default suggestion is 3
        let outcome = engine.evaluate(&exchange, dec!(100), 0.9).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Opened);
        assert_eq!(engine.position().unwrap().leverage, 3);

        engine.force_close(&exchange, dec!(100)).await.unwrap();

        // The fallback was not cached: a healthy exchange is asked again
        exchange.fail_limits.store(false, Ordering::SeqCst);
        engine.evaluate(&exchange, dec!(100), 0.9).await.unwrap();
        assert!(exchange.limits_calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_force_close_emits_one_close_record() {
        let (mut engine, sink) = engine_with_sink();
        let exchange = MockExchange::new(dec!(100));

        engine.evaluate(&exchange, dec!(100), 0.9).await.unwrap();
        assert!(engine.is_open());

        // Strong signal would normally keep the position; force ignores it
        let outcome = engine.force_close(&exchange, dec!(104)).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Closed);
        assert!(!engine.is_open());

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].action, TradeAction::Close);

        // Idempotent when already flat
        let outcome = engine.force_close(&exchange, dec!(104)).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Idle);
        assert_eq!(sink.records().len(), 2);
    }

    #[tokio::test]
    async fn test_overrides_are_reclamped() {
        let sink = MemorySink::default();
        let mut engine = LifecycleEngine::new(
            "BTCUSDT".to_string(),
            TradingConfig::default(),
            Box::new(sink.clone()),
        )
        .with_overrides(Some(500), Some(dec!(999999)));
        let exchange = MockExchange::new(dec!(100));

        engine.evaluate(&exchange, dec!(100), 0.9).await.unwrap();
        let pos = engine.position().unwrap();
        // Clamped to the exchange max and the mock balance
        assert_eq!(pos.leverage, 20);
        assert_eq!(pos.capital, dec!(5000));
    }

    #[tokio::test]
    async fn test_adaptive_sizing_after_win() {
        let (mut engine, _sink) = engine_with_sink();
        let exchange = MockExchange::new(dec!(100));

        engine.evaluate(&exchange, dec!(100), 0.9).await.unwrap();
        engine.evaluate(&exchange, dec!(110), 0.1).await.unwrap();
        assert_eq!(engine.total_profit(), dec!(300));

        // The winning round trip steps leverage 3 -> 4 and capital up
        engine.evaluate(&exchange, dec!(100), 0.9).await.unwrap();
        let pos = engine.position().unwrap();
        assert_eq!(pos.leverage, 4);
        assert_eq!(pos.capital, dec!(1100));
    }
}
