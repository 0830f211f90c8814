//! The run loop: polls a price, asks the signal source for a score,
//! and hands both to the lifecycle engine on a fixed interval.
//!
//! Shutdown is confirmable. Ctrl-C raises a flag that is checked at
//! the next loop boundary; the operator is then asked whether to stop.
//! Declining re-arms the handler and the loop continues, so a stray
//! interrupt never abandons an open position. On a confirmed stop (or
//! when a timed run expires) any open position is force-closed before
//! the process exits.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use rust_decimal::Decimal;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::api::Exchange;
use crate::trading::{CycleOutcome, LifecycleEngine, SignalSource};

const CLOSE_RETRY_ATTEMPTS: u32 = 3;
const CLOSE_RETRY_DELAY: Duration = Duration::from_secs(2);
const PRICE_FAILURE_BACKOFF: Duration = Duration::from_secs(5);

/// Counters for one run, printed when the loop exits.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunStats {
    pub cycles: u64,
    pub opened: u64,
    pub closed: u64,
    pub skipped: u64,
    pub total_profit: Decimal,
    pub elapsed: Duration,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cycles ({} skipped), {} opens, {} closes, total pnl {} over {:.0?}",
            self.cycles, self.skipped, self.opened, self.closed, self.total_profit, self.elapsed
        )
    }
}

pub struct Runner<E: Exchange> {
    exchange: E,
    engine: LifecycleEngine,
    signal: Box<dyn SignalSource>,
    poll_interval: Duration,
    run_duration: Option<Duration>,
    /// Skip the interactive prompt and stop on the first interrupt
    assume_yes: bool,
}

impl<E: Exchange> Runner<E> {
    pub fn new(
        exchange: E,
        engine: LifecycleEngine,
        signal: Box<dyn SignalSource>,
        poll_interval: Duration,
        run_duration: Option<Duration>,
        assume_yes: bool,
    ) -> Self {
        Self {
            exchange,
            engine,
            signal,
            poll_interval,
            run_duration,
            assume_yes,
        }
    }

    pub async fn run(mut self) -> Result<RunStats> {
        let shutdown = Arc::new(AtomicBool::new(false));
        spawn_signal_listener(shutdown.clone());

        info!(
            symbol = %self.engine.symbol(),
            interval_secs = self.poll_interval.as_secs(),
            duration = ?self.run_duration,
            "Starting run loop"
        );

        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = RunStats::default();

        loop {
            ticker.tick().await;

            if let Some(limit) = self.run_duration {
                if started.elapsed() >= limit {
                    info!("Run duration elapsed, stopping");
                    break;
                }
            }

            if shutdown.swap(false, Ordering::SeqCst) {
                if self.assume_yes || confirm_shutdown().await {
                    info!("Shutdown confirmed");
                    break;
                }
                info!("Shutdown declined, resuming");
                continue;
            }

            self.run_cycle(&mut stats).await;
        }

        self.finalize(&mut stats).await;
        stats.total_profit = self.engine.total_profit();
        stats.elapsed = started.elapsed();
        info!(%stats, "Run finished");
        Ok(stats)
    }

    /// One poll: fetch a price, score it, let the engine act. Failures
    /// are logged and counted; they never tear the loop down.
    async fn run_cycle(&mut self, stats: &mut RunStats) {
        stats.cycles += 1;

        let price = match self.exchange.get_price(self.engine.symbol()).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Price fetch failed, skipping cycle");
                stats.skipped += 1;
                tokio::time::sleep(PRICE_FAILURE_BACKOFF).await;
                return;
            }
        };

        let score = self.signal.score(self.engine.symbol(), price);
        match self.engine.evaluate(&self.exchange, price, score).await {
            Ok(CycleOutcome::Opened) => stats.opened += 1,
            Ok(CycleOutcome::Closed) => stats.closed += 1,
            Ok(CycleOutcome::Idle) => {}
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Cycle skipped on transient failure");
                stats.skipped += 1;
            }
            Err(e) => {
                error!(error = %e, "Cycle failed");
                stats.skipped += 1;
            }
        }
    }

    /// Close any open position on the way out, retrying the price
    /// fetch a few times before giving up and leaving it open.
    async fn finalize(&mut self, stats: &mut RunStats) {
        if !self.engine.is_open() {
            return;
        }
        info!("Closing open position before exit");

        for attempt in 1..=CLOSE_RETRY_ATTEMPTS {
            match self.exchange.get_price(self.engine.symbol()).await {
                Ok(price) => match self.engine.force_close(&self.exchange, price).await {
                    Ok(_) => {
                        stats.closed += 1;
                        return;
                    }
                    Err(e) => warn!(attempt, error = %e, "Forced close failed"),
                },
                Err(e) => warn!(attempt, error = %e, "Price fetch failed during shutdown"),
            }
            if attempt < CLOSE_RETRY_ATTEMPTS {
                tokio::time::sleep(CLOSE_RETRY_DELAY).await;
            }
        }

        error!(
            symbol = %self.engine.symbol(),
            "Could not close position, it remains open on the exchange"
        );
    }
}

/// Re-arming Ctrl-C listener: every interrupt raises the flag again,
/// so a declined shutdown still catches the next one.
fn spawn_signal_listener(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                error!("Failed to listen for Ctrl-C, shutdown via signal unavailable");
                return;
            }
            info!("Interrupt received");
            flag.store(true, Ordering::SeqCst);
        }
    });
}

async fn confirm_shutdown() -> bool {
    let answer = tokio::task::spawn_blocking(|| {
        print!("Close any open position and exit? [y/N] ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
        line
    })
    .await
    .unwrap_or_default();
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
