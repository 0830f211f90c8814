//! Leveraged futures paper-trading bot for Bybit perpetuals.
//!
//! Opens and closes a single long position from a signal score, with
//! adaptive leverage and capital sizing and a CSV trade journal.

mod api;
mod bot;
mod error;
mod journal;
mod models;
mod trading;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::{testnet_from_env, BybitClient, Exchange, PaperExchange};
use crate::bot::Runner;
use crate::journal::Journal;
use crate::models::Side;
use crate::trading::{calc, LifecycleEngine, RandomSignal, SignalSource, TradingConfig};

/// Leveraged futures trading bot CLI.
#[derive(Parser)]
#[command(name = "leverbot")]
#[command(about = "Signal-driven leveraged futures bot for Bybit", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current mark price for a symbol
    Price {
        /// Instrument symbol, e.g. BTCUSDT
        #[arg(default_value = "BTCUSDT")]
        symbol: String,
    },

    /// Compute PnL and liquidation price for a hypothetical trade
    Calc {
        /// Instrument symbol, used when --entry is omitted
        #[arg(long, default_value = "BTCUSDT")]
        symbol: String,

        /// Entry price (fetched live when omitted)
        #[arg(short, long)]
        entry: Option<f64>,

        /// Exit price
        #[arg(short = 'x', long)]
        exit: f64,

        /// Leverage multiplier
        #[arg(short, long, default_value = "3")]
        leverage: u32,

        /// Capital (margin) in USDT
        #[arg(short, long, default_value = "1000")]
        capital: f64,

        /// Position side (long or short)
        #[arg(short, long, default_value = "long")]
        side: String,
    },

    /// Start the trading loop
    Run {
        /// Instrument symbol, e.g. BTCUSDT
        #[arg(short, long, default_value = "BTCUSDT")]
        symbol: String,

        /// Polling interval in seconds
        #[arg(short, long, default_value = "60")]
        interval: u64,

        /// Stop after this many seconds (runs until Ctrl+C if omitted)
        #[arg(short, long)]
        duration: Option<u64>,

        /// Dry run (simulated orders, public API only)
        #[arg(long)]
        dry_run: bool,

        /// Fixed leverage, overriding the adaptive sizer
        #[arg(long)]
        leverage: Option<u32>,

        /// Fixed capital in USDT, overriding the adaptive sizer
        #[arg(long)]
        capital: Option<f64>,

        /// Simulated balance for dry runs, in USDT
        #[arg(long, default_value = "10000")]
        paper_balance: f64,

        /// CSV trade journal path
        #[arg(short, long, default_value = "trades.csv")]
        journal: String,

        /// Seed for the signal generator (random if omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// Skip the shutdown confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Show the trading configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Price { symbol } => {
            let client = BybitClient::public(testnet_from_env())?;
            let price = client.get_price(&symbol).await?;
            println!("{}: {}", symbol, price);
        }

        Commands::Calc {
            symbol,
            entry,
            exit,
            leverage,
            capital,
            side,
        } => {
            let side: Side = side.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let entry = match entry {
                Some(entry) => Decimal::try_from(entry).context("invalid entry price")?,
                None => {
                    let client = BybitClient::public(testnet_from_env())?;
                    let price = client.get_price(&symbol).await?;
                    println!("Using live {} price as entry: {}", symbol, price);
                    price
                }
            };
            let exit = Decimal::try_from(exit).context("invalid exit price")?;
            let capital = Decimal::try_from(capital).context("invalid capital")?;

            let pnl = calc::pnl(side, entry, exit, leverage, capital)?;
            let liq = calc::liquidation(entry, leverage, side)?;
            let notional = capital * Decimal::from(leverage);

            println!("\n=== {} {}x ===", side, leverage);
            println!("Entry:       {}", entry);
            println!("Exit:        {}", exit);
            println!("Capital:     ${}", capital);
            println!("Notional:    ${}", notional);
            println!("PnL:         ${}", pnl.round_dp(2));
            println!("Liquidation: {}", liq.round_dp(4));
        }

        Commands::Run {
            symbol,
            interval,
            duration,
            dry_run,
            leverage,
            capital,
            paper_balance,
            journal,
            seed,
            yes,
        } => {
            info!(
                symbol = %symbol,
                interval = interval,
                dry_run = dry_run,
                "Starting bot"
            );

            let config = TradingConfig::default();
            let capital_override = capital
                .map(Decimal::try_from)
                .transpose()
                .context("invalid capital override")?;

            let sink = Journal::new(journal.clone());
            let engine = LifecycleEngine::new(symbol.clone(), config, Box::new(sink))
                .with_overrides(leverage, capital_override);

            let signal: Box<dyn SignalSource> = match seed {
                Some(seed) => Box::new(RandomSignal::from_seed(seed)),
                None => Box::new(RandomSignal::new()),
            };

            let poll_interval = Duration::from_secs(interval.max(1));
            let run_duration = duration.map(Duration::from_secs);

            println!("\n=== Leverbot ===");
            println!("Symbol:   {}", symbol);
            println!("Interval: {}s", interval);
            println!("Journal:  {}", journal);
            println!(
                "Mode:     {}",
                if dry_run { "DRY RUN (simulated orders)" } else { "LIVE TRADING" }
            );
            println!("\nPress Ctrl+C to stop.\n");

            let stats = if dry_run {
                let balance =
                    Decimal::try_from(paper_balance).context("invalid paper balance")?;
                let exchange =
                    PaperExchange::new(BybitClient::public(testnet_from_env())?, balance);
                Runner::new(exchange, engine, signal, poll_interval, run_duration, yes)
                    .run()
                    .await?
            } else {
                let exchange = BybitClient::from_env()?;
                Runner::new(exchange, engine, signal, poll_interval, run_duration, yes)
                    .run()
                    .await?
            };

            println!("\n{}", stats);
        }

        Commands::Config => {
            let config = TradingConfig::default();

            println!("\n=== Trading Configuration ===\n");
            println!("Signal Thresholds:");
            println!("  Entry Threshold:   {}", config.entry_threshold);
            println!("  Exit Threshold:    {}", config.exit_threshold);

            println!("\nLeverage:");
            println!("  Default:           {}x", config.default_leverage);
            println!("  Floor:             {}x", config.leverage_floor);

            println!("\nCapital:");
            println!("  Default:           ${}", config.default_capital);
            println!("  Floor:             ${}", config.capital_floor);
            println!("  Step Up:           ${}", config.capital_step_up);
            println!("  Step Down:         ${}", config.capital_step_down);
        }
    }

    Ok(())
}
