//! Bybit Trade Bridge
//!
//! Receives trade decisions over a webhook, sizes the position from the
//! account's risk budget and places the entry with its stop-loss and
//! take-profit legs on Bybit USDT perpetuals.

mod api;
mod config;
mod db;
mod dispatch;
mod logging;
mod models;
mod server;
mod trading;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use crate::api::{BybitClient, ExchangeGateway, PaperGateway};
use crate::config::{ExchangeArgs, ExchangeCredentials, ServerArgs, TradingArgs};
use crate::db::Journal;
use crate::dispatch::TradeDispatcher;
use crate::models::{exchange_symbol, AccountBalance, InstrumentInfo};
use crate::server::AppState;
use crate::trading::{validate_decision, PositionSizer, TradeExecutor, TradingConfig};

/// Trade decision used by `execute` when no input is given.
const SAMPLE_DECISION: &str = r#"{
  "intent": "trade_decision",
  "trade": {
    "action": "open_limit",
    "symbol": "HYPE/USDT",
    "side": "long",
    "risk": { "risk_per_trade_pct": 0.4 },
    "limit_plan": {
      "orders": [{ "price": 44.64, "size_pct": 100 }],
      "stop_loss": 44.1336,
      "take_profits": [
        { "price": 45.1464, "size_pct": 30 },
        { "price": 45.5516, "size_pct": 40 },
        { "price": 45.9064, "size_pct": 30 }
      ],
      "cancel_if": { "timeout_min": 120 }
    }
  }
}"#;

/// Bybit trade bridge CLI.
#[derive(Debug, Parser)]
#[command(name = "bybit-bridge")]
#[command(about = "Execute webhook trade decisions as bracket orders on Bybit", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Directory for webhook.log
    #[arg(long, env = "LOG_DIR", default_value = ".")]
    log_dir: PathBuf,

    /// Log to stdout only
    #[arg(long)]
    no_log_file: bool,

    /// Job journal database, e.g. sqlite:./bridge.db?mode=rwc
    #[arg(long, env = "JOURNAL_URL")]
    journal: Option<String>,

    #[command(flatten)]
    exchange: ExchangeArgs,

    #[command(flatten)]
    trading: TradingArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the webhook server
    Serve {
        #[command(flatten)]
        server: ServerArgs,

        /// Route orders to an in-memory paper exchange
        #[arg(long)]
        dry_run: bool,

        /// Paper account balance in the quote asset
        #[arg(long, default_value = "1000")]
        paper_balance: Decimal,
    },

    /// Execute one trade decision from a file or stdin
    Execute {
        /// JSON file holding the trade decision
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Route orders to an in-memory paper exchange
        #[arg(long)]
        dry_run: bool,

        /// Paper account balance in the quote asset
        #[arg(long, default_value = "1000")]
        paper_balance: Decimal,
    },

    /// Show account balances and instrument lot rules
    Account {
        /// Symbol to look up, e.g. HYPE/USDT
        #[arg(short, long)]
        symbol: Option<String>,
    },

    /// Offline position size calculation
    Size {
        /// Quote asset balance
        #[arg(long)]
        balance: Decimal,

        /// Risk percent of balance
        #[arg(long)]
        risk: Decimal,

        /// Entry price
        #[arg(long)]
        entry: Decimal,

        /// Stop-loss price
        #[arg(long)]
        stop: Decimal,

        /// Quantity step
        #[arg(long, default_value = "0.001")]
        step: Decimal,

        /// Minimum order quantity
        #[arg(long, default_value = "0.001")]
        min_qty: Decimal,
    },

    /// List recent jobs from the journal
    Jobs {
        /// Number of jobs to show
        #[arg(short, long, default_value = "20")]
        limit: i64,

        /// Show the event trail of one job
        #[arg(long)]
        id: Option<String>,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let (env_files, env_problems) = config::load_env_files();
    let cli = Cli::parse();

    let log_dir = (!cli.no_log_file).then_some(cli.log_dir.as_path());
    let log_handle = logging::init(&cli.log_level, log_dir)?;
    if log_handle.file_logging() {
        info!(path = %cli.log_dir.join(logging::LOG_FILE).display(), "Logging to file");
    }

    for path in &env_files {
        info!(path = %path.display(), "Loaded environment file");
    }
    for problem in &env_problems {
        warn!(problem = %problem, "Could not parse environment file");
    }

    let config = cli.trading.trading_config()?;

    match cli.command {
        Commands::Serve {
            server: listen,
            dry_run,
            paper_balance,
        } => {
            let gateway = build_gateway(&cli.exchange, dry_run, paper_balance, &config)?;
            let journal = match &cli.journal {
                Some(url) => Some(Journal::new(url).await?),
                None => None,
            };

            let addr = listen.addr();
            info!(
                address = %addr,
                gateway = gateway.name(),
                testnet = cli.exchange.testnet,
                workers = config.workers,
                journal = journal.is_some(),
                "Starting webhook server"
            );

            let executor = Arc::new(TradeExecutor::new(gateway, config));
            let dispatcher = Arc::new(TradeDispatcher::start(executor, journal));

            server::serve(
                addr,
                AppState {
                    dispatcher: dispatcher.clone(),
                },
            )
            .await?;

            match Arc::try_unwrap(dispatcher) {
                Ok(dispatcher) => dispatcher.shutdown().await,
                Err(_) => warn!("Dispatcher still shared at shutdown; pending jobs abandoned"),
            }
        }

        Commands::Execute {
            file,
            dry_run,
            paper_balance,
        } => {
            let input = config::read_input(file.as_ref())?;
            let input = if input.trim().is_empty() {
                info!("No input given, using bundled sample trade");
                SAMPLE_DECISION.to_string()
            } else {
                input
            };

            let payload: serde_json::Value =
                serde_json::from_str(&input).context("Invalid JSON format")?;
            let decision = validate_decision(&payload)?;

            if config.enforce_entry_timeout {
                warn!("Entry timeout watcher stops when this command exits");
            }

            let gateway = build_gateway(&cli.exchange, dry_run, paper_balance, &config)?;
            let executor = TradeExecutor::new(gateway, config);
            let report = executor.execute(&decision.trade).await;

            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.success {
                bail!("{}", report.summary());
            }
        }

        Commands::Account { symbol } => {
            let credentials = ExchangeCredentials::resolve(&cli.exchange, false)?
                .ok_or_else(|| anyhow!("Exchange credentials required"))?;
            let client = BybitClient::new(&credentials)?;

            let balance = client.get_account_balance().await?;
            println!("\n=== Account ({}) ===\n", if credentials.testnet { "testnet" } else { "mainnet" });
            print_balance(&balance);

            if let Some(symbol) = symbol {
                let info = client.get_instrument_info(&exchange_symbol(&symbol)).await?;
                println!("\n=== Instrument ===\n");
                print_instrument(&info);
            }
        }

        Commands::Size {
            balance,
            risk,
            entry,
            stop,
            step,
            min_qty,
        } => {
            let sizer = PositionSizer::new(&config);
            let instrument = InstrumentInfo {
                symbol: "OFFLINE".to_string(),
                min_order_qty: min_qty,
                qty_step: step,
                status: "Trading".to_string(),
            };
            let account = AccountBalance::new().with_asset(&config.quote_asset, balance);

            let qty = sizer.try_size(risk, stop, entry, &instrument, &account)?;
            let notional = qty * entry;
            let risk_amount = qty * (entry - stop).abs();

            println!("\n=== Position Size ===\n");
            println!("  Quantity:        {}", qty);
            println!("  Notional:        {} {}", notional.round_dp(4), config.quote_asset);
            println!("  Risk Budget:     {} {}", (balance * risk / dec!(100)).round_dp(4), config.quote_asset);
            println!("  Risk at Stop:    {} {}", risk_amount.round_dp(4), config.quote_asset);
            println!("  Effective Risk:  {}%", (risk_amount / balance * dec!(100)).round_dp(4));
        }

        Commands::Jobs { limit, id } => {
            let url = cli
                .journal
                .as_deref()
                .context("--journal (or JOURNAL_URL) is required to list jobs")?;
            let journal = Journal::new(url).await?;

            if let Some(id) = id {
                let events = journal.job_events(&id).await?;
                if events.is_empty() {
                    println!("No events for job {}", id);
                    return Ok(());
                }
                println!("\n{:<22} {:<10} {:<8} DETAIL", "TIME", "EVENT", "OK");
                println!("{}", "-".repeat(70));
                for event in events {
                    println!(
                        "{:<22} {:<10} {:<8} {}",
                        event.created_at,
                        event.event,
                        event.success.map(|s| if s { "yes" } else { "no" }).unwrap_or("-"),
                        event.detail.unwrap_or_default()
                    );
                }
                return Ok(());
            }

            let jobs = journal.recent_jobs(limit).await?;
            if jobs.is_empty() {
                println!("No jobs recorded yet.");
                return Ok(());
            }

            println!(
                "\n{:<38} {:<14} {:<6} {:<22} {:<10}",
                "JOB", "SYMBOL", "SIDE", "RECEIVED", "LAST"
            );
            println!("{}", "-".repeat(94));
            for job in jobs {
                println!(
                    "{:<38} {:<14} {:<6} {:<22} {:<10}",
                    job.job_id,
                    truncate(&job.symbol, 14),
                    job.side,
                    job.received_at,
                    job.last_event.unwrap_or_else(|| "-".to_string())
                );
            }
        }

        Commands::Config => {
            println!("\n=== Exchange ===\n");
            println!("  Network:               {}", if cli.exchange.testnet { "testnet" } else { "mainnet" });
            println!("  API Key:               {}", if cli.exchange.api_key.is_some() { "set" } else { "missing" });
            println!("  API Secret:            {}", if cli.exchange.api_secret.is_some() { "set" } else { "missing" });

            println!("\n=== Trading Configuration ===\n");
            println!("Position Sizing:");
            println!("  Quote Asset:           {}", config.quote_asset);
            println!("  Default Risk:          {}%", config.default_risk_pct);
            println!("  Min Notional:          {} {}", config.min_notional, config.quote_asset);

            println!("\nBracket Placement:");
            println!("  Settlement Delay:      {}ms", config.settlement_delay_ms);
            println!("  Default Entry Timeout: {}min", config.default_timeout_min);
            println!(
                "  Enforce Entry Timeout: {}",
                if config.enforce_entry_timeout { "Yes" } else { "No" }
            );

            println!("\nBackground Execution:");
            println!("  Workers:               {}", config.workers);
            println!("  Queue Capacity:        {}", config.queue_capacity);
            println!("  Retained Jobs:         {}", config.registry_capacity);
            println!("  Journal:               {}", cli.journal.as_deref().unwrap_or("disabled"));
        }
    }

    Ok(())
}

/// Live Bybit client, or the paper exchange in dry-run mode.
fn build_gateway(
    exchange: &ExchangeArgs,
    dry_run: bool,
    paper_balance: Decimal,
    config: &TradingConfig,
) -> Result<Arc<dyn ExchangeGateway>> {
    let credentials = ExchangeCredentials::resolve(exchange, dry_run)?;

    if dry_run {
        info!(balance = %paper_balance, "[DRY RUN] Orders go to the paper exchange");
        return Ok(Arc::new(PaperGateway::new(&config.quote_asset, paper_balance)));
    }

    let credentials = credentials.ok_or_else(|| anyhow!("Exchange credentials required"))?;
    info!(testnet = credentials.testnet, "Using Bybit REST gateway");
    Ok(Arc::new(BybitClient::new(&credentials)?))
}

fn print_balance(balance: &AccountBalance) {
    if balance.is_empty() {
        println!("  (no balances)");
        return;
    }
    let mut rows: Vec<_> = balance.iter().collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));
    for (asset, amount) in rows {
        println!("  {:<8} {:>20}", asset, amount);
    }
}

fn print_instrument(info: &InstrumentInfo) {
    println!("  Symbol:        {}", info.symbol);
    println!("  Status:        {}", info.status);
    println!("  Min Order Qty: {}", info.min_order_qty);
    println!("  Qty Step:      {}", info.qty_step);
}

/// Truncate a string with ellipsis if too long.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
