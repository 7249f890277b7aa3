//! Runtime configuration: environment files, exchange credentials, listener
//! address and trading knobs.
//!
//! Every option can be given as a flag or through the environment. Values
//! from `config.env` and `.env` are loaded into the environment before the
//! command line is parsed; variables already set take precedence.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::builder::FalseyValueParser;
use clap::Args;
use rust_decimal::Decimal;

use crate::trading::TradingConfig;

/// Environment files read at startup, in order.
pub const ENV_FILES: [&str; 2] = ["config.env", ".env"];

/// Load `config.env` then `.env`. Missing files are skipped.
///
/// Returns the files that were loaded and a message per file that failed to
/// parse; logging is not up yet when this runs.
pub fn load_env_files() -> (Vec<PathBuf>, Vec<String>) {
    let mut loaded = Vec::new();
    let mut problems = Vec::new();

    for file in ENV_FILES {
        match dotenvy::from_filename(file) {
            Ok(path) => loaded.push(path),
            Err(e) if e.not_found() => {}
            Err(e) => problems.push(format!("{}: {}", file, e)),
        }
    }

    (loaded, problems)
}

/// Exchange connection options.
#[derive(Debug, Clone, Args)]
pub struct ExchangeArgs {
    /// Bybit API key
    #[arg(long, env = "BYBIT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Bybit API secret
    #[arg(long, env = "BYBIT_SECRET_KEY", hide_env_values = true)]
    pub api_secret: Option<String>,

    /// Use the Bybit testnet
    #[arg(long, env = "BYBIT_TESTNET", value_parser = FalseyValueParser::new())]
    pub testnet: bool,
}

/// Validated API credentials.
#[derive(Clone)]
pub struct ExchangeCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub testnet: bool,
}

impl fmt::Debug for ExchangeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("testnet", &self.testnet)
            .finish()
    }
}

impl ExchangeCredentials {
    /// Credentials from the parsed arguments.
    ///
    /// Missing key or secret is fatal for live trading. In dry-run mode they
    /// are optional and `None` is returned when either is absent.
    pub fn resolve(args: &ExchangeArgs, dry_run: bool) -> Result<Option<Self>> {
        let key = args.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty());
        let secret = args
            .api_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match (key, secret) {
            (Some(key), Some(secret)) => Ok(Some(Self {
                api_key: key.to_string(),
                api_secret: secret.to_string(),
                testnet: args.testnet,
            })),
            _ if dry_run => Ok(None),
            (None, _) => bail!("BYBIT_API_KEY not set (required unless --dry-run)"),
            (_, None) => bail!("BYBIT_SECRET_KEY not set (required unless --dry-run)"),
        }
    }
}

/// Webhook listener options.
#[derive(Debug, Clone, Args)]
pub struct ServerArgs {
    /// Interface to bind
    #[arg(long, env = "WEBHOOK_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to bind; takes precedence over WEBHOOK_PORT
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "WEBHOOK_PORT", default_value_t = 8080, hide = true)]
    pub webhook_port: u16,
}

impl ServerArgs {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port.unwrap_or(self.webhook_port))
    }
}

/// Sizing and execution knobs layered over `TradingConfig::default()`.
#[derive(Debug, Clone, Args)]
pub struct TradingArgs {
    /// Risk percent used when a trade omits risk_per_trade_pct
    #[arg(long, env = "DEFAULT_RISK_PCT")]
    pub default_risk_pct: Option<Decimal>,

    /// Pause between the entry and its protective legs (ms)
    #[arg(long, env = "SETTLEMENT_DELAY_MS")]
    pub settlement_delay_ms: Option<u64>,

    /// Cancel entries that are still resting after cancel_if.timeout_min
    #[arg(long, env = "ENFORCE_ENTRY_TIMEOUT", value_parser = FalseyValueParser::new())]
    pub enforce_entry_timeout: bool,

    /// Number of background trade workers
    #[arg(long, env = "TRADE_WORKERS")]
    pub workers: Option<usize>,

    /// Pending trade decisions held before new ones are refused
    #[arg(long, env = "TRADE_QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,
}

impl TradingArgs {
    pub fn trading_config(&self) -> Result<TradingConfig> {
        let mut config = TradingConfig::default();

        if let Some(risk) = self.default_risk_pct {
            if risk <= Decimal::ZERO {
                bail!("--default-risk-pct must be positive, got {}", risk);
            }
            config.default_risk_pct = risk;
        }
        if let Some(delay) = self.settlement_delay_ms {
            config.settlement_delay_ms = delay;
        }
        if let Some(workers) = self.workers {
            if workers == 0 {
                bail!("--workers must be at least 1");
            }
            config.workers = workers;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        config.enforce_entry_timeout = self.enforce_entry_timeout;

        Ok(config)
    }
}

/// Read a trade decision from a file, or from piped stdin when no path is
/// given. An interactive stdin yields an empty string.
pub fn read_input(path: Option<&PathBuf>) -> Result<String> {
    use std::io::{IsTerminal, Read};

    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None if std::io::stdin().is_terminal() => Ok(String::new()),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read stdin")?;
            Ok(input)
        }
    }
}
