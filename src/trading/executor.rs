//! Trade executor: turns one validated trade request into a bracket on the book.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::ExchangeGateway;
use crate::models::{BracketResult, LegOutcome, TradeRequest, TradeSide};

use super::{
    validate_trade, BracketPlacer, EntryExpiry, ExecutionError, PositionSizer, SymbolLocks,
    TradingConfig,
};

/// Result of executing one trade request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub success: bool,
    /// Exchange symbol
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: Option<Decimal>,
    pub entry_price: Option<Decimal>,
    pub bracket: Option<BracketResult>,
    pub error: Option<String>,
}

impl ExecutionReport {
    fn failed(trade: &TradeRequest, symbol: String, error: &ExecutionError) -> Self {
        Self {
            success: false,
            symbol,
            side: trade.side,
            quantity: None,
            entry_price: trade.entry_price(),
            bracket: None,
            error: Some(error.to_string()),
        }
    }

    /// Entry live without a stop-loss.
    pub fn is_unprotected(&self) -> bool {
        self.bracket.as_ref().is_some_and(|b| b.is_unprotected())
    }

    /// One-line outcome for logs and the CLI.
    pub fn summary(&self) -> String {
        match (&self.error, self.quantity) {
            (Some(e), _) => format!("{} {} failed: {}", self.side, self.symbol, e),
            (None, Some(qty)) => format!(
                "{} {} qty {} @ {}",
                self.side,
                self.symbol,
                qty,
                self.entry_price.unwrap_or_default()
            ),
            (None, None) => format!("{} {}", self.side, self.symbol),
        }
    }
}

/// Runs the validate -> size -> place sequence against a gateway.
pub struct TradeExecutor {
    gateway: Arc<dyn ExchangeGateway>,
    config: TradingConfig,
    sizer: PositionSizer,
    placer: BracketPlacer,
    locks: SymbolLocks,
    expiry: EntryExpiry,
}

impl TradeExecutor {
    pub fn new(gateway: Arc<dyn ExchangeGateway>, config: TradingConfig) -> Self {
        Self {
            sizer: PositionSizer::new(&config),
            placer: BracketPlacer::new(gateway.clone(), config.settlement_delay()),
            locks: SymbolLocks::new(),
            expiry: EntryExpiry::new(gateway.clone()),
            gateway,
            config,
        }
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    /// Execute a trade request. Never fails: every error ends up in the report.
    pub async fn execute(&self, trade: &TradeRequest) -> ExecutionReport {
        let symbol = trade.exchange_symbol();
        info!(
            symbol = %symbol,
            side = %trade.side,
            action = %trade.action,
            gateway = self.gateway.name(),
            "Executing trade decision"
        );

        match self.run(trade, &symbol).await {
            Ok(report) => report,
            Err(e) => {
                error!(symbol = %symbol, error = %e, "Trade execution failed");
                ExecutionReport::failed(trade, symbol, &e)
            }
        }
    }

    async fn run(&self, trade: &TradeRequest, symbol: &str) -> Result<ExecutionReport, ExecutionError> {
        validate_trade(trade)?;

        let plan = &trade.limit_plan;
        let entry_price = plan.orders[0].price;
        let stop_loss = plan.stop_loss;
        let risk_pct = trade
            .risk
            .risk_per_trade_pct
            .unwrap_or(self.config.default_risk_pct);

        let instrument = self
            .gateway
            .get_instrument_info(symbol)
            .await
            .map_err(|e| ExecutionError::InstrumentUnavailable {
                symbol: symbol.to_string(),
                reason: format!("{:#}", e),
            })?;
        if !instrument.is_tradable() {
            warn!(symbol = %symbol, status = %instrument.status, "Instrument is not in Trading status");
        }

        // Balance read through the last leg runs under the symbol lock.
        let _guard = self.locks.acquire(symbol).await;

        let balance = self
            .gateway
            .get_account_balance()
            .await
            .map_err(|e| ExecutionError::BalanceQuery(format!("{:#}", e)))?;

        let qty = self
            .sizer
            .try_size(risk_pct, stop_loss, entry_price, &instrument, &balance)?;

        let bracket = self
            .placer
            .place(symbol, trade.side, qty, entry_price, stop_loss, &plan.take_profits)
            .await;

        let error = match &bracket.entry.outcome {
            LegOutcome::Submitted { .. } => None,
            LegOutcome::Rejected { ret_code, message } => Some(ExecutionError::GatewayRejection {
                ret_code: *ret_code,
                message: message.clone(),
            }),
            LegOutcome::Failed { reason } => Some(ExecutionError::Transport(reason.clone())),
        };

        if bracket.success && self.config.enforce_entry_timeout {
            let minutes = plan.timeout_min().unwrap_or(self.config.default_timeout_min);
            self.expiry.schedule(
                symbol.to_string(),
                &bracket,
                Duration::from_secs(minutes.saturating_mul(60)),
            );
        }

        if error.is_none() {
            info!(
                symbol = %symbol,
                failed_legs = bracket.failed_legs().count(),
                "Trade executed"
            );
        }

        Ok(ExecutionReport {
            success: bracket.success,
            symbol: symbol.to_string(),
            side: trade.side,
            quantity: Some(qty),
            entry_price: Some(entry_price),
            bracket: Some(bracket),
            error: error.map(|e| e.to_string()),
        })
    }
}
