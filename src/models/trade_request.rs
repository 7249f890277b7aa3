//! Inbound trade decision payload.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::OrderSide;

/// Direction of the position being opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TradeSide {
    Long,
    Short,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Long => "long",
            TradeSide::Short => "short",
        }
    }

    /// Exchange side of the entry order.
    pub fn entry_side(&self) -> OrderSide {
        match self {
            TradeSide::Long => OrderSide::Buy,
            TradeSide::Short => OrderSide::Sell,
        }
    }

    /// Exchange side of the stop-loss and take-profit legs.
    pub fn exit_side(&self) -> OrderSide {
        self.entry_side().opposite()
    }
}

impl FromStr for TradeSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" => Ok(Self::Long),
            "short" => Ok(Self::Short),
            other => Err(format!("invalid side '{}'; expected long|short", other)),
        }
    }
}

impl TryFrom<String> for TradeSide {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TradeSide> for String {
    fn from(side: TradeSide) -> Self {
        side.as_str().to_string()
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Webhook envelope: `{ "intent": "trade_decision", "trade": {...} }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeDecision {
    pub intent: String,
    pub trade: TradeRequest,
}

/// A single trade decision from the upstream decision source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRequest {
    /// Upstream action label, e.g. `open_limit`
    #[serde(default)]
    pub action: String,

    /// Canonical `BASE/QUOTE` symbol
    pub symbol: String,

    pub side: TradeSide,

    pub risk: RiskSpec,

    pub limit_plan: LimitPlan,
}

impl TradeRequest {
    /// Exchange symbol (`HYPE/USDT` -> `HYPEUSDT`).
    pub fn exchange_symbol(&self) -> String {
        exchange_symbol(&self.symbol)
    }

    /// Entry price: the first planned order.
    pub fn entry_price(&self) -> Option<Decimal> {
        self.limit_plan.orders.first().map(|o| o.price)
    }
}

/// Strip the `/` separator from a canonical symbol.
pub fn exchange_symbol(symbol: &str) -> String {
    symbol.replace('/', "").to_uppercase()
}

/// Risk settings attached to a trade.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskSpec {
    /// Percent of quote balance to risk; falls back to the configured default
    #[serde(default)]
    pub risk_per_trade_pct: Option<Decimal>,
}

/// Entry, stop and take-profit plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitPlan {
    pub orders: Vec<PlannedOrder>,
    pub stop_loss: Decimal,
    pub take_profits: Vec<PlannedOrder>,
    #[serde(default)]
    pub cancel_if: Option<CancelIf>,
}

impl LimitPlan {
    pub fn timeout_min(&self) -> Option<u64> {
        self.cancel_if.as_ref().and_then(|c| c.timeout_min)
    }
}

/// A price level with the share of the position it covers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlannedOrder {
    pub price: Decimal,
    pub size_pct: Decimal,
}

/// Expiry conditions for the entry order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelIf {
    #[serde(default)]
    pub timeout_min: Option<u64>,
}
