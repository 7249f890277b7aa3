//! Order requests sent to the exchange and per-leg outcomes.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exchange order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "Buy",
            OrderSide::Sell => "Sell",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// Good-til-cancelled
    Gtc,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
        }
    }
}

/// Price source for conditional orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerBy {
    LastPrice,
}

impl TriggerBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerBy::LastPrice => "LastPrice",
        }
    }
}

/// Resting limit order or conditional stop order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderKind {
    Limit { price: Decimal },
    Stop { trigger_price: Decimal, trigger_by: TriggerBy },
}

impl OrderKind {
    /// Limit price or trigger price.
    pub fn price(&self) -> Decimal {
        match self {
            OrderKind::Limit { price } => *price,
            OrderKind::Stop { trigger_price, .. } => *trigger_price,
        }
    }
}

/// Order submission as the gateway receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Exchange symbol, e.g. `HYPEUSDT`
    pub symbol: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub qty: Decimal,
    pub time_in_force: TimeInForce,
}

impl OrderRequest {
    pub fn limit(symbol: &str, side: OrderSide, qty: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            kind: OrderKind::Limit { price },
            qty,
            time_in_force: TimeInForce::Gtc,
        }
    }

    pub fn stop(symbol: &str, side: OrderSide, qty: Decimal, trigger_price: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            kind: OrderKind::Stop {
                trigger_price,
                trigger_by: TriggerBy::LastPrice,
            },
            qty,
            time_in_force: TimeInForce::Gtc,
        }
    }
}

/// Exchange acknowledgment of a submission. `ret_code == 0` means accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub ret_code: i64,
    pub ret_msg: String,
    pub order_id: Option<String>,
}

impl OrderAck {
    pub fn accepted(order_id: impl Into<String>) -> Self {
        Self {
            ret_code: 0,
            ret_msg: "OK".to_string(),
            order_id: Some(order_id.into()),
        }
    }

    pub fn rejected(ret_code: i64, ret_msg: impl Into<String>) -> Self {
        Self {
            ret_code,
            ret_msg: ret_msg.into(),
            order_id: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.ret_code == 0
    }
}

/// Live state of a resting order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderState {
    pub order_id: String,
    /// Exchange status string, e.g. `New`, `PartiallyFilled`, `Filled`
    pub status: String,
    pub cum_exec_qty: Decimal,
}

impl OrderState {
    /// Still resting on the book (or waiting for its trigger).
    pub fn is_open(&self) -> bool {
        matches!(
            self.status.as_str(),
            "New" | "PartiallyFilled" | "Untriggered" | "Created"
        )
    }
}

/// Role of an order within a bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegKind {
    Entry,
    StopLoss,
    TakeProfit(usize),
}

impl fmt::Display for LegKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegKind::Entry => f.write_str("entry"),
            LegKind::StopLoss => f.write_str("stop_loss"),
            LegKind::TakeProfit(n) => write!(f, "take_profit_{}", n + 1),
        }
    }
}

/// What happened to a single leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LegOutcome {
    /// Exchange accepted the order
    Submitted { order_id: String },
    /// Exchange answered with a non-zero return code
    Rejected { ret_code: i64, message: String },
    /// Request never got an exchange answer
    Failed { reason: String },
}

/// Outcome of one leg together with what was submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegResult {
    pub leg: LegKind,
    pub side: OrderSide,
    pub qty: Decimal,
    pub price: Decimal,
    pub outcome: LegOutcome,
}

impl LegResult {
    pub fn from_ack(leg: LegKind, request: &OrderRequest, ack: &OrderAck) -> Self {
        let outcome = if ack.is_accepted() {
            LegOutcome::Submitted {
                order_id: ack.order_id.clone().unwrap_or_default(),
            }
        } else {
            LegOutcome::Rejected {
                ret_code: ack.ret_code,
                message: ack.ret_msg.clone(),
            }
        };
        Self::new(leg, request, outcome)
    }

    pub fn failed(leg: LegKind, request: &OrderRequest, reason: impl Into<String>) -> Self {
        Self::new(
            leg,
            request,
            LegOutcome::Failed {
                reason: reason.into(),
            },
        )
    }

    fn new(leg: LegKind, request: &OrderRequest, outcome: LegOutcome) -> Self {
        Self {
            leg,
            side: request.side,
            qty: request.qty,
            price: request.kind.price(),
            outcome,
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self.outcome, LegOutcome::Submitted { .. })
    }

    pub fn order_id(&self) -> Option<&str> {
        match &self.outcome {
            LegOutcome::Submitted { order_id } => Some(order_id),
            _ => None,
        }
    }
}

/// Every leg outcome of one bracket placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketResult {
    /// True iff the entry leg was accepted
    pub success: bool,
    pub entry: LegResult,
    /// `None` when the entry failed and no dependent leg was attempted
    pub stop_loss: Option<LegResult>,
    pub take_profits: Vec<LegResult>,
}

impl BracketResult {
    /// Entry is live but its stop-loss is not.
    pub fn is_unprotected(&self) -> bool {
        self.success
            && self
                .stop_loss
                .as_ref()
                .map_or(true, |sl| !sl.is_submitted())
    }

    pub fn failed_legs(&self) -> impl Iterator<Item = &LegResult> {
        std::iter::once(&self.entry)
            .chain(self.stop_loss.iter())
            .chain(self.take_profits.iter())
            .filter(|leg| !leg.is_submitted())
    }

    /// Order ids of the accepted dependent legs.
    pub fn dependent_order_ids(&self) -> Vec<String> {
        self.stop_loss
            .iter()
            .chain(self.take_profits.iter())
            .filter_map(|leg| leg.order_id().map(str::to_string))
            .collect()
    }
}
