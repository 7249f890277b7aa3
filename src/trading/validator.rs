//! Required-field checks for inbound trade decisions.
//!
//! Runs on the raw JSON first so a missing field can be named precisely,
//! then on the typed request. Pure and synchronous: no exchange calls.

use rust_decimal::Decimal;
use serde_json::Value;

use crate::models::{TradeDecision, TradeRequest, TradeSide};

use super::ValidationError;

const TRADE_INTENT: &str = "trade_decision";
const REQUIRED_TRADE_FIELDS: [&str; 5] = ["action", "symbol", "side", "limit_plan", "risk"];
/// Longest entry lifetime accepted in `cancel_if.timeout_min` (30 days).
const MAX_TIMEOUT_MIN: u64 = 30 * 24 * 60;

/// Validate a webhook envelope and decode it.
pub fn validate_decision(payload: &Value) -> Result<TradeDecision, ValidationError> {
    let envelope = payload
        .as_object()
        .ok_or_else(|| ValidationError::invalid("body", "expected a JSON object"))?;

    match envelope.get("intent").and_then(Value::as_str) {
        Some(TRADE_INTENT) => {}
        _ => return Err(ValidationError::InvalidIntent),
    }

    let trade = envelope
        .get("trade")
        .ok_or_else(|| ValidationError::MissingField("trade".to_string()))?;
    let trade_obj = trade
        .as_object()
        .ok_or_else(|| ValidationError::invalid("trade", "expected an object"))?;

    for field in REQUIRED_TRADE_FIELDS {
        if !trade_obj.contains_key(field) {
            return Err(ValidationError::MissingField(field.to_string()));
        }
    }

    if let Some(side) = trade_obj.get("side") {
        let raw = side
            .as_str()
            .ok_or_else(|| ValidationError::invalid("side", "expected a string"))?;
        raw.parse::<TradeSide>()
            .map_err(|reason| ValidationError::invalid("side", reason))?;
    }

    let plan = trade_obj["limit_plan"]
        .as_object()
        .ok_or_else(|| ValidationError::invalid("limit_plan", "expected an object"))?;
    for field in ["orders", "stop_loss", "take_profits"] {
        if !plan.contains_key(field) {
            return Err(ValidationError::MissingField(format!("limit_plan.{}", field)));
        }
    }
    for field in ["orders", "take_profits"] {
        match plan[field].as_array() {
            Some(list) if !list.is_empty() => {}
            _ => {
                return Err(ValidationError::invalid(
                    &format!("limit_plan.{}", field),
                    "expected a non-empty list",
                ))
            }
        }
    }

    let decision: TradeDecision = serde_json::from_value(payload.clone())
        .map_err(|e| ValidationError::invalid("trade", e.to_string()))?;
    validate_trade(&decision.trade)?;

    Ok(decision)
}

/// Value checks on a decoded trade request.
pub fn validate_trade(trade: &TradeRequest) -> Result<(), ValidationError> {
    if trade.symbol.trim().is_empty() {
        return Err(ValidationError::MissingField("symbol".to_string()));
    }

    let plan = &trade.limit_plan;
    let entry = plan
        .orders
        .first()
        .ok_or_else(|| ValidationError::invalid("limit_plan.orders", "expected a non-empty list"))?;
    if entry.price <= Decimal::ZERO {
        return Err(ValidationError::invalid(
            "limit_plan.orders[0].price",
            "must be positive",
        ));
    }
    if plan.stop_loss <= Decimal::ZERO {
        return Err(ValidationError::invalid("limit_plan.stop_loss", "must be positive"));
    }
    if plan.take_profits.is_empty() {
        return Err(ValidationError::invalid(
            "limit_plan.take_profits",
            "expected a non-empty list",
        ));
    }
    for (i, tp) in plan.take_profits.iter().enumerate() {
        if tp.price <= Decimal::ZERO {
            return Err(ValidationError::invalid(
                &format!("limit_plan.take_profits[{}].price", i),
                "must be positive",
            ));
        }
        if tp.size_pct < Decimal::ZERO {
            return Err(ValidationError::invalid(
                &format!("limit_plan.take_profits[{}].size_pct", i),
                "must not be negative",
            ));
        }
    }

    if let Some(timeout) = plan.timeout_min() {
        if timeout > MAX_TIMEOUT_MIN {
            return Err(ValidationError::invalid(
                "limit_plan.cancel_if.timeout_min",
                format!("must not exceed {} minutes", MAX_TIMEOUT_MIN),
            ));
        }
    }

    if let Some(risk) = trade.risk.risk_per_trade_pct {
        if risk < Decimal::ZERO {
            return Err(ValidationError::invalid(
                "risk.risk_per_trade_pct",
                "must not be negative",
            ));
        }
    }

    Ok(())
}
