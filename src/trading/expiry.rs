//! Entry expiry: cancel entries still resting after `cancel_if.timeout_min`.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::ExchangeGateway;
use crate::models::BracketResult;

/// What the watcher did once the timeout elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryOutcome {
    /// Entry was no longer open; nothing to do
    AlreadyClosed,
    /// Entry cancelled; some quantity had filled so the protective legs stay
    EntryCancelled,
    /// Entry cancelled with no fill; dependent legs cancelled as well
    BracketCancelled { dependents: usize },
    /// Status query or cancel failed
    Failed(String),
}

/// Schedules cancellation of unfilled entries.
pub struct EntryExpiry {
    gateway: Arc<dyn ExchangeGateway>,
}

impl EntryExpiry {
    pub fn new(gateway: Arc<dyn ExchangeGateway>) -> Self {
        Self { gateway }
    }

    /// Spawn a watcher for `bracket`'s entry; `None` if the entry never placed.
    pub fn schedule(
        &self,
        symbol: String,
        bracket: &BracketResult,
        timeout: Duration,
    ) -> Option<JoinHandle<ExpiryOutcome>> {
        let entry_id = bracket.entry.order_id()?.to_string();
        let dependents = bracket.dependent_order_ids();
        let gateway = self.gateway.clone();

        info!(
            symbol = %symbol,
            order_id = %entry_id,
            timeout_secs = timeout.as_secs(),
            "Entry expiry scheduled"
        );

        Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            expire(gateway.as_ref(), &symbol, &entry_id, &dependents).await
        }))
    }
}

async fn expire(
    gateway: &dyn ExchangeGateway,
    symbol: &str,
    entry_id: &str,
    dependents: &[String],
) -> ExpiryOutcome {
    let state = match gateway.get_order(symbol, entry_id).await {
        Ok(state) => state,
        Err(e) => {
            warn!(symbol = %symbol, order_id = %entry_id, error = %e, "Entry status query failed");
            return ExpiryOutcome::Failed(e.to_string());
        }
    };

    if !state.is_open() {
        info!(symbol = %symbol, order_id = %entry_id, status = %state.status, "Entry no longer open at timeout");
        return ExpiryOutcome::AlreadyClosed;
    }

    match gateway.cancel_order(symbol, entry_id).await {
        Ok(ack) if ack.is_accepted() => {
            info!(symbol = %symbol, order_id = %entry_id, "Cancelled expired entry order");
        }
        Ok(ack) => {
            warn!(symbol = %symbol, ret_code = ack.ret_code, ret_msg = %ack.ret_msg, "Entry cancel rejected");
            return ExpiryOutcome::Failed(ack.ret_msg);
        }
        Err(e) => {
            warn!(symbol = %symbol, error = %e, "Entry cancel failed");
            return ExpiryOutcome::Failed(e.to_string());
        }
    }

    if state.cum_exec_qty > Decimal::ZERO {
        return ExpiryOutcome::EntryCancelled;
    }

    // No position was opened: the exit legs would open one on their own.
    for order_id in dependents {
        match gateway.cancel_order(symbol, order_id).await {
            Ok(ack) if ack.is_accepted() => {}
            Ok(ack) => warn!(symbol = %symbol, order_id = %order_id, ret_msg = %ack.ret_msg, "Dependent cancel rejected"),
            Err(e) => warn!(symbol = %symbol, order_id = %order_id, error = %e, "Dependent cancel failed"),
        }
    }

    ExpiryOutcome::BracketCancelled {
        dependents: dependents.len(),
    }
}
