//! Paper exchange for dry runs: accepts orders without touching a venue.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use crate::models::{AccountBalance, InstrumentInfo, OrderAck, OrderRequest, OrderState};

use super::gateway::ExchangeGateway;

/// In-memory gateway with a fixed balance and instrument table.
pub struct PaperGateway {
    balance: Mutex<Option<AccountBalance>>,
    instruments: Mutex<HashMap<String, InstrumentInfo>>,
    default_lot: (Decimal, Decimal),
    placed: Mutex<Vec<OrderRequest>>,
    cancelled: Mutex<Vec<String>>,
    balance_queries: Mutex<usize>,
    activity: Mutex<Vec<String>>,
    scripted: Mutex<VecDeque<Result<OrderAck, String>>>,
    order_states: Mutex<HashMap<String, OrderState>>,
}

impl PaperGateway {
    /// Paper account holding `quote_balance` of `quote_asset`.
    pub fn new(quote_asset: &str, quote_balance: Decimal) -> Self {
        Self {
            balance: Mutex::new(Some(
                AccountBalance::new().with_asset(quote_asset, quote_balance),
            )),
            instruments: Mutex::new(HashMap::new()),
            default_lot: (dec!(0.001), dec!(0.001)),
            placed: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            balance_queries: Mutex::new(0),
            activity: Mutex::new(Vec::new()),
            scripted: Mutex::new(VecDeque::new()),
            order_states: Mutex::new(HashMap::new()),
        }
    }

    /// Register lot rules for a symbol; unknown symbols get 0.001/0.001.
    pub fn with_instrument(self, symbol: &str, min_order_qty: Decimal, qty_step: Decimal) -> Self {
        self.lock_instruments().insert(
            symbol.to_string(),
            InstrumentInfo {
                symbol: symbol.to_string(),
                min_order_qty,
                qty_step,
                status: "Trading".to_string(),
            },
        );
        self
    }

    fn record(&self, event: String) {
        if let Ok(mut activity) = self.activity.lock() {
            activity.push(event);
        }
    }

    fn lock_instruments(&self) -> std::sync::MutexGuard<'_, HashMap<String, InstrumentInfo>> {
        self.instruments
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
impl PaperGateway {
    /// Every order submitted so far, in submission order.
    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.placed.lock().unwrap().clone()
    }

    /// Answer the next `place_order` call with `ack`.
    pub fn script_ack(&self, ack: OrderAck) {
        self.scripted.lock().unwrap().push_back(Ok(ack));
    }

    /// Fail the next `place_order` call as a transport error.
    pub fn script_transport_error(&self, reason: &str) {
        self.scripted.lock().unwrap().push_back(Err(reason.to_string()));
    }

    pub fn set_balance(&self, balance: Option<AccountBalance>) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn set_order_state(&self, state: OrderState) {
        self.order_states
            .lock()
            .unwrap()
            .insert(state.order_id.clone(), state);
    }

    pub fn balance_queries(&self) -> usize {
        *self.balance_queries.lock().unwrap()
    }

    pub fn cancelled_orders(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    /// Balance reads and order submissions, interleaved as they happened.
    pub fn activity(&self) -> Vec<String> {
        self.activity.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExchangeGateway for PaperGateway {
    fn name(&self) -> &'static str {
        "paper"
    }

    async fn get_account_balance(&self) -> Result<AccountBalance> {
        if let Ok(mut count) = self.balance_queries.lock() {
            *count += 1;
        }
        self.record("balance".to_string());
        self.balance
            .lock()
            .map_err(|_| anyhow!("paper balance lock poisoned"))?
            .clone()
            .ok_or_else(|| anyhow!("paper account balance unavailable"))
    }

    async fn get_instrument_info(&self, symbol: &str) -> Result<InstrumentInfo> {
        let (min_order_qty, qty_step) = self.default_lot;
        Ok(self
            .lock_instruments()
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| InstrumentInfo {
                symbol: symbol.to_string(),
                min_order_qty,
                qty_step,
                status: "Trading".to_string(),
            }))
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck> {
        let scripted = self
            .scripted
            .lock()
            .map_err(|_| anyhow!("paper script lock poisoned"))?
            .pop_front();

        if let Some(Err(reason)) = scripted {
            return Err(anyhow!(reason));
        }

        self.placed
            .lock()
            .map_err(|_| anyhow!("paper order lock poisoned"))?
            .push(request.clone());
        self.record(format!("order:{}:{}", request.symbol, request.side));

        let ack = match scripted {
            Some(Ok(ack)) => ack,
            _ => OrderAck::accepted(uuid::Uuid::new_v4().to_string()),
        };

        info!(
            symbol = %request.symbol,
            side = %request.side,
            qty = %request.qty,
            price = %request.kind.price(),
            ret_code = ack.ret_code,
            "[DRY RUN] Order submitted to paper exchange"
        );

        Ok(ack)
    }

    async fn get_order(&self, _symbol: &str, order_id: &str) -> Result<OrderState> {
        let states = self
            .order_states
            .lock()
            .map_err(|_| anyhow!("paper order state lock poisoned"))?;
        Ok(states.get(order_id).cloned().unwrap_or_else(|| OrderState {
            order_id: order_id.to_string(),
            status: "New".to_string(),
            cum_exec_qty: Decimal::ZERO,
        }))
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<OrderAck> {
        self.cancelled
            .lock()
            .map_err(|_| anyhow!("paper cancel lock poisoned"))?
            .push(order_id.to_string());
        info!(symbol = %symbol, order_id = %order_id, "[DRY RUN] Order cancelled on paper exchange");
        Ok(OrderAck::accepted(order_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderSide;

    #[tokio::test]
    async fn test_accepts_orders_by_default() {
        let gateway = PaperGateway::new("USDT", dec!(1000));
        let request = OrderRequest::limit("HYPEUSDT", OrderSide::Buy, dec!(1), dec!(44.64));

        let ack = gateway.place_order(&request).await.unwrap();
        assert!(ack.is_accepted());
        assert!(ack.order_id.is_some());
        assert_eq!(gateway.placed_orders(), vec![request]);
    }

    #[tokio::test]
    async fn test_scripted_responses_are_consumed_in_order() {
        let gateway = PaperGateway::new("USDT", dec!(1000));
        gateway.script_ack(OrderAck::rejected(10001, "params error"));
        gateway.script_transport_error("connection reset");
        let request = OrderRequest::limit("HYPEUSDT", OrderSide::Buy, dec!(1), dec!(44.64));

        let first = gateway.place_order(&request).await.unwrap();
        assert_eq!(first.ret_code, 10001);
        assert!(gateway.place_order(&request).await.is_err());
        assert!(gateway.place_order(&request).await.unwrap().is_accepted());
        // transport failures never reached the book
        assert_eq!(gateway.placed_orders().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_symbol_gets_default_lot() {
        let gateway = PaperGateway::new("USDT", dec!(1000))
            .with_instrument("BTCUSDT", dec!(0.001), dec!(0.001));
        let info = gateway.get_instrument_info("SOLUSDT").await.unwrap();
        assert_eq!(info.qty_step, dec!(0.001));
        assert!(info.is_tradable());
    }
}
