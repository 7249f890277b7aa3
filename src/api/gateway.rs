//! Exchange Gateway: the only surface the trading core talks to.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{AccountBalance, InstrumentInfo, OrderAck, OrderRequest, OrderState};

/// Account, instrument and order operations of a derivatives exchange.
///
/// `Err` from any method means the exchange never answered (transport or
/// decoding failure). An exchange-side rejection of an order is an `Ok`
/// acknowledgment carrying a non-zero return code.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn get_account_balance(&self) -> Result<AccountBalance>;

    async fn get_instrument_info(&self, symbol: &str) -> Result<InstrumentInfo>;

    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck>;

    async fn get_order(&self, symbol: &str, _order_id: &str) -> Result<OrderState> {
        Err(anyhow!("{}: order query not supported for {}", self.name(), symbol))
    }

    async fn cancel_order(&self, symbol: &str, _order_id: &str) -> Result<OrderAck> {
        Err(anyhow!("{}: order cancel not supported for {}", self.name(), symbol))
    }
}
