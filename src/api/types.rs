//! Bybit v5 REST response types.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Common v5 response envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub ret_code: i64,
    #[serde(default)]
    pub ret_msg: String,
    pub result: Option<T>,
}

/// Result of `/v5/account/wallet-balance`.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletBalanceResult {
    #[serde(default)]
    pub list: Vec<WalletAccount>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccount {
    #[serde(default)]
    pub account_type: String,
    #[serde(default)]
    pub coin: Vec<CoinBalance>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinBalance {
    pub coin: String,
    /// Bybit sends an empty string instead of `0` for some assets
    #[serde(default)]
    pub wallet_balance: String,
}

impl CoinBalance {
    pub fn wallet_balance(&self) -> Decimal {
        parse_decimal(&self.wallet_balance).unwrap_or(Decimal::ZERO)
    }
}

/// Result of `/v5/market/instruments-info`.
#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentsResult {
    #[serde(default)]
    pub list: Vec<InstrumentEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentEntry {
    pub symbol: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub lot_size_filter: LotSizeFilter,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotSizeFilter {
    #[serde(default)]
    pub min_order_qty: Option<String>,
    #[serde(default)]
    pub qty_step: Option<String>,
}

/// Result of `/v5/order/create` and `/v5/order/cancel`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderIdResult {
    #[serde(default)]
    pub order_id: String,
}

/// Result of `/v5/order/realtime`.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenOrdersResult {
    #[serde(default)]
    pub list: Vec<OrderEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEntry {
    pub order_id: String,
    pub order_status: String,
    #[serde(default)]
    pub cum_exec_qty: String,
}

/// Body of `/v5/order/create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    pub category: &'static str,
    pub symbol: String,
    pub side: &'static str,
    pub order_type: &'static str,
    pub qty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_by: Option<&'static str>,
    /// 1 = triggers when price rises to `trigger_price`, 2 = when it falls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_direction: Option<u8>,
    pub time_in_force: &'static str,
}

/// Body of `/v5/order/cancel`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderBody {
    pub category: &'static str,
    pub symbol: String,
    pub order_id: String,
}

/// Parse a decimal string, treating empty as absent.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw).ok()
}
