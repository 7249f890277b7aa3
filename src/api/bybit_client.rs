//! Bybit v5 REST client for USDT-margined linear derivatives.
//!
//! Handles:
//! - HMAC-SHA256 request signing (`X-BAPI-*` headers)
//! - Wallet balance and instrument lot-size queries
//! - Limit and conditional stop order placement
//! - Order status and cancellation for entry expiry

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::debug;

use crate::config::ExchangeCredentials;
use crate::models::{
    AccountBalance, InstrumentInfo, OrderAck, OrderKind, OrderRequest, OrderSide, OrderState,
};

use super::gateway::ExchangeGateway;
use super::types::*;

/// REST base URLs
pub const MAINNET_URL: &str = "https://api.bybit.com";
pub const TESTNET_URL: &str = "https://api-testnet.bybit.com";

/// Product category for USDT perpetuals
const CATEGORY: &str = "linear";
const ACCOUNT_TYPE: &str = "UNIFIED";
const RECV_WINDOW: &str = "5000";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Lot size assumed when the exchange omits the filter
const DEFAULT_LOT: Decimal = dec!(0.001);

type HmacSha256 = Hmac<Sha256>;

/// Signed client for Bybit's v5 API.
pub struct BybitClient {
    http: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl BybitClient {
    /// Create a client for mainnet or testnet depending on the credentials.
    pub fn new(credentials: &ExchangeCredentials) -> Result<Self> {
        let base_url = if credentials.testnet {
            TESTNET_URL
        } else {
            MAINNET_URL
        };
        Self::with_base_url(credentials, base_url.to_string())
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(credentials: &ExchangeCredentials, base_url: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url,
            api_key: credentials.api_key.clone(),
            api_secret: credentials.api_secret.clone(),
        })
    }

    /// Signed GET; `query` is signed exactly as sent.
    async fn get<T: DeserializeOwned>(&self, path: &str, query: &str) -> Result<ApiResponse<T>> {
        let url = format!("{}{}?{}", self.base_url, path, query);
        debug!(url = %url, "Bybit GET");

        let resp = self
            .http
            .get(&url)
            .headers(self.auth_headers(query)?)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", path))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("{} failed: {} - {}", path, status, text));
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse {} response", path))
    }

    /// Signed POST with a JSON body.
    async fn post<B, T>(&self, path: &str, body: &B) -> Result<ApiResponse<T>>
    where
        B: serde::Serialize,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_string(body)?;
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, body = %payload, "Bybit POST");

        let resp = self
            .http
            .post(&url)
            .headers(self.auth_headers(&payload)?)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", path))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("{} failed: {} - {}", path, status, text));
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse {} response", path))
    }

    /// Build the `X-BAPI-*` authentication headers for a payload.
    fn auth_headers(&self, payload: &str) -> Result<HeaderMap> {
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = self.sign(&timestamp, payload)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-bapi-api-key"),
            HeaderValue::from_str(&self.api_key)?,
        );
        headers.insert(
            HeaderName::from_static("x-bapi-sign"),
            HeaderValue::from_str(&signature)?,
        );
        headers.insert(
            HeaderName::from_static("x-bapi-timestamp"),
            HeaderValue::from_str(&timestamp)?,
        );
        headers.insert(
            HeaderName::from_static("x-bapi-recv-window"),
            HeaderValue::from_static(RECV_WINDOW),
        );

        Ok(headers)
    }

    /// HMAC-SHA256 over `timestamp + api_key + recv_window + payload`, hex encoded.
    fn sign(&self, timestamp: &str, payload: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| anyhow!("HMAC init failed: {}", e))?;
        mac.update(timestamp.as_bytes());
        mac.update(self.api_key.as_bytes());
        mac.update(RECV_WINDOW.as_bytes());
        mac.update(payload.as_bytes());

        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Translate a gateway order into the v5 create-order body.
    fn order_body(request: &OrderRequest) -> CreateOrderBody {
        let (order_type, price, trigger_price, trigger_by, trigger_direction) = match request.kind {
            OrderKind::Limit { price } => ("Limit", Some(format_decimal(price)), None, None, None),
            OrderKind::Stop {
                trigger_price,
                trigger_by,
            } => {
                // A sell stop protects a long, so it fires on a falling price.
                let direction = match request.side {
                    OrderSide::Sell => 2,
                    OrderSide::Buy => 1,
                };
                (
                    "Market",
                    None,
                    Some(format_decimal(trigger_price)),
                    Some(trigger_by.as_str()),
                    Some(direction),
                )
            }
        };

        CreateOrderBody {
            category: CATEGORY,
            symbol: request.symbol.clone(),
            side: request.side.as_str(),
            order_type,
            qty: format_decimal(request.qty),
            price,
            trigger_price,
            trigger_by,
            trigger_direction,
            time_in_force: request.time_in_force.as_str(),
        }
    }
}

#[async_trait]
impl ExchangeGateway for BybitClient {
    fn name(&self) -> &'static str {
        "bybit"
    }

    async fn get_account_balance(&self) -> Result<AccountBalance> {
        let query = format!("accountType={}", ACCOUNT_TYPE);
        let resp: ApiResponse<WalletBalanceResult> =
            self.get("/v5/account/wallet-balance", &query).await?;

        if resp.ret_code != 0 {
            bail!("Wallet balance rejected: {} - {}", resp.ret_code, resp.ret_msg);
        }

        let mut balance = AccountBalance::new();
        for account in resp.result.map(|r| r.list).unwrap_or_default() {
            for coin in account.coin {
                balance.insert(&coin.coin, coin.wallet_balance());
            }
        }

        Ok(balance)
    }

    async fn get_instrument_info(&self, symbol: &str) -> Result<InstrumentInfo> {
        let query = format!("category={}&symbol={}", CATEGORY, symbol);
        let resp: ApiResponse<InstrumentsResult> =
            self.get("/v5/market/instruments-info", &query).await?;

        if resp.ret_code != 0 {
            bail!("Instrument query rejected: {} - {}", resp.ret_code, resp.ret_msg);
        }

        let entry = resp
            .result
            .and_then(|r| r.list.into_iter().next())
            .ok_or_else(|| anyhow!("No instrument info for {}", symbol))?;

        let lot = &entry.lot_size_filter;
        Ok(InstrumentInfo {
            symbol: entry.symbol.clone(),
            min_order_qty: lot
                .min_order_qty
                .as_deref()
                .and_then(parse_decimal)
                .unwrap_or(DEFAULT_LOT),
            qty_step: lot
                .qty_step
                .as_deref()
                .and_then(parse_decimal)
                .unwrap_or(DEFAULT_LOT),
            status: entry.status,
        })
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck> {
        let body = Self::order_body(request);
        let resp: ApiResponse<OrderIdResult> = self.post("/v5/order/create", &body).await?;

        if resp.ret_code != 0 {
            return Ok(OrderAck::rejected(resp.ret_code, resp.ret_msg));
        }

        let order_id = resp
            .result
            .map(|r| r.order_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("Order accepted without an order id"))?;

        Ok(OrderAck::accepted(order_id))
    }

    async fn get_order(&self, symbol: &str, order_id: &str) -> Result<OrderState> {
        let query = format!(
            "category={}&symbol={}&orderId={}",
            CATEGORY, symbol, order_id
        );
        let resp: ApiResponse<OpenOrdersResult> = self.get("/v5/order/realtime", &query).await?;

        if resp.ret_code != 0 {
            bail!("Order query rejected: {} - {}", resp.ret_code, resp.ret_msg);
        }

        let entry = resp
            .result
            .and_then(|r| r.list.into_iter().next())
            .ok_or_else(|| anyhow!("Order {} not found", order_id))?;

        Ok(OrderState {
            order_id: entry.order_id,
            status: entry.order_status,
            cum_exec_qty: parse_decimal(&entry.cum_exec_qty).unwrap_or(Decimal::ZERO),
        })
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<OrderAck> {
        let body = CancelOrderBody {
            category: CATEGORY,
            symbol: symbol.to_string(),
            order_id: order_id.to_string(),
        };
        let resp: ApiResponse<OrderIdResult> = self.post("/v5/order/cancel", &body).await?;

        if resp.ret_code != 0 {
            return Ok(OrderAck::rejected(resp.ret_code, resp.ret_msg));
        }

        Ok(OrderAck::accepted(order_id))
    }
}

/// Plain decimal string without trailing zeros, as Bybit expects.
fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}
