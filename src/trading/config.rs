//! Trading configuration.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Configuration for sizing, bracket placement and background execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Asset whose wallet balance funds the risk budget
    pub quote_asset: String,

    /// Smallest order value (qty * price) the exchange accepts, in quote units
    pub min_notional: Decimal,

    /// Risk percentage used when the request omits `risk_per_trade_pct`
    pub default_risk_pct: Decimal,

    /// Pause between the entry and its dependent legs (milliseconds)
    pub settlement_delay_ms: u64,

    /// Entry lifetime when the request carries no `cancel_if.timeout_min`
    pub default_timeout_min: u64,

    /// Cancel entries still resting after their timeout
    pub enforce_entry_timeout: bool,

    /// Number of background trade workers
    pub workers: usize,

    /// Pending jobs the queue holds before rejecting new ones
    pub queue_capacity: usize,

    /// Finished jobs kept for status queries
    pub registry_capacity: usize,
}

impl TradingConfig {
    pub fn settlement_delay(&self) -> Duration {
        Duration::from_millis(self.settlement_delay_ms)
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            quote_asset: "USDT".to_string(),
            min_notional: dec!(5),        // Bybit linear minimum order value
            default_risk_pct: dec!(0.4),
            settlement_delay_ms: 1000,
            default_timeout_min: 120,
            enforce_entry_timeout: false,
            workers: 4,
            queue_capacity: 64,
            registry_capacity: 1000,
        }
    }
}
