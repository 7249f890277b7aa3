//! Instrument metadata and account balances as the sizer consumes them.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lot-size rules for a tradable instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    /// Exchange symbol, e.g. `HYPEUSDT`
    pub symbol: String,

    /// Smallest order quantity the exchange accepts
    pub min_order_qty: Decimal,

    /// Quantity increment
    pub qty_step: Decimal,

    /// Exchange trading status, e.g. `Trading`
    pub status: String,
}

impl InstrumentInfo {
    pub fn is_tradable(&self) -> bool {
        self.status.eq_ignore_ascii_case("trading")
    }
}

/// Wallet balances keyed by asset symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    balances: HashMap<String, Decimal>,
}

impl AccountBalance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, asset: &str, amount: Decimal) -> Self {
        self.insert(asset, amount);
        self
    }

    pub fn insert(&mut self, asset: &str, amount: Decimal) {
        self.balances.insert(asset.to_uppercase(), amount);
    }

    /// Wallet balance of `asset`, if the account holds it at all.
    pub fn get(&self, asset: &str) -> Option<Decimal> {
        self.balances.get(&asset.to_uppercase()).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Decimal)> {
        self.balances.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}
