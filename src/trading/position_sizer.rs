//! Risk-based position sizing with exchange lot rules.
//!
//! quantity = (balance * risk% / 100) / |entry - stop|, floored to the lot
//! step and clamped to the minimum order size. When the resulting order is
//! worth less than the minimum notional, the quantity is recomputed from
//! the notional floor and rounded *up* to the next step, which can push
//! realized risk above the requested percentage.

use rust_decimal::Decimal;
use tracing::{error, info};

use crate::models::{AccountBalance, InstrumentInfo};

use super::{SizingError, TradingConfig};

/// Converts a risk budget and stop distance into an order quantity.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    quote_asset: String,
    min_notional: Decimal,
}

impl PositionSizer {
    pub fn new(config: &TradingConfig) -> Self {
        Self {
            quote_asset: config.quote_asset.clone(),
            min_notional: config.min_notional,
        }
    }

    /// Calculate the order quantity, or `Decimal::ZERO` when no size can be
    /// computed. Zero means "abort the trade".
    pub fn calculate_size(
        &self,
        risk_pct: Decimal,
        stop_loss: Decimal,
        entry_price: Decimal,
        instrument: &InstrumentInfo,
        balance: &AccountBalance,
    ) -> Decimal {
        match self.try_size(risk_pct, stop_loss, entry_price, instrument, balance) {
            Ok(qty) => qty,
            Err(e) => {
                error!(symbol = %instrument.symbol, error = %e, "Failed to calculate position size");
                Decimal::ZERO
            }
        }
    }

    /// Calculate the order quantity, reporting why sizing failed.
    pub fn try_size(
        &self,
        risk_pct: Decimal,
        stop_loss: Decimal,
        entry_price: Decimal,
        instrument: &InstrumentInfo,
        balance: &AccountBalance,
    ) -> Result<Decimal, SizingError> {
        let quote_balance = balance
            .get(&self.quote_asset)
            .ok_or_else(|| SizingError::BalanceUnavailable(self.quote_asset.clone()))?;
        if quote_balance <= Decimal::ZERO {
            return Err(SizingError::ZeroBalance(self.quote_asset.clone()));
        }
        if entry_price <= Decimal::ZERO {
            return Err(SizingError::InvalidPrice(format!("entry {}", entry_price)));
        }

        let step = instrument.qty_step;
        if step <= Decimal::ZERO {
            return Err(SizingError::InvalidLotSize);
        }

        let risk_amount = quote_balance
            .checked_mul(risk_pct)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .ok_or(SizingError::Overflow)?;

        let stop_distance = entry_price
            .checked_sub(stop_loss)
            .ok_or(SizingError::Overflow)?
            .abs();
        if stop_distance.is_zero() {
            return Err(SizingError::InvalidStopDistance);
        }

        let raw_qty = risk_amount
            .checked_div(stop_distance)
            .ok_or(SizingError::Overflow)?;

        // Normal sizing rounds down so the risk budget is never exceeded.
        let mut qty = floor_to_step(raw_qty, step)?;
        qty = qty.max(instrument.min_order_qty);

        if notional(qty, entry_price)? < self.min_notional {
            let floor_qty = self
                .min_notional
                .checked_div(entry_price)
                .ok_or(SizingError::Overflow)?;
            // Notional correction always steps up, even from an exact multiple.
            qty = floor_to_step(floor_qty, step)?
                .checked_add(step)
                .ok_or(SizingError::Overflow)?
                .max(instrument.min_order_qty);
        }

        if qty <= Decimal::ZERO {
            return Err(SizingError::ZeroQuantity);
        }

        let order_value = notional(qty, entry_price)?;
        info!(
            symbol = %instrument.symbol,
            qty = %qty,
            risk_pct = %risk_pct,
            balance = %quote_balance,
            order_value = %order_value.round_dp(2),
            "Calculated position size"
        );

        Ok(qty)
    }
}

fn notional(qty: Decimal, price: Decimal) -> Result<Decimal, SizingError> {
    qty.checked_mul(price).ok_or(SizingError::Overflow)
}

/// Largest multiple of `step` not above `value`.
fn floor_to_step(value: Decimal, step: Decimal) -> Result<Decimal, SizingError> {
    let steps = value.checked_div(step).ok_or(SizingError::Overflow)?.floor();
    steps.checked_mul(step).ok_or(SizingError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn instrument(min_order_qty: Decimal, qty_step: Decimal) -> InstrumentInfo {
        InstrumentInfo {
            symbol: "HYPEUSDT".to_string(),
            min_order_qty,
            qty_step,
            status: "Trading".to_string(),
        }
    }

    fn usdt(amount: Decimal) -> AccountBalance {
        AccountBalance::new().with_asset("USDT", amount)
    }

    fn sizer() -> PositionSizer {
        PositionSizer::new(&TradingConfig::default())
    }

    fn is_step_multiple(qty: Decimal, step: Decimal) -> bool {
        (qty % step).is_zero()
    }

    #[test]
    fn test_reference_scenario() {
        let qty = sizer()
            .try_size(
                dec!(0.4),
                dec!(44.1336),
                dec!(44.64),
                &instrument(dec!(0.001), dec!(0.001)),
                &usdt(dec!(1000)),
            )
            .unwrap();

        // 4 USDT risk over a 0.5064 stop distance = 7.8988..., floored
        assert_eq!(qty, dec!(7.898));
        assert!(qty * dec!(44.64) >= dec!(5));
    }

    #[test]
    fn test_short_uses_absolute_stop_distance() {
        let qty = sizer()
            .try_size(
                dec!(1),
                dec!(110),
                dec!(100),
                &instrument(dec!(0.01), dec!(0.01)),
                &usdt(dec!(1000)),
            )
            .unwrap();
        assert_eq!(qty, dec!(1));
    }

    #[test]
    fn test_zero_stop_distance_is_no_size() {
        let sizer = sizer();
        let inst = instrument(dec!(0.001), dec!(0.001));
        let balance = usdt(dec!(1000));

        assert_eq!(
            sizer.try_size(dec!(0.4), dec!(44.64), dec!(44.64), &inst, &balance),
            Err(SizingError::InvalidStopDistance)
        );
        assert_eq!(
            sizer.calculate_size(dec!(0.4), dec!(44.64), dec!(44.64), &inst, &balance),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_missing_and_zero_balance() {
        let sizer = sizer();
        let inst = instrument(dec!(0.001), dec!(0.001));

        assert_eq!(
            sizer.try_size(dec!(0.4), dec!(44), dec!(45), &inst, &AccountBalance::new()),
            Err(SizingError::BalanceUnavailable("USDT".to_string()))
        );
        assert_eq!(
            sizer.try_size(dec!(0.4), dec!(44), dec!(45), &inst, &usdt(Decimal::ZERO)),
            Err(SizingError::ZeroBalance("USDT".to_string()))
        );
    }

    #[test]
    fn test_invalid_lot_step() {
        let result = sizer().try_size(
            dec!(0.4),
            dec!(44),
            dec!(45),
            &instrument(dec!(0.001), Decimal::ZERO),
            &usdt(dec!(1000)),
        );
        assert_eq!(result, Err(SizingError::InvalidLotSize));
    }

    #[test]
    fn test_clamps_up_to_min_order_qty() {
        // 0.1 USDT risk over a 1.0 distance = 0.1, below the 1.0 minimum
        let qty = sizer()
            .try_size(
                dec!(0.1),
                dec!(9),
                dec!(10),
                &instrument(dec!(1), dec!(0.1)),
                &usdt(dec!(100)),
            )
            .unwrap();
        assert_eq!(qty, dec!(1));
    }

    #[test]
    fn test_min_notional_floor_rounds_up() {
        // 0.01 USDT risk over a 10.0 distance = 0.001 -> notional 0.1 < 5
        let qty = sizer()
            .try_size(
                dec!(0.1),
                dec!(90),
                dec!(100),
                &instrument(dec!(0.001), dec!(0.001)),
                &usdt(dec!(10)),
            )
            .unwrap();

        // 5 / 100 = 0.05 exactly, still bumped one step
        assert_eq!(qty, dec!(0.051));
        assert!(qty * dec!(100) >= dec!(5));
    }

    #[test]
    fn test_min_notional_floor_non_exact() {
        let qty = sizer()
            .try_size(
                dec!(0.01),
                dec!(2.9),
                dec!(3),
                &instrument(dec!(0.1), dec!(0.1)),
                &usdt(dec!(50)),
            )
            .unwrap();

        // 5 / 3 = 1.666..., floored to 1.6, plus one step
        assert_eq!(qty, dec!(1.7));
        assert!(qty * dec!(3) >= dec!(5));
    }

    #[test]
    fn test_quantity_invariants_across_inputs() {
        let sizer = sizer();
        let balances = [dec!(10), dec!(250), dec!(1000), dec!(123456.78)];
        let risks = [dec!(0.1), dec!(0.4), dec!(1), dec!(2.5)];
        let plans = [
            (dec!(44.64), dec!(44.1336)),
            (dec!(100), dec!(120)),
            (dec!(0.5123), dec!(0.4999)),
            (dec!(65000), dec!(64000)),
        ];
        let lots = [
            (dec!(0.001), dec!(0.001)),
            (dec!(0.01), dec!(0.01)),
            (dec!(1), dec!(1)),
            (dec!(0.5), dec!(0.1)),
        ];

        for balance in balances {
            for risk in risks {
                for (entry, stop) in plans {
                    for (min_qty, step) in lots {
                        let qty = sizer
                            .try_size(risk, stop, entry, &instrument(min_qty, step), &usdt(balance))
                            .unwrap();
                        assert!(qty >= min_qty, "qty {} below min {}", qty, min_qty);
                        assert!(
                            is_step_multiple(qty, step) || qty == min_qty,
                            "qty {} not a multiple of {}",
                            qty,
                            step
                        );
                        assert!(qty * entry >= dec!(5), "notional below floor for {}", qty);
                    }
                }
            }
        }
    }

    #[test]
    fn test_overflowing_order_value_is_no_size() {
        let sizer = sizer();
        let inst = instrument(dec!(0.001), dec!(0.001));
        let balance = usdt(dec!(1000));
        // 1e25 units at 1e9 each does not fit in a Decimal
        let risk = Decimal::from_i128_with_scale(10i128.pow(24), 0);

        assert_eq!(
            sizer.try_size(risk, dec!(999999999), dec!(1000000000), &inst, &balance),
            Err(SizingError::Overflow)
        );
        assert_eq!(
            sizer.calculate_size(risk, dec!(999999999), dec!(1000000000), &inst, &balance),
            Decimal::ZERO
        );
    }
}
