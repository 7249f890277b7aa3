//! Bracket order placement: entry, then stop-loss, then take-profits.
//!
//! Legs are submitted strictly in sequence. An entry rejection aborts the
//! bracket; dependent-leg failures are recorded and the sequence carries on.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::api::ExchangeGateway;
use crate::models::{
    BracketResult, LegKind, LegResult, OrderRequest, PlannedOrder, TradeSide,
};

/// Submits a bracket of dependent orders through an exchange gateway.
pub struct BracketPlacer {
    gateway: Arc<dyn ExchangeGateway>,
    settlement_delay: Duration,
}

impl BracketPlacer {
    pub fn new(gateway: Arc<dyn ExchangeGateway>, settlement_delay: Duration) -> Self {
        Self {
            gateway,
            settlement_delay,
        }
    }

    /// Place the entry limit order and its dependent legs.
    ///
    /// `symbol` is the exchange symbol. Take-profit quantities are
    /// `qty * size_pct / 100` and are not re-quantized.
    pub async fn place(
        &self,
        symbol: &str,
        side: TradeSide,
        qty: Decimal,
        entry_price: Decimal,
        stop_loss: Decimal,
        take_profits: &[PlannedOrder],
    ) -> BracketResult {
        let entry_request = OrderRequest::limit(symbol, side.entry_side(), qty, entry_price);
        let entry = self.submit(LegKind::Entry, &entry_request).await;

        if !entry.is_submitted() {
            error!(symbol = %symbol, outcome = ?entry.outcome, "Failed to place entry order");
            return BracketResult {
                success: false,
                entry,
                stop_loss: None,
                take_profits: Vec::new(),
            };
        }

        info!(
            symbol = %symbol,
            side = %side,
            order_id = entry.order_id().unwrap_or_default(),
            qty = %qty,
            price = %entry_price,
            "Placed entry limit order"
        );

        // Give the venue time to register the entry before dependent legs.
        if !self.settlement_delay.is_zero() {
            tokio::time::sleep(self.settlement_delay).await;
        }

        let exit_side = side.exit_side();

        let sl_request = OrderRequest::stop(symbol, exit_side, qty, stop_loss);
        let sl = self.submit(LegKind::StopLoss, &sl_request).await;
        if sl.is_submitted() {
            info!(
                symbol = %symbol,
                order_id = sl.order_id().unwrap_or_default(),
                trigger = %stop_loss,
                "Placed stop loss order"
            );
        } else {
            error!(symbol = %symbol, outcome = ?sl.outcome, "Failed to place stop loss");
        }

        let mut tp_results = Vec::with_capacity(take_profits.len());
        for (i, tp) in take_profits.iter().enumerate() {
            let Some(tp_qty) = qty
                .checked_mul(tp.size_pct)
                .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            else {
                let request = OrderRequest::limit(symbol, exit_side, Decimal::ZERO, tp.price);
                let result = LegResult::failed(
                    LegKind::TakeProfit(i),
                    &request,
                    format!("take profit quantity overflows: {} x {}%", qty, tp.size_pct),
                );
                error!(symbol = %symbol, leg = %result.leg, "Failed to size take profit");
                tp_results.push(result);
                continue;
            };
            let tp_request = OrderRequest::limit(symbol, exit_side, tp_qty, tp.price);
            let result = self.submit(LegKind::TakeProfit(i), &tp_request).await;

            if result.is_submitted() {
                info!(
                    symbol = %symbol,
                    order_id = result.order_id().unwrap_or_default(),
                    qty = %tp_qty,
                    price = %tp.price,
                    "Placed take profit order"
                );
            } else {
                error!(
                    symbol = %symbol,
                    leg = %result.leg,
                    outcome = ?result.outcome,
                    "Failed to place take profit"
                );
            }
            tp_results.push(result);
        }

        let result = BracketResult {
            success: true,
            entry,
            stop_loss: Some(sl),
            take_profits: tp_results,
        };

        if result.is_unprotected() {
            warn!(symbol = %symbol, "Entry order is live without a stop loss");
        }

        result
    }

    async fn submit(&self, leg: LegKind, request: &OrderRequest) -> LegResult {
        match self.gateway.place_order(request).await {
            Ok(ack) => LegResult::from_ack(leg, request, &ack),
            Err(e) => LegResult::failed(leg, request, format!("{:#}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PaperGateway;
    use crate::models::{LegOutcome, OrderAck, OrderKind, OrderSide, TriggerBy};
    use rust_decimal_macros::dec;

    fn take_profits() -> Vec<PlannedOrder> {
        vec![
            PlannedOrder { price: dec!(45.1464), size_pct: dec!(30) },
            PlannedOrder { price: dec!(45.5516), size_pct: dec!(40) },
            PlannedOrder { price: dec!(45.9064), size_pct: dec!(30) },
        ]
    }

    fn setup() -> (Arc<PaperGateway>, BracketPlacer) {
        let gateway = Arc::new(PaperGateway::new("USDT", dec!(1000)));
        let placer = BracketPlacer::new(gateway.clone(), Duration::ZERO);
        (gateway, placer)
    }

    #[tokio::test]
    async fn test_long_bracket_sequence() {
        let (gateway, placer) = setup();

        let result = placer
            .place("HYPEUSDT", TradeSide::Long, dec!(7.898), dec!(44.64), dec!(44.1336), &take_profits())
            .await;

        assert!(result.success);
        assert!(!result.is_unprotected());
        assert_eq!(result.take_profits.len(), 3);

        let orders = gateway.placed_orders();
        assert_eq!(orders.len(), 5);

        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(orders[0].kind, OrderKind::Limit { price: dec!(44.64) });
        assert_eq!(orders[0].qty, dec!(7.898));

        assert_eq!(orders[1].side, OrderSide::Sell);
        assert_eq!(
            orders[1].kind,
            OrderKind::Stop { trigger_price: dec!(44.1336), trigger_by: TriggerBy::LastPrice }
        );
        assert_eq!(orders[1].qty, dec!(7.898));

        for tp in &orders[2..] {
            assert_eq!(tp.side, OrderSide::Sell);
        }
    }

    #[tokio::test]
    async fn test_short_dependent_legs_buy() {
        let (gateway, placer) = setup();

        placer
            .place("BTCUSDT", TradeSide::Short, dec!(0.01), dec!(65000), dec!(66000), &[PlannedOrder {
                price: dec!(63000),
                size_pct: dec!(100),
            }])
            .await;

        let sides: Vec<OrderSide> = gateway.placed_orders().iter().map(|o| o.side).collect();
        assert_eq!(sides, vec![OrderSide::Sell, OrderSide::Buy, OrderSide::Buy]);
    }

    #[tokio::test]
    async fn test_entry_rejection_skips_dependent_legs() {
        let (gateway, placer) = setup();
        gateway.script_ack(OrderAck::rejected(110007, "ab not enough for new order"));

        let result = placer
            .place("HYPEUSDT", TradeSide::Long, dec!(7.898), dec!(44.64), dec!(44.1336), &take_profits())
            .await;

        assert!(!result.success);
        assert!(result.stop_loss.is_none());
        assert!(result.take_profits.is_empty());
        assert_eq!(
            result.entry.outcome,
            LegOutcome::Rejected { ret_code: 110007, message: "ab not enough for new order".to_string() }
        );
        // only the entry ever reached the exchange
        assert_eq!(gateway.placed_orders().len(), 1);
    }

    #[tokio::test]
    async fn test_entry_transport_error_aborts() {
        let (gateway, placer) = setup();
        gateway.script_transport_error("connection reset by peer");

        let result = placer
            .place("HYPEUSDT", TradeSide::Long, dec!(1), dec!(44.64), dec!(44.1336), &take_profits())
            .await;

        assert!(!result.success);
        assert!(matches!(result.entry.outcome, LegOutcome::Failed { .. }));
        assert!(gateway.placed_orders().is_empty());
    }

    #[tokio::test]
    async fn test_stop_loss_rejection_still_places_take_profits() {
        let (gateway, placer) = setup();
        gateway.script_ack(OrderAck::accepted("entry-1"));
        gateway.script_ack(OrderAck::rejected(10001, "TriggerPrice invalid"));

        let result = placer
            .place("HYPEUSDT", TradeSide::Long, dec!(7.898), dec!(44.64), dec!(44.1336), &take_profits())
            .await;

        assert!(result.success);
        assert!(result.is_unprotected());
        assert_eq!(result.take_profits.len(), 3);
        assert!(result.take_profits.iter().all(|tp| tp.is_submitted()));
        assert_eq!(gateway.placed_orders().len(), 5);
    }

    #[tokio::test]
    async fn test_take_profit_failure_does_not_block_later_legs() {
        let (gateway, placer) = setup();
        gateway.script_ack(OrderAck::accepted("entry-1"));
        gateway.script_ack(OrderAck::accepted("sl-1"));
        gateway.script_ack(OrderAck::rejected(170136, "qty invalid"));

        let result = placer
            .place("HYPEUSDT", TradeSide::Long, dec!(7.898), dec!(44.64), dec!(44.1336), &take_profits())
            .await;

        assert!(result.success);
        assert!(!result.take_profits[0].is_submitted());
        assert!(result.take_profits[1].is_submitted());
        assert!(result.take_profits[2].is_submitted());
        assert_eq!(result.failed_legs().count(), 1);
    }

    #[tokio::test]
    async fn test_take_profit_quantities() {
        let (gateway, placer) = setup();
        let qty = dec!(7.898);

        let result = placer
            .place("HYPEUSDT", TradeSide::Long, qty, dec!(44.64), dec!(44.1336), &take_profits())
            .await;

        let tp_qtys: Vec<Decimal> = result.take_profits.iter().map(|tp| tp.qty).collect();
        assert_eq!(tp_qtys, vec![dec!(2.3694), dec!(3.1592), dec!(2.3694)]);

        let total: Decimal = tp_qtys.iter().sum();
        let pct_sum: Decimal = take_profits().iter().map(|tp| tp.size_pct).sum();
        assert_eq!(total, qty * pct_sum / dec!(100));

        let prices: Vec<Decimal> = gateway.placed_orders()[2..].iter().map(|o| o.kind.price()).collect();
        assert_eq!(prices, vec![dec!(45.1464), dec!(45.5516), dec!(45.9064)]);
    }

    #[tokio::test]
    async fn test_unsizable_take_profit_is_a_failed_leg() {
        let (gateway, placer) = setup();
        let tps = vec![
            PlannedOrder { price: dec!(45), size_pct: dec!(200) },
            PlannedOrder { price: dec!(46), size_pct: dec!(1) },
        ];

        let result = placer
            .place("HYPEUSDT", TradeSide::Long, Decimal::MAX, dec!(44.64), dec!(44.1336), &tps)
            .await;

        assert!(result.success);
        assert!(matches!(result.take_profits[0].outcome, LegOutcome::Failed { .. }));
        assert!(result.take_profits[1].is_submitted());
        // entry, stop loss and the second take profit
        assert_eq!(gateway.placed_orders().len(), 3);
    }
}
