//! Data models for trade decisions, instruments, and orders.

mod instrument;
mod order;
mod trade_request;

pub use instrument::{AccountBalance, InstrumentInfo};
pub use order::{
    BracketResult, LegKind, LegOutcome, LegResult, OrderAck, OrderKind, OrderRequest, OrderSide,
    OrderState, TimeInForce, TriggerBy,
};
pub use trade_request::{
    exchange_symbol, CancelIf, LimitPlan, PlannedOrder, RiskSpec, TradeDecision, TradeRequest,
    TradeSide,
};
