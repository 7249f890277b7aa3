//! Exchange gateway: trait, Bybit REST client, and paper exchange.

mod bybit_client;
mod gateway;
mod paper;
mod types;

pub use bybit_client::BybitClient;
pub use gateway::ExchangeGateway;
pub use paper::PaperGateway;
