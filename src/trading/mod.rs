//! Trading logic: validation, position sizing, bracket placement, execution.

mod bracket;
mod config;
mod error;
mod executor;
mod expiry;
mod position_sizer;
mod symbol_locks;
mod validator;

pub use bracket::BracketPlacer;
pub use config::TradingConfig;
pub use error::{ExecutionError, SizingError, ValidationError};
pub use executor::{ExecutionReport, TradeExecutor};
pub use expiry::{EntryExpiry, ExpiryOutcome};
pub use position_sizer::PositionSizer;
pub use symbol_locks::SymbolLocks;
pub use validator::{validate_decision, validate_trade};
