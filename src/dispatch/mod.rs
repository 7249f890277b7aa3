//! Background execution: bounded queue, worker pool, job status registry.

mod registry;
mod worker;

pub use registry::{JobRecord, JobRegistry, JobStatus};
pub use worker::TradeDispatcher;
