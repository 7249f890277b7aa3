//! Worker pool draining the trade queue.

use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::db::Journal;
use crate::models::TradeRequest;
use crate::trading::TradeExecutor;

use super::JobRegistry;

/// A trade request waiting for a worker.
#[derive(Debug)]
struct TradeJob {
    id: Uuid,
    trade: TradeRequest,
}

/// Hands accepted trade decisions to a fixed pool of background workers.
///
/// `submit` returns as soon as the job is queued; execution happens on a
/// worker inside a `trade` span carrying the job id and symbol.
pub struct TradeDispatcher {
    tx: mpsc::Sender<TradeJob>,
    // held so the queue stays open while the dispatcher lives
    _rx: Arc<Mutex<mpsc::Receiver<TradeJob>>>,
    registry: JobRegistry,
    journal: Option<Journal>,
    workers: Vec<JoinHandle<()>>,
}

impl TradeDispatcher {
    /// Spawn the worker pool sized from the executor's trading config.
    pub fn start(executor: Arc<TradeExecutor>, journal: Option<Journal>) -> Self {
        let config = executor.config();
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let registry = JobRegistry::new(config.registry_capacity);

        let workers = (0..config.workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    rx.clone(),
                    executor.clone(),
                    registry.clone(),
                    journal.clone(),
                ))
            })
            .collect();

        info!(workers = config.workers, queue = config.queue_capacity, "Trade dispatcher started");

        Self {
            tx,
            _rx: rx,
            registry,
            journal,
            workers,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Queue a validated trade. `payload` is the raw webhook body for the journal.
    pub async fn submit(&self, trade: TradeRequest, payload: &str) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let symbol = trade.exchange_symbol();

        self.registry.insert_queued(id, &symbol, trade.side).await;
        if let Some(journal) = &self.journal {
            let recorded = journal
                .record_job(&id.to_string(), &symbol, trade.side.as_str(), payload)
                .await;
            if let Err(e) = recorded {
                warn!(job_id = %id, error = %e, "Failed to journal trade job");
            }
        }
        // written before the handoff so it precedes the worker's events
        self.journal_event(id, "queued", None, None).await;

        if let Err(e) = self.tx.try_send(TradeJob { id, trade }) {
            let reason = match e {
                TrySendError::Full(_) => "queue is full",
                TrySendError::Closed(_) => "queue is closed",
            };
            self.registry.remove(id).await;
            self.journal_event(id, "rejected", Some(false), Some(reason)).await;
            error!(job_id = %id, symbol = %symbol, reason = reason, "Trade queue unavailable");
            bail!("Trade queue unavailable: {}", reason);
        }

        info!(job_id = %id, symbol = %symbol, "Trade decision queued for execution");

        Ok(id)
    }

    /// Stop accepting work and wait for queued jobs to finish.
    pub async fn shutdown(self) {
        drop(self.tx);
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Trade worker ended abnormally");
            }
        }
        info!("Trade dispatcher stopped");
    }

    async fn journal_event(&self, id: Uuid, event: &str, success: Option<bool>, detail: Option<&str>) {
        record_event(self.journal.as_ref(), id, event, success, detail).await;
    }
}

async fn record_event(
    journal: Option<&Journal>,
    id: Uuid,
    event: &str,
    success: Option<bool>,
    detail: Option<&str>,
) {
    if let Some(journal) = journal {
        if let Err(e) = journal.record_event(&id.to_string(), event, success, detail).await {
            warn!(job_id = %id, event = event, error = %e, "Failed to journal job event");
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<TradeJob>>>,
    executor: Arc<TradeExecutor>,
    registry: JobRegistry,
    journal: Option<Journal>,
) {
    loop {
        let job = rx.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };

        let span = info_span!("trade", job_id = %job.id, symbol = %job.trade.symbol);
        run_job(worker_id, job, &executor, &registry, journal.as_ref())
            .instrument(span)
            .await;
    }
}

async fn run_job(
    worker_id: usize,
    job: TradeJob,
    executor: &TradeExecutor,
    registry: &JobRegistry,
    journal: Option<&Journal>,
) {
    registry.mark_running(job.id).await;
    record_event(journal, job.id, "started", None, None).await;
    info!(worker = worker_id, "Trade job started");

    let report = executor.execute(&job.trade).await;
    let summary = report.summary();

    if report.success {
        info!(summary = %summary, "Trade job completed");
    } else {
        error!(summary = %summary, "Trade job failed");
    }
    if report.is_unprotected() {
        error!("Position entry is live without stop loss protection");
    }

    record_event(journal, job.id, "completed", Some(report.success), Some(&summary)).await;
    registry.complete(job.id, report).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::api::PaperGateway;
    use crate::dispatch::JobStatus;
    use crate::models::TradeDecision;
    use crate::trading::TradingConfig;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn trade(symbol: &str) -> TradeRequest {
        let decision: TradeDecision = serde_json::from_value(json!({
            "intent": "trade_decision",
            "trade": {
                "action": "open_limit",
                "symbol": symbol,
                "side": "long",
                "risk": { "risk_per_trade_pct": 0.4 },
                "limit_plan": {
                    "orders": [{ "price": 44.64, "size_pct": 100 }],
                    "stop_loss": 44.1336,
                    "take_profits": [{ "price": 45.1464, "size_pct": 100 }]
                }
            }
        }))
        .unwrap();
        decision.trade
    }

    fn dispatcher(workers: usize, queue_capacity: usize) -> (Arc<PaperGateway>, TradeDispatcher) {
        let gateway = Arc::new(PaperGateway::new("USDT", dec!(1000)));
        let config = TradingConfig {
            settlement_delay_ms: 0,
            workers,
            queue_capacity,
            ..TradingConfig::default()
        };
        let executor = Arc::new(TradeExecutor::new(gateway.clone(), config));
        (gateway, TradeDispatcher::start(executor, None))
    }

    async fn wait_completed(registry: &JobRegistry, id: Uuid) -> JobStatus {
        for _ in 0..100 {
            if let Some(job) = registry.get(id).await {
                if matches!(job.status, JobStatus::Completed { .. }) {
                    return job.status;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not complete", id);
    }

    #[tokio::test]
    async fn test_submitted_job_runs_in_background() {
        let (gateway, dispatcher) = dispatcher(2, 8);

        let id = dispatcher.submit(trade("HYPE/USDT"), "{}").await.unwrap();

        match wait_completed(dispatcher.registry(), id).await {
            JobStatus::Completed { report } => {
                assert!(report.success);
                assert_eq!(report.symbol, "HYPEUSDT");
            }
            other => panic!("unexpected status {:?}", other),
        }
        assert_eq!(gateway.placed_orders().len(), 3);
    }

    #[tokio::test]
    async fn test_full_queue_rejects_submission() {
        // no workers: nothing drains the queue
        let (_gateway, dispatcher) = dispatcher(0, 1);

        let first = dispatcher.submit(trade("HYPE/USDT"), "{}").await.unwrap();
        let err = dispatcher.submit(trade("BTC/USDT"), "{}").await.unwrap_err();
        assert_eq!(err.to_string(), "Trade queue unavailable: queue is full");

        assert!(dispatcher.registry().get(first).await.is_some());
        assert_eq!(dispatcher.registry().queued_count().await, 1);
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let (gateway, dispatcher) = dispatcher(1, 8);
        for symbol in ["HYPE/USDT", "BTC/USDT", "ETH/USDT"] {
            dispatcher.submit(trade(symbol), "{}").await.unwrap();
        }

        dispatcher.shutdown().await;
        assert_eq!(gateway.placed_orders().len(), 9);
    }

    #[tokio::test]
    async fn test_journal_records_lifecycle() {
        let gateway = Arc::new(PaperGateway::new("USDT", dec!(1000)));
        let config = TradingConfig {
            settlement_delay_ms: 0,
            ..TradingConfig::default()
        };
        let executor = Arc::new(TradeExecutor::new(gateway, config));
        let journal = Journal::new("sqlite::memory:").await.unwrap();
        let dispatcher = TradeDispatcher::start(executor, Some(journal.clone()));

        let id = dispatcher.submit(trade("HYPE/USDT"), "{\"intent\":\"trade_decision\"}").await.unwrap();
        dispatcher.shutdown().await;

        let events = journal.job_events(&id.to_string()).await.unwrap();
        let names: Vec<&str> = events.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(names, vec!["queued", "started", "completed"]);
        assert_eq!(events[2].success, Some(true));
    }
}
