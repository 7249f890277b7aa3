//! In-memory job status table for background trade executions.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::TradeSide;
use crate::trading::ExecutionReport;

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed { report: ExecutionReport },
}

/// A job as reported by `GET /trades/:id`.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub symbol: String,
    pub side: TradeSide,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub status: JobStatus,
}

struct RegistryInner {
    jobs: HashMap<Uuid, JobRecord>,
    /// Completed job ids, oldest first
    finished: VecDeque<Uuid>,
}

/// Shared job table. Completed jobs beyond `capacity` are forgotten oldest first;
/// queued and running jobs are always kept.
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    capacity: usize,
}

impl JobRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                jobs: HashMap::new(),
                finished: VecDeque::new(),
            })),
            capacity,
        }
    }

    pub async fn insert_queued(&self, job_id: Uuid, symbol: &str, side: TradeSide) {
        let now = Utc::now();
        self.inner.write().await.jobs.insert(
            job_id,
            JobRecord {
                job_id,
                symbol: symbol.to_string(),
                side,
                received_at: now,
                updated_at: now,
                status: JobStatus::Queued,
            },
        );
    }

    pub async fn mark_running(&self, job_id: Uuid) {
        if let Some(job) = self.inner.write().await.jobs.get_mut(&job_id) {
            job.status = JobStatus::Running;
            job.updated_at = Utc::now();
        }
    }

    pub async fn complete(&self, job_id: Uuid, report: ExecutionReport) {
        let mut inner = self.inner.write().await;
        let Some(job) = inner.jobs.get_mut(&job_id) else {
            return;
        };
        job.status = JobStatus::Completed { report };
        job.updated_at = Utc::now();

        inner.finished.push_back(job_id);
        while inner.finished.len() > self.capacity {
            if let Some(evicted) = inner.finished.pop_front() {
                inner.jobs.remove(&evicted);
            }
        }
    }

    /// Forget a job that never made it onto the queue.
    pub async fn remove(&self, job_id: Uuid) {
        self.inner.write().await.jobs.remove(&job_id);
    }

    pub async fn get(&self, job_id: Uuid) -> Option<JobRecord> {
        self.inner.read().await.jobs.get(&job_id).cloned()
    }

    /// Jobs accepted but not yet picked up by a worker.
    pub async fn queued_count(&self) -> usize {
        self.inner
            .read()
            .await
            .jobs
            .values()
            .filter(|j| matches!(j.status, JobStatus::Queued))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(symbol: &str) -> ExecutionReport {
        ExecutionReport {
            success: true,
            symbol: symbol.to_string(),
            side: TradeSide::Long,
            quantity: None,
            entry_price: None,
            bracket: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let registry = JobRegistry::new(10);
        let id = Uuid::new_v4();

        registry.insert_queued(id, "HYPEUSDT", TradeSide::Long).await;
        assert_eq!(registry.queued_count().await, 1);

        registry.mark_running(id).await;
        assert!(matches!(registry.get(id).await.unwrap().status, JobStatus::Running));
        assert_eq!(registry.queued_count().await, 0);

        registry.complete(id, report("HYPEUSDT")).await;
        assert!(matches!(
            registry.get(id).await.unwrap().status,
            JobStatus::Completed { .. }
        ));
    }

    #[tokio::test]
    async fn test_retention_evicts_oldest_completed() {
        let registry = JobRegistry::new(2);
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let pending = Uuid::new_v4();
        registry.insert_queued(pending, "BTCUSDT", TradeSide::Short).await;

        for id in &ids {
            registry.insert_queued(*id, "HYPEUSDT", TradeSide::Long).await;
            registry.complete(*id, report("HYPEUSDT")).await;
        }

        assert!(registry.get(ids[0]).await.is_none());
        assert!(registry.get(ids[1]).await.is_some());
        assert!(registry.get(ids[2]).await.is_some());
        assert!(registry.get(pending).await.is_some());
    }

    #[test]
    fn test_status_serialization() {
        let record = JobRecord {
            job_id: Uuid::nil(),
            symbol: "HYPEUSDT".to_string(),
            side: TradeSide::Long,
            received_at: Utc::now(),
            updated_at: Utc::now(),
            status: JobStatus::Queued,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["state"], "queued");
        assert_eq!(json["side"], "long");
    }
}
