//! # Worker Pool
//!
//! Bounded execution of ingestion jobs. Submission is fire-and-forget: the
//! caller only hands the job over, it never waits for the job to finish. A
//! closed pool refuses the job so the caller can record that it never ran.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// A unit of background work.
pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// The executor no longer accepts jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("worker pool is shut down")]
pub struct PoolClosed;

#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Hand `job` over. On `Err` the job was dropped without running.
    async fn submit(&self, job: JobFuture) -> Result<(), PoolClosed>;
}

/// Fixed-size pool: every job is spawned at once but waits for one of
/// `size` permits before it runs.
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            tracker: TaskTracker::new(),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Jobs submitted and not yet finished, queued ones included.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting jobs and wait for the submitted ones to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        info!(pending = self.tracker.len(), "Draining worker pool");
        self.tracker.wait().await;
        info!("Worker pool drained");
    }
}

#[async_trait]
impl JobExecutor for WorkerPool {
    async fn submit(&self, job: JobFuture) -> Result<(), PoolClosed> {
        if self.tracker.is_closed() {
            warn!("Worker pool is shut down, refusing submitted job");
            return Err(PoolClosed);
        }

        let permits = Arc::clone(&self.permits);
        self.tracker.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                warn!("Worker pool semaphore closed, dropping job");
                return;
            };
            job.await;
        });
        Ok(())
    }
}

/// Runs each job to completion inside `submit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateExecutor;

#[async_trait]
impl JobExecutor for ImmediateExecutor {
    async fn submit(&self, job: JobFuture) -> Result<(), PoolClosed> {
        job.await;
        Ok(())
    }
}
