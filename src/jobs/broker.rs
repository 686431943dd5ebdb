use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::executor::JobExecutor;
use super::models::{JobRequest, JobState};
use super::registry::JobRegistry;
use crate::config::{AdmissionPolicy, JobsConfig};
use crate::error::{MediaError, Result};
use crate::observability::Metrics;

/// A job waiting for a worker
#[derive(Debug)]
struct QueuedJob {
    id: String,
    request: JobRequest,
}

/// JobBroker admits jobs and hands them to a fixed worker pool
///
/// Architecture:
/// 1. API calls `broker.submit(request)`
/// 2. Broker registers a `pending` record under a fresh UUIDv7
/// 3. Broker pushes the job onto a bounded mpsc queue
/// 4. Workers share the receiving end and run one executor at a time
///
/// When the queue is full the admission policy decides: `reject` fails the
/// submission and drops the pending record, `block` waits for room.
pub struct JobBroker {
    sender: mpsc::Sender<QueuedJob>,
    registry: Arc<JobRegistry>,
    metrics: Arc<Metrics>,
    policy: AdmissionPolicy,
    capacity: usize,
    workers: usize,
}

impl JobBroker {
    /// Create the queue and spawn `config.workers` worker tasks.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(executor: JobExecutor, config: &JobsConfig, metrics: Arc<Metrics>) -> Self {
        info!(
            workers = config.workers,
            capacity = config.queue_capacity,
            policy = ?config.admission,
            "Starting job workers"
        );

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        for worker_id in 0..config.workers {
            tokio::spawn(worker_loop(worker_id, Arc::clone(&receiver), executor.clone()));
        }

        Self {
            sender,
            registry: Arc::clone(executor.registry()),
            metrics,
            policy: config.admission,
            capacity: config.queue_capacity,
            workers: config.workers,
        }
    }

    /// Register and enqueue a job, returning its id.
    pub async fn submit(&self, request: JobRequest) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        self.registry.create(JobState::pending(&id));

        let job = QueuedJob {
            id: id.clone(),
            request,
        };
        let admitted = match self.policy {
            AdmissionPolicy::Reject => self.sender.try_send(job).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => MediaError::QueueFull(self.capacity),
                mpsc::error::TrySendError::Closed(_) => self.closed(),
            }),
            AdmissionPolicy::Block => self.sender.send(job).await.map_err(|_| self.closed()),
        };

        if let Err(err) = admitted {
            self.registry.remove(&id);
            self.metrics.job_rejected();
            warn!(job_id = %id, error = %err, "Job rejected");
            return Err(err);
        }

        self.metrics.job_accepted();
        debug!(job_id = %id, "Job queued");
        Ok(id)
    }

    fn closed(&self) -> MediaError {
        error!("All job workers have stopped");
        MediaError::QueueFull(self.capacity)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Jobs waiting for a worker
    pub fn queued(&self) -> usize {
        self.capacity - self.sender.capacity()
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    executor: JobExecutor,
) {
    debug!(worker_id, "Worker started");

    loop {
        let next = receiver.lock().await.recv().await;
        let Some(QueuedJob { id, request }) = next else {
            break;
        };

        debug!(worker_id, job_id = %id, "Worker picked up job");

        // Run on its own task so a panic fails the job instead of the worker
        let run = {
            let executor = executor.clone();
            let id = id.clone();
            tokio::spawn(async move { executor.run(&id, request).await })
        };
        if let Err(e) = run.await {
            error!(worker_id, job_id = %id, error = %e, "Job task panicked");
            let _ = executor.registry().fail(&id, "internal error");
        }
    }

    debug!(worker_id, "Worker stopped");
}
