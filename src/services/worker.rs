//! Judge queue and worker pool
//!
//! Intake pushes submission ids onto a bounded channel; a fixed number of
//! workers drain it. A sweeper task periodically recovers stale leases and
//! re-enqueues pending work. An id sits in the channel at most once; it
//! becomes enqueueable again as soon as a worker takes it.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::SubmissionService;

/// Producer side of the judge queue
#[derive(Debug, Clone)]
pub struct JudgeQueue {
    tx: mpsc::Sender<Uuid>,
    queued: Arc<DashSet<Uuid>>,
}

impl JudgeQueue {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Uuid>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue = Self {
            tx,
            queued: Arc::new(DashSet::new()),
        };
        (queue, rx)
    }

    /// Whether another id can be enqueued right now
    pub fn has_capacity(&self) -> bool {
        !self.tx.is_closed() && self.tx.capacity() > 0
    }

    /// Number of ids waiting for a worker
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Enqueue an id unless it is already waiting.
    ///
    /// Returns `false` when the id was already in the channel.
    pub fn try_enqueue(&self, id: Uuid) -> AppResult<bool> {
        if !self.queued.insert(id) {
            return Ok(false);
        }
        self.tx.try_send(id).map_err(|e| {
            self.queued.remove(&id);
            match e {
                mpsc::error::TrySendError::Full(_) => AppError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => AppError::Unavailable,
            }
        })?;
        Ok(true)
    }

    /// Mark an id as taken off the channel by a worker
    pub fn taken(&self, id: Uuid) {
        self.queued.remove(&id);
    }
}

/// Running workers and the sweeper
pub struct JudgePool {
    handles: Vec<JoinHandle<()>>,
}

impl JudgePool {
    /// Spawn `workers` judge workers plus the sweeper
    pub fn spawn(
        service: Arc<SubmissionService>,
        receiver: mpsc::Receiver<Uuid>,
        workers: usize,
        sweep_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let receiver = Arc::new(Mutex::new(receiver));
        let mut handles: Vec<_> = (0..workers.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    service.clone(),
                    receiver.clone(),
                    shutdown.clone(),
                ))
            })
            .collect();
        handles.push(tokio::spawn(run_sweeper(service, sweep_interval, shutdown)));

        tracing::info!(workers, "Judge pool started");
        Self { handles }
    }

    /// Wait for every task to stop after shutdown was signalled
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!("Judge task panicked: {}", e);
            }
        }
    }
}

async fn run_worker(
    worker: usize,
    service: Arc<SubmissionService>,
    receiver: Arc<Mutex<mpsc::Receiver<Uuid>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::debug!(worker, "Judge worker started");
    loop {
        if *shutdown.borrow() {
            break;
        }

        let next = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            id = async { receiver.lock().await.recv().await } => id,
        };
        let Some(id) = next else {
            break;
        };

        service.process(id).await;
    }
    tracing::debug!(worker, "Judge worker stopped");
}

async fn run_sweeper(
    service: Arc<SubmissionService>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = service.recover().await {
                    tracing::warn!("Lease recovery failed: {}", e);
                }
            }
        }
    }
}
