//! Background job queue feeding the reconciler.
//!
//! File events and full-sync requests are processed one at a time by a
//! single worker task.  Whatever piles up while a job runs is coalesced
//! before the next batch: one job per path (latest event kind wins) and at
//! most one pending full sync.  Failures are logged and counted, never
//! propagated.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::reconciler::Reconciler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Created,
    Modified,
    Deleted,
}

/// A change to one vault document, by vault-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: String,
    pub kind: FileEventKind,
}

impl FileEvent {
    pub fn new(path: impl Into<String>, kind: FileEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncJob {
    File(FileEvent),
    FullSync,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Path(String),
    FullSync,
}

/// Jobs waiting for the worker, coalesced.
#[derive(Debug, Default)]
struct PendingJobs {
    order: VecDeque<Slot>,
    kinds: HashMap<String, FileEventKind>,
}

impl PendingJobs {
    fn push(&mut self, job: SyncJob) {
        match job {
            SyncJob::File(event) => {
                if self.kinds.insert(event.path.clone(), event.kind).is_none() {
                    self.order.push_back(Slot::Path(event.path));
                }
            }
            SyncJob::FullSync => {
                if !self.order.contains(&Slot::FullSync) {
                    self.order.push_back(Slot::FullSync);
                }
            }
        }
    }

    fn pop(&mut self) -> Option<SyncJob> {
        match self.order.pop_front()? {
            Slot::FullSync => Some(SyncJob::FullSync),
            Slot::Path(path) => {
                let kind = self.kinds.remove(&path)?;
                Some(SyncJob::File(FileEvent { path, kind }))
            }
        }
    }
}

/// Sending half of the queue.  The worker stops once every clone is dropped.
#[derive(Debug, Clone)]
pub struct SyncQueue {
    tx: mpsc::UnboundedSender<SyncJob>,
}

impl SyncQueue {
    #[cfg(test)]
    pub(crate) fn from_sender(tx: mpsc::UnboundedSender<SyncJob>) -> Self {
        Self { tx }
    }

    /// Returns false when the worker has already stopped.
    pub fn enqueue(&self, event: FileEvent) -> bool {
        self.tx.send(SyncJob::File(event)).is_ok()
    }

    pub fn request_full_sync(&self) -> bool {
        self.tx.send(SyncJob::FullSync).is_ok()
    }
}

/// Totals reported by the worker when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: usize,
    pub failed: usize,
}

/// Starts the worker.  Await the handle after dropping every [`SyncQueue`]
/// clone to collect its totals.
pub fn spawn_sync_worker(
    reconciler: Arc<Reconciler>,
    source_id: String,
) -> (SyncQueue, JoinHandle<WorkerStats>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<SyncJob>();
    let handle = tokio::spawn(async move {
        let mut stats = WorkerStats::default();
        let mut pending = PendingJobs::default();
        while let Some(job) = rx.recv().await {
            pending.push(job);
            while let Ok(job) = rx.try_recv() {
                pending.push(job);
            }
            while let Some(job) = pending.pop() {
                stats.processed += 1;
                if let Err(err) = run_job(&reconciler, &source_id, &job).await {
                    stats.failed += 1;
                    warn!(?job, error = %err, "background sync job failed");
                }
            }
        }
        info!(
            processed = stats.processed,
            failed = stats.failed,
            "sync worker stopped"
        );
        stats
    });
    (SyncQueue { tx }, handle)
}

async fn run_job(reconciler: &Reconciler, source_id: &str, job: &SyncJob) -> Result<(), SyncError> {
    match job {
        SyncJob::FullSync => {
            let report = reconciler.full_sync(source_id).await?;
            if report.is_clean() {
                Ok(())
            } else {
                Err(SyncError::Incomplete {
                    failed: report.failed.len(),
                })
            }
        }
        SyncJob::File(event) => {
            debug!(path = %event.path, kind = ?event.kind, "processing file event");
            if event.kind == FileEventKind::Deleted {
                reconciler.on_file_deleted(&event.path, source_id).await?;
                return Ok(());
            }
            let store = reconciler.store();
            if !store.is_candidate(&event.path) {
                return Ok(());
            }
            // A create or modify can race with a later delete.
            match store.stat(&event.path).await? {
                Some(file) => reconciler.on_file_changed(&file, source_id).await,
                None => reconciler
                    .on_file_deleted(&event.path, source_id)
                    .await
                    .map(|_| ()),
            }
        }
    }
}

/// Requests a full sync every `interval` until `shutdown` turns true or the
/// worker stops.
pub fn spawn_periodic_sync(
    queue: SyncQueue,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!("periodic full sync requested");
                    if !queue.request_full_sync() {
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
