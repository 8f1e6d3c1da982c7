use crate::metrics_defs::{UPLOAD_DURATION, UPLOADS_FAILED, UPLOADS_SUCCEEDED, WORKERS_RESTARTED};
use crate::queue::{UploadJob, UploadReceiver};
use crate::tracker::Uploader;
use shared::{counter, histogram};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinHandle, JoinSet};

pub const DEFAULT_WORKERS: usize = 5;

/// A fixed set of upload workers draining the upload queue.
///
/// Failed uploads are logged and dropped. They are never retried and never
/// take a worker down with them: each job runs in its own task, so even a
/// panic while uploading or logging is contained at the join point. Workers
/// only return once the queue is closed and drained.
pub struct WorkerPool {
    supervisor: JoinHandle<()>,
}

impl WorkerPool {
    pub fn spawn(workers: usize, queue: UploadReceiver, uploader: Arc<dyn Uploader>) -> Self {
        let supervisor = tokio::spawn(supervise(workers.max(1), queue, uploader));
        WorkerPool { supervisor }
    }

    /// Resolves once every worker has exited, i.e. the queue has closed.
    pub async fn join(self) {
        if let Err(e) = self.supervisor.await {
            tracing::error!("worker supervisor failed: {e}");
        }
    }
}

/// Runs the workers until all of them have stopped.
async fn supervise(workers: usize, queue: UploadReceiver, uploader: Arc<dyn Uploader>) {
    let mut join_set = JoinSet::new();
    for id in 0..workers {
        let queue = queue.clone();
        let uploader = uploader.clone();
        join_set.spawn(supervise_worker(id, move || {
            run_worker(id, queue.clone(), uploader.clone())
        }));
    }
    tracing::info!(workers, "upload workers started");

    while let Some(result) = join_set.join_next().await {
        if let Err(e) = result {
            tracing::error!("worker supervisor task failed: {e}");
        }
    }
}

/// Keeps one worker slot busy. A worker that dies is replaced under the same
/// id; a worker that returns normally (the queue is closed and drained) is
/// not. Returns the number of restarts.
async fn supervise_worker<F, Fut>(id: usize, start_worker: F) -> usize
where
    F: Fn() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut restarts = 0;
    loop {
        match tokio::spawn(start_worker()).await {
            Ok(()) => {
                tracing::debug!(worker = id, "upload worker stopped");
                return restarts;
            }
            Err(e) => {
                tracing::error!(worker = id, restarts, "upload worker died, restarting: {e}");
                counter!(WORKERS_RESTARTED).increment(1);
                restarts += 1;
            }
        }
    }
}

async fn run_worker(id: usize, queue: UploadReceiver, uploader: Arc<dyn Uploader>) {
    while let Some(job) = queue.pop().await {
        let uploader = uploader.clone();
        let depth = queue.depth();

        let outcome = tokio::spawn(async move { upload(id, uploader, job, depth).await }).await;
        if let Err(e) = outcome {
            tracing::error!(worker = id, "upload task panicked: {e}");
        }
    }
}

async fn upload(id: usize, uploader: Arc<dyn Uploader>, job: UploadJob, depth: usize) {
    let start = Instant::now();
    let result = uploader.upload(&job).await;
    histogram!(UPLOAD_DURATION).record(start.elapsed().as_secs_f64());

    match result {
        Ok(()) => {
            counter!(UPLOADS_SUCCEEDED).increment(1);
            tracing::debug!(
                worker = id,
                callsign = job.get("callsign").unwrap_or_default(),
                queue_depth = depth,
                "uploaded"
            );
        }
        Err(e) => {
            counter!(UPLOADS_FAILED).increment(1);
            tracing::warn!(
                worker = id,
                callsign = job.get("callsign").unwrap_or_default(),
                queue_depth = depth,
                "upload failed: {e}"
            );
        }
    }
}
