use crate::field_mapper::Params;
use crate::metrics_defs::UPLOAD_QUEUE_DEPTH;
use shared::gauge;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};

/// A single request to the tracker. Each job stands alone: jobs derived from
/// the same document are delivered independently and in no particular order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadJob {
    params: Params,
}

impl UploadJob {
    pub fn new(params: Params) -> Self {
        UploadJob { params }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// `application/x-www-form-urlencoded` rendering of the parameters.
    pub fn query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.params)
            .finish()
    }
}

#[derive(thiserror::Error, Debug)]
#[error("upload queue is closed")]
pub struct QueueClosed;

/// Creates the unbounded job queue between the feed subscriber and the
/// upload workers.
pub fn upload_queue() -> (UploadSender, UploadReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));

    (
        UploadSender {
            tx,
            depth: depth.clone(),
        },
        UploadReceiver {
            rx: Arc::new(Mutex::new(rx)),
            depth,
        },
    )
}

#[derive(Clone)]
pub struct UploadSender {
    tx: mpsc::UnboundedSender<UploadJob>,
    depth: Arc<AtomicUsize>,
}

impl UploadSender {
    /// Never blocks. Fails only once every receiver is gone.
    pub fn push(&self, job: UploadJob) -> Result<(), QueueClosed> {
        // Count before sending so a fast consumer cannot decrement first.
        let depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        if self.tx.send(job).is_err() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            return Err(QueueClosed);
        }
        gauge!(UPLOAD_QUEUE_DEPTH).set(depth as f64);
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

/// Shared by all workers. Whichever worker is idle takes the next job.
#[derive(Clone)]
pub struct UploadReceiver {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<UploadJob>>>,
    depth: Arc<AtomicUsize>,
}

impl UploadReceiver {
    /// Waits for the next job. `None` means the queue is closed and drained.
    pub async fn pop(&self) -> Option<UploadJob> {
        let job = self.rx.lock().await.recv().await?;
        let depth = self.depth.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        gauge!(UPLOAD_QUEUE_DEPTH).set(depth as f64);
        Some(job)
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}
