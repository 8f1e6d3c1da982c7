use crate::changes::{ChangesFeed, FeedError};
use crate::dedup::DedupTracker;
use crate::document::{
    ChangeEvent, DocumentError, DocumentType, ListenerTelemetry, PayloadTelemetry,
    TelemetryDocument,
};
use crate::field_mapper::{Params, map_fields};
use crate::metrics_defs::{CHANGES_RECEIVED, DOCUMENTS_DISCARDED, JOBS_ENQUEUED};
use crate::queue::{QueueClosed, UploadJob, UploadSender};
use serde_json::{Map, Value};
use shared::counter;
use std::sync::Arc;

/// Listener telemetry is only relayed for chase cars.
const CHASE_MARKER: &str = "chase";

#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error("malformed document: {0}")]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Queue(#[from] QueueClosed),
}

/// Turns change feed rows into upload jobs.
pub struct FeedSubscriber {
    dedup: Arc<DedupTracker>,
    queue: UploadSender,
    password: String,
}

impl FeedSubscriber {
    pub fn new(dedup: Arc<DedupTracker>, queue: UploadSender, password: String) -> Self {
        FeedSubscriber {
            dedup,
            queue,
            password,
        }
    }

    /// Processes changes in feed order until the feed fails. A document that
    /// cannot be handled is logged and skipped.
    pub async fn run(&self, feed: &mut ChangesFeed) -> Result<(), FeedError> {
        loop {
            let change = feed.next_change().await?;
            counter!(CHANGES_RECEIVED).increment(1);

            match self.handle_change(&change) {
                Ok(queued) => tracing::debug!(
                    doc_id = %change.id,
                    queued,
                    queue_depth = self.queue.depth(),
                    "processed change"
                ),
                Err(e) => {
                    counter!(DOCUMENTS_DISCARDED).increment(1);
                    tracing::warn!(doc_id = %change.id, "ignoring document: {e}");
                }
            }
        }
    }

    /// Returns the number of jobs queued for this change.
    pub fn handle_change(&self, change: &ChangeEvent) -> Result<usize, HandlerError> {
        tracing::debug!(doc_id = %change.id, seq = %change.seq, "considering document");

        match TelemetryDocument::from_change(change)? {
            Some(TelemetryDocument::Payload(doc)) => self.payload_telemetry(doc),
            Some(TelemetryDocument::Listener(doc)) => self.listener_telemetry(doc),
            None => {
                tracing::debug!(
                    doc_id = %change.id,
                    doc_type = ?change.doc_type(),
                    "not telemetry"
                );
                Ok(0)
            }
        }
    }

    fn payload_telemetry(&self, doc: PayloadTelemetry) -> Result<usize, HandlerError> {
        let new_receivers = self.dedup.record_and_diff(&doc.id, &doc.receivers);
        if new_receivers.is_empty() {
            tracing::debug!(doc_id = %doc.id, "no new receivers");
            return Ok(0);
        }

        let params = self.params(DocumentType::PayloadTelemetry, &doc.data);

        for callsign in &new_receivers {
            let mut job = params.clone();
            job.insert("callsign".to_string(), callsign.clone());
            self.queue.push(UploadJob::new(job))?;
        }

        counter!(JOBS_ENQUEUED).increment(new_receivers.len() as u64);
        Ok(new_receivers.len())
    }

    fn listener_telemetry(&self, doc: ListenerTelemetry) -> Result<usize, HandlerError> {
        if !doc.callsign.to_lowercase().contains(CHASE_MARKER) {
            return Ok(0);
        }

        let params = self.params(DocumentType::ListenerTelemetry, &doc.data);
        self.queue.push(UploadJob::new(params))?;

        counter!(JOBS_ENQUEUED).increment(1);
        Ok(1)
    }

    fn params(&self, doc_type: DocumentType, data: &Map<String, Value>) -> Params {
        let mut params = map_fields(doc_type, data);
        params.insert("pass".to_string(), self.password.clone());
        params
    }
}
