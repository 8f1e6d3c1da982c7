//! Metrics definitions for the relay.

use shared::metrics_defs::{MetricDef, MetricType};

pub const CHANGES_RECEIVED: MetricDef = MetricDef {
    name: "changes.received",
    metric_type: MetricType::Counter,
    description: "Number of rows read from the change feed",
};

pub const DOCUMENTS_DISCARDED: MetricDef = MetricDef {
    name: "documents.discarded",
    metric_type: MetricType::Counter,
    description: "Number of telemetry documents dropped because they were malformed",
};

pub const JOBS_ENQUEUED: MetricDef = MetricDef {
    name: "jobs.enqueued",
    metric_type: MetricType::Counter,
    description: "Number of upload jobs pushed to the upload queue",
};

pub const DEDUP_EVICTIONS: MetricDef = MetricDef {
    name: "dedup.evictions",
    metric_type: MetricType::Counter,
    description: "Number of documents forgotten by the receiver dedup window",
};

pub const UPLOADS_SUCCEEDED: MetricDef = MetricDef {
    name: "uploads.succeeded",
    metric_type: MetricType::Counter,
    description: "Number of jobs accepted by the tracker",
};

pub const UPLOADS_FAILED: MetricDef = MetricDef {
    name: "uploads.failed",
    metric_type: MetricType::Counter,
    description: "Number of jobs dropped after a failed tracker request",
};

pub const UPLOAD_DURATION: MetricDef = MetricDef {
    name: "upload.duration",
    metric_type: MetricType::Histogram,
    description: "Time to complete a tracker request in seconds",
};

pub const UPLOAD_QUEUE_DEPTH: MetricDef = MetricDef {
    name: "upload_queue.depth",
    metric_type: MetricType::Gauge,
    description: "Number of jobs waiting for an upload worker",
};

pub const WORKERS_RESTARTED: MetricDef = MetricDef {
    name: "workers.restarted",
    metric_type: MetricType::Counter,
    description: "Number of upload workers restarted by the supervisor",
};

pub const ALL_METRICS: &[MetricDef] = &[
    CHANGES_RECEIVED,
    DOCUMENTS_DISCARDED,
    JOBS_ENQUEUED,
    DEDUP_EVICTIONS,
    UPLOADS_SUCCEEDED,
    UPLOADS_FAILED,
    UPLOAD_DURATION,
    UPLOAD_QUEUE_DEPTH,
    WORKERS_RESTARTED,
];
