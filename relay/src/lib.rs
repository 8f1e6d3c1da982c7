pub mod changes;
pub mod config;
pub mod dedup;
pub mod document;
pub mod field_mapper;
pub mod metrics_defs;
pub mod queue;
pub mod subscriber;
pub mod tracker;
pub mod worker_pool;

#[cfg(test)]
mod testutils;

use changes::{CouchDb, FeedError, FeedOptions};
use config::ValidationError;
use dedup::DedupTracker;
use queue::{UploadReceiver, upload_queue};
use shared::admin_service::AdminService;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use subscriber::FeedSubscriber;
use tokio::net::TcpListener;
use tracker::TrackerClient;
use worker_pool::WorkerPool;

#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ValidationError),
    #[error("could not create tracker client: {0}")]
    TrackerClient(#[from] reqwest::Error),
    #[error("admin listener failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("change feed failed: {0}")]
    Feed(#[from] FeedError),
}

/// Relays telemetry from the change feed to the tracker.
///
/// Only returns on failure. The feed is never resumed: once it is lost the
/// caller is expected to exit and be restarted, starting again from the
/// database's then-current position. Uploads still queued at that point are
/// lost.
pub async fn run(config: config::Config) -> Result<(), RelayError> {
    config.validate()?;

    let dedup = Arc::new(DedupTracker::new(config.dedup_window));
    let (tx, rx) = upload_queue();
    let ready = Arc::new(AtomicBool::new(false));

    let tracker = TrackerClient::new(config.tracker.clone(), config.upload_timeout())?;
    let _pool = WorkerPool::spawn(config.workers, rx.clone(), Arc::new(tracker));

    if let Some(listener) = &config.admin_listener {
        let tcp = TcpListener::bind(format!("{}:{}", listener.host, listener.port)).await?;
        tracing::info!(host = %listener.host, port = listener.port, "admin listener bound");
        spawn_admin(tcp, ready.clone(), dedup.clone(), rx);
    }

    let couch = CouchDb::new(&config.couch_uri, &config.couch_db, config.heartbeat())?;
    let since = couch.update_seq().await?;
    let options = FeedOptions {
        filter: config.changes_filter.clone(),
        heartbeat: config.heartbeat(),
    };
    let mut feed = couch.changes(&since, &options).await?;

    tracing::info!(
        db = %config.couch_db,
        %since,
        filter = %options.filter,
        "subscribed to change feed"
    );
    ready.store(true, Ordering::Relaxed);

    let subscriber = FeedSubscriber::new(dedup, tx, config.tracker_password.clone());
    let result = subscriber.run(&mut feed).await;
    ready.store(false, Ordering::Relaxed);

    result.map_err(RelayError::from)
}

/// Serves the health, readiness and stats endpoints on `tcp`.
fn spawn_admin(
    tcp: TcpListener,
    ready: Arc<AtomicBool>,
    dedup: Arc<DedupTracker>,
    queue: UploadReceiver,
) {
    let service = AdminService::new(
        move || ready.load(Ordering::Relaxed),
        move || {
            serde_json::json!({
                "queue_depth": queue.depth(),
                "tracked_documents": dedup.len(),
            })
            .to_string()
        },
    );

    tokio::spawn(async move {
        if let Err(e) = shared::http::serve::<_, std::io::Error>(tcp, service).await {
            tracing::error!("admin listener stopped: {e}");
        }
    });
}
