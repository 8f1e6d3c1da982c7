use crate::queue::UploadJob;
use async_trait::async_trait;
use std::time::Duration;

/// Placeholder in the tracker URL template replaced by the query string.
pub const QUERY_PLACEHOLDER: &str = "{}";

#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    #[error("tracker request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("tracker responded with {0}")]
    Status(reqwest::StatusCode),
}

/// Delivers one job to the tracker.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, job: &UploadJob) -> Result<(), UploadError>;
}

/// Fire-and-forget GET against the tracker; the response body is ignored.
pub struct TrackerClient {
    client: reqwest::Client,
    template: String,
}

impl TrackerClient {
    pub fn new(template: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(TrackerClient { client, template })
    }

    pub fn url_for(&self, job: &UploadJob) -> String {
        self.template
            .replacen(QUERY_PLACEHOLDER, &job.query_string(), 1)
    }
}

#[async_trait]
impl Uploader for TrackerClient {
    async fn upload(&self, job: &UploadJob) -> Result<(), UploadError> {
        let url = self.url_for(job);
        tracing::debug!(%url, "uploading to tracker");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status(status));
        }

        Ok(())
    }
}
