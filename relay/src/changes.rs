use crate::document::{ChangeEvent, FeedLine};
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use url::Url;

/// A dead connection is detected after this many missed heartbeats.
const MISSED_HEARTBEATS: u32 = 10;

#[derive(thiserror::Error, Debug)]
pub enum FeedError {
    #[error("invalid database URL: {0}")]
    InvalidUrl(String),
    #[error("request to the document store failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("document store responded with {0}")]
    Status(reqwest::StatusCode),
    #[error("change feed closed by the document store (last_seq {0})")]
    Closed(Value),
}

#[derive(Deserialize)]
struct DatabaseInfo {
    update_seq: Value,
}

/// Options of the continuous `_changes` request.
#[derive(Clone, Debug)]
pub struct FeedOptions {
    /// Server-side filter, `design_doc/filter_name`.
    pub filter: String,
    pub heartbeat: Duration,
}

/// Client for a single CouchDB database.
pub struct CouchDb {
    client: reqwest::Client,
    db_url: Url,
}

impl CouchDb {
    pub fn new(couch_uri: &str, db: &str, heartbeat: Duration) -> Result<Self, FeedError> {
        let mut db_url =
            Url::parse(couch_uri).map_err(|e| FeedError::InvalidUrl(e.to_string()))?;
        db_url
            .path_segments_mut()
            .map_err(|_| FeedError::InvalidUrl(couch_uri.to_string()))?
            .pop_if_empty()
            .push(db);

        // No overall timeout: the feed stays open for the life of the process.
        let client = reqwest::Client::builder()
            .read_timeout(heartbeat * MISSED_HEARTBEATS)
            .build()?;

        Ok(CouchDb { client, db_url })
    }

    /// The database's current position in its change sequence.
    pub async fn update_seq(&self) -> Result<Value, FeedError> {
        let response = self.client.get(self.db_url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(FeedError::Status(response.status()));
        }

        Ok(response.json::<DatabaseInfo>().await?.update_seq)
    }

    /// Opens a continuous change feed starting after `since`.
    pub async fn changes(
        &self,
        since: &Value,
        options: &FeedOptions,
    ) -> Result<ChangesFeed, FeedError> {
        let mut url = self.db_url.clone();
        url.path_segments_mut()
            .map_err(|_| FeedError::InvalidUrl(self.db_url.to_string()))?
            .push("_changes");
        url.query_pairs_mut()
            .append_pair("feed", "continuous")
            .append_pair("include_docs", "true")
            .append_pair("filter", &options.filter)
            .append_pair("since", &seq_param(since))
            .append_pair("heartbeat", &options.heartbeat.as_millis().to_string());

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FeedError::Status(response.status()));
        }

        Ok(ChangesFeed {
            response,
            lines: LineBuffer::default(),
        })
    }
}

fn seq_param(seq: &Value) -> String {
    match seq {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// An open continuous change feed.
pub struct ChangesFeed {
    response: reqwest::Response,
    lines: LineBuffer,
}

impl ChangesFeed {
    /// Next change row, in the order the store sent them. Heartbeats are
    /// skipped. Fails once the store ends the feed or the connection drops.
    pub async fn next_change(&mut self) -> Result<ChangeEvent, FeedError> {
        loop {
            while let Some(line) = self.lines.next_line() {
                match serde_json::from_slice::<FeedLine>(&line) {
                    Ok(FeedLine::Change(change)) => return Ok(change),
                    Ok(FeedLine::End { last_seq }) => return Err(FeedError::Closed(last_seq)),
                    Err(e) => tracing::warn!(
                        line = %String::from_utf8_lossy(&line),
                        "skipping unparseable change feed line: {e}"
                    ),
                }
            }

            match self.response.chunk().await? {
                Some(chunk) => self.lines.extend(&chunk),
                None => return Err(FeedError::Closed(Value::Null)),
            }
        }
    }
}

/// Splits a byte stream into newline-terminated lines. Blank lines
/// (heartbeats) are dropped; an unterminated tail waits for the next chunk.
#[derive(Default)]
struct LineBuffer {
    partial: Vec<u8>,
    lines: VecDeque<Vec<u8>>,
}

impl LineBuffer {
    fn extend(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            if byte == b'\n' {
                let line = std::mem::take(&mut self.partial);
                if !line.trim_ascii().is_empty() {
                    self.lines.push_back(line);
                }
            } else {
                self.partial.push(byte);
            }
        }
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        self.lines.pop_front()
    }
}
