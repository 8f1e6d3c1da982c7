use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

pub type Callsign = String;

/// One row of the store's change feed.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ChangeEvent {
    /// Opaque sequence marker. CouchDB 1.x sends integers, later versions strings.
    pub seq: Value,
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
    #[serde(default)]
    pub deleted: bool,
}

impl ChangeEvent {
    pub fn doc_type(&self) -> Option<&str> {
        self.doc.as_ref()?.get("type")?.as_str()
    }
}

/// A single line of a continuous change feed. Empty lines are heartbeats and
/// never reach the parser.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FeedLine {
    Change(ChangeEvent),
    End { last_seq: Value },
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    PayloadTelemetry,
    ListenerTelemetry,
}

impl DocumentType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "payload_telemetry" => Some(DocumentType::PayloadTelemetry),
            "listener_telemetry" => Some(DocumentType::ListenerTelemetry),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentType::PayloadTelemetry => "payload_telemetry",
            DocumentType::ListenerTelemetry => "listener_telemetry",
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DocumentError {
    #[error("document has no data")]
    MissingData,
    #[error("document data is not an object")]
    DataNotObject,
    #[error("payload telemetry has no receivers object")]
    MissingReceivers,
    #[error("listener telemetry has no callsign")]
    MissingCallsign,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PayloadTelemetry {
    pub id: String,
    pub data: Map<String, Value>,
    pub receivers: BTreeSet<Callsign>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListenerTelemetry {
    pub callsign: Callsign,
    pub data: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TelemetryDocument {
    Payload(PayloadTelemetry),
    Listener(ListenerTelemetry),
}

impl TelemetryDocument {
    /// Classifies a change. Returns `Ok(None)` for rows the relay does not
    /// care about: deleted documents and other document types.
    pub fn from_change(change: &ChangeEvent) -> Result<Option<Self>, DocumentError> {
        let Some(doc) = change.doc.as_ref().filter(|_| !change.deleted) else {
            return Ok(None);
        };
        let Some(doc_type) = change.doc_type().and_then(DocumentType::from_tag) else {
            return Ok(None);
        };

        let data = match doc.get("data") {
            None => return Err(DocumentError::MissingData),
            Some(Value::Object(data)) => data.clone(),
            Some(_) => return Err(DocumentError::DataNotObject),
        };

        let document = match doc_type {
            DocumentType::PayloadTelemetry => {
                let receivers = doc
                    .get("receivers")
                    .and_then(Value::as_object)
                    .ok_or(DocumentError::MissingReceivers)?
                    .keys()
                    .cloned()
                    .collect();
                let id = doc
                    .get("_id")
                    .and_then(Value::as_str)
                    .unwrap_or(&change.id)
                    .to_string();

                TelemetryDocument::Payload(PayloadTelemetry { id, data, receivers })
            }
            DocumentType::ListenerTelemetry => {
                let callsign = data
                    .get("callsign")
                    .and_then(Value::as_str)
                    .ok_or(DocumentError::MissingCallsign)?
                    .to_string();

                TelemetryDocument::Listener(ListenerTelemetry { callsign, data })
            }
        };

        Ok(Some(document))
    }
}
