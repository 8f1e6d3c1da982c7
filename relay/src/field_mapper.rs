//! Translation of telemetry `data` objects into tracker query parameters.

use crate::document::DocumentType;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

pub type Params = BTreeMap<String, String>;

/// (tracker parameter, telemetry field)
const PAYLOAD_FIELDS: &[(&str, &str)] = &[
    ("vehicle", "payload"),
    ("lat", "latitude"),
    ("lon", "longitude"),
    ("alt", "altitude"),
    ("heading", "heading"),
    ("speed", "speed"),
    ("temp_inside", "temperature_internal"),
    ("seq", "sentence_id"),
];

const LISTENER_FIELDS: &[(&str, &str)] = &[
    ("vehicle", "callsign"),
    ("lat", "latitude"),
    ("lon", "longitude"),
    ("alt", "altitude"),
    ("speed", "speed"),
];

const TIME_FIELD: &str = "time";

/// Builds the tracker parameters for one telemetry `data` object.
///
/// Renamed fields that are absent from `data` are left out. `time` is added
/// when `data.time` carries integer hour, minute and second. For payload
/// telemetry every other public field is bundled as JSON under `data`.
pub fn map_fields(doc_type: DocumentType, data: &Map<String, Value>) -> Params {
    let fields = match doc_type {
        DocumentType::PayloadTelemetry => PAYLOAD_FIELDS,
        DocumentType::ListenerTelemetry => LISTENER_FIELDS,
    };

    let mut params = Params::new();

    for (target, source) in fields {
        if let Some(value) = data.get(*source) {
            params.insert(target.to_string(), param_value(value));
        }
    }

    if let Some(time) = format_time(data) {
        params.insert(TIME_FIELD.to_string(), time);
    }

    if doc_type == DocumentType::PayloadTelemetry {
        params.insert("data".to_string(), leftover_data(data, fields));
    }

    params
}

/// `HHMMSS`, zero padded.
fn format_time(data: &Map<String, Value>) -> Option<String> {
    let time = data.get(TIME_FIELD)?.as_object()?;
    let hour = time.get("hour")?.as_i64()?;
    let minute = time.get("minute")?.as_i64()?;
    let second = time.get("second")?.as_i64()?;

    Some(format!("{hour:02}{minute:02}{second:02}"))
}

fn leftover_data(data: &Map<String, Value>, fields: &[(&str, &str)]) -> String {
    let used: HashSet<&str> = fields
        .iter()
        .map(|(_, source)| *source)
        .chain([TIME_FIELD])
        .collect();

    let unused: Map<String, Value> = data
        .iter()
        .filter(|(key, _)| !used.contains(key.as_str()) && !key.starts_with('_'))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Value::Object(unused).to_string()
}

fn param_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_payload_fields() {
        let data = object(json!({
            "payload": "AURORA",
            "latitude": 52.2135,
            "longitude": 0.0964,
            "altitude": 12050,
            "sentence_id": 231,
            "temperature_internal": -12.5,
            "time": {"hour": 1, "minute": 2, "second": 3},
        }));

        let params = map_fields(DocumentType::PayloadTelemetry, &data);

        assert_eq!(params["vehicle"], "AURORA");
        assert_eq!(params["lat"], "52.2135");
        assert_eq!(params["lon"], "0.0964");
        assert_eq!(params["alt"], "12050");
        assert_eq!(params["seq"], "231");
        assert_eq!(params["temp_inside"], "-12.5");
        assert_eq!(params["time"], "010203");
        assert_eq!(params["data"], "{}");
        // Missing sources are omitted, not defaulted
        assert!(!params.contains_key("heading"));
        assert!(!params.contains_key("speed"));
    }

    #[test]
    fn test_leftover_data_bundle() {
        let data = object(json!({
            "payload": "AURORA",
            "battery": 3.7,
            "satellites": 8,
            "_sentence": "$$AURORA,231,...",
            "_parsed": true,
            "time": {"hour": 10, "minute": 20, "second": 30},
        }));

        let params = map_fields(DocumentType::PayloadTelemetry, &data);
        let bundled: Value = serde_json::from_str(&params["data"]).unwrap();

        assert_eq!(bundled, json!({"battery": 3.7, "satellites": 8}));
    }

    #[test]
    fn test_time_formatting() {
        let data = object(json!({"time": {"hour": 23, "minute": 5, "second": 0}}));
        let params = map_fields(DocumentType::ListenerTelemetry, &data);
        assert_eq!(params["time"], "230500");

        // Any missing or non-integer component omits the parameter
        for time in [
            json!({"hour": 1, "minute": 2}),
            json!({"hour": 1, "minute": 2, "second": "3"}),
            json!("01:02:03"),
        ] {
            let data = object(json!({ "time": time }));
            let params = map_fields(DocumentType::ListenerTelemetry, &data);
            assert!(!params.contains_key("time"));
        }
    }

    #[test]
    fn test_listener_fields() {
        let data = object(json!({
            "callsign": "chase-car-1",
            "latitude": 51.5,
            "longitude": -0.12,
            "altitude": 30,
            "speed": 12.0,
            "radio": "FT-817",
        }));

        let params = map_fields(DocumentType::ListenerTelemetry, &data);

        assert_eq!(params["vehicle"], "chase-car-1");
        assert_eq!(params["lat"], "51.5");
        assert_eq!(params["lon"], "-0.12");
        assert_eq!(params["alt"], "30");
        assert_eq!(params["speed"], "12.0");
        // Listener telemetry carries no bundled data
        assert!(!params.contains_key("data"));
        assert!(!params.contains_key("radio"));
    }

    #[test]
    fn test_param_values() {
        assert_eq!(param_value(&json!("text")), "text");
        assert_eq!(param_value(&json!(null)), "");
        assert_eq!(param_value(&json!(true)), "true");
        assert_eq!(param_value(&json!([1, 2])), "[1,2]");
    }
}
