use super::LogRecord;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("event payload is not JSON: {0}")]
    NotJson(String),

    #[error("event payload is not a JSON object")]
    NotObject,

    #[error("event has no `{0}` field")]
    MissingField(&'static str),

    #[error("event field `{0}` has an unexpected type")]
    WrongType(&'static str),
}

/// Where a decoded record's `timestamp` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    /// Stamped by the emitter and carried in the payload.
    Payload,
    /// The store's receipt time, substituted because the payload had none.
    Store,
}

/// Decode one stored event payload into a [`LogRecord`].
///
/// `store_timestamp` is the store's receipt time and is only used when the
/// payload carries no `timestamp` of its own. Legacy `buildId` / `nodeId` keys are
/// accepted when the current keys are absent.
pub fn decode_event(payload: &str, store_timestamp: Option<i64>) -> Result<LogRecord, DecodeError> {
    decode_stamped(payload, store_timestamp).map(|(record, _)| record)
}

/// Like [`decode_event`], also reporting whether the timestamp is the
/// emitter's own or a store fallback.
pub fn decode_stamped(
    payload: &str,
    store_timestamp: Option<i64>,
) -> Result<(LogRecord, TimestampSource), DecodeError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| DecodeError::NotJson(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(DecodeError::NotObject);
    };

    let message = match fields.get("message") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(DecodeError::WrongType("message")),
        None => return Err(DecodeError::MissingField("message")),
    };

    let build = id_field(&fields, "build", "buildId")?.ok_or(DecodeError::MissingField("build"))?;
    let node = id_field(&fields, "node", "nodeId")?;

    let sender = match fields.get("sender") {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    };

    let (timestamp, source) = match fields.get("timestamp") {
        None | Some(Value::Null) => {
            let ts = store_timestamp.ok_or(DecodeError::MissingField("timestamp"))?;
            (ts, TimestampSource::Store)
        }
        Some(v) => {
            let ts = epoch_millis(v).ok_or(DecodeError::WrongType("timestamp"))?;
            (ts, TimestampSource::Payload)
        }
    };

    let record = LogRecord {
        build,
        node,
        message,
        sender,
        timestamp,
    };
    Ok((record, source))
}

/// Integers as-is; integral floats and decimal strings are coerced.
fn epoch_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Ids may arrive as strings or bare numbers depending on who shipped them.
fn id_field(
    fields: &Map<String, Value>,
    key: &'static str,
    legacy: &'static str,
) -> Result<Option<String>, DecodeError> {
    match fields.get(key).or_else(|| fields.get(legacy)) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(DecodeError::WrongType(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_record() {
        let rec = decode_event(
            r#"{"build":"42","node":"3","message":"echo hi","sender":"h:1","timestamp":1700000000123}"#,
            Some(1700000000000),
        )
        .unwrap();
        assert_eq!(rec.build, "42");
        assert_eq!(rec.node.as_deref(), Some("3"));
        assert_eq!(rec.message, "echo hi");
        assert_eq!(rec.sender.as_deref(), Some("h:1"));
        assert_eq!(rec.timestamp, 1700000000123);
    }

    #[test]
    fn test_decode_falls_back_to_store_timestamp() {
        let rec = decode_event(r#"{"build":"42","message":"x"}"#, Some(99)).unwrap();
        assert_eq!(rec.timestamp, 99);
    }

    #[test]
    fn test_decode_without_any_timestamp_fails() {
        let err = decode_event(r#"{"build":"42","message":"x"}"#, None).unwrap_err();
        assert_eq!(err, DecodeError::MissingField("timestamp"));
    }

    #[test]
    fn test_decode_reports_timestamp_source() {
        let (_, source) = decode_stamped(r#"{"build":"42","message":"x","timestamp":7}"#, Some(99)).unwrap();
        assert_eq!(source, TimestampSource::Payload);

        let (rec, source) = decode_stamped(r#"{"build":"42","message":"x"}"#, Some(99)).unwrap();
        assert_eq!(source, TimestampSource::Store);
        assert_eq!(rec.timestamp, 99);

        let (_, source) = decode_stamped(r#"{"build":"42","message":"x","timestamp":null}"#, Some(99)).unwrap();
        assert_eq!(source, TimestampSource::Store);
    }

    #[test]
    fn test_decode_coerces_string_and_integral_float_timestamps() {
        let rec = decode_event(r#"{"build":"42","message":"x","timestamp":"1500"}"#, None).unwrap();
        assert_eq!(rec.timestamp, 1500);
        let rec = decode_event(r#"{"build":"42","message":"x","timestamp":1500.0}"#, None).unwrap();
        assert_eq!(rec.timestamp, 1500);

        for bad in [r#""soon""#, "1500.5", "true", "[1]"] {
            let payload = format!(r#"{{"build":"42","message":"x","timestamp":{}}}"#, bad);
            assert_eq!(
                decode_event(&payload, Some(1)).unwrap_err(),
                DecodeError::WrongType("timestamp"),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_decode_missing_message() {
        let err = decode_event(r#"{"build":"42","timestamp":5}"#, None).unwrap_err();
        assert_eq!(err, DecodeError::MissingField("message"));
    }

    #[test]
    fn test_decode_legacy_keys_and_numeric_build() {
        let rec = decode_event(r#"{"buildId":42,"nodeId":"7","message":"m","timestamp":5}"#, None)
            .unwrap();
        assert_eq!(rec.build, "42");
        assert_eq!(rec.node.as_deref(), Some("7"));
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert_eq!(decode_event("[1,2]", None).unwrap_err(), DecodeError::NotObject);
        assert!(matches!(decode_event("not json", None), Err(DecodeError::NotJson(_))));
    }

    #[test]
    fn test_decode_null_node_is_build_level() {
        let rec = decode_event(r#"{"build":"1","node":null,"message":"m","timestamp":5}"#, None)
            .unwrap();
        assert!(rec.node.is_none());
    }
}
