//! Record decoding: one binary-format record envelope → [`LogEvent`].
//!
//! The value of a log record is base64 text wrapping a UTF-8 JSON object
//! `{"level": .., "component": .., "msg": .., "ts": ..}`. `ts` is optional
//! and only used when it is a number of seconds since the epoch.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ctlpanel_broker::RecordEnvelope;
use serde::Deserialize;

use crate::error::DecodeError;
use crate::event::{LogEvent, Severity};

#[derive(Debug, Deserialize)]
struct LogPayload {
    level: String,
    component: String,
    msg: String,
    #[serde(default)]
    ts: Option<serde_json::Value>,
}

/// Decode one record envelope into a log event.
pub fn decode_record(record: &RecordEnvelope) -> Result<LogEvent, DecodeError> {
    let value = record.value.as_deref().ok_or(DecodeError::MissingValue)?;
    let bytes = STANDARD
        .decode(value.trim())
        .map_err(|e| DecodeError::Base64(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|e| DecodeError::Utf8(e.to_string()))?;
    decode_payload(&text)
}

/// Parse the textual payload of a log record.
pub fn decode_payload(text: &str) -> Result<LogEvent, DecodeError> {
    let payload: LogPayload =
        serde_json::from_str(text).map_err(|e| DecodeError::Payload(e.to_string()))?;

    Ok(LogEvent {
        level: Severity::from(payload.level.as_str()),
        component: payload.component,
        message: payload.msg,
        emitted_at: payload.ts.as_ref().and_then(timestamp_from_json),
    })
}

fn timestamp_from_json(ts: &serde_json::Value) -> Option<DateTime<Utc>> {
    let secs = ts.as_f64()?;
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
}
