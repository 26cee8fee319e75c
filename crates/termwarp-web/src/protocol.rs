//! Wire format for transcript entries sent to observers.
//!
//! Every entry becomes one JSON object. Raw output is base64 encoded so that
//! arbitrary bytes (partial UTF-8, control sequences) survive the trip.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use termwarp_session::{EntryKind, TranscriptEntry};

/// Encoding label carried by `raw_output` events.
pub const BASE64_ENCODING: &str = "base64";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    RemoteInput,
    Error,
}

/// One event as seen by an observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireEvent {
    RawOutput {
        seq: u64,
        encoding: String,
        content: String,
        timestamp: DateTime<Utc>,
    },
    StructuredMessage {
        seq: u64,
        #[serde(rename = "type")]
        message_type: MessageType,
        content: String,
        timestamp: DateTime<Utc>,
    },
}

impl WireEvent {
    pub fn seq(&self) -> u64 {
        match self {
            WireEvent::RawOutput { seq, .. } | WireEvent::StructuredMessage { seq, .. } => *seq,
        }
    }

    /// The payload as bytes: base64-decoded for raw output, UTF-8 otherwise.
    pub fn content_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        match self {
            WireEvent::RawOutput { content, .. } => B64.decode(content),
            WireEvent::StructuredMessage { content, .. } => Ok(content.as_bytes().to_vec()),
        }
    }

    pub fn to_json(&self) -> String {
        // Only strings, integers and timestamps; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<&TranscriptEntry> for WireEvent {
    fn from(entry: &TranscriptEntry) -> Self {
        let bytes = entry.payload.as_bytes();
        match entry.kind {
            EntryKind::RawOutput => WireEvent::RawOutput {
                seq: entry.seq,
                encoding: BASE64_ENCODING.to_string(),
                content: B64.encode(bytes),
                timestamp: entry.timestamp,
            },
            EntryKind::RemoteInput | EntryKind::Error => WireEvent::StructuredMessage {
                seq: entry.seq,
                message_type: if entry.kind == EntryKind::RemoteInput {
                    MessageType::RemoteInput
                } else {
                    MessageType::Error
                },
                content: String::from_utf8_lossy(bytes).into_owned(),
                timestamp: entry.timestamp,
            },
        }
    }
}

/// Body of `POST /api/input`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRequest {
    pub input: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use termwarp_session::Payload;

    fn entry(seq: u64, kind: EntryKind, payload: Payload) -> TranscriptEntry {
        TranscriptEntry {
            seq,
            kind,
            payload,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn raw_output_roundtrips_bytes() {
        let bytes = b"\x1b[1mbold\x1b[0m\xff\xe2".to_vec();
        let event = WireEvent::from(&entry(3, EntryKind::RawOutput, Payload::Bytes(bytes.clone())));

        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(json["kind"], "raw_output");
        assert_eq!(json["encoding"], "base64");
        assert_eq!(json["seq"], 3);

        let parsed: WireEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.content_bytes().unwrap(), bytes);
    }

    #[test]
    fn remote_input_is_structured_message() {
        let event = WireEvent::from(&entry(
            0,
            EntryKind::RemoteInput,
            Payload::Text("ls".into()),
        ));
        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(json["kind"], "structured_message");
        assert_eq!(json["type"], "remote_input");
        assert_eq!(json["content"], "ls");
    }

    #[test]
    fn error_entry_type() {
        let event = WireEvent::from(&entry(1, EntryKind::Error, Payload::Text("boom".into())));
        assert!(matches!(
            event,
            WireEvent::StructuredMessage {
                message_type: MessageType::Error,
                ..
            }
        ));
        assert_eq!(event.seq(), 1);
    }

    #[test]
    fn input_request_parses() {
        let req: InputRequest = serde_json::from_str(r#"{"input":"pwd"}"#).unwrap();
        assert_eq!(req.input, "pwd");
    }
}
