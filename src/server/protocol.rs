//! WebSocket framing of session events.
//!
//! Text frames carry JSON envelopes `{"event": ..., "data": ...}`. Results
//! travel as binary frames holding one encoded result, with no envelope.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::PropertyMap;
use crate::pipeline::Outbound;

/// Inbound session events. Disconnect is the socket closing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Start analysis with the named analyzer.
    StartAnalysis(String),
    /// Update analyzer properties; `null` values are skipped.
    SetProperties(PropertyMap),
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    event: &'a str,
    data: Value,
}

/// Parse one text frame.
pub fn parse_event(text: &str) -> serde_json::Result<ClientEvent> {
    serde_json::from_str(text)
}

/// Frame an outbound payload.
pub fn to_message(outbound: Outbound) -> Message {
    let event = outbound.event_name();
    let data = match outbound {
        Outbound::Results(frame) => return Message::Binary(frame.to_vec()),
        Outbound::Properties(properties) => Value::Object(properties),
        Outbound::InternalError(text) => Value::String(text),
    };

    // Serializing a `Value` cannot fail.
    let text = serde_json::to_string(&Envelope { event, data }).unwrap_or_default();
    Message::Text(text)
}
