//! Decoded payload schema and message classification.
//!
//! After all fragments of a message are concatenated and base64-decoded, the
//! result is a UTF-8 JSON document matching [`StreamPayload`]. A payload whose
//! `data_type` is `"raw"` carries a second JSON document inside its `text`
//! field (the [`RawEnvelope`]) that reclassifies the message as an image or a
//! reasoning trace.

use serde::Deserialize;
use tracing::debug;

use crate::core::types::{ChatMessage, MessageKind, MessageOrigin};

/// `data_type` value that marks a payload as carrying a raw envelope.
const DATA_TYPE_RAW: &str = "raw";

/// Raw envelope `type` for image messages.
const RAW_TYPE_IMAGE_URL: &str = "image_url";

/// Raw envelope `type` for reasoning traces.
const RAW_TYPE_REASONING: &str = "reasoning";

/// Stream id as it appears on the wire: either a JSON string or a number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StreamId {
    /// Numeric form.
    Number(u64),
    /// String form.
    Text(String),
}

impl StreamId {
    /// Numeric value of the id, if it has one.
    pub fn as_uid(&self) -> Option<u64> {
        match self {
            StreamId::Number(n) => Some(*n),
            StreamId::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Wire representation, for the emitted `participant_id` field.
    pub fn to_wire_string(&self) -> String {
        match self {
            StreamId::Number(n) => n.to_string(),
            StreamId::Text(s) => s.clone(),
        }
    }
}

/// The decoded message payload.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamPayload {
    /// Id of the sending participant's stream.
    pub stream_id: StreamId,
    /// Whether the sender marked this item final.
    pub is_final: bool,
    /// Message body, or a serialized [`RawEnvelope`] when `data_type` is raw.
    pub text: String,
    /// Sender-side timestamp in epoch milliseconds.
    pub text_ts: i64,
    /// Optional payload subtype marker.
    #[serde(default)]
    pub data_type: Option<String>,
}

/// Secondary document carried in `text` when `data_type == "raw"`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnvelope {
    /// Envelope body.
    pub data: RawData,
    /// Envelope discriminator: `"image_url"` or `"reasoning"`.
    #[serde(rename = "type")]
    pub envelope_type: String,
}

/// Body of a raw envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawData {
    /// Image URL, present for `image_url` envelopes.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Reasoning text, present for `reasoning` envelopes.
    #[serde(default)]
    pub text: Option<String>,
}

/// Classify a decoded payload into a [`ChatMessage`].
///
/// Returns `None` when the final text is empty after trimming (heartbeat and
/// keep-alive payloads are suppressed rather than surfaced as blank lines).
///
/// Classification failures in the raw envelope are logged and fall back to
/// the original `Text` classification with the undecoded text; a message is
/// never dropped at this stage.
pub fn classify(payload: StreamPayload, local_participant_uid: u64) -> Option<ChatMessage> {
    let origin = if payload.stream_id.as_uid() == Some(local_participant_uid) {
        MessageOrigin::User
    } else {
        MessageOrigin::Agent
    };

    let (kind, text) = match payload.data_type.as_deref() {
        Some(DATA_TYPE_RAW) => classify_raw(&payload.text),
        _ => (MessageKind::Text, payload.text.clone()),
    };

    if text.trim().is_empty() {
        debug!(
            participant = %payload.stream_id.to_wire_string(),
            "suppressing empty message payload"
        );
        return None;
    }

    Some(ChatMessage {
        origin,
        kind,
        text,
        timestamp: payload.text_ts,
        participant_id: payload.stream_id.to_wire_string(),
        is_final: payload.is_final,
    })
}

/// Parse the raw envelope out of `text`, falling back to plain text when the
/// envelope is missing a recognized type or does not parse at all.
fn classify_raw(text: &str) -> (MessageKind, String) {
    let envelope: RawEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            debug!(error = %err, "raw envelope did not parse; keeping text classification");
            return (MessageKind::Text, text.to_string());
        }
    };

    match envelope.envelope_type.as_str() {
        RAW_TYPE_IMAGE_URL => match envelope.data.image_url {
            Some(url) => (MessageKind::Image, url),
            None => {
                debug!("image_url envelope missing data.image_url; keeping text classification");
                (MessageKind::Text, text.to_string())
            }
        },
        RAW_TYPE_REASONING => match envelope.data.text {
            Some(reasoning) => (MessageKind::Reasoning, reasoning),
            None => {
                debug!("reasoning envelope missing data.text; keeping text classification");
                (MessageKind::Text, text.to_string())
            }
        },
        other => {
            debug!(envelope_type = other, "unrecognized raw envelope type");
            (MessageKind::Text, text.to_string())
        }
    }
}
