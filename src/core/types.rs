//! Shared record types emitted by the client core.
//!
//! These are the UI-facing shapes: a [`ChatMessage`] for every fully
//! reassembled transcript item, and a [`LivenessUpdate`] for every
//! speaking-state transition. Both travel over the session [`EventBus`].
//!
//! [`EventBus`]: crate::core::bus::EventBus

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageOrigin {
    /// The local human participant.
    User,
    /// The remote AI agent.
    Agent,
}

impl fmt::Display for MessageOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageOrigin::User => write!(f, "user"),
            MessageOrigin::Agent => write!(f, "agent"),
        }
    }
}

/// What a chat message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain transcript text.
    Text,
    /// An image reference; `text` holds the image URL.
    Image,
    /// A reasoning trace from the agent.
    Reasoning,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Text => write!(f, "text"),
            MessageKind::Image => write!(f, "image"),
            MessageKind::Reasoning => write!(f, "reasoning"),
        }
    }
}

/// A fully reassembled, classified transcript item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Whether the message came from the local user or the remote agent.
    pub origin: MessageOrigin,
    /// Content classification (text, image URL, reasoning trace).
    pub kind: MessageKind,
    /// The message body. For `Image` this is the image URL.
    pub text: String,
    /// Sender-side timestamp in epoch milliseconds.
    pub timestamp: i64,
    /// Stream id of the sending participant, as received on the wire.
    pub participant_id: String,
    /// Whether the sender marked this item final (vs. an in-progress partial).
    pub is_final: bool,
}

/// A speaking-state transition from the liveness detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LivenessUpdate {
    /// Whether the tracked participant is currently producing audible speech.
    pub active: bool,
    /// The most recent volume sample observed (0.0 to 1.0).
    pub volume: f32,
}
