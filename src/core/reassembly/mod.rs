//! Chunked message reassembly for the out-of-band data channel.
//!
//! Application-level messages (transcript lines, images, reasoning traces)
//! arrive as pipe-delimited frames, each carrying one slice of a larger
//! base64 payload. The [`ChunkReassembler`] buffers fragments per message id,
//! detects completion against the announced part count, decodes and
//! classifies the payload, and emits a [`ChatMessage`] onto the session bus.
//!
//! Memory stays bounded through timeout-based eviction: every pending message
//! arms a one-shot eviction task when its first fragment arrives. The task is
//! never cancelled on completion; it is an idempotent check-then-act that
//! treats an already-removed entry as success.
//!
//! [`ChatMessage`]: crate::core::types::ChatMessage

mod frame;
mod payload;


pub use frame::{parse_frame, FrameError, FrameFragment, UNKNOWN_TOTAL_PARTS};
pub use payload::{classify, RawData, RawEnvelope, StreamId, StreamPayload};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::core::bus::{EventBus, SessionEvent};

/// Length of the payload sample included in decode-failure logs.
const DECODE_FAILURE_SAMPLE_LEN: usize = 48;

/// Cap on the fragment buffer preallocation. The announced part count is a
/// wire value; it sizes the completion check, never an allocation.
const FRAGMENT_PREALLOC_CAP: usize = 64;

fn default_eviction_timeout_ms() -> u64 {
    5000
}

/// Configuration for the chunk reassembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassemblyConfig {
    /// How long a partial message may sit in the buffer before its fragments
    /// are discarded (milliseconds). Default: 5000ms.
    #[serde(default = "default_eviction_timeout_ms")]
    pub eviction_timeout_ms: u64,
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            eviction_timeout_ms: default_eviction_timeout_ms(),
        }
    }
}

impl ReassemblyConfig {
    /// Eviction timeout as a [`Duration`].
    pub fn eviction_timeout(&self) -> Duration {
        Duration::from_millis(self.eviction_timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.eviction_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "reassembly.eviction_timeout_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Fragments collected so far for one in-flight message.
#[derive(Debug)]
struct PendingMessage {
    total_parts: u32,
    fragments: Vec<FrameFragment>,
    created_at: Instant,
}

impl PendingMessage {
    fn new(total_parts: u32, created_at: Instant) -> Self {
        Self {
            total_parts,
            fragments: Vec::with_capacity((total_parts as usize).min(FRAGMENT_PREALLOC_CAP)),
            created_at,
        }
    }

    fn is_complete(&self) -> bool {
        self.fragments.len() as u32 >= self.total_parts
    }
}

/// Reassembles fragmented data-channel frames into chat messages.
///
/// One instance per session; the pending-message table is owned here and
/// lives exactly as long as the reassembler.
pub struct ChunkReassembler {
    pending: Arc<DashMap<String, PendingMessage>>,
    bus: Arc<EventBus>,
    local_participant_uid: u64,
    eviction_timeout: Duration,
}

impl ChunkReassembler {
    /// Create a reassembler emitting onto `bus`.
    ///
    /// `local_participant_uid` drives origin attribution: a decoded payload
    /// whose stream id matches it numerically is classified as user-origin,
    /// everything else as agent-origin.
    pub fn new(bus: Arc<EventBus>, local_participant_uid: u64, config: ReassemblyConfig) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            bus,
            local_participant_uid,
            eviction_timeout: config.eviction_timeout(),
        }
    }

    /// Ingest one raw frame from the data channel.
    ///
    /// Side effect is zero or one [`SessionEvent::Chat`] emission. Every
    /// failure mode (malformed frame, unknown-total sentinel, decode failure)
    /// is logged and dropped; nothing here retries or surfaces a user-visible
    /// error.
    ///
    /// Must be called from within a tokio runtime: the first fragment of each
    /// message spawns its eviction task.
    pub fn ingest(&self, raw_frame: &str) {
        let fragment = match parse_frame(raw_frame) {
            Ok(fragment) => fragment,
            Err(err @ FrameError::UnknownTotalParts { .. }) => {
                warn!(error = %err, "dropping frame");
                return;
            }
            Err(err) => {
                warn!(error = %err, frame_len = raw_frame.len(), "dropping frame");
                return;
            }
        };

        let message_id = fragment.message_id.clone();
        let now = Instant::now();
        let mut armed_at: Option<Instant> = None;

        let ready = {
            let mut entry = self
                .pending
                .entry(message_id.clone())
                .or_insert_with(|| {
                    armed_at = Some(now);
                    PendingMessage::new(fragment.total_parts, now)
                });
            if entry.total_parts != fragment.total_parts {
                // total_parts is immutable once known; first-seen value wins.
                debug!(
                    message_id = %message_id,
                    known = entry.total_parts,
                    got = fragment.total_parts,
                    "ignoring conflicting total_parts"
                );
            }
            entry.fragments.push(fragment);
            entry.is_complete()
        };

        if let Some(created_at) = armed_at {
            self.arm_eviction(message_id.clone(), created_at);
        }

        if ready {
            if let Some((_, pending)) = self.pending.remove(&message_id) {
                self.finish(&message_id, pending);
            }
        }
    }

    /// Number of messages currently buffered awaiting completion.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Arm the one-shot eviction task for a newly created entry.
    ///
    /// The task never assumes the entry still exists. The `created_at` guard
    /// also keeps it from evicting a newer entry that reused the same id
    /// after the original completed or was purged.
    fn arm_eviction(&self, message_id: String, created_at: Instant) {
        let pending = Arc::clone(&self.pending);
        let deadline = created_at + self.eviction_timeout;
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let removed = pending.remove_if(&message_id, |_, entry| {
                entry.created_at == created_at && !entry.is_complete()
            });
            if let Some((id, entry)) = removed {
                warn!(
                    message_id = %id,
                    collected = entry.fragments.len(),
                    total = entry.total_parts,
                    "discarding incomplete message after eviction timeout"
                );
            }
        });
    }

    /// Decode a completed message and emit it, if it survives the gates.
    fn finish(&self, message_id: &str, mut pending: PendingMessage) {
        pending.fragments.sort_by_key(|fragment| fragment.part_index);
        let encoded: String = pending
            .fragments
            .iter()
            .map(|fragment| fragment.content.as_str())
            .collect();

        let bytes = match BASE64.decode(&encoded) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(
                    message_id = %message_id,
                    error = %err,
                    sample = %payload_sample(&encoded),
                    "discarding message: base64 decode failed"
                );
                return;
            }
        };

        let json = match String::from_utf8(bytes) {
            Ok(json) => json,
            Err(err) => {
                warn!(
                    message_id = %message_id,
                    error = %err,
                    sample = %payload_sample(&encoded),
                    "discarding message: payload is not valid UTF-8"
                );
                return;
            }
        };

        let payload: StreamPayload = match serde_json::from_str(&json) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    message_id = %message_id,
                    error = %err,
                    sample = %payload_sample(&json),
                    "discarding message: payload JSON did not parse"
                );
                return;
            }
        };

        match classify(payload, self.local_participant_uid) {
            Some(message) => {
                debug!(
                    message_id = %message_id,
                    origin = %message.origin,
                    kind = %message.kind,
                    is_final = message.is_final,
                    "emitting reassembled message"
                );
                self.bus.emit(SessionEvent::Chat(message));
            }
            None => {
                debug!(message_id = %message_id, "reassembled message suppressed by emission gate");
            }
        }
    }
}

/// Truncated payload excerpt for diagnostics.
fn payload_sample(payload: &str) -> &str {
    match payload.char_indices().nth(DECODE_FAILURE_SAMPLE_LEN) {
        Some((idx, _)) => &payload[..idx],
        None => payload,
    }
}
