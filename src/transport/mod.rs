//! Collaborator interface for the real-time media transport.
//!
//! The transport owns session join/leave, track publication, and delivery of
//! out-of-band data frames and remote audio tracks. It is not implemented
//! here; the client core only consumes this contract. Reconnection, backoff,
//! and device management belong to the adapter implementation.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by a transport adapter.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Joining the media session failed. Fatal for the session; the caller
    /// must not proceed to publish tracks.
    #[error("failed to join channel: {0}")]
    JoinFailed(String),

    /// Publishing local tracks failed.
    #[error("failed to publish local tracks: {0}")]
    PublishFailed(String),

    /// An operation was attempted before a successful join.
    #[error("not connected")]
    NotConnected,

    /// Adapter-specific failure.
    #[error("transport error: {0}")]
    Adapter(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// A remote participant's audio track, as far as the client core needs it:
/// an instantaneous volume level for liveness polling.
pub trait RemoteAudioTrack: Send + Sync {
    /// Instantaneous volume level, 0.0 (silent) to 1.0 (full scale).
    fn level(&self) -> f32;
}

/// Which local tracks to publish after joining.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTracks {
    /// Publish the local microphone track.
    pub audio: bool,
    /// Publish the local camera track.
    pub video: bool,
}

/// Callback invoked once per received out-of-band data frame.
pub type RawFrameCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback invoked when the remote audio track appears, changes, or goes
/// away (`None`).
pub type RemoteTrackCallback = Arc<dyn Fn(Option<Arc<dyn RemoteAudioTrack>>) + Send + Sync>;

/// Contract a media transport implementation must provide.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    /// Join the media session identified by `channel` as `participant_uid`.
    async fn join(&self, channel: &str, participant_uid: u64) -> TransportResult<()>;

    /// Leave the media session.
    async fn leave(&self) -> TransportResult<()>;

    /// Publish local tracks. Only valid after a successful [`join`].
    ///
    /// [`join`]: TransportAdapter::join
    async fn publish(&self, tracks: LocalTracks) -> TransportResult<()>;

    /// Register the raw-frame callback. The adapter invokes it once per
    /// received out-of-band frame, from within the runtime.
    fn on_raw_frame(&self, callback: RawFrameCallback);

    /// Register the remote-track-changed callback.
    fn on_remote_track(&self, callback: RemoteTrackCallback);
}
