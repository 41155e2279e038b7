//! Voicelink client core.
//!
//! The engine room of a real-time voice/video AI agent client: reassembly of
//! chunked data-channel messages into transcript items, debounced speaker
//! liveness detection from the remote audio track, and the typed event bus
//! that carries both to UI and store consumers. The media transport itself
//! (join/leave/publish, frame delivery) is a collaborator behind the
//! [`transport::TransportAdapter`] trait.

pub mod config;
pub mod core;
pub mod session;
pub mod telemetry;
pub mod transport;

// Re-export commonly used items for convenience
pub use config::{ClientConfig, ConfigError};
pub use core::*;
pub use session::{AgentSession, SessionError, SessionResult};
pub use transport::{
    LocalTracks, RemoteAudioTrack, TransportAdapter, TransportError, TransportResult,
};
