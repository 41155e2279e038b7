//! Session orchestration: wires the transport's callbacks into the chunk
//! reassembler and the liveness detector, and enforces the join-before-publish
//! ordering of the connect flow.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ClientConfig, ConfigError};
use crate::core::bus::EventBus;
use crate::core::liveness::SpeakerLiveness;
use crate::core::reassembly::ChunkReassembler;
use crate::transport::{LocalTracks, TransportAdapter, TransportError};

/// Errors raised while establishing or tearing down a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The configuration failed validation.
    #[error("invalid session configuration: {0}")]
    Config(#[from] ConfigError),

    /// A transport operation failed. A join failure is fatal: tracks are
    /// never published after one.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// One live client session with a voice/video AI agent.
///
/// Owns the event bus, the reassembler, and the liveness detector; their
/// lifetimes are tied to this handle.
pub struct AgentSession {
    bus: Arc<EventBus>,
    reassembler: Arc<ChunkReassembler>,
    liveness: Arc<SpeakerLiveness>,
    transport: Arc<dyn TransportAdapter>,
    channel: String,
}

impl AgentSession {
    /// Join the configured channel, publish local tracks, and wire transport
    /// callbacks into the message and liveness engines.
    ///
    /// A join failure propagates immediately; `publish` is not attempted
    /// after one.
    pub async fn connect(
        transport: Arc<dyn TransportAdapter>,
        config: ClientConfig,
        tracks: LocalTracks,
    ) -> SessionResult<Self> {
        config.validate()?;

        let bus = Arc::new(EventBus::new());
        let reassembler = Arc::new(ChunkReassembler::new(
            Arc::clone(&bus),
            config.participant_uid,
            config.reassembly.clone(),
        ));
        let liveness = Arc::new(SpeakerLiveness::new(
            Arc::clone(&bus),
            config.liveness.clone(),
        ));

        transport.join(&config.channel, config.participant_uid).await?;
        info!(channel = %config.channel, uid = config.participant_uid, "joined channel");
        transport.publish(tracks).await?;
        debug!(audio = tracks.audio, video = tracks.video, "published local tracks");

        let frame_sink = Arc::clone(&reassembler);
        transport.on_raw_frame(Arc::new(move |frame| {
            frame_sink.ingest(frame);
        }));

        let track_sink = Arc::clone(&liveness);
        transport.on_remote_track(Arc::new(move |track| match track {
            Some(track) => track_sink.attach(track),
            None => track_sink.detach(),
        }));

        Ok(Self {
            bus,
            reassembler,
            liveness,
            transport,
            channel: config.channel,
        })
    }

    /// The session's event bus, for UI and store subscribers.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The message reassembler (exposed for diagnostics).
    pub fn reassembler(&self) -> &Arc<ChunkReassembler> {
        &self.reassembler
    }

    /// The liveness detector.
    pub fn liveness(&self) -> &Arc<SpeakerLiveness> {
        &self.liveness
    }

    /// Tear the session down: stop liveness polling and leave the channel.
    pub async fn close(&self) -> SessionResult<()> {
        self.liveness.detach();
        self.transport.leave().await?;
        info!(channel = %self.channel, "left channel");
        Ok(())
    }
}
