//! Session-level tests against a mock transport adapter: connect ordering,
//! callback wiring, and teardown.

use async_trait::async_trait;
use tokio_test::assert_ok;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use voicelink_client::config::ClientConfig;
use voicelink_client::core::bus::{EventKind, SessionEvent};
use voicelink_client::core::types::{ChatMessage, MessageOrigin};
use voicelink_client::session::{AgentSession, SessionError};
use voicelink_client::transport::{
    LocalTracks, RawFrameCallback, RemoteAudioTrack, RemoteTrackCallback, TransportAdapter,
    TransportError, TransportResult,
};

const LOCAL_UID: u64 = 12345;

#[derive(Default)]
struct MockTransport {
    fail_join: bool,
    joined: AtomicBool,
    published: AtomicBool,
    left: AtomicBool,
    frame_callback: Mutex<Option<RawFrameCallback>>,
    track_callback: Mutex<Option<RemoteTrackCallback>>,
}

impl MockTransport {
    fn failing_join() -> Self {
        Self {
            fail_join: true,
            ..Default::default()
        }
    }

    fn deliver_frame(&self, frame: &str) {
        let callback = self.frame_callback.lock();
        callback.as_ref().expect("frame callback registered")(frame);
    }

    fn deliver_track(&self, track: Option<Arc<dyn RemoteAudioTrack>>) {
        let callback = self.track_callback.lock();
        callback.as_ref().expect("track callback registered")(track);
    }
}

#[async_trait]
impl TransportAdapter for MockTransport {
    async fn join(&self, _channel: &str, _participant_uid: u64) -> TransportResult<()> {
        if self.fail_join {
            return Err(TransportError::JoinFailed("mock join rejected".to_string()));
        }
        self.joined.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn leave(&self) -> TransportResult<()> {
        self.left.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(&self, _tracks: LocalTracks) -> TransportResult<()> {
        if !self.joined.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.published.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn on_raw_frame(&self, callback: RawFrameCallback) {
        *self.frame_callback.lock() = Some(callback);
    }

    fn on_remote_track(&self, callback: RemoteTrackCallback) {
        *self.track_callback.lock() = Some(callback);
    }
}

struct SilentTrack;

impl RemoteAudioTrack for SilentTrack {
    fn level(&self) -> f32 {
        0.0
    }
}

fn config() -> ClientConfig {
    ClientConfig {
        channel: "agent-room-7".to_string(),
        participant_uid: LOCAL_UID,
        ..Default::default()
    }
}

fn agent_frame(text: &str) -> String {
    let encoded = BASE64.encode(
        serde_json::json!({
            "stream_id": 67890u64,
            "is_final": true,
            "text": text,
            "text_ts": 1i64,
        })
        .to_string(),
    );
    format!("m1|0|1|{encoded}")
}

#[tokio::test]
async fn join_failure_aborts_connect_before_publish() {
    let transport = Arc::new(MockTransport::failing_join());

    let result = AgentSession::connect(
        Arc::clone(&transport) as Arc<dyn TransportAdapter>,
        config(),
        LocalTracks {
            audio: true,
            video: false,
        },
    )
    .await;

    match result {
        Err(SessionError::Transport(TransportError::JoinFailed(_))) => {}
        other => panic!("expected join failure, got {other:?}", other = other.err()),
    }
    assert!(!transport.published.load(Ordering::SeqCst));
}

#[tokio::test]
async fn connect_joins_then_publishes() {
    let transport = Arc::new(MockTransport::default());

    let session = AgentSession::connect(
        Arc::clone(&transport) as Arc<dyn TransportAdapter>,
        config(),
        LocalTracks {
            audio: true,
            video: true,
        },
    )
    .await
    .expect("connect succeeds");

    assert!(transport.joined.load(Ordering::SeqCst));
    assert!(transport.published.load(Ordering::SeqCst));

    assert_ok!(session.close().await);
    assert!(transport.left.load(Ordering::SeqCst));
}

#[tokio::test]
async fn delivered_frames_surface_as_chat_messages() {
    let transport = Arc::new(MockTransport::default());
    let session = AgentSession::connect(
        Arc::clone(&transport) as Arc<dyn TransportAdapter>,
        config(),
        LocalTracks::default(),
    )
    .await
    .expect("connect succeeds");

    let messages: Arc<Mutex<Vec<ChatMessage>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&messages);
    session.bus().subscribe(
        EventKind::Chat,
        Arc::new(move |event| {
            if let SessionEvent::Chat(msg) = event {
                sink.lock().push(msg.clone());
            }
        }),
    );

    transport.deliver_frame(&agent_frame("hello from the agent"));

    let messages = messages.lock();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "hello from the agent");
    assert_eq!(messages[0].origin, MessageOrigin::Agent);
}

#[tokio::test]
async fn remote_track_changes_drive_liveness_attachment() {
    let transport = Arc::new(MockTransport::default());
    let session = AgentSession::connect(
        Arc::clone(&transport) as Arc<dyn TransportAdapter>,
        config(),
        LocalTracks::default(),
    )
    .await
    .expect("connect succeeds");

    assert!(!session.liveness().is_attached());

    transport.deliver_track(Some(Arc::new(SilentTrack)));
    assert!(session.liveness().is_attached());

    transport.deliver_track(None);
    assert!(!session.liveness().is_attached());
}

#[tokio::test]
async fn close_detaches_liveness() {
    let transport = Arc::new(MockTransport::default());
    let session = AgentSession::connect(
        Arc::clone(&transport) as Arc<dyn TransportAdapter>,
        config(),
        LocalTracks::default(),
    )
    .await
    .expect("connect succeeds");

    transport.deliver_track(Some(Arc::new(SilentTrack)));
    assert!(session.liveness().is_attached());

    assert_ok!(session.close().await);
    assert!(!session.liveness().is_attached());
    assert!(transport.left.load(Ordering::SeqCst));
}
