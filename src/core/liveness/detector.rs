//! The speaker-liveness state machine and its poll loop.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::LivenessConfig;
use crate::core::bus::{EventBus, EventKind, SessionEvent, SubscriptionId};
use crate::core::types::{ChatMessage, LivenessUpdate, MessageOrigin};
use crate::transport::RemoteAudioTrack;

/// Mutable detector state, owned behind one lock.
#[derive(Debug)]
struct DetectorState {
    active: bool,
    last_volume: f32,
    /// Deadline after which the active state drops, unless a loud sample
    /// clears it first.
    deactivate_at: Option<Instant>,
    /// Deadline for the post-final-message volume re-check.
    recheck_at: Option<Instant>,
    attached: bool,
    /// Bumped on every attach/detach; a transition computed under an older
    /// epoch is stale and must not be published.
    epoch: u64,
}

impl DetectorState {
    fn new() -> Self {
        Self {
            active: false,
            last_volume: 0.0,
            deactivate_at: None,
            recheck_at: None,
            attached: false,
            epoch: 0,
        }
    }
}

/// Debounced "is currently speaking" detector for a remote audio track.
///
/// Emits [`SessionEvent::Liveness`] transitions onto the session bus. One
/// instance tracks at most one attached track at a time.
pub struct SpeakerLiveness {
    state: Arc<Mutex<DetectorState>>,
    bus: Arc<EventBus>,
    config: LivenessConfig,
    cancel: Mutex<Option<CancellationToken>>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    chat_subscription: Mutex<Option<SubscriptionId>>,
    /// Serializes bus emissions against teardown: an in-flight transition
    /// either publishes before the final detach update or is dropped.
    emit_serial: Arc<Mutex<()>>,
}

impl SpeakerLiveness {
    /// Create a detector emitting onto `bus`.
    pub fn new(bus: Arc<EventBus>, config: LivenessConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(DetectorState::new())),
            bus,
            config,
            cancel: Mutex::new(None),
            poll_task: Mutex::new(None),
            chat_subscription: Mutex::new(None),
            emit_serial: Arc::new(Mutex::new(())),
        }
    }

    /// Begin polling `track` and emitting liveness transitions.
    ///
    /// Attaching while already attached replaces the tracked track; the old
    /// poll loop is cancelled without a teardown emission.
    pub fn attach(&self, track: Arc<dyn RemoteAudioTrack>) {
        if let Some(old) = self.cancel.lock().take() {
            old.cancel();
        }

        {
            let mut state = self.state.lock();
            state.attached = true;
            state.deactivate_at = None;
            state.recheck_at = None;
            state.epoch += 1;
        }

        let mut subscription = self.chat_subscription.lock();
        if subscription.is_none() {
            let state = Arc::clone(&self.state);
            let bus = Arc::clone(&self.bus);
            let serial = Arc::clone(&self.emit_serial);
            let recheck_delay = self.config.final_recheck_delay();
            *subscription = Some(self.bus.subscribe(
                EventKind::Chat,
                Arc::new(move |event| {
                    if let SessionEvent::Chat(message) = event {
                        Self::on_chat(&state, &bus, &serial, recheck_delay, message);
                    }
                }),
            ));
        }
        drop(subscription);

        let token = CancellationToken::new();
        *self.cancel.lock() = Some(token.clone());

        let state = Arc::clone(&self.state);
        let bus = Arc::clone(&self.bus);
        let serial = Arc::clone(&self.emit_serial);
        let poll_interval = self.config.poll_interval();
        let threshold = self.config.activation_threshold;
        let grace = self.config.deactivation_grace();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        Self::on_sample(&state, &bus, &serial, threshold, grace, track.level());
                    }
                }
            }
            debug!("liveness poll loop stopped");
        });
        *self.poll_task.lock() = Some(handle);
    }

    /// Stop polling, drop every pending deadline, and emit a final
    /// `active = false`.
    ///
    /// Deterministic teardown: no liveness timer fires after this returns.
    pub fn detach(&self) {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
        if let Some(handle) = self.poll_task.lock().take() {
            handle.abort();
        }
        if let Some(id) = self.chat_subscription.lock().take() {
            self.bus.unsubscribe(EventKind::Chat, id);
        }

        let volume = {
            let mut state = self.state.lock();
            state.attached = false;
            state.active = false;
            state.deactivate_at = None;
            state.recheck_at = None;
            // Invalidate any transition computed before this point; an
            // in-flight poll tick may not publish after us.
            state.epoch += 1;
            state.last_volume
        };

        let _serial = self.emit_serial.lock();
        self.bus.emit(SessionEvent::Liveness(LivenessUpdate {
            active: false,
            volume,
        }));
    }

    /// Whether the detector currently reports active speech.
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Whether a track is currently attached.
    pub fn is_attached(&self) -> bool {
        self.state.lock().attached
    }

    /// One volume sample from the poll loop.
    fn on_sample(
        state: &Arc<Mutex<DetectorState>>,
        bus: &Arc<EventBus>,
        serial: &Arc<Mutex<()>>,
        threshold: f32,
        grace: std::time::Duration,
        level: f32,
    ) {
        let now = Instant::now();
        let mut transition: Option<LivenessUpdate> = None;

        let epoch = {
            let mut st = state.lock();
            if !st.attached {
                return;
            }
            st.last_volume = level;
            trace!(level, active = st.active, "liveness sample");

            if level > threshold {
                // Loud sample: activation is immediate and supersedes any
                // pending deactivation.
                st.deactivate_at = None;
                if !st.active {
                    st.active = true;
                    transition = Some(LivenessUpdate {
                        active: true,
                        volume: level,
                    });
                }
            } else if st.active && st.deactivate_at.is_none() {
                st.deactivate_at = Some(now + grace);
            }

            if let Some(deadline) = st.deactivate_at {
                if now >= deadline {
                    st.deactivate_at = None;
                    if st.active {
                        st.active = false;
                        transition = Some(LivenessUpdate {
                            active: false,
                            volume: level,
                        });
                    }
                }
            }

            if let Some(deadline) = st.recheck_at {
                if now >= deadline {
                    st.recheck_at = None;
                    if st.active && st.last_volume <= threshold {
                        st.active = false;
                        st.deactivate_at = None;
                        transition = Some(LivenessUpdate {
                            active: false,
                            volume: level,
                        });
                    }
                }
            }
            st.epoch
        };

        if let Some(update) = transition {
            Self::emit_update(state, bus, serial, epoch, update);
        }
    }

    /// Chat arrival as a secondary activation source.
    fn on_chat(
        state: &Arc<Mutex<DetectorState>>,
        bus: &Arc<EventBus>,
        serial: &Arc<Mutex<()>>,
        recheck_delay: std::time::Duration,
        message: &ChatMessage,
    ) {
        if message.origin != MessageOrigin::Agent {
            return;
        }

        let mut transition: Option<LivenessUpdate> = None;
        let epoch = {
            let mut st = state.lock();
            if !st.attached {
                return;
            }
            if !message.is_final {
                // Text is arriving, so the agent is audibly responding even
                // if the volume signal under-reports it.
                st.deactivate_at = None;
                st.recheck_at = None;
                if !st.active {
                    st.active = true;
                    transition = Some(LivenessUpdate {
                        active: true,
                        volume: st.last_volume,
                    });
                }
            } else {
                // The transcript is done but audio may trail it; re-check the
                // volume later instead of silencing right away.
                st.recheck_at = Some(Instant::now() + recheck_delay);
            }
            st.epoch
        };

        if let Some(update) = transition {
            Self::emit_update(state, bus, serial, epoch, update);
        }
    }

    /// Publish a transition unless a later attach/detach superseded it.
    ///
    /// The serial lock orders this against the final emission in [`detach`]:
    /// a transition that lost the race to a teardown is dropped, so the
    /// `active = false` from `detach` is always the last update on the bus.
    ///
    /// [`detach`]: SpeakerLiveness::detach
    fn emit_update(
        state: &Mutex<DetectorState>,
        bus: &EventBus,
        serial: &Mutex<()>,
        epoch: u64,
        update: LivenessUpdate,
    ) {
        let _guard = serial.lock();
        if state.lock().epoch != epoch {
            debug!(active = update.active, "dropping stale liveness transition");
            return;
        }
        debug!(active = update.active, volume = update.volume, "liveness transition");
        bus.emit(SessionEvent::Liveness(update));
    }
}
