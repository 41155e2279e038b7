pub mod bus;
pub mod liveness;
pub mod reassembly;
pub mod types;

// Re-export commonly used types for convenience
pub use bus::{EventBus, EventHandler, EventKind, SessionEvent, SubscriptionId};
pub use liveness::{LivenessConfig, SpeakerLiveness};
pub use reassembly::{ChunkReassembler, FrameError, FrameFragment, ReassemblyConfig};
pub use types::{ChatMessage, LivenessUpdate, MessageKind, MessageOrigin};
