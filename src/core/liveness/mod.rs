//! Debounced audio-liveness detection for the remote agent's track.
//!
//! The raw volume signal is noisy and high-frequency; surfacing it directly
//! would make speaking indicators flicker on every syllable gap. The
//! [`SpeakerLiveness`] detector polls the track at a fixed interval and
//! applies asymmetric hysteresis: a loud sample activates immediately, while
//! deactivation requires a full grace period with no intervening loud sample.
//!
//! Text arrival is a secondary activation source. A non-final agent message
//! forces the active state even when the volume signal under-reports audible
//! playback; a final agent message schedules a delayed re-check so a response
//! whose audio trails its transcript is not silenced prematurely.
//!
//! All deadlines (deactivation grace, final-message recheck) are evaluated on
//! the poll tick inside one cancellable task, so `detach()` provably leaves
//! no timer behind.

mod detector;


pub use detector::SpeakerLiveness;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ConfigError;

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_activation_threshold() -> f32 {
    0.05
}

fn default_deactivation_grace_ms() -> u64 {
    200
}

fn default_final_recheck_delay_ms() -> u64 {
    1000
}

/// Configuration for the liveness detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessConfig {
    /// Volume sampling interval (milliseconds). Default: 100ms.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Volume above this level counts as speech (0.0 to 1.0). Default: 0.05.
    #[serde(default = "default_activation_threshold")]
    pub activation_threshold: f32,

    /// How long the volume must stay at or below the threshold before the
    /// active state drops (milliseconds). Default: 200ms.
    #[serde(default = "default_deactivation_grace_ms")]
    pub deactivation_grace_ms: u64,

    /// Delay before re-checking the volume after a final agent message
    /// (milliseconds). Default: 1000ms.
    #[serde(default = "default_final_recheck_delay_ms")]
    pub final_recheck_delay_ms: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            activation_threshold: default_activation_threshold(),
            deactivation_grace_ms: default_deactivation_grace_ms(),
            final_recheck_delay_ms: default_final_recheck_delay_ms(),
        }
    }
}

impl LivenessConfig {
    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Deactivation grace period as a [`Duration`].
    pub fn deactivation_grace(&self) -> Duration {
        Duration::from_millis(self.deactivation_grace_ms)
    }

    /// Final-message recheck delay as a [`Duration`].
    pub fn final_recheck_delay(&self) -> Duration {
        Duration::from_millis(self.final_recheck_delay_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "liveness.poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if !(0.0..=1.0).contains(&self.activation_threshold) {
            return Err(ConfigError::invalid(
                "liveness.activation_threshold",
                "must be within 0.0..=1.0",
            ));
        }
        Ok(())
    }
}
