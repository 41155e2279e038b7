//! Client configuration.
//!
//! Configuration comes from three layers, lowest priority first: built-in
//! defaults, environment variables (with `.env` files folded in via
//! `dotenvy`), and an optional YAML file.
//!
//! # Environment variables
//!
//! - `VOICELINK_CHANNEL` - channel id to join
//! - `VOICELINK_PARTICIPANT_UID` - local participant uid (decimal)
//! - `VOICELINK_EVICTION_TIMEOUT_MS` - reassembly eviction timeout
//! - `VOICELINK_ACTIVATION_THRESHOLD` - liveness volume threshold
//!
//! # Example YAML
//!
//! ```yaml
//! channel: "agent-room-7"
//! participant_uid: 12345
//! reassembly:
//!   eviction_timeout_ms: 5000
//! liveness:
//!   poll_interval_ms: 100
//!   activation_threshold: 0.05
//!   deactivation_grace_ms: 200
//!   final_recheck_delay_ms: 1000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::liveness::LivenessConfig;
use crate::core::reassembly::ReassemblyConfig;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field value failed validation.
    #[error("invalid configuration: {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The configuration file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file did not parse as YAML.
    #[error("failed to parse configuration file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An environment variable held an unparseable value.
    #[error("invalid environment value for {variable}: {value:?}")]
    InvalidEnv {
        /// The variable name.
        variable: &'static str,
        /// The offending value.
        value: String,
    },
}

impl ConfigError {
    /// Build a [`ConfigError::Invalid`] for `field`.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Channel (room) id to join.
    #[serde(default)]
    pub channel: String,

    /// Local participant uid, compared numerically against incoming stream
    /// ids for origin attribution.
    #[serde(default)]
    pub participant_uid: u64,

    /// Chunk reassembler settings.
    #[serde(default)]
    pub reassembly: ReassemblyConfig,

    /// Liveness detector settings.
    #[serde(default)]
    pub liveness: LivenessConfig,
}

impl ClientConfig {
    /// Load configuration from environment variables over defaults.
    ///
    /// A `.env` file in the working directory, if present, is folded into
    /// the environment first. Real environment variables win over it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(channel) = std::env::var("VOICELINK_CHANNEL") {
            config.channel = channel;
        }
        if let Ok(value) = std::env::var("VOICELINK_PARTICIPANT_UID") {
            config.participant_uid = value.parse().map_err(|_| ConfigError::InvalidEnv {
                variable: "VOICELINK_PARTICIPANT_UID",
                value,
            })?;
        }
        if let Ok(value) = std::env::var("VOICELINK_EVICTION_TIMEOUT_MS") {
            config.reassembly.eviction_timeout_ms =
                value.parse().map_err(|_| ConfigError::InvalidEnv {
                    variable: "VOICELINK_EVICTION_TIMEOUT_MS",
                    value,
                })?;
        }
        if let Ok(value) = std::env::var("VOICELINK_ACTIVATION_THRESHOLD") {
            config.liveness.activation_threshold =
                value.parse().map_err(|_| ConfigError::InvalidEnv {
                    variable: "VOICELINK_ACTIVATION_THRESHOLD",
                    value,
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file. Fields absent from the file take
    /// their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reassembly.validate()?;
        self.liveness.validate()?;
        Ok(())
    }
}
