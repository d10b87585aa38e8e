//! Server configuration
//!
//! Every field has a default, so an empty (or absent) TOML file yields a
//! working server. CLI flags in `main` override whatever the file sets.
//!
//! ```toml
//! bind_addr = "0.0.0.0:65432"
//! data_file = "items.json"
//! locations = ["Library", "Cafe"]
//! read_timeout_ms = 5000
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Locations accepted when no configuration overrides them
pub const DEFAULT_LOCATIONS: &[&str] = &[
    "A Block",
    "B Block",
    "C Block",
    "Cafe",
    "Library",
    "Sports Complex",
    "Admin Building",
    "Hostel A",
    "Hostel B",
    "Other",
];

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime settings for the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the acceptor binds to
    pub bind_addr: String,
    /// JSON file holding the item collection
    pub data_file: PathBuf,
    /// Allowed values for an item's location
    pub locations: Vec<String>,
    /// Text sent after `WELCOME`
    pub welcome_message: String,
    /// Bounded wait for a single network read
    pub read_timeout_ms: u64,
    /// Bounded wait for writing one message to a peer
    pub write_timeout_ms: u64,
    /// Bounded wait for a single accept
    pub accept_poll_ms: u64,
    /// Pause between stopping the acceptor and broadcasting shutdown
    pub shutdown_grace_ms: u64,
    /// Upper bound on waiting for connection tasks after shutdown
    pub drain_timeout_ms: u64,
    /// Disconnect after this many consecutive idle read timeouts
    pub max_idle_polls: Option<u32>,
    /// Longest accepted input line, in bytes
    pub max_line_bytes: usize,
    /// Per-session outbound message buffer
    pub outbound_buffer: usize,
    /// Buffer of the coordinating actor's command channel
    pub command_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:65432".to_string(),
            data_file: PathBuf::from("items.json"),
            locations: DEFAULT_LOCATIONS.iter().map(|s| s.to_string()).collect(),
            welcome_message: "Welcome to the Lost & Found Service!".to_string(),
            read_timeout_ms: 5_000,
            write_timeout_ms: 5_000,
            accept_poll_ms: 1_000,
            shutdown_grace_ms: 1_000,
            drain_timeout_ms: 2_000,
            max_idle_polls: None,
            max_line_bytes: 4_096,
            outbound_buffer: 32,
            command_buffer: 256,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ServerConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.locations.is_empty() {
            return Err(ConfigError::Invalid("locations must not be empty".into()));
        }
        let mut seen = HashSet::new();
        for location in &self.locations {
            if location.trim().is_empty() {
                return Err(ConfigError::Invalid("locations must not be blank".into()));
            }
            if !seen.insert(location.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate location '{}'",
                    location
                )));
            }
        }
        if self.read_timeout_ms == 0
            || self.write_timeout_ms == 0
            || self.accept_poll_ms == 0
            || self.drain_timeout_ms == 0
        {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        if self.max_line_bytes == 0 {
            return Err(ConfigError::Invalid("max_line_bytes must be non-zero".into()));
        }
        if self.outbound_buffer == 0 || self.command_buffer == 0 {
            return Err(ConfigError::Invalid("channel buffers must be non-zero".into()));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn accept_poll(&self) -> Duration {
        Duration::from_millis(self.accept_poll_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}
