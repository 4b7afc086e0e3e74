//! Arena configuration.
//!
//! One value, built once at startup and threaded through the
//! constructors; nothing reads configuration globally. Serializes to
//! TOML with every field optional, and merges layer over layer so a
//! config file only has to name what it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cfp_engine::{DriverTimeouts, EngineConfig};
use cfp_types::ErrorCode;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("couldn't read config file {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("couldn't parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized.
    #[error("couldn't serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "CONFIG_IO_FAILED",
            Self::Parse(_) => "CONFIG_PARSE_FAILED",
            Self::Serialize(_) => "CONFIG_SERIALIZE_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Request/reply bounds, in milliseconds so they read naturally in
/// TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Handshake bound.
    pub handshake_ms: u64,
    /// `isready`/`readyok` bound.
    pub ready_ms: u64,
    /// `stop`/`bestmove` bound.
    pub best_move_ms: u64,
    /// How long `quit` waits before killing the process.
    pub quit_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            handshake_ms: 5_000,
            ready_ms: 5_000,
            best_move_ms: 5_000,
            quit_ms: 5_000,
        }
    }
}

/// Arena configuration.
///
/// # Example
///
/// ```
/// use cfp_arena::ArenaConfig;
///
/// let config = ArenaConfig::from_toml("engine_dir = \"bots\"").unwrap();
/// assert_eq!(config.engine_dir.to_str(), Some("bots"));
/// assert_eq!(config.max_observers, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Directory holding engine binaries. `engine load` paths are
    /// relative to it.
    pub engine_dir: PathBuf,

    /// Maximum concurrent observers; connections beyond it are
    /// refused.
    pub max_observers: usize,

    /// Buffer size of the event channels. Producers block when full.
    pub event_buffer: usize,

    /// Per-turn think budget in milliseconds.
    pub turn_time_ms: u64,

    /// Engine request/reply bounds.
    pub timeouts: TimeoutConfig,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            engine_dir: PathBuf::from("engines"),
            max_observers: 100,
            event_buffer: 10,
            turn_time_ms: 5_000,
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl ArenaConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parses a TOML string.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`].
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Serializes to a TOML string.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Serialize`].
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merges another layer into this one: values in `other` that
    /// differ from the defaults win.
    pub fn merge(&mut self, other: &Self) {
        let default = Self::default();
        if other.engine_dir != default.engine_dir {
            self.engine_dir = other.engine_dir.clone();
        }
        if other.max_observers != default.max_observers {
            self.max_observers = other.max_observers;
        }
        if other.event_buffer != default.event_buffer {
            self.event_buffer = other.event_buffer;
        }
        if other.turn_time_ms != default.turn_time_ms {
            self.turn_time_ms = other.turn_time_ms;
        }
        if other.timeouts != default.timeouts {
            self.timeouts = other.timeouts;
        }
    }

    /// The per-turn think budget as a duration.
    #[must_use]
    pub fn turn_time(&self) -> Duration {
        Duration::from_millis(self.turn_time_ms)
    }

    /// The engine supervision config derived from the timeouts.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            timeouts: DriverTimeouts {
                handshake: Duration::from_millis(self.timeouts.handshake_ms),
                ready: Duration::from_millis(self.timeouts.ready_ms),
                best_move: Duration::from_millis(self.timeouts.best_move_ms),
            },
            quit_wait: Duration::from_millis(self.timeouts.quit_ms),
        }
    }
}
