//! Facade Configuration
//!
//! Startup knobs for the socket facade. Defaults suit every supported
//! platform; environment variables override them for the process-wide
//! instance.

use std::fmt;
use std::str::FromStr;

use adapters_io_polling::PollerKind;
use tracing::warn;

/// Environment variable selecting the readiness poller (`poll` | `select`)
pub const ENV_POLLER: &str = "NET_POLLER";
/// Environment variable selecting the timeout mode (`emulated` | `native`)
pub const ENV_TIMEOUT_MODE: &str = "NET_TIMEOUT_MODE";
/// Environment variable overriding the default listen backlog
pub const ENV_LISTEN_BACKLOG: &str = "NET_LISTEN_BACKLOG";

/// How the timeout option is honoured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutMode {
    /// The registry holds the timeout; engines wait on the readiness poller
    #[default]
    Emulated,
    /// The timeout is handed to the platform's `SO_RCVTIMEO`/`SO_SNDTIMEO`
    Native,
}

impl FromStr for TimeoutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emulated" => Ok(TimeoutMode::Emulated),
            "native" => Ok(TimeoutMode::Native),
            other => Err(format!("unknown timeout mode: {}", other)),
        }
    }
}

impl fmt::Display for TimeoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutMode::Emulated => write!(f, "emulated"),
            TimeoutMode::Native => write!(f, "native"),
        }
    }
}

/// Socket facade configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetConfig {
    /// Multiplexing primitive used for bounded waits
    pub poller: PollerKind,
    /// Where the timeout option is stored and enforced
    pub timeout_mode: TimeoutMode,
    /// Backlog used when `listen` is given a non-positive value
    pub default_backlog: i32,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            poller: PollerKind::Poll,
            timeout_mode: TimeoutMode::Emulated,
            default_backlog: 128,
        }
    }
}

impl NetConfig {
    /// Defaults overlaid with the `NET_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_POLLER) {
            match raw.parse() {
                Ok(kind) => config.poller = kind,
                Err(err) => warn!(var = ENV_POLLER, value = %raw, %err, "ignoring invalid setting"),
            }
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MODE) {
            match raw.parse() {
                Ok(mode) => config.timeout_mode = mode,
                Err(err) => warn!(var = ENV_TIMEOUT_MODE, value = %raw, %err, "ignoring invalid setting"),
            }
        }
        if let Some(raw) = lookup(ENV_LISTEN_BACKLOG) {
            match raw.trim().parse::<i32>() {
                Ok(backlog) if backlog > 0 => config.default_backlog = backlog,
                _ => warn!(var = ENV_LISTEN_BACKLOG, value = %raw, "ignoring invalid setting"),
            }
        }

        config
    }

    /// Backlog to pass to the OS for a requested `backlog`
    pub fn effective_backlog(&self, backlog: i32) -> i32 {
        if backlog > 0 {
            backlog
        } else {
            self.default_backlog
        }
    }
}
