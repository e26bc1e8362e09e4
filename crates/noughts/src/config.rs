//! Server configuration: defaults, overridable from the environment.

use std::time::Duration;

use noughts_room::RoomConfig;
use serde::{Deserialize, Serialize};

/// Address the server binds to when nothing else is configured.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// How long a freshly connected peer has to complete the WebSocket upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Listen address (`host:port`).
pub const ENV_BIND: &str = "NOUGHTS_BIND";
/// Whole seconds a finished room stays reachable.
pub const ENV_EVICTION_GRACE_SECS: &str = "NOUGHTS_EVICTION_GRACE_SECS";
/// Milliseconds allowed per persistence call.
pub const ENV_PERSIST_TIMEOUT_MS: &str = "NOUGHTS_PERSIST_TIMEOUT_MS";
/// Milliseconds a new peer has to finish the WebSocket upgrade.
pub const ENV_HANDSHAKE_TIMEOUT_MS: &str = "NOUGHTS_HANDSHAKE_TIMEOUT_MS";

/// Everything needed to start a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Peers still mid-upgrade after this long are dropped.
    pub handshake_timeout: Duration,
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            room: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults with `NOUGHTS_*` environment overrides applied.
    ///
    /// A variable that is set but doesn't parse is reported with `warn!`
    /// and the default is kept.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through
    /// `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup(ENV_BIND).filter(|a| !a.trim().is_empty()) {
            config.bind_addr = addr.trim().to_string();
        }
        if let Some(secs) = parse_var::<u64>(&lookup, ENV_EVICTION_GRACE_SECS) {
            config.room.eviction_grace = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_PERSIST_TIMEOUT_MS) {
            config.room.persist_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_HANDSHAKE_TIMEOUT_MS) {
            config.handshake_timeout = Duration::from_millis(ms);
        }

        config
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting, using default");
            None
        }
    }
}
