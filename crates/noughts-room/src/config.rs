//! Room configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long a finished room stays reachable before it is evicted.
pub const DEFAULT_EVICTION_GRACE: Duration = Duration::from_secs(5 * 60);

/// Upper bound on a single persistence call.
pub const DEFAULT_PERSIST_TIMEOUT: Duration = Duration::from_secs(5);

/// Command channel capacity per room actor.
pub const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Settings shared by every room the registry creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Time between a room finishing and its removal from the registry.
    /// Rooms that never finish are never evicted.
    pub eviction_grace: Duration,

    /// Bound on each gateway call. `create_game` blocks room creation,
    /// so when it runs out the room starts without a game reference.
    pub persist_timeout: Duration,

    /// Backpressure for the room actor's command channel.
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            eviction_grace: DEFAULT_EVICTION_GRACE,
            persist_timeout: DEFAULT_PERSIST_TIMEOUT,
            channel_size: DEFAULT_CHANNEL_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.eviction_grace, Duration::from_secs(300));
        assert_eq!(config.persist_timeout, Duration::from_secs(5));
        assert_eq!(config.channel_size, 64);
    }
}
