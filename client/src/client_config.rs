use std::{default::Default, time::Duration};

use skein_shared::{ConnectionConfig, PingConfig};

/// Contains Config properties which will be used by a Client
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Used to configure the session with the Server
    pub connection: ConnectionConfig,
    /// Configuration used to monitor the round-trip time to the Server
    pub ping: PingConfig,
    /// Send Ready as soon as the connection is confirmed. When false the
    /// application calls [`crate::ReplicationClient::ready`] itself.
    pub auto_ready: bool,
    /// How far behind the estimated server time snapshots are rendered
    pub interpolation_delay: Duration,
    /// Minimum time between two upstream sends of the same component
    pub min_sync_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            ping: PingConfig::default(),
            auto_ready: true,
            interpolation_delay: Duration::from_millis(100),
            min_sync_interval: Duration::ZERO,
        }
    }
}
