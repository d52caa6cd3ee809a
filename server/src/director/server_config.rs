use std::{default::Default, time::Duration};

use skein_shared::ConnectionConfig;

/// What happens to the entities a peer owns when that peer disconnects
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OwnedEntityPolicy {
    /// Entities stay, with no owner
    KeepOwnerless,
    /// Entities are destroyed and removed from every observer
    #[default]
    Destroy,
}

/// Contains Config properties which will be used by the Server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Used to configure the sessions with Clients
    pub connection: ConnectionConfig,
    /// Applied to entities owned by a peer that disconnects
    pub owned_entity_policy: OwnedEntityPolicy,
    /// Minimum time between two deltas of the same component. Applied to
    /// every entity as it spawns.
    pub min_sync_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            owned_entity_policy: OwnedEntityPolicy::default(),
            min_sync_interval: Duration::ZERO,
        }
    }
}
