use thiserror::Error;

use skein_shared::{
    ConfigError, EntityError, EntityId, FramingError, PeerId, RpcError, SessionError,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    /// No active entity has this id
    #[error("{entity} is not in the entity table")]
    EntityNotFound { entity: EntityId },

    /// No session exists for this peer
    #[error("No session for {peer}")]
    PeerNotFound { peer: PeerId },

    /// The peer's session is not ready to receive entity state
    #[error("{peer} is not ready")]
    PeerNotReady { peer: PeerId },

    /// A target call had no explicit target and its entity has no owner
    #[error("Target call on {entity} has no target: no peer given and the entity has no owner")]
    NoRpcTarget { entity: EntityId },

    /// A shell passed to respawn was not despawned
    #[error("Only despawned shells can be respawned")]
    NotAShell,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}
