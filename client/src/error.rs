use thiserror::Error;

use skein_shared::{
    ConfigError, EntityError, EntityId, FramingError, RpcError, SessionError,
};

use crate::asset::AssetError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The operation needs a connected session
    #[error("Client is not connected")]
    NotConnected,

    /// `connect` was called while a session is still open
    #[error("Client already has an open session")]
    AlreadyConnected,

    /// No mirrored entity has this id
    #[error("{entity} is not in the mirror")]
    EntityNotFound { entity: EntityId },

    #[error(transparent)]
    Asset(#[from] AssetError),

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
