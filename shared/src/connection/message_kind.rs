use crate::types::HostType;

/// The 2-byte identifier at the head of every frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Ready,
    NotReady,
    Ping,
    Pong,
    SpawnEntity,
    DespawnEntity,
    OwnerChanged,
    EntityUpdates,
    RpcBatch,
    OwnerUpdates,
    SceneChange,
}

impl MessageKind {
    pub fn to_u16(self) -> u16 {
        match self {
            MessageKind::Ready => 1,
            MessageKind::NotReady => 2,
            MessageKind::Ping => 3,
            MessageKind::Pong => 4,
            MessageKind::SpawnEntity => 5,
            MessageKind::DespawnEntity => 6,
            MessageKind::OwnerChanged => 7,
            MessageKind::EntityUpdates => 8,
            MessageKind::RpcBatch => 9,
            MessageKind::OwnerUpdates => 10,
            MessageKind::SceneChange => 11,
        }
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        let kind = match value {
            1 => MessageKind::Ready,
            2 => MessageKind::NotReady,
            3 => MessageKind::Ping,
            4 => MessageKind::Pong,
            5 => MessageKind::SpawnEntity,
            6 => MessageKind::DespawnEntity,
            7 => MessageKind::OwnerChanged,
            8 => MessageKind::EntityUpdates,
            9 => MessageKind::RpcBatch,
            10 => MessageKind::OwnerUpdates,
            11 => MessageKind::SceneChange,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether a host of the given type ever receives this kind
    pub fn is_received_by(self, host: HostType) -> bool {
        match self {
            MessageKind::RpcBatch => true,
            MessageKind::Ready
            | MessageKind::NotReady
            | MessageKind::Ping
            | MessageKind::OwnerUpdates => host == HostType::Server,
            MessageKind::Pong
            | MessageKind::SpawnEntity
            | MessageKind::DespawnEntity
            | MessageKind::OwnerChanged
            | MessageKind::EntityUpdates
            | MessageKind::SceneChange => host == HostType::Client,
        }
    }

    /// Kinds a session may send before it is fully connected
    pub fn is_handshake(self) -> bool {
        matches!(self, MessageKind::Ready | MessageKind::NotReady)
    }
}
