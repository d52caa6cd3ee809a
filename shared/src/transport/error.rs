use thiserror::Error;

use crate::types::PeerId;

/// Errors reported by a transport implementation or the event hand-off
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transport could not deliver bytes to a peer
    #[error("Failed to send to {peer}: {reason}")]
    SendFailed { peer: PeerId, reason: String },

    /// The transport has no connection to the peer
    #[error("Transport has no connection to {peer}")]
    UnknownPeer { peer: PeerId },

    /// The engine side of the event queue has been dropped
    #[error("Event queue is closed; the receiving engine has been dropped")]
    QueueClosed,
}
