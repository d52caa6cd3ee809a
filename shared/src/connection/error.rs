use thiserror::Error;

use skein_serde::SerdeErr;

use crate::{
    connection::{message_kind::MessageKind, session::ConnectionState},
    rpc::error::RpcError,
    transport::error::TransportError,
};

/// Errors in chunk or frame structure. Always fatal to the session the
/// bytes arrived on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// A chunk was shorter than its fixed header
    #[error("Chunk of {length} bytes is shorter than the {min} byte header")]
    ChunkTooShort { length: usize, min: usize },

    /// A reassembled frame was too short to hold its message kind
    #[error("Frame of {length} bytes is too short to carry a message kind")]
    FrameTooShort { length: usize },

    /// A frame's message kind is not one this protocol defines
    #[error("Unknown message kind {kind}")]
    UnknownMessageKind { kind: u16 },

    /// A known message kind arrived on the side that never receives it
    #[error("Message kind {kind:?} is not accepted on this side")]
    UnexpectedMessageKind { kind: MessageKind },

    /// A chunk announced zero fragments
    #[error("Chunk of frame {sequence} announces zero fragments")]
    InvalidFragmentCount { sequence: u16 },

    /// A chunk's fragment index is past its announced fragment count
    #[error("Fragment {index} is out of range for a frame of {count} fragments")]
    FragmentOutOfRange { index: u16, count: u16 },

    /// Chunks of one frame disagree on how many fragments it has
    #[error("Frame {sequence} announced {expected} fragments, a later chunk announced {actual}")]
    FragmentCountMismatch {
        sequence: u16,
        expected: u16,
        actual: u16,
    },

    /// A frame exceeds the configured maximum size
    #[error("Frame of {length} bytes exceeds the {max} byte limit")]
    FrameTooLarge { length: usize, max: usize },

    /// A frame body could not be decoded as its message kind
    #[error("Malformed {kind:?} body: {source}")]
    MalformedBody {
        kind: MessageKind,
        #[source]
        source: SerdeErr,
    },

    /// An RPC batch could not be framed
    #[error("Malformed RPC batch: {0}")]
    Rpc(#[from] RpcError),
}

/// Errors from driving the session state machine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The requested transition is not valid from the current state
    #[error("Cannot {action} while {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: ConnectionState,
    },

    /// Outbound traffic is suppressed in the current state
    #[error("Sending {kind:?} is suppressed while {state:?}")]
    SendSuppressed {
        kind: MessageKind,
        state: ConnectionState,
    },

    /// A session that has already been disconnected cannot be reused
    #[error("Session has already been used; create a new one to reconnect")]
    SessionConsumed,

    /// Outbound framing failed
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// An outbound RPC record could not be written
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// The transport refused a chunk
    #[error(transparent)]
    Transport(#[from] TransportError),
}
