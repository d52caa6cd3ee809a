pub mod error;
pub mod event_queue;

use crate::{transport::error::TransportError, types::PeerId};

/// Delivery guarantee requested for a send
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reliability {
    Reliable,
    Unreliable,
}

/// The packet-level transport the engine writes through. Implementations
/// report inbound traffic through an [`event_queue::EventSender`].
pub trait Transport {
    /// Sends one chunk to a peer
    fn send(&mut self, peer: PeerId, bytes: &[u8], reliability: Reliability)
        -> Result<(), TransportError>;

    /// Closes the connection to a peer
    fn disconnect(&mut self, peer: PeerId);
}
