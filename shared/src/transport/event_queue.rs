use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::{
    transport::{error::TransportError, Reliability},
    types::PeerId,
};

/// Something the transport observed, handed to the engine for its next tick
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    Connected(PeerId),
    Disconnected(PeerId),
    Received {
        peer: PeerId,
        bytes: Vec<u8>,
        channel: Reliability,
    },
}

/// Transport-side handle of an [`EventQueue`]. Clones may be moved to any
/// thread.
#[derive(Clone)]
pub struct EventSender {
    sender: Sender<TransportEvent>,
}

impl EventSender {
    pub fn send(&self, event: TransportEvent) -> Result<(), TransportError> {
        self.sender
            .send(event)
            .map_err(|_| TransportError::QueueClosed)
    }

    pub fn connected(&self, peer: PeerId) -> Result<(), TransportError> {
        self.send(TransportEvent::Connected(peer))
    }

    pub fn disconnected(&self, peer: PeerId) -> Result<(), TransportError> {
        self.send(TransportEvent::Disconnected(peer))
    }

    pub fn received(
        &self,
        peer: PeerId,
        bytes: Vec<u8>,
        channel: Reliability,
    ) -> Result<(), TransportError> {
        self.send(TransportEvent::Received {
            peer,
            bytes,
            channel,
        })
    }
}

/// Engine-side end of the transport hand-off. The tick thread drains it
/// without blocking.
pub struct EventQueue {
    sender: Sender<TransportEvent>,
    receiver: Receiver<TransportEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /// Every event queued so far, in arrival order
    pub fn drain(&self) -> Vec<TransportEvent> {
        self.receiver.try_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
