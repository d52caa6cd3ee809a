use std::collections::{HashSet, VecDeque};

use log::{debug, info};

use skein_serde::{ByteWriter, Serde};

use crate::{
    connection::{
        connection_config::ConnectionConfig,
        error::{FramingError, SessionError},
        frame::{fragment, Frame},
        message_kind::MessageKind,
        reassembly::Reassembly,
    },
    constants::FRAME_KIND_BYTES,
    rpc::call_record::RpcCall,
    transport::{Reliability, Transport},
    types::{EntityId, HostType, PeerId},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Per-peer protocol state: connection lifecycle, readiness, the set of
/// entities the peer observes, and both directions of framing.
///
/// A session is single-use. Once it has been through `Disconnected` it
/// refuses to connect again.
pub struct Session {
    peer: PeerId,
    host: HostType,
    config: ConnectionConfig,
    state: ConnectionState,
    consumed: bool,
    authenticated: bool,
    ready: bool,
    loading: bool,
    observed: HashSet<EntityId>,
    next_sequence: u16,
    outgoing: VecDeque<(Reliability, Frame)>,
    rpc_batch: ByteWriter,
    rpc_count: usize,
    reassembly: Reassembly,
    incoming: VecDeque<Frame>,
}

impl Session {
    /// A fresh session to `peer`, as seen from a host of type `host`
    pub fn new(peer: PeerId, host: HostType, config: &ConnectionConfig) -> Self {
        Self {
            peer,
            host,
            config: config.clone(),
            state: ConnectionState::Disconnected,
            consumed: false,
            authenticated: false,
            ready: false,
            loading: false,
            observed: HashSet::new(),
            next_sequence: 0,
            outgoing: VecDeque::new(),
            rpc_batch: ByteWriter::new(),
            rpc_count: 0,
            reassembly: Reassembly::new(config.max_pending_frames, config.max_frame_size),
            incoming: VecDeque::new(),
        }
    }

    pub fn peer(&self) -> PeerId {
        self.peer
    }

    pub fn host(&self) -> HostType {
        self.host
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_disconnecting(&self) -> bool {
        self.state == ConnectionState::Disconnecting
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    // State machine

    /// Disconnected to Connecting. A session that has already been used
    /// cannot connect again.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        if self.consumed {
            return Err(SessionError::SessionConsumed);
        }
        if self.state != ConnectionState::Disconnected {
            return Err(SessionError::InvalidTransition {
                action: "connect",
                state: self.state,
            });
        }
        self.state = ConnectionState::Connecting;
        debug!("Session with {} connecting", self.peer);
        Ok(())
    }

    /// Connecting to Connected, once the transport confirms the peer
    pub fn on_transport_connected(&mut self) -> Result<(), SessionError> {
        if self.state != ConnectionState::Connecting {
            return Err(SessionError::InvalidTransition {
                action: "confirm connection",
                state: self.state,
            });
        }
        self.state = ConnectionState::Connected;
        self.authenticated = true;
        info!("Session with {} connected", self.peer);
        Ok(())
    }

    /// Starts disconnecting. Outbound traffic is suppressed from here on;
    /// frames already received can still be drained. Returns whether the
    /// state changed, so calling it twice is harmless.
    pub fn disconnect(&mut self) -> bool {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                self.state = ConnectionState::Disconnecting;
                self.ready = false;
                self.outgoing.clear();
                self.rpc_batch = ByteWriter::new();
                self.rpc_count = 0;
                info!("Session with {} disconnecting", self.peer);
                true
            }
            ConnectionState::Disconnecting | ConnectionState::Disconnected => false,
        }
    }

    /// Moves to the terminal Disconnected state and clears every
    /// per-session buffer
    pub fn finish_disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.state = ConnectionState::Disconnected;
        self.consumed = true;
        self.authenticated = false;
        self.ready = false;
        self.loading = false;
        self.observed.clear();
        self.outgoing.clear();
        self.rpc_batch = ByteWriter::new();
        self.rpc_count = 0;
        self.reassembly.clear();
        self.incoming.clear();
        info!("Session with {} disconnected", self.peer);
    }

    // Readiness & Loading

    /// Ready and connected: the peer receives entity broadcasts and its
    /// server calls are honoured
    pub fn is_ready(&self) -> bool {
        self.ready && self.state == ConnectionState::Connected
    }

    /// Clearing readiness also forgets every observed entity
    pub fn set_ready(&mut self, ready: bool) {
        if self.ready == ready {
            return;
        }
        self.ready = ready;
        if !ready {
            self.observed.clear();
        }
        info!(
            "Session with {} is {}",
            self.peer,
            if ready { "ready" } else { "not ready" }
        );
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// While loading, received frames are held rather than processed
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    // Observers

    pub fn observes(&self, entity: &EntityId) -> bool {
        self.observed.contains(entity)
    }

    /// Returns whether the entity was newly added
    pub fn observe(&mut self, entity: EntityId) -> bool {
        self.observed.insert(entity)
    }

    /// Returns whether the entity was being observed
    pub fn unobserve(&mut self, entity: &EntityId) -> bool {
        self.observed.remove(entity)
    }

    pub fn observed(&self) -> impl Iterator<Item = &EntityId> {
        self.observed.iter()
    }

    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    // Outgoing

    pub fn can_send(&self, kind: MessageKind) -> bool {
        match self.state {
            ConnectionState::Connected => true,
            ConnectionState::Connecting => kind.is_handshake(),
            ConnectionState::Disconnecting | ConnectionState::Disconnected => false,
        }
    }

    pub fn queue_frame(
        &mut self,
        frame: Frame,
        reliability: Reliability,
    ) -> Result<(), SessionError> {
        if !self.can_send(frame.kind) {
            return Err(SessionError::SendSuppressed {
                kind: frame.kind,
                state: self.state,
            });
        }
        let length = FRAME_KIND_BYTES + frame.body.len();
        if length > self.config.max_frame_size {
            return Err(FramingError::FrameTooLarge {
                length,
                max: self.config.max_frame_size,
            }
            .into());
        }
        self.outgoing.push_back((reliability, frame));
        Ok(())
    }

    pub fn queue_message<M: Serde>(
        &mut self,
        kind: MessageKind,
        message: &M,
        reliability: Reliability,
    ) -> Result<(), SessionError> {
        self.queue_frame(Frame::from_message(kind, message), reliability)
    }

    /// Appends a call to this tick's RPC batch. The batch goes out as a
    /// single frame on the next flush, or earlier if it would outgrow the
    /// frame size limit.
    pub fn queue_rpc(&mut self, call: &RpcCall) -> Result<(), SessionError> {
        if !self.can_send(MessageKind::RpcBatch) {
            return Err(SessionError::SendSuppressed {
                kind: MessageKind::RpcBatch,
                state: self.state,
            });
        }
        let alone = FRAME_KIND_BYTES + call.record_length();
        if alone > self.config.max_frame_size {
            return Err(FramingError::FrameTooLarge {
                length: alone,
                max: self.config.max_frame_size,
            }
            .into());
        }
        let grown = FRAME_KIND_BYTES + self.rpc_batch.len() + call.record_length();
        if self.rpc_count > 0 && grown > self.config.max_frame_size {
            self.seal_rpc_batch();
        }
        call.write_record(&mut self.rpc_batch)?;
        self.rpc_count += 1;
        Ok(())
    }

    pub fn queued_rpc_count(&self) -> usize {
        self.rpc_count
    }

    pub fn queued_frame_count(&self) -> usize {
        self.outgoing.len()
    }

    /// Fragments every queued frame into chunks and hands them to the
    /// transport. Returns the number of chunks sent.
    pub fn flush<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<usize, SessionError> {
        self.seal_rpc_batch();
        if matches!(
            self.state,
            ConnectionState::Disconnecting | ConnectionState::Disconnected
        ) {
            self.outgoing.clear();
            return Ok(0);
        }

        let mut sent = 0;
        while let Some((reliability, frame)) = self.outgoing.pop_front() {
            let sequence = self.next_sequence;
            self.next_sequence = self.next_sequence.wrapping_add(1);
            let bytes = frame.to_bytes();
            for chunk in fragment(sequence, &bytes, self.config.max_chunk_payload)? {
                transport.send(self.peer, &chunk, reliability)?;
                sent += 1;
            }
        }
        Ok(sent)
    }

    fn seal_rpc_batch(&mut self) {
        if self.rpc_count == 0 {
            return;
        }
        let batch = std::mem::take(&mut self.rpc_batch).to_bytes();
        self.rpc_count = 0;
        self.outgoing
            .push_back((Reliability::Reliable, Frame::new(MessageKind::RpcBatch, batch)));
    }

    // Incoming

    /// Feeds one received chunk into reassembly. Completed frames are
    /// queued for [`Session::pop_frame`]. Any error here is fatal to the
    /// session.
    pub fn receive(&mut self, chunk: &[u8]) -> Result<(), FramingError> {
        if self.state == ConnectionState::Disconnected {
            debug!("Ignoring chunk from {} on a closed session", self.peer);
            return Ok(());
        }
        if let Some(bytes) = self.reassembly.receive(chunk)? {
            let frame = Frame::from_bytes(&bytes, self.host)?;
            self.incoming.push_back(frame);
        }
        Ok(())
    }

    /// Next frame to process, in receipt order. Nothing is returned while
    /// loading; frames stay queued.
    pub fn pop_frame(&mut self) -> Option<Frame> {
        if self.loading {
            return None;
        }
        self.incoming.pop_front()
    }

    pub fn has_incoming(&self) -> bool {
        !self.incoming.is_empty()
    }
}
