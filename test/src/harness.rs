use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use skein_client::{AssetResolver, ClientConfig, ReplicationClient};
use skein_server::{ReplicationDirector, ServerConfig};
use skein_shared::{
    fragment, ChunkHeader, EventSender, Frame, HostType, MessageKind, PeerId, Reliability,
    Session,
};

use crate::{assets::prefab_resolver, loopback::LoopbackTransport, test_components::test_codecs};

/// How clients address the server
pub const SERVER: PeerId = PeerId::new(0);

/// Simulated time between two ticks
pub const TICK: Duration = Duration::from_millis(16);

// injected frames use sequences far from the ones real sessions reach
const INJECTED_SEQUENCE_BASE: u16 = 40_000;

struct ClientSlot {
    peer: PeerId,
    client: ReplicationClient<LoopbackTransport>,
    wire: LoopbackTransport,
    events: EventSender,
    linked: bool,
}

/// One director and any number of clients wired together in memory. Each
/// [`TestHarness::tick`] ticks the server, delivers what it sent, ticks every
/// client and delivers what they sent.
pub struct TestHarness {
    pub server: ReplicationDirector<LoopbackTransport>,
    server_wire: LoopbackTransport,
    server_events: EventSender,
    clients: Vec<ClientSlot>,
    now: Instant,
    server_sent: HashMap<PeerId, Vec<MessageKind>>,
    server_disconnects_seen: usize,
    injected: u16,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let server_wire = LoopbackTransport::new();
        let server = ReplicationDirector::new(config, test_codecs(), server_wire.clone());
        let server_events = server.event_sender();
        Self {
            server,
            server_wire,
            server_events,
            clients: Vec::new(),
            now: Instant::now(),
            server_sent: HashMap::new(),
            server_disconnects_seen: 0,
            injected: 0,
        }
    }

    // Clients

    /// Adds a client with the default config whose asset loads finish
    /// immediately. Returns its index.
    pub fn add_client(&mut self) -> usize {
        self.add_client_with(ClientConfig::default(), prefab_resolver())
    }

    pub fn add_client_with<R: AssetResolver + 'static>(
        &mut self,
        config: ClientConfig,
        resolver: R,
    ) -> usize {
        let index = self.clients.len();
        let peer = PeerId::new(index as u64 + 1);
        let wire = LoopbackTransport::new();
        let mut client =
            ReplicationClient::new(config, test_codecs(), wire.clone(), resolver, SERVER);
        client.connect().unwrap();

        let events = client.event_sender();
        self.server_events.connected(peer).unwrap();
        events.connected(SERVER).unwrap();

        self.clients.push(ClientSlot {
            peer,
            client,
            wire,
            events,
            linked: true,
        });
        index
    }

    pub fn client(&self, index: usize) -> &ReplicationClient<LoopbackTransport> {
        &self.clients[index].client
    }

    pub fn client_mut(&mut self, index: usize) -> &mut ReplicationClient<LoopbackTransport> {
        &mut self.clients[index].client
    }

    /// The id the server knows a client by
    pub fn peer(&self, index: usize) -> PeerId {
        self.clients[index].peer
    }

    pub fn server_session(&self, index: usize) -> Option<&Session> {
        self.server.session(&self.peer(index))
    }

    /// Drops the link as a transport would, reporting it to both sides
    pub fn drop_link(&mut self, index: usize) {
        let slot = &mut self.clients[index];
        if !slot.linked {
            return;
        }
        slot.linked = false;
        self.server_events.disconnected(slot.peer).unwrap();
        slot.events.disconnected(SERVER).unwrap();
    }

    pub fn is_linked(&self, index: usize) -> bool {
        self.clients[index].linked
    }

    // Time

    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn tick(&mut self) {
        self.now += TICK;
        self.server.tick(self.now);
        self.deliver_from_server();

        for slot in &mut self.clients {
            slot.client.tick(self.now);
        }
        self.deliver_from_clients();
    }

    pub fn tick_n(&mut self, count: usize) {
        for _ in 0..count {
            self.tick();
        }
    }

    // Traffic

    /// Kinds of the single-chunk frames the server sent to a client so far
    pub fn server_sent(&self, index: usize) -> Vec<MessageKind> {
        self.server_sent
            .get(&self.peer(index))
            .cloned()
            .unwrap_or_default()
    }

    pub fn count_server_sent(&self, index: usize, kind: MessageKind) -> usize {
        self.server_sent(index)
            .iter()
            .filter(|sent| **sent == kind)
            .count()
    }

    pub fn clear_server_sent(&mut self) {
        self.server_sent.clear();
    }

    /// Delivers raw bytes to the server as if a client had sent them
    pub fn inject_to_server(&mut self, index: usize, bytes: Vec<u8>) {
        let peer = self.peer(index);
        self.server_events
            .received(peer, bytes, Reliability::Reliable)
            .unwrap();
    }

    /// Delivers one frame to the server as if a client had sent it
    pub fn inject_frame_to_server(&mut self, index: usize, kind: MessageKind, body: Vec<u8>) {
        let chunk = self.injected_chunk(kind, body);
        self.inject_to_server(index, chunk);
    }

    /// Delivers one frame to a client as if the server had sent it
    pub fn inject_frame_to_client(&mut self, index: usize, kind: MessageKind, body: Vec<u8>) {
        let chunk = self.injected_chunk(kind, body);
        self.clients[index]
            .events
            .received(SERVER, chunk, Reliability::Reliable)
            .unwrap();
    }

    fn injected_chunk(&mut self, kind: MessageKind, body: Vec<u8>) -> Vec<u8> {
        let sequence = INJECTED_SEQUENCE_BASE.wrapping_add(self.injected);
        self.injected = self.injected.wrapping_add(1);
        let bytes = Frame::new(kind, body).to_bytes();
        let mut chunks = fragment(sequence, &bytes, usize::MAX).unwrap();
        chunks.remove(0)
    }

    fn deliver_from_server(&mut self) {
        for chunk in self.server_wire.take_sent() {
            if let Ok((header, body)) = ChunkHeader::split(&chunk.bytes) {
                if header.count == 1 {
                    if let Ok(frame) = Frame::from_bytes(body, HostType::Client) {
                        self.server_sent
                            .entry(chunk.peer)
                            .or_default()
                            .push(frame.kind);
                    }
                }
            }
            let Some(slot) = self.clients.iter().find(|slot| slot.peer == chunk.peer) else {
                continue;
            };
            if slot.linked {
                slot.events
                    .received(SERVER, chunk.bytes, chunk.reliability)
                    .unwrap();
            }
        }

        // the server closing a session drops the link for the client too
        let disconnected = self.server_wire.disconnected();
        for peer in &disconnected[self.server_disconnects_seen..] {
            if let Some(slot) = self.clients.iter_mut().find(|slot| slot.peer == *peer) {
                if slot.linked {
                    slot.linked = false;
                    slot.events.disconnected(SERVER).unwrap();
                }
            }
        }
        self.server_disconnects_seen = disconnected.len();
    }

    fn deliver_from_clients(&mut self) {
        for slot in &mut self.clients {
            for chunk in slot.wire.take_sent() {
                if slot.linked {
                    self.server_events
                        .received(slot.peer, chunk.bytes, chunk.reliability)
                        .unwrap();
                }
            }
            if slot.linked && !slot.wire.disconnected().is_empty() {
                slot.linked = false;
                self.server_events.disconnected(slot.peer).unwrap();
            }
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
