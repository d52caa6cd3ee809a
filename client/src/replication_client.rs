use std::{collections::HashMap, time::Instant};

use log::{debug, error, info, warn};

use skein_shared::{
    ApplyPolicy, ByteReader, ClockSync, CodecError, CodecRegistry, ComponentId, ConfigError,
    ConnectionState, DespawnRecord, EntityId, EntityUpdate, EntityUpdates, EventQueue,
    EventSender, Frame, FramingError, HostType, LifecycleCallbacks, MessageKind, MethodHash,
    OwnerRecord, PeerId, Pong, Reliability, Replicated, ReplicatedEntity, RpcBatchReader,
    RpcCall, RpcCallHeader, RpcContext, RpcDispatcher, RpcError, RpcKind, SceneChange, Session,
    SessionError, SpawnRecord, Timer, Transport, TransportEvent,
};

use crate::{
    asset::{AssetComponents, AssetError, AssetLoad, AssetResolver},
    client_config::ClientConfig,
    client_entity::ClientEntity,
    error::ClientError,
};

/// A spawn waiting on its asset load. Updates that arrive meanwhile are
/// applied in order once the entity exists.
struct PendingSpawn {
    record: SpawnRecord,
    load: AssetLoad,
    updates: Vec<Vec<u8>>,
}

/// The mirroring side of replication. Holds one [`Session`] with the server
/// and a local copy of every entity the server replicates to this peer, and
/// is driven by calling [`ReplicationClient::tick`] once per frame.
pub struct ReplicationClient<T: Transport> {
    config: ClientConfig,
    codecs: CodecRegistry,
    dispatcher: RpcDispatcher,
    transport: T,
    events: EventQueue,
    server: PeerId,
    session: Option<Session>,
    mirror: HashMap<EntityId, ClientEntity>,
    pending: HashMap<EntityId, PendingSpawn>,
    resolver: Box<dyn AssetResolver>,
    clock: ClockSync,
    ping_timer: Timer,
    callbacks: LifecycleCallbacks,
    scene: Option<String>,
    started: Instant,
}

impl<T: Transport> ReplicationClient<T> {
    /// Create a new ReplicationClient talking to the server at `server`
    pub fn new<R: AssetResolver + 'static>(
        config: ClientConfig,
        codecs: CodecRegistry,
        transport: T,
        resolver: R,
        server: PeerId,
    ) -> Self {
        let clock = ClockSync::new(config.ping.rtt_window);
        let ping_timer = Timer::new(config.ping.ping_interval);
        Self {
            config,
            codecs,
            dispatcher: RpcDispatcher::new(HostType::Client),
            transport,
            events: EventQueue::new(),
            server,
            session: None,
            mirror: HashMap::new(),
            pending: HashMap::new(),
            resolver: Box::new(resolver),
            clock,
            ping_timer,
            callbacks: LifecycleCallbacks::new(),
            scene: None,
            started: Instant::now(),
        }
    }

    // Setup

    /// Handle the transport uses to report the connection and received bytes
    pub fn event_sender(&self) -> EventSender {
        self.events.sender()
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Registers a method the server may call on this peer's mirror. See
    /// [`RpcDispatcher::register_method`].
    pub fn register_rpc<C, F>(
        &mut self,
        signature: &str,
        kind: RpcKind,
        f: F,
    ) -> Result<MethodHash, ConfigError>
    where
        C: Replicated,
        F: FnMut(&mut C, &mut ByteReader, &RpcContext) -> Result<(), CodecError> + Send + 'static,
    {
        self.dispatcher.register_method::<C, F>(signature, kind, false, f)
    }

    pub fn dispatcher_mut(&mut self) -> &mut RpcDispatcher {
        &mut self.dispatcher
    }

    pub fn callbacks_mut(&mut self) -> &mut LifecycleCallbacks {
        &mut self.callbacks
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // Connection

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_connected)
    }

    /// Opens a fresh session with the server. It becomes connected once the
    /// transport reports the connection.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        if self
            .session
            .as_ref()
            .is_some_and(|session| session.state() != ConnectionState::Disconnected)
        {
            return Err(ClientError::AlreadyConnected);
        }
        let mut session = Session::new(self.server, HostType::Client, &self.config.connection);
        session.connect()?;
        self.session = Some(session);
        Ok(())
    }

    /// Starts disconnecting. Asset loads still in flight are dropped; the
    /// mirror is cleared when the session closes at the end of the tick.
    pub fn disconnect(&mut self) -> Result<(), ClientError> {
        let session = self.session.as_mut().ok_or(ClientError::NotConnected)?;
        session.disconnect();
        self.pending.clear();
        Ok(())
    }

    /// Tells the server this peer wants entity broadcasts
    pub fn ready(&mut self) -> Result<(), ClientError> {
        let session = self.session.as_mut().ok_or(ClientError::NotConnected)?;
        send_ready(session)?;
        Ok(())
    }

    /// Tells the server to stop broadcasting to this peer
    pub fn not_ready(&mut self) -> Result<(), ClientError> {
        let session = self.session.as_mut().ok_or(ClientError::NotConnected)?;
        if !session.is_ready() {
            return Ok(());
        }
        session.queue_frame(
            Frame::new(MessageKind::NotReady, Vec::new()),
            Reliability::Reliable,
        )?;
        session.set_ready(false);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_ready)
    }

    /// Whether a scene change is still being loaded. Inbound frames are
    /// held until [`ReplicationClient::finish_loading`].
    pub fn is_loading(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_loading)
    }

    /// The scene the server last asked for
    pub fn scene(&self) -> Option<&str> {
        self.scene.as_deref()
    }

    /// Resumes frame processing after a scene change and reports Ready
    pub fn finish_loading(&mut self) -> Result<(), ClientError> {
        let session = self.session.as_mut().ok_or(ClientError::NotConnected)?;
        session.set_loading(false);
        send_ready(session)?;
        Ok(())
    }

    // Entities

    pub fn entity(&self, id: &EntityId) -> Option<&ReplicatedEntity> {
        self.mirror.get(id).map(|client_entity| &client_entity.entity)
    }

    /// Mutable access for local writes. Writes to client-authoritative
    /// components of owned entities are sent upstream on the next tick.
    pub fn entity_mut(&mut self, id: &EntityId) -> Option<&mut ReplicatedEntity> {
        self.mirror
            .get_mut(id)
            .map(|client_entity| &mut client_entity.entity)
    }

    pub fn client_entity(&self, id: &EntityId) -> Option<&ClientEntity> {
        self.mirror.get(id)
    }

    pub fn is_owner(&self, id: &EntityId) -> bool {
        self.mirror
            .get(id)
            .is_some_and(|client_entity| client_entity.is_owner)
    }

    pub fn entity_count(&self) -> usize {
        self.mirror.len()
    }

    /// Spawns still waiting on their asset load
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // Remote calls

    /// Queues a call to a server method on a mirrored entity
    pub fn send_server_rpc(
        &mut self,
        id: &EntityId,
        component: ComponentId,
        hash: MethodHash,
        args: Vec<u8>,
    ) -> Result<(), ClientError> {
        if !self.mirror.contains_key(id) {
            return Err(ClientError::EntityNotFound { entity: *id });
        }
        let session = self.session.as_mut().ok_or(ClientError::NotConnected)?;
        let call = RpcCall::new(
            RpcCallHeader {
                entity: *id,
                component,
                hash,
                kind: RpcKind::ServerRpc,
            },
            args,
        );
        session.queue_rpc(&call)?;
        Ok(())
    }

    // Clock

    pub fn clock(&self) -> &ClockSync {
        &self.clock
    }

    /// Smoothed round-trip time to the server, in seconds
    pub fn rtt(&self) -> f64 {
        self.clock.rtt()
    }

    /// Point on the server timeline received snapshots should be shown at
    pub fn interpolation_time(&self, now: Instant) -> f64 {
        self.clock
            .interpolation_time(self.local_time(now), self.config.interpolation_delay)
    }

    fn local_time(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.started).as_secs_f64()
    }

    // Tick

    /// Runs one client tick: takes in transport events, processes received
    /// frames, finishes resolved spawns, pings, sends owned writes upstream
    /// and sends everything queued
    pub fn tick(&mut self, now: Instant) {
        self.receive_events();
        self.process_frames(now);
        self.poll_loads();
        self.send_ping(now);
        self.send_owner_updates(now);
        self.finish_disconnect();
        self.flush();
    }

    fn receive_events(&mut self) {
        for event in self.events.drain() {
            let peer = match &event {
                TransportEvent::Connected(peer) | TransportEvent::Disconnected(peer) => *peer,
                TransportEvent::Received { peer, .. } => *peer,
            };
            if peer != self.server {
                debug!("Ignoring transport event from {}", peer);
                continue;
            }
            let Some(session) = self.session.as_mut() else {
                debug!("Ignoring transport event without a session");
                continue;
            };

            match event {
                TransportEvent::Connected(_) => {
                    if let Err(err) = session.on_transport_connected() {
                        warn!("Unexpected connection confirmation: {}", err);
                        continue;
                    }
                    self.clock.reset();
                    self.ping_timer.ring_manual();
                    if self.config.auto_ready && !session.is_loading() {
                        if let Err(err) = send_ready(session) {
                            warn!("Failed to send Ready: {}", err);
                        }
                    }
                }
                TransportEvent::Disconnected(_) => {
                    session.disconnect();
                }
                TransportEvent::Received { bytes, .. } => {
                    if let Err(err) = session.receive(&bytes) {
                        error!("Framing error from the server, disconnecting: {}", err);
                        session.disconnect();
                    }
                }
            }
        }
    }

    fn process_frames(&mut self, now: Instant) {
        loop {
            let Some(frame) = self.session.as_mut().and_then(Session::pop_frame) else {
                break;
            };
            if let Err(err) = self.handle_frame(frame, now) {
                error!("Disconnecting from the server: {}", err);
                if let Some(session) = self.session.as_mut() {
                    session.disconnect();
                }
                self.pending.clear();
                break;
            }
        }
    }

    fn handle_frame(&mut self, frame: Frame, now: Instant) -> Result<(), ClientError> {
        match frame.kind {
            MessageKind::Pong => {
                let pong: Pong = frame.read_message()?;
                let local_time = self.local_time(now);
                self.clock.on_pong(local_time, &pong);
            }
            MessageKind::SpawnEntity => {
                let record: SpawnRecord = frame.read_message()?;
                self.on_spawn(record);
            }
            MessageKind::DespawnEntity => {
                let record: DespawnRecord = frame.read_message()?;
                self.on_despawn(record.entity);
            }
            MessageKind::OwnerChanged => {
                let record: OwnerRecord = frame.read_message()?;
                self.on_owner_changed(record);
            }
            MessageKind::EntityUpdates => {
                let updates: EntityUpdates = frame.read_message()?;
                for update in updates {
                    self.on_update(update);
                }
            }
            MessageKind::RpcBatch => {
                let mut batch = RpcBatchReader::new(&frame.body);
                while let Some((header, mut args)) = batch.next_record()? {
                    let entity = self
                        .mirror
                        .get_mut(&header.entity)
                        .map(|client_entity| &mut client_entity.entity);
                    match self
                        .dispatcher
                        .dispatch(&self.codecs, entity, &header, &mut args, None)
                    {
                        Ok(_) => {}
                        Err(err @ RpcError::Codec { .. }) => {
                            error!("Skipping call on {}: {}", header.entity, err);
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }
            MessageKind::SceneChange => {
                let message: SceneChange = frame.read_message()?;
                self.on_scene_change(message.scene);
            }
            kind => return Err(FramingError::UnexpectedMessageKind { kind }.into()),
        }
        Ok(())
    }

    fn on_spawn(&mut self, record: SpawnRecord) {
        let id = record.entity;

        // an entity already mirrored is being pushed its full state again
        if let Some(client_entity) = self.mirror.get_mut(&id) {
            let policy = ApplyPolicy::FromServer {
                is_owner: record.is_owner,
            };
            if let Err(err) = client_entity
                .entity
                .apply(&self.codecs, &record.payload, policy)
            {
                error!("Failed to apply full state of {}: {}", id, err);
                return;
            }
            client_entity.pose = record.pose;
            if client_entity.is_owner != record.is_owner {
                client_entity.is_owner = record.is_owner;
                self.callbacks.owner_changed(id, &client_entity.entity);
            }
            return;
        }

        if let Some(pending) = self.pending.get_mut(&id) {
            pending.record = record;
            pending.updates.clear();
            return;
        }

        debug!("Resolving {:?} for {}", record.origin, id);
        let load = self.resolver.resolve(record.origin);
        self.pending.insert(
            id,
            PendingSpawn {
                record,
                load,
                updates: Vec::new(),
            },
        );
    }

    fn on_despawn(&mut self, id: EntityId) {
        if self.remove_from_mirror(id) {
            info!("{} despawned", id);
        } else if self.pending.remove(&id).is_some() {
            debug!("Cancelled pending spawn of {}", id);
        } else {
            debug!("Ignoring despawn of unknown {}", id);
        }
    }

    fn on_owner_changed(&mut self, record: OwnerRecord) {
        if let Some(client_entity) = self.mirror.get_mut(&record.entity) {
            if client_entity.is_owner == record.is_owner {
                return;
            }
            client_entity.is_owner = record.is_owner;
            info!(
                "{} is {} owned by this peer",
                record.entity,
                if record.is_owner { "now" } else { "no longer" }
            );
            self.callbacks
                .owner_changed(record.entity, &client_entity.entity);
        } else if let Some(pending) = self.pending.get_mut(&record.entity) {
            pending.record.is_owner = record.is_owner;
        } else {
            debug!("Ignoring owner change of unknown {}", record.entity);
        }
    }

    fn on_update(&mut self, update: EntityUpdate) {
        if let Some(client_entity) = self.mirror.get_mut(&update.entity) {
            let policy = ApplyPolicy::FromServer {
                is_owner: client_entity.is_owner,
            };
            if let Err(err) = client_entity
                .entity
                .apply(&self.codecs, &update.payload, policy)
            {
                error!(
                    "Failed to apply update to {}, keeping previous state: {}",
                    update.entity, err
                );
            }
        } else if let Some(pending) = self.pending.get_mut(&update.entity) {
            pending.updates.push(update.payload);
        } else {
            debug!("Ignoring update for unknown {}", update.entity);
        }
    }

    fn on_scene_change(&mut self, scene: String) {
        info!("Server changed scene to '{}'", scene);
        if let Some(session) = self.session.as_mut() {
            session.set_loading(true);
            session.set_ready(false);
        }
        self.clear_mirror();
        self.callbacks.scene_changed(&scene);
        self.scene = Some(scene);
    }

    fn poll_loads(&mut self) {
        let mut ids: Vec<EntityId> = self.pending.keys().copied().collect();
        ids.sort();
        for id in ids {
            let Some(result) = self.pending.get(&id).and_then(|pending| pending.load.poll())
            else {
                continue;
            };
            if let Some(pending) = self.pending.remove(&id) {
                self.finish_spawn(id, pending, result);
            }
        }
    }

    fn finish_spawn(
        &mut self,
        id: EntityId,
        pending: PendingSpawn,
        result: Result<AssetComponents, AssetError>,
    ) {
        let PendingSpawn {
            record, updates, ..
        } = pending;

        let components = match result {
            Ok(components) => components,
            Err(err) => {
                error!("Failed to resolve {:?} for {}: {}", record.origin, id, err);
                return;
            }
        };
        let mut entity = match ReplicatedEntity::new(components, &self.codecs) {
            Ok(entity) => entity,
            Err(err) => {
                error!("Resolved {:?} is not replicable: {}", record.origin, err);
                return;
            }
        };
        if let Err(err) = entity.activate(id, None) {
            error!("Failed to activate {}: {}", id, err);
            return;
        }
        entity.set_min_interval(self.config.min_sync_interval);

        let policy = ApplyPolicy::FromServer {
            is_owner: record.is_owner,
        };
        if let Err(err) = entity.apply(&self.codecs, &record.payload, policy) {
            error!("Dropping spawn of {}, its full state does not apply: {}", id, err);
            return;
        }
        for payload in &updates {
            if let Err(err) = entity.apply(&self.codecs, payload, policy) {
                error!("Failed to apply buffered update to {}: {}", id, err);
            }
        }

        info!("Spawned {}", id);
        self.callbacks.spawned(id, &entity);
        self.mirror.insert(
            id,
            ClientEntity {
                entity,
                origin: record.origin,
                pose: record.pose,
                is_owner: record.is_owner,
            },
        );
    }

    fn send_ping(&mut self, now: Instant) {
        let local_time = self.local_time(now);
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.is_connected() || !self.ping_timer.ringing(now) {
            return;
        }
        self.ping_timer.reset(now);
        let ping = self.clock.ping(local_time);
        if let Err(err) = session.queue_message(MessageKind::Ping, &ping, Reliability::Unreliable)
        {
            debug!("Not sending ping: {}", err);
        }
    }

    fn send_owner_updates(&mut self, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.is_connected() {
            return;
        }

        let mut updates = EntityUpdates::new();
        for (id, client_entity) in self.mirror.iter_mut() {
            if !client_entity.entity.has_pending_changes() {
                continue;
            }
            // only owners write upstream
            if !client_entity.is_owner {
                client_entity.entity.discard_changes();
                continue;
            }
            match client_entity.entity.serialize_upstream(&self.codecs, now) {
                Ok(Some(payload)) => updates.push(EntityUpdate::new(*id, payload)),
                Ok(None) => {}
                Err(err) => error!("Failed to serialize {} upstream: {}", id, err),
            }
        }
        if updates.is_empty() {
            return;
        }

        if let Err(err) = session.queue_message(
            MessageKind::OwnerUpdates,
            &updates,
            self.config.connection.update_reliability,
        ) {
            warn!("Failed to queue owner updates: {}", err);
        }
    }

    fn finish_disconnect(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.is_disconnecting() {
            return;
        }
        session.finish_disconnect();
        self.transport.disconnect(self.server);
        self.clear_mirror();
        self.clock.reset();
    }

    fn flush(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(err) = session.flush(&mut self.transport) {
            warn!("Failed to send to the server, disconnecting: {}", err);
            session.disconnect();
        }
    }

    fn clear_mirror(&mut self) {
        self.pending.clear();
        let mut ids: Vec<EntityId> = self.mirror.keys().copied().collect();
        ids.sort();
        for id in ids {
            self.remove_from_mirror(id);
        }
    }

    /// Deactivates a mirrored entity and hands it to the despawned callbacks
    fn remove_from_mirror(&mut self, id: EntityId) -> bool {
        let Some(mut client_entity) = self.mirror.remove(&id) else {
            return false;
        };
        if let Err(err) = client_entity.entity.deactivate() {
            debug!("Removed {} was not active: {}", id, err);
        }
        self.callbacks.despawned(id, &client_entity.entity);
        true
    }
}

fn send_ready(session: &mut Session) -> Result<(), SessionError> {
    if session.is_ready() {
        return Ok(());
    }
    session.queue_frame(
        Frame::new(MessageKind::Ready, Vec::new()),
        Reliability::Reliable,
    )?;
    session.set_ready(true);
    Ok(())
}
