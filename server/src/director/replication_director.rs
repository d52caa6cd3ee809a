use std::{collections::HashMap, time::Instant};

use log::{debug, error, info, warn};

use skein_shared::{
    ApplyPolicy, ByteReader, CallerInfo, CodecError, CodecRegistry, ComponentId, ConfigError,
    DespawnRecord, EntityId, EntityState, EntityUpdate, EntityUpdates, EventQueue, EventSender,
    Frame, FramingError, HostType, LifecycleCallbacks, MessageKind, MethodHash, OwnerRecord,
    PeerId, Ping, Pong, Pose, Reliability, Replicated, ReplicatedEntity, RpcBatchReader, RpcCall,
    RpcCallHeader, RpcContext, RpcDispatcher, RpcKind, SceneChange, Session, SpawnOrigin,
    SpawnRecord, Transport, TransportEvent,
};

use crate::{
    director::server_config::{OwnedEntityPolicy, ServerConfig},
    error::ServerError,
    interest::{InterestPolicy, ObserveAll},
    server_entity::ServerEntity,
};

/// Whether a removed entity's shell is handed back for reuse
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DespawnMode {
    /// Deactivate and return the shell, e.g. for a pre-placed scene entity
    Despawn,
    /// Remove permanently
    Destroy,
}

/// The authoritative side of replication. Owns the entity table and one
/// [`Session`] per connected peer, and is driven by calling
/// [`ReplicationDirector::tick`] once per frame.
pub struct ReplicationDirector<T: Transport> {
    config: ServerConfig,
    codecs: CodecRegistry,
    dispatcher: RpcDispatcher,
    transport: T,
    events: EventQueue,
    sessions: HashMap<PeerId, Session>,
    entities: HashMap<EntityId, ServerEntity>,
    next_entity_id: u32,
    callbacks: LifecycleCallbacks,
    interest: Box<dyn InterestPolicy>,
    started: Instant,
}

impl<T: Transport> ReplicationDirector<T> {
    /// Create a new ReplicationDirector
    pub fn new(config: ServerConfig, codecs: CodecRegistry, transport: T) -> Self {
        Self {
            config,
            codecs,
            dispatcher: RpcDispatcher::new(HostType::Server),
            transport,
            events: EventQueue::new(),
            sessions: HashMap::new(),
            entities: HashMap::new(),
            next_entity_id: 1,
            callbacks: LifecycleCallbacks::new(),
            interest: Box::new(ObserveAll),
            started: Instant::now(),
        }
    }

    // Setup

    /// Handle the transport uses to report connections and received bytes
    pub fn event_sender(&self) -> EventSender {
        self.events.sender()
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Registers a method clients may call, or one this side's clients
    /// implement. See [`RpcDispatcher::register_method`].
    pub fn register_rpc<C, F>(
        &mut self,
        signature: &str,
        kind: RpcKind,
        owner_only: bool,
        f: F,
    ) -> Result<MethodHash, ConfigError>
    where
        C: Replicated,
        F: FnMut(&mut C, &mut ByteReader, &RpcContext) -> Result<(), CodecError> + Send + 'static,
    {
        self.dispatcher
            .register_method::<C, F>(signature, kind, owner_only, f)
    }

    pub fn dispatcher_mut(&mut self) -> &mut RpcDispatcher {
        &mut self.dispatcher
    }

    pub fn set_interest_policy<P: InterestPolicy + 'static>(&mut self, policy: P) {
        self.interest = Box::new(policy);
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

    // Sessions

    pub fn session(&self, peer: &PeerId) -> Option<&Session> {
        self.sessions.get(peer)
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerId> {
        self.sessions.keys()
    }

    /// Starts disconnecting a peer. Frames it already sent are still
    /// processed; the session closes at the end of the next tick.
    pub fn disconnect(&mut self, peer: &PeerId) -> Result<(), ServerError> {
        let session = self
            .sessions
            .get_mut(peer)
            .ok_or(ServerError::PeerNotFound { peer: *peer })?;
        session.disconnect();
        Ok(())
    }

    /// Seconds since this director was created, as sent in pongs
    pub fn server_time(&self, now: Instant) -> f64 {
        seconds_since(self.started, now)
    }

    // Entities

    pub fn entity(&self, id: &EntityId) -> Option<&ReplicatedEntity> {
        self.entities.get(id).map(|server_entity| &server_entity.entity)
    }

    /// Mutable access for gameplay writes. Use
    /// [`ReplicatedEntity::mutate`] so the change is replicated.
    pub fn entity_mut(&mut self, id: &EntityId) -> Option<&mut ReplicatedEntity> {
        self.entities
            .get_mut(id)
            .map(|server_entity| &mut server_entity.entity)
    }

    pub fn server_entity(&self, id: &EntityId) -> Option<&ServerEntity> {
        self.entities.get(id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Builds an entity from `components`, assigns it the next id and sends
    /// a spawn record to every ready peer interested in it
    pub fn spawn(
        &mut self,
        components: Vec<Box<dyn Replicated>>,
        origin: SpawnOrigin,
        pose: Option<Pose>,
        owner: Option<PeerId>,
    ) -> Result<EntityId, ServerError> {
        let entity = ReplicatedEntity::new(components, &self.codecs)?;
        self.activate(ServerEntity::new(entity, origin, pose), owner)
    }

    /// Spawns a shell previously returned by [`DespawnMode::Despawn`] under a
    /// fresh id
    pub fn respawn(
        &mut self,
        shell: ServerEntity,
        owner: Option<PeerId>,
    ) -> Result<EntityId, ServerError> {
        if shell.entity.state() != EntityState::Despawned {
            return Err(ServerError::NotAShell);
        }
        self.activate(shell, owner)
    }

    fn activate(
        &mut self,
        mut server_entity: ServerEntity,
        owner: Option<PeerId>,
    ) -> Result<EntityId, ServerError> {
        let id = EntityId::new(self.next_entity_id);
        let payload = server_entity.entity.serialize_full(&self.codecs)?;
        server_entity.entity.activate(id, owner)?;
        self.next_entity_id += 1;
        server_entity
            .entity
            .set_min_interval(self.config.min_sync_interval);
        // the spawn record carries everything written so far
        server_entity.entity.discard_changes();

        for session in self.sessions.values_mut() {
            if !session.is_ready()
                || !self
                    .interest
                    .is_interested(session.peer(), id, &server_entity)
            {
                continue;
            }
            if let Err(err) = queue_spawn(session, id, &server_entity, payload.clone()) {
                warn!("Failed to send spawn of {} to {}: {}", id, session.peer(), err);
            }
        }

        info!("Spawned {}", id);
        self.callbacks.spawned(id, &server_entity.entity);
        self.entities.insert(id, server_entity);
        Ok(id)
    }

    /// Removes an entity from the table and from every peer observing it.
    /// With [`DespawnMode::Despawn`] the deactivated shell is returned.
    pub fn despawn(
        &mut self,
        id: &EntityId,
        mode: DespawnMode,
    ) -> Result<Option<ServerEntity>, ServerError> {
        let mut server_entity = self
            .entities
            .remove(id)
            .ok_or(ServerError::EntityNotFound { entity: *id })?;

        for session in self.sessions.values_mut() {
            if !session.unobserve(id) {
                continue;
            }
            let record = DespawnRecord { entity: *id };
            if let Err(err) =
                session.queue_message(MessageKind::DespawnEntity, &record, Reliability::Reliable)
            {
                debug!("Not sending despawn of {} to {}: {}", id, session.peer(), err);
            }
        }

        self.callbacks.despawned(*id, &server_entity.entity);
        server_entity.entity.deactivate()?;

        match mode {
            DespawnMode::Despawn => {
                info!("Despawned {}", id);
                Ok(Some(server_entity))
            }
            DespawnMode::Destroy => {
                info!("Destroyed {}", id);
                Ok(None)
            }
        }
    }

    /// Changes which peer receives the owner channel for an entity. Old and
    /// new owners that observe the entity are told; no state is resent.
    pub fn set_owner(&mut self, id: &EntityId, owner: Option<PeerId>) -> Result<(), ServerError> {
        let server_entity = self
            .entities
            .get_mut(id)
            .ok_or(ServerError::EntityNotFound { entity: *id })?;
        let previous = server_entity.entity.owner();
        if previous == owner {
            return Ok(());
        }
        server_entity.entity.set_owner(owner);

        for (peer, is_owner) in [(previous, false), (owner, true)] {
            let Some(peer) = peer else {
                continue;
            };
            let Some(session) = self.sessions.get_mut(&peer) else {
                continue;
            };
            if !session.observes(id) {
                continue;
            }
            let record = OwnerRecord {
                entity: *id,
                is_owner,
            };
            if let Err(err) =
                session.queue_message(MessageKind::OwnerChanged, &record, Reliability::Reliable)
            {
                debug!("Not sending owner change of {} to {}: {}", id, peer, err);
            }
        }

        info!("{} is now owned by {:?}", id, owner);
        self.callbacks.owner_changed(*id, &server_entity.entity);
        Ok(())
    }

    /// Re-sends a full spawn record of an entity to one ready peer
    pub fn push_full_state(&mut self, id: &EntityId, peer: &PeerId) -> Result<(), ServerError> {
        let session = self
            .sessions
            .get_mut(peer)
            .ok_or(ServerError::PeerNotFound { peer: *peer })?;
        if !session.is_ready() {
            return Err(ServerError::PeerNotReady { peer: *peer });
        }
        let server_entity = self
            .entities
            .get(id)
            .ok_or(ServerError::EntityNotFound { entity: *id })?;
        let payload = server_entity.entity.serialize_full(&self.codecs)?;
        queue_spawn(session, *id, server_entity, payload)
    }

    /// Recomputes a ready peer's observer set against the interest policy,
    /// spawning and despawning on the peer as it changes
    pub fn refresh_interest(&mut self, peer: &PeerId) -> Result<(), ServerError> {
        let session = self
            .sessions
            .get_mut(peer)
            .ok_or(ServerError::PeerNotFound { peer: *peer })?;
        if !session.is_ready() {
            return Ok(());
        }
        sync_interest(&self.codecs, self.interest.as_ref(), &self.entities, session)
    }

    // Remote calls

    /// Queues a call to every ready peer observing the entity, optionally
    /// skipping its owner. Returns how many peers it was queued for.
    pub fn send_client_rpc(
        &mut self,
        id: &EntityId,
        component: ComponentId,
        hash: MethodHash,
        args: Vec<u8>,
        skip_owner: bool,
    ) -> Result<usize, ServerError> {
        let server_entity = self
            .entities
            .get(id)
            .ok_or(ServerError::EntityNotFound { entity: *id })?;
        let owner = server_entity.entity.owner();
        let call = RpcCall::new(
            RpcCallHeader {
                entity: *id,
                component,
                hash,
                kind: RpcKind::ClientRpc,
            },
            args,
        );

        let mut queued = 0;
        for session in self.sessions.values_mut() {
            if !session.is_ready() || !session.observes(id) {
                continue;
            }
            if skip_owner && owner == Some(session.peer()) {
                continue;
            }
            session.queue_rpc(&call)?;
            queued += 1;
        }
        Ok(queued)
    }

    /// Queues a call to one peer: `target` if given, else the entity's
    /// owner. With neither the call is dropped.
    pub fn send_target_rpc(
        &mut self,
        id: &EntityId,
        component: ComponentId,
        hash: MethodHash,
        args: Vec<u8>,
        target: Option<PeerId>,
    ) -> Result<(), ServerError> {
        let server_entity = self
            .entities
            .get(id)
            .ok_or(ServerError::EntityNotFound { entity: *id })?;
        let Some(peer) = target.or(server_entity.entity.owner()) else {
            error!(
                "Dropping target call {} on {}: no target given and the entity has no owner",
                hash, id
            );
            return Err(ServerError::NoRpcTarget { entity: *id });
        };
        let session = self
            .sessions
            .get_mut(&peer)
            .ok_or(ServerError::PeerNotFound { peer })?;
        if !session.is_ready() {
            return Err(ServerError::PeerNotReady { peer });
        }
        let call = RpcCall::new(
            RpcCallHeader {
                entity: *id,
                component,
                hash,
                kind: RpcKind::TargetRpc,
            },
            args,
        );
        session.queue_rpc(&call)?;
        Ok(())
    }

    // Scenes

    /// Tells every connected peer to load `scene`. Peers become not ready
    /// and forget what they observed; each reports Ready again once loaded.
    pub fn change_scene(&mut self, scene: &str) {
        info!("Changing scene to '{}'", scene);
        let message = SceneChange {
            scene: scene.to_string(),
        };
        for session in self.sessions.values_mut() {
            if !session.is_connected() {
                continue;
            }
            session.set_ready(false);
            if let Err(err) =
                session.queue_message(MessageKind::SceneChange, &message, Reliability::Reliable)
            {
                warn!("Failed to send scene change to {}: {}", session.peer(), err);
            }
        }
    }

    // Tick

    /// Runs one server tick: takes in transport events, processes every
    /// received frame, replicates dirty entities, closes drained sessions
    /// and sends everything queued
    pub fn tick(&mut self, now: Instant) {
        self.receive_events();
        self.process_frames(now);
        self.replicate(now);
        self.finish_disconnects();
        self.send_all();
    }

    fn receive_events(&mut self) {
        for event in self.events.drain() {
            match event {
                TransportEvent::Connected(peer) => self.accept(peer),
                TransportEvent::Disconnected(peer) => {
                    if let Some(session) = self.sessions.get_mut(&peer) {
                        session.disconnect();
                    }
                }
                TransportEvent::Received { peer, bytes, .. } => {
                    let Some(session) = self.sessions.get_mut(&peer) else {
                        debug!("Ignoring {} bytes from unknown {}", bytes.len(), peer);
                        continue;
                    };
                    if let Err(err) = session.receive(&bytes) {
                        error!("Framing error from {}, disconnecting: {}", peer, err);
                        session.disconnect();
                    }
                }
            }
        }
    }

    fn accept(&mut self, peer: PeerId) {
        if self.sessions.contains_key(&peer) {
            warn!("{} connected again while its session was open", peer);
            self.close_session(peer);
        }
        let mut session = Session::new(peer, HostType::Server, &self.config.connection);
        if let Err(err) = session
            .connect()
            .and_then(|_| session.on_transport_connected())
        {
            error!("Failed to open session with {}: {}", peer, err);
            return;
        }
        self.sessions.insert(peer, session);
    }

    fn process_frames(&mut self, now: Instant) {
        let peers: Vec<PeerId> = self.sessions.keys().copied().collect();
        for peer in peers {
            loop {
                let Some(frame) = self
                    .sessions
                    .get_mut(&peer)
                    .and_then(|session| session.pop_frame())
                else {
                    break;
                };
                if let Err(err) = self.handle_frame(peer, frame, now) {
                    error!("Disconnecting {}: {}", peer, err);
                    if let Some(session) = self.sessions.get_mut(&peer) {
                        session.disconnect();
                    }
                    break;
                }
            }
        }
    }

    fn handle_frame(&mut self, peer: PeerId, frame: Frame, now: Instant) -> Result<(), ServerError> {
        let server_time = seconds_since(self.started, now);
        let Some(session) = self.sessions.get_mut(&peer) else {
            return Ok(());
        };

        match frame.kind {
            MessageKind::Ready => {
                if !session.is_connected() || session.is_ready() {
                    return Ok(());
                }
                session.set_ready(true);
                sync_interest(&self.codecs, self.interest.as_ref(), &self.entities, session)?;
            }
            MessageKind::NotReady => {
                if !session.is_ready() {
                    return Ok(());
                }
                despawn_observed(session)?;
                session.set_ready(false);
            }
            MessageKind::Ping => {
                let ping: Ping = frame.read_message()?;
                if session.is_connected() {
                    let pong = Pong {
                        client_time: ping.client_time,
                        server_time,
                    };
                    session.queue_message(MessageKind::Pong, &pong, Reliability::Unreliable)?;
                }
            }
            MessageKind::OwnerUpdates => {
                let updates: EntityUpdates = frame.read_message()?;
                for update in updates {
                    let Some(server_entity) = self.entities.get_mut(&update.entity) else {
                        warn!(
                            "Dropping owner update from {} for {}: entity not found",
                            peer, update.entity
                        );
                        continue;
                    };
                    if !server_entity.entity.is_owned_by(&peer) {
                        warn!(
                            "Dropping owner update from {} for {}: peer is not the owner",
                            peer, update.entity
                        );
                        continue;
                    }
                    match server_entity.entity.apply(
                        &self.codecs,
                        &update.payload,
                        ApplyPolicy::FromOwner,
                    ) {
                        Ok(applied) => debug!(
                            "Applied owner update from {} to {} ({:?})",
                            peer,
                            update.entity,
                            applied.components()
                        ),
                        Err(err) if err.is_authority_violation() => warn!(
                            "Dropping owner update from {} for {}: {}",
                            peer, update.entity, err
                        ),
                        Err(err) => return Err(err.into()),
                    }
                }
            }
            MessageKind::RpcBatch => {
                let caller = CallerInfo {
                    peer,
                    ready: session.is_ready(),
                };
                let mut batch = RpcBatchReader::new(&frame.body);
                while let Some((header, mut args)) = batch.next_record()? {
                    let entity = self
                        .entities
                        .get_mut(&header.entity)
                        .map(|server_entity| &mut server_entity.entity);
                    self.dispatcher.dispatch(
                        &self.codecs,
                        entity,
                        &header,
                        &mut args,
                        Some(&caller),
                    )?;
                }
            }
            kind => return Err(FramingError::UnexpectedMessageKind { kind }.into()),
        }
        Ok(())
    }

    fn replicate(&mut self, now: Instant) {
        let mut outgoing: HashMap<PeerId, EntityUpdates> = HashMap::new();

        for (id, server_entity) in self.entities.iter_mut() {
            if !server_entity.entity.has_pending_changes() {
                continue;
            }
            let payloads = match server_entity.entity.serialize(&self.codecs, false, now) {
                Ok(payloads) => payloads,
                Err(err) => {
                    error!("Failed to serialize {}: {}", id, err);
                    continue;
                }
            };
            if payloads.is_empty() {
                continue;
            }
            for session in self.sessions.values() {
                if !session.is_ready() || !session.observes(id) {
                    continue;
                }
                let is_owner = server_entity.entity.is_owned_by(&session.peer());
                if let Some(payload) = payloads.for_peer(is_owner) {
                    outgoing
                        .entry(session.peer())
                        .or_default()
                        .push(EntityUpdate::new(*id, payload.clone()));
                }
            }
        }

        for (peer, updates) in outgoing {
            let Some(session) = self.sessions.get_mut(&peer) else {
                continue;
            };
            if let Err(err) = session.queue_message(
                MessageKind::EntityUpdates,
                &updates,
                self.config.connection.update_reliability,
            ) {
                warn!("Failed to queue updates for {}: {}", peer, err);
            }
        }
    }

    fn finish_disconnects(&mut self) {
        let closing: Vec<PeerId> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.is_disconnecting())
            .map(|(peer, _)| *peer)
            .collect();
        for peer in closing {
            self.close_session(peer);
        }
    }

    fn close_session(&mut self, peer: PeerId) {
        let Some(mut session) = self.sessions.remove(&peer) else {
            return;
        };
        session.finish_disconnect();
        self.transport.disconnect(peer);

        let mut owned: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, server_entity)| server_entity.entity.is_owned_by(&peer))
            .map(|(id, _)| *id)
            .collect();
        owned.sort();
        for id in owned {
            let result = match self.config.owned_entity_policy {
                OwnedEntityPolicy::Destroy => self.despawn(&id, DespawnMode::Destroy).map(|_| ()),
                OwnedEntityPolicy::KeepOwnerless => self.set_owner(&id, None),
            };
            if let Err(err) = result {
                warn!("Failed to release {} owned by {}: {}", id, peer, err);
            }
        }
    }

    fn send_all(&mut self) {
        let mut peers: Vec<PeerId> = self.sessions.keys().copied().collect();

        // shuffle order of sessions in order to avoid priority among peers
        fastrand::shuffle(&mut peers);

        for peer in peers {
            let Some(session) = self.sessions.get_mut(&peer) else {
                continue;
            };
            if let Err(err) = session.flush(&mut self.transport) {
                warn!("Failed to send to {}, disconnecting: {}", peer, err);
                session.disconnect();
            }
        }
    }
}

fn seconds_since(start: Instant, now: Instant) -> f64 {
    now.saturating_duration_since(start).as_secs_f64()
}

fn queue_spawn(
    session: &mut Session,
    id: EntityId,
    server_entity: &ServerEntity,
    payload: Vec<u8>,
) -> Result<(), ServerError> {
    let record = SpawnRecord {
        entity: id,
        origin: server_entity.origin,
        is_owner: server_entity.entity.is_owned_by(&session.peer()),
        pose: server_entity.pose,
        payload,
    };
    session.queue_message(MessageKind::SpawnEntity, &record, Reliability::Reliable)?;
    session.observe(id);
    Ok(())
}

/// Brings a ready session's observer set in line with the interest policy
fn sync_interest(
    codecs: &CodecRegistry,
    interest: &dyn InterestPolicy,
    entities: &HashMap<EntityId, ServerEntity>,
    session: &mut Session,
) -> Result<(), ServerError> {
    let peer = session.peer();
    let mut ids: Vec<&EntityId> = entities.keys().collect();
    ids.sort();

    for id in ids {
        let Some(server_entity) = entities.get(id) else {
            continue;
        };
        let interested = interest.is_interested(peer, *id, server_entity);
        let observes = session.observes(id);
        if interested && !observes {
            let payload = server_entity.entity.serialize_full(codecs)?;
            queue_spawn(session, *id, server_entity, payload)?;
        } else if !interested && observes {
            session.unobserve(id);
            session.queue_message(
                MessageKind::DespawnEntity,
                &DespawnRecord { entity: *id },
                Reliability::Reliable,
            )?;
        }
    }
    Ok(())
}

/// Despawns everything a peer observes. Used as the peer stops being ready,
/// since removals made while it is not ready never reach it.
fn despawn_observed(session: &mut Session) -> Result<(), ServerError> {
    let mut ids: Vec<EntityId> = session.observed().copied().collect();
    ids.sort();
    for id in ids {
        session.unobserve(&id);
        session.queue_message(
            MessageKind::DespawnEntity,
            &DespawnRecord { entity: id },
            Reliability::Reliable,
        )?;
    }
    Ok(())
}
