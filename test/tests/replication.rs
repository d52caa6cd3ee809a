//! Entity lifecycle across a server and its clients: spawn, deltas,
//! despawn and respawn, ownership, interest and disconnect policies
use std::{cell::RefCell, rc::Rc, time::Instant};

use skein_server::{
    DespawnMode, ObserveAll, OwnedEntityPolicy, ServerConfig, ServerEntity, ServerError,
};
use skein_shared::{
    ByteWriter, EntityId, EntityState, EntityUpdate, MessageKind, PeerId, Pose, ReplicatedEntity,
    Serde, SpawnOrigin,
};
use skein_test::{
    marker_components, player_components, test_codecs, Input, Position, Score, TestHarness,
    MARKER_ASSET, PLAYER_ASSET, PLAYER_INPUT, PLAYER_POSITION, PLAYER_SCORE, TICK,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn connected(clients: usize) -> TestHarness {
    let mut harness = TestHarness::new();
    for _ in 0..clients {
        harness.add_client();
    }
    harness.tick_n(2);
    harness
}

fn spawn_player(harness: &mut TestHarness, owner: Option<usize>) -> EntityId {
    let owner = owner.map(|index| harness.peer(index));
    let id = harness
        .server
        .spawn(player_components(), SpawnOrigin::Asset(PLAYER_ASSET), None, owner)
        .unwrap();
    harness.tick();
    id
}

fn owner_updates(updates: Vec<EntityUpdate>) -> Vec<u8> {
    let mut writer = ByteWriter::new();
    updates.ser(&mut writer);
    writer.to_bytes()
}

/// An upstream payload setting `Input::dx`, as the owner would send it
fn input_payload(dx: f32) -> Vec<u8> {
    let codecs = test_codecs();
    let mut entity = ReplicatedEntity::new(player_components(), &codecs).unwrap();
    entity
        .mutate::<Input, _>(PLAYER_INPUT, 0, |input| input.dx = dx)
        .unwrap();
    entity
        .serialize_upstream(&codecs, Instant::now())
        .unwrap()
        .unwrap()
}

// Spawn & Update

#[test]
fn spawn_carries_state_and_pose() {
    init_logging();
    let mut harness = connected(1);

    let mut components = player_components();
    components[0] = Box::new(Position::new(1.0, 2.0, 3.0));
    let pose = Pose::at([1.0, 2.0, 3.0]);
    let id = harness
        .server
        .spawn(components, SpawnOrigin::Asset(PLAYER_ASSET), Some(pose), None)
        .unwrap();
    harness.tick();

    let client_entity = harness.client(0).client_entity(&id).unwrap();
    assert_eq!(client_entity.origin, SpawnOrigin::Asset(PLAYER_ASSET));
    assert_eq!(client_entity.pose, Some(pose));
    assert!(!client_entity.is_owner);
    assert_eq!(
        client_entity.entity.component::<Position>(),
        Some(&Position::new(1.0, 2.0, 3.0))
    );
    assert_eq!(client_entity.entity.id(), id);
}

#[test]
fn late_joiner_receives_current_state() {
    init_logging();
    let mut harness = connected(0);
    let id = spawn_player(&mut harness, None);
    harness
        .server
        .entity_mut(&id)
        .unwrap()
        .mutate::<Score, _>(PLAYER_SCORE, 0, |score| score.points = 12)
        .unwrap();
    harness.tick();

    let client = harness.add_client();
    harness.tick_n(2);
    let score = harness.client(client).entity(&id).unwrap().component::<Score>();
    assert_eq!(score, Some(&Score { points: 12 }));
}

#[test]
fn deltas_follow_server_writes() {
    init_logging();
    let mut harness = connected(2);
    let id = spawn_player(&mut harness, None);

    for step in 1..=3u32 {
        harness
            .server
            .entity_mut(&id)
            .unwrap()
            .mutate::<Score, _>(PLAYER_SCORE, 0, |score| score.points = step * 10)
            .unwrap();
        harness.tick();
        for index in 0..2 {
            let score = harness.client(index).entity(&id).unwrap().component::<Score>();
            assert_eq!(score.map(|score| score.points), Some(step * 10));
        }
    }
}

#[test]
fn min_sync_interval_spaces_deltas() {
    init_logging();
    let mut harness = TestHarness::with_config(ServerConfig {
        min_sync_interval: TICK * 3 + TICK / 2,
        ..Default::default()
    });
    harness.add_client();
    harness.tick_n(2);

    // written in the spawn tick, so the first delta rides along with it
    let id = harness
        .server
        .spawn(player_components(), SpawnOrigin::Asset(PLAYER_ASSET), None, None)
        .unwrap();
    harness.clear_server_sent();

    let mut sent = Vec::new();
    for step in 1..=8u32 {
        harness
            .server
            .entity_mut(&id)
            .unwrap()
            .mutate::<Score, _>(PLAYER_SCORE, 0, |score| score.points = step)
            .unwrap();
        harness.tick();
        sent.push(harness.count_server_sent(0, MessageKind::EntityUpdates));
        harness.clear_server_sent();
    }
    assert_eq!(sent, vec![1, 0, 0, 0, 1, 0, 0, 0]);
    let score = harness.client(0).entity(&id).unwrap().component::<Score>();
    assert_eq!(score, Some(&Score { points: 5 }));

    // the held write goes out once the interval has passed
    harness.tick();
    let score = harness.client(0).entity(&id).unwrap().component::<Score>();
    assert_eq!(score, Some(&Score { points: 8 }));
}

#[test]
fn quiet_entities_send_nothing() {
    init_logging();
    let mut harness = connected(1);
    spawn_player(&mut harness, None);
    harness.clear_server_sent();

    harness.tick_n(3);
    assert_eq!(harness.count_server_sent(0, MessageKind::EntityUpdates), 0);
}

// Despawn & Respawn

#[test]
fn despawn_returns_a_reusable_shell() {
    init_logging();
    let mut harness = connected(1);
    let despawned = Rc::new(RefCell::new(Vec::new()));
    let seen = despawned.clone();
    harness
        .client_mut(0)
        .callbacks_mut()
        .on_despawned(move |id, _| seen.borrow_mut().push(id));

    let id = spawn_player(&mut harness, None);
    harness
        .server
        .entity_mut(&id)
        .unwrap()
        .mutate::<Score, _>(PLAYER_SCORE, 0, |score| score.points = 5)
        .unwrap();
    harness.tick();

    let shell = harness
        .server
        .despawn(&id, DespawnMode::Despawn)
        .unwrap()
        .unwrap();
    harness.tick();
    assert!(harness.server.entity(&id).is_none());
    assert!(harness.client(0).entity(&id).is_none());
    assert_eq!(*despawned.borrow(), vec![id]);

    let respawned = harness.server.respawn(shell, None).unwrap();
    assert_ne!(respawned, id);
    harness.tick();
    let score = harness.client(0).entity(&respawned).unwrap().component::<Score>();
    assert_eq!(score, Some(&Score { points: 5 }));
}

#[test]
fn destroy_keeps_nothing() {
    init_logging();
    let mut harness = connected(1);
    let id = spawn_player(&mut harness, None);

    let shell = harness.server.despawn(&id, DespawnMode::Destroy).unwrap();
    assert!(shell.is_none());
    harness.tick();
    assert_eq!(harness.client(0).entity_count(), 0);

    let missing = harness.server.despawn(&id, DespawnMode::Destroy);
    assert!(matches!(missing, Err(ServerError::EntityNotFound { .. })));
}

#[test]
fn only_shells_can_respawn() {
    init_logging();
    let mut harness = connected(0);
    let entity = ReplicatedEntity::new(marker_components(), harness.server.codecs()).unwrap();
    let fresh = ServerEntity::new(entity, SpawnOrigin::Asset(MARKER_ASSET), None);
    assert!(matches!(
        harness.server.respawn(fresh, None),
        Err(ServerError::NotAShell)
    ));
}

#[test]
fn removals_while_not_ready_reach_the_peer() {
    init_logging();
    let mut harness = connected(1);
    let states = Rc::new(RefCell::new(Vec::new()));
    let seen = states.clone();
    harness
        .client_mut(0)
        .callbacks_mut()
        .on_despawned(move |id, entity| seen.borrow_mut().push((id, entity.is_active())));

    let doomed = spawn_player(&mut harness, None);
    let kept = spawn_player(&mut harness, None);

    harness.client_mut(0).not_ready().unwrap();
    harness.tick_n(2);
    assert_eq!(harness.server_session(0).unwrap().observed_count(), 0);
    assert_eq!(harness.client(0).entity_count(), 0);
    assert_eq!(*states.borrow(), vec![(doomed, false), (kept, false)]);

    harness.server.despawn(&doomed, DespawnMode::Destroy).unwrap();
    harness.tick();

    harness.client_mut(0).ready().unwrap();
    harness.tick_n(2);
    assert!(harness.client(0).entity(&doomed).is_none());
    assert!(harness.client(0).entity(&kept).is_some());
    assert_eq!(harness.client(0).entity_count(), harness.server.entity_count());
}

// Ownership

#[test]
fn ownership_moves_between_peers() {
    init_logging();
    let mut harness = connected(2);
    let changes = Rc::new(RefCell::new(Vec::new()));
    let seen = changes.clone();
    harness
        .client_mut(1)
        .callbacks_mut()
        .on_owner_changed(move |id, _| seen.borrow_mut().push(id));

    let id = spawn_player(&mut harness, Some(0));
    assert!(harness.client(0).is_owner(&id));
    assert!(!harness.client(1).is_owner(&id));

    let new_owner = harness.peer(1);
    harness.server.set_owner(&id, Some(new_owner)).unwrap();
    harness.tick();

    assert!(!harness.client(0).is_owner(&id));
    assert!(harness.client(1).is_owner(&id));
    assert_eq!(*changes.borrow(), vec![id]);
    assert_eq!(harness.server.entity(&id).unwrap().owner(), Some(new_owner));
}

#[test]
fn owner_input_flows_upstream() {
    init_logging();
    let mut harness = connected(1);
    let id = spawn_player(&mut harness, Some(0));

    harness
        .client_mut(0)
        .entity_mut(&id)
        .unwrap()
        .mutate::<Input, _>(PLAYER_INPUT, 1, |input| input.jump = true)
        .unwrap();
    harness.tick_n(2);

    let input = harness.server.entity(&id).unwrap().component::<Input>();
    assert_eq!(input.map(|input| input.jump), Some(true));
    assert!(!harness.client(0).entity(&id).unwrap().has_pending_changes());
}

#[test]
fn observer_writes_stay_local() {
    init_logging();
    let mut harness = connected(2);
    let id = spawn_player(&mut harness, Some(0));

    let observer = harness.client_mut(1).entity_mut(&id).unwrap();
    observer
        .mutate::<Input, _>(PLAYER_INPUT, 0, |input| input.dx = 9.0)
        .unwrap();
    observer
        .mutate::<Position, _>(PLAYER_POSITION, 0, |position| position.x = 9.0)
        .unwrap();
    harness.tick_n(2);

    let server_entity = harness.server.entity(&id).unwrap();
    assert_eq!(server_entity.component::<Input>().unwrap().dx, 0.0);
    assert_eq!(server_entity.component::<Position>().unwrap().x, 0.0);
    assert!(!harness.client(1).entity(&id).unwrap().has_pending_changes());
}

#[test]
fn forged_owner_updates_are_dropped() {
    init_logging();
    let mut harness = connected(2);
    let id = spawn_player(&mut harness, Some(0));

    let body = owner_updates(vec![EntityUpdate::new(id, input_payload(4.0))]);
    harness.inject_frame_to_server(1, MessageKind::OwnerUpdates, body);
    harness.tick_n(2);

    assert_eq!(
        harness.server.entity(&id).unwrap().component::<Input>().unwrap().dx,
        0.0
    );
    assert!(harness.server_session(1).unwrap().is_connected());
}

#[test]
fn owner_cannot_write_server_authoritative_state() {
    init_logging();
    let mut harness = connected(1);
    let id = spawn_player(&mut harness, Some(0));

    let codecs = test_codecs();
    let mut forged = ReplicatedEntity::new(player_components(), &codecs).unwrap();
    forged
        .mutate::<Position, _>(PLAYER_POSITION, 0, |position| position.x = 100.0)
        .unwrap();
    forged
        .mutate::<Input, _>(PLAYER_INPUT, 0, |input| input.dx = 1.0)
        .unwrap();
    let payload = forged
        .serialize(&codecs, false, Instant::now())
        .unwrap()
        .observer
        .unwrap();

    let body = owner_updates(vec![EntityUpdate::new(id, payload)]);
    harness.inject_frame_to_server(0, MessageKind::OwnerUpdates, body);
    harness.tick_n(2);

    // the whole payload is refused, including the client-authoritative part
    let server_entity = harness.server.entity(&id).unwrap();
    assert_eq!(server_entity.component::<Position>().unwrap().x, 0.0);
    assert_eq!(server_entity.component::<Input>().unwrap().dx, 0.0);
    assert!(harness.server_session(0).unwrap().is_connected());
}

#[test]
fn undecodable_owner_update_disconnects_the_owner() {
    init_logging();
    let mut harness = connected(1);
    let id = spawn_player(&mut harness, Some(0));

    let mut payload = input_payload(2.0);
    payload.pop();
    let body = owner_updates(vec![EntityUpdate::new(id, payload)]);
    harness.inject_frame_to_server(0, MessageKind::OwnerUpdates, body);
    harness.tick_n(2);

    assert!(harness.server_session(0).is_none());
    assert!(harness.server.entity(&id).is_none());
}

#[test]
fn full_state_push_overwrites_a_stale_mirror() {
    init_logging();
    let mut harness = connected(1);
    let id = spawn_player(&mut harness, None);
    harness
        .server
        .entity_mut(&id)
        .unwrap()
        .mutate::<Score, _>(PLAYER_SCORE, 0, |score| score.points = 7)
        .unwrap();
    harness.tick();

    // a local write the server never sees
    harness
        .client_mut(0)
        .entity_mut(&id)
        .unwrap()
        .mutate::<Position, _>(PLAYER_POSITION, 0, |position| position.x = 9.0)
        .unwrap();
    harness.tick();
    let mirror = harness.client(0).entity(&id).unwrap();
    assert_eq!(mirror.component::<Position>().unwrap().x, 9.0);

    let peer = harness.peer(0);
    harness.server.push_full_state(&id, &peer).unwrap();
    harness.tick();

    let mirror = harness.client(0).entity(&id).unwrap();
    let server_entity = harness.server.entity(&id).unwrap();
    assert_eq!(mirror.component::<Position>(), server_entity.component::<Position>());
    assert_eq!(mirror.component::<Score>(), Some(&Score { points: 7 }));
}

#[test]
fn full_state_push_reaches_a_peer_outside_interest() {
    init_logging();
    let mut harness = connected(2);
    let outsider = harness.peer(1);
    harness
        .server
        .set_interest_policy(move |peer: PeerId, _: EntityId, _: &ServerEntity| peer != outsider);
    let id = spawn_player(&mut harness, None);
    assert!(harness.client(1).entity(&id).is_none());

    harness.server.push_full_state(&id, &outsider).unwrap();
    harness.tick();
    assert_eq!(harness.count_server_sent(1, MessageKind::SpawnEntity), 1);
    assert!(harness.server_session(1).unwrap().observes(&id));
    let client_entity = harness.client(1).client_entity(&id).unwrap();
    assert!(!client_entity.is_owner);
    assert_eq!(client_entity.origin, SpawnOrigin::Asset(PLAYER_ASSET));

    harness.client_mut(0).not_ready().unwrap();
    harness.tick_n(2);
    let peer = harness.peer(0);
    assert!(matches!(
        harness.server.push_full_state(&id, &peer),
        Err(ServerError::PeerNotReady { .. })
    ));
}

// Interest

#[test]
fn interest_policy_isolates_observers() {
    init_logging();
    let mut harness = TestHarness::new();
    let insider = harness.add_client();
    let outsider = harness.add_client();
    let insider_peer = harness.peer(insider);
    harness.server.set_interest_policy(
        move |peer: PeerId, _: EntityId, entity: &ServerEntity| {
            peer == insider_peer || entity.origin != SpawnOrigin::Asset(PLAYER_ASSET)
        },
    );
    harness.tick_n(2);

    let player = spawn_player(&mut harness, None);
    let marker = harness
        .server
        .spawn(marker_components(), SpawnOrigin::Asset(MARKER_ASSET), None, None)
        .unwrap();
    harness.tick();

    assert!(harness.client(insider).entity(&player).is_some());
    assert!(harness.client(insider).entity(&marker).is_some());
    assert!(harness.client(outsider).entity(&player).is_none());
    assert!(harness.client(outsider).entity(&marker).is_some());

    harness.clear_server_sent();
    harness
        .server
        .entity_mut(&player)
        .unwrap()
        .mutate::<Score, _>(PLAYER_SCORE, 0, |score| score.points = 3)
        .unwrap();
    harness.tick();
    assert_eq!(harness.count_server_sent(insider, MessageKind::EntityUpdates), 1);
    assert_eq!(harness.count_server_sent(outsider, MessageKind::EntityUpdates), 0);

    // widening interest spawns what the peer was missing
    harness.server.set_interest_policy(ObserveAll);
    let outsider_peer = harness.peer(outsider);
    harness.server.refresh_interest(&outsider_peer).unwrap();
    harness.tick();
    let score = harness.client(outsider).entity(&player).unwrap().component::<Score>();
    assert_eq!(score, Some(&Score { points: 3 }));
}

// Disconnects

#[test]
fn disconnect_destroys_owned_entities() {
    init_logging();
    let mut harness = connected(2);
    let owned = spawn_player(&mut harness, Some(0));
    let shared = spawn_player(&mut harness, None);

    harness.client_mut(0).disconnect().unwrap();
    harness.tick_n(3);

    assert!(harness.server_session(0).is_none());
    assert!(harness.server.entity(&owned).is_none());
    assert!(harness.server.entity(&shared).is_some());
    assert!(harness.client(1).entity(&owned).is_none());
    assert!(harness.client(1).entity(&shared).is_some());
    assert_eq!(harness.client(0).entity_count(), 0);
    assert!(!harness.client(0).is_connected());
}

#[test]
fn disconnect_can_leave_entities_ownerless() {
    init_logging();
    let mut harness = TestHarness::with_config(ServerConfig {
        owned_entity_policy: OwnedEntityPolicy::KeepOwnerless,
        ..Default::default()
    });
    harness.add_client();
    harness.add_client();
    harness.tick_n(2);
    let owned = spawn_player(&mut harness, Some(0));

    harness.drop_link(0);
    harness.tick_n(2);

    assert!(harness.server_session(0).is_none());
    assert_eq!(harness.server.entity(&owned).unwrap().owner(), None);
    assert!(harness.client(1).entity(&owned).is_some());
}

#[test]
fn disconnect_hands_out_deactivated_entities() {
    init_logging();
    let mut harness = connected(1);
    let states = Rc::new(RefCell::new(Vec::new()));
    let seen = states.clone();
    harness
        .client_mut(0)
        .callbacks_mut()
        .on_despawned(move |_, entity| seen.borrow_mut().push(entity.state()));
    spawn_player(&mut harness, None);
    spawn_player(&mut harness, None);

    harness.client_mut(0).disconnect().unwrap();
    harness.tick_n(2);

    assert_eq!(harness.client(0).entity_count(), 0);
    assert_eq!(*states.borrow(), vec![EntityState::Despawned; 2]);
}

#[test]
fn server_can_disconnect_a_peer() {
    init_logging();
    let mut harness = connected(2);
    let peer = harness.peer(0);
    harness.server.disconnect(&peer).unwrap();
    harness.tick_n(2);

    assert!(harness.server_session(0).is_none());
    assert!(!harness.client(0).is_connected());
    assert!(harness.server_session(1).unwrap().is_connected());

    let unknown = PeerId::new(99);
    assert!(matches!(
        harness.server.disconnect(&unknown),
        Err(ServerError::PeerNotFound { .. })
    ));
}
