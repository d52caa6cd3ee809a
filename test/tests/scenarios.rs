//! End-to-end scenarios for delta encoding, authority channels, readiness
//! and clock estimation
use std::time::Instant;

use skein_client::ClientConfig;
use skein_shared::{
    ApplyPolicy, ByteReader, ClockSync, ConnectionState, DirtyMask, EntityId, MessageKind, PeerId,
    Pong, Replicated, ReplicatedEntity, Serde, SpawnOrigin,
};
use skein_test::{
    marker_components, player_components, prefab_resolver, test_codecs, Input, Position, Score,
    TestHarness, MARKER_ASSET, PLAYER_ASSET, PLAYER_INPUT, PLAYER_POSITION,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn read_mask(reader: &mut ByteReader) -> u64 {
    DirtyMask::de(reader).unwrap().bits()
}

#[test]
fn one_dirty_field_yields_a_one_field_delta() {
    init_logging();
    let mut harness = TestHarness::new();
    let components: Vec<Box<dyn Replicated>> =
        vec![Box::new(Position::default()), Box::new(Score::default())];
    let id = harness
        .server
        .spawn(components, SpawnOrigin::Asset(MARKER_ASSET), None, None)
        .unwrap();

    let entity = harness.server.entity_mut(&id).unwrap();
    // spawning hands everything to the spawn record
    assert!(!entity.has_pending_changes());
    entity
        .mutate::<Position, _>(0, 2, |position| position.z = 4.5)
        .unwrap();

    let codecs = test_codecs();
    let payloads = entity.serialize(&codecs, false, Instant::now()).unwrap();
    let payload = payloads.for_peer(false).unwrap();

    let mut reader = ByteReader::new(payload);
    assert_eq!(read_mask(&mut reader), 0b01);
    assert_eq!(read_mask(&mut reader), 0b100);
    assert_eq!(f32::de(&mut reader).unwrap(), 4.5);
    assert!(!reader.has_remaining());
    assert!(!entity.has_pending_changes());
}

#[test]
fn owner_and_observer_channels_carry_both_directions() {
    init_logging();
    let codecs = test_codecs();
    let now = Instant::now();
    let owner = PeerId::new(1);

    let mut authoritative = ReplicatedEntity::new(player_components(), &codecs).unwrap();
    authoritative.activate(EntityId::new(5), Some(owner)).unwrap();

    // the owner's own copy writes its input and sends it upstream
    let mut owner_copy = ReplicatedEntity::new(player_components(), &codecs).unwrap();
    owner_copy
        .mutate::<Input, _>(PLAYER_INPUT, 0, |input| input.dx = 0.5)
        .unwrap();
    let upstream = owner_copy.serialize_upstream(&codecs, now).unwrap().unwrap();
    authoritative
        .apply(&codecs, &upstream, ApplyPolicy::FromOwner)
        .unwrap();

    authoritative
        .mutate::<Position, _>(PLAYER_POSITION, 0, |position| position.x = 3.0)
        .unwrap();

    let payloads = authoritative.serialize(&codecs, false, now).unwrap();
    for payload in [payloads.owner.unwrap(), payloads.observer.unwrap()] {
        let mut reader = ByteReader::new(&payload);
        assert_eq!(read_mask(&mut reader), 0b101);
        assert_eq!(read_mask(&mut reader), 0b1);
        assert_eq!(f32::de(&mut reader).unwrap(), 3.0);
        assert_eq!(read_mask(&mut reader), 0b1);
        assert_eq!(f32::de(&mut reader).unwrap(), 0.5);
        assert!(!reader.has_remaining());
    }
}

#[test]
fn owner_writes_reach_every_observer() {
    init_logging();
    let mut harness = TestHarness::new();
    let a = harness.add_client();
    let b = harness.add_client();
    harness.tick_n(2);

    for _ in 0..4 {
        harness
            .server
            .spawn(marker_components(), SpawnOrigin::Asset(MARKER_ASSET), None, None)
            .unwrap();
    }
    let owner = harness.peer(a);
    let id = harness
        .server
        .spawn(player_components(), SpawnOrigin::Asset(PLAYER_ASSET), None, Some(owner))
        .unwrap();
    assert_eq!(id, EntityId::new(5));
    harness.tick();

    assert!(harness.client(a).is_owner(&id));
    assert!(!harness.client(b).is_owner(&id));

    harness
        .client_mut(a)
        .entity_mut(&id)
        .unwrap()
        .mutate::<Input, _>(PLAYER_INPUT, 0, |input| input.dx = 0.5)
        .unwrap();
    harness
        .server
        .entity_mut(&id)
        .unwrap()
        .mutate::<Position, _>(PLAYER_POSITION, 0, |position| position.x = 3.0)
        .unwrap();
    harness.tick_n(2);

    let server_input = harness.server.entity(&id).unwrap().component::<Input>().unwrap();
    assert_eq!(server_input.dx, 0.5);
    for index in [a, b] {
        let entity = harness.client(index).entity(&id).unwrap();
        assert_eq!(entity.component::<Position>().unwrap().x, 3.0);
        assert_eq!(entity.component::<Input>().unwrap().dx, 0.5);
    }
}

#[test]
fn spawns_wait_for_ready() {
    init_logging();
    let mut harness = TestHarness::new();
    for _ in 0..3 {
        harness
            .server
            .spawn(marker_components(), SpawnOrigin::Asset(MARKER_ASSET), None, None)
            .unwrap();
    }

    let config = ClientConfig {
        auto_ready: false,
        ..Default::default()
    };
    let client = harness.add_client_with(config, prefab_resolver());
    harness.tick_n(3);

    let session = harness.server_session(client).unwrap();
    assert_eq!(session.state(), ConnectionState::Connected);
    assert!(!session.is_ready());
    assert_eq!(
        harness.client(client).session().unwrap().state(),
        ConnectionState::Connected
    );
    assert_eq!(harness.count_server_sent(client, MessageKind::SpawnEntity), 0);
    assert_eq!(harness.client(client).entity_count(), 0);

    harness.client_mut(client).ready().unwrap();
    harness.tick_n(2);

    assert!(harness.server_session(client).unwrap().is_ready());
    assert_eq!(harness.count_server_sent(client, MessageKind::SpawnEntity), 3);
    assert_eq!(harness.server_session(client).unwrap().observed_count(), 3);
    assert_eq!(harness.client(client).entity_count(), 3);
}

#[test]
fn rtt_is_the_mean_of_the_window() {
    let mut clock = ClockSync::new(3);
    let samples = [(1.0, 0.100), (2.0, 0.120), (3.0, 0.080)];
    for (sent, rtt) in samples {
        clock.on_pong(
            sent + rtt,
            &Pong {
                client_time: sent,
                server_time: 10.0 + sent,
            },
        );
    }
    assert!((clock.rtt() - 0.100).abs() < 1e-9);
}

#[test]
fn connected_client_collects_rtt_samples() {
    init_logging();
    let mut harness = TestHarness::new();
    let client = harness.add_client();
    assert!(!harness.client(client).clock().has_samples());

    harness.tick_n(3);
    let clock = harness.client(client).clock();
    assert!(clock.has_samples());
    assert!(clock.rtt() >= 0.0);
}
