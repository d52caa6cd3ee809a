//! Deferred asset resolution on the client and server-driven scene changes
use std::{cell::RefCell, rc::Rc};

use log::Level;

use skein_client::ClientConfig;
use skein_server::DespawnMode;
use skein_shared::SpawnOrigin;
use skein_test::{
    capture_logs, captured, marker_components, player_components, DeferredAssets, Score,
    TestHarness, MARKER_ASSET, PLAYER_ASSET, PLAYER_SCORE,
};

/// A harness with one connected client whose loads wait for the test
fn deferred() -> (TestHarness, DeferredAssets) {
    let assets = DeferredAssets::new();
    let mut harness = TestHarness::new();
    harness.add_client_with(ClientConfig::default(), assets.resolver());
    harness.tick_n(2);
    (harness, assets)
}

// Assets

#[test]
fn spawn_waits_for_its_asset() {
    capture_logs();
    let (mut harness, assets) = deferred();
    let id = harness
        .server
        .spawn(player_components(), SpawnOrigin::Asset(PLAYER_ASSET), None, None)
        .unwrap();
    harness.tick();

    assert_eq!(assets.waiting(), 1);
    assert_eq!(harness.client(0).pending_count(), 1);
    assert!(harness.client(0).entity(&id).is_none());

    // updates arriving during the load are kept
    harness
        .server
        .entity_mut(&id)
        .unwrap()
        .mutate::<Score, _>(PLAYER_SCORE, 0, |score| score.points = 8)
        .unwrap();
    harness.tick();
    assert!(harness.client(0).entity(&id).is_none());

    assert_eq!(assets.complete_all(), 1);
    harness.tick();
    assert_eq!(harness.client(0).pending_count(), 0);
    let score = harness.client(0).entity(&id).unwrap().component::<Score>();
    assert_eq!(score, Some(&Score { points: 8 }));
}

#[test]
fn despawn_cancels_a_pending_spawn() {
    capture_logs();
    let (mut harness, assets) = deferred();
    let spawned = Rc::new(RefCell::new(0));
    let count = spawned.clone();
    harness
        .client_mut(0)
        .callbacks_mut()
        .on_spawned(move |_, _| *count.borrow_mut() += 1);

    let id = harness
        .server
        .spawn(marker_components(), SpawnOrigin::Asset(MARKER_ASSET), None, None)
        .unwrap();
    harness.tick();
    assert_eq!(harness.client(0).pending_count(), 1);

    harness.server.despawn(&id, DespawnMode::Destroy).unwrap();
    harness.tick();
    assert_eq!(harness.client(0).pending_count(), 0);

    assets.complete_all();
    harness.tick();
    assert_eq!(harness.client(0).entity_count(), 0);
    assert_eq!(*spawned.borrow(), 0);
}

#[test]
fn unknown_asset_drops_the_spawn() {
    capture_logs();
    let mut harness = TestHarness::new();
    harness.add_client();
    harness.tick_n(2);

    harness
        .server
        .spawn(marker_components(), SpawnOrigin::Asset(77), None, None)
        .unwrap();
    harness.tick();

    assert_eq!(harness.client(0).entity_count(), 0);
    assert_eq!(harness.client(0).pending_count(), 0);
    assert!(harness.client(0).is_connected());
    assert!(captured(Level::Error)
        .iter()
        .any(|message| message.contains("Unknown asset 77")));
}

#[test]
fn scene_entities_resolve_through_the_resolver() {
    capture_logs();
    let mut harness = TestHarness::new();
    harness.add_client();
    harness.tick_n(2);

    let id = harness
        .server
        .spawn(marker_components(), SpawnOrigin::Scene(0x51), None, None)
        .unwrap();
    harness.tick();

    let client_entity = harness.client(0).client_entity(&id).unwrap();
    assert_eq!(client_entity.origin, SpawnOrigin::Scene(0x51));
}

// Scenes

#[test]
fn scene_change_clears_the_mirror_until_loaded() {
    capture_logs();
    let mut harness = TestHarness::new();
    harness.add_client();
    harness.tick_n(2);
    for _ in 0..2 {
        harness
            .server
            .spawn(marker_components(), SpawnOrigin::Asset(MARKER_ASSET), None, None)
            .unwrap();
    }
    harness.tick();
    assert_eq!(harness.client(0).entity_count(), 2);

    let scenes = Rc::new(RefCell::new(Vec::new()));
    let despawned = Rc::new(RefCell::new(0));
    let seen = scenes.clone();
    let count = despawned.clone();
    let callbacks = harness.client_mut(0).callbacks_mut();
    callbacks.on_scene_changed(move |scene| seen.borrow_mut().push(scene.to_string()));
    callbacks.on_despawned(move |_, _| *count.borrow_mut() += 1);

    harness.server.change_scene("arena");
    assert!(!harness.server_session(0).unwrap().is_ready());
    harness.tick();

    let client = harness.client(0);
    assert_eq!(client.scene(), Some("arena"));
    assert!(client.is_loading());
    assert!(!client.is_ready());
    assert_eq!(client.entity_count(), 0);
    assert_eq!(*scenes.borrow(), vec!["arena".to_string()]);
    assert_eq!(*despawned.borrow(), 2);

    // nothing is broadcast while the peer is loading
    harness
        .server
        .spawn(marker_components(), SpawnOrigin::Scene(1), None, None)
        .unwrap();
    harness.tick_n(2);
    assert_eq!(harness.client(0).entity_count(), 0);
    assert_eq!(harness.server_session(0).unwrap().observed_count(), 0);

    harness.client_mut(0).finish_loading().unwrap();
    harness.tick_n(2);

    assert!(!harness.client(0).is_loading());
    assert!(harness.server_session(0).unwrap().is_ready());
    assert_eq!(harness.client(0).entity_count(), 3);
}
