//! Authoritative combat and movement validation over real sockets.

#[allow(dead_code)]
mod common;

use std::time::Duration;

use skirmish_core::net::messages::ServerMessage;

use common::{
    TestServer, start_two_player_match, ws_attack, ws_connect, ws_drain, ws_join, ws_read_until,
    ws_ready, ws_state, ws_try_read,
};

#[tokio::test]
async fn melee_hit_is_authoritative() {
    let server = TestServer::with_fast_timers().await;
    let (mut alice, alice_join, mut bob, bob_join) = start_two_player_match(&server, "AAAA").await;
    ws_drain(&mut alice, 100).await;
    ws_drain(&mut bob, 100).await;

    // Position the fighters: Alice at (100,100) facing right, Bob at (120,100).
    tokio::time::sleep(Duration::from_millis(400)).await;
    ws_state(&mut alice, 100.0, 100.0, 0.0, 0.0).await;
    ws_state(&mut bob, 120.0, 100.0, 0.0, 0.0).await;
    ws_read_until(&mut bob, "game_state_sync").await;
    ws_drain(&mut alice, 150).await;
    ws_drain(&mut bob, 150).await;

    ws_attack(&mut alice, "melee", 100.0, 100.0, true).await;

    match ws_read_until(&mut bob, "player_hit").await {
        ServerMessage::PlayerHit(hit) => {
            assert_eq!(hit.attacker_id, alice_join.player_id);
            assert_eq!(hit.victim_id, bob_join.player_id);
            assert_eq!(hit.damage, 15);
            assert_eq!(hit.health, 85);
        }
        other => panic!("Expected player_hit, got {other:?}"),
    }

    // Everyone receives the visual rebroadcast.
    for stream in [&mut alice, &mut bob] {
        match ws_read_until(stream, "player_attack").await {
            ServerMessage::PlayerAttack(attack) => {
                assert_eq!(attack.attacker_id, alice_join.player_id);
                assert_eq!((attack.x, attack.y), (100.0, 100.0));
            }
            other => panic!("Expected player_attack, got {other:?}"),
        }
    }

    // One melee hit must not end the match.
    let mut saw_match_end = false;
    while let Some(msg) = ws_try_read(&mut alice, 200).await {
        if matches!(msg, ServerMessage::MatchEnd(_)) {
            saw_match_end = true;
        }
    }
    assert!(!saw_match_end);
}

#[tokio::test]
async fn melee_misses_out_of_range() {
    let server = TestServer::with_fast_timers().await;
    let (mut alice, _alice_join, mut bob, _bob_join) = start_two_player_match(&server, "AAAA").await;
    ws_drain(&mut alice, 100).await;
    ws_drain(&mut bob, 100).await;

    // Bob walks out of melee range.
    tokio::time::sleep(Duration::from_millis(400)).await;
    ws_state(&mut bob, 150.0, 100.0, 0.0, 0.0).await;
    ws_drain(&mut alice, 150).await;
    ws_drain(&mut bob, 150).await;

    ws_attack(&mut alice, "melee", 0.0, 0.0, true).await;

    // The rebroadcast still goes out, but no player_hit precedes it.
    let mut saw_hit = false;
    let mut saw_attack = false;
    while let Some(msg) = ws_try_read(&mut bob, 300).await {
        match msg {
            ServerMessage::PlayerHit(_) => saw_hit = true,
            ServerMessage::PlayerAttack(_) => saw_attack = true,
            _ => {}
        }
    }
    assert!(saw_attack, "player_attack is rebroadcast regardless of hits");
    assert!(!saw_hit, "no hit at 150px melee distance");
}

#[tokio::test]
async fn teleport_is_rejected_with_private_correction() {
    let server = TestServer::with_fast_timers().await;
    let (mut alice, _alice_join, mut bob, _bob_join) = start_two_player_match(&server, "AAAA").await;
    ws_drain(&mut alice, 100).await;
    ws_drain(&mut bob, 100).await;

    // Establish an accepted position first.
    tokio::time::sleep(Duration::from_millis(400)).await;
    ws_state(&mut alice, 100.0, 100.0, 0.0, 0.0).await;
    ws_read_until(&mut alice, "game_state_sync").await;
    ws_drain(&mut alice, 150).await;
    ws_drain(&mut bob, 150).await;

    // 800px in ~100ms against a 50px budget.
    tokio::time::sleep(Duration::from_millis(100)).await;
    ws_state(&mut alice, 900.0, 100.0, 0.0, 0.0).await;

    match ws_read_until(&mut alice, "position_correction").await {
        ServerMessage::PositionCorrection(correction) => {
            assert_eq!((correction.x, correction.y), (100.0, 100.0));
            assert_eq!((correction.vx, correction.vy), (0.0, 0.0));
        }
        other => panic!("Expected position_correction, got {other:?}"),
    }

    // No state sync reaches the peer for the rejected update.
    let msg = ws_try_read(&mut bob, 300).await;
    assert!(
        !matches!(msg, Some(ServerMessage::GameStateSync(_))),
        "rejected update must not be broadcast"
    );
}

#[tokio::test]
async fn out_of_bounds_position_is_rejected() {
    let server = TestServer::with_fast_timers().await;
    let (mut alice, _alice_join, mut bob, _bob_join) = start_two_player_match(&server, "AAAA").await;
    ws_drain(&mut alice, 100).await;
    ws_drain(&mut bob, 100).await;

    tokio::time::sleep(Duration::from_millis(400)).await;
    ws_state(&mut alice, 100.0, 1000.0, 0.0, 0.0).await;

    match ws_read_until(&mut alice, "position_correction").await {
        ServerMessage::PositionCorrection(correction) => {
            // Back to the spawn state.
            assert_eq!((correction.x, correction.y), (0.0, 0.0));
        }
        other => panic!("Expected position_correction, got {other:?}"),
    }
}

#[tokio::test]
async fn excessive_velocity_is_rejected() {
    let server = TestServer::with_fast_timers().await;
    let (mut alice, _alice_join, _bob, _bob_join) = start_two_player_match(&server, "AAAA").await;
    ws_drain(&mut alice, 100).await;

    tokio::time::sleep(Duration::from_millis(400)).await;
    ws_state(&mut alice, 10.0, 10.0, 1000.0, 0.0).await;
    ws_read_until(&mut alice, "position_correction").await;
}

#[tokio::test]
async fn magic_eliminations_end_with_last_standing() {
    let server = TestServer::with_fast_timers().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    let alice_join = ws_join(&mut alice, "BBBB", "Alice").await;
    let mut bob = ws_connect(&server.ws_url()).await;
    let bob_join = ws_join(&mut bob, "BBBB", "Bob").await;
    let mut carol = ws_connect(&server.ws_url()).await;
    let carol_join = ws_join(&mut carol, "BBBB", "Carol").await;

    ws_ready(&mut alice, true).await;
    ws_ready(&mut bob, true).await;
    ws_ready(&mut carol, true).await;
    ws_read_until(&mut alice, "game_starting").await;
    ws_read_until(&mut bob, "game_starting").await;
    ws_read_until(&mut carol, "game_starting").await;
    ws_drain(&mut alice, 100).await;

    // Everyone is still at the spawn point, inside the 80px blast radius.
    // Four casts at 25 damage each eliminate both victims on the last one.
    for _ in 0..4 {
        ws_attack(&mut alice, "magic", 0.0, 0.0, true).await;
    }

    let end = match ws_read_until(&mut alice, "match_end").await {
        ServerMessage::MatchEnd(end) => end,
        other => panic!("Expected match_end, got {other:?}"),
    };
    assert_eq!(end.reason, "last_standing");
    assert_eq!(end.winner_id.as_deref(), Some(alice_join.player_id.as_str()));
    assert_eq!(end.winner_name.as_deref(), Some("Alice"));

    // Both victims observed their own deaths.
    let death = ws_read_until(&mut bob, "player_death").await;
    match death {
        ServerMessage::PlayerDeath(d) => {
            assert!(d.victim_id == bob_join.player_id || d.victim_id == carol_join.player_id);
            assert_eq!(d.killer_id, alice_join.player_id);
        }
        other => panic!("Expected player_death, got {other:?}"),
    }
    ws_read_until(&mut carol, "match_end").await;

    // The match is over: further attacks do nothing.
    ws_drain(&mut alice, 200).await;
    ws_attack(&mut alice, "magic", 0.0, 0.0, true).await;
    let mut saw_anything = false;
    while let Some(msg) = ws_try_read(&mut alice, 300).await {
        if matches!(
            msg,
            ServerMessage::PlayerHit(_) | ServerMessage::PlayerAttack(_)
        ) {
            saw_anything = true;
        }
    }
    assert!(!saw_anything, "attacks after match_end are ignored");
}

#[tokio::test]
async fn dead_players_cannot_attack() {
    let server = TestServer::with_fast_timers().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    ws_join(&mut alice, "CCCC", "Alice").await;
    let mut bob = ws_connect(&server.ws_url()).await;
    let bob_join = ws_join(&mut bob, "CCCC", "Bob").await;
    let mut carol = ws_connect(&server.ws_url()).await;
    ws_join(&mut carol, "CCCC", "Carol").await;

    ws_ready(&mut alice, true).await;
    ws_ready(&mut bob, true).await;
    ws_ready(&mut carol, true).await;
    ws_read_until(&mut alice, "game_starting").await;
    ws_read_until(&mut bob, "game_starting").await;
    ws_read_until(&mut carol, "game_starting").await;

    // Carol steps out of melee range so only Bob takes the hits.
    tokio::time::sleep(Duration::from_millis(700)).await;
    ws_state(&mut carol, 300.0, 100.0, 0.0, 0.0).await;
    ws_drain(&mut alice, 150).await;
    ws_drain(&mut bob, 150).await;
    ws_drain(&mut carol, 150).await;

    // Alice cuts Bob down at the shared spawn point.
    for _ in 0..7 {
        ws_attack(&mut alice, "melee", 0.0, 0.0, true).await;
    }
    let death = ws_read_until(&mut alice, "player_death").await;
    match death {
        ServerMessage::PlayerDeath(d) => assert_eq!(d.victim_id, bob_join.player_id),
        other => panic!("Expected player_death, got {other:?}"),
    }
    ws_drain(&mut alice, 200).await;

    // Two fighters remain, so the match is still live, but Bob is dead and
    // his attack intents are discarded.
    ws_attack(&mut bob, "melee", 0.0, 0.0, true).await;
    let mut saw_attack = false;
    while let Some(msg) = ws_try_read(&mut alice, 300).await {
        if matches!(msg, ServerMessage::PlayerAttack(_)) {
            saw_attack = true;
        }
    }
    assert!(!saw_attack);

    // Carol, alive and in range of nobody, still produces a rebroadcast.
    ws_attack(&mut carol, "melee", 300.0, 100.0, true).await;
    match ws_read_until(&mut alice, "player_attack").await {
        ServerMessage::PlayerAttack(attack) => assert_eq!(attack.x, 300.0),
        other => panic!("Expected player_attack, got {other:?}"),
    }
}

#[tokio::test]
async fn state_sync_carries_damage_back_to_clients() {
    let server = TestServer::with_fast_timers().await;
    let (mut alice, _alice_join, mut bob, bob_join) = start_two_player_match(&server, "AAAA").await;
    ws_drain(&mut alice, 100).await;
    ws_drain(&mut bob, 100).await;

    ws_attack(&mut alice, "arrow", 0.0, 0.0, true).await;
    ws_read_until(&mut bob, "player_hit").await;
    ws_drain(&mut alice, 150).await;
    ws_drain(&mut bob, 150).await;

    tokio::time::sleep(Duration::from_millis(400)).await;
    ws_state(&mut alice, 10.0, 10.0, 0.0, 0.0).await;
    match ws_read_until(&mut bob, "game_state_sync").await {
        ServerMessage::GameStateSync(sync) => {
            let bob_state = sync
                .players
                .iter()
                .find(|p| p.player_id == bob_join.player_id)
                .unwrap();
            assert_eq!(bob_state.health, 80, "arrow damage visible in the sync");
            assert!(bob_state.is_alive);
        }
        other => panic!("Expected game_state_sync, got {other:?}"),
    }
}
