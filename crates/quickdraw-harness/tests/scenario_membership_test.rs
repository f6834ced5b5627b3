//! Roster and session lifecycle scenarios.

use std::time::Duration;

use quickdraw_core::{ChannelId, Effect, HostOptions, Intent, RoundConfig, Stage};
use quickdraw_harness::scenario::{Scenario, World, oracle};

#[test]
fn reconnect_keeps_single_roster_entry() {
    let result = Scenario::new("reconnect")
        .player("p1", 0)
        .player("p2", 0)
        .reconnect_at(100, "p1", 50)
        .start_at(200)
        .at(300, "host", Intent::Arm)
        .at(400, "p1", Intent::Press)
        .at(450, "p2", Intent::Press)
        .at(500, "host", Intent::Press)
        .oracle(oracle::all_of(vec![
            oracle::roster_is(&["host", "p1", "p2"]),
            oracle::winner_is("p1"),
            oracle::stage_is(Stage::Playing),
            Box::new(|world| {
                let channel = world
                    .host()
                    .and_then(|h| h.node().membership())
                    .and_then(|m| m.channel_of("p1"));
                // p1 first joined on channel 0; the reconnect opened channel 4.
                if channel != Some(ChannelId(4)) {
                    return Err(format!("p1 reachable on {channel:?}"));
                }
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn player_named_like_host_is_renamed() {
    let result = Scenario::new("name clash")
        .host("alice")
        .player_as("guest", "alice", 0)
        .start_at(10)
        .oracle(oracle::all_of(vec![
            oracle::roster_is(&["alice", "alice 2"]),
            oracle::stage_is(Stage::Playing),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn departure_mid_game_ends_it_for_everyone() {
    let result = Scenario::new("departure")
        .player("p1", 5)
        .player("p2", 5)
        .start_at(20)
        .at(100, "host", Intent::Arm)
        .disconnect_at(200, "p2")
        .oracle(oracle::all_of(vec![
            oracle::stage_is(Stage::Ended),
            oracle::all_idle(),
            Box::new(|world| {
                let host_effects = world.host().map(|h| h.effects().to_vec()).unwrap_or_default();
                if host_effects.last() != Some(&Effect::GameEnded { reason: "p2 left the game".into() }) {
                    return Err(format!("host effects {host_effects:?}"));
                }
                let p1_effects = world.actor("p1").map(|a| a.effects().to_vec()).unwrap_or_default();
                let tail = &p1_effects[p1_effects.len().saturating_sub(2)..];
                let expected = [
                    Effect::HideTarget,
                    Effect::GameEnded { reason: "connection to host closed".into() },
                ];
                if tail != expected {
                    return Err(format!("p1 effects {p1_effects:?}"));
                }
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn lobby_departure_only_updates_roster() {
    let result = Scenario::new("lobby departure")
        .player("p1", 0)
        .player("p2", 0)
        .disconnect_at(50, "p1")
        .run_for(200)
        .oracle(Box::new(|world| {
            let stage = world.host().map(|h| h.node().session().stage());
            if stage != Some(Stage::Lobby) {
                return Err(format!("host in {stage:?}"));
            }
            let p2_roster = world.node("p2").map(|n| n.session().roster().to_vec());
            if p2_roster != Some(vec!["host".to_string(), "p2".to_string()]) {
                return Err(format!("p2 roster {p2_roster:?}"));
            }
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn expected_member_count_starts_game_automatically() {
    let result = Scenario::new("auto start")
        .expected_members(3)
        .player("p1", 10)
        .player("p2", 20)
        .at(100, "p2", Intent::Tap)
        .at(300, "p1", Intent::Tap)
        .at(350, "host", Intent::Tap)
        .oracle(oracle::all_of(vec![
            oracle::stage_is(Stage::Playing),
            oracle::roster_is(&["host", "p1", "p2"]),
            oracle::winners_agree(),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn late_joiner_is_turned_away() {
    let mut world = World::new(1, RoundConfig::default(), "host", HostOptions::default());
    world.join("p1", "p1", Duration::ZERO);
    world.intent_at(Duration::from_millis(10), "host", Intent::StartGame);
    world.run_until(Duration::from_millis(50));

    world.join("late", "late", Duration::ZERO);
    world.run_until(Duration::from_millis(100));

    let host = world.host().and_then(|h| h.node().membership()).map(|m| m.roster());
    assert_eq!(host, Some(vec!["host".to_string(), "p1".to_string()]));
    assert_eq!(world.node("late").map(|n| n.session().stage()), Some(Stage::Ended));
    assert_eq!(world.node("p1").map(|n| n.session().stage()), Some(Stage::Playing));
}

#[test]
fn intents_before_start_are_rejected() {
    let mut world = World::new(1, RoundConfig::default(), "host", HostOptions::default());
    world.join("p1", "p1", Duration::ZERO);
    world.run_until(Duration::from_millis(10));

    world.intent("host", Intent::Tap);
    world.intent("p1", Intent::StartGame);

    assert_eq!(world.host().map(|h| h.rejected().len()), Some(1));
    assert_eq!(world.actor("p1").map(|a| a.rejected().len()), Some(1));
    assert!(world.actors().all(|(_, a)| a.node().round().arm_time().is_none()));
}
