//! Reusable oracles.

use quickdraw_core::{Membership, RoundPhase, Stage};

use crate::scenario::{OracleFn, World};

/// Every participant saw `player` win the last round.
pub fn winner_is(player: &str) -> OracleFn {
    let player = player.to_string();
    Box::new(move |world: &World| {
        for (label, actor) in world.actors() {
            let winners = actor.winners();
            if winners.last() != Some(&player) {
                return Err(format!("{label} saw winners {winners:?}, expected {player} last"));
            }
        }
        Ok(())
    })
}

/// Every participant saw the same non-empty sequence of winners.
pub fn winners_agree() -> OracleFn {
    Box::new(|world: &World| {
        let expected = world.host().map(|host| host.winners()).unwrap_or_default();
        if expected.is_empty() {
            return Err("no round was resolved".to_string());
        }
        for (label, actor) in world.actors() {
            if actor.winners() != expected {
                return Err(format!("{label} saw {:?}, host saw {expected:?}", actor.winners()));
            }
        }
        Ok(())
    })
}

/// No round is open anywhere.
pub fn all_idle() -> OracleFn {
    Box::new(|world: &World| {
        for (label, actor) in world.actors() {
            let phase = actor.node().round().phase();
            if phase != RoundPhase::Idle {
                return Err(format!("{label} is {phase:?}, expected Idle"));
            }
        }
        Ok(())
    })
}

/// Every participant is in `stage`.
pub fn stage_is(stage: Stage) -> OracleFn {
    Box::new(move |world: &World| {
        for (label, actor) in world.actors() {
            let actual = actor.node().session().stage();
            if actual != stage {
                return Err(format!("{label} is in {actual:?}, expected {stage:?}"));
            }
        }
        Ok(())
    })
}

/// The host roster, and the roster every player last received, equal
/// `expected`.
pub fn roster_is(expected: &[&str]) -> OracleFn {
    let expected: Vec<String> = expected.iter().map(|s| (*s).to_string()).collect();
    Box::new(move |world: &World| {
        let host_roster = world.host().and_then(|h| h.node().membership()).map(Membership::roster);
        if host_roster.as_ref() != Some(&expected) {
            return Err(format!("host roster {host_roster:?}, expected {expected:?}"));
        }
        for (label, actor) in world.actors() {
            if actor.node().session().roster() != expected.as_slice() {
                return Err(format!(
                    "{label} shows roster {:?}, expected {expected:?}",
                    actor.node().session().roster()
                ));
            }
        }
        Ok(())
    })
}

/// Every oracle passes.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world: &World| oracles.iter().try_for_each(|oracle| oracle(world)))
}
