//! HIT: a single blow, heard in neighbouring locations.

use std::sync::Arc;

use warren_world::{Location, Thing};

use super::combat::{bury, may_attack, prepare_respawn};
use super::target;
use crate::cycle::Held;
use crate::engine::Context;
use crate::state::{CommandState, Halt, Handled};

const WIDTH: usize = 80;

/// `HIT <target>`: deal one roll of damage, killing the target if it has
/// no more health than that.
///
/// A surviving target is heard fighting in every neighbouring location
/// that is occupied but not crowded, so those locations are locked too.
pub fn hit(state: &mut CommandState, held: &mut Held<'_, Location>, ctx: &Context) -> Handled {
    let here = state.here()?;
    let actor = state.actor;
    let contents = state.contents(held)?;
    let victim = target(state, contents, "hit")?;

    if victim == actor {
        let uname = contents.thing(actor).map(Thing::uname).ok_or(Halt::Stale)?;
        state.msg.actor.send("You give yourself a slap. Awake now?");
        state
            .msg
            .observers(&here)
            .send(format!("{uname} slaps themself."));
        return Ok(());
    }

    let v = contents.thing(victim).ok_or(Halt::Stale)?;
    may_attack(&here, contents, v, ctx)?;
    let damage = *state.scratch.damage.get_or_insert_with(|| ctx.roll_damage());
    let current = v.health.as_ref().map_or(0, |h| h.current);
    let kill = current <= damage;

    let neighbours: Vec<Arc<Location>> = contents
        .neighbours()
        .into_iter()
        .filter(|n| !Arc::ptr_eq(n, &here))
        .collect();
    if kill {
        if v.is_player {
            prepare_respawn(state, ctx)?;
        }
    } else {
        let mut grew = false;
        for n in &neighbours {
            grew |= state.add_lock(n);
        }
        if grew {
            return Err(Halt::Relock);
        }
    }

    let contents = state.contents(held)?;
    let (Some(me), Some(v)) = (contents.thing(actor), contents.thing(victim)) else {
        return Err(Halt::Stale);
    };
    let (actor_uthe, actor_the, actor_name) = (me.uthe_name(), me.the_name.clone(), me.name.clone());
    state.set_participant(v);

    if kill {
        state
            .msg
            .actor
            .send(format!("You kill {} ({damage}).", v.the_name));
        let p = &mut state.msg.participant;
        p.send(format!("{actor_uthe} kills you ({damage})."));
        p.send("");
        p.send(centre(":==[ Rest In Peace ]==:"));
        p.send("");
        p.send(centre(&v.name));
        p.send(centre("Slain By"));
        p.send(centre(&actor_name));
        p.send("");
        p.send("You must know people in high places, you are to be given another chance...");
        state
            .msg
            .observers(&here)
            .send(format!("You see {actor_the} kill {}.", v.name));

        // No halts past this point.
        bury(state, held, ctx, &here, actor, victim);
        return Ok(());
    }

    let (victim_the, victim_uthe, victim_name) = (v.the_name.clone(), v.uthe_name(), v.name.clone());
    let mut left = current;
    // No halts past this point.
    if let Some(v) = contents.thing_mut(victim) {
        if let Some(h) = v.health.as_mut() {
            h.current = (h.current - damage).max(0);
            left = h.current;
        }
        ctx.schedule_health(v);
    }

    state
        .msg
        .actor
        .send(format!("You hit {victim_the} ({damage})."));
    state
        .msg
        .participant
        .send(format!("{actor_uthe} hits you ({damage})."));
    let observers = state.msg.observers(&here);
    observers.send(format!("You see {actor_name} hit {victim_name}."));
    if left < ctx.config.nearly_dead {
        state
            .msg
            .actor
            .append(&format!(" {victim_uthe} looks nearly dead."));
        state.msg.participant.append(" You are almost dead.");
        state
            .msg
            .observers(&here)
            .append(&format!(" {victim_uthe} is almost dead."));
    }

    for n in &neighbours {
        let Some(population) = held.get(n).map(|c| c.population()) else {
            continue;
        };
        if 0 < population && population < ctx.config.crowd_size {
            state.msg.observers(n).send("You hear fighting nearby.");
        }
    }
    Ok(())
}

/// Centre `text` within the terminal width.
fn centre(text: &str) -> String {
    let pad = WIDTH.saturating_sub(text.chars().count()) / 2;
    format!("{:pad$}{text}", "")
}
