//! Movement between locations. Moving locks both ends of the exit.

use std::sync::Arc;

use warren_core::Direction;
use warren_world::Location;

use super::look::describe;
use crate::cycle::Held;
use crate::engine::Context;
use crate::state::{CommandState, Halt, Handled};

/// `NORTH`, `N`, `UP` and the rest: walk through an exit.
pub fn go(state: &mut CommandState, held: &mut Held<'_, Location>, ctx: &Context) -> Handled {
    let dir = Direction::from_word(&state.cmd).ok_or_else(|| Halt::NoMatch("Eh?".to_owned()))?;
    let here = state.here()?;
    let actor = state.actor;
    let to = state
        .contents(held)?
        .exit(dir)
        .ok_or_else(|| Halt::NoMatch(format!("You can't go {dir} from here.")))?;

    if Arc::ptr_eq(&here, &to) {
        let contents = state.contents(held)?;
        for line in describe(&here, contents, actor) {
            state.msg.actor.send(line);
        }
        return Ok(());
    }
    if state.add_lock(&to) {
        return Err(Halt::Relock);
    }

    let (from, dest) = held.pair_mut(&here, &to).ok_or(Halt::Stale)?;
    let thing = from.take(actor).ok_or(Halt::Stale)?;
    // No halts past this point.
    let uname = thing.uname();
    dest.admit(thing);
    ctx.world.record(actor, &to);
    let lines = describe(&to, dest, actor);

    state.origin = Some(Arc::clone(&to));
    for line in lines {
        state.msg.actor.send(line);
    }
    state
        .msg
        .observers(&here)
        .send(format!("{uname} leaves {dir}."));
    state.msg.observers(&to).send(format!("{uname} enters."));
    Ok(())
}
