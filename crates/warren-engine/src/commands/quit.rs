//! QUIT: leave the world for good.

use tracing::info;
use warren_world::{Location, Thing};

use super::combat::withdraw;
use super::tell;
use crate::cycle::Held;
use crate::engine::Context;
use crate::state::{CommandState, Halt, Handled};

/// `QUIT`: remove the actor, ending its sessions and cancelling every
/// pending event it owns.
pub fn quit(state: &mut CommandState, held: &mut Held<'_, Location>, ctx: &Context) -> Handled {
    let here = state.here()?;
    let actor = state.actor;
    let contents = state.contents(held)?;
    let uname = contents.thing(actor).map(Thing::uname).ok_or(Halt::Stale)?;

    let (gone, stopped) = withdraw(contents, actor, ctx).ok_or(Halt::Stale)?;
    // No halts past this point.
    ctx.world.forget(actor);
    for id in stopped {
        if let Some(who) = contents.thing(id) {
            tell(state, who).send(format!("You stop fighting {}.", gone.name));
        }
    }

    state.msg.actor.send("You leave the world.");
    state
        .msg
        .observers(&here)
        .send(format!("{uname} vanishes."));
    info!(thing = %actor, name = %gone.name, "quit");
    Ok(())
}
