//! Handlers for the self-perpetuating events: ambient action, health
//! regeneration and clean-up.

use std::time::Duration;

use tracing::debug;
use warren_core::EventKind;
use warren_world::Location;

use super::combat::withdraw;
use super::tell;
use crate::cycle::Held;
use crate::engine::Context;
use crate::state::{CommandState, Halt, Handled};

/// `$ACTION`: show one of the thing's ambient texts and schedule the next.
///
/// Things in a fight stay quiet; stopping the fight restarts the chain.
pub fn action(state: &mut CommandState, held: &mut Held<'_, Location>, ctx: &Context) -> Handled {
    let here = state.here()?;
    let contents = state.contents(held)?;
    let thing = contents.thing_mut(state.actor).ok_or(Halt::Stale)?;
    if thing.session.opponent.is_some() {
        return Ok(());
    }
    let Some(spec) = thing.action.as_ref().filter(|s| !s.texts.is_empty()) else {
        return Err(Halt::Stale);
    };

    let last = spec.texts.len() - 1;
    let pick = *state
        .scratch
        .text
        .get_or_insert_with(|| ctx.dice.pick(last + 1));
    let text = spec.texts[pick.min(last)].clone();
    ctx.schedule_action(thing);
    state.msg.observers(&here).send(text);
    Ok(())
}

/// `$HEALTH`: one regeneration tick, capped at maximum. Ticks keep coming
/// until the thing is whole again.
pub fn health(state: &mut CommandState, held: &mut Held<'_, Location>, ctx: &Context) -> Handled {
    let contents = state.contents(held)?;
    let thing = contents.thing_mut(state.actor).ok_or(Halt::Stale)?;
    let Some(h) = thing.health.as_mut() else {
        return Err(Halt::Stale);
    };
    h.current = (h.current + h.regen_amount).min(h.maximum);
    let (again, after) = (!h.is_full() && h.regen_amount > 0, h.regen_after);
    // The slot still holds the token that fired, so reschedule directly.
    if again {
        ctx.schedule(thing, EventKind::Health, after, Duration::ZERO);
    }
    Ok(())
}

/// `$CLEANUP`: remove the thing from the world.
pub fn cleanup(state: &mut CommandState, held: &mut Held<'_, Location>, ctx: &Context) -> Handled {
    let here = state.here()?;
    let actor = state.actor;
    let contents = state.contents(held)?;
    let text = contents
        .thing(actor)
        .and_then(|t| t.cleanup.as_ref())
        .map(|c| c.text.clone())
        .ok_or(Halt::Stale)?;

    let (gone, stopped) = withdraw(contents, actor, ctx).ok_or(Halt::Stale)?;
    ctx.world.forget(actor);
    for id in stopped {
        if let Some(who) = contents.thing(id) {
            tell(state, who).send(format!("You stop fighting {}.", gone.name));
        }
    }
    if !text.is_empty() {
        state.msg.observers(&here).send(text);
    }
    debug!(thing = %actor, name = %gone.name, "cleaned up");
    Ok(())
}
