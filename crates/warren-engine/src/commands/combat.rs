//! Combat sessions: FIGHT, STOP and the `$COMBAT` round, plus the death
//! path shared with HIT, QUIT and clean-up.
//!
//! A session belongs to the attacker. Its `$COMBAT` chain drives every
//! round; either side may land the blow. The defender keeps a list of who
//! targets it so they can be stopped when it leaves.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use warren_core::{EventKind, ThingId};
use warren_world::{Contents, Location, Thing};

use super::look::describe;
use super::{target, tell};
use crate::cycle::Held;
use crate::engine::Context;
use crate::state::{CommandState, Halt, Handled};

// ── Shared checks ────────────────────────────────────────────────

/// Vetoes every attack must pass, in order: a peaceful location, a crowd,
/// then a victim that cannot die.
pub(crate) fn may_attack(
    here: &Location,
    contents: &Contents,
    victim: &Thing,
    ctx: &Context,
) -> Result<(), Halt> {
    if let Some(veto) = here.veto_combat() {
        return Err(Halt::Veto(veto.to_owned()));
    }
    if contents.population() >= ctx.config.crowd_size {
        return Err(Halt::Veto("It's too crowded to start a fight.".to_owned()));
    }
    if !victim.is_killable() {
        return Err(Halt::Veto(format!("You cannot kill {}.", victim.the_name)));
    }
    Ok(())
}

/// Stash a start location for a player about to die and make sure it is
/// locked.
pub(crate) fn prepare_respawn(
    state: &mut CommandState,
    ctx: &Context,
) -> Result<Arc<Location>, Halt> {
    let start = match &state.scratch.respawn_at {
        Some(start) => Arc::clone(start),
        None => {
            let starts = ctx.world.starts();
            let start = starts
                .get(ctx.dice.pick(starts.len()))
                .or_else(|| starts.first())
                .cloned()
                .ok_or(Halt::Stale)?;
            state.scratch.respawn_at = Some(Arc::clone(&start));
            start
        }
    };
    if state.add_lock(&start) {
        return Err(Halt::Relock);
    }
    Ok(start)
}

// ── Session bookkeeping ──────────────────────────────────────────

/// End `thing`'s attack and return it to its ambient behaviour.
pub(crate) fn stop_fighting(thing: &mut Thing, ctx: &Context) {
    thing.session.opponent = None;
    thing.events.cancel(EventKind::Combat);
    ctx.schedule_action(thing);
}

/// Point `attacker` at `victim`, releasing any previous target standing
/// in the same place.
pub(crate) fn engage(contents: &mut Contents, attacker: ThingId, victim: ThingId) {
    let previous = contents
        .thing_mut(attacker)
        .and_then(|a| a.session.opponent.replace(victim));
    if previous == Some(victim) {
        return;
    }
    if let Some(old) = previous.and_then(|p| contents.thing_mut(p)) {
        old.session.release(attacker);
    }
    if let Some(v) = contents.thing_mut(victim) {
        v.session.opponents.push(attacker);
    }
}

/// Stop `id` attacking. Returns whom it was attacking.
pub(crate) fn disengage(contents: &mut Contents, id: ThingId, ctx: &Context) -> Option<ThingId> {
    let thing = contents.thing_mut(id)?;
    let opponent = thing.session.opponent?;
    stop_fighting(thing, ctx);
    if let Some(o) = contents.thing_mut(opponent) {
        o.session.release(id);
    }
    Some(opponent)
}

/// Take `id` out of `contents`, ending every session it is part of and
/// cancelling its events.
///
/// Returns the thing and the attackers that were stopped. Attackers that
/// are no longer here are left alone; their own next round notices.
pub(crate) fn withdraw(
    contents: &mut Contents,
    id: ThingId,
    ctx: &Context,
) -> Option<(Thing, Vec<ThingId>)> {
    let (attackers, target) = {
        let thing = contents.thing(id)?;
        (thing.session.opponents.clone(), thing.session.opponent)
    };
    let mut stopped = Vec::new();
    for attacker in attackers {
        if attacker == id || stopped.contains(&attacker) {
            continue;
        }
        if let Some(a) = contents.thing_mut(attacker) {
            if a.session.opponent == Some(id) {
                stop_fighting(a, ctx);
                stopped.push(attacker);
            }
        }
    }
    if let Some(t) = target.and_then(|t| contents.thing_mut(t)) {
        t.session.release(id);
    }

    let mut thing = contents.take(id)?;
    thing.session.clear();
    thing.events.cancel_all();
    Some((thing, stopped))
}

/// Replace `victim` with its corpse. Non-players leave the world; players
/// go to the start location stashed by [`prepare_respawn`].
pub(crate) fn bury(
    state: &mut CommandState,
    held: &mut Held<'_, Location>,
    ctx: &Context,
    here: &Arc<Location>,
    killer: ThingId,
    victim: ThingId,
) {
    let Some(contents) = held.get_mut(here) else {
        warn!(%victim, "death outside a held location");
        return;
    };
    let killer_uthe = contents
        .thing(killer)
        .map(Thing::uthe_name)
        .unwrap_or_default();
    let Some((mut dead, stopped)) = withdraw(contents, victim, ctx) else {
        return;
    };

    for id in stopped {
        if id == killer {
            continue;
        }
        if let Some(who) = contents.thing(id) {
            let b = tell(state, who);
            b.send(format!("{killer_uthe} kills {}!", dead.name));
            b.send(format!("You stop fighting {}.", dead.name));
        }
    }

    let mut corpse = dead.corpse(ctx.config.corpse_cleanup_after);
    ctx.world.record(corpse.id(), here);
    ctx.arm(&mut corpse);
    contents.admit(corpse);

    if !dead.is_player {
        ctx.world.forget(victim);
        debug!(%victim, location = here.name(), "killed");
        return;
    }

    let start = match state.scratch.respawn_at.clone() {
        Some(start) if held.holds(&start) => start,
        _ => {
            warn!(%victim, "no held start location, respawning in place");
            Arc::clone(here)
        }
    };
    let Some(contents) = held.get_mut(&start) else {
        return;
    };

    if let Some(h) = dead.health.as_mut() {
        h.current = ctx.config.respawn_health.min(h.maximum.max(1));
    }
    ctx.world.record(victim, &start);
    ctx.schedule_health(&mut dead);
    ctx.schedule_action(&mut dead);

    let uname = dead.uname();
    let lines = {
        contents.admit(dead);
        describe(&start, contents, victim)
    };
    if let Some(player) = contents.thing(victim) {
        let b = tell(state, player);
        b.send("");
        for line in lines {
            b.send(line);
        }
    }
    state.msg.observers(&start).send(format!(
        "There is a cloud of smoke from which {uname} emerges coughing and spluttering."
    ));
    debug!(%victim, start = start.name(), "respawned");
}

// ── Handlers ─────────────────────────────────────────────────────

/// `FIGHT <target>`: start a session that runs one round every
/// `round_duration` until someone dies or stops.
pub fn fight(state: &mut CommandState, held: &mut Held<'_, Location>, ctx: &Context) -> Handled {
    let here = state.here()?;
    let actor = state.actor;
    let contents = state.contents(held)?;
    let victim = target(state, contents, "fight")?;
    if victim == actor {
        return Err(Halt::Veto("You can't fight yourself.".to_owned()));
    }
    let me = contents.thing(actor).ok_or(Halt::Stale)?;
    let v = contents.thing(victim).ok_or(Halt::Stale)?;
    if me.session.opponent == Some(victim) {
        return Err(Halt::Veto(format!("You are already fighting {}.", v.the_name)));
    }
    may_attack(&here, contents, v, ctx)?;

    let actor_uthe = me.uthe_name();
    let (victim_the, victim_name) = (v.the_name.clone(), v.name.clone());
    state.set_participant(v);

    engage(contents, actor, victim);
    if let Some(me) = contents.thing_mut(actor) {
        me.events.cancel(EventKind::Action);
        ctx.schedule(me, EventKind::Combat, Duration::ZERO, Duration::ZERO);
    }

    state.msg.actor.send(format!("You attack {victim_the}!"));
    state.msg.participant.send(format!("{actor_uthe} attacks you!"));
    state
        .msg
        .observers(&here)
        .send(format!("{actor_uthe} attacks {victim_name}!"));
    Ok(())
}

/// `STOP`: end the actor's own attack.
pub fn stop(state: &mut CommandState, held: &mut Held<'_, Location>, ctx: &Context) -> Handled {
    let here = state.here()?;
    let actor = state.actor;
    let contents = state.contents(held)?;
    let me = contents.thing(actor).ok_or(Halt::Stale)?;
    if me.session.opponent.is_none() {
        return Err(Halt::Veto("You are not fighting anyone.".to_owned()));
    }
    let actor_uthe = me.uthe_name();

    let opponent = disengage(contents, actor, ctx);
    match opponent.and_then(|o| contents.thing(o)) {
        Some(o) => {
            state.set_participant(o);
            state.msg.actor.send(format!("You stop fighting {}.", o.the_name));
            state
                .msg
                .participant
                .send(format!("{actor_uthe} stops fighting you."));
            state
                .msg
                .observers(&here)
                .send(format!("{actor_uthe} stops fighting {}.", o.name));
        }
        None => state.msg.actor.send("You stop fighting."),
    }
    Ok(())
}

/// `$COMBAT`: one round of the actor's session.
pub fn combat_round(
    state: &mut CommandState,
    held: &mut Held<'_, Location>,
    ctx: &Context,
) -> Handled {
    let here = state.here()?;
    let actor = state.actor;
    let contents = state.contents(held)?;
    let opponent = contents
        .thing(actor)
        .ok_or(Halt::Stale)?
        .session
        .opponent
        .filter(|o| contents.who.contains_key(o));

    let Some(opponent) = opponent else {
        if let Some(me) = contents.thing_mut(actor) {
            stop_fighting(me, ctx);
        }
        state
            .msg
            .actor
            .send("You stop fighting, your opponent disappeared...");
        return Ok(());
    };

    let actor_strikes = *state
        .scratch
        .actor_strikes
        .get_or_insert_with(|| ctx.dice.coin());
    let (attacker, defender) = if actor_strikes {
        (actor, opponent)
    } else {
        (opponent, actor)
    };

    let d = contents.thing(defender).ok_or(Halt::Stale)?;
    let damage = if d.is_killable() {
        *state.scratch.damage.get_or_insert_with(|| ctx.roll_damage())
    } else {
        0
    };
    let current = d.health.as_ref().map_or(0, |h| h.current);
    let dies = d.is_killable() && current <= damage;
    if dies && d.is_player {
        prepare_respawn(state, ctx)?;
    }

    let contents = state.contents(held)?;
    let (Some(a), Some(d)) = (contents.thing(attacker), contents.thing(defender)) else {
        return Err(Halt::Stale);
    };
    let attacker_uthe = a.uthe_name();
    let (defender_the, defender_name) = (d.the_name.clone(), d.name.clone());
    state.set_participant(if actor_strikes { d } else { a });

    tell(state, a).send(format!("You hit {defender_the} doing {damage} damage."));
    tell(state, d).send(format!("{attacker_uthe} hits you doing {damage} damage."));
    state
        .msg
        .observers(&here)
        .send(format!("{attacker_uthe} hits {defender_name}."));
    if dies {
        tell(state, a).send(format!("You kill {defender_name}!"));
        tell(state, d).send(format!("{attacker_uthe} kills you!"));
        state
            .msg
            .observers(&here)
            .send(format!("{attacker_uthe} kills {defender_name}!"));
    }

    // No halts past this point.
    if let Some(h) = contents.thing_mut(defender).and_then(|d| d.health.as_mut()) {
        h.current = (h.current - damage).max(0);
    }
    if dies {
        bury(state, held, ctx, &here, attacker, defender);
        return Ok(());
    }
    if let Some(d) = contents.thing_mut(defender) {
        ctx.schedule_health(d);
    }
    if let Some(me) = contents.thing_mut(actor) {
        ctx.schedule(me, EventKind::Combat, ctx.config.round_duration, Duration::ZERO);
    }
    Ok(())
}
