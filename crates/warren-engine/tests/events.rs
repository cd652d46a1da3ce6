//! Scheduled events, stale events, QUIT, LOOK and movement through a
//! running engine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use warren_core::{CancelToken, EventKind, ExecuteError, Lockable};
use warren_engine::{
    CommandState, Context, Engine, EngineConfig, Halt, Handled, Handlers, Held, Input, Outcome,
};
use warren_test_utils::{arena, chatterbox, goblin, player, Arena, LoadedDice};
use warren_world::{Location, Thing};

const WAIT: Duration = Duration::from_secs(5);

fn fast() -> EngineConfig {
    EngineConfig {
        round_duration: Duration::from_millis(20),
        corpse_cleanup_after: Duration::from_millis(30),
        dispatch_workers: Some(2),
        ..EngineConfig::default()
    }
}

fn start(config: EngineConfig) -> (Engine, Arc<Location>, Arc<Location>) {
    let Arena {
        world,
        arena,
        corridor,
        ..
    } = arena();
    let engine = Engine::builder(world)
        .config(config)
        .dice(LoadedDice::always(0))
        .build()
        .unwrap();
    (engine, arena, corridor)
}

fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

// ── Self-perpetuating events ─────────────────────────────────────

#[test]
fn ambient_action_repeats() {
    let (engine, arena, _) = start(fast());
    let (ann, inbox) = player("Ann", 10);
    engine.spawn(ann, &arena).unwrap();
    engine
        .spawn(chatterbox(Duration::from_millis(10)), &arena)
        .unwrap();

    for _ in 0..3 {
        assert!(inbox.wait_for("The parrot squawks.", WAIT).is_some());
    }
    assert!(engine.metrics().events_fired >= 3);
}

#[test]
fn regeneration_caps_at_maximum() {
    let (engine, arena, _) = start(fast());
    let mut troll = Thing::new("a troll").with_alias("troll").with_health(5);
    if let Some(h) = troll.health.as_mut() {
        h.current = 2;
        h.regen_amount = 2;
        h.regen_after = Duration::from_millis(10);
    }
    let troll = engine.spawn(troll, &arena).unwrap();

    let full = || {
        let c = arena.lock();
        let t = c.thing(troll).unwrap();
        t.health.as_ref().unwrap().current == 5 && !t.events.is_pending(EventKind::Health)
    };
    assert!(eventually(full));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(
        arena.lock().thing(troll).unwrap().health.as_ref().unwrap().current,
        5
    );
}

#[test]
fn immediate_ticks_find_freshly_spawned_things() {
    const TROLLS: usize = 200;
    let (engine, arena, _) = start(fast());
    for i in 0..TROLLS {
        let mut troll = Thing::new(format!("troll {i}")).with_health(3);
        if let Some(h) = troll.health.as_mut() {
            h.current = 1;
            h.regen_amount = 1;
            h.regen_after = Duration::ZERO;
        }
        engine.spawn(troll, &arena).unwrap();
    }

    let all_whole = || {
        let c = arena.lock();
        c.who
            .values()
            .all(|t| t.health.as_ref().is_some_and(|h| h.is_full()))
    };
    assert!(eventually(all_whole), "a hurt thing never healed");
    assert_eq!(engine.metrics().stale_events, 0);
}

#[test]
fn corpse_turns_to_dust() {
    let (engine, arena, _) = start(fast());
    let (ann, inbox) = player("Ann", 10);
    let (bob, bob_inbox) = player("Bob", 10);
    let ann = engine.spawn(ann, &arena).unwrap();
    engine.spawn(bob, &arena).unwrap();
    engine.spawn(goblin(2), &arena).unwrap();

    engine.execute(ann, "hit goblin").unwrap();
    assert_eq!(inbox.messages(), vec!["You kill the goblin (2)."]);
    assert!(bob_inbox
        .wait_for("The corpse of a goblin turns to dust.", WAIT)
        .is_some());
    assert!(eventually(|| arena.lock().items.is_empty()));
    assert_eq!(engine.world().population(), 2);
}

#[test]
fn superseded_cleanup_never_runs() {
    let (engine, arena, _) = start(fast());
    let (ann, inbox) = player("Ann", 10);
    engine.spawn(ann, &arena).unwrap();
    let bones = Thing::new("a pile of bones")
        .with_alias("bones")
        .with_cleanup(Duration::from_millis(200), "The bones crumble.");
    let bones = engine.spawn(bones, &arena).unwrap();

    let first = {
        let mut c = arena.lock();
        let t = c.thing_mut(bones).unwrap();
        let first = t.events.pending(EventKind::Cleanup).unwrap().token.clone();
        engine
            .context()
            .schedule(t, EventKind::Cleanup, Duration::from_millis(400), Duration::ZERO)
            .unwrap();
        first
    };
    assert!(first.is_cancelled());

    // Past the first deadline, short of the second.
    std::thread::sleep(Duration::from_millis(300));
    assert!(arena.lock().contains(bones));
    assert!(inbox.messages().is_empty());

    assert!(inbox.wait_for("The bones crumble.", WAIT).is_some());
    assert!(eventually(|| !arena.lock().contains(bones)));
    std::thread::sleep(Duration::from_millis(100));
    assert!(inbox.messages().is_empty(), "cleanup ran twice");
    assert!(engine.world().whereabouts(bones).is_none());
}

// ── Stale events ─────────────────────────────────────────────────

#[test]
fn foreign_token_is_stale() {
    let (engine, arena, _) = start(fast());
    let (ann, inbox) = player("Ann", 10);
    let ann = engine.spawn(ann, &arena).unwrap();

    let input = Input::Scheduled {
        kind: EventKind::Combat,
        token: CancelToken::issue(),
    };
    let done = engine.execute(ann, input).unwrap();
    assert_eq!(done.outcome, Outcome::Stale);
    assert!(inbox.messages().is_empty());
    assert_eq!(engine.metrics().stale_events, 1);
}

#[test]
fn events_for_removed_things_are_stale() {
    let (engine, arena, _) = start(fast());
    let (ann, _inbox) = player("Ann", 10);
    let ann = engine.spawn(ann, &arena).unwrap();
    let gob = engine.spawn(goblin(2), &arena).unwrap();
    let token = CancelToken::issue();

    engine.execute(ann, "hit goblin").unwrap();
    let done = engine
        .execute(
            gob,
            Input::Scheduled {
                kind: EventKind::Health,
                token,
            },
        )
        .unwrap();
    assert_eq!(done.outcome, Outcome::Stale);
}

#[test]
fn quit_cancels_everything_pending() {
    let (engine, arena, _) = start(EngineConfig {
        dispatch_workers: Some(1),
        ..EngineConfig::default()
    });
    let (mut ann, inbox) = player("Ann", 10);
    if let Some(h) = ann.health.as_mut() {
        h.current = 4;
    }
    let ann = engine.spawn(ann, &arena).unwrap();
    let (bob, bob_inbox) = player("Bob", 10);
    engine.spawn(bob, &arena).unwrap();
    assert_eq!(engine.pending_events().unwrap(), 1);

    let done = engine.execute(ann, "quit").unwrap();
    assert_eq!(done.outcome, Outcome::Completed);
    assert_eq!(inbox.messages(), vec!["You leave the world."]);
    assert_eq!(bob_inbox.messages(), vec!["Ann vanishes."]);
    assert_eq!(engine.pending_events().unwrap(), 0);
    assert!(engine.world().whereabouts(ann).is_none());

    let done = engine.execute(ann, "look").unwrap();
    assert_eq!(done.outcome, Outcome::Stale);
}

#[test]
fn quitting_mid_fight_stops_the_attacker() {
    let (engine, arena, _) = start(EngineConfig {
        round_duration: Duration::from_secs(60),
        ..fast()
    });
    let (ann, ann_inbox) = player("Ann", 100);
    let (bob, _) = player("Bob", 100);
    let ann = engine.spawn(ann, &arena).unwrap();
    let bob = engine.spawn(bob, &arena).unwrap();

    engine.execute(ann, "fight bob").unwrap();
    engine.execute(bob, "quit").unwrap();
    assert!(ann_inbox.wait_for("You stop fighting Bob.", WAIT).is_some());
    let c = arena.lock();
    let me = c.thing(ann).unwrap();
    assert!(me.session.opponent.is_none());
    assert!(!me.events.is_pending(EventKind::Combat));
}

// ── LOOK and movement ────────────────────────────────────────────

#[test]
fn look_and_walk() {
    let (engine, arena, corridor) = start(fast());
    let (ann, ann_inbox) = player("Ann", 10);
    let (bob, bob_inbox) = player("Bob", 10);
    let (cat, cat_inbox) = player("Cat", 10);
    let ann = engine.spawn(ann, &arena).unwrap();
    engine.spawn(bob, &arena).unwrap();
    engine.spawn(cat, &corridor).unwrap();

    engine.execute(ann, "look").unwrap();
    assert_eq!(
        ann_inbox.messages(),
        vec!["[Arena]\nYou see Bob here.\nYou see exits: north east"]
    );

    let done = engine.execute(ann, "n").unwrap();
    assert_eq!(done.outcome, Outcome::Completed);
    assert_eq!(done.passes, 2);
    assert_eq!(
        ann_inbox.messages(),
        vec!["[Corridor]\nYou see Cat here.\nYou see exits: south"]
    );
    assert_eq!(bob_inbox.messages(), vec!["Ann leaves north."]);
    assert_eq!(cat_inbox.messages(), vec!["Ann enters."]);
    assert!(Arc::ptr_eq(
        &engine.world().whereabouts(ann).unwrap(),
        &corridor
    ));

    let done = engine.execute(ann, "up").unwrap();
    assert_eq!(done.outcome, Outcome::NoMatch);
    assert_eq!(ann_inbox.messages(), vec!["You can't go up from here."]);

    engine.execute(ann, "look cat").unwrap();
    assert_eq!(ann_inbox.messages(), vec!["You see Cat."]);
}

#[test]
fn unknown_verbs_get_a_shrug() {
    let (engine, arena, _) = start(fast());
    let (ann, inbox) = player("Ann", 10);
    let ann = engine.spawn(ann, &arena).unwrap();

    for line in ["dance", "", "$combat"] {
        let done = engine.execute(ann, line).unwrap();
        assert_eq!(done.outcome, Outcome::NoMatch, "{line:?}");
    }
    assert_eq!(inbox.messages(), vec!["Eh?", "Eh?", "Eh?"]);
}

// ── Failure handling ─────────────────────────────────────────────

fn explode(_: &mut CommandState, _: &mut Held<'_, Location>, _: &Context) -> Handled {
    panic!("boom");
}

fn grabby(state: &mut CommandState, _: &mut Held<'_, Location>, ctx: &Context) -> Handled {
    for loc in ctx.world.locations() {
        if state.add_lock(loc) {
            return Err(Halt::Relock);
        }
    }
    state.msg.actor.send(format!("Holding {}.", state.resources.len()));
    Ok(())
}

#[test]
fn panicking_handler_releases_locks() {
    let mut handlers = Handlers::standard();
    handlers.register("EXPLODE", explode);
    handlers.register("GRAB", grabby);
    let Arena { world, arena, .. } = arena();
    let engine = Engine::builder(world)
        .config(fast())
        .handlers(handlers)
        .build()
        .unwrap();
    let (ann, inbox) = player("Ann", 10);
    let ann = engine.spawn(ann, &arena).unwrap();

    let err = engine.execute(ann, "explode").unwrap_err();
    assert!(matches!(err, ExecuteError::HandlerPanicked { ref verb, .. } if verb == "EXPLODE"));
    assert_eq!(engine.metrics().handler_panics, 1);
    assert!(inbox.messages().is_empty());

    // Every location can still be locked, all at once.
    let done = engine.execute(ann, "grab").unwrap();
    assert_eq!(done.outcome, Outcome::Completed);
    assert_eq!(done.passes, 3);
    assert_eq!(inbox.messages(), vec!["Holding 3."]);
}

#[test]
fn shutdown_refuses_new_commands() {
    let (mut engine, arena, _) = start(fast());
    let (ann, _) = player("Ann", 10);
    let ann = engine.spawn(ann, &arena).unwrap();
    engine
        .spawn(chatterbox(Duration::from_secs(60)), &arena)
        .unwrap();

    let report = engine.shutdown();
    assert!(report.timer_joined);
    assert_eq!(report.workers_joined, 2);
    assert_eq!(report.entries_dropped, 1);
    assert_eq!(
        engine.execute(ann, "look").unwrap_err(),
        ExecuteError::ShuttingDown
    );

    let again = engine.shutdown();
    assert_eq!(again.workers_joined, 0);
}
