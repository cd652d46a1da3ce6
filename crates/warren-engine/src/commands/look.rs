//! LOOK: describe the actor's location, or something in it.

use warren_core::ThingId;
use warren_world::{Contents, Location};

use super::target;
use crate::cycle::Held;
use crate::engine::Context;
use crate::state::{CommandState, Halt, Handled};

/// `LOOK [thing]`.
pub fn look(state: &mut CommandState, held: &mut Held<'_, Location>, _: &Context) -> Handled {
    let here = state.here()?;
    let contents = state.contents(held)?;

    if state.words.is_empty() {
        for line in describe(&here, contents, state.actor) {
            state.msg.actor.send(line);
        }
        return Ok(());
    }

    let id = target(state, contents, "look at")?;
    let thing = contents.thing(id).ok_or(Halt::Stale)?;
    let mut line = format!("You see {}.", thing.name);
    if !thing.description.is_empty() {
        line.push(' ');
        line.push_str(&thing.description);
    }
    state.msg.actor.send(line);
    Ok(())
}

/// Lines describing `at` as seen by `viewer`.
pub(crate) fn describe(at: &Location, contents: &Contents, viewer: ThingId) -> Vec<String> {
    let mut lines = vec![format!("[{}]", at.name())];

    let present: Vec<&str> = contents
        .who
        .values()
        .filter(|t| t.id() != viewer)
        .chain(contents.items.values())
        .map(|t| t.name.as_str())
        .collect();
    if !present.is_empty() {
        lines.push(format!("You see {} here.", list(&present)));
    }

    let exits = contents.exit_directions();
    if exits.is_empty() {
        lines.push("You see no immediate exits.".to_owned());
    } else {
        let names: Vec<&str> = exits.iter().map(|d| d.name()).collect();
        lines.push(format!("You see exits: {}", names.join(" ")));
    }
    lines
}

/// "a", "a and b", "a, b and c".
fn list(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [one] => (*one).to_owned(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use warren_core::{Direction, Lockable};
    use warren_world::Thing;

    #[test]
    fn list_joins_naturally() {
        assert_eq!(list(&["a goblin"]), "a goblin");
        assert_eq!(list(&["a goblin", "a rat"]), "a goblin and a rat");
        assert_eq!(list(&["a", "b", "c"]), "a, b and c");
    }

    #[test]
    fn describe_skips_viewer_and_lists_exits() {
        let hall = Arc::new(Location::new("Hall"));
        let yard = Arc::new(Location::new("Yard"));
        let viewer = Thing::new("Ann").with_health(5);
        let viewer_id = viewer.id();
        let mut c = hall.lock();
        c.link(Direction::North, &yard);
        c.link(Direction::Up, &yard);
        c.admit(viewer);
        c.admit(Thing::new("a goblin").with_health(3));
        c.admit(Thing::new("a sword"));

        let lines = describe(&hall, &c, viewer_id);
        assert_eq!(
            lines,
            vec![
                "[Hall]".to_owned(),
                "You see a goblin and a sword here.".to_owned(),
                "You see exits: north up".to_owned(),
            ]
        );
    }

    #[test]
    fn describe_empty_room() {
        let cell = Location::new("Cell");
        let c = Contents::default();
        assert_eq!(
            describe(&cell, &c, ThingId::next()),
            vec!["[Cell]".to_owned(), "You see no immediate exits.".to_owned()]
        );
    }
}
