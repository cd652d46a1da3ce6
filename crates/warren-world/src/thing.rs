//! Things: actors, items and corpses, with their event slots and combat
//! session state.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use warren_core::{CancelToken, EventKind, Pending, Sink, ThingId};

/// Health of a thing that can be hurt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Health {
    /// Current health. Never persisted below zero.
    pub current: i64,
    /// Maximum health. Zero means the thing cannot be killed.
    pub maximum: i64,
    /// Health restored by each regeneration tick.
    pub regen_amount: i64,
    /// Delay between regeneration ticks.
    pub regen_after: Duration,
}

impl Health {
    /// Full health with a default regeneration of 1 point every 10 seconds.
    pub fn new(maximum: i64) -> Self {
        Self {
            current: maximum,
            maximum,
            regen_amount: 1,
            regen_after: Duration::from_secs(10),
        }
    }

    /// Whether current health is at (or above) maximum.
    pub fn is_full(&self) -> bool {
        self.current >= self.maximum
    }
}

/// Ambient action: periodic flavour text sent to the thing's location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionSpec {
    /// Base delay before each action.
    pub after: Duration,
    /// Extra random delay in `[0, jitter)`.
    pub jitter: Duration,
    /// Texts to pick from.
    pub texts: Vec<String>,
}

/// Delayed removal of the thing from the world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CleanupSpec {
    /// Delay before removal.
    pub after: Duration,
    /// Text shown to the location when the thing is removed.
    pub text: String,
}

/// Combat session state.
///
/// `opponent` is whom this thing attacks; the owner of a session drives
/// it with its own `$COMBAT` event chain. `opponents` is the multiset of
/// things currently targeting this one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    /// Whom this thing is attacking.
    pub opponent: Option<ThingId>,
    /// Who is attacking this thing.
    pub opponents: Vec<ThingId>,
}

impl Session {
    /// Whether this thing is attacking or being attacked.
    pub fn is_engaged(&self) -> bool {
        self.opponent.is_some() || !self.opponents.is_empty()
    }

    /// Remove every occurrence of `id` from the attackers.
    pub fn release(&mut self, id: ThingId) {
        self.opponents.retain(|o| *o != id);
    }

    /// Forget the whole session.
    pub fn clear(&mut self) {
        self.opponent = None;
        self.opponents.clear();
    }
}

/// Pending event slots, at most one per [`EventKind`].
#[derive(Clone, Debug, Default)]
pub struct Events {
    slots: [Option<Pending>; EventKind::COUNT],
}

impl Events {
    /// The pending event of `kind`, if any.
    pub fn pending(&self, kind: EventKind) -> Option<&Pending> {
        self.slots[kind.slot()].as_ref()
    }

    /// Whether an event of `kind` is pending.
    pub fn is_pending(&self, kind: EventKind) -> bool {
        self.slots[kind.slot()].is_some()
    }

    /// Store a newly scheduled event, cancelling any previous one of the
    /// same kind.
    pub fn install(&mut self, kind: EventKind, pending: Pending) {
        if let Some(previous) = self.slots[kind.slot()].replace(pending) {
            previous.token.cancel();
        }
    }

    /// Cancel and forget the pending event of `kind`. Returns whether a
    /// slot was occupied.
    pub fn cancel(&mut self, kind: EventKind) -> bool {
        match self.slots[kind.slot()].take() {
            Some(pending) => {
                pending.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending event. Used on the destruction path.
    pub fn cancel_all(&mut self) {
        for kind in EventKind::ALL {
            self.cancel(kind);
        }
    }

    /// Whether the slot for `kind` still holds exactly this token.
    pub fn is_current(&self, kind: EventKind, token: &CancelToken) -> bool {
        self.pending(kind).is_some_and(|p| p.token.same_as(token))
    }

    /// Empty the slot for `kind` if it still holds this token.
    pub fn clear_if_current(&mut self, kind: EventKind, token: &CancelToken) -> bool {
        if self.is_current(kind, token) {
            self.slots[kind.slot()] = None;
            true
        } else {
            false
        }
    }
}

/// Any addressable object in the world.
pub struct Thing {
    id: ThingId,
    /// Indefinite name, e.g. "a goblin".
    pub name: String,
    /// Definite name, e.g. "the goblin".
    pub the_name: String,
    /// Uppercase words this thing answers to.
    pub aliases: Vec<String>,
    /// Long description.
    pub description: String,
    /// Players respawn on death instead of being removed.
    pub is_player: bool,
    /// Present on things that can be hurt.
    pub health: Option<Health>,
    /// Ambient action behaviour.
    pub action: Option<ActionSpec>,
    /// Delayed clean-up behaviour.
    pub cleanup: Option<CleanupSpec>,
    /// Combat session state.
    pub session: Session,
    /// Pending scheduled events.
    pub events: Events,
    sink: Option<Arc<dyn Sink>>,
}

impl Thing {
    /// A new thing with a fresh id, using `name` as both the indefinite
    /// and definite name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: ThingId::next(),
            the_name: name.clone(),
            name,
            aliases: Vec::new(),
            description: String::new(),
            is_player: false,
            health: None,
            action: None,
            cleanup: None,
            session: Session::default(),
            events: Events::default(),
            sink: None,
        }
    }

    /// A player named `name`, receiving text through `sink`.
    pub fn player(name: impl Into<String>, sink: Arc<dyn Sink>) -> Self {
        let name = name.into();
        let alias = name.to_uppercase();
        let mut thing = Self::new(name).with_alias(alias);
        thing.is_player = true;
        thing.sink = Some(sink);
        thing
    }

    /// Set the definite name.
    pub fn with_the_name(mut self, the_name: impl Into<String>) -> Self {
        self.the_name = the_name.into();
        self
    }

    /// Add a matching alias. Stored uppercased.
    pub fn with_alias(mut self, alias: impl AsRef<str>) -> Self {
        self.aliases.push(alias.as_ref().to_uppercase());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Give the thing full health of `maximum`.
    pub fn with_health(mut self, maximum: i64) -> Self {
        self.health = Some(Health::new(maximum));
        self
    }

    /// Give the thing an ambient action.
    pub fn with_action(mut self, after: Duration, jitter: Duration, texts: &[&str]) -> Self {
        self.action = Some(ActionSpec {
            after,
            jitter,
            texts: texts.iter().map(|t| (*t).to_owned()).collect(),
        });
        self
    }

    /// Make the thing clean itself up `after` it is placed.
    pub fn with_cleanup(mut self, after: Duration, text: impl Into<String>) -> Self {
        self.cleanup = Some(CleanupSpec {
            after,
            text: text.into(),
        });
        self
    }

    /// Stable identity.
    pub fn id(&self) -> ThingId {
        self.id
    }

    /// Where text for this thing goes, if it is connected.
    pub fn sink(&self) -> Option<&Arc<dyn Sink>> {
        self.sink.as_ref()
    }

    /// Actors (players and anything with health) stand in a location's
    /// `who` list; everything else lies among its items.
    pub fn is_actor(&self) -> bool {
        self.is_player || self.health.is_some()
    }

    /// Whether this thing can be killed at all.
    pub fn is_killable(&self) -> bool {
        self.health.as_ref().is_some_and(|h| h.maximum > 0)
    }

    /// Whether `word` (uppercased) names this thing.
    pub fn matches(&self, word: &str) -> bool {
        self.aliases.iter().any(|a| a == word)
    }

    /// Indefinite name with the first letter capitalised.
    pub fn uname(&self) -> String {
        title_first(&self.name)
    }

    /// Definite name with the first letter capitalised.
    pub fn uthe_name(&self) -> String {
        title_first(&self.the_name)
    }

    /// A corpse carrying a copy of this thing's descriptive attributes and
    /// a clean-up behaviour.
    pub fn corpse(&self, cleanup_after: Duration) -> Thing {
        let mut corpse = Thing::new(format!("a corpse of {}", self.name))
            .with_the_name(format!("the corpse of {}", self.name))
            .with_description(self.description.clone());
        corpse.aliases = self.aliases.clone();
        corpse.aliases.push("CORPSE".to_owned());
        let text = format!("{} turns to dust.", corpse.uthe_name());
        corpse.with_cleanup(cleanup_after, text)
    }
}

impl fmt::Debug for Thing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thing")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("is_player", &self.is_player)
            .field("health", &self.health)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

fn title_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn pending() -> Pending {
        Pending {
            token: CancelToken::issue(),
            due: Instant::now(),
        }
    }

    #[test]
    fn install_cancels_previous() {
        let mut events = Events::default();
        let first = pending();
        let first_token = first.token.clone();
        events.install(EventKind::Action, first);
        events.install(EventKind::Action, pending());
        assert!(first_token.is_cancelled());
        assert!(events.is_pending(EventKind::Action));
        assert!(!events.is_current(EventKind::Action, &first_token));
    }

    #[test]
    fn cancel_empties_slot() {
        let mut events = Events::default();
        let p = pending();
        let token = p.token.clone();
        events.install(EventKind::Combat, p);
        assert!(events.cancel(EventKind::Combat));
        assert!(!events.cancel(EventKind::Combat));
        assert!(token.is_cancelled());
        assert!(events.pending(EventKind::Combat).is_none());
    }

    #[test]
    fn clear_if_current_ignores_other_tokens() {
        let mut events = Events::default();
        let p = pending();
        let token = p.token.clone();
        events.install(EventKind::Health, p);
        assert!(!events.clear_if_current(EventKind::Health, &CancelToken::issue()));
        assert!(events.clear_if_current(EventKind::Health, &token));
        assert!(!events.is_pending(EventKind::Health));
        // Clearing after firing does not cancel.
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_all_covers_every_kind() {
        let mut events = Events::default();
        let tokens: Vec<CancelToken> = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let p = pending();
                let t = p.token.clone();
                events.install(kind, p);
                t
            })
            .collect();
        events.cancel_all();
        assert!(tokens.iter().all(CancelToken::is_cancelled));
    }

    #[test]
    fn corpse_copies_description_and_aliases() {
        let goblin = Thing::new("a goblin")
            .with_the_name("the goblin")
            .with_alias("goblin")
            .with_description("A small green goblin.")
            .with_health(10);
        let corpse = goblin.corpse(Duration::from_secs(60));
        assert_ne!(corpse.id(), goblin.id());
        assert_eq!(corpse.name, "a corpse of a goblin");
        assert_eq!(corpse.uthe_name(), "The corpse of a goblin");
        assert_eq!(corpse.description, goblin.description);
        assert!(corpse.matches("GOBLIN"));
        assert!(corpse.matches("CORPSE"));
        assert!(!corpse.is_actor());
        assert!(!corpse.is_killable());
        let cleanup = corpse.cleanup.as_ref().unwrap();
        assert_eq!(cleanup.after, Duration::from_secs(60));
        assert_eq!(cleanup.text, "The corpse of a goblin turns to dust.");
    }

    #[test]
    fn session_release_removes_all_occurrences() {
        let a = ThingId::next();
        let b = ThingId::next();
        let mut session = Session {
            opponent: None,
            opponents: vec![a, b, a],
        };
        session.release(a);
        assert_eq!(session.opponents, vec![b]);
        assert!(session.is_engaged());
        session.clear();
        assert!(!session.is_engaged());
    }

    #[test]
    fn player_answers_to_its_name() {
        let (tx, _rx) = crossbeam_channel::unbounded::<String>();
        let alice = Thing::player("Alice", Arc::new(tx));
        assert!(alice.is_player);
        assert!(alice.is_actor());
        assert!(alice.matches("ALICE"));
        assert!(alice.sink().is_some());
    }
}
