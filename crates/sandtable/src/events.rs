//! # Coordination Bus — Synchronous Publish/Subscribe
//!
//! [`Orbat`](crate::orbat::Orbat) and
//! [`MovePathEngine`](crate::path::MovePathEngine) announce every mutation as
//! an [`Event`]. Renderers and UI layers subscribe and rebuild their own
//! presentation state; nothing flows back into the core through the bus.
//!
//! ## Dispatch Contract
//!
//! - Synchronous: [`EventBus::emit`] returns after every matching handler ran.
//! - Handlers run in registration order.
//! - A handler that returns `Err` or panics is logged and isolated; the
//!   remaining handlers still run.
//! - `once` handlers are dropped before they run, so they fire at most once
//!   even if they emit re-entrantly.
//! - Handlers may subscribe, unsubscribe, or emit while a dispatch is in
//!   progress. A handler is never re-entered while it is running; the nested
//!   delivery to it is skipped with a warning.
//!
//! ```ignore
//! let bus = EventBus::new();
//! bus.subscribe(EventKind::UnitAdded, |event| {
//!     if let Event::UnitAdded { unit } = event {
//!         log::info!("spawn marker for {}", unit.name);
//!     }
//!     Ok(())
//! });
//! let mut orbat = Orbat::new(bus.clone());
//! ```

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;

use crate::math::Vec3;
use crate::orbat::{Unit, UnitId, UnitPatch};

// ── Events ──────────────────────────────────────────────────────────────

/// A notification emitted by the core.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    UnitAdded { unit: Box<Unit> },
    UnitUpdated { id: UnitId, patch: Box<UnitPatch> },
    UnitRemoved { id: UnitId },
    UnitMoved {
        id: UnitId,
        old_parent: Option<UnitId>,
        new_parent: Option<UnitId>,
    },
    OrbatCleared,
    /// A snapshot replaced the forest.
    OrbatLoaded { count: usize },
    PathLoaded {
        unit: UnitId,
        waypoints: usize,
        read_only: bool,
    },
    WaypointAdded { unit: UnitId, index: usize, total: usize },
    WaypointRemoved { unit: UnitId, index: usize, total: usize },
    PathCleared { unit: UnitId },
    PlaybackStarted { unit: UnitId, duration: Duration },
    /// One animation tick moved the unit.
    PlaybackProgress {
        unit: UnitId,
        progress: f32,
        position: Vec3,
    },
    PlaybackStopped { unit: Option<UnitId> },
    PlaybackCompleted { unit: UnitId },
    PathDisposed,
}

/// Discriminant of [`Event`], used to filter subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    UnitAdded,
    UnitUpdated,
    UnitRemoved,
    UnitMoved,
    OrbatCleared,
    OrbatLoaded,
    PathLoaded,
    WaypointAdded,
    WaypointRemoved,
    PathCleared,
    PlaybackStarted,
    PlaybackProgress,
    PlaybackStopped,
    PlaybackCompleted,
    PathDisposed,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::UnitAdded { .. } => EventKind::UnitAdded,
            Event::UnitUpdated { .. } => EventKind::UnitUpdated,
            Event::UnitRemoved { .. } => EventKind::UnitRemoved,
            Event::UnitMoved { .. } => EventKind::UnitMoved,
            Event::OrbatCleared => EventKind::OrbatCleared,
            Event::OrbatLoaded { .. } => EventKind::OrbatLoaded,
            Event::PathLoaded { .. } => EventKind::PathLoaded,
            Event::WaypointAdded { .. } => EventKind::WaypointAdded,
            Event::WaypointRemoved { .. } => EventKind::WaypointRemoved,
            Event::PathCleared { .. } => EventKind::PathCleared,
            Event::PlaybackStarted { .. } => EventKind::PlaybackStarted,
            Event::PlaybackProgress { .. } => EventKind::PlaybackProgress,
            Event::PlaybackStopped { .. } => EventKind::PlaybackStopped,
            Event::PlaybackCompleted { .. } => EventKind::PlaybackCompleted,
            Event::PathDisposed => EventKind::PathDisposed,
        }
    }
}

impl EventKind {
    /// Channel name, for logs.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::UnitAdded => "orbat:unit:added",
            EventKind::UnitUpdated => "orbat:unit:updated",
            EventKind::UnitRemoved => "orbat:unit:removed",
            EventKind::UnitMoved => "orbat:unit:moved",
            EventKind::OrbatCleared => "orbat:cleared",
            EventKind::OrbatLoaded => "orbat:loaded",
            EventKind::PathLoaded => "path:loaded",
            EventKind::WaypointAdded => "path:waypoint:added",
            EventKind::WaypointRemoved => "path:waypoint:removed",
            EventKind::PathCleared => "path:cleared",
            EventKind::PlaybackStarted => "path:playback:started",
            EventKind::PlaybackProgress => "path:playback:progress",
            EventKind::PlaybackStopped => "path:playback:stopped",
            EventKind::PlaybackCompleted => "path:playback:completed",
            EventKind::PathDisposed => "path:disposed",
        }
    }
}

// ── Bus ─────────────────────────────────────────────────────────────────

/// Returned by the subscribe methods; pass to [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = dyn FnMut(&Event) -> anyhow::Result<()>;

struct Subscription {
    id: SubscriptionId,
    /// `None` receives every event.
    filter: Option<EventKind>,
    once: bool,
    handler: Rc<RefCell<Box<Handler>>>,
}

impl Subscription {
    fn matches(&self, kind: EventKind) -> bool {
        self.filter.is_none_or(|filter| filter == kind)
    }
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

/// Shared handle to a synchronous event dispatcher.
///
/// Cloning is cheap and every clone talks to the same subscriber list.
/// Single-threaded by construction (`Rc`).
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `handler` for every event of `kind`.
    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl FnMut(&Event) -> anyhow::Result<()> + 'static,
    ) -> SubscriptionId {
        self.register(Some(kind), false, Box::new(handler))
    }

    /// Call `handler` for every event.
    pub fn subscribe_all(
        &self,
        handler: impl FnMut(&Event) -> anyhow::Result<()> + 'static,
    ) -> SubscriptionId {
        self.register(None, false, Box::new(handler))
    }

    /// Call `handler` for the next event of `kind` only.
    pub fn once(
        &self,
        kind: EventKind,
        handler: impl FnMut(&Event) -> anyhow::Result<()> + 'static,
    ) -> SubscriptionId {
        self.register(Some(kind), true, Box::new(handler))
    }

    fn register(&self, filter: Option<EventKind>, once: bool, handler: Box<Handler>) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.subscriptions.push(Subscription {
            id,
            filter,
            once,
            handler: Rc::new(RefCell::new(handler)),
        });
        id
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.subscriptions.len();
        inner.subscriptions.retain(|sub| sub.id != id);
        inner.subscriptions.len() != before
    }

    /// Deliver `event` to every matching handler, in registration order.
    pub fn emit(&self, event: Event) {
        let kind = event.kind();

        // Snapshot the targets so handlers can touch the bus while we dispatch.
        let targets: Vec<Rc<RefCell<Box<Handler>>>> = {
            let mut inner = self.inner.borrow_mut();
            let mut targets = Vec::new();
            inner.subscriptions.retain(|sub| {
                if !sub.matches(kind) {
                    return true;
                }
                targets.push(Rc::clone(&sub.handler));
                !sub.once
            });
            targets
        };

        log::trace!("emit {} to {} handler(s)", kind.name(), targets.len());

        for handler in targets {
            let Ok(mut handler) = handler.try_borrow_mut() else {
                log::warn!("Skipping re-entrant delivery of [{}] to a running handler", kind.name());
                continue;
            };
            match panic::catch_unwind(AssertUnwindSafe(|| (&mut **handler)(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("Event handler failed [{}]: {e:#}", kind.name()),
                Err(_) => log::error!("Event handler panicked [{}]", kind.name()),
            }
        }
    }

    /// Number of handlers that would receive an event of `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .borrow()
            .subscriptions
            .iter()
            .filter(|sub| sub.matches(kind))
            .count()
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        self.inner.borrow_mut().subscriptions.clear();
    }

    /// Drop the subscriptions filtered on `kind`. Catch-all subscriptions stay.
    pub fn clear_kind(&self, kind: EventKind) {
        self.inner
            .borrow_mut()
            .subscriptions
            .retain(|sub| sub.filter != Some(kind));
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.inner.borrow().subscriptions.len())
            .finish()
    }
}

/// A subscriber that records every event it sees, for tests and replay logs.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<Event>>>,
}

impl EventLog {
    /// Subscribe a new recorder to every event on `bus`.
    pub fn attach(bus: &EventBus) -> Self {
        let log = Self::default();
        let sink = Rc::clone(&log.events);
        bus.subscribe_all(move |event| {
            sink.borrow_mut().push(event.clone());
            Ok(())
        });
        log
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.borrow().iter().map(Event::kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.borrow().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(bus: &EventBus, kind: EventKind) -> Rc<RefCell<usize>> {
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        bus.subscribe(kind, move |_| {
            *c.borrow_mut() += 1;
            Ok(())
        });
        count
    }

    #[test]
    fn filtered_delivery() {
        let bus = EventBus::new();
        let cleared = counter(&bus, EventKind::OrbatCleared);
        let disposed = counter(&bus, EventKind::PathDisposed);

        bus.emit(Event::OrbatCleared);
        bus.emit(Event::OrbatCleared);

        assert_eq!(*cleared.borrow(), 2);
        assert_eq!(*disposed.borrow(), 0);
    }

    #[test]
    fn registration_order() {
        let bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            bus.subscribe(EventKind::OrbatCleared, move |_| {
                order.borrow_mut().push(tag);
                Ok(())
            });
        }
        bus.emit(Event::OrbatCleared);
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn failing_handlers_are_isolated() {
        let bus = EventBus::new();
        bus.subscribe(EventKind::OrbatCleared, |_| anyhow::bail!("renderer lost its context"));
        bus.subscribe(EventKind::OrbatCleared, |_| panic!("handler bug"));
        let after = counter(&bus, EventKind::OrbatCleared);

        bus.emit(Event::OrbatCleared);
        assert_eq!(*after.borrow(), 1);

        // The panicking handler is still registered and the bus still works.
        bus.emit(Event::OrbatCleared);
        assert_eq!(*after.borrow(), 2);
        assert_eq!(bus.listener_count(EventKind::OrbatCleared), 3);
    }

    #[test]
    fn once_fires_once() {
        let bus = EventBus::new();
        let hits = Rc::new(RefCell::new(0));
        let h = Rc::clone(&hits);
        bus.once(EventKind::OrbatCleared, move |_| {
            *h.borrow_mut() += 1;
            Ok(())
        });
        assert_eq!(bus.listener_count(EventKind::OrbatCleared), 1);

        bus.emit(Event::OrbatCleared);
        bus.emit(Event::OrbatCleared);
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(bus.listener_count(EventKind::OrbatCleared), 0);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let hits = Rc::new(RefCell::new(0));
        let h = Rc::clone(&hits);
        let id = bus.subscribe(EventKind::OrbatCleared, move |_| {
            *h.borrow_mut() += 1;
            Ok(())
        });

        bus.emit(Event::OrbatCleared);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(Event::OrbatCleared);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn handlers_can_emit_reentrantly() {
        let bus = EventBus::new();
        let inner_bus = bus.clone();
        bus.subscribe(EventKind::OrbatCleared, move |_| {
            inner_bus.emit(Event::PathDisposed);
            Ok(())
        });
        let log = EventLog::attach(&bus);

        bus.emit(Event::OrbatCleared);

        // The nested PathDisposed reaches the log first because the log is
        // still waiting for the outer event.
        assert_eq!(log.kinds(), vec![EventKind::PathDisposed, EventKind::OrbatCleared]);
    }

    #[test]
    fn running_handler_is_not_reentered() {
        let bus = EventBus::new();
        let inner_bus = bus.clone();
        let calls = Rc::new(RefCell::new(0));
        let c = Rc::clone(&calls);
        bus.subscribe(EventKind::OrbatCleared, move |_| {
            *c.borrow_mut() += 1;
            inner_bus.emit(Event::OrbatCleared);
            Ok(())
        });

        bus.emit(Event::OrbatCleared);
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn clear_kind_keeps_catch_all() {
        let bus = EventBus::new();
        let _ = counter(&bus, EventKind::OrbatCleared);
        let log = EventLog::attach(&bus);
        assert_eq!(bus.listener_count(EventKind::OrbatCleared), 2);

        bus.clear_kind(EventKind::OrbatCleared);
        assert_eq!(bus.listener_count(EventKind::OrbatCleared), 1);

        bus.emit(Event::OrbatCleared);
        assert_eq!(log.count(EventKind::OrbatCleared), 1);

        bus.clear();
        assert_eq!(bus.listener_count(EventKind::OrbatCleared), 0);
    }
}
