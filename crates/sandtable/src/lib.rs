//! # Sandtable — Tactical Sandbox Core
//!
//! Keeps an order of battle (ORBAT) of military units and plans and replays a
//! unit's ground movement along an edited path.
//!
//! Two components hold the invariants:
//!
//! - [`Orbat`](orbat::Orbat) — the unit forest. Parent/child links, reparenting,
//!   recursive removal, aggregate statistics.
//! - [`MovePathEngine`](path::MovePathEngine) — waypoint editing for one unit,
//!   a Catmull-Rom path through the waypoints, and a play/stop animation driven
//!   by a host [`FrameScheduler`](path::FrameScheduler).
//!
//! Both announce their mutations on an injected [`EventBus`](events::EventBus)
//! so renderers and UI layers can re-sync their own state.
//!
//! Start with `use sandtable::prelude::*`.

pub mod config;
pub mod error;
pub mod events;
pub mod math;
pub mod orbat;
pub mod path;
pub mod prelude;

pub use error::{Error, Result};
