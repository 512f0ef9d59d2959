//! Convenience re-exports: `use sandtable::prelude::*` for the common items.

// Core
pub use crate::config::SandboxConfig;
pub use crate::error::{Error, Result};
pub use crate::events::{Event, EventBus, EventKind, EventLog, SubscriptionId};
pub use crate::math::Vec3;

// ORBAT
pub use crate::orbat::{
    CombatPosture, FileStore, KeyValueStore, MemoryStore, MovementState, Orbat, OrbatSnapshot,
    OrbatStats, ServiceBranch, SymbolCode, TreeNode, Unit, UnitId, UnitLevel, UnitPatch,
    UnitSpec, load_orbat, save_orbat,
};

// Paths
pub use crate::path::{
    CatmullRomCurve, CurveKind, FrameScheduler, FrameToken, ManualScheduler, MovePathEngine,
    PathInfo, PathState, RealtimeScheduler,
};
