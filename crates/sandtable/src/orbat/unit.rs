//! # Units — The ORBAT Entity Model
//!
//! A [`Unit`] carries identity, its place in the forest (`parent_id` and
//! `child_ids`), classification metadata, personnel and supply levels, and a
//! position with an optional planned movement path.
//!
//! Two values are derived and can never go stale:
//!
//! - [`Strength::fill_rate`] = `round(100 * current / authorized)`, `0` when
//!   nothing is authorized.
//! - [`Supply::overall`] = `min(fuel, ammunition, provisions)`.
//!
//! Both types keep their fields private and recompute on every write,
//! including deserialization.
//!
//! Units are created from a [`UnitSpec`] and mutated through an explicit
//! [`UnitPatch`]; structural fields are only changed by
//! [`Orbat`](super::Orbat).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::symbol::SymbolCode;
use crate::math::{Vec3, normalize_heading};

// ── Identity ────────────────────────────────────────────────────────────

/// Opaque unit identifier. Immutable once a unit exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id, `u-` followed by 32 hex digits.
    pub fn generate() -> Self {
        Self(format!("u-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UnitId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ── Classification ──────────────────────────────────────────────────────

/// Echelon, largest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitLevel {
    Theater,
    Army,
    Corps,
    Division,
    Brigade,
    Regiment,
    Battalion,
    #[default]
    Company,
    Platoon,
    Squad,
    Team,
    Vehicle,
}

impl UnitLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitLevel::Theater => "theater",
            UnitLevel::Army => "army",
            UnitLevel::Corps => "corps",
            UnitLevel::Division => "division",
            UnitLevel::Brigade => "brigade",
            UnitLevel::Regiment => "regiment",
            UnitLevel::Battalion => "battalion",
            UnitLevel::Company => "company",
            UnitLevel::Platoon => "platoon",
            UnitLevel::Squad => "squad",
            UnitLevel::Team => "team",
            UnitLevel::Vehicle => "vehicle",
        }
    }
}

impl fmt::Display for UnitLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceBranch {
    #[default]
    Army,
    Navy,
    AirForce,
    Marine,
    SpecialForces,
    CoastGuard,
}

impl ServiceBranch {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceBranch::Army => "army",
            ServiceBranch::Navy => "navy",
            ServiceBranch::AirForce => "air_force",
            ServiceBranch::Marine => "marine",
            ServiceBranch::SpecialForces => "special_forces",
            ServiceBranch::CoastGuard => "coast_guard",
        }
    }
}

impl fmt::Display for ServiceBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatPosture {
    Attack,
    Defend,
    Delay,
    Withdraw,
    Screen,
    #[default]
    Guard,
    Reserve,
    Rest,
    Recon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementState {
    #[default]
    Stationary,
    Moving,
    Halted,
    Embarking,
    Disembarking,
}

// ── Derived Values ──────────────────────────────────────────────────────

/// Personnel strength with its derived fill rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StrengthLevels")]
pub struct Strength {
    current: u32,
    authorized: u32,
    fill_rate: u32,
}

#[derive(Deserialize)]
struct StrengthLevels {
    current: u32,
    authorized: u32,
}

impl From<StrengthLevels> for Strength {
    fn from(levels: StrengthLevels) -> Self {
        Strength::new(levels.current, levels.authorized)
    }
}

impl Strength {
    pub fn new(current: u32, authorized: u32) -> Self {
        Self {
            current,
            authorized,
            fill_rate: fill_rate(current, authorized),
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn authorized(&self) -> u32 {
        self.authorized
    }

    /// Percentage of authorized strength present, rounded.
    pub fn fill_rate(&self) -> u32 {
        self.fill_rate
    }

    pub fn set_current(&mut self, current: u32) {
        *self = Self::new(current, self.authorized);
    }

    pub fn set_authorized(&mut self, authorized: u32) {
        *self = Self::new(self.current, authorized);
    }
}

impl Default for Strength {
    fn default() -> Self {
        Self::new(100, 120)
    }
}

fn fill_rate(current: u32, authorized: u32) -> u32 {
    if authorized == 0 {
        return 0;
    }
    (100.0 * f64::from(current) / f64::from(authorized)).round() as u32
}

/// Supply levels in percent with the derived overall level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "SupplyLevels")]
pub struct Supply {
    fuel: f32,
    ammunition: f32,
    provisions: f32,
    overall: f32,
}

#[derive(Deserialize)]
struct SupplyLevels {
    fuel: f32,
    ammunition: f32,
    provisions: f32,
}

impl From<SupplyLevels> for Supply {
    fn from(levels: SupplyLevels) -> Self {
        Supply::new(levels.fuel, levels.ammunition, levels.provisions)
    }
}

impl Supply {
    pub fn new(fuel: f32, ammunition: f32, provisions: f32) -> Self {
        Self {
            fuel,
            ammunition,
            provisions,
            overall: fuel.min(ammunition).min(provisions),
        }
    }

    pub fn fuel(&self) -> f32 {
        self.fuel
    }

    pub fn ammunition(&self) -> f32 {
        self.ammunition
    }

    pub fn provisions(&self) -> f32 {
        self.provisions
    }

    /// The scarcest of the three supply classes.
    pub fn overall(&self) -> f32 {
        self.overall
    }

    /// Replace whichever levels are given and recompute `overall`.
    pub fn set(&mut self, fuel: Option<f32>, ammunition: Option<f32>, provisions: Option<f32>) {
        *self = Self::new(
            fuel.unwrap_or(self.fuel),
            ammunition.unwrap_or(self.ammunition),
            provisions.unwrap_or(self.provisions),
        );
    }
}

impl Default for Supply {
    fn default() -> Self {
        Self::new(100.0, 100.0, 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatStatus {
    pub posture: CombatPosture,
    pub in_contact: bool,
    /// Percent.
    pub effectiveness: f32,
    /// Percent.
    pub suppression: f32,
}

impl Default for CombatStatus {
    fn default() -> Self {
        Self {
            posture: CombatPosture::Guard,
            in_contact: false,
            effectiveness: 100.0,
            suppression: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementStatus {
    pub state: MovementState,
    /// km/h.
    pub max_speed: f32,
}

impl Default for MovementStatus {
    fn default() -> Self {
        Self {
            state: MovementState::Stationary,
            max_speed: 60.0,
        }
    }
}

// ── Unit ────────────────────────────────────────────────────────────────

pub const DEFAULT_UNIT_NAME: &str = "Unnamed unit";

/// A unit in the order of battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    #[serde(default)]
    pub callsign: Option<String>,
    pub parent_id: Option<UnitId>,
    pub child_ids: Vec<UnitId>,
    pub symbol_code: SymbolCode,
    pub level: UnitLevel,
    pub branch: ServiceBranch,
    #[serde(default)]
    pub designation: String,
    #[serde(default)]
    pub higher_formation: String,
    #[serde(default)]
    pub commander: String,
    pub strength: Strength,
    pub supply: Supply,
    #[serde(default)]
    pub combat: CombatStatus,
    #[serde(default)]
    pub movement: MovementStatus,
    pub position: Vec3,
    /// Degrees, `[0, 360)`.
    #[serde(default)]
    pub heading: f32,
    /// Planned waypoints. Empty means no path; a single element is only the
    /// origin.
    #[serde(default)]
    pub move_path: Vec<Vec3>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Unit {
    /// Build a detached unit from a spec, generating an id if none is given.
    ///
    /// The returned unit has no children; linking it into a forest is
    /// [`Orbat::add_unit`](super::Orbat::add_unit)'s job.
    pub fn from_spec(spec: UnitSpec) -> Self {
        let defaults = Strength::default();
        let default_supply = Supply::default();
        Self {
            id: spec.id.unwrap_or_else(UnitId::generate),
            name: spec.name.unwrap_or_else(|| DEFAULT_UNIT_NAME.to_string()),
            callsign: spec.callsign,
            parent_id: spec.parent_id,
            child_ids: Vec::new(),
            symbol_code: spec.symbol_code.unwrap_or_default(),
            level: spec.level.unwrap_or_default(),
            branch: spec.branch.unwrap_or_default(),
            designation: spec.designation.unwrap_or_default(),
            higher_formation: spec.higher_formation.unwrap_or_default(),
            commander: spec.commander.unwrap_or_default(),
            strength: Strength::new(
                spec.strength.unwrap_or(defaults.current()),
                spec.authorized_strength.unwrap_or(defaults.authorized()),
            ),
            supply: Supply::new(
                spec.fuel.unwrap_or(default_supply.fuel()),
                spec.ammunition.unwrap_or(default_supply.ammunition()),
                spec.provisions.unwrap_or(default_supply.provisions()),
            ),
            combat: CombatStatus {
                posture: spec.posture.unwrap_or_default(),
                ..CombatStatus::default()
            },
            movement: MovementStatus {
                max_speed: spec.max_speed.unwrap_or(MovementStatus::default().max_speed),
                ..MovementStatus::default()
            },
            position: spec.position.unwrap_or(Vec3::ZERO),
            heading: normalize_heading(spec.heading.unwrap_or(0.0)),
            move_path: spec.move_path,
            metadata: spec.metadata,
        }
    }

    /// Merge a patch. Recomputes fill rate and overall supply when their
    /// inputs change.
    pub fn apply(&mut self, patch: &UnitPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(callsign) = &patch.callsign {
            self.callsign = callsign.clone();
        }
        if let Some(code) = &patch.symbol_code {
            self.symbol_code = code.clone();
        }
        if let Some(level) = patch.level {
            self.level = level;
        }
        if let Some(branch) = patch.branch {
            self.branch = branch;
        }
        if let Some(designation) = &patch.designation {
            self.designation = designation.clone();
        }
        if let Some(formation) = &patch.higher_formation {
            self.higher_formation = formation.clone();
        }
        if let Some(commander) = &patch.commander {
            self.commander = commander.clone();
        }

        if patch.strength.is_some() || patch.authorized_strength.is_some() {
            self.strength = Strength::new(
                patch.strength.unwrap_or(self.strength.current()),
                patch.authorized_strength.unwrap_or(self.strength.authorized()),
            );
        }
        if patch.fuel.is_some() || patch.ammunition.is_some() || patch.provisions.is_some() {
            self.supply.set(patch.fuel, patch.ammunition, patch.provisions);
        }

        if let Some(posture) = patch.posture {
            self.combat.posture = posture;
        }
        if let Some(in_contact) = patch.in_contact {
            self.combat.in_contact = in_contact;
        }
        if let Some(effectiveness) = patch.effectiveness {
            self.combat.effectiveness = effectiveness;
        }
        if let Some(suppression) = patch.suppression {
            self.combat.suppression = suppression;
        }
        if let Some(state) = patch.movement_state {
            self.movement.state = state;
        }
        if let Some(max_speed) = patch.max_speed {
            self.movement.max_speed = max_speed;
        }

        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(heading) = patch.heading {
            self.heading = normalize_heading(heading);
        }
        if let Some(path) = &patch.move_path {
            self.move_path = path.clone();
        }
        if let Some(metadata) = &patch.metadata {
            self.metadata = metadata.clone();
        }
    }
}

// ── Spec / Patch ────────────────────────────────────────────────────────

/// Input to [`Orbat::add_unit`](super::Orbat::add_unit). Unset fields take
/// the unit defaults.
#[derive(Debug, Clone, Default)]
pub struct UnitSpec {
    pub id: Option<UnitId>,
    pub parent_id: Option<UnitId>,
    pub name: Option<String>,
    pub callsign: Option<String>,
    pub symbol_code: Option<SymbolCode>,
    pub level: Option<UnitLevel>,
    pub branch: Option<ServiceBranch>,
    pub designation: Option<String>,
    pub higher_formation: Option<String>,
    pub commander: Option<String>,
    pub strength: Option<u32>,
    pub authorized_strength: Option<u32>,
    pub fuel: Option<f32>,
    pub ammunition: Option<f32>,
    pub provisions: Option<f32>,
    pub posture: Option<CombatPosture>,
    pub max_speed: Option<f32>,
    pub position: Option<Vec3>,
    pub heading: Option<f32>,
    pub move_path: Vec<Vec3>,
    pub metadata: BTreeMap<String, String>,
}

impl UnitSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<UnitId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_parent(mut self, parent: &UnitId) -> Self {
        self.parent_id = Some(parent.clone());
        self
    }

    pub fn with_level(mut self, level: UnitLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_branch(mut self, branch: ServiceBranch) -> Self {
        self.branch = Some(branch);
        self
    }

    pub fn with_strength(mut self, current: u32, authorized: u32) -> Self {
        self.strength = Some(current);
        self.authorized_strength = Some(authorized);
        self
    }

    pub fn with_symbol(mut self, code: SymbolCode) -> Self {
        self.symbol_code = Some(code);
        self
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }
}

/// Field-level update for [`Orbat::update_unit`](super::Orbat::update_unit).
///
/// `None` leaves a field alone. Identity and hierarchy links are not
/// patchable; use [`Orbat::move_unit`](super::Orbat::move_unit).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the callsign.
    pub callsign: Option<Option<String>>,
    pub symbol_code: Option<SymbolCode>,
    pub level: Option<UnitLevel>,
    pub branch: Option<ServiceBranch>,
    pub designation: Option<String>,
    pub higher_formation: Option<String>,
    pub commander: Option<String>,
    /// Triggers fill rate recompute.
    pub strength: Option<u32>,
    /// Triggers fill rate recompute.
    pub authorized_strength: Option<u32>,
    /// Triggers overall supply recompute.
    pub fuel: Option<f32>,
    /// Triggers overall supply recompute.
    pub ammunition: Option<f32>,
    /// Triggers overall supply recompute.
    pub provisions: Option<f32>,
    pub posture: Option<CombatPosture>,
    pub in_contact: Option<bool>,
    pub effectiveness: Option<f32>,
    pub suppression: Option<f32>,
    pub movement_state: Option<MovementState>,
    pub max_speed: Option<f32>,
    pub position: Option<Vec3>,
    pub heading: Option<f32>,
    pub move_path: Option<Vec<Vec3>>,
    pub metadata: Option<BTreeMap<String, String>>,
}

impl UnitPatch {
    pub fn position(position: Vec3) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }
}
