//! # Unit Hierarchy Manager — The ORBAT Forest
//!
//! [`Orbat`] is the single source of truth for the unit forest. Units live in
//! an id-indexed map; the tree is expressed through `parent_id` / `child_ids`
//! on each unit plus an ordered list of root ids. No unit holds a reference to
//! another.
//!
//! ## Invariants
//!
//! After every operation:
//!
//! - `u.parent_id == Some(p.id)` iff `p.child_ids` contains `u.id`.
//! - No unit is its own ancestor.
//! - Every unit is listed exactly once: in the root list or in one parent's
//!   `child_ids`.
//!
//! Operations that reference an unknown id fail with
//! [`Error::NotFound`](crate::Error::NotFound) before touching anything.
//! [`Orbat::validate`] re-checks the invariants on demand.
//!
//! ## Ordering
//!
//! Insertion order of `child_ids` and of the root list is the only ordering.
//!
//! ```text
//!  roots: [A, D]
//!
//!  A ─┬─ B ── C          removing A removes C, B, then A
//!     └─ E
//!  D
//! ```

mod snapshot;
mod symbol;
mod unit;

pub use snapshot::{FileStore, KeyValueStore, MemoryStore, OrbatSnapshot, load_orbat, save_orbat};
pub use symbol::{DEFAULT_SYMBOL_CODE, SYMBOL_CODE_LEN, SymbolCode, SymbolFields};
pub use unit::{
    CombatPosture, CombatStatus, DEFAULT_UNIT_NAME, MovementState, MovementStatus, ServiceBranch,
    Strength, Supply, Unit, UnitId, UnitLevel, UnitPatch, UnitSpec,
};

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::events::{Event, EventBus};
use crate::math::Vec3;

/// Lightweight read-only projection of the forest, built by [`Orbat::tree`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub id: UnitId,
    pub name: String,
    pub symbol_code: SymbolCode,
    pub level: UnitLevel,
    pub children: Vec<TreeNode>,
}

/// Unit counts, built by [`Orbat::stats`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrbatStats {
    pub total: usize,
    pub by_level: BTreeMap<UnitLevel, usize>,
    pub by_branch: BTreeMap<ServiceBranch, usize>,
}

/// The unit forest.
pub struct Orbat {
    units: HashMap<UnitId, Unit>,
    /// Units without a parent, in insertion order.
    roots: Vec<UnitId>,
    bus: EventBus,
}

impl Orbat {
    pub fn new(bus: EventBus) -> Self {
        Self {
            units: HashMap::new(),
            roots: Vec::new(),
            bus,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn get(&self, id: &UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    pub fn contains(&self, id: &UnitId) -> bool {
        self.units.contains_key(id)
    }

    /// Every unit, in no particular order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Root unit ids, in insertion order.
    pub fn roots(&self) -> &[UnitId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    fn unit(&self, id: &UnitId) -> Result<&Unit> {
        self.units.get(id).ok_or_else(|| Error::NotFound(id.clone()))
    }

    /// All transitive children of `id`, breadth-first, excluding `id`.
    pub fn descendants(&self, id: &UnitId) -> Result<Vec<UnitId>> {
        let mut found = self.unit(id)?.child_ids.clone();
        let mut i = 0;
        while i < found.len() {
            if let Some(unit) = self.units.get(&found[i]) {
                found.extend(unit.child_ids.iter().cloned());
            }
            i += 1;
        }
        Ok(found)
    }

    /// Parent chain of `id`, nearest first.
    pub fn ancestors(&self, id: &UnitId) -> Result<Vec<UnitId>> {
        let mut chain = Vec::new();
        let mut next = self.unit(id)?.parent_id.clone();
        while let Some(parent) = next {
            // The forest is acyclic, but don't spin forever on a broken one.
            if chain.len() > self.units.len() {
                break;
            }
            next = self.units.get(&parent).and_then(|u| u.parent_id.clone());
            chain.push(parent);
        }
        Ok(chain)
    }

    fn is_ancestor(&self, ancestor: &UnitId, id: &UnitId) -> bool {
        self.ancestors(id)
            .map(|chain| chain.contains(ancestor))
            .unwrap_or(false)
    }

    /// Read-only projection walked from the roots. Ids that don't resolve to
    /// a unit are skipped.
    pub fn tree(&self) -> Vec<TreeNode> {
        self.roots.iter().filter_map(|id| self.build_node(id)).collect()
    }

    fn build_node(&self, id: &UnitId) -> Option<TreeNode> {
        let unit = self.units.get(id)?;
        Some(TreeNode {
            id: unit.id.clone(),
            name: unit.name.clone(),
            symbol_code: unit.symbol_code.clone(),
            level: unit.level,
            children: unit
                .child_ids
                .iter()
                .filter_map(|child| self.build_node(child))
                .collect(),
        })
    }

    pub fn stats(&self) -> OrbatStats {
        let mut stats = OrbatStats {
            total: self.units.len(),
            ..OrbatStats::default()
        };
        for unit in self.units.values() {
            *stats.by_level.entry(unit.level).or_insert(0) += 1;
            *stats.by_branch.entry(unit.branch).or_insert(0) += 1;
        }
        stats
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Create a unit and link it into the forest.
    ///
    /// With a known `parent_id` the unit is appended to that parent's
    /// children; otherwise it becomes a root. An unknown parent is logged and
    /// dropped so the unit is never left unplaced.
    pub fn add_unit(&mut self, spec: UnitSpec) -> Result<&Unit> {
        let mut unit = Unit::from_spec(spec);
        if self.units.contains_key(&unit.id) {
            return Err(Error::invalid(format!("unit id already in use: {}", unit.id)));
        }

        let parent = unit.parent_id.clone();
        match parent.as_ref().and_then(|p| self.units.get_mut(p)) {
            Some(parent) => {
                if !parent.child_ids.contains(&unit.id) {
                    parent.child_ids.push(unit.id.clone());
                }
            }
            None => {
                if let Some(missing) = parent {
                    log::warn!("Parent {missing} of new unit {} does not exist; adding as root", unit.id);
                    unit.parent_id = None;
                }
                if !self.roots.contains(&unit.id) {
                    self.roots.push(unit.id.clone());
                }
            }
        }

        let id = unit.id.clone();
        log::debug!("Added unit {id} ({})", unit.name);
        self.bus.emit(Event::UnitAdded {
            unit: Box::new(unit.clone()),
        });
        Ok(self.units.entry(id).or_insert(unit))
    }

    /// Add several units in order. Stops at the first failure; units added
    /// before it stay.
    pub fn add_units(&mut self, specs: impl IntoIterator<Item = UnitSpec>) -> Result<Vec<UnitId>> {
        let mut ids = Vec::new();
        for spec in specs {
            ids.push(self.add_unit(spec)?.id.clone());
        }
        Ok(ids)
    }

    /// Merge `patch` into a unit, recomputing derived values.
    pub fn update_unit(&mut self, id: &UnitId, patch: UnitPatch) -> Result<&Unit> {
        let unit = self
            .units
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        unit.apply(&patch);
        self.bus.emit(Event::UnitUpdated {
            id: id.clone(),
            patch: Box::new(patch),
        });
        Ok(unit)
    }

    /// Write a unit's live position without emitting an event. Used by path
    /// playback, which announces its own progress.
    pub fn set_live_position(&mut self, id: &UnitId, position: Vec3) -> Result<()> {
        let unit = self
            .units
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        unit.position = position;
        Ok(())
    }

    /// Remove a unit and its whole subtree.
    ///
    /// Descendants go first (every child before its parent), the requested
    /// unit last. Returns the removed ids in that order and emits one
    /// [`Event::UnitRemoved`] per id in the same order.
    pub fn remove_unit(&mut self, id: &UnitId) -> Result<Vec<UnitId>> {
        let parent = self.unit(id)?.parent_id.clone();

        // Breadth-first from the top, reversed: children always precede parents.
        let mut order = self.descendants(id)?;
        order.insert(0, id.clone());
        order.reverse();

        self.detach(id, parent.as_ref());
        for removed in &order {
            self.units.remove(removed);
        }

        log::debug!("Removed unit {id} and {} descendant(s)", order.len() - 1);
        for removed in &order {
            self.bus.emit(Event::UnitRemoved { id: removed.clone() });
        }
        Ok(order)
    }

    /// Reparent a unit. `None` moves it to the root list.
    ///
    /// A `new_parent` that doesn't exist also moves the unit to the root
    /// list (logged). Moving a unit under itself or one of its descendants is
    /// rejected. Moving to the current parent keeps its position among its
    /// siblings.
    ///
    /// Any real reparent appends the unit to the end of the new sibling list
    /// (children or roots). Moving a unit away and back therefore restores its
    /// parent but not its index among the siblings.
    pub fn move_unit(&mut self, id: &UnitId, new_parent: Option<&UnitId>) -> Result<()> {
        let old_parent = self.unit(id)?.parent_id.clone();

        let target = match new_parent {
            Some(parent) if self.units.contains_key(parent) => {
                if parent == id || self.is_ancestor(id, parent) {
                    return Err(Error::invalid(format!(
                        "cannot move {id} under its own subtree ({parent})"
                    )));
                }
                Some(parent.clone())
            }
            Some(parent) => {
                log::warn!("Move target {parent} does not exist; moving {id} to root");
                None
            }
            None => None,
        };

        if target != old_parent {
            self.detach(id, old_parent.as_ref());
            self.attach(id, target.as_ref());
        }

        self.bus.emit(Event::UnitMoved {
            id: id.clone(),
            old_parent,
            new_parent: target,
        });
        Ok(())
    }

    /// Remove every unit.
    pub fn clear(&mut self) {
        self.units.clear();
        self.roots.clear();
        log::debug!("Cleared ORBAT");
        self.bus.emit(Event::OrbatCleared);
    }

    fn detach(&mut self, id: &UnitId, parent: Option<&UnitId>) {
        match parent.and_then(|p| self.units.get_mut(p)) {
            Some(parent) => parent.child_ids.retain(|c| c != id),
            None => self.roots.retain(|r| r != id),
        }
    }

    fn attach(&mut self, id: &UnitId, parent: Option<&UnitId>) {
        if let Some(unit) = self.units.get_mut(id) {
            unit.parent_id = parent.cloned();
        }
        let siblings = match parent.and_then(|p| self.units.get_mut(p)) {
            Some(parent) => &mut parent.child_ids,
            None => &mut self.roots,
        };
        if !siblings.contains(id) {
            siblings.push(id.clone());
        }
    }

    // ── Integrity / Persistence ──────────────────────────────────────

    /// Check the forest invariants.
    pub fn validate(&self) -> Result<()> {
        check_forest(&self.units, &self.roots)
    }

    /// Flat copy of the forest for persistence.
    pub fn snapshot(&self) -> OrbatSnapshot {
        OrbatSnapshot {
            units: self
                .units
                .iter()
                .map(|(id, unit)| (id.clone(), unit.clone()))
                .collect(),
            root_ids: self.roots.clone(),
        }
    }

    /// Replace the forest with a snapshot.
    ///
    /// The snapshot is checked first; a snapshot that breaks an invariant is
    /// rejected with [`Error::Corrupt`] and the current forest is kept.
    pub fn restore(&mut self, snapshot: OrbatSnapshot) -> Result<()> {
        if let Some((key, unit)) = snapshot.units.iter().find(|(key, unit)| **key != unit.id) {
            return Err(Error::Corrupt(format!(
                "unit stored under {key} has id {}",
                unit.id
            )));
        }
        let units: HashMap<UnitId, Unit> = snapshot.units.into_iter().collect();
        check_forest(&units, &snapshot.root_ids)?;

        self.units = units;
        self.roots = snapshot.root_ids;
        log::info!("Restored ORBAT with {} unit(s)", self.units.len());

        self.bus.emit(Event::OrbatCleared);
        self.bus.emit(Event::OrbatLoaded {
            count: self.units.len(),
        });
        Ok(())
    }
}

impl std::fmt::Debug for Orbat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orbat")
            .field("units", &self.units.len())
            .field("roots", &self.roots)
            .finish()
    }
}

/// Verify the three structural invariants over a unit map and root list.
fn check_forest(units: &HashMap<UnitId, Unit>, roots: &[UnitId]) -> Result<()> {
    let corrupt = |msg: String| Err(Error::Corrupt(msg));

    // Every unit must be listed exactly once across roots and child lists.
    let mut placements: HashMap<&UnitId, usize> = HashMap::new();

    for root in roots {
        let Some(unit) = units.get(root) else {
            return corrupt(format!("root {root} does not exist"));
        };
        if let Some(parent) = &unit.parent_id {
            return corrupt(format!("root {root} has parent {parent}"));
        }
        *placements.entry(root).or_insert(0) += 1;
    }

    for unit in units.values() {
        for child in &unit.child_ids {
            let Some(child_unit) = units.get(child) else {
                return corrupt(format!("{} lists missing child {child}", unit.id));
            };
            if child_unit.parent_id.as_ref() != Some(&unit.id) {
                return corrupt(format!("{child} is listed under {} but its parent differs", unit.id));
            }
            *placements.entry(child).or_insert(0) += 1;
        }
        if let Some(parent) = &unit.parent_id {
            if !units.contains_key(parent) {
                return corrupt(format!("{} has missing parent {parent}", unit.id));
            }
        }
    }

    for id in units.keys() {
        match placements.get(id).copied().unwrap_or(0) {
            1 => {}
            0 => return corrupt(format!("{id} is not placed in the forest")),
            n => return corrupt(format!("{id} is placed {n} times")),
        }
    }

    // With exact placement, a parent walk longer than the map means a cycle.
    for id in units.keys() {
        let mut steps = 0;
        let mut next = units.get(id).and_then(|u| u.parent_id.as_ref());
        while let Some(parent) = next {
            if parent == id || steps > units.len() {
                return corrupt(format!("{id} is its own ancestor"));
            }
            steps += 1;
            next = units.get(parent).and_then(|u| u.parent_id.as_ref());
        }
    }

    Ok(())
}
