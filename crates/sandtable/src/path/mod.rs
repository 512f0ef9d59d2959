//! # Movement Path Engine
//!
//! Edits the waypoint list of one unit at a time and replays the unit's
//! movement along a smooth curve through those waypoints.
//!
//! ```text
//!            set_path               play                 (progress = 1)
//!   Idle ─────────────▶ Editing ──────────▶ Playing ─────────────────▶ Stopped
//!     ▲                  ▲   │                │  stop()                  │
//!     │ dispose()        │   └ set_display_mode                          │
//!     └──────────────────┴──────────────────────────── set_display_mode ─┘
//! ```
//!
//! Waypoint 0 is the unit's pinned start location. It can't be removed and
//! survives [`MovePathEngine::clear_path`].
//!
//! Playback is driven by the host through [`FrameScheduler`]: the engine asks
//! for a frame, the host calls [`MovePathEngine::on_frame`] with the token,
//! and each tick writes `curve.point(min(elapsed / duration, 1))` into the
//! unit's live position. At most one frame is outstanding per engine.
//!
//! Natural completion leaves the unit at the last waypoint. Only an explicit
//! [`MovePathEngine::stop`] snaps it back to waypoint 0.

mod curve;
mod schedule;

pub use curve::{CatmullRomCurve, CurveKind};
pub use schedule::{FrameScheduler, FrameToken, ManualScheduler, RealtimeScheduler};

use std::time::Duration;

use crate::config::{CurveConfig, SandboxConfig};
use crate::error::{Error, Result};
use crate::events::{Event, EventBus};
use crate::math::{self, Vec3};
use crate::orbat::{MovementState, Orbat, UnitId, UnitPatch};

/// Where the engine is in its edit/playback cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathState {
    /// No path loaded.
    #[default]
    Idle,
    /// A path is loaded. Waypoints can be appended unless `read_only`.
    Editing { read_only: bool },
    Playing,
    /// Playback finished or was stopped.
    Stopped,
}

/// Summary of the loaded path, built by [`MovePathEngine::path_info`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathInfo {
    pub waypoint_count: usize,
    /// Sampled arc length along the playback curve. An approximation.
    pub total_length: f32,
    /// Straight-line length over the ground (XZ plane).
    pub ground_length: f32,
}

struct Playback {
    curve: CatmullRomCurve,
    started: Duration,
    /// The single outstanding frame, if any.
    frame: Option<FrameToken>,
}

pub struct MovePathEngine<S: FrameScheduler> {
    scheduler: S,
    bus: EventBus,
    curve: CurveConfig,
    duration: Duration,

    unit: Option<UnitId>,
    waypoints: Vec<Vec3>,
    read_only: bool,
    state: PathState,
    playback: Option<Playback>,
}

impl<S: FrameScheduler> MovePathEngine<S> {
    pub fn new(scheduler: S, bus: EventBus, config: &SandboxConfig) -> Self {
        Self {
            scheduler,
            bus,
            curve: config.curve.clone(),
            duration: config.playback.duration(),
            unit: None,
            waypoints: Vec::new(),
            read_only: false,
            state: PathState::Idle,
            playback: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> PathState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_some()
    }

    pub fn unit(&self) -> Option<&UnitId> {
        self.unit.as_ref()
    }

    pub fn waypoints(&self) -> &[Vec3] {
        &self.waypoints
    }

    /// The raw waypoint list for persistence. No curve evaluation.
    pub fn path(&self) -> Vec<Vec3> {
        self.waypoints.clone()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Takes effect from the next [`play`](Self::play).
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    fn build_curve(&self) -> Result<CatmullRomCurve> {
        CatmullRomCurve::new(self.waypoints.clone(), self.curve.kind, self.curve.tension)
    }

    /// `None` with fewer than two waypoints.
    pub fn path_info(&self) -> Option<PathInfo> {
        let curve = self.build_curve().ok()?;
        Some(PathInfo {
            waypoint_count: self.waypoints.len(),
            total_length: curve.length(self.curve.arc_length_divisions),
            ground_length: math::ground_length(&self.waypoints),
        })
    }

    /// The curve sampled as line segments for display. Empty with fewer than
    /// two waypoints.
    pub fn display_points(&self) -> Vec<Vec3> {
        self.build_curve()
            .map(|curve| curve.points(self.curve.display_segments))
            .unwrap_or_default()
    }

    // ── Editing ──────────────────────────────────────────────────────

    /// Bind `unit` and replace the waypoint list. Enters editable mode.
    ///
    /// A running playback is cancelled where it stands: the unit is not
    /// snapped back, but it is marked stationary again.
    pub fn set_path(&mut self, orbat: &mut Orbat, unit: UnitId, waypoints: Vec<Vec3>) {
        if self.cancel_playback() {
            log::debug!("Cancelled playback to load a new path");
            if let Some(previous) = self.unit.take() {
                self.release_unit(orbat, &previous);
            }
        }

        log::debug!("Loaded path for {unit} with {} waypoint(s)", waypoints.len());
        self.unit = Some(unit.clone());
        self.waypoints = waypoints;
        self.read_only = false;
        self.state = PathState::Editing { read_only: false };

        self.bus.emit(Event::PathLoaded {
            unit,
            waypoints: self.waypoints.len(),
            read_only: false,
        });
    }

    /// Switch between display-only and editable. Keeps the waypoints.
    pub fn set_display_mode(&mut self, read_only: bool) {
        match self.state {
            PathState::Idle => {
                log::warn!("set_display_mode ignored: no path loaded");
                return;
            }
            PathState::Editing { .. } | PathState::Stopped => {
                self.state = PathState::Editing { read_only };
            }
            PathState::Playing => {}
        }
        self.read_only = read_only;
    }

    fn editable_unit(&self, op: &str) -> Result<UnitId> {
        match (&self.state, &self.unit) {
            (PathState::Editing { read_only: false }, Some(unit)) => Ok(unit.clone()),
            (PathState::Editing { read_only: true }, _) => {
                log::warn!("{op} ignored: path is read-only");
                Err(Error::invalid(format!("{op}: path is read-only")))
            }
            (state, _) => {
                log::warn!("{op} ignored in state {state:?}");
                Err(Error::invalid(format!("{op}: path is not being edited")))
            }
        }
    }

    /// Append a waypoint. Returns its index, or `None` unless the path is
    /// being edited.
    pub fn add_waypoint(&mut self, position: Vec3) -> Option<usize> {
        let unit = self.editable_unit("add_waypoint").ok()?;
        self.waypoints.push(position);
        let index = self.waypoints.len() - 1;

        self.bus.emit(Event::WaypointAdded {
            unit,
            index,
            total: self.waypoints.len(),
        });
        Some(index)
    }

    /// Remove waypoint `index`. Waypoint 0 is the unit's start location and
    /// can't be removed.
    pub fn remove_waypoint(&mut self, index: usize) -> Result<()> {
        let unit = self.editable_unit("remove_waypoint")?;
        if index == 0 {
            log::warn!("Refusing to remove the starting waypoint of {unit}");
            return Err(Error::invalid("the starting waypoint can't be removed"));
        }
        if index >= self.waypoints.len() {
            log::warn!(
                "Waypoint {index} out of range for {unit} ({} waypoints)",
                self.waypoints.len()
            );
            return Err(Error::invalid(format!("no waypoint {index}")));
        }

        self.waypoints.remove(index);
        self.bus.emit(Event::WaypointRemoved {
            unit,
            index,
            total: self.waypoints.len(),
        });
        Ok(())
    }

    /// Drop every waypoint except the first.
    pub fn clear_path(&mut self) -> Result<()> {
        let unit = self.editable_unit("clear_path")?;
        self.waypoints.truncate(1);
        self.bus.emit(Event::PathCleared { unit });
        Ok(())
    }

    // ── Playback ─────────────────────────────────────────────────────

    /// Start replaying the bound unit along the path.
    ///
    /// Restarts from the top if already playing. The first frame (progress
    /// 0) is applied immediately.
    pub fn play(&mut self, orbat: &mut Orbat) -> Result<()> {
        let Some(unit) = self.unit.clone() else {
            log::warn!("play ignored: no unit bound");
            return Err(Error::invalid("no unit bound to the path"));
        };
        if !orbat.contains(&unit) {
            log::warn!("play ignored: unit {unit} no longer exists");
            return Err(Error::NotFound(unit));
        }
        if self.waypoints.len() < 2 {
            log::warn!("play ignored: need at least 2 waypoints, have {}", self.waypoints.len());
            return Err(Error::invalid("at least 2 waypoints are needed to play"));
        }

        if self.is_playing() {
            self.stop(orbat);
        }

        let curve = self.build_curve()?;
        orbat.update_unit(
            &unit,
            UnitPatch {
                movement_state: Some(MovementState::Moving),
                ..UnitPatch::default()
            },
        )?;

        self.playback = Some(Playback {
            curve,
            started: self.scheduler.now(),
            frame: None,
        });
        self.state = PathState::Playing;
        log::info!("Playing path of {unit} over {:?}", self.duration);
        self.bus.emit(Event::PlaybackStarted {
            unit,
            duration: self.duration,
        });

        self.step(orbat)
    }

    /// Advance playback for a frame the host delivered. Tokens that aren't
    /// the current outstanding frame are ignored.
    pub fn on_frame(&mut self, token: FrameToken, orbat: &mut Orbat) -> Result<()> {
        match self.playback.as_mut() {
            Some(playback) if playback.frame == Some(token) => playback.frame = None,
            _ => {
                log::debug!("Ignoring stale frame {}", token.raw());
                return Ok(());
            }
        }
        self.step(orbat)
    }

    /// Apply the current progress to the unit and re-arm or finish.
    fn step(&mut self, orbat: &mut Orbat) -> Result<()> {
        let (Some(playback), Some(unit)) = (self.playback.as_ref(), self.unit.clone()) else {
            return Ok(());
        };

        let elapsed = self.scheduler.now().saturating_sub(playback.started);
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
        };
        let position = playback.curve.point(progress);

        if let Err(e) = orbat.set_live_position(&unit, position) {
            log::warn!("Stopping playback: {e}");
            self.cancel_playback();
            self.state = PathState::Stopped;
            return Err(e);
        }
        self.bus.emit(Event::PlaybackProgress {
            unit: unit.clone(),
            progress,
            position,
        });

        if progress < 1.0 {
            let frame = self.scheduler.request_frame();
            if let Some(playback) = self.playback.as_mut() {
                playback.frame = Some(frame);
            }
            return Ok(());
        }

        self.playback = None;
        self.state = PathState::Stopped;
        orbat.update_unit(
            &unit,
            UnitPatch {
                position: Some(position),
                movement_state: Some(MovementState::Stationary),
                ..UnitPatch::default()
            },
        )?;
        log::info!("Playback of {unit} complete");
        self.bus.emit(Event::PlaybackCompleted { unit });
        Ok(())
    }

    /// Cancel the outstanding frame and drop the playback. Returns whether
    /// anything was playing.
    fn cancel_playback(&mut self) -> bool {
        let Some(playback) = self.playback.take() else {
            return false;
        };
        if let Some(frame) = playback.frame {
            self.scheduler.cancel_frame(frame);
        }
        true
    }

    /// Mark a unit whose playback was cut short as no longer moving.
    fn release_unit(&self, orbat: &mut Orbat, id: &UnitId) {
        let patch = UnitPatch {
            movement_state: Some(MovementState::Stationary),
            ..UnitPatch::default()
        };
        if let Err(e) = orbat.update_unit(id, patch) {
            log::warn!("Could not mark {id} stationary: {e}");
        }
    }

    /// Halt playback and put the unit back on waypoint 0.
    ///
    /// Safe to call at any time; without a running playback it only snaps
    /// the unit.
    pub fn stop(&mut self, orbat: &mut Orbat) {
        if self.cancel_playback() {
            self.state = PathState::Stopped;
        }

        if let (Some(unit), Some(&origin)) = (self.unit.as_ref(), self.waypoints.first()) {
            let patch = UnitPatch {
                position: Some(origin),
                movement_state: Some(MovementState::Stationary),
                ..UnitPatch::default()
            };
            match orbat.update_unit(unit, patch) {
                Ok(_) => log::debug!("Stopped; {unit} back at {origin}"),
                Err(e) => log::warn!("Stopped, but could not reset the unit: {e}"),
            }
        }

        self.bus.emit(Event::PlaybackStopped {
            unit: self.unit.clone(),
        });
    }

    /// Stop and forget the path and the bound unit.
    pub fn dispose(&mut self, orbat: &mut Orbat) {
        self.stop(orbat);
        self.unit = None;
        self.waypoints.clear();
        self.read_only = false;
        self.state = PathState::Idle;
        self.bus.emit(Event::PathDisposed);
    }

    // ── Unit sessions ────────────────────────────────────────────────

    /// Load `id`'s stored path (or just its position when it has none) for
    /// editing. Any playback of the previously bound unit is stopped first.
    pub fn edit_unit_path(&mut self, orbat: &mut Orbat, id: &UnitId) -> Result<()> {
        self.open_unit_path(orbat, id)?;
        Ok(())
    }

    /// Like [`edit_unit_path`](Self::edit_unit_path) but display-only.
    pub fn show_unit_path(&mut self, orbat: &mut Orbat, id: &UnitId) -> Result<()> {
        self.open_unit_path(orbat, id)?;
        self.set_display_mode(true);
        Ok(())
    }

    fn open_unit_path(&mut self, orbat: &mut Orbat, id: &UnitId) -> Result<()> {
        let unit = orbat.get(id).ok_or_else(|| Error::NotFound(id.clone()))?;
        let waypoints = if unit.move_path.is_empty() {
            vec![unit.position]
        } else {
            unit.move_path.clone()
        };
        if self.is_playing() {
            self.stop(orbat);
        }
        self.set_path(orbat, id.clone(), waypoints);
        Ok(())
    }

    /// Store the waypoints as the bound unit's `move_path` and switch to
    /// display-only. The unit is put back on waypoint 0 first so the stored
    /// path starts where the unit stands.
    pub fn commit(&mut self, orbat: &mut Orbat) -> Result<()> {
        let Some(unit) = self.unit.clone() else {
            log::warn!("commit ignored: no unit bound");
            return Err(Error::invalid("no unit bound to the path"));
        };
        if !orbat.contains(&unit) {
            return Err(Error::NotFound(unit));
        }

        self.stop(orbat);
        orbat.update_unit(
            &unit,
            UnitPatch {
                move_path: Some(self.waypoints.clone()),
                ..UnitPatch::default()
            },
        )?;
        log::info!("Saved {} waypoint(s) to {unit}", self.waypoints.len());
        self.read_only = true;
        self.state = PathState::Editing { read_only: true };
        Ok(())
    }
}

impl<S: FrameScheduler> std::fmt::Debug for MovePathEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovePathEngine")
            .field("state", &self.state)
            .field("unit", &self.unit)
            .field("waypoints", &self.waypoints.len())
            .field("duration", &self.duration)
            .finish()
    }
}
