//! End-to-end scenarios: an ORBAT, a path engine and a hand-driven clock
//! sharing one event bus.

use std::time::Duration;

use sandtable::prelude::*;

const FRAME: Duration = Duration::from_millis(16);

struct Table {
    frames: ManualScheduler,
    orbat: Orbat,
    engine: MovePathEngine<ManualScheduler>,
    log: EventLog,
}

impl Table {
    fn new() -> Self {
        let bus = EventBus::new();
        let log = EventLog::attach(&bus);
        let frames = ManualScheduler::new();
        let config = SandboxConfig::builtin();
        Self {
            engine: MovePathEngine::new(frames.clone(), bus.clone(), &config),
            orbat: Orbat::new(bus),
            frames,
            log,
        }
    }

    fn add(&mut self, name: &str) -> UnitId {
        self.orbat.add_unit(UnitSpec::named(name)).unwrap().id.clone()
    }

    /// Deliver frames until nothing is pending or `max` frames have passed.
    fn run(&mut self, max: usize) -> usize {
        for n in 0..max {
            self.frames.advance(FRAME);
            let due = self.frames.take_due();
            if due.is_empty() {
                return n;
            }
            for token in due {
                self.engine.on_frame(token, &mut self.orbat).unwrap();
            }
        }
        max
    }

    fn position(&self, id: &UnitId) -> Vec3 {
        self.orbat.get(id).unwrap().position
    }
}

#[test]
fn tree_of_a_root_and_its_child() {
    let mut table = Table::new();
    let a = table.add("A");
    let b = table
        .orbat
        .add_unit(UnitSpec::named("B").with_parent(&a))
        .unwrap()
        .id
        .clone();

    let tree = table.orbat.tree();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].id, a);
    assert_eq!(tree[0].children.len(), 1);
    assert_eq!(tree[0].children[0].id, b);
}

#[test]
fn removing_waypoint_zero_is_rejected() {
    let mut table = Table::new();
    let unit = table.add("A");
    table.engine.set_path(
        &mut table.orbat,
        unit,
        vec![Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 5.0)],
    );

    assert!(table.engine.remove_waypoint(0).is_err());
    assert_eq!(table.engine.path().len(), 3);
}

#[test]
fn stop_before_completion_resets_to_origin() {
    let mut table = Table::new();
    let unit = table.add("A");
    table
        .engine
        .set_path(&mut table.orbat, unit.clone(), vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)]);
    table.engine.play(&mut table.orbat).unwrap();

    table.run(60);
    assert!(table.engine.is_playing());
    assert!(table.position(&unit).x > 0.0);

    table.engine.stop(&mut table.orbat);
    assert_eq!(table.position(&unit), Vec3::ZERO);
    assert_eq!(table.run(10), 0);
    assert_eq!(table.position(&unit), Vec3::ZERO);
    assert_eq!(table.log.count(EventKind::PlaybackCompleted), 0);
}

#[test]
fn completion_emits_once_and_stays_at_the_end() {
    let mut table = Table::new();
    let unit = table.add("A");
    let end = Vec3::new(40.0, 0.0, -15.0);
    table.engine.set_path(
        &mut table.orbat,
        unit.clone(),
        vec![Vec3::ZERO, Vec3::new(20.0, 0.0, 10.0), end],
    );
    table.engine.play(&mut table.orbat).unwrap();

    // 5 s at 16 ms per frame.
    let frames = table.run(1000);
    assert!(frames > 300 && frames < 1000, "{frames}");

    assert_eq!(table.log.count(EventKind::PlaybackCompleted), 1);
    assert_eq!(table.position(&unit), end);
    assert!(!table.engine.is_playing());
    assert_eq!(table.engine.state(), PathState::Stopped);

    let progress: Vec<f32> = table
        .log
        .events()
        .iter()
        .filter_map(|e| match e {
            Event::PlaybackProgress { progress, .. } => Some(*progress),
            _ => None,
        })
        .collect();
    assert_eq!(progress.first(), Some(&0.0));
    assert_eq!(progress.last(), Some(&1.0));
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn clear_path_twice_is_idempotent() {
    let mut table = Table::new();
    let unit = table.add("A");
    let origin = Vec3::new(1.0, 0.0, 2.0);
    table
        .engine
        .set_path(&mut table.orbat, unit, vec![origin, Vec3::X, Vec3::Z, Vec3::ONE]);

    table.engine.clear_path().unwrap();
    let first = table.engine.path();
    table.engine.clear_path().unwrap();
    assert_eq!(table.engine.path(), first);
    assert_eq!(first, vec![origin]);
}

#[test]
fn handler_failures_do_not_block_playback_events() {
    let mut table = Table::new();
    table
        .orbat
        .bus()
        .subscribe(EventKind::PlaybackProgress, |_| anyhow::bail!("renderer offline"));
    table
        .orbat
        .bus()
        .subscribe(EventKind::PlaybackStarted, |_| panic!("ui crashed"));

    let unit = table.add("A");
    table
        .engine
        .set_path(&mut table.orbat, unit.clone(), vec![Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0)]);
    table.engine.play(&mut table.orbat).unwrap();
    table.run(1000);

    assert_eq!(table.log.count(EventKind::PlaybackStarted), 1);
    assert_eq!(table.log.count(EventKind::PlaybackCompleted), 1);
    assert_eq!(table.position(&unit), Vec3::new(3.0, 0.0, 0.0));
}

#[test]
fn committed_path_survives_a_save_and_load() {
    let mut table = Table::new();
    let unit = table
        .orbat
        .add_unit(UnitSpec::named("Recce").at(Vec3::new(4.0, 0.0, 4.0)))
        .unwrap()
        .id
        .clone();

    table.engine.edit_unit_path(&mut table.orbat, &unit).unwrap();
    table.engine.add_waypoint(Vec3::new(30.0, 0.0, 4.0));
    table.engine.add_waypoint(Vec3::new(30.0, 0.0, 40.0));
    table.engine.commit(&mut table.orbat).unwrap();

    let mut store = MemoryStore::new();
    save_orbat(&mut store, "orbat", &table.orbat).unwrap();

    let mut other = Table::new();
    load_orbat(&store, "orbat", &mut other.orbat).unwrap();
    other.engine.show_unit_path(&mut other.orbat, &unit).unwrap();
    assert_eq!(other.engine.path(), table.engine.path());
    assert_eq!(other.engine.state(), PathState::Editing { read_only: true });

    other.engine.play(&mut other.orbat).unwrap();
    other.run(1000);
    assert_eq!(other.position(&unit), Vec3::new(30.0, 0.0, 40.0));
}
