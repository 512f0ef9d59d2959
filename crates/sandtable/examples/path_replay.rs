//! Path Replay — plot a route for one unit and play it back in real time.
//!
//! Polls a [`RealtimeScheduler`] at roughly 60 Hz the way a render loop
//! would, printing the unit's position every few frames. Halfway through the
//! second run the playback is stopped and the unit snaps home.
//!
//! Run with: `SANDTABLE_PLAYBACK_MS=2000 cargo run -p sandtable --example path_replay`

use std::thread;
use std::time::Duration;

use sandtable::prelude::*;

const FRAME: Duration = Duration::from_millis(16);

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = SandboxConfig::from_env()?;
    let bus = EventBus::new();
    bus.subscribe(EventKind::PlaybackCompleted, |event| {
        println!("done: {event:?}");
        Ok(())
    });

    let mut orbat = Orbat::new(bus.clone());
    let unit = orbat
        .add_unit(UnitSpec::named("Recce Troop").at(Vec3::new(0.0, 0.0, 0.0)))?
        .id
        .clone();

    let mut engine = MovePathEngine::new(RealtimeScheduler::new(), bus, &config);
    engine.edit_unit_path(&mut orbat, &unit)?;
    for p in [
        Vec3::new(100.0, 0.0, 20.0),
        Vec3::new(160.0, 0.0, 120.0),
        Vec3::new(90.0, 0.0, 200.0),
    ] {
        engine.add_waypoint(p);
    }
    engine.commit(&mut orbat)?;

    if let Some(info) = engine.path_info() {
        println!(
            "{} waypoints, {:.1} m along the curve, {:.1} m over the ground",
            info.waypoint_count, info.total_length, info.ground_length
        );
    }

    // Full run.
    engine.play(&mut orbat)?;
    run(&mut engine, &mut orbat, None)?;
    println!("ended at {}", orbat.get(&unit).map(|u| u.position).unwrap_or_default());

    // Interrupted run.
    let half = engine.duration() / 2;
    engine.play(&mut orbat)?;
    run(&mut engine, &mut orbat, Some(half))?;
    engine.stop(&mut orbat);
    println!("stopped, back at {}", orbat.get(&unit).map(|u| u.position).unwrap_or_default());

    engine.dispose(&mut orbat);
    Ok(())
}

/// Drive frames until playback ends or `limit` has passed.
fn run(
    engine: &mut MovePathEngine<RealtimeScheduler>,
    orbat: &mut Orbat,
    limit: Option<Duration>,
) -> sandtable::Result<()> {
    let mut elapsed = Duration::ZERO;
    let mut frame = 0u32;
    while engine.is_playing() && limit.is_none_or(|limit| elapsed < limit) {
        thread::sleep(FRAME);
        elapsed += FRAME;
        if let Some(token) = engine.scheduler_mut().poll() {
            engine.on_frame(token, orbat)?;
        }
        frame += 1;
        if frame % 15 == 0 {
            if let Some(unit) = engine.unit().and_then(|id| orbat.get(id)) {
                println!("  {:>5.2}s  {}", elapsed.as_secs_f32(), unit.position);
            }
        }
    }
    Ok(())
}
