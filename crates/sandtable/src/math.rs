//! Math types and glam re-exports.
//!
//! We re-export [glam](https://docs.rs/glam) so users don't need to depend on
//! it directly. Scene space is Y-up; the ground is the XZ plane. Positions and
//! waypoints serialize as `[x, y, z]` arrays.

pub use glam::Vec3;

/// Distance between two points projected onto the ground (XZ) plane.
pub fn ground_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = b.x - a.x;
    let dz = b.z - a.z;
    (dx * dx + dz * dz).sqrt()
}

/// Length of the straight polyline through `points` on the ground plane.
///
/// Height differences are ignored, which matches how distances are read off a
/// map. Returns 0 for fewer than two points.
pub fn ground_length(points: &[Vec3]) -> f32 {
    points
        .windows(2)
        .map(|pair| ground_distance(pair[0], pair[1]))
        .sum()
}

/// Wrap a heading in degrees into `[0, 360)`.
pub fn normalize_heading(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}
