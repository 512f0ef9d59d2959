//! Open Catmull-Rom spline through a list of waypoints.
//!
//! Each segment `Pi -> Pi+1` is a cubic Hermite curve whose tangents come from
//! the neighbouring points. The first and last segments borrow a phantom
//! neighbour mirrored through the endpoint (`2·P0 − P1`, `2·Pn − Pn−1`).
//!
//! The global parameter `t ∈ [0, 1]` is split evenly across segments, so a
//! path with long and short legs moves faster along the long ones. That is
//! the intended playback feel: every leg takes the same time.

use glam::Vec3;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Knot parameterisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveKind {
    /// Knot spacing `|Pi+1 − Pi|^0.5`. No cusps or self-intersections
    /// within a segment.
    #[default]
    Centripetal,
    /// Knot spacing `|Pi+1 − Pi|`.
    Chordal,
    /// Uniform knots with tangents scaled by `tension`.
    CatmullRom,
}

/// Knot intervals shorter than this are treated as degenerate.
const MIN_KNOT: f32 = 1e-4;

#[derive(Debug, Clone)]
pub struct CatmullRomCurve {
    points: Vec<Vec3>,
    kind: CurveKind,
    tension: f32,
}

impl CatmullRomCurve {
    /// Build a curve through `points`. At least two points are required.
    pub fn new(points: Vec<Vec3>, kind: CurveKind, tension: f32) -> Result<Self> {
        if points.len() < 2 {
            return Err(Error::invalid(format!(
                "a curve needs at least 2 points, got {}",
                points.len()
            )));
        }
        Ok(Self {
            points,
            kind,
            tension,
        })
    }

    pub fn centripetal(points: Vec<Vec3>) -> Result<Self> {
        Self::new(points, CurveKind::Centripetal, 0.5)
    }

    pub fn points_through(&self) -> &[Vec3] {
        &self.points
    }

    pub fn kind(&self) -> CurveKind {
        self.kind
    }

    /// Point at global parameter `t`, clamped to `[0, 1]`. Returns the exact
    /// first and last waypoints at the ends.
    pub fn point(&self, t: f32) -> Vec3 {
        let n = self.points.len();
        if t.is_nan() || t <= 0.0 {
            return self.points[0];
        }
        if t >= 1.0 {
            return self.points[n - 1];
        }

        let p = (n - 1) as f32 * t;
        let mut segment = p.floor() as usize;
        let mut weight = p - segment as f32;
        if segment >= n - 1 {
            segment = n - 2;
            weight = 1.0;
        }

        let p1 = self.points[segment];
        let p2 = self.points[segment + 1];
        let p0 = if segment > 0 {
            self.points[segment - 1]
        } else {
            2.0 * p1 - p2
        };
        let p3 = if segment + 2 < n {
            self.points[segment + 2]
        } else {
            2.0 * p2 - p1
        };

        let (t1, t2) = match self.kind {
            CurveKind::CatmullRom => (self.tension * (p2 - p0), self.tension * (p3 - p1)),
            CurveKind::Centripetal => nonuniform_tangents(p0, p1, p2, p3, 0.25),
            CurveKind::Chordal => nonuniform_tangents(p0, p1, p2, p3, 0.5),
        };

        hermite(p1, p2, t1, t2, weight)
    }

    /// `divisions + 1` evenly spaced samples from start to end.
    pub fn points(&self, divisions: usize) -> Vec<Vec3> {
        let divisions = divisions.max(1);
        (0..=divisions)
            .map(|d| self.point(d as f32 / divisions as f32))
            .collect()
    }

    /// Arc length approximated by summing the chords between
    /// `divisions + 1` samples. Converges from below as `divisions` grows.
    pub fn length(&self, divisions: usize) -> f32 {
        self.points(divisions)
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .sum()
    }
}

/// Tangents at `p1` and `p2` for a non-uniform knot sequence, scaled to the
/// `[0, 1]` parameter of the middle segment. `pow` is applied to the squared
/// distances, so 0.25 gives centripetal and 0.5 chordal spacing.
fn nonuniform_tangents(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, pow: f32) -> (Vec3, Vec3) {
    let mut dt0 = p0.distance_squared(p1).powf(pow);
    let mut dt1 = p1.distance_squared(p2).powf(pow);
    let mut dt2 = p2.distance_squared(p3).powf(pow);

    if dt1 < MIN_KNOT {
        dt1 = 1.0;
    }
    if dt0 < MIN_KNOT {
        dt0 = dt1;
    }
    if dt2 < MIN_KNOT {
        dt2 = dt1;
    }

    let t1 = (p1 - p0) / dt0 - (p2 - p0) / (dt0 + dt1) + (p2 - p1) / dt1;
    let t2 = (p2 - p1) / dt1 - (p3 - p1) / (dt1 + dt2) + (p3 - p2) / dt2;
    (t1 * dt1, t2 * dt1)
}

/// Cubic Hermite from `x0` to `x1` with end tangents `t0`, `t1`.
fn hermite(x0: Vec3, x1: Vec3, t0: Vec3, t1: Vec3, s: f32) -> Vec3 {
    let c0 = x0;
    let c1 = t0;
    let c2 = -3.0 * x0 + 3.0 * x1 - 2.0 * t0 - t1;
    let c3 = 2.0 * x0 - 2.0 * x1 + t0 + t1;
    c0 + s * (c1 + s * (c2 + s * c3))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        a.distance(b) < 1e-3
    }

    #[test]
    fn needs_two_points() {
        assert!(CatmullRomCurve::centripetal(vec![]).is_err());
        assert!(CatmullRomCurve::centripetal(vec![Vec3::ONE]).is_err());
        assert!(CatmullRomCurve::centripetal(vec![Vec3::ZERO, Vec3::ONE]).is_ok());
    }

    #[test]
    fn endpoints_are_exact() {
        let pts = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(12.5, 3.0, -4.0),
            Vec3::new(30.0, 0.0, 7.0),
        ];
        for kind in [CurveKind::Centripetal, CurveKind::Chordal, CurveKind::CatmullRom] {
            let curve = CatmullRomCurve::new(pts.clone(), kind, 0.5).unwrap();
            assert_eq!(curve.point(0.0), pts[0]);
            assert_eq!(curve.point(1.0), pts[2]);
            assert_eq!(curve.point(-3.0), pts[0]);
            assert_eq!(curve.point(4.0), pts[2]);
            assert_eq!(curve.point(f32::NAN), pts[0]);
        }
    }

    #[test]
    fn passes_through_interior_waypoints() {
        let pts = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(20.0, 0.0, 0.0),
            Vec3::new(30.0, 0.0, 10.0),
            Vec3::new(40.0, 0.0, 0.0),
        ];
        let curve = CatmullRomCurve::centripetal(pts.clone()).unwrap();
        for (i, p) in pts.iter().enumerate() {
            assert!(approx(curve.point(i as f32 / 4.0), *p), "waypoint {i}");
        }
    }

    #[test]
    fn straight_line_stays_straight() {
        let a = Vec3::ZERO;
        let b = Vec3::new(10.0, 0.0, 0.0);
        for kind in [CurveKind::Centripetal, CurveKind::Chordal, CurveKind::CatmullRom] {
            let curve = CatmullRomCurve::new(vec![a, b], kind, 0.5).unwrap();
            for s in [0.1, 0.25, 0.5, 0.9] {
                let p = curve.point(s);
                assert!(p.y.abs() < 1e-5 && p.z.abs() < 1e-5);
                assert!((p.x - 10.0 * s).abs() < 1e-3, "{kind:?} at {s}: {p}");
            }
        }
    }

    #[test]
    fn sampling_and_length() {
        let curve = CatmullRomCurve::centripetal(vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)]).unwrap();
        let samples = curve.points(100);
        assert_eq!(samples.len(), 101);
        assert_eq!(samples[0], Vec3::ZERO);
        assert_eq!(samples[100], Vec3::new(10.0, 0.0, 0.0));
        assert!((curve.length(200) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn length_is_at_least_the_chord() {
        let curve = CatmullRomCurve::centripetal(vec![
            Vec3::ZERO,
            Vec3::new(10.0, 0.0, 20.0),
            Vec3::new(30.0, 0.0, -5.0),
        ])
        .unwrap();
        let coarse = curve.length(10);
        let fine = curve.length(200);
        assert!(fine >= coarse - 1e-3);
        assert!(fine > Vec3::ZERO.distance(Vec3::new(30.0, 0.0, -5.0)));
    }

    #[test]
    fn duplicate_points_stay_finite() {
        let curve = CatmullRomCurve::centripetal(vec![
            Vec3::ONE,
            Vec3::ONE,
            Vec3::new(5.0, 0.0, 5.0),
        ])
        .unwrap();
        for s in curve.points(50) {
            assert!(s.is_finite());
        }
    }

    #[test]
    fn kind_parses_snake_case() {
        let kind: CurveKind = serde_json::from_str("\"chordal\"").unwrap();
        assert_eq!(kind, CurveKind::Chordal);
        assert_eq!(CurveKind::default(), CurveKind::Centripetal);
    }
}
