use crate::model::{AnimationModel, ModelCategory, ModelMetadata, ParamSet, ParamSpec};
use animator_api::persistence::Position;

/// Cubic Bezier through four control points.
pub struct BezierModel {
    metadata: ModelMetadata,
}

impl BezierModel {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata {
                tag: "bezier",
                display_name: "Bezier",
                category: ModelCategory::Path,
                params: vec![
                    ParamSpec::position("p0", Position::ZERO),
                    ParamSpec::position("p1", Position::new(0.0, 1.0, 0.0)),
                    ParamSpec::position("p2", Position::new(1.0, 1.0, 0.0)),
                    ParamSpec::position("p3", Position::new(1.0, 0.0, 0.0)),
                ],
            },
        }
    }
}

impl AnimationModel for BezierModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn evaluate(&self, params: &ParamSet, t: f64) -> Position {
        let p0 = params.position("p0");
        let p1 = params.position("p1");
        let p2 = params.position("p2");
        let p3 = params.position("p3");
        let u = 1.0 - t;
        p0 * (u * u * u) + p1 * (3.0 * u * u * t) + p2 * (3.0 * u * t * t) + p3 * (t * t * t)
    }
}

/// Catmull-Rom spline through a list of waypoints, uniform in time per segment.
pub struct CatmullRomModel {
    metadata: ModelMetadata,
}

impl CatmullRomModel {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata {
                tag: "catmull-rom",
                display_name: "Catmull-Rom",
                category: ModelCategory::Path,
                params: vec![ParamSpec::positions(
                    "waypoints",
                    2,
                    vec![
                        Position::ZERO,
                        Position::new(1.0, 1.0, 0.0),
                        Position::new(2.0, 0.0, 0.0),
                    ],
                )],
            },
        }
    }
}

impl AnimationModel for CatmullRomModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn evaluate(&self, params: &ParamSet, t: f64) -> Position {
        let points = params.positions("waypoints");
        let (segment, u) = segment_at(points.len(), t);
        let p0 = points[segment.saturating_sub(1)];
        let p1 = points[segment];
        let p2 = points[segment + 1];
        let p3 = points[(segment + 2).min(points.len() - 1)];
        // Hermite form with Catmull-Rom tangents (clamped at the ends).
        let m1 = (p2 - p0) * 0.5;
        let m2 = (p3 - p1) * 0.5;
        let u2 = u * u;
        let u3 = u2 * u;
        p1 * (2.0 * u3 - 3.0 * u2 + 1.0)
            + m1 * (u3 - 2.0 * u2 + u)
            + p2 * (-2.0 * u3 + 3.0 * u2)
            + m2 * (u3 - u2)
    }
}

/// Piecewise-linear travel through a list of waypoints, uniform in time per segment.
pub struct WaypointsModel {
    metadata: ModelMetadata,
}

impl WaypointsModel {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata {
                tag: "waypoints",
                display_name: "Waypoints",
                category: ModelCategory::Path,
                params: vec![ParamSpec::positions(
                    "waypoints",
                    2,
                    vec![Position::ZERO, Position::new(1.0, 0.0, 0.0)],
                )],
            },
        }
    }
}

impl AnimationModel for WaypointsModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn evaluate(&self, params: &ParamSet, t: f64) -> Position {
        let points = params.positions("waypoints");
        let (segment, u) = segment_at(points.len(), t);
        points[segment].lerp(points[segment + 1], u)
    }
}

/// Maps normalized time onto (segment index, progress within segment) for `len` waypoints.
fn segment_at(len: usize, t: f64) -> (usize, f64) {
    let segments = len - 1;
    let scaled = t.clamp(0.0, 1.0) * segments as f64;
    let segment = (scaled.floor() as usize).min(segments - 1);
    (segment, scaled - segment as f64)
}
