use crate::model::{AnimationModel, ModelCategory, ModelMetadata, ParamSet, ParamSpec};
use animator_api::persistence::Position;
use std::f64::consts::TAU;

/// Unit direction for an azimuth/elevation pair, degrees.
///
/// Azimuth 0 points along +y and grows clockwise toward +x; elevation grows toward +z. The
/// same convention as the spherical wire form.
pub(crate) fn ray_direction(azimuth_deg: f64, elevation_deg: f64) -> Position {
    let azimuth = azimuth_deg.to_radians();
    let elevation = elevation_deg.to_radians();
    Position::new(
        azimuth.sin() * elevation.cos(),
        azimuth.cos() * elevation.cos(),
        elevation.sin(),
    )
}

/// Travel along a fixed ray from `origin`, from `start_distance` to `end_distance`.
pub struct RadialModel {
    metadata: ModelMetadata,
}

impl RadialModel {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata {
                tag: "radial",
                display_name: "Radial",
                category: ModelCategory::Spatial,
                params: vec![
                    ParamSpec::position("origin", Position::ZERO),
                    ParamSpec::float("azimuth", -360.0, 360.0, 0.0),
                    ParamSpec::float("elevation", -90.0, 90.0, 0.0),
                    ParamSpec::float("start_distance", 0.0, 1000.0, 1.0),
                    ParamSpec::float("end_distance", 0.0, 1000.0, 3.0),
                ],
            },
        }
    }
}

impl AnimationModel for RadialModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn evaluate(&self, params: &ParamSet, t: f64) -> Position {
        let direction = ray_direction(params.f64("azimuth"), params.f64("elevation"));
        let distance = params.f64("start_distance")
            + (params.f64("end_distance") - params.f64("start_distance")) * t;
        params.position("origin") + direction * distance
    }
}

/// Vertical spiral around `center`.
pub struct HelixModel {
    metadata: ModelMetadata,
}

impl HelixModel {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata {
                tag: "helix",
                display_name: "Helix",
                category: ModelCategory::Spatial,
                params: vec![
                    ParamSpec::position("center", Position::ZERO),
                    ParamSpec::float("radius", 0.0, 1000.0, 1.0),
                    ParamSpec::float("turns", -100.0, 100.0, 3.0),
                    ParamSpec::float("start_angle", -360.0, 360.0, 0.0),
                    ParamSpec::float("start_height", -100.0, 100.0, 0.0),
                    ParamSpec::float("end_height", -100.0, 100.0, 2.0),
                ],
            },
        }
    }
}

impl AnimationModel for HelixModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn evaluate(&self, params: &ParamSet, t: f64) -> Position {
        let angle = params.f64("start_angle").to_radians() + TAU * params.f64("turns") * t;
        let radius = params.f64("radius");
        let height = params.f64("start_height")
            + (params.f64("end_height") - params.f64("start_height")) * t;
        params.position("center") + Position::new(radius * angle.cos(), radius * angle.sin(), height)
    }
}
