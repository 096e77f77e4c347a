use crate::model::{
    plane_vectors, AnimationModel, ModelCategory, ModelMetadata, ParamSet, ParamSpec,
    PLANE_OPTIONS,
};
use animator_api::persistence::Position;
use std::f64::consts::TAU;

/// Straight travel from `start` to `end`.
pub struct LinearModel {
    metadata: ModelMetadata,
}

impl LinearModel {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata {
                tag: "linear",
                display_name: "Linear",
                category: ModelCategory::Basic,
                params: vec![
                    ParamSpec::position("start", Position::ZERO),
                    ParamSpec::position("end", Position::new(1.0, 0.0, 0.0)),
                ],
            },
        }
    }
}

impl AnimationModel for LinearModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn evaluate(&self, params: &ParamSet, t: f64) -> Position {
        params.position("start").lerp(params.position("end"), t)
    }
}

/// Circular orbit in one of the coordinate planes.
///
/// Closed at `t = 1` for whole-numbered `revolutions`.
pub struct CircleModel {
    metadata: ModelMetadata,
}

impl CircleModel {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata {
                tag: "circle",
                display_name: "Circle",
                category: ModelCategory::Basic,
                params: vec![
                    ParamSpec::position("center", Position::ZERO),
                    ParamSpec::float("radius", 0.0, 1000.0, 1.0),
                    ParamSpec::choice("plane", PLANE_OPTIONS, "xy"),
                    ParamSpec::float("start_angle", -360.0, 360.0, 0.0),
                    // Negative values run the circle the other way round.
                    ParamSpec::float("revolutions", -100.0, 100.0, 1.0),
                ],
            },
        }
    }
}

impl AnimationModel for CircleModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn evaluate(&self, params: &ParamSet, t: f64) -> Position {
        let (a, b, _) = plane_vectors(params.choice("plane"));
        let radius = params.f64("radius");
        let angle = params.f64("start_angle").to_radians() + t * params.f64("revolutions") * TAU;
        params.position("center") + a * (radius * angle.cos()) + b * (radius * angle.sin())
    }
}

/// Elliptic orbit with an optional tilt out of its base plane.
pub struct OrbitModel {
    metadata: ModelMetadata,
}

impl OrbitModel {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata {
                tag: "orbit",
                display_name: "Orbit",
                category: ModelCategory::Basic,
                params: vec![
                    ParamSpec::position("center", Position::ZERO),
                    ParamSpec::float("radius_major", 0.0, 1000.0, 2.0),
                    ParamSpec::float("radius_minor", 0.0, 1000.0, 1.0),
                    ParamSpec::choice("plane", PLANE_OPTIONS, "xy"),
                    ParamSpec::float("tilt", -90.0, 90.0, 0.0),
                    ParamSpec::float("start_angle", -360.0, 360.0, 0.0),
                    ParamSpec::float("revolutions", -100.0, 100.0, 1.0),
                ],
            },
        }
    }
}

impl AnimationModel for OrbitModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn evaluate(&self, params: &ParamSet, t: f64) -> Position {
        let (a, b, normal) = plane_vectors(params.choice("plane"));
        let angle = params.f64("start_angle").to_radians() + t * params.f64("revolutions") * TAU;
        let tilt = params.f64("tilt").to_radians();
        let major = params.f64("radius_major") * angle.cos();
        let minor = params.f64("radius_minor") * angle.sin();
        params.position("center")
            + a * major
            + b * (minor * tilt.cos())
            + normal * (minor * tilt.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animator_api::persistence::ParamMap;
    use approx::assert_abs_diff_eq;

    fn defaults(model: &dyn AnimationModel) -> ParamSet {
        model.metadata().validate(&ParamMap::new()).unwrap()
    }

    #[test]
    fn linear_hits_endpoints() {
        let model = LinearModel::new();
        let params = defaults(&model);
        assert_eq!(model.evaluate(&params, 0.0), Position::ZERO);
        assert_eq!(model.evaluate(&params, 1.0), Position::new(1.0, 0.0, 0.0));
        assert_eq!(model.evaluate(&params, 0.5), Position::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn circle_is_closed_over_one_revolution() {
        let model = CircleModel::new();
        let params = defaults(&model);
        let begin = model.evaluate(&params, 0.0);
        let end = model.evaluate(&params, 1.0);
        assert_abs_diff_eq!(begin.x, end.x, epsilon = 1e-9);
        assert_abs_diff_eq!(begin.y, end.y, epsilon = 1e-9);
        assert_abs_diff_eq!(begin.z, end.z, epsilon = 1e-9);
        // Default circle starts on the +x axis at radius 1.
        assert_abs_diff_eq!(begin.x, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn circle_respects_plane_choice() {
        let model = CircleModel::new();
        let mut provided = ParamMap::new();
        provided.insert(
            "plane".into(),
            animator_api::persistence::ParamValue::Choice { value: "xz".into() },
        );
        let params = model.metadata().validate(&provided).unwrap();
        let quarter = model.evaluate(&params, 0.25);
        assert_abs_diff_eq!(quarter.z, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(quarter.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn orbit_tilt_lifts_minor_axis() {
        let model = OrbitModel::new();
        let mut provided = ParamMap::new();
        provided.insert(
            "tilt".into(),
            animator_api::persistence::ParamValue::Float { value: 90.0 },
        );
        let params = model.metadata().validate(&provided).unwrap();
        // At a 90 degree tilt the minor axis points along the plane normal (z for "xy").
        let quarter = model.evaluate(&params, 0.25);
        assert_abs_diff_eq!(quarter.y, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(quarter.z, 1.0, epsilon = 1e-9);
    }
}
