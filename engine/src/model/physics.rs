use crate::model::{AnimationModel, ModelCategory, ModelMetadata, ParamSet, ParamSpec};
use animator_api::persistence::Position;
use std::f64::consts::TAU;

/// A bob swinging below an anchor point, optionally damped.
pub struct PendulumModel {
    metadata: ModelMetadata,
}

impl PendulumModel {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata {
                tag: "pendulum",
                display_name: "Pendulum",
                category: ModelCategory::Physics,
                params: vec![
                    ParamSpec::position("anchor", Position::new(0.0, 0.0, 2.0)),
                    ParamSpec::float("length", 0.01, 100.0, 1.0),
                    ParamSpec::float("max_angle", 0.0, 90.0, 30.0),
                    // Vertical swing plane.
                    ParamSpec::choice("plane", &["xz", "yz"], "xz"),
                    ParamSpec::float("swings", 0.0, 100.0, 1.0),
                    ParamSpec::float("damping", 0.0, 1.0, 0.0),
                ],
            },
        }
    }
}

impl AnimationModel for PendulumModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn evaluate(&self, params: &ParamSet, t: f64) -> Position {
        let anchor = params.position("anchor");
        let length = params.f64("length");
        let envelope = (-3.0 * params.f64("damping") * t).exp();
        let angle =
            params.f64("max_angle").to_radians() * envelope * (TAU * params.f64("swings") * t).sin();
        let horizontal = if params.choice("plane") == "yz" {
            Position::new(0.0, 1.0, 0.0)
        } else {
            Position::new(1.0, 0.0, 0.0)
        };
        anchor + horizontal * (length * angle.sin()) + Position::new(0.0, 0.0, -length * angle.cos())
    }
}

/// Damped oscillation from `from` toward `to`.
pub struct SpringModel {
    metadata: ModelMetadata,
}

impl SpringModel {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata {
                tag: "spring",
                display_name: "Spring",
                category: ModelCategory::Physics,
                params: vec![
                    ParamSpec::position("from", Position::ZERO),
                    ParamSpec::position("to", Position::new(1.0, 0.0, 0.0)),
                    ParamSpec::float("frequency", 0.0, 100.0, 2.0),
                    ParamSpec::float("damping", 0.0, 1.0, 0.5),
                ],
            },
        }
    }
}

impl AnimationModel for SpringModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn evaluate(&self, params: &ParamSet, t: f64) -> Position {
        let from = params.position("from");
        let to = params.position("to");
        let envelope = (-6.0 * params.f64("damping") * t).exp();
        let swing = (TAU * params.f64("frequency") * t).cos();
        to + (from - to) * (envelope * swing)
    }
}

/// A ball dropped from `start`, bouncing on a horizontal floor with geometric height decay.
pub struct BounceModel {
    metadata: ModelMetadata,
}

impl BounceModel {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata {
                tag: "bounce",
                display_name: "Bounce",
                category: ModelCategory::Physics,
                params: vec![
                    ParamSpec::position("start", Position::new(0.0, 0.0, 2.0)),
                    ParamSpec::float("floor", -100.0, 100.0, 0.0),
                    ParamSpec::int("bounces", 0, 20, 3),
                    ParamSpec::float("restitution", 0.0, 1.0, 0.6),
                ],
            },
        }
    }
}

impl AnimationModel for BounceModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn evaluate(&self, params: &ParamSet, t: f64) -> Position {
        let start = params.position("start");
        let floor = params.f64("floor");
        let bounces = params.i64("bounces") as usize;
        let restitution = params.f64("restitution");
        let drop_height = (start.z - floor).max(0.0);

        // Segment 0 is the initial drop; each following segment is one full bounce arc.
        // Free fall time scales with the square root of the height, so the segment widths
        // follow sqrt(restitution)^i (a full arc is up plus down, hence the factor 2).
        let sqrt_r = restitution.sqrt();
        let mut widths = Vec::with_capacity(bounces + 1);
        widths.push(1.0);
        for i in 1..=bounces {
            widths.push(2.0 * sqrt_r.powi(i as i32));
        }
        let total: f64 = widths.iter().sum();

        let mut elapsed = 0.0;
        let mut height = 0.0;
        for (i, width) in widths.iter().enumerate() {
            let u = (t * total - elapsed) / width;
            if u <= 1.0 || i == bounces {
                let u = u.clamp(0.0, 1.0);
                height = if i == 0 {
                    // Half parabola: from drop_height down to the floor.
                    drop_height * (1.0 - u * u)
                } else {
                    // Full arc peaking at drop_height * restitution^i.
                    drop_height * restitution.powi(i as i32) * 4.0 * u * (1.0 - u)
                };
                break;
            }
            elapsed += width;
        }
        Position::new(start.x, start.y, floor + height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animator_api::persistence::{ParamMap, ParamValue};
    use approx::assert_abs_diff_eq;

    fn defaults(model: &dyn AnimationModel) -> ParamSet {
        model.metadata().validate(&ParamMap::new()).unwrap()
    }

    #[test]
    fn pendulum_rests_below_anchor_at_zero_angle() {
        let model = PendulumModel::new();
        let params = defaults(&model);
        let rest = model.evaluate(&params, 0.0);
        assert_abs_diff_eq!(rest.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(rest.z, 1.0, epsilon = 1e-9);
        // One full swing returns to rest.
        let end = model.evaluate(&params, 1.0);
        assert_abs_diff_eq!(end.x, rest.x, epsilon = 1e-9);
    }

    #[test]
    fn spring_starts_at_from_and_settles_toward_to() {
        let model = SpringModel::new();
        let params = defaults(&model);
        assert_eq!(model.evaluate(&params, 0.0), Position::ZERO);
        let settled = model.evaluate(&params, 1.0);
        assert!((settled.x - 1.0).abs() < 0.1);
    }

    #[test]
    fn bounce_starts_at_drop_height_and_never_goes_below_floor() {
        let model = BounceModel::new();
        let params = defaults(&model);
        let top = model.evaluate(&params, 0.0);
        assert_abs_diff_eq!(top.z, 2.0, epsilon = 1e-9);
        for i in 0..=100 {
            let pos = model.evaluate(&params, i as f64 / 100.0);
            assert!(pos.z >= -1e-9, "below floor at t={}", i as f64 / 100.0);
        }
    }

    #[test]
    fn bounce_peaks_decay_with_restitution() {
        let model = BounceModel::new();
        let mut provided = ParamMap::new();
        provided.insert("bounces".into(), ParamValue::Int { value: 1 });
        let params = model.metadata().validate(&provided).unwrap();
        // Peak of the single bounce arc should be restitution * drop height.
        let mut peak: f64 = 0.0;
        for i in 40..=100 {
            peak = peak.max(model.evaluate(&params, i as f64 / 100.0).z);
        }
        assert!((peak - 1.2).abs() < 0.05, "peak was {peak}");
    }
}
