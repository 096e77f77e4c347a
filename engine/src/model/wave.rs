use crate::model::{AnimationModel, ModelCategory, ModelMetadata, ParamSet, ParamSpec};
use animator_api::persistence::Position;
use std::f64::consts::TAU;

/// Travel from `start` to `end` with a sine oscillation on one axis.
pub struct SineWaveModel {
    metadata: ModelMetadata,
}

impl SineWaveModel {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata {
                tag: "sine-wave",
                display_name: "Sine wave",
                category: ModelCategory::Wave,
                params: vec![
                    ParamSpec::position("start", Position::ZERO),
                    ParamSpec::position("end", Position::ZERO),
                    ParamSpec::choice("axis", &["x", "y", "z"], "z"),
                    ParamSpec::float("amplitude", 0.0, 1000.0, 0.5),
                    ParamSpec::float("cycles", 0.0, 1000.0, 2.0),
                ],
            },
        }
    }
}

impl AnimationModel for SineWaveModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn evaluate(&self, params: &ParamSet, t: f64) -> Position {
        let mut pos = params.position("start").lerp(params.position("end"), t);
        let swing = params.f64("amplitude") * (TAU * params.f64("cycles") * t).sin();
        match params.choice("axis") {
            "x" => pos.x += swing,
            "y" => pos.y += swing,
            _ => pos.z += swing,
        }
        pos
    }
}

/// Lissajous figure around `center` with per-axis integer frequencies.
pub struct LissajousModel {
    metadata: ModelMetadata,
}

impl LissajousModel {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata {
                tag: "lissajous",
                display_name: "Lissajous",
                category: ModelCategory::Wave,
                params: vec![
                    ParamSpec::position("center", Position::ZERO),
                    ParamSpec::position("amplitude", Position::new(1.0, 1.0, 0.0)),
                    ParamSpec::int("freq_x", 0, 32, 3),
                    ParamSpec::int("freq_y", 0, 32, 2),
                    ParamSpec::int("freq_z", 0, 32, 0),
                    ParamSpec::float("phase", -360.0, 360.0, 90.0),
                ],
            },
        }
    }
}

impl AnimationModel for LissajousModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn evaluate(&self, params: &ParamSet, t: f64) -> Position {
        let center = params.position("center");
        let amplitude = params.position("amplitude");
        let phase = params.f64("phase").to_radians();
        let x = amplitude.x * (TAU * params.i64("freq_x") as f64 * t + phase).sin();
        let y = amplitude.y * (TAU * params.i64("freq_y") as f64 * t).sin();
        let z = amplitude.z * (TAU * params.i64("freq_z") as f64 * t).sin();
        center + Position::new(x, y, z)
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
    fn sine_wave_is_closed_for_whole_cycles() {
        let model = SineWaveModel::new();
        let params = defaults(&model);
        let begin = model.evaluate(&params, 0.0);
        let end = model.evaluate(&params, 1.0);
        assert_abs_diff_eq!(begin.z, end.z, epsilon = 1e-9);
        // Quarter cycle peaks at the amplitude.
        let peak = model.evaluate(&params, 0.125);
        assert_abs_diff_eq!(peak.z, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn lissajous_is_closed_for_integer_frequencies() {
        let model = LissajousModel::new();
        let params = defaults(&model);
        let begin = model.evaluate(&params, 0.0);
        let end = model.evaluate(&params, 1.0);
        assert_abs_diff_eq!(begin.x, end.x, epsilon = 1e-9);
        assert_abs_diff_eq!(begin.y, end.y, epsilon = 1e-9);
    }
}
