use crate::model::{AnimationModel, ModelCategory, ModelMetadata, ParamSet, ParamSpec};
use animator_api::persistence::Position;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Deterministic value at an integer lattice cell, in `[-1, 1]`.
///
/// Reseeding per lookup keeps evaluation pure; the mixing constants are the usual
/// splitmix64 increments.
fn lattice_value(seed: u64, axis: u64, cell: i64) -> f64 {
    let mixed = seed
        ^ axis.wrapping_mul(0x9e37_79b9_7f4a_7c15)
        ^ (cell as u64).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    let mut rng = SmallRng::seed_from_u64(mixed);
    rng.gen_range(-1.0..1.0)
}

/// Smoothly interpolated lattice noise at `s`, one axis.
fn value_noise(seed: u64, axis: u64, s: f64) -> f64 {
    let cell = s.floor();
    let u = s - cell;
    let cell = cell as i64;
    let a = lattice_value(seed, axis, cell);
    let b = lattice_value(seed, axis, cell + 1);
    // Smoothstep fade.
    let u = u * u * (3.0 - 2.0 * u);
    a + (b - a) * u
}

/// Smooth per-axis noise drift around `center`.
pub struct PerlinModel {
    metadata: ModelMetadata,
}

impl PerlinModel {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata {
                tag: "perlin",
                display_name: "Perlin drift",
                category: ModelCategory::Procedural,
                params: vec![
                    ParamSpec::position("center", Position::ZERO),
                    ParamSpec::position("amplitude", Position::new(1.0, 1.0, 1.0)),
                    ParamSpec::float("frequency", 0.0, 100.0, 2.0),
                    ParamSpec::int("octaves", 1, 8, 2),
                    ParamSpec::int("seed", 0, i64::MAX, 0),
                ],
            },
        }
    }
}

impl AnimationModel for PerlinModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn evaluate(&self, params: &ParamSet, t: f64) -> Position {
        let seed = params.i64("seed") as u64;
        let s = t * params.f64("frequency");
        let octaves = params.i64("octaves") as u32;
        let mut value = [0.0; 3];
        let mut weight_sum = 0.0;
        for octave in 0..octaves {
            let weight = 0.5_f64.powi(octave as i32);
            let scale = 2.0_f64.powi(octave as i32);
            weight_sum += weight;
            for (axis, slot) in value.iter_mut().enumerate() {
                *slot += weight * value_noise(seed, axis as u64, s * scale);
            }
        }
        let amplitude = params.position("amplitude");
        params.position("center")
            + Position::new(
                amplitude.x * value[0] / weight_sum,
                amplitude.y * value[1] / weight_sum,
                amplitude.z * value[2] / weight_sum,
            )
    }
}

/// Seeded random walk: a fixed chain of steps interpolated over the clip.
pub struct RandomWalkModel {
    metadata: ModelMetadata,
}

impl RandomWalkModel {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata {
                tag: "random-walk",
                display_name: "Random walk",
                category: ModelCategory::Procedural,
                params: vec![
                    ParamSpec::position("center", Position::ZERO),
                    ParamSpec::float("step", 0.0, 100.0, 0.5),
                    ParamSpec::int("steps", 1, 256, 16),
                    ParamSpec::int("seed", 0, i64::MAX, 0),
                ],
            },
        }
    }
}

impl AnimationModel for RandomWalkModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn evaluate(&self, params: &ParamSet, t: f64) -> Position {
        let steps = params.i64("steps") as usize;
        let step = params.f64("step");
        let mut rng = SmallRng::seed_from_u64(params.i64("seed") as u64);
        let mut current = params.position("center");
        let scaled = t.clamp(0.0, 1.0) * steps as f64;
        let whole = (scaled.floor() as usize).min(steps - 1);
        // Walk the deterministic chain up to the current step, then interpolate into the next.
        let mut next = current;
        for _ in 0..=whole {
            current = next;
            next = current
                + Position::new(
                    rng.gen_range(-1.0..1.0) * step,
                    rng.gen_range(-1.0..1.0) * step,
                    rng.gen_range(-1.0..1.0) * step,
                );
        }
        current.lerp(next, scaled - whole as f64)
    }
}
