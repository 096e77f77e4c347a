//! The animation model registry.
//!
//! A model is a pure function from validated parameters and normalized time to a position.
//! Models are registered once at startup and looked up by their stable tag; the registry is
//! immutable afterwards, so it can be shared freely across threads.

mod params;

mod basic;
mod path;
mod physics;
mod procedural;
mod spatial;
mod wave;

pub use basic::*;
pub use params::*;
pub use path::*;
pub use physics::*;
pub use procedural::*;
pub use spatial::*;
pub use wave::*;

use crate::EngineResult;
use animator_api::persistence::Position;
use std::collections::HashMap;
use std::sync::Arc;
use strum::Display;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum ModelCategory {
    Basic,
    Physics,
    Wave,
    Path,
    Procedural,
    Spatial,
}

#[derive(Clone, Debug)]
pub struct ModelMetadata {
    /// Stable tag an animation definition refers to, e.g. `"circle"`.
    pub tag: &'static str,
    pub display_name: &'static str,
    pub category: ModelCategory,
    pub params: Vec<ParamSpec>,
}

impl ModelMetadata {
    /// Validates user-provided parameter values against this model's schema.
    pub fn validate(
        &self,
        provided: &animator_api::persistence::ParamMap,
    ) -> Result<ParamSet, String> {
        ParamSet::validate(&self.params, provided)
    }
}

/// A declarative animation model.
///
/// `evaluate` must be deterministic, side-effect free and total on a [`ParamSet`] validated
/// against this model's own schema. `t` is normalized time in `[0, 1]`. Models that are meant
/// to be looped seamlessly return the same position at `t = 1` as at `t = 0`; that is the model
/// author's contract, the registry doesn't enforce it.
pub trait AnimationModel: Send + Sync {
    fn metadata(&self) -> &ModelMetadata;

    fn evaluate(&self, params: &ParamSet, t: f64) -> Position;
}

/// Keyed collection of animation models. One-shot registration, O(1) lookup by tag.
pub struct ModelRegistry {
    models: HashMap<&'static str, Arc<dyn AnimationModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// Creates a registry with all built-in model families registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: Vec<Arc<dyn AnimationModel>> = vec![
            Arc::new(LinearModel::new()),
            Arc::new(CircleModel::new()),
            Arc::new(OrbitModel::new()),
            Arc::new(PendulumModel::new()),
            Arc::new(SpringModel::new()),
            Arc::new(BounceModel::new()),
            Arc::new(SineWaveModel::new()),
            Arc::new(LissajousModel::new()),
            Arc::new(BezierModel::new()),
            Arc::new(CatmullRomModel::new()),
            Arc::new(WaypointsModel::new()),
            Arc::new(PerlinModel::new()),
            Arc::new(RandomWalkModel::new()),
            Arc::new(RadialModel::new()),
            Arc::new(HelixModel::new()),
        ];
        for model in builtins {
            registry
                .register(model)
                .expect("duplicate built-in model tag");
        }
        registry
    }

    pub fn register(&mut self, model: Arc<dyn AnimationModel>) -> EngineResult<()> {
        let tag = model.metadata().tag;
        if self.models.contains_key(tag) {
            return Err("a model with this tag is already registered");
        }
        self.models.insert(tag, model);
        Ok(())
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn AnimationModel>> {
        self.models.get(tag).cloned()
    }

    pub fn models(&self) -> impl Iterator<Item = &Arc<dyn AnimationModel>> {
        self.models.values()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Unit basis vectors of a movement plane: (first in-plane axis, second in-plane axis, normal).
pub(crate) fn plane_vectors(choice: &str) -> (Position, Position, Position) {
    let x = Position::new(1.0, 0.0, 0.0);
    let y = Position::new(0.0, 1.0, 0.0);
    let z = Position::new(0.0, 0.0, 1.0);
    match choice {
        "xz" => (x, z, y),
        "yz" => (y, z, x),
        _ => (x, y, z),
    }
}

pub(crate) const PLANE_OPTIONS: &[&str] = &["xy", "xz", "yz"];

#[cfg(test)]
mod tests {
    use super::*;
    use animator_api::persistence::ParamMap;

    #[test]
    fn builtins_have_unique_tags_and_valid_defaults() {
        let registry = ModelRegistry::with_builtins();
        let mut count = 0;
        for model in registry.models() {
            let meta = model.metadata();
            let params = meta
                .validate(&ParamMap::new())
                .unwrap_or_else(|e| panic!("defaults of `{}` invalid: {e}", meta.tag));
            // Every model must be total over [0, 1] on its own defaults.
            for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
                let pos = model.evaluate(&params, t);
                assert!(pos.is_finite(), "`{}` not finite at t={t}", meta.tag);
            }
            count += 1;
        }
        assert_eq!(count, 15);
    }

    #[test]
    fn lookup_by_tag() {
        let registry = ModelRegistry::with_builtins();
        assert!(registry.get("circle").is_some());
        assert!(registry.get("no-such-model").is_none());
    }

    #[test]
    fn rejects_duplicate_registration() {
        let mut registry = ModelRegistry::with_builtins();
        assert!(registry.register(Arc::new(LinearModel::new())).is_err());
    }
}
