use crate::EngineResult;
use animator_api::persistence::{
    AnimationDef, AnimationId, Cue, CueId, Position, Preset, PresetId, Project, TrackDef, TrackId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Read-only view of a loaded show.
///
/// Built once at load time and shared behind an `Arc`; the engine never writes back into it.
#[derive(Debug, Default)]
pub struct ProjectStore {
    tracks: BTreeMap<TrackId, TrackDef>,
    animations: HashMap<AnimationId, Arc<AnimationDef>>,
    presets: HashMap<PresetId, Arc<Preset>>,
    cues: HashMap<CueId, Cue>,
}

impl ProjectStore {
    pub fn load(project: Project) -> EngineResult<Self> {
        let mut store = Self::default();
        for track in project.tracks {
            if store.tracks.insert(track.id, track).is_some() {
                return Err("duplicate track id");
            }
        }
        for animation in project.animations {
            if animation.duration.get() <= 0.0 || !animation.duration.get().is_finite() {
                return Err("animation duration must be > 0");
            }
            if store
                .animations
                .insert(animation.id.clone(), Arc::new(animation))
                .is_some()
            {
                return Err("duplicate animation id");
            }
        }
        for preset in project.presets {
            if preset.duration.get() <= 0.0 || !preset.duration.get().is_finite() {
                return Err("preset duration must be > 0");
            }
            if store
                .presets
                .insert(preset.id.clone(), Arc::new(preset))
                .is_some()
            {
                return Err("duplicate preset id");
            }
        }
        for cue in project.cues {
            if store.cues.insert(cue.id.clone(), cue).is_some() {
                return Err("duplicate cue id");
            }
        }
        Ok(store)
    }

    pub fn track(&self, id: TrackId) -> Option<&TrackDef> {
        self.tracks.get(&id)
    }

    pub fn initial_position(&self, id: TrackId) -> Option<Position> {
        self.tracks.get(&id).map(|t| t.initial_position)
    }

    pub fn animation(&self, id: &AnimationId) -> Option<&Arc<AnimationDef>> {
        self.animations.get(id)
    }

    pub fn preset(&self, id: &PresetId) -> Option<&Arc<Preset>> {
        self.presets.get(id)
    }

    pub fn cue(&self, id: &CueId) -> Option<&Cue> {
        self.cues.get(id)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &TrackDef> {
        self.tracks.values()
    }

    pub fn animations(&self) -> impl Iterator<Item = &Arc<AnimationDef>> {
        self.animations.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animator_api::persistence::Seconds;

    #[test]
    fn rejects_duplicate_ids() {
        let track = TrackDef {
            id: TrackId(1),
            name: String::new(),
            initial_position: Position::ZERO,
        };
        let project = Project {
            tracks: vec![track.clone(), track],
            ..Default::default()
        };
        assert!(ProjectStore::load(project).is_err());
    }

    #[test]
    fn rejects_non_positive_duration() {
        let project = Project {
            animations: vec![AnimationDef {
                id: AnimationId::new("a"),
                name: String::new(),
                model: "linear".into(),
                duration: Seconds(0.0),
                looped: false,
                ping_pong: false,
                parameters: Default::default(),
                transform: Default::default(),
                locked_tracks: None,
                fade_in: None,
                fade_out: None,
                wire_format: Default::default(),
            }],
            ..Default::default()
        };
        assert!(ProjectStore::load(project).is_err());
    }
}
