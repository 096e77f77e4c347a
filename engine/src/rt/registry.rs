use crate::rt::Clip;
use crate::EngineResult;
use animator_api::persistence::{CueId, Seconds, TrackId};
use animator_api::runtime::{ClipId, ClipInfo};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::error;

const CLIP_DOESNT_EXIST: &str = "clip doesn't exist";

/// The set of live clips plus the track ownership index.
///
/// The ownership index is the single source of truth for "who drives this track": a track
/// appears at most once, which is what makes the single-owner invariant cheap to maintain and
/// cheap to check.
#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    clips: IndexMap<ClipId, Clip>,
    owners: BTreeMap<TrackId, ClipId>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a clip whose tracks have already been freed by arbitration.
    pub fn insert(&mut self, clip: Clip) {
        for &track in clip.owned_tracks() {
            if let Some(previous) = self.owners.insert(track, clip.id()) {
                // Impossible by construction (arbitration runs first). Fail fast in debug
                // builds, isolate the stale owner in release builds.
                debug_assert!(
                    false,
                    "track {track} still owned by clip {previous} on insert"
                );
                error!("track {track} still owned by clip {previous} on insert, releasing it");
                if let Ok(stale) = self.get_mut(previous) {
                    stale.release_tracks(&[track]);
                }
            }
        }
        self.clips.insert(clip.id(), clip);
    }

    pub fn get(&self, id: ClipId) -> EngineResult<&Clip> {
        self.clips.get(&id).ok_or(CLIP_DOESNT_EXIST)
    }

    pub fn get_mut(&mut self, id: ClipId) -> EngineResult<&mut Clip> {
        self.clips.get_mut(&id).ok_or(CLIP_DOESNT_EXIST)
    }

    pub fn owner_of(&self, track: TrackId) -> Option<ClipId> {
        self.owners.get(&track).copied()
    }

    /// Takes `tracks` away from `id`, updating both sides of the index.
    pub fn release_tracks(&mut self, id: ClipId, tracks: &[TrackId]) {
        if let Some(clip) = self.clips.get_mut(&id) {
            clip.release_tracks(tracks);
        }
        for track in tracks {
            if self.owners.get(track) == Some(&id) {
                self.owners.remove(track);
            }
        }
    }

    pub fn clips(&self) -> impl Iterator<Item = &Clip> {
        self.clips.values()
    }

    pub fn clips_mut(&mut self) -> impl Iterator<Item = &mut Clip> {
        self.clips.values_mut()
    }

    pub fn ids(&self) -> Vec<ClipId> {
        self.clips.keys().copied().collect()
    }

    pub fn ids_for_cue(&self, cue_id: &CueId) -> Vec<ClipId> {
        self.clips
            .values()
            .filter(|c| c.cue_id() == cue_id)
            .map(|c| c.id())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn infos(&self, now: Seconds) -> Vec<ClipInfo> {
        self.clips.values().map(|c| c.info(now)).collect()
    }

    /// Removes all finished clips, releasing whatever they still own.
    pub fn take_finished(&mut self) -> Vec<Clip> {
        let finished_ids: Vec<ClipId> = self
            .clips
            .values()
            .filter(|c| c.is_finished())
            .map(|c| c.id())
            .collect();
        let mut removed = Vec::with_capacity(finished_ids.len());
        for id in finished_ids {
            if let Some(clip) = self.clips.shift_remove(&id) {
                for track in clip.owned_tracks() {
                    if self.owners.get(track) == Some(&id) {
                        self.owners.remove(track);
                    }
                }
                removed.push(clip);
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelRegistry;
    use crate::rt::ResolvedAnimation;
    use crate::transform::ResolvedTransform;
    use animator_api::persistence::{AnimationId, ParamMap, Position, WireFormat};
    use std::sync::Arc;

    fn test_clip(id: u64, tracks: &[u32]) -> Clip {
        let model = ModelRegistry::with_builtins().get("linear").unwrap();
        let params = model.metadata().validate(&ParamMap::new()).unwrap();
        let animation = Arc::new(ResolvedAnimation {
            id: AnimationId::new("a"),
            model,
            params,
            duration: Seconds(10.0),
            looped: true,
            ping_pong: false,
            transform: ResolvedTransform::None,
            fade_in: None,
            fade_out: None,
            wire_format: WireFormat::Xyz,
        });
        let tracks: Vec<TrackId> = tracks.iter().map(|&t| TrackId(t)).collect();
        let initial = tracks.iter().map(|&t| (t, Position::ZERO)).collect();
        Clip::new(
            ClipId(id),
            CueId::new("c"),
            0,
            animation,
            tracks,
            initial,
            Seconds::ZERO,
        )
    }

    #[test]
    fn ownership_index_follows_insert_and_release() {
        let mut registry = ExecutionRegistry::new();
        registry.insert(test_clip(1, &[1, 2, 3]));
        assert_eq!(registry.owner_of(TrackId(2)), Some(ClipId(1)));
        registry.release_tracks(ClipId(1), &[TrackId(2)]);
        assert_eq!(registry.owner_of(TrackId(2)), None);
        assert_eq!(registry.get(ClipId(1)).unwrap().owned_tracks(), [TrackId(1), TrackId(3)]);
    }

    #[test]
    fn take_finished_releases_remaining_tracks() {
        let mut registry = ExecutionRegistry::new();
        registry.insert(test_clip(1, &[1, 2]));
        registry.get_mut(ClipId(1)).unwrap().finish();
        let removed = registry.take_finished();
        assert_eq!(removed.len(), 1);
        assert!(registry.is_empty());
        assert_eq!(registry.owner_of(TrackId(1)), None);
    }

    #[test]
    fn lookup_of_unknown_clip_fails() {
        let registry = ExecutionRegistry::new();
        assert_eq!(registry.get(ClipId(42)).unwrap_err(), CLIP_DOESNT_EXIST);
    }
}
