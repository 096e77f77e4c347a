//! Turns a cue into a ready-to-run clip.
//!
//! Everything that can reject a trigger is checked here, on the caller's thread, against
//! immutable data only: the project store, the model registry and the cue itself. Arbitration
//! against the live registry happens later, on the engine thread, and never rejects.

use crate::base::ProjectStore;
use crate::model::ModelRegistry;
use crate::rt::{Clip, ResolvedAnimation, StartClipArgs};
use crate::transform::ResolvedTransform;
use crate::TriggerError;
use animator_api::persistence::{
    AnimationId, Cue, CueSource, Fade, ParamMap, Position, Seconds, TrackId, Transform, WireFormat,
};
use animator_api::runtime::{ClipEvent, ClipId};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::warn;

/// Everything resolution needs to decide; shared by all trigger sources.
pub struct ResolveContext<'a> {
    pub store: &'a ProjectStore,
    pub models: &'a ModelRegistry,
}

struct SourceMaterial {
    animation_id: AnimationId,
    model_tag: String,
    duration: Seconds,
    looped: bool,
    ping_pong: bool,
    parameters: ParamMap,
    transform: Transform,
    fade_in: Option<Fade>,
    fade_out: Option<Fade>,
    wire_format: WireFormat,
    requested_tracks: Vec<TrackId>,
}

/// Resolves a Play cue into a clip plus any structural warnings.
///
/// `clip_id` must come from the caller's monotonic allocator; `now` is the moment the trigger
/// arrived, which becomes the clip's phase anchor regardless of command-queue latency.
pub fn resolve_cue(
    ctx: &ResolveContext,
    cue: &Cue,
    clip_id: ClipId,
    now: Seconds,
) -> Result<StartClipArgs, TriggerError> {
    if !cue.enabled {
        return Err(TriggerError::DisabledCue);
    }
    let material = resolve_source(ctx, cue)?;
    let requested: Vec<TrackId> = material.requested_tracks.iter().copied().unique().collect();
    if requested.is_empty() {
        return Err(TriggerError::EmptyTrackSet);
    }

    let model = ctx
        .models
        .get(&material.model_tag)
        .ok_or_else(|| TriggerError::InvalidParameters {
            reason: format!("unknown model `{}`", material.model_tag),
        })?;
    let params = model
        .metadata()
        .validate(&material.parameters)
        .map_err(|reason| TriggerError::InvalidParameters { reason })?;
    if material.duration.get() <= 0.0 || !material.duration.get().is_finite() {
        return Err(TriggerError::InvalidParameters {
            reason: "duration must be > 0".into(),
        });
    }

    let transform = ResolvedTransform::from_api(&material.transform);
    if let ResolvedTransform::PhaseOffset { phase, .. } = &transform {
        if !phase.get().is_finite() || phase.get() < 0.0 {
            return Err(TriggerError::InvalidParameters {
                reason: "phase must be >= 0".into(),
            });
        }
    }

    let mut warnings = Vec::new();
    let owned = match transform.formation_tracks() {
        None => requested,
        Some(cohort) => {
            let cohort_set: BTreeSet<TrackId> = cohort.iter().copied().collect();
            let retained: Vec<TrackId> = requested
                .iter()
                .copied()
                .filter(|t| cohort_set.contains(t))
                .collect();
            if retained.is_empty() {
                return Err(TriggerError::IncompatibleFormation);
            }
            // The formation geometry is preserved for whatever subset remains; tracks outside
            // the saved cohort are dropped, never grafted on.
            if retained.len() != requested.len() || retained.len() != cohort.len() {
                warn!(
                    "cue `{}` plays formation `{}` on {} of {} saved tracks",
                    cue.id,
                    material.animation_id,
                    retained.len(),
                    cohort.len()
                );
                warnings.push(ClipEvent::FormationReduced {
                    cue_id: cue.id.clone(),
                    requested,
                    retained: retained.clone(),
                });
            }
            retained
        }
    };

    let mut initial_positions: BTreeMap<TrackId, Position> = BTreeMap::new();
    for &track in &owned {
        let position =
            ctx.store
                .initial_position(track)
                .ok_or_else(|| TriggerError::InvalidParameters {
                    reason: format!("unknown track {track}"),
                })?;
        initial_positions.insert(track, position);
    }

    let animation = Arc::new(ResolvedAnimation {
        id: material.animation_id,
        model,
        params,
        duration: material.duration,
        looped: material.looped,
        ping_pong: material.ping_pong,
        transform,
        fade_in: material.fade_in,
        fade_out: material.fade_out,
        wire_format: material.wire_format,
    });
    let clip = Clip::new(
        clip_id,
        cue.id.clone(),
        cue.priority,
        animation,
        owned,
        initial_positions,
        now,
    );
    Ok(StartClipArgs { clip, warnings })
}

fn resolve_source(ctx: &ResolveContext, cue: &Cue) -> Result<SourceMaterial, TriggerError> {
    match &cue.source {
        CueSource::Animation { animation, tracks } => {
            let def = ctx
                .store
                .animation(animation)
                .ok_or(TriggerError::UnknownAnimation)?;
            // A locked animation insists on its own track set; cue overrides are ignored.
            let requested_tracks = match &def.locked_tracks {
                Some(locked) => locked.clone(),
                None => tracks.clone().unwrap_or_default(),
            };
            Ok(SourceMaterial {
                animation_id: def.id.clone(),
                model_tag: def.model.clone(),
                duration: def.duration,
                looped: def.looped,
                ping_pong: def.ping_pong,
                parameters: def.parameters.clone(),
                transform: def.transform.clone(),
                fade_in: def.fade_in,
                fade_out: def.fade_out,
                wire_format: def.wire_format,
                requested_tracks,
            })
        }
        CueSource::Preset {
            preset,
            tracks,
            overrides,
        } => {
            let template = ctx.store.preset(preset).ok_or(TriggerError::UnknownPreset)?;
            let mut parameters = template.parameters.clone();
            parameters.extend(overrides.clone());
            Ok(SourceMaterial {
                animation_id: AnimationId::new(format!("preset:{}", template.id)),
                model_tag: template.model.clone(),
                duration: template.duration,
                looped: template.looped,
                ping_pong: false,
                parameters,
                transform: template.transform.clone(),
                fade_in: None,
                fade_out: None,
                wire_format: template.wire_format,
                requested_tracks: tracks.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::capture_formation;
    use animator_api::persistence::{
        AnimationDef, CueAction, CueId, ParamValue, Preset, PresetId, Project, TrackDef,
    };

    fn track(id: u32) -> TrackDef {
        TrackDef {
            id: TrackId(id),
            name: format!("track {id}"),
            initial_position: Position::new(id as f64, 0.0, 0.0),
        }
    }

    fn animation(id: &str) -> AnimationDef {
        AnimationDef {
            id: AnimationId::new(id),
            name: String::new(),
            model: "circle".into(),
            duration: Seconds(10.0),
            looped: true,
            ping_pong: false,
            parameters: Default::default(),
            transform: Default::default(),
            locked_tracks: None,
            fade_in: None,
            fade_out: None,
            wire_format: Default::default(),
        }
    }

    fn play_cue(id: &str, animation: &str, tracks: Option<Vec<u32>>) -> Cue {
        Cue {
            id: CueId::new(id),
            name: String::new(),
            number: None,
            enabled: true,
            source: CueSource::Animation {
                animation: AnimationId::new(animation),
                tracks: tracks.map(|t| t.into_iter().map(TrackId).collect()),
            },
            action: CueAction::Play,
            fade_time: None,
            priority: 0,
            triggers: vec![],
        }
    }

    fn store(animations: Vec<AnimationDef>, presets: Vec<Preset>) -> ProjectStore {
        ProjectStore::load(Project {
            tracks: (1..=5).map(track).collect(),
            animations,
            presets,
            cues: vec![],
        })
        .unwrap()
    }

    fn resolve(
        store: &ProjectStore,
        cue: &Cue,
    ) -> Result<StartClipArgs, TriggerError> {
        let models = ModelRegistry::with_builtins();
        let ctx = ResolveContext {
            store,
            models: &models,
        };
        resolve_cue(&ctx, cue, ClipId(1), Seconds::ZERO)
    }

    #[test]
    fn resolves_animation_cue_over_requested_tracks() {
        let store = store(vec![animation("a")], vec![]);
        let cue = play_cue("c", "a", Some(vec![2, 1, 2]));
        let args = resolve(&store, &cue).unwrap();
        // Duplicates are collapsed, ownership is sorted.
        assert_eq!(args.clip.owned_tracks(), [TrackId(1), TrackId(2)]);
        assert!(args.warnings.is_empty());
    }

    #[test]
    fn locked_animation_ignores_cue_tracks() {
        let mut def = animation("locked");
        def.locked_tracks = Some(vec![TrackId(1), TrackId(2)]);
        let store = store(vec![def], vec![]);
        let cue = play_cue("c", "locked", Some(vec![3, 4]));
        let args = resolve(&store, &cue).unwrap();
        assert_eq!(args.clip.owned_tracks(), [TrackId(1), TrackId(2)]);
    }

    #[test]
    fn rejects_unknown_animation_and_empty_track_set() {
        let store = store(vec![animation("a")], vec![]);
        assert_eq!(
            resolve(&store, &play_cue("c", "nope", Some(vec![1]))).unwrap_err(),
            TriggerError::UnknownAnimation
        );
        assert_eq!(
            resolve(&store, &play_cue("c", "a", None)).unwrap_err(),
            TriggerError::EmptyTrackSet
        );
        assert_eq!(
            resolve(&store, &play_cue("c", "a", Some(vec![]))).unwrap_err(),
            TriggerError::EmptyTrackSet
        );
    }

    #[test]
    fn rejects_disabled_cue() {
        let store = store(vec![animation("a")], vec![]);
        let mut cue = play_cue("c", "a", Some(vec![1]));
        cue.enabled = false;
        assert_eq!(resolve(&store, &cue).unwrap_err(), TriggerError::DisabledCue);
    }

    #[test]
    fn rejects_invalid_parameters() {
        let mut def = animation("a");
        def.parameters
            .insert("radius".into(), ParamValue::Float { value: -2.0 });
        let store = store(vec![def], vec![]);
        let err = resolve(&store, &play_cue("c", "a", Some(vec![1]))).unwrap_err();
        assert!(matches!(err, TriggerError::InvalidParameters { .. }));
    }

    #[test]
    fn formation_subset_proceeds_with_warning() {
        let mut def = animation("f");
        def.transform = Transform::Barycentric(capture_formation(
            &[
                (TrackId(1), Position::new(1.0, 0.0, 0.0)),
                (TrackId(2), Position::new(-1.0, 0.0, 0.0)),
                (TrackId(3), Position::new(0.0, 1.0, 0.0)),
            ],
            None,
        ));
        let store = store(vec![def], vec![]);
        let args = resolve(&store, &play_cue("c", "f", Some(vec![1, 2]))).unwrap();
        assert_eq!(args.clip.owned_tracks(), [TrackId(1), TrackId(2)]);
        assert_eq!(args.warnings.len(), 1);
        assert!(matches!(
            args.warnings[0],
            ClipEvent::FormationReduced { .. }
        ));
    }

    #[test]
    fn formation_with_empty_intersection_is_rejected() {
        let mut def = animation("f");
        def.transform = Transform::Barycentric(capture_formation(
            &[
                (TrackId(1), Position::ZERO),
                (TrackId(2), Position::ZERO),
            ],
            None,
        ));
        let store = store(vec![def], vec![]);
        assert_eq!(
            resolve(&store, &play_cue("c", "f", Some(vec![4, 5]))).unwrap_err(),
            TriggerError::IncompatibleFormation
        );
    }

    #[test]
    fn formation_drops_tracks_outside_the_cohort() {
        let mut def = animation("f");
        def.transform = Transform::Barycentric(capture_formation(
            &[
                (TrackId(1), Position::ZERO),
                (TrackId(2), Position::ZERO),
            ],
            None,
        ));
        let store = store(vec![def], vec![]);
        let args = resolve(&store, &play_cue("c", "f", Some(vec![1, 2, 3]))).unwrap();
        assert_eq!(args.clip.owned_tracks(), [TrackId(1), TrackId(2)]);
        assert_eq!(args.warnings.len(), 1);
    }

    #[test]
    fn preset_cue_merges_overrides() {
        let preset = Preset {
            id: PresetId::new("p"),
            name: String::new(),
            model: "circle".into(),
            duration: Seconds(5.0),
            looped: true,
            parameters: [("radius".to_string(), ParamValue::Float { value: 1.0 })]
                .into_iter()
                .collect(),
            transform: Default::default(),
            wire_format: Default::default(),
        };
        let store = store(vec![], vec![preset]);
        let cue = Cue {
            id: CueId::new("c"),
            name: String::new(),
            number: None,
            enabled: true,
            source: CueSource::Preset {
                preset: PresetId::new("p"),
                tracks: vec![TrackId(1)],
                overrides: [("radius".to_string(), ParamValue::Float { value: 3.0 })]
                    .into_iter()
                    .collect(),
            },
            action: CueAction::Play,
            fade_time: None,
            priority: 0,
            triggers: vec![],
        };
        let args = resolve(&store, &cue).unwrap();
        assert_eq!(args.clip.animation().params.f64("radius"), 3.0);
        assert_eq!(args.clip.animation().duration, Seconds(5.0));
    }

    #[test]
    fn rejects_unknown_preset() {
        let store = store(vec![], vec![]);
        let cue = Cue {
            id: CueId::new("c"),
            name: String::new(),
            number: None,
            enabled: true,
            source: CueSource::Preset {
                preset: PresetId::new("nope"),
                tracks: vec![TrackId(1)],
                overrides: Default::default(),
            },
            action: CueAction::Play,
            fade_time: None,
            priority: 0,
            triggers: vec![],
        };
        assert_eq!(resolve(&store, &cue).unwrap_err(), TriggerError::UnknownPreset);
    }
}
