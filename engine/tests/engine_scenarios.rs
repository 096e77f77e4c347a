//! End-to-end engine scenarios, driven tick by tick against a hand-cranked clock.

use animator_api::persistence::{
    AnimationDef, AnimationId, Cue, CueAction, CueId, CueSource, ParamValue, PhaseOffsetTransform,
    Position, Project, RelativeTransform, Seconds, TrackDef, TrackId, TrackOffset, Transform,
};
use animator_api::runtime::{ClipEvent, ClipId, PlaybackState, ReleaseReason};
use animator_engine::model::{
    AnimationModel, ModelCategory, ModelMetadata, ModelRegistry, ParamSet,
};
use animator_engine::output::{PositionUpdate, WireBatch};
use animator_engine::timeline::ManualTimeline;
use animator_engine::transform::capture_formation;
use animator_engine::{
    resolve_cue, Animator, Engine, EngineCommandSender, EngineSettings, ProjectStore,
    ResolveContext, TriggerError,
};
use crossbeam_channel::Receiver;
use std::sync::{Arc, Mutex};

fn track(id: u32, x: f64) -> TrackDef {
    TrackDef {
        id: TrackId(id),
        name: format!("track {id}"),
        initial_position: Position::new(x, 0.0, 0.0),
    }
}

fn base_animation(id: &str, model: &str) -> AnimationDef {
    AnimationDef {
        id: AnimationId::new(id),
        name: String::new(),
        model: model.into(),
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

/// Linear travel from the origin to (1, 0, 0); position is simply (t, 0, 0) scaled.
fn ramp_animation(id: &str, duration: f64, looped: bool) -> AnimationDef {
    let mut def = base_animation(id, "linear");
    def.duration = Seconds(duration);
    def.looped = looped;
    def
}

fn play_cue(id: &str, animation: &str, tracks: Vec<u32>) -> Cue {
    Cue {
        id: CueId::new(id),
        name: String::new(),
        number: None,
        enabled: true,
        source: CueSource::Animation {
            animation: AnimationId::new(animation),
            tracks: Some(tracks.into_iter().map(TrackId).collect()),
        },
        action: CueAction::Play,
        fade_time: None,
        priority: 0,
        triggers: vec![],
    }
}

struct Harness {
    store: ProjectStore,
    models: ModelRegistry,
    commands: EngineCommandSender,
    batches: Receiver<WireBatch>,
    engine: Engine,
    events: Arc<Mutex<Vec<ClipEvent>>>,
    next_clip_id: u64,
}

impl Harness {
    fn new(project: Project) -> Self {
        Self::with_models(project, ModelRegistry::with_builtins())
    }

    fn with_models(project: Project, models: ModelRegistry) -> Self {
        let store = ProjectStore::load(project).unwrap();
        let settings = EngineSettings::default();
        let (command_sender, command_receiver) =
            crossbeam_channel::bounded(settings.command_queue_capacity);
        let (batch_sender, batch_receiver) = crossbeam_channel::bounded(1024);
        let mut engine = Engine::new(settings, command_receiver, batch_sender);
        let events: Arc<Mutex<Vec<ClipEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        engine.subscribe(Box::new(move |event| {
            sink.lock().unwrap().push(event.clone());
        }));
        Self {
            store,
            models,
            commands: EngineCommandSender::new(command_sender),
            batches: batch_receiver,
            engine,
            events,
            next_clip_id: 1,
        }
    }

    fn trigger(&mut self, cue: &Cue, now: f64) -> Result<ClipId, TriggerError> {
        let clip_id = ClipId(self.next_clip_id);
        self.next_clip_id += 1;
        let ctx = ResolveContext {
            store: &self.store,
            models: &self.models,
        };
        let args = resolve_cue(&ctx, cue, clip_id, Seconds(now))?;
        self.commands.start_clip(Box::new(args));
        Ok(clip_id)
    }

    /// Runs one tick and returns everything emitted toward the sink, flattened.
    fn tick(&mut self, now: f64) -> Vec<PositionUpdate> {
        self.engine.tick(Seconds(now));
        self.batches.try_iter().flatten().collect()
    }

    fn events(&self) -> Vec<ClipEvent> {
        self.events.lock().unwrap().clone()
    }

    fn owned_tracks(&self, clip_id: ClipId, now: f64) -> Vec<TrackId> {
        self.engine
            .active_clips(Seconds(now))
            .into_iter()
            .find(|info| info.clip_id == clip_id)
            .map(|info| info.owned_tracks)
            .unwrap_or_default()
    }
}

fn small_show(animations: Vec<AnimationDef>) -> Project {
    Project {
        tracks: vec![track(1, 0.0), track(2, 0.0), track(3, 0.0), track(4, 0.0)],
        animations,
        presets: vec![],
        cues: vec![],
    }
}

fn update_for(updates: &[PositionUpdate], track: u32) -> Option<PositionUpdate> {
    updates.iter().copied().find(|u| u.track == TrackId(track))
}

#[test]
fn ltp_release_splits_older_clip_and_keeps_phase() {
    let mut harness = Harness::new(small_show(vec![base_animation("a", "circle")]));
    let clip_1 = harness.trigger(&play_cue("c1", "a", vec![1, 2, 3]), 0.0).unwrap();
    harness.tick(0.0);
    let reference = harness.tick(1.0);
    let t3_before = update_for(&reference, 3).unwrap();

    let clip_2 = harness.trigger(&play_cue("c2", "a", vec![1, 2]), 2.0).unwrap();
    let updates = harness.tick(2.0);

    assert_eq!(harness.owned_tracks(clip_1, 2.0), [TrackId(3)]);
    assert_eq!(harness.owned_tracks(clip_2, 2.0), [TrackId(1), TrackId(2)]);
    assert!(harness.events().contains(&ClipEvent::TracksReleased {
        clip_id: clip_1,
        tracks: vec![TrackId(1), TrackId(2)],
        reason: ReleaseReason::Ltp,
    }));
    // Track 3 keeps running in its original phase: the older clip is two seconds in, the
    // newer one starts from zero, so their samples differ.
    let t3_after = update_for(&updates, 3).unwrap();
    let t1_after = update_for(&updates, 1).unwrap();
    assert_ne!(t3_after.position, t3_before.position);
    assert_ne!(t3_after.position, t1_after.position);
    // The new clip starts at the circle's t=0 point.
    assert!((t1_after.position.x - 1.0).abs() < 1e-9);
}

#[test]
fn formation_subset_plays_with_original_offsets_and_no_third_track() {
    let mut def = base_animation("f", "linear");
    def.parameters.insert(
        "end".into(),
        ParamValue::Position {
            value: Position::ZERO,
        },
    );
    def.transform = Transform::Barycentric(capture_formation(
        &[
            (TrackId(1), Position::new(1.0, 0.0, 0.0)),
            (TrackId(2), Position::new(-1.0, 0.0, 0.0)),
            (TrackId(3), Position::new(0.0, 3.0, 0.0)),
        ],
        Some(Position::ZERO),
    ));
    let mut harness = Harness::new(small_show(vec![def]));
    harness.trigger(&play_cue("c", "f", vec![1, 2]), 0.0).unwrap();
    let updates = harness.tick(0.0);

    assert!(harness
        .events()
        .iter()
        .any(|e| matches!(e, ClipEvent::FormationReduced { .. })));
    // The model holds at the origin, so each track sits exactly on its captured offset.
    assert_eq!(update_for(&updates, 1).unwrap().position, Position::new(1.0, 0.0, 0.0));
    assert_eq!(update_for(&updates, 2).unwrap().position, Position::new(-1.0, 0.0, 0.0));
    assert!(update_for(&updates, 3).is_none());
}

#[test]
fn formation_with_disjoint_tracks_is_rejected_without_side_effects() {
    let mut def = base_animation("f", "circle");
    def.transform = Transform::Barycentric(capture_formation(
        &[(TrackId(1), Position::ZERO), (TrackId(2), Position::ZERO)],
        None,
    ));
    let mut harness = Harness::new(small_show(vec![def]));
    let result = harness.trigger(&play_cue("c", "f", vec![3, 4]), 0.0);
    assert_eq!(result.unwrap_err(), TriggerError::IncompatibleFormation);
    let updates = harness.tick(0.0);
    assert!(updates.is_empty());
    assert!(harness.engine.active_clips(Seconds(0.0)).is_empty());
    assert!(harness.events().is_empty());
}

#[test]
fn phase_offset_staggers_tracks_and_clamps_at_zero() {
    let mut def = ramp_animation("ramp", 4.0, true);
    def.transform = Transform::PhaseOffset(PhaseOffsetTransform {
        phase: Seconds(1.0),
        relative: None,
    });
    let mut harness = Harness::new(small_show(vec![def]));
    harness.trigger(&play_cue("c", "ramp", vec![1, 2, 3]), 0.0).unwrap();
    let updates = harness.tick(2.0);
    assert!((update_for(&updates, 1).unwrap().position.x - 0.5).abs() < 1e-9);
    assert!((update_for(&updates, 2).unwrap().position.x - 0.25).abs() < 1e-9);
    assert!((update_for(&updates, 3).unwrap().position.x - 0.0).abs() < 1e-9);
}

#[test]
fn phase_offset_zero_is_identical_across_tracks() {
    let mut def = ramp_animation("ramp", 4.0, true);
    def.transform = Transform::PhaseOffset(PhaseOffsetTransform {
        phase: Seconds(0.0),
        relative: None,
    });
    let mut harness = Harness::new(small_show(vec![def]));
    harness.trigger(&play_cue("c", "ramp", vec![1, 2, 3]), 0.0).unwrap();
    let updates = harness.tick(1.0);
    let reference = update_for(&updates, 1).unwrap().position;
    assert_eq!(update_for(&updates, 2).unwrap().position, reference);
    assert_eq!(update_for(&updates, 3).unwrap().position, reference);
}

#[test]
fn locked_animation_never_touches_override_tracks() {
    let mut def = base_animation("locked", "circle");
    def.locked_tracks = Some(vec![TrackId(1), TrackId(2)]);
    let mut harness = Harness::new(small_show(vec![def]));
    let clip_id = harness
        .trigger(&play_cue("c", "locked", vec![3, 4]), 0.0)
        .unwrap();
    let updates = harness.tick(0.0);
    assert_eq!(harness.owned_tracks(clip_id, 0.0), [TrackId(1), TrackId(2)]);
    assert!(update_for(&updates, 3).is_none());
    assert!(update_for(&updates, 4).is_none());
    assert!(update_for(&updates, 1).is_some());
}

#[test]
fn relative_with_zero_offsets_matches_none_transform() {
    let plain = base_animation("plain", "circle");
    let mut zeroed = base_animation("zeroed", "circle");
    zeroed.transform = Transform::Relative(RelativeTransform {
        offsets: vec![
            TrackOffset {
                track: TrackId(2),
                offset: Position::ZERO,
            },
        ],
    });
    let mut harness = Harness::new(small_show(vec![plain, zeroed]));
    harness.trigger(&play_cue("c1", "plain", vec![1]), 0.0).unwrap();
    harness.trigger(&play_cue("c2", "zeroed", vec![2]), 0.0).unwrap();
    for now in [0.0, 1.3, 2.6] {
        let updates = harness.tick(now);
        if updates.is_empty() {
            continue;
        }
        let a = update_for(&updates, 1).unwrap().position;
        let b = update_for(&updates, 2).unwrap().position;
        assert_eq!(a, b);
    }
}

#[test]
fn stop_without_fade_emits_one_terminal_sample_and_releases() {
    let mut harness = Harness::new(small_show(vec![ramp_animation("ramp", 10.0, true)]));
    let clip_id = harness.trigger(&play_cue("c", "ramp", vec![1]), 0.0).unwrap();
    harness.tick(0.0);
    harness.commands.stop_clip(clip_id, None);
    let updates = harness.tick(1.0);
    // Exactly one terminal sample for the track.
    assert_eq!(updates.len(), 1);
    assert!((update_for(&updates, 1).unwrap().position.x - 0.1).abs() < 1e-9);
    assert!(harness.events().contains(&ClipEvent::TracksReleased {
        clip_id,
        tracks: vec![TrackId(1)],
        reason: ReleaseReason::Stopped,
    }));
    assert!(harness
        .events()
        .contains(&ClipEvent::Finished { clip_id }));
    // Gone from the registry, no further samples.
    assert!(harness.engine.active_clips(Seconds(1.0)).is_empty());
    assert!(harness.tick(2.0).is_empty());
}

#[test]
fn non_looping_clip_finishes_at_duration_and_goes_quiet() {
    let mut harness = Harness::new(small_show(vec![ramp_animation("ramp", 1.0, false)]));
    let clip_id = harness.trigger(&play_cue("c", "ramp", vec![1]), 0.0).unwrap();
    harness.tick(0.5);
    let terminal = harness.tick(1.5);
    assert!((update_for(&terminal, 1).unwrap().position.x - 1.0).abs() < 1e-9);
    assert!(harness.events().contains(&ClipEvent::Finished { clip_id }));
    assert!(harness.tick(1.6).is_empty());
    assert!(harness.tick(2.0).is_empty());
}

#[test]
fn change_suppression_emits_a_stationary_model_once() {
    let mut def = ramp_animation("still", 10.0, true);
    def.parameters.insert(
        "end".into(),
        ParamValue::Position {
            value: Position::ZERO,
        },
    );
    let mut harness = Harness::new(small_show(vec![def]));
    harness.trigger(&play_cue("c", "still", vec![1, 2]), 0.0).unwrap();
    let mut emissions_per_track = 0;
    for i in 0..30 {
        let updates = harness.tick(i as f64 / 60.0);
        emissions_per_track += update_for(&updates, 1).iter().count();
    }
    assert_eq!(emissions_per_track, 1);
}

#[test]
fn updates_are_emitted_in_ascending_track_order() {
    let mut harness = Harness::new(small_show(vec![base_animation("a", "circle")]));
    harness.trigger(&play_cue("c", "a", vec![3, 1, 2]), 0.0).unwrap();
    let updates = harness.tick(0.0);
    let order: Vec<TrackId> = updates.iter().map(|u| u.track).collect();
    assert_eq!(order, [TrackId(1), TrackId(2), TrackId(3)]);
}

#[test]
fn pause_freezes_progress_and_suppresses_emissions() {
    let mut harness = Harness::new(small_show(vec![ramp_animation("ramp", 10.0, true)]));
    let clip_id = harness.trigger(&play_cue("c", "ramp", vec![1]), 0.0).unwrap();
    harness.tick(1.0);
    harness.commands.pause_clip(clip_id);
    assert!(harness.tick(2.0).is_empty());
    let (state, progress) = harness
        .engine
        .clip_progress(clip_id, Seconds(3.0))
        .unwrap();
    assert_eq!(state, PlaybackState::Paused);
    assert!((progress - 0.2).abs() < 1e-6);
    harness.commands.resume_clip(clip_id);
    // Resumed at t=4 after pausing at t=2: two seconds of pause are skipped.
    let updates = harness.tick(4.0);
    assert!((update_for(&updates, 1).unwrap().position.x - 0.2).abs() < 1e-6);
}

#[test]
fn stop_all_stops_every_clip() {
    let mut harness = Harness::new(small_show(vec![base_animation("a", "circle")]));
    harness.trigger(&play_cue("c1", "a", vec![1]), 0.0).unwrap();
    harness.trigger(&play_cue("c2", "a", vec![2]), 0.0).unwrap();
    harness.tick(0.0);
    harness.commands.stop_all(None);
    harness.tick(1.0);
    assert!(harness.engine.active_clips(Seconds(1.0)).is_empty());
}

struct BrokenModel {
    metadata: ModelMetadata,
}

impl BrokenModel {
    fn new() -> Self {
        Self {
            metadata: ModelMetadata {
                tag: "broken",
                display_name: "Broken",
                category: ModelCategory::Procedural,
                params: vec![],
            },
        }
    }
}

impl AnimationModel for BrokenModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn evaluate(&self, _params: &ParamSet, _t: f64) -> Position {
        Position::new(f64::NAN, 0.0, 0.0)
    }
}

#[test]
fn non_finite_samples_are_suppressed_without_killing_the_clip() {
    let mut models = ModelRegistry::with_builtins();
    models.register(Arc::new(BrokenModel::new())).unwrap();
    let mut harness =
        Harness::with_models(small_show(vec![base_animation("b", "broken")]), models);
    let clip_id = harness.trigger(&play_cue("c", "b", vec![1]), 0.0).unwrap();
    let updates = harness.tick(0.0);
    assert!(updates.is_empty());
    assert!(harness.engine.non_finite_samples() > 0);
    // The clip is still alive and owning its track.
    assert_eq!(harness.owned_tracks(clip_id, 0.0), [TrackId(1)]);
}

#[test]
fn started_animator_streams_to_the_sink() {
    let sink = animator_engine::output::RecordingSink::new();
    let project = Project {
        tracks: vec![track(1, 0.0), track(2, 0.0)],
        animations: vec![base_animation("a", "circle")],
        presets: vec![],
        cues: vec![play_cue("go", "a", vec![1, 2])],
    };
    let mut animator = Animator::new(
        project,
        ModelRegistry::with_builtins(),
        EngineSettings::default(),
        Box::new(sink.clone()),
    )
    .unwrap();
    animator.start();
    animator.trigger_cue(&CueId::new("go")).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(200));
    assert_eq!(animator.active_clips().len(), 1);
    animator.stop();
    let messages = sink.messages();
    assert!(!messages.is_empty());
    assert!(messages.iter().any(|m| m.addr == "/track/1/xyz"));
    assert!(messages.iter().any(|m| m.addr == "/track/2/xyz"));
}

#[test]
fn facade_resolves_and_rejects_through_the_command_api() {
    let timeline = Arc::new(ManualTimeline::new());
    let mut cue = play_cue("go", "a", vec![1, 2]);
    cue.number = Some(1);
    let project = Project {
        tracks: vec![track(1, 0.0), track(2, 0.0)],
        animations: vec![base_animation("a", "circle")],
        presets: vec![],
        cues: vec![cue],
    };
    let animator = Animator::with_timeline(
        project,
        ModelRegistry::with_builtins(),
        EngineSettings::default(),
        Box::new(animator_engine::output::RecordingSink::new()),
        timeline.clone(),
    )
    .unwrap();

    assert_eq!(
        animator.trigger_cue(&CueId::new("missing")).unwrap_err(),
        TriggerError::UnknownCue
    );
    let clip_id = animator.trigger_cue(&CueId::new("go")).unwrap().unwrap();

    // Drive a tick by hand instead of starting the driver thread.
    timeline.set(Seconds(0.5));
    animator.shared_engine().lock().tick(Seconds(0.5));
    let clips = animator.active_clips();
    assert_eq!(clips.len(), 1);
    assert_eq!(clips[0].clip_id, clip_id);
    assert_eq!(clips[0].state, PlaybackState::Playing);
    assert_eq!(clips[0].owned_tracks, vec![TrackId(1), TrackId(2)]);
}
