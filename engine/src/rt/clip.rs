use crate::model::{AnimationModel, ParamSet};
use crate::transform::{apply_time_policy, shift_clamped, ResolvedTransform};
use crate::EngineResult;
use animator_api::persistence::{
    AnimationId, CueId, Easing, Fade, Position, Seconds, TrackId, WireFormat,
};
use animator_api::runtime::{ClipId, ClipInfo, PlaybackState, ReleaseReason};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A fully resolved animation, immutable for the lifetime of every clip that references it.
///
/// Per-playback filtering happens by restricting the clip's owned track set, never by mutating
/// anything in here.
pub struct ResolvedAnimation {
    pub id: AnimationId,
    pub model: Arc<dyn AnimationModel>,
    pub params: ParamSet,
    pub duration: Seconds,
    pub looped: bool,
    pub ping_pong: bool,
    pub transform: ResolvedTransform,
    pub fade_in: Option<Fade>,
    pub fade_out: Option<Fade>,
    pub wire_format: WireFormat,
}

impl fmt::Debug for ResolvedAnimation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ResolvedAnimation")
            .field("id", &self.id)
            .field("model", &self.model.metadata().tag)
            .field("duration", &self.duration)
            .field("looped", &self.looped)
            .field("ping_pong", &self.ping_pong)
            .finish_non_exhaustive()
    }
}

#[derive(Copy, Clone, Debug)]
struct StopState {
    /// Clip-local time at which the stop was requested; the fade-out curve runs from here in
    /// clip-local time, so pausing freezes it.
    local_time: f64,
    fade: Option<Fade>,
}

/// What one clip does on one tick: computed once, applied per owned track.
#[derive(Copy, Clone, Debug)]
pub struct TickPlan {
    /// Effective clip time after the loop/ping-pong policy.
    pub effective: f64,
    /// Fade-in blend factor, if a fade-in is active.
    pub fade_in: Option<f64>,
    /// Fade-out blend factor, if a fade-out is running.
    pub fade_out: Option<f64>,
    /// True when this tick emits the clip's terminal samples.
    pub finishes: bool,
}

/// A live playback: one cue execution over a set of owned tracks.
///
/// The playback state is carried as plain data (`paused_at`, `stop`, `finished`); the
/// Playing/Paused/Stopping/Finished lifecycle state is derived from it in
/// [`Clip::playback_state`].
#[derive(Debug)]
pub struct Clip {
    id: ClipId,
    cue_id: CueId,
    /// Reserved for a future priority-over-LTP rule; not consulted by arbitration yet.
    priority: i32,
    animation: Arc<ResolvedAnimation>,
    /// Currently owned tracks, ascending.
    owned_tracks: Vec<TrackId>,
    /// The cue's ordered track list as requested; phase indices stay stable across releases.
    request_order: Vec<TrackId>,
    /// Resting position per requested track, for fade blending.
    initial_positions: BTreeMap<TrackId, Position>,
    start: Seconds,
    pause_accumulated: f64,
    paused_at: Option<Seconds>,
    stop: Option<StopState>,
    finished: bool,
}

impl Clip {
    pub fn new(
        id: ClipId,
        cue_id: CueId,
        priority: i32,
        animation: Arc<ResolvedAnimation>,
        tracks_in_request_order: Vec<TrackId>,
        initial_positions: BTreeMap<TrackId, Position>,
        start: Seconds,
    ) -> Self {
        let mut owned_tracks = tracks_in_request_order.clone();
        owned_tracks.sort_unstable();
        owned_tracks.dedup();
        Self {
            id,
            cue_id,
            priority,
            animation,
            owned_tracks,
            request_order: tracks_in_request_order,
            initial_positions,
            start,
            pause_accumulated: 0.0,
            paused_at: None,
            stop: None,
            finished: false,
        }
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn cue_id(&self) -> &CueId {
        &self.cue_id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn animation(&self) -> &Arc<ResolvedAnimation> {
        &self.animation
    }

    pub fn owned_tracks(&self) -> &[TrackId] {
        &self.owned_tracks
    }

    pub fn release_tracks(&mut self, tracks: &[TrackId]) {
        self.owned_tracks.retain(|t| !tracks.contains(t));
    }

    pub fn playback_state(&self) -> PlaybackState {
        if self.finished {
            PlaybackState::Finished
        } else if self.paused_at.is_some() {
            PlaybackState::Paused
        } else if self.stop.is_some() {
            PlaybackState::Stopping
        } else {
            PlaybackState::Playing
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Clip-local time: wall time minus start minus accumulated pause time. Frozen while
    /// paused.
    pub fn local_time(&self, now: Seconds) -> f64 {
        let reference = self.paused_at.unwrap_or(now);
        (reference.get() - self.start.get() - self.pause_accumulated).max(0.0)
    }

    pub fn pause(&mut self, now: Seconds) {
        if self.finished || self.paused_at.is_some() {
            return;
        }
        self.paused_at = Some(now);
    }

    pub fn resume(&mut self, now: Seconds) {
        if let Some(paused_at) = self.paused_at.take() {
            self.pause_accumulated += (now.get() - paused_at.get()).max(0.0);
        }
    }

    /// Marks the clip as stopping. Idempotent; a second stop keeps the earlier fade.
    pub fn begin_stop(&mut self, now: Seconds, fade: Option<Fade>) {
        if self.finished || self.stop.is_some() {
            return;
        }
        self.stop = Some(StopState {
            local_time: self.local_time(now),
            fade,
        });
    }

    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// The fade to use for a stop request, combining the request's fade time with the
    /// animation's fade-out definition. An explicit zero means an immediate stop.
    pub fn stop_fade(&self, requested: Option<Seconds>) -> Option<Fade> {
        match (requested, self.animation.fade_out) {
            (Some(time), _) if time.get() <= 0.0 => None,
            (Some(time), Some(defined)) => Some(Fade {
                duration: time,
                easing: defined.easing,
            }),
            (Some(time), None) => Some(Fade {
                duration: time,
                easing: Easing::Linear,
            }),
            (None, defined) => defined,
        }
    }

    /// Why this clip's remaining tracks are released when it finishes.
    pub fn release_reason(&self) -> ReleaseReason {
        if self.stop.is_some() {
            ReleaseReason::Stopped
        } else {
            ReleaseReason::Finished
        }
    }

    /// Computes what this clip does at `now`. Returns `None` when nothing is to be emitted
    /// (paused or already finished).
    pub fn plan(&self, now: Seconds) -> Option<TickPlan> {
        if self.finished || self.paused_at.is_some() {
            return None;
        }
        let local = self.local_time(now);
        let policy = apply_time_policy(
            local,
            self.animation.duration.get(),
            self.animation.looped,
            self.animation.ping_pong,
        );
        let fade_in = self.animation.fade_in.and_then(|fade| {
            if fade.duration.get() <= 0.0 || local >= fade.duration.get() {
                None
            } else {
                Some(fade.easing.apply(local / fade.duration.get()))
            }
        });
        let (fade_out, stop_finishes) = match self.stop {
            None => (None, false),
            Some(StopState { fade: None, .. }) => (None, true),
            Some(StopState {
                local_time,
                fade: Some(fade),
            }) => {
                if fade.duration.get() <= 0.0 {
                    (None, true)
                } else {
                    let progress = (local - local_time) / fade.duration.get();
                    (
                        Some(fade.easing.apply(progress.min(1.0))),
                        progress >= 1.0,
                    )
                }
            }
        };
        Some(TickPlan {
            effective: policy.effective,
            fade_in,
            fade_out,
            finishes: policy.finishes || stop_finishes,
        })
    }

    /// Final position for one owned track under the given plan.
    pub fn track_position(&self, plan: &TickPlan, track: TrackId) -> EngineResult<Position> {
        let index = self
            .request_order
            .iter()
            .position(|&t| t == track)
            .unwrap_or(0);
        let transform = &self.animation.transform;
        let track_time = shift_clamped(plan.effective, transform.time_shift(track, index));
        let normalized = (track_time / self.animation.duration.get()).clamp(0.0, 1.0);
        let base = self.animation.model.evaluate(&self.animation.params, normalized);
        let mut position = base + transform.spatial_offset(track)?;
        let initial = self
            .initial_positions
            .get(&track)
            .copied()
            .unwrap_or(Position::ZERO);
        if let Some(factor) = plan.fade_in {
            position = initial.lerp(position, factor);
        }
        if let Some(factor) = plan.fade_out {
            position = position.lerp(initial, factor);
        }
        Ok(position)
    }

    /// Normalized progress within the current cycle.
    pub fn progress(&self, now: Seconds) -> f64 {
        let policy = apply_time_policy(
            self.local_time(now),
            self.animation.duration.get(),
            self.animation.looped,
            self.animation.ping_pong,
        );
        (policy.effective / self.animation.duration.get()).clamp(0.0, 1.0)
    }

    pub fn info(&self, now: Seconds) -> ClipInfo {
        ClipInfo {
            clip_id: self.id,
            cue_id: self.cue_id.clone(),
            animation_id: self.animation.id.clone(),
            state: self.playback_state(),
            progress: self.progress(now),
            owned_tracks: self.owned_tracks.clone(),
        }
    }
}
