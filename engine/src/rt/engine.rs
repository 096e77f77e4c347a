use crate::mutex_util::recovering_lock;
use crate::output::{PositionUpdate, WireBatch};
use crate::rt::{arbiter, Clip, ExecutionRegistry};
use crate::EngineResult;
use animator_api::persistence::{CueId, Position, Seconds, TrackId};
use animator_api::runtime::{ClipEvent, ClipId, ClipInfo, PlaybackState, ReleaseReason};
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Engine tuning knobs. Everything has a sensible show-control default.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    /// Target tick interval in milliseconds. 60 Hz by default.
    pub tick_interval_ms: f64,
    /// Per-axis change-suppression epsilon in meters.
    pub suppression_epsilon: f64,
    /// Minimum interval between two sink sends, in milliseconds.
    pub sink_min_interval_ms: f64,
    /// Capacity of the bounded engine-to-sink batch queue.
    pub sink_queue_capacity: usize,
    /// Capacity of the bounded trigger command queue.
    pub command_queue_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000.0 / 60.0,
            suppression_epsilon: 1e-4,
            sink_min_interval_ms: 20.0,
            sink_queue_capacity: 64,
            command_queue_capacity: 256,
        }
    }
}

impl EngineSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.tick_interval_ms.max(1.0) / 1000.0)
    }

    pub fn sink_min_interval(&self) -> Seconds {
        Seconds(self.sink_min_interval_ms.max(0.0) / 1000.0)
    }
}

/// A fully resolved trigger, ready for arbitration on the engine thread.
#[derive(Debug)]
pub struct StartClipArgs {
    pub clip: Clip,
    /// Structural warnings collected during resolution (e.g. a reduced formation), emitted to
    /// subscribers when the clip is integrated.
    pub warnings: Vec<ClipEvent>,
}

#[derive(Debug)]
pub enum EngineCommand {
    // Boxed because comparatively large.
    StartClip(Box<StartClipArgs>),
    StopClip {
        clip_id: ClipId,
        fade_time: Option<Seconds>,
    },
    PauseClip {
        clip_id: ClipId,
    },
    ResumeClip {
        clip_id: ClipId,
    },
    StopCue {
        cue_id: CueId,
        fade_time: Option<Seconds>,
    },
    PauseCue {
        cue_id: CueId,
    },
    StopAll {
        fade_time: Option<Seconds>,
    },
}

/// Thread-safe handle for enqueueing commands; they are applied in arrival order at the head
/// of the next tick.
#[derive(Clone, Debug)]
pub struct EngineCommandSender {
    command_sender: Sender<EngineCommand>,
}

impl EngineCommandSender {
    pub fn new(command_sender: Sender<EngineCommand>) -> Self {
        Self { command_sender }
    }

    pub fn start_clip(&self, args: Box<StartClipArgs>) {
        self.send(EngineCommand::StartClip(args));
    }

    pub fn stop_clip(&self, clip_id: ClipId, fade_time: Option<Seconds>) {
        self.send(EngineCommand::StopClip { clip_id, fade_time });
    }

    pub fn pause_clip(&self, clip_id: ClipId) {
        self.send(EngineCommand::PauseClip { clip_id });
    }

    pub fn resume_clip(&self, clip_id: ClipId) {
        self.send(EngineCommand::ResumeClip { clip_id });
    }

    pub fn stop_cue(&self, cue_id: CueId, fade_time: Option<Seconds>) {
        self.send(EngineCommand::StopCue { cue_id, fade_time });
    }

    pub fn pause_cue(&self, cue_id: CueId) {
        self.send(EngineCommand::PauseCue { cue_id });
    }

    pub fn stop_all(&self, fade_time: Option<Seconds>) {
        self.send(EngineCommand::StopAll { fade_time });
    }

    fn send(&self, command: EngineCommand) {
        if self.command_sender.try_send(command).is_err() {
            warn!("engine command queue full, command dropped");
        }
    }
}

type EventSubscriber = Box<dyn Fn(&ClipEvent) + Send>;

/// The orchestration engine: registry, arbitration and the per-tick evaluation loop.
///
/// All mutation happens on one logical thread (the tick thread draining the command queue);
/// other threads only read through [`SharedEngine`] between ticks.
pub struct Engine {
    settings: EngineSettings,
    registry: ExecutionRegistry,
    command_receiver: Receiver<EngineCommand>,
    batch_sender: Sender<WireBatch>,
    subscribers: Vec<EventSubscriber>,
    /// Last emitted value per track, for change suppression. Kept across ownership changes.
    last_emitted: BTreeMap<TrackId, Position>,
    non_finite_samples: u64,
    dropped_batches: u64,
    tick_index: u64,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Engine")
            .field("settings", &self.settings)
            .field("clips", &self.registry.len())
            .field("tick_index", &self.tick_index)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        command_receiver: Receiver<EngineCommand>,
        batch_sender: Sender<WireBatch>,
    ) -> Self {
        Self {
            settings,
            registry: ExecutionRegistry::new(),
            command_receiver,
            batch_sender,
            subscribers: Vec::new(),
            last_emitted: BTreeMap::new(),
            non_finite_samples: 0,
            dropped_batches: 0,
            tick_index: 0,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn subscribe(&mut self, subscriber: EventSubscriber) {
        self.subscribers.push(subscriber);
    }

    pub fn active_clips(&self, now: Seconds) -> Vec<ClipInfo> {
        self.registry.infos(now)
    }

    pub fn clip_progress(&self, clip_id: ClipId, now: Seconds) -> EngineResult<(PlaybackState, f64)> {
        let clip = self.registry.get(clip_id)?;
        Ok((clip.playback_state(), clip.progress(now)))
    }

    pub fn non_finite_samples(&self) -> u64 {
        self.non_finite_samples
    }

    pub fn dropped_batches(&self) -> u64 {
        self.dropped_batches
    }

    pub fn tick_index(&self) -> u64 {
        self.tick_index
    }

    /// One iteration of the evaluation loop.
    ///
    /// Drains pending commands, evaluates every playing clip over its owned tracks in
    /// ascending track order, suppresses unchanged values, hands the batch to the sink queue
    /// and removes finished clips before returning.
    pub fn tick(&mut self, now: Seconds) {
        self.tick_index += 1;
        self.process_commands(now);

        let mut updates: BTreeMap<TrackId, PositionUpdate> = BTreeMap::new();
        let mut finishing: Vec<ClipId> = Vec::new();
        for clip in self.registry.clips() {
            if clip.is_finished() {
                finishing.push(clip.id());
                continue;
            }
            if clip.owned_tracks().is_empty() {
                // Nothing left to drive; a silent fade-out is not worth waiting for.
                finishing.push(clip.id());
                continue;
            }
            let Some(plan) = clip.plan(now) else {
                continue;
            };
            for &track in clip.owned_tracks() {
                match clip.track_position(&plan, track) {
                    Ok(position) if position.is_finite() => {
                        if self.suppressed(track, position) {
                            continue;
                        }
                        updates.insert(
                            track,
                            PositionUpdate {
                                track,
                                position,
                                format: clip.animation().wire_format,
                            },
                        );
                    }
                    Ok(_) => {
                        // Track holds its last value; the clip keeps running.
                        self.non_finite_samples += 1;
                        crate::metrics_util::count("animator.engine.non_finite_samples");
                        warn!(
                            "model `{}` produced a non-finite sample for track {track}",
                            clip.animation().model.metadata().tag
                        );
                    }
                    Err(e) => {
                        warn!("skipping sample for track {track} of clip {}: {e}", clip.id());
                    }
                }
            }
            if plan.finishes {
                finishing.push(clip.id());
            }
        }

        if !updates.is_empty() {
            let batch: WireBatch = updates.values().copied().collect();
            match self.batch_sender.try_send(batch) {
                Ok(()) => {
                    for (track, update) in updates {
                        self.last_emitted.insert(track, update.position);
                    }
                }
                Err(_) => {
                    // The worker will see these values again next tick; re-emission beats
                    // losing the final sample.
                    self.dropped_batches += 1;
                    crate::metrics_util::count("animator.engine.dropped_batches");
                    debug!("sink queue full, batch dropped");
                }
            }
        }

        for clip_id in finishing {
            self.finish_clip(clip_id);
        }
        self.registry.take_finished();
    }

    fn suppressed(&self, track: TrackId, position: Position) -> bool {
        let Some(last) = self.last_emitted.get(&track) else {
            return false;
        };
        let epsilon = self.settings.suppression_epsilon;
        (position.x - last.x).abs() <= epsilon
            && (position.y - last.y).abs() <= epsilon
            && (position.z - last.z).abs() <= epsilon
    }

    fn finish_clip(&mut self, clip_id: ClipId) {
        let Ok(clip) = self.registry.get_mut(clip_id) else {
            return;
        };
        let released = clip.owned_tracks().to_vec();
        let reason = clip.release_reason();
        clip.finish();
        if !released.is_empty() {
            self.broadcast(&ClipEvent::TracksReleased {
                clip_id,
                tracks: released,
                reason,
            });
        }
        self.broadcast(&ClipEvent::Finished { clip_id });
    }

    fn process_commands(&mut self, now: Seconds) {
        while let Ok(command) = self.command_receiver.try_recv() {
            use EngineCommand::*;
            match command {
                StartClip(args) => {
                    self.start_clip(*args, now);
                }
                StopClip { clip_id, fade_time } => {
                    let _ = self.stop_clip(clip_id, fade_time, now);
                }
                PauseClip { clip_id } => {
                    if let Ok(clip) = self.registry.get_mut(clip_id) {
                        clip.pause(now);
                    }
                }
                ResumeClip { clip_id } => {
                    if let Ok(clip) = self.registry.get_mut(clip_id) {
                        clip.resume(now);
                    }
                }
                StopCue { cue_id, fade_time } => {
                    for clip_id in self.registry.ids_for_cue(&cue_id) {
                        let _ = self.stop_clip(clip_id, fade_time, now);
                    }
                }
                PauseCue { cue_id } => {
                    self.toggle_cue_pause(&cue_id, now);
                }
                StopAll { fade_time } => {
                    for clip_id in self.registry.ids() {
                        let _ = self.stop_clip(clip_id, fade_time, now);
                    }
                }
            }
        }
    }

    fn start_clip(&mut self, args: StartClipArgs, now: Seconds) {
        let StartClipArgs { clip, warnings } = args;
        for warning in &warnings {
            self.broadcast(warning);
        }
        let clip_id = clip.id();
        let cue_id = clip.cue_id().clone();
        let tracks = clip.owned_tracks().to_vec();
        let takeovers = arbiter::integrate(&mut self.registry, clip, now);
        for takeover in takeovers {
            self.broadcast(&ClipEvent::TracksReleased {
                clip_id: takeover.clip_id,
                tracks: takeover.tracks,
                reason: ReleaseReason::Ltp,
            });
        }
        self.broadcast(&ClipEvent::Started {
            clip_id,
            cue_id,
            tracks,
        });
    }

    fn stop_clip(
        &mut self,
        clip_id: ClipId,
        fade_time: Option<Seconds>,
        now: Seconds,
    ) -> EngineResult<()> {
        let clip = self.registry.get_mut(clip_id)?;
        let fade = clip.stop_fade(fade_time);
        clip.begin_stop(now, fade);
        Ok(())
    }

    fn toggle_cue_pause(&mut self, cue_id: &CueId, now: Seconds) {
        let clip_ids = self.registry.ids_for_cue(cue_id);
        let any_running = clip_ids.iter().any(|&id| {
            self.registry
                .get(id)
                .map(|c| c.playback_state() == PlaybackState::Playing)
                .unwrap_or(false)
        });
        for clip_id in clip_ids {
            if let Ok(clip) = self.registry.get_mut(clip_id) {
                if any_running {
                    clip.pause(now);
                } else {
                    clip.resume(now);
                }
            }
        }
    }

    fn broadcast(&self, event: &ClipEvent) {
        for subscriber in &self.subscribers {
            subscriber(event);
        }
    }
}

/// Shared handle to the engine: the tick thread locks it once per tick, UI threads lock it
/// read-only between ticks.
#[derive(Clone, Debug)]
pub struct SharedEngine(Arc<Mutex<Engine>>);

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        Self(Arc::new(Mutex::new(engine)))
    }

    pub fn lock(&self) -> MutexGuard<Engine> {
        recovering_lock(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: EngineSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, EngineSettings::default());
        let settings: EngineSettings =
            serde_json::from_str(r#"{ "tick_interval_ms": 10.0 }"#).unwrap();
        assert_eq!(settings.tick_interval(), Duration::from_millis(10));
        assert_eq!(settings.suppression_epsilon, 1e-4);
        assert!(serde_json::from_str::<EngineSettings>(r#"{ "tick_rate": 60 }"#).is_err());
    }

    #[test]
    fn full_command_queue_drops_instead_of_blocking() {
        let (sender, _receiver) = crossbeam_channel::bounded(1);
        let sender = EngineCommandSender::new(sender);
        sender.stop_all(None);
        // Queue is full now; further sends must not block or panic.
        sender.stop_all(None);
        sender.pause_clip(ClipId(1));
    }
}
