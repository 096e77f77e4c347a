use crate::base::{resolve_cue, ProjectStore, ResolveContext};
use crate::model::ModelRegistry;
use crate::output::{OutputProcessor, OutputWorker, WireSink};
use crate::rt::{Engine, EngineCommandSender, EngineDriver, EngineSettings, SharedEngine};
use crate::timeline::{SteadyTimeline, Timeline};
use crate::{EngineResult, TriggerError};
use animator_api::persistence::{Cue, CueAction, CueId, Project, Seconds};
use animator_api::runtime::{ClipEvent, ClipId, ClipInfo, PlaybackState};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// The facade trigger sources and UIs talk to.
///
/// Owns the whole stack: project store, model registry, shared engine state, the tick thread
/// and the output thread. Trigger sources only ever see this narrow command surface; all
/// engine state mutation travels through the serialized command queue.
pub struct Animator {
    store: Arc<ProjectStore>,
    models: Arc<ModelRegistry>,
    timeline: Arc<dyn Timeline + Send + Sync>,
    shared_engine: SharedEngine,
    command_sender: EngineCommandSender,
    next_clip_id: AtomicU64,
    driver: EngineDriver,
    output: OutputProcessor,
}

impl std::fmt::Debug for Animator {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Animator")
            .field("driver", &self.driver)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl Animator {
    /// Builds the full stack against the steady wall clock. The sink is where computed
    /// positions end up, typically an [`crate::output::OscOutputDevice`].
    pub fn new(
        project: Project,
        models: ModelRegistry,
        settings: EngineSettings,
        sink: Box<dyn WireSink>,
    ) -> EngineResult<Self> {
        Self::with_timeline(project, models, settings, sink, Arc::new(SteadyTimeline::new()))
    }

    /// Like [`new`](Self::new) but against a caller-supplied timeline. Tests drive a manual
    /// one.
    pub fn with_timeline(
        project: Project,
        models: ModelRegistry,
        settings: EngineSettings,
        sink: Box<dyn WireSink>,
        timeline: Arc<dyn Timeline + Send + Sync>,
    ) -> EngineResult<Self> {
        let store = Arc::new(ProjectStore::load(project)?);
        // Saved definitions get checked up front so a bad one surfaces at load, not mid-show.
        // Triggering re-validates, so this is advisory only.
        for def in store.animations() {
            match models.get(&def.model) {
                None => warn!(
                    "animation `{}` references unknown model `{}`",
                    def.id, def.model
                ),
                Some(model) => {
                    if let Err(reason) = model.metadata().validate(&def.parameters) {
                        warn!("animation `{}` has invalid parameters: {reason}", def.id);
                    }
                }
            }
        }
        let (command_sender, command_receiver) =
            crossbeam_channel::bounded(settings.command_queue_capacity);
        let (batch_sender, batch_receiver) = crossbeam_channel::bounded(settings.sink_queue_capacity);
        let engine = Engine::new(settings.clone(), command_receiver, batch_sender);
        let shared_engine = SharedEngine::new(engine);
        let worker = OutputWorker::new(batch_receiver, sink, settings.sink_min_interval());
        let output = OutputProcessor::new(worker, timeline.clone());
        let driver = EngineDriver::new(shared_engine.clone(), timeline.clone());
        Ok(Self {
            store,
            models: Arc::new(models),
            timeline,
            shared_engine,
            command_sender: EngineCommandSender::new(command_sender),
            next_clip_id: AtomicU64::new(1),
            driver,
            output,
        })
    }

    /// Starts the tick and output threads.
    pub fn start(&mut self) {
        self.output.start();
        self.driver.start();
    }

    /// Stops the tick and output threads. Idempotent.
    pub fn stop(&mut self) {
        self.driver.stop();
        self.output.stop();
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// Fires a cue by id.
    ///
    /// Play cues return the handle of the new clip; control cues (Stop/Pause/Fade) return
    /// `None`. Rejection leaves the engine untouched.
    pub fn trigger_cue(&self, cue_id: &CueId) -> Result<Option<ClipId>, TriggerError> {
        let cue = self.store.cue(cue_id).ok_or(TriggerError::UnknownCue)?.clone();
        self.trigger(&cue)
    }

    /// Fires a cue record directly (for trigger sources that carry their own cue data).
    pub fn trigger(&self, cue: &Cue) -> Result<Option<ClipId>, TriggerError> {
        if !cue.enabled {
            return Err(TriggerError::DisabledCue);
        }
        match cue.action {
            CueAction::Play => {
                let clip_id = ClipId(self.next_clip_id.fetch_add(1, Ordering::Relaxed));
                let ctx = ResolveContext {
                    store: &self.store,
                    models: &self.models,
                };
                let args = resolve_cue(&ctx, cue, clip_id, self.timeline.cursor_pos())?;
                self.command_sender.start_clip(Box::new(args));
                Ok(Some(clip_id))
            }
            CueAction::Stop => {
                self.command_sender.stop_cue(cue.id.clone(), Some(Seconds::ZERO));
                Ok(None)
            }
            CueAction::Pause => {
                self.command_sender.pause_cue(cue.id.clone());
                Ok(None)
            }
            CueAction::Fade => {
                self.command_sender.stop_cue(cue.id.clone(), cue.fade_time);
                Ok(None)
            }
        }
    }

    pub fn stop_clip(&self, clip_id: ClipId, fade_time: Option<Seconds>) {
        self.command_sender.stop_clip(clip_id, fade_time);
    }

    pub fn pause_clip(&self, clip_id: ClipId) {
        self.command_sender.pause_clip(clip_id);
    }

    pub fn resume_clip(&self, clip_id: ClipId) {
        self.command_sender.resume_clip(clip_id);
    }

    pub fn stop_all(&self, fade_time: Option<Seconds>) {
        self.command_sender.stop_all(fade_time);
    }

    pub fn active_clips(&self) -> Vec<ClipInfo> {
        self.shared_engine
            .lock()
            .active_clips(self.timeline.cursor_pos())
    }

    pub fn clip_progress(&self, clip_id: ClipId) -> EngineResult<(PlaybackState, f64)> {
        self.shared_engine
            .lock()
            .clip_progress(clip_id, self.timeline.cursor_pos())
    }

    /// Registers a lifecycle event subscriber. Callbacks run on the engine thread and must be
    /// quick.
    pub fn subscribe_clip_events(&self, subscriber: impl Fn(&ClipEvent) + Send + 'static) {
        self.shared_engine.lock().subscribe(Box::new(subscriber));
    }

    /// The raw command surface, for hosts that wire their own trigger plumbing.
    pub fn command_sender(&self) -> &EngineCommandSender {
        &self.command_sender
    }

    /// The shared engine handle, for hosts that drive ticks themselves instead of starting
    /// the built-in driver.
    pub fn shared_engine(&self) -> &SharedEngine {
        &self.shared_engine
    }

    pub fn timeline(&self) -> &Arc<dyn Timeline + Send + Sync> {
        &self.timeline
    }
}

impl Drop for Animator {
    fn drop(&mut self) {
        self.stop();
    }
}
