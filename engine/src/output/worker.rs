use crate::output::{track_messages, PositionUpdate, WireBatch, WireSink};
use crate::timeline::Timeline;
use animator_api::persistence::{Position, Seconds, TrackId};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::collections::BTreeMap;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::warn;

/// Coalesces engine batches per track and feeds the sink at a bounded rate.
///
/// The pending map always holds the most recent value per track, so arriving faster than the
/// sink interval drops older values per track, never duplicates and never reorders a track's
/// sequence.
pub struct OutputWorker {
    batch_receiver: Receiver<WireBatch>,
    sink: Box<dyn WireSink>,
    /// Minimum time between two sends, in seconds.
    min_interval: f64,
    pending: BTreeMap<TrackId, PositionUpdate>,
    last_sent: BTreeMap<TrackId, Position>,
    last_flush: Option<f64>,
    failed_sends: u64,
}

impl OutputWorker {
    pub fn new(
        batch_receiver: Receiver<WireBatch>,
        sink: Box<dyn WireSink>,
        min_interval: Seconds,
    ) -> Self {
        Self {
            batch_receiver,
            sink,
            min_interval: min_interval.get().max(0.0),
            pending: BTreeMap::new(),
            last_sent: BTreeMap::new(),
            last_flush: None,
            failed_sends: 0,
        }
    }

    /// Absorbs everything currently queued and flushes if the interval allows.
    pub fn cycle(&mut self, now: Seconds) {
        while let Ok(batch) = self.batch_receiver.try_recv() {
            self.absorb(batch);
        }
        self.maybe_flush(now);
    }

    /// Like [`cycle`](Self::cycle), but parks on the queue for up to `timeout` first. Returns
    /// false when the sending side is gone.
    pub fn cycle_blocking(&mut self, now: Seconds, timeout: Duration) -> bool {
        match self.batch_receiver.recv_timeout(timeout) {
            Ok(batch) => self.absorb(batch),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return false,
        }
        self.cycle(now);
        true
    }

    fn absorb(&mut self, batch: WireBatch) {
        for update in batch {
            self.pending.insert(update.track, update);
        }
    }

    fn maybe_flush(&mut self, now: Seconds) {
        if self.pending.is_empty() {
            return;
        }
        if let Some(last) = self.last_flush {
            if now.get() - last < self.min_interval {
                return;
            }
        }
        let messages: Vec<_> = self
            .pending
            .values()
            .flat_map(|update| track_messages(update, self.last_sent.get(&update.track).copied()))
            .collect();
        match self.sink.send_batch(messages) {
            Ok(()) => {
                for (track, update) in mem::take(&mut self.pending) {
                    self.last_sent.insert(track, update.position);
                }
                self.last_flush = Some(now.get());
            }
            Err(e) => {
                // Transient: keep the pending values (newer ones coalesce in) and try again
                // after the next interval.
                self.failed_sends += 1;
                crate::metrics_util::count("animator.output.failed_sends");
                warn!("sink rejected batch: {e}");
                self.last_flush = Some(now.get());
            }
        }
    }

    pub fn failed_sends(&self) -> u64 {
        self.failed_sends
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Runs an [`OutputWorker`] on its own thread.
#[derive(Debug)]
pub struct OutputProcessor {
    state: State,
}

enum State {
    Stopped(StoppedState),
    Starting,
    Running(RunningState),
    Stopping,
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            State::Stopped(_) => "Stopped",
            State::Starting => "Starting",
            State::Running(_) => "Running",
            State::Stopping => "Stopping",
        };
        f.write_str(name)
    }
}

struct StoppedState {
    worker: OutputWorker,
    timeline: Arc<dyn Timeline + Send + Sync>,
}

struct RunningState {
    request_stop: Arc<AtomicBool>,
    join_handle: JoinHandle<OutputWorker>,
    timeline: Arc<dyn Timeline + Send + Sync>,
}

impl OutputProcessor {
    pub fn new(worker: OutputWorker, timeline: Arc<dyn Timeline + Send + Sync>) -> Self {
        Self {
            state: State::Stopped(StoppedState { worker, timeline }),
        }
    }

    pub fn start(&mut self) {
        if !matches!(&self.state, State::Stopped(_)) {
            return;
        }
        let state = if let State::Stopped(s) = mem::replace(&mut self.state, State::Starting) {
            s
        } else {
            unreachable!("output processor was not stopped");
        };
        let StoppedState {
            mut worker,
            timeline,
        } = state;
        let request_stop = Arc::new(AtomicBool::new(false));
        let request_stop_clone = request_stop.clone();
        let thread_timeline = timeline.clone();
        let join_handle = std::thread::Builder::new()
            .name("animator OSC output".to_owned())
            .spawn(move || {
                while !request_stop_clone.load(Ordering::SeqCst) {
                    let now = thread_timeline.cursor_pos();
                    if !worker.cycle_blocking(now, Duration::from_millis(5)) {
                        break;
                    }
                }
                worker
            })
            .expect("failed to spawn OSC output thread");
        self.state = State::Running(RunningState {
            request_stop,
            join_handle,
            timeline,
        });
    }

    pub fn stop(&mut self) {
        if !matches!(&self.state, State::Running(_)) {
            return;
        }
        let state = if let State::Running(s) = mem::replace(&mut self.state, State::Stopping) {
            s
        } else {
            unreachable!("output processor was not running");
        };
        state.request_stop.store(true, Ordering::SeqCst);
        match state.join_handle.join() {
            Ok(worker) => {
                self.state = State::Stopped(StoppedState {
                    worker,
                    timeline: state.timeline,
                });
            }
            Err(_) => {
                warn!("OSC output thread panicked");
                self.state = State::Stopping;
            }
        }
    }
}
