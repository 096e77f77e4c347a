use crate::metrics_util::measure_time;
use crate::rt::SharedEngine;
use crate::timeline::Timeline;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::warn;

/// Fixed-rate tick thread.
///
/// Sleep-until-deadline against a monotonic clock; when a tick overruns, the schedule is
/// re-anchored instead of trying to catch up, so a stall skips samples but never bursts.
pub struct EngineDriver {
    engine: SharedEngine,
    timeline: Arc<dyn Timeline + Send + Sync>,
    state: DriverState,
}

impl std::fmt::Debug for EngineDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("EngineDriver")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

enum DriverState {
    Stopped,
    Running {
        request_stop: Arc<AtomicBool>,
        join_handle: JoinHandle<()>,
    },
}

impl std::fmt::Debug for DriverState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            DriverState::Stopped => "Stopped",
            DriverState::Running { .. } => "Running",
        };
        f.write_str(name)
    }
}

impl EngineDriver {
    pub fn new(engine: SharedEngine, timeline: Arc<dyn Timeline + Send + Sync>) -> Self {
        Self {
            engine,
            timeline,
            state: DriverState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, DriverState::Running { .. })
    }

    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let interval = self.engine.lock().settings().tick_interval();
        let engine = self.engine.clone();
        let timeline = self.timeline.clone();
        let request_stop = Arc::new(AtomicBool::new(false));
        let request_stop_clone = request_stop.clone();
        let join_handle = std::thread::Builder::new()
            .name("animator tick".to_owned())
            .spawn(move || {
                let mut deadline = Instant::now() + interval;
                while !request_stop_clone.load(Ordering::SeqCst) {
                    let now = timeline.cursor_pos();
                    measure_time("animator.engine.tick", || engine.lock().tick(now));
                    let behind = Instant::now();
                    if deadline > behind {
                        std::thread::sleep(deadline - behind);
                        deadline += interval;
                    } else {
                        deadline = behind + interval;
                    }
                }
            })
            .expect("failed to spawn tick thread");
        self.state = DriverState::Running {
            request_stop,
            join_handle,
        };
    }

    pub fn stop(&mut self) {
        let state = mem::replace(&mut self.state, DriverState::Stopped);
        if let DriverState::Running {
            request_stop,
            join_handle,
        } = state
        {
            request_stop.store(true, Ordering::SeqCst);
            if join_handle.join().is_err() {
                warn!("tick thread panicked");
            }
        }
    }
}

impl Drop for EngineDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
