//! The engine's notion of time.
//!
//! Clip phase is computed from wall-clock deltas, never from tick counts, so a missed tick only
//! skips a position sample and never slows an animation down.

use animator_api::persistence::Seconds;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub trait Timeline {
    /// Monotonic position on this timeline, in seconds.
    fn cursor_pos(&self) -> Seconds;
}

/// Steady wall-clock timeline anchored at construction time.
///
/// Cheap to clone; all clones share the same anchor, so trigger sources and the tick thread see
/// the same time base.
#[derive(Copy, Clone, Debug)]
pub struct SteadyTimeline {
    anchor: Instant,
}

impl SteadyTimeline {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
        }
    }
}

impl Default for SteadyTimeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline for SteadyTimeline {
    fn cursor_pos(&self) -> Seconds {
        Seconds(self.anchor.elapsed().as_secs_f64())
    }
}

/// Hand-cranked timeline for deterministic tests.
#[derive(Clone, Debug, Default)]
pub struct ManualTimeline {
    pos_bits: Arc<AtomicU64>,
}

impl ManualTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, pos: Seconds) {
        self.pos_bits.store(pos.get().to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, delta: Seconds) {
        self.set(Seconds(self.cursor_pos().get() + delta.get()));
    }
}

impl Timeline for ManualTimeline {
    fn cursor_pos(&self) -> Seconds {
        Seconds(f64::from_bits(self.pos_bits.load(Ordering::Relaxed)))
    }
}
