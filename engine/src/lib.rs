//! The animation orchestration core of a spatial-audio show-control system.
//!
//! Trigger sources (manual UI, timeline scheduler, inbound OSC dispatcher) fire cues through the
//! [`Animator`] facade; the engine resolves each cue into a playback over a set of tracks,
//! arbitrates track ownership under latest-takes-precedence, evaluates declarative animation
//! models on a fixed-rate tick and hands position batches to an outbound OSC sink.

mod metrics_util;
mod mutex_util;

pub mod model;
pub mod output;
pub mod timeline;
pub mod transform;

mod base;
mod error;
mod rt;

pub use base::*;
pub use error::*;
pub use rt::*;

pub use metrics_util::measure_time;

/// Result alias for engine-internal fallible operations.
pub type EngineResult<T> = Result<T, &'static str>;

/// Must be called as early as possible, before creating an [`Animator`].
pub fn init() {
    metrics_util::init_metrics();
}
