//! Runtime types shared between the engine and its UI/remote consumers.

use crate::persistence::{AnimationId, CueId, TrackId};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identifier of a live playback.
///
/// Strictly increasing; arbitration ties break toward the higher id.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClipId(pub u64);

/// Lifecycle state of a playback.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopping,
    Finished,
}

/// UI feedback snapshot of one playback.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ClipInfo {
    pub clip_id: ClipId,
    pub cue_id: CueId,
    pub animation_id: AnimationId,
    pub state: PlaybackState,
    /// Normalized progress within the current cycle, in `[0, 1]`.
    pub progress: f64,
    pub owned_tracks: Vec<TrackId>,
}

/// Why a playback lost tracks.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum ReleaseReason {
    /// A later trigger took the tracks over.
    Ltp,
    /// The playback reached its end.
    Finished,
    /// The playback was stopped.
    Stopped,
}

/// Lifecycle event emitted by the engine.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ClipEvent {
    Started {
        clip_id: ClipId,
        cue_id: CueId,
        tracks: Vec<TrackId>,
    },
    TracksReleased {
        clip_id: ClipId,
        tracks: Vec<TrackId>,
        reason: ReleaseReason,
    },
    /// Structural warning: a formation cue proceeded with fewer tracks than the saved cohort.
    FormationReduced {
        cue_id: CueId,
        requested: Vec<TrackId>,
        retained: Vec<TrackId>,
    },
    Finished {
        clip_id: ClipId,
    },
}
