use thiserror::Error;

/// Why a cue trigger was rejected. Rejection never mutates engine state.
#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum TriggerError {
    #[error("unknown cue")]
    UnknownCue,
    #[error("unknown animation")]
    UnknownAnimation,
    #[error("unknown preset")]
    UnknownPreset,
    #[error("invalid parameters: {reason}")]
    InvalidParameters { reason: String },
    #[error("cue has an empty track set")]
    EmptyTrackSet,
    #[error("requested tracks are not part of the saved formation")]
    IncompatibleFormation,
    #[error("cue is disabled")]
    DisabledCue,
}
