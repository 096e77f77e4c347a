//! The transform pipeline: pure functions between a model's base output and a track's final
//! position.
//!
//! Nothing in this module holds state; the engine calls into it with clip-local time and gets
//! positions back. Loop/ping-pong policy, per-track time shifts and spatial offsets all live
//! here, the fade envelope is applied by the clip on top.

use crate::EngineResult;
use animator_api::persistence::{
    Formation, FormationMember, Position, Seconds, TrackId, TrackOffset, Transform,
};
use std::collections::BTreeMap;

/// Outcome of the loop/ping-pong policy for one clip at one tick.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimePolicy {
    /// Effective clip time to evaluate at, in `[0, duration]`.
    pub effective: f64,
    /// True when a non-looping clip has reached its end; the `effective` value is then exactly
    /// the duration, so the terminal sample is emitted before the clip finishes.
    pub finishes: bool,
}

pub fn apply_time_policy(local: f64, duration: f64, looped: bool, ping_pong: bool) -> TimePolicy {
    let local = local.max(0.0);
    if !looped {
        if local >= duration {
            return TimePolicy {
                effective: duration,
                finishes: true,
            };
        }
        return TimePolicy {
            effective: local,
            finishes: false,
        };
    }
    let effective = if ping_pong {
        let p = (local / duration).rem_euclid(2.0);
        if p <= 1.0 {
            p * duration
        } else {
            (2.0 - p) * duration
        }
    } else {
        local.rem_euclid(duration)
    };
    TimePolicy {
        effective,
        finishes: false,
    }
}

/// Shifts a track's effective time and clamps at zero, so a track holds its first sample until
/// its phase activates.
pub fn shift_clamped(effective: f64, shift: f64) -> f64 {
    (effective - shift).max(0.0)
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ResolvedMember {
    pub offset: Position,
    pub time_shift: Seconds,
}

/// The engine-side form of a [`Transform`]: member tables turned into maps for O(log n) lookup
/// per track per tick.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedTransform {
    None,
    Relative {
        offsets: BTreeMap<TrackId, Position>,
    },
    Barycentric {
        anchor: Position,
        members: BTreeMap<TrackId, ResolvedMember>,
    },
    PhaseOffset {
        phase: Seconds,
        offsets: Option<BTreeMap<TrackId, Position>>,
    },
}

impl ResolvedTransform {
    pub fn from_api(transform: &Transform) -> Self {
        match transform {
            Transform::None => Self::None,
            Transform::Relative(relative) => Self::Relative {
                offsets: offset_map(&relative.offsets),
            },
            Transform::Barycentric(formation) => Self::Barycentric {
                anchor: formation.anchor,
                members: formation
                    .members
                    .iter()
                    .map(|m| {
                        (
                            m.track,
                            ResolvedMember {
                                offset: m.offset,
                                time_shift: m.time_shift,
                            },
                        )
                    })
                    .collect(),
            },
            Transform::PhaseOffset(phase_offset) => Self::PhaseOffset {
                phase: phase_offset.phase,
                offsets: phase_offset.relative.as_deref().map(offset_map),
            },
        }
    }

    /// The saved formation cohort, if this is a formation.
    pub fn formation_tracks(&self) -> Option<Vec<TrackId>> {
        match self {
            Self::Barycentric { members, .. } => Some(members.keys().copied().collect()),
            _ => None,
        }
    }

    /// Per-track time shift in seconds. `index` is the track's position in the clip's ordered
    /// request list.
    pub fn time_shift(&self, track: TrackId, index: usize) -> f64 {
        match self {
            Self::PhaseOffset { phase, .. } => index as f64 * phase.get(),
            Self::Barycentric { members, .. } => members
                .get(&track)
                .map(|m| m.time_shift.get())
                .unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Spatial offset added to the model's base output for this track.
    ///
    /// For a formation, a missing member entry means the clip owns a track it must not own;
    /// callers treat that as an internal invariant violation.
    pub fn spatial_offset(&self, track: TrackId) -> EngineResult<Position> {
        match self {
            Self::None => Ok(Position::ZERO),
            Self::Relative { offsets } => Ok(offsets.get(&track).copied().unwrap_or(Position::ZERO)),
            Self::Barycentric { members, .. } => members
                .get(&track)
                .map(|m| m.offset)
                .ok_or("track is not a member of the formation"),
            Self::PhaseOffset { offsets, .. } => Ok(offsets
                .as_ref()
                .and_then(|o| o.get(&track).copied())
                .unwrap_or(Position::ZERO)),
        }
    }
}

fn offset_map(offsets: &[TrackOffset]) -> BTreeMap<TrackId, Position> {
    offsets.iter().map(|o| (o.track, o.offset)).collect()
}

/// Captures relative offsets for a set of tracks against their centroid.
///
/// This is what the designer flow calls when an animation is saved with a Relative transform:
/// each track keeps its spatial relation to the group.
pub fn capture_relative_offsets(tracks: &[(TrackId, Position)]) -> Vec<TrackOffset> {
    let centroid = centroid(tracks);
    tracks
        .iter()
        .map(|&(track, position)| TrackOffset {
            track,
            offset: position - centroid,
        })
        .collect()
}

/// Captures a formation over a track cohort. The anchor defaults to the cohort centroid.
pub fn capture_formation(tracks: &[(TrackId, Position)], anchor: Option<Position>) -> Formation {
    let anchor = anchor.unwrap_or_else(|| centroid(tracks));
    Formation {
        anchor,
        members: tracks
            .iter()
            .map(|&(track, position)| FormationMember {
                track,
                offset: position - anchor,
                time_shift: Seconds::ZERO,
            })
            .collect(),
    }
}

fn centroid(tracks: &[(TrackId, Position)]) -> Position {
    if tracks.is_empty() {
        return Position::ZERO;
    }
    let mut sum = Position::ZERO;
    for (_, position) in tracks {
        sum = sum + *position;
    }
    sum * (1.0 / tracks.len() as f64)
}
