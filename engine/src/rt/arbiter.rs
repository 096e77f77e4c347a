//! Latest-takes-precedence arbitration.
//!
//! A new clip takes ownership of every track it requests. Older clips either lose a subset of
//! their tracks (split) or, on a complete takeover, all of them. Splits are always legal: for
//! None/Relative/PhaseOffset transforms any subset is well-defined, and for a formation the
//! retained set stays a subset of the saved cohort, which keeps the captured geometry intact.
//!
//! Cue priority is reserved: it travels with the clip but does not influence arbitration yet.

use crate::rt::{Clip, ExecutionRegistry};
use animator_api::persistence::{Seconds, TrackId};
use animator_api::runtime::ClipId;
use std::collections::BTreeSet;
use tracing::debug;

/// One older clip's loss to a newer clip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Takeover {
    pub clip_id: ClipId,
    pub tracks: Vec<TrackId>,
    /// True when the older clip lost all of its tracks.
    pub complete: bool,
}

/// Integrates `clip` into the registry, releasing every conflicting ownership first.
///
/// The whole operation is atomic with respect to the registry: all releases happen before the
/// new clip is inserted, so the single-owner invariant holds at every observable point.
pub fn integrate(registry: &mut ExecutionRegistry, clip: Clip, now: Seconds) -> Vec<Takeover> {
    let requested: BTreeSet<TrackId> = clip.owned_tracks().iter().copied().collect();
    let mut takeovers = Vec::new();
    let conflicts: Vec<(ClipId, Vec<TrackId>)> = registry
        .clips()
        .filter(|old| !old.is_finished())
        .map(|old| {
            let conflict: Vec<TrackId> = old
                .owned_tracks()
                .iter()
                .copied()
                .filter(|t| requested.contains(t))
                .collect();
            (old.id(), conflict)
        })
        .filter(|(_, conflict)| !conflict.is_empty())
        .collect();
    for (old_id, conflict) in conflicts {
        let complete = registry
            .get(old_id)
            .map(|old| conflict.len() == old.owned_tracks().len())
            .unwrap_or(false);
        registry.release_tracks(old_id, &conflict);
        if complete {
            if let Ok(old) = registry.get_mut(old_id) {
                match old.animation().fade_out {
                    Some(fade) => old.begin_stop(now, Some(fade)),
                    None => old.finish(),
                }
            }
        }
        debug!(
            "clip {} takes {:?} from clip {old_id} (complete takeover: {complete})",
            clip.id(),
            conflict
        );
        takeovers.push(Takeover {
            clip_id: old_id,
            tracks: conflict,
            complete,
        });
    }
    registry.insert(clip);
    takeovers
}
