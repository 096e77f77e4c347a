//! Persistent show data: tracks, animation definitions, presets and cues.
//!
//! Everything in this module is immutable from the engine's perspective once a show is loaded.

use crate::ApiResult;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Add, Mul, Sub};

/// A point in show space, in meters.
///
/// All arithmetic on positions is linear. Coordinate-system conversion (e.g. to
/// azimuth/elevation/distance) happens at the wire boundary only, never inside the engine.
#[derive(Copy, Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Linear interpolation between `self` (at `t = 0`) and `other` (at `t = 1`).
    pub fn lerp(self, other: Self, t: f64) -> Self {
        self + (other - self) * t
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Position {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Position {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Position {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// A duration or point in time, in seconds.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Default, Serialize, Deserialize)]
pub struct Seconds(pub f64);

impl Seconds {
    pub const ZERO: Self = Self(0.0);

    /// Creates a duration, rejecting values that can never be a valid animation duration.
    pub fn duration(raw: f64) -> ApiResult<Self> {
        if !raw.is_finite() {
            return Err("duration must be finite");
        }
        if raw <= 0.0 {
            return Err("duration must be > 0");
        }
        Ok(Self(raw))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

/// Identifier of a spatial audio track.
///
/// Tracks are owned by the project store; the engine only reads their initial position and
/// writes computed positions to the wire. The numeric id doubles as the stable emission order.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TrackId(pub u32);

/// Identifier of a saved animation definition.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnimationId(pub String);

impl AnimationId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

/// Identifier of a built-in animation template.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetId(pub String);

impl PresetId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

/// Identifier of a cue.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CueId(pub String);

impl CueId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

/// The engine-relevant view of a track.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackDef {
    pub id: TrackId,
    #[serde(default)]
    pub name: String,
    /// Where the track rests when no animation owns it. Fades blend from/toward this position.
    pub initial_position: Position,
}

/// A single animation parameter value.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ParamValue {
    Float { value: f64 },
    Int { value: i64 },
    Bool { value: bool },
    Position { value: Position },
    /// A list of positions, e.g. the waypoints of a path model.
    Positions { value: Vec<Position> },
    /// One option out of a fixed set, e.g. a movement plane.
    Choice { value: String },
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float { value } => Some(*value),
            ParamValue::Int { value } => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int { value } => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool { value } => Some(*value),
            _ => None,
        }
    }

    pub fn as_position(&self) -> Option<Position> {
        match self {
            ParamValue::Position { value } => Some(*value),
            _ => None,
        }
    }

    pub fn as_positions(&self) -> Option<&[Position]> {
        match self {
            ParamValue::Positions { value } => Some(value),
            _ => None,
        }
    }

    pub fn as_choice(&self) -> Option<&str> {
        match self {
            ParamValue::Choice { value } => Some(value),
            _ => None,
        }
    }
}

/// Parameter values keyed by schema name.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// A fixed per-track offset, captured at definition time.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackOffset {
    pub track: TrackId,
    pub offset: Position,
}

/// One member of a formation: its spatial offset from the formation anchor and its time shift
/// against the formation's base phase.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormationMember {
    pub track: TrackId,
    pub offset: Position,
    #[serde(default)]
    pub time_shift: Seconds,
}

/// A formation: offsets captured over a specific track cohort, plus the reference center they
/// were captured against.
///
/// The member list is immutable post-definition. Playing a formation on a subset of its cohort
/// restricts ownership, it never recomputes the captured geometry.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Formation {
    pub anchor: Position,
    pub members: Vec<FormationMember>,
}

impl Formation {
    pub fn member(&self, track: TrackId) -> Option<&FormationMember> {
        self.members.iter().find(|m| m.track == track)
    }

    pub fn track_ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.members.iter().map(|m| m.track)
    }
}

/// Multi-track behavior of an animation.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Transform {
    /// Every track gets the model's base output unchanged.
    #[default]
    None,
    /// Each track adds its captured offset to the base output.
    Relative(RelativeTransform),
    /// A formation; offsets and time shifts come from the captured member table.
    Barycentric(Formation),
    /// Track `k` in the cue's ordered track list evaluates at `t - k * phase`.
    PhaseOffset(PhaseOffsetTransform),
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelativeTransform {
    pub offsets: Vec<TrackOffset>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseOffsetTransform {
    pub phase: Seconds,
    /// Optional relative offsets applied on top of the phase stagger.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative: Option<Vec<TrackOffset>>,
}

/// Easing curve of a fade.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub enum Easing {
    #[default]
    Linear,
    SineIn,
    SineOut,
    SineInOut,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
}

impl Easing {
    /// Maps normalized progress to an eased factor. Input is clamped to `[0, 1]`.
    pub fn apply(self, t: f64) -> f64 {
        use std::f64::consts::PI;
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::SineIn => 1.0 - (t * PI / 2.0).cos(),
            Easing::SineOut => (t * PI / 2.0).sin(),
            Easing::SineInOut => 0.5 * (1.0 - (t * PI).cos()),
            Easing::QuadIn => t * t,
            Easing::QuadOut => t * (2.0 - t),
            Easing::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::CubicIn => t * t * t,
            Easing::CubicOut => {
                let u = t - 1.0;
                u * u * u + 1.0
            }
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = 2.0 * t - 2.0;
                    0.5 * u * u * u + 1.0
                }
            }
        }
    }
}

/// An amplitude envelope toward/from a track's resting position.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fade {
    pub duration: Seconds,
    #[serde(default)]
    pub easing: Easing,
}

/// Which wire form the sink uses for a track driven by this animation.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub enum WireFormat {
    /// Absolute cartesian, `/track/{id}/xyz`.
    #[default]
    Xyz,
    /// Absolute spherical, `/track/{id}/aed` (azimuth/elevation in degrees, distance in meters).
    Aed,
    /// Per-axis cartesian increments, `/track/{id}/x+` etc.
    XyzDelta,
    /// Per-axis spherical increments, `/track/{id}/azim+` etc.
    AedDelta,
}

/// A user-authored animation.
///
/// Immutable for the lifetime of any playback that references it.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnimationDef {
    pub id: AnimationId,
    #[serde(default)]
    pub name: String,
    /// Tag of the animation model, e.g. `"circle"`.
    pub model: String,
    pub duration: Seconds,
    #[serde(rename = "loop", default)]
    pub looped: bool,
    #[serde(default)]
    pub ping_pong: bool,
    #[serde(default)]
    pub parameters: ParamMap,
    #[serde(default)]
    pub transform: Transform,
    /// If present, the animation insists on exactly this track set and cue-level overrides are
    /// ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_tracks: Option<Vec<TrackId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fade_in: Option<Fade>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fade_out: Option<Fade>,
    #[serde(default)]
    pub wire_format: WireFormat,
}

/// A built-in template from which a transient animation is instantiated at trigger time.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preset {
    pub id: PresetId,
    #[serde(default)]
    pub name: String,
    /// Tag of the animation model.
    pub model: String,
    pub duration: Seconds,
    #[serde(rename = "loop", default)]
    pub looped: bool,
    #[serde(default)]
    pub parameters: ParamMap,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub wire_format: WireFormat,
}

/// What happens when a cue fires.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub enum CueAction {
    /// Starts a new playback.
    #[default]
    Play,
    /// Stops the playbacks previously started by this cue.
    Stop,
    /// Toggles pause of the playbacks previously started by this cue.
    Pause,
    /// Stops the playbacks previously started by this cue, fading over the cue's fade time.
    Fade,
}

/// How a cue can be fired. Descriptive only; the engine never consumes this.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CueTrigger {
    Manual,
    Hotkey { key: String },
    Osc { address: String },
    Timecode { marker: String },
}

/// What a cue plays.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CueSource {
    /// Instantiates a transient animation from a template over a user-chosen track set.
    Preset {
        preset: PresetId,
        tracks: Vec<TrackId>,
        /// Per-cue parameter overrides merged over the template's parameters.
        #[serde(default)]
        overrides: ParamMap,
    },
    /// References a saved animation. If that animation is locked, `tracks` is ignored.
    Animation {
        animation: AnimationId,
        #[serde(skip_serializing_if = "Option::is_none")]
        tracks: Option<Vec<TrackId>>,
    },
}

/// A named trigger binding.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cue {
    pub id: CueId,
    #[serde(default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    pub source: CueSource,
    #[serde(default)]
    pub action: CueAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fade_time: Option<Seconds>,
    /// Reserved. A future rule may let a higher-priority playback refuse takeover; the default
    /// arbitration is pure latest-takes-precedence.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub triggers: Vec<CueTrigger>,
}

fn enabled_default() -> bool {
    true
}

/// The semantic shape of a loaded show.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    #[serde(default)]
    pub tracks: Vec<TrackDef>,
    #[serde(default)]
    pub animations: Vec<AnimationDef>,
    #[serde(default)]
    pub presets: Vec<Preset>,
    #[serde(default)]
    pub cues: Vec<Cue>,
}
