//! This is the data model for spatial animation shows.
//!
//! It is designed using the following conventions:
//!
//! - Fields are optional only if they have a totally natural default or are an optional override
//!   of an otherwise inherited value.
//! - Fat enum variants are used to distinguish between multiple alternatives, but not as a general
//!   rule. For UI purposes, it's sometimes desirable to save data even if it's not actually in
//!   use.
//! - Everything here is plain data. Resolution, validation against model schemas and playback
//!   semantics live in the engine crate; this crate only rejects values that can never be valid
//!   (e.g. non-positive durations).

pub mod persistence;
pub mod runtime;

pub type ApiResult<T> = Result<T, &'static str>;
