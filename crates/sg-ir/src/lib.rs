//! Music metadata for the segue transport.
//!
//! This crate defines the read-only data the transport schedules against:
//! segments with their tempo grids and loop regions, transition rules,
//! stingers, and the bank that owns them. Asset loaders emit these types,
//! and the engine consumes them.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod asset;
mod bank;
mod fade;
mod segment;
pub mod tempo;
mod transition;

pub use asset::{MusicAsset, Sequence, Stinger, Switch};
pub use bank::MusicBank;
pub use fade::{interpolate, FadeCurve};
pub use segment::{name, LoopRegion, Marker, MarkerKind, MusicSegment, Name, ResourceId, SegmentKey, MAX_MARKERS};
pub use tempo::{BarAndBeat, GridUnit, SampleRatio, TempoMap, TempoMarker, BPM_SCALE};
pub use transition::{Entry, Quantize, RuleMatch, RuleSet, RuleTier, SegmentMatch, TransitionRule};
