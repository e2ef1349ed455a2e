//! Playable music assets and stinger cues.

use alloc::vec::Vec;

use crate::segment::{name, Name, SegmentKey};
use crate::transition::Quantize;

/// Something a caller can ask the transport to play.
#[derive(Clone, Debug, PartialEq)]
pub enum MusicAsset {
    /// A single segment.
    Segment(SegmentKey),
    /// Segments played one after another.
    Sequence(Sequence),
    /// Interchangeable variants chosen by a switch group value.
    Switch(Switch),
}

impl MusicAsset {
    /// Every segment the asset can play.
    pub fn segments(&self) -> Vec<SegmentKey> {
        match self {
            MusicAsset::Segment(key) => alloc::vec![*key],
            MusicAsset::Sequence(seq) => seq.segments.clone(),
            MusicAsset::Switch(sw) => sw.variants.iter().map(|(_, k)| *k).collect(),
        }
    }
}

/// An ordered playlist of segments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sequence {
    pub segments: Vec<SegmentKey>,
    /// Start again from the first segment after the last one ends.
    pub repeat: bool,
}

impl Sequence {
    pub fn new(segments: Vec<SegmentKey>, repeat: bool) -> Self {
        Self { segments, repeat }
    }

    /// Index of the member following `index`, if any.
    pub fn next_index(&self, index: usize) -> Option<usize> {
        if index + 1 < self.segments.len() {
            Some(index + 1)
        } else if self.repeat && !self.segments.is_empty() {
            Some(0)
        } else {
            None
        }
    }
}

/// Variants of the same music selected by a switch group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Switch {
    pub group: Name,
    pub variants: Vec<(Name, SegmentKey)>,
    /// Variant used when the group has no value yet.
    pub default: usize,
}

impl Switch {
    pub fn new(group: &str) -> Self {
        Self { group: name(group), variants: Vec::new(), default: 0 }
    }

    pub fn with_variant(mut self, value: &str, segment: SegmentKey) -> Self {
        self.variants.push((name(value), segment));
        self
    }

    pub fn variant(&self, value: &str) -> Option<SegmentKey> {
        self.variants
            .iter()
            .find(|(v, _)| v.as_str() == value)
            .map(|(_, k)| *k)
    }

    pub fn default_variant(&self) -> Option<SegmentKey> {
        self.variants.get(self.default).map(|(_, k)| *k)
    }

    /// Variant for `value`, or the default when unset or unknown.
    pub fn select(&self, value: Option<&str>) -> Option<SegmentKey> {
        value
            .and_then(|v| self.variant(v))
            .or_else(|| self.default_variant())
    }
}

/// A one-shot cue played over ducked music.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stinger {
    pub name: Name,
    pub segment: SegmentKey,
    /// Music gain while the stinger plays (1.0 = no ducking).
    pub duck: f32,
    /// Seconds to duck and to restore; `None` uses the transport default.
    pub duck_fade: Option<f32>,
    /// Grid point of the current music at which the stinger starts.
    pub quantize: Quantize,
    pub volume: f32,
}

impl Stinger {
    pub fn new(label: &str, segment: SegmentKey, duck: f32) -> Self {
        Self {
            name: name(label),
            segment,
            duck: duck.clamp(0.0, 1.0),
            duck_fade: None,
            quantize: Quantize::Immediate,
            volume: 1.0,
        }
    }

    pub fn with_quantize(mut self, quantize: Quantize) -> Self {
        self.quantize = quantize;
        self
    }

    pub fn with_duck_fade(mut self, seconds: f32) -> Self {
        self.duck_fade = Some(seconds.max(0.0));
        self
    }
}
