//! Music segment metadata.

use arrayvec::{ArrayString, ArrayVec};

use crate::tempo::{BarAndBeat, GridUnit, TempoMap};

slotmap::new_key_type! {
    /// Key for referencing segments in a `MusicBank`.
    pub struct SegmentKey;
}

/// Short fixed-capacity name used for segments, assets, markers and stingers.
pub type Name = ArrayString<32>;

/// Build a `Name`, truncating anything past its capacity.
pub fn name(s: &str) -> Name {
    let mut out = Name::new();
    for c in s.chars() {
        if out.try_push(c).is_err() {
            break;
        }
    }
    out
}

/// Maximum named markers per segment.
pub const MAX_MARKERS: usize = 16;

/// Opaque handle to the playable audio behind a segment, issued by the asset loader.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u32);

/// Looped part of a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopRegion {
    /// First sample of the loop.
    pub start: u64,
    /// Sample where playback wraps back to `start` (exclusive).
    pub end: u64,
    /// Number of passes through the loop end; 0 loops forever.
    pub count: u32,
}

impl LoopRegion {
    pub const fn infinite(start: u64, end: u64) -> Self {
        Self { start, end, count: 0 }
    }

    pub const fn counted(start: u64, end: u64, count: u32) -> Self {
        Self { start, end, count }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_infinite(&self) -> bool {
        self.count == 0
    }
}

/// Whether a marker is a place to enter or leave a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    Entry,
    Exit,
}

/// A named musical position inside a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Marker {
    pub name: Name,
    pub position: BarAndBeat,
    pub kind: MarkerKind,
}

impl Marker {
    pub fn new(label: &str, position: BarAndBeat, kind: MarkerKind) -> Self {
        Self { name: name(label), position, kind }
    }
}

/// Immutable metadata of one music asset.
#[derive(Clone, Debug, PartialEq)]
pub struct MusicSegment {
    pub name: Name,
    pub resource: ResourceId,
    /// Sample rate of the segment's audio.
    pub sample_rate: u32,
    /// Total length in samples.
    pub length: u64,
    pub tempo: TempoMap,
    pub loop_region: Option<LoopRegion>,
    pub markers: ArrayVec<Marker, MAX_MARKERS>,
}

impl MusicSegment {
    /// A segment at 120 BPM in 4/4 with no loop.
    pub fn new(label: &str, resource: ResourceId, sample_rate: u32, length: u64) -> Self {
        Self {
            name: name(label),
            resource,
            sample_rate,
            length,
            tempo: TempoMap::constant(12_000, 4, 4),
            loop_region: None,
            markers: ArrayVec::new(),
        }
    }

    pub fn with_tempo(mut self, tempo: TempoMap) -> Self {
        self.tempo = tempo;
        self
    }

    pub fn with_loop(mut self, region: LoopRegion) -> Self {
        self.loop_region = Some(region);
        self
    }

    /// Add a marker; markers past capacity are ignored.
    pub fn with_marker(mut self, marker: Marker) -> Self {
        let _ = self.markers.try_push(marker);
        self
    }

    /// The loop region, if it is usable (non-empty and inside the segment).
    pub fn active_loop(&self) -> Option<LoopRegion> {
        self.loop_region
            .filter(|lr| !lr.is_empty() && lr.end <= self.length)
    }

    pub fn has_loop(&self) -> bool {
        self.active_loop().is_some()
    }

    /// Where the segment stops being "current": the loop end when looping,
    /// otherwise the segment length.
    pub fn effective_end(&self) -> u64 {
        self.active_loop().map_or(self.length, |lr| lr.end)
    }

    pub fn seconds_to_samples(&self, seconds: f32) -> u64 {
        libm::round(seconds.max(0.0) as f64 * self.sample_rate as f64) as u64
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.length as f64 / self.sample_rate as f64
    }

    pub fn bar_and_beat_at(&self, sample: u64) -> BarAndBeat {
        self.tempo.bar_and_beat_at(sample, self.sample_rate)
    }

    pub fn next_boundary(&self, sample: u64, unit: GridUnit) -> Option<u64> {
        self.tempo.next_boundary(sample, self.sample_rate, unit)
    }

    /// Sample position of the first marker with this name and kind.
    pub fn marker_sample(&self, label: &str, kind: MarkerKind) -> Option<u64> {
        self.markers
            .iter()
            .find(|m| m.kind == kind && m.name.as_str() == label)
            .and_then(|m| self.tempo.sample_at(m.position, self.sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looping_segment() -> MusicSegment {
        MusicSegment::new("battle", ResourceId(1), 44_100, 441_000)
            .with_loop(LoopRegion::counted(88_200, 352_800, 3))
            .with_marker(Marker::new("outro", BarAndBeat::new(3, 0), MarkerKind::Exit))
            .with_marker(Marker::new("intro", BarAndBeat::new(1, 0), MarkerKind::Entry))
    }

    #[test]
    fn name_truncates_to_capacity() {
        let long = "a".repeat(40);
        assert_eq!(name(&long).len(), 32);
        assert_eq!(name("calm").as_str(), "calm");
    }

    #[test]
    fn effective_end_uses_loop_end() {
        let seg = looping_segment();
        assert_eq!(seg.effective_end(), 352_800);
        let plain = MusicSegment::new("calm", ResourceId(2), 44_100, 100_000);
        assert_eq!(plain.effective_end(), 100_000);
    }

    #[test]
    fn degenerate_loops_are_ignored() {
        let empty = MusicSegment::new("a", ResourceId(0), 44_100, 1_000)
            .with_loop(LoopRegion::infinite(500, 500));
        assert!(!empty.has_loop());
        let outside = MusicSegment::new("b", ResourceId(0), 44_100, 1_000)
            .with_loop(LoopRegion::infinite(0, 2_000));
        assert_eq!(outside.effective_end(), 1_000);
    }

    #[test]
    fn markers_resolve_through_tempo() {
        let seg = looping_segment();
        assert_eq!(seg.marker_sample("outro", MarkerKind::Exit), Some(264_600));
        assert_eq!(seg.marker_sample("intro", MarkerKind::Entry), Some(88_200));
        assert_eq!(seg.marker_sample("intro", MarkerKind::Exit), None);
        assert_eq!(seg.marker_sample("missing", MarkerKind::Exit), None);
    }

    #[test]
    fn seconds_round_to_samples() {
        let seg = looping_segment();
        assert_eq!(seg.seconds_to_samples(0.5), 22_050);
        assert_eq!(seg.seconds_to_samples(-1.0), 0);
        assert!((seg.duration_secs() - 10.0).abs() < 1e-9);
    }
}
