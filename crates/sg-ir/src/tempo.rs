//! Sample-domain tempo grid.
//!
//! A segment's musical clock is a list of tempo markers. Each marker starts
//! a fresh bar at its own sample position and lays a beat grid from there.
//! Beat lengths are kept as exact rationals so grid points never drift:
//! beat *k* of a marker sits at `start + ceil(k * num / den)`.

use arrayvec::ArrayVec;

/// Maximum tempo markers per segment.
pub const MAX_TEMPO_MARKERS: usize = 32;

/// Scale of `TempoMarker::bpm_x100` (12000 = 120.00 BPM).
pub const BPM_SCALE: u32 = 100;

/// An exact length in samples, `num / den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleRatio {
    pub num: u64,
    pub den: u64,
}

impl SampleRatio {
    /// Whether the ratio describes a usable (non-zero) grid step.
    pub fn is_valid(self) -> bool {
        self.num > 0 && self.den > 0
    }

    /// Sample offset of grid point `k`, rounded up to a whole sample.
    pub fn nth(self, k: u64) -> u64 {
        let n = k as u128 * self.num as u128;
        n.div_ceil(self.den as u128) as u64
    }

    /// Index of the first grid point at or after `offset`.
    pub fn index_at_or_after(self, offset: u64) -> u64 {
        // ceil(k * num / den) >= offset  <=>  k * num > (offset - 1) * den
        if offset == 0 {
            return 0;
        }
        ((offset as u128 - 1) * self.den as u128 / self.num as u128) as u64 + 1
    }

    /// Index of the last grid point at or before `offset`.
    pub fn index_at_or_before(self, offset: u64) -> u64 {
        // ceil(k * num / den) <= offset  <=>  k * num <= offset * den
        (offset as u128 * self.den as u128 / self.num as u128) as u64
    }

    /// Approximate length as a float (display only).
    pub fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

/// Grid resolution used for quantisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridUnit {
    Beat,
    Bar,
}

/// A position expressed in bars and beats (both zero-based).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BarAndBeat {
    pub bar: u32,
    pub beat: u32,
}

impl BarAndBeat {
    pub const fn new(bar: u32, beat: u32) -> Self {
        Self { bar, beat }
    }
}

/// Tempo and metre taking effect at a sample position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TempoMarker {
    /// First sample governed by this marker; always a bar start.
    pub start: u64,
    /// Tempo in hundredths of a BPM.
    pub bpm_x100: u32,
    /// Beats in one bar (time signature numerator).
    pub beats_per_bar: u8,
    /// Note value of one beat (time signature denominator). Informational.
    pub beat_unit: u8,
}

impl TempoMarker {
    pub const fn new(start: u64, bpm_x100: u32, beats_per_bar: u8, beat_unit: u8) -> Self {
        Self { start, bpm_x100, beats_per_bar, beat_unit }
    }

    /// Marker from a floating-point BPM, rounded to 0.01 BPM.
    pub fn from_bpm(start: u64, bpm: f32, beats_per_bar: u8) -> Self {
        let bpm_x100 = libm::roundf(bpm * BPM_SCALE as f32).max(0.0) as u32;
        Self::new(start, bpm_x100, beats_per_bar, 4)
    }

    pub fn bpm(&self) -> f32 {
        self.bpm_x100 as f32 / BPM_SCALE as f32
    }

    /// Samples per beat: `sample_rate * 60 / bpm`.
    pub fn beat_length(&self, sample_rate: u32) -> SampleRatio {
        SampleRatio {
            num: sample_rate as u64 * 60 * BPM_SCALE as u64,
            den: self.bpm_x100 as u64,
        }
    }

    /// Samples per bar: samples per beat times beats per bar.
    pub fn bar_length(&self, sample_rate: u32) -> SampleRatio {
        let beat = self.beat_length(sample_rate);
        SampleRatio { num: beat.num * self.beats_per_bar as u64, den: beat.den }
    }

    fn unit_length(&self, sample_rate: u32, unit: GridUnit) -> SampleRatio {
        match unit {
            GridUnit::Beat => self.beat_length(sample_rate),
            GridUnit::Bar => self.bar_length(sample_rate),
        }
    }
}

/// Ordered tempo markers of one segment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TempoMap {
    markers: ArrayVec<TempoMarker, MAX_TEMPO_MARKERS>,
}

impl TempoMap {
    /// An empty map (no grid; quantised requests fall back to segment end).
    pub fn new() -> Self {
        Self { markers: ArrayVec::new() }
    }

    /// A single tempo from sample 0.
    pub fn constant(bpm_x100: u32, beats_per_bar: u8, beat_unit: u8) -> Self {
        let mut map = Self::new();
        map.markers.push(TempoMarker::new(0, bpm_x100, beats_per_bar, beat_unit));
        map
    }

    /// Insert a marker keeping start order. A marker at an existing start
    /// replaces it. Returns the marker back when the map is full.
    pub fn insert(&mut self, marker: TempoMarker) -> Result<(), TempoMarker> {
        match self.markers.binary_search_by(|m| m.start.cmp(&marker.start)) {
            Ok(pos) => {
                self.markers[pos] = marker;
                Ok(())
            }
            Err(pos) => self.markers.try_insert(pos, marker).map_err(|e| e.element()),
        }
    }

    pub fn markers(&self) -> &[TempoMarker] {
        &self.markers
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Index of the marker governing `sample`. Samples before the first
    /// marker belong to the first marker.
    pub fn marker_index_at(&self, sample: u64) -> Option<usize> {
        if self.markers.is_empty() {
            return None;
        }
        let after = self.markers.partition_point(|m| m.start <= sample);
        Some(after.saturating_sub(1))
    }

    pub fn marker_at(&self, sample: u64) -> Option<&TempoMarker> {
        self.marker_index_at(sample).map(|i| &self.markers[i])
    }

    /// First beat or bar boundary at or after `sample`.
    ///
    /// The start of the following tempo marker counts as a boundary. Returns
    /// `None` when the map is empty or the governing marker has no tempo.
    pub fn next_boundary(&self, sample: u64, sample_rate: u32, unit: GridUnit) -> Option<u64> {
        let idx = self.marker_index_at(sample)?;
        let marker = &self.markers[idx];
        if sample <= marker.start {
            return Some(marker.start);
        }
        let step = marker.unit_length(sample_rate, unit);
        if !step.is_valid() {
            return None;
        }
        let k = step.index_at_or_after(sample - marker.start);
        let mut boundary = marker.start + step.nth(k);
        if let Some(next) = self.markers.get(idx + 1) {
            boundary = boundary.min(next.start);
        }
        Some(boundary)
    }

    /// Whether `sample` lies exactly on a grid point of `unit`.
    pub fn is_on_grid(&self, sample: u64, sample_rate: u32, unit: GridUnit) -> bool {
        self.next_boundary(sample, sample_rate, unit) == Some(sample)
    }

    /// Bar and beat containing `sample`. Bars count across markers.
    pub fn bar_and_beat_at(&self, sample: u64, sample_rate: u32) -> BarAndBeat {
        let Some(idx) = self.marker_index_at(sample) else {
            return BarAndBeat::default();
        };
        let mut bars = 0u64;
        for pair in self.markers[..=idx].windows(2) {
            bars += bars_in_span(&pair[0], pair[1].start - pair[0].start, sample_rate);
        }

        let marker = &self.markers[idx];
        let offset = sample.saturating_sub(marker.start);
        let bar_len = marker.bar_length(sample_rate);
        let beat_len = marker.beat_length(sample_rate);
        if !bar_len.is_valid() || !beat_len.is_valid() {
            return BarAndBeat::new(bars as u32, 0);
        }
        let local_bar = bar_len.index_at_or_before(offset);
        let beat = beat_len.index_at_or_before(offset) - local_bar * marker.beats_per_bar as u64;
        BarAndBeat::new((bars + local_bar) as u32, beat as u32)
    }

    /// Sample position of a bar/beat. Inverse of `bar_and_beat_at` on grid points.
    pub fn sample_at(&self, position: BarAndBeat, sample_rate: u32) -> Option<u64> {
        let mut first_bar = 0u64;
        for (i, marker) in self.markers.iter().enumerate() {
            let span_bars = match self.markers.get(i + 1) {
                Some(next) => bars_in_span(marker, next.start - marker.start, sample_rate),
                None => u64::MAX,
            };
            let bar = position.bar as u64;
            if bar < first_bar.saturating_add(span_bars) {
                let beat_len = marker.beat_length(sample_rate);
                if !beat_len.is_valid() {
                    return None;
                }
                let beats = (bar - first_bar) * marker.beats_per_bar as u64 + position.beat as u64;
                return Some(marker.start + beat_len.nth(beats));
            }
            first_bar += span_bars;
        }
        None
    }
}

/// Number of bar starts in `[0, span)` of a marker.
fn bars_in_span(marker: &TempoMarker, span: u64, sample_rate: u32) -> u64 {
    let bar_len = marker.bar_length(sample_rate);
    if bar_len.is_valid() {
        bar_len.index_at_or_after(span)
    } else {
        1
    }
}
