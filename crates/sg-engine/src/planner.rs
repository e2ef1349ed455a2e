//! Transition planning: when a change may fire and what plays next.

use sg_ir::{Entry, GridUnit, MarkerKind, MusicSegment, Quantize, RuleSet, RuleTier, SegmentKey};
use tracing::debug;

/// Outcome of planning a transition out of the current segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionPlan {
    /// Origin sample at which the change fires; never before `current`.
    pub trigger: u64,
    pub quantize: Quantize,
    /// Segment to play before the destination.
    pub bridge: Option<SegmentKey>,
    pub entry: Entry,
    /// Tier of the matched rule, `None` when the default policy applied.
    pub tier: Option<RuleTier>,
}

/// Plan `origin -> destination` from origin position `current`.
///
/// Without a matching rule the change waits for the end of the origin.
pub fn plan_transition(
    rules: &RuleSet,
    origin: &MusicSegment,
    origin_key: SegmentKey,
    destination_key: SegmentKey,
    current: u64,
) -> TransitionPlan {
    let found = rules.find(origin_key, destination_key);
    let (quantize, bridge, entry, tier) = match found {
        Some(m) => (m.rule.quantize, m.rule.bridge, m.rule.entry, Some(m.tier)),
        None => {
            debug!(origin = %origin.name, "no transition rule, waiting for segment end");
            (Quantize::SegmentEnd, None, Entry::SegmentStart, None)
        }
    };
    let trigger = quantize_sample(origin, &quantize, current);
    debug!(origin = %origin.name, ?tier, ?quantize, current, trigger, "planned transition");
    TransitionPlan { trigger, quantize, bridge, entry, tier }
}

/// First sample at or after `current` allowed by `quantize` in `segment`.
///
/// Grid points past the segment's effective end, missing grids and
/// missing or already-passed exit markers all fall back to the end.
pub fn quantize_sample(segment: &MusicSegment, quantize: &Quantize, current: u64) -> u64 {
    let end = segment.effective_end().max(current);
    match quantize {
        Quantize::Immediate => current,
        Quantize::NextBeat => grid_or_end(segment, current, GridUnit::Beat, end),
        Quantize::NextBar => grid_or_end(segment, current, GridUnit::Bar, end),
        Quantize::SegmentEnd => end,
        Quantize::ExitMarker(label) => segment
            .marker_sample(label, MarkerKind::Exit)
            .filter(|s| *s >= current && *s <= end)
            .unwrap_or(end),
    }
}

fn grid_or_end(segment: &MusicSegment, current: u64, unit: GridUnit, end: u64) -> u64 {
    segment
        .next_boundary(current, unit)
        .filter(|b| *b <= end)
        .unwrap_or(end)
}

/// Start position in `destination` for an `Entry` policy.
///
/// `origin_position` feeds `MatchPosition`; it is rescaled when the two
/// segments run at different sample rates. Results stay inside the segment.
pub fn entry_sample(
    destination: &MusicSegment,
    entry: &Entry,
    origin: Option<(&MusicSegment, u64)>,
) -> u64 {
    let sample = match entry {
        Entry::SegmentStart => 0,
        Entry::Marker(label) => destination
            .marker_sample(label, MarkerKind::Entry)
            .unwrap_or(0),
        Entry::MatchPosition => match origin {
            Some((seg, pos)) => rescale(pos, seg.sample_rate, destination.sample_rate),
            None => 0,
        },
    };
    sample.min(destination.length.saturating_sub(1))
}

/// Convert a sample count between rates.
pub fn rescale(samples: u64, from_rate: u32, to_rate: u32) -> u64 {
    if from_rate == to_rate || from_rate == 0 {
        return samples;
    }
    (samples as u128 * to_rate as u128 / from_rate as u128) as u64
}
