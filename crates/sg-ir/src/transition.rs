//! Transition rules between segments.

use alloc::vec::Vec;

use crate::segment::{Name, SegmentKey};

/// When a transition is allowed to fire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Quantize {
    /// At the current position.
    Immediate,
    /// At the next beat of the origin's tempo grid.
    NextBeat,
    /// At the next bar of the origin's tempo grid.
    NextBar,
    /// At the end of the origin (its loop end when looping).
    #[default]
    SegmentEnd,
    /// At the named exit marker of the origin.
    ExitMarker(Name),
}

/// Where the destination starts playing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Entry {
    #[default]
    SegmentStart,
    /// At the named entry marker of the destination.
    Marker(Name),
    /// At the same sample offset the origin had reached.
    MatchPosition,
}

/// One side of a rule: a specific segment or any segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentMatch {
    Any,
    Segment(SegmentKey),
}

impl SegmentMatch {
    pub fn matches(&self, key: SegmentKey) -> bool {
        match self {
            SegmentMatch::Any => true,
            SegmentMatch::Segment(k) => *k == key,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, SegmentMatch::Any)
    }
}

/// Lookup tiers, searched in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RuleTier {
    /// Origin and destination both named.
    Exact,
    /// Named origin, any destination.
    AnyDestination,
    /// Any origin, named destination.
    AnyOrigin,
    /// Any origin, any destination.
    Fallback,
}

const TIER_ORDER: [RuleTier; 4] = [
    RuleTier::Exact,
    RuleTier::AnyDestination,
    RuleTier::AnyOrigin,
    RuleTier::Fallback,
];

/// How to move from one segment to another.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionRule {
    pub origin: SegmentMatch,
    pub destination: SegmentMatch,
    pub quantize: Quantize,
    /// Short segment played between origin and destination.
    pub bridge: Option<SegmentKey>,
    pub entry: Entry,
}

impl TransitionRule {
    pub fn new(origin: SegmentMatch, destination: SegmentMatch, quantize: Quantize) -> Self {
        Self { origin, destination, quantize, bridge: None, entry: Entry::SegmentStart }
    }

    pub fn with_bridge(mut self, bridge: SegmentKey) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn with_entry(mut self, entry: Entry) -> Self {
        self.entry = entry;
        self
    }

    pub fn tier(&self) -> RuleTier {
        match (self.origin.is_any(), self.destination.is_any()) {
            (false, false) => RuleTier::Exact,
            (false, true) => RuleTier::AnyDestination,
            (true, false) => RuleTier::AnyOrigin,
            (true, true) => RuleTier::Fallback,
        }
    }

    pub fn matches(&self, origin: SegmentKey, destination: SegmentKey) -> bool {
        self.origin.matches(origin) && self.destination.matches(destination)
    }
}

/// A rule found by `RuleSet::find`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuleMatch<'a> {
    /// Position of the rule in insertion order.
    pub index: usize,
    pub tier: RuleTier,
    pub rule: &'a TransitionRule,
}

/// Transition rules in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<TransitionRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn push(&mut self, rule: TransitionRule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransitionRule> {
        self.rules.iter()
    }

    /// Find the rule for `origin -> destination`.
    ///
    /// Tiers are searched exact first, then any-destination, then
    /// any-origin, then full wildcard; within a tier the earliest rule wins.
    pub fn find(&self, origin: SegmentKey, destination: SegmentKey) -> Option<RuleMatch<'_>> {
        TIER_ORDER.iter().find_map(|&tier| {
            self.rules
                .iter()
                .enumerate()
                .find(|(_, r)| r.tier() == tier && r.matches(origin, destination))
                .map(|(index, rule)| RuleMatch { index, tier, rule })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn keys(n: usize) -> Vec<SegmentKey> {
        let mut map: SlotMap<SegmentKey, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn lookup_prefers_exact_then_origin_then_wildcard() {
        let k = keys(5);
        let (a, b, c, x, y) = (k[0], k[1], k[2], k[3], k[4]);
        let mut rules = RuleSet::new();
        // Inserted wildcard-first to prove tier order beats insertion order
        rules.push(TransitionRule::new(SegmentMatch::Any, SegmentMatch::Any, Quantize::SegmentEnd));
        rules.push(TransitionRule::new(SegmentMatch::Segment(a), SegmentMatch::Any, Quantize::NextBeat));
        rules.push(TransitionRule::new(SegmentMatch::Segment(a), SegmentMatch::Segment(b), Quantize::NextBar));

        let r1 = rules.find(a, b).unwrap();
        assert_eq!((r1.index, r1.tier), (2, RuleTier::Exact));
        let r2 = rules.find(a, c).unwrap();
        assert_eq!((r2.index, r2.tier), (1, RuleTier::AnyDestination));
        let r3 = rules.find(x, y).unwrap();
        assert_eq!((r3.index, r3.tier), (0, RuleTier::Fallback));
    }

    #[test]
    fn any_destination_beats_any_origin() {
        let k = keys(2);
        let mut rules = RuleSet::new();
        rules.push(TransitionRule::new(SegmentMatch::Any, SegmentMatch::Segment(k[1]), Quantize::Immediate));
        rules.push(TransitionRule::new(SegmentMatch::Segment(k[0]), SegmentMatch::Any, Quantize::NextBar));
        assert_eq!(rules.find(k[0], k[1]).unwrap().tier, RuleTier::AnyDestination);
    }

    #[test]
    fn first_rule_wins_within_a_tier() {
        let k = keys(2);
        let mut rules = RuleSet::new();
        rules.push(TransitionRule::new(SegmentMatch::Segment(k[0]), SegmentMatch::Segment(k[1]), Quantize::NextBeat));
        rules.push(TransitionRule::new(SegmentMatch::Segment(k[0]), SegmentMatch::Segment(k[1]), Quantize::NextBar));
        assert_eq!(rules.find(k[0], k[1]).unwrap().rule.quantize, Quantize::NextBeat);
    }

    #[test]
    fn no_rule_means_no_match() {
        let k = keys(3);
        let mut rules = RuleSet::new();
        rules.push(TransitionRule::new(SegmentMatch::Segment(k[0]), SegmentMatch::Segment(k[1]), Quantize::NextBeat));
        assert!(rules.find(k[1], k[2]).is_none());
        assert!(RuleSet::new().find(k[0], k[1]).is_none());
    }
}
