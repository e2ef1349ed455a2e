//! Registry of resident music metadata.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use slotmap::SlotMap;

use crate::asset::{MusicAsset, Sequence, Stinger, Switch};
use crate::segment::{name, MusicSegment, Name, SegmentKey};
use crate::transition::{RuleSet, TransitionRule};

/// Segments, playable assets, stingers and transition rules currently loaded.
///
/// Segments are owned here and referenced by `SegmentKey` everywhere else.
/// Unloading a segment leaves dangling keys in assets and rules; lookups
/// through `segment` then fail, which the transport reports as not found.
#[derive(Clone, Debug, Default)]
pub struct MusicBank {
    segments: SlotMap<SegmentKey, MusicSegment>,
    assets: BTreeMap<Name, MusicAsset>,
    stingers: BTreeMap<Name, Stinger>,
    rules: RuleSet,
}

impl MusicBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a segment and register it as a playable asset under its name.
    pub fn add_segment(&mut self, segment: MusicSegment) -> SegmentKey {
        let label = segment.name;
        let key = self.segments.insert(segment);
        self.assets.insert(label, MusicAsset::Segment(key));
        key
    }

    pub fn add_sequence(&mut self, label: &str, sequence: Sequence) {
        self.assets.insert(name(label), MusicAsset::Sequence(sequence));
    }

    pub fn add_switch(&mut self, label: &str, switch: Switch) {
        self.assets.insert(name(label), MusicAsset::Switch(switch));
    }

    pub fn add_stinger(&mut self, stinger: Stinger) {
        self.stingers.insert(stinger.name, stinger);
    }

    pub fn add_rule(&mut self, rule: TransitionRule) {
        self.rules.push(rule);
    }

    pub fn segment(&self, key: SegmentKey) -> Option<&MusicSegment> {
        self.segments.get(key)
    }

    pub fn segment_key(&self, label: &str) -> Option<SegmentKey> {
        match self.assets.get(label) {
            Some(MusicAsset::Segment(key)) if self.segments.contains_key(*key) => Some(*key),
            _ => None,
        }
    }

    /// Resolve a segment by name to its key and metadata.
    pub fn resolve_segment(&self, label: &str) -> Option<(SegmentKey, &MusicSegment)> {
        let key = self.segment_key(label)?;
        self.segments.get(key).map(|seg| (key, seg))
    }

    pub fn asset(&self, label: &str) -> Option<&MusicAsset> {
        self.assets.get(label)
    }

    pub fn stinger(&self, label: &str) -> Option<&Stinger> {
        self.stingers.get(label)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn segments(&self) -> impl Iterator<Item = (SegmentKey, &MusicSegment)> {
        self.segments.iter()
    }

    pub fn asset_names(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(|n| n.as_str())
    }

    /// Drop a segment's metadata. Assets that reference it stop resolving.
    pub fn unload_segment(&mut self, label: &str) -> Option<MusicSegment> {
        let key = self.segment_key(label)?;
        self.assets.remove(label);
        self.segments.remove(key)
    }

    /// Whether every segment an asset refers to is resident.
    pub fn is_playable(&self, asset: &MusicAsset) -> bool {
        let keys = asset.segments();
        !keys.is_empty() && keys.iter().all(|k| self.segments.contains_key(*k))
    }

    /// Names of assets with at least one segment that is no longer resident.
    pub fn broken_assets(&self) -> Vec<Name> {
        self.assets
            .iter()
            .filter(|(_, asset)| !self.is_playable(asset))
            .map(|(n, _)| *n)
            .collect()
    }
}
