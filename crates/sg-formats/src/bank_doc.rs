//! TOML music bank documents.
//!
//! ```toml
//! [transport]
//! sample_rate = 48000
//!
//! [[segment]]
//! name = "battle"
//! wav = "audio/battle.wav"
//! bpm = 140.0
//! loop = { start = 0, end = 352800 }
//! markers = [{ name = "outro", bar = 8, kind = "exit" }]
//!
//! [[rule]]
//! from = "calm"
//! to = "*"
//! quantize = "next_bar"
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sg_engine::TransportConfig;
use sg_ir::{
    name, BarAndBeat, Entry, LoopRegion, Marker, MarkerKind, MusicBank, MusicSegment, Quantize,
    ResourceId, SegmentKey, SegmentMatch, Sequence, Stinger, Switch, TempoMap, TempoMarker,
    TransitionRule, BPM_SCALE, MAX_MARKERS,
};
use tracing::{debug, info};

use crate::wav_probe::probe_wav;
use crate::FormatError;

/// A parsed bank: the metadata registry plus the transport settings.
#[derive(Clone, Debug)]
pub struct LoadedBank {
    pub bank: MusicBank,
    pub config: TransportConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BankDocument {
    #[serde(default)]
    transport: TransportConfig,
    #[serde(default, rename = "segment")]
    segments: Vec<SegmentDoc>,
    #[serde(default, rename = "rule")]
    rules: Vec<RuleDoc>,
    #[serde(default, rename = "stinger")]
    stingers: Vec<StingerDoc>,
    #[serde(default, rename = "sequence")]
    sequences: Vec<SequenceDoc>,
    #[serde(default, rename = "switch")]
    switches: Vec<SwitchDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SegmentDoc {
    name: String,
    resource: Option<u32>,
    sample_rate: Option<u32>,
    /// Length in samples.
    length: Option<u64>,
    seconds: Option<f64>,
    /// WAV file probed for rate and length, relative to the document.
    wav: Option<PathBuf>,
    #[serde(default)]
    tempo: Vec<TempoDoc>,
    bpm: Option<f32>,
    beats_per_bar: Option<u8>,
    #[serde(rename = "loop")]
    loop_region: Option<LoopDoc>,
    #[serde(default)]
    markers: Vec<MarkerDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TempoDoc {
    #[serde(default)]
    start: u64,
    bpm: f32,
    #[serde(default = "default_beats_per_bar")]
    beats_per_bar: u8,
    #[serde(default = "default_beat_unit")]
    beat_unit: u8,
}

fn default_beats_per_bar() -> u8 {
    4
}

fn default_beat_unit() -> u8 {
    4
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoopDoc {
    start: u64,
    end: u64,
    /// Passes through the loop end; 0 loops forever.
    #[serde(default)]
    count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MarkerDoc {
    name: String,
    bar: u32,
    #[serde(default)]
    beat: u32,
    kind: MarkerKindDoc,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum MarkerKindDoc {
    Entry,
    Exit,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum QuantizeDoc {
    Immediate,
    NextBeat,
    NextBar,
    #[default]
    SegmentEnd,
    ExitMarker(String),
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum EntryDoc {
    #[default]
    SegmentStart,
    MatchPosition,
    Marker(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleDoc {
    /// Origin segment; missing or `"*"` matches any.
    from: Option<String>,
    to: Option<String>,
    #[serde(default)]
    quantize: QuantizeDoc,
    bridge: Option<String>,
    #[serde(default)]
    entry: EntryDoc,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StingerDoc {
    name: String,
    segment: String,
    #[serde(default = "full_level")]
    duck: f32,
    duck_fade: Option<f32>,
    #[serde(default = "immediate")]
    quantize: QuantizeDoc,
    #[serde(default = "full_level")]
    volume: f32,
}

fn full_level() -> f32 {
    1.0
}

fn immediate() -> QuantizeDoc {
    QuantizeDoc::Immediate
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SequenceDoc {
    name: String,
    segments: Vec<String>,
    #[serde(default)]
    repeat: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SwitchDoc {
    name: String,
    group: String,
    variants: Vec<VariantDoc>,
    /// Value played before the group is set; the first variant otherwise.
    default: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VariantDoc {
    value: String,
    segment: String,
}

/// Parse a bank document. Relative `wav` paths resolve against `base_dir`.
pub fn load_bank(text: &str, base_dir: Option<&Path>) -> Result<LoadedBank, FormatError> {
    let doc: BankDocument = toml::from_str(text)?;
    let mut bank = MusicBank::new();
    let mut names = BTreeSet::new();

    for (index, seg) in doc.segments.iter().enumerate() {
        claim_name(&mut names, &seg.name)?;
        let segment = build_segment(seg, index, base_dir)?;
        debug!(segment = %segment.name, length = segment.length, rate = segment.sample_rate, "segment loaded");
        bank.add_segment(segment);
    }
    for rule in &doc.rules {
        let built = build_rule(&bank, rule)?;
        bank.add_rule(built);
    }
    for stinger in &doc.stingers {
        let key = lookup(&bank, &stinger.segment)?;
        let mut cue = Stinger::new(&stinger.name, key, stinger.duck)
            .with_quantize(quantize(&stinger.quantize));
        if let Some(fade) = stinger.duck_fade {
            cue = cue.with_duck_fade(fade);
        }
        cue.volume = stinger.volume.max(0.0);
        bank.add_stinger(cue);
    }
    for seq in &doc.sequences {
        claim_name(&mut names, &seq.name)?;
        if seq.segments.is_empty() {
            return Err(FormatError::InvalidValue(format!("sequence `{}` is empty", seq.name)));
        }
        let keys = seq
            .segments
            .iter()
            .map(|s| lookup(&bank, s))
            .collect::<Result<Vec<_>, _>>()?;
        bank.add_sequence(&seq.name, Sequence::new(keys, seq.repeat));
    }
    for sw in &doc.switches {
        claim_name(&mut names, &sw.name)?;
        bank.add_switch(&sw.name, build_switch(&bank, sw)?);
    }

    info!(
        segments = doc.segments.len(),
        rules = doc.rules.len(),
        stingers = doc.stingers.len(),
        "bank loaded"
    );
    Ok(LoadedBank { bank, config: doc.transport })
}

/// Read and parse a bank file; `wav` paths resolve against its directory.
pub fn load_bank_file(path: impl AsRef<Path>) -> Result<LoadedBank, FormatError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    load_bank(&text, path.parent())
}

fn claim_name(names: &mut BTreeSet<String>, label: &str) -> Result<(), FormatError> {
    if label.is_empty() {
        return Err(FormatError::InvalidValue("empty asset name".into()));
    }
    if !names.insert(label.to_string()) {
        return Err(FormatError::InvalidValue(format!("duplicate asset name `{label}`")));
    }
    Ok(())
}

fn lookup(bank: &MusicBank, label: &str) -> Result<SegmentKey, FormatError> {
    bank.segment_key(label)
        .ok_or_else(|| FormatError::UnknownSegment(label.to_string()))
}

fn build_segment(
    doc: &SegmentDoc,
    index: usize,
    base_dir: Option<&Path>,
) -> Result<MusicSegment, FormatError> {
    let probed = match &doc.wav {
        Some(wav) => {
            let path = match base_dir {
                Some(dir) => dir.join(wav),
                None => wav.clone(),
            };
            Some(probe_wav(&fs::read(&path)?)?)
        }
        None => None,
    };

    let sample_rate = doc
        .sample_rate
        .or(probed.map(|p| p.sample_rate))
        .filter(|r| *r > 0)
        .ok_or_else(|| invalid(&doc.name, "needs a sample_rate or a wav file"))?;
    let length = match (doc.length, doc.seconds, probed) {
        (Some(length), _, _) => length,
        (None, Some(seconds), _) if seconds >= 0.0 => (seconds * sample_rate as f64).round() as u64,
        (None, None, Some(info)) => info.frames,
        _ => return Err(invalid(&doc.name, "needs a length, seconds or a wav file")),
    };
    if length == 0 {
        return Err(invalid(&doc.name, "has zero length"));
    }

    let resource = ResourceId(doc.resource.unwrap_or(index as u32 + 1));
    let mut segment = MusicSegment::new(&doc.name, resource, sample_rate, length)
        .with_tempo(build_tempo(doc)?);

    if let Some(lr) = &doc.loop_region {
        if lr.end <= lr.start || lr.end > length {
            return Err(invalid(&doc.name, "loop must satisfy start < end <= length"));
        }
        segment = segment.with_loop(LoopRegion::counted(lr.start, lr.end, lr.count));
    }

    if doc.markers.len() > MAX_MARKERS {
        return Err(invalid(&doc.name, "has too many markers"));
    }
    for m in &doc.markers {
        let kind = match m.kind {
            MarkerKindDoc::Entry => MarkerKind::Entry,
            MarkerKindDoc::Exit => MarkerKind::Exit,
        };
        segment = segment.with_marker(Marker::new(&m.name, BarAndBeat::new(m.bar, m.beat), kind));
    }
    Ok(segment)
}

fn build_tempo(doc: &SegmentDoc) -> Result<TempoMap, FormatError> {
    let shorthand = TempoDoc {
        start: 0,
        bpm: doc.bpm.unwrap_or(120.0),
        beats_per_bar: doc.beats_per_bar.unwrap_or(4),
        beat_unit: 4,
    };
    let markers = if doc.tempo.is_empty() {
        std::slice::from_ref(&shorthand)
    } else {
        doc.tempo.as_slice()
    };

    let mut map = TempoMap::new();
    for t in markers {
        if t.bpm.is_nan() || t.bpm <= 0.0 || t.beats_per_bar == 0 {
            return Err(invalid(&doc.name, "tempo needs bpm > 0 and beats_per_bar > 0"));
        }
        let bpm_x100 = (t.bpm * BPM_SCALE as f32).round() as u32;
        map.insert(TempoMarker::new(t.start, bpm_x100, t.beats_per_bar, t.beat_unit))
            .map_err(|_| invalid(&doc.name, "has too many tempo markers"))?;
    }
    if map.markers().first().map(|m| m.start) != Some(0) {
        return Err(invalid(&doc.name, "tempo map must start at sample 0"));
    }
    Ok(map)
}

fn build_rule(bank: &MusicBank, doc: &RuleDoc) -> Result<TransitionRule, FormatError> {
    let side = |label: &Option<String>| match label.as_deref() {
        None | Some("*") => Ok(SegmentMatch::Any),
        Some(label) => lookup(bank, label).map(SegmentMatch::Segment),
    };
    let entry = match &doc.entry {
        EntryDoc::SegmentStart => Entry::SegmentStart,
        EntryDoc::MatchPosition => Entry::MatchPosition,
        EntryDoc::Marker(label) => Entry::Marker(name(label)),
    };
    let mut rule = TransitionRule::new(side(&doc.from)?, side(&doc.to)?, quantize(&doc.quantize))
        .with_entry(entry);
    if let Some(bridge) = &doc.bridge {
        rule = rule.with_bridge(lookup(bank, bridge)?);
    }
    Ok(rule)
}

fn build_switch(bank: &MusicBank, doc: &SwitchDoc) -> Result<Switch, FormatError> {
    if doc.variants.is_empty() {
        return Err(FormatError::InvalidValue(format!("switch `{}` has no variants", doc.name)));
    }
    let mut switch = Switch::new(&doc.group);
    for v in &doc.variants {
        switch = switch.with_variant(&v.value, lookup(bank, &v.segment)?);
    }
    if let Some(default) = &doc.default {
        switch.default = doc
            .variants
            .iter()
            .position(|v| &v.value == default)
            .ok_or_else(|| {
                FormatError::InvalidValue(format!("switch `{}` has no variant `{default}`", doc.name))
            })?;
    }
    Ok(switch)
}

fn quantize(doc: &QuantizeDoc) -> Quantize {
    match doc {
        QuantizeDoc::Immediate => Quantize::Immediate,
        QuantizeDoc::NextBeat => Quantize::NextBeat,
        QuantizeDoc::NextBar => Quantize::NextBar,
        QuantizeDoc::SegmentEnd => Quantize::SegmentEnd,
        QuantizeDoc::ExitMarker(label) => Quantize::ExitMarker(name(label)),
    }
}

fn invalid(segment: &str, what: &str) -> FormatError {
    FormatError::InvalidValue(format!("segment `{segment}` {what}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sg_ir::{FadeCurve, MusicAsset, RuleTier};

    const BANK: &str = r#"
[transport]
sample_rate = 44100
crossfade_curve = "equal_power"

[[segment]]
name = "calm"
sample_rate = 44100
seconds = 10.0

[[segment]]
name = "battle"
sample_rate = 44100
length = 441000
bpm = 140.0
loop = { start = 0, end = 352800, count = 2 }
markers = [
    { name = "outro", bar = 4, kind = "exit" },
    { name = "in", bar = 1, beat = 2, kind = "entry" },
]

[[segment]]
name = "hit"
sample_rate = 44100
length = 22050

[[rule]]
from = "calm"
to = "battle"
quantize = "next_bar"
entry = { marker = "in" }

[[rule]]
from = "battle"
quantize = { exit_marker = "outro" }

[[stinger]]
name = "hit"
segment = "hit"
duck = 0.5
quantize = "next_beat"

[[sequence]]
name = "suite"
segments = ["calm", "battle"]
repeat = true

[[switch]]
name = "mood"
group = "intensity"
variants = [
    { value = "low", segment = "calm" },
    { value = "high", segment = "battle" },
]
default = "high"
"#;

    #[test]
    fn loads_every_table() {
        let loaded = load_bank(BANK, None).unwrap();
        assert_eq!(loaded.config.sample_rate, 44_100);
        assert_eq!(loaded.config.crossfade_curve, FadeCurve::EqualPower);

        let bank = &loaded.bank;
        let (calm, seg) = bank.resolve_segment("calm").unwrap();
        assert_eq!(seg.length, 441_000);
        assert_eq!(seg.resource, ResourceId(1));
        let (battle, seg) = bank.resolve_segment("battle").unwrap();
        assert_eq!(seg.tempo.markers()[0].bpm_x100, 14_000);
        assert_eq!(seg.loop_region, Some(LoopRegion::counted(0, 352_800, 2)));
        assert!(seg.marker_sample("outro", MarkerKind::Exit).is_some());

        let found = bank.rules().find(calm, battle).unwrap();
        assert_eq!(found.tier, RuleTier::Exact);
        assert_eq!(found.rule.quantize, Quantize::NextBar);
        assert_eq!(found.rule.entry, Entry::Marker(name("in")));
        let found = bank.rules().find(battle, calm).unwrap();
        assert_eq!(found.tier, RuleTier::AnyDestination);
        assert_eq!(found.rule.quantize, Quantize::ExitMarker(name("outro")));

        let hit = bank.stinger("hit").unwrap();
        assert_eq!(hit.duck, 0.5);
        assert_eq!(hit.quantize, Quantize::NextBeat);

        match bank.asset("suite") {
            Some(MusicAsset::Sequence(seq)) => {
                assert_eq!(seq.segments, vec![calm, battle]);
                assert!(seq.repeat);
            }
            other => panic!("expected sequence, got {:?}", other),
        }
        match bank.asset("mood") {
            Some(MusicAsset::Switch(sw)) => assert_eq!(sw.select(None), Some(battle)),
            other => panic!("expected switch, got {:?}", other),
        }
    }

    #[test]
    fn empty_document_is_an_empty_bank() {
        let loaded = load_bank("", None).unwrap();
        assert_eq!(loaded.config, TransportConfig::default());
        assert_eq!(loaded.bank.segments().count(), 0);
    }

    #[test]
    fn unknown_reference_is_reported() {
        let doc = "[[rule]]\nfrom = \"nowhere\"\n";
        assert!(matches!(
            load_bank(doc, None),
            Err(FormatError::UnknownSegment(s)) if s == "nowhere"
        ));
    }

    #[test]
    fn bad_loop_is_invalid() {
        let doc = "[[segment]]\nname = \"a\"\nsample_rate = 100\nlength = 10\nloop = { start = 5, end = 20 }\n";
        assert!(matches!(load_bank(doc, None), Err(FormatError::InvalidValue(_))));
    }

    #[test]
    fn missing_rate_is_invalid() {
        let doc = "[[segment]]\nname = \"a\"\nlength = 10\n";
        assert!(matches!(load_bank(doc, None), Err(FormatError::InvalidValue(_))));
    }

    #[test]
    fn duplicate_names_are_invalid() {
        let doc = "[[segment]]\nname = \"a\"\nsample_rate = 100\nlength = 10\n\n\
                   [[sequence]]\nname = \"a\"\nsegments = [\"a\"]\n";
        assert!(matches!(load_bank(doc, None), Err(FormatError::InvalidValue(_))));
    }

    #[test]
    fn syntax_errors_surface_as_toml() {
        assert!(matches!(load_bank("[[segment]\n", None), Err(FormatError::Toml(_))));
    }
}
