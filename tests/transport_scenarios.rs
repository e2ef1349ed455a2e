//! End-to-end transport scenarios through a loaded bank and the headless
//! controller.

use proptest::prelude::*;
use sg_engine::{quantize_sample, HeadInfo, PlayOptions, PlayingStatus, RequestStatus};
use sg_ir::{GridUnit, MusicSegment, Quantize, ResourceId, RuleTier, TempoMap, TempoMarker};
use sg_master::Controller;

const SR: u64 = 44_100;

const BANK: &str = r#"
[transport]
sample_rate = 44100

[[segment]]
name = "a"
sample_rate = 44100
seconds = 10.0

[[segment]]
name = "b"
sample_rate = 44100
seconds = 10.0

[[segment]]
name = "c"
sample_rate = 44100
seconds = 10.0

[[segment]]
name = "x"
sample_rate = 44100
seconds = 10.0

[[segment]]
name = "y"
sample_rate = 44100
seconds = 10.0

[[segment]]
name = "three_loops"
sample_rate = 44100
length = 88200
loop = { start = 0, end = 44100, count = 3 }

[[segment]]
name = "forever"
sample_rate = 44100
length = 88200
loop = { start = 0, end = 44100 }

[[segment]]
name = "hit"
sample_rate = 44100
length = 22050

[[rule]]
from = "a"
to = "b"
quantize = "next_bar"

[[rule]]
from = "a"
quantize = "next_beat"

[[rule]]
quantize = "immediate"

[[stinger]]
name = "hit"
segment = "hit"
duck = 0.5
"#;

fn controller() -> Controller {
    Controller::from_loaded(sg_formats::load_bank(BANK, None).unwrap())
}

fn tracks(c: &Controller) -> Vec<HeadInfo> {
    c.transport().active_tracks().collect()
}

fn music_volume(c: &Controller) -> Option<f32> {
    let head = c.transport().active_tracks().next()?;
    c.device().volume(head.handle)
}

#[test]
fn beat_length_is_exact() {
    for bpm in [60.0, 90.0, 120.0, 137.0, 174.5] {
        let marker = TempoMarker::from_bpm(0, bpm, 4);
        let beat = marker.beat_length(SR as u32);
        // num / den == R * 60 / B with B = bpm_x100 / 100
        assert_eq!(
            beat.num as u128 * marker.bpm_x100 as u128,
            SR as u128 * 60 * 100 * beat.den as u128
        );
        let bar = marker.bar_length(SR as u32);
        assert_eq!(bar.num * beat.den, 4 * beat.num * bar.den);
    }
}

proptest! {
    #[test]
    fn next_beat_is_never_early(current in 0u64..4_000_000, bpm in 40.0f32..240.0) {
        let tempo = {
            let mut map = TempoMap::new();
            map.insert(TempoMarker::from_bpm(0, bpm, 4)).unwrap();
            map
        };
        let segment = MusicSegment::new("s", ResourceId(1), SR as u32, 8_000_000).with_tempo(tempo);
        let beat = segment.tempo.markers()[0].beat_length(SR as u32);
        let trigger = quantize_sample(&segment, &Quantize::NextBeat, current);

        prop_assert!(trigger >= current);
        prop_assert_eq!(trigger, beat.nth(beat.index_at_or_after(current)));
        let on_grid = beat.nth(beat.index_at_or_before(current)) == current;
        prop_assert_eq!(trigger == current, on_grid);
        prop_assert_eq!(segment.next_boundary(current, GridUnit::Beat), Some(trigger));
    }
}

#[test]
fn next_bar_from_half_a_second() {
    let mut c = controller();
    c.play("a", PlayOptions::default()).unwrap();
    c.tick(22_050);
    assert_eq!(c.transport().position(), Some(22_050));

    assert_eq!(
        c.play("b", PlayOptions::default()),
        Ok(RequestStatus::Queued { trigger: 88_200 })
    );
    c.tick(22_050);
    c.tick(22_050);
    assert_eq!(c.transport().current_event(), Some("a"));
    c.tick(22_050);
    assert_eq!(c.transport().current_event(), Some("b"));
    assert_eq!(c.transport().position(), Some(0));
    assert_eq!(c.device().live_heads(), 1);
}

#[test]
fn queue_then_cancel_leaves_tracks_unchanged() {
    let mut c = controller();
    c.play("a", PlayOptions::default()).unwrap();
    c.tick(22_050);
    let before = tracks(&c);

    assert!(matches!(c.play("b", PlayOptions::fades(1.0, 1.0)), Ok(RequestStatus::Queued { .. })));
    assert_eq!(c.play("a", PlayOptions::default()), Ok(RequestStatus::Cancelled));
    assert_eq!(tracks(&c), before);

    for _ in 0..10 {
        c.tick(22_050);
    }
    let after = tracks(&c);
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].handle, before[0].handle);
    assert_eq!(c.transport().current_event(), Some("a"));
    assert_eq!(c.device().live_heads(), 1);
}

#[test]
fn same_segment_request_is_a_no_op() {
    let mut c = controller();
    c.play("a", PlayOptions::default()).unwrap();
    c.tick(1_000);
    let before = tracks(&c);
    assert_eq!(c.play("a", PlayOptions::default()), Ok(RequestStatus::Unchanged));
    assert_eq!(c.play("a", PlayOptions::fades(2.0, 2.0)), Ok(RequestStatus::Unchanged));
    c.tick(1_000);
    assert_eq!(c.device().live_heads(), 1);
    assert_eq!(tracks(&c)[0].handle, before[0].handle);
}

#[test]
fn counted_loop_crosses_exactly_n_times() {
    let mut c = controller();
    c.play("three_loops", PlayOptions::default()).unwrap();
    let mut crossings = 0;
    let mut ticks = 0;
    while c.transport().playing_status() == PlayingStatus::Playing {
        c.tick(4_410);
        ticks += 1;
        if let Some(head) = c.transport().active_tracks().next() {
            crossings = head.loops_completed;
        }
        assert!(ticks < 1_000, "counted loop never ended");
    }
    // Two wraps are observed while playing; the third crossing ends the segment.
    assert_eq!(crossings, 2);
    assert_eq!(c.transport().now(), 3 * 44_100);
    assert_eq!(c.transport().playing_status(), PlayingStatus::Idle);
    assert_eq!(c.device().live_heads(), 0);
}

#[test]
fn counted_loop_never_plays_its_tail() {
    let bank = BANK.replace("count = 3", "count = 2");
    let mut c = Controller::from_loaded(sg_formats::load_bank(&bank, None).unwrap());
    c.play("three_loops", PlayOptions::default()).unwrap();
    let mut elapsed = 0;
    while c.transport().playing_status() == PlayingStatus::Playing {
        c.tick(441);
        elapsed += 441;
        if let Some(head) = c.transport().active_tracks().next() {
            assert!(head.position < 44_100, "played past the loop end at {}", head.position);
        }
        assert!(elapsed < 1_000_000, "counted loop never ended");
    }
    assert_eq!(elapsed, 2 * 44_100);
}

#[test]
fn infinite_loop_runs_until_stopped() {
    let mut c = controller();
    c.play("forever", PlayOptions::default()).unwrap();
    for _ in 0..200 {
        c.tick(4_410);
    }
    let head = c.transport().active_tracks().next().unwrap();
    assert_eq!(head.loops_completed, 20);
    assert_eq!(c.transport().playing_status(), PlayingStatus::Playing);

    c.stop_music(0.0);
    assert_eq!(c.transport().playing_status(), PlayingStatus::Idle);
    assert_eq!(c.device().live_heads(), 0);
}

#[test]
fn stop_fade_reaches_silence_then_destroys() {
    let mut c = controller();
    c.play("a", PlayOptions::default()).unwrap();
    c.tick(4_410);
    assert_eq!(music_volume(&c), Some(1.0));

    assert_eq!(c.stop_music(2.0), RequestStatus::Accepted);
    c.tick(44_100);
    let half = music_volume(&c).unwrap();
    assert!((half - 0.5).abs() < 1e-6, "volume at 1s was {half}");

    c.tick(44_099);
    assert_eq!(c.device().live_heads(), 1);
    assert!(music_volume(&c).unwrap() > 0.0);
    assert_eq!(c.transport().playing_status(), PlayingStatus::Stopping);

    c.tick(1);
    assert_eq!(c.device().live_heads(), 0);
    assert_eq!(c.transport().playing_status(), PlayingStatus::Idle);
}

#[test]
fn stinger_ducks_music_for_its_duration() {
    let mut c = controller();
    c.play("a", PlayOptions::default()).unwrap();
    c.tick(4_410);
    assert_eq!(music_volume(&c), Some(1.0));

    c.play_stinger("hit").unwrap();
    c.tick(1);
    assert_eq!(c.transport().stinger_playing(), Some("hit"));
    assert_eq!(music_volume(&c), Some(0.5));

    // The stinger head starts at the end of the tick that picked it up.
    c.tick(22_049);
    assert_eq!(music_volume(&c), Some(0.5));
    c.tick(1);
    assert_eq!(c.transport().stinger_playing(), None);
    assert_eq!(music_volume(&c), Some(1.0));
    assert_eq!(c.device().live_heads(), 1);
}

#[test]
fn rule_lookup_prefers_the_most_specific_tier() {
    let c = controller();
    let bank = c.bank();
    let key = |n: &str| bank.segment_key(n).unwrap();

    let r1 = bank.rules().find(key("a"), key("b")).unwrap();
    assert_eq!((r1.index, r1.tier, r1.rule.quantize), (0, RuleTier::Exact, Quantize::NextBar));

    let r2 = bank.rules().find(key("a"), key("c")).unwrap();
    assert_eq!((r2.index, r2.tier), (1, RuleTier::AnyDestination));

    let r3 = bank.rules().find(key("x"), key("y")).unwrap();
    assert_eq!((r3.index, r3.tier), (2, RuleTier::Fallback));
}

#[test]
fn rule_lookup_drives_triggers() {
    let mut c = controller();
    c.play("a", PlayOptions::default()).unwrap();
    c.tick(1_000);
    assert_eq!(
        c.play("c", PlayOptions::default()),
        Ok(RequestStatus::Queued { trigger: 22_050 })
    );

    let mut c = controller();
    c.play("x", PlayOptions::default()).unwrap();
    c.tick(1_000);
    assert_eq!(
        c.play("y", PlayOptions::default()),
        Ok(RequestStatus::Queued { trigger: 1_000 })
    );
    c.tick(10);
    assert_eq!(c.transport().current_event(), Some("y"));
}
