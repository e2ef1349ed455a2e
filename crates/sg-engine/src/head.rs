//! PlaybackHead: one sounding instance of a segment.

use sg_ir::{FadeCurve, MusicSegment, SegmentKey};

use crate::device::HeadHandle;
use crate::ramp::Ramp;

/// What a head is doing for the transport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HeadRole {
    /// Drives the musical clock.
    #[default]
    Active,
    /// Leaving; destroyed once its fade reaches silence.
    FadingOut,
    /// Plays a stinger over the music.
    Stinger,
}

/// Result of crossing a loop end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopCrossing {
    /// Jump back to the loop start and keep going.
    Wrap,
    /// The last pass is over; treat as the end of the segment.
    Exhausted,
}

/// A playing segment instance.
#[derive(Clone, Debug)]
pub struct PlaybackHead {
    pub segment: SegmentKey,
    pub handle: HeadHandle,
    pub role: HeadRole,
    /// Fade of this head alone; bus gains are applied on top.
    pub fade: Ramp,
    /// Passes left through the loop end; `None` loops forever.
    pub remaining_loops: Option<u32>,
    pub loops_completed: u32,
    /// Position the head was started at.
    pub entry: u64,
    /// Last position read from the device.
    pub position: u64,
    /// Last volume sent to the device.
    pub volume: f32,
}

impl PlaybackHead {
    /// A head for `segment` starting at `entry`, fading in from silence
    /// over `fade_in` clock samples (instant when zero).
    pub fn new(
        key: SegmentKey,
        segment: &MusicSegment,
        handle: HeadHandle,
        entry: u64,
        now: u64,
        fade_in: u64,
        curve: FadeCurve,
    ) -> Self {
        let fade = if fade_in == 0 {
            Ramp::hold(1.0)
        } else {
            Ramp::new(0.0, 1.0, now, fade_in, curve)
        };
        let remaining_loops = segment
            .active_loop()
            .and_then(|lr| (!lr.is_infinite()).then_some(lr.count));
        Self {
            segment: key,
            handle,
            role: HeadRole::Active,
            fade,
            remaining_loops,
            loops_completed: 0,
            entry,
            position: entry,
            volume: fade.value_at(now),
        }
    }

    /// Spec-style loop counter: 0 means infinite.
    pub fn remaining_loops_count(&self) -> u32 {
        self.remaining_loops.unwrap_or(0)
    }

    /// Whether the next loop-end crossing ends the segment.
    pub fn on_final_pass(&self) -> bool {
        self.remaining_loops == Some(1)
    }

    /// Register a crossing of the loop end.
    pub fn cross_loop(&mut self) -> LoopCrossing {
        self.loops_completed += 1;
        match self.remaining_loops.as_mut() {
            None => LoopCrossing::Wrap,
            Some(n) => {
                *n = n.saturating_sub(1);
                if *n == 0 {
                    LoopCrossing::Exhausted
                } else {
                    LoopCrossing::Wrap
                }
            }
        }
    }

    /// Start fading to silence over `duration` clock samples.
    pub fn fade_out(&mut self, now: u64, duration: u64, curve: FadeCurve) {
        self.role = HeadRole::FadingOut;
        self.fade.retarget(now, 0.0, duration, curve);
    }

    /// A fading-out head that has reached silence.
    pub fn is_spent(&self, now: u64) -> bool {
        self.role == HeadRole::FadingOut && self.fade.target() <= 0.0 && self.fade.is_settled(now)
    }

    pub fn is_music(&self) -> bool {
        self.role != HeadRole::Stinger
    }
}

/// Read-only view of a head for status displays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeadInfo {
    pub segment: SegmentKey,
    pub handle: HeadHandle,
    pub role: HeadRole,
    pub position: u64,
    pub volume: f32,
    /// 0 means infinite.
    pub remaining_loops: u32,
    pub loops_completed: u32,
}

impl From<&PlaybackHead> for HeadInfo {
    fn from(head: &PlaybackHead) -> Self {
        Self {
            segment: head.segment,
            handle: head.handle,
            role: head.role,
            position: head.position,
            volume: head.volume,
            remaining_loops: head.remaining_loops_count(),
            loops_completed: head.loops_completed,
        }
    }
}
