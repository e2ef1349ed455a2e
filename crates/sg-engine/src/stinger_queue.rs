//! StingerQueue: one-shot cues played over ducked music.

use heapless::Deque;
use sg_ir::{MusicBank, Quantize, SegmentKey, Stinger};
use tracing::{debug, info, warn};

use crate::config::TransportConfig;
use crate::device::{HeadHandle, PlaybackDevice};
use crate::error::{Result, TransportError};
use crate::head::{HeadRole, PlaybackHead};
use crate::head_pool::{HeadId, HeadPool, MAX_HEADS};
use crate::planner::quantize_sample;
use crate::ramp::Ramp;

/// Stingers that can wait behind the one playing.
pub const STINGER_QUEUE_CAPACITY: usize = 16;

/// Where the active music head is, as read this tick (before loop wrapping).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MusicClock {
    pub segment: SegmentKey,
    pub handle: HeadHandle,
    pub position: u64,
}

/// Bus change the transport applies to the music.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DuckChange {
    /// Bring the music down to `level` over `fade` clock samples.
    Duck { level: f32, fade: u64 },
    /// Bring the music back to full level.
    Restore { fade: u64 },
}

#[derive(Clone, Copy, Debug)]
enum Current {
    /// Popped, waiting for its grid point in the music.
    Waiting {
        stinger: Stinger,
        trigger: u64,
        music: HeadHandle,
        last_position: u64,
    },
    Playing {
        stinger: Stinger,
        head: HeadId,
        restore_fade: u64,
    },
}

/// FIFO of stingers; only one plays at a time.
pub struct StingerQueue {
    pending: Deque<Stinger, STINGER_QUEUE_CAPACITY>,
    current: Option<Current>,
}

impl StingerQueue {
    pub fn new() -> Self {
        Self { pending: Deque::new(), current: None }
    }

    /// Add a stinger behind the waiting ones.
    pub fn enqueue(&mut self, stinger: Stinger) -> Result<()> {
        self.pending.push_back(stinger).map_err(|dropped| {
            warn!(stinger = %dropped.name, "stinger queue full");
            TransportError::StingerQueueFull(dropped.name.to_string())
        })
    }

    /// Stingers not yet started, including one waiting for its grid point.
    pub fn len(&self) -> usize {
        let waiting = matches!(self.current, Some(Current::Waiting { .. })) as usize;
        self.pending.len() + waiting
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.current, Some(Current::Playing { .. }))
    }

    /// The stinger currently sounding.
    pub fn playing(&self) -> Option<&Stinger> {
        match &self.current {
            Some(Current::Playing { stinger, .. }) => Some(stinger),
            _ => None,
        }
    }

    /// Head slot of the sounding stinger.
    pub fn playing_head(&self) -> Option<HeadId> {
        match self.current {
            Some(Current::Playing { head, .. }) => Some(head),
            _ => None,
        }
    }

    /// Start, finish or keep waiting on stingers for this tick.
    ///
    /// Returns the duck change the music bus should follow, if any.
    pub fn process_tick<D: PlaybackDevice + ?Sized>(
        &mut self,
        bank: &MusicBank,
        device: &mut D,
        heads: &mut HeadPool,
        music: Option<MusicClock>,
        now: u64,
        config: &TransportConfig,
    ) -> Option<DuckChange> {
        let current = self.current;
        match current {
            Some(Current::Playing { stinger, head, restore_fade }) => {
                if Self::still_playing(bank, device, heads, head) {
                    return None;
                }
                if let Some(done) = heads.remove(head) {
                    device.destroy(done.handle);
                }
                info!(stinger = %stinger.name, "stinger finished");
                self.current = None;
                // A queued stinger that starts right away keeps the music ducked
                match self.start_next(bank, device, heads, music, now, config) {
                    Some(duck @ DuckChange::Duck { .. }) => Some(duck),
                    _ => Some(DuckChange::Restore { fade: restore_fade }),
                }
            }
            Some(Current::Waiting { stinger, trigger, music: waited_on, last_position }) => {
                let due = match music {
                    Some(clock) if clock.handle == waited_on => {
                        clock.position >= trigger || clock.position < last_position
                    }
                    _ => true,
                };
                if due {
                    self.current = None;
                    return self.start(stinger, bank, device, heads, now, config);
                }
                if let (Some(clock), Some(Current::Waiting { last_position, .. })) =
                    (music, self.current.as_mut())
                {
                    *last_position = clock.position;
                }
                None
            }
            None => self.start_next(bank, device, heads, music, now, config),
        }
    }

    /// Pop the next pending stinger and start it, or park it until its grid point.
    fn start_next<D: PlaybackDevice + ?Sized>(
        &mut self,
        bank: &MusicBank,
        device: &mut D,
        heads: &mut HeadPool,
        music: Option<MusicClock>,
        now: u64,
        config: &TransportConfig,
    ) -> Option<DuckChange> {
        let stinger = self.pending.pop_front()?;
        let clock = match (stinger.quantize, music) {
            (Quantize::Immediate, _) | (_, None) => None,
            (_, Some(clock)) => Some(clock),
        };
        let waiting = clock.and_then(|clock| {
            let segment = bank.segment(clock.segment)?;
            let trigger = quantize_sample(segment, &stinger.quantize, clock.position);
            (trigger > clock.position).then_some((clock, trigger))
        });
        match waiting {
            Some((clock, trigger)) => {
                debug!(stinger = %stinger.name, trigger, "stinger waiting for grid");
                self.current = Some(Current::Waiting {
                    stinger,
                    trigger,
                    music: clock.handle,
                    last_position: clock.position,
                });
                None
            }
            None => self.start(stinger, bank, device, heads, now, config),
        }
    }

    fn still_playing<D: PlaybackDevice + ?Sized>(
        bank: &MusicBank,
        device: &D,
        heads: &mut HeadPool,
        id: HeadId,
    ) -> bool {
        let Some(head) = heads.get_mut(id) else {
            return false;
        };
        let (Some(position), Some(segment)) = (device.position(head.handle), bank.segment(head.segment))
        else {
            return false;
        };
        head.position = position;
        position < segment.length
    }

    fn start<D: PlaybackDevice + ?Sized>(
        &mut self,
        stinger: Stinger,
        bank: &MusicBank,
        device: &mut D,
        heads: &mut HeadPool,
        now: u64,
        config: &TransportConfig,
    ) -> Option<DuckChange> {
        let Some(segment) = bank.segment(stinger.segment) else {
            warn!(stinger = %stinger.name, "stinger segment is not resident");
            return None;
        };
        let Some(id) = heads.find_slot(now) else {
            warn!(stinger = %stinger.name, heads = MAX_HEADS, "no head for stinger");
            return None;
        };
        let handle = match device.create_head(segment) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(stinger = %stinger.name, %err, "stinger could not start");
                return None;
            }
        };
        let mut head = PlaybackHead::new(stinger.segment, segment, handle, 0, now, 0, config.crossfade_curve);
        head.role = HeadRole::Stinger;
        head.fade = Ramp::hold(stinger.volume);
        if let Some(evicted) = heads.place(id, head) {
            device.destroy(evicted.handle);
        }
        let fade = config.samples(stinger.duck_fade.unwrap_or(config.stinger_duck_fade));
        info!(stinger = %stinger.name, duck = stinger.duck, "stinger started");
        self.current = Some(Current::Playing { stinger, head: id, restore_fade: fade });
        Some(DuckChange::Duck { level: stinger.duck, fade })
    }
}

impl Default for StingerQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::VirtualDevice;
    use sg_ir::{MusicSegment, ResourceId};

    const SR: u32 = 44_100;

    struct Rig {
        bank: MusicBank,
        device: VirtualDevice,
        heads: HeadPool,
        config: TransportConfig,
        music: SegmentKey,
        hit: Stinger,
    }

    fn rig() -> Rig {
        let mut bank = MusicBank::new();
        let music = bank.add_segment(MusicSegment::new("calm", ResourceId(1), SR, 441_000));
        let hit_seg = bank.add_segment(MusicSegment::new("hit", ResourceId(2), SR, 22_050));
        let hit = Stinger::new("hit", hit_seg, 0.5);
        bank.add_stinger(hit);
        Rig {
            bank,
            device: VirtualDevice::new(SR),
            heads: HeadPool::new(),
            config: TransportConfig::default().with_sample_rate(SR),
            music,
            hit,
        }
    }

    impl Rig {
        fn tick(&mut self, queue: &mut StingerQueue, music: Option<MusicClock>, now: u64) -> Option<DuckChange> {
            queue.process_tick(&self.bank, &mut self.device, &mut self.heads, music, now, &self.config)
        }
    }

    #[test]
    fn full_queue_rejects() {
        let r = rig();
        let mut q = StingerQueue::new();
        for _ in 0..STINGER_QUEUE_CAPACITY {
            q.enqueue(r.hit).unwrap();
        }
        assert_eq!(
            q.enqueue(r.hit),
            Err(TransportError::StingerQueueFull("hit".into()))
        );
        assert_eq!(q.len(), STINGER_QUEUE_CAPACITY);
    }

    #[test]
    fn immediate_stinger_ducks_then_restores() {
        let mut r = rig();
        let mut q = StingerQueue::new();
        q.enqueue(r.hit).unwrap();
        assert_eq!(r.tick(&mut q, None, 0), Some(DuckChange::Duck { level: 0.5, fade: 0 }));
        assert!(q.is_playing());
        assert_eq!(r.heads.count_role(HeadRole::Stinger), 1);

        r.device.advance(10_000);
        assert_eq!(r.tick(&mut q, None, 10_000), None);
        r.device.advance(12_050);
        assert_eq!(r.tick(&mut q, None, 22_050), Some(DuckChange::Restore { fade: 0 }));
        assert!(!q.is_playing());
        assert!(r.heads.is_empty());
        assert_eq!(r.device.live_heads(), 0);
    }

    #[test]
    fn stingers_play_one_at_a_time() {
        let mut r = rig();
        let mut q = StingerQueue::new();
        q.enqueue(r.hit).unwrap();
        q.enqueue(r.hit).unwrap();
        r.tick(&mut q, None, 0);
        assert_eq!(q.len(), 1);
        r.device.advance(100);
        assert_eq!(r.tick(&mut q, None, 100), None);
        assert_eq!(r.heads.count_role(HeadRole::Stinger), 1);
    }

    #[test]
    fn back_to_back_stingers_hold_the_duck() {
        let mut r = rig();
        let mut q = StingerQueue::new();
        q.enqueue(r.hit).unwrap();
        q.enqueue(r.hit).unwrap();
        r.tick(&mut q, None, 0);
        r.device.advance(22_050);
        assert_eq!(r.tick(&mut q, None, 22_050), Some(DuckChange::Duck { level: 0.5, fade: 0 }));
        assert!(q.is_playing());
        assert!(q.is_empty());
        assert_eq!(r.heads.count_role(HeadRole::Stinger), 1);
        assert_eq!(r.device.live_heads(), 1);

        r.device.advance(22_050);
        assert_eq!(r.tick(&mut q, None, 44_100), Some(DuckChange::Restore { fade: 0 }));
        assert_eq!(r.device.live_heads(), 0);
    }

    #[test]
    fn restore_while_next_stinger_waits_for_grid() {
        let mut r = rig();
        let mut q = StingerQueue::new();
        q.enqueue(r.hit).unwrap();
        q.enqueue(r.hit.with_quantize(Quantize::NextBar)).unwrap();
        let clock = MusicClock { segment: r.music, handle: HeadHandle(7), position: 0 };
        r.tick(&mut q, Some(clock), 0);
        r.device.advance(22_050);
        let clock = MusicClock { position: 22_050, ..clock };
        assert_eq!(r.tick(&mut q, Some(clock), 22_050), Some(DuckChange::Restore { fade: 0 }));
        assert!(!q.is_playing());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn quantized_stinger_waits_for_bar() {
        let mut r = rig();
        let mut q = StingerQueue::new();
        q.enqueue(r.hit.with_quantize(Quantize::NextBar)).unwrap();
        let music = r.music;
        let clock = move |position| MusicClock { segment: music, handle: HeadHandle(99), position };
        assert_eq!(r.tick(&mut q, Some(clock(22_050)), 22_050), None);
        assert_eq!(q.len(), 1);
        assert_eq!(r.tick(&mut q, Some(clock(88_199)), 88_199), None);
        assert!(matches!(
            r.tick(&mut q, Some(clock(88_200)), 88_200),
            Some(DuckChange::Duck { .. })
        ));
        assert!(q.is_playing());
    }

    #[test]
    fn waiting_stinger_starts_when_music_changes() {
        let mut r = rig();
        let mut q = StingerQueue::new();
        q.enqueue(r.hit.with_quantize(Quantize::NextBar)).unwrap();
        let clock = MusicClock { segment: r.music, handle: HeadHandle(1), position: 10 };
        r.tick(&mut q, Some(clock), 10);
        assert!(!q.is_playing());
        r.tick(&mut q, None, 20);
        assert!(q.is_playing());
    }

    #[test]
    fn device_failure_drops_the_stinger() {
        let mut r = rig();
        let mut q = StingerQueue::new();
        q.enqueue(r.hit).unwrap();
        r.device.fail_next_create();
        assert_eq!(r.tick(&mut q, None, 0), None);
        assert!(q.is_empty());
        assert!(!q.is_playing());
    }
}
