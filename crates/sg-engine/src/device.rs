//! Playback device seam and an in-process virtual device.

use slotmap::{Key, KeyData, SlotMap};
use sg_ir::MusicSegment;

use crate::error::DeviceError;

/// Device-issued identifier of one playing instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HeadHandle(pub u64);

/// The audio engine that actually renders music heads.
///
/// Positions are in the segment's own samples. A created head starts
/// playing from sample 0 at full volume.
pub trait PlaybackDevice {
    /// Start a new head for the segment's resource.
    fn create_head(&mut self, segment: &MusicSegment) -> Result<HeadHandle, DeviceError>;

    fn set_volume(&mut self, head: HeadHandle, volume: f32);

    fn set_pitch(&mut self, head: HeadHandle, pitch: f32);

    /// Current sample position, `None` for unknown handles.
    fn position(&self, head: HeadHandle) -> Option<u64>;

    fn seek(&mut self, head: HeadHandle, position: u64);

    /// Freeze or resume a head's position.
    fn set_paused(&mut self, head: HeadHandle, paused: bool);

    fn destroy(&mut self, head: HeadHandle);
}

slotmap::new_key_type! {
    struct SimKey;
}

/// Maximum heads the virtual device plays at once.
pub const VIRTUAL_DEVICE_CHANNELS: usize = 32;

#[derive(Clone, Debug)]
struct SimHead {
    /// Position in source samples, fractional for resampling.
    position: f64,
    length: u64,
    source_rate: u32,
    pitch: f32,
    volume: f32,
    paused: bool,
}

/// A device that renders nothing but keeps exact head positions.
///
/// Positions advance when the host clock calls `advance` with elapsed
/// output samples, resampled by `source_rate / output_rate * pitch`.
/// Heads stop at the end of their segment.
pub struct VirtualDevice {
    output_rate: u32,
    heads: SlotMap<SimKey, SimHead>,
    fail_next_create: bool,
}

impl VirtualDevice {
    pub fn new(output_rate: u32) -> Self {
        Self {
            output_rate,
            heads: SlotMap::with_capacity_and_key(VIRTUAL_DEVICE_CHANNELS),
            fail_next_create: false,
        }
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Advance every unpaused head by `frames` output samples.
    pub fn advance(&mut self, frames: u64) {
        for head in self.heads.values_mut() {
            if head.paused {
                continue;
            }
            let step = frames as f64 * head.source_rate as f64 / self.output_rate as f64
                * head.pitch as f64;
            head.position = (head.position + step).min(head.length as f64);
        }
    }

    /// Make the next `create_head` call fail.
    pub fn fail_next_create(&mut self) {
        self.fail_next_create = true;
    }

    pub fn live_heads(&self) -> usize {
        self.heads.len()
    }

    pub fn is_alive(&self, head: HeadHandle) -> bool {
        self.heads.contains_key(Self::key(head))
    }

    pub fn volume(&self, head: HeadHandle) -> Option<f32> {
        self.heads.get(Self::key(head)).map(|h| h.volume)
    }

    pub fn pitch(&self, head: HeadHandle) -> Option<f32> {
        self.heads.get(Self::key(head)).map(|h| h.pitch)
    }

    pub fn is_paused(&self, head: HeadHandle) -> Option<bool> {
        self.heads.get(Self::key(head)).map(|h| h.paused)
    }

    fn key(head: HeadHandle) -> SimKey {
        KeyData::from_ffi(head.0).into()
    }
}

impl PlaybackDevice for VirtualDevice {
    fn create_head(&mut self, segment: &MusicSegment) -> Result<HeadHandle, DeviceError> {
        if std::mem::take(&mut self.fail_next_create) {
            return Err(DeviceError::Unplayable(segment.resource));
        }
        if self.heads.len() >= VIRTUAL_DEVICE_CHANNELS {
            return Err(DeviceError::NoChannel);
        }
        let key = self.heads.insert(SimHead {
            position: 0.0,
            length: segment.length,
            source_rate: segment.sample_rate,
            pitch: 1.0,
            volume: 1.0,
            paused: false,
        });
        Ok(HeadHandle(key.data().as_ffi()))
    }

    fn set_volume(&mut self, head: HeadHandle, volume: f32) {
        if let Some(h) = self.heads.get_mut(Self::key(head)) {
            h.volume = volume;
        }
    }

    fn set_pitch(&mut self, head: HeadHandle, pitch: f32) {
        if let Some(h) = self.heads.get_mut(Self::key(head)) {
            h.pitch = pitch.max(0.0);
        }
    }

    fn position(&self, head: HeadHandle) -> Option<u64> {
        self.heads.get(Self::key(head)).map(|h| h.position as u64)
    }

    fn seek(&mut self, head: HeadHandle, position: u64) {
        if let Some(h) = self.heads.get_mut(Self::key(head)) {
            h.position = position.min(h.length) as f64;
        }
    }

    fn set_paused(&mut self, head: HeadHandle, paused: bool) {
        if let Some(h) = self.heads.get_mut(Self::key(head)) {
            h.paused = paused;
        }
    }

    fn destroy(&mut self, head: HeadHandle) {
        self.heads.remove(Self::key(head));
    }
}
