//! HeadPool: fixed slots for playback heads.

use crate::head::{HeadRole, PlaybackHead};

/// Identifier for a head slot in the pool.
pub type HeadId = usize;

/// Maximum number of simultaneous heads (music and stingers).
pub const MAX_HEADS: usize = 16;

/// Fixed-capacity pool of playback heads.
pub struct HeadPool {
    slots: Vec<Option<PlaybackHead>>,
}

impl HeadPool {
    /// Create a new empty pool.
    pub fn new() -> Self {
        Self {
            slots: (0..MAX_HEADS).map(|_| None).collect(),
        }
    }

    /// Find a slot for a new head.
    ///
    /// Prefers a free slot; otherwise the quietest fading-out head, which
    /// the caller evicts through `place`. Active and stinger heads are
    /// never stolen.
    pub fn find_slot(&self, now: u64) -> Option<HeadId> {
        if let Some(id) = self.slots.iter().position(|s| s.is_none()) {
            return Some(id);
        }
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|h| (i, h)))
            .filter(|(_, h)| h.role == HeadRole::FadingOut)
            .min_by(|(_, a), (_, b)| a.fade.value_at(now).total_cmp(&b.fade.value_at(now)))
            .map(|(i, _)| i)
    }

    /// Put a head into a slot, returning the head it evicted.
    pub fn place(&mut self, id: HeadId, head: PlaybackHead) -> Option<PlaybackHead> {
        self.slots[id].replace(head)
    }

    pub fn get(&self, id: HeadId) -> Option<&PlaybackHead> {
        self.slots.get(id).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: HeadId) -> Option<&mut PlaybackHead> {
        self.slots.get_mut(id).and_then(|s| s.as_mut())
    }

    pub fn remove(&mut self, id: HeadId) -> Option<PlaybackHead> {
        self.slots.get_mut(id).and_then(|s| s.take())
    }

    pub fn iter(&self) -> impl Iterator<Item = (HeadId, &PlaybackHead)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|h| (i, h)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (HeadId, &mut PlaybackHead)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.as_mut().map(|h| (i, h)))
    }

    /// Count of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_role(&self, role: HeadRole) -> usize {
        self.iter().filter(|(_, h)| h.role == role).count()
    }
}

impl Default for HeadPool {
    fn default() -> Self {
        Self::new()
    }
}
