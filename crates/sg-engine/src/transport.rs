//! MusicTransport: the sample-accurate music state machine.

use std::collections::BTreeMap;

use sg_ir::{name, Entry, FadeCurve, MusicAsset, MusicBank, MusicSegment, Name, SegmentKey};
use tracing::{debug, info, warn};

use crate::config::TransportConfig;
use crate::device::PlaybackDevice;
use crate::error::{Result, TransportError};
use crate::head::{HeadInfo, HeadRole, LoopCrossing, PlaybackHead};
use crate::head_pool::{HeadId, HeadPool, MAX_HEADS};
use crate::planner::{entry_sample, plan_transition, rescale};
use crate::ramp::Ramp;
use crate::status::{
    PlayingStatus, RequestStatus, SequencingStatus, SwitchingStatus, TransitioningStatus,
};
use crate::stinger_queue::{DuckChange, MusicClock, StingerQueue};

/// Fades and offsets of a music request, in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlayOptions {
    /// Fade-in of the new music.
    pub fade_in: f32,
    /// Fade-out of the music being replaced.
    pub fade_out: f32,
    /// Delay added to the quantised trigger, in origin seconds.
    pub exit_offset: f32,
    /// Start this far into the destination.
    pub entry_offset: f32,
}

impl PlayOptions {
    pub fn fades(fade_in: f32, fade_out: f32) -> Self {
        Self { fade_in, fade_out, ..Self::default() }
    }

    pub fn with_exit_offset(mut self, seconds: f32) -> Self {
        self.exit_offset = seconds;
        self
    }

    pub fn with_entry_offset(mut self, seconds: f32) -> Self {
        self.entry_offset = seconds;
        self
    }
}

/// Which part of the current asset the active head plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cursor {
    Segment,
    Sequence { index: usize },
    Switch,
    /// A bridge between two assets.
    Bridge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChangeKind {
    Transition,
    SequenceStep,
    Switch,
}

/// Destination to schedule once a bridge has started.
#[derive(Clone, Copy, Debug)]
struct FollowUp {
    segment: SegmentKey,
    entry: Entry,
    entry_offset: u64,
    cursor: Cursor,
}

/// The single scheduled change of music.
#[derive(Clone, Copy, Debug)]
struct PendingChange {
    kind: ChangeKind,
    /// Sample of the active head at which the change fires.
    trigger: u64,
    segment: SegmentKey,
    entry: Entry,
    /// Extra destination samples past the entry point.
    entry_offset: u64,
    event: Name,
    cursor: Cursor,
    then: Option<FollowUp>,
    /// Clock samples.
    fade_in: u64,
    fade_out: u64,
}

/// Schedules music heads on a playback device.
///
/// Driven by `update` once per frame with the elapsed output samples. All
/// requests are answered immediately; scheduled changes fire inside
/// `update` at the exact sample they were quantised to.
pub struct MusicTransport {
    config: TransportConfig,
    heads: HeadPool,
    active: Option<HeadId>,
    current_event: Option<Name>,
    cursor: Option<Cursor>,
    playing: PlayingStatus,
    pending: Option<PendingChange>,
    stingers: StingerQueue,
    /// Active head as read by the last update, before loop wrapping.
    music_clock: Option<MusicClock>,
    duck: Ramp,
    pause: Ramp,
    mute: Ramp,
    pause_requested: bool,
    /// Heads are frozen on the device.
    paused: bool,
    pitch: f32,
    switch_values: BTreeMap<Name, Name>,
    /// Transport clock in output samples.
    now: u64,
}

impl MusicTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            heads: HeadPool::new(),
            active: None,
            current_event: None,
            cursor: None,
            playing: PlayingStatus::Idle,
            pending: None,
            stingers: StingerQueue::new(),
            music_clock: None,
            duck: Ramp::hold(1.0),
            pause: Ramp::hold(1.0),
            mute: Ramp::hold(1.0),
            pause_requested: false,
            paused: false,
            pitch: 1.0,
            switch_values: BTreeMap::new(),
            now: 0,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    // --- Requests ---

    /// Play `asset`, or schedule a transition to it from the current music.
    pub fn set_music_queue<D: PlaybackDevice + ?Sized>(
        &mut self,
        bank: &MusicBank,
        device: &mut D,
        asset: &str,
        options: PlayOptions,
    ) -> Result<RequestStatus> {
        let (key, cursor) = self.resolve_asset(bank, asset)?;
        let event = name(asset);
        let Some(segment) = bank.segment(key) else {
            warn!(asset, "asset refers to a segment that is not resident");
            return Err(TransportError::NotFound(asset.into()));
        };

        let active = self.active.filter(|_| self.playing == PlayingStatus::Playing);
        let Some(active) = active else {
            return self.start_fresh(device, key, segment, event, cursor, options);
        };

        let bridging = self.cursor == Some(Cursor::Bridge);
        if self.current_event == Some(event) && !bridging {
            return Ok(match self.pending {
                Some(p) if p.kind == ChangeKind::Transition => {
                    info!(asset, trigger = p.trigger, "pending transition cancelled");
                    self.pending = None;
                    RequestStatus::Cancelled
                }
                _ => RequestStatus::Unchanged,
            });
        }
        if let Some(p) = self.pending {
            if p.kind == ChangeKind::Transition && p.event == event {
                return Ok(RequestStatus::Unchanged);
            }
        }

        let Some((origin_key, origin, position)) = self.active_origin(bank, device, active) else {
            return self.start_fresh(device, key, segment, event, cursor, options);
        };
        let plan = plan_transition(bank.rules(), &origin, origin_key, key, position);
        let delayed = plan.trigger.saturating_add(origin.seconds_to_samples(options.exit_offset));
        let trigger = delayed.min(origin.effective_end().max(plan.trigger));
        let entry_offset = segment.seconds_to_samples(options.entry_offset);

        let bridge = plan.bridge.filter(|b| {
            let resident = bank.segment(*b).is_some();
            if !resident {
                debug!(asset, "bridge segment is not resident, transitioning directly");
            }
            resident
        });
        let change = match bridge {
            Some(bridge) => PendingChange {
                kind: ChangeKind::Transition,
                trigger,
                segment: bridge,
                entry: Entry::SegmentStart,
                entry_offset: 0,
                event,
                cursor: Cursor::Bridge,
                then: Some(FollowUp { segment: key, entry: plan.entry, entry_offset, cursor }),
                fade_in: self.config.samples(options.fade_in),
                fade_out: self.config.samples(options.fade_out),
            },
            None => PendingChange {
                kind: ChangeKind::Transition,
                trigger,
                segment: key,
                entry: plan.entry,
                entry_offset,
                event,
                cursor,
                then: None,
                fade_in: self.config.samples(options.fade_in),
                fade_out: self.config.samples(options.fade_out),
            },
        };
        if let Some(replaced) = self.pending.replace(change) {
            debug!(replaced = %replaced.event, asset, "pending change replaced");
        }
        info!(asset, trigger, tier = ?plan.tier, "transition queued");
        Ok(RequestStatus::Queued { trigger })
    }

    /// Set a switch group value; a playing switch on that group follows it.
    pub fn set_switch<D: PlaybackDevice + ?Sized>(
        &mut self,
        bank: &MusicBank,
        device: &mut D,
        group: &str,
        value: &str,
        fade: f32,
    ) -> Result<RequestStatus> {
        self.switch_values.insert(name(group), name(value));

        let Some(MusicAsset::Switch(switch)) = self.current_event.and_then(|e| bank.asset(e.as_str()))
        else {
            return Ok(RequestStatus::Accepted);
        };
        if switch.group.as_str() != group
            || self.cursor != Some(Cursor::Switch)
            || self.playing != PlayingStatus::Playing
            || self.pending.is_some_and(|p| p.kind == ChangeKind::Transition)
        {
            return Ok(RequestStatus::Accepted);
        }
        let Some(target) = switch.variant(value) else {
            warn!(group, value, "switch value has no variant");
            return Err(TransportError::NotFound(value.into()));
        };
        if bank.segment(target).is_none() {
            warn!(group, value, "switch variant is not resident");
            return Err(TransportError::NotFound(value.into()));
        }
        let Some(active) = self.active else {
            return Ok(RequestStatus::Accepted);
        };
        let Some((origin_key, origin, position)) = self.active_origin(bank, device, active) else {
            return Ok(RequestStatus::Accepted);
        };
        if origin_key == target {
            return Ok(match self.pending {
                Some(p) if p.kind == ChangeKind::Switch => {
                    self.pending = None;
                    RequestStatus::Cancelled
                }
                _ => RequestStatus::Unchanged,
            });
        }

        let plan = plan_transition(bank.rules(), &origin, origin_key, target, position);
        let fade = self.config.samples(fade);
        let Some(event) = self.current_event else {
            return Ok(RequestStatus::Accepted);
        };
        self.pending = Some(PendingChange {
            kind: ChangeKind::Switch,
            trigger: plan.trigger,
            segment: target,
            entry: Entry::MatchPosition,
            entry_offset: 0,
            event,
            cursor: Cursor::Switch,
            then: None,
            fade_in: fade,
            fade_out: fade,
        });
        info!(group, value, trigger = plan.trigger, "switch queued");
        Ok(RequestStatus::Queued { trigger: plan.trigger })
    }

    /// Queue a stinger over the current music.
    pub fn queue_stinger(&mut self, bank: &MusicBank, stinger: &str) -> Result<RequestStatus> {
        let Some(cue) = bank.stinger(stinger) else {
            warn!(stinger, "stinger not found");
            return Err(TransportError::NotFound(stinger.into()));
        };
        self.stingers.enqueue(*cue)?;
        Ok(RequestStatus::Accepted)
    }

    /// Fade every music head out and return to idle. Stingers keep playing.
    pub fn stop<D: PlaybackDevice + ?Sized>(&mut self, device: &mut D, fade: f32) -> RequestStatus {
        if self.playing == PlayingStatus::Idle {
            return RequestStatus::Unchanged;
        }
        let fade = self.config.samples(fade);
        let now = self.now;
        let curve = self.config.crossfade_curve;
        for (_, head) in self.heads.iter_mut() {
            if head.role == HeadRole::Active {
                head.fade_out(now, fade, curve);
            }
        }
        self.pending = None;
        self.active = None;
        self.current_event = None;
        self.cursor = None;
        self.playing = PlayingStatus::Stopping;
        info!(fade, "music stopping");

        if fade == 0 || self.paused {
            self.destroy_music(device);
        }
        self.apply_volumes(device);
        RequestStatus::Accepted
    }

    /// Fade the output out, then freeze every head where it is.
    pub fn pause<D: PlaybackDevice + ?Sized>(&mut self, device: &mut D, fade: f32) -> RequestStatus {
        if self.pause_requested {
            return RequestStatus::Unchanged;
        }
        self.pause_requested = true;
        self.pause.retarget(self.now, 0.0, self.config.samples(fade), FadeCurve::Linear);
        info!(fade, "pausing");
        self.apply_volumes(device);
        RequestStatus::Accepted
    }

    /// Unfreeze heads and fade the output back in.
    pub fn resume<D: PlaybackDevice + ?Sized>(&mut self, device: &mut D, fade: f32) -> RequestStatus {
        if !self.pause_requested {
            return RequestStatus::Unchanged;
        }
        self.unpause(device);
        self.pause.retarget(self.now, 1.0, self.config.samples(fade), FadeCurve::Linear);
        info!(fade, "resuming");
        self.apply_volumes(device);
        RequestStatus::Accepted
    }

    /// Silence the output; positions keep advancing.
    pub fn mute(&mut self, fade: f32) -> RequestStatus {
        self.ramp_mute(0.0, fade)
    }

    pub fn unmute(&mut self, fade: f32) -> RequestStatus {
        self.ramp_mute(1.0, fade)
    }

    fn ramp_mute(&mut self, to: f32, fade: f32) -> RequestStatus {
        if self.mute.target() == to {
            return RequestStatus::Unchanged;
        }
        self.mute.retarget(self.now, to, self.config.samples(fade), FadeCurve::Linear);
        RequestStatus::Accepted
    }

    /// Drop the scheduled change, if any.
    pub fn cancel_pending(&mut self) -> RequestStatus {
        match self.pending.take() {
            Some(p) => {
                info!(event = %p.event, "pending change cancelled");
                RequestStatus::Cancelled
            }
            None => RequestStatus::Unchanged,
        }
    }

    /// Playback rate of every music head (1.0 = original speed).
    pub fn set_pitch<D: PlaybackDevice + ?Sized>(&mut self, device: &mut D, pitch: f32) {
        self.pitch = pitch.max(0.0);
        for (_, head) in self.heads.iter() {
            if head.is_music() {
                device.set_pitch(head.handle, self.pitch);
            }
        }
    }

    // --- Clock ---

    /// Advance the transport by `elapsed` output samples.
    ///
    /// Call after the device has rendered those samples so head positions
    /// are current.
    pub fn update<D: PlaybackDevice + ?Sized>(
        &mut self,
        bank: &MusicBank,
        device: &mut D,
        elapsed: u64,
    ) {
        self.now += elapsed;
        if self.paused {
            for (_, head) in self.heads.iter_mut() {
                head.fade.delay(elapsed);
            }
            self.duck.delay(elapsed);
            self.mute.delay(elapsed);
            return;
        }
        self.music_clock = None;
        if self.playing == PlayingStatus::Playing {
            self.advance_active(bank, device);
        }
        self.process_stingers(bank, device);
        self.apply_volumes(device);
    }

    fn advance_active<D: PlaybackDevice + ?Sized>(&mut self, bank: &MusicBank, device: &mut D) {
        let Some(id) = self.active else {
            return;
        };
        let Some(head) = self.heads.get_mut(id) else {
            self.finish(device);
            return;
        };
        let (key, handle, last) = (head.segment, head.handle, head.position);
        let Some(segment) = bank.segment(key) else {
            warn!("active segment was unloaded");
            self.segment_end(bank, device, last);
            return;
        };
        let Some(position) = device.position(handle) else {
            warn!(segment = %segment.name, "device dropped the active head");
            self.segment_end(bank, device, last);
            return;
        };
        head.position = position;
        self.music_clock = Some(MusicClock { segment: key, handle, position });

        if self.pending.is_some_and(|p| position >= p.trigger) && self.fire(bank, device, position) {
            return;
        }

        let crossing = segment
            .active_loop()
            .filter(|lr| position >= lr.end)
            .and_then(|lr| Some((lr, self.heads.get_mut(id)?.cross_loop())));
        match crossing {
            Some((lr, LoopCrossing::Wrap)) => {
                let wrapped = lr.start + (position - lr.end) % lr.len();
                device.seek(handle, wrapped);
                if let Some(head) = self.heads.get_mut(id) {
                    head.position = wrapped;
                }
                debug!(segment = %segment.name, wrapped, "loop wrapped");
            }
            Some((_, LoopCrossing::Exhausted)) => {
                debug!(segment = %segment.name, "last loop pass finished");
                self.segment_end(bank, device, position);
                return;
            }
            None if position >= segment.length => {
                self.segment_end(bank, device, position);
                return;
            }
            None => {}
        }
        self.plan_sequence_step(bank);
    }

    /// Schedule the next sequence member once the active one is on its last pass.
    fn plan_sequence_step(&mut self, bank: &MusicBank) {
        if self.pending.is_some() {
            return;
        }
        let (Some(Cursor::Sequence { index }), Some(event), Some(id)) =
            (self.cursor, self.current_event, self.active)
        else {
            return;
        };
        let Some(head) = self.heads.get(id) else {
            return;
        };
        let Some(segment) = bank.segment(head.segment) else {
            return;
        };
        let last_pass = match head.remaining_loops {
            None => !segment.has_loop(),
            Some(n) => n <= 1,
        };
        if !last_pass {
            return;
        }
        let Some(MusicAsset::Sequence(sequence)) = bank.asset(event.as_str()) else {
            return;
        };
        let Some(next) = sequence.next_index(index) else {
            return;
        };
        let Some(&key) = sequence.segments.get(next) else {
            return;
        };
        if bank.segment(key).is_none() {
            return;
        }
        let trigger = segment.effective_end();
        self.pending = Some(PendingChange {
            kind: ChangeKind::SequenceStep,
            trigger,
            segment: key,
            entry: Entry::SegmentStart,
            entry_offset: 0,
            event,
            cursor: Cursor::Sequence { index: next },
            then: None,
            fade_in: 0,
            fade_out: 0,
        });
        debug!(sequence = %event, next, trigger, "sequence step scheduled");
    }

    /// The active segment ran out: fire the pending change or stop.
    fn segment_end<D: PlaybackDevice + ?Sized>(
        &mut self,
        bank: &MusicBank,
        device: &mut D,
        position: u64,
    ) {
        self.plan_sequence_step(bank);
        if self.pending.is_some() && self.fire(bank, device, position) {
            return;
        }
        self.finish(device);
    }

    /// Start the pending change's head at the trigger plus overshoot.
    ///
    /// Returns false, keeping the current music, when the head cannot start.
    fn fire<D: PlaybackDevice + ?Sized>(
        &mut self,
        bank: &MusicBank,
        device: &mut D,
        position: u64,
    ) -> bool {
        let Some(change) = self.pending.take() else {
            return false;
        };
        let Some(destination) = bank.segment(change.segment) else {
            warn!(event = %change.event, "destination segment is not resident");
            return false;
        };
        let origin = self
            .active
            .and_then(|id| self.heads.get(id))
            .and_then(|head| bank.segment(head.segment));
        let overshoot = position.saturating_sub(change.trigger);
        let origin_rate = origin.map_or(destination.sample_rate, |o| o.sample_rate);
        let entry = entry_sample(destination, &change.entry, origin.map(|o| (o, change.trigger)));
        let start = entry
            .saturating_add(change.entry_offset)
            .saturating_add(rescale(overshoot, origin_rate, destination.sample_rate))
            .min(destination.length.saturating_sub(1));

        let id = match self.start_head(device, change.segment, destination, start, change.fade_in) {
            Ok(id) => id,
            Err(err) => {
                warn!(event = %change.event, segment = %destination.name, %err, "change could not start");
                return false;
            }
        };
        let now = self.now;
        let curve = self.config.crossfade_curve;
        if let Some(old) = self.active.and_then(|old| self.heads.get_mut(old)) {
            old.fade_out(now, change.fade_out, curve);
        }
        self.active = Some(id);
        self.cursor = Some(change.cursor);
        match change.then {
            Some(follow) => {
                self.pending = Some(PendingChange {
                    kind: ChangeKind::Transition,
                    trigger: destination.effective_end(),
                    segment: follow.segment,
                    entry: follow.entry,
                    entry_offset: follow.entry_offset,
                    event: change.event,
                    cursor: follow.cursor,
                    then: None,
                    fade_in: 0,
                    fade_out: 0,
                });
                info!(event = %change.event, bridge = %destination.name, start, "bridge started");
            }
            None => {
                self.current_event = Some(change.event);
                info!(event = %change.event, segment = %destination.name, start, overshoot, "change fired");
            }
        }
        true
    }

    /// Natural end of the music.
    fn finish<D: PlaybackDevice + ?Sized>(&mut self, device: &mut D) {
        if let Some(head) = self.active.take().and_then(|id| self.heads.remove(id)) {
            device.destroy(head.handle);
        }
        self.pending = None;
        self.cursor = None;
        self.playing = PlayingStatus::Idle;
        if let Some(event) = self.current_event.take() {
            info!(event = %event, "music finished");
        }
    }

    fn process_stingers<D: PlaybackDevice + ?Sized>(&mut self, bank: &MusicBank, device: &mut D) {
        let change = self.stingers.process_tick(
            bank,
            device,
            &mut self.heads,
            self.music_clock,
            self.now,
            &self.config,
        );
        match change {
            Some(DuckChange::Duck { level, fade }) => {
                self.duck.retarget(self.now, level, fade, FadeCurve::Linear)
            }
            Some(DuckChange::Restore { fade }) => {
                self.duck.retarget(self.now, 1.0, fade, FadeCurve::Linear)
            }
            None => {}
        }
    }

    /// Push head volumes to the device and reap silent heads.
    fn apply_volumes<D: PlaybackDevice + ?Sized>(&mut self, device: &mut D) {
        let now = self.now;
        let bus = self.pause.value_at(now) * self.mute.value_at(now) * self.config.master_volume;
        let duck = self.duck.value_at(now);
        for (_, head) in self.heads.iter_mut() {
            let gain = if head.is_music() { bus * duck } else { bus };
            head.volume = head.fade.value_at(now) * gain;
            device.set_volume(head.handle, head.volume);
        }
        for id in 0..MAX_HEADS {
            if self.heads.get(id).is_some_and(|h| h.is_spent(now)) {
                if let Some(head) = self.heads.remove(id) {
                    device.destroy(head.handle);
                }
            }
        }
        if self.playing == PlayingStatus::Stopping && !self.heads.iter().any(|(_, h)| h.is_music()) {
            self.playing = PlayingStatus::Idle;
            info!("music stopped");
        }
        if self.pause_requested && !self.paused && self.pause.is_settled(now) {
            for (_, head) in self.heads.iter() {
                device.set_paused(head.handle, true);
            }
            self.paused = true;
            info!("paused");
        }
    }

    // --- Helpers ---

    fn resolve_asset(&self, bank: &MusicBank, asset: &str) -> Result<(SegmentKey, Cursor)> {
        let resolved = match bank.asset(asset) {
            Some(MusicAsset::Segment(key)) => Some((*key, Cursor::Segment)),
            Some(MusicAsset::Sequence(seq)) => {
                seq.segments.first().map(|k| (*k, Cursor::Sequence { index: 0 }))
            }
            Some(MusicAsset::Switch(switch)) => {
                let value = self.switch_values.get(&switch.group).map(|v| v.as_str());
                switch.select(value).map(|k| (k, Cursor::Switch))
            }
            None => None,
        };
        resolved.ok_or_else(|| {
            warn!(asset, "music asset not found");
            TransportError::NotFound(asset.into())
        })
    }

    /// Key, metadata and fresh device position of the active head.
    fn active_origin<D: PlaybackDevice + ?Sized>(
        &mut self,
        bank: &MusicBank,
        device: &D,
        active: HeadId,
    ) -> Option<(SegmentKey, MusicSegment, u64)> {
        let head = self.heads.get_mut(active)?;
        let origin = bank.segment(head.segment)?.clone();
        if let Some(position) = device.position(head.handle) {
            head.position = position;
        }
        Some((head.segment, origin, head.position))
    }

    fn start_fresh<D: PlaybackDevice + ?Sized>(
        &mut self,
        device: &mut D,
        key: SegmentKey,
        segment: &MusicSegment,
        event: Name,
        cursor: Cursor,
        options: PlayOptions,
    ) -> Result<RequestStatus> {
        let entry = segment
            .seconds_to_samples(options.entry_offset)
            .min(segment.length.saturating_sub(1));
        let fade_in = self.config.samples(options.fade_in);
        let id = self.start_head(device, key, segment, entry, fade_in).map_err(|err| {
            warn!(event = %event, %err, "music could not start");
            err
        })?;
        if self.pause_requested {
            self.unpause(device);
            self.pause = Ramp::hold(1.0);
        }
        self.active = Some(id);
        self.playing = PlayingStatus::Playing;
        self.current_event = Some(event);
        self.cursor = Some(cursor);
        self.pending = None;
        info!(event = %event, segment = %segment.name, entry, "music started");
        self.apply_volumes(device);
        Ok(RequestStatus::Started)
    }

    fn start_head<D: PlaybackDevice + ?Sized>(
        &mut self,
        device: &mut D,
        key: SegmentKey,
        segment: &MusicSegment,
        start: u64,
        fade_in: u64,
    ) -> Result<HeadId> {
        let id = self
            .heads
            .find_slot(self.now)
            .ok_or(TransportError::HeadPoolExhausted(MAX_HEADS))?;
        let handle = device.create_head(segment)?;
        if start > 0 {
            device.seek(handle, start);
        }
        if self.pitch != 1.0 {
            device.set_pitch(handle, self.pitch);
        }
        let head = PlaybackHead::new(key, segment, handle, start, self.now, fade_in, self.config.crossfade_curve);
        if let Some(evicted) = self.heads.place(id, head) {
            debug!(handle = evicted.handle.0, "fading head stolen");
            device.destroy(evicted.handle);
        }
        Ok(id)
    }

    fn unpause<D: PlaybackDevice + ?Sized>(&mut self, device: &mut D) {
        self.pause_requested = false;
        if self.paused {
            for (_, head) in self.heads.iter() {
                device.set_paused(head.handle, false);
            }
            self.paused = false;
        }
    }

    fn destroy_music<D: PlaybackDevice + ?Sized>(&mut self, device: &mut D) {
        for id in 0..MAX_HEADS {
            if self.heads.get(id).is_some_and(|h| h.is_music()) {
                if let Some(head) = self.heads.remove(id) {
                    device.destroy(head.handle);
                }
            }
        }
    }

    // --- Status ---

    pub fn playing_status(&self) -> PlayingStatus {
        self.playing
    }

    pub fn transitioning_status(&self) -> TransitioningStatus {
        match self.pending {
            Some(p) if p.kind == ChangeKind::Transition => TransitioningStatus::Transitioning,
            _ => TransitioningStatus::None,
        }
    }

    pub fn sequencing_status(&self) -> SequencingStatus {
        match self.pending {
            Some(p) if p.kind == ChangeKind::SequenceStep => SequencingStatus::ChangingSequence,
            _ => SequencingStatus::None,
        }
    }

    pub fn switching_status(&self) -> SwitchingStatus {
        match self.pending {
            Some(p) if p.kind == ChangeKind::Switch => SwitchingStatus::Switching,
            _ => SwitchingStatus::None,
        }
    }

    /// Asset name of the music playing now.
    pub fn current_event(&self) -> Option<&str> {
        self.current_event.as_ref().map(|e| e.as_str())
    }

    /// Segment of the active head.
    pub fn current_segment(&self) -> Option<SegmentKey> {
        self.active.and_then(|id| self.heads.get(id)).map(|h| h.segment)
    }

    /// Position of the active head in its segment's samples.
    pub fn position(&self) -> Option<u64> {
        self.active.and_then(|id| self.heads.get(id)).map(|h| h.position)
    }

    /// Every sounding music head, active first.
    pub fn active_tracks(&self) -> impl Iterator<Item = HeadInfo> + '_ {
        let active = self.active.and_then(|id| self.heads.get(id));
        let others = self
            .heads
            .iter()
            .filter(move |(id, h)| h.is_music() && Some(*id) != self.active)
            .map(|(_, h)| h);
        active.into_iter().chain(others).map(HeadInfo::from)
    }

    /// Trigger sample of the scheduled change, in the active head's samples.
    pub fn pending_trigger(&self) -> Option<u64> {
        self.pending.map(|p| p.trigger)
    }

    /// Destination asset of the scheduled change.
    pub fn pending_event(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.event.as_str())
    }

    pub fn stingers_pending(&self) -> usize {
        self.stingers.len()
    }

    pub fn stinger_playing(&self) -> Option<&str> {
        self.stingers.playing().map(|s| s.name.as_str())
    }

    /// Info of the sounding stinger head.
    pub fn stinger_track(&self) -> Option<HeadInfo> {
        self.stingers
            .playing_head()
            .and_then(|id| self.heads.get(id))
            .map(HeadInfo::from)
    }

    /// Transport clock in output samples.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_pause_requested(&self) -> bool {
        self.pause_requested
    }

    pub fn is_muted(&self) -> bool {
        self.mute.target() == 0.0
    }

    /// Current music duck gain.
    pub fn duck_level(&self) -> f32 {
        self.duck.value_at(self.now)
    }

    /// Value recorded for a switch group.
    pub fn switch_value(&self, group: &str) -> Option<&str> {
        self.switch_values.get(group).map(|v| v.as_str())
    }
}
