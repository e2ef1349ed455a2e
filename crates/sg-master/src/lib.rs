//! Headless controller for the segue music transport.
//!
//! Owns a bank, a transport and a virtual playback device, and exposes the
//! caller-facing music API. Requests can be made directly or queued from
//! another thread through a `CommandSender`.

mod clock_thread;
mod command;
mod snapshot;

use std::path::Path;
use std::time::Duration;

use ringbuf::traits::{Consumer, Split};
use ringbuf::{HeapCons, HeapRb};
use sg_engine::{
    MusicTransport, PlayOptions, RequestStatus, TransportConfig, TransportError, VirtualDevice,
};
use sg_formats::{FormatError, LoadedBank};
use sg_ir::MusicBank;
use tracing::{info, warn};

pub use clock_thread::RunningController;
pub use command::{Command, CommandSender, COMMAND_QUEUE_CAPACITY};
pub use snapshot::Snapshot;

/// Music playback controller.
pub struct Controller {
    bank: MusicBank,
    transport: MusicTransport,
    device: VirtualDevice,
    commands: HeapCons<Command>,
    sender: Option<CommandSender>,
}

impl Controller {
    pub fn new(bank: MusicBank, config: TransportConfig) -> Self {
        let (producer, consumer) = HeapRb::<Command>::new(COMMAND_QUEUE_CAPACITY).split();
        Self {
            bank,
            device: VirtualDevice::new(config.sample_rate),
            transport: MusicTransport::new(config),
            commands: consumer,
            sender: Some(CommandSender::new(producer)),
        }
    }

    pub fn from_loaded(loaded: LoadedBank) -> Self {
        Self::new(loaded.bank, loaded.config)
    }

    /// Load a bank file and build a controller for it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FormatError> {
        let loaded = sg_formats::load_bank_file(path)?;
        Ok(Self::from_loaded(loaded))
    }

    pub fn bank(&self) -> &MusicBank {
        &self.bank
    }

    pub fn transport(&self) -> &MusicTransport {
        &self.transport
    }

    pub fn device(&self) -> &VirtualDevice {
        &self.device
    }

    /// Take the producer end of the command queue. Only one exists.
    pub fn command_sender(&mut self) -> Option<CommandSender> {
        self.sender.take()
    }

    // --- Requests ---

    /// Play a music asset, replacing the current music at its next
    /// allowed transition point.
    pub fn play_music(
        &mut self,
        asset: &str,
        fade_in: f32,
        fade_out: f32,
        exit_offset: f32,
        entry_offset: f32,
    ) -> Result<RequestStatus, TransportError> {
        let options = PlayOptions::fades(fade_in, fade_out)
            .with_exit_offset(exit_offset)
            .with_entry_offset(entry_offset);
        self.play(asset, options)
    }

    pub fn play(&mut self, asset: &str, options: PlayOptions) -> Result<RequestStatus, TransportError> {
        self.transport.set_music_queue(&self.bank, &mut self.device, asset, options)
    }

    pub fn stop_music(&mut self, fade: f32) -> RequestStatus {
        self.transport.stop(&mut self.device, fade)
    }

    pub fn pause_music(&mut self, fade: f32) -> RequestStatus {
        self.transport.pause(&mut self.device, fade)
    }

    pub fn resume_music(&mut self, fade: f32) -> RequestStatus {
        self.transport.resume(&mut self.device, fade)
    }

    pub fn play_stinger(&mut self, stinger: &str) -> Result<RequestStatus, TransportError> {
        self.transport.queue_stinger(&self.bank, stinger)
    }

    pub fn set_switch(
        &mut self,
        group: &str,
        value: &str,
        fade: f32,
    ) -> Result<RequestStatus, TransportError> {
        self.transport.set_switch(&self.bank, &mut self.device, group, value, fade)
    }

    pub fn mute(&mut self, fade: f32) -> RequestStatus {
        self.transport.mute(fade)
    }

    pub fn unmute(&mut self, fade: f32) -> RequestStatus {
        self.transport.unmute(fade)
    }

    pub fn cancel_pending(&mut self) -> RequestStatus {
        self.transport.cancel_pending()
    }

    /// Drop a segment from the bank. Music using it ends at its next update.
    pub fn unload_segment(&mut self, segment: &str) -> Result<(), TransportError> {
        match self.bank.unload_segment(segment) {
            Some(_) => {
                info!(segment, "segment unloaded");
                Ok(())
            }
            None => Err(TransportError::NotFound(segment.to_string())),
        }
    }

    /// Apply one queued command.
    pub fn apply(&mut self, command: Command) -> Result<RequestStatus, TransportError> {
        match command {
            Command::PlayMusic { name, options } => self.play(name.as_str(), options),
            Command::StopMusic { fade } => Ok(self.stop_music(fade)),
            Command::PauseMusic { fade } => Ok(self.pause_music(fade)),
            Command::ResumeMusic { fade } => Ok(self.resume_music(fade)),
            Command::PlayStinger { name } => self.play_stinger(name.as_str()),
            Command::SetSwitch { group, value, fade } => {
                self.set_switch(group.as_str(), value.as_str(), fade)
            }
            Command::Mute { fade } => Ok(self.mute(fade)),
            Command::Unmute { fade } => Ok(self.unmute(fade)),
            Command::CancelPending => Ok(self.cancel_pending()),
        }
    }

    /// Apply every queued command, returning how many were rejected.
    pub fn drain_commands(&mut self) -> usize {
        let mut rejected = 0;
        while let Some(command) = self.commands.try_pop() {
            if let Err(err) = self.apply(command) {
                warn!(?command, %err, "queued command rejected");
                rejected += 1;
            }
        }
        rejected
    }

    // --- Clock ---

    /// Advance by `elapsed` output samples: queued commands, device, transport.
    pub fn tick(&mut self, elapsed: u64) {
        self.drain_commands();
        self.device.advance(elapsed);
        self.transport.update(&self.bank, &mut self.device, elapsed);
    }

    pub fn tick_seconds(&mut self, seconds: f32) {
        let elapsed = self.transport.config().samples(seconds);
        self.tick(elapsed);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.transport, &self.bank)
    }

    /// Tick `step` samples at a time for `seconds`, capturing after each tick.
    pub fn render_timeline(&mut self, seconds: f32, step: u64) -> Vec<Snapshot> {
        let total = self.transport.config().samples(seconds);
        let step = step.max(1);
        let mut timeline = Vec::with_capacity((total / step + 1) as usize);
        let mut rendered = 0;
        while rendered < total {
            let elapsed = step.min(total - rendered);
            self.tick(elapsed);
            rendered += elapsed;
            timeline.push(self.snapshot());
        }
        timeline
    }

    /// Run the clock on a background thread, `tick` of wall time per step.
    ///
    /// Returns the controller unchanged if its command sender was taken.
    pub fn spawn(mut self, tick: Duration) -> Result<RunningController, Controller> {
        match self.sender.take() {
            Some(sender) => Ok(RunningController::spawn(self, sender, tick)),
            None => Err(self),
        }
    }

    fn samples_per(&self, tick: Duration) -> u64 {
        let rate = self.transport.config().sample_rate as u128;
        (tick.as_nanos() * rate / 1_000_000_000) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sg_engine::{PlayingStatus, TransitioningStatus};
    use sg_ir::{
        MusicSegment, Quantize, ResourceId, SegmentMatch, Stinger, Switch, TempoMap, TransitionRule,
    };

    const SR: u32 = 44_100;

    fn controller() -> Controller {
        let mut bank = MusicBank::new();
        let tempo = TempoMap::constant(12_000, 4, 4);
        let calm = bank.add_segment(
            MusicSegment::new("calm", ResourceId(1), SR, 441_000).with_tempo(tempo.clone()),
        );
        let battle = bank.add_segment(
            MusicSegment::new("battle", ResourceId(2), SR, 441_000).with_tempo(tempo),
        );
        let hit = bank.add_segment(MusicSegment::new("hit", ResourceId(3), SR, 22_050));
        bank.add_stinger(Stinger::new("hit", hit, 0.5));
        bank.add_rule(TransitionRule::new(
            SegmentMatch::Segment(calm),
            SegmentMatch::Segment(battle),
            Quantize::NextBar,
        ));
        Controller::new(bank, TransportConfig::default().with_sample_rate(SR))
    }

    #[test]
    fn play_and_tick() {
        let mut c = controller();
        assert_eq!(c.play_music("calm", 0.0, 0.0, 0.0, 0.0), Ok(RequestStatus::Started));
        c.tick(4_410);
        let snap = c.snapshot();
        assert_eq!(snap.playing, PlayingStatus::Playing);
        assert_eq!(snap.event.as_deref(), Some("calm"));
        assert_eq!(snap.position, Some(4_410));
    }

    #[test]
    fn queued_commands_apply_on_tick() {
        let mut c = controller();
        let mut sender = c.command_sender().unwrap();
        assert!(c.command_sender().is_none());
        sender.send(Command::play("calm", PlayOptions::default())).unwrap();
        assert_eq!(c.transport().playing_status(), PlayingStatus::Idle);
        c.tick(0);
        assert_eq!(c.transport().current_event(), Some("calm"));
    }

    #[test]
    fn rejected_commands_are_counted() {
        let mut c = controller();
        let calm = c.bank().segment_key("calm").unwrap();
        let battle = c.bank().segment_key("battle").unwrap();
        let mut bank = c.bank().clone();
        bank.add_switch("mood", Switch::new("intensity").with_variant("low", calm).with_variant("high", battle));
        let mut c = Controller::new(bank, TransportConfig::default().with_sample_rate(SR));
        let mut sender = c.command_sender().unwrap();
        sender.send(Command::play("mood", PlayOptions::default())).unwrap();
        assert_eq!(c.drain_commands(), 0);
        c.tick(4_410);

        sender.send(Command::switch("intensity", "furious", 0.0)).unwrap();
        sender.send(Command::stinger("nothing")).unwrap();
        assert_eq!(c.drain_commands(), 2);
        c.tick(4_410);
        assert_eq!(c.transport().pending_trigger(), None);
        assert_eq!(c.transport().current_event(), Some("mood"));
        assert_eq!(c.snapshot().position, Some(8_820));
    }

    #[test]
    fn full_command_queue_hands_back() {
        let mut c = controller();
        let mut sender = c.command_sender().unwrap();
        for _ in 0..COMMAND_QUEUE_CAPACITY {
            sender.send(Command::Mute { fade: 0.0 }).unwrap();
        }
        assert_eq!(sender.send(Command::CancelPending), Err(Command::CancelPending));
    }

    #[test]
    fn timeline_shows_transition() {
        let mut c = controller();
        c.play("calm", PlayOptions::default()).unwrap();
        c.play("battle", PlayOptions::default()).unwrap();
        assert_eq!(c.transport().transitioning_status(), TransitioningStatus::Transitioning);
        // One bar at 120 bpm 4/4 is 2 s.
        let timeline = c.render_timeline(2.5, 4_410);
        assert_eq!(timeline.len(), 25);
        let switched = timeline
            .iter()
            .position(|s| s.event.as_deref() == Some("battle"))
            .unwrap();
        assert_eq!(timeline[switched].now, 88_200);
        assert!(timeline[switched - 1].state_differs(&timeline[switched]));
        assert_eq!(timeline[switched].transitioning, TransitioningStatus::None);
    }

    #[test]
    fn stinger_shows_in_snapshot() {
        let mut c = controller();
        c.play("calm", PlayOptions::default()).unwrap();
        c.play_stinger("hit").unwrap();
        c.tick(100);
        let snap = c.snapshot();
        assert_eq!(snap.stinger.as_deref(), Some("hit"));
        assert_eq!(snap.tracks, 1);
        assert!(snap.to_string().contains("stinger=hit"));
    }

    #[test]
    fn unload_ends_music() {
        let mut c = controller();
        c.play("calm", PlayOptions::default()).unwrap();
        c.tick(100);
        c.unload_segment("calm").unwrap();
        c.tick(100);
        assert_eq!(c.transport().playing_status(), PlayingStatus::Idle);
        assert!(matches!(c.unload_segment("calm"), Err(TransportError::NotFound(_))));
        assert!(matches!(
            c.play("calm", PlayOptions::default()),
            Err(TransportError::NotFound(_))
        ));
    }

    #[test]
    fn spawned_clock_applies_commands() {
        let c = controller();
        let mut running = c.spawn(Duration::from_millis(1)).ok().unwrap();
        running.send(Command::play("calm", PlayOptions::default())).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let c = running.stop().unwrap();
        assert_eq!(c.transport().current_event(), Some("calm"));
        assert_eq!(c.transport().playing_status(), PlayingStatus::Playing);
    }

    #[test]
    fn spawn_without_sender_is_refused() {
        let mut c = controller();
        let _sender = c.command_sender();
        assert!(c.spawn(Duration::from_millis(1)).is_err());
    }
}
