//! Point-in-time view of a controller, for timelines and logs.

use std::fmt;

use sg_engine::{
    MusicTransport, PlayingStatus, SequencingStatus, SwitchingStatus, TransitioningStatus,
};
use sg_ir::{name, MusicBank, Name};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Snapshot {
    /// Transport clock in samples.
    pub now: u64,
    pub seconds: f64,
    pub playing: PlayingStatus,
    pub transitioning: TransitioningStatus,
    pub sequencing: SequencingStatus,
    pub switching: SwitchingStatus,
    pub event: Option<Name>,
    pub segment: Option<Name>,
    /// Active head position in segment samples.
    pub position: Option<u64>,
    pub tracks: usize,
    pub stinger: Option<Name>,
    pub duck: f32,
    pub paused: bool,
    pub muted: bool,
}

impl Snapshot {
    pub fn capture(transport: &MusicTransport, bank: &MusicBank) -> Self {
        let rate = transport.config().sample_rate.max(1);
        Self {
            now: transport.now(),
            seconds: transport.now() as f64 / rate as f64,
            playing: transport.playing_status(),
            transitioning: transport.transitioning_status(),
            sequencing: transport.sequencing_status(),
            switching: transport.switching_status(),
            event: transport.current_event().map(name),
            segment: transport
                .current_segment()
                .and_then(|key| bank.segment(key))
                .map(|segment| segment.name),
            position: transport.position(),
            tracks: transport.active_tracks().count(),
            stinger: transport.stinger_playing().map(name),
            duck: transport.duck_level(),
            paused: transport.is_paused(),
            muted: transport.is_muted(),
        }
    }

    /// Whether anything but the clock and head position differs.
    pub fn state_differs(&self, other: &Snapshot) -> bool {
        self.playing != other.playing
            || self.transitioning != other.transitioning
            || self.sequencing != other.sequencing
            || self.switching != other.switching
            || self.event != other.event
            || self.segment != other.segment
            || self.tracks != other.tracks
            || self.stinger != other.stinger
            || self.paused != other.paused
            || self.muted != other.muted
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8.3}s {:?}", self.seconds, self.playing)?;
        if let Some(event) = &self.event {
            write!(f, " event={event}")?;
        }
        if let Some(segment) = &self.segment {
            write!(f, " segment={segment}")?;
        }
        if let Some(position) = self.position {
            write!(f, " pos={position}")?;
        }
        write!(f, " tracks={}", self.tracks)?;
        if self.transitioning == TransitioningStatus::Transitioning {
            f.write_str(" transitioning")?;
        }
        if self.sequencing == SequencingStatus::ChangingSequence {
            f.write_str(" sequencing")?;
        }
        if self.switching == SwitchingStatus::Switching {
            f.write_str(" switching")?;
        }
        if let Some(stinger) = &self.stinger {
            write!(f, " stinger={stinger} duck={:.2}", self.duck)?;
        }
        if self.paused {
            f.write_str(" paused")?;
        }
        if self.muted {
            f.write_str(" muted")?;
        }
        Ok(())
    }
}
