//! Observable transport state.

/// Whether music is playing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlayingStatus {
    #[default]
    Idle,
    Playing,
    /// Music heads are fading out after a stop request.
    Stopping,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransitioningStatus {
    #[default]
    None,
    /// A change to another asset is waiting for its trigger sample.
    Transitioning,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SequencingStatus {
    #[default]
    None,
    /// The next member of the playing sequence is scheduled.
    ChangingSequence,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SwitchingStatus {
    #[default]
    None,
    /// A crossfade to another switch variant is scheduled.
    Switching,
}

/// What a successful request did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestStatus {
    /// Playback started right away.
    Started,
    /// A change is scheduled for this sample of the active segment.
    Queued { trigger: u64 },
    /// Nothing to do; the request matched the current state.
    Unchanged,
    /// The request dropped a pending change and kept the current music.
    Cancelled,
    /// Accepted and applied on the next update (fades, stingers, switches).
    Accepted,
}
