//! Error types for the transport and the playback device seam.

use sg_ir::ResourceId;
use thiserror::Error;

/// Failures reported by a playback device.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// The device has no free voice to play another head
    #[error("no free playback channel")]
    NoChannel,

    /// The resource cannot be played by this device
    #[error("resource {0:?} is not playable")]
    Unplayable(ResourceId),
}

/// Failures of transport requests.
///
/// Every error is also logged where it happens; none of them leave the
/// transport in a different state than before the request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Requested segment, asset or stinger is not resident
    #[error("not found: {0}")]
    NotFound(String),

    /// The playback device refused to create a head
    #[error("playback device failure: {0}")]
    DeviceFailure(#[from] DeviceError),

    /// Every playback head slot is taken by audible music
    #[error("all {0} playback heads are in use")]
    HeadPoolExhausted(usize),

    /// The stinger queue cannot take another cue
    #[error("stinger queue is full, dropped {0}")]
    StingerQueueFull(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
