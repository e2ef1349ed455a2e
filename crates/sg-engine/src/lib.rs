//! Music transport for segue.
//!
//! Schedules segment heads on a playback device: quantised transitions,
//! crossfades, loops, sequences, switches and ducking stingers, all driven
//! by an external per-frame clock.

mod config;
mod device;
mod error;
mod head;
mod head_pool;
pub mod planner;
mod ramp;
mod status;
mod stinger_queue;
mod transport;

pub use config::TransportConfig;
pub use device::{HeadHandle, PlaybackDevice, VirtualDevice, VIRTUAL_DEVICE_CHANNELS};
pub use error::{DeviceError, Result, TransportError};
pub use head::{HeadInfo, HeadRole, LoopCrossing, PlaybackHead};
pub use head_pool::{HeadId, HeadPool, MAX_HEADS};
pub use planner::{plan_transition, quantize_sample, TransitionPlan};
pub use ramp::Ramp;
pub use status::{
    PlayingStatus, RequestStatus, SequencingStatus, SwitchingStatus, TransitioningStatus,
};
pub use stinger_queue::{DuckChange, MusicClock, StingerQueue, STINGER_QUEUE_CAPACITY};
pub use transport::{MusicTransport, PlayOptions};
