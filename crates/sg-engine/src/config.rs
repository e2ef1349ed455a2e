//! Transport configuration.

use serde::{Deserialize, Serialize};
use sg_ir::FadeCurve;

/// Settings of one transport instance.
///
/// Usually read from the `[transport]` table of a bank file; every field
/// has a default so partial tables are fine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Rate of the transport clock in samples per second.
    pub sample_rate: u32,
    /// Gain applied to every music head.
    pub master_volume: f32,
    /// Fade-in seconds used by callers that do not pass one.
    pub default_fade_in: f32,
    /// Fade-out seconds used by callers that do not pass one.
    pub default_fade_out: f32,
    /// Seconds to duck and restore for stingers without their own setting.
    pub stinger_duck_fade: f32,
    /// Curve for transition crossfades.
    pub crossfade_curve: FadeCurve,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            master_volume: 1.0,
            default_fade_in: 0.0,
            default_fade_out: 0.0,
            stinger_duck_fade: 0.0,
            crossfade_curve: FadeCurve::Linear,
        }
    }
}

impl TransportConfig {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Convert seconds to transport clock samples.
    pub fn samples(&self, seconds: f32) -> u64 {
        libm::round(seconds.max(0.0) as f64 * self.sample_rate as f64) as u64
    }
}
