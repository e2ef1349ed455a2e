//! Volume ramps on the transport clock.

use sg_ir::{interpolate, FadeCurve};

/// A volume moving from one level to another over a span of clock samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ramp {
    from: f32,
    to: f32,
    start: u64,
    duration: u64,
    curve: FadeCurve,
}

impl Ramp {
    /// A ramp resting at `value`.
    pub const fn hold(value: f32) -> Self {
        Self { from: value, to: value, start: 0, duration: 0, curve: FadeCurve::Linear }
    }

    /// A ramp from `from` to `to` starting at `now`.
    pub fn new(from: f32, to: f32, now: u64, duration: u64, curve: FadeCurve) -> Self {
        Self { from, to, start: now, duration, curve }
    }

    pub fn value_at(&self, now: u64) -> f32 {
        if self.duration == 0 || now >= self.start + self.duration {
            return self.to;
        }
        if now <= self.start {
            return self.from;
        }
        let t = (now - self.start) as f32 / self.duration as f32;
        interpolate(self.curve, self.from, self.to, t)
    }

    pub fn target(&self) -> f32 {
        self.to
    }

    /// Clock sample at which the ramp reaches its target.
    pub fn end(&self) -> u64 {
        self.start + self.duration
    }

    pub fn is_settled(&self, now: u64) -> bool {
        now >= self.end()
    }

    /// Head for `to` from wherever the ramp is at `now`.
    pub fn retarget(&mut self, now: u64, to: f32, duration: u64, curve: FadeCurve) {
        *self = Self::new(self.value_at(now), to, now, duration, curve);
    }

    /// Push the ramp later by `by` samples, freezing its progress.
    pub fn delay(&mut self, by: u64) {
        self.start += by;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_is_constant() {
        let r = Ramp::hold(0.7);
        assert_eq!(r.value_at(0), 0.7);
        assert_eq!(r.value_at(1_000_000), 0.7);
        assert!(r.is_settled(0));
    }

    #[test]
    fn linear_ramp_hits_endpoints_on_time() {
        let r = Ramp::new(1.0, 0.0, 100, 200, FadeCurve::Linear);
        assert_eq!(r.value_at(100), 1.0);
        assert_eq!(r.value_at(200), 0.5);
        assert!(!r.is_settled(299));
        assert_eq!(r.value_at(300), 0.0);
        assert!(r.is_settled(300));
    }

    #[test]
    fn retarget_starts_from_current_value() {
        let mut r = Ramp::new(0.0, 1.0, 0, 100, FadeCurve::Linear);
        r.retarget(50, 0.0, 50, FadeCurve::Linear);
        assert_eq!(r.value_at(50), 0.5);
        assert_eq!(r.value_at(75), 0.25);
        assert_eq!(r.target(), 0.0);
    }

    #[test]
    fn delay_freezes_progress() {
        let mut r = Ramp::new(0.0, 1.0, 0, 100, FadeCurve::Linear);
        assert_eq!(r.value_at(40), 0.4);
        r.delay(1_000);
        assert_eq!(r.value_at(1_040), 0.4);
        assert_eq!(r.end(), 1_100);
    }

    #[test]
    fn zero_duration_jumps() {
        let r = Ramp::new(1.0, 0.25, 10, 0, FadeCurve::Linear);
        assert_eq!(r.value_at(10), 0.25);
    }
}
