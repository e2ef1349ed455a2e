//! Volume fade curves.

use core::f32::consts::{FRAC_PI_2, PI};

/// Shape of a volume fade between two levels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FadeCurve {
    /// Straight line in volume.
    #[default]
    Linear,
    /// Quarter sine: constant power when paired with the opposite fade.
    EqualPower,
    /// Raised cosine, slow at both ends.
    SCurve,
}

/// Interpolate from `from` to `to` at position `t` (0.0..=1.0) along `curve`.
pub fn interpolate(curve: FadeCurve, from: f32, to: f32, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    let factor = match curve {
        FadeCurve::Linear => t,
        FadeCurve::EqualPower => {
            if to >= from {
                libm::sinf(t * FRAC_PI_2)
            } else {
                1.0 - libm::cosf(t * FRAC_PI_2)
            }
        }
        FadeCurve::SCurve => 0.5 * (1.0 - libm::cosf(t * PI)),
    };
    from + (to - from) * factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_midpoint() {
        assert_eq!(interpolate(FadeCurve::Linear, 0.0, 1.0, 0.5), 0.5);
        assert_eq!(interpolate(FadeCurve::Linear, 1.0, 0.0, 0.25), 0.75);
    }

    #[test]
    fn endpoints_are_exact_for_every_curve() {
        for curve in [FadeCurve::Linear, FadeCurve::EqualPower, FadeCurve::SCurve] {
            assert!((interpolate(curve, 0.0, 1.0, 0.0) - 0.0).abs() < 1e-6);
            assert!((interpolate(curve, 0.0, 1.0, 1.0) - 1.0).abs() < 1e-6);
            assert!((interpolate(curve, 1.0, 0.0, 1.0) - 0.0).abs() < 1e-6);
        }
    }

    #[test]
    fn equal_power_crossfade_keeps_power() {
        for i in 0..=10 {
            let t = i as f32 / 10.0;
            let fade_in = interpolate(FadeCurve::EqualPower, 0.0, 1.0, t);
            let fade_out = interpolate(FadeCurve::EqualPower, 1.0, 0.0, t);
            let power = fade_in * fade_in + fade_out * fade_out;
            assert!((power - 1.0).abs() < 1e-4, "power {} at t={}", power, t);
        }
    }

    #[test]
    fn out_of_range_t_is_clamped() {
        assert_eq!(interpolate(FadeCurve::Linear, 0.0, 1.0, 2.0), 1.0);
        assert_eq!(interpolate(FadeCurve::Linear, 0.0, 1.0, -1.0), 0.0);
    }
}
