//! Ramp analysis and synthesis
//!
//! A ramp of `stops` samples encodes `f(i / stops)` for `i` in `0..stops`,
//! scaled to `0..=0xFFFF`. Pure functions, no I/O.

use super::CurveParams;
use crate::constants::RAMP_SCALE;

/// Recover (gamma, contrast, brightness) from a ramp
///
/// Brightness is the first sample and contrast the last. Gamma is fitted
/// at the midpoint: for an even number of stops the two samples straddling
/// x = 0.5 are averaged.
///
/// Degenerate ramps give non-finite results rather than panicking: an empty
/// ramp yields all NaN, and a ramp whose ends are equal (including a single
/// stop) yields a NaN or infinite gamma. Callers must check
/// [`CurveParams::is_finite`] before using the result.
pub fn analyse(ramp: &[u16]) -> CurveParams {
    let stops = ramp.len();
    if stops == 0 {
        return CurveParams::new(f64::NAN, f64::NAN, f64::NAN);
    }

    let sample = |i: usize| ramp[i] as f64 / RAMP_SCALE;
    let brightness = sample(0);
    let contrast = sample(stops - 1);

    let mut middle = sample(stops / 2);
    if stops % 2 == 0 {
        middle = (middle + sample(stops / 2 - 1)) / 2.0;
    }

    // Solve 0.5^(1/gamma) = m for gamma
    let m = (middle - brightness) / (contrast - brightness);
    let gamma = -std::f64::consts::LN_2 / m.ln();

    CurveParams {
        gamma,
        contrast,
        brightness,
    }
}

/// Fill `ramp` from curve parameters
///
/// Each sample is rounded to the nearest 16-bit value and clamped.
/// `params.gamma` must be positive; use [`CurveParams::validate`] first.
pub fn generate(ramp: &mut [u16], params: &CurveParams) {
    debug_assert!(params.gamma > 0.0, "gamma must be positive");

    let stops = ramp.len() as f64;
    let exponent = 1.0 / params.gamma;
    let span = params.contrast - params.brightness;

    for (i, out) in ramp.iter_mut().enumerate() {
        let x = i as f64 / stops;
        let y = x.powf(exponent) * span + params.brightness;
        *out = (y * RAMP_SCALE).round().clamp(0.0, RAMP_SCALE) as u16;
    }
}
