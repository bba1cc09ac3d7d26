//! Gamma curve model
//!
//! Converts between raw 16-bit ramps and (gamma, contrast, brightness).

pub mod curve;

pub use curve::{analyse, generate};

use crate::constants::{NEUTRAL_BRIGHTNESS, NEUTRAL_CONTRAST, NEUTRAL_GAMMA};
use crate::error::{Result, VideoError};

/// Colour channel of a gamma ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Red = 0,
    Green = 1,
    Blue = 2,
}

impl Channel {
    /// All channels in ramp order
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Red => "red",
            Channel::Green => "green",
            Channel::Blue => "blue",
        }
    }
}

/// Parameters of the power-law ramp model
///
/// `f(x) = x^(1/gamma) * (contrast - brightness) + brightness`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveParams {
    pub gamma: f64,
    pub contrast: f64,
    pub brightness: f64,
}

impl Default for CurveParams {
    fn default() -> Self {
        Self {
            gamma: NEUTRAL_GAMMA,
            contrast: NEUTRAL_CONTRAST,
            brightness: NEUTRAL_BRIGHTNESS,
        }
    }
}

impl CurveParams {
    pub fn new(gamma: f64, contrast: f64, brightness: f64) -> Self {
        Self {
            gamma,
            contrast,
            brightness,
        }
    }

    /// True when every parameter is a finite number
    pub fn is_finite(&self) -> bool {
        self.gamma.is_finite() && self.contrast.is_finite() && self.brightness.is_finite()
    }

    /// Reject parameters `generate` cannot take
    ///
    /// Gamma must be finite and positive; contrast and brightness finite.
    pub fn validate(&self) -> Result<()> {
        if self.is_finite() && self.gamma > 0.0 {
            Ok(())
        } else {
            Err(VideoError::InvalidCurve {
                gamma: self.gamma,
                contrast: self.contrast,
                brightness: self.brightness,
            })
        }
    }
}
