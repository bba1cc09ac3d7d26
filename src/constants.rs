//! Global constants for crtcal
//!
//! Consolidates device paths, ramp quantization and pattern tables
//! to eliminate magic numbers throughout the codebase.

// ============================================================================
// Device Paths
// ============================================================================

/// Directory holding DRM device nodes
pub const DRI_DIR: &str = "/dev/dri";

/// DRM primary node name prefix (card0, card1, ...)
pub const CARD_PREFIX: &str = "card";

/// Framebuffer device path prefix (/dev/fb0, /dev/fb1, ...)
pub const FRAMEBUFFER_PREFIX: &str = "/dev/fb";

// ============================================================================
// Gamma Ramps
// ============================================================================

/// Largest value a 16-bit ramp sample can hold
pub const RAMP_MAX: u16 = 0xFFFF;

/// `RAMP_MAX` as a float, used for normalization
pub const RAMP_SCALE: f64 = RAMP_MAX as f64;

/// Number of colour channels in a gamma ramp (red, green, blue)
pub const CHANNEL_COUNT: usize = 3;

/// Neutral software brightness (ramp starts at black)
pub const NEUTRAL_BRIGHTNESS: f64 = 0.0;

/// Neutral software contrast (ramp ends at full intensity)
pub const NEUTRAL_CONTRAST: f64 = 1.0;

/// Neutral gamma (linear ramp)
pub const NEUTRAL_GAMMA: f64 = 1.0;

// ============================================================================
// EDID
// ============================================================================

/// Connector property carrying the monitor's EDID blob
pub const EDID_PROPERTY: &str = "EDID";

/// Size of the base EDID block
pub const EDID_BLOCK_LEN: usize = 128;

/// Fixed EDID header (bytes 0-7)
pub const EDID_HEADER: [u8; 8] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];

// ============================================================================
// Calibration Pattern
// ============================================================================

/// sRGB levels of the contrast/brightness bars, darkest first
pub const CONTRAST_BRIGHTNESS_LEVELS: [u8; 21] = [
    0, 17, 27, 38, 48, 59, 70, 82, 94, 106, 119, 131, 144, 158, 171, 185, 198, 212, 226, 241, 255,
];
