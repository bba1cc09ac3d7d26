//! crtcal - display gamma calibration through DRM/KMS and fbdev
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              VideoSession                │
//! ├──────────────────────────────────────────┤
//! │  FramebufferDevice   GraphicsCard        │
//! │   (fbdev + mmap)        ↓                │
//! │                     CrtController        │
//! │                   (EDID, gamma ramps)    │
//! ├──────────────────────────────────────────┤
//! │  gamma::analyse / gamma::generate        │
//! └──────────────────────────────────────────┘
//! ```

pub mod config;
pub mod constants;
pub mod drm;
pub mod error;
pub mod fb;
pub mod gamma;
pub mod session;
pub mod utils;

pub use drm::{CrtController, DrmNode, GraphicsCard, ModeSetting};
pub use error::{RampOp, Result, VideoError};
pub use fb::FramebufferDevice;
pub use gamma::{analyse, generate, Channel, CurveParams};
pub use session::{Platform, SystemPlatform, VideoSession};
