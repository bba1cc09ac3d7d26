//! DRM/KMS gamma management
//!
//! Cards, their CRT controllers, and EDID identification.

pub mod backend;
pub mod card;
pub mod crtc;
pub mod edid;

pub use backend::{ConnectorRecord, DrmNode, EncoderRecord, ModeResources, ModeSetting};
pub use card::GraphicsCard;
pub use crtc::CrtController;
pub use edid::EdidIdentity;
