//! Linux framebuffer (fbdev) access

pub mod device;
pub mod draw;
pub mod fbio;

pub use device::{FramebufferDevice, Geometry};
pub use draw::colour;
