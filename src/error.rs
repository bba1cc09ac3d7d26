//! Error type shared by every hardware-facing operation
//!
//! Each variant that wraps an `io::Error` keeps the OS error code of the
//! call that failed. Cleanup performed while unwinding a partial open never
//! replaces it: see [`CloseOnError`].

use std::collections::TryReserveError;
use std::io;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;

use log::debug;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, VideoError>;

/// Direction of a gamma ramp transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampOp {
    Read,
    Write,
}

impl std::fmt::Display for RampOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RampOp::Read => f.write_str("read"),
            RampOp::Write => f.write_str("write"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    /// Device node missing or inaccessible
    #[error("cannot open {}: {source}", .path.display())]
    DeviceOpen { path: PathBuf, source: io::Error },

    /// Mode resources, connector, encoder, CRTC, or screen info query failed
    #[error("failed to query {what}: {source}")]
    ResourceQuery { what: String, source: io::Error },

    #[error("failed to allocate {what}: {source}")]
    Allocation {
        what: &'static str,
        source: TryReserveError,
    },

    /// Hardware gamma ramp transfer failed
    #[error("gamma ramp {op} failed on CRTC {crtc}: {source}")]
    GammaIo {
        op: RampOp,
        crtc: u32,
        source: io::Error,
    },

    #[error("{0} is not open")]
    Closed(&'static str),

    #[error("CRTC {crtc} was not opened from this card (owner: card {expected}, given: card {actual})")]
    CardMismatch {
        crtc: u32,
        expected: usize,
        actual: usize,
    },

    #[error("card {card} has no CRTC at index {index}")]
    NoSuchCrtc { card: usize, index: usize },

    #[error("no connected CRTC at session position {0}")]
    NoSuchOutput(usize),

    #[error("invalid curve parameters: gamma={gamma}, contrast={contrast}, brightness={brightness}")]
    InvalidCurve {
        gamma: f64,
        contrast: f64,
        brightness: f64,
    },

    #[error("video session is already acquired")]
    AlreadyAcquired,

    #[error("pixel ({x}, {y}) is outside the {width}x{height} framebuffer")]
    PixelOutOfBounds { x: u32, y: u32, width: u32, height: u32 },
}

impl VideoError {
    pub(crate) fn query(what: impl Into<String>, source: io::Error) -> Self {
        VideoError::ResourceQuery {
            what: what.into(),
            source,
        }
    }

    /// OS error code of the failing call, if the failure came from the OS
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            VideoError::DeviceOpen { source, .. }
            | VideoError::ResourceQuery { source, .. }
            | VideoError::GammaIo { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

/// Allocate a vector of `len` copies of `value`, reporting failure instead of aborting
pub(crate) fn try_alloc<T: Clone>(len: usize, value: T, what: &'static str) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|source| VideoError::Allocation { what, source })?;
    buf.resize(len, value);
    Ok(buf)
}

/// Scoped guard that closes a half-built resource when an open step fails
///
/// The guard derefs to the resource so the open sequence runs through it.
/// If the sequence bails out with `?`, the guard's drop runs `close`; the
/// error already captured by `?` is what the caller sees, whatever `close`
/// does. Call [`CloseOnError::disarm`] once the resource is complete.
pub(crate) struct CloseOnError<'a, T> {
    target: &'a mut T,
    close: fn(&mut T),
    armed: bool,
}

impl<'a, T> CloseOnError<'a, T> {
    pub(crate) fn new(target: &'a mut T, close: fn(&mut T)) -> Self {
        Self {
            target,
            close,
            armed: true,
        }
    }

    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl<T> Deref for CloseOnError<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.target
    }
}

impl<T> DerefMut for CloseOnError<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.target
    }
}

impl<T> Drop for CloseOnError<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            debug!("Open failed part-way, closing partial resource");
            (self.close)(self.target);
        }
    }
}
