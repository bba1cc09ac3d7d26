//! Framebuffer device management
//!
//! Opens /dev/fbN read-write, queries its geometry and maps its memory.

use log::{debug, info};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use super::fbio;
use crate::config::DeviceConfig;
use crate::error::{CloseOnError, Result, VideoError};
use crate::utils::probe_contiguous;

/// Framebuffer geometry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Geometry {
    /// Visible width in pixels
    pub width: u32,
    /// Visible height in pixels
    pub height: u32,
    /// Increment to move to the next pixel on a line
    pub bytes_per_pixel: u32,
    /// Increment to move down one line in the same column
    pub line_length: u32,
    /// Byte offset of the visible origin inside the mapping (panning)
    pub origin: usize,
}

impl Geometry {
    /// Derive geometry from the kernel's screen info
    pub fn from_screeninfo(fix: &fbio::FixScreeninfo, var: &fbio::VarScreeninfo) -> Self {
        let bytes_per_pixel = var.bits_per_pixel / 8;
        Self {
            width: var.xres,
            height: var.yres,
            bytes_per_pixel,
            line_length: fix.line_length,
            origin: var.xoffset as usize * bytes_per_pixel as usize
                + var.yoffset as usize * fix.line_length as usize,
        }
    }

    /// Byte offset of pixel (x, y) inside the mapping, None if off-screen
    pub fn pixel_offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(
            self.origin
                + y as usize * self.line_length as usize
                + x as usize * self.bytes_per_pixel as usize,
        )
    }
}

/// One raw framebuffer device
///
/// The mapping exists exactly while the device file is open.
pub struct FramebufferDevice {
    index: usize,
    path: PathBuf,
    file: Option<File>,
    map: Option<MmapMut>,
    geometry: Geometry,
}

impl FramebufferDevice {
    /// Number of framebuffers, by probing /dev/fb0, /dev/fb1, ... until one is missing
    pub fn count(devices: &DeviceConfig) -> usize {
        probe_contiguous(|n| devices.framebuffer_path(n))
    }

    /// Open, query and map framebuffer `index`
    pub fn open(index: usize, devices: &DeviceConfig) -> Result<Self> {
        let path = devices.framebuffer_path(index);
        info!("Opening framebuffer: {}", path.display());

        let mut fb = Self::closed(index, &path);
        let mut guard = CloseOnError::new(&mut fb, Self::close);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| VideoError::DeviceOpen {
                path: path.clone(),
                source,
            })?;
        let fix = fbio::get_fscreeninfo(&file)
            .map_err(|e| VideoError::query(format!("{} fixed screen info", path.display()), e))?;
        let var = fbio::get_vscreeninfo(&file).map_err(|e| {
            VideoError::query(format!("{} variable screen info", path.display()), e)
        })?;
        guard.file = Some(file);

        let geometry = Geometry::from_screeninfo(&fix, &var);
        guard.map_file(geometry, fix.smem_len as usize)?;
        guard.disarm();

        info!(
            "Framebuffer {}: {}x{}, {} bytes/pixel, stride {}",
            index, geometry.width, geometry.height, geometry.bytes_per_pixel, geometry.line_length
        );
        Ok(fb)
    }

    /// Map an already-open file with known geometry
    ///
    /// Lets callers drive the pixel primitives on any mappable file.
    pub fn from_file(
        index: usize,
        path: impl AsRef<Path>,
        file: File,
        geometry: Geometry,
        map_len: usize,
    ) -> Result<Self> {
        let mut fb = Self::closed(index, path.as_ref());
        fb.file = Some(file);
        let mut guard = CloseOnError::new(&mut fb, Self::close);
        guard.map_file(geometry, map_len)?;
        guard.disarm();
        Ok(fb)
    }

    fn closed(index: usize, path: &Path) -> Self {
        Self {
            index,
            path: path.to_path_buf(),
            file: None,
            map: None,
            geometry: Geometry::default(),
        }
    }

    fn map_file(&mut self, geometry: Geometry, map_len: usize) -> Result<()> {
        let file = self.file.as_ref().ok_or(VideoError::Closed("framebuffer"))?;
        let map = unsafe { MmapOptions::new().len(map_len).map_mut(file) }.map_err(|e| {
            VideoError::query(format!("{} memory map", self.path.display()), e)
        })?;
        self.map = Some(map);
        self.geometry = geometry;
        Ok(())
    }

    /// Unmap and close; repeated calls are no-ops
    pub fn close(&mut self) {
        self.map = None;
        if self.file.take().is_some() {
            debug!("Closed framebuffer {}", self.path.display());
        }
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn width(&self) -> u32 {
        self.geometry.width
    }

    pub fn height(&self) -> u32 {
        self.geometry.height
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        self.geometry.bytes_per_pixel
    }

    pub fn line_length(&self) -> u32 {
        self.geometry.line_length
    }

    /// Write one pixel in the device's native layout
    ///
    /// `colour` is written as a native-endian u32, truncated to the
    /// framebuffer's bytes per pixel.
    pub fn write_pixel(&mut self, x: u32, y: u32, colour: u32) -> Result<()> {
        let geometry = self.geometry;
        let map = self.map.as_mut().ok_or(VideoError::Closed("framebuffer"))?;
        let out_of_bounds = || VideoError::PixelOutOfBounds {
            x,
            y,
            width: geometry.width,
            height: geometry.height,
        };
        let offset = geometry.pixel_offset(x, y).ok_or_else(out_of_bounds)?;

        let bytes = colour.to_ne_bytes();
        let len = (geometry.bytes_per_pixel as usize).min(bytes.len());
        let dst = map
            .get_mut(offset..offset + len)
            .ok_or_else(out_of_bounds)?;
        dst.copy_from_slice(&bytes[..len]);
        Ok(())
    }

    /// Read one pixel back (inverse of `write_pixel`)
    pub fn read_pixel(&self, x: u32, y: u32) -> Option<u32> {
        let map = self.map.as_ref()?;
        let offset = self.geometry.pixel_offset(x, y)?;
        let len = (self.geometry.bytes_per_pixel as usize).min(4);
        let src = map.get(offset..offset + len)?;
        let mut bytes = [0u8; 4];
        bytes[..len].copy_from_slice(src);
        Some(u32::from_ne_bytes(bytes))
    }
}

impl Drop for FramebufferDevice {
    fn drop(&mut self) {
        self.close();
    }
}
