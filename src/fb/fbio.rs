//! Linux fbdev screen info ioctls
//!
//! Mirrors `struct fb_fix_screeninfo` / `struct fb_var_screeninfo` from
//! linux/fb.h. Errors come back as `io::Error` so the errno survives.

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;

// FBIOGET_* are plain numbers, not _IOR-encoded
const FBIOGET_VSCREENINFO: u32 = 0x4600;
const FBIOGET_FSCREENINFO: u32 = 0x4602;

nix::ioctl_read_bad!(fbioget_vscreeninfo, FBIOGET_VSCREENINFO, VarScreeninfo);
nix::ioctl_read_bad!(fbioget_fscreeninfo, FBIOGET_FSCREENINFO, FixScreeninfo);

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Bitfield {
    pub offset: u32,
    pub length: u32,
    pub msb_right: u32,
}

/// Fixed screen information
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FixScreeninfo {
    pub id: [u8; 16],
    pub smem_start: libc::c_ulong,
    pub smem_len: u32,
    pub type_: u32,
    pub type_aux: u32,
    pub visual: u32,
    pub xpanstep: u16,
    pub ypanstep: u16,
    pub ywrapstep: u16,
    pub line_length: u32,
    pub mmio_start: libc::c_ulong,
    pub mmio_len: u32,
    pub accel: u32,
    pub capabilities: u16,
    pub reserved: [u16; 2],
}

/// Variable screen information
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VarScreeninfo {
    pub xres: u32,
    pub yres: u32,
    pub xres_virtual: u32,
    pub yres_virtual: u32,
    pub xoffset: u32,
    pub yoffset: u32,
    pub bits_per_pixel: u32,
    pub grayscale: u32,
    pub red: Bitfield,
    pub green: Bitfield,
    pub blue: Bitfield,
    pub transp: Bitfield,
    pub nonstd: u32,
    pub activate: u32,
    pub height: u32,
    pub width: u32,
    pub accel_flags: u32,
    pub pixclock: u32,
    pub left_margin: u32,
    pub right_margin: u32,
    pub upper_margin: u32,
    pub lower_margin: u32,
    pub hsync_len: u32,
    pub vsync_len: u32,
    pub sync: u32,
    pub vmode: u32,
    pub rotate: u32,
    pub colorspace: u32,
    pub reserved: [u32; 4],
}

impl Default for FixScreeninfo {
    fn default() -> Self {
        // All-zero is a valid bit pattern for this plain C struct
        unsafe { std::mem::zeroed() }
    }
}

/// FBIOGET_FSCREENINFO
pub fn get_fscreeninfo(file: &File) -> io::Result<FixScreeninfo> {
    let mut info = FixScreeninfo::default();
    unsafe { fbioget_fscreeninfo(file.as_raw_fd(), &mut info) }.map_err(io::Error::from)?;
    Ok(info)
}

/// FBIOGET_VSCREENINFO
pub fn get_vscreeninfo(file: &File) -> io::Result<VarScreeninfo> {
    let mut info = VarScreeninfo::default();
    unsafe { fbioget_vscreeninfo(file.as_raw_fd(), &mut info) }.map_err(io::Error::from)?;
    Ok(info)
}
