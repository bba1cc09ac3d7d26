//! Mode-setting access layer
//!
//! [`ModeSetting`] is the narrow set of DRM queries the card and CRTC
//! lifecycles need. [`DrmNode`] implements it over a /dev/dri/card* node
//! with the `drm` crate; tests implement it in memory.

use drm::control::{connector, crtc, encoder, property, Device as ControlDevice};
use drm::Device as BasicDevice;
use log::info;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::{AsFd, BorrowedFd};
use std::path::{Path, PathBuf};

use crate::error::{Result, VideoError};

/// CRTC and connector ids of one card, in kernel order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeResources {
    pub crtcs: Vec<u32>,
    pub connectors: Vec<u32>,
}

/// Connector state needed for CRTC association and EDID lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorRecord {
    pub id: u32,
    pub connected: bool,
    /// Currently bound encoder, None if the connector has none
    pub encoder_id: Option<u32>,
    /// (property id, raw value) pairs in kernel order
    pub properties: Vec<(u32, u64)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderRecord {
    pub id: u32,
    /// CRTC currently driven through this encoder
    pub crtc_id: Option<u32>,
}

/// Mode-setting queries and gamma ramp I/O on one open card
pub trait ModeSetting {
    fn mode_resources(&self) -> io::Result<ModeResources>;

    fn connector(&self, id: u32) -> io::Result<ConnectorRecord>;

    fn encoder(&self, id: u32) -> io::Result<EncoderRecord>;

    /// Number of stops in the CRTC's hardware gamma ramp
    fn gamma_size(&self, crtc_id: u32) -> io::Result<usize>;

    fn property_name(&self, property_id: u32) -> io::Result<String>;

    fn property_blob(&self, blob_id: u64) -> io::Result<Vec<u8>>;

    /// Read the CRTC's ramp; all three slices have the ramp's length
    fn read_gamma(
        &self,
        crtc_id: u32,
        red: &mut [u16],
        green: &mut [u16],
        blue: &mut [u16],
    ) -> io::Result<()>;

    /// Program the CRTC's ramp; all three slices have the ramp's length
    fn write_gamma(&self, crtc_id: u32, red: &[u16], green: &[u16], blue: &[u16])
        -> io::Result<()>;
}

/// DRM device node opened read-write
pub struct DrmNode {
    file: File,
    path: PathBuf,
}

// Trait implementations required by drm crate
impl AsFd for DrmNode {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl BasicDevice for DrmNode {}
impl ControlDevice for DrmNode {}

impl DrmNode {
    /// Open DRM device
    ///
    /// # Arguments
    /// * `path` - Device path (e.g., "/dev/dri/card0")
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening DRM device: {}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| VideoError::DeviceOpen {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Typed handle from a raw id; id 0 is never a valid object
fn handle<H: From<drm::control::RawResourceHandle>>(id: u32) -> io::Result<H> {
    drm::control::from_u32(id).ok_or_else(|| io::Error::from_raw_os_error(libc::EINVAL))
}

impl ModeSetting for DrmNode {
    fn mode_resources(&self) -> io::Result<ModeResources> {
        let resources = self.resource_handles()?;
        Ok(ModeResources {
            crtcs: resources.crtcs().iter().map(|&h| u32::from(h)).collect(),
            connectors: resources.connectors().iter().map(|&h| u32::from(h)).collect(),
        })
    }

    fn connector(&self, id: u32) -> io::Result<ConnectorRecord> {
        let handle: connector::Handle = handle(id)?;
        // Force a probe: without it a never-probed connector reads as Unknown
        let info = ControlDevice::get_connector(self, handle, true)?;
        let props = self.get_properties(handle)?;
        let (ids, values) = props.as_props_and_values();

        Ok(ConnectorRecord {
            id,
            connected: info.state() == connector::State::Connected,
            encoder_id: info.current_encoder().map(u32::from),
            properties: ids
                .iter()
                .zip(values)
                .map(|(&prop, &value)| (u32::from(prop), value))
                .collect(),
        })
    }

    fn encoder(&self, id: u32) -> io::Result<EncoderRecord> {
        let handle: encoder::Handle = handle(id)?;
        let info = ControlDevice::get_encoder(self, handle)?;
        Ok(EncoderRecord {
            id,
            crtc_id: info.crtc().map(u32::from),
        })
    }

    fn gamma_size(&self, crtc_id: u32) -> io::Result<usize> {
        let handle: crtc::Handle = handle(crtc_id)?;
        // The CRTC descriptor is only needed for its ramp size
        let info = ControlDevice::get_crtc(self, handle)?;
        Ok(info.gamma_length() as usize)
    }

    fn property_name(&self, property_id: u32) -> io::Result<String> {
        let handle: property::Handle = handle(property_id)?;
        let info = self.get_property(handle)?;
        Ok(info.name().to_string_lossy().into_owned())
    }

    fn property_blob(&self, blob_id: u64) -> io::Result<Vec<u8>> {
        self.get_property_blob(blob_id)
    }

    fn read_gamma(
        &self,
        crtc_id: u32,
        red: &mut [u16],
        green: &mut [u16],
        blue: &mut [u16],
    ) -> io::Result<()> {
        ControlDevice::get_gamma(self, handle(crtc_id)?, red, green, blue)
    }

    fn write_gamma(
        &self,
        crtc_id: u32,
        red: &[u16],
        green: &[u16],
        blue: &[u16],
    ) -> io::Result<()> {
        ControlDevice::set_gamma(self, handle(crtc_id)?, red, green, blue)
    }
}
