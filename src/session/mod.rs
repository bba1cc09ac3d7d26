//! Video session: every framebuffer and connected CRTC on the host
//!
//! Acquisition is two-phase. [`VideoSession::acquire`] stops at the first
//! failure and keeps whatever it opened so far; the caller then calls
//! [`VideoSession::release`], which reclaims a partial session as well as
//! a complete one.

pub mod calibration;

pub use calibration::{apply_calibration, read_calibration, store_calibration, write_calibration};

use log::{debug, info};

use crate::config::DeviceConfig;
use crate::constants::{NEUTRAL_BRIGHTNESS, NEUTRAL_CONTRAST, NEUTRAL_GAMMA};
use crate::drm::{CrtController, DrmNode, GraphicsCard, ModeSetting};
use crate::error::{try_alloc, Result, VideoError};
use crate::fb::FramebufferDevice;
use crate::gamma::{Channel, CurveParams};

/// Device discovery and opening
pub trait Platform {
    type Node: ModeSetting;

    /// Number of framebuffers (contiguous from index 0)
    fn framebuffer_count(&self) -> usize;

    fn open_framebuffer(&self, index: usize) -> Result<FramebufferDevice>;

    /// Number of graphics cards (contiguous from index 0)
    fn card_count(&self) -> usize;

    fn open_card(&self, index: usize) -> Result<GraphicsCard<Self::Node>>;
}

/// Real devices under the configured paths
#[derive(Debug, Clone, Default)]
pub struct SystemPlatform {
    pub devices: DeviceConfig,
}

impl SystemPlatform {
    pub fn new(devices: DeviceConfig) -> Self {
        Self { devices }
    }
}

impl Platform for SystemPlatform {
    type Node = DrmNode;

    fn framebuffer_count(&self) -> usize {
        FramebufferDevice::count(&self.devices)
    }

    fn open_framebuffer(&self, index: usize) -> Result<FramebufferDevice> {
        FramebufferDevice::open(index, &self.devices)
    }

    fn card_count(&self) -> usize {
        GraphicsCard::count(&self.devices)
    }

    fn open_card(&self, index: usize) -> Result<GraphicsCard<DrmNode>> {
        GraphicsCard::open(index, &self.devices)
    }
}

/// Per-channel software state, indexed by channel then CRTC position
type ChannelState = [Vec<f64>; 3];

/// All video devices held by one calibration run
///
/// `crtcs` holds connected controllers only. The state arrays have one
/// entry per connected CRTC, in the same order.
pub struct VideoSession<P: Platform = SystemPlatform> {
    platform: P,
    acquired: bool,
    framebuffers: Vec<FramebufferDevice>,
    cards: Vec<GraphicsCard<P::Node>>,
    crtcs: Vec<CrtController>,
    brightness: ChannelState,
    contrast: ChannelState,
    gamma: ChannelState,
}

impl VideoSession<SystemPlatform> {
    /// Session over the real devices under `devices`
    pub fn system(devices: DeviceConfig) -> Self {
        Self::new(SystemPlatform::new(devices))
    }
}

impl<P: Platform> VideoSession<P> {
    /// Empty session; nothing is opened until [`VideoSession::acquire`]
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            acquired: false,
            framebuffers: Vec::new(),
            cards: Vec::new(),
            crtcs: Vec::new(),
            brightness: Default::default(),
            contrast: Default::default(),
            gamma: Default::default(),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Open every framebuffer, every card and each card's connected CRTCs
    ///
    /// Unconnected CRTCs are opened, closed again and left out. On failure
    /// the devices opened so far stay in the session until `release`.
    pub fn acquire(&mut self) -> Result<()> {
        if self.acquired {
            return Err(VideoError::AlreadyAcquired);
        }
        self.acquired = true;

        for index in 0..self.platform.framebuffer_count() {
            let fb = self.platform.open_framebuffer(index)?;
            self.framebuffers.push(fb);
        }

        for index in 0..self.platform.card_count() {
            self.cards.push(self.platform.open_card(index)?);
            let card = &self.cards[self.cards.len() - 1];

            for crtc_index in 0..card.crtc_count() {
                let mut crtc = CrtController::open(crtc_index, card)?;
                if crtc.is_connected() {
                    self.crtcs.push(crtc);
                } else {
                    debug!("CRTC {} on card {} is not connected", crtc.id(), index);
                    crtc.close();
                }
            }
        }

        let outputs = self.crtcs.len();
        for c in 0..Channel::ALL.len() {
            self.brightness[c] = try_alloc(outputs, NEUTRAL_BRIGHTNESS, "brightness state")?;
            self.contrast[c] = try_alloc(outputs, NEUTRAL_CONTRAST, "contrast state")?;
            self.gamma[c] = try_alloc(outputs, NEUTRAL_GAMMA, "gamma state")?;
        }

        info!(
            "Video session: {} framebuffer(s), {} card(s), {} connected CRTC(s)",
            self.framebuffers.len(),
            self.cards.len(),
            outputs
        );
        Ok(())
    }

    /// Close everything the session holds; safe on a partial or empty session
    ///
    /// CRTCs close before cards, cards before framebuffers.
    pub fn release(&mut self) {
        if !self.acquired {
            return;
        }

        for mut crtc in self.crtcs.drain(..) {
            crtc.close();
        }
        for mut card in self.cards.drain(..) {
            card.close();
        }
        for mut fb in self.framebuffers.drain(..) {
            fb.close();
        }
        for state in [&mut self.brightness, &mut self.contrast, &mut self.gamma] {
            *state = Default::default();
        }

        self.acquired = false;
        info!("Video session released");
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn framebuffers(&self) -> &[FramebufferDevice] {
        &self.framebuffers
    }

    pub fn framebuffers_mut(&mut self) -> &mut [FramebufferDevice] {
        &mut self.framebuffers
    }

    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    pub fn cards(&self) -> &[GraphicsCard<P::Node>] {
        &self.cards
    }

    /// Number of connected CRTCs
    pub fn crtc_count(&self) -> usize {
        self.crtcs.len()
    }

    pub fn crtcs(&self) -> &[CrtController] {
        &self.crtcs
    }

    pub fn crtc(&self, pos: usize) -> Option<&CrtController> {
        self.crtcs.get(pos)
    }

    pub fn crtc_mut(&mut self, pos: usize) -> Option<&mut CrtController> {
        self.crtcs.get_mut(pos)
    }

    /// Card that owns the CRTC at `pos`
    pub fn card_of(&self, pos: usize) -> Result<&GraphicsCard<P::Node>> {
        let crtc = self.crtcs.get(pos).ok_or(VideoError::NoSuchOutput(pos))?;
        owning_card(&self.cards, crtc)
    }

    /// Read the hardware ramp of the CRTC at `pos` into its buffers
    pub fn get_gamma(&mut self, pos: usize) -> Result<()> {
        let crtc = self.crtcs.get_mut(pos).ok_or(VideoError::NoSuchOutput(pos))?;
        let card = owning_card(&self.cards, crtc)?;
        crtc.get_gamma(card)
    }

    /// Program the buffers of the CRTC at `pos` into the hardware
    pub fn set_gamma(&self, pos: usize) -> Result<()> {
        let crtc = self.crtcs.get(pos).ok_or(VideoError::NoSuchOutput(pos))?;
        crtc.set_gamma(owning_card(&self.cards, crtc)?)
    }

    /// Brightness of `channel` for every connected CRTC
    pub fn brightness(&self, channel: Channel) -> &[f64] {
        &self.brightness[channel.index()]
    }

    pub fn brightness_mut(&mut self, channel: Channel) -> &mut [f64] {
        &mut self.brightness[channel.index()]
    }

    /// Contrast of `channel` for every connected CRTC
    pub fn contrast(&self, channel: Channel) -> &[f64] {
        &self.contrast[channel.index()]
    }

    pub fn contrast_mut(&mut self, channel: Channel) -> &mut [f64] {
        &mut self.contrast[channel.index()]
    }

    /// Gamma of `channel` for every connected CRTC
    pub fn gamma(&self, channel: Channel) -> &[f64] {
        &self.gamma[channel.index()]
    }

    pub fn gamma_mut(&mut self, channel: Channel) -> &mut [f64] {
        &mut self.gamma[channel.index()]
    }

    /// Stored curve of `channel` on the CRTC at `pos`
    pub fn params(&self, channel: Channel, pos: usize) -> Option<CurveParams> {
        let c = channel.index();
        Some(CurveParams::new(
            *self.gamma[c].get(pos)?,
            *self.contrast[c].get(pos)?,
            *self.brightness[c].get(pos)?,
        ))
    }

    /// Store the curve of `channel` on the CRTC at `pos`
    pub fn set_params(&mut self, channel: Channel, pos: usize, params: CurveParams) -> Result<()> {
        let c = channel.index();
        let missing = || VideoError::NoSuchOutput(pos);
        *self.gamma[c].get_mut(pos).ok_or_else(missing)? = params.gamma;
        *self.contrast[c].get_mut(pos).ok_or_else(missing)? = params.contrast;
        *self.brightness[c].get_mut(pos).ok_or_else(missing)? = params.brightness;
        Ok(())
    }
}

impl<P: Platform> Drop for VideoSession<P> {
    fn drop(&mut self) {
        self.release();
    }
}

fn owning_card<'a, N: ModeSetting>(
    cards: &'a [GraphicsCard<N>],
    crtc: &CrtController,
) -> Result<&'a GraphicsCard<N>> {
    cards
        .iter()
        .find(|card| card.serial() == crtc.card_serial())
        .ok_or(VideoError::Closed("graphics card"))
}
