//! CRT controller lifecycle, EDID retrieval and gamma ramp I/O
//!
//! A controller refers to its card by ordinal and to its connector/encoder
//! by slot in the card's tables, never by pointer. Ramp I/O takes the card
//! explicitly and refuses a card that is closed or is not the owner: same
//! ordinal and same open, so a reopened or foreign card is rejected.

use log::{debug, trace, warn};

use super::backend::{ConnectorRecord, ModeSetting};
use super::card::GraphicsCard;
use super::edid::encode_hex;
use crate::constants::{CHANNEL_COUNT, EDID_PROPERTY};
use crate::error::{try_alloc, RampOp, Result, VideoError};
use crate::gamma::Channel;

/// One CRT controller of a card
pub struct CrtController {
    id: u32,
    card: usize,
    /// Serial of the card open this controller came from
    card_serial: u64,
    /// Slot of the associated connector/encoder in the card's tables
    slot: Option<usize>,
    connected: bool,
    edid: Option<String>,
    stops: usize,
    /// red ++ green ++ blue, `stops` samples each
    ramps: Option<Vec<u16>>,
}

impl CrtController {
    /// Open the CRTC at `index` in the card's resource order
    pub fn open<N: ModeSetting>(index: usize, card: &GraphicsCard<N>) -> Result<Self> {
        let node = card.node()?;
        let id = card.crtc_id(index).ok_or(VideoError::NoSuchCrtc {
            card: card.index(),
            index,
        })?;

        // First encoder driving this CRTC wins
        let slot = card
            .encoders()
            .iter()
            .position(|e| matches!(e, Some(enc) if enc.crtc_id == Some(id)));
        let connector = slot.and_then(|s| card.connector(s));
        let connected = connector.map_or(false, |c| c.connected);

        let stops = node
            .gamma_size(id)
            .map_err(|e| VideoError::query(format!("CRTC {} gamma size", id), e))?;

        // Zeroed before the first hardware read
        let ramps = try_alloc(CHANNEL_COUNT * stops, 0u16, "gamma ramps")?;

        let edid = match connector {
            Some(connector) => read_edid(node, connector),
            None => None,
        };

        debug!(
            "CRTC {} (card {}): connector={:?}, connected={}, stops={}, edid={}",
            id,
            card.index(),
            connector.map(|c| c.id),
            connected,
            stops,
            edid.is_some()
        );

        Ok(Self {
            id,
            card: card.index(),
            card_serial: card.serial(),
            slot,
            connected,
            edid,
            stops,
            ramps: Some(ramps),
        })
    }

    /// Free the EDID and ramp buffers; repeated calls are no-ops
    pub fn close(&mut self) {
        self.edid = None;
        if self.ramps.take().is_some() {
            debug!("Closed CRTC {}", self.id);
        }
    }

    pub fn is_open(&self) -> bool {
        self.ramps.is_some()
    }

    /// Hardware CRTC id
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Ordinal of the owning card
    pub fn card_index(&self) -> usize {
        self.card
    }

    /// Serial of the owning card open
    pub fn card_serial(&self) -> u64 {
        self.card_serial
    }

    /// Slot of the associated connector and encoder in the card's tables
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Hex-encoded EDID (two uppercase digits per byte)
    pub fn edid(&self) -> Option<&str> {
        self.edid.as_deref()
    }

    /// Number of stops per channel
    pub fn stops(&self) -> usize {
        self.stops
    }

    /// Ramp of one channel; empty once closed
    pub fn channel(&self, channel: Channel) -> &[u16] {
        match &self.ramps {
            Some(ramps) => {
                let start = channel.index() * self.stops;
                &ramps[start..start + self.stops]
            }
            None => &[],
        }
    }

    pub fn channel_mut(&mut self, channel: Channel) -> &mut [u16] {
        let stops = self.stops;
        match &mut self.ramps {
            Some(ramps) => {
                let start = channel.index() * stops;
                &mut ramps[start..start + stops]
            }
            None => &mut [],
        }
    }

    pub fn red(&self) -> &[u16] {
        self.channel(Channel::Red)
    }

    pub fn green(&self) -> &[u16] {
        self.channel(Channel::Green)
    }

    pub fn blue(&self) -> &[u16] {
        self.channel(Channel::Blue)
    }

    /// Read the hardware ramp into the channel buffers
    ///
    /// Buffer contents are unspecified if this fails.
    pub fn get_gamma<N: ModeSetting>(&mut self, card: &GraphicsCard<N>) -> Result<()> {
        let node = self.owning_node(card)?;
        let (id, stops) = (self.id, self.stops);
        let ramps = self.ramps.as_mut().ok_or(VideoError::Closed("CRTC"))?;
        let (red, rest) = ramps.split_at_mut(stops);
        let (green, blue) = rest.split_at_mut(stops);
        node.read_gamma(id, red, green, blue)
            .map_err(|source| VideoError::GammaIo {
                op: RampOp::Read,
                crtc: id,
                source,
            })
    }

    /// Program the channel buffers into the hardware
    ///
    /// The hardware state after a failure is whatever the driver left.
    pub fn set_gamma<N: ModeSetting>(&self, card: &GraphicsCard<N>) -> Result<()> {
        let node = self.owning_node(card)?;
        if !self.is_open() {
            return Err(VideoError::Closed("CRTC"));
        }
        node.write_gamma(self.id, self.red(), self.green(), self.blue())
            .map_err(|source| VideoError::GammaIo {
                op: RampOp::Write,
                crtc: self.id,
                source,
            })
    }

    fn owning_node<'a, N: ModeSetting>(&self, card: &'a GraphicsCard<N>) -> Result<&'a N> {
        if card.index() != self.card || card.serial() != self.card_serial {
            return Err(VideoError::CardMismatch {
                crtc: self.id,
                expected: self.card,
                actual: card.index(),
            });
        }
        card.node()
    }
}

impl Drop for CrtController {
    fn drop(&mut self) {
        self.close();
    }
}

/// Find the connector's EDID property and hex-encode its blob
///
/// Scanning stops at the EDID property: later properties are not looked
/// at. Unreadable property descriptors are skipped; an unreadable or empty
/// blob means no EDID.
fn read_edid<N: ModeSetting>(node: &N, connector: &ConnectorRecord) -> Option<String> {
    for &(property_id, value) in &connector.properties {
        let name = match node.property_name(property_id) {
            Ok(name) => name,
            Err(e) => {
                trace!("Connector {}: property {}: {}", connector.id, property_id, e);
                continue;
            }
        };
        if name != EDID_PROPERTY {
            continue;
        }

        if value == 0 {
            return None;
        }
        return match node.property_blob(value) {
            Ok(blob) if !blob.is_empty() => Some(encode_hex(&blob)),
            Ok(_) => None,
            Err(e) => {
                warn!("Connector {}: cannot read EDID blob: {}", connector.id, e);
                None
            }
        };
    }
    None
}
