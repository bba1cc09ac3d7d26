//! Graphics card lifecycle
//!
//! A card owns its device node, its mode resources and two parallel slot
//! tables: one connector record per connector id, and the encoder bound to
//! that connector (None when the connector has no encoder).

use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};

use super::backend::{ConnectorRecord, DrmNode, EncoderRecord, ModeResources, ModeSetting};
use crate::config::DeviceConfig;
use crate::error::{try_alloc, CloseOnError, Result, VideoError};
use crate::utils::probe_contiguous;

/// Source of per-open card serials, unique within the process
static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// One opened graphics card
///
/// The connector and encoder tables are either both absent (never
/// populated, or closed) or both present with one slot per connector.
pub struct GraphicsCard<N: ModeSetting = DrmNode> {
    index: usize,
    serial: u64,
    node: Option<N>,
    resources: Option<ModeResources>,
    connectors: Option<Vec<Option<ConnectorRecord>>>,
    encoders: Option<Vec<Option<EncoderRecord>>>,
}

impl GraphicsCard<DrmNode> {
    /// Number of cards, by probing card0, card1, ... until one is missing
    ///
    /// A gap ends the count: with card0 and card2 present this returns 1.
    pub fn count(devices: &DeviceConfig) -> usize {
        probe_contiguous(|n| devices.card_path(n))
    }

    /// Open card `index` read-write and enumerate its connectors and encoders
    pub fn open(index: usize, devices: &DeviceConfig) -> Result<Self> {
        let node = DrmNode::open(devices.card_path(index))?;
        Self::from_node(index, node)
    }
}

impl<N: ModeSetting> GraphicsCard<N> {
    /// Enumerate an already-open node
    ///
    /// Any failed query closes the partial card and returns the error of
    /// the query that failed.
    pub fn from_node(index: usize, node: N) -> Result<Self> {
        let mut card = Self {
            index,
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            node: Some(node),
            resources: None,
            connectors: None,
            encoders: None,
        };

        let mut guard = CloseOnError::new(&mut card, Self::close);
        guard.populate()?;
        guard.disarm();

        info!(
            "Card {}: crtcs={}, connectors={}, encoders={}",
            index,
            card.crtc_count(),
            card.connector_count(),
            card.encoders().iter().flatten().count()
        );
        Ok(card)
    }

    fn populate(&mut self) -> Result<()> {
        let Self {
            index,
            node,
            resources,
            connectors,
            encoders,
            serial: _,
        } = self;
        let node = node.as_ref().ok_or(VideoError::Closed("graphics card"))?;

        let res = node
            .mode_resources()
            .map_err(|e| VideoError::query(format!("card {} mode resources", index), e))?;
        let count = res.connectors.len();
        let connector_ids = res.connectors.clone();
        *resources = Some(res);

        let connectors = connectors.insert(try_alloc(count, None, "connector table")?);
        let encoders = encoders.insert(try_alloc(count, None, "encoder table")?);

        for (slot, &connector_id) in connector_ids.iter().enumerate() {
            let connector = node
                .connector(connector_id)
                .map_err(|e| VideoError::query(format!("connector {}", connector_id), e))?;
            debug!(
                "Connector {}: connected={}, encoder={:?}",
                connector.id, connector.connected, connector.encoder_id
            );

            if let Some(encoder_id) = connector.encoder_id {
                let encoder = node
                    .encoder(encoder_id)
                    .map_err(|e| VideoError::query(format!("encoder {}", encoder_id), e))?;
                debug!("Encoder {}: crtc={:?}", encoder.id, encoder.crtc_id);
                encoders[slot] = Some(encoder);
            }
            connectors[slot] = Some(connector);
        }

        Ok(())
    }

    /// Release everything the card holds; repeated calls are no-ops
    ///
    /// Order: encoder table, connector table, mode resources, device node.
    pub fn close(&mut self) {
        self.encoders = None;
        self.connectors = None;
        self.resources = None;
        if self.node.take().is_some() {
            debug!("Closed card {}", self.index);
        }
    }

    pub fn is_open(&self) -> bool {
        self.node.is_some()
    }

    /// Device ordinal (the N in cardN)
    pub fn index(&self) -> usize {
        self.index
    }

    /// Identifies this open card; two opens of the same device differ
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Open device node, or a closed-resource error
    pub fn node(&self) -> Result<&N> {
        self.node.as_ref().ok_or(VideoError::Closed("graphics card"))
    }

    pub fn resources(&self) -> Option<&ModeResources> {
        self.resources.as_ref()
    }

    pub fn crtc_count(&self) -> usize {
        self.resources.as_ref().map_or(0, |r| r.crtcs.len())
    }

    /// Hardware id of the CRTC at `index` in resource order
    pub fn crtc_id(&self, index: usize) -> Option<u32> {
        self.resources.as_ref()?.crtcs.get(index).copied()
    }

    pub fn connector_count(&self) -> usize {
        self.connectors.as_ref().map_or(0, Vec::len)
    }

    /// Connector slots, parallel to [`GraphicsCard::encoders`]
    pub fn connectors(&self) -> &[Option<ConnectorRecord>] {
        self.connectors.as_deref().unwrap_or(&[])
    }

    /// Encoder slots, parallel to [`GraphicsCard::connectors`]
    pub fn encoders(&self) -> &[Option<EncoderRecord>] {
        self.encoders.as_deref().unwrap_or(&[])
    }

    pub fn connector(&self, slot: usize) -> Option<&ConnectorRecord> {
        self.connectors().get(slot)?.as_ref()
    }

    pub fn encoder(&self, slot: usize) -> Option<&EncoderRecord> {
        self.encoders().get(slot)?.as_ref()
    }
}

impl<N: ModeSetting> Drop for GraphicsCard<N> {
    fn drop(&mut self) {
        self.close();
    }
}
