//! EDID hex encoding and monitor identity
//!
//! EDIDs travel through the library as uppercase hex strings, two digits
//! per byte. The identity decoder reads only the base block.

use log::{debug, trace};

use crate::constants::{EDID_BLOCK_LEN, EDID_HEADER};

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Display descriptor tag for the monitor name
const DESCRIPTOR_MONITOR_NAME: u8 = 0xFC;

/// Offsets of the four 18-byte descriptors in the base block
const DESCRIPTOR_OFFSETS: [usize; 4] = [54, 72, 90, 108];

/// Encode bytes as uppercase hex, two digits per byte
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX_DIGITS[(b >> 4) as usize] as char);
        out.push(HEX_DIGITS[(b & 0x0F) as usize] as char);
    }
    out
}

/// Decode a hex string (either case); None on odd length or a non-hex digit
pub fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    let digits = hex.as_bytes();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks_exact(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some((hi << 4 | lo) as u8)
        })
        .collect()
}

/// Monitor identity from the EDID base block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdidIdentity {
    /// Three-letter PNP manufacturer id
    pub manufacturer: String,
    pub product_code: u16,
    /// Serial number, None when the monitor reports zero
    pub serial: Option<u32>,
    /// Monitor name descriptor, if present
    pub name: Option<String>,
}

impl EdidIdentity {
    /// Parse the base block; None if it is short or the header is wrong
    pub fn parse(edid: &[u8]) -> Option<Self> {
        if edid.len() < EDID_BLOCK_LEN {
            debug!("EDID too short: {} bytes", edid.len());
            return None;
        }
        if edid[0..8] != EDID_HEADER {
            debug!("Invalid EDID header");
            return None;
        }

        // Bytes 8-9: three 5-bit letters, big-endian, 1 = 'A'
        let packed = u16::from_be_bytes([edid[8], edid[9]]);
        let manufacturer: String = [10u16, 5, 0]
            .iter()
            .map(|&shift| {
                let letter = ((packed >> shift) & 0x1F) as u8;
                if (1..=26).contains(&letter) {
                    (b'A' + letter - 1) as char
                } else {
                    '?'
                }
            })
            .collect();

        let product_code = u16::from_le_bytes([edid[10], edid[11]]);
        let serial = u32::from_le_bytes([edid[12], edid[13], edid[14], edid[15]]);

        let name = DESCRIPTOR_OFFSETS.iter().find_map(|&offset| {
            let descriptor = &edid[offset..offset + 18];
            // Display descriptors start with a zero pixel clock
            if descriptor[0..3] != [0, 0, 0] || descriptor[3] != DESCRIPTOR_MONITOR_NAME {
                return None;
            }
            let text = &descriptor[5..18];
            let end = text.iter().position(|&b| b == 0x0A).unwrap_or(text.len());
            let name = String::from_utf8_lossy(&text[..end]).trim_end().to_string();
            trace!("EDID monitor name descriptor at {}: {:?}", offset, name);
            Some(name)
        });

        Some(Self {
            manufacturer,
            product_code,
            serial: (serial != 0).then_some(serial),
            name,
        })
    }

    /// Parse from the hex form stored on a CRTC
    pub fn from_hex(hex: &str) -> Option<Self> {
        Self::parse(&decode_hex(hex)?)
    }
}

impl std::fmt::Display for EdidIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:04X}", self.manufacturer, self.product_code)?;
        if let Some(name) = &self.name {
            write!(f, " \"{}\"", name)?;
        }
        if let Some(serial) = self.serial {
            write!(f, " serial {}", serial)?;
        }
        Ok(())
    }
}
