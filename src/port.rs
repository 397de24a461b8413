//! Per-port state and the product description block.

use crate::ethernet::EthernetAddress;

/// Runtime state of one gPTP port.
#[derive(Debug, Clone)]
pub struct Port {
    /// Port index, equal to its position in the configuration.
    pub index: u8,
    /// 64 bit clock identity.
    pub clock_id: u64,
    /// Source MAC address obtained from the hardware at init.
    pub source_mac: EthernetAddress,
    /// Mirrors the link state; toggled by link up/down notifications.
    pub enabled: bool,
}

/// Capacity of the product description string.
pub const PRODUCT_DESCRIPTION_LEN: usize = 64;

/// Immutable product identity assembled at init.
#[derive(Debug, Clone)]
pub struct ProductDetails {
    /// Three octet manufacturer identity.
    pub manufacturer_id: [u8; 3],
    /// `HW;FW;SW` revision string.
    pub product_revision: &'static str,
    /// `Manufacturer;Model;UniqueId` description; the unique identifier substring is the primary
    /// port MAC rendered as `XX:XX:XX:XX:XX:XX`.
    pub description: heapless::String<PRODUCT_DESCRIPTION_LEN>,
}

impl ProductDetails {
    /// Assemble the block, appending the primary port MAC after the configured
    /// `Manufacturer;Model;` prefix.
    pub(crate) fn new(
        manufacturer_id: [u8; 3],
        product_revision: &'static str,
        description_prefix: &str,
        primary_mac: EthernetAddress,
    ) -> Self {
        let mut description = heapless::String::new();

        let _ = description.push_str(description_prefix);

        if !description_prefix.ends_with(';') {
            let _ = description.push(';');
        }

        for (i, byte) in primary_mac.0.iter().enumerate() {
            if i != 0 {
                let _ = description.push(':');
            }

            let _ = description.push(hex_digit(byte >> 4));
            let _ = description.push(hex_digit(byte & 0x0f));
        }

        Self {
            manufacturer_id,
            product_revision,
            description,
        }
    }
}

fn hex_digit(nibble: u8) -> char {
    match nibble {
        0..=9 => (b'0' + nibble) as char,
        _ => (b'A' + (nibble - 10)) as char,
    }
}
