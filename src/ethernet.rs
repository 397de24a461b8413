//! Ethernet II frame handling, originally derived from SmolTCP's `wire/ethernet.rs` and reworked
//! for timecrab: big-endian accessors only, plus 802.1Q VLAN tag support since gPTP frames may be
//! priority-tagged.

use core::fmt;

use crate::error::{Error, FrameError};

/// EtherType carried by every PTP frame.
pub const ETHERTYPE_PTP: u16 = 0x88f7;

/// EtherType of an 802.1Q VLAN tag.
pub const ETHERTYPE_VLAN: u16 = 0x8100;

/// A six-octet Ethernet II address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EthernetAddress(pub [u8; 6]);

impl EthernetAddress {
    /// The gPTP peer multicast address every PTP event/general message is normally sent to.
    pub const PTP_MULTICAST: EthernetAddress =
        EthernetAddress([0x01, 0x80, 0xc2, 0x00, 0x00, 0x0e]);

    /// Construct an Ethernet address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    ///
    /// The function panics if `data` is not six octets long.
    pub fn from_bytes(data: &[u8]) -> EthernetAddress {
        let mut bytes = [0; 6];
        bytes.copy_from_slice(data);
        EthernetAddress(bytes)
    }

    /// Return an Ethernet address as a sequence of octets, in big-endian.
    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for EthernetAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(
            f,
            "{:02x}-{:02x}-{:02x}-{:02x}-{:02x}-{:02x}",
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]
        )
    }
}

/// A read/write wrapper around an Ethernet II frame buffer.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EthernetFrame<T: AsRef<[u8]>> {
    buffer: T,
}

mod field {
    use core::ops::Range;

    pub const DESTINATION: Range<usize> = 0..6;
    pub const SOURCE: Range<usize> = 6..12;
    pub const ETHERTYPE: Range<usize> = 12..14;
    pub const VLAN_TCI: Range<usize> = 14..16;
    pub const VLAN_ETHERTYPE: Range<usize> = 16..18;
}

/// The Ethernet header length without a VLAN tag.
pub const ETHERNET_HEADER_LEN: usize = 14;

/// Length of an 802.1Q tag (TCI + inner EtherType).
pub const VLAN_TAG_LEN: usize = 4;

impl<T: AsRef<[u8]>> EthernetFrame<T> {
    /// Imbue a raw octet buffer with Ethernet frame structure.
    pub const fn new_unchecked(buffer: T) -> EthernetFrame<T> {
        EthernetFrame { buffer }
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(buffer: T) -> Result<EthernetFrame<T>, Error> {
        let packet = Self::new_unchecked(buffer);
        packet.check_len()?;
        Ok(packet)
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(Error)` if the buffer is too short.
    pub fn check_len(&self) -> Result<(), Error> {
        let len = self.buffer.as_ref().len();

        if len < ETHERNET_HEADER_LEN {
            Err(Error::Frame(FrameError::Truncated))
        } else if self.has_vlan_tag() && len < ETHERNET_HEADER_LEN + VLAN_TAG_LEN {
            Err(Error::Frame(FrameError::Truncated))
        } else {
            Ok(())
        }
    }

    /// Consumes the frame, returning the underlying buffer.
    pub fn into_inner(self) -> T {
        self.buffer
    }

    /// Return the destination address field.
    #[inline]
    pub fn dst_addr(&self) -> EthernetAddress {
        let data = self.buffer.as_ref();
        EthernetAddress::from_bytes(&data[field::DESTINATION])
    }

    /// Return the source address field.
    #[inline]
    pub fn src_addr(&self) -> EthernetAddress {
        let data = self.buffer.as_ref();
        EthernetAddress::from_bytes(&data[field::SOURCE])
    }

    /// Return the outer EtherType field.
    #[inline]
    pub fn ethertype(&self) -> u16 {
        let data = self.buffer.as_ref();

        // Ethernet is big-endian
        data.get(field::ETHERTYPE)
            .map(|res| u16::from_be_bytes([res[0], res[1]]))
            .unwrap_or(0)
    }

    /// Whether the frame carries an 802.1Q tag.
    #[inline]
    pub fn has_vlan_tag(&self) -> bool {
        self.ethertype() == ETHERTYPE_VLAN
    }

    /// Return the VLAN TCI if the frame is 802.1Q tagged.
    #[inline]
    pub fn vlan_tci(&self) -> Option<u16> {
        if self.has_vlan_tag() {
            let data = self.buffer.as_ref();

            data.get(field::VLAN_TCI)
                .map(|res| u16::from_be_bytes([res[0], res[1]]))
        } else {
            None
        }
    }

    /// Return the EtherType of the payload, looking through a VLAN tag when present.
    #[inline]
    pub fn payload_ethertype(&self) -> u16 {
        if self.has_vlan_tag() {
            let data = self.buffer.as_ref();

            data.get(field::VLAN_ETHERTYPE)
                .map(|res| u16::from_be_bytes([res[0], res[1]]))
                .unwrap_or(0)
        } else {
            self.ethertype()
        }
    }

    /// Byte offset of the payload, accounting for a VLAN tag when present.
    #[inline]
    pub fn payload_offset(&self) -> usize {
        if self.has_vlan_tag() {
            ETHERNET_HEADER_LEN + VLAN_TAG_LEN
        } else {
            ETHERNET_HEADER_LEN
        }
    }
}

impl<'a, T: AsRef<[u8]> + ?Sized> EthernetFrame<&'a T> {
    /// Return a pointer to the payload, skipping a VLAN tag when present.
    #[inline]
    pub fn payload(&self) -> &'a [u8] {
        let data = self.buffer.as_ref();
        &data[self.payload_offset()..]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> EthernetFrame<T> {
    /// Set the destination address field.
    #[inline]
    pub fn set_dst_addr(&mut self, value: EthernetAddress) {
        let data = self.buffer.as_mut();
        data[field::DESTINATION].copy_from_slice(value.as_bytes())
    }

    /// Set the source address field.
    #[inline]
    pub fn set_src_addr(&mut self, value: EthernetAddress) {
        let data = self.buffer.as_mut();
        data[field::SOURCE].copy_from_slice(value.as_bytes())
    }

    /// Set the outer EtherType field.
    #[inline]
    pub fn set_ethertype(&mut self, value: u16) {
        let data = self.buffer.as_mut();

        data[field::ETHERTYPE].copy_from_slice(&value.to_be_bytes());
    }

    /// Insert an 802.1Q tag with the given TCI.
    ///
    /// The outer EtherType becomes `0x8100`; `inner_ethertype` follows the tag. Callers must set
    /// the addresses separately.
    #[inline]
    pub fn set_vlan_tag(&mut self, tci: u16, inner_ethertype: u16) {
        let data = self.buffer.as_mut();

        data[field::ETHERTYPE].copy_from_slice(&ETHERTYPE_VLAN.to_be_bytes());
        data[field::VLAN_TCI].copy_from_slice(&tci.to_be_bytes());
        data[field::VLAN_ETHERTYPE].copy_from_slice(&inner_ethertype.to_be_bytes());
    }

    /// Return a mutable pointer to the payload.
    #[inline]
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let offset = self.payload_offset();
        let data = self.buffer.as_mut();
        &mut data[offset..]
    }
}

impl<T: AsRef<[u8]>> AsRef<[u8]> for EthernetFrame<T> {
    fn as_ref(&self) -> &[u8] {
        self.buffer.as_ref()
    }
}

impl<T: AsRef<[u8]>> fmt::Display for EthernetFrame<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "EthernetII src={} dst={} type={:#06x}",
            self.src_addr(),
            self.dst_addr(),
            self.ethertype()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_payload() {
        let mut buf = [0u8; 20];

        {
            let mut frame = EthernetFrame::new_unchecked(&mut buf[..]);
            frame.set_dst_addr(EthernetAddress::PTP_MULTICAST);
            frame.set_src_addr(EthernetAddress([0x02, 0, 0, 0, 0, 1]));
            frame.set_ethertype(ETHERTYPE_PTP);
        }

        let frame = EthernetFrame::new_checked(&buf[..]).unwrap();

        assert_eq!(frame.dst_addr(), EthernetAddress::PTP_MULTICAST);
        assert_eq!(frame.ethertype(), ETHERTYPE_PTP);
        assert_eq!(frame.payload_ethertype(), ETHERTYPE_PTP);
        assert_eq!(frame.vlan_tci(), None);
        assert_eq!(frame.payload().len(), 6);
    }

    #[test]
    fn tagged_payload() {
        let mut buf = [0u8; 24];

        {
            let mut frame = EthernetFrame::new_unchecked(&mut buf[..]);
            frame.set_dst_addr(EthernetAddress::PTP_MULTICAST);
            frame.set_src_addr(EthernetAddress([0x02, 0, 0, 0, 0, 1]));
            frame.set_vlan_tag(0x6002, ETHERTYPE_PTP);
        }

        let frame = EthernetFrame::new_checked(&buf[..]).unwrap();

        assert!(frame.has_vlan_tag());
        assert_eq!(frame.vlan_tci(), Some(0x6002));
        assert_eq!(frame.payload_ethertype(), ETHERTYPE_PTP);
        assert_eq!(frame.payload_offset(), 18);
    }

    #[test]
    fn too_short() {
        let buf = [0u8; 8];

        assert!(EthernetFrame::new_checked(&buf[..]).is_err());
    }
}
