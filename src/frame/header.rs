//! The 34-octet common PTP message header.
//!
//! All layout work here is explicit shifts, masks and byte ranges. PTP is big-endian on the wire.

use crate::error::FrameError;

/// Byte ranges of the common header fields, relative to the start of the PTP message.
mod field {
    use core::ops::Range;

    /// transportSpecific (majorSdoId) nibble and messageType nibble.
    pub const TYPE_BYTE: usize = 0;
    /// reserved nibble and versionPTP nibble.
    pub const VERSION_BYTE: usize = 1;
    pub const MESSAGE_LENGTH: Range<usize> = 2..4;
    pub const DOMAIN_NUMBER: usize = 4;
    pub const FLAGS: Range<usize> = 6..8;
    pub const CORRECTION: Range<usize> = 8..16;
    pub const SOURCE_CLOCK_ID: Range<usize> = 20..28;
    pub const SOURCE_PORT_ID: Range<usize> = 28..30;
    pub const SEQUENCE_ID: Range<usize> = 30..32;
    pub const CONTROL: usize = 32;
    pub const LOG_MESSAGE_INTERVAL: usize = 33;
}

/// Length of the common PTP header.
pub const HEADER_LEN: usize = 34;

/// transportSpecific value required by 802.1AS.
pub const TRANSPORT_SPECIFIC_1: u8 = 0x1;

/// PTP protocol version emitted in every frame.
pub const PTP_VERSION_2: u8 = 0x2;

/// The PTP message kinds understood by this stack.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum MessageType {
    /// Time-critical Sync event message.
    Sync = 0x0,
    /// Pdelay request event message.
    PdelayReq = 0x2,
    /// Pdelay response event message.
    PdelayResp = 0x3,
    /// Follow_Up general message carrying the precise Sync origin.
    FollowUp = 0x8,
    /// Pdelay response follow-up general message.
    PdelayRespFollowUp = 0xa,
    /// Signaling general message.
    Signaling = 0xc,
}

impl MessageType {
    /// Decode the lower nibble of the first header byte.
    pub fn from_wire(nibble: u8) -> Result<Self, FrameError> {
        match nibble {
            0x0 => Ok(Self::Sync),
            0x2 => Ok(Self::PdelayReq),
            0x3 => Ok(Self::PdelayResp),
            0x8 => Ok(Self::FollowUp),
            0xa => Ok(Self::PdelayRespFollowUp),
            0xc => Ok(Self::Signaling),
            other => Err(FrameError::UnknownMessageType(other)),
        }
    }

    /// `control` field value carried by this message kind.
    pub const fn control(self) -> u8 {
        match self {
            Self::Sync => 0,
            Self::FollowUp => 2,
            _ => 5,
        }
    }

    /// Whether this kind is an event message whose egress must be hardware timestamped.
    pub const fn is_event(self) -> bool {
        matches!(self, Self::Sync | Self::PdelayReq | Self::PdelayResp)
    }
}

bitflags::bitflags! {
    /// The `flags` word of the common header, in its big-endian `u16` reading (first wire octet is
    /// the high byte).
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct HeaderFlags: u16 {
        /// leap61.
        const LEAP_61 = 0x0001;
        /// leap59.
        const LEAP_59 = 0x0002;
        /// currentUtcOffsetValid.
        const UTC_OFFSET_VALID = 0x0004;
        /// ptpTimescale, set on every 802.1AS message.
        const PTP_TIMESCALE = 0x0008;
        /// timeTraceable.
        const TIME_TRACEABLE = 0x0010;
        /// frequencyTraceable.
        const FREQUENCY_TRACEABLE = 0x0020;
        /// alternateMasterFlag.
        const ALTERNATE_MASTER = 0x0100;
        /// twoStepFlag, set on Sync and Pdelay_Resp.
        const TWO_STEP = 0x0200;
        /// unicastFlag.
        const UNICAST = 0x0400;
    }
}

impl HeaderFlags {
    /// Flags emitted on Sync messages.
    pub const SYNC: HeaderFlags = HeaderFlags::PTP_TIMESCALE.union(HeaderFlags::TWO_STEP);
    /// Flags emitted on Follow_Up messages.
    pub const FOLLOW_UP: HeaderFlags = HeaderFlags::PTP_TIMESCALE;
    /// Flags emitted on Pdelay_Req messages.
    pub const PDELAY_REQ: HeaderFlags = HeaderFlags::PTP_TIMESCALE;
    /// Flags emitted on Pdelay_Resp messages.
    pub const PDELAY_RESP: HeaderFlags = HeaderFlags::PTP_TIMESCALE.union(HeaderFlags::TWO_STEP);
    /// Flags emitted on Pdelay_Resp_Follow_Up messages.
    pub const PDELAY_RESP_FUP: HeaderFlags = HeaderFlags::PTP_TIMESCALE;
    /// Flags emitted on Signaling messages.
    pub const SIGNALING: HeaderFlags = HeaderFlags::PTP_TIMESCALE;
}

/// Identity of a clock's port: the 64 bit clock identity plus a 1-based wire port number.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PortIdentity {
    /// EUI-64 style clock identity.
    pub clock_id: u64,
    /// Port number as transmitted on the wire (1-based).
    pub port_number: u16,
}

impl PortIdentity {
    pub(crate) fn unpack(buf: &[u8]) -> Self {
        let mut clock = [0u8; 8];
        clock.copy_from_slice(&buf[0..8]);

        Self {
            clock_id: u64::from_be_bytes(clock),
            port_number: u16::from_be_bytes([buf[8], buf[9]]),
        }
    }

    pub(crate) fn pack(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.clock_id.to_be_bytes());
        buf[8..10].copy_from_slice(&self.port_number.to_be_bytes());
    }
}

/// Decoded common header.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct PtpHeader {
    /// The transportSpecific/majorSdoId nibble.
    pub major_sdo_id: u8,
    /// Message kind.
    pub message_type: Option<MessageType>,
    /// PTP version nibble.
    pub version: u8,
    /// Total PTP message length in octets.
    pub message_length: u16,
    /// Domain number on the wire.
    pub domain_number: u8,
    /// Header flags word.
    pub flags: HeaderFlags,
    /// correctionField: nanoseconds in 48.16 fixed point.
    pub correction_subns: u64,
    /// Sending port identity.
    pub source_port_identity: PortIdentity,
    /// Message sequence id.
    pub sequence_id: u16,
    /// logMessageInterval.
    pub log_message_interval: i8,
}

impl PtpHeader {
    /// Parse the common header from the start of a PTP message.
    ///
    /// The message type is reported as `None` for unknown type nibbles so the caller can decide
    /// whether that is fatal.
    pub fn unpack(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < HEADER_LEN {
            return Err(FrameError::Truncated);
        }

        let mut correction = [0u8; 8];
        correction.copy_from_slice(&buf[field::CORRECTION]);

        Ok(Self {
            major_sdo_id: buf[field::TYPE_BYTE] >> 4,
            message_type: MessageType::from_wire(buf[field::TYPE_BYTE] & 0x0f).ok(),
            version: buf[field::VERSION_BYTE] & 0x0f,
            message_length: u16::from_be_bytes([
                buf[field::MESSAGE_LENGTH.start],
                buf[field::MESSAGE_LENGTH.start + 1],
            ]),
            domain_number: buf[field::DOMAIN_NUMBER],
            flags: HeaderFlags::from_bits_retain(u16::from_be_bytes([
                buf[field::FLAGS.start],
                buf[field::FLAGS.start + 1],
            ])),
            correction_subns: u64::from_be_bytes(correction),
            source_port_identity: PortIdentity::unpack(&buf[field::SOURCE_CLOCK_ID.start..]),
            sequence_id: u16::from_be_bytes([
                buf[field::SEQUENCE_ID.start],
                buf[field::SEQUENCE_ID.start + 1],
            ]),
            log_message_interval: buf[field::LOG_MESSAGE_INTERVAL] as i8,
        })
    }

    /// Write a complete header for the given message kind.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn pack(
        buf: &mut [u8],
        major_sdo_id: u8,
        message_type: MessageType,
        message_length: u16,
        domain_number: u8,
        flags: HeaderFlags,
        correction_subns: u64,
        source_port_identity: PortIdentity,
        sequence_id: u16,
        log_message_interval: i8,
    ) {
        buf[..HEADER_LEN].fill(0);

        buf[field::TYPE_BYTE] = (major_sdo_id << 4) | (message_type as u8);
        buf[field::VERSION_BYTE] = PTP_VERSION_2;
        buf[field::MESSAGE_LENGTH].copy_from_slice(&message_length.to_be_bytes());
        buf[field::DOMAIN_NUMBER] = domain_number;
        buf[field::FLAGS].copy_from_slice(&flags.bits().to_be_bytes());
        buf[field::CORRECTION].copy_from_slice(&correction_subns.to_be_bytes());
        source_port_identity.pack(&mut buf[field::SOURCE_CLOCK_ID.start..]);
        buf[field::SEQUENCE_ID].copy_from_slice(&sequence_id.to_be_bytes());
        buf[field::CONTROL] = message_type.control();
        buf[field::LOG_MESSAGE_INTERVAL] = log_message_interval as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let mut buf = [0u8; HEADER_LEN];

        PtpHeader::pack(
            &mut buf,
            TRANSPORT_SPECIFIC_1,
            MessageType::Sync,
            44,
            0xa0,
            HeaderFlags::SYNC,
            0x0001_0000,
            PortIdentity {
                clock_id: 0x0011_2233_4455_6677,
                port_number: 1,
            },
            0x0456,
            -3,
        );

        let header = PtpHeader::unpack(&buf).unwrap();

        assert_eq!(header.major_sdo_id, 1);
        assert_eq!(header.message_type, Some(MessageType::Sync));
        assert_eq!(header.version, 2);
        assert_eq!(header.message_length, 44);
        assert_eq!(header.domain_number, 0xa0);
        assert_eq!(header.flags, HeaderFlags::SYNC);
        assert_eq!(header.correction_subns, 0x0001_0000);
        assert_eq!(header.source_port_identity.clock_id, 0x0011_2233_4455_6677);
        assert_eq!(header.source_port_identity.port_number, 1);
        assert_eq!(header.sequence_id, 0x0456);
        assert_eq!(header.log_message_interval, -3);
    }

    #[test]
    fn sync_flags_word() {
        assert_eq!(HeaderFlags::SYNC.bits(), 0x0208);
        assert_eq!(HeaderFlags::FOLLOW_UP.bits(), 0x0008);
        assert_eq!(HeaderFlags::PDELAY_RESP.bits(), 0x0208);
    }

    #[test]
    fn control_values() {
        assert_eq!(MessageType::Sync.control(), 0);
        assert_eq!(MessageType::FollowUp.control(), 2);
        assert_eq!(MessageType::PdelayReq.control(), 5);
        assert_eq!(MessageType::Signaling.control(), 5);
    }

    #[test]
    fn short_buffer() {
        assert_eq!(PtpHeader::unpack(&[0u8; 20]), Err(FrameError::Truncated));
    }
}
