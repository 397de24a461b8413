//! PTP frame codec: raw Ethernet II (optionally 802.1Q tagged) carrying PTPv2 event and general
//! messages per IEEE 802.1AS.
//!
//! Decode yields typed message structs; encode builds complete on-wire frames into fixed send
//! buffers. All integers are big-endian and every layout decision is an explicit byte range — no
//! bitfields.

pub mod header;
pub mod messages;

pub use header::{HeaderFlags, MessageType, PortIdentity, PtpHeader, TRANSPORT_SPECIFIC_1};
pub use messages::{
    FollowUpMessage, PdelayReqMessage, PdelayRespFupMessage, PdelayRespMessage, SignalingMessage,
    SyncMessage, length, rate_ratio_from_wire, rate_ratio_to_wire,
};

use crate::{
    error::{Error, FrameError},
    ethernet::{ETHERNET_HEADER_LEN, ETHERTYPE_PTP, EthernetAddress, EthernetFrame, VLAN_TAG_LEN},
    time::Timestamp,
};

/// Largest complete frame this stack emits: a VLAN tagged Follow_Up.
pub const MAX_FRAME_LEN: usize = ETHERNET_HEADER_LEN + VLAN_TAG_LEN + length::FOLLOW_UP;

/// A decoded PTP message of any supported kind.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Message {
    /// Sync event message.
    Sync(SyncMessage),
    /// Follow_Up general message.
    FollowUp(FollowUpMessage),
    /// Pdelay_Req event message.
    PdelayReq(PdelayReqMessage),
    /// Pdelay_Resp event message.
    PdelayResp(PdelayRespMessage),
    /// Pdelay_Resp_Follow_Up general message.
    PdelayRespFollowUp(PdelayRespFupMessage),
    /// Signaling general message.
    Signaling(SignalingMessage),
}

impl Message {
    /// The common header of whichever kind this is.
    pub fn header(&self) -> &PtpHeader {
        match self {
            Message::Sync(m) => &m.header,
            Message::FollowUp(m) => &m.header,
            Message::PdelayReq(m) => &m.header,
            Message::PdelayResp(m) => &m.header,
            Message::PdelayRespFollowUp(m) => &m.header,
            Message::Signaling(m) => &m.header,
        }
    }

    /// Message kind.
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Sync(_) => MessageType::Sync,
            Message::FollowUp(_) => MessageType::FollowUp,
            Message::PdelayReq(_) => MessageType::PdelayReq,
            Message::PdelayResp(_) => MessageType::PdelayResp,
            Message::PdelayRespFollowUp(_) => MessageType::PdelayRespFollowUp,
            Message::Signaling(_) => MessageType::Signaling,
        }
    }
}

/// Decode a PTP message starting at the common header.
///
/// `sdo_compatibility` admits Pdelay messages whose transportSpecific nibble is not 1; Sync,
/// Follow_Up and Signaling always require transportSpecific 1.
pub fn decode(payload: &[u8], sdo_compatibility: bool) -> Result<Message, FrameError> {
    let header = PtpHeader::unpack(payload)?;

    let message_type = header
        .message_type
        .ok_or(FrameError::UnknownMessageType(payload[0] & 0x0f))?;

    if header.major_sdo_id != TRANSPORT_SPECIFIC_1 {
        let tolerated = sdo_compatibility
            && matches!(
                message_type,
                MessageType::PdelayReq | MessageType::PdelayResp | MessageType::PdelayRespFollowUp
            );

        if !tolerated {
            return Err(FrameError::TransportSpecific);
        }
    }

    match message_type {
        MessageType::Sync => SyncMessage::unpack(header, payload).map(Message::Sync),
        MessageType::FollowUp => FollowUpMessage::unpack(header, payload).map(Message::FollowUp),
        MessageType::PdelayReq => PdelayReqMessage::unpack(header, payload).map(Message::PdelayReq),
        MessageType::PdelayResp => {
            PdelayRespMessage::unpack(header, payload).map(Message::PdelayResp)
        }
        MessageType::PdelayRespFollowUp => {
            PdelayRespFupMessage::unpack(header, payload).map(Message::PdelayRespFollowUp)
        }
        MessageType::Signaling => SignalingMessage::unpack(header, payload).map(Message::Signaling),
    }
}

/// Everything needed to address and header a single outgoing PTP frame.
#[derive(Debug, Copy, Clone)]
pub(crate) struct FrameMeta {
    /// Destination MAC: the PTP multicast address, or the peer's unicast address for unicast
    /// Pdelay responses.
    pub dest: EthernetAddress,
    /// Source MAC of the egress port.
    pub source: EthernetAddress,
    /// 802.1Q TCI to tag the frame with, if VLAN operation is enabled.
    pub vlan_tci: Option<u16>,
    /// Wire domain number.
    pub domain_number: u8,
    /// Message sequence id.
    pub sequence_id: u16,
    /// Sending port identity (port number already 1-based).
    pub source_port_identity: PortIdentity,
    /// logMessageInterval.
    pub log_message_interval: i8,
    /// correctionField in 48.16 sub-nanoseconds.
    pub correction_subns: u64,
    /// transportSpecific nibble; normally 1, echoed from the request in SdoId compatibility mode.
    pub major_sdo_id: u8,
}

/// Body payload for [`encode`].
#[derive(Debug, Copy, Clone)]
pub(crate) enum Payload {
    Sync,
    FollowUp {
        precise_origin: Timestamp,
        rate_ratio: f64,
        gm_time_base_indicator: u16,
        last_gm_phase_change_h: u32,
        last_gm_phase_change_l: u64,
        scaled_last_gm_freq_change: u32,
    },
    PdelayReq,
    PdelayResp {
        request_receipt: Timestamp,
        requesting: PortIdentity,
    },
    PdelayRespFollowUp {
        response_origin: Timestamp,
        requesting: PortIdentity,
    },
    Signaling {
        target: PortIdentity,
        time_sync_interval: i8,
    },
}

impl Payload {
    pub(crate) fn message_type(&self) -> MessageType {
        match self {
            Payload::Sync => MessageType::Sync,
            Payload::FollowUp { .. } => MessageType::FollowUp,
            Payload::PdelayReq => MessageType::PdelayReq,
            Payload::PdelayResp { .. } => MessageType::PdelayResp,
            Payload::PdelayRespFollowUp { .. } => MessageType::PdelayRespFollowUp,
            Payload::Signaling { .. } => MessageType::Signaling,
        }
    }

    fn ptp_len(&self) -> usize {
        match self {
            Payload::Sync => length::SYNC,
            Payload::FollowUp { .. } => length::FOLLOW_UP,
            Payload::PdelayReq => length::PDELAY_REQ,
            Payload::PdelayResp { .. } => length::PDELAY_RESP,
            Payload::PdelayRespFollowUp { .. } => length::PDELAY_RESP_FUP,
            Payload::Signaling { .. } => length::SIGNALING,
        }
    }

    fn flags(&self) -> HeaderFlags {
        match self {
            Payload::Sync => HeaderFlags::SYNC,
            Payload::FollowUp { .. } => HeaderFlags::FOLLOW_UP,
            Payload::PdelayReq => HeaderFlags::PDELAY_REQ,
            Payload::PdelayResp { .. } => HeaderFlags::PDELAY_RESP,
            Payload::PdelayRespFollowUp { .. } => HeaderFlags::PDELAY_RESP_FUP,
            Payload::Signaling { .. } => HeaderFlags::SIGNALING,
        }
    }
}

/// Build a complete on-wire frame into `buf` and return its length.
pub(crate) fn encode(meta: &FrameMeta, payload: &Payload, buf: &mut [u8]) -> Result<usize, Error> {
    let ptp_len = payload.ptp_len();
    let eth_len = ETHERNET_HEADER_LEN + meta.vlan_tci.map_or(0, |_| VLAN_TAG_LEN);
    let total = eth_len + ptp_len;

    if buf.len() < total {
        return Err(Error::Frame(FrameError::Truncated));
    }

    buf[..total].fill(0);

    let mut frame = EthernetFrame::new_unchecked(&mut buf[..total]);

    frame.set_dst_addr(meta.dest);
    frame.set_src_addr(meta.source);

    if let Some(tci) = meta.vlan_tci {
        frame.set_vlan_tag(tci, ETHERTYPE_PTP);
    } else {
        frame.set_ethertype(ETHERTYPE_PTP);
    }

    let ptp = frame.payload_mut();

    PtpHeader::pack(
        ptp,
        meta.major_sdo_id,
        payload.message_type(),
        ptp_len as u16,
        meta.domain_number,
        payload.flags(),
        meta.correction_subns,
        meta.source_port_identity,
        meta.sequence_id,
        meta.log_message_interval,
    );

    match *payload {
        Payload::Sync | Payload::PdelayReq => {
            // Origin timestamp and reserved fields stay zero in two-step operation
        }
        Payload::FollowUp {
            precise_origin,
            rate_ratio,
            gm_time_base_indicator,
            last_gm_phase_change_h,
            last_gm_phase_change_l,
            scaled_last_gm_freq_change,
        } => {
            FollowUpMessage::pack_body(
                ptp,
                precise_origin,
                rate_ratio,
                gm_time_base_indicator,
                last_gm_phase_change_h,
                last_gm_phase_change_l,
                scaled_last_gm_freq_change,
            );
        }
        Payload::PdelayResp {
            request_receipt,
            requesting,
        } => {
            PdelayRespMessage::pack_body(ptp, request_receipt, requesting);
        }
        Payload::PdelayRespFollowUp {
            response_origin,
            requesting,
        } => {
            PdelayRespFupMessage::pack_body(ptp, response_origin, requesting);
        }
        Payload::Signaling {
            target,
            time_sync_interval,
        } => {
            SignalingMessage::pack_body(ptp, target, time_sync_interval);
        }
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Timestamp;

    fn meta(seq: u16) -> FrameMeta {
        FrameMeta {
            dest: EthernetAddress::PTP_MULTICAST,
            source: EthernetAddress([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
            vlan_tci: None,
            domain_number: 0,
            sequence_id: seq,
            source_port_identity: PortIdentity {
                clock_id: 0x0011_2233_4455_6677,
                port_number: 1,
            },
            log_message_interval: -3,
            correction_subns: 0,
            major_sdo_id: TRANSPORT_SPECIFIC_1,
        }
    }

    fn decode_frame(buf: &[u8]) -> Message {
        let frame = EthernetFrame::new_checked(buf).unwrap();

        assert_eq!(frame.payload_ethertype(), ETHERTYPE_PTP);

        decode(frame.payload(), false).unwrap()
    }

    #[test]
    fn sync_encode_decode() {
        let mut buf = [0u8; MAX_FRAME_LEN];

        let len = encode(&meta(0x0400), &Payload::Sync, &mut buf).unwrap();

        assert_eq!(len, ETHERNET_HEADER_LEN + length::SYNC);

        let msg = decode_frame(&buf[..len]);

        let Message::Sync(sync) = msg else {
            panic!("expected Sync, got {:?}", msg);
        };

        assert_eq!(sync.header.sequence_id, 0x0400);
        assert_eq!(sync.header.flags, HeaderFlags::SYNC);
        assert_eq!(sync.header.log_message_interval, -3);
        assert_eq!(sync.header.message_length, length::SYNC as u16);
    }

    #[test]
    fn follow_up_round_trip() {
        let mut buf = [0u8; MAX_FRAME_LEN];

        let origin = Timestamp::new(10_000, 123_456_789);

        let mut m = meta(0x0401);
        m.correction_subns = 0x1234_5678_0000;

        let len = encode(
            &m,
            &Payload::FollowUp {
                precise_origin: origin,
                rate_ratio: 1.000_025,
                gm_time_base_indicator: 7,
                last_gm_phase_change_h: 0xdead,
                last_gm_phase_change_l: 0xbeef_cafe,
                scaled_last_gm_freq_change: 42,
            },
            &mut buf,
        )
        .unwrap();

        assert_eq!(len, ETHERNET_HEADER_LEN + length::FOLLOW_UP);

        let Message::FollowUp(fup) = decode_frame(&buf[..len]) else {
            panic!("expected Follow_Up");
        };

        assert_eq!(fup.header.correction_subns, 0x1234_5678_0000);
        assert_eq!(fup.precise_origin, origin);
        assert!((fup.rate_ratio - 1.000_025).abs() < 1e-9);
        assert_eq!(fup.gm_time_base_indicator, 7);
        assert_eq!(fup.last_gm_phase_change_h, 0xdead);
        assert_eq!(fup.last_gm_phase_change_l, 0xbeef_cafe);
        assert_eq!(fup.scaled_last_gm_freq_change, 42);
    }

    #[test]
    fn pdelay_resp_round_trip_with_vlan() {
        let mut buf = [0u8; MAX_FRAME_LEN];

        let mut m = meta(0x0100);
        m.vlan_tci = Some(0x6000);

        let requesting = PortIdentity {
            clock_id: 0x8899_aabb_ccdd_eeff,
            port_number: 2,
        };

        let len = encode(
            &m,
            &Payload::PdelayResp {
                request_receipt: Timestamp::new(55, 100),
                requesting,
            },
            &mut buf,
        )
        .unwrap();

        assert_eq!(
            len,
            ETHERNET_HEADER_LEN + VLAN_TAG_LEN + length::PDELAY_RESP
        );

        let frame = EthernetFrame::new_checked(&buf[..len]).unwrap();

        assert_eq!(frame.vlan_tci(), Some(0x6000));
        assert_eq!(frame.payload_ethertype(), ETHERTYPE_PTP);

        let Message::PdelayResp(resp) = decode(frame.payload(), false).unwrap() else {
            panic!("expected Pdelay_Resp");
        };

        assert_eq!(resp.request_receipt, Timestamp::new(55, 100));
        assert_eq!(resp.requesting, requesting);
    }

    #[test]
    fn signaling_round_trip() {
        let mut buf = [0u8; MAX_FRAME_LEN];

        let target = PortIdentity {
            clock_id: 0x1122_3344_5566_7788,
            port_number: 1,
        };

        let len = encode(
            &meta(0x0001),
            &Payload::Signaling {
                target,
                time_sync_interval: -4,
            },
            &mut buf,
        )
        .unwrap();

        assert_eq!(len, ETHERNET_HEADER_LEN + length::SIGNALING);

        let Message::Signaling(sig) = decode_frame(&buf[..len]) else {
            panic!("expected Signaling");
        };

        assert_eq!(sig.target, target);
        assert_eq!(sig.time_sync_interval, -4);
    }

    #[test]
    fn transport_specific_gate() {
        let mut buf = [0u8; MAX_FRAME_LEN];

        let mut m = meta(0x0100);
        m.major_sdo_id = 0x2;

        let len = encode(&m, &Payload::PdelayReq, &mut buf).unwrap();
        let frame = EthernetFrame::new_checked(&buf[..len]).unwrap();

        // Rejected without compatibility mode
        assert_eq!(
            decode(frame.payload(), false),
            Err(FrameError::TransportSpecific)
        );

        // Tolerated for Pdelay kinds in compatibility mode
        let msg = decode(frame.payload(), true).unwrap();

        assert_eq!(msg.header().major_sdo_id, 0x2);

        // Never tolerated for Sync
        let len = encode(&m, &Payload::Sync, &mut buf).unwrap();
        let frame = EthernetFrame::new_checked(&buf[..len]).unwrap();

        assert_eq!(
            decode(frame.payload(), true),
            Err(FrameError::TransportSpecific)
        );
    }

    #[test]
    fn property_header_round_trip() {
        heckcheck::check(
            |(seq, domain, corr, clock_id, port, log): (u16, u8, u64, u64, u16, i8)| {
                let mut buf = [0u8; MAX_FRAME_LEN];

                let m = FrameMeta {
                    dest: EthernetAddress::PTP_MULTICAST,
                    source: EthernetAddress([2, 0, 0, 0, 0, 9]),
                    vlan_tci: None,
                    domain_number: domain,
                    sequence_id: seq,
                    source_port_identity: PortIdentity {
                        clock_id,
                        port_number: port,
                    },
                    log_message_interval: log,
                    correction_subns: corr,
                    major_sdo_id: TRANSPORT_SPECIFIC_1,
                };

                let len = encode(&m, &Payload::Sync, &mut buf).unwrap();
                let frame = EthernetFrame::new_checked(&buf[..len]).unwrap();
                let header = *decode(frame.payload(), false).unwrap().header();

                assert_eq!(header.sequence_id, seq);
                assert_eq!(header.domain_number, domain);
                assert_eq!(header.correction_subns, corr);
                assert_eq!(header.source_port_identity.clock_id, clock_id);
                assert_eq!(header.source_port_identity.port_number, port);
                assert_eq!(header.log_message_interval, log);

                Ok(())
            },
        );
    }
}
