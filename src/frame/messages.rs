//! Typed message bodies for the six PTP message kinds, plus the two organization TLVs carried by
//! Follow_Up and Signaling.

use crate::{
    error::FrameError,
    frame::header::{HEADER_LEN, PortIdentity, PtpHeader},
    time::Timestamp,
};

/// PTP message lengths after the Ethernet header, in octets.
pub mod length {
    /// Sync message length.
    pub const SYNC: usize = 44;
    /// Pdelay_Req message length.
    pub const PDELAY_REQ: usize = 54;
    /// Pdelay_Resp message length.
    pub const PDELAY_RESP: usize = 54;
    /// Follow_Up message length including the Follow_Up information TLV.
    pub const FOLLOW_UP: usize = 76;
    /// Pdelay_Resp_Follow_Up message length.
    pub const PDELAY_RESP_FUP: usize = 54;
    /// Signaling message length including the message interval request TLV.
    pub const SIGNALING: usize = 60;
}

/// 2⁴¹, the cumulativeScaledRateOffset scale factor.
const POW_2_41: f64 = 2_199_023_255_552.0;

/// Convert a rate ratio to the scaled wire form `(ratio − 1.0) × 2⁴¹`.
pub fn rate_ratio_to_wire(ratio: f64) -> i32 {
    crate::time::f64_to_i32_saturating((ratio - 1.0) * POW_2_41)
}

/// Convert the scaled wire form back to a rate ratio.
pub fn rate_ratio_from_wire(wire: i32) -> f64 {
    (wire as f64) / POW_2_41 + 1.0
}

fn unpack_timestamp(buf: &[u8]) -> Result<Timestamp, FrameError> {
    let seconds = u64::from_be_bytes([0, 0, buf[0], buf[1], buf[2], buf[3], buf[4], buf[5]]);
    let nanoseconds = u32::from_be_bytes([buf[6], buf[7], buf[8], buf[9]]);

    Timestamp::from_wire(seconds, nanoseconds).map_err(|_| FrameError::BadTimestamp)
}

fn pack_timestamp(ts: Timestamp, buf: &mut [u8]) {
    buf[0..6].copy_from_slice(&ts.seconds.to_be_bytes()[2..8]);
    buf[6..10].copy_from_slice(&ts.nanoseconds.to_be_bytes());
}

/// A decoded Sync message.
///
/// The origin timestamp field is reserved in two-step operation and is not decoded.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SyncMessage {
    /// Common header.
    pub header: PtpHeader,
}

impl SyncMessage {
    pub(crate) fn unpack(header: PtpHeader, buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < length::SYNC {
            return Err(FrameError::Truncated);
        }

        Ok(Self { header })
    }
}

/// A decoded Follow_Up message with its Follow_Up information TLV.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FollowUpMessage {
    /// Common header.
    pub header: PtpHeader,
    /// preciseOriginTimestamp: the GM time at which the paired Sync left its origin.
    pub precise_origin: Timestamp,
    /// Cumulative rate ratio decoded from the TLV's scaled form.
    pub rate_ratio: f64,
    /// gmTimeBaseIndicator from the TLV.
    pub gm_time_base_indicator: u16,
    /// lastGmPhaseChange, high 32 bits.
    pub last_gm_phase_change_h: u32,
    /// lastGmPhaseChange, low 64 bits.
    pub last_gm_phase_change_l: u64,
    /// scaledLastGmFreqChange from the TLV.
    pub scaled_last_gm_freq_change: u32,
}

mod fup_field {
    use core::ops::Range;

    pub const PRECISE_ORIGIN: Range<usize> = 34..44;
    pub const TLV_TYPE: Range<usize> = 44..46;
    pub const TLV_LENGTH: Range<usize> = 46..48;
    pub const TLV_ORG_ID: Range<usize> = 48..51;
    pub const TLV_ORG_SUBTYPE: Range<usize> = 51..54;
    pub const TLV_RATE_OFFSET: Range<usize> = 54..58;
    pub const TLV_TB_INDICATOR: Range<usize> = 58..60;
    pub const TLV_PHASE_CHANGE_H: Range<usize> = 60..64;
    pub const TLV_PHASE_CHANGE_L: Range<usize> = 64..72;
    pub const TLV_FREQ_CHANGE: Range<usize> = 72..76;
}

/// Follow_Up information TLV constants.
mod fup_tlv {
    pub const TLV_TYPE: u16 = 0x0003;
    pub const TLV_LENGTH: u16 = 28;
    pub const ORG_ID: [u8; 3] = [0x00, 0x80, 0xc2];
    pub const ORG_SUBTYPE: [u8; 3] = [0x00, 0x00, 0x01];
}

impl FollowUpMessage {
    pub(crate) fn unpack(header: PtpHeader, buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < length::FOLLOW_UP {
            return Err(FrameError::Truncated);
        }

        let rate_wire = i32::from_be_bytes([
            buf[fup_field::TLV_RATE_OFFSET.start],
            buf[fup_field::TLV_RATE_OFFSET.start + 1],
            buf[fup_field::TLV_RATE_OFFSET.start + 2],
            buf[fup_field::TLV_RATE_OFFSET.start + 3],
        ]);

        let mut phase_l = [0u8; 8];
        phase_l.copy_from_slice(&buf[fup_field::TLV_PHASE_CHANGE_L]);

        Ok(Self {
            header,
            precise_origin: unpack_timestamp(&buf[fup_field::PRECISE_ORIGIN])?,
            rate_ratio: rate_ratio_from_wire(rate_wire),
            gm_time_base_indicator: u16::from_be_bytes([
                buf[fup_field::TLV_TB_INDICATOR.start],
                buf[fup_field::TLV_TB_INDICATOR.start + 1],
            ]),
            last_gm_phase_change_h: u32::from_be_bytes([
                buf[fup_field::TLV_PHASE_CHANGE_H.start],
                buf[fup_field::TLV_PHASE_CHANGE_H.start + 1],
                buf[fup_field::TLV_PHASE_CHANGE_H.start + 2],
                buf[fup_field::TLV_PHASE_CHANGE_H.start + 3],
            ]),
            last_gm_phase_change_l: u64::from_be_bytes(phase_l),
            scaled_last_gm_freq_change: u32::from_be_bytes([
                buf[fup_field::TLV_FREQ_CHANGE.start],
                buf[fup_field::TLV_FREQ_CHANGE.start + 1],
                buf[fup_field::TLV_FREQ_CHANGE.start + 2],
                buf[fup_field::TLV_FREQ_CHANGE.start + 3],
            ]),
        })
    }

    pub(crate) fn pack_body(
        buf: &mut [u8],
        precise_origin: Timestamp,
        rate_ratio: f64,
        gm_time_base_indicator: u16,
        last_gm_phase_change_h: u32,
        last_gm_phase_change_l: u64,
        scaled_last_gm_freq_change: u32,
    ) {
        pack_timestamp(precise_origin, &mut buf[fup_field::PRECISE_ORIGIN]);

        buf[fup_field::TLV_TYPE].copy_from_slice(&fup_tlv::TLV_TYPE.to_be_bytes());
        buf[fup_field::TLV_LENGTH].copy_from_slice(&fup_tlv::TLV_LENGTH.to_be_bytes());
        buf[fup_field::TLV_ORG_ID].copy_from_slice(&fup_tlv::ORG_ID);
        buf[fup_field::TLV_ORG_SUBTYPE].copy_from_slice(&fup_tlv::ORG_SUBTYPE);
        buf[fup_field::TLV_RATE_OFFSET]
            .copy_from_slice(&rate_ratio_to_wire(rate_ratio).to_be_bytes());
        buf[fup_field::TLV_TB_INDICATOR].copy_from_slice(&gm_time_base_indicator.to_be_bytes());
        buf[fup_field::TLV_PHASE_CHANGE_H].copy_from_slice(&last_gm_phase_change_h.to_be_bytes());
        buf[fup_field::TLV_PHASE_CHANGE_L].copy_from_slice(&last_gm_phase_change_l.to_be_bytes());
        buf[fup_field::TLV_FREQ_CHANGE].copy_from_slice(&scaled_last_gm_freq_change.to_be_bytes());
    }
}

/// A decoded Pdelay_Req message.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PdelayReqMessage {
    /// Common header.
    pub header: PtpHeader,
}

impl PdelayReqMessage {
    pub(crate) fn unpack(header: PtpHeader, buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < length::PDELAY_REQ {
            return Err(FrameError::Truncated);
        }

        Ok(Self { header })
    }
}

mod pdelay_field {
    use core::ops::Range;

    pub const TIMESTAMP: Range<usize> = 34..44;
    pub const REQUESTING_IDENTITY: Range<usize> = 44..54;
}

/// A decoded Pdelay_Resp message.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PdelayRespMessage {
    /// Common header.
    pub header: PtpHeader,
    /// requestReceiptTimestamp: the peer's ingress time of our Pdelay_Req (T2).
    pub request_receipt: Timestamp,
    /// requestingPortIdentity: who asked.
    pub requesting: PortIdentity,
}

impl PdelayRespMessage {
    pub(crate) fn unpack(header: PtpHeader, buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < length::PDELAY_RESP {
            return Err(FrameError::Truncated);
        }

        Ok(Self {
            header,
            request_receipt: unpack_timestamp(&buf[pdelay_field::TIMESTAMP])?,
            requesting: PortIdentity::unpack(&buf[pdelay_field::REQUESTING_IDENTITY]),
        })
    }

    pub(crate) fn pack_body(buf: &mut [u8], request_receipt: Timestamp, requesting: PortIdentity) {
        pack_timestamp(request_receipt, &mut buf[pdelay_field::TIMESTAMP]);
        requesting.pack(&mut buf[pdelay_field::REQUESTING_IDENTITY]);
    }
}

/// A decoded Pdelay_Resp_Follow_Up message.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PdelayRespFupMessage {
    /// Common header.
    pub header: PtpHeader,
    /// responseOriginTimestamp: the peer's egress time of its Pdelay_Resp (T3).
    pub response_origin: Timestamp,
    /// requestingPortIdentity: who asked.
    pub requesting: PortIdentity,
}

impl PdelayRespFupMessage {
    pub(crate) fn unpack(header: PtpHeader, buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < length::PDELAY_RESP_FUP {
            return Err(FrameError::Truncated);
        }

        Ok(Self {
            header,
            response_origin: unpack_timestamp(&buf[pdelay_field::TIMESTAMP])?,
            requesting: PortIdentity::unpack(&buf[pdelay_field::REQUESTING_IDENTITY]),
        })
    }

    pub(crate) fn pack_body(buf: &mut [u8], response_origin: Timestamp, requesting: PortIdentity) {
        pack_timestamp(response_origin, &mut buf[pdelay_field::TIMESTAMP]);
        requesting.pack(&mut buf[pdelay_field::REQUESTING_IDENTITY]);
    }
}

mod signaling_field {
    use core::ops::Range;

    pub const TARGET_IDENTITY: Range<usize> = 34..44;
    pub const TLV_TYPE: Range<usize> = 44..46;
    pub const TLV_LENGTH: Range<usize> = 46..48;
    pub const TLV_ORG_ID: Range<usize> = 48..51;
    pub const TLV_ORG_SUBTYPE: Range<usize> = 51..54;
    pub const TLV_LINK_DELAY_INTERVAL: usize = 54;
    pub const TLV_TIME_SYNC_INTERVAL: usize = 55;
    pub const TLV_ANNOUNCE_INTERVAL: usize = 56;
    pub const TLV_FLAGS: usize = 57;
}

/// Message interval request TLV constants.
mod signaling_tlv {
    pub const TLV_TYPE: u16 = 0x0003;
    pub const TLV_LENGTH: u16 = 12;
    pub const ORG_ID: [u8; 3] = [0x00, 0x80, 0xc2];
    pub const ORG_SUBTYPE: [u8; 3] = [0x00, 0x00, 0x02];
    /// computeNeighborRateRatio | computeNeighborPropDelay.
    pub const FLAGS: u8 = 0x03;
    /// "Do not change this interval".
    pub const INTERVAL_UNCHANGED: i8 = -128;
}

/// A decoded Signaling message.
///
/// Only the message interval request TLV is honored; of its three interval octets only
/// `timeSyncInterval` is consumed.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SignalingMessage {
    /// Common header.
    pub header: PtpHeader,
    /// targetPortIdentity.
    pub target: PortIdentity,
    /// Requested Sync interval in log₂ form.
    pub time_sync_interval: i8,
}

impl SignalingMessage {
    pub(crate) fn unpack(header: PtpHeader, buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < length::SIGNALING {
            return Err(FrameError::Truncated);
        }

        // Any other TLV kind leaves the interval unchanged
        let is_interval_request = buf[signaling_field::TLV_TYPE.start..signaling_field::TLV_TYPE.end]
            == signaling_tlv::TLV_TYPE.to_be_bytes()
            && buf[signaling_field::TLV_ORG_ID.start..signaling_field::TLV_ORG_ID.end]
                == signaling_tlv::ORG_ID
            && buf[signaling_field::TLV_ORG_SUBTYPE.start..signaling_field::TLV_ORG_SUBTYPE.end]
                == signaling_tlv::ORG_SUBTYPE;

        let time_sync_interval = if is_interval_request {
            buf[signaling_field::TLV_TIME_SYNC_INTERVAL] as i8
        } else {
            signaling_tlv::INTERVAL_UNCHANGED
        };

        Ok(Self {
            header,
            target: PortIdentity::unpack(&buf[signaling_field::TARGET_IDENTITY]),
            time_sync_interval,
        })
    }

    pub(crate) fn pack_body(buf: &mut [u8], target: PortIdentity, time_sync_interval: i8) {
        target.pack(&mut buf[signaling_field::TARGET_IDENTITY]);

        buf[signaling_field::TLV_TYPE].copy_from_slice(&signaling_tlv::TLV_TYPE.to_be_bytes());
        buf[signaling_field::TLV_LENGTH].copy_from_slice(&signaling_tlv::TLV_LENGTH.to_be_bytes());
        buf[signaling_field::TLV_ORG_ID].copy_from_slice(&signaling_tlv::ORG_ID);
        buf[signaling_field::TLV_ORG_SUBTYPE].copy_from_slice(&signaling_tlv::ORG_SUBTYPE);
        buf[signaling_field::TLV_LINK_DELAY_INTERVAL] = signaling_tlv::INTERVAL_UNCHANGED as u8;
        buf[signaling_field::TLV_TIME_SYNC_INTERVAL] = time_sync_interval as u8;
        buf[signaling_field::TLV_ANNOUNCE_INTERVAL] = signaling_tlv::INTERVAL_UNCHANGED as u8;
        buf[signaling_field::TLV_FLAGS] = signaling_tlv::FLAGS;
    }
}

/// Sanity check that the header length constant and the body field maps agree.
const _: () = {
    assert!(HEADER_LEN == 34);
    assert!(length::FOLLOW_UP == 76);
    assert!(length::SIGNALING == 60);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_wire_form() {
        let mut buf = [0u8; 10];

        pack_timestamp(Timestamp::new(0x0001_0203_0405, 999_999_999), &mut buf);

        assert_eq!(buf[0..6], [0x00, 0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(
            unpack_timestamp(&buf).unwrap(),
            Timestamp::new(0x0001_0203_0405, 999_999_999)
        );
    }

    #[test]
    fn rate_ratio_scaling() {
        assert_eq!(rate_ratio_to_wire(1.0), 0);

        // 100 ppm fast peer
        let wire = rate_ratio_to_wire(1.0001);
        let back = rate_ratio_from_wire(wire);

        assert!((back - 1.0001).abs() < 1e-9);
    }

    #[test]
    fn rate_ratio_wire_zero_is_unity() {
        assert_eq!(rate_ratio_from_wire(0), 1.0);
    }
}
