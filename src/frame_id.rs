//! Outgoing frame identifier table.
//!
//! Every transmitted event frame gets an 8 bit frame id so the TX-confirmation path can route the
//! captured egress timestamp back to the state machine that sent the frame. The 256 id space is
//! partitioned per message kind and allocation rolls within each partition.

use crate::frame::MessageType;

/// Number of frame id slots.
pub const FRAME_ID_SLOTS: usize = 256;

/// Sync partition: `[0, 150)`.
const SYNC_RANGE: (u8, u8) = (0, 150);
/// Pdelay_Req partition: `[150, 200)`.
const PDELAY_REQ_RANGE: (u8, u8) = (150, 200);
/// Pdelay_Resp partition: `[200, 250)`.
const PDELAY_RESP_RANGE: (u8, u8) = (200, 250);

/// What a frame id slot remembers about its outstanding frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct FrameIdEntry {
    /// Message kind of the frame.
    pub message_type: MessageType,
    /// Sequence id carried by the frame.
    pub sequence_id: u16,
    /// Egress port.
    pub port: u8,
    /// Machine index: sync machine within its domain, or the Pdelay machine (port) index.
    pub machine: u8,
    /// Domain index for Sync frames.
    pub domain: u8,
    /// Whether the sending machine was acting Grand Master at transmit time.
    pub acting_gm: bool,
}

/// The 256-slot table. Empty slots hold `None` (the legacy sentinel `0xFF` form).
pub(crate) struct FrameIdTable {
    slots: [Option<FrameIdEntry>; FRAME_ID_SLOTS],
    next_sync: u8,
    next_pdelay_req: u8,
    next_pdelay_resp: u8,
}

impl FrameIdTable {
    pub(crate) const fn new() -> Self {
        Self {
            slots: [None; FRAME_ID_SLOTS],
            next_sync: SYNC_RANGE.0,
            next_pdelay_req: PDELAY_REQ_RANGE.0,
            next_pdelay_resp: PDELAY_RESP_RANGE.0,
        }
    }

    /// Clear every slot and reset the rolling cursors.
    pub(crate) fn clear(&mut self) {
        *self = Self::new();
    }

    fn partition(message_type: MessageType) -> (u8, u8) {
        match message_type {
            MessageType::PdelayReq => PDELAY_REQ_RANGE,
            MessageType::PdelayResp => PDELAY_RESP_RANGE,
            // Sync shares its partition with the general messages, which never wait for
            // timestamps and release their slot immediately
            _ => SYNC_RANGE,
        }
    }

    fn cursor(&mut self, message_type: MessageType) -> &mut u8 {
        match message_type {
            MessageType::PdelayReq => &mut self.next_pdelay_req,
            MessageType::PdelayResp => &mut self.next_pdelay_resp,
            _ => &mut self.next_sync,
        }
    }

    /// Allocate the next frame id in the kind's partition and stamp its slot.
    ///
    /// Slots still occupied by an outstanding frame are skipped; if the whole partition is
    /// outstanding the oldest slot is reused.
    pub(crate) fn allocate(&mut self, entry: FrameIdEntry) -> u8 {
        let (start, end) = Self::partition(entry.message_type);
        let span = end - start;

        let mut id = *self.cursor(entry.message_type);

        for _ in 0..span {
            if self.slots[id as usize].is_none() {
                break;
            }

            id = if id + 1 >= end { start } else { id + 1 };
        }

        self.slots[id as usize] = Some(entry);

        *self.cursor(entry.message_type) = if id + 1 >= end { start } else { id + 1 };

        id
    }

    /// Look up and consume the slot for `frame_id`, clearing it back to vacant.
    pub(crate) fn take(&mut self, frame_id: u8) -> Option<FrameIdEntry> {
        self.slots[frame_id as usize].take()
    }

    /// Release a slot without consuming its content (general messages that request no
    /// timestamp).
    pub(crate) fn release(&mut self, frame_id: u8) {
        self.slots[frame_id as usize] = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message_type: MessageType, sequence_id: u16) -> FrameIdEntry {
        FrameIdEntry {
            message_type,
            sequence_id,
            port: 0,
            machine: 0,
            domain: 0,
            acting_gm: false,
        }
    }

    #[test]
    fn ids_stay_in_partition() {
        let mut table = FrameIdTable::new();

        for seq in 0..500u16 {
            let id = table.allocate(entry(MessageType::Sync, seq));
            assert!(id < 150);
            table.release(id);

            let id = table.allocate(entry(MessageType::PdelayReq, seq));
            assert!((150..200).contains(&id));
            table.release(id);

            let id = table.allocate(entry(MessageType::PdelayResp, seq));
            assert!((200..250).contains(&id));
            table.release(id);
        }
    }

    #[test]
    fn wraps_without_aliasing_outstanding() {
        let mut table = FrameIdTable::new();

        // Leave id 150 outstanding
        let outstanding = table.allocate(entry(MessageType::PdelayReq, 0));
        assert_eq!(outstanding, 150);

        // Churn through the rest of the partition, releasing as we go
        for seq in 1..=49u16 {
            let id = table.allocate(entry(MessageType::PdelayReq, seq));
            table.release(id);
        }

        // The cursor wrapped back to the partition start, but 150 is still outstanding and must
        // be skipped
        let id = table.allocate(entry(MessageType::PdelayReq, 50));

        assert_ne!(id, outstanding);
        assert_eq!(id, 151);
        assert_eq!(table.take(outstanding).unwrap().sequence_id, 0);
    }

    #[test]
    fn take_clears_slot() {
        let mut table = FrameIdTable::new();

        let id = table.allocate(entry(MessageType::Sync, 0x400));

        assert_eq!(table.take(id).unwrap().sequence_id, 0x400);
        assert!(table.take(id).is_none());
    }
}
