//! Per-domain state: one synchronized time base, its sync machines and the bookkeeping shared
//! between them.

use heapless::Vec;

use crate::{
    config::MAX_SYNC_MACHINES,
    frame::MAX_FRAME_LEN,
    sync::SyncMachine,
    time::Timestamp,
};

/// Runtime state of one gPTP domain.
pub(crate) struct Domain {
    /// Domain index in configuration order.
    pub index: u8,
    /// Domain number on the wire.
    pub number: u8,
    /// This node is the Grand Master of the domain.
    pub is_gm: bool,
    /// The GM transmits corrected instead of free-running time.
    pub synced_gm: bool,
    /// Domain index the synced GM takes its rate ratio from.
    pub reference_domain_index: u8,
    /// Seconds without upstream Syncs before a bridge starts acting as GM.
    pub startup_timeout_s: u8,
    /// Missed Syncs before the receipt timeout fires.
    pub sync_receipt_timeout_cnt: u8,
    /// Outlier rejection threshold in nanoseconds.
    pub outlier_threshold_ns: u32,
    /// Consecutive outliers dropped before acceptance is forced.
    pub outlier_ignore_cnt: u8,
    /// Consecutive outliers seen so far.
    pub outlier_cnt: u8,
    /// VLAN TCI for this domain's frames; refreshed from ingress Syncs.
    pub vlan_tci: u16,
    /// Index of the slave machine. Only meaningful on non-GM domains.
    pub slave_machine: usize,
    /// Whether Syncs are currently emitted in acting-GM mode.
    pub acting_gm: bool,
    /// A valid Sync has been received (cleared at init; arms the cascaded send path).
    pub valid_sync_received: bool,
    /// A valid Sync/Follow_Up pair has ever been processed since start.
    pub sync_valid_ever_received: bool,
    /// The GM-stall condition has been reported for the ongoing stall.
    pub gm_failure_reported: bool,
    /// The last received sync was applied to the local clock.
    pub rcvd_sync_used_for_local_clk: bool,
    /// Sequence counter for outgoing Signaling messages.
    pub signaling_sequence_id: u16,
    /// gmTimeBaseIndicator forwarded in Follow_Up TLVs.
    pub gm_time_base_indicator: u16,
    /// lastGmPhaseChange, high part.
    pub last_gm_phase_change_h: u32,
    /// lastGmPhaseChange, low part.
    pub last_gm_phase_change_l: u64,
    /// scaledLastGmFreqChange.
    pub scaled_last_gm_freq_change: u32,
    /// Free-running time of the last Sync reception in nanoseconds.
    pub last_sync_rcvd_ns: u64,
    /// Next signaling interval check.
    pub sync_check_due_ns: u64,
    /// Deadline for the sync receipt timeout; zero disarms it.
    pub receipt_timeout_due_ns: u64,
    /// Last accepted GM time plus correction.
    pub last_valid_gm_plus_corr: Timestamp,
    /// Local ingress time of the last accepted Sync.
    pub last_valid_ts_of_gm_plus_corr: Timestamp,
    /// preciseOriginTimestamp of the previous Follow_Up, for GM stall detection.
    pub prev_precise_origin: Timestamp,
    /// The domain's sync machines.
    pub machines: Vec<SyncMachine, MAX_SYNC_MACHINES>,
    /// Send buffer for Signaling messages.
    pub signaling_buf: [u8; MAX_FRAME_LEN],
}

impl Domain {
    /// Register a freshly received Sync on the slave port: remember its arrival time and re-arm
    /// the receipt timeout.
    pub(crate) fn register_valid_sync(&mut self, now_ns: u64, slave_interval_log: i8) {
        self.last_sync_rcvd_ns = now_ns;
        self.receipt_timeout_due_ns = now_ns
            + crate::time::log_interval_to_ns(slave_interval_log)
                * u64::from(self.sync_receipt_timeout_cnt);
        self.valid_sync_received = true;
    }
}
