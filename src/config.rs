//! Engine configuration.
//!
//! Everything here is plain data validated once at engine construction. Ports, domains and sync
//! machines refer to each other by index; the configuration is fixed for the lifetime of the
//! engine, so the indices stay stable.

use heapless::Vec;

/// Maximum number of gPTP ports (and therefore Pdelay machines).
pub const MAX_PORTS: usize = 8;

/// Maximum number of synchronization domains.
pub const MAX_DOMAINS: usize = 4;

/// Maximum number of sync machines per domain. One per port.
pub const MAX_SYNC_MACHINES: usize = MAX_PORTS;

/// Lower bound of the log₂ Pdelay interval (31.25 ms).
pub const LOG_PDELAY_INTERVAL_MIN: i8 = -5;

/// Upper bound of the log₂ Pdelay interval (8 s).
pub const LOG_PDELAY_INTERVAL_MAX: i8 = 3;

/// Lower bound of the log₂ Sync interval (31.25 ms).
pub const LOG_SYNC_INTERVAL_MIN: i8 = -5;

/// Upper bound of the log₂ Sync interval (1 s).
pub const LOG_SYNC_INTERVAL_MAX: i8 = 0;

/// Longest allowed bridge start-up timeout in seconds.
pub const STARTUP_TIMEOUT_MAX_S: u8 = 20;

/// Signaling interval value meaning "stop sending".
pub const INTERVAL_STOP_SENDING: i8 = 127;

/// Signaling interval value meaning "revert to the initial interval".
pub const INTERVAL_SET_TO_INITIAL: i8 = 126;

/// Signaling interval value meaning "leave the interval unchanged".
pub const INTERVAL_UNCHANGED: i8 = -128;

/// Role of a sync machine inside its domain.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SyncRole {
    /// Emits Sync/Follow_Up downstream.
    Master,
    /// Receives Sync/Follow_Up from the upstream GM.
    Slave,
}

/// Per-port configuration. One Pdelay machine operates per port, so the peer delay options live
/// here too.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PortConfig {
    /// 64 bit clock identity of this port.
    pub clock_id: u64,
    /// Whether this port actively initiates Pdelay measurements.
    pub pdelay_initiator_enabled: bool,
    /// Respond to a Pdelay request with the requester's unicast MAC as the response's
    /// *destination* address instead of the PTP multicast address.
    ///
    /// This is a known deviation some peers require; it affects only where Pdelay_Resp and
    /// Pdelay_Resp_Follow_Up frames are addressed.
    pub pdelay_unicast_resp: bool,
    /// Initial Pdelay interval in log₂ form, e.g. `-2` for 250 ms.
    pub pdelay_interval_log_init: i8,
    /// Operational Pdelay interval in log₂ form, switched to after
    /// [`measurements_till_slow_down`](Self::measurements_till_slow_down) accepted measurements.
    pub pdelay_interval_log_oper: i8,
    /// Neighbor propagation delay acceptance threshold in nanoseconds.
    pub neighbor_prop_delay_thresh_ns: u64,
    /// Count of accepted measurements before the interval slows to operational.
    pub measurements_till_slow_down: u16,
    /// Count of consecutive lost Pdelay responses tolerated before the machine resets its
    /// averagers.
    pub allowed_lost_responses: u16,
    /// NVM record address for the stored propagation delay.
    pub nvm_address_pdelay: u32,
    /// NVM record address for the stored neighbor rate ratio.
    pub nvm_address_rratio: u32,
    /// Link delay asymmetry in nanoseconds, signed.
    pub delay_asymmetry_ns: i16,
}

/// Configuration of one sync machine.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SyncMachineConfig {
    /// Port index the machine operates on.
    pub port: u8,
    /// Master or slave role, fixed for the lifetime of the engine.
    pub role: SyncRole,
    /// Sync interval in log₂ form, e.g. `-3` for 125 ms.
    pub sync_interval_log: i8,
}

/// Per-domain configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DomainConfig {
    /// Domain number as carried on the wire.
    pub domain_number: u8,
    /// Whether this node is the Grand Master for the domain.
    pub is_gm: bool,
    /// A Grand Master that transmits corrected time instead of free-running time.
    pub synced_gm: bool,
    /// Domain *number* the synced GM takes its rate ratio from. Referencing itself yields a rate
    /// ratio of 1.0.
    pub reference_domain: u8,
    /// Startup timeout in seconds after which a bridge with no upstream Syncs starts acting as
    /// Grand Master. At most [`STARTUP_TIMEOUT_MAX_S`].
    pub startup_timeout_s: u8,
    /// Count of missed Syncs after which the receipt timeout error is raised.
    pub sync_receipt_timeout_cnt: u8,
    /// Outlier rejection threshold in nanoseconds.
    pub sync_outlier_threshold_ns: u32,
    /// Count of consecutive outliers dropped before a value is accepted regardless.
    pub outlier_ignore_cnt: u8,
    /// VLAN TCI emitted on this domain's frames when VLAN operation is enabled.
    pub vlan_tci: u16,
    /// The domain's sync machines.
    pub sync_machines: Vec<SyncMachineConfig, MAX_SYNC_MACHINES>,
}

/// PI controller configuration.
#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PiConfig {
    /// Dimensionless damping ratio of the control loop.
    pub damping_ratio: f64,
    /// Ratio between the loop's natural frequency and the sampling frequency. Must be nonzero.
    pub nat_freq_ratio: f64,
    /// Clamp for the integral term in PPB. Zero disables anti-windup.
    pub integral_windup_limit: u32,
}

/// Synchronization lock hysteresis parameters.
#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SyncLockConfig {
    /// Offset magnitude below which a sync counts towards LOCKED, in nanoseconds.
    pub syn_trig_offset_ns: i64,
    /// Offset magnitude above which a sync counts towards UNLOCKED, in nanoseconds.
    pub uns_trig_offset_ns: i64,
    /// Consecutive in-band syncs required to report LOCKED.
    pub syn_trig_cnt: u16,
    /// Consecutive out-of-band syncs required to report UNLOCKED.
    pub uns_trig_cnt: u16,
}

/// Product identity strings reported by the stack.
#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProductConfig {
    /// Three octet manufacturer identity.
    pub manufacturer_id: [u8; 3],
    /// `HW;FW;SW` revision string.
    pub product_revision: &'static str,
    /// `Manufacturer;Model;` description prefix. The unique identifier (primary port MAC) is
    /// appended at init.
    pub product_description: &'static str,
}

/// Complete engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Egress priority of all transmitted PTP frames.
    pub eth_frame_prio: u8,
    /// Whether frames are 802.1Q tagged.
    pub vlan_enabled: bool,
    /// Device level VLAN TCI (Pdelay frames; domains carry their own).
    pub vlan_tci: u16,
    /// Accept non-1 transportSpecific on Pdelay messages and echo the received majorSdoId in
    /// responses.
    pub sdo_id_compatibility_mode: bool,
    /// Whether the Sync interval signaling mechanism runs.
    pub signaling_enabled: bool,
    /// Port table; the index is the port number used everywhere else.
    pub ports: Vec<PortConfig, MAX_PORTS>,
    /// Domain table in configuration order.
    pub domains: Vec<DomainConfig, MAX_DOMAINS>,
    /// Exponential averaging weight for the propagation delay, `[0, 1)`; weight of the previous
    /// filtered value.
    pub pdelay_avg_weight: f64,
    /// Exponential averaging weight for the neighbor rate ratio, `[0, 1)`.
    pub rratio_avg_weight: f64,
    /// Largest tolerated `|rate ratio − 1.0|`.
    pub rratio_max_dev: f64,
    /// NVM rewrite threshold for the propagation delay in nanoseconds.
    pub pdelay_nvm_write_threshold: f64,
    /// NVM rewrite threshold for the rate ratio.
    pub rratio_nvm_write_threshold: f64,
    /// PI controller tuning.
    pub pi: PiConfig,
    /// Offset magnitude in nanoseconds above which a one-shot absolute step replaces PI control.
    pub pi_max_threshold_ns: u64,
    /// Sync lock hysteresis parameters.
    pub sync_lock: SyncLockConfig,
    /// Product identity.
    pub product: ProductConfig,
}

impl DomainConfig {
    /// Index of the configured slave machine, if any.
    pub(crate) fn slave_machine(&self) -> Option<usize> {
        self.sync_machines
            .iter()
            .position(|m| m.role == SyncRole::Slave)
    }
}
