//! The capability boundary between the protocol engine and the timestamping Ethernet hardware.
//!
//! The engine is generic over one [`Hardware`] implementation that bundles frame transmission,
//! hardware clock access, link state, NVM persistence and the user notification hooks. All calls
//! must be non-blocking; the engine runs to completion inside each of its three entry points.

use crate::{
    error::Error,
    ethernet::{ETHERTYPE_PTP, EthernetAddress, EthernetFrame},
    time::{PseudoRateRatio, Timestamp, TimestampSigned},
};

/// Which hardware timebase to read.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TimeBase {
    /// The free-running timestamping clock.
    FreeRunning,
    /// The clock corrected towards Grand Master time.
    Corrected,
}

/// Kind of per-port value persisted in non-volatile memory.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum NvmKind {
    /// Learned neighbor propagation delay in nanoseconds.
    PropDelay,
    /// Learned neighbor rate ratio.
    RateRatio,
}

/// State of one asynchronous NVM write, advanced by the environment's write implementation.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum NvmWriteState {
    /// No write in flight.
    #[default]
    Stop,
    /// A write has been requested and not yet completed.
    Init,
    /// The environment finished the write; the engine returns the state to `Stop`.
    Finish,
}

/// Hysteretic synchronization state reported through [`Hardware::sync_state_changed`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SyncLockState {
    /// Offset left the configured band for the configured count of syncs.
    Unlocked,
    /// Offset stayed inside the configured band for the configured count of syncs.
    Locked,
}

/// An absolute phase step handed to [`Hardware::set_correction`].
///
/// `offset` is a magnitude; `negative` is true when the local clock is ahead of the Grand Master
/// and must step backwards.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ClockStep {
    /// Step magnitude.
    pub offset: TimestampSigned,
    /// Direction: `true` steps the clock backwards.
    pub negative: bool,
}

impl ClockStep {
    /// No phase step; frequency-only adjustment.
    pub const NONE: ClockStep = ClockStep {
        offset: TimestampSigned::ZERO,
        negative: false,
    };
}

/// A proposed clock update offered to [`Hardware::select_domain`].
///
/// The callback may rewrite any field before accepting.
#[derive(Debug, Copy, Clone)]
pub struct ClockUpdate {
    /// Rate ratio of the Grand Master clock to the local clock.
    pub rate_ratio: f64,
    /// Offset magnitude between local time and GM time.
    pub offset: TimestampSigned,
    /// `true` when the local clock is ahead of the GM.
    pub negative: bool,
    /// Sync interval of the updating domain in log₂ form.
    pub sync_interval_log: i8,
}

/// A received PTP frame handed into [`Engine::msg_receive`](crate::Engine::msg_receive).
#[derive(Debug, Copy, Clone)]
pub struct RxFrame<'a> {
    /// Ingress port.
    pub port: u8,
    /// Hardware ingress timestamp.
    pub ingress: Timestamp,
    /// EtherType of the PTP payload (after any VLAN tag).
    pub ethertype: u16,
    /// Source MAC of the frame.
    pub source_mac: EthernetAddress,
    /// VLAN TCI the frame carried, if it was 802.1Q tagged.
    pub vlan_tci: Option<u16>,
    /// The PTP message, starting at the common header.
    pub payload: &'a [u8],
}

impl<'a> RxFrame<'a> {
    /// Build an [`RxFrame`] from a complete Ethernet II frame, looking through an 802.1Q tag.
    pub fn parse(port: u8, ingress: Timestamp, frame: &'a [u8]) -> Result<Self, Error> {
        let frame = EthernetFrame::new_checked(frame)?;

        Ok(Self {
            port,
            ingress,
            ethertype: frame.payload_ethertype(),
            source_mac: frame.src_addr(),
            vlan_tci: frame.vlan_tci(),
            payload: frame.payload(),
        })
    }

    /// Whether the payload claims to be PTP.
    pub fn is_ptp(&self) -> bool {
        self.ethertype == ETHERTYPE_PTP
    }
}

/// The environment the engine runs against: a timestamping Ethernet MAC (or switch), an NVM store
/// and the application notification hooks.
///
/// Implementations must not block and must not re-enter the engine.
pub trait Hardware {
    /// Queue a fully built frame for transmission on `port` and return the hardware TX buffer
    /// index it occupies.
    ///
    /// When `timestamp_requested` is true the environment must later deliver the captured egress
    /// timestamp through [`Engine::timestamp_event`](crate::Engine::timestamp_event) (passing
    /// `frame_id`) or [`Engine::update_timestamp_entry`](crate::Engine::update_timestamp_entry)
    /// (passing the returned buffer index).
    fn transmit(
        &mut self,
        port: u8,
        priority: u8,
        frame: &[u8],
        frame_id: u8,
        timestamp_requested: bool,
    ) -> Result<u32, Error>;

    /// Read the current time of the given timebase.
    fn current_time(&mut self, base: TimeBase) -> Result<Timestamp, Error>;

    /// Read the free-running and corrected clocks as one coherent pair.
    ///
    /// The default implementation reads them back to back; hardware that can latch both at once
    /// should override this.
    fn current_time_pair(&mut self) -> Result<(Timestamp, Timestamp), Error> {
        Ok((
            self.current_time(TimeBase::FreeRunning)?,
            self.current_time(TimeBase::Corrected)?,
        ))
    }

    /// Apply a phase step and/or a frequency correction to the corrected clock.
    fn set_correction(&mut self, step: ClockStep, rate: PseudoRateRatio) -> Result<(), Error>;

    /// Current link state of `port`.
    fn link_state(&mut self, port: u8) -> Result<bool, Error>;

    /// MAC address of `port`.
    fn phys_addr(&mut self, port: u8) -> Result<EthernetAddress, Error>;

    /// Register the PTP peer multicast address with the MAC/switch filters.
    fn join_multicast(&mut self, _addr: EthernetAddress) -> Result<(), Error> {
        Ok(())
    }

    /// Read a persisted per-machine value from its configured record address.
    fn nvm_read(&mut self, machine: u8, kind: NvmKind, address: u32) -> Result<f64, Error>;

    /// Start or continue an asynchronous write of a per-machine value at its configured record
    /// address.
    ///
    /// The implementation owns the protocol on `state`: the engine sets `Init` to request a
    /// write, the implementation moves it to `Finish` once the data is committed.
    fn nvm_write(
        &mut self,
        machine: u8,
        kind: NvmKind,
        address: u32,
        value: f64,
        state: &mut NvmWriteState,
    ) -> Result<(), Error>;

    /// Decide whether an update computed by `domain_number` is applied to the local clock.
    ///
    /// The default accepts domain number 0 only, matching single-domain operation.
    fn select_domain(&mut self, domain_number: u8, _update: &mut ClockUpdate) -> bool {
        domain_number == 0
    }

    /// Sync lock hysteresis notification.
    fn sync_state_changed(&mut self, _state: SyncLockState) {}

    /// A new entry was pushed into the error log.
    fn error_logged(&mut self) {}
}
