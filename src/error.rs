//! Timecrab error types.
//!
//! Every fallible operation in the crate returns one of the categorized kinds below. Runtime
//! anomalies (wire garbage, missing timestamps, watchdog expiry) are additionally recorded in the
//! [`ErrorLog`](crate::error_log::ErrorLog) ring so an application can inspect them after the
//! fact; the state machines themselves never unwind.

/// A timecrab error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Error {
    /// The engine has not been initialized yet.
    NotInitialized,
    /// Configuration validation failed during engine initialization.
    Init(InitError),
    /// A timestamp could not take part in an arithmetic operation.
    ///
    /// Either the nanoseconds part is out of its `[0, 10⁹)` range, or an unsigned subtraction
    /// would underflow.
    InvalidTimestamp,
    /// Division by zero was prevented in a rate-ratio or controller computation.
    DivisionByZero,
    /// An egress timestamp could not be matched to a transmitted frame.
    Timestamp(TimestampError),
    /// A received PTP frame was rejected.
    Frame(FrameError),
    /// Non-volatile memory access failed.
    Nvm(NvmError),
    /// Peer delay measurement failed.
    Pdelay(PdelayError),
    /// The PI controller is missing or has a bad configuration.
    PiConfiguration,
    /// Time synchronization failed.
    Sync(SyncError),
    /// A protocol-level time limit was exceeded.
    Limit(LimitError),
    /// A call into the hardware environment failed.
    Hardware(HardwareError),
    /// An API call used an unknown identifier.
    Api(ApiError),
    /// The Grand Master of a domain stopped advancing its clock while the upstream bridge keeps
    /// forwarding Syncs.
    GmFailure,
    /// The error log was read with an out-of-range index.
    ErrorLogIndex,
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NotInitialized => f.write_str("engine not initialized"),
            Error::Init(e) => write!(f, "init: {}", e),
            Error::InvalidTimestamp => f.write_str("timestamp is not usable for arithmetic"),
            Error::DivisionByZero => f.write_str("division by zero prevented"),
            Error::Timestamp(e) => write!(f, "timestamp routing: {}", e),
            Error::Frame(e) => write!(f, "frame: {}", e),
            Error::Nvm(e) => write!(f, "nvm: {}", e),
            Error::Pdelay(e) => write!(f, "pdelay: {}", e),
            Error::PiConfiguration => f.write_str("missing or bad PI controller configuration"),
            Error::Sync(e) => write!(f, "sync: {}", e),
            Error::Limit(e) => write!(f, "limit: {}", e),
            Error::Hardware(e) => write!(f, "hardware: {}", e),
            Error::Api(e) => write!(f, "api: {}", e),
            Error::GmFailure => f.write_str("domain Grand Master failure"),
            Error::ErrorLogIndex => f.write_str("error log read index out of range"),
        }
    }
}

/// Configuration validation error raised during engine initialization.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum InitError {
    /// The configuration holds no ports.
    NoPorts,
    /// The configuration holds no domains.
    NoDomains,
    /// More ports, domains or sync machines were configured than the compiled-in capacity.
    Capacity,
    /// A domain configures more than one slave sync machine.
    TooManySlaves,
    /// A non-Grand-Master domain has no slave sync machine.
    NoSlaveOnBridgeDomain,
    /// A Grand Master domain configures a slave sync machine.
    SlaveOnGmDomain,
    /// The slave sync machine sits on a port without an enabled Pdelay initiator.
    NoPdelayInitiatorForSlave,
    /// The bridge start-up timeout exceeds the allowed maximum.
    StartupTimeoutTooLong,
    /// A Pdelay interval is outside `[LOG_PDELAY_INTERVAL_MIN, LOG_PDELAY_INTERVAL_MAX]`.
    PdelayIntervalOutOfRange,
    /// A Sync interval is outside `[LOG_SYNC_INTERVAL_MIN, LOG_SYNC_INTERVAL_MAX]`.
    SyncIntervalOutOfRange,
    /// A synchronized Grand Master was configured on a non-Grand-Master domain.
    SyncedGmOnBridgeDomain,
    /// The same domain number is used by two configured domains.
    DomainNumberUsedTwice,
    /// The reference domain of a synchronized Grand Master is not configured.
    ReferenceDomainNotConfigured,
    /// A sync machine refers to a port index that is not configured.
    UnknownPort,
    /// The source MAC address of a port could not be obtained.
    NoSourceMac,
    /// The link state of a port could not be obtained.
    NoLinkStatus,
}

impl core::fmt::Display for InitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            InitError::NoPorts => f.write_str("no ports configured"),
            InitError::NoDomains => f.write_str("no domains configured"),
            InitError::Capacity => f.write_str("configuration exceeds compiled-in capacity"),
            InitError::TooManySlaves => f.write_str("more than one slave machine on a domain"),
            InitError::NoSlaveOnBridgeDomain => {
                f.write_str("non-GM domain is missing a slave machine")
            }
            InitError::SlaveOnGmDomain => f.write_str("slave machine configured on a GM domain"),
            InitError::NoPdelayInitiatorForSlave => {
                f.write_str("slave machine port has no Pdelay initiator")
            }
            InitError::StartupTimeoutTooLong => f.write_str("start-up timeout too long"),
            InitError::PdelayIntervalOutOfRange => f.write_str("Pdelay interval out of range"),
            InitError::SyncIntervalOutOfRange => f.write_str("Sync interval out of range"),
            InitError::SyncedGmOnBridgeDomain => {
                f.write_str("synchronized GM configured on a non-GM domain")
            }
            InitError::DomainNumberUsedTwice => f.write_str("domain number used twice"),
            InitError::ReferenceDomainNotConfigured => {
                f.write_str("synced-GM reference domain not configured")
            }
            InitError::UnknownPort => f.write_str("sync machine refers to an unknown port"),
            InitError::NoSourceMac => f.write_str("source MAC address not available"),
            InitError::NoLinkStatus => f.write_str("link status not available"),
        }
    }
}

/// An egress timestamp arrived but could not be routed to a state machine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TimestampError {
    /// No timestamp has been registered for the message that needs one.
    NotRegistered,
    /// A timestamp arrived that no state machine is waiting for.
    NotIdentified,
    /// The domain index recorded for the frame is out of range.
    DomainIndex,
    /// The sync machine index recorded for the frame is out of range.
    MachineIndex,
    /// The Pdelay machine index recorded for the frame is out of range.
    PdelayMachineIndex,
    /// The frame id does not point to an outstanding frame.
    InvalidFrameId(u8),
}

impl core::fmt::Display for TimestampError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TimestampError::NotRegistered => f.write_str("timestamp not registered"),
            TimestampError::NotIdentified => f.write_str("unexpected timestamp"),
            TimestampError::DomainIndex => f.write_str("bad domain index"),
            TimestampError::MachineIndex => f.write_str("bad sync machine index"),
            TimestampError::PdelayMachineIndex => f.write_str("bad Pdelay machine index"),
            TimestampError::InvalidFrameId(id) => write!(f, "invalid frame id {}", id),
        }
    }
}

/// A received frame was rejected by the codec or the dispatcher.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FrameError {
    /// A Pdelay response was received twice for the same sequence id.
    DoubleResponse,
    /// The message type nibble does not name a known PTP message.
    UnknownMessageType(u8),
    /// The identifiers carried in the message do not match the transmitted request.
    IdentifierMismatch,
    /// The transportSpecific nibble is not 1 and SdoId compatibility mode is off.
    TransportSpecific,
    /// A Sync message was received on a master sync machine.
    SyncOnMaster,
    /// A Follow_Up message was received on a master sync machine.
    FollowUpOnMaster,
    /// A Sync message was received on a Grand Master domain.
    SyncOnGmDomain,
    /// A Follow_Up message was received on a Grand Master domain.
    FollowUpOnGmDomain,
    /// The wire domain number does not name a configured domain.
    UnknownDomain,
    /// No sync machine is bound to the ingress port inside the addressed domain.
    UnknownMachine,
    /// No Pdelay machine exists for the ingress port.
    UnknownPdelayMachine,
    /// The frame is too short to carry the message it announces.
    Truncated,
    /// A timestamp field carries an out-of-range nanoseconds part.
    BadTimestamp,
    /// The EtherType of the received frame is not the PTP EtherType.
    NoPtpEthertype,
    /// A VLAN tag was expected but the frame carries none.
    NoVlanTag,
}

impl core::fmt::Display for FrameError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FrameError::DoubleResponse => f.write_str("double Pdelay response"),
            FrameError::UnknownMessageType(ty) => write!(f, "unknown message type {:#04x}", ty),
            FrameError::IdentifierMismatch => f.write_str("identifier mismatch"),
            FrameError::TransportSpecific => f.write_str("transportSpecific is not 1"),
            FrameError::SyncOnMaster => f.write_str("Sync received on master machine"),
            FrameError::FollowUpOnMaster => f.write_str("Follow_Up received on master machine"),
            FrameError::SyncOnGmDomain => f.write_str("Sync received on GM domain"),
            FrameError::FollowUpOnGmDomain => f.write_str("Follow_Up received on GM domain"),
            FrameError::UnknownDomain => f.write_str("unknown domain number"),
            FrameError::UnknownMachine => f.write_str("no sync machine for ingress port"),
            FrameError::UnknownPdelayMachine => f.write_str("no Pdelay machine for ingress port"),
            FrameError::Truncated => f.write_str("frame too short"),
            FrameError::BadTimestamp => f.write_str("timestamp field out of range"),
            FrameError::NoPtpEthertype => f.write_str("EtherType is not PTP"),
            FrameError::NoVlanTag => f.write_str("VLAN tag expected but missing"),
        }
    }
}

/// Non-volatile memory access error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum NvmError {
    /// A stored value could not be read.
    Read,
    /// A value could not be written.
    Write,
}

impl core::fmt::Display for NvmError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NvmError::Read => f.write_str("read failed"),
            NvmError::Write => f.write_str("write failed"),
        }
    }
}

/// Peer delay measurement error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PdelayError {
    /// More consecutive Pdelay responses were lost than the configured allowance.
    TooManyLostResponses,
}

impl core::fmt::Display for PdelayError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PdelayError::TooManyLostResponses => f.write_str("too many lost responses"),
        }
    }
}

/// Time synchronization error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SyncError {
    /// The slave lost its upstream Grand Master.
    LossOfSync,
    /// A state machine was driven from an illegal state.
    MachineState,
    /// The egress timestamp needed for a Follow_Up is missing or wrong.
    IncorrectTimestamp,
    /// No Sync arrived within the configured receipt timeout.
    ReceiptTimeout,
}

impl core::fmt::Display for SyncError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SyncError::LossOfSync => f.write_str("loss of sync"),
            SyncError::MachineState => f.write_str("illegal state machine state"),
            SyncError::IncorrectTimestamp => f.write_str("incorrect Follow_Up timestamp"),
            SyncError::ReceiptTimeout => f.write_str("sync receipt timeout"),
        }
    }
}

/// A protocol time limit was exceeded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum LimitError {
    /// The bridge residence time exceeded its ceiling.
    ResidenceTooLong,
    /// The peer answered a Pdelay request too late.
    TurnaroundInitiatorTooLong,
    /// This node answered a Pdelay request too late.
    TurnaroundResponderTooLong,
}

impl core::fmt::Display for LimitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LimitError::ResidenceTooLong => f.write_str("residence time too long"),
            LimitError::TurnaroundInitiatorTooLong => {
                f.write_str("initiator turnaround too long (peer responds late)")
            }
            LimitError::TurnaroundResponderTooLong => {
                f.write_str("responder turnaround too long (local response late)")
            }
        }
    }
}

/// A call into the [`Hardware`](crate::Hardware) environment failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum HardwareError {
    /// The current time could not be read.
    TimeRead,
    /// A frame could not be transmitted.
    Send,
    /// The local clock could not be adjusted.
    ClockUpdate,
}

impl core::fmt::Display for HardwareError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HardwareError::TimeRead => f.write_str("time read failed"),
            HardwareError::Send => f.write_str("frame send failed"),
            HardwareError::ClockUpdate => f.write_str("clock update failed"),
        }
    }
}

/// An API call used an identifier that names nothing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ApiError {
    /// Unknown domain number.
    UnknownDomain,
    /// Illegal sync machine index.
    IllegalMachine,
    /// Illegal port number.
    IllegalPort,
    /// Illegal counter id.
    IllegalCounter,
    /// The requested value has not been computed yet.
    NotAvailable,
}

impl core::fmt::Display for ApiError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ApiError::UnknownDomain => f.write_str("unknown domain"),
            ApiError::IllegalMachine => f.write_str("illegal machine id"),
            ApiError::IllegalPort => f.write_str("illegal port number"),
            ApiError::IllegalCounter => f.write_str("illegal counter id"),
            ApiError::NotAvailable => f.write_str("value not available yet"),
        }
    }
}

impl From<InitError> for Error {
    fn from(e: InitError) -> Self {
        Self::Init(e)
    }
}

impl From<TimestampError> for Error {
    fn from(e: TimestampError) -> Self {
        Self::Timestamp(e)
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

impl From<NvmError> for Error {
    fn from(e: NvmError) -> Self {
        Self::Nvm(e)
    }
}

impl From<PdelayError> for Error {
    fn from(e: PdelayError) -> Self {
        Self::Pdelay(e)
    }
}

impl From<SyncError> for Error {
    fn from(e: SyncError) -> Self {
        Self::Sync(e)
    }
}

impl From<LimitError> for Error {
    fn from(e: LimitError) -> Self {
        Self::Limit(e)
    }
}

impl From<HardwareError> for Error {
    fn from(e: HardwareError) -> Self {
        Self::Hardware(e)
    }
}

impl From<ApiError> for Error {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}
