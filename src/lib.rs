//! A pure Rust IEEE 802.1AS (gPTP) time synchronization engine supporting `std` and `no_std`
//! environments.
//!
//! Timecrab implements the core of a gPTP endpoint or bridge: the peer delay, Sync and signaling
//! state machines, the PTP frame codec over raw Ethernet II (optionally 802.1Q tagged), and the
//! PI clock servo that slews a hardware clock towards Grand Master time with sub-microsecond
//! accuracy. Port roles are statically configured; there is no Best Master Clock election and no
//! UDP transport.
//!
//! The engine is single threaded and cooperative. Everything happens inside three
//! run-to-completion entry points, driven by the integration:
//!
//! - [`Engine::tick`] at a nominal 1 ms cadence,
//! - [`Engine::msg_receive`] for every received PTP frame with its hardware ingress timestamp,
//! - [`Engine::timestamp_event`] (or [`Engine::update_timestamp_entry`]) for every captured
//!   egress timestamp.
//!
//! The timestamping MAC, the NVM store for learned link properties and the application
//! notification hooks are reached through one [`Hardware`] trait the engine is generic over.
//!
//! # Example
//!
//! ```no_run
//! # fn demo<Hw: timecrab::Hardware>(hw: Hw, config: timecrab::Config) -> Result<(), timecrab::Error> {
//! let mut engine = timecrab::Engine::new(hw, config)?;
//!
//! loop {
//!     // Called from a 1 ms periodic task
//!     engine.tick();
//! #   break;
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub(crate) mod fmt;

pub mod config;
mod domain;
mod engine;
pub mod error;
pub mod error_log;
pub mod ethernet;
pub mod frame;
mod frame_id;
pub mod hardware;
mod pdelay;
mod pi;
mod port;
mod signaling;
#[cfg(feature = "counters")]
mod stats;
mod sync;
pub mod time;
mod timer;
mod tx_map;

pub use config::Config;
pub use engine::Engine;
pub use error::Error;
pub use error_log::{ERROR_LOG_LEN, ErrorLog, ErrorLogEntry};
pub use ethernet::{ETHERTYPE_PTP, EthernetAddress, EthernetFrame};
pub use hardware::{
    ClockStep, ClockUpdate, Hardware, NvmKind, NvmWriteState, RxFrame, SyncLockState, TimeBase,
};
pub use port::{Port, ProductDetails};
#[cfg(feature = "counters")]
pub use stats::Counter;
pub use time::{PseudoRateRatio, Timestamp, TimestampSigned};
pub use tx_map::TxMapStatus;
