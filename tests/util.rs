//! Utilities to drive the engine against scripted hardware as part of regression/integration
//! tests.

// Each test binary uses a different slice of this module
#![allow(dead_code)]

use std::collections::HashMap;

use timecrab::{
    ClockStep, ClockUpdate, Config, EthernetAddress, Error, Hardware, NvmKind, NvmWriteState,
    PseudoRateRatio, SyncLockState, TimeBase, Timestamp,
    config::{
        DomainConfig, PiConfig, PortConfig, ProductConfig, SyncLockConfig, SyncMachineConfig,
        SyncRole,
    },
    error::HardwareError,
};

/// A frame captured by the mock driver.
#[derive(Debug, Clone)]
pub struct TxRecord {
    pub port: u8,
    pub frame_id: u8,
    pub timestamp_requested: bool,
    pub bytes: Vec<u8>,
}

/// Scripted hardware: clocks advance only when the test says so, frames land in a log, NVM is a
/// map.
#[derive(Debug, Default)]
pub struct MockHardware {
    pub now_free: Timestamp,
    pub now_corrected: Timestamp,
    pub transmitted: Vec<TxRecord>,
    pub corrections: Vec<(ClockStep, PseudoRateRatio)>,
    pub sync_states: Vec<SyncLockState>,
    pub nvm: HashMap<(u8, NvmKindKey), f64>,
    pub link: Vec<bool>,
    pub error_notifications: usize,
    next_buffer_index: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NvmKindKey {
    PropDelay,
    RateRatio,
}

impl From<NvmKind> for NvmKindKey {
    fn from(kind: NvmKind) -> Self {
        match kind {
            NvmKind::PropDelay => Self::PropDelay,
            NvmKind::RateRatio => Self::RateRatio,
        }
    }
}

impl MockHardware {
    pub fn new(ports: usize, start: Timestamp) -> Self {
        Self {
            now_free: start,
            now_corrected: start,
            link: vec![true; ports],
            ..Default::default()
        }
    }

    /// Advance both clocks by `ns`.
    pub fn advance(&mut self, ns: u64) {
        self.now_free = self.now_free.add_ns(ns);
        self.now_corrected = self.now_corrected.add_ns(ns);
    }

    /// Drain transmit records captured since the last call.
    pub fn take_transmitted(&mut self) -> Vec<TxRecord> {
        std::mem::take(&mut self.transmitted)
    }
}

impl Hardware for MockHardware {
    fn transmit(
        &mut self,
        port: u8,
        _priority: u8,
        frame: &[u8],
        frame_id: u8,
        timestamp_requested: bool,
    ) -> Result<u32, Error> {
        let buffer_index = self.next_buffer_index;

        self.next_buffer_index += 1;

        self.transmitted.push(TxRecord {
            port,
            frame_id,
            timestamp_requested,
            bytes: frame.to_vec(),
        });

        Ok(buffer_index)
    }

    fn current_time(&mut self, base: TimeBase) -> Result<Timestamp, Error> {
        Ok(match base {
            TimeBase::FreeRunning => self.now_free,
            TimeBase::Corrected => self.now_corrected,
        })
    }

    fn set_correction(&mut self, step: ClockStep, rate: PseudoRateRatio) -> Result<(), Error> {
        self.corrections.push((step, rate));

        Ok(())
    }

    fn link_state(&mut self, port: u8) -> Result<bool, Error> {
        self.link
            .get(port as usize)
            .copied()
            .ok_or(Error::Hardware(HardwareError::TimeRead))
    }

    fn phys_addr(&mut self, port: u8) -> Result<EthernetAddress, Error> {
        Ok(EthernetAddress([0x02, 0x00, 0x00, 0x00, 0x00, port + 1]))
    }

    fn nvm_read(&mut self, machine: u8, kind: NvmKind, _address: u32) -> Result<f64, Error> {
        Ok(*self.nvm.get(&(machine, kind.into())).unwrap_or(match kind {
            NvmKind::PropDelay => &0.0,
            NvmKind::RateRatio => &1.0,
        }))
    }

    fn nvm_write(
        &mut self,
        machine: u8,
        kind: NvmKind,
        _address: u32,
        value: f64,
        state: &mut NvmWriteState,
    ) -> Result<(), Error> {
        self.nvm.insert((machine, kind.into()), value);

        *state = NvmWriteState::Finish;

        Ok(())
    }

    fn select_domain(&mut self, domain_number: u8, _update: &mut ClockUpdate) -> bool {
        domain_number == 0
    }

    fn sync_state_changed(&mut self, state: SyncLockState) {
        self.sync_states.push(state);
    }

    fn error_logged(&mut self) {
        self.error_notifications += 1;
    }
}

pub const PEER_MAC: EthernetAddress = EthernetAddress([0x02, 0x99, 0x99, 0x99, 0x99, 0x01]);
pub const PEER_CLOCK_ID: u64 = 0x9999_0000_0000_0001;
pub const LOCAL_CLOCK_ID: u64 = 0x0002_0000_0000_0001;

pub fn port_config() -> PortConfig {
    PortConfig {
        clock_id: LOCAL_CLOCK_ID,
        pdelay_initiator_enabled: true,
        pdelay_unicast_resp: false,
        pdelay_interval_log_init: -3,
        pdelay_interval_log_oper: -1,
        neighbor_prop_delay_thresh_ns: 10_000,
        measurements_till_slow_down: 3,
        allowed_lost_responses: 3,
        nvm_address_pdelay: 0x100,
        nvm_address_rratio: 0x108,
        delay_asymmetry_ns: 0,
    }
}

pub fn base_config() -> Config {
    Config {
        eth_frame_prio: 4,
        vlan_enabled: false,
        vlan_tci: 0,
        sdo_id_compatibility_mode: false,
        signaling_enabled: true,
        ports: heapless::Vec::new(),
        domains: heapless::Vec::new(),
        pdelay_avg_weight: 0.5,
        rratio_avg_weight: 0.5,
        rratio_max_dev: 0.001,
        pdelay_nvm_write_threshold: 10.0,
        rratio_nvm_write_threshold: 0.0001,
        pi: PiConfig {
            damping_ratio: 1.0,
            nat_freq_ratio: 30.0,
            integral_windup_limit: 100_000,
        },
        pi_max_threshold_ns: 5_000,
        sync_lock: SyncLockConfig {
            syn_trig_offset_ns: 1_000,
            uns_trig_offset_ns: 2_000,
            syn_trig_cnt: 3,
            uns_trig_cnt: 3,
        },
        product: ProductConfig {
            manufacturer_id: [0x00, 0x04, 0x9f],
            product_revision: "1;1.0;0.3.0",
            product_description: "Timecrab;TSN Node;",
        },
    }
}

pub fn domain_config(domain_number: u8, is_gm: bool) -> DomainConfig {
    DomainConfig {
        domain_number,
        is_gm,
        synced_gm: false,
        reference_domain: domain_number,
        startup_timeout_s: 20,
        sync_receipt_timeout_cnt: 3,
        sync_outlier_threshold_ns: 1_000_000,
        outlier_ignore_cnt: 2,
        vlan_tci: 0,
        sync_machines: heapless::Vec::new(),
    }
}

pub fn machine(port: u8, role: SyncRole, interval: i8) -> SyncMachineConfig {
    SyncMachineConfig {
        port,
        role,
        sync_interval_log: interval,
    }
}

/// Single port Grand Master endpoint. The Pdelay initiator stays off so the frame log carries
/// nothing but Sync traffic.
pub fn gm_endpoint_config(sync_interval_log: i8) -> Config {
    let mut config = base_config();

    let mut port = port_config();
    port.pdelay_initiator_enabled = false;

    config.ports.push(port).unwrap();

    let mut domain = domain_config(0, true);
    domain
        .sync_machines
        .push(machine(0, SyncRole::Master, sync_interval_log))
        .unwrap();

    config.domains.push(domain).unwrap();
    config
}

/// Single port slave endpoint.
pub fn slave_endpoint_config(sync_interval_log: i8) -> Config {
    let mut config = base_config();

    config.ports.push(port_config()).unwrap();

    let mut domain = domain_config(0, false);
    domain
        .sync_machines
        .push(machine(0, SyncRole::Slave, sync_interval_log))
        .unwrap();

    config.domains.push(domain).unwrap();
    config
}

/// Two port bridge: slave on port 0, master on port 1.
pub fn bridge_config(sync_interval_log: i8) -> Config {
    let mut config = base_config();

    config.ports.push(port_config()).unwrap();
    config.ports.push(port_config()).unwrap();

    let mut domain = domain_config(0, false);
    domain
        .sync_machines
        .push(machine(0, SyncRole::Slave, sync_interval_log))
        .unwrap();
    domain
        .sync_machines
        .push(machine(1, SyncRole::Master, sync_interval_log))
        .unwrap();

    config.domains.push(domain).unwrap();
    config
}

// Hand-built PTP message payloads, independent of the crate's encoder.

#[allow(clippy::too_many_arguments)]
fn header(
    message_type: u8,
    length: u16,
    domain: u8,
    flags: u16,
    correction_subns: u64,
    clock_id: u64,
    port_number: u16,
    sequence_id: u16,
    control: u8,
    log_interval: i8,
) -> Vec<u8> {
    let mut buf = vec![0u8; 34];

    buf[0] = 0x10 | message_type;
    buf[1] = 0x02;
    buf[2..4].copy_from_slice(&length.to_be_bytes());
    buf[4] = domain;
    buf[6..8].copy_from_slice(&flags.to_be_bytes());
    buf[8..16].copy_from_slice(&correction_subns.to_be_bytes());
    buf[20..28].copy_from_slice(&clock_id.to_be_bytes());
    buf[28..30].copy_from_slice(&port_number.to_be_bytes());
    buf[30..32].copy_from_slice(&sequence_id.to_be_bytes());
    buf[32] = control;
    buf[33] = log_interval as u8;

    buf
}

fn push_timestamp(buf: &mut Vec<u8>, ts: Timestamp) {
    buf.extend_from_slice(&ts.seconds.to_be_bytes()[2..8]);
    buf.extend_from_slice(&ts.nanoseconds.to_be_bytes());
}

/// A Sync message from the upstream peer.
pub fn sync_payload(domain: u8, sequence_id: u16, log_interval: i8) -> Vec<u8> {
    let mut buf = header(
        0x0,
        44,
        domain,
        0x0208,
        0,
        PEER_CLOCK_ID,
        1,
        sequence_id,
        0,
        log_interval,
    );

    buf.resize(44, 0);
    buf
}

/// A Follow_Up message from the upstream peer.
pub fn follow_up_payload(
    domain: u8,
    sequence_id: u16,
    log_interval: i8,
    precise_origin: Timestamp,
    correction_subns: u64,
    rate_ratio_wire: i32,
) -> Vec<u8> {
    let mut buf = header(
        0x8,
        76,
        domain,
        0x0008,
        correction_subns,
        PEER_CLOCK_ID,
        1,
        sequence_id,
        2,
        log_interval,
    );

    push_timestamp(&mut buf, precise_origin);

    // Follow_Up information TLV
    buf.extend_from_slice(&0x0003u16.to_be_bytes());
    buf.extend_from_slice(&28u16.to_be_bytes());
    buf.extend_from_slice(&[0x00, 0x80, 0xc2]);
    buf.extend_from_slice(&[0x00, 0x00, 0x01]);
    buf.extend_from_slice(&rate_ratio_wire.to_be_bytes());
    buf.extend_from_slice(&[0u8; 2 + 12 + 4]);

    assert_eq!(buf.len(), 76);
    buf
}

/// A Pdelay_Resp from the peer, answering our request `sequence_id`.
pub fn pdelay_resp_payload(sequence_id: u16, request_receipt: Timestamp) -> Vec<u8> {
    let mut buf = header(0x3, 54, 0, 0x0208, 0, PEER_CLOCK_ID, 1, sequence_id, 5, 127);

    push_timestamp(&mut buf, request_receipt);
    buf.extend_from_slice(&LOCAL_CLOCK_ID.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes());

    assert_eq!(buf.len(), 54);
    buf
}

/// A Pdelay_Resp_Follow_Up from the peer.
pub fn pdelay_resp_fup_payload(sequence_id: u16, response_origin: Timestamp) -> Vec<u8> {
    let mut buf = header(0xa, 54, 0, 0x0008, 0, PEER_CLOCK_ID, 1, sequence_id, 5, 127);

    push_timestamp(&mut buf, response_origin);
    buf.extend_from_slice(&LOCAL_CLOCK_ID.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes());

    assert_eq!(buf.len(), 54);
    buf
}

/// Wrap a payload as an [`timecrab::RxFrame`] arriving on `port` at `ingress`.
pub fn rx(port: u8, ingress: Timestamp, payload: &[u8]) -> timecrab::RxFrame<'_> {
    timecrab::RxFrame {
        port,
        ingress,
        ethertype: timecrab::ETHERTYPE_PTP,
        source_mac: PEER_MAC,
        vlan_tci: None,
        payload,
    }
}
