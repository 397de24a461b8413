//! The engine: configuration validation, the three run-to-completion entry points, the transmit
//! wrapper and the clock servo glue.
//!
//! One [`Engine`] value owns every piece of protocol state and is driven from a single execution
//! context by the periodic tick, frame reception and TX confirmation. There is no interior
//! locking; the cooperative contract is that no entry point re-enters while another runs.

use heapless::Vec;

use crate::{
    config::{
        Config, LOG_PDELAY_INTERVAL_MAX, LOG_PDELAY_INTERVAL_MIN, LOG_SYNC_INTERVAL_MAX,
        LOG_SYNC_INTERVAL_MIN, MAX_DOMAINS, MAX_PORTS, STARTUP_TIMEOUT_MAX_S, SyncLockConfig,
        SyncRole,
    },
    domain::Domain,
    error::{ApiError, Error, FrameError, HardwareError, InitError, SyncError, TimestampError},
    error_log::{ErrorLog, ErrorLogEntry},
    ethernet::EthernetAddress,
    fmt,
    frame::{self, FrameMeta, Message, MessageType, Payload},
    frame_id::{FrameIdEntry, FrameIdTable},
    hardware::{ClockStep, ClockUpdate, Hardware, RxFrame, SyncLockState, TimeBase},
    pdelay::{self, PdelayMachine},
    pi::PiController,
    port::{Port, ProductDetails},
    signaling, sync,
    time::{
        NS_IN_SECOND, PseudoRateRatio, Timestamp, TimestampSigned, f64_abs, f64_to_i32_saturating,
    },
    timer,
    tx_map::TxMapEntry,
};

#[cfg(feature = "counters")]
use crate::stats::{Counter, Stats};

/// First sequence id for Sync messages.
pub(crate) const SYNC_FIRST_SEQUENCE_ID: u16 = 0x0400;

/// First sequence id for Pdelay messages.
pub(crate) const PDELAY_FIRST_SEQUENCE_ID: u16 = 0x0100;

/// Weight of the newest PI output in the running PPB average used to hold the clock through GM
/// outages.
const NEW_PPB_WEIGHT: f64 = 0.1;

/// Smallest frequency-ratio change that counts as a time base change.
const RATIO_EPSILON: f64 = 0.000_000_01;

/// Routing information stamped into the frame id table for every transmitted frame.
#[derive(Debug, Copy, Clone)]
pub(crate) struct TxRoute {
    /// Egress port.
    pub port: u8,
    /// Sync machine index within its domain, or the Pdelay machine index.
    pub machine: u8,
    /// Domain index for Sync-path frames.
    pub domain: Option<u8>,
    /// Acting-GM flag at transmit time.
    pub acting_gm: bool,
}

/// Shared mutable context handed into the state machines: the hardware, the error ring, the frame
/// id table and the device-level codec settings.
pub(crate) struct Ctx<'a, E: Hardware> {
    pub hw: &'a mut E,
    pub errs: &'a mut ErrorLog,
    pub frame_ids: &'a mut FrameIdTable,
    /// Egress priority for every PTP frame.
    pub eth_prio: u8,
    /// Whether frames carry an 802.1Q tag.
    pub vlan_enabled: bool,
    /// Device-level TCI used by Pdelay frames.
    pub device_vlan_tci: u16,
    /// SdoId compatibility mode.
    pub sdo_compatibility: bool,
    #[cfg(feature = "counters")]
    pub stats: &'a mut Stats,
}

impl<E: Hardware> Ctx<'_, E> {
    /// The TCI to put on the wire, gated by the VLAN switch.
    pub(crate) fn vlan(&self, tci: u16) -> Option<u16> {
        self.vlan_enabled.then_some(tci)
    }

    /// Current free-running time in nanoseconds. Failures are logged and read as zero.
    pub(crate) fn now_free_ns(&mut self) -> u64 {
        match self.hw.current_time(TimeBase::FreeRunning) {
            Ok(ts) => ts.as_ns(),
            Err(_) => {
                self.errs
                    .register(Error::Hardware(HardwareError::TimeRead), None, None, None);

                0
            }
        }
    }

    /// The transmit wrapper: allocate a frame id, stamp its routing slot, serialize the frame and
    /// hand it to the driver. Event messages keep their slot until the egress timestamp comes
    /// back; general messages release it immediately.
    pub(crate) fn transmit(
        &mut self,
        meta: &FrameMeta,
        payload: &Payload,
        route: TxRoute,
        buf: &mut [u8],
        map: Option<&mut TxMapEntry>,
    ) -> Result<(), Error> {
        let message_type = payload.message_type();
        let timestamp_requested = message_type.is_event();

        let frame_id = self.frame_ids.allocate(FrameIdEntry {
            message_type,
            sequence_id: meta.sequence_id,
            port: route.port,
            machine: route.machine,
            domain: route.domain.unwrap_or(0xff),
            acting_gm: route.acting_gm,
        });

        let len = match frame::encode(meta, payload, buf) {
            Ok(len) => len,
            Err(e) => {
                self.frame_ids.release(frame_id);
                self.errs
                    .register(e, Some(route.port), route.domain, Some(meta.sequence_id));

                return Err(e);
            }
        };

        match self.hw.transmit(
            route.port,
            self.eth_prio,
            &buf[..len],
            frame_id,
            timestamp_requested,
        ) {
            Ok(buffer_index) => {
                if let Some(map) = map {
                    map.enqueue(frame_id, buffer_index, route.port);
                }

                if !timestamp_requested {
                    self.frame_ids.release(frame_id);
                }

                #[cfg(feature = "counters")]
                self.stats.tx(
                    route.port,
                    route.domain.map(|d| (d, route.machine)),
                    message_type,
                );

                Ok(())
            }
            Err(_) => {
                self.frame_ids.release(frame_id);
                self.errs.register(
                    Error::Hardware(HardwareError::Send),
                    Some(route.port),
                    route.domain,
                    Some(meta.sequence_id),
                );

                Err(Error::Hardware(HardwareError::Send))
            }
        }
    }
}

/// Time base change tracking reported in GM Follow_Up TLVs.
#[derive(Debug, Default, Copy, Clone)]
pub(crate) struct TimeBaseInfo {
    /// Incremented whenever the local time base steps or changes frequency.
    pub indicator: u16,
    /// Phase change magnitude of the last step.
    pub last_phase_change: TimestampSigned,
    /// Direction of the last step.
    pub negative: bool,
    /// Fractional frequency change applied by the last update.
    pub last_freq_change: f64,
    /// Frequency ratio of the previous update, for change detection.
    pub last_ratio: f64,
}

impl TimeBaseInfo {
    fn scaled_phase_change(&self) -> i128 {
        let ns = if self.negative {
            -self.last_phase_change.as_ns()
        } else {
            self.last_phase_change.as_ns()
        };

        // lastGmPhaseChange is a ScaledNs: nanoseconds in 48.16 fixed point
        (ns as i128) << 16
    }

    /// High 32 bits of lastGmPhaseChange.
    pub(crate) fn phase_change_h(&self) -> u32 {
        (self.scaled_phase_change() >> 64) as u32
    }

    /// Low 64 bits of lastGmPhaseChange.
    pub(crate) fn phase_change_l(&self) -> u64 {
        self.scaled_phase_change() as u64
    }

    /// scaledLastGmFreqChange: the fractional frequency change scaled by 2⁴¹.
    pub(crate) fn scaled_freq_change(&self) -> u32 {
        frame::rate_ratio_to_wire(1.0 + self.last_freq_change) as u32
    }
}

/// Device-wide mutable state.
pub(crate) struct DeviceState {
    pub sdo_id_compatibility: bool,
    pub vlan_enabled: bool,
    pub vlan_tci: u16,
    pub eth_frame_prio: u8,
    pub signaling_enabled: bool,
    /// Averaging weights and acceptance windows for the Pdelay machines.
    pub pdelay_avg_weight: f64,
    pub rratio_avg_weight: f64,
    pub rratio_max_dev: f64,
    pub pdelay_nvm_write_threshold: f64,
    pub rratio_nvm_write_threshold: f64,
    /// Offset magnitude above which the clock steps instead of slewing.
    pub pi_max_threshold_ns: u64,
    pub sync_lock: SyncLockConfig,
    /// Hysteretic lock state.
    pub synced: bool,
    pub syn_cnt: u16,
    pub uns_cnt: u16,
    /// Last offset reported to the clock, as magnitude plus direction.
    pub reported_offset: TimestampSigned,
    pub reported_offset_negative: bool,
    /// The local clock has been updated towards GM time at least once.
    pub ever_updated: bool,
    /// Rate ratio last applied to the corrected clock.
    pub corr_clock_rate_ratio: f64,
    /// Running weighted average of the PI output, used to hold frequency on GM loss.
    pub ppb_adjustment_average: i32,
    /// Free-running reference of the last clock update.
    pub last_free_run_ref: Timestamp,
    /// Periodically estimated offset to the GM.
    pub estimated_gm_offset: TimestampSigned,
    pub estimated_gm_offset_calculated: bool,
    pub sync_stat_calc_due_ns: u64,
    /// At least one non-GM domain exists, so the local clock is a sync consumer.
    pub has_slave_domain: bool,
    pub time_base: TimeBaseInfo,
}

/// Sync lock hysteresis. `offset_ns` is the magnitude of the accepted offset.
pub(crate) fn update_sync_lock<E: Hardware>(hw: &mut E, dev: &mut DeviceState, offset_ns: i64) {
    if dev.synced {
        dev.syn_cnt = 0;

        if offset_ns <= dev.sync_lock.uns_trig_offset_ns {
            dev.uns_cnt = 0;
        } else {
            dev.uns_cnt = dev.uns_cnt.saturating_add(1);

            if dev.uns_cnt >= dev.sync_lock.uns_trig_cnt {
                dev.synced = false;

                hw.sync_state_changed(SyncLockState::Unlocked);
            }
        }
    } else {
        dev.uns_cnt = 0;

        if offset_ns <= dev.sync_lock.syn_trig_offset_ns {
            dev.syn_cnt = dev.syn_cnt.saturating_add(1);

            if dev.syn_cnt >= dev.sync_lock.syn_trig_cnt {
                dev.synced = true;

                hw.sync_state_changed(SyncLockState::Locked);
            }
        } else {
            dev.syn_cnt = 0;
        }
    }
}

/// Force UNLOCKED and tell the application.
pub(crate) fn reset_sync_lock<E: Hardware>(hw: &mut E, dev: &mut DeviceState) {
    dev.synced = false;
    dev.syn_cnt = 0;
    dev.uns_cnt = 0;

    hw.sync_state_changed(SyncLockState::Unlocked);
}

/// Apply one accepted offset/rate sample to the local clock.
///
/// Above the configured threshold the clock takes a one-shot absolute step and the PI state
/// restarts; below it only the frequency is slewed through the PI loop. Returns whether the
/// update was applied (the domain selection callback may decline).
#[allow(clippy::too_many_arguments)]
pub(crate) fn update_local_clock<E: Hardware>(
    hw: &mut E,
    errs: &mut ErrorLog,
    dev: &mut DeviceState,
    pi: &mut PiController,
    domain_number: u8,
    rate_ratio: f64,
    offset: TimestampSigned,
    negative: bool,
    sync_interval_log: i8,
) -> Result<bool, Error> {
    let mut update = ClockUpdate {
        rate_ratio,
        offset,
        negative,
        sync_interval_log,
    };

    if !hw.select_domain(domain_number, &mut update) {
        return Ok(false);
    }

    dev.reported_offset = offset;
    dev.reported_offset_negative = negative;
    dev.corr_clock_rate_ratio = update.rate_ratio;

    let offset_magnitude_ns = offset.seconds.unsigned_abs() * u64::from(NS_IN_SECOND)
        + u64::from(offset.nanoseconds.unsigned_abs());

    let (step, ppb) = if offset_magnitude_ns > dev.pi_max_threshold_ns {
        // Too far out for the servo: step the clock and restart the loop
        let ppb = f64_to_i32_saturating((1.0 - update.rate_ratio) * f64::from(NS_IN_SECOND));

        dev.ppb_adjustment_average = ppb;

        pi.clear();
        reset_sync_lock(hw, dev);

        (
            ClockStep {
                offset,
                negative,
            },
            ppb,
        )
    } else {
        // Servo band: frequency-only correction
        let error_ns = if negative {
            offset.nanoseconds
        } else {
            -offset.nanoseconds
        };

        let ppb = pi.update(sync_interval_log, error_ns, errs);

        dev.ppb_adjustment_average = f64_to_i32_saturating(
            ((1.0 - NEW_PPB_WEIGHT) * f64::from(dev.ppb_adjustment_average))
                + (NEW_PPB_WEIGHT * f64::from(ppb)),
        );

        (ClockStep::NONE, ppb)
    };

    match hw.set_correction(step, PseudoRateRatio::from_ppb(ppb)) {
        Ok(()) => {
            dev.ever_updated = true;

            let ratio_new = f64::from(ppb) / f64::from(NS_IN_SECOND);
            let stepped = step != ClockStep::NONE && offset_magnitude_ns != 0;

            if stepped || f64_abs(ratio_new - dev.time_base.last_ratio) >= RATIO_EPSILON {
                dev.time_base.indicator = dev.time_base.indicator.wrapping_add(1);
                dev.time_base.last_phase_change = offset;
                dev.time_base.negative = negative;
                dev.time_base.last_freq_change = ratio_new;
            }

            dev.time_base.last_ratio = ratio_new;

            Ok(true)
        }
        Err(_) => {
            dev.ever_updated = false;

            Err(Error::Hardware(HardwareError::ClockUpdate))
        }
    }
}

/// Keep the clock running at the averaged rate without applying any offset. Used through GM
/// outages and while outliers are dropped.
pub(crate) fn fix_local_clock<E: Hardware>(hw: &mut E, dev: &DeviceState) -> Result<(), Error> {
    hw.set_correction(
        ClockStep::NONE,
        PseudoRateRatio::from_ppb(dev.ppb_adjustment_average),
    )
    .map_err(|_| Error::Hardware(HardwareError::ClockUpdate))
}

/// Loss-of-sync handling: pin the clock frequency, drop the servo state, report UNLOCKED and log.
pub(crate) fn los_handle<E: Hardware>(
    hw: &mut E,
    errs: &mut ErrorLog,
    dev: &mut DeviceState,
    pi: &mut PiController,
    domain: &Domain,
    machine: u8,
    sequence_id: Option<u16>,
) {
    if dev.ever_updated {
        if let Err(e) = fix_local_clock(hw, dev) {
            errs.register(e, Some(machine), Some(domain.index), sequence_id);
        }
    }

    pi.clear();
    reset_sync_lock(hw, dev);

    errs.register(
        Error::Sync(SyncError::LossOfSync),
        Some(machine),
        Some(domain.index),
        sequence_id,
    );
}

/// The gPTP engine.
pub struct Engine<E: Hardware> {
    hw: E,
    dev: DeviceState,
    pi: PiController,
    errs: ErrorLog,
    frame_ids: FrameIdTable,
    ports: Vec<Port, MAX_PORTS>,
    domains: Vec<Domain, MAX_DOMAINS>,
    pdelay: Vec<PdelayMachine, MAX_PORTS>,
    product: ProductDetails,
    #[cfg(feature = "counters")]
    stats: Stats,
}

macro_rules! ctx {
    ($self:ident) => {
        Ctx {
            hw: &mut $self.hw,
            errs: &mut $self.errs,
            frame_ids: &mut $self.frame_ids,
            eth_prio: $self.dev.eth_frame_prio,
            vlan_enabled: $self.dev.vlan_enabled,
            device_vlan_tci: $self.dev.vlan_tci,
            sdo_compatibility: $self.dev.sdo_id_compatibility,
            #[cfg(feature = "counters")]
            stats: &mut $self.stats,
        }
    };
}

impl<E: Hardware> Engine<E> {
    /// Validate `config`, read the port hardware state and bring up an initialized engine.
    ///
    /// A failed validation reports the first violation found; no frame is sent and no timer is
    /// armed in that case.
    pub fn new(mut hw: E, config: Config) -> Result<Self, Error> {
        validate(&config)?;

        if config.pi.nat_freq_ratio == 0.0 {
            return Err(Error::PiConfiguration);
        }

        let mut ports: Vec<Port, MAX_PORTS> = Vec::new();

        for (index, port_config) in config.ports.iter().enumerate() {
            let source_mac = hw
                .phys_addr(index as u8)
                .map_err(|_| Error::Init(InitError::NoSourceMac))?;

            let enabled = hw
                .link_state(index as u8)
                .map_err(|_| Error::Init(InitError::NoLinkStatus))?;

            let _ = ports.push(Port {
                index: index as u8,
                clock_id: port_config.clock_id,
                source_mac,
                enabled,
            });
        }

        let product = ProductDetails::new(
            config.product.manufacturer_id,
            config.product.product_revision,
            config.product.product_description,
            ports[0].source_mac,
        );

        let mut pdelay: Vec<PdelayMachine, MAX_PORTS> = Vec::new();

        for (index, port_config) in config.ports.iter().enumerate() {
            let mut machine = PdelayMachine::new(index as u8, port_config);

            machine.sequence_id = PDELAY_FIRST_SEQUENCE_ID;

            let _ = pdelay.push(machine);
        }

        let mut domains: Vec<Domain, MAX_DOMAINS> = Vec::new();

        for (index, domain_config) in config.domains.iter().enumerate() {
            let mut machines = Vec::new();

            for machine_config in domain_config.sync_machines.iter() {
                let mut machine = sync::SyncMachine::new(
                    machine_config.port,
                    machine_config.role,
                    machine_config.sync_interval_log,
                );

                machine.sequence_id = SYNC_FIRST_SEQUENCE_ID;

                let _ = machines.push(machine);
            }

            let _ = domains.push(Domain {
                index: index as u8,
                number: domain_config.domain_number,
                is_gm: domain_config.is_gm,
                synced_gm: domain_config.synced_gm,
                reference_domain_index: config
                    .domains
                    .iter()
                    .position(|d| d.domain_number == domain_config.reference_domain)
                    .unwrap_or(index) as u8,
                startup_timeout_s: domain_config.startup_timeout_s,
                sync_receipt_timeout_cnt: domain_config.sync_receipt_timeout_cnt,
                outlier_threshold_ns: domain_config.sync_outlier_threshold_ns,
                outlier_ignore_cnt: domain_config.outlier_ignore_cnt,
                outlier_cnt: 0,
                vlan_tci: domain_config.vlan_tci,
                slave_machine: domain_config.slave_machine().unwrap_or(0),
                acting_gm: false,
                valid_sync_received: false,
                sync_valid_ever_received: false,
                gm_failure_reported: false,
                rcvd_sync_used_for_local_clk: false,
                signaling_sequence_id: 0,
                gm_time_base_indicator: 0,
                last_gm_phase_change_h: 0,
                last_gm_phase_change_l: 0,
                scaled_last_gm_freq_change: 0,
                last_sync_rcvd_ns: 0,
                sync_check_due_ns: 0,
                receipt_timeout_due_ns: 0,
                last_valid_gm_plus_corr: Timestamp::ZERO,
                last_valid_ts_of_gm_plus_corr: Timestamp::ZERO,
                prev_precise_origin: Timestamp::ZERO,
                machines,
                signaling_buf: [0; frame::MAX_FRAME_LEN],
            });
        }

        let dev = DeviceState {
            sdo_id_compatibility: config.sdo_id_compatibility_mode,
            vlan_enabled: config.vlan_enabled,
            vlan_tci: config.vlan_tci,
            eth_frame_prio: config.eth_frame_prio,
            signaling_enabled: config.signaling_enabled,
            pdelay_avg_weight: config.pdelay_avg_weight,
            rratio_avg_weight: config.rratio_avg_weight,
            rratio_max_dev: config.rratio_max_dev,
            pdelay_nvm_write_threshold: config.pdelay_nvm_write_threshold,
            rratio_nvm_write_threshold: config.rratio_nvm_write_threshold,
            pi_max_threshold_ns: config.pi_max_threshold_ns,
            sync_lock: config.sync_lock,
            synced: false,
            syn_cnt: 0,
            uns_cnt: 0,
            reported_offset: TimestampSigned::ZERO,
            reported_offset_negative: false,
            ever_updated: false,
            corr_clock_rate_ratio: 1.0,
            ppb_adjustment_average: 0,
            last_free_run_ref: Timestamp::ZERO,
            estimated_gm_offset: TimestampSigned::ZERO,
            estimated_gm_offset_calculated: false,
            sync_stat_calc_due_ns: 0,
            has_slave_domain: config.domains.iter().any(|d| !d.is_gm),
            time_base: TimeBaseInfo::default(),
        };

        #[cfg(feature = "counters")]
        let stats = {
            let mut machine_counts: Vec<usize, MAX_DOMAINS> = Vec::new();

            for domain in config.domains.iter() {
                let _ = machine_counts.push(domain.sync_machines.len());
            }

            Stats::new(ports.len(), &machine_counts)
        };

        let mut engine = Self {
            hw,
            dev,
            pi: PiController::new(config.pi),
            errs: ErrorLog::new(),
            frame_ids: FrameIdTable::new(),
            ports,
            domains,
            pdelay,
            product,
            #[cfg(feature = "counters")]
            stats,
        };

        engine
            .hw
            .join_multicast(EthernetAddress::PTP_MULTICAST)?;

        {
            let rratio_max_dev = engine.dev.rratio_max_dev;
            let mut ctx = ctx!(engine);

            // Ports that are already up load their persisted link properties and start their
            // Pdelay responders now
            for machine in engine.pdelay.iter_mut() {
                if engine.ports[machine.port as usize].enabled {
                    pdelay::on_link_up(&mut ctx, machine, rratio_max_dev);
                }
            }

            timer::arm(&mut ctx, &mut engine.dev, &mut engine.domains, &mut engine.pdelay);

            // Slave machines on live ports start ready to pair the first ingress Sync
            for domain in engine.domains.iter_mut() {
                if domain.is_gm {
                    continue;
                }

                let machine = &mut domain.machines[domain.slave_machine];

                if engine.ports[machine.port as usize].enabled {
                    machine.slave_state = sync::SlaveState::WaitingForSync;
                }
            }
        }

        fmt::info!(
            "gPTP engine up: {} port(s), {} domain(s)",
            engine.ports.len(),
            engine.domains.len()
        );

        Self::drain_notifications(&mut engine.hw, &mut engine.errs);

        Ok(engine)
    }

    fn drain_notifications(hw: &mut E, errs: &mut ErrorLog) {
        for _ in 0..errs.take_pending_notifications() {
            hw.error_logged();
        }
    }

    fn stamp_log_time(&mut self) {
        let now = self
            .hw
            .current_time(TimeBase::FreeRunning)
            .unwrap_or(Timestamp::ZERO);

        self.errs.set_time(now);
    }

    /// The periodic entry point, called at a nominal 1 ms cadence.
    pub fn tick(&mut self) {
        self.stamp_log_time();

        // Drain egress descriptors confirmed through `update_timestamp_entry`
        let mut confirmed: Vec<(u8, u8, Timestamp), 48> = Vec::new();

        for domain in self.domains.iter_mut() {
            for machine in domain.machines.iter_mut() {
                if let Some((frame_id, egress)) = machine.map_sync.take_confirmed() {
                    let _ = confirmed.push((machine.port, frame_id, egress));
                }
            }
        }

        for machine in self.pdelay.iter_mut() {
            if let Some((frame_id, egress)) = machine.map_req.take_confirmed() {
                let _ = confirmed.push((machine.port, frame_id, egress));
            }

            if let Some((frame_id, egress)) = machine.map_resp.take_confirmed() {
                let _ = confirmed.push((machine.port, frame_id, egress));
            }
        }

        for (port, frame_id, egress) in confirmed {
            self.route_timestamp(port, frame_id, egress);
        }

        {
            let signaling_enabled = self.dev.signaling_enabled;
            let mut ctx = ctx!(self);

            timer::periodic(
                &mut ctx,
                &mut self.dev,
                &mut self.pi,
                &self.ports,
                &mut self.domains,
                &mut self.pdelay,
                signaling_enabled,
            );
        }

        Self::drain_notifications(&mut self.hw, &mut self.errs);
    }

    /// The frame reception entry point.
    pub fn msg_receive(&mut self, rx: &RxFrame<'_>) -> Result<(), Error> {
        self.stamp_log_time();

        let result = self.msg_receive_inner(rx);

        if let Err(e) = result {
            self.errs.register(e, Some(rx.port), None, None);
        }

        Self::drain_notifications(&mut self.hw, &mut self.errs);

        result
    }

    fn msg_receive_inner(&mut self, rx: &RxFrame<'_>) -> Result<(), Error> {
        if !rx.is_ptp() {
            return Err(Error::Frame(FrameError::NoPtpEthertype));
        }

        if rx.port as usize >= self.ports.len() {
            return Err(Error::Frame(FrameError::UnknownPdelayMachine));
        }

        let message = frame::decode(rx.payload, self.dev.sdo_id_compatibility)?;

        match message {
            Message::Sync(ref msg) => {
                let (domain_idx, machine_idx) = self.resolve_sync_target(rx.port, msg.header.domain_number)?;

                let domain = &mut self.domains[domain_idx];

                if domain.is_gm {
                    return Err(Error::Frame(FrameError::SyncOnGmDomain));
                }

                if domain.machines[machine_idx].role == SyncRole::Master {
                    return Err(Error::Frame(FrameError::SyncOnMaster));
                }

                #[cfg(feature = "counters")]
                self.stats
                    .rx(rx.port, Some((domain_idx as u8, machine_idx as u8)), MessageType::Sync);

                let mut ctx = ctx!(self);

                sync::slave_rx_sync(
                    &mut ctx,
                    &mut self.dev,
                    &mut self.pi,
                    &mut self.domains[domain_idx],
                    machine_idx,
                    msg.header.sequence_id,
                    msg.header.log_message_interval,
                    rx.ingress,
                    rx.vlan_tci,
                    &self.ports,
                );

                Ok(())
            }
            Message::FollowUp(ref msg) => {
                let (domain_idx, machine_idx) = self.resolve_sync_target(rx.port, msg.header.domain_number)?;

                let domain = &mut self.domains[domain_idx];

                if domain.is_gm {
                    return Err(Error::Frame(FrameError::FollowUpOnGmDomain));
                }

                if domain.machines[machine_idx].role == SyncRole::Master {
                    return Err(Error::Frame(FrameError::FollowUpOnMaster));
                }

                #[cfg(feature = "counters")]
                self.stats.rx(
                    rx.port,
                    Some((domain_idx as u8, machine_idx as u8)),
                    MessageType::FollowUp,
                );

                let neighbor = sync::NeighborSnapshot {
                    rate_ratio: self.pdelay[rx.port as usize].neighbor_rate_ratio,
                    prop_delay_ns: self.pdelay[rx.port as usize].neighbor_prop_delay,
                    asymmetry_ns: self.pdelay[rx.port as usize].asymmetry_ns,
                };

                let mut ctx = ctx!(self);

                let cascaded = sync::slave_rx_fup(
                    &mut ctx,
                    &mut self.dev,
                    &mut self.pi,
                    &mut self.domains[domain_idx],
                    machine_idx,
                    msg,
                    neighbor,
                );

                if cascaded {
                    let now = ctx.now_free_ns();

                    timer::syncs_send_non_gm(
                        &mut ctx,
                        &mut self.domains[domain_idx],
                        &self.ports,
                        timer::SendReason::FollowUpReceived,
                        now,
                    );
                }

                Ok(())
            }
            Message::PdelayReq(ref msg) => {
                if rx.port as usize >= self.pdelay.len() {
                    return Err(Error::Frame(FrameError::UnknownPdelayMachine));
                }

                #[cfg(feature = "counters")]
                self.stats.rx(rx.port, None, MessageType::PdelayReq);

                let mut ctx = ctx!(self);

                pdelay::on_req(
                    &mut ctx,
                    &mut self.pdelay[rx.port as usize],
                    &self.ports,
                    msg.header.source_port_identity,
                    rx.source_mac,
                    msg.header.sequence_id,
                    msg.header.major_sdo_id,
                    rx.ingress,
                );

                Ok(())
            }
            Message::PdelayResp(ref msg) => {
                if rx.port as usize >= self.pdelay.len() {
                    return Err(Error::Frame(FrameError::UnknownPdelayMachine));
                }

                #[cfg(feature = "counters")]
                self.stats.rx(rx.port, None, MessageType::PdelayResp);

                let mut ctx = ctx!(self);

                pdelay::on_resp(
                    &mut ctx,
                    &mut self.pdelay[rx.port as usize],
                    &self.ports,
                    msg,
                    rx.ingress,
                );

                Ok(())
            }
            Message::PdelayRespFollowUp(ref msg) => {
                if rx.port as usize >= self.pdelay.len() {
                    return Err(Error::Frame(FrameError::UnknownPdelayMachine));
                }

                #[cfg(feature = "counters")]
                self.stats
                    .rx(rx.port, None, MessageType::PdelayRespFollowUp);

                let pdelay_avg_weight = self.dev.pdelay_avg_weight;
                let rratio_avg_weight = self.dev.rratio_avg_weight;
                let rratio_max_dev = self.dev.rratio_max_dev;
                let pdelay_nvm_thr = self.dev.pdelay_nvm_write_threshold;
                let rratio_nvm_thr = self.dev.rratio_nvm_write_threshold;

                let mut ctx = ctx!(self);

                pdelay::on_resp_fup(
                    &mut ctx,
                    &mut self.pdelay[rx.port as usize],
                    &self.ports,
                    msg,
                    pdelay_avg_weight,
                    rratio_avg_weight,
                    rratio_max_dev,
                    pdelay_nvm_thr,
                    rratio_nvm_thr,
                );

                Ok(())
            }
            Message::Signaling(ref msg) => {
                let domain_idx = self
                    .domain_index_by_number(msg.header.domain_number)
                    .ok_or(Error::Frame(FrameError::UnknownDomain))?;

                let machine_idx = self.domains[domain_idx]
                    .machines
                    .iter()
                    .position(|m| m.port == rx.port)
                    .ok_or(Error::Frame(FrameError::UnknownMachine))?;

                let mut ctx = ctx!(self);

                signaling::apply_request(
                    &mut ctx,
                    &mut self.domains[domain_idx],
                    machine_idx,
                    msg.time_sync_interval,
                );

                Ok(())
            }
        }
    }

    /// The TX confirmation entry point: the driver captured the egress timestamp of `frame_id`.
    pub fn timestamp_event(&mut self, port: u8, egress: Timestamp, frame_id: u8) -> Result<(), Error> {
        self.stamp_log_time();

        let result = self.route_timestamp(port, frame_id, egress);

        Self::drain_notifications(&mut self.hw, &mut self.errs);

        result
    }

    /// Attach an egress timestamp to an enqueued TX buffer by buffer index. The confirmed
    /// descriptor is consumed by the next tick.
    pub fn update_timestamp_entry(
        &mut self,
        port: u8,
        buffer_index: u32,
        egress: Timestamp,
    ) -> Result<(), Error> {
        for domain in self.domains.iter_mut() {
            for machine in domain.machines.iter_mut() {
                if machine.map_sync.confirm(port, buffer_index, egress) {
                    return Ok(());
                }
            }
        }

        for machine in self.pdelay.iter_mut() {
            if machine.map_req.confirm(port, buffer_index, egress)
                || machine.map_resp.confirm(port, buffer_index, egress)
            {
                return Ok(());
            }
        }

        self.errs.register(
            Error::Timestamp(TimestampError::NotIdentified),
            Some(port),
            None,
            None,
        );

        Self::drain_notifications(&mut self.hw, &mut self.errs);

        Err(Error::Timestamp(TimestampError::NotIdentified))
    }

    fn route_timestamp(&mut self, port: u8, frame_id: u8, egress: Timestamp) -> Result<(), Error> {
        let Some(entry) = self.frame_ids.take(frame_id) else {
            // Late confirmation for a slot already cleared, e.g. across a link bounce
            let e = Error::Timestamp(TimestampError::InvalidFrameId(frame_id));

            self.errs.register(e, Some(port), None, None);

            return Err(e);
        };

        if entry.port != port {
            let e = Error::Timestamp(TimestampError::NotIdentified);

            self.errs
                .register(e, Some(port), None, Some(entry.sequence_id));

            return Err(e);
        }

        match entry.message_type {
            MessageType::Sync => {
                let domain_idx = entry.domain as usize;

                if domain_idx >= self.domains.len() {
                    let e = Error::Timestamp(TimestampError::DomainIndex);

                    self.errs.register(e, Some(port), None, Some(entry.sequence_id));

                    return Err(e);
                }

                if entry.machine as usize >= self.domains[domain_idx].machines.len() {
                    let e = Error::Timestamp(TimestampError::MachineIndex);

                    self.errs
                        .register(e, Some(port), Some(entry.domain), Some(entry.sequence_id));

                    return Err(e);
                }

                // The Follow_Up must describe the Sync as it was sent
                self.domains[domain_idx].acting_gm = entry.acting_gm;

                self.domains[domain_idx].machines[entry.machine as usize]
                    .register_egress(entry.sequence_id, egress);

                let ref_rate_ratio = self.reference_rate_ratio(domain_idx);

                let mut ctx = ctx!(self);

                sync::master_on_egress_timestamp(
                    &mut ctx,
                    &self.dev,
                    &mut self.domains[domain_idx],
                    entry.machine as usize,
                    &self.ports,
                    ref_rate_ratio,
                );

                Ok(())
            }
            MessageType::PdelayReq => {
                let machine = self.pdelay.get_mut(entry.machine as usize).ok_or_else(|| {
                    let e = Error::Timestamp(TimestampError::PdelayMachineIndex);

                    self.errs.register(e, Some(port), None, Some(entry.sequence_id));

                    e
                })?;

                pdelay::on_req_egress_timestamp(machine, entry.sequence_id, egress);

                Ok(())
            }
            MessageType::PdelayResp => {
                if entry.machine as usize >= self.pdelay.len() {
                    let e = Error::Timestamp(TimestampError::PdelayMachineIndex);

                    self.errs.register(e, Some(port), None, Some(entry.sequence_id));

                    return Err(e);
                }

                let mut ctx = ctx!(self);

                pdelay::on_resp_egress_timestamp(
                    &mut ctx,
                    &mut self.pdelay[entry.machine as usize],
                    &self.ports,
                    entry.sequence_id,
                    egress,
                );

                Ok(())
            }
            _ => {
                let e = Error::Timestamp(TimestampError::NotIdentified);

                self.errs
                    .register(e, Some(port), None, Some(entry.sequence_id));

                Err(e)
            }
        }
    }

    /// Link-up notification for `port`.
    pub fn link_up(&mut self, port: u8) {
        self.stamp_log_time();

        if let Some(p) = self.ports.get_mut(port as usize) {
            p.enabled = true;
        }

        if (port as usize) < self.pdelay.len() {
            let rratio_max_dev = self.dev.rratio_max_dev;
            let mut ctx = ctx!(self);

            pdelay::on_link_up(&mut ctx, &mut self.pdelay[port as usize], rratio_max_dev);
        }

        for domain in self.domains.iter_mut() {
            for machine in domain.machines.iter_mut() {
                if machine.port == port {
                    machine.interval_log = machine.init_interval_log;
                    machine.oper_interval_log = machine.init_interval_log;
                    machine.timer_enabled = true;

                    if machine.role == SyncRole::Slave {
                        machine.slave_state = sync::SlaveState::WaitingForSync;
                    }
                }
            }
        }

        fmt::debug!("Link up on gPTP port {}", port);

        Self::drain_notifications(&mut self.hw, &mut self.errs);
    }

    /// Link-down notification for `port`.
    ///
    /// Per-port state resets; outstanding TX confirmations for the dead link fall into cleared
    /// frame id slots and are discarded with a logged error.
    pub fn link_down(&mut self, port: u8) {
        self.stamp_log_time();

        if let Some(p) = self.ports.get_mut(port as usize) {
            p.enabled = false;
        }

        if let Some(machine) = self.pdelay.get_mut(port as usize) {
            pdelay::on_link_down(machine);
        }

        for domain in self.domains.iter_mut() {
            for machine_idx in 0..domain.machines.len() {
                let machine = &mut domain.machines[machine_idx];

                if machine.port != port {
                    continue;
                }

                sync::reset_on_link_down(machine);

                // A dead slave port must surface as loss of sync on the next tick
                if machine.role == SyncRole::Slave {
                    domain.receipt_timeout_due_ns = 1;
                }
            }
        }

        reset_sync_lock(&mut self.hw, &mut self.dev);

        fmt::debug!("Link down on gPTP port {}", port);

        Self::drain_notifications(&mut self.hw, &mut self.errs);
    }

    /// Read the error log at `index` (0 is newest, max 31), clearing the entry's fresh flag.
    pub fn error_read(&mut self, index: usize) -> Result<ErrorLogEntry, Error> {
        self.errs.read(index)
    }

    /// The last offset reported to the local clock as a signed value, or the `i64::MAX`/`i32::MAX`
    /// sentinel before the first successful update.
    pub fn current_offset(&self) -> TimestampSigned {
        if !self.dev.ever_updated {
            return TimestampSigned {
                seconds: i64::MAX,
                nanoseconds: i32::MAX,
            };
        }

        if self.dev.reported_offset_negative {
            TimestampSigned {
                seconds: -self.dev.reported_offset.seconds,
                nanoseconds: -self.dev.reported_offset.nanoseconds,
            }
        } else {
            self.dev.reported_offset
        }
    }

    /// The estimated offset to the Grand Master, recomputed every 100 ms.
    pub fn estimated_gm_offset(&self) -> Result<TimestampSigned, Error> {
        if !self.dev.estimated_gm_offset_calculated {
            return Err(Error::Api(ApiError::NotAvailable));
        }

        Ok(self.dev.estimated_gm_offset)
    }

    /// Whether the sync lock hysteresis currently reports LOCKED.
    pub fn synchronized(&self) -> bool {
        self.dev.synced
    }

    /// Product identity assembled at init.
    pub fn product_details(&self) -> &ProductDetails {
        &self.product
    }

    /// Current Sync interval of one machine.
    pub fn sync_interval(&self, domain_number: u8, machine: usize) -> Result<i8, Error> {
        let domain_idx = self
            .domain_index_by_number(domain_number)
            .ok_or(Error::Api(ApiError::UnknownDomain))?;

        let machine = self.domains[domain_idx]
            .machines
            .get(machine)
            .ok_or(Error::Api(ApiError::IllegalMachine))?;

        Ok(machine.interval_log)
    }

    /// Request a Sync interval change.
    ///
    /// On a master machine the interval is applied locally; on a slave machine a
    /// Message-Interval-Request is sent upstream instead.
    pub fn set_sync_interval(
        &mut self,
        domain_number: u8,
        machine: usize,
        interval_log: i8,
    ) -> Result<(), Error> {
        self.stamp_log_time();

        let domain_idx = self
            .domain_index_by_number(domain_number)
            .ok_or(Error::Api(ApiError::UnknownDomain))?;

        if machine >= self.domains[domain_idx].machines.len() {
            return Err(Error::Api(ApiError::IllegalMachine));
        }

        if !(LOG_SYNC_INTERVAL_MIN..=LOG_SYNC_INTERVAL_MAX).contains(&interval_log) {
            return Err(Error::Init(InitError::SyncIntervalOutOfRange));
        }

        let role = self.domains[domain_idx].machines[machine].role;

        let mut ctx = ctx!(self);

        match role {
            SyncRole::Master => {
                let m = &mut self.domains[domain_idx].machines[machine];

                m.interval_log = interval_log;
                m.oper_interval_log = interval_log;
            }
            SyncRole::Slave => {
                signaling::send_request(
                    &mut ctx,
                    &mut self.domains[domain_idx],
                    &self.ports,
                    interval_log,
                );
            }
        }

        Self::drain_notifications(&mut self.hw, &mut self.errs);

        Ok(())
    }

    /// Read a statistics counter. `domain_number` of `None` addresses the port counter set.
    ///
    /// On an unknown counter id the returned value is zero alongside the error.
    #[cfg(feature = "counters")]
    pub fn stats_value(
        &mut self,
        domain_number: Option<u8>,
        port_or_machine: u8,
        counter: Counter,
    ) -> Result<u32, Error> {
        match domain_number {
            None => self.stats.port_value(port_or_machine, counter),
            Some(number) => {
                let domain_idx = self
                    .domain_index_by_number(number)
                    .ok_or(Error::Api(ApiError::UnknownDomain))?;

                self.stats
                    .domain_value(domain_idx as u8, port_or_machine, counter)
            }
        }
    }

    /// Zero every statistics counter.
    #[cfg(feature = "counters")]
    pub fn clear_stats(&mut self) {
        self.stats.clear();
    }

    /// Borrow the hardware environment.
    pub fn hardware(&self) -> &E {
        &self.hw
    }

    /// Mutably borrow the hardware environment.
    pub fn hardware_mut(&mut self) -> &mut E {
        &mut self.hw
    }

    fn domain_index_by_number(&self, domain_number: u8) -> Option<usize> {
        self.domains.iter().position(|d| d.number == domain_number)
    }

    /// Resolve a Sync/Follow_Up to its (domain, machine) target.
    fn resolve_sync_target(&self, port: u8, domain_number: u8) -> Result<(usize, usize), Error> {
        let domain_idx = self
            .domain_index_by_number(domain_number)
            .ok_or(Error::Frame(FrameError::UnknownDomain))?;

        let machine_idx = self.domains[domain_idx]
            .machines
            .iter()
            .position(|m| m.port == port)
            .ok_or(Error::Frame(FrameError::UnknownMachine))?;

        Ok((domain_idx, machine_idx))
    }

    /// For a synced-GM domain, the rate ratio of the reference domain's slave machine.
    fn reference_rate_ratio(&self, domain_idx: usize) -> Option<f64> {
        let domain = &self.domains[domain_idx];

        if !domain.synced_gm || domain.reference_domain_index as usize == domain_idx {
            return None;
        }

        let reference = self.domains.get(domain.reference_domain_index as usize)?;

        (!reference.is_gm).then(|| reference.machines[reference.slave_machine].rate_ratio)
    }
}

/// Configuration validation, reporting the first violation found.
fn validate(config: &Config) -> Result<(), Error> {
    if config.ports.is_empty() {
        return Err(Error::Init(InitError::NoPorts));
    }

    if config.domains.is_empty() {
        return Err(Error::Init(InitError::NoDomains));
    }

    for port in config.ports.iter() {
        for interval in [port.pdelay_interval_log_init, port.pdelay_interval_log_oper] {
            if !(LOG_PDELAY_INTERVAL_MIN..=LOG_PDELAY_INTERVAL_MAX).contains(&interval) {
                return Err(Error::Init(InitError::PdelayIntervalOutOfRange));
            }
        }
    }

    for (index, domain) in config.domains.iter().enumerate() {
        if config.domains[..index]
            .iter()
            .any(|other| other.domain_number == domain.domain_number)
        {
            return Err(Error::Init(InitError::DomainNumberUsedTwice));
        }

        if domain.sync_machines.len() > config.ports.len() {
            return Err(Error::Init(InitError::Capacity));
        }

        if domain.startup_timeout_s > STARTUP_TIMEOUT_MAX_S {
            return Err(Error::Init(InitError::StartupTimeoutTooLong));
        }

        let slaves = domain
            .sync_machines
            .iter()
            .filter(|m| m.role == SyncRole::Slave)
            .count();

        if slaves > 1 {
            return Err(Error::Init(InitError::TooManySlaves));
        }

        if domain.is_gm && slaves != 0 {
            return Err(Error::Init(InitError::SlaveOnGmDomain));
        }

        if !domain.is_gm && slaves == 0 {
            return Err(Error::Init(InitError::NoSlaveOnBridgeDomain));
        }

        if domain.synced_gm && !domain.is_gm {
            return Err(Error::Init(InitError::SyncedGmOnBridgeDomain));
        }

        if domain.synced_gm
            && !config
                .domains
                .iter()
                .any(|d| d.domain_number == domain.reference_domain)
        {
            return Err(Error::Init(InitError::ReferenceDomainNotConfigured));
        }

        for machine in domain.sync_machines.iter() {
            if machine.port as usize >= config.ports.len() {
                return Err(Error::Init(InitError::UnknownPort));
            }

            if !(LOG_SYNC_INTERVAL_MIN..=LOG_SYNC_INTERVAL_MAX).contains(&machine.sync_interval_log)
            {
                return Err(Error::Init(InitError::SyncIntervalOutOfRange));
            }

            if machine.role == SyncRole::Slave
                && !config.ports[machine.port as usize].pdelay_initiator_enabled
            {
                return Err(Error::Init(InitError::NoPdelayInitiatorForSlave));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DomainConfig, PiConfig, PortConfig, ProductConfig, SyncMachineConfig,
    };

    fn port() -> PortConfig {
        PortConfig {
            clock_id: 1,
            pdelay_initiator_enabled: true,
            pdelay_unicast_resp: false,
            pdelay_interval_log_init: -3,
            pdelay_interval_log_oper: 0,
            neighbor_prop_delay_thresh_ns: 10_000,
            measurements_till_slow_down: 10,
            allowed_lost_responses: 3,
            nvm_address_pdelay: 0,
            nvm_address_rratio: 8,
            delay_asymmetry_ns: 0,
        }
    }

    fn domain(number: u8, is_gm: bool, machines: &[(u8, SyncRole)]) -> DomainConfig {
        let mut sync_machines = Vec::new();

        for (port, role) in machines {
            let _ = sync_machines.push(SyncMachineConfig {
                port: *port,
                role: *role,
                sync_interval_log: -3,
            });
        }

        DomainConfig {
            domain_number: number,
            is_gm,
            synced_gm: false,
            reference_domain: number,
            startup_timeout_s: 10,
            sync_receipt_timeout_cnt: 3,
            sync_outlier_threshold_ns: 1_000,
            outlier_ignore_cnt: 2,
            vlan_tci: 0,
            sync_machines,
        }
    }

    fn config(domains: &[DomainConfig]) -> Config {
        let mut cfg = Config {
            eth_frame_prio: 0,
            vlan_enabled: false,
            vlan_tci: 0,
            sdo_id_compatibility_mode: false,
            signaling_enabled: false,
            ports: Vec::new(),
            domains: Vec::new(),
            pdelay_avg_weight: 0.5,
            rratio_avg_weight: 0.5,
            rratio_max_dev: 0.001,
            pdelay_nvm_write_threshold: 10.0,
            rratio_nvm_write_threshold: 0.0001,
            pi: PiConfig {
                damping_ratio: 1.0,
                nat_freq_ratio: 30.0,
                integral_windup_limit: 0,
            },
            pi_max_threshold_ns: 1_000,
            sync_lock: SyncLockConfig {
                syn_trig_offset_ns: 100,
                uns_trig_offset_ns: 200,
                syn_trig_cnt: 2,
                uns_trig_cnt: 2,
            },
            product: ProductConfig {
                manufacturer_id: [0, 0, 0],
                product_revision: "1;1;1",
                product_description: "Test;Test;",
            },
        };

        let _ = cfg.ports.push(port());
        let _ = cfg.ports.push(port());

        for d in domains {
            let _ = cfg.domains.push(d.clone());
        }

        cfg
    }

    #[test]
    fn duplicate_domain_number_rejected() {
        let cfg = config(&[
            domain(0, false, &[(0, SyncRole::Slave)]),
            domain(0, true, &[(1, SyncRole::Master)]),
        ]);

        assert_eq!(
            validate(&cfg),
            Err(Error::Init(InitError::DomainNumberUsedTwice))
        );
    }

    #[test]
    fn empty_configs_rejected() {
        let mut cfg = config(&[domain(0, true, &[(0, SyncRole::Master)])]);
        cfg.ports.clear();

        assert_eq!(validate(&cfg), Err(Error::Init(InitError::NoPorts)));

        let cfg = config(&[]);

        assert_eq!(validate(&cfg), Err(Error::Init(InitError::NoDomains)));
    }

    #[test]
    fn role_violations_rejected() {
        let cfg = config(&[domain(0, true, &[(0, SyncRole::Slave)])]);

        assert_eq!(validate(&cfg), Err(Error::Init(InitError::SlaveOnGmDomain)));

        let cfg = config(&[domain(0, false, &[(0, SyncRole::Master)])]);

        assert_eq!(
            validate(&cfg),
            Err(Error::Init(InitError::NoSlaveOnBridgeDomain))
        );

        let cfg = config(&[domain(
            0,
            false,
            &[(0, SyncRole::Slave), (1, SyncRole::Slave)],
        )]);

        assert_eq!(validate(&cfg), Err(Error::Init(InitError::TooManySlaves)));
    }

    #[test]
    fn slave_needs_pdelay_initiator() {
        let mut cfg = config(&[domain(0, false, &[(0, SyncRole::Slave)])]);
        cfg.ports[0].pdelay_initiator_enabled = false;

        assert_eq!(
            validate(&cfg),
            Err(Error::Init(InitError::NoPdelayInitiatorForSlave))
        );
    }

    #[test]
    fn intervals_and_timeouts_validated() {
        let mut cfg = config(&[domain(0, true, &[(0, SyncRole::Master)])]);
        cfg.ports[0].pdelay_interval_log_init = 5;

        assert_eq!(
            validate(&cfg),
            Err(Error::Init(InitError::PdelayIntervalOutOfRange))
        );

        let mut cfg = config(&[domain(0, true, &[(0, SyncRole::Master)])]);
        cfg.domains[0].sync_machines[0].sync_interval_log = 1;

        assert_eq!(
            validate(&cfg),
            Err(Error::Init(InitError::SyncIntervalOutOfRange))
        );

        let mut cfg = config(&[domain(0, true, &[(0, SyncRole::Master)])]);
        cfg.domains[0].startup_timeout_s = STARTUP_TIMEOUT_MAX_S + 1;

        assert_eq!(
            validate(&cfg),
            Err(Error::Init(InitError::StartupTimeoutTooLong))
        );
    }

    #[test]
    fn synced_gm_constraints() {
        let mut cfg = config(&[domain(0, false, &[(0, SyncRole::Slave)])]);
        cfg.domains[0].synced_gm = true;

        assert_eq!(
            validate(&cfg),
            Err(Error::Init(InitError::SyncedGmOnBridgeDomain))
        );

        let mut cfg = config(&[domain(0, true, &[(0, SyncRole::Master)])]);
        cfg.domains[0].synced_gm = true;
        cfg.domains[0].reference_domain = 9;

        assert_eq!(
            validate(&cfg),
            Err(Error::Init(InitError::ReferenceDomainNotConfigured))
        );
    }

    #[test]
    fn unknown_port_rejected() {
        let cfg = config(&[domain(0, true, &[(7, SyncRole::Master)])]);

        assert_eq!(validate(&cfg), Err(Error::Init(InitError::UnknownPort)));
    }
}
