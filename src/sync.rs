//! Sync/Follow_Up state machines.
//!
//! One machine runs per port per domain with a configuration-fixed master or slave role. The
//! slave consumes Sync/Follow_Up pairs from the upstream Grand Master and turns them into clock
//! updates; masters emit Sync, wait for the captured egress timestamp and complete the pair with
//! a Follow_Up whose correction field accumulates this bridge's residence time.

use crate::{
    config::SyncRole,
    domain::Domain,
    engine::{self, Ctx, DeviceState, TxRoute},
    error::{Error, SyncError, TimestampError},
    ethernet::EthernetAddress,
    fmt,
    frame::{FrameMeta, MAX_FRAME_LEN, Payload, PortIdentity, TRANSPORT_SPECIFIC_1},
    hardware::Hardware,
    pi::PiController,
    port::Port,
    time::{TEN_MS_IN_NS, Timestamp, TimestampSigned, log_interval_to_ns},
    tx_map::TxMapEntry,
};

/// Master side states.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum MasterState {
    /// Not running (link down or slave-only).
    #[default]
    NotEnabled,
    /// First activation.
    Initing,
    /// Ready to emit the next Sync.
    SendSync,
    /// Sync emitted, Follow_Up owed once the egress timestamp arrives.
    SendFup,
}

/// Slave side states.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum SlaveState {
    /// Not running (link down or master-only).
    #[default]
    NotEnabled,
    /// Resynchronizing: the next Sync is consumed without processing.
    Discard,
    /// Waiting for a Sync.
    WaitingForSync,
    /// Sync seen, waiting for its Follow_Up.
    WaitingForFup,
}

/// One sync machine.
pub(crate) struct SyncMachine {
    /// Port the machine operates on.
    pub port: u8,
    /// Configuration-fixed role.
    pub role: SyncRole,
    pub master_state: MasterState,
    pub slave_state: SlaveState,
    /// Configured initial Sync interval.
    pub init_interval_log: i8,
    /// Operational interval: the configured target used by the signaling scan.
    pub oper_interval_log: i8,
    /// Currently effective interval (slave: of the ingress Syncs).
    pub interval_log: i8,
    /// Sequence id of the exchange in flight.
    pub sequence_id: u16,
    /// Cumulative rate ratio of the GM clock to the local clock.
    pub rate_ratio: f64,
    /// correctionField in 48.16 sub-nanoseconds.
    pub correction_subns: u64,
    /// Mean upstream propagation delay in nanoseconds.
    pub mean_prop_delay_ns: u32,
    /// GM egress time of the upstream Sync mapped onto the local timebase.
    pub upstream_tx_time: Timestamp,
    /// TR: ingress timestamp of the last Sync (slave).
    pub ingress_ts: Timestamp,
    /// TS: captured egress timestamp of the last Sync (master).
    pub egress_ts: Timestamp,
    /// Sequence id the egress timestamp belongs to.
    pub egress_seq_id: u16,
    /// An egress timestamp is registered and unconsumed.
    pub egress_registered: bool,
    /// preciseOriginTimestamp of the last accepted Follow_Up.
    pub precise_origin_rcvd: Timestamp,
    /// Clock identity of the Grand Master, taken from the last accepted Follow_Up and forwarded
    /// as the source identity of cascaded Syncs.
    pub upstream_clock_id: u64,
    /// Source identity used by the last emitted Sync, repeated in its Follow_Up.
    pub sync_source_identity: PortIdentity,
    /// Whether the periodic Sync timer runs for this machine.
    pub timer_enabled: bool,
    /// Next Sync send deadline (free-running nanoseconds).
    pub send_due_ns: u64,
    /// Residence measurement start; zero when idle.
    pub residence_start_ns: u64,
    /// Ingress Syncs skipped because this master runs slower than the upstream.
    pub skipped_syncs: u8,
    /// Egress descriptor of the Sync awaiting its timestamp.
    pub map_sync: TxMapEntry,
    /// Send buffer.
    pub send_buf: [u8; MAX_FRAME_LEN],
}

impl SyncMachine {
    pub(crate) fn new(port: u8, role: SyncRole, interval_log: i8) -> Self {
        Self {
            port,
            role,
            master_state: MasterState::NotEnabled,
            slave_state: SlaveState::NotEnabled,
            init_interval_log: interval_log,
            oper_interval_log: interval_log,
            interval_log,
            sequence_id: 0,
            rate_ratio: 1.0,
            correction_subns: 0,
            mean_prop_delay_ns: 0,
            upstream_tx_time: Timestamp::ZERO,
            ingress_ts: Timestamp::ZERO,
            egress_ts: Timestamp::ZERO,
            egress_seq_id: 0,
            egress_registered: false,
            precise_origin_rcvd: Timestamp::ZERO,
            upstream_clock_id: 0,
            sync_source_identity: PortIdentity::default(),
            timer_enabled: false,
            send_due_ns: 0,
            residence_start_ns: 0,
            skipped_syncs: 0,
            map_sync: TxMapEntry::new(),
            send_buf: [0; MAX_FRAME_LEN],
        }
    }

    /// Register a captured Sync egress timestamp.
    pub(crate) fn register_egress(&mut self, sequence_id: u16, egress: Timestamp) {
        self.egress_ts = egress;
        self.egress_seq_id = sequence_id;
        self.egress_registered = true;
    }
}

/// Slave-side fields a master machine needs while the slave itself cannot be borrowed.
#[derive(Debug, Copy, Clone)]
pub(crate) struct SlaveSnapshot {
    pub sequence_id: u16,
    pub rate_ratio: f64,
    pub correction_subns: u64,
    pub upstream_tx_time: Timestamp,
    pub precise_origin_rcvd: Timestamp,
    pub fup_source_clock_id: u64,
}

impl SlaveSnapshot {
    pub(crate) fn of(domain: &Domain) -> Self {
        let slave = &domain.machines[domain.slave_machine];

        Self {
            sequence_id: slave.sequence_id,
            rate_ratio: slave.rate_ratio,
            correction_subns: slave.correction_subns,
            upstream_tx_time: slave.upstream_tx_time,
            precise_origin_rcvd: slave.precise_origin_rcvd,
            fup_source_clock_id: slave.upstream_clock_id,
        }
    }
}

/// Copies of the per-port neighbor values a slave machine computes with.
#[derive(Debug, Copy, Clone)]
pub(crate) struct NeighborSnapshot {
    /// Filtered neighbor rate ratio.
    pub rate_ratio: f64,
    /// Filtered neighbor propagation delay in nanoseconds.
    pub prop_delay_ns: f64,
    /// Configured link asymmetry in nanoseconds.
    pub asymmetry_ns: i16,
}

/// Emit one Sync from a master machine.
///
/// On a bridge domain the Sync mirrors the slave's sequence id and, once a valid upstream pair
/// has been seen, forwards the Grand Master's clock identity with port id 0.
pub(crate) fn master_send_sync<E: Hardware>(
    ctx: &mut Ctx<'_, E>,
    domain: &mut Domain,
    machine_idx: usize,
    ports: &[Port],
) {
    let slave = (!domain.is_gm).then(|| SlaveSnapshot::of(domain));

    let domain_idx = domain.index;
    let domain_number = domain.number;
    let valid_ever = domain.sync_valid_ever_received;
    let acting_gm = domain.acting_gm;
    let vlan_tci = ctx.vlan(domain.vlan_tci);

    let machine = &mut domain.machines[machine_idx];
    let port = &ports[machine.port as usize];

    if !port.enabled {
        return;
    }

    if machine.master_state == MasterState::NotEnabled {
        machine.master_state = MasterState::Initing;
    }

    if machine.master_state == MasterState::Initing {
        machine.egress_registered = false;
        machine.master_state = MasterState::SendSync;
    }

    let own_identity = PortIdentity {
        clock_id: port.clock_id,
        port_number: machine.port as u16 + 1,
    };

    let source_identity = if let Some(slave) = slave {
        // Bridge: reuse the upstream sequence so downstream nodes see one stream
        machine.sequence_id = slave.sequence_id;

        if valid_ever {
            PortIdentity {
                clock_id: slave.fup_source_clock_id,
                port_number: 0,
            }
        } else {
            own_identity
        }
    } else {
        machine.sequence_id = machine.sequence_id.wrapping_add(1);

        own_identity
    };

    let meta = FrameMeta {
        dest: EthernetAddress::PTP_MULTICAST,
        source: port.source_mac,
        vlan_tci,
        domain_number,
        sequence_id: machine.sequence_id,
        source_port_identity: source_identity,
        log_message_interval: machine.interval_log,
        correction_subns: 0,
        major_sdo_id: TRANSPORT_SPECIFIC_1,
    };

    let route = TxRoute {
        port: machine.port,
        machine: machine_idx as u8,
        domain: Some(domain_idx),
        acting_gm,
    };

    machine.sync_source_identity = source_identity;

    let _ = ctx.transmit(
        &meta,
        &Payload::Sync,
        route,
        &mut machine.send_buf,
        Some(&mut machine.map_sync),
    );

    machine.master_state = MasterState::SendFup;
}

/// Complete a master exchange: the Sync egress timestamp arrived, build and send the Follow_Up.
///
/// `ref_rate_ratio` carries the reference domain's slave rate ratio for synced-GM domains.
pub(crate) fn master_on_egress_timestamp<E: Hardware>(
    ctx: &mut Ctx<'_, E>,
    dev: &DeviceState,
    domain: &mut Domain,
    machine_idx: usize,
    ports: &[Port],
    ref_rate_ratio: Option<f64>,
) {
    let slave = (!domain.is_gm).then(|| SlaveSnapshot::of(domain));

    let domain_idx = domain.index;

    {
        let machine = &domain.machines[machine_idx];

        let ready = machine.master_state == MasterState::SendFup
            && machine.egress_registered
            && machine.sequence_id == machine.egress_seq_id;

        if !ready {
            if !machine.egress_registered {
                ctx.errs.register(
                    Error::Timestamp(TimestampError::NotRegistered),
                    Some(machine.port),
                    Some(domain_idx),
                    Some(machine.sequence_id),
                );
            }

            if machine.master_state != MasterState::SendFup {
                ctx.errs.register(
                    Error::Sync(SyncError::MachineState),
                    Some(machine.port),
                    Some(domain_idx),
                    Some(machine.sequence_id),
                );
            }

            if machine.sequence_id != machine.egress_seq_id {
                ctx.errs.register(
                    Error::Sync(SyncError::IncorrectTimestamp),
                    Some(machine.port),
                    Some(domain_idx),
                    Some(machine.sequence_id),
                );
            }

            return;
        }
    }

    // Rate ratio towards downstream per role
    let rate_ratio = if domain.synced_gm {
        if domain.reference_domain_index == domain.index {
            1.0
        } else {
            ref_rate_ratio.unwrap_or(1.0)
        }
    } else if let Some(slave) = &slave {
        slave.rate_ratio
    } else {
        1.0
    };

    // Correction field and precise origin per role
    let (correction_subns, precise_origin) = if let Some(slave) = &slave {
        if !domain.acting_gm {
            // Bridge: accumulate this node's residence time, scaled by the rate ratio, on top of
            // the upstream correction
            let machine = &domain.machines[machine_idx];

            let residence_ns = machine
                .egress_ts
                .checked_sub(slave.upstream_tx_time)
                .map(Timestamp::as_ns)
                .unwrap_or_else(|_| {
                    ctx.errs.register(
                        Error::InvalidTimestamp,
                        Some(machine.port),
                        Some(domain_idx),
                        Some(machine.sequence_id),
                    );

                    0
                });

            let scaled = (residence_ns as f64 * rate_ratio) as u64;

            (
                slave.correction_subns.wrapping_add(scaled << 16),
                slave.precise_origin_rcvd,
            )
        } else {
            // Acting GM: no origin yet, the correction field carries the raw egress time
            let machine = &domain.machines[machine_idx];

            (machine.egress_ts.as_ns().wrapping_shl(16), Timestamp::ZERO)
        }
    } else if domain.synced_gm {
        // Synced GM: map the free-running egress capture onto the corrected clock
        let machine = &domain.machines[machine_idx];

        let precise_origin = match ctx.hw.current_time_pair() {
            Ok((free_run, corrected)) => {
                let since_egress = free_run.as_ns().saturating_sub(machine.egress_ts.as_ns());

                Timestamp::from_ns(corrected.as_ns().saturating_sub(since_egress))
            }
            Err(_) => Timestamp::ZERO,
        };

        (0, precise_origin)
    } else {
        // Plain GM: the egress capture is the precise origin
        (0, domain.machines[machine_idx].egress_ts)
    };

    if domain.is_gm {
        // The GM reports its own time base; bridges forward the upstream TLV fields
        domain.gm_time_base_indicator = dev.time_base.indicator;
        domain.last_gm_phase_change_h = dev.time_base.phase_change_h();
        domain.last_gm_phase_change_l = dev.time_base.phase_change_l();
        domain.scaled_last_gm_freq_change = dev.time_base.scaled_freq_change();
    }

    let vlan_tci = ctx.vlan(domain.vlan_tci);
    let domain_number = domain.number;
    let acting_gm = domain.acting_gm;
    let is_gm = domain.is_gm;

    let gm_time_base_indicator = domain.gm_time_base_indicator;
    let last_gm_phase_change_h = domain.last_gm_phase_change_h;
    let last_gm_phase_change_l = domain.last_gm_phase_change_l;
    let scaled_last_gm_freq_change = domain.scaled_last_gm_freq_change;

    let machine = &mut domain.machines[machine_idx];

    machine.egress_registered = false;
    machine.rate_ratio = rate_ratio;
    machine.correction_subns = correction_subns;

    let meta = FrameMeta {
        dest: EthernetAddress::PTP_MULTICAST,
        source: ports[machine.port as usize].source_mac,
        vlan_tci,
        domain_number,
        sequence_id: machine.sequence_id,
        source_port_identity: machine.sync_source_identity,
        log_message_interval: machine.interval_log,
        correction_subns,
        major_sdo_id: TRANSPORT_SPECIFIC_1,
    };

    let payload = Payload::FollowUp {
        precise_origin,
        rate_ratio,
        gm_time_base_indicator,
        last_gm_phase_change_h,
        last_gm_phase_change_l,
        scaled_last_gm_freq_change,
    };

    let route = TxRoute {
        port: machine.port,
        machine: machine_idx as u8,
        domain: Some(domain_idx),
        acting_gm,
    };

    let _ = ctx.transmit(&meta, &payload, route, &mut machine.send_buf, None);

    machine.master_state = MasterState::SendSync;

    // Close the residence measurement opened by the triggering ingress Sync
    if !is_gm && machine.residence_start_ns != 0 {
        let now = ctx.now_free_ns();

        if now.saturating_sub(machine.residence_start_ns) > TEN_MS_IN_NS {
            ctx.errs.register(
                Error::Limit(crate::error::LimitError::ResidenceTooLong),
                Some(machine.port),
                Some(domain_idx),
                Some(machine.sequence_id),
            );
        }

        machine.residence_start_ns = 0;
    }
}

/// Slave: a Sync arrived on this machine's port.
pub(crate) fn slave_rx_sync<E: Hardware>(
    ctx: &mut Ctx<'_, E>,
    dev: &mut DeviceState,
    pi: &mut PiController,
    domain: &mut Domain,
    machine_idx: usize,
    sequence_id: u16,
    log_message_interval: i8,
    ingress: Timestamp,
    vlan_tci: Option<u16>,
    ports: &[Port],
) {
    let now_ns = ctx.now_free_ns();

    let state = domain.machines[machine_idx].slave_state;

    match state {
        SlaveState::NotEnabled | SlaveState::Discard => {
            // Consume this Sync to resynchronize the pairing
            domain.machines[machine_idx].slave_state = SlaveState::WaitingForSync;
        }
        SlaveState::WaitingForSync => {
            {
                let machine = &mut domain.machines[machine_idx];

                machine.ingress_ts = ingress;
                machine.interval_log = log_message_interval;
                machine.sequence_id = sequence_id;
                machine.slave_state = SlaveState::WaitingForFup;
            }

            if let Some(tci) = vlan_tci {
                domain.vlan_tci = tci;
            }

            let slave_interval = domain.machines[machine_idx].interval_log;

            domain.register_valid_sync(now_ns, slave_interval);

            // Open the residence measurement on every enabled master under this domain
            let free_now = now_ns;

            for machine in domain.machines.iter_mut() {
                if machine.role == SyncRole::Master && ports[machine.port as usize].enabled {
                    machine.residence_start_ns = free_now;
                }
            }
        }
        SlaveState::WaitingForFup => {
            // A second Sync without the Follow_Up in between: restart the pairing on the new
            // sequence and treat the broken pair as loss of sync
            let lost_seq = domain.machines[machine_idx].sequence_id;

            {
                let machine = &mut domain.machines[machine_idx];

                machine.ingress_ts = ingress;
                machine.interval_log = log_message_interval;
            }

            engine::los_handle(ctx.hw, ctx.errs, dev, pi, domain, machine_idx as u8, Some(lost_seq));

            domain.machines[machine_idx].sequence_id = sequence_id;

            #[cfg(feature = "counters")]
            {
                ctx.stats.discard(
                    domain.index,
                    machine_idx as u8,
                    domain.machines[machine_idx].port,
                );
            }
        }
    }
}

/// Slave: a Follow_Up arrived. Returns `true` when a valid pair completed and the cascaded
/// master machines should forward it.
#[allow(clippy::too_many_arguments)]
pub(crate) fn slave_rx_fup<E: Hardware>(
    ctx: &mut Ctx<'_, E>,
    dev: &mut DeviceState,
    pi: &mut PiController,
    domain: &mut Domain,
    machine_idx: usize,
    fup: &crate::frame::FollowUpMessage,
    neighbor: NeighborSnapshot,
) -> bool {
    let state = domain.machines[machine_idx].slave_state;

    match state {
        SlaveState::NotEnabled | SlaveState::Discard => {
            domain.machines[machine_idx].slave_state = SlaveState::WaitingForSync;

            false
        }
        SlaveState::WaitingForSync => false,
        SlaveState::WaitingForFup => {
            if fup.header.sequence_id != domain.machines[machine_idx].sequence_id {
                let seq = domain.machines[machine_idx].sequence_id;

                domain.machines[machine_idx].slave_state = SlaveState::Discard;

                engine::los_handle(ctx.hw, ctx.errs, dev, pi, domain, machine_idx as u8, Some(seq));

                #[cfg(feature = "counters")]
                {
                    ctx.stats.discard(
                        domain.index,
                        machine_idx as u8,
                        domain.machines[machine_idx].port,
                    );
                }

                return false;
            }

            process_follow_up(ctx, dev, pi, domain, machine_idx, fup, neighbor);

            domain.machines[machine_idx].slave_state = SlaveState::WaitingForSync;

            true
        }
    }
}

/// The accepted Sync/Follow_Up pair: compute the domain rate ratio, the GM offset, run outlier
/// rejection and drive the clock servo.
fn process_follow_up<E: Hardware>(
    ctx: &mut Ctx<'_, E>,
    dev: &mut DeviceState,
    pi: &mut PiController,
    domain: &mut Domain,
    machine_idx: usize,
    fup: &crate::frame::FollowUpMessage,
    neighbor: NeighborSnapshot,
) {
    let domain_idx = domain.index;
    let domain_number = domain.number;
    let is_slave_role = domain.machines[machine_idx].role == SyncRole::Slave;
    let is_gm_domain = domain.is_gm;

    // Domain-level TLV state forwarded by cascaded masters
    domain.gm_time_base_indicator = fup.gm_time_base_indicator;
    domain.last_gm_phase_change_h = fup.last_gm_phase_change_h;
    domain.last_gm_phase_change_l = fup.last_gm_phase_change_l;
    domain.scaled_last_gm_freq_change = fup.scaled_last_gm_freq_change;

    domain.sync_valid_ever_received = true;

    let (sequence_id, tr, gm_plus_corr, upstream_tx_time, rate_ratio, interval_log) = {
        let machine = &mut domain.machines[machine_idx];

        machine.rate_ratio = fup.rate_ratio + (neighbor.rate_ratio - 1.0);
        machine.correction_subns = fup.header.correction_subns;
        machine.upstream_clock_id = fup.header.source_port_identity.clock_id;

        if neighbor.rate_ratio != 0.0 && machine.rate_ratio != 0.0 {
            let mean =
                (neighbor.prop_delay_ns + f64::from(neighbor.asymmetry_ns)) / neighbor.rate_ratio;

            machine.mean_prop_delay_ns = if mean < 0.0 { 0 } else { mean as u32 };
        } else {
            // Keep the previous mean propagation delay
            ctx.errs.register(
                Error::DivisionByZero,
                Some(machine.port),
                Some(domain_idx),
                Some(machine.sequence_id),
            );
        }

        machine.upstream_tx_time = machine
            .ingress_ts
            .checked_sub_ns(u64::from(machine.mean_prop_delay_ns))
            .unwrap_or_else(|_| {
                ctx.errs.register(
                    Error::InvalidTimestamp,
                    Some(machine.port),
                    Some(domain_idx),
                    Some(machine.sequence_id),
                );

                Timestamp::ZERO
            });

        let correction_ns = machine.correction_subns >> 16;
        let gm_plus_corr = fup.precise_origin.add_ns(correction_ns);

        machine.precise_origin_rcvd = fup.precise_origin;

        (
            machine.sequence_id,
            machine.ingress_ts,
            gm_plus_corr,
            machine.upstream_tx_time,
            machine.rate_ratio,
            machine.interval_log,
        )
    };

    if is_gm_domain || !is_slave_role {
        return;
    }

    // GM stall: the precise origin froze while the correction field keeps growing
    if domain.prev_precise_origin == fup.precise_origin {
        let correction_ns = fup.header.correction_subns >> 16;

        if correction_ns > log_interval_to_ns(crate::config::LOG_SYNC_INTERVAL_MAX) * 2 {
            if !domain.gm_failure_reported {
                ctx.errs
                    .register(Error::GmFailure, None, Some(domain_number), None);

                domain.gm_failure_reported = true;
            }
        } else {
            domain.gm_failure_reported = false;
        }
    }

    domain.prev_precise_origin = fup.precise_origin;

    // Outlier rejection: compare against the time extrapolated from the last accepted pair
    let since_last_valid = tr
        .checked_sub(domain.last_valid_ts_of_gm_plus_corr)
        .unwrap_or(Timestamp::ZERO);

    let expected = domain
        .last_valid_gm_plus_corr
        .add_ns(since_last_valid.as_ns());

    let deviation_ns = expected
        .as_signed()
        .sub(gm_plus_corr.as_signed())
        .abs_ns();

    let accept = deviation_ns < u64::from(domain.outlier_threshold_ns)
        || domain.outlier_cnt >= domain.outlier_ignore_cnt
        || !domain.rcvd_sync_used_for_local_clk;

    if accept {
        let (offset, negative) = calculate_offset(upstream_tx_time, gm_plus_corr);

        engine::update_sync_lock(ctx.hw, dev, offset.as_ns());

        let machine_port = domain.machines[machine_idx].port;

        match engine::update_local_clock(
            ctx.hw,
            ctx.errs,
            dev,
            pi,
            domain_number,
            rate_ratio,
            offset,
            negative,
            interval_log,
        ) {
            Ok(updated) => domain.rcvd_sync_used_for_local_clk = updated,
            Err(e) => {
                ctx.errs
                    .register(e, Some(machine_port), Some(domain_idx), Some(sequence_id));
            }
        }

        dev.last_free_run_ref = tr;
        domain.last_valid_gm_plus_corr = gm_plus_corr;
        domain.last_valid_ts_of_gm_plus_corr = tr;
        domain.outlier_cnt = 0;
    } else {
        domain.outlier_cnt += 1;

        fmt::debug!(
            "Sync outlier on domain {}: deviation {} ns",
            domain_number,
            deviation_ns
        );

        // Hold the clock at the current rate so it keeps running smoothly through the outlier
        if dev.ever_updated {
            if let Err(e) = engine::fix_local_clock(ctx.hw, dev) {
                let machine_port = domain.machines[machine_idx].port;

                ctx.errs
                    .register(e, Some(machine_port), Some(domain_idx), Some(sequence_id));
            }
        }
    }
}

/// Offset between the upstream transmission time mapped onto the local clock and the GM time, as
/// a magnitude plus direction. `negative` means the local clock is ahead of the Grand Master.
pub(crate) fn calculate_offset(
    upstream_tx_time: Timestamp,
    gm_time: Timestamp,
) -> (TimestampSigned, bool) {
    let diff = gm_time.as_signed().sub(upstream_tx_time.as_signed());

    let negative = diff.seconds < 0 || (diff.seconds == 0 && diff.nanoseconds < 0);

    let magnitude = TimestampSigned {
        seconds: diff.seconds.abs(),
        nanoseconds: diff.nanoseconds.abs(),
    };

    (magnitude, negative)
}

/// Reset a machine's protocol state on link-down.
pub(crate) fn reset_on_link_down(machine: &mut SyncMachine) {
    machine.master_state = MasterState::NotEnabled;
    machine.slave_state = SlaveState::NotEnabled;
    machine.timer_enabled = false;
    machine.egress_registered = false;
    machine.residence_start_ns = 0;
    machine.map_sync.reset();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_direction() {
        // GM ahead of us: positive offset, clock must step forward
        let (offset, negative) =
            calculate_offset(Timestamp::new(100, 0), Timestamp::new(100, 250));

        assert_eq!(offset.as_ns(), 250);
        assert!(!negative);

        // We are ahead of GM
        let (offset, negative) =
            calculate_offset(Timestamp::new(100, 500), Timestamp::new(100, 250));

        assert_eq!(offset.as_ns(), 250);
        assert!(negative);
    }

    #[test]
    fn offset_across_second_boundary() {
        let (offset, negative) =
            calculate_offset(Timestamp::new(99, 999_999_900), Timestamp::new(100, 100));

        assert_eq!(offset.as_ns(), 200);
        assert!(!negative);
    }
}
