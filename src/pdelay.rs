//! Peer delay measurement.
//!
//! One machine per port runs the Pdelay initiator and responder in parallel. The initiator sends
//! Pdelay_Req, collects the four exchange timestamps (T1 its own egress, T2/T3 the peer's ingress
//! and egress carried back in Pdelay_Resp/Pdelay_Resp_Follow_Up, T4 the response ingress) and
//! maintains exponentially averaged estimates of the link propagation delay and the neighbor
//! clock rate ratio. Learned values survive power cycles through the NVM store.

use crate::{
    config::PortConfig,
    engine::{Ctx, TxRoute},
    error::{Error, FrameError, LimitError, NvmError, PdelayError, TimestampError},
    ethernet::EthernetAddress,
    fmt,
    frame::{
        FrameMeta, MAX_FRAME_LEN, Payload, PdelayRespFupMessage, PdelayRespMessage, PortIdentity,
        TRANSPORT_SPECIFIC_1,
    },
    hardware::{Hardware, NvmKind, NvmWriteState},
    port::Port,
    time::{TEN_MS_IN_NS, Timestamp, f64_abs},
    tx_map::TxMapEntry,
};

/// Initiator states.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum InitiatorState {
    /// Not running.
    #[default]
    NotEnabled,
    /// First request of a measurement series.
    InitialSendReq,
    /// Request sent, waiting for the response.
    WaitingForResp,
    /// Response seen, waiting for its follow-up.
    WaitingForRespFup,
    /// Exchange complete, waiting out the interval.
    WaitingForInterval,
    /// Ready to send the next request.
    SendReq,
    /// Measurement series restart after lost responses.
    Reset,
}

/// Responder states.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ResponderState {
    /// Not running.
    #[default]
    NotEnabled,
    /// Waiting for the first request.
    InitWaiting,
    /// Response sent, waiting for its egress timestamp to build the follow-up.
    SentRespWaitingTs,
    /// Waiting for the next request.
    WaitingForReq,
}

/// What the responder keeps of a received Pdelay_Req until the Pdelay_Resp_Follow_Up went out.
#[derive(Debug, Default, Copy, Clone)]
struct PendingRequest {
    /// Requester's source identity.
    requesting: PortIdentity,
    /// Requester's MAC for optional unicast responses.
    source_mac: EthernetAddress,
    /// Our ingress timestamp of the request (the peer's T2).
    ingress: Timestamp,
    /// Sequence id of the request.
    sequence_id: u16,
    /// majorSdoId of the request, echoed in compatibility mode.
    major_sdo_id: u8,
}

/// One per-port Pdelay machine.
pub(crate) struct PdelayMachine {
    /// The port this machine measures.
    pub port: u8,
    pub initiator_state: InitiatorState,
    pub responder_state: ResponderState,
    /// Initiator enabled by configuration and link state.
    pub initiator_enabled: bool,
    /// Configured value restored on link-up.
    pub initiator_enabled_cfg: bool,
    /// Responder runs whenever the link is up.
    pub responder_enabled: bool,
    /// Whether the periodic initiator timer runs.
    pub timer_enabled: bool,
    /// Address Pdelay responses to the requester's unicast MAC.
    pub unicast_resp: bool,
    /// Filtered neighbor propagation delay in nanoseconds.
    pub neighbor_prop_delay: f64,
    /// Latest filtered value, promoted into `neighbor_prop_delay` once the measurement series
    /// stabilizes.
    neighbor_prop_delay_current: f64,
    /// Filtered neighbor rate ratio.
    pub neighbor_rate_ratio: f64,
    neighbor_rate_ratio_current: f64,
    /// `neighbor_prop_delay` holds a trusted value.
    pub prop_delay_valid: bool,
    /// `neighbor_rate_ratio` holds a trusted value.
    pub rate_ratio_valid: bool,
    rate_ratio_valid_current: bool,
    prop_delay_averager_initialized: bool,
    rate_ratio_averager_initialized: bool,
    /// T1: egress timestamp of our Pdelay_Req.
    t1: Timestamp,
    t1_registered: bool,
    t1_sequence_id: u16,
    /// T1/T2 of the previous exchange for the rate ratio quotient.
    prev_t1: Timestamp,
    prev_t2: Timestamp,
    have_prev: bool,
    /// T2 and T4 of the exchange in flight.
    t2: Timestamp,
    t4: Timestamp,
    /// T3 from the peer's Pdelay_Resp_Follow_Up.
    t3: Timestamp,
    /// Sequence id of the request in flight.
    pub sequence_id: u16,
    /// Sequence id of the last accepted Pdelay_Resp, for double-response detection.
    last_resp_sequence_id: u16,
    /// Consecutive lost responses.
    pub lost_responses: u16,
    /// Allowance before the measurement series resets.
    pub allowed_lost_responses: u16,
    /// Accepted measurements before the interval slows to operational.
    pub measurements_till_slow_down: u16,
    /// Accepted measurements so far.
    pub responses_cnt: u16,
    /// Initial and operational intervals, log₂.
    pub interval_log_init: i8,
    pub interval_log_oper: i8,
    /// Currently effective interval.
    pub interval_log: i8,
    /// Acceptance ceiling for computed delays, nanoseconds.
    pub prop_delay_threshold_ns: u64,
    /// Configured link asymmetry, nanoseconds.
    pub asymmetry_ns: i16,
    /// NVM record addresses.
    pub nvm_address_pdelay: u32,
    pub nvm_address_rratio: u32,
    /// Asynchronous NVM write state per stored value.
    pub nvm_write_pdelay: NvmWriteState,
    pub nvm_write_rratio: NvmWriteState,
    /// Values staged for writing.
    pdelay_to_write: f64,
    rratio_to_write: f64,
    /// Next request deadline (free-running nanoseconds).
    pub send_due_ns: u64,
    /// Turnaround watchdog start points; zero when idle.
    pub turnaround_start_init_ns: u64,
    pub turnaround_start_resp_ns: u64,
    /// Request pending on the responder side.
    pending_request: PendingRequest,
    /// Egress descriptors.
    pub map_req: TxMapEntry,
    pub map_resp: TxMapEntry,
    /// Send buffer shared by the three message kinds.
    send_buf: [u8; MAX_FRAME_LEN],
}

impl PdelayMachine {
    pub(crate) fn new(port: u8, config: &PortConfig) -> Self {
        Self {
            port,
            initiator_state: InitiatorState::NotEnabled,
            responder_state: ResponderState::NotEnabled,
            initiator_enabled: config.pdelay_initiator_enabled,
            initiator_enabled_cfg: config.pdelay_initiator_enabled,
            responder_enabled: false,
            timer_enabled: false,
            unicast_resp: config.pdelay_unicast_resp,
            neighbor_prop_delay: 0.0,
            neighbor_prop_delay_current: 0.0,
            neighbor_rate_ratio: 1.0,
            neighbor_rate_ratio_current: 1.0,
            prop_delay_valid: false,
            rate_ratio_valid: false,
            rate_ratio_valid_current: false,
            prop_delay_averager_initialized: false,
            rate_ratio_averager_initialized: false,
            t1: Timestamp::ZERO,
            t1_registered: false,
            t1_sequence_id: 0,
            prev_t1: Timestamp::ZERO,
            prev_t2: Timestamp::ZERO,
            have_prev: false,
            t2: Timestamp::ZERO,
            t4: Timestamp::ZERO,
            t3: Timestamp::ZERO,
            sequence_id: 0,
            last_resp_sequence_id: 0,
            lost_responses: 0,
            allowed_lost_responses: config.allowed_lost_responses,
            measurements_till_slow_down: config.measurements_till_slow_down,
            responses_cnt: 0,
            interval_log_init: config.pdelay_interval_log_init,
            interval_log_oper: config.pdelay_interval_log_oper,
            interval_log: config.pdelay_interval_log_init,
            prop_delay_threshold_ns: config.neighbor_prop_delay_thresh_ns,
            asymmetry_ns: config.delay_asymmetry_ns,
            nvm_address_pdelay: config.nvm_address_pdelay,
            nvm_address_rratio: config.nvm_address_rratio,
            nvm_write_pdelay: NvmWriteState::Stop,
            nvm_write_rratio: NvmWriteState::Stop,
            pdelay_to_write: 0.0,
            rratio_to_write: 1.0,
            send_due_ns: 0,
            turnaround_start_init_ns: 0,
            turnaround_start_resp_ns: 0,
            pending_request: PendingRequest::default(),
            map_req: TxMapEntry::new(),
            map_resp: TxMapEntry::new(),
            send_buf: [0; MAX_FRAME_LEN],
        }
    }

    /// Validate a propagation delay candidate against the configured threshold. NaN never passes.
    fn prop_delay_plausible(&self, delay: f64) -> bool {
        f64_abs(delay) < self.prop_delay_threshold_ns as f64 && delay == delay
    }

    /// Reset the measurement series back to square one.
    fn reset_series(&mut self) {
        self.prop_delay_averager_initialized = false;
        self.rate_ratio_averager_initialized = false;
        self.have_prev = false;
        self.responses_cnt = 0;
        self.interval_log = self.interval_log_init;
    }
}

/// Validate a rate ratio candidate, snapping implausible values back to 1.0.
pub(crate) fn rate_ratio_plausible(max_dev: f64, ratio: &mut f64) -> bool {
    if f64_abs(1.0 - *ratio) < max_dev {
        true
    } else {
        *ratio = 1.0;
        false
    }
}

/// Load one persisted value, replacing garbage with the neutral element.
pub(crate) fn nvm_load<E: Hardware>(
    ctx: &mut Ctx<'_, E>,
    machine: &mut PdelayMachine,
    kind: NvmKind,
    rratio_max_dev: f64,
) {
    let address = match kind {
        NvmKind::PropDelay => machine.nvm_address_pdelay,
        NvmKind::RateRatio => machine.nvm_address_rratio,
    };

    let value = match ctx.hw.nvm_read(machine.port, kind, address) {
        Ok(value) => value,
        Err(_) => {
            ctx.errs.register(
                Error::Nvm(NvmError::Read),
                Some(machine.port),
                None,
                None,
            );

            return;
        }
    };

    match kind {
        NvmKind::PropDelay => {
            machine.neighbor_prop_delay = value;
            machine.prop_delay_valid = machine.prop_delay_plausible(value);

            if !machine.prop_delay_valid {
                // Stored value is above the threshold or NaN
                machine.neighbor_prop_delay = 0.0;
            }
        }
        NvmKind::RateRatio => {
            machine.neighbor_rate_ratio = value;
            machine.rate_ratio_valid =
                rate_ratio_plausible(rratio_max_dev, &mut machine.neighbor_rate_ratio);
        }
    }
}

/// Push one staged value if its write state machine asks for it.
pub(crate) fn nvm_store<E: Hardware>(ctx: &mut Ctx<'_, E>, machine: &mut PdelayMachine, kind: NvmKind) {
    let (state, value, address) = match kind {
        NvmKind::PropDelay => (
            &mut machine.nvm_write_pdelay,
            machine.pdelay_to_write,
            machine.nvm_address_pdelay,
        ),
        NvmKind::RateRatio => (
            &mut machine.nvm_write_rratio,
            machine.rratio_to_write,
            machine.nvm_address_rratio,
        ),
    };

    match state {
        NvmWriteState::Stop => {}
        NvmWriteState::Init => {
            if ctx
                .hw
                .nvm_write(machine.port, kind, address, value, state)
                .is_err()
            {
                ctx.errs.register(
                    Error::Nvm(NvmError::Write),
                    Some(machine.port),
                    None,
                    None,
                );

                *state = NvmWriteState::Stop;
            }
        }
        NvmWriteState::Finish => {
            *state = NvmWriteState::Stop;
        }
    }
}

/// Periodic initiator service: give up on a response still outstanding from the previous period,
/// then send the next Pdelay_Req.
pub(crate) fn initiate<E: Hardware>(ctx: &mut Ctx<'_, E>, machine: &mut PdelayMachine, ports: &[Port]) {
    if !ports[machine.port as usize].enabled || !machine.initiator_enabled {
        return;
    }

    // A response (or its follow-up) never arrived within the whole interval
    if matches!(
        machine.initiator_state,
        InitiatorState::WaitingForResp | InitiatorState::WaitingForRespFup
    ) {
        machine.initiator_state = InitiatorState::Reset;
        machine.lost_responses = machine.lost_responses.saturating_add(1);
        machine.rate_ratio_valid_current = false;

        if machine.lost_responses > machine.allowed_lost_responses {
            machine.reset_series();
            machine.lost_responses = 0;

            ctx.errs.register(
                Error::Pdelay(PdelayError::TooManyLostResponses),
                Some(machine.port),
                None,
                Some(machine.sequence_id),
            );

            #[cfg(feature = "counters")]
            ctx.stats.lost_responses_exceeded(machine.port);
        }
    }

    machine.sequence_id = machine.sequence_id.wrapping_add(1);
    machine.t1_registered = false;

    let port = &ports[machine.port as usize];

    let meta = FrameMeta {
        dest: EthernetAddress::PTP_MULTICAST,
        source: port.source_mac,
        vlan_tci: ctx.vlan(ctx.device_vlan_tci),
        domain_number: 0,
        sequence_id: machine.sequence_id,
        source_port_identity: PortIdentity {
            clock_id: port.clock_id,
            port_number: machine.port as u16 + 1,
        },
        log_message_interval: machine.interval_log,
        correction_subns: 0,
        major_sdo_id: TRANSPORT_SPECIFIC_1,
    };

    let route = TxRoute {
        port: machine.port,
        machine: machine.port,
        domain: None,
        acting_gm: false,
    };

    if ctx
        .transmit(
            &meta,
            &Payload::PdelayReq,
            route,
            &mut machine.send_buf,
            Some(&mut machine.map_req),
        )
        .is_ok()
    {
        machine.turnaround_start_init_ns = ctx.now_free_ns();
        machine.initiator_state = InitiatorState::WaitingForResp;
    }
}

/// Initiator: the egress timestamp of our Pdelay_Req arrived (T1).
pub(crate) fn on_req_egress_timestamp(
    machine: &mut PdelayMachine,
    sequence_id: u16,
    egress: Timestamp,
) {
    machine.t1 = egress;
    machine.t1_sequence_id = sequence_id;
    machine.t1_registered = true;
}

/// Initiator: a Pdelay_Resp arrived.
pub(crate) fn on_resp<E: Hardware>(
    ctx: &mut Ctx<'_, E>,
    machine: &mut PdelayMachine,
    ports: &[Port],
    msg: &PdelayRespMessage,
    ingress: Timestamp,
) {
    // The same response delivered twice
    if msg.header.sequence_id == machine.last_resp_sequence_id {
        ctx.errs.register(
            Error::Frame(FrameError::DoubleResponse),
            Some(machine.port),
            None,
            Some(msg.header.sequence_id),
        );

        return;
    }

    if machine.initiator_state != InitiatorState::WaitingForResp {
        return;
    }

    let port = &ports[machine.port as usize];

    let ours = msg.header.sequence_id == machine.sequence_id
        && msg.requesting.clock_id == port.clock_id
        && msg.requesting.port_number == machine.port as u16 + 1;

    if !ours {
        ctx.errs.register(
            Error::Frame(FrameError::IdentifierMismatch),
            Some(machine.port),
            None,
            Some(msg.header.sequence_id),
        );

        return;
    }

    machine.last_resp_sequence_id = msg.header.sequence_id;
    machine.t2 = msg.request_receipt;
    machine.t4 = ingress;
    machine.initiator_state = InitiatorState::WaitingForRespFup;
}

/// Initiator: the Pdelay_Resp_Follow_Up closed the exchange; compute rate ratio and propagation
/// delay.
pub(crate) fn on_resp_fup<E: Hardware>(
    ctx: &mut Ctx<'_, E>,
    machine: &mut PdelayMachine,
    ports: &[Port],
    msg: &PdelayRespFupMessage,
    pdelay_avg_weight: f64,
    rratio_avg_weight: f64,
    rratio_max_dev: f64,
    pdelay_nvm_thr: f64,
    rratio_nvm_thr: f64,
) {
    if machine.initiator_state != InitiatorState::WaitingForRespFup || !machine.t1_registered {
        return;
    }

    let port = &ports[machine.port as usize];

    let ours = msg.header.sequence_id == machine.sequence_id
        && msg.header.sequence_id == machine.t1_sequence_id
        && msg.requesting.clock_id == port.clock_id
        && msg.requesting.port_number == machine.port as u16 + 1;

    if !ours {
        ctx.errs.register(
            Error::Frame(FrameError::IdentifierMismatch),
            Some(machine.port),
            None,
            Some(msg.header.sequence_id),
        );

        return;
    }

    machine.t3 = msg.response_origin;

    // Neighbor rate ratio from two consecutive exchanges: peer elapsed over local elapsed
    if machine.have_prev {
        let peer_elapsed = machine
            .t2
            .checked_sub(machine.prev_t2)
            .map(Timestamp::as_ns)
            .unwrap_or(0);
        let local_elapsed = machine
            .t1
            .checked_sub(machine.prev_t1)
            .map(Timestamp::as_ns)
            .unwrap_or(0);

        if local_elapsed != 0 {
            let mut candidate = peer_elapsed as f64 / local_elapsed as f64;

            machine.rate_ratio_valid_current = rate_ratio_plausible(rratio_max_dev, &mut candidate);

            if machine.rate_ratio_valid_current {
                if machine.rate_ratio_averager_initialized {
                    machine.neighbor_rate_ratio_current = (rratio_avg_weight
                        * machine.neighbor_rate_ratio_current)
                        + ((1.0 - rratio_avg_weight) * candidate);
                } else {
                    machine.neighbor_rate_ratio_current = candidate;
                    machine.rate_ratio_averager_initialized = true;
                }

                if !machine.rate_ratio_valid {
                    machine.neighbor_rate_ratio = machine.neighbor_rate_ratio_current;
                }
            }
        } else {
            ctx.errs.register(
                Error::DivisionByZero,
                Some(machine.port),
                None,
                Some(msg.header.sequence_id),
            );

            machine.rate_ratio_valid_current = false;
        }
    }

    machine.prev_t1 = machine.t1;
    machine.prev_t2 = machine.t2;
    machine.have_prev = true;

    // Propagation delay over the closed exchange
    let turnaround = machine
        .t4
        .as_signed()
        .sub(machine.t1.as_signed());
    let peer_hold = machine
        .t3
        .as_signed()
        .sub(machine.t2.as_signed());

    let link_time_ns = turnaround.sub(peer_hold).as_ns();

    let delay = (machine.neighbor_rate_ratio
        * (link_time_ns as f64 + f64::from(machine.asymmetry_ns)))
        / 2.0;

    // Close the initiator turnaround watchdog
    if machine.turnaround_start_init_ns != 0 {
        if turnaround.as_ns() > TEN_MS_IN_NS as i64 {
            ctx.errs.register(
                Error::Limit(LimitError::TurnaroundInitiatorTooLong),
                Some(machine.port),
                None,
                Some(msg.header.sequence_id),
            );
        }

        machine.turnaround_start_init_ns = 0;
    }

    if machine.prop_delay_plausible(delay) {
        if machine.prop_delay_averager_initialized {
            machine.neighbor_prop_delay_current = (pdelay_avg_weight
                * machine.neighbor_prop_delay_current)
                + ((1.0 - pdelay_avg_weight) * delay);
        } else {
            machine.neighbor_prop_delay_current = delay;
            machine.prop_delay_averager_initialized = true;
        }

        if !machine.prop_delay_valid {
            machine.neighbor_prop_delay = machine.neighbor_prop_delay_current;
        }

        machine.lost_responses = 0;

        if machine.responses_cnt < machine.measurements_till_slow_down {
            machine.responses_cnt += 1;

            fmt::debug!(
                "Pdelay measurement {} on port {}: {} ns (filtered {} ns)",
                machine.responses_cnt,
                machine.port,
                delay,
                machine.neighbor_prop_delay_current
            );
        }

        if machine.responses_cnt > machine.measurements_till_slow_down {
            machine.neighbor_rate_ratio = machine.neighbor_rate_ratio_current;
            machine.neighbor_prop_delay = machine.neighbor_prop_delay_current;
        }

        // The series just stabilized: slow down and commit, persisting values that moved
        if machine.responses_cnt == machine.measurements_till_slow_down {
            machine.responses_cnt += 1;
            machine.interval_log = machine.interval_log_oper;
            machine.send_due_ns = ctx.now_free_ns() + crate::time::log_interval_to_ns(machine.interval_log);

            nvm_load(ctx, machine, NvmKind::RateRatio, rratio_max_dev);

            if f64_abs(machine.neighbor_rate_ratio_current - machine.neighbor_rate_ratio)
                >= rratio_nvm_thr
            {
                machine.rratio_to_write = machine.neighbor_rate_ratio_current;
                machine.nvm_write_rratio = NvmWriteState::Init;
            }

            machine.neighbor_rate_ratio = machine.neighbor_rate_ratio_current;
            machine.rate_ratio_valid = true;

            nvm_load(ctx, machine, NvmKind::PropDelay, rratio_max_dev);

            if f64_abs(machine.neighbor_prop_delay_current - machine.neighbor_prop_delay)
                >= pdelay_nvm_thr
            {
                machine.pdelay_to_write = machine.neighbor_prop_delay_current;
                machine.nvm_write_pdelay = NvmWriteState::Init;
            }

            machine.neighbor_prop_delay = machine.neighbor_prop_delay_current;
            machine.prop_delay_valid = true;

            fmt::info!(
                "Pdelay on port {} stabilized at {} ns after {} measurements",
                machine.port,
                machine.neighbor_prop_delay,
                machine.measurements_till_slow_down
            );
        }

        nvm_store(ctx, machine, NvmKind::PropDelay);
        nvm_store(ctx, machine, NvmKind::RateRatio);
    } else {
        machine.responses_cnt = 0;
    }

    machine.initiator_state = InitiatorState::WaitingForInterval;
}

/// Responder: a Pdelay_Req arrived; answer it with a Pdelay_Resp carrying our ingress time.
pub(crate) fn on_req<E: Hardware>(
    ctx: &mut Ctx<'_, E>,
    machine: &mut PdelayMachine,
    ports: &[Port],
    requesting: PortIdentity,
    source_mac: EthernetAddress,
    sequence_id: u16,
    major_sdo_id: u8,
    ingress: Timestamp,
) {
    if !machine.responder_enabled || !ports[machine.port as usize].enabled {
        return;
    }

    if machine.responder_state == ResponderState::NotEnabled {
        machine.responder_state = ResponderState::InitWaiting;
    }

    machine.pending_request = PendingRequest {
        requesting,
        source_mac,
        ingress,
        sequence_id,
        major_sdo_id,
    };

    let port = &ports[machine.port as usize];

    let dest = if machine.unicast_resp {
        source_mac
    } else {
        EthernetAddress::PTP_MULTICAST
    };

    // In SdoId compatibility mode the response repeats the request's transportSpecific nibble
    let major_sdo = if ctx.sdo_compatibility && major_sdo_id != TRANSPORT_SPECIFIC_1 {
        major_sdo_id
    } else {
        TRANSPORT_SPECIFIC_1
    };

    let meta = FrameMeta {
        dest,
        source: port.source_mac,
        vlan_tci: ctx.vlan(ctx.device_vlan_tci),
        domain_number: 0,
        sequence_id,
        source_port_identity: PortIdentity {
            clock_id: port.clock_id,
            port_number: machine.port as u16 + 1,
        },
        log_message_interval: 127,
        correction_subns: 0,
        major_sdo_id: major_sdo,
    };

    let payload = Payload::PdelayResp {
        request_receipt: ingress,
        requesting,
    };

    let route = TxRoute {
        port: machine.port,
        machine: machine.port,
        domain: None,
        acting_gm: false,
    };

    if ctx
        .transmit(
            &meta,
            &payload,
            route,
            &mut machine.send_buf,
            Some(&mut machine.map_resp),
        )
        .is_ok()
    {
        machine.turnaround_start_resp_ns = ctx.now_free_ns();
        machine.responder_state = ResponderState::SentRespWaitingTs;
    }
}

/// Responder: the egress timestamp of our Pdelay_Resp arrived (the peer's T3); complete the
/// exchange with a Pdelay_Resp_Follow_Up.
pub(crate) fn on_resp_egress_timestamp<E: Hardware>(
    ctx: &mut Ctx<'_, E>,
    machine: &mut PdelayMachine,
    ports: &[Port],
    sequence_id: u16,
    egress: Timestamp,
) {
    if machine.responder_state != ResponderState::SentRespWaitingTs
        || sequence_id != machine.pending_request.sequence_id
    {
        ctx.errs.register(
            Error::Timestamp(TimestampError::NotIdentified),
            Some(machine.port),
            None,
            Some(sequence_id),
        );

        return;
    }

    let port = &ports[machine.port as usize];

    let dest = if machine.unicast_resp {
        machine.pending_request.source_mac
    } else {
        EthernetAddress::PTP_MULTICAST
    };

    let major_sdo = if ctx.sdo_compatibility
        && machine.pending_request.major_sdo_id != TRANSPORT_SPECIFIC_1
    {
        machine.pending_request.major_sdo_id
    } else {
        TRANSPORT_SPECIFIC_1
    };

    let meta = FrameMeta {
        dest,
        source: port.source_mac,
        vlan_tci: ctx.vlan(ctx.device_vlan_tci),
        domain_number: 0,
        sequence_id,
        source_port_identity: PortIdentity {
            clock_id: port.clock_id,
            port_number: machine.port as u16 + 1,
        },
        log_message_interval: 127,
        correction_subns: 0,
        major_sdo_id: major_sdo,
    };

    let payload = Payload::PdelayRespFollowUp {
        response_origin: egress,
        requesting: machine.pending_request.requesting,
    };

    let route = TxRoute {
        port: machine.port,
        machine: machine.port,
        domain: None,
        acting_gm: false,
    };

    let _ = ctx.transmit(&meta, &payload, route, &mut machine.send_buf, None);

    machine.turnaround_start_resp_ns = 0;
    machine.responder_state = ResponderState::WaitingForReq;
}

/// Link-up: re-arm both sides and reload the persisted link properties.
pub(crate) fn on_link_up<E: Hardware>(ctx: &mut Ctx<'_, E>, machine: &mut PdelayMachine, rratio_max_dev: f64) {
    machine.timer_enabled = true;
    machine.initiator_enabled = machine.initiator_enabled_cfg;
    machine.responder_enabled = true;
    machine.interval_log = machine.interval_log_init;
    machine.send_due_ns = ctx.now_free_ns() + crate::time::log_interval_to_ns(machine.interval_log);

    nvm_load(ctx, machine, NvmKind::PropDelay, rratio_max_dev);
    nvm_load(ctx, machine, NvmKind::RateRatio, rratio_max_dev);

    machine.prop_delay_averager_initialized = false;
    machine.rate_ratio_averager_initialized = false;
    machine.have_prev = false;
    machine.responses_cnt = 0;
}

/// Link-down: stop both sides; outstanding TX confirmations will miss their cleared slots and be
/// discarded.
pub(crate) fn on_link_down(machine: &mut PdelayMachine) {
    machine.timer_enabled = false;
    machine.initiator_enabled = false;
    machine.responder_enabled = false;
    machine.initiator_state = InitiatorState::NotEnabled;
    machine.responder_state = ResponderState::NotEnabled;
    machine.turnaround_start_init_ns = 0;
    machine.turnaround_start_resp_ns = 0;
    machine.map_req.reset();
    machine.map_resp.reset();
}
