//! Sync interval signaling.
//!
//! A slave whose masters want a different Sync cadence than the upstream currently delivers asks
//! for a change with a Message-Interval-Request; a master receiving such a request re-times its
//! own Sync emission. Slaves never take interval changes from the wire.

use crate::{
    config::{
        INTERVAL_SET_TO_INITIAL, INTERVAL_STOP_SENDING, INTERVAL_UNCHANGED, LOG_SYNC_INTERVAL_MAX,
        LOG_SYNC_INTERVAL_MIN, SyncRole,
    },
    domain::Domain,
    engine::{Ctx, TxRoute},
    error::{Error, InitError},
    ethernet::EthernetAddress,
    fmt,
    frame::{FrameMeta, Payload, PortIdentity, TRANSPORT_SPECIFIC_1},
    hardware::Hardware,
    port::Port,
};

/// Send a Message-Interval-Request for `interval_log` upstream, signed with the slave port's
/// identity.
pub(crate) fn send_request<E: Hardware>(
    ctx: &mut Ctx<'_, E>,
    domain: &mut Domain,
    ports: &[Port],
    interval_log: i8,
) {
    let slave_port = domain.machines[domain.slave_machine].port;
    let port = &ports[slave_port as usize];

    domain.signaling_sequence_id = domain.signaling_sequence_id.wrapping_add(1);

    let source_identity = PortIdentity {
        clock_id: port.clock_id,
        port_number: slave_port as u16 + 1,
    };

    let meta = FrameMeta {
        dest: EthernetAddress::PTP_MULTICAST,
        source: port.source_mac,
        vlan_tci: ctx.vlan(domain.vlan_tci),
        domain_number: domain.number,
        sequence_id: domain.signaling_sequence_id,
        source_port_identity: source_identity,
        log_message_interval: INTERVAL_UNCHANGED,
        correction_subns: 0,
        major_sdo_id: TRANSPORT_SPECIFIC_1,
    };

    let payload = Payload::Signaling {
        // All ones target: the request addresses whichever master serves this domain
        target: PortIdentity {
            clock_id: u64::MAX,
            port_number: u16::MAX,
        },
        time_sync_interval: interval_log,
    };

    let route = TxRoute {
        port: slave_port,
        machine: domain.slave_machine as u8,
        domain: Some(domain.index),
        acting_gm: false,
    };

    let _ = ctx.transmit(
        &meta,
        &payload,
        route,
        &mut domain.signaling_buf,
        None,
    );
}

/// Apply a received Message-Interval-Request to the master machine the request arrived on.
pub(crate) fn apply_request<E: Hardware>(
    ctx: &mut Ctx<'_, E>,
    domain: &mut Domain,
    machine_idx: usize,
    requested_interval_log: i8,
) {
    let domain_idx = domain.index;
    let domain_number = domain.number;

    let machine = &mut domain.machines[machine_idx];

    // Slaves take their cadence from the upstream GM, never from signaling
    if machine.role != SyncRole::Master {
        return;
    }

    match requested_interval_log {
        INTERVAL_STOP_SENDING => {
            machine.timer_enabled = false;

            fmt::debug!(
                "Signaling on domain {}: machine {} stops sending Sync",
                domain_number,
                machine_idx
            );
        }
        INTERVAL_SET_TO_INITIAL => {
            machine.interval_log = machine.init_interval_log;
            machine.timer_enabled = true;

            fmt::debug!(
                "Signaling on domain {}: machine {} interval back to initial {}",
                domain_number,
                machine_idx,
                machine.init_interval_log
            );
        }
        INTERVAL_UNCHANGED => {}
        requested if (LOG_SYNC_INTERVAL_MIN..=LOG_SYNC_INTERVAL_MAX).contains(&requested) => {
            machine.interval_log = requested;
            machine.timer_enabled = true;

            fmt::debug!(
                "Signaling on domain {}: machine {} interval now {}",
                domain_number,
                machine_idx,
                requested
            );
        }
        _ => {
            ctx.errs.register(
                Error::Init(InitError::SyncIntervalOutOfRange),
                Some(machine.port),
                Some(domain_idx),
                None,
            );
        }
    }
}

/// The periodic interval check for one non-GM domain: when the masters' configured cadence
/// deviates from what the upstream currently sends, request a change.
///
/// Returns the interval to request, if any.
pub(crate) fn interval_check(domain: &Domain, ports: &[Port]) -> Option<i8> {
    let slave_interval = domain.machines[domain.slave_machine].interval_log;

    // Endpoint: a single machine compares its own operational interval
    if domain.machines.len() == 1 {
        let machine = &domain.machines[0];

        return (machine.oper_interval_log != machine.interval_log)
            .then_some(machine.oper_interval_log);
    }

    // Bridge: the fastest enabled master port sets the pace
    let mut minimum = LOG_SYNC_INTERVAL_MAX;
    let mut any_master = false;

    for (machine_idx, machine) in domain.machines.iter().enumerate() {
        if machine_idx == domain.slave_machine || !ports[machine.port as usize].enabled {
            continue;
        }

        any_master = true;
        minimum = minimum.min(machine.interval_log);
    }

    (any_master && minimum != slave_interval).then_some(minimum)
}
