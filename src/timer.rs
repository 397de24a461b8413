//! The periodic scheduler.
//!
//! A single nominally 1 ms tick drives everything that is not frame-event driven: Pdelay request
//! cadence, Sync emission (Grand Master, acting Grand Master and quiet-upstream re-emission),
//! signaling interval checks, the turnaround/residence watchdogs, the sync receipt timeout and
//! the periodic estimated-GM-offset report.

use heapless::Vec;

use crate::{
    config::{INTERVAL_STOP_SENDING, MAX_DOMAINS, MAX_PORTS, SyncRole},
    domain::Domain,
    engine::{self, Ctx, DeviceState},
    error::{Error, LimitError, SyncError},
    hardware::Hardware,
    pdelay::{self, PdelayMachine},
    pi::PiController,
    port::Port,
    sync,
    time::{TEN_MS_IN_NS, TimestampSigned, log_interval_to_ns},
};

/// Signaling interval check cadence.
const SYNC_CHECK_PERIOD_NS: u64 = 1_500_000_000;

/// Estimated GM offset calculation cadence.
const OFFSET_CALC_PERIOD_NS: u64 = 100_000_000;

/// Why the non-GM Sync send path runs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum SendReason {
    /// The periodic tick.
    Periodic,
    /// A valid Sync/Follow_Up pair was just processed on the slave port.
    FollowUpReceived,
}

/// Arm all per-machine and per-domain deadlines after init.
pub(crate) fn arm<E: Hardware>(
    ctx: &mut Ctx<'_, E>,
    dev: &mut DeviceState,
    domains: &mut Vec<Domain, MAX_DOMAINS>,
    pdelay_machines: &mut Vec<PdelayMachine, MAX_PORTS>,
) {
    let now = ctx.now_free_ns();

    for machine in pdelay_machines.iter_mut() {
        machine.send_due_ns = now;
        machine.timer_enabled =
            machine.interval_log != INTERVAL_STOP_SENDING && machine.initiator_enabled;
    }

    for domain in domains.iter_mut() {
        if domain.is_gm {
            for machine in domain.machines.iter_mut() {
                machine.send_due_ns = now;
                machine.timer_enabled = machine.interval_log != INTERVAL_STOP_SENDING;
            }
        } else {
            let slave_interval = domain.machines[domain.slave_machine].interval_log;

            domain.receipt_timeout_due_ns = now
                + log_interval_to_ns(slave_interval) * u64::from(domain.sync_receipt_timeout_cnt);
            domain.sync_check_due_ns = now;
            domain.last_sync_rcvd_ns = 0;

            let slave_machine = domain.slave_machine;

            for (machine_idx, machine) in domain.machines.iter_mut().enumerate() {
                if machine_idx == slave_machine {
                    continue;
                }

                // Until an upstream Sync arrives, the first emission waits out the startup
                // timeout, then the domain acts as Grand Master
                machine.send_due_ns =
                    now + u64::from(domain.startup_timeout_s) * 1_000_000_000;
                machine.skipped_syncs = 0;
                machine.timer_enabled = machine.interval_log != INTERVAL_STOP_SENDING;
            }
        }
    }

    dev.sync_stat_calc_due_ns = now + OFFSET_CALC_PERIOD_NS;
}

/// One tick.
#[allow(clippy::too_many_arguments)]
pub(crate) fn periodic<E: Hardware>(
    ctx: &mut Ctx<'_, E>,
    dev: &mut DeviceState,
    pi: &mut PiController,
    ports: &[Port],
    domains: &mut Vec<Domain, MAX_DOMAINS>,
    pdelay_machines: &mut Vec<PdelayMachine, MAX_PORTS>,
    signaling_enabled: bool,
) {
    let now = ctx.now_free_ns();

    // Pdelay request cadence
    for machine in pdelay_machines.iter_mut() {
        if machine.initiator_enabled && machine.send_due_ns <= now {
            if machine.timer_enabled {
                pdelay::initiate(ctx, machine, ports);
            }

            machine.send_due_ns = now + log_interval_to_ns(machine.interval_log);
        }
    }

    // Sync emission
    for domain in domains.iter_mut() {
        if domain.is_gm {
            for machine_idx in 0..domain.machines.len() {
                let machine = &domain.machines[machine_idx];

                if machine.send_due_ns <= now {
                    let enabled = machine.timer_enabled;
                    let interval = machine.interval_log;

                    if enabled {
                        sync::master_send_sync(ctx, domain, machine_idx, ports);
                    }

                    domain.machines[machine_idx].send_due_ns = now + log_interval_to_ns(interval);
                }
            }
        } else {
            syncs_send_non_gm(ctx, domain, ports, SendReason::Periodic, now);
        }
    }

    // Signaling interval check, once per 1.5 s per non-GM domain
    if signaling_enabled {
        for domain in domains.iter_mut() {
            if domain.is_gm || domain.sync_check_due_ns > now {
                continue;
            }

            if let Some(interval) = crate::signaling::interval_check(domain, ports) {
                crate::signaling::send_request(ctx, domain, ports, interval);
            }

            domain.sync_check_due_ns = now + SYNC_CHECK_PERIOD_NS;
        }
    }

    // Pdelay turnaround watchdogs
    for machine in pdelay_machines.iter_mut() {
        if machine.initiator_enabled
            && machine.turnaround_start_init_ns != 0
            && now.saturating_sub(machine.turnaround_start_init_ns) > TEN_MS_IN_NS
        {
            ctx.errs.register(
                Error::Limit(LimitError::TurnaroundInitiatorTooLong),
                Some(machine.port),
                None,
                None,
            );

            machine.turnaround_start_init_ns = 0;
        }

        if machine.responder_enabled
            && machine.turnaround_start_resp_ns != 0
            && now.saturating_sub(machine.turnaround_start_resp_ns) > TEN_MS_IN_NS
        {
            ctx.errs.register(
                Error::Limit(LimitError::TurnaroundResponderTooLong),
                Some(machine.port),
                None,
                None,
            );

            machine.turnaround_start_resp_ns = 0;
        }
    }

    // Residence watchdog on bridge master machines
    for domain in domains.iter_mut() {
        if domain.is_gm {
            continue;
        }

        let domain_idx = domain.index;

        for machine in domain.machines.iter_mut() {
            if machine.role != SyncRole::Master || machine.residence_start_ns == 0 {
                continue;
            }

            if now.saturating_sub(machine.residence_start_ns) > TEN_MS_IN_NS {
                // A master deliberately skipping ingress Syncs is not late
                if machine.skipped_syncs == 0 {
                    ctx.errs.register(
                        Error::Limit(LimitError::ResidenceTooLong),
                        Some(machine.port),
                        Some(domain_idx),
                        None,
                    );

                    machine.residence_start_ns = 0;
                }
            }
        }
    }

    // Sync receipt timeout
    for domain in domains.iter_mut() {
        if domain.is_gm || domain.receipt_timeout_due_ns == 0 {
            continue;
        }

        if domain.receipt_timeout_due_ns <= now {
            let slave = domain.slave_machine as u8;
            let domain_idx = domain.index;

            ctx.errs.register(
                Error::Sync(SyncError::ReceiptTimeout),
                Some(slave),
                Some(domain_idx),
                None,
            );

            engine::los_handle(ctx.hw, ctx.errs, dev, pi, domain, slave, None);

            domain.receipt_timeout_due_ns = 0;

            #[cfg(feature = "counters")]
            {
                let port = domain.machines[domain.slave_machine].port;

                ctx.stats.receipt_timeout(domain_idx, slave, port);
            }
        }
    }

    // Estimated offset to the GM, for user reporting
    if dev.has_slave_domain && dev.sync_stat_calc_due_ns <= now {
        if dev.ever_updated {
            estimate_gm_offset(ctx, dev);
        }

        dev.sync_stat_calc_due_ns = now + OFFSET_CALC_PERIOD_NS;
    }
}

/// Sync emission for a non-GM domain.
///
/// Before any upstream Sync has been seen the domain acts as Grand Master once the startup
/// timeout armed the send deadlines. With a live upstream, Syncs are forwarded on Follow_Up
/// reception (skipping when the master runs slower than the upstream), and re-emitted from the
/// tick once the upstream has been quiet for 125 % of the master's interval.
pub(crate) fn syncs_send_non_gm<E: Hardware>(
    ctx: &mut Ctx<'_, E>,
    domain: &mut Domain,
    ports: &[Port],
    reason: SendReason,
    now: u64,
) {
    let slave_machine = domain.slave_machine;

    match (reason, domain.valid_sync_received) {
        (SendReason::Periodic, false) => {
            for machine_idx in 0..domain.machines.len() {
                if machine_idx == slave_machine {
                    continue;
                }

                let machine = &domain.machines[machine_idx];

                if machine.send_due_ns <= now {
                    let enabled = machine.timer_enabled;
                    let interval = machine.interval_log;

                    if enabled {
                        domain.acting_gm = true;

                        sync::master_send_sync(ctx, domain, machine_idx, ports);
                    }

                    domain.machines[machine_idx].send_due_ns = now + log_interval_to_ns(interval);
                }
            }
        }
        (SendReason::FollowUpReceived, true) => {
            let slave_interval = domain.machines[slave_machine].interval_log;

            for machine_idx in 0..domain.machines.len() {
                if machine_idx == slave_machine {
                    continue;
                }

                let machine_interval = domain.machines[machine_idx].interval_log;

                if slave_interval >= machine_interval {
                    domain.acting_gm = false;

                    sync::master_send_sync(ctx, domain, machine_idx, ports);
                } else {
                    // Slower master: forward every 2^(Δlog)-th ingress Sync
                    let gap = (1u8 << (machine_interval - slave_interval) as u8) - 1;

                    if gap <= domain.machines[machine_idx].skipped_syncs {
                        sync::master_send_sync(ctx, domain, machine_idx, ports);

                        domain.machines[machine_idx].skipped_syncs = 0;
                    } else {
                        domain.machines[machine_idx].skipped_syncs += 1;
                    }
                }
            }
        }
        _ => {
            for machine_idx in 0..domain.machines.len() {
                if machine_idx == slave_machine {
                    continue;
                }

                let machine = &domain.machines[machine_idx];
                let interval_ns = log_interval_to_ns(machine.interval_log);

                // Re-emit only once the upstream has been quiet for 125 % of the interval
                if now <= domain.last_sync_rcvd_ns + interval_ns + interval_ns / 4 {
                    continue;
                }

                if machine.send_due_ns <= now {
                    let enabled = machine.timer_enabled;

                    if enabled {
                        domain.acting_gm = false;

                        sync::master_send_sync(ctx, domain, machine_idx, ports);
                    }

                    domain.machines[machine_idx].send_due_ns = now + interval_ns;
                }
            }
        }
    }
}

/// Estimate the current offset to the Grand Master from the clock pair and the last reported
/// offset, compensating the free-running drift with the corrected rate ratio.
fn estimate_gm_offset<E: Hardware>(ctx: &mut Ctx<'_, E>, dev: &mut DeviceState) {
    let (free_run, corrected) = ctx.hw.current_time_pair().unwrap_or_default();

    let elapsed_ns = free_run
        .checked_sub(dev.last_free_run_ref)
        .map(crate::time::Timestamp::as_ns)
        .unwrap_or(0);

    let compensation_ns = crate::time::f64_to_i32_saturating(
        (elapsed_ns as f64 * dev.corr_clock_rate_ratio) - elapsed_ns as f64,
    );

    let corrected_adj = corrected.as_signed().sub(TimestampSigned {
        seconds: 0,
        nanoseconds: compensation_ns,
    });

    let mut clock_offset = free_run.as_signed().sub(corrected_adj);

    if clock_offset.nanoseconds < 0 {
        clock_offset.nanoseconds = -clock_offset.nanoseconds;
        clock_offset.seconds = -clock_offset.seconds;
    }

    dev.estimated_gm_offset = clock_offset.sub(dev.reported_offset);
    dev.estimated_gm_offset_calculated = true;
}
