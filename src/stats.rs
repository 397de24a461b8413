//! IEEE 802.1AS statistics counters, available behind the `counters` feature.
//!
//! Counter ids follow the `ieee8021AsPortStat*` numbering. Counters with no equivalent event in
//! this stack (one-step Syncs, Announce) are valid ids that always read zero.

use heapless::Vec;

use crate::{
    config::{MAX_DOMAINS, MAX_PORTS, MAX_SYNC_MACHINES},
    error::{ApiError, Error},
    frame::MessageType,
};

/// IEEE 802.1AS counter identifiers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u16)]
pub enum Counter {
    /// Valid Sync messages received.
    RxSyncCount = 1,
    /// Unused: no one-step Syncs.
    RxOneStepSyncCount = 2,
    /// Valid Follow_Up messages received.
    RxFollowUpCount = 3,
    /// Valid Pdelay_Req messages received.
    RxPdelayRequest = 4,
    /// Valid Pdelay_Resp messages received.
    RxPdelayResponse = 5,
    /// Valid Pdelay_Resp_Follow_Up messages received.
    RxPdelayResponseFollowUp = 6,
    /// Unused: Announce is not part of this profile.
    RxAnnounce = 7,
    /// Discarded PTP packets.
    RxDiscard = 8,
    /// Sync receipt timeout events.
    RxSyncReceiptTimeouts = 9,
    /// Unused: Announce is not part of this profile.
    AnnounceReceiptTimeouts = 10,
    /// Allowed lost Pdelay responses exceeded events.
    PdelayAllowedLostResponsesExceeded = 11,
    /// Sync messages transmitted.
    TxSyncCount = 12,
    /// Unused: no one-step Syncs.
    TxOneStepSyncCount = 13,
    /// Follow_Up messages transmitted.
    TxFollowUpCount = 14,
    /// Pdelay_Req messages transmitted.
    TxPdelayRequest = 15,
    /// Pdelay_Resp messages transmitted.
    TxPdelayResponse = 16,
    /// Pdelay_Resp_Follow_Up messages transmitted.
    TxPdelayResponseFollowUp = 17,
    /// Unused: Announce is not part of this profile.
    TxAnnounce = 18,
}

/// Per-port counters actually maintained.
const PORT_COUNTERS: [Counter; 13] = [
    Counter::RxSyncCount,
    Counter::RxFollowUpCount,
    Counter::RxPdelayRequest,
    Counter::RxPdelayResponse,
    Counter::RxPdelayResponseFollowUp,
    Counter::RxDiscard,
    Counter::RxSyncReceiptTimeouts,
    Counter::PdelayAllowedLostResponsesExceeded,
    Counter::TxSyncCount,
    Counter::TxFollowUpCount,
    Counter::TxPdelayRequest,
    Counter::TxPdelayResponse,
    Counter::TxPdelayResponseFollowUp,
];

/// Per-domain counters actually maintained.
const DOMAIN_COUNTERS: [Counter; 6] = [
    Counter::RxSyncCount,
    Counter::RxFollowUpCount,
    Counter::RxDiscard,
    Counter::RxSyncReceiptTimeouts,
    Counter::TxSyncCount,
    Counter::TxFollowUpCount,
];

fn port_slot(counter: Counter) -> Option<usize> {
    PORT_COUNTERS.iter().position(|c| *c == counter)
}

fn domain_slot(counter: Counter) -> Option<usize> {
    DOMAIN_COUNTERS.iter().position(|c| *c == counter)
}

/// The counter store.
pub(crate) struct Stats {
    ports: Vec<[u32; PORT_COUNTERS.len()], MAX_PORTS>,
    domains: Vec<Vec<[u32; DOMAIN_COUNTERS.len()], MAX_SYNC_MACHINES>, MAX_DOMAINS>,
}

impl Stats {
    pub(crate) fn new(port_count: usize, machine_counts: &[usize]) -> Self {
        let mut ports = Vec::new();

        for _ in 0..port_count {
            let _ = ports.push([0; PORT_COUNTERS.len()]);
        }

        let mut domains = Vec::new();

        for count in machine_counts {
            let mut machines = Vec::new();

            for _ in 0..*count {
                let _ = machines.push([0; DOMAIN_COUNTERS.len()]);
            }

            let _ = domains.push(machines);
        }

        Self { ports, domains }
    }

    fn bump_port(&mut self, port: u8, counter: Counter) {
        if let (Some(slot), Some(counters)) = (port_slot(counter), self.ports.get_mut(port as usize))
        {
            counters[slot] = counters[slot].wrapping_add(1);
        }
    }

    fn bump_domain(&mut self, domain: u8, machine: u8, counter: Counter) {
        if let Some(slot) = domain_slot(counter) {
            if let Some(counters) = self
                .domains
                .get_mut(domain as usize)
                .and_then(|d| d.get_mut(machine as usize))
            {
                counters[slot] = counters[slot].wrapping_add(1);
            }
        }
    }

    /// A valid message was received.
    pub(crate) fn rx(
        &mut self,
        port: u8,
        domain_machine: Option<(u8, u8)>,
        message_type: MessageType,
    ) {
        let counter = match message_type {
            MessageType::Sync => Counter::RxSyncCount,
            MessageType::FollowUp => Counter::RxFollowUpCount,
            MessageType::PdelayReq => Counter::RxPdelayRequest,
            MessageType::PdelayResp => Counter::RxPdelayResponse,
            MessageType::PdelayRespFollowUp => Counter::RxPdelayResponseFollowUp,
            MessageType::Signaling => return,
        };

        self.bump_port(port, counter);

        if let Some((domain, machine)) = domain_machine {
            self.bump_domain(domain, machine, counter);
        }
    }

    /// A message was transmitted.
    pub(crate) fn tx(
        &mut self,
        port: u8,
        domain_machine: Option<(u8, u8)>,
        message_type: MessageType,
    ) {
        let counter = match message_type {
            MessageType::Sync => Counter::TxSyncCount,
            MessageType::FollowUp => Counter::TxFollowUpCount,
            MessageType::PdelayReq => Counter::TxPdelayRequest,
            MessageType::PdelayResp => Counter::TxPdelayResponse,
            MessageType::PdelayRespFollowUp => Counter::TxPdelayResponseFollowUp,
            MessageType::Signaling => return,
        };

        self.bump_port(port, counter);

        if let Some((domain, machine)) = domain_machine {
            self.bump_domain(domain, machine, counter);
        }
    }

    /// A PTP packet was discarded.
    pub(crate) fn discard(&mut self, domain: u8, machine: u8, port: u8) {
        self.bump_port(port, Counter::RxDiscard);
        self.bump_domain(domain, machine, Counter::RxDiscard);
    }

    /// The sync receipt timeout fired.
    pub(crate) fn receipt_timeout(&mut self, domain: u8, machine: u8, port: u8) {
        self.bump_port(port, Counter::RxSyncReceiptTimeouts);
        self.bump_domain(domain, machine, Counter::RxSyncReceiptTimeouts);
    }

    /// The lost-responses allowance was exceeded.
    pub(crate) fn lost_responses_exceeded(&mut self, port: u8) {
        self.bump_port(port, Counter::PdelayAllowedLostResponsesExceeded);
    }

    /// Read a port counter. Valid-but-unmaintained ids read zero.
    pub(crate) fn port_value(&self, port: u8, counter: Counter) -> Result<u32, Error> {
        let counters = self
            .ports
            .get(port as usize)
            .ok_or(Error::Api(ApiError::IllegalPort))?;

        Ok(port_slot(counter).map(|slot| counters[slot]).unwrap_or(0))
    }

    /// Read a domain counter. Valid-but-unmaintained ids read zero.
    pub(crate) fn domain_value(
        &self,
        domain: u8,
        machine: u8,
        counter: Counter,
    ) -> Result<u32, Error> {
        let machines = self
            .domains
            .get(domain as usize)
            .ok_or(Error::Api(ApiError::UnknownDomain))?;

        let counters = machines
            .get(machine as usize)
            .ok_or(Error::Api(ApiError::IllegalMachine))?;

        Ok(domain_slot(counter).map(|slot| counters[slot]).unwrap_or(0))
    }

    /// Zero every counter.
    pub(crate) fn clear(&mut self) {
        for counters in self.ports.iter_mut() {
            counters.fill(0);
        }

        for machines in self.domains.iter_mut() {
            for counters in machines.iter_mut() {
                counters.fill(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmaintained_counter_reads_zero() {
        let stats = Stats::new(1, &[1]);

        assert_eq!(stats.port_value(0, Counter::RxAnnounce), Ok(0));
        assert_eq!(stats.domain_value(0, 0, Counter::TxAnnounce), Ok(0));
    }

    #[test]
    fn rx_increments_port_and_domain() {
        let mut stats = Stats::new(2, &[2]);

        stats.rx(1, Some((0, 1)), MessageType::Sync);
        stats.rx(1, None, MessageType::PdelayReq);

        assert_eq!(stats.port_value(1, Counter::RxSyncCount), Ok(1));
        assert_eq!(stats.port_value(1, Counter::RxPdelayRequest), Ok(1));
        assert_eq!(stats.domain_value(0, 1, Counter::RxSyncCount), Ok(1));

        stats.clear();

        assert_eq!(stats.port_value(1, Counter::RxSyncCount), Ok(0));
    }

    #[test]
    fn unknown_port_errors() {
        let stats = Stats::new(1, &[1]);

        assert_eq!(
            stats.port_value(5, Counter::RxSyncCount),
            Err(Error::Api(ApiError::IllegalPort))
        );
    }
}
