//! Slave-side synchronization: offset computation from a Sync/Follow_Up pair, outlier handling,
//! lock hysteresis, loss-of-sync on broken pairs, receipt timeout and GM stall detection.

mod util;

use pretty_assertions::assert_eq;
use timecrab::{
    ClockStep, Engine, Error, SyncLockState, Timestamp, TimestampSigned,
    error::SyncError,
    frame::{self, Message},
};
use util::MockHardware;

const START: Timestamp = Timestamp {
    seconds: 10,
    nanoseconds: 0,
};

/// Inject one Sync + Follow_Up pair.
fn inject_pair(
    engine: &mut Engine<MockHardware>,
    sequence_id: u16,
    interval_log: i8,
    ingress: Timestamp,
    precise_origin: Timestamp,
    correction_subns: u64,
) {
    let sync = util::sync_payload(0, sequence_id, interval_log);

    engine.msg_receive(&util::rx(0, ingress, &sync)).unwrap();

    let fup = util::follow_up_payload(0, sequence_id, interval_log, precise_origin, correction_subns, 0);

    engine.msg_receive(&util::rx(0, ingress, &fup)).unwrap();
}

fn log_contains(engine: &mut Engine<MockHardware>, kind: Error) -> bool {
    (0..timecrab::ERROR_LOG_LEN).any(|i| engine.error_read(i).unwrap().kind == Some(kind))
}

fn log_count(engine: &mut Engine<MockHardware>, kind: Error) -> usize {
    (0..timecrab::ERROR_LOG_LEN)
        .filter(|i| engine.error_read(*i).unwrap().kind == Some(kind))
        .count()
}

#[test]
fn first_pair_steps_clock_by_gm_offset() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut hw = MockHardware::new(1, START);

    // 100 ns of learned propagation delay survives in NVM
    hw.nvm.insert((0, util::NvmKindKey::PropDelay), 100.0);

    let mut engine = Engine::new(hw, util::slave_endpoint_config(-3)).expect("init");

    let ingress = Timestamp::new(10, 500_000_000);
    let origin = Timestamp::new(10_000, 0);

    inject_pair(&mut engine, 100, -3, ingress, origin, 0);

    // offset = 10000 s − (ingress − 100 ns propagation delay)
    let (step, rate) = *engine.hardware().corrections.last().expect("clock updated");

    assert_eq!(
        step,
        ClockStep {
            offset: TimestampSigned {
                seconds: 9_989,
                nanoseconds: 500_000_100,
            },
            negative: false,
        }
    );

    // rate ratio 1.0: no frequency adjustment alongside the step
    assert_eq!(rate, timecrab::PseudoRateRatio::from_ppb(0));

    assert_eq!(
        engine.current_offset(),
        TimestampSigned {
            seconds: 9_989,
            nanoseconds: 500_000_100,
        }
    );
}

#[test]
fn lock_fires_once_after_consecutive_in_band_syncs() {
    let mut hw = MockHardware::new(1, START);

    hw.nvm.insert((0, util::NvmKindKey::PropDelay), 100.0);

    let mut engine = Engine::new(hw, util::slave_endpoint_config(-3)).expect("init");

    // Step first: GM far in the future
    inject_pair(
        &mut engine,
        100,
        -3,
        Timestamp::new(10, 500_000_000),
        Timestamp::new(10_000, 0),
        0,
    );

    // From now on the GM tracks local time exactly: offset 0 per pair. The first two pairs are
    // dropped as outliers against the stepped reference, the third is accepted by force.
    let mut seq = 101u16;
    let mut tr = Timestamp::new(10, 625_000_000);

    for _ in 0..8 {
        let origin = tr.checked_sub_ns(100).unwrap();

        inject_pair(&mut engine, seq, -3, tr, origin, 0);

        seq += 1;
        tr = tr.add_ns(125_000_000);
    }

    let locks = engine
        .hardware()
        .sync_states
        .iter()
        .filter(|s| **s == SyncLockState::Locked)
        .count();

    assert_eq!(locks, 1, "LOCKED reported exactly once");

    assert!(engine.synchronized());
}

#[test]
fn second_sync_without_follow_up_is_loss_of_sync() {
    let mut hw = MockHardware::new(1, START);

    hw.nvm.insert((0, util::NvmKindKey::PropDelay), 100.0);

    let mut engine = Engine::new(hw, util::slave_endpoint_config(-3)).expect("init");

    // Establish a working exchange so the clock has a holdover rate to fall back to
    inject_pair(
        &mut engine,
        100,
        -3,
        Timestamp::new(10, 500_000_000),
        Timestamp::new(10_000, 0),
        0,
    );

    let corrections_before = engine.hardware().corrections.len();

    // Sync 101 arrives, its Follow_Up never does; Sync 102 breaks the pair
    let sync = util::sync_payload(0, 101, -3);
    engine
        .msg_receive(&util::rx(0, Timestamp::new(10, 625_000_000), &sync))
        .unwrap();

    let sync = util::sync_payload(0, 102, -3);
    engine
        .msg_receive(&util::rx(0, Timestamp::new(10, 750_000_000), &sync))
        .unwrap();

    assert!(log_contains(&mut engine, Error::Sync(SyncError::LossOfSync)));

    // The clock was pinned at its current rate: a frequency-only call, no step
    let (step, _) = engine.hardware().corrections[corrections_before];

    assert_eq!(step, ClockStep::NONE);

    assert_eq!(
        engine.hardware().sync_states.last(),
        Some(&SyncLockState::Unlocked)
    );
}

#[test]
fn missing_syncs_raise_receipt_timeout() {
    let hw = MockHardware::new(1, START);
    let mut engine = Engine::new(hw, util::slave_endpoint_config(-3)).expect("init");

    // interval 125 ms × timeout count 3 = 375 ms without a Sync
    for _ in 0..400 {
        engine.hardware_mut().advance(1_000_000);
        engine.tick();
    }

    assert!(log_contains(
        &mut engine,
        Error::Sync(SyncError::ReceiptTimeout)
    ));
    assert!(log_contains(&mut engine, Error::Sync(SyncError::LossOfSync)));
}

#[test]
fn stalled_gm_is_reported_exactly_once() {
    let mut hw = MockHardware::new(1, START);

    hw.nvm.insert((0, util::NvmKindKey::PropDelay), 100.0);

    let mut engine = Engine::new(hw, util::slave_endpoint_config(-3)).expect("init");

    let frozen_origin = Timestamp::new(10_000, 0);

    // correction > 2 × the maximum Sync interval (2 s), growing as the upstream bridge keeps
    // accumulating residence time against a dead GM
    let mut correction = 2_500_000_000u64 << 16;
    let mut tr = Timestamp::new(10, 500_000_000);

    for seq in 200..205u16 {
        inject_pair(&mut engine, seq, -3, tr, frozen_origin, correction);

        correction += 1_000_000 << 16;
        tr = tr.add_ns(125_000_000);
    }

    assert_eq!(log_count(&mut engine, Error::GmFailure), 1);
}

#[test]
fn slower_operational_interval_requests_change_upstream() {
    let hw = MockHardware::new(1, START);
    let mut engine = Engine::new(hw, util::slave_endpoint_config(-3)).expect("init");

    // The upstream sends at -2 (250 ms); our operational interval stays -3
    let mut seq = 300u16;
    let mut origin = Timestamp::new(50, 0);

    for tick in 0..2_000u32 {
        engine.hardware_mut().advance(1_000_000);
        engine.tick();

        if tick % 250 == 0 {
            let tr = engine.hardware().now_free;

            inject_pair(&mut engine, seq, -2, tr, origin, 0);

            seq += 1;
            origin = origin.add_ns(250_000_000);
        }
    }

    let signaling = engine
        .hardware_mut()
        .take_transmitted()
        .into_iter()
        .find_map(|record| {
            let eth = timecrab::EthernetFrame::new_checked(&record.bytes[..]).ok()?;

            match frame::decode(eth.payload(), false).ok()? {
                Message::Signaling(msg) => Some(msg),
                _ => None,
            }
        })
        .expect("a Message-Interval-Request was sent upstream");

    assert_eq!(signaling.time_sync_interval, -3);
    assert_eq!(signaling.header.domain_number, 0);
}
