//! A single port Grand Master endpoint must emit Sync/Follow_Up pairs at the configured cadence,
//! with each Follow_Up carrying the captured egress timestamp of its Sync as the precise origin.

mod util;

use timecrab::{
    Engine, EthernetFrame, Timestamp,
    frame::{self, Message, MessageType},
};
use util::MockHardware;

const START: Timestamp = Timestamp {
    seconds: 10,
    nanoseconds: 0,
};

fn decode_tx(bytes: &[u8]) -> Message {
    let eth = EthernetFrame::new_checked(bytes).expect("ethernet");

    assert_eq!(eth.payload_ethertype(), timecrab::ETHERTYPE_PTP);

    frame::decode(eth.payload(), false).expect("decode")
}

#[test]
fn eight_sync_follow_up_pairs_per_second_at_log_minus_3() {
    let _ = env_logger::builder().is_test(true).try_init();

    let hw = MockHardware::new(1, START);
    let mut engine = Engine::new(hw, util::gm_endpoint_config(-3)).expect("init");

    // (sequence id, egress timestamp handed to the engine)
    let mut syncs: Vec<(u16, Timestamp)> = Vec::new();
    let mut follow_ups: Vec<(u16, Timestamp)> = Vec::new();

    for _ in 0..1_000 {
        engine.hardware_mut().advance(1_000_000);
        engine.tick();

        // Deliver egress timestamps for event frames, 10 µs after the tick
        let records = engine.hardware_mut().take_transmitted();

        for record in records {
            match decode_tx(&record.bytes) {
                Message::Sync(msg) => {
                    assert!(record.timestamp_requested);

                    let egress = engine.hardware_mut().now_free.add_ns(10_000);

                    syncs.push((msg.header.sequence_id, egress));

                    engine
                        .timestamp_event(record.port, egress, record.frame_id)
                        .expect("timestamp routed");
                }
                Message::FollowUp(msg) => {
                    assert!(!record.timestamp_requested);

                    follow_ups.push((msg.header.sequence_id, msg.precise_origin));
                }
                other => panic!("unexpected frame {:?}", other.message_type()),
            }
        }

        // Follow_Ups triggered by a timestamp delivery
        let records = engine.hardware_mut().take_transmitted();

        for record in records {
            if let Message::FollowUp(msg) = decode_tx(&record.bytes) {
                follow_ups.push((msg.header.sequence_id, msg.precise_origin));
            }
        }
    }

    assert_eq!(syncs.len(), 8, "one Sync every 125 ms");
    assert_eq!(follow_ups.len(), 8, "every Sync gets its Follow_Up");

    for ((sync_seq, egress), (fup_seq, precise_origin)) in syncs.iter().zip(follow_ups.iter()) {
        assert_eq!(sync_seq, fup_seq);
        assert_eq!(
            precise_origin, egress,
            "precise origin mirrors the Sync egress capture"
        );
    }

    // Sequence ids are consecutive
    for pair in syncs.windows(2) {
        assert_eq!(pair[1].0, pair[0].0.wrapping_add(1));
    }
}

#[test]
fn gm_follow_up_has_zero_correction_and_unity_rate() {
    let hw = MockHardware::new(1, START);
    let mut engine = Engine::new(hw, util::gm_endpoint_config(-3)).expect("init");

    engine.hardware_mut().advance(1_000_000);
    engine.tick();

    let records = engine.hardware_mut().take_transmitted();
    let sync = records
        .iter()
        .find(|r| matches!(decode_tx(&r.bytes).message_type(), MessageType::Sync))
        .expect("a Sync was sent");

    let egress = engine.hardware_mut().now_free.add_ns(5_000);

    engine
        .timestamp_event(sync.port, egress, sync.frame_id)
        .unwrap();

    let records = engine.hardware_mut().take_transmitted();
    let Message::FollowUp(fup) = decode_tx(&records[0].bytes) else {
        panic!("expected Follow_Up");
    };

    assert_eq!(fup.header.correction_subns, 0);
    assert_eq!(fup.rate_ratio, 1.0);
    assert_eq!(fup.precise_origin, egress);
}
