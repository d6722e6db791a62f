use blockfront::{FeedbackStatus, QueueBackpressure, SequenceId, WindowParams};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

fn params(total_cost: u64) -> WindowParams {
    WindowParams {
        check_sequence: true,
        total_cost,
        cost_change_to_recalculate: total_cost / 10,
        min_low_watermark: total_cost / 10,
        max_low_watermark: total_cost * 9 / 10,
        percent_threshold: 80,
        cost_change_until_frozen: total_cost * 5,
        cost_change_until_death: total_cost * 10,
        window_timeout: Duration::from_secs(60),
    }
}

#[test]
fn reserved_cost_never_exceeds_ceiling_and_releases_match() {
    for seed in [1u64, 7, 42, 1337] {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut queue = QueueBackpressure::new(params(1_000)).unwrap();
        let mut next_seq: BTreeMap<u32, u64> = BTreeMap::new();
        let mut outstanding: BTreeMap<u32, VecDeque<(SequenceId, u64)>> = BTreeMap::new();
        let now = Instant::now();

        for _ in 0..5_000 {
            let stream = rng.gen_range(0..4u32);
            let pending = outstanding.entry(stream).or_default();
            if pending.is_empty() || rng.gen_bool(0.55) {
                let msg = next_seq.entry(stream).or_insert(0);
                let seq = SequenceId::new(0, *msg);
                let cost = rng.gen_range(1..400);
                let feedback = queue.push(&stream, seq, cost, now);
                *msg += 1;
                match feedback.window.status {
                    FeedbackStatus::Success => pending.push_back((seq, cost)),
                    FeedbackStatus::Overflow => {}
                    other => panic!("seed {seed}: unexpected push status {other:?}"),
                }
            } else if let Some((seq, cost)) = pending.pop_front() {
                let feedback = queue
                    .processed(&stream, seq, cost, now)
                    .expect("stream with outstanding cost stays tracked");
                assert!(feedback.is_good());
            }

            for (stream, pending) in &outstanding {
                let expected: u64 = pending.iter().map(|(_, cost)| cost).sum();
                match queue.window(stream) {
                    Some(window) => {
                        assert_eq!(window.in_flight_cost, expected, "seed {seed}");
                        assert!(window.in_flight_cost <= window.max_window, "seed {seed}");
                    }
                    None => assert_eq!(expected, 0, "seed {seed}"),
                }
            }
        }
    }
}

#[test]
fn stale_sequences_are_rejected_without_mutation() {
    let mut rng = ChaCha20Rng::seed_from_u64(99);
    let mut queue = QueueBackpressure::new(params(10_000)).unwrap();
    let now = Instant::now();
    let mut expected = 0u64;
    for _ in 0..500 {
        if expected > 0 && rng.gen_bool(0.3) {
            let stale = SequenceId::new(0, rng.gen_range(0..expected));
            let before = queue.window(&"s").unwrap();
            let feedback = queue.push(&"s", stale, 1, now);
            assert_eq!(feedback.window.status, FeedbackStatus::IncorrectMsgId);
            let after = queue.window(&"s").unwrap();
            assert_eq!(before.in_flight_cost, after.in_flight_cost);
            assert_eq!(before.max_window, after.max_window);
            assert_eq!(after.expected, SequenceId::new(0, expected));
        } else {
            let seq = SequenceId::new(0, expected);
            let feedback = queue.push(&"s", seq, 1, now);
            assert!(feedback.is_good());
            queue.processed(&"s", seq, 1, now);
            expected += 1;
            assert_eq!(queue.expected_sequence(&"s"), Some(SequenceId::new(0, expected)));
        }
    }
}

#[test]
fn busy_stream_regains_budget_after_peer_expires() {
    let mut p = params(1_000);
    p.cost_change_until_frozen = 500;
    p.cost_change_until_death = 1_000;
    p.window_timeout = Duration::from_millis(10);
    let mut queue = QueueBackpressure::new(p).unwrap();
    let start = Instant::now();

    queue.push(&"idle", SequenceId::default(), 1, start);
    queue.processed(&"idle", SequenceId::default(), 1, start);
    assert!(queue.push(&"busy", SequenceId::new(0, 0), 500, start).is_good());
    let overflow = queue.push(&"busy", SequenceId::new(0, 1), 100, start);
    assert_eq!(overflow.window.status, FeedbackStatus::Overflow);
    assert_eq!(overflow.window.max_window, 500);

    let later = start + Duration::from_millis(20);
    let feedback = queue
        .processed(&"busy", SequenceId::new(0, 0), 500, later)
        .unwrap();
    assert!(feedback.notifications.iter().all(|status| status.stream == "idle"));

    let mut msg = 2;
    let mut expired = false;
    while !expired && msg < 20 {
        let seq = SequenceId::new(0, msg);
        assert!(queue.push(&"busy", seq, 100, later).is_good());
        let feedback = queue.processed(&"busy", seq, 100, later).unwrap();
        expired = feedback
            .notifications
            .iter()
            .any(|status| status.stream == "idle" && status.dead);
        msg += 1;
    }
    assert!(expired);
    assert_eq!(queue.stats().streams, 1);
}
