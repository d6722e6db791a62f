use blockfront::{
    DelayedRequest, IntQueueId, InternalQueue, LaneAdmission, LaneLimits, LaneOutcome,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::time::{Duration, Instant};

const LIMITS: LaneLimits = LaneLimits {
    max_in_flight_count: 6,
    max_in_flight_cost: 1_000,
};

fn assert_bounded(lane: &InternalQueue<u64>, seed: u64) {
    let counters = lane.counters();
    assert!(counters.in_flight_count <= LIMITS.max_in_flight_count, "seed {seed}");
    assert!(
        counters.in_flight_count <= 1 || counters.in_flight_cost < LIMITS.max_in_flight_cost,
        "seed {seed}: {counters:?}"
    );
}

#[test]
fn lane_stays_bounded_and_resolves_in_arrival_order() {
    for seed in [3u64, 17, 256, 9001] {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut lane = InternalQueue::new(IntQueueId::GetAsync, LIMITS);
        let start = Instant::now();
        let mut now = start;
        let mut next_id = 0u64;
        let mut in_flight: Vec<(u64, u64)> = Vec::new();
        let mut resolved: Vec<u64> = Vec::new();
        let mut costs = std::collections::BTreeMap::new();

        for _ in 0..4_000 {
            now += Duration::from_millis(rng.gen_range(0..3));
            if in_flight.is_empty() || rng.gen_bool(0.5) {
                let cost = if rng.gen_bool(0.05) {
                    rng.gen_range(1_000..3_000)
                } else {
                    rng.gen_range(1..300)
                };
                let deadline = rng
                    .gen_bool(0.2)
                    .then(|| now + Duration::from_millis(rng.gen_range(0..20)));
                let id = next_id;
                next_id += 1;
                costs.insert(id, cost);
                let request = DelayedRequest {
                    item: id,
                    cost,
                    bytes: cost,
                    received_at: now,
                    deadline,
                };
                if let LaneAdmission::Admitted(id) = lane.try_admit(request) {
                    resolved.push(id);
                    in_flight.push((id, cost));
                }
            } else {
                let index = rng.gen_range(0..in_flight.len());
                let (_, cost) = in_flight.swap_remove(index);
                let outcomes = lane.on_completion(cost, cost, now).expect("balanced release");
                for outcome in outcomes {
                    match outcome {
                        LaneOutcome::Admitted { item, .. } => {
                            resolved.push(item);
                            in_flight.push((item, costs[&item]));
                        }
                        LaneOutcome::DeadlineExpired { item, cost, in_queue } => {
                            assert_eq!(cost, costs[&item]);
                            assert!(in_queue <= now.duration_since(start));
                            resolved.push(item);
                        }
                        LaneOutcome::Failed { .. } => panic!("seed {seed}: unexpected failure"),
                    }
                }
            }
            assert_bounded(&lane, seed);
            assert_eq!(lane.counters().in_flight_count as usize, in_flight.len());
        }

        assert!(
            resolved.windows(2).all(|pair| pair[0] < pair[1]),
            "seed {seed}: lane reordered requests"
        );
        let unresolved = next_id as usize - resolved.len();
        assert_eq!(unresolved, lane.delayed_len(), "seed {seed}");
    }
}

#[test]
fn failing_a_lane_releases_everything_in_order() {
    let mut lane = InternalQueue::new(IntQueueId::PutLog, LIMITS);
    let now = Instant::now();
    for id in 0..10u64 {
        lane.try_admit(DelayedRequest {
            item: id,
            cost: 100,
            bytes: 100,
            received_at: now,
            deadline: None,
        });
    }
    assert_eq!(lane.delayed_len(), 10 - LIMITS.max_in_flight_count as usize);

    let failed: Vec<u64> = lane
        .fail_all()
        .into_iter()
        .map(|outcome| match outcome {
            LaneOutcome::Failed { item, .. } => item,
            other => panic!("unexpected outcome {other:?}"),
        })
        .collect();
    assert_eq!(failed, (6..10).collect::<Vec<_>>());
    let health = lane.health();
    assert_eq!(health.in_flight_count, 0);
    assert_eq!(health.delayed_count, 0);
    assert_eq!(health.failed, 4);
}
