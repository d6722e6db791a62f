#[path = "../support/front.rs"]
mod front_support;

use blockfront::{
    AdmissionFront, ExtQueueId, FrontAction, FrontEvent, HealthLight, IntQueueId, LaneCaps,
    MetricsRegistry, SharedAdmissionFront,
};
use front_support::*;
use std::time::Instant;

#[test]
fn health_tick_reports_lane_lights() {
    let now = Instant::now();
    let mut config = test_config();
    config.lanes.log_puts = LaneCaps {
        max_in_flight_count: 2,
        max_in_flight_cost: 1_000,
    };
    let mut front = operational_front(config, now);

    let snapshot = |front: &mut AdmissionFront| {
        let actions = front.step(FrontEvent::HealthTick, now).expect("tick");
        match actions.as_slice() {
            [FrontAction::StatusUpdate(snapshot)] => snapshot.clone(),
            other => panic!("unexpected actions {other:?}"),
        }
    };
    assert_eq!(snapshot(&mut front).light, HealthLight::Green);

    send(&mut front, put(1, 0, 10), now);
    send(&mut front, put(1, 1, 10), now);
    let busy = snapshot(&mut front);
    assert_eq!(busy.light, HealthLight::Yellow);

    send(&mut front, put(1, 2, 10), now);
    let backed_up = snapshot(&mut front);
    assert_eq!(backed_up.light, HealthLight::Red);
    let lane = backed_up.lane(IntQueueId::PutLog).expect("lane");
    assert_eq!((lane.in_flight_count, lane.delayed_count), (2, 1));
    assert_eq!(
        backed_up
            .ext_queue(ExtQueueId::PutTabletLog)
            .expect("queue")
            .in_flight_cost,
        30
    );
}

#[test]
fn published_metrics_are_namespaced_per_queue() {
    let now = Instant::now();
    let front = SharedAdmissionFront::new(operational_front(test_config(), now));
    front
        .step(FrontEvent::Request(put(1, 0, 25)), now)
        .expect("put");
    front
        .step(FrontEvent::Request(put(1, 5, 25)), now)
        .expect("gap");

    let mut registry = MetricsRegistry::new("blockfront");
    front.publish_metrics(&mut registry).expect("publish");
    let snapshot = registry.snapshot();
    assert_eq!(snapshot.gauge("blockfront.lane.put_log.in_flight_count"), Some(1));
    assert_eq!(snapshot.gauge("blockfront.lane.put_log.in_flight_cost"), Some(25));
    assert_eq!(snapshot.gauge("blockfront.ext.put_tablet_log.streams"), Some(1));
    assert_eq!(
        snapshot.counter("blockfront.ext.put_tablet_log.incorrect_sequences"),
        Some(1)
    );
    assert_eq!(snapshot.counter("blockfront.access_denied"), Some(0));
    assert_eq!(snapshot.gauge("blockfront.ready_waiters"), Some(0));
}
