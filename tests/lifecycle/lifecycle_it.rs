#[path = "../support/front.rs"]
mod front_support;

use blockfront::{
    FrontAction, FrontError, FrontEvent, IntQueueId, LaneCaps, LifecycleError, LifecycleState,
    RecoveryPhase, RecoveryReport, ReplyStatus, Request, RequestClass,
};
use front_support::*;
use std::time::{Duration, Instant};

#[test]
fn consistency_check_cannot_be_skipped() {
    let now = Instant::now();
    let mut front = new_front(test_config(), now);
    let err = front
        .step(FrontEvent::Recovery(RecoveryReport::ConsistencyCheckDone), now)
        .expect_err("recovering node cannot go operational");
    assert!(matches!(
        err,
        FrontError::Lifecycle(LifecycleError::IllegalTransition {
            from: LifecycleState::Recovering,
            to: LifecycleState::Operational,
        })
    ));
    assert!(!err.is_fatal());
    assert_eq!(front.state(), LifecycleState::Recovering);
}

#[test]
fn consistency_check_admits_only_its_own_queries() {
    let now = Instant::now();
    let mut front = new_front(test_config(), now);
    front
        .step(
            FrontEvent::Recovery(RecoveryReport::LocalRecoveryDone {
                disk: Default::default(),
            }),
            now,
        )
        .expect("local recovery");
    assert_eq!(front.state(), LifecycleState::ConsistencyCheck);

    let actions = send(&mut front, put(1, 0, 10), now);
    let reply = single_reply(&actions);
    assert_eq!(reply.status, ReplyStatus::NotReady);
    assert_eq!(reply.reason.as_deref(), Some("consistency check in progress"));

    let query = Request::new(
        sender(1),
        5,
        target(1),
        RequestClass::ConsistencyCheckQuery,
    )
    .with_scope(SCOPE);
    let actions = send(&mut front, query, now);
    assert!(matches!(
        actions.as_slice(),
        [FrontAction::ForwardUnthrottled(_)]
    ));
}

#[test]
fn engine_failure_flushes_lanes_and_drops_streams() {
    init_logging();
    let now = Instant::now();
    let mut config = test_config();
    config.lanes.log_puts = LaneCaps {
        max_in_flight_count: 1,
        max_in_flight_cost: 1_000,
    };
    let mut front = operational_front(config, now);
    let first = send(&mut front, put(1, 0, 10), now);
    let in_flight = single_forward(&first).clone();
    assert!(send(&mut front, put(2, 0, 20), now).is_empty());

    let later = now + Duration::from_millis(4);
    let actions = front
        .step(
            FrontEvent::EngineFailure {
                reason: "disk offline".into(),
            },
            later,
        )
        .expect("failure step");
    assert_eq!(front.state(), LifecycleState::Failed);

    let reply = single_reply(&actions);
    assert_eq!(reply.recipient, sender(2));
    assert_eq!(reply.status, ReplyStatus::Error);
    assert_eq!(reply.in_queue, Some(Duration::from_millis(4)));
    let dropped: Vec<_> = actions
        .iter()
        .filter_map(|action| match action {
            FrontAction::DropConnection { owner, status } => Some((*owner, status.dead)),
            _ => None,
        })
        .collect();
    assert_eq!(dropped, vec![(sender(1), true), (sender(2), true)]);
    assert!(matches!(actions.last(), Some(FrontAction::ShutdownEngine)));

    let health = front.health();
    let lane = health.lane(IntQueueId::PutLog).expect("lane");
    assert_eq!((lane.in_flight_count, lane.delayed_count, lane.failed), (0, 0, 1));
    assert_eq!(
        health.failure.as_deref(),
        Some("storage engine failure: disk offline")
    );
    let disconnects: u64 = health.ext_queues.iter().map(|queue| queue.disconnects).sum();
    assert_eq!(disconnects, 2);
    assert!(health.ext_queues.iter().all(|queue| queue.stream_stats.is_empty()));

    let late = complete(&mut front, &in_flight, later);
    let reply = single_reply(&late);
    assert_eq!(reply.status, ReplyStatus::NodeErrorState);
    assert!(reply.window.is_none());

    let again = front
        .step(
            FrontEvent::EngineFailure {
                reason: "second report".into(),
            },
            later,
        )
        .expect("repeat failure");
    assert!(again.is_empty());
}

#[test]
fn failed_recovery_notifies_waiters() {
    let now = Instant::now();
    let mut front = new_front(test_config(), now);
    let actions = send(&mut front, put(3, 0, 10).notify_when_ready(), now);
    assert_eq!(single_reply(&actions).status, ReplyStatus::NotReady);
    assert_eq!(front.health().ready_waiters, 1);

    let actions = front
        .step(
            FrontEvent::Recovery(RecoveryReport::Failed {
                phase: RecoveryPhase::LocalRecovery,
                reason: "corrupt superblock".into(),
            }),
            now,
        )
        .expect("failed recovery");
    assert!(actions
        .iter()
        .any(|action| matches!(action, FrontAction::ShutdownEngine)));
    assert!(actions.iter().any(|action| matches!(
        action,
        FrontAction::ReadyNotify { recipient, state: LifecycleState::Failed } if *recipient == sender(3)
    )));
    assert_eq!(front.health().ready_waiters, 0);
}

#[test]
fn failed_node_answers_maintenance_with_not_ready() {
    let now = Instant::now();
    let mut front = operational_front(test_config(), now);
    front
        .step(
            FrontEvent::EngineFailure {
                reason: "io".into(),
            },
            now,
        )
        .expect("failure");

    let compact = Request::new(
        sender(1),
        1,
        target(1),
        RequestClass::Compact,
    );
    let actions = send(&mut front, compact, now);
    assert_eq!(single_reply(&actions).status, ReplyStatus::NotReady);

    let status = Request::new(sender(1), 2, target(1), RequestClass::Status);
    let actions = send(&mut front, status, now);
    assert_eq!(single_reply(&actions).status, ReplyStatus::NodeErrorState);
}

#[test]
fn recovery_failure_after_start_is_rejected() {
    let now = Instant::now();
    let mut front = operational_front(test_config(), now);
    let err = front
        .step(
            FrontEvent::Recovery(RecoveryReport::Failed {
                phase: RecoveryPhase::ConsistencyCheck,
                reason: "late".into(),
            }),
            now,
        )
        .expect_err("operational node ignores recovery failures");
    assert!(matches!(
        err,
        FrontError::Lifecycle(LifecycleError::UnexpectedReport {
            state: LifecycleState::Operational,
            ..
        })
    ));
    assert_eq!(front.state(), LifecycleState::Operational);
}

#[test]
fn foreign_membership_update_is_fatal() {
    let now = Instant::now();
    let mut front = operational_front(test_config(), now);
    let mut foreign = view(2);
    foreign.group_id = GROUP + 1;
    let err = front
        .step(FrontEvent::MembershipUpdate(foreign), now)
        .expect_err("foreign group");
    assert!(err.is_fatal());

    let mut reshaped = view(2);
    reshaped.members.pop();
    let err = front
        .step(FrontEvent::MembershipUpdate(reshaped), now)
        .expect_err("changed layout");
    assert!(err.is_fatal());
    assert_eq!(front.identity().generation, 1);
}
