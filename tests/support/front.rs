#![allow(dead_code)]

use blockfront::{
    AdmissionFront, BlobId, Completion, CostEstimate, CostEstimator, DiskParams, ForwardedRequest,
    FrontAction, FrontConfig, FrontEvent, GetHandleClass, GetRequest, LaneCaps, MemberSlot,
    Membership, MembershipView, MsgQos, NodeIdentity, PutHandleClass, PutRequest, ReadQuery,
    RecoveryReport, Reply, Request, RequestClass, SenderId, SequenceId,
};
use std::time::Instant;

pub const GROUP: u32 = 11;
pub const POSITION: u32 = 1;
pub const SCOPE: &str = "pool-a";

/// Costs equal payload bytes so tests can pick exact costs.
#[derive(Debug, Clone)]
pub struct PayloadCostEstimator {
    pub huge_bytes: u64,
}

impl Default for PayloadCostEstimator {
    fn default() -> Self {
        Self {
            huge_bytes: u64::MAX,
        }
    }
}

impl CostEstimator for PayloadCostEstimator {
    fn estimate(&self, class: &RequestClass) -> CostEstimate {
        match class {
            RequestClass::Put(put) => CostEstimate {
                cost: put.data_len,
                huge: put.data_len >= self.huge_bytes,
            },
            RequestClass::Get(get) => CostEstimate {
                cost: get.queries.iter().map(|query| query.read_len()).sum(),
                huge: false,
            },
            _ => CostEstimate {
                cost: 1,
                huge: false,
            },
        }
    }

    fn settings(&self) -> DiskParams {
        DiskParams::default()
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn view(generation: u32) -> MembershipView {
    MembershipView {
        group_id: GROUP,
        generation,
        members: (0..4)
            .map(|position| MemberSlot {
                position,
                node_id: 10 + position,
                disk_id: 1000 + position,
            })
            .collect(),
        scope: Some(SCOPE.into()),
    }
}

pub fn target(generation: u32) -> NodeIdentity {
    NodeIdentity {
        group_id: GROUP,
        generation,
        position: POSITION,
    }
}

/// Small budgets so window and lane limits are easy to hit.
pub fn test_config() -> FrontConfig {
    let mut config = FrontConfig::default();
    let total = 1_000;
    config.ext_queues.put_tablet_log = total;
    config.ext_queues.put_async_blob = total;
    config.ext_queues.put_user_data = total;
    config.ext_queues.get_async_read = total;
    config.ext_queues.get_fast_read = total;
    config.ext_queues.get_discover = total;
    config.ext_queues.get_low_read = total;
    let caps = LaneCaps {
        max_in_flight_count: 4,
        max_in_flight_cost: 1_000,
    };
    config.lanes.gets = caps;
    config.lanes.discover = caps;
    config.lanes.log_puts = caps;
    config.lanes.huge_puts = caps;
    config
}

pub fn new_front(config: FrontConfig, now: Instant) -> AdmissionFront {
    let membership = Membership::new(POSITION, view(1)).expect("membership");
    AdmissionFront::new(config, membership, now)
        .expect("front")
        .with_estimator(Box::new(PayloadCostEstimator::default()))
}

pub fn bring_up(front: &mut AdmissionFront, now: Instant) -> Vec<FrontAction> {
    let mut actions = front
        .step(
            FrontEvent::Recovery(RecoveryReport::LocalRecoveryDone {
                disk: DiskParams::default(),
            }),
            now,
        )
        .expect("local recovery");
    actions.extend(
        front
            .step(FrontEvent::Recovery(RecoveryReport::ConsistencyCheckDone), now)
            .expect("consistency check"),
    );
    actions
}

pub fn operational_front(config: FrontConfig, now: Instant) -> AdmissionFront {
    let mut front = new_front(config, now);
    bring_up(&mut front, now);
    front
}

pub fn sender(endpoint: u64) -> SenderId {
    SenderId::new(7, endpoint)
}

pub fn blob(size: u64) -> BlobId {
    BlobId {
        tablet: 72,
        generation: 1,
        step: 3,
        channel: 0,
        cookie: 0,
        size,
    }
}

pub fn qos(msg: u64) -> MsgQos {
    MsgQos {
        seq: SequenceId::new(0, msg),
        ..MsgQos::default()
    }
}

pub fn put(endpoint: u64, msg: u64, cost: u64) -> Request {
    put_with(endpoint, qos(msg), cost, PutHandleClass::TabletLog)
}

pub fn put_with(endpoint: u64, qos: MsgQos, cost: u64, handle: PutHandleClass) -> Request {
    Request::new(
        sender(endpoint),
        qos.seq.msg,
        target(1),
        RequestClass::Put(PutRequest {
            blob: blob(cost),
            handle,
            data_len: cost,
        }),
    )
    .with_scope(SCOPE)
    .with_qos(qos)
    .with_byte_size(cost)
}

pub fn get(endpoint: u64, msg: u64, bytes: u64, handle: GetHandleClass) -> Request {
    Request::new(
        sender(endpoint),
        msg,
        target(1),
        RequestClass::Get(GetRequest {
            handle,
            queries: vec![ReadQuery {
                blob: blob(bytes),
                offset: 0,
                size: bytes,
            }],
            index_only: false,
        }),
    )
    .with_scope(SCOPE)
    .with_qos(qos(msg))
}

pub fn send(front: &mut AdmissionFront, request: Request, now: Instant) -> Vec<FrontAction> {
    front
        .step(FrontEvent::Request(request), now)
        .expect("request step")
}

pub fn complete(
    front: &mut AdmissionFront,
    forwarded: &ForwardedRequest,
    now: Instant,
) -> Vec<FrontAction> {
    front
        .step(
            FrontEvent::Completion(Completion::ok(forwarded.ctx.clone())),
            now,
        )
        .expect("completion step")
}

pub fn replies(actions: &[FrontAction]) -> Vec<&Reply> {
    actions.iter().filter_map(FrontAction::as_reply).collect()
}

pub fn forwards(actions: &[FrontAction]) -> Vec<&ForwardedRequest> {
    actions.iter().filter_map(FrontAction::as_forward).collect()
}

pub fn single_reply(actions: &[FrontAction]) -> &Reply {
    let found = replies(actions);
    assert_eq!(found.len(), 1, "expected one reply in {actions:?}");
    found[0]
}

pub fn single_forward(actions: &[FrontAction]) -> &ForwardedRequest {
    let found = forwards(actions);
    assert_eq!(found.len(), 1, "expected one forward in {actions:?}");
    found[0]
}
