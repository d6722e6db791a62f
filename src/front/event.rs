use super::classes::{ExtQueueId, IntQueueId, RequestKind};
use super::membership::{MembershipView, NodeIdentity};
use super::reply::{Reply, ReplyStatus, StreamWindowStatus};
use super::request::{ClientStreamId, Request, SenderId};
use crate::backpressure::SequenceId;
use crate::lifecycle::{LifecycleState, RecoveryReport};
use crate::observability::FrontHealthSnapshot;
use std::time::{Duration, Instant};

/// Input to [`AdmissionFront::step`](super::AdmissionFront::step).
#[derive(Debug, Clone)]
pub enum FrontEvent {
    Request(Request),
    Completion(Completion),
    Recovery(RecoveryReport),
    MembershipUpdate(MembershipView),
    EngineFailure { reason: String },
    HealthTick,
}

/// Accounting that travels with a throttled request to the engine and comes
/// back with its completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub sender: SenderId,
    pub cookie: u64,
    pub kind: RequestKind,
    pub stream: ClientStreamId,
    pub seq: SequenceId,
    pub ext: ExtQueueId,
    pub lane: IntQueueId,
    pub cost: u64,
    pub bytes: u64,
    pub received_at: Instant,
    /// Time spent in the lane FIFO; `None` when admitted on arrival.
    pub in_queue: Option<Duration>,
    pub send_cost_settings: bool,
}

#[derive(Debug, Clone)]
pub struct ForwardedRequest {
    pub ctx: RequestContext,
    pub request: Request,
}

/// Storage-engine result for a forwarded request.
#[derive(Debug, Clone)]
pub struct Completion {
    pub ctx: RequestContext,
    pub status: ReplyStatus,
    pub payload: Vec<u8>,
}

impl Completion {
    pub fn ok(ctx: RequestContext) -> Self {
        Self {
            ctx,
            status: ReplyStatus::Ok,
            payload: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FrontAction {
    Reply(Reply),
    /// Hand a throttled request to the storage engine.
    Forward(ForwardedRequest),
    /// Hand a maintenance request to the storage engine outside flow control.
    ForwardUnthrottled(Request),
    WindowChange {
        owner: SenderId,
        status: StreamWindowStatus,
    },
    DropConnection {
        owner: SenderId,
        status: StreamWindowStatus,
    },
    ReadyNotify {
        recipient: SenderId,
        state: LifecycleState,
    },
    MembershipApplied {
        identity: NodeIdentity,
    },
    ShutdownEngine,
    StatusUpdate(FrontHealthSnapshot),
}

impl FrontAction {
    pub fn as_reply(&self) -> Option<&Reply> {
        match self {
            FrontAction::Reply(reply) => Some(reply),
            _ => None,
        }
    }

    pub fn as_forward(&self) -> Option<&ForwardedRequest> {
        match self {
            FrontAction::Forward(forwarded) => Some(forwarded),
            _ => None,
        }
    }
}
