//! Admission and flow-control front-end of a replicated block-storage node.
//!
//! Requests pass a lifecycle gate, are classified and validated, reserve
//! cost in a per-client window of their external queue and finally wait for
//! capacity on one internal lane before they reach the storage engine.

pub mod backpressure;
pub mod config;
#[cfg(feature = "async-driver")]
pub mod driver;
pub mod front;
pub mod lifecycle;
pub mod observability;
pub mod prelude;
pub mod shared;
pub mod util;

pub use backpressure::{
    BackpressureError, BackpressureStats, Feedback, FeedbackStatus, QueueBackpressure, Release,
    SequenceId, StreamStats, WindowParams, WindowStatus,
};
pub use config::{
    AccessConfig, ConfigError, ExtQueueConfig, FrontConfig, LaneCaps, LaneConfig, WindowConfig,
    CONFIG_ENV,
};
pub use front::classes::{
    compatible, ClassRule, ExtQueueId, GetHandleClass, IntQueueId, LaneGroup, LaneRule,
    PutHandleClass, RequestKind,
};
pub use front::cost::{CostEstimate, CostEstimator, DiskCostModel, DiskParams};
pub use front::event::{Completion, ForwardedRequest, FrontAction, FrontEvent, RequestContext};
pub use front::ext_queue::{ExtAdmission, ExternalQueue};
pub use front::int_queue::{
    DelayedRequest, InternalQueue, LaneAdmission, LaneCounters, LaneError, LaneLimits,
    LaneOutcome,
};
pub use front::membership::{
    MemberSlot, Membership, MembershipChange, MembershipError, MembershipView, NodeIdentity,
    TargetCheck,
};
pub use front::reply::{Reply, ReplyStatus, StreamWindowStatus};
pub use front::request::{
    BlobId, BlockRequest, CheckReadinessRequest, ClientStreamId, CollectGarbageRequest,
    GetBarrierRequest, GetRequest, MsgQos, MultiPutRequest, PatchRequest, PutItem, PutRequest,
    ReadQuery, Request, RequestClass, SenderId, ValidationError,
};
pub use front::AdmissionFront;
pub use lifecycle::{
    Lifecycle, LifecycleError, LifecycleState, ReadyWaiters, RecoveryPhase, RecoveryReport,
};
pub use observability::{
    ExtQueueHealth, FrontHealthSnapshot, HealthLight, LaneHealth, MetricsRegistry,
    MetricsSnapshot, TelemetryError,
};
pub use shared::SharedAdmissionFront;
pub use util::error::{ContractViolation, FrontError, FrontResult, SerializationError};
