use crate::backpressure::BackpressureError;
use crate::config::ConfigError;
use crate::front::classes::{ExtQueueId, IntQueueId};
use crate::front::int_queue::LaneError;
use crate::front::membership::MembershipError;
use crate::lifecycle::LifecycleError;
use crate::observability::TelemetryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Broken internal invariants. The node must stop when one surfaces.
#[derive(Debug, Error)]
pub enum ContractViolation {
    #[error("external queue {ext} is not compatible with lane {lane}")]
    IncompatibleQueues { ext: ExtQueueId, lane: IntQueueId },
    #[error(transparent)]
    Lane(#[from] LaneError),
    #[error(transparent)]
    Membership(#[from] MembershipError),
}

#[derive(Debug, Error)]
pub enum FrontError {
    #[error("contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Backpressure(#[from] BackpressureError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

impl FrontError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, FrontError::ContractViolation(_))
    }
}

impl From<LaneError> for FrontError {
    fn from(err: LaneError) -> Self {
        FrontError::ContractViolation(ContractViolation::Lane(err))
    }
}

impl From<MembershipError> for FrontError {
    fn from(err: MembershipError) -> Self {
        FrontError::ContractViolation(ContractViolation::Membership(err))
    }
}

pub type FrontResult<T> = Result<T, FrontError>;
