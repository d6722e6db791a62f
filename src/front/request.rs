use super::classes::{
    ClassRule, ExtQueueId, GetHandleClass, IntQueueId, LaneRule, PutHandleClass, RequestKind,
};
use super::membership::{MembershipView, NodeIdentity};
use crate::backpressure::SequenceId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use thiserror::Error;

/// Endpoint that sent a request and receives its reply.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SenderId {
    pub node: u32,
    pub endpoint: u64,
}

impl SenderId {
    pub const fn new(node: u32, endpoint: u64) -> Self {
        Self { node, endpoint }
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.endpoint)
    }
}

/// One flow-controlled stream inside an external queue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ClientStreamId {
    pub sender: SenderId,
    pub queue: ExtQueueId,
    pub discriminator: u64,
}

/// Flow-control header of a throttled request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MsgQos {
    pub seq: SequenceId,
    pub discriminator: u64,
    pub deadline: Option<Instant>,
    pub send_me_cost_settings: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobId {
    pub tablet: u64,
    pub generation: u32,
    pub step: u32,
    pub channel: u8,
    pub cookie: u32,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    pub blob: BlobId,
    pub handle: PutHandleClass,
    pub data_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutItem {
    pub blob: BlobId,
    pub data_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiPutRequest {
    pub tablet: u64,
    pub handle: PutHandleClass,
    pub items: Vec<PutItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadQuery {
    pub blob: BlobId,
    pub offset: u64,
    /// Zero reads to the end of the blob.
    pub size: u64,
}

impl ReadQuery {
    pub fn read_len(&self) -> u64 {
        if self.size == 0 {
            self.blob.size.saturating_sub(self.offset)
        } else {
            self.size
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub handle: GetHandleClass,
    pub queries: Vec<ReadQuery>,
    pub index_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRequest {
    pub tablet: u64,
    pub generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectGarbageRequest {
    pub tablet: u64,
    pub keep: Vec<BlobId>,
    pub do_not_keep: Vec<BlobId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetBarrierRequest {
    pub tablet_from: u64,
    pub tablet_to: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRequest {
    pub original: BlobId,
    pub patched: BlobId,
    pub diff_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReadinessRequest {
    pub queue: ExtQueueId,
    pub discriminator: u64,
}

/// Request class together with its class-specific payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestClass {
    Put(PutRequest),
    MultiPut(MultiPutRequest),
    Get(GetRequest),
    Block(BlockRequest),
    GetBlock { tablet: u64 },
    CollectGarbage(CollectGarbageRequest),
    GetBarrier(GetBarrierRequest),
    PatchStart(PatchRequest),
    PatchDiff(PatchRequest),
    PatchXorDiff(PatchRequest),
    MovedPatch(PatchRequest),
    CheckReadiness(CheckReadinessRequest),
    Status,
    Stats,
    Compact,
    Defragment,
    Assimilate,
    SyncLogTrim,
    ConsistencyCheckQuery,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("blob tablet id is zero")]
    ZeroTablet,
    #[error("data length {data_len} does not match blob size {blob_size}")]
    SizeMismatch { data_len: u64, blob_size: u64 },
    #[error("empty payload")]
    EmptyData,
    #[error("multi-put carries no items")]
    NoItems,
    #[error("multi-put item {index} belongs to tablet {actual}, expected {expected}")]
    MixedTablets {
        index: usize,
        expected: u64,
        actual: u64,
    },
    #[error("get carries no queries")]
    NoQueries,
    #[error("query {index} reads past the end of the blob")]
    ReadOutOfRange { index: usize },
}

impl RequestClass {
    pub fn kind(&self) -> RequestKind {
        match self {
            RequestClass::Put(_) => RequestKind::Put,
            RequestClass::MultiPut(_) => RequestKind::MultiPut,
            RequestClass::Get(_) => RequestKind::Get,
            RequestClass::Block(_) => RequestKind::Block,
            RequestClass::GetBlock { .. } => RequestKind::GetBlock,
            RequestClass::CollectGarbage(_) => RequestKind::CollectGarbage,
            RequestClass::GetBarrier(_) => RequestKind::GetBarrier,
            RequestClass::PatchStart(_) => RequestKind::PatchStart,
            RequestClass::PatchDiff(_) => RequestKind::PatchDiff,
            RequestClass::PatchXorDiff(_) => RequestKind::PatchXorDiff,
            RequestClass::MovedPatch(_) => RequestKind::MovedPatch,
            RequestClass::CheckReadiness(_) => RequestKind::CheckReadiness,
            RequestClass::Status => RequestKind::Status,
            RequestClass::Stats => RequestKind::Stats,
            RequestClass::Compact => RequestKind::Compact,
            RequestClass::Defragment => RequestKind::Defragment,
            RequestClass::Assimilate => RequestKind::Assimilate,
            RequestClass::SyncLogTrim => RequestKind::SyncLogTrim,
            RequestClass::ConsistencyCheckQuery => RequestKind::ConsistencyCheckQuery,
        }
    }

    /// The class table: external queue and lane rule per class.
    pub fn rule(&self) -> ClassRule {
        match self {
            RequestClass::Put(put) => ClassRule::Throttled {
                ext: put.handle.ext_queue(),
                lane: LaneRule::Write {
                    huge: put.handle.huge_lane(),
                },
            },
            RequestClass::MultiPut(multi) => ClassRule::Throttled {
                ext: multi.handle.ext_queue(),
                lane: LaneRule::Write {
                    huge: multi.handle.huge_lane(),
                },
            },
            RequestClass::Get(get) => ClassRule::Throttled {
                ext: get.handle.ext_queue(),
                lane: LaneRule::Fixed(get.handle.lane()),
            },
            RequestClass::Block(_) | RequestClass::CollectGarbage(_) => ClassRule::Throttled {
                ext: ExtQueueId::PutTabletLog,
                lane: LaneRule::Fixed(IntQueueId::PutLog),
            },
            RequestClass::GetBlock { .. }
            | RequestClass::GetBarrier(_)
            | RequestClass::PatchStart(_) => ClassRule::Throttled {
                ext: ExtQueueId::GetFastRead,
                lane: LaneRule::Fixed(IntQueueId::GetFast),
            },
            RequestClass::PatchDiff(_)
            | RequestClass::PatchXorDiff(_)
            | RequestClass::MovedPatch(_) => ClassRule::Throttled {
                ext: ExtQueueId::PutAsyncBlob,
                lane: LaneRule::Fixed(IntQueueId::PutHugeBackground),
            },
            RequestClass::CheckReadiness(check) => ClassRule::Readiness { ext: check.queue },
            RequestClass::Status
            | RequestClass::Stats
            | RequestClass::Compact
            | RequestClass::Defragment
            | RequestClass::Assimilate
            | RequestClass::SyncLogTrim
            | RequestClass::ConsistencyCheckQuery => ClassRule::Unthrottled,
        }
    }

    /// Structural checks for the classes that define them.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            RequestClass::Put(put) => validate_item(&put.blob, put.data_len),
            RequestClass::MultiPut(multi) => {
                if multi.items.is_empty() {
                    return Err(ValidationError::NoItems);
                }
                for (index, item) in multi.items.iter().enumerate() {
                    if item.blob.tablet != multi.tablet {
                        return Err(ValidationError::MixedTablets {
                            index,
                            expected: multi.tablet,
                            actual: item.blob.tablet,
                        });
                    }
                    validate_item(&item.blob, item.data_len)?;
                }
                Ok(())
            }
            RequestClass::Get(get) => {
                if get.queries.is_empty() {
                    return Err(ValidationError::NoQueries);
                }
                for (index, query) in get.queries.iter().enumerate() {
                    if query.blob.tablet == 0 {
                        return Err(ValidationError::ZeroTablet);
                    }
                    let end = query.offset.saturating_add(query.read_len());
                    if query.offset > query.blob.size || end > query.blob.size {
                        return Err(ValidationError::ReadOutOfRange { index });
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn validate_item(blob: &BlobId, data_len: u64) -> Result<(), ValidationError> {
    if blob.tablet == 0 {
        return Err(ValidationError::ZeroTablet);
    }
    if data_len == 0 {
        return Err(ValidationError::EmptyData);
    }
    if data_len != blob.size {
        return Err(ValidationError::SizeMismatch {
            data_len,
            blob_size: blob.size,
        });
    }
    Ok(())
}

/// Inbound request envelope.
#[derive(Debug, Clone)]
pub struct Request {
    pub sender: SenderId,
    pub cookie: u64,
    pub target: NodeIdentity,
    pub scope: Option<String>,
    pub qos: Option<MsgQos>,
    pub notify_if_not_ready: bool,
    /// Newer membership view the sender may carry for generation races.
    pub recent_membership: Option<MembershipView>,
    pub class: RequestClass,
    pub byte_size: u64,
}

impl Request {
    pub fn new(sender: SenderId, cookie: u64, target: NodeIdentity, class: RequestClass) -> Self {
        Self {
            sender,
            cookie,
            target,
            scope: None,
            qos: None,
            notify_if_not_ready: false,
            recent_membership: None,
            class,
            byte_size: 0,
        }
    }

    pub fn with_qos(mut self, qos: MsgQos) -> Self {
        self.qos = Some(qos);
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_byte_size(mut self, byte_size: u64) -> Self {
        self.byte_size = byte_size;
        self
    }

    pub fn notify_when_ready(mut self) -> Self {
        self.notify_if_not_ready = true;
        self
    }

    pub fn with_membership(mut self, view: MembershipView) -> Self {
        self.recent_membership = Some(view);
        self
    }

    pub fn kind(&self) -> RequestKind {
        self.class.kind()
    }

    pub fn stream(&self, queue: ExtQueueId) -> ClientStreamId {
        ClientStreamId {
            sender: self.sender,
            queue,
            discriminator: self.qos.as_ref().map_or(0, |qos| qos.discriminator),
        }
    }
}
