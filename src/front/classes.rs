use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire-level flow-control queue a request class belongs to. Each one owns
/// an independent set of cost windows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ExtQueueId {
    PutTabletLog,
    PutAsyncBlob,
    PutUserData,
    GetAsyncRead,
    GetFastRead,
    GetDiscover,
    GetLowRead,
}

impl ExtQueueId {
    pub const ALL: [ExtQueueId; 7] = [
        ExtQueueId::PutTabletLog,
        ExtQueueId::PutAsyncBlob,
        ExtQueueId::PutUserData,
        ExtQueueId::GetAsyncRead,
        ExtQueueId::GetFastRead,
        ExtQueueId::GetDiscover,
        ExtQueueId::GetLowRead,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ExtQueueId::PutTabletLog => "put_tablet_log",
            ExtQueueId::PutAsyncBlob => "put_async_blob",
            ExtQueueId::PutUserData => "put_user_data",
            ExtQueueId::GetAsyncRead => "get_async_read",
            ExtQueueId::GetFastRead => "get_fast_read",
            ExtQueueId::GetDiscover => "get_discover",
            ExtQueueId::GetLowRead => "get_low_read",
        }
    }
}

impl fmt::Display for ExtQueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Internal processing lane in front of the storage engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IntQueueId {
    PutLog,
    PutHugeForeground,
    PutHugeBackground,
    GetAsync,
    GetFast,
    GetLow,
    GetDiscover,
}

impl IntQueueId {
    pub const ALL: [IntQueueId; 7] = [
        IntQueueId::PutLog,
        IntQueueId::PutHugeForeground,
        IntQueueId::PutHugeBackground,
        IntQueueId::GetAsync,
        IntQueueId::GetFast,
        IntQueueId::GetLow,
        IntQueueId::GetDiscover,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            IntQueueId::PutLog => "put_log",
            IntQueueId::PutHugeForeground => "put_huge_foreground",
            IntQueueId::PutHugeBackground => "put_huge_background",
            IntQueueId::GetAsync => "get_async",
            IntQueueId::GetFast => "get_fast",
            IntQueueId::GetLow => "get_low",
            IntQueueId::GetDiscover => "get_discover",
        }
    }

    pub fn group(self) -> LaneGroup {
        match self {
            IntQueueId::PutLog => LaneGroup::LogPuts,
            IntQueueId::PutHugeForeground | IntQueueId::PutHugeBackground => LaneGroup::HugePuts,
            IntQueueId::GetAsync | IntQueueId::GetFast | IntQueueId::GetLow => LaneGroup::Gets,
            IntQueueId::GetDiscover => LaneGroup::Discover,
        }
    }
}

impl fmt::Display for IntQueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lanes sharing one pair of in-flight caps in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneGroup {
    Gets,
    Discover,
    LogPuts,
    HugePuts,
}

const COMPATIBILITY: [[bool; 7]; 7] = {
    const X: bool = true;
    const O: bool = false;
    [
        // put_log huge_fg huge_bg get_async get_fast get_low discover
        [X, X, O, O, O, O, O], // put_tablet_log
        [X, O, X, O, O, O, O], // put_async_blob
        [X, X, O, O, O, O, O], // put_user_data
        [O, O, O, X, O, O, O], // get_async_read
        [O, O, O, O, X, O, O], // get_fast_read
        [O, O, O, O, O, O, X], // get_discover
        [O, O, O, O, O, X, O], // get_low_read
    ]
};

/// Whether requests of external queue `ext` may be processed on `lane`.
pub fn compatible(ext: ExtQueueId, lane: IntQueueId) -> bool {
    COMPATIBILITY[ext.index()][lane.index()]
}

/// Priority class a writer attaches to a blob put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PutHandleClass {
    TabletLog,
    AsyncBlob,
    UserData,
}

impl PutHandleClass {
    pub fn ext_queue(self) -> ExtQueueId {
        match self {
            PutHandleClass::TabletLog => ExtQueueId::PutTabletLog,
            PutHandleClass::AsyncBlob => ExtQueueId::PutAsyncBlob,
            PutHandleClass::UserData => ExtQueueId::PutUserData,
        }
    }

    /// Lane for blobs too large for the log lane.
    pub fn huge_lane(self) -> IntQueueId {
        match self {
            PutHandleClass::TabletLog | PutHandleClass::UserData => IntQueueId::PutHugeForeground,
            PutHandleClass::AsyncBlob => IntQueueId::PutHugeBackground,
        }
    }
}

/// Priority class a reader attaches to a get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GetHandleClass {
    AsyncRead,
    FastRead,
    Discover,
    LowRead,
}

impl GetHandleClass {
    pub fn ext_queue(self) -> ExtQueueId {
        match self {
            GetHandleClass::AsyncRead => ExtQueueId::GetAsyncRead,
            GetHandleClass::FastRead => ExtQueueId::GetFastRead,
            GetHandleClass::Discover => ExtQueueId::GetDiscover,
            GetHandleClass::LowRead => ExtQueueId::GetLowRead,
        }
    }

    pub fn lane(self) -> IntQueueId {
        match self {
            GetHandleClass::AsyncRead => IntQueueId::GetAsync,
            GetHandleClass::FastRead => IntQueueId::GetFast,
            GetHandleClass::Discover => IntQueueId::GetDiscover,
            GetHandleClass::LowRead => IntQueueId::GetLow,
        }
    }
}

/// Tag of a request class, used in replies, logs and the class table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Put,
    MultiPut,
    Get,
    Block,
    GetBlock,
    CollectGarbage,
    GetBarrier,
    PatchStart,
    PatchDiff,
    PatchXorDiff,
    MovedPatch,
    CheckReadiness,
    Status,
    Stats,
    Compact,
    Defragment,
    Assimilate,
    SyncLogTrim,
    ConsistencyCheckQuery,
}

impl RequestKind {
    pub fn name(self) -> &'static str {
        match self {
            RequestKind::Put => "put",
            RequestKind::MultiPut => "multi_put",
            RequestKind::Get => "get",
            RequestKind::Block => "block",
            RequestKind::GetBlock => "get_block",
            RequestKind::CollectGarbage => "collect_garbage",
            RequestKind::GetBarrier => "get_barrier",
            RequestKind::PatchStart => "patch_start",
            RequestKind::PatchDiff => "patch_diff",
            RequestKind::PatchXorDiff => "patch_xor_diff",
            RequestKind::MovedPatch => "moved_patch",
            RequestKind::CheckReadiness => "check_readiness",
            RequestKind::Status => "status",
            RequestKind::Stats => "stats",
            RequestKind::Compact => "compact",
            RequestKind::Defragment => "defragment",
            RequestKind::Assimilate => "assimilate",
            RequestKind::SyncLogTrim => "sync_log_trim",
            RequestKind::ConsistencyCheckQuery => "consistency_check_query",
        }
    }

    /// Maintenance classes that keep answering NotReady once the node failed.
    pub fn not_ready_when_failed(self) -> bool {
        matches!(
            self,
            RequestKind::Compact | RequestKind::Defragment | RequestKind::SyncLogTrim
        )
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the router picks the lane of a flow-controlled class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneRule {
    Fixed(IntQueueId),
    /// Log lane unless the cost model marks the write as huge.
    Write { huge: IntQueueId },
}

impl LaneRule {
    pub fn resolve(self, huge: bool) -> IntQueueId {
        match self {
            LaneRule::Fixed(lane) => lane,
            LaneRule::Write { huge: huge_lane } if huge => huge_lane,
            LaneRule::Write { .. } => IntQueueId::PutLog,
        }
    }
}

/// Row of the class table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassRule {
    Throttled { ext: ExtQueueId, lane: LaneRule },
    Readiness { ext: ExtQueueId },
    Unthrottled,
}
