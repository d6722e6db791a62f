use super::classes::RequestKind;
use super::cost::DiskParams;
use super::request::{ClientStreamId, SenderId};
use crate::backpressure::{SequenceId, WindowStatus};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

pub type StreamWindowStatus = WindowStatus<ClientStreamId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Ok,
    NoData,
    Error,
    Race,
    NotReady,
    TryLater,
    TryLaterSize,
    Deadline,
    NodeErrorState,
    AccessDenied,
}

impl ReplyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplyStatus::Ok => "ok",
            ReplyStatus::NoData => "no_data",
            ReplyStatus::Error => "error",
            ReplyStatus::Race => "race",
            ReplyStatus::NotReady => "not_ready",
            ReplyStatus::TryLater => "try_later",
            ReplyStatus::TryLaterSize => "try_later_size",
            ReplyStatus::Deadline => "deadline",
            ReplyStatus::NodeErrorState => "node_error_state",
            ReplyStatus::AccessDenied => "access_denied",
        }
    }
}

impl fmt::Display for ReplyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class-specific reply to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub recipient: SenderId,
    pub cookie: u64,
    pub kind: RequestKind,
    pub status: ReplyStatus,
    pub reason: Option<String>,
    pub window: Option<StreamWindowStatus>,
    pub expected: Option<SequenceId>,
    pub cost_settings: Option<DiskParams>,
    pub received_at: Option<Instant>,
    pub in_queue: Option<Duration>,
    pub payload: Vec<u8>,
}

impl Reply {
    pub fn new(recipient: SenderId, cookie: u64, kind: RequestKind, status: ReplyStatus) -> Self {
        Self {
            recipient,
            cookie,
            kind,
            status,
            reason: None,
            window: None,
            expected: None,
            cost_settings: None,
            received_at: None,
            in_queue: None,
            payload: Vec::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_window(mut self, window: Option<StreamWindowStatus>) -> Self {
        self.window = window;
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ReplyStatus::Ok
    }
}
