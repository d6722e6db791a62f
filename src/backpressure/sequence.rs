use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-stream message sequence. `epoch` changes when a client restarts its
/// stream; `msg` increases by one for every request inside an epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct SequenceId {
    pub epoch: u64,
    pub msg: u64,
}

impl SequenceId {
    pub const fn new(epoch: u64, msg: u64) -> Self {
        Self { epoch, msg }
    }

    pub fn next(self) -> Self {
        Self {
            epoch: self.epoch,
            msg: self.msg.saturating_add(1),
        }
    }

    /// True when `self` opens a newer epoch than `expected`.
    pub fn resets(self, expected: SequenceId) -> bool {
        self.epoch > expected.epoch
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.epoch, self.msg)
    }
}
