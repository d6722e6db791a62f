use crate::front::cost::DiskParams;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    Recovering,
    ConsistencyCheck,
    Operational,
    Failed,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Recovering => "Recovering",
            LifecycleState::ConsistencyCheck => "ConsistencyCheck",
            LifecycleState::Operational => "Operational",
            LifecycleState::Failed => "Failed",
        }
    }

    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        matches!(
            (self, next),
            (LifecycleState::Recovering, LifecycleState::ConsistencyCheck)
                | (LifecycleState::ConsistencyCheck, LifecycleState::Operational)
                | (LifecycleState::Recovering, LifecycleState::Failed)
                | (LifecycleState::ConsistencyCheck, LifecycleState::Failed)
                | (LifecycleState::Operational, LifecycleState::Failed)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryPhase {
    LocalRecovery,
    ConsistencyCheck,
}

/// Progress report from the recovery collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryReport {
    LocalRecoveryDone { disk: DiskParams },
    ConsistencyCheckDone,
    Failed { phase: RecoveryPhase, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("illegal lifecycle transition {from} -> {to}")]
    IllegalTransition {
        from: LifecycleState,
        to: LifecycleState,
    },
    #[error("{phase:?} report received in state {state}")]
    UnexpectedReport {
        phase: RecoveryPhase,
        state: LifecycleState,
    },
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: LifecycleState,
    entered_at: Instant,
    failure: Option<String>,
}

impl Lifecycle {
    pub fn new(now: Instant) -> Self {
        Self {
            state: LifecycleState::Recovering,
            entered_at: now,
            failure: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn is_failed(&self) -> bool {
        self.state == LifecycleState::Failed
    }

    pub fn transition(&mut self, next: LifecycleState, now: Instant) -> Result<(), LifecycleError> {
        if !self.state.can_transition_to(next) {
            return Err(LifecycleError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        info!(
            "event=lifecycle_transition from={} to={} held_ms={}",
            self.state,
            next,
            now.saturating_duration_since(self.entered_at).as_millis()
        );
        self.state = next;
        self.entered_at = now;
        Ok(())
    }

    /// Moves to `Failed`. Returns false when the node had already failed.
    pub fn fail(&mut self, reason: impl Into<String>, now: Instant) -> bool {
        if self.is_failed() {
            return false;
        }
        let reason = reason.into();
        error!(
            "event=lifecycle_failed from={} held_ms={} reason={}",
            self.state,
            now.saturating_duration_since(self.entered_at).as_millis(),
            reason
        );
        self.state = LifecycleState::Failed;
        self.entered_at = now;
        self.failure = Some(reason);
        true
    }
}
