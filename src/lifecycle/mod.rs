//! Node lifecycle: recovery, consistency check, service and the absorbing
//! failed state.

mod state;
mod waiters;

pub use state::{Lifecycle, LifecycleError, LifecycleState, RecoveryPhase, RecoveryReport};
pub use waiters::ReadyWaiters;
