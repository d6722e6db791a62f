use crate::front::event::{FrontAction, FrontEvent};
use crate::front::AdmissionFront;
use crate::lifecycle::LifecycleState;
use crate::observability::{FrontHealthSnapshot, MetricsRegistry};
use crate::util::error::FrontError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Cloneable handle that serialises events from several producers into one
/// front.
#[derive(Debug, Clone)]
pub struct SharedAdmissionFront {
    inner: Arc<Mutex<AdmissionFront>>,
}

impl SharedAdmissionFront {
    pub fn new(front: AdmissionFront) -> Self {
        Self {
            inner: Arc::new(Mutex::new(front)),
        }
    }

    pub fn step(&self, event: FrontEvent, now: Instant) -> Result<Vec<FrontAction>, FrontError> {
        self.inner.lock().step(event, now)
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state()
    }

    pub fn health(&self) -> FrontHealthSnapshot {
        self.inner.lock().health()
    }

    pub fn publish_metrics(&self, registry: &mut MetricsRegistry) -> Result<(), FrontError> {
        self.inner.lock().publish_metrics(registry)
    }
}
