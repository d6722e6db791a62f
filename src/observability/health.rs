use super::telemetry::{MetricsRegistry, TelemetryError};
use crate::backpressure::StreamStats;
use crate::front::classes::{ExtQueueId, IntQueueId};
use crate::front::request::ClientStreamId;
use crate::lifecycle::LifecycleState;
use serde::Serialize;

/// Three-level status. Ordered so that the worst light is the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
pub enum HealthLight {
    #[default]
    Green,
    Yellow,
    Red,
}

impl HealthLight {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthLight::Green => "green",
            HealthLight::Yellow => "yellow",
            HealthLight::Red => "red",
        }
    }

    fn level(self) -> u64 {
        self as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaneHealth {
    pub lane: IntQueueId,
    pub in_flight_count: u64,
    pub in_flight_cost: u64,
    pub in_flight_bytes: u64,
    pub delayed_count: u64,
    pub delayed_bytes: u64,
    pub deadlines: u64,
    pub failed: u64,
    pub cost_processed: u64,
    pub light: HealthLight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtQueueHealth {
    pub queue: ExtQueueId,
    pub streams: usize,
    pub in_flight_cost: u64,
    pub allocated_cost: u64,
    pub overflows: u64,
    pub incorrect_sequences: u64,
    pub deadlines: u64,
    pub errors: u64,
    pub disconnects: u64,
    pub expired_streams: u64,
    /// Live streams in stream order. Totals above also cover streams that
    /// have since been dropped.
    pub stream_stats: Vec<StreamHealth>,
}

impl ExtQueueHealth {
    pub fn stream(&self, stream: &ClientStreamId) -> Option<&StreamStats> {
        self.stream_stats
            .iter()
            .find(|health| &health.stream == stream)
            .map(|health| &health.stats)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamHealth {
    pub stream: ClientStreamId,
    #[serde(flatten)]
    pub stats: StreamStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrontHealthSnapshot {
    pub state: LifecycleState,
    /// Reason given when the node entered `Failed`.
    pub failure: Option<String>,
    pub light: HealthLight,
    pub lanes: Vec<LaneHealth>,
    pub ext_queues: Vec<ExtQueueHealth>,
    pub access_denied: u64,
    pub unthrottled_forwarded: u64,
    pub ready_waiters: usize,
}

impl FrontHealthSnapshot {
    pub fn lane(&self, lane: IntQueueId) -> Option<&LaneHealth> {
        self.lanes.iter().find(|health| health.lane == lane)
    }

    pub fn ext_queue(&self, queue: ExtQueueId) -> Option<&ExtQueueHealth> {
        self.ext_queues.iter().find(|health| health.queue == queue)
    }

    pub fn publish(&self, registry: &mut MetricsRegistry) -> Result<(), TelemetryError> {
        registry.set_gauge("light", self.light.level())?;
        registry.set_gauge("lifecycle_state", self.state as u64)?;
        registry.set_gauge("ready_waiters", self.ready_waiters as u64)?;
        registry.set_counter("access_denied", self.access_denied)?;
        registry.set_counter("unthrottled_forwarded", self.unthrottled_forwarded)?;
        for lane in &self.lanes {
            let prefix = format!("lane.{}", lane.lane);
            registry.set_gauge(format!("{prefix}.in_flight_count"), lane.in_flight_count)?;
            registry.set_gauge(format!("{prefix}.in_flight_cost"), lane.in_flight_cost)?;
            registry.set_gauge(format!("{prefix}.in_flight_bytes"), lane.in_flight_bytes)?;
            registry.set_gauge(format!("{prefix}.delayed_count"), lane.delayed_count)?;
            registry.set_gauge(format!("{prefix}.delayed_bytes"), lane.delayed_bytes)?;
            registry.set_gauge(format!("{prefix}.light"), lane.light.level())?;
            registry.set_counter(format!("{prefix}.deadlines"), lane.deadlines)?;
            registry.set_counter(format!("{prefix}.failed"), lane.failed)?;
            registry.set_counter(format!("{prefix}.cost_processed"), lane.cost_processed)?;
        }
        for queue in &self.ext_queues {
            let prefix = format!("ext.{}", queue.queue);
            registry.set_gauge(format!("{prefix}.streams"), queue.streams as u64)?;
            registry.set_gauge(format!("{prefix}.in_flight_cost"), queue.in_flight_cost)?;
            registry.set_gauge(format!("{prefix}.allocated_cost"), queue.allocated_cost)?;
            registry.set_counter(format!("{prefix}.overflows"), queue.overflows)?;
            registry.set_counter(
                format!("{prefix}.incorrect_sequences"),
                queue.incorrect_sequences,
            )?;
            registry.set_counter(format!("{prefix}.deadlines"), queue.deadlines)?;
            registry.set_counter(format!("{prefix}.errors"), queue.errors)?;
            registry.set_counter(format!("{prefix}.disconnects"), queue.disconnects)?;
            registry.set_counter(format!("{prefix}.expired_streams"), queue.expired_streams)?;
        }
        Ok(())
    }
}
