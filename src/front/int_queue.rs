use super::classes::IntQueueId;
use crate::observability::{HealthLight, LaneHealth};
use log::{debug, warn};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LaneError {
    #[error("lane {lane} completion underflows in-flight counters (count={count} cost={cost}/{released_cost} bytes={bytes}/{released_bytes})")]
    CounterUnderflow {
        lane: IntQueueId,
        count: u64,
        cost: u64,
        released_cost: u64,
        bytes: u64,
        released_bytes: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneLimits {
    pub max_in_flight_count: u64,
    pub max_in_flight_cost: u64,
}

/// A request accepted by flow control that waits for lane capacity.
#[derive(Debug)]
pub struct DelayedRequest<T> {
    pub item: T,
    pub cost: u64,
    pub bytes: u64,
    pub received_at: Instant,
    pub deadline: Option<Instant>,
}

#[derive(Debug)]
pub enum LaneAdmission<T> {
    Admitted(T),
    Delayed,
}

/// Resolution of a FIFO entry.
#[derive(Debug)]
pub enum LaneOutcome<T> {
    Admitted { item: T, in_queue: Duration },
    DeadlineExpired { item: T, cost: u64, in_queue: Duration },
    Failed { item: T, cost: u64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneCounters {
    pub in_flight_count: u64,
    pub in_flight_cost: u64,
    pub in_flight_bytes: u64,
    pub delayed_count: u64,
    pub delayed_cost: u64,
    pub delayed_bytes: u64,
    pub deadlines: u64,
    pub failed: u64,
    pub cost_processed: u64,
}

/// Concurrency and cost gate of one lane. Requests are admitted in arrival
/// order; a request never overtakes the FIFO head.
#[derive(Debug)]
pub struct InternalQueue<T> {
    id: IntQueueId,
    limits: LaneLimits,
    fifo: VecDeque<DelayedRequest<T>>,
    counters: LaneCounters,
}

impl<T> InternalQueue<T> {
    pub fn new(id: IntQueueId, limits: LaneLimits) -> Self {
        Self {
            id,
            limits,
            fifo: VecDeque::new(),
            counters: LaneCounters::default(),
        }
    }

    pub fn id(&self) -> IntQueueId {
        self.id
    }

    pub fn limits(&self) -> LaneLimits {
        self.limits
    }

    pub fn counters(&self) -> LaneCounters {
        self.counters
    }

    pub fn delayed_len(&self) -> usize {
        self.fifo.len()
    }

    fn can_admit(&self, cost: u64) -> bool {
        self.counters.in_flight_count < self.limits.max_in_flight_count
            && (self.counters.in_flight_count == 0
                || self.counters.in_flight_cost.saturating_add(cost)
                    < self.limits.max_in_flight_cost)
    }

    fn mark_in_flight(&mut self, cost: u64, bytes: u64) {
        self.counters.in_flight_count += 1;
        self.counters.in_flight_cost = self.counters.in_flight_cost.saturating_add(cost);
        self.counters.in_flight_bytes = self.counters.in_flight_bytes.saturating_add(bytes);
    }

    pub fn try_admit(&mut self, request: DelayedRequest<T>) -> LaneAdmission<T> {
        if self.fifo.is_empty() && self.can_admit(request.cost) {
            self.mark_in_flight(request.cost, request.bytes);
            debug!(
                "event=lane_admit lane={} cost={} in_flight={}",
                self.id, request.cost, self.counters.in_flight_count
            );
            return LaneAdmission::Admitted(request.item);
        }
        self.counters.delayed_count += 1;
        self.counters.delayed_cost = self.counters.delayed_cost.saturating_add(request.cost);
        self.counters.delayed_bytes = self.counters.delayed_bytes.saturating_add(request.bytes);
        debug!(
            "event=lane_delay lane={} cost={} delayed={}",
            self.id, request.cost, self.counters.delayed_count
        );
        self.fifo.push_back(request);
        LaneAdmission::Delayed
    }

    fn pop_head(&mut self) -> Option<DelayedRequest<T>> {
        let head = self.fifo.pop_front()?;
        self.counters.delayed_count -= 1;
        self.counters.delayed_cost = self.counters.delayed_cost.saturating_sub(head.cost);
        self.counters.delayed_bytes = self.counters.delayed_bytes.saturating_sub(head.bytes);
        Some(head)
    }

    /// Resolves FIFO heads while they are admittable. An expired head is
    /// resolved as a deadline even if capacity is available.
    pub fn drain_ready(&mut self, now: Instant) -> Vec<LaneOutcome<T>> {
        let mut outcomes = Vec::new();
        while let Some(head) = self.fifo.front() {
            if !self.can_admit(head.cost) {
                break;
            }
            let Some(head) = self.pop_head() else {
                break;
            };
            let in_queue = now.saturating_duration_since(head.received_at);
            if head.deadline.is_some_and(|deadline| now >= deadline) {
                self.counters.deadlines += 1;
                warn!(
                    "event=lane_deadline lane={} cost={} in_queue_ms={}",
                    self.id,
                    head.cost,
                    in_queue.as_millis()
                );
                outcomes.push(LaneOutcome::DeadlineExpired {
                    item: head.item,
                    cost: head.cost,
                    in_queue,
                });
                continue;
            }
            self.mark_in_flight(head.cost, head.bytes);
            outcomes.push(LaneOutcome::Admitted {
                item: head.item,
                in_queue,
            });
        }
        outcomes
    }

    /// Releases one in-flight request and admits whatever now fits.
    pub fn on_completion(
        &mut self,
        cost: u64,
        bytes: u64,
        now: Instant,
    ) -> Result<Vec<LaneOutcome<T>>, LaneError> {
        let counters = &mut self.counters;
        if counters.in_flight_count == 0
            || counters.in_flight_cost < cost
            || counters.in_flight_bytes < bytes
        {
            return Err(LaneError::CounterUnderflow {
                lane: self.id,
                count: counters.in_flight_count,
                cost: counters.in_flight_cost,
                released_cost: cost,
                bytes: counters.in_flight_bytes,
                released_bytes: bytes,
            });
        }
        counters.in_flight_count -= 1;
        counters.in_flight_cost -= cost;
        counters.in_flight_bytes -= bytes;
        counters.cost_processed = counters.cost_processed.saturating_add(cost);
        Ok(self.drain_ready(now))
    }

    /// Resolves every queued request as failed and forgets in-flight work,
    /// whose completions will no longer be accounted here.
    pub fn fail_all(&mut self) -> Vec<LaneOutcome<T>> {
        let mut outcomes = Vec::with_capacity(self.fifo.len());
        while let Some(head) = self.pop_head() {
            self.counters.failed += 1;
            outcomes.push(LaneOutcome::Failed {
                item: head.item,
                cost: head.cost,
            });
        }
        self.counters.in_flight_count = 0;
        self.counters.in_flight_cost = 0;
        self.counters.in_flight_bytes = 0;
        outcomes
    }

    pub fn light(&self) -> HealthLight {
        let c = &self.counters;
        let mut light = HealthLight::Green;
        if c.in_flight_count > self.limits.max_in_flight_count / 2
            || c.in_flight_cost > self.limits.max_in_flight_cost / 2
        {
            light = HealthLight::Yellow;
        }
        if c.delayed_count > 0 || c.delayed_bytes > 0 {
            light = HealthLight::Red;
        }
        light
    }

    pub fn health(&self) -> LaneHealth {
        let c = &self.counters;
        LaneHealth {
            lane: self.id,
            in_flight_count: c.in_flight_count,
            in_flight_cost: c.in_flight_cost,
            in_flight_bytes: c.in_flight_bytes,
            delayed_count: c.delayed_count,
            delayed_bytes: c.delayed_bytes,
            deadlines: c.deadlines,
            failed: c.failed,
            cost_processed: c.cost_processed,
            light: self.light(),
        }
    }
}
