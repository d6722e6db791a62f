use super::params::WindowParams;
use super::sequence::SequenceId;
use serde::Serialize;
use std::time::Instant;

/// Consecutive quiet recalculation intervals before a window shrinks.
const QUIET_INTERVALS_BEFORE_SHRINK: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    Success,
    WindowUpdate,
    Processed,
    IncorrectMsgId,
    Overflow,
}

impl FeedbackStatus {
    pub fn is_good(self) -> bool {
        matches!(
            self,
            FeedbackStatus::Success | FeedbackStatus::WindowUpdate | FeedbackStatus::Processed
        )
    }
}

/// Snapshot of one stream's window, attached to replies and pushed to idle
/// owners as a window-change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowStatus<C> {
    pub stream: C,
    pub status: FeedbackStatus,
    pub expected: SequenceId,
    pub failed: Option<SequenceId>,
    pub in_flight_cost: u64,
    pub max_window: u64,
    pub low_watermark: u64,
    pub high_watermark: u64,
    pub frozen: bool,
    pub dead: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct CostWindow {
    pub(crate) expected: SequenceId,
    pub(crate) in_flight_cost: u64,
    pub(crate) max_window: u64,
    pub(crate) low_watermark: u64,
    pub(crate) high_watermark: u64,
    cost_change: u64,
    peak_in_flight: u64,
    quiet_intervals: u32,
    pub(crate) starved: bool,
    pub(crate) idle_churn: u64,
    pub(crate) frozen: bool,
    pub(crate) last_activity: Instant,
    pub(crate) overflows: u64,
    pub(crate) incorrect_sequences: u64,
    pub(crate) deadlines: u64,
    pub(crate) errors: u64,
}

impl CostWindow {
    pub(crate) fn new(expected: SequenceId, ceiling: u64, params: &WindowParams, now: Instant) -> Self {
        let mut window = Self {
            expected,
            in_flight_cost: 0,
            max_window: ceiling.min(params.total_cost),
            low_watermark: 0,
            high_watermark: 0,
            cost_change: 0,
            peak_in_flight: 0,
            quiet_intervals: 0,
            starved: false,
            idle_churn: 0,
            frozen: false,
            last_activity: now,
            overflows: 0,
            incorrect_sequences: 0,
            deadlines: 0,
            errors: 0,
        };
        window.update_watermarks(params);
        window
    }

    pub(crate) fn accepts(&self, seq: SequenceId) -> bool {
        seq == self.expected || seq.resets(self.expected)
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_activity = now;
        self.idle_churn = 0;
        self.frozen = false;
    }

    pub(crate) fn reserve(&mut self, cost: u64) -> bool {
        match self.in_flight_cost.checked_add(cost) {
            Some(next) if next <= self.max_window => {
                self.in_flight_cost = next;
                self.peak_in_flight = self.peak_in_flight.max(next);
                true
            }
            _ => false,
        }
    }

    /// Returns false when the release exceeded the reserved cost.
    pub(crate) fn release(&mut self, cost: u64) -> bool {
        let exact = self.in_flight_cost >= cost;
        self.in_flight_cost = self.in_flight_cost.saturating_sub(cost);
        self.cost_change = self.cost_change.saturating_add(cost);
        exact
    }

    pub(crate) fn due_for_recalculation(&self, params: &WindowParams) -> bool {
        self.cost_change >= params.cost_change_to_recalculate
    }

    /// Re-sizes the ceiling from the utilisation observed since the previous
    /// interval. Returns true when the ceiling moved.
    pub(crate) fn recalculate(&mut self, share: u64, params: &WindowParams) -> bool {
        let before = self.max_window;
        let step = params.cost_change_to_recalculate;
        let busy = self.starved || self.peak_in_flight >= self.high_watermark;
        let mut next = self.max_window;
        if busy {
            self.quiet_intervals = 0;
            if !self.frozen && next < share {
                next = next.saturating_add(step).min(share);
            }
        } else {
            if self.peak_in_flight < self.low_watermark {
                self.quiet_intervals += 1;
                if self.quiet_intervals >= QUIET_INTERVALS_BEFORE_SHRINK {
                    next = next.saturating_sub(step);
                    self.quiet_intervals = 0;
                }
            } else {
                self.quiet_intervals = 0;
            }
            next = next.min(share);
        }
        self.max_window = next
            .max(params.min_low_watermark)
            .min(params.total_cost)
            .max(self.in_flight_cost);
        self.cost_change = 0;
        self.peak_in_flight = self.in_flight_cost;
        self.starved = false;
        self.update_watermarks(params);
        self.max_window != before
    }

    /// Raises the ceiling by at most `budget`, up to `share`. Returns the
    /// amount granted.
    pub(crate) fn grant(&mut self, share: u64, budget: u64, params: &WindowParams) -> u64 {
        let raise = share.saturating_sub(self.max_window).min(budget);
        if raise > 0 {
            self.max_window += raise;
            self.starved = false;
            self.update_watermarks(params);
        }
        raise
    }

    pub(crate) fn is_dead(&self, params: &WindowParams, now: Instant) -> bool {
        self.in_flight_cost == 0
            && self.idle_churn >= params.cost_change_until_death
            && now.saturating_duration_since(self.last_activity) >= params.window_timeout
    }

    pub(crate) fn status<C: Clone>(&self, stream: &C, status: FeedbackStatus) -> WindowStatus<C> {
        WindowStatus {
            stream: stream.clone(),
            status,
            expected: self.expected,
            failed: None,
            in_flight_cost: self.in_flight_cost,
            max_window: self.max_window,
            low_watermark: self.low_watermark,
            high_watermark: self.high_watermark,
            frozen: self.frozen,
            dead: false,
        }
    }

    fn update_watermarks(&mut self, params: &WindowParams) {
        let pt = params.percent_threshold;
        self.high_watermark = self.max_window.saturating_mul(pt) / 100;
        self.low_watermark = (self.max_window.saturating_mul(100 - pt) / 100)
            .clamp(params.min_low_watermark, params.max_low_watermark)
            .min(self.high_watermark);
    }
}
