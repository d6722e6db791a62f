use super::params::{BackpressureError, WindowParams};
use super::sequence::SequenceId;
use super::window::{CostWindow, FeedbackStatus, WindowStatus};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::Instant;

/// Outcome of a push or a release: the caller's own window plus window
/// changes for other streams whose owners should hear about them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback<C> {
    pub window: WindowStatus<C>,
    pub notifications: Vec<WindowStatus<C>>,
}

impl<C> Feedback<C> {
    fn single(window: WindowStatus<C>) -> Self {
        Self {
            window,
            notifications: Vec::new(),
        }
    }

    pub fn is_good(&self) -> bool {
        self.window.status.is_good()
    }
}

/// How a reserved cost came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Completed,
    DeadlineExpired,
    Failed,
}

/// Counters and window of one live stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub in_flight_cost: u64,
    pub max_window: u64,
    pub overflows: u64,
    pub incorrect_sequences: u64,
    pub deadlines: u64,
    pub errors: u64,
    pub frozen: bool,
}

impl StreamStats {
    fn of(window: &CostWindow) -> Self {
        Self {
            in_flight_cost: window.in_flight_cost,
            max_window: window.max_window,
            overflows: window.overflows,
            incorrect_sequences: window.incorrect_sequences,
            deadlines: window.deadlines,
            errors: window.errors,
            frozen: window.frozen,
        }
    }
}

/// Queue totals: live streams plus everything tallied by streams that have
/// since been dropped or expired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackpressureStats {
    pub streams: usize,
    pub in_flight_cost: u64,
    pub allocated_cost: u64,
    pub overflows: u64,
    pub incorrect_sequences: u64,
    pub deadlines: u64,
    pub errors: u64,
    pub disconnects: u64,
    pub expired_streams: u64,
}

impl BackpressureStats {
    fn tally(&mut self, stream: &StreamStats) {
        self.overflows = self.overflows.saturating_add(stream.overflows);
        self.incorrect_sequences = self
            .incorrect_sequences
            .saturating_add(stream.incorrect_sequences);
        self.deadlines = self.deadlines.saturating_add(stream.deadlines);
        self.errors = self.errors.saturating_add(stream.errors);
    }
}

/// Cost-window admission for every client stream of one external queue.
#[derive(Debug)]
pub struct QueueBackpressure<C> {
    params: WindowParams,
    windows: BTreeMap<C, CostWindow>,
    retired: BackpressureStats,
}

impl<C> QueueBackpressure<C>
where
    C: Clone + Ord + Debug,
{
    pub fn new(params: WindowParams) -> Result<Self, BackpressureError> {
        params.validate()?;
        Ok(Self {
            params,
            windows: BTreeMap::new(),
            retired: BackpressureStats::default(),
        })
    }

    pub fn params(&self) -> &WindowParams {
        &self.params
    }

    pub fn push(&mut self, stream: &C, seq: SequenceId, cost: u64, now: Instant) -> Feedback<C> {
        let params = self.params;
        let share = params.share_for(self.windows.len() + 1);
        let window = self.windows.entry(stream.clone()).or_insert_with(|| {
            debug!(
                "event=window_open stream={:?} seq={} ceiling={}",
                stream, seq, share
            );
            CostWindow::new(seq, share, &params, now)
        });

        if params.check_sequence && !window.accepts(seq) {
            window.incorrect_sequences += 1;
            let mut status = window.status(stream, FeedbackStatus::IncorrectMsgId);
            status.failed = Some(seq);
            return Feedback::single(status);
        }
        if seq.resets(window.expected) {
            info!(
                "event=window_epoch_reset stream={:?} previous={} next={}",
                stream, window.expected, seq
            );
        }
        window.expected = seq.next();
        window.touch(now);

        if !window.reserve(cost) {
            window.starved = true;
            window.overflows += 1;
            let mut status = window.status(stream, FeedbackStatus::Overflow);
            status.failed = Some(seq);
            return Feedback::single(status);
        }
        Feedback::single(window.status(stream, FeedbackStatus::Success))
    }

    /// Releases `cost` reserved by `seq`. Returns `None` when the stream is no
    /// longer tracked, e.g. after a disconnect or idle expiry.
    pub fn processed(
        &mut self,
        stream: &C,
        seq: SequenceId,
        cost: u64,
        now: Instant,
    ) -> Option<Feedback<C>> {
        self.release(stream, seq, cost, Release::Completed, now)
    }

    /// Like [`processed`](Self::processed), recording how the request ended
    /// on the stream's counters. Outcomes for streams no longer tracked still
    /// count toward the queue totals.
    pub fn release(
        &mut self,
        stream: &C,
        seq: SequenceId,
        cost: u64,
        outcome: Release,
        now: Instant,
    ) -> Option<Feedback<C>> {
        let params = self.params;
        let share = params.share_for(self.windows.len());
        let (window, shrank) = {
            let Some(window) = self.windows.get_mut(stream) else {
                match outcome {
                    Release::Completed => {}
                    Release::DeadlineExpired => {
                        self.retired.deadlines = self.retired.deadlines.saturating_add(1)
                    }
                    Release::Failed => self.retired.errors = self.retired.errors.saturating_add(1),
                }
                return None;
            };
            match outcome {
                Release::Completed => {}
                Release::DeadlineExpired => window.deadlines += 1,
                Release::Failed => window.errors += 1,
            }
            if !window.release(cost) {
                warn!(
                    "event=window_release_underflow stream={:?} seq={} cost={}",
                    stream, seq, cost
                );
            }
            let before = window.max_window;
            let mut kind = FeedbackStatus::Processed;
            if window.due_for_recalculation(&params) && window.recalculate(share, &params) {
                debug!(
                    "event=window_recalculated stream={:?} ceiling={} previous={}",
                    stream, window.max_window, before
                );
                kind = FeedbackStatus::WindowUpdate;
            }
            (window.status(stream, kind), window.max_window < before)
        };

        let mut notifications = Vec::new();
        let expired = self.age_idle_windows(stream, cost, now, &mut notifications);
        if shrank || expired > 0 {
            self.grant_starved(stream, &mut notifications);
        }
        Some(Feedback {
            window,
            notifications,
        })
    }

    pub fn expected_sequence(&self, stream: &C) -> Option<SequenceId> {
        self.windows.get(stream).map(|window| window.expected)
    }

    pub fn window(&self, stream: &C) -> Option<WindowStatus<C>> {
        self.windows
            .get(stream)
            .map(|window| window.status(stream, FeedbackStatus::Processed))
    }

    pub fn is_tracked(&self, stream: &C) -> bool {
        self.windows.contains_key(stream)
    }

    pub fn stream_stats(&self, stream: &C) -> Option<StreamStats> {
        self.windows.get(stream).map(StreamStats::of)
    }

    /// Every live stream with its counters, in stream order.
    pub fn streams(&self) -> Vec<(C, StreamStats)> {
        self.windows
            .iter()
            .map(|(stream, window)| (stream.clone(), StreamStats::of(window)))
            .collect()
    }

    /// Forgets one stream and returns its final status, flagged dead.
    pub fn drop_stream(&mut self, stream: &C) -> Option<WindowStatus<C>> {
        let status = self.retire(stream)?;
        self.retired.disconnects = self.retired.disconnects.saturating_add(1);
        Some(status)
    }

    pub fn stats(&self) -> BackpressureStats {
        let mut stats = BackpressureStats {
            streams: self.windows.len(),
            in_flight_cost: 0,
            allocated_cost: 0,
            ..self.retired
        };
        for window in self.windows.values() {
            stats.in_flight_cost = stats.in_flight_cost.saturating_add(window.in_flight_cost);
            stats.allocated_cost = stats.allocated_cost.saturating_add(window.max_window);
            stats.tally(&StreamStats::of(window));
        }
        stats
    }

    /// Removes a window, folding its counters into the queue totals.
    fn retire(&mut self, stream: &C) -> Option<WindowStatus<C>> {
        let window = self.windows.remove(stream)?;
        self.retired.tally(&StreamStats::of(&window));
        let mut status = window.status(stream, FeedbackStatus::WindowUpdate);
        status.dead = true;
        Some(status)
    }

    fn age_idle_windows(
        &mut self,
        initiator: &C,
        cost: u64,
        now: Instant,
        notifications: &mut Vec<WindowStatus<C>>,
    ) -> usize {
        let params = self.params;
        let mut dead = Vec::new();
        for (stream, window) in self.windows.iter_mut() {
            if stream == initiator {
                continue;
            }
            window.idle_churn = window.idle_churn.saturating_add(cost);
            if window.is_dead(&params, now) {
                dead.push(stream.clone());
            } else if !window.frozen && window.idle_churn >= params.cost_change_until_frozen {
                window.frozen = true;
                debug!("event=window_frozen stream={:?}", stream);
                notifications.push(window.status(stream, FeedbackStatus::WindowUpdate));
            }
        }
        for stream in &dead {
            if let Some(status) = self.retire(stream) {
                info!("event=window_expired stream={:?}", stream);
                self.retired.expired_streams += 1;
                notifications.push(status);
            }
        }
        dead.len()
    }

    fn grant_starved(&mut self, initiator: &C, notifications: &mut Vec<WindowStatus<C>>) {
        let params = self.params;
        let share = params.share_for(self.windows.len());
        let allocated = self
            .windows
            .values()
            .map(|window| window.max_window)
            .fold(0u64, u64::saturating_add);
        let mut spare = params.total_cost.saturating_sub(allocated);
        for (stream, window) in self.windows.iter_mut() {
            if spare == 0 {
                break;
            }
            if stream == initiator || !window.starved || window.frozen {
                continue;
            }
            let granted = window.grant(share, spare, &params);
            if granted > 0 {
                spare -= granted;
                notifications.push(window.status(stream, FeedbackStatus::WindowUpdate));
            }
        }
    }
}
