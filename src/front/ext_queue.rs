use super::classes::ExtQueueId;
use super::event::FrontAction;
use super::reply::{ReplyStatus, StreamWindowStatus};
use super::request::ClientStreamId;
use crate::backpressure::{
    BackpressureError, Feedback, FeedbackStatus, QueueBackpressure, Release, SequenceId,
    StreamStats, WindowParams,
};
use crate::observability::{ExtQueueHealth, StreamHealth};
use log::{debug, info, warn};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtAdmission {
    Admitted(StreamWindowStatus),
    Rejected {
        status: ReplyStatus,
        reason: &'static str,
        window: StreamWindowStatus,
    },
}

/// Flow-control queue shared by the request classes of one wire-level
/// queue identity.
#[derive(Debug)]
pub struct ExternalQueue {
    id: ExtQueueId,
    backpressure: QueueBackpressure<ClientStreamId>,
}

impl ExternalQueue {
    pub fn new(id: ExtQueueId, params: WindowParams) -> Result<Self, BackpressureError> {
        Ok(Self {
            id,
            backpressure: QueueBackpressure::new(params)?,
        })
    }

    pub fn id(&self) -> ExtQueueId {
        self.id
    }

    pub fn enqueue(
        &mut self,
        stream: &ClientStreamId,
        seq: SequenceId,
        cost: u64,
        now: Instant,
        out: &mut Vec<FrontAction>,
    ) -> ExtAdmission {
        let feedback = self.backpressure.push(stream, seq, cost, now);
        let window = notify_others(feedback, out);
        match window.status {
            FeedbackStatus::IncorrectMsgId => {
                warn!(
                    "event=ext_incorrect_sequence queue={} sender={} seq={} expected={}",
                    self.id, stream.sender, seq, window.expected
                );
                ExtAdmission::Rejected {
                    status: ReplyStatus::TryLater,
                    reason: "incorrect message id",
                    window,
                }
            }
            FeedbackStatus::Overflow => {
                warn!(
                    "event=ext_overflow queue={} sender={} seq={} cost={} in_flight={} window={}",
                    self.id, stream.sender, seq, cost, window.in_flight_cost, window.max_window
                );
                ExtAdmission::Rejected {
                    status: ReplyStatus::TryLaterSize,
                    reason: "queue overflow",
                    window,
                }
            }
            _ => {
                debug!(
                    "event=ext_admit queue={} sender={} seq={} cost={}",
                    self.id, stream.sender, seq, cost
                );
                ExtAdmission::Admitted(window)
            }
        }
    }

    /// Releases the cost of a finished request and forwards window changes
    /// to the owners of the affected streams.
    pub fn complete(
        &mut self,
        stream: &ClientStreamId,
        seq: SequenceId,
        cost: u64,
        now: Instant,
        out: &mut Vec<FrontAction>,
    ) -> Option<StreamWindowStatus> {
        self.release(stream, seq, cost, Release::Completed, now, out)
    }

    pub fn deadline_happened(
        &mut self,
        stream: &ClientStreamId,
        seq: SequenceId,
        cost: u64,
        now: Instant,
        out: &mut Vec<FrontAction>,
    ) -> Option<StreamWindowStatus> {
        self.release(stream, seq, cost, Release::DeadlineExpired, now, out)
    }

    pub fn dropped_with_error(
        &mut self,
        stream: &ClientStreamId,
        seq: SequenceId,
        cost: u64,
        now: Instant,
        out: &mut Vec<FrontAction>,
    ) -> Option<StreamWindowStatus> {
        self.release(stream, seq, cost, Release::Failed, now, out)
    }

    fn release(
        &mut self,
        stream: &ClientStreamId,
        seq: SequenceId,
        cost: u64,
        outcome: Release,
        now: Instant,
        out: &mut Vec<FrontAction>,
    ) -> Option<StreamWindowStatus> {
        self.backpressure
            .release(stream, seq, cost, outcome, now)
            .map(|feedback| notify_others(feedback, out))
    }

    pub fn stream_stats(&self, stream: &ClientStreamId) -> Option<StreamStats> {
        self.backpressure.stream_stats(stream)
    }

    pub fn expected_sequence(&self, stream: &ClientStreamId) -> Option<SequenceId> {
        self.backpressure.expected_sequence(stream)
    }

    /// Voids one stream's window and tells its owner to re-establish it.
    pub fn disconnect(&mut self, stream: &ClientStreamId, out: &mut Vec<FrontAction>) -> bool {
        match self.backpressure.drop_stream(stream) {
            Some(status) => {
                out.push(FrontAction::DropConnection {
                    owner: stream.sender,
                    status,
                });
                true
            }
            None => false,
        }
    }

    /// Invalidates every stream; owners must re-establish their windows.
    pub fn disconnect_all(&mut self, out: &mut Vec<FrontAction>) -> usize {
        let mut count = 0;
        for (stream, _) in self.backpressure.streams() {
            if self.disconnect(&stream, out) {
                count += 1;
            }
        }
        if count > 0 {
            info!("event=ext_disconnect queue={} streams={}", self.id, count);
        }
        count
    }

    pub fn health(&self) -> ExtQueueHealth {
        let stats = self.backpressure.stats();
        ExtQueueHealth {
            queue: self.id,
            streams: stats.streams,
            in_flight_cost: stats.in_flight_cost,
            allocated_cost: stats.allocated_cost,
            overflows: stats.overflows,
            incorrect_sequences: stats.incorrect_sequences,
            deadlines: stats.deadlines,
            errors: stats.errors,
            disconnects: stats.disconnects,
            expired_streams: stats.expired_streams,
            stream_stats: self
                .backpressure
                .streams()
                .into_iter()
                .map(|(stream, stats)| StreamHealth { stream, stats })
                .collect(),
        }
    }
}

fn notify_others(
    feedback: Feedback<ClientStreamId>,
    out: &mut Vec<FrontAction>,
) -> StreamWindowStatus {
    for status in feedback.notifications {
        out.push(FrontAction::WindowChange {
            owner: status.stream.sender,
            status,
        });
    }
    feedback.window
}
