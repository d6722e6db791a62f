use super::event::{Completion, ForwardedRequest, FrontAction, RequestContext};
use super::int_queue::LaneOutcome;
use super::reply::{Reply, ReplyStatus, StreamWindowStatus};
use super::AdmissionFront;
use crate::util::error::FrontError;
use log::debug;
use std::time::Instant;

impl AdmissionFront {
    pub(super) fn on_completion(
        &mut self,
        completion: Completion,
        now: Instant,
        out: &mut Vec<FrontAction>,
    ) -> Result<(), FrontError> {
        let Completion {
            ctx,
            status,
            payload,
        } = completion;
        if self.lifecycle.is_failed() {
            let window =
                self.ext_queues[ctx.ext.index()].complete(&ctx.stream, ctx.seq, ctx.cost, now, out);
            let reply = self
                .context_reply(&ctx, ReplyStatus::NodeErrorState, window)
                .with_reason("node is in error state");
            out.push(FrontAction::Reply(reply));
            return Ok(());
        }

        let drained = self.lanes[ctx.lane.index()].on_completion(ctx.cost, ctx.bytes, now)?;
        let window =
            self.ext_queues[ctx.ext.index()].complete(&ctx.stream, ctx.seq, ctx.cost, now, out);
        debug!(
            "event=completion lane={} sender={} seq={} status={}",
            ctx.lane, ctx.sender, ctx.seq, status
        );
        let reply = self.context_reply(&ctx, status, window).with_payload(payload);
        out.push(FrontAction::Reply(reply));
        for outcome in drained {
            self.resolve_outcome(outcome, now, out);
        }
        Ok(())
    }

    /// Turns a lane decision about a queued request into an engine hand-off
    /// or a terminal reply.
    pub(super) fn resolve_outcome(
        &mut self,
        outcome: LaneOutcome<ForwardedRequest>,
        now: Instant,
        out: &mut Vec<FrontAction>,
    ) {
        match outcome {
            LaneOutcome::Admitted {
                mut item,
                in_queue,
            } => {
                item.ctx.in_queue = Some(in_queue);
                out.push(FrontAction::Forward(item));
            }
            LaneOutcome::DeadlineExpired {
                item,
                cost,
                in_queue,
            } => {
                let mut ctx = item.ctx;
                ctx.in_queue = Some(in_queue);
                let window = self.ext_queues[ctx.ext.index()]
                    .deadline_happened(&ctx.stream, ctx.seq, cost, now, out);
                let reply = self
                    .context_reply(&ctx, ReplyStatus::Deadline, window)
                    .with_reason("deadline exceeded");
                out.push(FrontAction::Reply(reply));
            }
            LaneOutcome::Failed { item, cost } => {
                let mut ctx = item.ctx;
                ctx.in_queue = Some(now.saturating_duration_since(ctx.received_at));
                let window = self.ext_queues[ctx.ext.index()]
                    .dropped_with_error(&ctx.stream, ctx.seq, cost, now, out);
                let reply = self
                    .context_reply(&ctx, ReplyStatus::Error, window)
                    .with_reason("node entered error state");
                out.push(FrontAction::Reply(reply));
            }
        }
    }

    fn context_reply(
        &self,
        ctx: &RequestContext,
        status: ReplyStatus,
        window: Option<StreamWindowStatus>,
    ) -> Reply {
        let mut reply = Reply::new(ctx.sender, ctx.cookie, ctx.kind, status).with_window(window);
        reply.received_at = Some(ctx.received_at);
        reply.in_queue = ctx.in_queue;
        if ctx.send_cost_settings {
            reply.cost_settings = Some(self.estimator.settings());
        }
        reply
    }
}
