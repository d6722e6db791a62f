use super::classes::{compatible, ClassRule, ExtQueueId, LaneRule};
use super::event::{ForwardedRequest, FrontAction, RequestContext};
use super::ext_queue::ExtAdmission;
use super::int_queue::{DelayedRequest, LaneAdmission};
use super::membership::TargetCheck;
use super::reply::{Reply, ReplyStatus};
use super::request::{ClientStreamId, Request, RequestClass};
use super::AdmissionFront;
use crate::util::error::{ContractViolation, FrontError};
use log::{debug, warn};
use std::time::Instant;

impl AdmissionFront {
    pub(super) fn handle_operational(
        &mut self,
        request: Request,
        now: Instant,
        out: &mut Vec<FrontAction>,
    ) -> Result<(), FrontError> {
        match request.class.rule() {
            ClassRule::Throttled { ext, lane } => self.route_throttled(request, ext, lane, now, out),
            ClassRule::Readiness { ext } => self.check_readiness(request, ext, now, out),
            ClassRule::Unthrottled => self.forward_unthrottled(request, now, out),
        }
    }

    /// Addressing and scope checks shared by every class that names a
    /// target. Returns the rejection to send, if any. A membership view
    /// carried by the request is caller data: failing to adopt it is a race,
    /// never a node fault.
    fn screen(
        &mut self,
        request: &Request,
        now: Instant,
        out: &mut Vec<FrontAction>,
    ) -> Option<Reply> {
        match self.membership.check_target(&request.target) {
            TargetCheck::Match => {}
            TargetCheck::Foreign => {
                return Some(self.gate_reply(
                    request,
                    ReplyStatus::Race,
                    "target replica mismatch",
                    now,
                ));
            }
            TargetCheck::GenerationMismatch { local, requested } => {
                let refreshed = match &request.recent_membership {
                    Some(view) if view.generation > local => {
                        match self.apply_membership(view, out) {
                            Ok(applied) => applied,
                            Err(err) => {
                                warn!(
                                    "event=carried_membership_rejected sender={} group={} generation={} error={}",
                                    request.sender, view.group_id, view.generation, err
                                );
                                false
                            }
                        }
                    }
                    _ => false,
                };
                if !refreshed || self.membership.check_target(&request.target) != TargetCheck::Match
                {
                    debug!(
                        "event=generation_race sender={} local={} requested={}",
                        request.sender,
                        self.membership.identity().generation,
                        requested
                    );
                    return Some(self.gate_reply(
                        request,
                        ReplyStatus::Race,
                        "group generation mismatch",
                        now,
                    ));
                }
            }
        }
        if !self
            .membership
            .permits(request.scope.as_deref(), self.config.access.allow_unscoped)
        {
            self.access_denied += 1;
            warn!(
                "event=access_denied sender={} kind={} scope={:?}",
                request.sender,
                request.kind(),
                request.scope
            );
            return Some(self.gate_reply(
                request,
                ReplyStatus::AccessDenied,
                "access denied",
                now,
            ));
        }
        None
    }

    fn route_throttled(
        &mut self,
        request: Request,
        ext: ExtQueueId,
        lane_rule: LaneRule,
        now: Instant,
        out: &mut Vec<FrontAction>,
    ) -> Result<(), FrontError> {
        let Some(qos) = request.qos.clone() else {
            let reply = self.gate_reply(&request, ReplyStatus::Error, "missing flow-control header", now);
            out.push(FrontAction::Reply(reply));
            return Ok(());
        };
        if let Some(reply) = self.screen(&request, now, out) {
            out.push(FrontAction::Reply(reply));
            return Ok(());
        }
        if let Err(err) = request.class.validate() {
            debug!(
                "event=request_invalid sender={} kind={} error={}",
                request.sender,
                request.kind(),
                err
            );
            let reply = self.gate_reply(&request, ReplyStatus::Error, &err.to_string(), now);
            out.push(FrontAction::Reply(reply));
            return Ok(());
        }

        let estimate = self.estimator.estimate(&request.class);
        let lane = lane_rule.resolve(estimate.huge);
        if !compatible(ext, lane) {
            return Err(ContractViolation::IncompatibleQueues { ext, lane }.into());
        }

        let stream = request.stream(ext);
        match self.ext_queues[ext.index()].enqueue(&stream, qos.seq, estimate.cost, now, out) {
            ExtAdmission::Admitted(_) => {}
            ExtAdmission::Rejected {
                status,
                reason,
                window,
            } => {
                let reply = self
                    .gate_reply(&request, status, reason, now)
                    .with_window(Some(window));
                out.push(FrontAction::Reply(reply));
                return Ok(());
            }
        }

        let ctx = RequestContext {
            sender: request.sender,
            cookie: request.cookie,
            kind: request.kind(),
            stream,
            seq: qos.seq,
            ext,
            lane,
            cost: estimate.cost,
            bytes: request.byte_size,
            received_at: now,
            in_queue: None,
            send_cost_settings: qos.send_me_cost_settings,
        };
        let delayed = DelayedRequest {
            cost: ctx.cost,
            bytes: ctx.bytes,
            received_at: now,
            deadline: qos.deadline,
            item: ForwardedRequest { ctx, request },
        };
        match self.lanes[lane.index()].try_admit(delayed) {
            LaneAdmission::Admitted(forwarded) => out.push(FrontAction::Forward(forwarded)),
            LaneAdmission::Delayed => {}
        }
        Ok(())
    }

    /// Answers with the caller's expected sequence and the cost settings so
    /// it can resume a stream after a reconnect.
    fn check_readiness(
        &mut self,
        request: Request,
        ext: ExtQueueId,
        now: Instant,
        out: &mut Vec<FrontAction>,
    ) -> Result<(), FrontError> {
        if let Some(reply) = self.screen(&request, now, out) {
            out.push(FrontAction::Reply(reply));
            return Ok(());
        }
        let discriminator = match &request.class {
            RequestClass::CheckReadiness(check) => check.discriminator,
            _ => 0,
        };
        let stream = ClientStreamId {
            sender: request.sender,
            queue: ext,
            discriminator,
        };
        let mut reply = Reply::new(request.sender, request.cookie, request.kind(), ReplyStatus::Ok);
        reply.expected = self.ext_queues[ext.index()].expected_sequence(&stream);
        reply.cost_settings = Some(self.estimator.settings());
        out.push(FrontAction::Reply(reply));
        Ok(())
    }

    pub(super) fn forward_unthrottled(
        &mut self,
        request: Request,
        now: Instant,
        out: &mut Vec<FrontAction>,
    ) -> Result<(), FrontError> {
        if let Some(reply) = self.screen(&request, now, out) {
            out.push(FrontAction::Reply(reply));
            return Ok(());
        }
        self.unthrottled_forwarded += 1;
        debug!(
            "event=forward_unthrottled sender={} kind={}",
            request.sender,
            request.kind()
        );
        out.push(FrontAction::ForwardUnthrottled(request));
        Ok(())
    }
}
