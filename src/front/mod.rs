//! Admission front of a storage replica.
//!
//! [`AdmissionFront`] consumes [`FrontEvent`]s one at a time and returns the
//! [`FrontAction`]s the host must perform: replies, engine hand-offs and
//! unsolicited window notifications. Request handling dispatches on the
//! lifecycle state; only an operational node runs the router.

pub mod classes;
pub mod cost;
mod dispatcher;
pub mod event;
pub mod ext_queue;
pub mod int_queue;
pub mod membership;
pub mod reply;
pub mod request;
mod router;

use crate::backpressure::SequenceId;
use crate::config::FrontConfig;
use crate::lifecycle::{
    Lifecycle, LifecycleError, LifecycleState, ReadyWaiters, RecoveryReport,
};
use crate::observability::{FrontHealthSnapshot, HealthLight, MetricsRegistry};
use crate::util::error::FrontError;
use classes::{ExtQueueId, IntQueueId, RequestKind};
use cost::{CostEstimator, DiskCostModel, DiskParams};
use event::{ForwardedRequest, FrontAction, FrontEvent};
use ext_queue::ExternalQueue;
use int_queue::InternalQueue;
use log::{debug, error, info};
use membership::{Membership, MembershipChange, MembershipView, NodeIdentity};
use reply::{Reply, ReplyStatus};
use request::{ClientStreamId, Request};
use std::time::Instant;

pub struct AdmissionFront {
    config: FrontConfig,
    lifecycle: Lifecycle,
    membership: Membership,
    ext_queues: Vec<ExternalQueue>,
    lanes: Vec<InternalQueue<ForwardedRequest>>,
    estimator: Box<dyn CostEstimator>,
    estimator_injected: bool,
    waiters: ReadyWaiters,
    access_denied: u64,
    unthrottled_forwarded: u64,
}

impl AdmissionFront {
    pub fn new(config: FrontConfig, membership: Membership, now: Instant) -> Result<Self, FrontError> {
        config.validate()?;
        let ext_queues = ExtQueueId::ALL
            .iter()
            .map(|queue| ExternalQueue::new(*queue, config.window_params(*queue)))
            .collect::<Result<Vec<_>, _>>()?;
        let lanes = IntQueueId::ALL
            .iter()
            .map(|lane| InternalQueue::new(*lane, config.lanes.limits(*lane)))
            .collect();
        info!(
            "event=front_start identity={} digest={}",
            membership.identity(),
            membership.digest()
        );
        Ok(Self {
            config,
            lifecycle: Lifecycle::new(now),
            membership,
            ext_queues,
            lanes,
            estimator: Box::new(DiskCostModel::new(DiskParams::default())),
            estimator_injected: false,
            waiters: ReadyWaiters::default(),
            access_denied: 0,
            unthrottled_forwarded: 0,
        })
    }

    /// Uses `estimator` instead of the disk model built at recovery.
    pub fn with_estimator(mut self, estimator: Box<dyn CostEstimator>) -> Self {
        self.estimator = estimator;
        self.estimator_injected = true;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn identity(&self) -> NodeIdentity {
        self.membership.identity()
    }

    pub fn config(&self) -> &FrontConfig {
        &self.config
    }

    pub fn expected_sequence(&self, stream: &ClientStreamId) -> Option<SequenceId> {
        self.ext_queues[stream.queue.index()].expected_sequence(stream)
    }

    pub fn step(&mut self, event: FrontEvent, now: Instant) -> Result<Vec<FrontAction>, FrontError> {
        let mut out = Vec::new();
        let result = match event {
            FrontEvent::Request(request) => self.on_request(request, now, &mut out),
            FrontEvent::Completion(completion) => self.on_completion(completion, now, &mut out),
            FrontEvent::Recovery(report) => self.on_recovery(report, now, &mut out),
            FrontEvent::MembershipUpdate(view) => self.apply_membership(&view, &mut out).map(|_| ()),
            FrontEvent::EngineFailure { reason } => {
                self.enter_failed(format!("storage engine failure: {reason}"), now, &mut out);
                Ok(())
            }
            FrontEvent::HealthTick => {
                out.push(FrontAction::StatusUpdate(self.health()));
                Ok(())
            }
        };
        match result {
            Ok(()) => Ok(out),
            Err(err) => {
                if err.is_fatal() {
                    error!("event=contract_violation state={} error={}", self.state(), err);
                }
                Err(err)
            }
        }
    }

    fn on_request(
        &mut self,
        request: Request,
        now: Instant,
        out: &mut Vec<FrontAction>,
    ) -> Result<(), FrontError> {
        match self.lifecycle.state() {
            LifecycleState::Recovering => {
                self.handle_recovering(request, now, out);
                Ok(())
            }
            LifecycleState::ConsistencyCheck => self.handle_consistency_check(request, now, out),
            LifecycleState::Operational => self.handle_operational(request, now, out),
            LifecycleState::Failed => {
                self.handle_failed(request, now, out);
                Ok(())
            }
        }
    }

    fn handle_recovering(&mut self, request: Request, now: Instant, out: &mut Vec<FrontAction>) {
        self.reply_not_ready(&request, "node is recovering", now, out);
    }

    fn handle_consistency_check(
        &mut self,
        request: Request,
        now: Instant,
        out: &mut Vec<FrontAction>,
    ) -> Result<(), FrontError> {
        if request.kind() == RequestKind::ConsistencyCheckQuery {
            return self.forward_unthrottled(request, now, out);
        }
        self.reply_not_ready(&request, "consistency check in progress", now, out);
        Ok(())
    }

    fn handle_failed(&mut self, request: Request, now: Instant, out: &mut Vec<FrontAction>) {
        let status = if request.kind().not_ready_when_failed() {
            ReplyStatus::NotReady
        } else {
            ReplyStatus::NodeErrorState
        };
        let reply = self.gate_reply(&request, status, "node is in error state", now);
        out.push(FrontAction::Reply(reply));
    }

    fn reply_not_ready(
        &mut self,
        request: &Request,
        reason: &str,
        now: Instant,
        out: &mut Vec<FrontAction>,
    ) {
        if request.notify_if_not_ready && self.waiters.register(request.sender) {
            debug!("event=ready_waiter_registered sender={}", request.sender);
        }
        let reply = self.gate_reply(request, ReplyStatus::NotReady, reason, now);
        out.push(FrontAction::Reply(reply));
    }

    /// Reply produced before any queue is touched.
    fn gate_reply(&self, request: &Request, status: ReplyStatus, reason: &str, now: Instant) -> Reply {
        let mut reply = Reply::new(request.sender, request.cookie, request.kind(), status)
            .with_reason(reason);
        if let Some(qos) = &request.qos {
            reply.received_at = Some(now);
            if qos.send_me_cost_settings {
                reply.cost_settings = Some(self.estimator.settings());
            }
        }
        reply
    }

    fn on_recovery(
        &mut self,
        report: RecoveryReport,
        now: Instant,
        out: &mut Vec<FrontAction>,
    ) -> Result<(), FrontError> {
        match report {
            RecoveryReport::LocalRecoveryDone { disk } => {
                self.lifecycle
                    .transition(LifecycleState::ConsistencyCheck, now)?;
                if !self.estimator_injected {
                    self.estimator = Box::new(DiskCostModel::new(disk));
                }
                info!(
                    "event=local_recovery_done seek_ns={} write_bps={} huge_bytes={}",
                    disk.seek_time_ns, disk.write_speed_bps, disk.min_huge_blob_bytes
                );
            }
            RecoveryReport::ConsistencyCheckDone => {
                self.lifecycle.transition(LifecycleState::Operational, now)?;
                self.flush_waiters(out);
            }
            RecoveryReport::Failed { phase, reason } => {
                let state = self.lifecycle.state();
                if !matches!(
                    state,
                    LifecycleState::Recovering | LifecycleState::ConsistencyCheck
                ) {
                    return Err(LifecycleError::UnexpectedReport { phase, state }.into());
                }
                self.enter_failed(format!("{phase:?} failed: {reason}"), now, out);
            }
        }
        Ok(())
    }

    /// Absorbing failure: flushes every lane, voids every window and releases
    /// the engine.
    fn enter_failed(&mut self, reason: String, now: Instant, out: &mut Vec<FrontAction>) {
        if !self.lifecycle.fail(reason, now) {
            return;
        }
        let flushed: Vec<_> = self
            .lanes
            .iter_mut()
            .flat_map(|lane| lane.fail_all())
            .collect();
        for outcome in flushed {
            self.resolve_outcome(outcome, now, out);
        }
        for queue in &mut self.ext_queues {
            queue.disconnect_all(out);
        }
        out.push(FrontAction::ShutdownEngine);
        self.flush_waiters(out);
    }

    fn flush_waiters(&mut self, out: &mut Vec<FrontAction>) {
        if self.waiters.is_empty() {
            return;
        }
        let state = self.lifecycle.state();
        info!(
            "event=ready_notify state={} waiters={}",
            state,
            self.waiters.len()
        );
        for recipient in self.waiters.drain() {
            out.push(FrontAction::ReadyNotify { recipient, state });
        }
    }

    /// Adopts a newer membership view. Returns true when the generation
    /// moved.
    fn apply_membership(
        &mut self,
        view: &MembershipView,
        out: &mut Vec<FrontAction>,
    ) -> Result<bool, FrontError> {
        match self.membership.apply(view)? {
            MembershipChange::Applied { .. } => {
                out.push(FrontAction::MembershipApplied {
                    identity: self.membership.identity(),
                });
                Ok(true)
            }
            MembershipChange::Stale { local, offered } => {
                info!(
                    "event=membership_stale group={} local_generation={} offered_generation={}",
                    view.group_id, local, offered
                );
                Ok(false)
            }
        }
    }

    pub fn health(&self) -> FrontHealthSnapshot {
        let lanes: Vec<_> = self.lanes.iter().map(|lane| lane.health()).collect();
        let light = lanes
            .iter()
            .map(|lane| lane.light)
            .max()
            .unwrap_or(HealthLight::Green);
        FrontHealthSnapshot {
            state: self.lifecycle.state(),
            failure: self.lifecycle.failure().map(str::to_owned),
            light,
            lanes,
            ext_queues: self.ext_queues.iter().map(|queue| queue.health()).collect(),
            access_denied: self.access_denied,
            unthrottled_forwarded: self.unthrottled_forwarded,
            ready_waiters: self.waiters.len(),
        }
    }

    pub fn publish_metrics(&self, registry: &mut MetricsRegistry) -> Result<(), FrontError> {
        self.health().publish(registry)?;
        Ok(())
    }
}

impl std::fmt::Debug for AdmissionFront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionFront")
            .field("state", &self.lifecycle.state())
            .field("identity", &self.membership.identity())
            .field("estimator_injected", &self.estimator_injected)
            .finish_non_exhaustive()
    }
}
