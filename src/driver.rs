use crate::front::event::{FrontAction, FrontEvent};
use crate::shared::SharedAdmissionFront;
use crate::util::error::FrontError;
use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Runs a front on a tokio task: events arrive on a channel, actions leave
/// on another, and a timer injects health ticks.
pub struct FrontDriver {
    front: SharedAdmissionFront,
    health_interval: Duration,
    notify: Arc<Notify>,
    shutdown: Arc<AtomicBool>,
}

pub struct FrontDriverHandle {
    front: SharedAdmissionFront,
    notify: Arc<Notify>,
    shutdown: Arc<AtomicBool>,
    task: JoinHandle<Result<(), FrontError>>,
}

impl FrontDriver {
    pub fn new(front: SharedAdmissionFront, health_interval: Duration) -> Self {
        Self {
            front,
            health_interval,
            notify: Arc::new(Notify::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn spawn(
        self,
        mut events: mpsc::Receiver<FrontEvent>,
        actions: mpsc::UnboundedSender<FrontAction>,
    ) -> FrontDriverHandle {
        let front = self.front.clone();
        let notify = self.notify.clone();
        let shutdown = self.shutdown.clone();
        let health_interval = self.health_interval;
        let task = tokio::spawn(async move {
            let mut ticker = interval(health_interval);
            loop {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                let event = tokio::select! {
                    received = events.recv() => match received {
                        Some(event) => event,
                        None => break,
                    },
                    _ = ticker.tick() => FrontEvent::HealthTick,
                    _ = notify.notified() => continue,
                };
                match front.step(event, Instant::now()) {
                    Ok(produced) => {
                        for action in produced {
                            if actions.send(action).is_err() {
                                info!("event=front_driver_stop reason=action_receiver_closed");
                                return Ok(());
                            }
                        }
                    }
                    Err(err) if err.is_fatal() => {
                        error!("event=front_driver_abort error={}", err);
                        return Err(err);
                    }
                    Err(err) => warn!("event=front_driver_event_rejected error={}", err),
                }
            }
            Ok(())
        });
        FrontDriverHandle {
            front: self.front,
            notify: self.notify,
            shutdown: self.shutdown,
            task,
        }
    }
}

impl FrontDriverHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the loop and returns its result.
    pub async fn shutdown(self) -> Result<(), FrontError> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_one();
        let joined = self.task.await;
        info!("event=front_driver_shutdown state={}", self.front.state());
        match joined {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => {
                std::panic::resume_unwind(join_error.into_panic())
            }
            Err(join_error) => {
                warn!("event=front_driver_cancelled error={}", join_error);
                Ok(())
            }
        }
    }
}
