//! Periodic task scheduling for the timeout reaper
//!
//! The handler only needs "run this callback every N" and "stop doing
//! that", so the seam is a small trait. [`TokioScheduler`] is the default
//! implementation; tests can substitute their own to drive sweeps by hand.
//!
//! Cancellation is observed only between runs: a callback that has already
//! started is allowed to finish, so a sweep is never cut off halfway.

use crate::barrier::error::{BarrierError, BarrierResult};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Callback run on every tick
pub type PeriodicCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Something that can run a callback at a fixed interval
pub trait TaskScheduler: Send + Sync {
    fn schedule_periodic(
        &self,
        callback: PeriodicCallback,
        interval: Duration,
    ) -> BarrierResult<ScheduledTask>;
}

/// Handle to a scheduled periodic task
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct ScheduledTask {
    cancel_tx: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Wrap an already spawned task with its cancellation sender
    pub fn new(cancel_tx: watch::Sender<bool>, join: Option<JoinHandle<()>>) -> Self {
        Self { cancel_tx, join }
    }

    /// Request cancellation; an in-flight run still completes
    pub fn cancel(&self) {
        // send_replace does not fail when the task has already exited
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Cancel and wait for the task to exit
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                log::warn!("Periodic task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Runs periodic callbacks on a tokio runtime
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler {
    handle: Option<Handle>,
}

impl TokioScheduler {
    /// Use whichever runtime is current when a task gets scheduled
    pub fn new() -> Self {
        Self::default()
    }

    /// Always spawn onto the given runtime
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn runtime(&self) -> BarrierResult<Handle> {
        match &self.handle {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current().map_err(|e| BarrierError::Scheduler {
                message: format!("No tokio runtime available: {}", e),
            }),
        }
    }
}

impl TaskScheduler for TokioScheduler {
    fn schedule_periodic(
        &self,
        callback: PeriodicCallback,
        interval: Duration,
    ) -> BarrierResult<ScheduledTask> {
        if interval.is_zero() {
            return Err(BarrierError::Scheduler {
                message: "Periodic interval must be greater than zero".to_string(),
            });
        }

        let runtime = self.runtime()?;
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        let join = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = cancel_rx.changed() => {
                        if changed.is_err() || *cancel_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                if *cancel_rx.borrow() {
                    break;
                }
                callback().await;
            }

            log::debug!("Periodic task stopped");
        });

        Ok(ScheduledTask::new(cancel_tx, Some(join)))
    }
}
