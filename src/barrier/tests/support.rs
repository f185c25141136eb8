//! Shared fixtures for barrier tests

use crate::barrier::api::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::watch;

/// One part of a group announced to have `size` parts
pub(crate) fn part(key: &str, number: i64, size: i64) -> Message {
    Message::new(format!("{}-{}", key, number))
        .with_header(CORRELATION_ID, key)
        .with_header(SEQUENCE_NUMBER, number)
        .with_header(SEQUENCE_SIZE, size)
}

/// A queue channel wrapped for handler use, plus its receiving end
pub(crate) fn queue(name: &str) -> (ChannelRef, mpsc::Receiver<Message>) {
    let (channel, receiver) = QueueChannel::bounded(name, 1024);
    (ChannelRef::new(channel), receiver)
}

/// Everything currently buffered on a receiver
pub(crate) fn drain_payloads(receiver: &mut mpsc::Receiver<Message>) -> Vec<String> {
    let mut payloads = Vec::new();
    while let Ok(message) = receiver.try_recv() {
        payloads.push(message.payload);
    }
    payloads
}

/// Scheduler that never runs anything on its own
///
/// Tests call [`ManualScheduler::tick`] to run every registered callback
/// once, which stands in for one period elapsing.
#[derive(Clone, Default)]
pub(crate) struct ManualScheduler {
    scheduled: Arc<Mutex<Vec<(PeriodicCallback, Duration, watch::Receiver<bool>)>>>,
}

impl ManualScheduler {
    pub(crate) fn scheduled_count(&self) -> usize {
        self.scheduled.lock().unwrap().len()
    }

    pub(crate) fn intervals(&self) -> Vec<Duration> {
        self.scheduled
            .lock()
            .unwrap()
            .iter()
            .map(|(_, interval, _)| *interval)
            .collect()
    }

    pub(crate) fn active_count(&self) -> usize {
        self.scheduled
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, _, cancelled)| !*cancelled.borrow())
            .count()
    }

    /// Run every callback ever registered, cancelled or not
    pub(crate) async fn run_all_ignoring_cancellation(&self) {
        let callbacks: Vec<PeriodicCallback> = self
            .scheduled
            .lock()
            .unwrap()
            .iter()
            .map(|(callback, _, _)| callback.clone())
            .collect();
        for callback in callbacks {
            callback().await;
        }
    }

    /// Run each callback whose task has not been cancelled
    pub(crate) async fn tick(&self) {
        let callbacks: Vec<PeriodicCallback> = self
            .scheduled
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, _, cancelled)| !*cancelled.borrow())
            .map(|(callback, _, _)| callback.clone())
            .collect();
        for callback in callbacks {
            callback().await;
        }
    }
}

impl TaskScheduler for ManualScheduler {
    fn schedule_periodic(
        &self,
        callback: PeriodicCallback,
        interval: Duration,
    ) -> BarrierResult<ScheduledTask> {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.scheduled
            .lock()
            .unwrap()
            .push((callback, interval, cancel_rx));
        Ok(ScheduledTask::new(cancel_tx, None))
    }
}
