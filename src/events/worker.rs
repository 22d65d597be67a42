use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::events::{DomainEvent, MailError};
use crate::model::DatabaseError;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("mail error: {0}")]
    Mail(#[from] MailError),
}

/// Target that turns an event into its side effects.
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn deliver(&self, event: &DomainEvent) -> Result<(), DeliveryError>;
}

/// Consumer side of the outbox.
pub struct EventWorker {
    rx: mpsc::UnboundedReceiver<DomainEvent>,
    target: Arc<dyn Deliver>,
    max_attempts: u32,
    backoff: Duration,
}

impl EventWorker {
    pub fn new(
        rx: mpsc::UnboundedReceiver<DomainEvent>,
        target: Arc<dyn Deliver>,
        max_attempts: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            rx,
            target,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Delivers events until cancelled or until every producer is gone.
    /// On cancellation the queue is closed and whatever is already queued is
    /// still delivered.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!("event worker started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.rx.close();
                    break;
                }
                event = self.rx.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
            }
        }

        let mut drained = 0usize;
        while let Some(event) = self.rx.recv().await {
            self.handle(event).await;
            drained += 1;
        }
        tracing::info!(drained, "event worker stopped");
    }

    async fn handle(&self, event: DomainEvent) {
        let mut delay = self.backoff;
        for attempt in 1..=self.max_attempts {
            match self.target.deliver(&event).await {
                Ok(()) => {
                    tracing::debug!(event = event.name(), attempt, "event delivered");
                    return;
                }
                Err(e) if attempt < self.max_attempts => {
                    tracing::warn!(event = event.name(), attempt, error = %e, "event delivery failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(e) => {
                    tracing::error!(event = event.name(), attempt, error = %e, "event dropped");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use uuid::Uuid;

    use super::*;
    use crate::events::EventBus;

    /// Fails the first `failures` deliveries, then succeeds.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        delivered: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
                delivered: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl Deliver for Flaky {
        async fn deliver(&self, _event: &DomainEvent) -> Result<(), DeliveryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(DeliveryError::Database(DatabaseError::NotFound));
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn event() -> DomainEvent {
        DomainEvent::CoursePendingReview {
            course_id: Uuid::new_v4(),
            course_title: String::from("Rust"),
        }
    }

    async fn run_with(target: Arc<Flaky>, max_attempts: u32, events: usize) {
        let (bus, rx) = EventBus::new();
        let worker = EventWorker::new(rx, target, max_attempts, Duration::from_millis(1));
        for _ in 0..events {
            bus.publish(event());
        }
        drop(bus);
        worker.run(CancellationToken::new()).await;
    }

    #[tokio::test]
    async fn retries_until_success() {
        let target = Flaky::new(2);
        run_with(target.clone(), 3, 1).await;

        assert_eq!(target.calls.load(Ordering::SeqCst), 3);
        assert_eq!(target.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let target = Flaky::new(10);
        run_with(target.clone(), 3, 1).await;

        assert_eq!(target.calls.load(Ordering::SeqCst), 3);
        assert_eq!(target.delivered.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_event_does_not_block_the_next() {
        let target = Flaky::new(2);
        run_with(target.clone(), 2, 2).await;

        // first event: 2 failed attempts, second event: delivered at once
        assert_eq!(target.calls.load(Ordering::SeqCst), 3);
        assert_eq!(target.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_drains_queued_events() {
        let target = Flaky::new(0);
        let (bus, rx) = EventBus::new();
        let worker = EventWorker::new(rx, target.clone(), 1, Duration::from_millis(1));
        for _ in 0..5 {
            bus.publish(event());
        }

        let cancel = CancellationToken::new();
        cancel.cancel();
        worker.run(cancel).await;

        assert_eq!(target.delivered.load(Ordering::SeqCst), 5);
        // the queue is closed now
        bus.publish(event());
    }
}
