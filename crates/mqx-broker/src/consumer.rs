//! ---
//! mqx_section: "03-delivery-runtime"
//! mqx_subsection: "module"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Queue handlers and the per-queue delivery worker loop."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, warn};

use mqx_msg::{decode, log_outcome, BrokerMetricsExporter, DeliveryOutcome, Envelope};

/// Business failure raised by a queue handler.
///
/// The delivery worker interprets it as a negative acknowledgement; it is
/// never propagated back to the producer.
#[derive(Debug, thiserror::Error)]
#[error("handler failure: {message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Wrap a failure description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Processing logic registered for a single queue.
///
/// Returning `Ok` acknowledges the delivery and retains any mutations the
/// handler made to the envelope (typically setting `receiver`). Returning
/// `Err` negatively acknowledges it, requeueing the unchanged wire payload.
#[async_trait]
pub trait QueueHandler: Send + Sync {
    /// Service identity, recorded as the envelope receiver by convention.
    fn name(&self) -> &str;

    /// Process one delivered envelope.
    async fn handle(&self, envelope: &mut Envelope) -> Result<(), HandlerError>;
}

/// One unit of queue traffic: the encoded envelope plus its redelivery count.
#[derive(Debug)]
pub(crate) struct Delivery {
    pub(crate) bytes: Vec<u8>,
    pub(crate) redeliveries: u32,
}

/// Everything a queue worker needs to resolve deliveries.
pub(crate) struct WorkerContext {
    pub(crate) queue: String,
    pub(crate) handler: Arc<dyn QueueHandler>,
    pub(crate) concurrency: usize,
    pub(crate) redelivery_cap: Option<u32>,
    pub(crate) requeue: mpsc::UnboundedSender<Delivery>,
    pub(crate) dead_letter: Option<mpsc::UnboundedSender<Delivery>>,
    pub(crate) metrics: Option<BrokerMetricsExporter>,
}

/// Spawn the worker task for one queue.
///
/// A semaphore bounds in-flight handler invocations; with one permit the next
/// delivery is not pulled until the previous one resolved, which is what
/// gives single-consumer FIFO up to redelivery.
pub(crate) fn spawn_queue_worker(
    mut receiver: mpsc::UnboundedReceiver<Delivery>,
    context: WorkerContext,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let semaphore = Arc::new(Semaphore::new(context.concurrency.max(1)));
        let context = Arc::new(context);
        loop {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let Some(delivery) = receiver.recv().await else {
                break;
            };
            let context = Arc::clone(&context);
            tokio::spawn(async move {
                process_delivery(delivery, &context).await;
                drop(permit);
            });
        }
    })
}

async fn process_delivery(delivery: Delivery, context: &WorkerContext) {
    let started = Instant::now();

    let mut envelope = match decode(&delivery.bytes) {
        Ok(envelope) => envelope,
        Err(err) => {
            // The payload cannot be reconstructed, so a requeue is pointless.
            error!(queue = %context.queue, error = %err, "dropping undecodable delivery");
            if let Some(metrics) = &context.metrics {
                metrics.observe_dropped();
            }
            return;
        }
    };

    if let Some(metrics) = &context.metrics {
        metrics.observe_delivered();
    }

    let outcome = match context.handler.handle(&mut envelope).await {
        Ok(()) => DeliveryOutcome::Acked,
        Err(err) => {
            warn!(
                queue = %context.queue,
                envelope_id = %envelope.id,
                redeliveries = delivery.redeliveries,
                error = %err,
                "handler failed"
            );
            resolve_failure(delivery, context)
        }
    };

    log_outcome(&context.queue, outcome, &envelope);
    if let Some(metrics) = &context.metrics {
        metrics.observe_outcome(outcome);
        metrics.observe_delivery_latency(started.elapsed());
    }
}

fn resolve_failure(delivery: Delivery, context: &WorkerContext) -> DeliveryOutcome {
    let exceeded = context
        .redelivery_cap
        .is_some_and(|cap| delivery.redeliveries >= cap);

    if exceeded {
        match &context.dead_letter {
            Some(dead_letter) => {
                let diverted = Delivery {
                    bytes: delivery.bytes,
                    redeliveries: 0,
                };
                if dead_letter.send(diverted).is_err() {
                    error!(queue = %context.queue, "dead-letter queue unavailable; delivery lost");
                }
            }
            None => {
                error!(queue = %context.queue, "redelivery cap hit without a dead-letter queue; delivery lost");
            }
        }
        DeliveryOutcome::DeadLettered
    } else {
        let requeued = Delivery {
            bytes: delivery.bytes,
            redeliveries: delivery.redeliveries + 1,
        };
        if context.requeue.send(requeued).is_err() {
            error!(queue = %context.queue, "requeue failed; delivery lost");
        }
        DeliveryOutcome::NackedRequeued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use mqx_msg::{encode, ExchangeKind};

    struct CountingHandler {
        name: &'static str,
        failures_before_success: u32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl QueueHandler for CountingHandler {
        fn name(&self) -> &str {
            self.name
        }

        async fn handle(&self, envelope: &mut Envelope) -> Result<(), HandlerError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures_before_success {
                return Err(HandlerError::new("transient failure"));
            }
            envelope.receiver = Some(self.name.to_owned());
            Ok(())
        }
    }

    fn delivery_for(content: &str) -> Delivery {
        let envelope =
            Envelope::new(content, ExchangeKind::Direct).with_routing_key("demo.direct");
        Delivery {
            bytes: encode(&envelope).expect("encode"),
            redeliveries: 0,
        }
    }

    #[tokio::test]
    async fn successful_handler_acks_without_requeue() {
        let (requeue_tx, mut requeue_rx) = mpsc::unbounded_channel();
        let handler = Arc::new(CountingHandler {
            name: "TestConsumer",
            failures_before_success: 0,
            attempts: AtomicU32::new(0),
        });
        let context = WorkerContext {
            queue: "q".to_owned(),
            handler: handler.clone(),
            concurrency: 1,
            redelivery_cap: Some(5),
            requeue: requeue_tx,
            dead_letter: None,
            metrics: None,
        };

        process_delivery(delivery_for("ok"), &context).await;
        assert_eq!(handler.attempts.load(Ordering::SeqCst), 1);
        assert!(requeue_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failing_handler_requeues_with_incremented_count() {
        let (requeue_tx, mut requeue_rx) = mpsc::unbounded_channel();
        let handler = Arc::new(CountingHandler {
            name: "TestConsumer",
            failures_before_success: u32::MAX,
            attempts: AtomicU32::new(0),
        });
        let context = WorkerContext {
            queue: "q".to_owned(),
            handler,
            concurrency: 1,
            redelivery_cap: Some(5),
            requeue: requeue_tx,
            dead_letter: None,
            metrics: None,
        };

        process_delivery(delivery_for("boom"), &context).await;
        let requeued = requeue_rx.try_recv().expect("requeued delivery");
        assert_eq!(requeued.redeliveries, 1);
    }

    #[tokio::test]
    async fn redelivery_cap_diverts_to_dead_letter() {
        let (requeue_tx, mut requeue_rx) = mpsc::unbounded_channel();
        let (dlq_tx, mut dlq_rx) = mpsc::unbounded_channel();
        let handler = Arc::new(CountingHandler {
            name: "TestConsumer",
            failures_before_success: u32::MAX,
            attempts: AtomicU32::new(0),
        });
        let context = WorkerContext {
            queue: "q".to_owned(),
            handler,
            concurrency: 1,
            redelivery_cap: Some(2),
            requeue: requeue_tx,
            dead_letter: Some(dlq_tx),
            metrics: None,
        };

        let exhausted = Delivery {
            bytes: delivery_for("poison").bytes,
            redeliveries: 2,
        };
        process_delivery(exhausted, &context).await;
        assert!(requeue_rx.try_recv().is_err());
        let diverted = dlq_rx.try_recv().expect("dead-lettered delivery");
        assert_eq!(diverted.redeliveries, 0);
    }

    #[tokio::test]
    async fn undecodable_delivery_is_dropped() {
        let (requeue_tx, mut requeue_rx) = mpsc::unbounded_channel();
        let handler = Arc::new(CountingHandler {
            name: "TestConsumer",
            failures_before_success: 0,
            attempts: AtomicU32::new(0),
        });
        let context = WorkerContext {
            queue: "q".to_owned(),
            handler: handler.clone(),
            concurrency: 1,
            redelivery_cap: Some(5),
            requeue: requeue_tx,
            dead_letter: None,
            metrics: None,
        };

        process_delivery(
            Delivery {
                bytes: b"garbage".to_vec(),
                redeliveries: 0,
            },
            &context,
        )
        .await;
        assert_eq!(handler.attempts.load(Ordering::SeqCst), 0);
        assert!(requeue_rx.try_recv().is_err());
    }
}
