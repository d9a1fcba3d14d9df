//! ---
//! mqx_section: "03-delivery-runtime"
//! mqx_subsection: "module"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Broker facade: publish path, builder wiring, queue channel ownership."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use prometheus::Registry;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use mqx_msg::{decode, encode, log_publish, BrokerMetricsExporter, Envelope, ExchangeKind};
use mqx_router::{BindingTable, RoutingError};

use crate::config::BrokerConfig;
use crate::consumer::{spawn_queue_worker, Delivery, QueueHandler, WorkerContext};
use crate::delay::DelayScheduler;
use crate::error::{BrokerBuildError, PublishError, ScheduleError};

/// Result handed back to a publisher. There is no end-to-end delivery
/// confirmation past this point.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    /// Identifier of the accepted envelope.
    pub envelope_id: String,
    /// Queues the envelope was (or will be, for delayed publishes) routed to.
    pub queues: BTreeSet<String>,
}

pub(crate) struct BrokerInner {
    pub(crate) table: BindingTable,
    pub(crate) config: BrokerConfig,
    senders: HashMap<String, mpsc::UnboundedSender<Delivery>>,
    unclaimed: Mutex<HashMap<String, mpsc::UnboundedReceiver<Delivery>>>,
    pub(crate) metrics: Option<BrokerMetricsExporter>,
}

impl BrokerInner {
    /// Hand an encoded envelope to every target queue.
    pub(crate) fn enqueue(&self, queues: &BTreeSet<String>, bytes: &[u8]) {
        for queue in queues {
            let delivered = self
                .senders
                .get(queue)
                .map(|sender| {
                    sender
                        .send(Delivery {
                            bytes: bytes.to_vec(),
                            redeliveries: 0,
                        })
                        .is_ok()
                })
                .unwrap_or(false);
            if !delivered {
                warn!(queue = %queue, "queue unavailable; delivery lost");
                if let Some(metrics) = &self.metrics {
                    metrics.observe_dropped();
                }
            }
        }
    }
}

/// In-process broker facade owning the binding table, queue channels,
/// delivery workers, and the delay scheduler.
pub struct Broker {
    inner: Arc<BrokerInner>,
    delay: DelayScheduler,
    workers: Vec<JoinHandle<()>>,
}

impl Broker {
    /// Start assembling a broker over a frozen binding table.
    pub fn builder(table: BindingTable) -> BrokerBuilder {
        BrokerBuilder::new(table)
    }

    /// Publish an envelope to an exchange.
    ///
    /// Routing and encoding failures surface synchronously; everything past
    /// the returned receipt is fire-and-forget.
    pub fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        envelope: Envelope,
    ) -> Result<PublishReceipt, PublishError> {
        let kind =
            self.inner
                .table
                .kind_of(exchange)
                .ok_or_else(|| RoutingError::UnknownExchange {
                    exchange: exchange.to_owned(),
                })?;
        if matches!(kind, ExchangeKind::Direct | ExchangeKind::Topic) && routing_key.is_empty() {
            return Err(PublishError::EmptyRoutingKey { kind });
        }

        let queues = self.inner.table.route(exchange, routing_key)?;
        let bytes = encode(&envelope)?;

        log_publish(exchange, routing_key, &envelope);
        self.inner.enqueue(&queues, &bytes);
        if let Some(metrics) = &self.inner.metrics {
            metrics.observe_published();
        }

        Ok(PublishReceipt {
            envelope_id: envelope.id,
            queues,
        })
    }

    /// Register a delayed envelope against a delay-capable exchange. The
    /// envelope becomes visible on its queue once the delay elapses; there is
    /// no cancellation.
    pub fn schedule(
        &self,
        exchange: &str,
        envelope: Envelope,
    ) -> Result<PublishReceipt, ScheduleError> {
        self.delay.schedule(exchange, envelope)
    }

    /// Drain every envelope currently sitting in a queue that has no worker.
    ///
    /// Returns nothing for unknown queues or queues claimed by a handler;
    /// intended for inspection of unconsumed queues such as the dead-letter
    /// queue.
    pub fn drain_queue(&self, queue: &str) -> Vec<Envelope> {
        let mut unclaimed = self.inner.unclaimed.lock();
        let Some(receiver) = unclaimed.get_mut(queue) else {
            return Vec::new();
        };
        let mut drained = Vec::new();
        while let Ok(delivery) = receiver.try_recv() {
            match decode(&delivery.bytes) {
                Ok(envelope) => drained.push(envelope),
                Err(err) => warn!(queue = %queue, error = %err, "skipping undecodable envelope"),
            }
        }
        drained
    }

    /// The frozen binding table this broker routes over.
    pub fn binding_table(&self) -> &BindingTable {
        &self.inner.table
    }

    /// Effective broker configuration.
    pub fn config(&self) -> &BrokerConfig {
        &self.inner.config
    }

    /// Stop every delivery worker. In-flight handler invocations are
    /// interrupted; queued envelopes are discarded with the broker.
    pub fn shutdown(self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

struct HandlerRegistration {
    queue: String,
    handler: Arc<dyn QueueHandler>,
    concurrency: Option<usize>,
}

/// Builder wiring handlers, metrics, and configuration into a running broker.
pub struct BrokerBuilder {
    table: BindingTable,
    config: BrokerConfig,
    metrics: Option<BrokerMetricsExporter>,
    handlers: Vec<HandlerRegistration>,
}

impl BrokerBuilder {
    fn new(table: BindingTable) -> Self {
        Self {
            table,
            config: BrokerConfig::default(),
            metrics: None,
            handlers: Vec::new(),
        }
    }

    /// Replace the default broker configuration.
    pub fn with_config(mut self, config: BrokerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register broker metrics against the provided registry.
    pub fn with_metrics(mut self, registry: &Registry) -> Result<Self, prometheus::Error> {
        self.metrics = Some(BrokerMetricsExporter::register(registry)?);
        Ok(self)
    }

    /// Register the handler consuming a queue, with the default concurrency.
    pub fn handler(self, queue: impl Into<String>, handler: Arc<dyn QueueHandler>) -> Self {
        self.register(queue, handler, None)
    }

    /// Register a handler with an explicit per-queue concurrency.
    pub fn handler_with_concurrency(
        self,
        queue: impl Into<String>,
        handler: Arc<dyn QueueHandler>,
        concurrency: usize,
    ) -> Self {
        self.register(queue, handler, Some(concurrency))
    }

    fn register(
        mut self,
        queue: impl Into<String>,
        handler: Arc<dyn QueueHandler>,
        concurrency: Option<usize>,
    ) -> Self {
        self.handlers.push(HandlerRegistration {
            queue: queue.into(),
            handler,
            concurrency,
        });
        self
    }

    /// Validate the assembly and spawn one delivery worker per registered
    /// handler. Must be called from within a tokio runtime.
    pub fn build(self) -> Result<Broker, BrokerBuildError> {
        if let Some(dead_letter) = &self.config.dead_letter_queue {
            if !self.table.contains_queue(dead_letter) {
                return Err(BrokerBuildError::UnknownDeadLetterQueue {
                    queue: dead_letter.clone(),
                });
            }
        }

        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for queue in self.table.queue_names() {
            let (sender, receiver) = mpsc::unbounded_channel();
            senders.insert(queue.to_owned(), sender);
            receivers.insert(queue.to_owned(), receiver);
        }

        let mut workers = Vec::new();
        for registration in self.handlers {
            if !self.table.contains_queue(&registration.queue) {
                return Err(BrokerBuildError::UnknownQueue {
                    queue: registration.queue,
                });
            }
            let receiver = receivers.remove(&registration.queue).ok_or(
                BrokerBuildError::DuplicateHandler {
                    queue: registration.queue.clone(),
                },
            )?;
            let requeue = senders
                .get(&registration.queue)
                .cloned()
                .ok_or(BrokerBuildError::UnknownQueue {
                    queue: registration.queue.clone(),
                })?;
            // A dead-letter worker must not dead-letter into itself.
            let dead_letter = self
                .config
                .dead_letter_queue
                .as_ref()
                .filter(|dlq| *dlq != &registration.queue)
                .and_then(|dlq| senders.get(dlq).cloned());
            let context = WorkerContext {
                queue: registration.queue,
                handler: registration.handler,
                concurrency: registration
                    .concurrency
                    .unwrap_or(self.config.default_concurrency),
                redelivery_cap: self.config.redelivery_cap(),
                requeue,
                dead_letter,
                metrics: self.metrics.clone(),
            };
            workers.push(spawn_queue_worker(receiver, context));
        }

        let inner = Arc::new(BrokerInner {
            table: self.table,
            config: self.config,
            senders,
            unclaimed: Mutex::new(receivers),
            metrics: self.metrics,
        });

        Ok(Broker {
            delay: DelayScheduler::new(Arc::clone(&inner)),
            inner,
            workers,
        })
    }
}
