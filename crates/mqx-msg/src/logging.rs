//! ---
//! mqx_section: "01-envelope-data-model"
//! mqx_subsection: "module"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Envelope schema, wire codec, and messaging observability helpers."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
use std::time::Duration;

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use tracing::{error, info, warn};

use crate::types::Envelope;

/// Terminal outcome of a single delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The handler succeeded and the envelope is consumed.
    Acked,
    /// The handler failed; the envelope was returned to the queue tail.
    NackedRequeued,
    /// The redelivery cap was exceeded; the envelope was diverted to the
    /// dead-letter queue.
    DeadLettered,
}

impl DeliveryOutcome {
    /// Stable name used in log fields and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Acked => "acked",
            DeliveryOutcome::NackedRequeued => "nacked_requeued",
            DeliveryOutcome::DeadLettered => "dead_lettered",
        }
    }
}

/// Emit the structured log line accompanying every publish.
pub fn log_publish(exchange: &str, routing_key: &str, envelope: &Envelope) {
    info!(
        envelope_id = %envelope.id,
        exchange,
        routing_key,
        kind = envelope.kind.as_str(),
        sender = envelope.sender.as_deref().unwrap_or(""),
        "envelope published"
    );
}

/// Emit the structured log line accompanying every terminal delivery outcome.
pub fn log_outcome(queue: &str, outcome: DeliveryOutcome, envelope: &Envelope) {
    match outcome {
        DeliveryOutcome::Acked => info!(
            envelope_id = %envelope.id,
            queue,
            routing_key = %envelope.routing_key,
            receiver = envelope.receiver.as_deref().unwrap_or(""),
            outcome = outcome.as_str(),
            "delivery resolved"
        ),
        DeliveryOutcome::NackedRequeued => warn!(
            envelope_id = %envelope.id,
            queue,
            routing_key = %envelope.routing_key,
            outcome = outcome.as_str(),
            "delivery resolved"
        ),
        DeliveryOutcome::DeadLettered => error!(
            envelope_id = %envelope.id,
            queue,
            routing_key = %envelope.routing_key,
            outcome = outcome.as_str(),
            "delivery resolved"
        ),
    }
}

/// Prometheus metric handles for broker activity.
#[derive(Clone)]
pub struct BrokerMetricsExporter {
    published: IntCounter,
    delivered: IntCounter,
    acked: IntCounter,
    nacked: IntCounter,
    dead_lettered: IntCounter,
    dropped: IntCounter,
    delivery_latency: Histogram,
}

impl BrokerMetricsExporter {
    /// Register broker metrics with the provided registry.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let published = IntCounter::with_opts(Opts::new(
            "envelopes_published_total",
            "Envelopes accepted by the publish path",
        ))?;
        let delivered = IntCounter::with_opts(Opts::new(
            "envelopes_delivered_total",
            "Deliveries handed to queue handlers",
        ))?;
        let acked = IntCounter::with_opts(Opts::new(
            "envelopes_acked_total",
            "Deliveries resolved with a positive acknowledgement",
        ))?;
        let nacked = IntCounter::with_opts(Opts::new(
            "envelopes_nacked_total",
            "Deliveries negatively acknowledged and requeued",
        ))?;
        let dead_lettered = IntCounter::with_opts(Opts::new(
            "envelopes_dead_lettered_total",
            "Envelopes diverted to the dead-letter queue",
        ))?;
        let dropped = IntCounter::with_opts(Opts::new(
            "envelopes_dropped_total",
            "Envelopes discarded at the transport boundary",
        ))?;
        let delivery_latency = Histogram::with_opts(HistogramOpts::new(
            "envelope_delivery_latency_seconds",
            "Observed latency between delivery and terminal outcome",
        ))?;

        registry.register(Box::new(published.clone()))?;
        registry.register(Box::new(delivered.clone()))?;
        registry.register(Box::new(acked.clone()))?;
        registry.register(Box::new(nacked.clone()))?;
        registry.register(Box::new(dead_lettered.clone()))?;
        registry.register(Box::new(dropped.clone()))?;
        registry.register(Box::new(delivery_latency.clone()))?;

        Ok(Self {
            published,
            delivered,
            acked,
            nacked,
            dead_lettered,
            dropped,
            delivery_latency,
        })
    }

    /// Record an accepted publish (one increment per publish, not per queue).
    pub fn observe_published(&self) {
        self.published.inc();
    }

    /// Record a delivery handed to a handler.
    pub fn observe_delivered(&self) {
        self.delivered.inc();
    }

    /// Record a terminal delivery outcome.
    pub fn observe_outcome(&self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Acked => self.acked.inc(),
            DeliveryOutcome::NackedRequeued => self.nacked.inc(),
            DeliveryOutcome::DeadLettered => self.dead_lettered.inc(),
        }
    }

    /// Record an envelope dropped at the serialization boundary.
    pub fn observe_dropped(&self) {
        self.dropped.inc();
    }

    /// Record time between delivery and terminal outcome.
    pub fn observe_delivery_latency(&self, duration: Duration) {
        self.delivery_latency.observe(duration.as_secs_f64());
    }
}
