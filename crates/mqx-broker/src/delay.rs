//! ---
//! mqx_section: "03-delivery-runtime"
//! mqx_subsection: "module"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Timer-based scheduler turning delayed publishes into direct deliveries."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use mqx_msg::{encode, log_publish, Envelope, ExchangeKind};

use crate::broker::{BrokerInner, PublishReceipt};
use crate::error::ScheduleError;

/// Defers envelope visibility on delay-capable exchanges.
///
/// Validation, routing, and encoding all happen at schedule time so failures
/// reach the caller synchronously; the timer task only moves bytes. The
/// binding table is frozen after startup, which keeps the eagerly resolved
/// queue set valid at fire time.
pub(crate) struct DelayScheduler {
    inner: Arc<BrokerInner>,
}

impl DelayScheduler {
    pub(crate) fn new(inner: Arc<BrokerInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn schedule(
        &self,
        exchange: &str,
        mut envelope: Envelope,
    ) -> Result<PublishReceipt, ScheduleError> {
        let kind = self.inner.table.kind_of(exchange).ok_or_else(|| {
            ScheduleError::UnknownExchange {
                exchange: exchange.to_owned(),
            }
        })?;
        if kind != ExchangeKind::Delay {
            return Err(ScheduleError::NotDelayCapable {
                exchange: exchange.to_owned(),
            });
        }
        if envelope.routing_key.is_empty() {
            return Err(ScheduleError::EmptyRoutingKey);
        }

        // Absent and zero delays both take the configured default.
        let delay_ms = match envelope.delay {
            Some(ms) if ms > 0 => ms,
            _ => self.inner.config.default_delay_ms,
        };
        envelope.delay = Some(delay_ms);

        let queues = self.inner.table.route(exchange, &envelope.routing_key)?;
        let bytes = encode(&envelope)?;

        debug!(
            envelope_id = %envelope.id,
            exchange = %exchange,
            delay_ms,
            "envelope scheduled"
        );

        let receipt = PublishReceipt {
            envelope_id: envelope.id.clone(),
            queues: queues.clone(),
        };
        let inner = Arc::clone(&self.inner);
        let exchange = exchange.to_owned();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            log_publish(&exchange, &envelope.routing_key, &envelope);
            inner.enqueue(&queues, &bytes);
            if let Some(metrics) = &inner.metrics {
                metrics.observe_published();
            }
        });

        Ok(receipt)
    }
}
