//! ---
//! mqx_section: "03-delivery-runtime"
//! mqx_subsection: "module"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Error taxonomy for publishing, scheduling, and broker assembly."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
use mqx_msg::{CodecError, ExchangeKind};
use mqx_router::{BindingError, RoutingError};

/// Failures surfaced synchronously to a publisher.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The binding table could not resolve the publish to any queue.
    #[error(transparent)]
    Routing(#[from] RoutingError),
    /// The envelope could not be encoded at the transport boundary.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Direct and topic publishes require a non-empty routing key.
    #[error("routing key must be non-empty for {} publishes", kind.as_str())]
    EmptyRoutingKey {
        /// Exchange kind the publish targeted.
        kind: ExchangeKind,
    },
}

/// Failures surfaced synchronously when registering a delayed envelope.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// The target exchange was never declared.
    #[error("unknown exchange: {exchange}")]
    UnknownExchange {
        /// Exchange name the caller scheduled against.
        exchange: String,
    },
    /// The target exchange exists but is not delay-capable.
    #[error("exchange {exchange} is not delay-capable")]
    NotDelayCapable {
        /// Exchange name the caller scheduled against.
        exchange: String,
    },
    /// Delayed envelopes route as direct messages and need a routing key.
    #[error("delayed envelopes require a non-empty routing key")]
    EmptyRoutingKey,
    /// The delay-exchange binding cannot deliver the envelope anywhere; the
    /// failure is reported now rather than when the timer fires.
    #[error(transparent)]
    Routing(#[from] RoutingError),
    /// The envelope could not be encoded for deferred delivery.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Failures detected while assembling a broker at startup.
#[derive(Debug, thiserror::Error)]
pub enum BrokerBuildError {
    /// The topology configuration did not validate.
    #[error(transparent)]
    Binding(#[from] BindingError),
    /// A handler was registered for a queue the table does not declare.
    #[error("handler registered for unknown queue: {queue}")]
    UnknownQueue {
        /// Offending queue name.
        queue: String,
    },
    /// Two handlers were registered for the same queue.
    #[error("queue already has a handler: {queue}")]
    DuplicateHandler {
        /// Offending queue name.
        queue: String,
    },
    /// The configured dead-letter queue is not declared in the table.
    #[error("dead-letter queue is not declared in the topology: {queue}")]
    UnknownDeadLetterQueue {
        /// Offending queue name.
        queue: String,
    },
}
