//! ---
//! mqx_section: "02-exchange-routing"
//! mqx_subsection: "module"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Static binding table and exchange routing rules."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
#![warn(missing_docs)]

pub mod binding;
pub mod topic;

pub use binding::{BindingTable, BindingTableBuilder, ExchangeBinding};
pub use topic::topic_matches;

/// Shared result type for routing operations.
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Failures surfaced by the routing lookup.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// The named exchange was never declared in the binding table.
    #[error("unknown exchange: {exchange}")]
    UnknownExchange {
        /// Exchange name the caller published to.
        exchange: String,
    },
    /// A direct publish found no queue bound with the given routing key. The
    /// envelope is undeliverable; retrying is the caller's concern.
    #[error("no queue bound to {exchange} with routing key {routing_key}")]
    NoMatchingQueue {
        /// Exchange name the caller published to.
        exchange: String,
        /// Routing key that matched nothing.
        routing_key: String,
    },
}

/// Failures detected while constructing a binding table.
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    /// An exchange name was declared twice.
    #[error("exchange declared twice: {exchange}")]
    DuplicateExchange {
        /// Offending exchange name.
        exchange: String,
    },
    /// A binding referenced an exchange that was never declared.
    #[error("binding references undeclared exchange: {exchange}")]
    UndeclaredExchange {
        /// Offending exchange name.
        exchange: String,
    },
    /// Two queues were bound to a direct or delay exchange with the same
    /// routing key; direct routing must resolve to exactly one queue.
    #[error("duplicate direct binding on {exchange} for routing key {routing_key}")]
    DuplicateDirectBinding {
        /// Offending exchange name.
        exchange: String,
        /// Routing key bound more than once.
        routing_key: String,
    },
}
