//! ---
//! mqx_section: "03-delivery-runtime"
//! mqx_subsection: "module"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "In-process broker runtime: publish path, delivery workers, delay scheduler."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
//! In-process message broker built on the MQX routing core.
//!
//! The broker owns one unbounded channel per declared queue and one delivery
//! worker per registered handler. Publishing validates, encodes, and routes
//! synchronously; delivery, acknowledgement, and redelivery happen on worker
//! tasks. Queues without handlers keep their envelopes until drained.

#![warn(missing_docs)]

pub mod broker;
pub mod config;
pub mod consumer;
mod delay;
pub mod error;
mod producer;

pub use broker::{Broker, BrokerBuilder, PublishReceipt};
pub use config::{AppConfig, BrokerConfig, ExchangeConfig, LoadedAppConfig, TopologyConfig};
pub use consumer::{HandlerError, QueueHandler};
pub use error::{BrokerBuildError, PublishError, ScheduleError};
