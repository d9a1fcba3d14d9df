//! ---
//! mqx_section: "01-envelope-data-model"
//! mqx_subsection: "module"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Envelope schema, wire codec, and messaging observability helpers."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
#![warn(missing_docs)]

pub mod codec;
pub mod logging;
pub mod topology;
pub mod types;

pub use codec::{decode, encode, CodecError};
pub use logging::{log_outcome, log_publish, BrokerMetricsExporter, DeliveryOutcome};
pub use types::{Envelope, ExchangeKind};
