//! ---
//! mqx_section: "04-daemon"
//! mqx_subsection: "module"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Playground queue handlers wired by the daemon."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
//! Consumers for the demo playground queues.
//!
//! Each handler stamps its service name into `receiver` before acking, so a
//! processed envelope records which service consumed it.

use async_trait::async_trait;
use tracing::info;

use mqx_broker::{HandlerError, QueueHandler};
use mqx_msg::Envelope;

macro_rules! playground_handler {
    ($(#[$meta:meta])* $name:ident, $service:literal, $event:literal) => {
        $(#[$meta])*
        pub struct $name;

        #[async_trait]
        impl QueueHandler for $name {
            fn name(&self) -> &str {
                $service
            }

            async fn handle(&self, envelope: &mut Envelope) -> Result<(), HandlerError> {
                info!(
                    envelope_id = %envelope.id,
                    routing_key = %envelope.routing_key,
                    content = %envelope.content,
                    $event
                );
                envelope.receiver = Some(self.name().to_owned());
                Ok(())
            }
        }
    };
}

playground_handler!(
    /// Consumes the direct queue.
    DirectConsumer,
    "DirectConsumer",
    "direct message received"
);
playground_handler!(
    /// First fanout subscriber, standing in for a log pipeline.
    LogService,
    "LogService",
    "broadcast recorded"
);
playground_handler!(
    /// Second fanout subscriber, standing in for a statistics pipeline.
    StatisticsService,
    "StatisticsService",
    "broadcast counted"
);
playground_handler!(
    /// Handles `user.*` topic traffic.
    UserService,
    "UserService",
    "user notification processed"
);
playground_handler!(
    /// Handles `order.*` topic traffic.
    OrderService,
    "OrderService",
    "order notification processed"
);
playground_handler!(
    /// Catch-all (`#`) topic subscriber.
    MonitorService,
    "MonitorService",
    "topic traffic observed"
);
playground_handler!(
    /// Consumes delayed messages once they become visible.
    DelayConsumer,
    "DelayConsumer",
    "delayed message fired"
);
