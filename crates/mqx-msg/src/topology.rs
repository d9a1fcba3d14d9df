//! ---
//! mqx_section: "01-envelope-data-model"
//! mqx_subsection: "module"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Envelope schema, wire codec, and messaging observability helpers."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
//! Well-known names for the demo playground topology.
//!
//! These mirror the exchange/queue/routing-key layout the daemon wires by
//! default; the broker itself accepts any topology built at startup.

/// Direct exchange name.
pub const DIRECT_EXCHANGE: &str = "demo.direct.exchange";
/// Fanout (broadcast) exchange name.
pub const FANOUT_EXCHANGE: &str = "demo.fanout.exchange";
/// Topic exchange name.
pub const TOPIC_EXCHANGE: &str = "demo.topic.exchange";
/// Delay-capable exchange name.
pub const DELAY_EXCHANGE: &str = "demo.delay.exchange";

/// Queue bound to the direct exchange.
pub const DIRECT_QUEUE: &str = "demo.direct.queue";
/// First queue bound to the fanout exchange.
pub const FANOUT_QUEUE_1: &str = "demo.fanout.queue.1";
/// Second queue bound to the fanout exchange.
pub const FANOUT_QUEUE_2: &str = "demo.fanout.queue.2";
/// Topic queue receiving `user.*` traffic.
pub const TOPIC_QUEUE_USER: &str = "demo.topic.queue.user";
/// Topic queue receiving `order.*` traffic.
pub const TOPIC_QUEUE_ORDER: &str = "demo.topic.queue.order";
/// Topic queue receiving every routing key (`#`).
pub const TOPIC_QUEUE_ALL: &str = "demo.topic.queue.all";
/// Queue bound to the delay exchange.
pub const DELAY_QUEUE: &str = "demo.delay.queue";
/// Unbound queue collecting envelopes past the redelivery cap.
pub const DEAD_LETTER_QUEUE: &str = "demo.dead.letter.queue";

/// Default direct routing key.
pub const DIRECT_ROUTING_KEY: &str = "demo.direct";
/// Topic key for user e-mail notifications.
pub const TOPIC_ROUTING_KEY_USER_EMAIL: &str = "user.email.send";
/// Topic key for user SMS notifications.
pub const TOPIC_ROUTING_KEY_USER_SMS: &str = "user.sms.send";
/// Topic key for order creation notifications.
pub const TOPIC_ROUTING_KEY_ORDER_CREATE: &str = "order.create.notify";
/// Topic key for order payment notifications.
pub const TOPIC_ROUTING_KEY_ORDER_PAYMENT: &str = "order.payment.notify";
/// Routing key bound on the delay exchange.
pub const DELAY_ROUTING_KEY: &str = "demo.delay";

/// Five second delay preset, also the default when a delay is absent or zero.
pub const DELAY_5_SECONDS: u64 = 5 * 1_000;
/// Thirty second delay preset.
pub const DELAY_30_SECONDS: u64 = 30 * 1_000;
/// One minute delay preset.
pub const DELAY_1_MINUTE: u64 = 60 * 1_000;
/// Five minute delay preset.
pub const DELAY_5_MINUTES: u64 = 5 * 60 * 1_000;

/// Delay substituted when an envelope carries no delay or an explicit zero.
pub const DEFAULT_DELAY_MS: u64 = DELAY_5_SECONDS;
