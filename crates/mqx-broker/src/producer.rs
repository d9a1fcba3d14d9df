//! ---
//! mqx_section: "03-delivery-runtime"
//! mqx_subsection: "module"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Producer conveniences over the demo playground topology."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
//! Producer conveniences mirroring the playground's messaging services.
//!
//! These assume the demo topology ([`BindingTable::demo`]); against a custom
//! topology they surface the usual routing errors.
//!
//! [`BindingTable::demo`]: mqx_router::BindingTable::demo

use chrono::Local;
use serde_json::json;

use mqx_msg::{topology, Envelope, ExchangeKind};

use crate::broker::{Broker, PublishReceipt};
use crate::error::{PublishError, ScheduleError};

impl Broker {
    /// Publish to the direct exchange under the default routing key.
    pub fn send_direct(&self, content: impl Into<String>) -> Result<PublishReceipt, PublishError> {
        self.send_direct_with_key(content, topology::DIRECT_ROUTING_KEY)
    }

    /// Publish to the direct exchange under an explicit routing key.
    pub fn send_direct_with_key(
        &self,
        content: impl Into<String>,
        routing_key: &str,
    ) -> Result<PublishReceipt, PublishError> {
        let envelope = Envelope::new(content, ExchangeKind::Direct)
            .with_sender("DirectProducer")
            .with_routing_key(routing_key);
        self.publish(topology::DIRECT_EXCHANGE, routing_key, envelope)
    }

    /// Broadcast to every queue bound to the fanout exchange.
    pub fn send_fanout(&self, content: impl Into<String>) -> Result<PublishReceipt, PublishError> {
        let envelope = Envelope::new(content, ExchangeKind::Fanout).with_sender("FanoutProducer");
        self.publish(topology::FANOUT_EXCHANGE, "", envelope)
    }

    /// Publish to the topic exchange under an arbitrary routing key.
    pub fn send_topic(
        &self,
        content: impl Into<String>,
        routing_key: &str,
    ) -> Result<PublishReceipt, PublishError> {
        let envelope = Envelope::new(content, ExchangeKind::Topic)
            .with_sender("TopicProducer")
            .with_routing_key(routing_key);
        self.publish(topology::TOPIC_EXCHANGE, routing_key, envelope)
    }

    /// Publish a user notification (`user.*` keys), pre-addressed to the user.
    pub fn send_user_notification(
        &self,
        user_id: &str,
        content: impl Into<String>,
        routing_key: &str,
    ) -> Result<PublishReceipt, PublishError> {
        let mut envelope = Envelope::new(content, ExchangeKind::Topic)
            .with_sender("UserNotificationProducer")
            .with_routing_key(routing_key);
        envelope.receiver = Some(user_id.to_owned());
        self.publish(topology::TOPIC_EXCHANGE, routing_key, envelope)
    }

    /// Publish an order notification (`order.*` keys).
    pub fn send_order_notification(
        &self,
        content: impl Into<String>,
        routing_key: &str,
    ) -> Result<PublishReceipt, PublishError> {
        let envelope = Envelope::new(content, ExchangeKind::Topic)
            .with_sender("OrderProducer")
            .with_routing_key(routing_key);
        self.publish(topology::TOPIC_EXCHANGE, routing_key, envelope)
    }

    /// Schedule a delayed message; zero selects the configured default delay.
    pub fn send_delay(
        &self,
        content: impl Into<String>,
        delay_ms: u64,
    ) -> Result<PublishReceipt, ScheduleError> {
        let envelope = Envelope::new(content, ExchangeKind::Delay)
            .with_sender("DelayProducer")
            .with_routing_key(topology::DELAY_ROUTING_KEY)
            .with_delay(delay_ms);
        self.schedule(topology::DELAY_EXCHANGE, envelope)
    }

    /// Schedule a task reminder carrying structured task metadata.
    pub fn send_task_reminder(
        &self,
        task_name: &str,
        reminder_text: &str,
        delay_ms: u64,
    ) -> Result<PublishReceipt, ScheduleError> {
        let effective_delay = if delay_ms > 0 {
            delay_ms
        } else {
            self.config().default_delay_ms
        };
        let now = Local::now();
        let fire_at = now + chrono::Duration::milliseconds(effective_delay as i64);
        let envelope = Envelope::new(
            format!("task reminder: {task_name} - {reminder_text}"),
            ExchangeKind::Delay,
        )
        .with_sender("TaskReminderProducer")
        .with_routing_key(topology::DELAY_ROUTING_KEY)
        .with_delay(delay_ms)
        .with_extra(json!({
            "taskName": task_name,
            "reminderText": reminder_text,
            "createdAt": now.format("%Y-%m-%d %H:%M:%S").to_string(),
            "expectedFireAt": fire_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }));
        self.schedule(topology::DELAY_EXCHANGE, envelope)
    }
}
