//! ---
//! mqx_section: "05-testing-qa"
//! mqx_subsection: "integration-tests"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Routing behaviour of the playground topology end to end."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use mqx_broker::{Broker, HandlerError, PublishError, QueueHandler};
use mqx_msg::{topology, Envelope, ExchangeKind};
use mqx_router::{BindingTable, RoutingError};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Forwards every acked envelope to a channel the test can await on.
struct Recorder {
    service: &'static str,
    processed: mpsc::UnboundedSender<Envelope>,
}

#[async_trait]
impl QueueHandler for Recorder {
    fn name(&self) -> &str {
        self.service
    }

    async fn handle(&self, envelope: &mut Envelope) -> Result<(), HandlerError> {
        envelope.receiver = Some(self.service.to_owned());
        let _ = self.processed.send(envelope.clone());
        Ok(())
    }
}

fn recorder(service: &'static str) -> (Arc<Recorder>, mpsc::UnboundedReceiver<Envelope>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        Arc::new(Recorder {
            service,
            processed: sender,
        }),
        receiver,
    )
}

fn queue_set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| (*name).to_owned()).collect()
}

#[tokio::test]
async fn direct_key_routes_to_the_single_bound_queue() {
    let (handler, mut processed) = recorder("DirectConsumer");
    let broker = Broker::builder(BindingTable::demo())
        .handler(topology::DIRECT_QUEUE, handler)
        .build()
        .expect("broker");

    let receipt = broker.send_direct("point to point").expect("publish");
    assert_eq!(receipt.queues, queue_set(&[topology::DIRECT_QUEUE]));

    let envelope = timeout(RECV_TIMEOUT, processed.recv())
        .await
        .expect("delivery within timeout")
        .expect("channel open");
    assert_eq!(envelope.id, receipt.envelope_id);
    assert_eq!(envelope.content, "point to point");
    assert_eq!(envelope.receiver.as_deref(), Some("DirectConsumer"));
}

#[tokio::test]
async fn direct_publish_with_unbound_key_is_rejected() {
    let broker = Broker::builder(BindingTable::demo()).build().expect("broker");
    let err = broker
        .send_direct_with_key("nobody home", "demo.unbound")
        .expect_err("no queue bound under this key");
    match err {
        PublishError::Routing(RoutingError::NoMatchingQueue {
            exchange,
            routing_key,
        }) => {
            assert_eq!(exchange, topology::DIRECT_EXCHANGE);
            assert_eq!(routing_key, "demo.unbound");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn direct_and_topic_publishes_require_a_routing_key() {
    let broker = Broker::builder(BindingTable::demo()).build().expect("broker");

    let direct = Envelope::new("no key", ExchangeKind::Direct);
    assert!(matches!(
        broker.publish(topology::DIRECT_EXCHANGE, "", direct),
        Err(PublishError::EmptyRoutingKey {
            kind: ExchangeKind::Direct
        })
    ));

    let topic = Envelope::new("no key", ExchangeKind::Topic);
    assert!(matches!(
        broker.publish(topology::TOPIC_EXCHANGE, "", topic),
        Err(PublishError::EmptyRoutingKey {
            kind: ExchangeKind::Topic
        })
    ));
}

#[tokio::test]
async fn fanout_reaches_every_bound_queue_and_ignores_the_key() {
    let (log_handler, mut log_rx) = recorder("LogService");
    let (stats_handler, mut stats_rx) = recorder("StatisticsService");
    let broker = Broker::builder(BindingTable::demo())
        .handler(topology::FANOUT_QUEUE_1, log_handler)
        .handler(topology::FANOUT_QUEUE_2, stats_handler)
        .build()
        .expect("broker");

    let envelope = Envelope::new("broadcast", ExchangeKind::Fanout)
        .with_routing_key("completely.ignored");
    let receipt = broker
        .publish(topology::FANOUT_EXCHANGE, "completely.ignored", envelope)
        .expect("publish");
    assert_eq!(
        receipt.queues,
        queue_set(&[topology::FANOUT_QUEUE_1, topology::FANOUT_QUEUE_2])
    );

    for rx in [&mut log_rx, &mut stats_rx] {
        let delivered = timeout(RECV_TIMEOUT, rx.recv())
            .await
            .expect("delivery within timeout")
            .expect("channel open");
        assert_eq!(delivered.id, receipt.envelope_id);
    }
}

#[tokio::test]
async fn two_segment_user_key_reaches_user_queue_and_catch_all() {
    let broker = Broker::builder(BindingTable::demo()).build().expect("broker");
    let receipt = broker.send_topic("user signed up", "user.created").expect("publish");
    assert_eq!(
        receipt.queues,
        queue_set(&[topology::TOPIC_QUEUE_USER, topology::TOPIC_QUEUE_ALL])
    );
}

#[tokio::test]
async fn two_segment_order_key_reaches_order_queue_and_catch_all() {
    let broker = Broker::builder(BindingTable::demo()).build().expect("broker");
    let receipt = broker
        .send_order_notification("order 7 paid", "order.paid")
        .expect("publish");
    assert_eq!(
        receipt.queues,
        queue_set(&[topology::TOPIC_QUEUE_ORDER, topology::TOPIC_QUEUE_ALL])
    );
}

#[tokio::test]
async fn well_known_three_segment_keys_only_reach_catch_all() {
    // The playground binds `user.*`/`order.*`, which match one trailing
    // segment; the three-segment notification keys fall through to `#`.
    let broker = Broker::builder(BindingTable::demo()).build().expect("broker");
    for key in [
        topology::TOPIC_ROUTING_KEY_USER_EMAIL,
        topology::TOPIC_ROUTING_KEY_USER_SMS,
        topology::TOPIC_ROUTING_KEY_ORDER_CREATE,
        topology::TOPIC_ROUTING_KEY_ORDER_PAYMENT,
    ] {
        let receipt = broker.send_topic("notify", key).expect("publish");
        assert_eq!(receipt.queues, queue_set(&[topology::TOPIC_QUEUE_ALL]), "key {key}");
    }
}

#[tokio::test]
async fn topic_key_without_specific_binding_still_reaches_catch_all() {
    let broker = Broker::builder(BindingTable::demo()).build().expect("broker");
    let receipt = broker
        .send_topic("cache flushed", "metrics.cache.flush")
        .expect("publish");
    assert_eq!(receipt.queues, queue_set(&[topology::TOPIC_QUEUE_ALL]));
}

#[tokio::test]
async fn star_matches_exactly_one_segment() {
    // `user.*` must not swallow `user.email.send.retry`; only `#` does.
    let broker = Broker::builder(BindingTable::demo()).build().expect("broker");
    let receipt = broker
        .send_topic("deep key", "user.email.send.retry")
        .expect("publish");
    assert_eq!(receipt.queues, queue_set(&[topology::TOPIC_QUEUE_ALL]));
}

#[tokio::test]
async fn publish_to_undeclared_exchange_is_rejected() {
    let broker = Broker::builder(BindingTable::demo()).build().expect("broker");
    let envelope = Envelope::new("lost", ExchangeKind::Direct).with_routing_key("demo.direct");
    let err = broker
        .publish("ghost.exchange", "demo.direct", envelope)
        .expect_err("exchange was never declared");
    assert!(matches!(
        err,
        PublishError::Routing(RoutingError::UnknownExchange { .. })
    ));
}

#[tokio::test]
async fn user_notification_is_pre_addressed() {
    let (handler, mut processed) = recorder("UserService");
    let broker = Broker::builder(BindingTable::demo())
        .handler(topology::TOPIC_QUEUE_USER, handler)
        .build()
        .expect("broker");

    broker
        .send_user_notification("user-7", "password changed", "user.updated")
        .expect("publish");
    let delivered = timeout(RECV_TIMEOUT, processed.recv())
        .await
        .expect("delivery within timeout")
        .expect("channel open");
    // The consumer overwrites the pre-addressed receiver while acking.
    assert_eq!(delivered.receiver.as_deref(), Some("UserService"));
    assert_eq!(delivered.sender.as_deref(), Some("UserNotificationProducer"));
}
