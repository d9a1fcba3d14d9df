//! ---
//! mqx_section: "05-testing-qa"
//! mqx_subsection: "integration-tests"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Deferred visibility behaviour of the delay exchange."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use mqx_broker::{Broker, BrokerConfig, HandlerError, QueueHandler, ScheduleError};
use mqx_msg::{topology, Envelope, ExchangeKind};
use mqx_router::BindingTable;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Shortened default delay so tests do not sit through the real five seconds.
const TEST_DEFAULT_DELAY_MS: u64 = 300;

fn short_delay_config() -> BrokerConfig {
    BrokerConfig {
        default_delay_ms: TEST_DEFAULT_DELAY_MS,
        ..BrokerConfig::default()
    }
}

struct Recorder {
    processed: mpsc::UnboundedSender<Envelope>,
}

#[async_trait]
impl QueueHandler for Recorder {
    fn name(&self) -> &str {
        "DelayConsumer"
    }

    async fn handle(&self, envelope: &mut Envelope) -> Result<(), HandlerError> {
        envelope.receiver = Some(self.name().to_owned());
        let _ = self.processed.send(envelope.clone());
        Ok(())
    }
}

#[tokio::test]
async fn scheduled_envelope_is_invisible_until_the_delay_elapses() {
    let broker = Broker::builder(BindingTable::demo())
        .with_config(short_delay_config())
        .build()
        .expect("broker");

    let receipt = broker.send_delay("see you soon", 0).expect("schedule");
    assert!(
        broker.drain_queue(topology::DELAY_QUEUE).is_empty(),
        "envelope visible before the delay elapsed"
    );

    tokio::time::sleep(Duration::from_millis(TEST_DEFAULT_DELAY_MS + 200)).await;
    let fired = broker.drain_queue(topology::DELAY_QUEUE);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].id, receipt.envelope_id);
    // Absent or zero delays take the configured default and the effective
    // value is recorded on the envelope.
    assert_eq!(fired[0].delay, Some(TEST_DEFAULT_DELAY_MS));
}

#[tokio::test]
async fn explicit_delay_is_preserved() {
    let broker = Broker::builder(BindingTable::demo())
        .with_config(short_delay_config())
        .build()
        .expect("broker");

    broker.send_delay("explicit", 150).expect("schedule");
    tokio::time::sleep(Duration::from_millis(350)).await;
    let fired = broker.drain_queue(topology::DELAY_QUEUE);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].delay, Some(150));
}

#[tokio::test]
async fn delayed_envelope_reaches_a_registered_consumer() {
    let (sender, mut processed) = mpsc::unbounded_channel();
    let broker = Broker::builder(BindingTable::demo())
        .with_config(short_delay_config())
        .handler(topology::DELAY_QUEUE, Arc::new(Recorder { processed: sender }))
        .build()
        .expect("broker");

    let receipt = broker.send_delay("wake up", 100).expect("schedule");
    let envelope = timeout(RECV_TIMEOUT, processed.recv())
        .await
        .expect("delivery within timeout")
        .expect("channel open");
    assert_eq!(envelope.id, receipt.envelope_id);
    assert_eq!(envelope.receiver.as_deref(), Some("DelayConsumer"));
}

#[tokio::test]
async fn scheduling_against_a_non_delay_exchange_is_rejected() {
    let broker = Broker::builder(BindingTable::demo()).build().expect("broker");
    let envelope = Envelope::new("wrong lane", ExchangeKind::Delay)
        .with_routing_key(topology::DIRECT_ROUTING_KEY);
    assert!(matches!(
        broker.schedule(topology::DIRECT_EXCHANGE, envelope),
        Err(ScheduleError::NotDelayCapable { .. })
    ));

    let envelope = Envelope::new("no exchange", ExchangeKind::Delay)
        .with_routing_key(topology::DELAY_ROUTING_KEY);
    assert!(matches!(
        broker.schedule("ghost.exchange", envelope),
        Err(ScheduleError::UnknownExchange { .. })
    ));
}

#[tokio::test]
async fn scheduling_requires_a_routing_key() {
    let broker = Broker::builder(BindingTable::demo()).build().expect("broker");
    let envelope = Envelope::new("keyless", ExchangeKind::Delay);
    assert!(matches!(
        broker.schedule(topology::DELAY_EXCHANGE, envelope),
        Err(ScheduleError::EmptyRoutingKey)
    ));
}

#[test]
fn delay_presets_match_the_advertised_durations() {
    assert_eq!(topology::DELAY_5_SECONDS, 5_000);
    assert_eq!(topology::DELAY_30_SECONDS, 30_000);
    assert_eq!(topology::DELAY_1_MINUTE, 60_000);
    assert_eq!(topology::DELAY_5_MINUTES, 300_000);
    // Absent or zero delays fall back to the shortest preset.
    assert_eq!(topology::DEFAULT_DELAY_MS, topology::DELAY_5_SECONDS);
}

#[tokio::test]
async fn task_reminder_carries_structured_metadata() {
    let broker = Broker::builder(BindingTable::demo())
        .with_config(short_delay_config())
        .build()
        .expect("broker");

    broker
        .send_task_reminder("nightly-backup", "kick off the backup", 100)
        .expect("schedule");
    tokio::time::sleep(Duration::from_millis(300)).await;

    let fired = broker.drain_queue(topology::DELAY_QUEUE);
    assert_eq!(fired.len(), 1);
    let extra = fired[0].extra_data.as_ref().expect("reminder metadata");
    assert_eq!(extra["taskName"], "nightly-backup");
    assert_eq!(extra["reminderText"], "kick off the backup");
    assert!(extra["expectedFireAt"].is_string());
}
