//! ---
//! mqx_section: "04-daemon"
//! mqx_subsection: "binary"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Binary entrypoint for the MQX daemon."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use prometheus::{Registry, TextEncoder};
use tokio::signal;
use tracing::{info, warn};

use mqx_broker::{AppConfig, Broker, LoadedAppConfig};
use mqx_logging::init_tracing;
use mqx_msg::topology;

mod handlers;

use handlers::{
    DelayConsumer, DirectConsumer, LogService, MonitorService, OrderService, StatisticsService,
    UserService,
};

/// Extra settle time after the last expected delivery before a one-shot
/// command exits.
const SETTLE: Duration = Duration::from_millis(300);

#[derive(Debug, Parser)]
#[command(author, version, about = "MQX broker daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the playground broker until interrupted")]
    Run,
    #[command(about = "Exercise every exchange kind once, then exit")]
    Demo,
    #[command(about = "Publish one message to the direct exchange")]
    Direct {
        content: String,
        #[arg(long, default_value = topology::DIRECT_ROUTING_KEY)]
        key: String,
    },
    #[command(about = "Broadcast one message on the fanout exchange")]
    Fanout { content: String },
    #[command(about = "Publish one message to the topic exchange")]
    Topic { content: String, key: String },
    #[command(about = "Schedule one delayed message (0 = default delay)")]
    Delay {
        content: String,
        #[arg(long, default_value_t = 0, conflicts_with = "preset")]
        delay_ms: u64,
        #[arg(long, value_enum, help = "Use one of the well-known delay presets")]
        preset: Option<DelayPreset>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DelayPreset {
    FiveSeconds,
    ThirtySeconds,
    OneMinute,
    FiveMinutes,
}

impl DelayPreset {
    fn as_millis(self) -> u64 {
        match self {
            DelayPreset::FiveSeconds => topology::DELAY_5_SECONDS,
            DelayPreset::ThirtySeconds => topology::DELAY_30_SECONDS,
            DelayPreset::OneMinute => topology::DELAY_1_MINUTE,
            DelayPreset::FiveMinutes => topology::DELAY_5_MINUTES,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = load_config(&cli)?;
    let config = loaded
        .as_ref()
        .map(|loaded| loaded.config.clone())
        .unwrap_or_default();
    init_tracing("mqxd", &config.logging)?;
    match &loaded {
        Some(loaded) => info!(path = %loaded.source.display(), "configuration loaded"),
        None => info!("no configuration file found; using built-in defaults"),
    }

    let registry = Registry::new();
    let broker = build_playground(&config, &registry)?;

    match cli.command.unwrap_or(Commands::Demo) {
        Commands::Run => {
            info!("playground broker running; waiting for termination signal");
            signal::ctrl_c().await?;
            info!("ctrl-c received; shutting down");
        }
        Commands::Demo => run_demo(&broker, &config).await?,
        Commands::Direct { content, key } => {
            let receipt = broker.send_direct_with_key(content, &key)?;
            info!(envelope_id = %receipt.envelope_id, "direct message accepted");
            tokio::time::sleep(SETTLE).await;
        }
        Commands::Fanout { content } => {
            let receipt = broker.send_fanout(content)?;
            info!(
                envelope_id = %receipt.envelope_id,
                queues = receipt.queues.len(),
                "broadcast accepted"
            );
            tokio::time::sleep(SETTLE).await;
        }
        Commands::Topic { content, key } => {
            let receipt = broker.send_topic(content, &key)?;
            info!(
                envelope_id = %receipt.envelope_id,
                queues = receipt.queues.len(),
                "topic message accepted"
            );
            tokio::time::sleep(SETTLE).await;
        }
        Commands::Delay {
            content,
            delay_ms,
            preset,
        } => {
            let requested = preset.map(DelayPreset::as_millis).unwrap_or(delay_ms);
            let receipt = broker.send_delay(content, requested)?;
            let effective = if requested > 0 {
                requested
            } else {
                config.broker.default_delay_ms
            };
            info!(
                envelope_id = %receipt.envelope_id,
                delay_ms = effective,
                "delayed message scheduled"
            );
            tokio::time::sleep(Duration::from_millis(effective) + SETTLE).await;
        }
    }

    report_dead_letters(&broker);
    dump_metrics(&registry);
    broker.shutdown();
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Option<LoadedAppConfig>> {
    if let Some(path) = &cli.config {
        let config = AppConfig::from_path(path)?;
        return Ok(Some(LoadedAppConfig {
            config,
            source: path.clone(),
        }));
    }
    let candidates = [
        PathBuf::from("configs/mqx.toml"),
        PathBuf::from("/etc/mqx/mqx.toml"),
    ];
    if std::env::var(AppConfig::ENV_CONFIG_PATH).is_ok()
        || candidates.iter().any(|candidate| candidate.exists())
    {
        return Ok(Some(AppConfig::load_with_source(&candidates)?));
    }
    Ok(None)
}

/// Assemble the playground broker: the demo topology (or the configured one)
/// with every demo consumer registered.
fn build_playground(config: &AppConfig, registry: &Registry) -> Result<Broker> {
    let table = config
        .topology
        .binding_table()
        .context("freezing topology")?;
    let broker = Broker::builder(table)
        .with_config(config.broker.clone())
        .with_metrics(registry)
        .context("registering broker metrics")?
        .handler(topology::DIRECT_QUEUE, Arc::new(DirectConsumer))
        .handler(topology::FANOUT_QUEUE_1, Arc::new(LogService))
        .handler(topology::FANOUT_QUEUE_2, Arc::new(StatisticsService))
        .handler(topology::TOPIC_QUEUE_USER, Arc::new(UserService))
        .handler(topology::TOPIC_QUEUE_ORDER, Arc::new(OrderService))
        .handler(topology::TOPIC_QUEUE_ALL, Arc::new(MonitorService))
        .handler(topology::DELAY_QUEUE, Arc::new(DelayConsumer))
        .build()
        .context("assembling broker")?;
    Ok(broker)
}

/// One pass over every exchange kind, mirroring the original playground tour.
async fn run_demo(broker: &Broker, config: &AppConfig) -> Result<()> {
    broker.send_direct("hello direct")?;
    broker.send_fanout("hello everyone")?;
    broker.send_topic("welcome mail", topology::TOPIC_ROUTING_KEY_USER_EMAIL)?;
    broker.send_topic("login code", topology::TOPIC_ROUTING_KEY_USER_SMS)?;
    broker.send_order_notification("order 42 created", topology::TOPIC_ROUTING_KEY_ORDER_CREATE)?;
    broker.send_order_notification("order 42 paid", topology::TOPIC_ROUTING_KEY_ORDER_PAYMENT)?;
    broker.send_user_notification("user-7", "password changed", topology::TOPIC_ROUTING_KEY_USER_EMAIL)?;
    broker.send_delay("see you in a bit", 0)?;
    broker.send_task_reminder("nightly-backup", "kick off the backup", 1_000)?;

    let longest_delay = config.broker.default_delay_ms.max(1_000);
    info!(wait_ms = longest_delay, "demo published; waiting for delayed messages");
    tokio::time::sleep(Duration::from_millis(longest_delay) + SETTLE).await;
    Ok(())
}

fn report_dead_letters(broker: &Broker) {
    if let Some(queue) = broker.config().dead_letter_queue.clone() {
        for envelope in broker.drain_queue(&queue) {
            warn!(
                envelope_id = %envelope.id,
                content = %envelope.content,
                "dead-lettered envelope"
            );
        }
    }
}

fn dump_metrics(registry: &Registry) {
    match TextEncoder::new().encode_to_string(&registry.gather()) {
        Ok(rendered) if !rendered.is_empty() => println!("{rendered}"),
        Ok(_) => {}
        Err(err) => warn!(error = %err, "failed to render metrics"),
    }
}
