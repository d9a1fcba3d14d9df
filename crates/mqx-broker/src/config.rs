//! ---
//! mqx_section: "03-delivery-runtime"
//! mqx_subsection: "module"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Application configuration: broker tuning, topology declarations, file loading."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use mqx_logging::LoggingConfig;
use mqx_msg::{topology, ExchangeKind};
use mqx_router::{BindingError, BindingTable, ExchangeBinding};

fn default_concurrency() -> usize {
    1
}

fn default_max_redeliveries() -> u32 {
    5
}

fn default_dead_letter_queue() -> Option<String> {
    Some(topology::DEAD_LETTER_QUEUE.to_owned())
}

fn default_delay_ms() -> u64 {
    topology::DEFAULT_DELAY_MS
}

/// Broker section of the application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Concurrent handler invocations per queue. Ordering within a queue is
    /// only guaranteed at 1.
    #[serde(default = "default_concurrency")]
    pub default_concurrency: usize,
    /// Requeues permitted before an envelope is diverted to the dead-letter
    /// queue. `0` restores the source system's unbounded requeue behavior.
    #[serde(default = "default_max_redeliveries")]
    pub max_redeliveries: u32,
    /// Queue receiving envelopes past the redelivery cap.
    #[serde(default = "default_dead_letter_queue")]
    pub dead_letter_queue: Option<String>,
    /// Delay substituted when a scheduled envelope carries no delay or an
    /// explicit zero. Applied consistently for every `schedule` call.
    #[serde(default = "default_delay_ms")]
    pub default_delay_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            default_concurrency: default_concurrency(),
            max_redeliveries: default_max_redeliveries(),
            dead_letter_queue: default_dead_letter_queue(),
            default_delay_ms: default_delay_ms(),
        }
    }
}

impl BrokerConfig {
    /// Redelivery cap as an option; `0` in configuration means unbounded.
    pub fn redelivery_cap(&self) -> Option<u32> {
        if self.max_redeliveries == 0 {
            None
        } else {
            Some(self.max_redeliveries)
        }
    }
}

/// Declaration of a single exchange in the topology section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Exchange name.
    pub name: String,
    /// Exchange kind.
    pub kind: ExchangeKind,
}

/// Topology section of the application configuration. An empty section
/// selects the demo playground topology.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Declared exchanges.
    #[serde(default)]
    pub exchanges: Vec<ExchangeConfig>,
    /// Queues without bindings (e.g. dead-letter queues).
    #[serde(default)]
    pub queues: Vec<String>,
    /// Exchange-to-queue bindings.
    #[serde(default)]
    pub bindings: Vec<ExchangeBinding>,
}

impl TopologyConfig {
    /// Whether the section declares anything at all.
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty() && self.queues.is_empty() && self.bindings.is_empty()
    }

    /// Freeze the declared topology into a binding table, falling back to the
    /// demo playground when the section is empty.
    pub fn binding_table(&self) -> std::result::Result<BindingTable, BindingError> {
        if self.is_empty() {
            return Ok(BindingTable::demo());
        }
        let mut builder = BindingTable::builder();
        for exchange in &self.exchanges {
            builder = builder.exchange(&exchange.name, exchange.kind);
        }
        for queue in &self.queues {
            builder = builder.queue(queue);
        }
        for binding in &self.bindings {
            builder = builder.bind(&binding.exchange, &binding.queue, &binding.pattern);
        }
        builder.build()
    }
}

/// Primary configuration object for the MQX runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging section.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Broker section.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Topology section.
    #[serde(default)]
    pub topology: TopologyConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    /// The parsed configuration.
    pub config: AppConfig,
    /// Path the configuration was read from.
    pub source: PathBuf,
}

impl AppConfig {
    /// Environment variable overriding the configuration path.
    pub const ENV_CONFIG_PATH: &'static str = "MQX_CONFIG";

    /// Load configuration from disk, respecting the `MQX_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Parse a configuration file from an explicit path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading config {}", path.as_ref().display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.as_ref().display()))?;
        debug!(path = %path.as_ref().display(), "configuration parsed");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_select_demo_topology_and_bounded_redelivery() {
        let config = AppConfig::default();
        assert_eq!(config.broker.default_concurrency, 1);
        assert_eq!(config.broker.redelivery_cap(), Some(5));
        assert_eq!(
            config.broker.dead_letter_queue.as_deref(),
            Some(topology::DEAD_LETTER_QUEUE)
        );
        assert_eq!(config.broker.default_delay_ms, topology::DEFAULT_DELAY_MS);

        let table = config.topology.binding_table().expect("demo table");
        assert!(table.contains_queue(topology::DIRECT_QUEUE));
    }

    #[test]
    fn zero_max_redeliveries_means_unbounded() {
        let config = BrokerConfig {
            max_redeliveries: 0,
            ..BrokerConfig::default()
        };
        assert_eq!(config.redelivery_cap(), None);
    }

    #[test]
    fn toml_round_trip_with_custom_topology() {
        let raw = r#"
            [broker]
            default_concurrency = 4
            max_redeliveries = 2
            default_delay_ms = 250

            [topology]
            queues = ["audit.queue"]

            [[topology.exchanges]]
            name = "app.direct"
            kind = "DIRECT"

            [[topology.bindings]]
            exchange = "app.direct"
            queue = "app.queue"
            pattern = "app.key"
        "#;
        let config: AppConfig = toml::from_str(raw).expect("parse");
        assert_eq!(config.broker.default_concurrency, 4);
        assert_eq!(config.broker.redelivery_cap(), Some(2));
        assert_eq!(config.broker.default_delay_ms, 250);

        let table = config.topology.binding_table().expect("table");
        assert!(table.contains_queue("app.queue"));
        assert!(table.contains_queue("audit.queue"));
        assert_eq!(table.kind_of("app.direct"), Some(ExchangeKind::Direct));
    }

    #[test]
    fn load_with_source_falls_back_through_candidates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mqx.toml");
        let mut file = std::fs::File::create(&path).expect("create");
        writeln!(file, "[broker]\nmax_redeliveries = 1").expect("write");

        let missing = dir.path().join("absent.toml");
        let loaded =
            AppConfig::load_with_source(&[missing, path.clone()]).expect("load succeeds");
        assert_eq!(loaded.source, path);
        assert_eq!(loaded.config.broker.max_redeliveries, 1);
    }

    #[test]
    fn load_without_any_candidate_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = AppConfig::load(&[dir.path().join("nope.toml")]).expect_err("missing config");
        assert!(err.to_string().contains("no configuration files found"));
    }
}
