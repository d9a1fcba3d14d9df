//! ---
//! mqx_section: "02-exchange-routing"
//! mqx_subsection: "module"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Static binding table and exchange routing rules."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use mqx_msg::topology;
use mqx_msg::ExchangeKind;

use crate::topic::topic_matches;
use crate::{BindingError, Result, RoutingError};

/// A single exchange-to-queue binding, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeBinding {
    /// Exchange the binding belongs to.
    pub exchange: String,
    /// Queue receiving matched envelopes.
    pub queue: String,
    /// Binding pattern: an exact key for direct/delay exchanges, a wildcard
    /// pattern for topic exchanges, ignored for fanout.
    #[serde(default)]
    pub pattern: String,
}

#[derive(Debug, Clone)]
struct ExchangeEntry {
    kind: ExchangeKind,
    bindings: Vec<QueueBinding>,
}

#[derive(Debug, Clone)]
struct QueueBinding {
    queue: String,
    pattern: String,
}

/// Immutable routing table constructed once during process initialization.
///
/// Lookups are pure reads; no locking is required on the routing path.
#[derive(Debug, Clone)]
pub struct BindingTable {
    exchanges: BTreeMap<String, ExchangeEntry>,
    queues: BTreeSet<String>,
}

impl BindingTable {
    /// Start building a binding table.
    pub fn builder() -> BindingTableBuilder {
        BindingTableBuilder::default()
    }

    /// The demo playground topology: direct, fanout, topic, and delay
    /// exchanges with the well-known queue and key names, plus the unbound
    /// dead-letter queue.
    pub fn demo() -> Self {
        let table = Self::builder()
            .exchange(topology::DIRECT_EXCHANGE, ExchangeKind::Direct)
            .exchange(topology::FANOUT_EXCHANGE, ExchangeKind::Fanout)
            .exchange(topology::TOPIC_EXCHANGE, ExchangeKind::Topic)
            .exchange(topology::DELAY_EXCHANGE, ExchangeKind::Delay)
            .bind(
                topology::DIRECT_EXCHANGE,
                topology::DIRECT_QUEUE,
                topology::DIRECT_ROUTING_KEY,
            )
            .bind(topology::FANOUT_EXCHANGE, topology::FANOUT_QUEUE_1, "")
            .bind(topology::FANOUT_EXCHANGE, topology::FANOUT_QUEUE_2, "")
            .bind(topology::TOPIC_EXCHANGE, topology::TOPIC_QUEUE_USER, "user.*")
            .bind(
                topology::TOPIC_EXCHANGE,
                topology::TOPIC_QUEUE_ORDER,
                "order.*",
            )
            .bind(topology::TOPIC_EXCHANGE, topology::TOPIC_QUEUE_ALL, "#")
            .bind(
                topology::DELAY_EXCHANGE,
                topology::DELAY_QUEUE,
                topology::DELAY_ROUTING_KEY,
            )
            .queue(topology::DEAD_LETTER_QUEUE)
            .build();
        table.expect("demo topology is static and must validate")
    }

    /// Kind of a declared exchange, if present.
    pub fn kind_of(&self, exchange: &str) -> Option<ExchangeKind> {
        self.exchanges.get(exchange).map(|entry| entry.kind)
    }

    /// Every queue name the table knows about, bound or explicitly declared.
    pub fn queue_names(&self) -> impl Iterator<Item = &str> {
        self.queues.iter().map(String::as_str)
    }

    /// Whether the queue exists in this table.
    pub fn contains_queue(&self, queue: &str) -> bool {
        self.queues.contains(queue)
    }

    /// Determine the set of queues that must receive an envelope published to
    /// `exchange` with `routing_key`.
    ///
    /// Direct (and delay) exchanges resolve to exactly one queue and fail
    /// with [`RoutingError::NoMatchingQueue`] when the key is unbound. Fanout
    /// ignores the key entirely. Topic returns every queue whose pattern
    /// matches; an empty set is a valid outcome.
    pub fn route(&self, exchange: &str, routing_key: &str) -> Result<BTreeSet<String>> {
        let entry = self
            .exchanges
            .get(exchange)
            .ok_or_else(|| RoutingError::UnknownExchange {
                exchange: exchange.to_owned(),
            })?;

        let queues: BTreeSet<String> = match entry.kind {
            ExchangeKind::Direct | ExchangeKind::Delay => entry
                .bindings
                .iter()
                .find(|binding| binding.pattern == routing_key)
                .map(|binding| BTreeSet::from([binding.queue.clone()]))
                .ok_or_else(|| RoutingError::NoMatchingQueue {
                    exchange: exchange.to_owned(),
                    routing_key: routing_key.to_owned(),
                })?,
            ExchangeKind::Fanout => entry
                .bindings
                .iter()
                .map(|binding| binding.queue.clone())
                .collect(),
            ExchangeKind::Topic => entry
                .bindings
                .iter()
                .filter(|binding| topic_matches(&binding.pattern, routing_key))
                .map(|binding| binding.queue.clone())
                .collect(),
        };

        debug!(
            exchange,
            routing_key,
            kind = entry.kind.as_str(),
            matched = queues.len(),
            "routing lookup"
        );
        Ok(queues)
    }
}

/// Builder assembling a [`BindingTable`] during startup.
#[derive(Debug, Default)]
pub struct BindingTableBuilder {
    exchanges: Vec<(String, ExchangeKind)>,
    queues: BTreeSet<String>,
    bindings: Vec<ExchangeBinding>,
}

impl BindingTableBuilder {
    /// Declare an exchange with its kind.
    pub fn exchange(mut self, name: impl Into<String>, kind: ExchangeKind) -> Self {
        self.exchanges.push((name.into(), kind));
        self
    }

    /// Declare a queue that has no binding (e.g. a dead-letter queue).
    pub fn queue(mut self, name: impl Into<String>) -> Self {
        self.queues.insert(name.into());
        self
    }

    /// Bind a queue to an exchange under a pattern.
    pub fn bind(
        mut self,
        exchange: impl Into<String>,
        queue: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        self.bindings.push(ExchangeBinding {
            exchange: exchange.into(),
            queue: queue.into(),
            pattern: pattern.into(),
        });
        self
    }

    /// Validate and freeze the table.
    pub fn build(self) -> std::result::Result<BindingTable, BindingError> {
        let mut exchanges: BTreeMap<String, ExchangeEntry> = BTreeMap::new();
        for (name, kind) in self.exchanges {
            if exchanges.contains_key(&name) {
                return Err(BindingError::DuplicateExchange { exchange: name });
            }
            exchanges.insert(
                name,
                ExchangeEntry {
                    kind,
                    bindings: Vec::new(),
                },
            );
        }

        let mut queues = self.queues;
        for binding in self.bindings {
            let entry = exchanges.get_mut(&binding.exchange).ok_or_else(|| {
                BindingError::UndeclaredExchange {
                    exchange: binding.exchange.clone(),
                }
            })?;
            if matches!(entry.kind, ExchangeKind::Direct | ExchangeKind::Delay)
                && entry
                    .bindings
                    .iter()
                    .any(|existing| existing.pattern == binding.pattern)
            {
                return Err(BindingError::DuplicateDirectBinding {
                    exchange: binding.exchange,
                    routing_key: binding.pattern,
                });
            }
            queues.insert(binding.queue.clone());
            entry.bindings.push(QueueBinding {
                queue: binding.queue,
                pattern: binding.pattern,
            });
        }

        Ok(BindingTable { exchanges, queues })
    }
}
