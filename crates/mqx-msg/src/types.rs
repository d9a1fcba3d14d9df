//! ---
//! mqx_section: "01-envelope-data-model"
//! mqx_subsection: "module"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Envelope schema, wire codec, and messaging observability helpers."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Exchange kinds supported by the routing core. The same enumeration tags
/// envelopes on the wire (`"type"` field) and classifies declared exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExchangeKind {
    /// Exact routing-key match to a single bound queue.
    Direct,
    /// Broadcast to every bound queue; routing key ignored.
    Fanout,
    /// Wildcard pattern match (`*` = one segment, `#` = zero or more).
    Topic,
    /// Deferred visibility, then routed as a direct message.
    Delay,
}

impl ExchangeKind {
    /// Stable lowercase name used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::Direct => "direct",
            ExchangeKind::Fanout => "fanout",
            ExchangeKind::Topic => "topic",
            ExchangeKind::Delay => "delay",
        }
    }
}

/// Canonical message representation carried through the router, queues, and
/// consumers. Producers fill the builder-phase fields before submission; the
/// consumer sets `receiver` while processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Unique identifier, generated at construction when not supplied.
    pub id: String,
    /// Textual payload of the message.
    pub content: String,
    /// Exchange kind the envelope was produced for. Immutable after send.
    #[serde(rename = "type")]
    pub kind: ExchangeKind,
    /// Free-text producer identity.
    #[serde(default)]
    pub sender: Option<String>,
    /// Free-text consumer identity, set during processing.
    #[serde(default)]
    pub receiver: Option<String>,
    /// Routing key; required non-empty for Direct and Topic envelopes.
    #[serde(default)]
    pub routing_key: String,
    /// Delay in milliseconds; meaningful only for Delay envelopes.
    #[serde(default)]
    pub delay: Option<u64>,
    /// Construction timestamp, second precision on the wire.
    #[serde(with = "wire_timestamp")]
    pub create_time: NaiveDateTime,
    /// Opaque structured payload passed through the router unchanged.
    #[serde(default)]
    pub extra_data: Option<JsonValue>,
}

impl Envelope {
    /// Construct an envelope around a textual payload.
    pub fn new(content: impl Into<String>, kind: ExchangeKind) -> Self {
        Self {
            id: generate_id(),
            content: content.into(),
            kind,
            sender: None,
            receiver: None,
            routing_key: String::new(),
            delay: None,
            create_time: now_to_the_second(),
            extra_data: None,
        }
    }

    /// Override the generated identifier (used when replaying known messages).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach a producer identity.
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Set the routing key used by direct/topic routing.
    pub fn with_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_key = routing_key.into();
        self
    }

    /// Set the visibility delay in milliseconds.
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay = Some(delay_ms);
        self
    }

    /// Attach an opaque structured payload.
    pub fn with_extra(mut self, extra: JsonValue) -> Self {
        self.extra_data = Some(extra);
        self
    }
}

/// Generate a fresh envelope identifier.
///
/// The constant `MSG-` tag survives from the source system; the UUID suffix
/// replaces its millisecond timestamp, which collides under concurrent sends.
pub fn generate_id() -> String {
    format!("MSG-{}", Uuid::new_v4().simple())
}

fn now_to_the_second() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

mod wire_timestamp {
    //! `yyyy-MM-dd HH:mm:ss` timestamps, matching the source wire format.
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
