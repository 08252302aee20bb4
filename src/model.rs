use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

/// Resolved runtime configuration shared by the TUI, the controller and headless mode.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub data_dir: PathBuf,
    pub poll_interval: Duration,
    pub request_timeout: Option<Duration>,
    pub legacy_payload: bool,
    pub user_agent: String,
}

/// One user-initiated workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub query: String,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl SessionRecord {
    pub fn new(id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            query: query.into(),
            created_at: now_millis(),
        }
    }

    /// Decode one persisted entry, rejecting anything without a usable id or timestamp.
    pub fn from_value(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;
        let id = obj.get("id").and_then(normalize_id)?;
        let created_at = obj.get("createdAt").and_then(|c| {
            c.as_i64()
                .or_else(|| c.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
        })?;
        let query = obj
            .get("query")
            .and_then(|q| q.as_str())
            .unwrap_or_default()
            .to_string();
        Some(Self {
            id,
            query,
            created_at,
        })
    }

    /// Local "YYYY-MM-DD HH:MM" rendering of `created_at`.
    pub fn created_label(&self) -> String {
        let nanos = i128::from(self.created_at) * 1_000_000;
        let Ok(utc) = time::OffsetDateTime::from_unix_timestamp_nanos(nanos) else {
            return self.created_at.to_string();
        };
        let offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
        utc.to_offset(offset)
            .format(time::macros::format_description!(
                "[year]-[month]-[day] [hour]:[minute]"
            ))
            .unwrap_or_else(|_| self.created_at.to_string())
    }
}

pub fn now_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Normalize an identifier that the backend may send as a number or a string.
pub fn normalize_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn de_opt_id<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().and_then(normalize_id))
}

// The workflow stores the document as text; an inline object is kept as its JSON text.
fn de_opt_document<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(d)?;
    Ok(match v {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Body of `POST /api/trigger-n8n`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerResponse {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `GET /api/statistics/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsResponse {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_document")]
    pub json: Option<String>,
}

/// Events emitted by a statistics poller. Each carries the session it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// Polling (re)started: previous statistics and error are cleared.
    Started { session_id: String },
    /// Statistics fetched but the document is not ready yet.
    Pending {
        session_id: String,
        attempt: u64,
        response: StatisticsResponse,
    },
    Ready {
        session_id: String,
        attempt: u64,
        response: StatisticsResponse,
    },
    Failed {
        session_id: String,
        attempt: u64,
        message: String,
    },
}

impl PollEvent {
    pub fn session_id(&self) -> &str {
        match self {
            PollEvent::Started { session_id }
            | PollEvent::Pending { session_id, .. }
            | PollEvent::Ready { session_id, .. }
            | PollEvent::Failed { session_id, .. } => session_id,
        }
    }

    #[cfg(test)]
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollEvent::Ready { .. } | PollEvent::Failed { .. })
    }
}

/// Events sent from the controller to presentation layers.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Sessions(Vec<SessionRecord>),
    Triggering { query: String },
    Triggered(SessionRecord),
    TriggerFailed(String),
    /// A session was opened (poller started) for this id.
    Opened { session_id: String },
    Poll(PollEvent),
    Info(InfoEvent),
}

/// Structured info events rendered as a status line.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoEvent {
    Message(String),
    SessionDeleted { id: String },
    StoreError(String),
}

impl InfoEvent {
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::SessionDeleted { id } => format!("Deleted session {id}"),
            InfoEvent::StoreError(e) => format!("Session store error: {e}"),
        }
    }
}
