use crate::model::{AppConfig, StatisticsResponse, TriggerResponse};
use reqwest::{Client, StatusCode};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("response did not include a session id")]
    MissingId,

    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Thin client for the two backend endpoints. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    legacy_payload: bool,
}

impl ApiClient {
    pub fn new(cfg: &AppConfig) -> Result<Self, ApiError> {
        let mut builder = Client::builder().user_agent(cfg.user_agent.clone());
        if let Some(timeout) = cfg.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            legacy_payload: cfg.legacy_payload,
        })
    }

    pub fn statistics_url(&self, session_id: &str) -> String {
        format!("{}/api/statistics/{}", self.base_url, session_id)
    }

    /// Start a workflow run for `query`. Returns the normalized session id.
    pub async fn trigger(&self, query: &str) -> Result<String, ApiError> {
        let body = if self.legacy_payload {
            json!({ "input_term": query })
        } else {
            json!({ "query": query })
        };
        let url = format!("{}/api/trigger-n8n", self.base_url);
        tracing::debug!(%url, legacy = self.legacy_payload, "triggering workflow");

        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        let text = resp.text().await?;
        let parsed: TriggerResponse = serde_json::from_str(&text).map_err(|e| {
            tracing::debug!(error = %e, "trigger response is not the expected shape");
            ApiError::MissingId
        })?;
        if let Some(message) = parsed.message.as_deref() {
            tracing::debug!(message, "trigger acknowledged");
        }
        parsed.id.ok_or(ApiError::MissingId)
    }

    /// Fetch the stored result for a session. `json` is `None` until the run finishes.
    pub async fn fetch_statistics(&self, session_id: &str) -> Result<StatisticsResponse, ApiError> {
        let url = self.statistics_url(session_id);
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }
}
