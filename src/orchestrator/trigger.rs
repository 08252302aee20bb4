//! Starting a workflow run and recording it as the active session.

use crate::engine::ApiClient;
use crate::model::SessionRecord;
use crate::storage::{merge_session, SessionStore};
use anyhow::{bail, Context, Result};

/// Trigger a run for `query`, then persist it as the newest, active session.
///
/// Exactly one network call is made for a non-blank query; the store is only
/// touched when that call succeeds.
pub(crate) async fn trigger_session(
    client: &ApiClient,
    store: &SessionStore,
    query: &str,
) -> Result<SessionRecord> {
    let record = start_run(client, query).await?;
    record_session(store, &record)?;
    Ok(record)
}

/// Network half of a trigger: validate the query and start the workflow run.
/// The store is not touched.
pub(crate) async fn start_run(client: &ApiClient, query: &str) -> Result<SessionRecord> {
    let query = query.trim();
    if query.is_empty() {
        bail!("Enter a vendor or product name");
    }

    let id = client
        .trigger(query)
        .await
        .context("Failed to start the assessment")?;
    let record = SessionRecord::new(id, query);
    tracing::info!(session = %record.id, query, "workflow triggered");
    Ok(record)
}

/// Merge `record` into the stored list and make it the active session.
pub(crate) fn record_session(store: &SessionStore, record: &SessionRecord) -> Result<()> {
    let mut sessions = store.load();
    merge_session(&mut sessions, record.clone());
    store.save(&sessions)?;
    store.set_active(Some(&record.id))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ApiClient;
    use crate::model::AppConfig;
    use crate::storage::MAX_SESSIONS;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(&AppConfig {
            base_url: server.uri(),
            data_dir: std::path::PathBuf::from("."),
            poll_interval: Duration::from_millis(50),
            request_timeout: None,
            legacy_payload: false,
            user_agent: "securityassess-test".into(),
        })
        .unwrap()
    }

    async fn mount_trigger(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/api/trigger-n8n"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn acme_corp_becomes_first_and_active() {
        let server = MockServer::start().await;
        mount_trigger(&server, serde_json::json!({"id": 42})).await;
        let store = SessionStore::in_memory();
        store
            .save(&[SessionRecord {
                id: "1".into(),
                query: "Older".into(),
                created_at: 1,
            }])
            .unwrap();

        let record = trigger_session(&client_for(&server), &store, "  Acme Corp ")
            .await
            .unwrap();
        assert_eq!(record.id, "42");
        assert_eq!(record.query, "Acme Corp");

        let sessions = store.load();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, "42");
        assert_eq!(sessions[0].query, "Acme Corp");
        assert_eq!(store.active().as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn repeated_id_replaces_entry() {
        let server = MockServer::start().await;
        mount_trigger(&server, serde_json::json!({"id": "same"})).await;
        let client = client_for(&server);
        let store = SessionStore::in_memory();

        trigger_session(&client, &store, "first").await.unwrap();
        trigger_session(&client, &store, "second").await.unwrap();
        let sessions = store.load();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].query, "second");
    }

    #[tokio::test]
    async fn list_is_capped() {
        let server = MockServer::start().await;
        for i in 0..(MAX_SESSIONS + 5) {
            Mock::given(method("POST"))
                .and(path("/api/trigger-n8n"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": i})))
                .up_to_n_times(1)
                .mount(&server)
                .await;
        }
        let client = client_for(&server);
        let store = SessionStore::in_memory();
        for i in 0..(MAX_SESSIONS + 5) {
            let r = trigger_session(&client, &store, &format!("q{i}")).await.unwrap();
            let sessions = store.load();
            assert!(sessions.len() <= MAX_SESSIONS);
            assert_eq!(sessions[0].id, r.id);
        }
        assert_eq!(store.load().len(), MAX_SESSIONS);
    }

    #[tokio::test]
    async fn failure_leaves_store_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/trigger-n8n"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        let store = SessionStore::in_memory();
        store.set_active(Some("old")).unwrap();

        assert!(trigger_session(&client_for(&server), &store, "Acme").await.is_err());
        assert!(store.load().is_empty());
        assert_eq!(store.active().as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn blank_query_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let store = SessionStore::in_memory();
        assert!(trigger_session(&client_for(&server), &store, "   ").await.is_err());
    }
}
