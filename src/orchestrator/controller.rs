//! Session controller.
//!
//! Executes UI commands on the tokio side (trigger, open, close, delete) and owns the
//! single active statistics poller. Events flow back to presentation layers. All
//! session-list writes happen on this task, so a delete and a finishing trigger can
//! never interleave their load/save cycles.

use super::trigger::{record_session, start_run};
use crate::engine::{spawn_poller, ApiClient, PollHandle};
use crate::model::{AppConfig, AppEvent, InfoEvent, PollEvent, SessionRecord};
use crate::storage::SessionStore;
use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    /// Start a workflow run for a search term.
    Trigger(String),
    /// Show the dashboard for a stored (or dangling) session id.
    Open(String),
    /// Leave the dashboard: stop polling and clear the active pointer.
    Close,
    Delete(String),
    Quit,
}

type TriggerTask = tokio::task::JoinHandle<Result<SessionRecord>>;

/// The open session's poller together with its own event channel.
///
/// Every open gets a fresh channel, so events still queued by a replaced poller
/// (even one for the same session id) are dropped with its receiver.
#[derive(Default)]
struct PollSlot {
    active: Option<(PollHandle, UnboundedReceiver<PollEvent>)>,
}

impl PollSlot {
    fn open(&mut self, client: &ApiClient, session_id: &str, interval: Duration) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_poller(client.clone(), session_id, interval, tx);
        // Dropping the previous handle stops that poller.
        self.active = Some((handle, rx));
    }

    fn close(&mut self) {
        if let Some((mut handle, _)) = self.active.take() {
            handle.stop();
        }
    }

    fn session_id(&self) -> Option<&str> {
        self.active.as_ref().map(|(h, _)| h.session_id())
    }

    /// Next event from the current poller; pending forever when nothing is open.
    async fn next(&mut self) -> Option<PollEvent> {
        match self.active.as_mut() {
            Some((_, rx)) => rx.recv().await,
            None => futures::future::pending().await,
        }
    }
}

/// Run until `Quit` (or the command channel closes).
pub(crate) async fn run_controller(
    cfg: &AppConfig,
    client: ApiClient,
    store: SessionStore,
    event_tx: UnboundedSender<AppEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut poller = PollSlot::default();
    let mut trigger_task: Option<TriggerTask> = None;

    let _ = event_tx.send(AppEvent::Sessions(store.load()));
    if let Some(active) = store.active() {
        open_session(cfg, &client, &active, &mut poller, &event_tx);
    }

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Trigger(query)) => {
                        if trigger_task.is_some() {
                            let _ = event_tx.send(AppEvent::Info(InfoEvent::Message(
                                "A search is already in progress".into(),
                            )));
                            continue;
                        }
                        let _ = event_tx.send(AppEvent::Triggering { query: query.clone() });
                        let client = client.clone();
                        // Only the network call runs off-task; the store write happens below.
                        trigger_task = Some(tokio::spawn(async move {
                            start_run(&client, &query).await
                        }));
                    }
                    Some(UiCommand::Open(id)) => {
                        if let Err(e) = store.set_active(Some(&id)) {
                            let _ = event_tx.send(AppEvent::Info(InfoEvent::StoreError(format!("{e:#}"))));
                        }
                        open_session(cfg, &client, &id, &mut poller, &event_tx);
                    }
                    Some(UiCommand::Close) => {
                        poller.close();
                        if let Err(e) = store.set_active(None) {
                            let _ = event_tx.send(AppEvent::Info(InfoEvent::StoreError(format!("{e:#}"))));
                        }
                    }
                    Some(UiCommand::Delete(id)) => {
                        if poller.session_id() == Some(id.as_str()) {
                            poller.close();
                        }
                        match store.remove(&id) {
                            Ok(sessions) => {
                                let _ = event_tx.send(AppEvent::Sessions(sessions));
                                let _ = event_tx.send(AppEvent::Info(InfoEvent::SessionDeleted { id }));
                            }
                            Err(e) => {
                                let _ = event_tx.send(AppEvent::Info(InfoEvent::StoreError(format!("{e:#}"))));
                            }
                        }
                    }
                    Some(UiCommand::Quit) | None => break,
                }
            }
            // Take the JoinHandle only once it has completed, so a losing branch cannot drop it.
            done = async {
                match trigger_task.as_mut() {
                    Some(h) => h.await,
                    None => futures::future::pending().await,
                }
            } => {
                trigger_task = None;
                match done {
                    Ok(Ok(record)) => match record_session(&store, &record) {
                        Ok(()) => {
                            let _ = event_tx.send(AppEvent::Triggered(record.clone()));
                            let _ = event_tx.send(AppEvent::Sessions(store.load()));
                            open_session(cfg, &client, &record.id, &mut poller, &event_tx);
                        }
                        Err(e) => {
                            tracing::warn!(error = %format!("{e:#}"), "could not record session");
                            let _ = event_tx.send(AppEvent::TriggerFailed(format!("{e:#}")));
                        }
                    },
                    Ok(Err(e)) => {
                        tracing::warn!(error = %format!("{e:#}"), "trigger failed");
                        let _ = event_tx.send(AppEvent::TriggerFailed(format!("{e:#}")));
                    }
                    Err(e) => {
                        let _ = event_tx.send(AppEvent::TriggerFailed(format!("Search task failed: {e}")));
                    }
                }
            }
            Some(ev) = poller.next() => {
                let _ = event_tx.send(AppEvent::Poll(ev));
            }
        }
    }

    if let Some(task) = trigger_task.take() {
        task.abort();
    }
    poller.close();
    Ok(())
}

fn open_session(
    cfg: &AppConfig,
    client: &ApiClient,
    session_id: &str,
    poller: &mut PollSlot,
    event_tx: &UnboundedSender<AppEvent>,
) {
    let _ = event_tx.send(AppEvent::Opened {
        session_id: session_id.to_string(),
    });
    poller.open(client, session_id, cfg.poll_interval);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cfg(base: &str) -> AppConfig {
        AppConfig {
            base_url: base.to_string(),
            data_dir: std::path::PathBuf::from("."),
            poll_interval: Duration::from_millis(50),
            request_timeout: Some(Duration::from_secs(5)),
            legacy_payload: false,
            user_agent: "securityassess-test".into(),
        }
    }

    async fn next_matching<F>(rx: &mut UnboundedReceiver<AppEvent>, mut pred: F) -> AppEvent
    where
        F: FnMut(&AppEvent) -> bool,
    {
        loop {
            let ev = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for event")
                .expect("controller closed");
            if pred(&ev) {
                return ev;
            }
        }
    }

    #[tokio::test]
    async fn trigger_then_poll_until_ready() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/trigger-n8n"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 42})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/statistics/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 42, "json": null})))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/statistics/42"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": 42, "json": "{\"a\":1}"})),
            )
            .mount(&server)
            .await;

        let cfg = cfg(&server.uri());
        let client = ApiClient::new(&cfg).unwrap();
        let store = SessionStore::in_memory();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let ctrl_store = store.clone();
        let handle = tokio::spawn(async move {
            run_controller(&cfg, client, ctrl_store, event_tx, cmd_rx).await
        });

        cmd_tx.send(UiCommand::Trigger("Acme Corp".into())).unwrap();
        let triggered = next_matching(&mut event_rx, |e| matches!(e, AppEvent::Triggered(_))).await;
        match triggered {
            AppEvent::Triggered(r) => assert_eq!(r.id, "42"),
            _ => unreachable!(),
        }
        let ready = next_matching(&mut event_rx, |e| {
            matches!(e, AppEvent::Poll(PollEvent::Ready { .. }))
        })
        .await;
        match ready {
            AppEvent::Poll(PollEvent::Ready { session_id, attempt, response }) => {
                assert_eq!(session_id, "42");
                assert_eq!(attempt, 3);
                assert_eq!(response.json.as_deref(), Some("{\"a\":1}"));
            }
            _ => unreachable!(),
        }
        assert_eq!(store.active().as_deref(), Some("42"));

        cmd_tx.send(UiCommand::Close).unwrap();
        cmd_tx.send(UiCommand::Quit).unwrap();
        handle.await.unwrap().unwrap();
        assert_eq!(store.active(), None);
    }

    #[tokio::test]
    async fn resumes_active_session_on_start_and_reports_trigger_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/trigger-n8n"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "no id"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/statistics/dangling"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let cfg = cfg(&server.uri());
        let client = ApiClient::new(&cfg).unwrap();
        let store = SessionStore::in_memory();
        store.set_active(Some("dangling")).unwrap();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            run_controller(&cfg, client, store, event_tx, cmd_rx).await
        });

        let opened = next_matching(&mut event_rx, |e| matches!(e, AppEvent::Opened { .. })).await;
        assert!(matches!(opened, AppEvent::Opened { session_id } if session_id == "dangling"));
        let failed = next_matching(&mut event_rx, |e| {
            matches!(e, AppEvent::Poll(PollEvent::Failed { .. }))
        })
        .await;
        assert!(matches!(failed, AppEvent::Poll(PollEvent::Failed { attempt: 1, .. })));

        cmd_tx.send(UiCommand::Trigger("Acme".into())).unwrap();
        let ev = next_matching(&mut event_rx, |e| matches!(e, AppEvent::TriggerFailed(_))).await;
        assert!(matches!(ev, AppEvent::TriggerFailed(msg) if msg.contains("session id")));

        drop(cmd_tx);
        handle.await.unwrap().unwrap();
    }

    async fn next_poll(slot: &mut PollSlot) -> PollEvent {
        tokio::time::timeout(Duration::from_secs(5), slot.next())
            .await
            .expect("timed out waiting for poll event")
            .expect("poller channel closed")
    }

    #[tokio::test]
    async fn delete_during_trigger_is_not_undone() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/trigger-n8n"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": 42}))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/statistics/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 42, "json": null})))
            .mount(&server)
            .await;

        let cfg = cfg(&server.uri());
        let client = ApiClient::new(&cfg).unwrap();
        let store = SessionStore::in_memory();
        store.save(&[SessionRecord::new("1", "Older")]).unwrap();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let ctrl_store = store.clone();
        let handle = tokio::spawn(async move {
            run_controller(&cfg, client, ctrl_store, event_tx, cmd_rx).await
        });

        cmd_tx.send(UiCommand::Trigger("Acme".into())).unwrap();
        next_matching(&mut event_rx, |e| matches!(e, AppEvent::Triggering { .. })).await;
        cmd_tx.send(UiCommand::Delete("1".into())).unwrap();
        next_matching(&mut event_rx, |e| {
            matches!(e, AppEvent::Info(InfoEvent::SessionDeleted { .. }))
        })
        .await;
        next_matching(&mut event_rx, |e| matches!(e, AppEvent::Triggered(_))).await;

        let ids: Vec<_> = store.load().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["42".to_string()]);

        cmd_tx.send(UiCommand::Quit).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reopening_drops_events_queued_by_previous_poller() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/statistics/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 42, "json": "old"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/statistics/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 42, "json": "new"})))
            .mount(&server)
            .await;

        let cfg = cfg(&server.uri());
        let client = ApiClient::new(&cfg).unwrap();
        let mut slot = PollSlot::default();

        // The first poller finishes while nobody reads its events.
        slot.open(&client, "42", cfg.poll_interval);
        tokio::time::sleep(Duration::from_millis(300)).await;
        slot.open(&client, "42", cfg.poll_interval);
        assert_eq!(slot.session_id(), Some("42"));

        assert!(matches!(next_poll(&mut slot).await, PollEvent::Started { .. }));
        match next_poll(&mut slot).await {
            PollEvent::Ready { attempt, response, .. } => {
                assert_eq!(attempt, 1);
                assert_eq!(response.json.as_deref(), Some("new"));
            }
            other => panic!("expected ready event, got {other:?}"),
        }

        slot.close();
        assert_eq!(slot.session_id(), None);
    }
}
