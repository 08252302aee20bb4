//! Statistics poller.
//!
//! `PollMachine` holds the `Idle → Polling → {Ready, Failed}` transitions; `spawn_poller`
//! drives one machine from a tokio task on a fixed interval until it reaches a terminal
//! state or its `PollHandle` is stopped.

use super::client::{ApiClient, ApiError};
use crate::model::{PollEvent, StatisticsResponse};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Idle,
    Polling,
    Ready(StatisticsResponse),
    Failed(String),
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollState::Ready(_) | PollState::Failed(_))
    }
}

/// Per-session poll state. No state is shared between machines.
#[derive(Debug)]
pub struct PollMachine {
    session_id: String,
    state: PollState,
    attempts: u64,
}

impl PollMachine {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            state: PollState::Idle,
            attempts: 0,
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Enter `Polling`, discarding any previous result.
    pub fn start(&mut self) -> PollEvent {
        self.state = PollState::Polling;
        self.attempts = 0;
        PollEvent::Started {
            session_id: self.session_id.clone(),
        }
    }

    /// Apply the outcome of one fetch. Returns `None` once the machine is terminal or idle.
    pub fn apply(&mut self, outcome: Result<StatisticsResponse, ApiError>) -> Option<PollEvent> {
        if self.state != PollState::Polling {
            return None;
        }
        self.attempts += 1;
        let attempt = self.attempts;
        let session_id = self.session_id.clone();
        match outcome {
            Ok(response) => {
                if response.json.is_some() {
                    self.state = PollState::Ready(response.clone());
                    Some(PollEvent::Ready {
                        session_id,
                        attempt,
                        response,
                    })
                } else {
                    Some(PollEvent::Pending {
                        session_id,
                        attempt,
                        response,
                    })
                }
            }
            Err(e) => {
                let message = format!("Failed to load statistics: {e}");
                self.state = PollState::Failed(message.clone());
                Some(PollEvent::Failed {
                    session_id,
                    attempt,
                    message,
                })
            }
        }
    }
}

/// Control handle for a running poller. Dropping it stops the poller.
pub struct PollHandle {
    session_id: String,
    stopped: Arc<AtomicBool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl PollHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[cfg(test)]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    /// Stop the timer; any response that resolves afterwards is ignored.
    pub fn stop(&mut self) {
        self.stopped.store(true, Ordering::Relaxed);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Wait for the poller to finish on its own (terminal state reached).
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn a poller for `session_id`: fetch immediately, then once per `interval`.
///
/// Fetches are serialized: the next one starts on the first tick after the previous
/// response resolved, so responses never overlap.
pub fn spawn_poller(
    client: ApiClient,
    session_id: impl Into<String>,
    interval: Duration,
    event_tx: UnboundedSender<PollEvent>,
) -> PollHandle {
    let session_id = session_id.into();
    let stopped = Arc::new(AtomicBool::new(false));
    let task = tokio::spawn(poll_loop(
        client,
        session_id.clone(),
        interval,
        stopped.clone(),
        event_tx,
    ));
    PollHandle {
        session_id,
        stopped,
        task: Some(task),
    }
}

async fn poll_loop(
    client: ApiClient,
    session_id: String,
    interval: Duration,
    stopped: Arc<AtomicBool>,
    event_tx: UnboundedSender<PollEvent>,
) {
    let mut machine = PollMachine::new(session_id.clone());
    let started = machine.start();
    if stopped.load(Ordering::Relaxed) || event_tx.send(started).is_err() {
        return;
    }
    tracing::info!(session = %session_id, ?interval, "polling statistics");

    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if stopped.load(Ordering::Relaxed) {
            return;
        }
        let outcome = client.fetch_statistics(&session_id).await;
        if stopped.load(Ordering::Relaxed) {
            tracing::debug!(session = %session_id, "dropping statistics that resolved after stop");
            return;
        }
        let Some(ev) = machine.apply(outcome) else {
            return;
        };
        match &ev {
            PollEvent::Ready { attempt, .. } => {
                tracing::info!(session = %session_id, attempt, "assessment document ready");
            }
            PollEvent::Failed { attempt, message, .. } => {
                tracing::warn!(session = %session_id, attempt, %message, "statistics polling failed");
            }
            _ => tracing::trace!(session = %session_id, attempt = machine.attempts(), "document not ready"),
        }
        let terminal = machine.state().is_terminal();
        if event_tx.send(ev).is_err() || terminal {
            stopped.store(true, Ordering::Relaxed);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::client::tests::test_config;
    use tokio::sync::mpsc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn stats(json: Option<&str>) -> StatisticsResponse {
        StatisticsResponse {
            id: Some("1".into()),
            json: json.map(str::to_string),
        }
    }

    #[test]
    fn machine_transitions() {
        let mut m = PollMachine::new("1");
        assert_eq!(m.state(), &PollState::Idle);
        assert!(m.apply(Ok(stats(None))).is_none());

        assert!(matches!(m.start(), PollEvent::Started { .. }));
        assert_eq!(m.state(), &PollState::Polling);
        assert!(matches!(
            m.apply(Ok(stats(None))),
            Some(PollEvent::Pending { attempt: 1, .. })
        ));
        assert_eq!(m.state(), &PollState::Polling);
        assert!(matches!(
            m.apply(Ok(stats(Some("{}")))),
            Some(PollEvent::Ready { attempt: 2, .. })
        ));
        assert!(m.state().is_terminal());
        // Terminal: later results are ignored.
        assert!(m.apply(Ok(stats(Some("changed")))).is_none());
        assert_eq!(m.state(), &PollState::Ready(stats(Some("{}"))));
    }

    #[test]
    fn machine_fails_on_error_and_restart_discards_result() {
        let mut m = PollMachine::new("1");
        m.start();
        let ev = m.apply(Err(ApiError::MissingId)).unwrap();
        assert!(matches!(ev, PollEvent::Failed { attempt: 1, .. }));
        assert!(matches!(m.state(), PollState::Failed(_)));

        m.start();
        assert_eq!(m.state(), &PollState::Polling);
        assert_eq!(m.attempts(), 0);
    }

    async fn collect_until_terminal(rx: &mut mpsc::UnboundedReceiver<PollEvent>) -> Vec<PollEvent> {
        let mut out = Vec::new();
        while let Some(ev) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("poller stalled")
        {
            let done = ev.is_terminal();
            out.push(ev);
            if done {
                break;
            }
        }
        out
    }

    #[tokio::test]
    async fn polls_until_document_is_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/statistics/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 42, "json": null})))
            .up_to_n_times(3)
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

        let cfg = test_config(&server.uri());
        let client = ApiClient::new(&cfg).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_poller(client, "42", cfg.poll_interval, tx);

        let events = collect_until_terminal(&mut rx).await;
        assert!(matches!(events[0], PollEvent::Started { .. }));
        assert_eq!(events.len(), 5);
        assert!(matches!(
            events.last(),
            Some(PollEvent::Ready { attempt: 4, .. })
        ));

        // No further fetches after the document arrived.
        tokio::time::sleep(cfg.poll_interval * 4).await;
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn stops_after_first_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/statistics/9"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let cfg = test_config(&server.uri());
        let client = ApiClient::new(&cfg).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = spawn_poller(client, "9", cfg.poll_interval, tx);

        let events = collect_until_terminal(&mut rx).await;
        match events.last() {
            Some(PollEvent::Failed { message, attempt, .. }) => {
                assert_eq!(*attempt, 1);
                assert!(message.contains("500"), "{message}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        tokio::time::sleep(cfg.poll_interval * 4).await;
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stop_silences_in_flight_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/statistics/5"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": 5, "json": "{}"}))
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let cfg = test_config(&server.uri());
        let client = ApiClient::new(&cfg).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = spawn_poller(client, "5", cfg.poll_interval, tx);

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, PollEvent::Started { .. }));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
        tokio::time::sleep(Duration::from_millis(300)).await;
        // Task aborted: sender dropped, nothing else delivered.
        assert!(rx.recv().await.is_none());
    }
}
