use crate::model::{AppConfig, AppEvent, PollEvent, SessionRecord, StatisticsResponse};
use crate::orchestrator::UiCommand;
use crate::render::{parse_payload, Payload};
use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Home,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeFocus {
    Search,
    Sessions,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardStatus {
    /// Opened, no response yet.
    Connecting,
    /// Statistics received but the workflow has not stored a document yet.
    Waiting,
    Ready,
    Failed(String),
}

pub struct UiState {
    pub view: View,
    pub show_help: bool,
    pub info: String,
    pub base_url: String,
    pub poll_interval: Duration,

    // Home
    pub focus: HomeFocus,
    pub search_input: String,
    pub triggering: Option<String>,
    pub form_error: Option<String>,
    pub sessions: Vec<SessionRecord>,
    pub selected: usize, // Index into sessions (0 = most recent)

    // Dashboard
    pub active_session: Option<String>,
    pub status: DashboardStatus,
    pub attempts: u64,
    pub statistics: Option<StatisticsResponse>,
    pub payload: Option<Payload>,
    pub show_raw: bool,
    pub scroll: u16,
    pub last_exported_path: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            view: View::Home,
            show_help: false,
            info: String::new(),
            base_url: String::new(),
            poll_interval: Duration::from_secs(1),
            focus: HomeFocus::Search,
            search_input: String::new(),
            triggering: None,
            form_error: None,
            sessions: Vec::new(),
            selected: 0,
            active_session: None,
            status: DashboardStatus::Connecting,
            attempts: 0,
            statistics: None,
            payload: None,
            show_raw: false,
            scroll: 0,
            last_exported_path: None,
        }
    }
}

impl UiState {
    pub fn new(cfg: &AppConfig) -> Self {
        Self {
            base_url: cfg.base_url.clone(),
            poll_interval: cfg.poll_interval,
            ..Default::default()
        }
    }

    fn reset_dashboard(&mut self) {
        self.status = DashboardStatus::Connecting;
        self.attempts = 0;
        self.statistics = None;
        self.payload = None;
        self.show_raw = false;
        self.scroll = 0;
    }

    fn clamp_selection(&mut self) {
        if self.sessions.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.sessions.len() {
            self.selected = self.sessions.len() - 1;
        }
    }

    /// The stored record for the active session, if it is still in the list.
    pub fn active_record(&self) -> Option<&SessionRecord> {
        let id = self.active_session.as_deref()?;
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn selected_record(&self) -> Option<&SessionRecord> {
        self.sessions.get(self.selected)
    }

    pub fn apply_event(&mut self, ev: AppEvent) {
        match ev {
            AppEvent::Sessions(sessions) => {
                self.sessions = sessions;
                self.clamp_selection();
            }
            AppEvent::Triggering { query } => {
                self.form_error = None;
                self.info = format!("Starting assessment for \"{query}\"…");
                self.triggering = Some(query);
            }
            AppEvent::Triggered(record) => {
                self.triggering = None;
                self.search_input.clear();
                self.selected = 0;
                self.info = format!("Session {} started", record.id);
            }
            AppEvent::TriggerFailed(message) => {
                self.triggering = None;
                self.info.clear();
                self.form_error = Some(message);
            }
            AppEvent::Opened { session_id } => {
                self.view = View::Dashboard;
                self.active_session = Some(session_id);
                self.reset_dashboard();
            }
            AppEvent::Poll(ev) => self.apply_poll_event(ev),
            AppEvent::Info(info) => self.info = info.to_message(),
        }
    }

    fn apply_poll_event(&mut self, ev: PollEvent) {
        if self.view != View::Dashboard || self.active_session.as_deref() != Some(ev.session_id())
        {
            return;
        }
        match ev {
            PollEvent::Started { .. } => self.reset_dashboard(),
            PollEvent::Pending {
                attempt, response, ..
            } => {
                self.attempts = attempt;
                self.statistics = Some(response);
                self.status = DashboardStatus::Waiting;
            }
            PollEvent::Ready {
                attempt, response, ..
            } => {
                self.attempts = attempt;
                self.payload = response.json.as_deref().map(parse_payload);
                self.statistics = Some(response);
                self.status = DashboardStatus::Ready;
            }
            PollEvent::Failed {
                attempt, message, ..
            } => {
                self.attempts = attempt;
                self.status = DashboardStatus::Failed(message);
            }
        }
    }

    /// Validate the search box and produce a trigger command.
    pub(crate) fn submit_search(&mut self) -> Option<UiCommand> {
        if self.triggering.is_some() {
            return None;
        }
        let query = self.search_input.trim();
        if query.is_empty() {
            self.form_error = Some("Enter a vendor or product name".into());
            return None;
        }
        self.form_error = None;
        Some(UiCommand::Trigger(query.to_string()))
    }

    pub(crate) fn open_selected(&mut self) -> Option<UiCommand> {
        let id = self.selected_record()?.id.clone();
        Some(UiCommand::Open(id))
    }

    pub(crate) fn delete_selected(&mut self) -> Option<UiCommand> {
        let id = self.selected_record()?.id.clone();
        Some(UiCommand::Delete(id))
    }

    pub(crate) fn close_dashboard(&mut self) -> UiCommand {
        self.view = View::Home;
        self.active_session = None;
        self.reset_dashboard();
        UiCommand::Close
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.sessions.len() {
            self.selected += 1;
        }
    }

    pub fn toggle_raw(&mut self) {
        if self.payload.is_some() {
            self.show_raw = !self.show_raw;
            self.scroll = 0;
        }
    }
}

pub fn push_wrapped_status_kv(
    out: &mut Vec<Line<'static>>,
    label: &str,
    value: &str,
    status_area_width: u16,
) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    // Account for borders (2 chars on each side)
    let usable_width = status_area_width.saturating_sub(4).max(1);
    let label_text = format!("{label}:");
    let label_width = label_text.chars().count() as u16;

    let value_chars: Vec<char> = value.chars().collect();
    let mut remaining = value_chars.as_slice();
    let mut first = true;

    while !remaining.is_empty() {
        let line_width = if first {
            usable_width.saturating_sub(label_width + 1).max(1)
        } else {
            usable_width.saturating_sub(2).max(1)
        };

        let chars_to_take = (remaining.len() as u16).min(line_width) as usize;
        let (line_chars, rest) = remaining.split_at(chars_to_take);
        let line_text: String = line_chars.iter().collect();

        if first {
            out.push(Line::from(vec![
                Span::styled(label_text.clone(), Style::default().fg(Color::Gray)),
                Span::raw(" "),
                Span::raw(line_text),
            ]));
            first = false;
        } else {
            out.push(Line::from(vec![Span::raw("  "), Span::raw(line_text)]));
        }

        remaining = rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str) -> SessionRecord {
        SessionRecord {
            id: id.into(),
            query: format!("query {id}"),
            created_at: 0,
        }
    }

    fn stats(json: Option<&str>) -> StatisticsResponse {
        StatisticsResponse {
            id: Some("42".into()),
            json: json.map(str::to_string),
        }
    }

    #[test]
    fn blank_search_is_rejected_locally() {
        let mut s = UiState::default();
        s.search_input = "   ".into();
        assert!(s.submit_search().is_none());
        assert!(s.form_error.is_some());

        s.search_input = " Acme Corp ".into();
        assert!(matches!(s.submit_search(), Some(UiCommand::Trigger(q)) if q == "Acme Corp"));
        assert!(s.form_error.is_none());

        s.apply_event(AppEvent::Triggering {
            query: "Acme Corp".into(),
        });
        assert!(s.submit_search().is_none());
    }

    #[test]
    fn trigger_flow_switches_to_dashboard() {
        let mut s = UiState::default();
        s.search_input = "Acme Corp".into();
        s.apply_event(AppEvent::Triggering {
            query: "Acme Corp".into(),
        });
        s.apply_event(AppEvent::Triggered(rec("42")));
        s.apply_event(AppEvent::Sessions(vec![rec("42"), rec("1")]));
        s.apply_event(AppEvent::Opened {
            session_id: "42".into(),
        });
        assert_eq!(s.view, View::Dashboard);
        assert!(s.search_input.is_empty());
        assert!(s.triggering.is_none());
        assert_eq!(s.active_record().map(|r| r.id.as_str()), Some("42"));
        assert_eq!(s.status, DashboardStatus::Connecting);
    }

    #[test]
    fn trigger_failure_stays_on_home_with_message() {
        let mut s = UiState::default();
        s.apply_event(AppEvent::Triggering { query: "x".into() });
        s.apply_event(AppEvent::TriggerFailed("boom".into()));
        assert_eq!(s.view, View::Home);
        assert_eq!(s.form_error.as_deref(), Some("boom"));
        assert!(s.triggering.is_none());
    }

    #[test]
    fn poll_events_drive_dashboard_status() {
        let mut s = UiState::default();
        s.apply_event(AppEvent::Opened {
            session_id: "42".into(),
        });
        s.apply_event(AppEvent::Poll(PollEvent::Pending {
            session_id: "42".into(),
            attempt: 1,
            response: stats(None),
        }));
        assert_eq!(s.status, DashboardStatus::Waiting);
        assert!(s.payload.is_none());

        s.apply_event(AppEvent::Poll(PollEvent::Ready {
            session_id: "42".into(),
            attempt: 2,
            response: stats(Some(r#"{"a":1}"#)),
        }));
        assert_eq!(s.status, DashboardStatus::Ready);
        assert!(s.payload.as_ref().is_some_and(|p| p.is_structured()));

        s.toggle_raw();
        assert!(s.show_raw);
    }

    #[test]
    fn stale_poll_events_are_ignored() {
        let mut s = UiState::default();
        s.apply_event(AppEvent::Opened {
            session_id: "new".into(),
        });
        s.apply_event(AppEvent::Poll(PollEvent::Failed {
            session_id: "old".into(),
            attempt: 1,
            message: "HTTP 500".into(),
        }));
        assert_eq!(s.status, DashboardStatus::Connecting);

        s.close_dashboard();
        s.apply_event(AppEvent::Poll(PollEvent::Ready {
            session_id: "new".into(),
            attempt: 1,
            response: stats(Some("{}")),
        }));
        assert_eq!(s.view, View::Home);
        assert!(s.payload.is_none());
    }

    #[test]
    fn reopening_discards_previous_result() {
        let mut s = UiState::default();
        s.apply_event(AppEvent::Opened {
            session_id: "42".into(),
        });
        s.apply_event(AppEvent::Poll(PollEvent::Ready {
            session_id: "42".into(),
            attempt: 1,
            response: stats(Some("not json")),
        }));
        assert_eq!(s.payload, Some(Payload::Raw("not json".into())));
        s.apply_event(AppEvent::Opened {
            session_id: "42".into(),
        });
        assert!(s.payload.is_none());
        assert_eq!(s.status, DashboardStatus::Connecting);
    }

    #[test]
    fn dangling_active_session_has_no_record() {
        let mut s = UiState::default();
        s.apply_event(AppEvent::Sessions(vec![rec("1")]));
        s.apply_event(AppEvent::Opened {
            session_id: "gone".into(),
        });
        assert_eq!(s.view, View::Dashboard);
        assert!(s.active_record().is_none());
    }

    #[test]
    fn selection_is_clamped_when_sessions_shrink() {
        let mut s = UiState::default();
        s.apply_event(AppEvent::Sessions(vec![rec("3"), rec("2"), rec("1")]));
        s.select_next();
        s.select_next();
        s.select_next();
        assert_eq!(s.selected, 2);
        assert!(matches!(s.delete_selected(), Some(UiCommand::Delete(id)) if id == "1"));
        s.apply_event(AppEvent::Sessions(vec![rec("3"), rec("2")]));
        assert_eq!(s.selected, 1);
        assert!(matches!(s.open_selected(), Some(UiCommand::Open(id)) if id == "2"));
    }
}
