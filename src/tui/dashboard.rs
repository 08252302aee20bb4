use super::state::{push_wrapped_status_kv, DashboardStatus, UiState};
use crate::render::{self, Payload, Row, Section};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

const BAR_WIDTH: usize = 24;

pub fn draw_dashboard(area: Rect, f: &mut Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(4), // Session header
                Constraint::Min(0),    // Document
                Constraint::Length(4), // Status row
            ]
            .as_ref(),
        )
        .split(area);

    draw_header(chunks[0], f, state);
    draw_body(chunks[1], f, state);
    draw_status(chunks[2], f, state);
}

fn status_span(state: &UiState) -> Span<'static> {
    match &state.status {
        DashboardStatus::Connecting => {
            Span::styled("Connecting…", Style::default().fg(Color::Gray))
        }
        DashboardStatus::Waiting => Span::styled(
            format!(
                "Waiting for workflow (attempt {}, every {})",
                state.attempts,
                humantime::format_duration(state.poll_interval)
            ),
            Style::default().fg(Color::Cyan),
        ),
        DashboardStatus::Ready => Span::styled("Ready", Style::default().fg(Color::Green)),
        DashboardStatus::Failed(_) => Span::styled("Failed", Style::default().fg(Color::Red)),
    }
}

fn draw_header(area: Rect, f: &mut Frame, state: &UiState) {
    let id = state.active_session.as_deref().unwrap_or("-");
    let title_line = match state.active_record() {
        Some(r) => Line::from(vec![
            Span::styled(
                r.query.clone(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  #{}  started {}", r.id, r.created_label()),
                Style::default().fg(Color::Gray),
            ),
        ]),
        None => Line::from(vec![
            Span::styled(
                format!("Session #{id}"),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "  (not in saved sessions)",
                Style::default().fg(Color::DarkGray),
            ),
        ]),
    };
    let status_line = Line::from(vec![Span::raw("Status: "), status_span(state)]);

    let p = Paragraph::new(vec![title_line, status_line])
        .block(Block::default().borders(Borders::ALL).title("Assessment"));
    f.render_widget(p, area);
}

fn draw_body(area: Rect, f: &mut Frame, state: &UiState) {
    let (title, lines) = body_lines(state);
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((state.scroll, 0))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

/// Lines for the document pane and its title.
pub fn body_lines(state: &UiState) -> (&'static str, Vec<Line<'static>>) {
    if let DashboardStatus::Failed(msg) = &state.status {
        return (
            "Error",
            vec![
                Line::from(Span::styled(msg.clone(), Style::default().fg(Color::Red))),
                Line::from(""),
                Line::from(Span::styled(
                    "Press Esc to go back and reopen the session to retry.",
                    Style::default().fg(Color::Gray),
                )),
            ],
        );
    }
    let Some(payload) = state.payload.as_ref() else {
        return (
            "Document",
            vec![Line::from(Span::styled(
                "Waiting for the assessment workflow to finish…",
                Style::default().fg(Color::Gray),
            ))],
        );
    };

    let sections = match payload {
        Payload::Structured { document, .. } if !state.show_raw => render::sections(document),
        _ => Vec::new(),
    };
    if sections.is_empty() {
        let lines = payload
            .raw_text()
            .lines()
            .map(|l| Line::from(l.to_string()))
            .collect();
        return ("Raw document", lines);
    }

    let mut lines = Vec::new();
    for section in &sections {
        push_section(&mut lines, section);
        lines.push(Line::from(""));
    }
    ("Dashboard", lines)
}

fn label_style() -> Style {
    Style::default().fg(Color::Gray)
}

fn push_section(out: &mut Vec<Line<'static>>, section: &Section) {
    out.push(Line::from(Span::styled(
        section.title.clone(),
        Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::BOLD),
    )));
    if let Some(d) = section.description.as_deref() {
        out.push(Line::from(Span::styled(
            d.to_string(),
            Style::default().add_modifier(Modifier::ITALIC),
        )));
    }
    for row in &section.rows {
        push_row(out, row);
    }
}

fn push_row(out: &mut Vec<Line<'static>>, row: &Row) {
    match row {
        Row::KeyValue { label, value } => out.push(Line::from(vec![
            Span::styled(format!("  {label}: "), label_style()),
            Span::raw(value.clone()),
        ])),
        Row::Text(text) => out.push(Line::from(format!("  {text}"))),
        Row::Tags { label, items } => {
            let mut spans = vec![Span::styled(format!("  {label}: "), label_style())];
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    spans.push(Span::raw(" "));
                }
                spans.push(Span::styled(
                    format!("[{item}]"),
                    Style::default().fg(Color::Cyan),
                ));
            }
            out.push(Line::from(spans));
        }
        Row::Score {
            label,
            value,
            description,
        } => {
            out.push(Line::from(vec![
                Span::styled(format!("  {label:<18} "), label_style()),
                Span::styled(
                    render::score_bar(*value, BAR_WIDTH),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(
                    format!(" {:>5}", render::format_score(*value)),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled("/100", Style::default().fg(Color::DarkGray)),
            ]));
            if let Some(d) = description {
                out.push(Line::from(Span::styled(
                    format!("    {d}"),
                    Style::default().fg(Color::DarkGray),
                )));
            }
        }
        Row::Status {
            label,
            active,
            detail,
        } => {
            let (mark, color) = if *active {
                ("●", Color::Green)
            } else {
                ("○", Color::DarkGray)
            };
            out.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(mark, Style::default().fg(color)),
                Span::styled(format!(" {label}: "), label_style()),
                Span::raw(detail.clone()),
            ]));
        }
        Row::Incident {
            year,
            kind,
            verified,
            description,
            impact,
        } => {
            let mut spans = vec![Span::raw("  ")];
            if let Some(y) = year {
                spans.push(Span::styled(format!("{y} "), label_style()));
            }
            spans.push(Span::styled(
                kind.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
            spans.push(if *verified {
                Span::styled(" verified", Style::default().fg(Color::Yellow))
            } else {
                Span::styled(" unverified", Style::default().fg(Color::DarkGray))
            });
            out.push(Line::from(spans));
            if let Some(d) = description {
                out.push(Line::from(format!("    {d}")));
            }
            if let Some(i) = impact {
                out.push(Line::from(vec![
                    Span::styled("    Impact: ", label_style()),
                    Span::raw(i.clone()),
                ]));
            }
        }
        Row::Link { label, url } => {
            let mut spans = vec![Span::raw("  ")];
            if label != url {
                spans.push(Span::styled(format!("{label}: "), label_style()));
            }
            spans.push(Span::styled(
                url.clone(),
                Style::default()
                    .fg(Color::Blue)
                    .add_modifier(Modifier::UNDERLINED),
            ));
            out.push(Line::from(spans));
        }
    }
}

fn draw_status(area: Rect, f: &mut Frame, state: &UiState) {
    let mut lines = Vec::new();
    push_wrapped_status_kv(&mut lines, "Info", &state.info, area.width);
    if lines.is_empty() {
        if let Some(p) = state.last_exported_path.as_deref() {
            push_wrapped_status_kv(&mut lines, "Exported", p, area.width);
        }
    }
    lines.truncate(1);
    let raw_label = if state.show_raw { ": dashboard, " } else { ": raw JSON, " };
    lines.push(Line::from(vec![
        Span::styled("Esc", Style::default().fg(Color::Magenta)),
        Span::raw(": back, "),
        Span::styled("↑/↓", Style::default().fg(Color::Magenta)),
        Span::raw(": scroll, "),
        Span::styled("r", Style::default().fg(Color::Magenta)),
        Span::raw(raw_label),
        Span::styled("e", Style::default().fg(Color::Magenta)),
        Span::raw(": export, "),
        Span::styled("y", Style::default().fg(Color::Magenta)),
        Span::raw(": copy path, "),
        Span::styled("?", Style::default().fg(Color::Magenta)),
        Span::raw(": help"),
    ]));
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AppEvent, PollEvent, StatisticsResponse};

    fn text(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn ready(state: &mut UiState, json: &str) {
        state.apply_event(AppEvent::Opened {
            session_id: "42".into(),
        });
        state.apply_event(AppEvent::Poll(PollEvent::Ready {
            session_id: "42".into(),
            attempt: 1,
            response: StatisticsResponse {
                id: Some("42".into()),
                json: Some(json.into()),
            },
        }));
    }

    #[test]
    fn waiting_placeholder_before_document() {
        let mut s = UiState::default();
        s.apply_event(AppEvent::Opened {
            session_id: "42".into(),
        });
        let (title, lines) = body_lines(&s);
        assert_eq!(title, "Document");
        assert!(text(&lines)[0].starts_with("Waiting"));
    }

    #[test]
    fn structured_document_renders_sections_and_raw_toggle() {
        let mut s = UiState::default();
        ready(
            &mut s,
            r#"{"riskScores": {"overallTrust": 72.5}, "productProfile": {"name": "Widget"}}"#,
        );
        let (title, lines) = body_lines(&s);
        assert_eq!(title, "Dashboard");
        let rendered = text(&lines);
        assert!(rendered.iter().any(|l| l == "Risk scores"));
        assert!(rendered
            .iter()
            .any(|l| l.contains("Overall trust") && l.contains("72.5")));

        s.toggle_raw();
        let (title, lines) = body_lines(&s);
        assert_eq!(title, "Raw document");
        assert_eq!(text(&lines)[0], "{");
    }

    #[test]
    fn non_json_document_is_shown_verbatim() {
        let mut s = UiState::default();
        ready(&mut s, "plain text result");
        let (title, lines) = body_lines(&s);
        assert_eq!(title, "Raw document");
        assert_eq!(text(&lines), vec!["plain text result".to_string()]);
    }

    #[test]
    fn failure_message_replaces_document() {
        let mut s = UiState::default();
        s.apply_event(AppEvent::Opened {
            session_id: "42".into(),
        });
        s.apply_event(AppEvent::Poll(PollEvent::Failed {
            session_id: "42".into(),
            attempt: 1,
            message: "Failed to load statistics: HTTP 500".into(),
        }));
        let (title, lines) = body_lines(&s);
        assert_eq!(title, "Error");
        assert_eq!(text(&lines)[0], "Failed to load statistics: HTTP 500");
    }
}
