use super::state::{push_wrapped_status_kv, HomeFocus, UiState};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub fn draw_home(area: Rect, f: &mut Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(5), // Search box + form status
                Constraint::Min(0),    // Saved sessions
                Constraint::Length(4), // Status row
            ]
            .as_ref(),
        )
        .split(area);

    draw_search(chunks[0], f, state);
    draw_sessions(chunks[1], f, state);
    draw_status(chunks[2], f, state);
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn draw_search(area: Rect, f: &mut Frame, state: &UiState) {
    let focused = state.focus == HomeFocus::Search;
    let mut input = vec![Span::styled("> ", Style::default().fg(Color::Magenta))];
    if state.search_input.is_empty() && !focused {
        input.push(Span::styled(
            "Vendor or product name",
            Style::default().fg(Color::DarkGray),
        ));
    } else {
        input.push(Span::raw(state.search_input.clone()));
    }
    if focused && state.triggering.is_none() {
        input.push(Span::styled(
            "_",
            Style::default().add_modifier(Modifier::SLOW_BLINK),
        ));
    }

    let status = if let Some(q) = state.triggering.as_deref() {
        Line::from(Span::styled(
            format!("Triggering assessment for \"{q}\"…"),
            Style::default().fg(Color::Cyan),
        ))
    } else if let Some(err) = state.form_error.as_deref() {
        Line::from(Span::styled(err.to_string(), Style::default().fg(Color::Red)))
    } else {
        Line::from(vec![
            Span::styled("Enter", Style::default().fg(Color::Magenta)),
            Span::raw(": start assessment  "),
            Span::styled("Tab", Style::default().fg(Color::Magenta)),
            Span::raw(": saved sessions"),
        ])
    };

    let p = Paragraph::new(vec![Line::from(input), Line::from(""), status]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focus_style(focused))
            .title("New assessment"),
    );
    f.render_widget(p, area);
}

fn draw_sessions(area: Rect, f: &mut Frame, state: &UiState) {
    let focused = state.focus == HomeFocus::Sessions;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_style(focused))
        .title(format!("Saved sessions ({})", state.sessions.len()));

    if state.sessions.is_empty() {
        let p = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                "No sessions yet. Start an assessment above.",
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .block(block);
        f.render_widget(p, area);
        return;
    }

    // Keep the selected row visible.
    let max_items = (area.height as usize).saturating_sub(2).max(1);
    let offset = state.selected.saturating_sub(max_items - 1);

    let lines: Vec<Line> = state
        .sessions
        .iter()
        .enumerate()
        .skip(offset)
        .take(max_items)
        .map(|(i, s)| {
            let selected = focused && i == state.selected;
            let marker = if selected { "> " } else { "  " };
            let style = if selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(marker, style),
                Span::styled(format!("{:<24}", s.query), style),
                Span::styled(
                    format!(" {}  ", s.created_label()),
                    Style::default().fg(Color::Gray),
                ),
                Span::styled(format!("#{}", s.id), Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_status(area: Rect, f: &mut Frame, state: &UiState) {
    let mut lines = Vec::new();
    push_wrapped_status_kv(&mut lines, "Backend", &state.base_url, area.width);
    push_wrapped_status_kv(&mut lines, "Info", &state.info, area.width);
    if lines.len() < 2 {
        lines.push(Line::from(vec![
            Span::styled("↑/↓", Style::default().fg(Color::Magenta)),
            Span::raw(": select, "),
            Span::styled("Enter", Style::default().fg(Color::Magenta)),
            Span::raw(": open, "),
            Span::styled("d", Style::default().fg(Color::Magenta)),
            Span::raw(": delete, "),
            Span::styled("?", Style::default().fg(Color::Magenta)),
            Span::raw(": help, "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(": quit"),
        ]));
    }
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(p, area);
}
