use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

fn bind(key: &'static str, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("{key:<12}"), Style::default().fg(Color::Magenta)),
        Span::raw(what),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        bind("Ctrl-C", "Quit"),
        bind("?", "Show this help (any key closes it)"),
        Line::from(""),
        Line::from("Search box:"),
        bind("Enter", "Start an assessment"),
        bind("Tab / ↓", "Go to saved sessions"),
        bind("Esc", "Clear input (quit when empty)"),
        Line::from(""),
        Line::from("Saved sessions:"),
        bind("↑/↓ or j/k", "Navigate"),
        bind("Enter", "Open session dashboard"),
        bind("d", "Delete selected"),
        bind("Tab or /", "Back to search box"),
        bind("q", "Quit"),
        Line::from(""),
        Line::from("Dashboard:"),
        bind("↑/↓ or j/k", "Scroll (PgUp/PgDn, g for top)"),
        bind("r", "Toggle raw JSON"),
        bind("e", "Export document as JSON"),
        bind("y", "Copy exported path to clipboard"),
        bind("Esc / b", "Back to sessions"),
        bind("q", "Quit"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(Clear, area);
    f.render_widget(p, area);
}
