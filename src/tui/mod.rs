mod dashboard;
mod export;
mod help;
mod home;
mod input;
mod state;

use crate::engine::ApiClient;
use crate::model::{AppConfig, AppEvent};
use crate::orchestrator::{self, UiCommand};
use crate::storage::SessionStore;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use input::Action;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Color,
    style::Style,
    text::Line,
    widgets::{Block, Borders, Tabs},
    Terminal,
};
use state::{UiState, View};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(cfg: AppConfig, client: ApiClient, store: SessionStore) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<AppEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_cfg = cfg.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_cfg, event_rx, cmd_tx));

    let res = orchestrator::run_controller(&cfg, client, store, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    cfg: AppConfig,
    mut event_rx: UnboundedReceiver<AppEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let res = ui_loop(&cfg, &mut event_rx, &cmd_tx);

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn ui_loop(
    cfg: &AppConfig,
    event_rx: &mut UnboundedReceiver<AppEvent>,
    cmd_tx: &UnboundedSender<UiCommand>,
) -> Result<()> {
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState::new(cfg);

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let mut dirty = true;

    loop {
        // Drain events without blocking to keep UI responsive.
        loop {
            match event_rx.try_recv() {
                Ok(ev) => {
                    state.apply_event(ev);
                    dirty = true;
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    // Controller is gone; nothing left to show.
                    return Ok(());
                }
            }
        }

        if dirty || last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
            dirty = false;
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if !event::poll(Duration::from_millis(10)).unwrap_or(false) {
            continue;
        }
        let Ok(Event::Key(k)) = event::read() else {
            dirty = true;
            continue;
        };
        if k.kind != KeyEventKind::Press {
            continue;
        }
        dirty = true;
        match input::handle_key(&mut state, k) {
            None => {}
            Some(Action::Quit) => {
                let _ = cmd_tx.send(UiCommand::Quit);
                return Ok(());
            }
            Some(Action::Send(cmd)) => {
                if cmd_tx.send(cmd).is_err() {
                    return Ok(());
                }
            }
            Some(Action::Export) => export::export_and_show_path(&mut state),
            Some(Action::CopyPath) => export::copy_exported_path(&mut state),
        }
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let selected = if state.show_help {
        2
    } else {
        match state.view {
            View::Home => 0,
            View::Dashboard => 1,
        }
    };
    let tabs = Tabs::new(vec![
        Line::from("Sessions"),
        Line::from("Dashboard"),
        Line::from("Help"),
    ])
    .select(selected)
    .block(Block::default().borders(Borders::ALL).title("securityassess"))
    .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    if state.show_help {
        help::draw_help(chunks[1], f);
        return;
    }
    match state.view {
        View::Home => home::draw_home(chunks[1], f, state),
        View::Dashboard => dashboard::draw_dashboard(chunks[1], f, state),
    }
}
