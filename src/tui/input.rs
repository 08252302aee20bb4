use super::state::{HomeFocus, UiState, View};
use crate::orchestrator::UiCommand;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// What the UI loop should do after a key press.
#[derive(Debug)]
pub(crate) enum Action {
    Send(UiCommand),
    Quit,
    Export,
    CopyPath,
}

const PAGE: u16 = 10;

pub(crate) fn handle_key(state: &mut UiState, key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Action::Quit);
    }
    if state.show_help {
        state.show_help = false;
        return None;
    }
    match state.view {
        View::Home => match state.focus {
            HomeFocus::Search => handle_search_key(state, key),
            HomeFocus::Sessions => handle_sessions_key(state, key),
        },
        View::Dashboard => handle_dashboard_key(state, key),
    }
}

fn handle_search_key(state: &mut UiState, key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Enter => state.submit_search().map(Action::Send),
        KeyCode::Esc => {
            if state.search_input.is_empty() {
                return Some(Action::Quit);
            }
            state.search_input.clear();
            state.form_error = None;
            None
        }
        KeyCode::Tab | KeyCode::Down => {
            state.focus = HomeFocus::Sessions;
            None
        }
        KeyCode::Backspace => {
            state.search_input.pop();
            None
        }
        // The box is locked while a trigger is in flight.
        KeyCode::Char(c) if state.triggering.is_none() => {
            state.search_input.push(c);
            state.form_error = None;
            None
        }
        _ => None,
    }
}

fn handle_sessions_key(state: &mut UiState, key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Tab | KeyCode::Char('/') => {
            state.focus = HomeFocus::Search;
            None
        }
        KeyCode::Up | KeyCode::Char('k') => {
            if state.selected == 0 {
                state.focus = HomeFocus::Search;
            } else {
                state.select_prev();
            }
            None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            state.select_next();
            None
        }
        KeyCode::Enter => state.open_selected().map(Action::Send),
        KeyCode::Char('d') => state.delete_selected().map(Action::Send),
        KeyCode::Char('?') => {
            state.show_help = true;
            None
        }
        _ => None,
    }
}

fn handle_dashboard_key(state: &mut UiState, key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => {
            Some(Action::Send(state.close_dashboard()))
        }
        KeyCode::Char('r') => {
            state.toggle_raw();
            None
        }
        KeyCode::Char('e') => Some(Action::Export),
        KeyCode::Char('y') => Some(Action::CopyPath),
        KeyCode::Char('?') => {
            state.show_help = true;
            None
        }
        KeyCode::Up | KeyCode::Char('k') => {
            state.scroll = state.scroll.saturating_sub(1);
            None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            state.scroll = state.scroll.saturating_add(1);
            None
        }
        KeyCode::PageUp => {
            state.scroll = state.scroll.saturating_sub(PAGE);
            None
        }
        KeyCode::PageDown | KeyCode::Char(' ') => {
            state.scroll = state.scroll.saturating_add(PAGE);
            None
        }
        KeyCode::Home | KeyCode::Char('g') => {
            state.scroll = 0;
            None
        }
        _ => None,
    }
}
