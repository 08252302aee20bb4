use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

use super::state::UiState;

// Global clipboard manager channel - initialized once on first use
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// File name for an exported document, e.g. `securityassess-42-20251115_103000.json`.
pub fn export_file_name(session_id: &str) -> String {
    let stamp = time::OffsetDateTime::now_utc()
        .format(time::macros::format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .unwrap_or_else(|_| crate::model::now_millis().to_string());
    let safe_id: String = session_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("securityassess-{safe_id}-{stamp}.json")
}

/// Write the open session's document into `dir`. Returns the absolute path.
pub fn export_document(state: &UiState, dir: &Path) -> Result<PathBuf> {
    let session_id = state
        .active_session
        .as_deref()
        .context("no session is open")?;
    let payload = state
        .payload
        .as_ref()
        .context("the assessment document is not ready yet")?;
    let path = dir.join(export_file_name(session_id));
    crate::storage::export_json(&path, &payload.export_value())?;
    Ok(path)
}

/// Export to the current directory and report the outcome in `state.info`.
pub fn export_and_show_path(state: &mut UiState) {
    let result = std::env::current_dir()
        .context("get current directory")
        .and_then(|dir| export_document(state, &dir));
    match result {
        Ok(p) => {
            state.last_exported_path = Some(p.to_string_lossy().to_string());
            state.info = format!("Exported JSON: {} (press 'y' to copy path)", p.display());
        }
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "export failed");
            state.info = format!("JSON export failed: {e:#}");
        }
    }
}

pub fn copy_exported_path(state: &mut UiState) {
    let Some(path) = state.last_exported_path.clone() else {
        state.info = "No exported file path to copy. Export a file first (e)".into();
        return;
    };
    match copy_to_clipboard(&path) {
        Ok(_) => {
            let display_path = if path.chars().count() > 60 {
                let head: String = path.chars().take(57).collect();
                format!("{head}...")
            } else {
                path
            };
            state.info = format!("✓ Copied to clipboard: {display_path}");
        }
        Err(e) => state.info = format!("Clipboard copy failed: {e:#}"),
    }
}

/// Start the clipboard thread on first use. Each copy keeps its clipboard alive
/// briefly so Linux clipboard managers can read the contents.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Queue `text` for the clipboard thread without blocking the UI.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AppEvent, PollEvent, StatisticsResponse};

    #[test]
    fn file_name_is_sanitized() {
        let name = export_file_name("ab/c 1");
        assert!(name.starts_with("securityassess-ab_c_1-"));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn export_requires_a_ready_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = UiState::default();
        assert!(export_document(&state, dir.path()).is_err());

        state.apply_event(AppEvent::Opened {
            session_id: "42".into(),
        });
        assert!(export_document(&state, dir.path()).is_err());

        state.apply_event(AppEvent::Poll(PollEvent::Ready {
            session_id: "42".into(),
            attempt: 1,
            response: StatisticsResponse {
                id: Some("42".into()),
                json: Some(r#"{"meta":{"vendor":"Acme"}}"#.into()),
            },
        }));
        let path = export_document(&state, dir.path()).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written["meta"]["vendor"], "Acme");
    }

    #[test]
    fn copy_without_export_reports_hint() {
        let mut state = UiState::default();
        copy_exported_path(&mut state);
        assert!(state.info.starts_with("No exported file path"));
    }
}
