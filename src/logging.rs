use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE: &str = "securityassess.log";
/// Level used in both modes when `RUST_LOG` is unset or invalid.
const DEFAULT_LEVEL: &str = "info";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Headless mode: log to stderr; results go to stdout, so the two never mix.
pub fn init_stderr() {
    let _ = fmt()
        .with_env_filter(env_filter(DEFAULT_LEVEL))
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// TUI mode: the terminal belongs to the UI, so logs go to `<data_dir>/securityassess.log`.
pub fn init_file(data_dir: &Path) {
    let file = std::fs::create_dir_all(data_dir).and_then(|_| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(data_dir.join(LOG_FILE))
    });
    let Ok(file) = file else {
        // No writable log file: run without logging rather than corrupting the screen.
        return;
    };
    let _ = fmt()
        .with_env_filter(env_filter(DEFAULT_LEVEL))
        .with_target(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn default_level_is_info() {
        assert_eq!(
            EnvFilter::new(DEFAULT_LEVEL).max_level_hint(),
            Some(LevelFilter::INFO)
        );
    }
}
