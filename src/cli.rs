use crate::engine::{spawn_poller, ApiClient};
use crate::model::{AppConfig, PollEvent, SessionRecord};
use crate::render::{parse_payload, Payload};
use crate::storage::{FileStore, SessionStore};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "securityassess",
    version,
    about = "Trigger vendor security assessments and browse the results"
)]
pub struct Cli {
    /// Base URL of the assessment backend
    #[arg(long, env = "SECURITYASSESS_API_BASE", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Directory for the session store and log file
    #[arg(long, env = "SECURITYASSESS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Interval between statistics requests
    #[arg(long, default_value = "1s")]
    pub poll_interval: humantime::Duration,

    /// Per-request timeout (none by default)
    #[arg(long)]
    pub timeout: Option<humantime::Duration>,

    /// Send the trigger body as {"input_term": ...} for older backends
    #[arg(long)]
    pub legacy_payload: bool,

    /// Start an assessment for this vendor/product and wait for the result (no TUI)
    #[arg(long, conflicts_with = "session")]
    pub query: Option<String>,

    /// Wait for the result of an existing session (no TUI)
    #[arg(long)]
    pub session: Option<String>,

    /// List stored sessions and exit
    #[arg(long)]
    pub list: bool,

    /// Forget all stored sessions and exit
    #[arg(long, conflicts_with_all = ["query", "session", "list"])]
    pub clear_sessions: bool,

    /// Print the assessment document as JSON (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print a text summary of the assessment (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Also write the assessment document to this file
    #[arg(long)]
    pub export_json: Option<PathBuf>,
}

impl Cli {
    /// Whether this invocation runs without the TUI.
    pub fn is_headless(&self) -> bool {
        self.list
            || self.clear_sessions
            || self.json || self.text || self.query.is_some() || self.session.is_some()
    }
}

/// Build an `AppConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> AppConfig {
    AppConfig {
        base_url: args.base_url.trim_end_matches('/').to_string(),
        data_dir: args
            .data_dir
            .clone()
            .unwrap_or_else(crate::storage::default_data_dir),
        poll_interval: Duration::from(args.poll_interval),
        request_timeout: args.timeout.map(Duration::from),
        legacy_payload: args.legacy_payload,
        user_agent: format!("securityassess/{}", env!("CARGO_PKG_VERSION")),
    }
}

pub fn open_store(cfg: &AppConfig) -> SessionStore {
    SessionStore::new(Arc::new(FileStore::in_dir(&cfg.data_dir)))
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let headless = args.is_headless() || cfg!(not(feature = "tui"));
    if headless {
        crate::logging::init_stderr();
    } else {
        crate::logging::init_file(&cfg.data_dir);
    }
    tracing::debug!(base_url = %cfg.base_url, data_dir = %cfg.data_dir.display(), "starting");

    let store = open_store(&cfg);
    if args.list {
        return run_list(&store);
    }
    if args.clear_sessions {
        let count = store.load().len();
        store.clear().context("clear sessions")?;
        eprintln!("Removed {count} stored session(s).");
        return Ok(());
    }

    let client = ApiClient::new(&cfg).context("build HTTP client")?;
    if !headless {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(cfg, client, store).await;
        }
    }
    run_headless(&args, &cfg, client, &store).await
}

fn run_list(store: &SessionStore) -> Result<()> {
    let sessions = store.load();
    let active = store.active();
    let mut out = std::io::stdout().lock();
    if sessions.is_empty() {
        writeln!(out, "No sessions yet.")?;
    }
    for s in &sessions {
        let marker = if active.as_deref() == Some(s.id.as_str()) {
            "*"
        } else {
            " "
        };
        writeln!(out, "{marker} {:<10} {}  {}", s.id, s.created_label(), s.query)?;
    }
    Ok(())
}

/// Trigger (or resume) a session, poll it to completion and print the result.
async fn run_headless(
    args: &Cli,
    cfg: &AppConfig,
    client: ApiClient,
    store: &SessionStore,
) -> Result<()> {
    let (out_tx, out_handle) = spawn_output_writer();

    let (session_id, record): (String, Option<SessionRecord>) = if let Some(q) = args.query.as_deref() {
        let record = crate::orchestrator::trigger_session(&client, store, q).await?;
        let _ = out_tx.send(OutputLine::Stderr(format!(
            "Started session {} for \"{}\"",
            record.id, record.query
        )));
        (record.id.clone(), Some(record))
    } else if let Some(id) = args.session.clone().or_else(|| store.active()) {
        let record = store.load().into_iter().find(|r| r.id == id);
        (id, record)
    } else {
        bail!("Nothing to show: pass --query <TERM> or --session <ID> (or run without flags for the TUI)");
    };

    let (poll_tx, mut poll_rx) = mpsc::unbounded_channel::<PollEvent>();
    let mut handle = spawn_poller(client, session_id.clone(), cfg.poll_interval, poll_tx);

    let outcome: Result<Payload> = loop {
        tokio::select! {
            ev = poll_rx.recv() => match ev {
                Some(PollEvent::Started { .. }) => {
                    let _ = out_tx.send(OutputLine::Stderr(format!(
                        "Waiting for assessment of session {session_id}…"
                    )));
                }
                Some(PollEvent::Pending { attempt, .. }) => {
                    tracing::debug!(attempt, "assessment not ready");
                }
                Some(PollEvent::Ready { response, .. }) => {
                    let raw = response.json.unwrap_or_default();
                    break Ok(parse_payload(&raw));
                }
                Some(PollEvent::Failed { message, .. }) => break Err(anyhow::anyhow!(message)),
                None => break Err(anyhow::anyhow!("statistics poller stopped unexpectedly")),
            },
            _ = tokio::signal::ctrl_c() => {
                handle.stop();
                break Err(anyhow::anyhow!("interrupted"));
            }
        }
    };
    // Terminal events end the poll task; after Ctrl-C the task is already aborted.
    handle.join().await;

    let result = outcome.and_then(|payload| {
        if let Some(p) = args.export_json.as_deref() {
            crate::storage::export_json(p, &payload.export_value())?;
            let _ = out_tx.send(OutputLine::Stderr(format!("Exported JSON: {}", p.display())));
        }
        if args.json {
            let _ = out_tx.send(OutputLine::Stdout(payload.raw_text()));
        } else {
            let summary =
                crate::text_summary::build_text_summary(&session_id, record.as_ref(), &payload);
            for line in summary.lines {
                let _ = out_tx.send(OutputLine::Stdout(line));
            }
        }
        Ok(())
    });

    drop(out_tx);
    let _ = out_handle.await;
    result
}
