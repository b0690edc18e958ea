//! `taskboard` -- terminal Kanban board.
//!
//! Connects to a `taskboard-server` when a server URL is configured, and
//! otherwise runs against a built-in demo board held in process.
//!
//! ```bash
//! # Offline demo board
//! cargo run --bin taskboard
//!
//! # Against a task server
//! cargo run --bin taskboard -- --server-url ws://127.0.0.1:9100/ws
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use taskboard::app::App;
use taskboard::config::{CliArgs, ClientConfig};
use taskboard::gateway::loopback::LoopbackGateway;
use taskboard::gateway::remote::RemoteGateway;
use taskboard::optimistic::TaskBoard;
use taskboard::store::TaskStore;
use taskboard::sync::{self, GatewayCommand, GatewayEvent};
use taskboard::ui;

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: {e}; using defaults");
            ClientConfig::default()
        }
    };

    // Logs go to a file; ratatui owns the terminal.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!("taskboard starting");

    let (cmd_tx, evt_rx, flash) = connect(&config).await;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(
        TaskBoard::new(TaskStore::new(), config.max_notices),
        config.initial_search.clone(),
    );
    app.flash = flash;
    let result = run_app(&mut terminal, &mut app, &cmd_tx, evt_rx, &config).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    tracing::info!("taskboard exiting");
    result
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown so buffered
/// entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskboard.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Spawns the gateway worker over the configured backend.
///
/// Falls back to the demo board when no server is configured or the
/// server cannot be reached; the returned message says why.
async fn connect(
    config: &ClientConfig,
) -> (
    mpsc::Sender<GatewayCommand>,
    mpsc::Receiver<GatewayEvent>,
    Option<String>,
) {
    if let Some(url) = &config.server_url {
        match RemoteGateway::connect(url, config.connect_timeout, config.request_timeout).await {
            Ok(gateway) => {
                let (tx, rx) = sync::spawn_gateway_worker(Arc::new(gateway), config.channel_capacity);
                return (tx, rx, None);
            }
            Err(e) => {
                tracing::warn!(url = %url, err = %e, "falling back to demo board");
                let (tx, rx) =
                    sync::spawn_gateway_worker(Arc::new(LoopbackGateway::demo()), config.channel_capacity);
                return (tx, rx, Some(format!("Could not reach {url}, showing demo board ({e})")));
            }
        }
    }
    let (tx, rx) = sync::spawn_gateway_worker(Arc::new(LoopbackGateway::demo()), config.channel_capacity);
    (tx, rx, None)
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    cmd_tx: &mpsc::Sender<GatewayCommand>,
    mut evt_rx: mpsc::Receiver<GatewayEvent>,
    config: &ClientConfig,
) -> io::Result<()> {
    send(app, cmd_tx, GatewayCommand::Refresh);

    loop {
        terminal.draw(|frame| ui::draw(frame, app))?;

        while let Ok(event) = evt_rx.try_recv() {
            app.apply_gateway_event(event);
        }
        if let Some(cmd) = app.pending_refresh() {
            send(app, cmd_tx, cmd);
        }

        if event::poll(config.poll_timeout)?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if let Some(cmd) = app.handle_key_event(key) {
                send(app, cmd_tx, cmd);
            }
        }

        if app.should_quit {
            let _ = cmd_tx.try_send(GatewayCommand::Shutdown);
            return Ok(());
        }
    }
}

fn send(app: &mut App, tx: &mpsc::Sender<GatewayCommand>, cmd: GatewayCommand) {
    match tx.try_send(cmd) {
        Ok(()) => {}
        Err(
            mpsc::error::TrySendError::Full(GatewayCommand::Transition(pending))
            | mpsc::error::TrySendError::Closed(GatewayCommand::Transition(pending)),
        ) => {
            // The change is already on screen; undo it rather than leave it unsent.
            app.apply_gateway_event(GatewayEvent::Settled {
                pending,
                result: Err(taskboard::gateway::TransitionError::Network(
                    "request not sent".to_string(),
                )),
            });
        }
        Err(mpsc::error::TrySendError::Full(_)) => {
            app.flash = Some("Busy, try again".to_string());
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            app.flash = Some("Gateway stopped".to_string());
        }
    }
}
