//! mosaic-rx: entry point.
//!
//! ```text
//! mosaic-rx                      Run in the foreground, logging to stderr
//! mosaic-rx --tui                Show the live feed slot view
//! mosaic-rx --config <path>      Load a custom config TOML
//! mosaic-rx --gen-config         Write default config to stdout
//! ```

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mosaic_core::{Collaborators, ReceiverServer, ShutdownReport};
use mosaic_rx::config::{LoggingConfig, RxConfig};
use mosaic_rx::tui::{App, ChannelObserver, UiEvent};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "mosaic-rx", about = "Grid-framed image receiver")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "mosaic-rx.toml")]
    config: PathBuf,

    /// Override the listening port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the output directory.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Do not keep the raw frames of each transfer.
    #[arg(long)]
    no_archive: bool,

    /// Show the live feed slot view instead of plain logs.
    #[arg(long)]
    tui: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&RxConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = RxConfig::load(&cli.config);
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(output) = cli.output {
        config.storage.output_dir = output;
    }
    if cli.no_archive {
        config.storage.archive_raw_frames = false;
    }

    init_tracing(&config.logging, cli.tui)?;
    info!("mosaic-rx v{}", env!("CARGO_PKG_VERSION"));
    info!("slots: {}", config.feeds.slot_count);

    let report = if cli.tui {
        run_tui(config).await?
    } else {
        run_console(config).await?
    };

    if report.is_clean() {
        info!(drained = report.drained, "receiver stopped");
    } else {
        for s in &report.stragglers {
            warn!(peer = %s.peer, id = s.id, running_for = ?s.running_for, "session aborted at shutdown");
        }
    }
    Ok(())
}

fn init_tracing(logging: &LoggingConfig, tui: bool) -> std::io::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if !logging.file.is_empty() {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&logging.file)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else if !tui {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    // The terminal view owns the screen; without a log file, logs are dropped.
    Ok(())
}

async fn run_console(config: RxConfig) -> Result<ShutdownReport, Box<dyn std::error::Error>> {
    let server = ReceiverServer::bind(config.to_server_config(), Collaborators::default()).await?;
    let stop = server.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, Ordering::SeqCst);
    });

    Ok(server.run().await?)
}

async fn run_tui(config: RxConfig) -> Result<ShutdownReport, Box<dyn std::error::Error>> {
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (key_tx, mut key_rx) = mpsc::unbounded_channel();

    let collaborators = Collaborators {
        observer: Arc::new(ChannelObserver::new(ui_tx)),
        ..Collaborators::default()
    };
    let server = ReceiverServer::bind(config.to_server_config(), collaborators).await?;
    let stop = server.stop_handle();
    let dashboard = server.dashboard();
    let mut app = App::new(server.local_addr()?.to_string());
    let server_task = tokio::spawn(server.run());

    // Blocking crossterm poll on its own thread; exits once `quit` is set.
    let quit = Arc::new(AtomicBool::new(false));
    let input_quit = Arc::clone(&quit);
    let input = tokio::task::spawn_blocking(move || {
        while !input_quit.load(Ordering::Relaxed) {
            if event::poll(Duration::from_millis(50)).unwrap_or(false) {
                if let Ok(Event::Key(key)) = event::read() {
                    if key_tx.send(key).is_err() {
                        break;
                    }
                }
            }
        }
    });

    crossterm::terminal::enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(std::io::stdout()))?;
    terminal.clear()?;

    let drawn: std::io::Result<()> = async {
        while !app.exit {
            app.refresh(&dashboard);
            terminal.draw(|f| app.draw(f))?;

            tokio::select! {
                Some(event) = ui_rx.recv() => app.update(event),
                Some(key) = key_rx.recv() => {
                    if key.kind == KeyEventKind::Press {
                        match key.code {
                            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.exit = true,
                            KeyCode::Char('q') | KeyCode::Esc => app.exit = true,
                            _ => {}
                        }
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(250)) => {}
            }
        }
        Ok(())
    }
    .await;

    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    drawn?;

    quit.store(true, Ordering::Relaxed);
    stop.store(false, Ordering::SeqCst);
    let _ = input.await;
    let report = server_task.await??;
    println!(
        "mosaic-rx stopped: {} transfers completed, {} sessions drained, {} aborted",
        dashboard.completed_count(),
        report.drained,
        report.stragglers.len()
    );
    Ok(report)
}
