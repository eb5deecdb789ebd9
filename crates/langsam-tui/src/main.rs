//! Langsam - a terminal reader and player for the daily slow-news digest.
//!
//! Shows the day's stories at three difficulty levels, with German text,
//! optional English translation and a narration timeline.

mod app;
mod ui;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use langsam_core::shell::{
    self, DiskCacheStorage, HttpNetwork, Intercept, ResponseSource, ShellConfig,
};
use langsam_core::Config;

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Log file prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "langsam.log";

/// Shell cache stores live under this subdirectory of the cache directory
const SHELL_CACHE_DIR: &str = "shell";

/// Initialize the tracing subscriber for logging.
///
/// The terminal belongs to the UI, so logs go to a daily file in the cache
/// directory. Use RUST_LOG to control the level (e.g., RUST_LOG=debug).
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    guard
}

/// Logging for the one-shot command modes, which own stderr.
fn init_cli_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: ignoring unreadable config ({})", e);
        Config::default()
    });
    let cache_dir = config
        .cache_dir()
        .unwrap_or_else(|_| PathBuf::from("./cache"));

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "--install-shell" {
        init_cli_tracing();
        return install_shell(&config, &cache_dir).await;
    }
    if args.len() > 1 && args[1] == "--shell-get" {
        init_cli_tracing();
        let path = args
            .get(2)
            .context("Usage: langsam --shell-get <path>")?;
        return shell_get(&config, &cache_dir, path).await;
    }

    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("Failed to create cache directory: {}", cache_dir.display()))?;
    let _log_guard = init_tracing(&cache_dir);
    info!("Langsam starting");

    let mut app = App::new(&config)?;
    app.start_loading();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("Langsam shutting down");
    Ok(())
}

fn spawn_shell_worker(config: &Config, cache_dir: &Path) -> Result<shell::ShellWorkerHandle> {
    let storage = DiskCacheStorage::new(cache_dir.join(SHELL_CACHE_DIR))?;
    let network = HttpNetwork::new(&config.base_url())?;
    Ok(shell::spawn(ShellConfig::default(), storage, network))
}

/// Download the application shell into the local cache and retire older generations.
async fn install_shell(config: &Config, cache_dir: &Path) -> Result<()> {
    let worker = spawn_shell_worker(config, cache_dir)?;

    eprintln!("Installing shell from {}...", config.base_url());
    let report = worker.install().await?;
    for path in &report.paths {
        eprintln!("  cached {}", path);
    }

    let purged = worker.activate().await?;
    if purged.is_empty() {
        eprintln!("Activated {}", report.tag);
    } else {
        eprintln!("Activated {} (removed {})", report.tag, purged.join(", "));
    }
    Ok(())
}

/// Serve one request through the shell worker and report where it came from.
async fn shell_get(config: &Config, cache_dir: &Path, path: &str) -> Result<()> {
    let worker = spawn_shell_worker(config, cache_dir)?;

    match worker.fetch(path).await? {
        Intercept::PassThrough => {
            println!("{}: not part of the shell, passed through", path);
        }
        Intercept::Respond { response, source } => {
            let source = match source {
                ResponseSource::Cache => "cache",
                ResponseSource::Network => "network",
            };
            println!(
                "{}: {} from {} ({} bytes, {})",
                path,
                response.status,
                source,
                response.body.len(),
                response.content_type.as_deref().unwrap_or("unknown type")
            );
        }
    }

    // A cache hit is refreshed in the background; let it land before exiting.
    worker.settle().await?;
    if let Some(hit) = worker.cached(path).await? {
        println!("  stored in {} ({})", hit.tag, hit.entry.age_display());
    }
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key) {
                    return Ok(());
                }
            }
        }

        // Apply the digest once it arrives and any player events
        app.check_background_tasks();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }

        // Let the transport and fetch tasks run between frames
        tokio::task::yield_now().await;
    }
}
