//! userdir - a keyboard-driven user directory for the terminal.
//!
//! Lists users from a REST endpoint, shows one user's details, and lets the
//! operator add and delete users locally. The list is cached in the
//! configured store so repeat visits skip the network.
//!
//! # Usage
//!
//! ```bash
//! # Interactive TUI (default)
//! userdir
//!
//! # Print the list, or one user
//! userdir list --json
//! userdir show 3
//!
//! # Local edits
//! userdir add --name "Ada" --email ada@x.io --phone 555
//! userdir remove 3 --yes
//!
//! # Persist flags and environment overrides
//! userdir --storage memory config --save
//! ```

mod app;
mod commands;
mod ui;

use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use userdir_core::{Config, StorageTier, UserId};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Prefix of the TUI's rolling log files
const LOG_FILE_PREFIX: &str = "userdir.log";

// ============================================================================
// Command Line
// ============================================================================

#[derive(Parser)]
#[command(name = "userdir")]
#[command(author, version, about = "Browse and edit a user directory")]
struct Cli {
    /// Where the user list is cached (memory, file, none)
    #[arg(long, global = true)]
    storage: Option<StorageTier>,

    /// Base URL of the users API
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive interface (default)
    Tui,
    /// Print all users
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print one user's details
    Show {
        id: UserId,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Add a user to the local list
    Add {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        phone: String,

        /// Also POST the user to the API
        #[arg(long)]
        publish: bool,
    },
    /// Delete a user from the local list
    Remove {
        id: UserId,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Also send DELETE to the API
        #[arg(long)]
        publish: bool,
    },
    /// Clear the cached user list
    ClearCache,
    /// Print the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        save: bool,
    },
}

impl Cli {
    /// Config file and environment, then command line flags on top
    fn config(&self) -> Config {
        let mut config = Config::load_with_env().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            let mut config = Config::default();
            config.apply_env(|key| std::env::var(key).ok());
            config
        });

        if let Some(storage) = self.storage {
            config.storage = storage;
        }
        if let Some(url) = &self.api_url {
            config.api_base_url = Some(url.clone());
        }
        config
    }
}

// ============================================================================
// Logging
// ============================================================================

fn env_filter() -> EnvFilter {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Log to stderr (one-shot commands)
fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter())
        .init();
}

/// Log to a daily rolling file so output never lands on the TUI.
/// The returned guard flushes on drop and must outlive the app.
fn init_file_tracing(log_dir: &Path) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter())
        .init();

    guard
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let result = match cli.command {
        None | Some(Commands::Tui) => {
            let log_dir = Config::default().cache_dir()?.join("logs");
            let _guard = init_file_tracing(&log_dir);
            let config = cli.config();
            run_tui(config).await
        }
        Some(ref command) => {
            init_tracing();
            let config = cli.config();
            run_command(command, config).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run_command(command: &Commands, config: Config) -> Result<()> {
    match command {
        Commands::Tui => run_tui(config).await,
        Commands::List { json } => commands::list(&config, *json).await,
        Commands::Show { id, json } => commands::show(&config, *id, *json).await,
        Commands::Add {
            name,
            email,
            phone,
            publish,
        } => commands::add(&config, name, email, phone, *publish).await,
        Commands::Remove { id, yes, publish } => {
            commands::remove(&config, *id, *yes, *publish).await
        }
        Commands::ClearCache => commands::clear_cache(&config),
        Commands::Config { save } => commands::config(&config, *save),
    }
}

// ============================================================================
// TUI
// ============================================================================

async fn run_tui(config: Config) -> Result<()> {
    info!("userdir TUI starting");

    // Create the app before touching the terminal so setup errors print cleanly
    let mut app = App::new(config)?;
    app.start_load();

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

    info!("userdir TUI shutting down");
    result
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
                // Ignore release/repeat events reported by some terminals
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key) {
                    return Ok(());
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks();

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
