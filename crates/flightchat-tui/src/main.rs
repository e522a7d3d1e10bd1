mod app;
mod cli;
mod handler;
mod tui;
mod ui;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use app::App;
use flightchat_core::{Config, Report};
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "flightchat", version)]
#[command(about = "Ask questions about flight booking data and see the answers as text, tables and charts")]
struct Cli {
    /// Analysis backend base URL
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Delay between status checks, in milliseconds
    #[arg(long, global = true)]
    interval_ms: Option<u64>,
    /// Status checks before giving up on a query (0 for no limit)
    #[arg(long, global = true)]
    max_attempts: Option<u32>,
    /// Log file for the interactive UI
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// Ask one question and print the answer
    Ask {
        /// Your question
        question: String,
        /// Print the raw response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch a failure report
    Report {
        /// category-counts, trends, by-account or recent
        report: Report,
        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check that the backend is reachable
    Health,
    /// List suggested questions
    Suggest,
    /// Show the effective configuration
    Config {
        /// Persist --api-url, --interval-ms and --max-attempts to the config file
        #[arg(long)]
        save: bool,
    },
}

impl Cli {
    /// Settings given on the command line
    fn flags(&self) -> Config {
        Config {
            api_url: self.api_url.clone(),
            poll_interval_ms: self.interval_ms,
            max_poll_attempts: self.max_attempts,
            request_timeout_secs: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = Cli::parse();
    let command = args.command.take().unwrap_or(Commands::Chat);
    let interactive = matches!(command, Commands::Chat);
    init_logging(args.log_file.as_deref(), interactive)?;

    // `config` reports a broken file; everything else runs on defaults
    let file_config = match Config::load() {
        Ok(config) => config,
        Err(e) if matches!(command, Commands::Config { .. }) => return Err(e),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable config file");
            Config::new()
        }
    };
    let config = file_config.clone().with_env().merge(args.flags());
    tracing::debug!(api_url = config.api_url(), "Effective configuration");

    match command {
        Commands::Chat => run_tui(&config).await?,
        Commands::Ask { question, json } => cli::ask(&config, &question, json).await?,
        Commands::Report { report, json } => cli::report(&config, report, json).await?,
        Commands::Health => cli::health(&config).await?,
        Commands::Suggest => cli::suggest(),
        Commands::Config { save } => {
            let path = Config::get_config_path()?;
            if save {
                file_config.merge(args.flags()).save_to(&path)?;
                println!("Saved {}", path.display());
            }
            cli::show_config(&config, &path.display().to_string());
        }
    }

    Ok(())
}

/// The TUI owns the terminal, so it logs to a file; other commands log to stderr.
fn init_logging(log_file: Option<&Path>, interactive: bool) -> Result<()> {
    let default_level = if interactive { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("flightchat={0},flightchat_core={0}", default_level))
    });

    if interactive {
        let path = match log_file {
            Some(path) => path.to_path_buf(),
            None => default_log_path()?,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

fn default_log_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(data_dir.join("flightchat").join("flightchat.log"))
}

async fn run_tui(config: &Config) -> Result<()> {
    let mut events = EventHandler::new();
    let mut app = App::new(config, events.poll_sender())?;
    tracing::info!(api_url = config.api_url(), "Starting chat");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    // Abandon any in-flight query before handing the terminal back
    app.shutdown();
    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;
        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}
