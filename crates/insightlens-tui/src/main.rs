use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Result;
use clap::{Parser, Subcommand};
use insightlens_core::config::{config_dir, Config};
use tracing_subscriber::EnvFilter;

mod app;
mod chart_view;
mod cli;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "insightlens")]
#[command(about = "Ask questions about product reviews and see the answers as charts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session token
    Login {
        /// Account email (prompted when omitted)
        #[arg(short, long)]
        email: Option<String>,
    },
    /// Forget the stored session token
    Logout,
    /// Ask one question and print the answer
    Ask {
        /// Your question
        question: String,
        /// Narrow the question to one product id
        #[arg(short, long)]
        product: Option<i64>,
    },
    /// List products available as question context
    Products,
    /// Show your most recent questions
    History,
}

/// Log to `<config_dir>/insightlens/insightlens.log`; the terminal belongs to the UI.
fn init_logging() -> Result<()> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("insightlens.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_logging() {
        eprintln!("Logging disabled: {}", e);
    }
    tracing::info!("Starting InsightLens v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Could not read config, using defaults: {}", e);
        Config::new()
    });

    match cli.command {
        None => run_chat(&config).await?,
        Some(Commands::Login { email }) => cli::login(&config, email).await?,
        Some(Commands::Logout) => cli::logout()?,
        Some(Commands::Ask { question, product }) => cli::ask(&config, &question, product).await?,
        Some(Commands::Products) => cli::products(&config).await?,
        Some(Commands::History) => cli::history(&config).await?,
    }

    Ok(())
}

async fn run_chat(config: &Config) -> Result<()> {
    let (mut app, session_events) = App::new(config)?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(session_events);

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event).await?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    // Cancel anything still in flight before the terminal goes back
    app.chat.shutdown();
    tui::restore()?;
    tracing::info!("Chat screen closed");
    result
}
