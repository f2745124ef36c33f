use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ocean_tasks::config::Config;
use ocean_tasks::http::HttpClient;
use ocean_tasks::session::StoredSession;
use ocean_tasks::ui::{run_app, App, StartScreen};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ocean-tasks", about = "Ocean-themed to-do list client", version)]
struct Cli {
    /// Task server base URL
    #[arg(long, env = "OCEAN_TASKS_SERVER")]
    server: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Log in (the default)
    Login,
    /// Create an account
    Signup,
    /// Forget the stored session
    Logout,
}

fn init_logging(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).context("Failed to create log directory")?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ocean_tasks=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    init_logging(&config.log_path()?)?;

    let session_path = Config::session_path()?;
    let command = cli.command.unwrap_or(Command::Login);
    if let Command::Logout = command {
        StoredSession::delete(&session_path)?;
        println!("🌊 Session cleared. See you on the shore!");
        return Ok(());
    }

    let session = match StoredSession::load_from(&session_path) {
        Ok(session) => session,
        Err(err) => {
            warn!("ignoring stored session: {:#}", err);
            None
        }
    };
    let start = match command {
        Command::Signup => StartScreen::Signup,
        _ => StartScreen::Login,
    };

    info!("connecting to {}", config.server_url);
    let client = HttpClient::new(&config.server_url, config.request_timeout())
        .context("Failed to build HTTP client")?
        .with_token(session.as_ref().and_then(|s| s.token.clone()));
    let mut app = App::new(Arc::new(client), Some(session_path));
    app.start(start, session.map(|s| s.username));

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        eprintln!("{:?}", err);
    }
    Ok(())
}
