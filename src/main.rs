mod api;
mod app;
mod config;
mod error;
mod fetch;
mod settings;
mod theme;
mod types;
mod ui;
mod utils;

use std::io::{self, Stdout};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::HttpApi;
use app::{keys, AllCoinsView, Env, PortfolioView, Session};
use config::Config;
use error::Result;

/// Live cryptocurrency prices in the terminal.
#[derive(Debug, Parser)]
#[command(name = "coinwatch", version, about)]
struct Cli {
    /// Config file to use instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Track the value of your holdings
    Portfolio,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_user_quit() => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let store = config.settings_store();
    let env = Env {
        api: Arc::new(HttpApi::new(&config.coingecko_api_key)?),
        theme: theme::by_name(&config.theme),
        config,
    };
    tracing::info!(settings = %store.path().display(), "starting");

    // Setup terminal
    enable_raw_mode()?;
    let mut terminal = undo_on_error(enter_screen(), restore_terminal)?;
    install_panic_hook();

    let token = CancellationToken::new();
    let (mut keys, pump) = keys::spawn_pump(token.clone());
    let result = {
        let mut session = Session {
            terminal: &mut terminal,
            keys: &mut keys,
            env: &env,
        };
        match cli.command {
            Some(Command::Portfolio) => PortfolioView::launch(&mut session, store, &token).await,
            None => AllCoinsView::launch(&mut session, store, &token).await,
        }
    };

    token.cancel();
    if let Err(e) = pump.await {
        tracing::warn!(error = %e, "keyboard pump did not stop cleanly");
    }

    // Restore terminal
    if let Err(e) = restore_terminal() {
        tracing::warn!(error = %e, "could not restore terminal");
    }
    terminal.show_cursor()?;

    result
}

fn init_logging() -> Option<WorkerGuard> {
    let dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coinwatch")
        .join("logs");
    std::fs::create_dir_all(&dir).ok()?;

    let appender = tracing_appender::rolling::daily(dir, "coinwatch.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_env("COINWATCH_LOG").unwrap_or_else(|_| EnvFilter::new("coinwatch=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    Some(guard)
}

fn enter_screen() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    execute!(io::stdout(), EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(io::stdout()))
}

/// Run `undo` when `result` failed, keeping the original error.
fn undo_on_error<T>(result: io::Result<T>, undo: impl FnOnce() -> io::Result<()>) -> io::Result<T> {
    if result.is_err() {
        if let Err(e) = undo() {
            tracing::warn!(error = %e, "could not restore terminal");
        }
    }
    result
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)
}

/// Leave raw mode before the default hook prints the panic.
fn install_panic_hook() {
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        hook(info);
    }));
}
