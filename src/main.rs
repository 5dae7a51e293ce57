use axum::{
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use std::env;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{fmt::MakeWriter, util::SubscriberInitExt, EnvFilter};

use crate::cli::DownloadArgs;
use crate::config::{ServeArgs, ServerConfig};
use crate::dev::DevArgs;
use crate::handlers::{JobRunner, ProcessRunner};

// --- Modules ---
pub mod cli;
pub mod config;
pub mod dev;
pub mod downloader;
pub mod error;
pub mod handlers;
pub mod models;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<dyn JobRunner>,
    /// Bounds how many download jobs run at once.
    pub jobs: Arc<Semaphore>,
}

// --- Command-Line Argument Parsing ---
#[derive(Parser, Debug)]
#[command(author, version, about = "Download videos or audio through yt-dlp, from the shell or over HTTP.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download one or more videos (or their audio).
    Download(DownloadArgs),
    /// Run the HTTP API in the foreground.
    Serve(ServeArgs),
    /// Run the API together with the front-end dev server.
    Dev(DevArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Colour only on a terminal: child job stderr ends up in HTTP error bodies.
    log_subscriber(std::io::stderr, std::io::stderr().is_terminal()).init();

    match cli.command {
        Commands::Download(args) => cli::run(args).await?,
        Commands::Serve(args) => run_server(args).await?,
        Commands::Dev(args) => dev::run(args).await?,
    }

    Ok(())
}

fn log_subscriber<W>(make_writer: W, ansi: bool) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(make_writer)
        .with_ansi(ansi)
        .finish()
}

/// Builds the router: the JSON API, with the static front-end as fallback.
pub fn app(state: AppState, static_dir: &Path) -> Router {
    let index = ServeFile::new(static_dir.join("index.html"));
    Router::new()
        .route("/api/download", post(handlers::start_download))
        .route("/api/status", get(handlers::status))
        .fallback_service(ServeDir::new(static_dir).fallback(index))
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any))
        .with_state(state)
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let config = ServerConfig::load(&args)?;
    let runner = ProcessRunner::new(env::current_exe()?, config.work_dir.clone());
    let state = AppState {
        runner: Arc::new(runner),
        jobs: Arc::new(Semaphore::new(config.max_jobs)),
    };

    let app = app(state, &config.static_dir);
    let addr = config.addr();
    tracing::info!(
        "Listening on {} (static: {}, max jobs: {})",
        addr,
        config.static_dir.display(),
        config.max_jobs
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
