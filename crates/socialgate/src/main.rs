mod app;
mod config;
mod handlers;
mod state;
mod storage;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use listenfd::ListenFd;
use socialgate_auth::{AuthConfig, AuthState, InMemorySessionStore, SqliteSessionStore};
use socialgate_core::auth::SessionRepository;
use socialgate_core::storage::UserRepository;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::create_app;
use crate::config::{Backend, Config};
use crate::state::AppState;
use crate::storage::{InMemoryRepository, SqliteRepository};

/// Socialgate - Social login for your web app
#[derive(Parser, Debug)]
#[command(name = "socialgate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Host address to bind the server to
    #[arg(long, short = 'H', default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Port to listen on
    #[arg(long, short, default_value = "3000", env = "PORT")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "socialgate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Fail fast on bad configuration, before binding the listener
    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let auth_config = AuthConfig::from_env().context("loading auth configuration")?;

    if auth_config.enabled_providers().is_empty() {
        tracing::warn!("no identity providers configured; logins will fail");
    }

    let users: Arc<dyn UserRepository> = match config.storage {
        Backend::Sqlite => Arc::new(
            SqliteRepository::new(&config.sqlite_path)
                .await
                .context("opening user storage")?,
        ),
        Backend::Memory => Arc::new(InMemoryRepository::new()),
    };

    let sessions: Arc<dyn SessionRepository> = match config.session_store {
        Backend::Sqlite => Arc::new(
            SqliteSessionStore::new(&config.sqlite_path)
                .await
                .context("opening session storage")?,
        ),
        Backend::Memory => Arc::new(InMemorySessionStore::new()),
    };

    let auth_state = AuthState::new(users, sessions, auth_config)
        .await
        .context("initializing identity providers")?;

    let app = create_app(AppState::new(auth_state));

    // Auto-reload support via listenfd
    let mut listenfd = ListenFd::from_env();
    let listener = match listenfd.take_tcp_listener(0)? {
        // If we are given a tcp listener on listen fd 0, use that one
        Some(listener) => {
            listener.set_nonblocking(true)?;
            TcpListener::from_std(listener)?
        }
        // Otherwise fall back to CLI-specified host:port
        None => {
            let addr = format!("{}:{}", cli.host, cli.port);
            TcpListener::bind(&addr).await?
        }
    };

    tracing::info!("listening on {}", listener.local_addr()?);

    // Run the server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signals (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
