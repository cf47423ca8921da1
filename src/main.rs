use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use medportal::config::Config;
use medportal::db::Role;
use medportal::services::AuthService;
use medportal::AppState;

#[derive(Parser, Debug)]
#[command(name = "medportal")]
#[command(author, version, about = "Medical records backend for receptionists and doctors", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "medportal.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Provision a staff account
    CreateUser {
        #[arg(long)]
        username: String,
        /// Password; read from MEDPORTAL_NEW_PASSWORD when not given
        #[arg(long, env = "MEDPORTAL_NEW_PASSWORD", hide_env_values = true)]
        password: String,
        /// receptionist or doctor
        #[arg(long)]
        role: Role,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;

    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.config.exists() {
        tracing::info!("Loaded configuration from {}", cli.config.display());
    } else {
        tracing::info!("No config file found at {}, using defaults", cli.config.display());
    }

    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!("Failed to create data directory: {}", config.server.data_dir.display())
    })?;
    let db = medportal::db::init(&config.server.data_dir).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            config.ensure_jwt_secret();
            serve(config, db).await
        }
        Command::CreateUser {
            username,
            password,
            role,
        } => {
            let auth = AuthService::from_config(db, &config.auth);
            let user = auth
                .create_user(&username, &password, role)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create user: {}", e))?;
            println!("Created {} '{}' (id {})", user.role, user.username, user.id);
            Ok(())
        }
    }
}

async fn serve(config: Config, db: medportal::DbPool) -> Result<()> {
    tracing::info!("Starting medportal v{}", env!("CARGO_PKG_VERSION"));

    let store = medportal::storage::from_config(&config.storage)
        .await
        .context("Failed to initialize object store")?;
    tracing::info!(backend = ?config.storage.backend, "Object store ready");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let cleanup_interval = config.rate_limit.cleanup_interval;
    let state = Arc::new(AppState::new(config, db, store));

    medportal::api::rate_limit::spawn_cleanup_task(state.rate_limiter.clone(), cleanup_interval);

    let app = medportal::api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
