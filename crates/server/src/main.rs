//! Quill server entry point.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use quill_common::{Config, LocalStorage, StorageBackend};
use quill_core::{CreateGroupInput, GroupService};
use quill_db::repositories::GroupRepository;
use quill_web::AppState;
use sea_orm::DatabaseConnection;
use tokio::signal;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "quill", version, about = "Quill social blogging server")]
struct Cli {
    /// Configuration file. Without it, `config/` and `QUILL__*` variables are used.
    #[arg(short, long, env = "QUILL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run migrations and serve HTTP (the default).
    Serve,
    /// Run pending migrations and exit.
    Migrate,
    /// Create a group posts can be tagged with.
    CreateGroup {
        #[arg(long)]
        slug: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill=debug,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::load().context("Failed to load configuration")?,
    };

    let db = quill_db::init(&config.database).await?;
    info!("Connected to database");

    quill_db::migrate(&db).await?;
    info!("Migrations completed");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(db, config).await,
        Command::Migrate => Ok(()),
        Command::CreateGroup {
            slug,
            title,
            description,
        } => {
            let service = GroupService::new(GroupRepository::new(Arc::new(db)));
            service
                .create(CreateGroupInput {
                    slug,
                    title,
                    description,
                })
                .await?;
            Ok(())
        }
    }
}

async fn serve(db: DatabaseConnection, config: Config) -> anyhow::Result<()> {
    info!("Starting Quill server...");

    tokio::fs::create_dir_all(&config.storage.base_path)
        .await
        .with_context(|| {
            format!(
                "Failed to create media directory {}",
                config.storage.base_path.display()
            )
        })?;
    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(
        config.storage.base_path.clone(),
        config.storage.base_url.clone(),
    ));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host / server.port")?;
    let timeout = Duration::from_secs(config.server.request_timeout_secs);
    let body_limit = config.server.max_upload_bytes;

    let state = AppState::new(Arc::new(db), storage, config);
    if !state.page_cache.is_enabled() {
        info!("Index page cache disabled");
    }

    let app = quill_web::router(state)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http());

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
