//! Database layer for Quill.
//!
//! Quill runs against Postgres in production and `SQLite` for small
//! installs and tests. The schema depends on cascading deletes, so every
//! connection has foreign keys enforced.

pub mod entities;
pub mod migrations;
pub mod repositories;
pub mod test_utils;

use std::time::Duration;

use quill_common::{AppError, config::DatabaseConfig};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::log::LevelFilter;

/// Upper bound on pooled connections to a `SQLite` file, which has a
/// single writer.
pub const SQLITE_MAX_CONNECTIONS: u32 = 8;

/// Database engine selected by the connection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    /// `SQLite` database file.
    Sqlite,
    /// `SQLite` in memory. Every connection sees its own database.
    SqliteMemory,
}

impl Backend {
    /// Detect the backend from a connection URL.
    pub fn from_url(url: &str) -> Result<Self, AppError> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Self::Postgres)
        } else if url.starts_with("sqlite:") {
            if url.contains(":memory:") || url.contains("mode=memory") {
                Ok(Self::SqliteMemory)
            } else {
                Ok(Self::Sqlite)
            }
        } else {
            Err(AppError::Config(
                "database.url must start with postgres:// or sqlite:".to_string(),
            ))
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
            Self::SqliteMemory => "sqlite-memory",
        }
    }
}

/// Pool settings for `config`, sized for its backend.
pub fn connect_options(config: &DatabaseConfig) -> Result<ConnectOptions, AppError> {
    let backend = Backend::from_url(&config.url)?;
    let (max, min) = match backend {
        Backend::Postgres => (config.max_connections, config.min_connections),
        Backend::Sqlite => {
            let max = config.max_connections.clamp(1, SQLITE_MAX_CONNECTIONS);
            (max, config.min_connections.min(max))
        }
        Backend::SqliteMemory => (1, 1),
    };

    let mut opt = ConnectOptions::new(&config.url);
    opt.max_connections(max)
        .min_connections(min)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    // An idle in-memory connection must never be recycled, it holds the data.
    if backend != Backend::SqliteMemory {
        opt.idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800));
    }

    Ok(opt)
}

/// Open the connection pool.
pub async fn init(config: &DatabaseConfig) -> Result<DatabaseConnection, AppError> {
    let backend = Backend::from_url(&config.url)?;
    let opt = connect_options(config)?;

    tracing::info!(
        backend = backend.name(),
        max_connections = opt.get_max_connections(),
        "Connecting to database"
    );

    Database::connect(opt)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Apply pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    migrations::Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
