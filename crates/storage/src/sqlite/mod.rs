//! `SQLite` backend for the catalog, finalized attempts and profiles.
//!
//! One `SqliteRepository` implements all three repository traits over a
//! single pool, so an attempt and its answer rows share a transaction.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{AttemptRepository, CatalogRepository, ProfileRepository, Storage};

mod attempt_repo;
mod catalog_repo;
mod mapping;
mod migrate;
mod profile_repo;

/// One writer at a time is all `SQLite` allows; a few readers serve dashboards.
const MAX_CONNECTIONS: u32 = 4;
/// A submission waits this long for a concurrent writer before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// `sqlite::memory:` or a `mode=memory` file URI.
fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, SqliteInitError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT)
        .create_if_missing(true);
    // WAL needs a real file; memory databases keep their own journal.
    Ok(if is_in_memory(database_url) {
        options
    } else {
        options.journal_mode(SqliteJournalMode::Wal)
    })
}

impl SqliteRepository {
    /// Connect to `SQLite` using the given URL.
    ///
    /// A shared in-memory database lives as long as one connection does, so
    /// for memory URLs the pool keeps a connection open for its lifetime.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL is malformed or the connection
    /// cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let options = connect_options(database_url)?;
        let mut pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT);
        if is_in_memory(database_url) {
            pool = pool.min_connections(1).idle_timeout(None).max_lifetime(None);
        }
        let pool = pool.connect_with(options).await?;
        Ok(Self { pool })
    }

    /// Connect and bring the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations fail.
    pub async fn open(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl From<SqliteRepository> for Storage {
    fn from(repo: SqliteRepository) -> Self {
        let catalog: Arc<dyn CatalogRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(repo.clone());
        let profiles: Arc<dyn ProfileRepository> = Arc::new(repo);
        Self {
            catalog,
            attempts,
            profiles,
        }
    }
}

impl Storage {
    /// Build a `Storage` backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        Ok(SqliteRepository::open(database_url).await?.into())
    }
}
