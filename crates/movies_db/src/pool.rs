//! Database pool creation.
//!
//! Uses a concrete pool type (`SqlitePool`) rather than `sqlx::AnyPool` so
//! `#[derive(FromRow)]` works with timestamps and other non-primitive
//! column types. The concrete SQL dialect a deployment runs against is
//! outside this crate's scope; this module wires up the default SQLite
//! backend used by the reference binary.

use crate::error::{DbError, Result};
use sqlx::sqlite::SqlitePoolOptions;
use std::time::Duration;
use tracing::info;

/// Database pool type alias.
pub type DbPool = sqlx::SqlitePool;

/// Pool sizing and connection configuration, assembled from environment
/// variables by `movies-server`.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// `sqlite:<path>?mode=rwc` or `sqlite::memory:`
    pub url: String,
    pub max_connections: u32,
    pub max_idle_connections: u32,
    pub conn_max_lifetime: Duration,
}

impl DbConfig {
    pub fn sqlite(path: impl AsRef<str>) -> Self {
        Self {
            url: format!("sqlite:{}?mode=rwc", path.as_ref()),
            max_connections: 5,
            max_idle_connections: 5,
            conn_max_lifetime: Duration::from_secs(30 * 60),
        }
    }

    /// In-memory SQLite, for tests and `create_search_context` fixtures.
    pub fn sqlite_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            max_idle_connections: 1,
            conn_max_lifetime: Duration::from_secs(30 * 60),
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_max_idle_connections(mut self, max: u32) -> Self {
        self.max_idle_connections = max;
        self
    }

    pub fn with_conn_max_lifetime(mut self, lifetime: Duration) -> Self {
        self.conn_max_lifetime = lifetime;
        self
    }
}

/// Create a database pool from configuration and apply SQLite-specific
/// pragmas (WAL journaling, `NORMAL` sync, enforced foreign keys) to every
/// connection the pool opens.
///
/// These pragmas are per-connection SQLite state, not per-database: running
/// them once against an arbitrary connection checked out from the pool (as
/// a plain `sqlx::query(..).execute(pool)` would) only affects whichever
/// connection happened to service that query, leaving the rest of the pool
/// with foreign key enforcement off and cascade deletes silently inert.
/// `after_connect` runs on every connection as it is opened, so the
/// `movie_actors` cascade (`spec.md` §3/§8 property 6) holds regardless of
/// which pooled connection a request lands on.
pub async fn create_pool(config: DbConfig) -> Result<DbPool> {
    if config.url.trim().is_empty() {
        return Err(DbError::Config("database URL must not be empty".to_string()));
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .max_lifetime(config.conn_max_lifetime)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Off by default per connection; cascade deletes on
                // `movie_actors` depend on this (spec.md §3/§8 property 6).
                sqlx::query("PRAGMA foreign_keys = ON")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("PRAGMA journal_mode = WAL")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("PRAGMA synchronous = NORMAL")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&config.url)
        .await?;

    info!(url = %redact(&config.url), "Connected to database");
    Ok(pool)
}

fn redact(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => base.to_string(),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_memory_pool_connects() {
        let config = DbConfig::sqlite_memory();
        let pool = create_pool(config).await;
        assert!(pool.is_ok());
    }

    #[tokio::test]
    async fn empty_url_is_rejected() {
        let config = DbConfig {
            url: String::new(),
            ..DbConfig::sqlite_memory()
        };
        let result = create_pool(config).await;
        assert!(matches!(result, Err(DbError::Config(_))));
    }
}
