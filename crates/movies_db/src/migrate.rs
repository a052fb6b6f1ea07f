//! Minimal embedded schema.
//!
//! The concrete SQL dialect and a full migration toolchain are out of this
//! server's scope (`spec.md` §1); this module applies just enough schema to
//! run the default SQLite backend, tracked in `schema_migrations` the same
//! way a real migrator would so `--migrate-only`/`--skip-migrations` behave
//! sensibly.

use crate::pool::DbPool;
use crate::error::Result;
use tracing::info;

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_init",
        r#"
        CREATE TABLE IF NOT EXISTS movies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            director TEXT NOT NULL,
            year INTEGER NOT NULL,
            rating REAL,
            genres TEXT NOT NULL DEFAULT '[]',
            poster_url TEXT,
            poster_mime TEXT,
            poster_blob BLOB,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS actors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            birth_year INTEGER NOT NULL,
            bio TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS movie_actors (
            movie_id INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
            actor_id INTEGER NOT NULL REFERENCES actors(id) ON DELETE CASCADE,
            PRIMARY KEY (movie_id, actor_id)
        );

        CREATE INDEX IF NOT EXISTS idx_movies_title ON movies(title);
        CREATE INDEX IF NOT EXISTS idx_movies_director ON movies(director);
        CREATE INDEX IF NOT EXISTS idx_movies_year ON movies(year);
        CREATE INDEX IF NOT EXISTS idx_actors_name ON actors(name);
        CREATE INDEX IF NOT EXISTS idx_movie_actors_actor ON movie_actors(actor_id);
        "#,
    ),
];

/// Apply every migration not yet recorded in `schema_migrations`, in order.
/// Idempotent: safe to call on every startup.
pub async fn run_migrations(pool: &DbPool) -> Result<usize> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    let mut applied = 0;
    for (version, sql) in MIGRATIONS {
        let already: Option<(String,)> =
            sqlx::query_as("SELECT version FROM schema_migrations WHERE version = ?")
                .bind(version)
                .fetch_optional(pool)
                .await?;

        if already.is_some() {
            continue;
        }

        sqlx::query(sql).execute(pool).await?;
        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(pool)
            .await?;

        info!(version, "applied migration");
        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{create_pool, DbConfig};

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = create_pool(DbConfig::sqlite_memory()).await.unwrap();
        let first = run_migrations(&pool).await.unwrap();
        let second = run_migrations(&pool).await.unwrap();
        assert_eq!(first, MIGRATIONS.len());
        assert_eq!(second, 0);
    }
}
