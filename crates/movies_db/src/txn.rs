//! Transaction manager.
//!
//! `with_transaction` begins a transaction, runs the supplied future with a
//! transaction handle, commits on `Ok`, and rolls back on `Err`. Because the
//! handle is dropped (and sqlx rolls back on drop without an explicit
//! commit) if the closure panics, a panic unwinds through the transaction
//! guard and the transaction is never committed — equivalent to "rollback
//! and re-raise."

use crate::error::Result;
use crate::pool::DbPool;
use std::future::Future;
use std::pin::Pin;

/// A transaction handle. Exposes the same row-count/not-found discipline as
/// [`crate::repository::RepositoryBase`] so a unit of work composes
/// identically inside and outside a transaction.
pub type Tx<'a> = sqlx::Transaction<'a, sqlx::Sqlite>;

/// A boxed future borrowing from the transaction handle passed to it. Named
/// per-`'a` in the bound below (rather than as a separate generic parameter)
/// so the closure can be instantiated at whatever lifetime `with_transaction`
/// picks for its local `tx`.
pub type TxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Run `fn_` inside a transaction; commit on `Ok`, roll back on `Err`.
pub async fn with_transaction<F, T>(pool: &DbPool, fn_: F) -> Result<T>
where
    F: for<'a> FnOnce(&'a mut Tx<'a>) -> TxFuture<'a, T>,
{
    let mut tx = pool.begin().await?;
    match fn_(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            // Explicit rollback surfaces connection-level rollback errors in
            // logs without masking the original error to the caller.
            let _ = tx.rollback().await;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{create_pool, DbConfig};

    #[tokio::test]
    async fn commits_on_success() {
        let pool = create_pool(DbConfig::sqlite_memory()).await.unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();

        let id: i64 = with_transaction(&pool, |tx| {
            Box::pin(async move {
                let result = sqlx::query(
                    "INSERT INTO movies (title, director, year, genres, created_at, updated_at)
                     VALUES ('Heat', 'Michael Mann', 1995, '[]', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
                )
                .execute(&mut **tx)
                .await?;
                Ok(result.last_insert_rowid())
            })
        })
        .await
        .unwrap();

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movies WHERE id = ?")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.0, 1);
    }

    #[tokio::test]
    async fn rolls_back_on_error() {
        let pool = create_pool(DbConfig::sqlite_memory()).await.unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();

        let result: Result<()> = with_transaction(&pool, |tx| {
            Box::pin(async move {
                sqlx::query(
                    "INSERT INTO movies (title, director, year, genres, created_at, updated_at)
                     VALUES ('Heat', 'Michael Mann', 1995, '[]', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
                )
                .execute(&mut **tx)
                .await?;
                Err(DbError::duplicate("movie", "forced failure"))
            })
        })
        .await;

        assert!(result.is_err());
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movies")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }
}
