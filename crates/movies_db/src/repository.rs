//! Repository contracts.
//!
//! Each domain has a repository trait implemented once against `sqlx`
//! (production) and once in-memory (tests). A shared [`RepositoryBase`]
//! provides the row-count and not-found helpers every implementation needs.

use crate::error::{DbError, Result};
use crate::types::{Actor, ActorSearchCriteria, EntityId, Movie, MovieSearchCriteria};
use async_trait::async_trait;
use sqlx::sqlite::SqliteQueryResult;

/// Movie persistence contract.
#[async_trait]
pub trait MovieRepository: Send + Sync {
    async fn find_by_id(&self, id: EntityId) -> Result<Movie>;
    /// Inserts when `movie.id == 0` and assigns the new id; otherwise
    /// updates in place. Returns `NotFound` when an update affects zero
    /// rows.
    async fn save(&self, movie: &mut Movie) -> Result<()>;
    /// Returns `NotFound` when zero rows are affected. Cascades to
    /// `movie_actors`.
    async fn delete(&self, id: EntityId) -> Result<()>;
    async fn find_by_criteria(&self, criteria: &MovieSearchCriteria) -> Result<Vec<Movie>>;
    async fn count_by_criteria(&self, criteria: &MovieSearchCriteria) -> Result<i64>;
    async fn find_by_title(&self, title: &str) -> Result<Vec<Movie>>;
    async fn find_by_director(&self, director: &str) -> Result<Vec<Movie>>;
    async fn find_by_genre(&self, genre: &str) -> Result<Vec<Movie>>;
    async fn find_top_rated(&self, limit: i64) -> Result<Vec<Movie>>;
    async fn count_all(&self) -> Result<i64>;
    /// Tests only.
    async fn delete_all(&self) -> Result<()>;
}

/// Actor persistence contract.
#[async_trait]
pub trait ActorRepository: Send + Sync {
    async fn find_by_id(&self, id: EntityId) -> Result<Actor>;
    async fn save(&self, actor: &mut Actor) -> Result<()>;
    async fn delete(&self, id: EntityId) -> Result<()>;
    async fn find_by_criteria(&self, criteria: &ActorSearchCriteria) -> Result<Vec<Actor>>;
    async fn find_by_name(&self, name: &str) -> Result<Vec<Actor>>;
    async fn find_by_movie_id(&self, movie_id: EntityId) -> Result<Vec<Actor>>;
    /// Errors with `Duplicate` if the pair is already linked.
    async fn link(&self, actor_id: EntityId, movie_id: EntityId) -> Result<()>;
    /// Errors with `NotFound` if the pair was not linked.
    async fn unlink(&self, actor_id: EntityId, movie_id: EntityId) -> Result<()>;
    async fn count_all(&self) -> Result<i64>;
    /// Tests only.
    async fn delete_all(&self) -> Result<()>;
}

/// Shared helpers composed by each repository implementation, not inherited
/// via a superclass.
pub struct RepositoryBase;

impl RepositoryBase {
    /// Returns `NotFound` when a write affected zero rows, otherwise `Ok`.
    pub fn check_rows_affected(
        result: &SqliteQueryResult,
        entity: &'static str,
        id: EntityId,
    ) -> Result<()> {
        if result.rows_affected() == 0 {
            Err(DbError::not_found(entity, id))
        } else {
            Ok(())
        }
    }
}
