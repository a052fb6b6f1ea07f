//! `sqlx`-backed SQLite repository implementations.

use crate::error::{DbError, Result};
use crate::pool::DbPool;
use crate::repository::{ActorRepository, MovieRepository, RepositoryBase};
use crate::types::{Actor, ActorSearchCriteria, EntityId, Movie, MovieSearchCriteria};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub struct SqliteMovieRepository {
    pool: DbPool,
}

impl SqliteMovieRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MovieRow {
    id: i64,
    title: String,
    director: String,
    year: i64,
    rating: Option<f64>,
    genres: String,
    poster_url: Option<String>,
    poster_mime: Option<String>,
    poster_blob: Option<Vec<u8>>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<MovieRow> for Movie {
    type Error = DbError;

    fn try_from(row: MovieRow) -> Result<Self> {
        Ok(Movie {
            id: row.id,
            title: row.title,
            director: row.director,
            year: row.year as i32,
            rating: row.rating,
            genres: serde_json::from_str(&row.genres)?,
            poster_url: row.poster_url,
            poster_mime: row.poster_mime,
            poster_blob: row.poster_blob,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        })
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Builds the `WHERE`/`ORDER BY`/`LIMIT` fragment and bind values for a
/// movie search. The primary key is always appended as the final ordering
/// key so a fixed criteria produces a deterministic order (`spec.md` §8
/// property 8).
fn build_movie_query(criteria: &MovieSearchCriteria, count_only: bool) -> (String, Vec<Param>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    if let Some(title) = &criteria.title {
        clauses.push("title LIKE ?".to_string());
        params.push(Param::Text(format!("%{}%", title)));
    }
    if let Some(director) = &criteria.director {
        clauses.push("director LIKE ?".to_string());
        params.push(Param::Text(format!("%{}%", director)));
    }
    if let Some(genre) = &criteria.genre {
        clauses.push("genres LIKE ?".to_string());
        params.push(Param::Text(format!("%\"{}\"%", genre)));
    }
    if let Some(min_year) = criteria.min_year {
        clauses.push("year >= ?".to_string());
        params.push(Param::Int(min_year as i64));
    }
    if let Some(max_year) = criteria.max_year {
        clauses.push("year <= ?".to_string());
        params.push(Param::Int(max_year as i64));
    }
    if let Some(min_rating) = criteria.min_rating {
        clauses.push("rating >= ?".to_string());
        params.push(Param::Real(min_rating));
    }
    if let Some(max_rating) = criteria.max_rating {
        clauses.push("rating <= ?".to_string());
        params.push(Param::Real(max_rating));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let select = if count_only {
        "SELECT COUNT(*) FROM movies".to_string()
    } else {
        "SELECT id, title, director, year, rating, genres, poster_url, poster_mime, poster_blob, created_at, updated_at FROM movies".to_string()
    };

    if count_only {
        return (format!("{}{}", select, where_clause), params);
    }

    let order = format!(
        " ORDER BY {} {}, id ASC LIMIT ? OFFSET ?",
        criteria.order_by.column(),
        criteria.order_dir.sql()
    );
    params.push(Param::Int(criteria.limit));
    params.push(Param::Int(criteria.offset));

    (format!("{}{}{}", select, where_clause, order), params)
}

enum Param {
    Text(String),
    Int(i64),
    Real(f64),
}

fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    params: &'q [Param],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for param in params {
        query = match param {
            Param::Text(s) => query.bind(s),
            Param::Int(i) => query.bind(i),
            Param::Real(r) => query.bind(r),
        };
    }
    query
}

#[async_trait]
impl MovieRepository for SqliteMovieRepository {
    async fn find_by_id(&self, id: EntityId) -> Result<Movie> {
        let row: MovieRow = sqlx::query_as(
            "SELECT id, title, director, year, rating, genres, poster_url, poster_mime, poster_blob, created_at, updated_at
             FROM movies WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::wrap_not_found(e, "movie", id))?;

        Movie::try_from(row)
    }

    async fn save(&self, movie: &mut Movie) -> Result<()> {
        movie.updated_at = Utc::now();
        let genres = serde_json::to_string(&movie.genres)?;

        if movie.is_unsaved() {
            movie.created_at = movie.updated_at;
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
            .bind(movie.created_at.to_rfc3339())
            .bind(movie.updated_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
            movie.id = result.last_insert_rowid();
            Ok(())
        } else {
            let result = sqlx::query(
                "UPDATE movies SET title = ?, director = ?, year = ?, rating = ?, genres = ?,
                 poster_url = ?, poster_mime = ?, poster_blob = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&movie.title)
            .bind(&movie.director)
            .bind(movie.year as i64)
            .bind(movie.rating)
            .bind(&genres)
            .bind(&movie.poster_url)
            .bind(&movie.poster_mime)
            .bind(&movie.poster_blob)
            .bind(movie.updated_at.to_rfc3339())
            .bind(movie.id)
            .execute(&self.pool)
            .await?;
            RepositoryBase::check_rows_affected(&result, "movie", movie.id)
        }
    }

    async fn delete(&self, id: EntityId) -> Result<()> {
        let result = sqlx::query("DELETE FROM movies WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        RepositoryBase::check_rows_affected(&result, "movie", id)
    }

    async fn find_by_criteria(&self, criteria: &MovieSearchCriteria) -> Result<Vec<Movie>> {
        let (sql, params) = build_movie_query(criteria, false);
        let query = bind_params(sqlx::query(&sql), &params);
        let rows = query.fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|row| MovieRow::from_sqlite_row(row))
            .map(|row| row.and_then(Movie::try_from))
            .collect()
    }

    async fn count_by_criteria(&self, criteria: &MovieSearchCriteria) -> Result<i64> {
        let (sql, params) = build_movie_query(criteria, true);
        let mut count_query = sqlx::query_as::<_, (i64,)>(&sql);
        for param in &params {
            count_query = match param {
                Param::Text(s) => count_query.bind(s),
                Param::Int(i) => count_query.bind(i),
                Param::Real(r) => count_query.bind(r),
            };
        }
        let (count,) = count_query.fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn find_by_title(&self, title: &str) -> Result<Vec<Movie>> {
        let criteria = MovieSearchCriteria {
            title: Some(title.to_string()),
            limit: 1000,
            ..Default::default()
        };
        self.find_by_criteria(&criteria).await
    }

    async fn find_by_director(&self, director: &str) -> Result<Vec<Movie>> {
        let criteria = MovieSearchCriteria {
            director: Some(director.to_string()),
            limit: 1000,
            ..Default::default()
        };
        self.find_by_criteria(&criteria).await
    }

    async fn find_by_genre(&self, genre: &str) -> Result<Vec<Movie>> {
        let criteria = MovieSearchCriteria {
            genre: Some(genre.to_string()),
            limit: 1000,
            ..Default::default()
        };
        self.find_by_criteria(&criteria).await
    }

    async fn find_top_rated(&self, limit: i64) -> Result<Vec<Movie>> {
        let rows: Vec<MovieRow> = sqlx::query_as(
            "SELECT id, title, director, year, rating, genres, poster_url, poster_mime, poster_blob, created_at, updated_at
             FROM movies WHERE rating IS NOT NULL AND rating > 0
             ORDER BY rating DESC, year ASC, id ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Movie::try_from).collect()
    }

    async fn count_all(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movies")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn delete_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM movies").execute(&self.pool).await?;
        Ok(())
    }
}

// `fetch_all` on `sqlx::query` (not `query_as`) returns raw `SqliteRow`s;
// `find_by_criteria` needs that path because the WHERE clause is built
// dynamically, so convert rows by hand at the edge.
impl MovieRow {
    fn from_sqlite_row(row: sqlx::sqlite::SqliteRow) -> Result<Self> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            director: row.try_get("director")?,
            year: row.try_get("year")?,
            rating: row.try_get("rating")?,
            genres: row.try_get("genres")?,
            poster_url: row.try_get("poster_url")?,
            poster_mime: row.try_get("poster_mime")?,
            poster_blob: row.try_get("poster_blob")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

pub struct SqliteActorRepository {
    pool: DbPool,
}

impl SqliteActorRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_movie_ids(&self, actor_id: EntityId) -> Result<Vec<EntityId>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT movie_id FROM movie_actors WHERE actor_id = ? ORDER BY movie_id")
                .bind(actor_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[derive(sqlx::FromRow)]
struct ActorRow {
    id: i64,
    name: String,
    birth_year: i64,
    bio: Option<String>,
    created_at: String,
    updated_at: String,
}

#[async_trait]
impl ActorRepository for SqliteActorRepository {
    async fn find_by_id(&self, id: EntityId) -> Result<Actor> {
        let row: ActorRow = sqlx::query_as(
            "SELECT id, name, birth_year, bio, created_at, updated_at FROM actors WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::wrap_not_found(e, "actor", id))?;

        let movie_ids = self.load_movie_ids(id).await?;

        Ok(Actor {
            id: row.id,
            name: row.name,
            birth_year: row.birth_year as i32,
            bio: row.bio,
            movie_ids,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        })
    }

    async fn save(&self, actor: &mut Actor) -> Result<()> {
        actor.updated_at = Utc::now();

        if actor.is_unsaved() {
            actor.created_at = actor.updated_at;
            let result = sqlx::query(
                "INSERT INTO actors (name, birth_year, bio, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&actor.name)
            .bind(actor.birth_year as i64)
            .bind(&actor.bio)
            .bind(actor.created_at.to_rfc3339())
            .bind(actor.updated_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
            actor.id = result.last_insert_rowid();
            Ok(())
        } else {
            let result = sqlx::query(
                "UPDATE actors SET name = ?, birth_year = ?, bio = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&actor.name)
            .bind(actor.birth_year as i64)
            .bind(&actor.bio)
            .bind(actor.updated_at.to_rfc3339())
            .bind(actor.id)
            .execute(&self.pool)
            .await?;
            RepositoryBase::check_rows_affected(&result, "actor", actor.id)
        }
    }

    async fn delete(&self, id: EntityId) -> Result<()> {
        let result = sqlx::query("DELETE FROM actors WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        RepositoryBase::check_rows_affected(&result, "actor", id)
    }

    async fn find_by_criteria(&self, criteria: &ActorSearchCriteria) -> Result<Vec<Actor>> {
        let mut clauses = Vec::new();
        let mut params: Vec<Param> = Vec::new();

        if let Some(name) = &criteria.name {
            clauses.push("a.name LIKE ?".to_string());
            params.push(Param::Text(format!("%{}%", name)));
        }
        if let Some(min) = criteria.min_birth_year {
            clauses.push("a.birth_year >= ?".to_string());
            params.push(Param::Int(min as i64));
        }
        if let Some(max) = criteria.max_birth_year {
            clauses.push("a.birth_year <= ?".to_string());
            params.push(Param::Int(max as i64));
        }

        let (from, movie_param) = if let Some(movie_id) = criteria.movie_id {
            (
                "FROM actors a JOIN movie_actors ma ON ma.actor_id = a.id AND ma.movie_id = ?".to_string(),
                Some(movie_id),
            )
        } else {
            ("FROM actors a".to_string(), None)
        };

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let sql = format!(
            "SELECT DISTINCT a.id, a.name, a.birth_year, a.bio, a.created_at, a.updated_at {} {} ORDER BY a.name ASC, a.id ASC LIMIT ? OFFSET ?",
            from, where_clause
        );

        let mut query = sqlx::query_as::<_, ActorRow>(&sql);
        if let Some(movie_id) = movie_param {
            query = query.bind(movie_id);
        }
        for param in &params {
            query = match param {
                Param::Text(s) => query.bind(s),
                Param::Int(i) => query.bind(i),
                Param::Real(r) => query.bind(r),
            };
        }
        query = query.bind(criteria.limit).bind(criteria.offset);

        let rows = query.fetch_all(&self.pool).await?;
        let mut actors = Vec::with_capacity(rows.len());
        for row in rows {
            let movie_ids = self.load_movie_ids(row.id).await?;
            actors.push(Actor {
                id: row.id,
                name: row.name,
                birth_year: row.birth_year as i32,
                bio: row.bio,
                movie_ids,
                created_at: parse_timestamp(&row.created_at),
                updated_at: parse_timestamp(&row.updated_at),
            });
        }
        Ok(actors)
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<Actor>> {
        let criteria = ActorSearchCriteria {
            name: Some(name.to_string()),
            limit: 1000,
            ..Default::default()
        };
        self.find_by_criteria(&criteria).await
    }

    async fn find_by_movie_id(&self, movie_id: EntityId) -> Result<Vec<Actor>> {
        let criteria = ActorSearchCriteria {
            movie_id: Some(movie_id),
            limit: 1000,
            ..Default::default()
        };
        self.find_by_criteria(&criteria).await
    }

    async fn link(&self, actor_id: EntityId, movie_id: EntityId) -> Result<()> {
        let existing: Option<(i64, i64)> = sqlx::query_as(
            "SELECT movie_id, actor_id FROM movie_actors WHERE actor_id = ? AND movie_id = ?",
        )
        .bind(actor_id)
        .bind(movie_id)
        .fetch_optional(&self.pool)
        .await?;

        if existing.is_some() {
            return Err(DbError::duplicate(
                "cast link",
                format!("actor {} <-> movie {}", actor_id, movie_id),
            ));
        }

        sqlx::query("INSERT INTO movie_actors (movie_id, actor_id) VALUES (?, ?)")
            .bind(movie_id)
            .bind(actor_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn unlink(&self, actor_id: EntityId, movie_id: EntityId) -> Result<()> {
        let result = sqlx::query("DELETE FROM movie_actors WHERE actor_id = ? AND movie_id = ?")
            .bind(actor_id)
            .bind(movie_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            Err(DbError::not_found("cast link", movie_id))
        } else {
            Ok(())
        }
    }

    async fn count_all(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM actors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn delete_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM actors").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::run_migrations;
    use crate::pool::{create_pool, DbConfig};

    async fn seeded_pool() -> DbPool {
        let pool = create_pool(DbConfig::sqlite_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn create_then_get_then_delete_round_trips() {
        let pool = seeded_pool().await;
        let repo = SqliteMovieRepository::new(pool);

        let mut movie = Movie::new("The Matrix".into(), "The Wachowskis".into(), 1999);
        movie.rating = Some(8.7);
        movie.genres = vec!["Action".into(), "Sci-Fi".into()];
        repo.save(&mut movie).await.unwrap();
        assert_eq!(movie.id, 1);

        let fetched = repo.find_by_id(movie.id).await.unwrap();
        assert_eq!(fetched.title, "The Matrix");
        assert_eq!(fetched.genres, vec!["Action".to_string(), "Sci-Fi".to_string()]);

        repo.delete(movie.id).await.unwrap();
        let result = repo.find_by_id(movie.id).await;
        assert!(matches!(result, Err(DbError::NotFound(_, _))));
    }

    #[tokio::test]
    async fn deleting_a_movie_cascades_cast_links() {
        let pool = seeded_pool().await;
        let movies = SqliteMovieRepository::new(pool.clone());
        let actors = SqliteActorRepository::new(pool);

        let mut movie = Movie::new("Heat".into(), "Michael Mann".into(), 1995);
        movies.save(&mut movie).await.unwrap();
        let mut actor = Actor::new("Al Pacino".into(), 1940);
        actors.save(&mut actor).await.unwrap();
        actors.link(actor.id, movie.id).await.unwrap();

        movies.delete(movie.id).await.unwrap();

        let cast = actors.find_by_movie_id(movie.id).await.unwrap();
        assert!(cast.is_empty());
        let reloaded = actors.find_by_id(actor.id).await.unwrap();
        assert!(reloaded.movie_ids.is_empty());
    }

    #[tokio::test]
    async fn linking_the_same_pair_twice_is_a_duplicate() {
        let pool = seeded_pool().await;
        let movies = SqliteMovieRepository::new(pool.clone());
        let actors = SqliteActorRepository::new(pool);

        let mut movie = Movie::new("The Godfather".into(), "Francis Ford Coppola".into(), 1972);
        movies.save(&mut movie).await.unwrap();
        let mut actor = Actor::new("Al Pacino".into(), 1940);
        actors.save(&mut actor).await.unwrap();

        actors.link(actor.id, movie.id).await.unwrap();
        let result = actors.link(actor.id, movie.id).await;
        assert!(matches!(result, Err(DbError::Duplicate(_, _))));
    }

    #[tokio::test]
    async fn search_orders_deterministically_with_id_as_tiebreaker() {
        let pool = seeded_pool().await;
        let repo = SqliteMovieRepository::new(pool);
        for title in ["Heat", "Thief", "Collateral"] {
            let mut movie = Movie::new(title.into(), "Michael Mann".into(), 1995);
            repo.save(&mut movie).await.unwrap();
        }

        let criteria = MovieSearchCriteria {
            limit: 10,
            ..Default::default()
        };
        let first = repo.find_by_criteria(&criteria).await.unwrap();
        let second = repo.find_by_criteria(&criteria).await.unwrap();
        assert_eq!(
            first.iter().map(|m| m.id).collect::<Vec<_>>(),
            second.iter().map(|m| m.id).collect::<Vec<_>>()
        );
        assert_eq!(
            first.iter().map(|m| m.title.as_str()).collect::<Vec<_>>(),
            vec!["Collateral", "Heat", "Thief"]
        );
    }
}
