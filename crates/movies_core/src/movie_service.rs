//! Movie domain service.
//!
//! Owns the invariants `spec.md` §3/§4.E assign to movies: string trimming,
//! range validation, `limit`/`order_by` normalization, and the `not_found`
//! wrapping of repository errors. The service never hands a raw
//! `movies_db::DbError` to its caller.

use crate::error::{Result, ServiceError};
use movies_db::{EntityId, Movie, MovieOrderBy, MovieRepository, MovieSearchCriteria, OrderDir};
use std::sync::Arc;

/// Fields accepted by `add_movie` / `update_movie`. Optional fields use
/// `Option` so a caller can omit them entirely; `None` means "leave unset"
/// for create and "leave unchanged" for update.
#[derive(Debug, Clone, Default)]
pub struct MovieFields {
    pub title: String,
    pub director: String,
    pub year: i32,
    pub rating: Option<f64>,
    pub genres: Vec<String>,
    pub poster_url: Option<String>,
}

const MAX_TITLE_LEN: usize = 255;
const MAX_DIRECTOR_LEN: usize = 255;
const MAX_GENRE_LEN: usize = 100;
const MAX_GENRES: usize = 10;
const MIN_YEAR: i32 = 1888;
const DEFAULT_SEARCH_LIMIT: i64 = 50;
const MAX_SEARCH_LIMIT: i64 = 1000;
const DEFAULT_TOP_RATED_LIMIT: i64 = 10;

fn current_year() -> i32 {
    chrono::Utc::now().year_ce().1 as i32
}

use chrono::Datelike;

/// Validates the invariants `spec.md` §3 assigns to a movie's fields,
/// independent of whether this is a create or an update.
fn validate_fields(fields: &MovieFields) -> Result<()> {
    let mut problems = Vec::new();

    let title = fields.title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        problems.push("title".to_string());
    }
    let director = fields.director.trim();
    if director.is_empty() || director.chars().count() > MAX_DIRECTOR_LEN {
        problems.push("director".to_string());
    }
    let max_year = current_year() + 10;
    if fields.year < MIN_YEAR || fields.year > max_year {
        problems.push("year".to_string());
    }
    if let Some(rating) = fields.rating {
        if !(0.0..=10.0).contains(&rating) {
            problems.push(format!("rating {rating} out of range 0.0..=10.0"));
        }
    }
    if fields.genres.len() > MAX_GENRES {
        problems.push("genres".to_string());
    }
    for genre in &fields.genres {
        let genre = genre.trim();
        if genre.is_empty() || genre.chars().count() > MAX_GENRE_LEN {
            problems.push("genres".to_string());
            break;
        }
    }
    if let Some(url) = &fields.poster_url {
        if !url.is_empty() && url::Url::parse(url).is_err() {
            problems.push("poster_url".to_string());
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::invalid(problems.join(", ")))
    }
}

pub struct MovieService {
    repo: Arc<dyn MovieRepository>,
}

impl MovieService {
    pub fn new(repo: Arc<dyn MovieRepository>) -> Self {
        Self { repo }
    }

    pub async fn create_movie(&self, fields: MovieFields) -> Result<Movie> {
        let fields = MovieFields {
            title: fields.title.trim().to_string(),
            director: fields.director.trim().to_string(),
            genres: fields
                .genres
                .into_iter()
                .map(|g| g.trim().to_string())
                .collect(),
            ..fields
        };
        validate_fields(&fields)?;

        let mut movie = Movie::new(fields.title, fields.director, fields.year);
        movie.rating = fields.rating;
        movie.genres = fields.genres;
        movie.poster_url = fields.poster_url;

        self.repo.save(&mut movie).await?;
        Ok(movie)
    }

    pub async fn update_movie(&self, id: EntityId, fields: MovieFields) -> Result<Movie> {
        if id <= 0 {
            return Err(ServiceError::invalid("id must be a positive integer"));
        }
        let fields = MovieFields {
            title: fields.title.trim().to_string(),
            director: fields.director.trim().to_string(),
            genres: fields
                .genres
                .into_iter()
                .map(|g| g.trim().to_string())
                .collect(),
            ..fields
        };
        validate_fields(&fields)?;

        let mut movie = self.repo.find_by_id(id).await?;
        movie.title = fields.title;
        movie.director = fields.director;
        movie.year = fields.year;
        if fields.rating.is_some() {
            movie.rating = fields.rating;
        }
        if !fields.genres.is_empty() {
            movie.genres = fields.genres;
        }
        if fields.poster_url.is_some() {
            movie.poster_url = fields.poster_url;
        }

        self.repo.save(&mut movie).await?;
        Ok(movie)
    }

    pub async fn delete_movie(&self, id: EntityId) -> Result<()> {
        if id <= 0 {
            return Err(ServiceError::invalid("id must be a positive integer"));
        }
        Ok(self.repo.delete(id).await?)
    }

    pub async fn get_movie(&self, id: EntityId) -> Result<Movie> {
        if id <= 0 {
            return Err(ServiceError::invalid("id must be a positive integer"));
        }
        Ok(self.repo.find_by_id(id).await?)
    }

    /// Normalizes `criteria` per `spec.md` §4.E before delegating to the
    /// repository: `limit == 0` becomes `50`, `limit > 1000` is clamped to
    /// `1000`, and an already-validated `order_by`/`order_dir` pass through
    /// unchanged (the wire layer is responsible for rejecting unknown
    /// values before this point, per the Open Question resolution in
    /// `spec.md` §9).
    pub fn normalize_criteria(mut criteria: MovieSearchCriteria) -> MovieSearchCriteria {
        criteria.limit = match criteria.limit {
            0 => DEFAULT_SEARCH_LIMIT,
            n if n > MAX_SEARCH_LIMIT => MAX_SEARCH_LIMIT,
            n if n < 0 => DEFAULT_SEARCH_LIMIT,
            n => n,
        };
        criteria.offset = criteria.offset.max(0);
        criteria
    }

    pub async fn search_movies(&self, criteria: MovieSearchCriteria) -> Result<Vec<Movie>> {
        let criteria = Self::normalize_criteria(criteria);
        Ok(self.repo.find_by_criteria(&criteria).await?)
    }

    pub async fn count_movies(&self, criteria: &MovieSearchCriteria) -> Result<i64> {
        Ok(self.repo.count_by_criteria(criteria).await?)
    }

    /// Negative or zero `limit` defaults to 10. Ties broken by year
    /// ascending then id ascending (delegated to the repository, which
    /// orders `rating DESC, year ASC, id ASC`).
    pub async fn top_rated_movies(&self, limit: i64) -> Result<Vec<Movie>> {
        let limit = if limit <= 0 { DEFAULT_TOP_RATED_LIMIT } else { limit };
        Ok(self.repo.find_top_rated(limit).await?)
    }

    pub async fn search_by_decade(&self, decade: i32, limit: i64) -> Result<Vec<Movie>> {
        let criteria = MovieSearchCriteria {
            min_year: Some(decade),
            max_year: Some(decade + 9),
            limit,
            order_by: MovieOrderBy::Year,
            order_dir: OrderDir::Asc,
            ..Default::default()
        };
        self.search_movies(criteria).await
    }

    pub async fn search_by_rating_range(
        &self,
        min_rating: f64,
        max_rating: f64,
        limit: i64,
    ) -> Result<Vec<Movie>> {
        if min_rating > max_rating {
            return Err(ServiceError::invalid(
                "min_rating must be less than or equal to max_rating",
            ));
        }
        let criteria = MovieSearchCriteria {
            min_rating: Some(min_rating),
            max_rating: Some(max_rating),
            limit,
            order_by: MovieOrderBy::Rating,
            order_dir: OrderDir::Desc,
            ..Default::default()
        };
        self.search_movies(criteria).await
    }

    /// Movies sharing at least one genre with `movie_id`, ranked by shared
    /// genre count then rating, excluding the movie itself.
    pub async fn search_similar_movies(&self, movie_id: EntityId, limit: i64) -> Result<Vec<Movie>> {
        let seed = self.get_movie(movie_id).await?;
        if seed.genres.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for genre in &seed.genres {
            let found = self.repo.find_by_genre(genre).await?;
            candidates.extend(found);
        }

        let mut scored: Vec<(i64, Movie)> = candidates
            .into_iter()
            .filter(|m| m.id != seed.id)
            .map(|m| {
                let shared = m.genres.iter().filter(|g| seed.genres.contains(g)).count() as i64;
                (shared, m)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| b.1.rating.partial_cmp(&a.1.rating).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.1.id.cmp(&b.1.id))
        });
        scored.dedup_by(|a, b| a.1.id == b.1.id);

        let limit = if limit <= 0 { DEFAULT_TOP_RATED_LIMIT } else { limit } as usize;
        Ok(scored.into_iter().take(limit).map(|(_, m)| m).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use movies_db::InMemoryMovieRepository;

    fn service() -> MovieService {
        MovieService::new(Arc::new(InMemoryMovieRepository::new()))
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let svc = service();
        let movie = svc
            .create_movie(MovieFields {
                title: "The Matrix".into(),
                director: "The Wachowskis".into(),
                year: 1999,
                rating: Some(8.7),
                genres: vec!["Action".into(), "Sci-Fi".into()],
                poster_url: None,
            })
            .await
            .unwrap();
        assert_eq!(movie.id, 1);

        let fetched = svc.get_movie(1).await.unwrap();
        assert_eq!(fetched.title, "The Matrix");
    }

    #[tokio::test]
    async fn rating_out_of_bounds_is_rejected() {
        let svc = service();
        let result = svc
            .create_movie(MovieFields {
                title: "Bad".into(),
                director: "Dir".into(),
                year: 2000,
                rating: Some(11.0),
                genres: vec![],
                poster_url: None,
            })
            .await;
        match result {
            Err(ServiceError::InvalidArgument(detail)) => {
                assert!(detail.contains("rating"));
                assert!(detail.contains("11"));
            }
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let svc = service();
        let movie = svc
            .create_movie(MovieFields {
                title: "Heat".into(),
                director: "Michael Mann".into(),
                year: 1995,
                rating: None,
                genres: vec![],
                poster_url: None,
            })
            .await
            .unwrap();
        svc.delete_movie(movie.id).await.unwrap();
        let result = svc.get_movie(movie.id).await;
        assert!(matches!(result, Err(ServiceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn search_normalizes_zero_limit_to_fifty() {
        let criteria = MovieSearchCriteria {
            limit: 0,
            ..Default::default()
        };
        let normalized = MovieService::normalize_criteria(criteria);
        assert_eq!(normalized.limit, 50);
    }

    #[tokio::test]
    async fn search_clamps_limit_above_thousand() {
        let criteria = MovieSearchCriteria {
            limit: 5000,
            ..Default::default()
        };
        let normalized = MovieService::normalize_criteria(criteria);
        assert_eq!(normalized.limit, 1000);
    }

    #[tokio::test]
    async fn top_rated_defaults_negative_limit_to_ten() {
        let svc = service();
        for i in 0..15 {
            svc.create_movie(MovieFields {
                title: format!("Movie {i}"),
                director: "Dir".into(),
                year: 2000,
                rating: Some(5.0 + (i as f64 * 0.1)),
                genres: vec![],
                poster_url: None,
            })
            .await
            .unwrap();
        }
        let top = svc.top_rated_movies(-1).await.unwrap();
        assert_eq!(top.len(), 10);
    }
}
