//! Compound tools: `bulk_movie_import`, `movie_recommendation_engine`,
//! `director_career_analysis`.

use crate::error::{Result, ServiceError};
use crate::movie_service::MovieFields;
use movies_db::{BulkMovieImporter, Movie, MovieRepository};
use std::sync::Arc;

/// Outcome of one row in a `bulk_movie_import` call.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub title: String,
    pub success: bool,
    pub error: Option<String>,
}

pub struct BulkImportReport {
    pub imported: Vec<Movie>,
    pub outcomes: Vec<ImportOutcome>,
}

/// `movie_recommendation_engine` weights and target preferences.
#[derive(Debug, Clone)]
pub struct RecommendationPreferences {
    pub genres: Vec<String>,
    pub director: Option<String>,
    pub year: Option<i32>,
    pub rating: Option<f64>,
    pub weight_genre: f64,
    pub weight_director: f64,
    pub weight_year: f64,
    pub weight_rating: f64,
    pub top_k: i64,
}

impl Default for RecommendationPreferences {
    fn default() -> Self {
        Self {
            genres: Vec::new(),
            director: None,
            year: None,
            rating: None,
            weight_genre: 2.0,
            weight_director: 3.0,
            weight_year: 1.0,
            weight_rating: 2.0,
            top_k: 10,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ScoredMovie {
    pub movie: Movie,
    pub score: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DirectorCareerStats {
    pub director: String,
    pub film_count: i64,
    pub mean_rating: Option<f64>,
    pub earliest_year: Option<i32>,
    pub latest_year: Option<i32>,
    pub top_rated: Vec<Movie>,
}

pub struct CompoundService {
    movies: Arc<dyn MovieRepository>,
    importer: Arc<dyn BulkMovieImporter>,
}

impl CompoundService {
    pub fn new(movies: Arc<dyn MovieRepository>, importer: Arc<dyn BulkMovieImporter>) -> Self {
        Self { movies, importer }
    }

    /// All-or-nothing: every row must pass field validation before any row
    /// reaches the importer, and the importer itself runs the inserts in a
    /// single transaction (`spec.md` §4.E default mode).
    pub async fn bulk_movie_import(&self, rows: Vec<MovieFields>) -> Result<BulkImportReport> {
        let mut to_insert = Vec::with_capacity(rows.len());
        let mut outcomes = Vec::with_capacity(rows.len());

        for fields in &rows {
            match validate_row(fields) {
                Ok(()) => {
                    let mut movie = Movie::new(
                        fields.title.trim().to_string(),
                        fields.director.trim().to_string(),
                        fields.year,
                    );
                    movie.rating = fields.rating;
                    movie.genres = fields.genres.clone();
                    movie.poster_url = fields.poster_url.clone();
                    to_insert.push(movie);
                    outcomes.push(ImportOutcome {
                        title: fields.title.clone(),
                        success: true,
                        error: None,
                    });
                }
                Err(err) => {
                    return Err(ServiceError::invalid(format!(
                        "row '{}' invalid: {}",
                        fields.title, err
                    )));
                }
            }
        }

        let ids = self.importer.import_all_or_nothing(to_insert.clone()).await?;
        let imported: Vec<Movie> = to_insert
            .into_iter()
            .zip(ids)
            .map(|(mut m, id)| {
                m.id = id;
                m
            })
            .collect();

        Ok(BulkImportReport { imported, outcomes })
    }

    pub async fn movie_recommendation_engine(
        &self,
        prefs: RecommendationPreferences,
    ) -> Result<Vec<ScoredMovie>> {
        let criteria = movies_db::MovieSearchCriteria {
            limit: 10_000,
            ..Default::default()
        };
        let candidates = self.movies.find_by_criteria(&criteria).await?;

        let mut scored: Vec<ScoredMovie> = candidates
            .into_iter()
            .map(|movie| {
                let genre_matches = movie
                    .genres
                    .iter()
                    .filter(|g| prefs.genres.iter().any(|p| p.eq_ignore_ascii_case(g)))
                    .count() as f64;

                let director_match = match &prefs.director {
                    Some(d) if d.eq_ignore_ascii_case(&movie.director) => 1.0,
                    _ => 0.0,
                };

                let year_proximity = match prefs.year {
                    Some(y) => 1.0 / (1.0 + (movie.year - y).unsigned_abs() as f64),
                    None => 0.0,
                };

                let rating_similarity = match (prefs.rating, movie.rating) {
                    (Some(target), Some(actual)) => 1.0 - (target - actual).abs() / 10.0,
                    _ => 0.0,
                };

                let score = genre_matches * prefs.weight_genre
                    + director_match * prefs.weight_director
                    + year_proximity * prefs.weight_year
                    + rating_similarity * prefs.weight_rating;

                ScoredMovie { movie, score }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.movie.id.cmp(&b.movie.id))
        });

        let top_k = if prefs.top_k <= 0 { 10 } else { prefs.top_k } as usize;
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Aggregate per-director statistics from a single
    /// `find_by_director` query.
    pub async fn director_career_analysis(&self, director_name: &str) -> Result<DirectorCareerStats> {
        let name = director_name.trim();
        if name.is_empty() {
            return Err(ServiceError::invalid("director_name is required"));
        }

        let films = self.movies.find_by_director(name).await?;
        if films.is_empty() {
            return Err(ServiceError::NotFound {
                entity: "director",
                id: 0,
            });
        }

        let rated: Vec<&Movie> = films.iter().filter(|m| m.rating.is_some()).collect();
        let mean_rating = if rated.is_empty() {
            None
        } else {
            Some(rated.iter().filter_map(|m| m.rating).sum::<f64>() / rated.len() as f64)
        };

        let earliest_year = films.iter().map(|m| m.year).min();
        let latest_year = films.iter().map(|m| m.year).max();

        let mut by_rating: Vec<Movie> = films.clone();
        by_rating.sort_by(|a, b| {
            b.rating
                .partial_cmp(&a.rating)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        by_rating.truncate(3);

        Ok(DirectorCareerStats {
            director: name.to_string(),
            film_count: films.len() as i64,
            mean_rating,
            earliest_year,
            latest_year,
            top_rated: by_rating,
        })
    }
}

fn validate_row(fields: &MovieFields) -> std::result::Result<(), &'static str> {
    if fields.title.trim().is_empty() {
        return Err("title is required");
    }
    if fields.director.trim().is_empty() {
        return Err("director is required");
    }
    if let Some(rating) = fields.rating {
        if !(0.0..=10.0).contains(&rating) {
            return Err("rating must be between 0 and 10");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use movies_db::{InMemoryBulkImporter, InMemoryMovieRepository};

    fn service() -> CompoundService {
        let repo = Arc::new(InMemoryMovieRepository::new());
        let importer = Arc::new(InMemoryBulkImporter::new(repo.clone()));
        CompoundService::new(repo, importer)
    }

    #[tokio::test]
    async fn bulk_import_persists_every_row() {
        let svc = service();
        let rows = vec![
            MovieFields {
                title: "Heat".into(),
                director: "Michael Mann".into(),
                year: 1995,
                rating: Some(8.2),
                genres: vec![],
                poster_url: None,
            },
            MovieFields {
                title: "Thief".into(),
                director: "Michael Mann".into(),
                year: 1981,
                rating: Some(7.7),
                genres: vec![],
                poster_url: None,
            },
        ];
        let report = svc.bulk_movie_import(rows).await.unwrap();
        assert_eq!(report.imported.len(), 2);
        assert!(report.outcomes.iter().all(|o| o.success));
    }

    #[tokio::test]
    async fn bulk_import_rejects_whole_batch_on_invalid_row() {
        let svc = service();
        let rows = vec![
            MovieFields {
                title: "Heat".into(),
                director: "Michael Mann".into(),
                year: 1995,
                rating: Some(8.2),
                genres: vec![],
                poster_url: None,
            },
            MovieFields {
                title: "Bad".into(),
                director: "Dir".into(),
                year: 2000,
                rating: Some(99.0),
                genres: vec![],
                poster_url: None,
            },
        ];
        let result = svc.bulk_movie_import(rows).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn director_analysis_aggregates_ratings() {
        let svc = service();
        svc.bulk_movie_import(vec![
            MovieFields {
                title: "Heat".into(),
                director: "Michael Mann".into(),
                year: 1995,
                rating: Some(8.0),
                genres: vec![],
                poster_url: None,
            },
            MovieFields {
                title: "Thief".into(),
                director: "Michael Mann".into(),
                year: 1981,
                rating: Some(6.0),
                genres: vec![],
                poster_url: None,
            },
        ])
        .await
        .unwrap();

        let stats = svc.director_career_analysis("Michael Mann").await.unwrap();
        assert_eq!(stats.film_count, 2);
        assert_eq!(stats.mean_rating, Some(7.0));
        assert_eq!(stats.earliest_year, Some(1981));
        assert_eq!(stats.latest_year, Some(1995));
    }
}
