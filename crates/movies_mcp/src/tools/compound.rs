//! Compound tools: `bulk_movie_import`, `movie_recommendation_engine`,
//! `director_career_analysis`.

use super::{parse_args, McpTool};
use crate::state::AppState;
use async_trait::async_trait;
use movies_core::{MovieFields, RecommendationPreferences, ServiceError};
use serde::Deserialize;
use serde_json::{json, Value};

fn default_top_k() -> i64 {
    0
}

fn default_weight_genre() -> f64 {
    2.0
}

fn default_weight_director() -> f64 {
    3.0
}

fn default_weight_year() -> f64 {
    1.0
}

fn default_weight_rating() -> f64 {
    2.0
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MovieRowArgs {
    title: String,
    director: String,
    year: i32,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    poster_url: Option<String>,
}

impl From<MovieRowArgs> for MovieFields {
    fn from(args: MovieRowArgs) -> Self {
        MovieFields {
            title: args.title,
            director: args.director,
            year: args.year,
            rating: args.rating,
            genres: args.genres,
            poster_url: args.poster_url,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BulkMovieImportArgs {
    movies: Vec<MovieRowArgs>,
}

pub struct BulkMovieImportTool;

#[async_trait]
impl McpTool for BulkMovieImportTool {
    fn name(&self) -> &'static str {
        "bulk_movie_import"
    }

    fn description(&self) -> &'static str {
        "Import a batch of movies in a single all-or-nothing transaction"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "movies": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "director": { "type": "string" },
                            "year": { "type": "integer" },
                            "rating": { "type": "number", "minimum": 0, "maximum": 10 },
                            "genres": { "type": "array", "items": { "type": "string" } },
                            "poster_url": { "type": "string", "format": "uri" }
                        },
                        "required": ["title", "director", "year"]
                    }
                }
            },
            "required": ["movies"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: BulkMovieImportArgs = parse_args(args)?;
        let rows: Vec<MovieFields> = args.movies.into_iter().map(Into::into).collect();
        let report = state.compound.bulk_movie_import(rows).await?;
        Ok(json!({
            "imported": report.imported,
            "outcomes": report.outcomes.iter().map(|o| json!({
                "title": o.title,
                "success": o.success,
                "error": o.error,
            })).collect::<Vec<_>>(),
        }))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MovieRecommendationArgs {
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    director: Option<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default = "default_weight_genre")]
    weight_genre: f64,
    #[serde(default = "default_weight_director")]
    weight_director: f64,
    #[serde(default = "default_weight_year")]
    weight_year: f64,
    #[serde(default = "default_weight_rating")]
    weight_rating: f64,
    #[serde(default = "default_top_k")]
    top_k: i64,
}

pub struct MovieRecommendationEngineTool;

#[async_trait]
impl McpTool for MovieRecommendationEngineTool {
    fn name(&self) -> &'static str {
        "movie_recommendation_engine"
    }

    fn description(&self) -> &'static str {
        "Score and rank movies against weighted genre, director, year and rating preferences"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "genres": { "type": "array", "items": { "type": "string" } },
                "director": { "type": "string" },
                "year": { "type": "integer" },
                "rating": { "type": "number" },
                "weight_genre": { "type": "number" },
                "weight_director": { "type": "number" },
                "weight_year": { "type": "number" },
                "weight_rating": { "type": "number" },
                "top_k": { "type": "integer" }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: MovieRecommendationArgs = parse_args(args)?;
        let prefs = RecommendationPreferences {
            genres: args.genres,
            director: args.director,
            year: args.year,
            rating: args.rating,
            weight_genre: args.weight_genre,
            weight_director: args.weight_director,
            weight_year: args.weight_year,
            weight_rating: args.weight_rating,
            top_k: args.top_k,
        };
        let scored = state.compound.movie_recommendation_engine(prefs).await?;
        Ok(json!({ "recommendations": scored }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DirectorCareerAnalysisArgs {
    director: String,
}

pub struct DirectorCareerAnalysisTool;

#[async_trait]
impl McpTool for DirectorCareerAnalysisTool {
    fn name(&self) -> &'static str {
        "director_career_analysis"
    }

    fn description(&self) -> &'static str {
        "Aggregate film count, rating, and year span statistics for a director"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "director": { "type": "string" } },
            "required": ["director"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: DirectorCareerAnalysisArgs = parse_args(args)?;
        let stats = state
            .compound
            .director_career_analysis(&args.director)
            .await?;
        Ok(serde_json::to_value(stats).unwrap())
    }
}
