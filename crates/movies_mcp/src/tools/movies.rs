//! Movie tools: `get_movie`, `add_movie`, `update_movie`, `delete_movie`,
//! `search_movies`, `list_top_movies`, `search_by_decade`,
//! `search_by_rating_range`, `search_similar_movies`.

use super::{parse_args, McpTool};
use crate::state::AppState;
use async_trait::async_trait;
use movies_core::{MovieFields, ServiceError};
use movies_db::{EntityId, MovieOrderBy, MovieSearchCriteria, OrderDir};
use serde::Deserialize;
use serde_json::{json, Value};

fn default_limit() -> i64 {
    0
}

fn default_offset() -> i64 {
    0
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MovieFieldsArgs {
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

impl From<MovieFieldsArgs> for MovieFields {
    fn from(args: MovieFieldsArgs) -> Self {
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

pub struct GetMovieTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GetMovieArgs {
    id: EntityId,
}

#[async_trait]
impl McpTool for GetMovieTool {
    fn name(&self) -> &'static str {
        "get_movie"
    }

    fn description(&self) -> &'static str {
        "Fetch a single movie by id"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "id": { "type": "integer" } },
            "required": ["id"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: GetMovieArgs = parse_args(args)?;
        let movie = state.movies.get_movie(args.id).await?;
        Ok(serde_json::to_value(movie).unwrap())
    }
}

pub struct AddMovieTool;

#[async_trait]
impl McpTool for AddMovieTool {
    fn name(&self) -> &'static str {
        "add_movie"
    }

    fn description(&self) -> &'static str {
        "Add a new movie to the catalog"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "director": { "type": "string" },
                "year": { "type": "integer" },
                "rating": { "type": "number", "minimum": 0, "maximum": 10 },
                "genres": { "type": "array", "items": { "type": "string" } },
                "poster_url": { "type": "string", "format": "uri" }
            },
            "required": ["title", "director", "year"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: MovieFieldsArgs = parse_args(args)?;
        let title = args.title.clone();
        let movie = state.movies.create_movie(args.into()).await?;
        Ok(json!({
            "message": format!("Movie '{title}' added successfully with ID: {}", movie.id),
            "movie": movie,
        }))
    }
}

pub struct UpdateMovieTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateMovieArgs {
    id: EntityId,
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

#[async_trait]
impl McpTool for UpdateMovieTool {
    fn name(&self) -> &'static str {
        "update_movie"
    }

    fn description(&self) -> &'static str {
        "Update an existing movie's fields"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "integer" },
                "title": { "type": "string" },
                "director": { "type": "string" },
                "year": { "type": "integer" },
                "rating": { "type": "number", "minimum": 0, "maximum": 10 },
                "genres": { "type": "array", "items": { "type": "string" } },
                "poster_url": { "type": "string", "format": "uri" }
            },
            "required": ["id", "title", "director", "year"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: UpdateMovieArgs = parse_args(args)?;
        let fields = MovieFields {
            title: args.title,
            director: args.director,
            year: args.year,
            rating: args.rating,
            genres: args.genres,
            poster_url: args.poster_url,
        };
        let movie = state.movies.update_movie(args.id, fields).await?;
        Ok(serde_json::to_value(movie).unwrap())
    }
}

pub struct DeleteMovieTool;

#[async_trait]
impl McpTool for DeleteMovieTool {
    fn name(&self) -> &'static str {
        "delete_movie"
    }

    fn description(&self) -> &'static str {
        "Delete a movie and cascade-remove its cast links"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "id": { "type": "integer" } },
            "required": ["id"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: GetMovieArgs = parse_args(args)?;
        state.movies.delete_movie(args.id).await?;
        Ok(json!({ "deleted": true, "id": args.id }))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchMoviesArgs {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    director: Option<String>,
    #[serde(default)]
    genre: Option<String>,
    #[serde(default)]
    min_year: Option<i32>,
    #[serde(default)]
    max_year: Option<i32>,
    #[serde(default)]
    min_rating: Option<f64>,
    #[serde(default)]
    max_rating: Option<f64>,
    #[serde(default)]
    order_by: Option<String>,
    #[serde(default)]
    order_dir: Option<String>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default = "default_offset")]
    offset: i64,
}

impl SearchMoviesArgs {
    fn into_criteria(self) -> Result<MovieSearchCriteria, ServiceError> {
        let order_by = match self.order_by {
            Some(raw) => MovieOrderBy::from_str_checked(&raw)
                .ok_or_else(|| ServiceError::invalid(format!("unknown order_by: {raw}")))?,
            None => MovieOrderBy::default(),
        };
        let order_dir = match self.order_dir {
            Some(raw) => OrderDir::from_str_checked(&raw)
                .ok_or_else(|| ServiceError::invalid(format!("unknown order_dir: {raw}")))?,
            None => OrderDir::default(),
        };
        Ok(MovieSearchCriteria {
            title: self.title,
            director: self.director,
            genre: self.genre,
            min_year: self.min_year,
            max_year: self.max_year,
            min_rating: self.min_rating,
            max_rating: self.max_rating,
            order_by,
            order_dir,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

pub struct SearchMoviesTool;

#[async_trait]
impl McpTool for SearchMoviesTool {
    fn name(&self) -> &'static str {
        "search_movies"
    }

    fn description(&self) -> &'static str {
        "Search movies by title, director, genre, year and rating range"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "director": { "type": "string" },
                "genre": { "type": "string" },
                "min_year": { "type": "integer" },
                "max_year": { "type": "integer" },
                "min_rating": { "type": "number" },
                "max_rating": { "type": "number" },
                "order_by": { "type": "string", "enum": ["title", "director", "year", "rating", "created_at", "updated_at"] },
                "order_dir": { "type": "string", "enum": ["asc", "desc"] },
                "limit": { "type": "integer" },
                "offset": { "type": "integer" }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: SearchMoviesArgs = parse_args(args)?;
        let criteria = args.into_criteria()?;
        let movies = state.movies.search_movies(criteria).await?;
        Ok(json!({ "movies": movies, "count": movies.len() }))
    }
}

pub struct ListTopMoviesTool;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LimitArgs {
    #[serde(default = "default_limit")]
    limit: i64,
}

#[async_trait]
impl McpTool for ListTopMoviesTool {
    fn name(&self) -> &'static str {
        "list_top_movies"
    }

    fn description(&self) -> &'static str {
        "Top-rated movies, ordered by rating desc then year asc"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "limit": { "type": "integer" } },
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: LimitArgs = parse_args(args)?;
        let movies = state.movies.top_rated_movies(args.limit).await?;
        Ok(json!({ "movies": movies }))
    }
}

pub struct SearchByDecadeTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchByDecadeArgs {
    decade: i32,
    #[serde(default = "default_limit")]
    limit: i64,
}

#[async_trait]
impl McpTool for SearchByDecadeTool {
    fn name(&self) -> &'static str {
        "search_by_decade"
    }

    fn description(&self) -> &'static str {
        "Movies released within a given decade, e.g. 1990 for 1990-1999"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "decade": { "type": "integer" },
                "limit": { "type": "integer" }
            },
            "required": ["decade"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: SearchByDecadeArgs = parse_args(args)?;
        let movies = state.movies.search_by_decade(args.decade, args.limit).await?;
        Ok(json!({ "movies": movies }))
    }
}

pub struct SearchByRatingRangeTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchByRatingRangeArgs {
    min_rating: f64,
    max_rating: f64,
    #[serde(default = "default_limit")]
    limit: i64,
}

#[async_trait]
impl McpTool for SearchByRatingRangeTool {
    fn name(&self) -> &'static str {
        "search_by_rating_range"
    }

    fn description(&self) -> &'static str {
        "Movies whose rating falls within [min_rating, max_rating]"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "min_rating": { "type": "number" },
                "max_rating": { "type": "number" },
                "limit": { "type": "integer" }
            },
            "required": ["min_rating", "max_rating"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: SearchByRatingRangeArgs = parse_args(args)?;
        let movies = state
            .movies
            .search_by_rating_range(args.min_rating, args.max_rating, args.limit)
            .await?;
        Ok(json!({ "movies": movies }))
    }
}

pub struct SearchSimilarMoviesTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchSimilarMoviesArgs {
    movie_id: EntityId,
    #[serde(default = "default_limit")]
    limit: i64,
}

#[async_trait]
impl McpTool for SearchSimilarMoviesTool {
    fn name(&self) -> &'static str {
        "search_similar_movies"
    }

    fn description(&self) -> &'static str {
        "Movies sharing at least one genre with the given movie, ranked by overlap then rating"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "movie_id": { "type": "integer" },
                "limit": { "type": "integer" }
            },
            "required": ["movie_id"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: SearchSimilarMoviesArgs = parse_args(args)?;
        let movies = state
            .movies
            .search_similar_movies(args.movie_id, args.limit)
            .await?;
        Ok(json!({ "movies": movies }))
    }
}
