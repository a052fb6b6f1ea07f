//! Persisted entity types and search criteria.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque positive integer identity. Zero denotes an unsaved entity.
pub type EntityId = i64;

/// A movie in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub id: EntityId,
    pub title: String,
    pub director: String,
    pub year: i32,
    pub rating: Option<f64>,
    pub genres: Vec<String>,
    pub poster_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_mime: Option<String>,
    #[serde(skip)]
    pub poster_blob: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Movie {
    /// A fresh, unsaved movie. Timestamps are set by the repository on save.
    pub fn new(title: String, director: String, year: i32) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title,
            director,
            year,
            rating: None,
            genres: Vec::new(),
            poster_url: None,
            poster_mime: None,
            poster_blob: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_unsaved(&self) -> bool {
        self.id == 0
    }
}

/// An actor in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Actor {
    pub id: EntityId,
    pub name: String,
    pub birth_year: i32,
    pub bio: Option<String>,
    /// Ids of movies this actor is linked to. The join table is reified by
    /// the repository; services never touch `movie_actors` directly.
    #[serde(default)]
    pub movie_ids: Vec<EntityId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Actor {
    pub fn new(name: String, birth_year: i32) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            birth_year,
            bio: None,
            movie_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_unsaved(&self) -> bool {
        self.id == 0
    }
}

/// Column a movie search may be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovieOrderBy {
    Title,
    Director,
    Year,
    Rating,
    CreatedAt,
    UpdatedAt,
}

impl MovieOrderBy {
    pub fn from_str_checked(s: &str) -> Option<Self> {
        match s {
            "title" => Some(Self::Title),
            "director" => Some(Self::Director),
            "year" => Some(Self::Year),
            "rating" => Some(Self::Rating),
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Director => "director",
            Self::Year => "year",
            Self::Rating => "rating",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

impl Default for MovieOrderBy {
    fn default() -> Self {
        Self::Title
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderDir {
    Asc,
    Desc,
}

impl OrderDir {
    pub fn from_str_checked(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl Default for OrderDir {
    fn default() -> Self {
        Self::Asc
    }
}

/// Search criteria for movies, normalized by `MovieService::search_movies`
/// before it reaches the repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovieSearchCriteria {
    pub title: Option<String>,
    pub director: Option<String>,
    pub genre: Option<String>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    #[serde(default)]
    pub order_by: MovieOrderBy,
    #[serde(default)]
    pub order_dir: OrderDir,
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// Search criteria for actors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActorSearchCriteria {
    pub name: Option<String>,
    pub min_birth_year: Option<i32>,
    pub max_birth_year: Option<i32>,
    pub movie_id: Option<EntityId>,
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
