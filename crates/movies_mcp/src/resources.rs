//! MCP resource registry (`spec.md` §4.D/§6): static descriptors plus a
//! dispatcher that resolves a `movies://...` URI to its content.
//!
//! Unlike tools, resources are read-only views over the catalog; none of
//! them accept arguments beyond the URI itself.

use crate::state::AppState;
use base64::Engine;
use movies_core::ServiceError;
use movies_protocol::{ResourceContent, ResourceDefinition};
use movies_db::{EntityId, MovieSearchCriteria};
use serde_json::json;

const DATABASE_ALL_URI: &str = "movies://database/all";
const DATABASE_STATS_URI: &str = "movies://database/stats";
const POSTERS_COLLECTION_URI: &str = "movies://posters/collection";
const POSTERS_PREFIX: &str = "movies://posters/";

pub struct ResourceRegistry;

impl ResourceRegistry {
    pub fn new() -> Self {
        Self
    }

    /// The fixed catalog `resources/list` returns. `movies://posters/{id}`
    /// is templated and is not itself enumerated here, matching the
    /// convention that only concrete and collection-level URIs are listed.
    pub fn list_resources(&self) -> Vec<ResourceDefinition> {
        vec![
            ResourceDefinition {
                uri: DATABASE_ALL_URI.to_string(),
                name: "All movies".to_string(),
                description: Some("Every movie in the catalog, unfiltered".to_string()),
                mime_type: "application/json".to_string(),
            },
            ResourceDefinition {
                uri: DATABASE_STATS_URI.to_string(),
                name: "Database statistics".to_string(),
                description: Some("Movie/actor/cast-link counts".to_string()),
                mime_type: "application/json".to_string(),
            },
            ResourceDefinition {
                uri: POSTERS_COLLECTION_URI.to_string(),
                name: "Poster collection".to_string(),
                description: Some("Movies that have a stored poster blob".to_string()),
                mime_type: "application/json".to_string(),
            },
            ResourceDefinition {
                uri: "movies://posters/{id}".to_string(),
                name: "Poster image".to_string(),
                description: Some("Base64-encoded poster blob for one movie".to_string()),
                mime_type: "application/octet-stream".to_string(),
            },
        ]
    }

    /// Whether `uri` matches one of the four recognized forms. The
    /// dispatcher calls this first so a completely unrecognized URI can be
    /// answered `-32601` before `read` ever runs; a recognized-but-missing
    /// entity (e.g. a poster id that doesn't exist) is a `-32602` `not_found`
    /// from [`Self::read`] instead.
    pub fn is_known_uri(&self, uri: &str) -> bool {
        uri == DATABASE_ALL_URI
            || uri == DATABASE_STATS_URI
            || uri == POSTERS_COLLECTION_URI
            || uri.starts_with(POSTERS_PREFIX)
    }

    /// Resolves a URI to its content. Callers should check
    /// [`Self::is_known_uri`] first; an unrecognized URI reaching here still
    /// fails safely via `invalid_argument`.
    pub async fn read(&self, uri: &str, state: &AppState) -> Result<Vec<ResourceContent>, ServiceError> {
        if uri == DATABASE_ALL_URI {
            return self.read_database_all(state).await;
        }
        if uri == DATABASE_STATS_URI {
            return self.read_database_stats(state).await;
        }
        if uri == POSTERS_COLLECTION_URI {
            return self.read_posters_collection(state).await;
        }
        if let Some(id_segment) = uri.strip_prefix(POSTERS_PREFIX) {
            return self.read_poster(id_segment, state).await;
        }
        Err(ServiceError::invalid(format!("Unknown resource URI: {uri}")))
    }

    async fn read_database_all(&self, state: &AppState) -> Result<Vec<ResourceContent>, ServiceError> {
        let criteria = MovieSearchCriteria {
            limit: 10_000,
            ..Default::default()
        };
        let movies = state.movies.search_movies(criteria).await?;
        let text = serde_json::to_string_pretty(&movies).unwrap();
        Ok(vec![ResourceContent {
            uri: DATABASE_ALL_URI.to_string(),
            mime_type: "application/json".to_string(),
            text: Some(text),
            blob: None,
        }])
    }

    async fn read_database_stats(&self, state: &AppState) -> Result<Vec<ResourceContent>, ServiceError> {
        let movie_count = state.movie_repo.count_all().await?;
        let actor_count = state.actor_repo.count_all().await?;
        let top_rated = state.movies.top_rated_movies(1).await?;
        let stats = json!({
            "movie_count": movie_count,
            "actor_count": actor_count,
            "top_rated_title": top_rated.first().map(|m| m.title.clone()),
        });
        Ok(vec![ResourceContent {
            uri: DATABASE_STATS_URI.to_string(),
            mime_type: "application/json".to_string(),
            text: Some(serde_json::to_string_pretty(&stats).unwrap()),
            blob: None,
        }])
    }

    async fn read_posters_collection(&self, state: &AppState) -> Result<Vec<ResourceContent>, ServiceError> {
        let criteria = MovieSearchCriteria {
            limit: 10_000,
            ..Default::default()
        };
        let movies = state.movies.search_movies(criteria).await?;
        let with_posters: Vec<_> = movies
            .into_iter()
            .filter(|m| m.poster_blob.is_some())
            .map(|m| json!({ "id": m.id, "title": m.title, "poster_mime": m.poster_mime }))
            .collect();
        Ok(vec![ResourceContent {
            uri: POSTERS_COLLECTION_URI.to_string(),
            mime_type: "application/json".to_string(),
            text: Some(serde_json::to_string_pretty(&with_posters).unwrap()),
            blob: None,
        }])
    }

    async fn read_poster(&self, id_segment: &str, state: &AppState) -> Result<Vec<ResourceContent>, ServiceError> {
        let id: EntityId = id_segment
            .parse()
            .map_err(|_| ServiceError::invalid(format!("invalid poster id: {id_segment}")))?;
        let movie = state.movies.get_movie(id).await?;
        let blob = movie.poster_blob.ok_or_else(|| ServiceError::NotFound {
            entity: "poster",
            id,
        })?;
        let mime_type = movie.poster_mime.unwrap_or_else(|| "application/octet-stream".to_string());
        let encoded = base64::engine::general_purpose::STANDARD.encode(blob);

        Ok(vec![ResourceContent {
            uri: format!("{POSTERS_PREFIX}{id}"),
            mime_type,
            text: None,
            blob: Some(encoded),
        }])
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use movies_core::{ActorService, CircuitBreaker, CompoundService, MovieService, SearchContextCache};
    use movies_db::{InMemoryActorRepository, InMemoryBulkImporter, InMemoryMovieRepository};
    use std::sync::Arc;
    use std::time::Duration;

    fn state() -> AppState {
        let movie_repo = Arc::new(InMemoryMovieRepository::new());
        let actor_repo = Arc::new(InMemoryActorRepository::new());
        movie_repo.set_actor_repo(actor_repo.clone());
        let importer = Arc::new(InMemoryBulkImporter::new(movie_repo.clone()));
        AppState {
            movies: Arc::new(MovieService::new(movie_repo.clone())),
            actors: Arc::new(ActorService::new(actor_repo.clone(), movie_repo.clone())),
            compound: Arc::new(CompoundService::new(movie_repo.clone(), importer)),
            contexts: Arc::new(SearchContextCache::new(movie_repo.clone())),
            movie_repo,
            actor_repo,
            breaker: Arc::new(CircuitBreaker::new(5, Duration::from_secs(30))),
        }
    }

    #[test]
    fn catalog_lists_all_declared_resources() {
        let registry = ResourceRegistry::new();
        let uris: Vec<String> = registry.list_resources().into_iter().map(|r| r.uri).collect();
        assert!(uris.contains(&DATABASE_ALL_URI.to_string()));
        assert!(uris.contains(&DATABASE_STATS_URI.to_string()));
        assert!(uris.contains(&POSTERS_COLLECTION_URI.to_string()));
    }

    #[tokio::test]
    async fn database_stats_reports_zero_on_an_empty_catalog() {
        let registry = ResourceRegistry::new();
        let contents = registry.read(DATABASE_STATS_URI, &state()).await.unwrap();
        assert_eq!(contents.len(), 1);
        assert!(contents[0].text.as_ref().unwrap().contains("\"movie_count\": 0"));
    }

    #[tokio::test]
    async fn unknown_uri_is_rejected() {
        let registry = ResourceRegistry::new();
        let result = registry.read("movies://nope", &state()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn poster_read_requires_a_stored_blob() {
        let registry = ResourceRegistry::new();
        let st = state();
        let movie = st
            .movies
            .create_movie(movies_core::MovieFields {
                title: "Heat".into(),
                director: "Michael Mann".into(),
                year: 1995,
                rating: None,
                genres: vec![],
                poster_url: None,
            })
            .await
            .unwrap();
        let result = registry.read(&format!("movies://posters/{}", movie.id), &st).await;
        assert!(matches!(result, Err(ServiceError::NotFound { entity: "poster", .. })));
    }
}
