//! Paginated search-context cache (`spec.md` §4.H).
//!
//! A server-side snapshot of a large search avoids holding a database
//! transaction open across multiple client round-trips
//! (`spec.md` §9 "Design Notes"). The cache itself is a single
//! `tokio::sync::RwLock`-guarded map per `spec.md` §5's "a single
//! reader-writer lock or equivalent"; reads (`get_page`/`get_info`) take the
//! read lock, `create_context` and eviction take the write lock.

use crate::error::{Result, ServiceError};
use movies_db::{EntityId, Movie, MovieRepository, MovieSearchCriteria};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Rows beyond this count are never materialized into a context, regardless
/// of what the criteria would otherwise match.
pub const HARD_ROW_CAP: i64 = 10_000;
/// Sliding time-to-live applied on every read.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);
/// Maximum number of contexts held at once; the least-recently-read is
/// evicted to make room for a new one.
pub const MAX_CONTEXTS: usize = 256;

struct StoredContext {
    criteria: MovieSearchCriteria,
    ids: Vec<EntityId>,
    page_size: i64,
    total: i64,
    created_at: Instant,
    expires_at: Instant,
    last_read_at: Instant,
}

/// What `create_search_context` returns.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContextSummary {
    pub context_id: Uuid,
    pub total: i64,
    pub page_size: i64,
}

/// What `get_context_page` returns.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContextPage {
    pub items: Vec<Movie>,
    pub page: i64,
    pub has_next: bool,
}

/// What `get_context_info` returns.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContextInfo {
    pub context_id: Uuid,
    pub criteria: MovieSearchCriteria,
    pub total: i64,
    pub page_size: i64,
}

pub struct SearchContextCache {
    movies: Arc<dyn MovieRepository>,
    contexts: tokio::sync::RwLock<HashMap<Uuid, StoredContext>>,
    ttl: Duration,
}

impl SearchContextCache {
    pub fn new(movies: Arc<dyn MovieRepository>) -> Self {
        Self::with_ttl(movies, DEFAULT_TTL)
    }

    pub fn with_ttl(movies: Arc<dyn MovieRepository>, ttl: Duration) -> Self {
        Self {
            movies,
            contexts: tokio::sync::RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn create_context(
        &self,
        mut criteria: MovieSearchCriteria,
        page_size: i64,
    ) -> Result<ContextSummary> {
        let page_size = if page_size <= 0 { 50 } else { page_size };
        criteria.limit = HARD_ROW_CAP;
        criteria.offset = 0;

        let matched = self.movies.find_by_criteria(&criteria).await?;
        let total = matched.len() as i64;
        let ids: Vec<EntityId> = matched.into_iter().map(|m| m.id).collect();

        let id = Uuid::new_v4();
        let now = Instant::now();
        let stored = StoredContext {
            criteria,
            ids,
            page_size,
            total,
            created_at: now,
            expires_at: now + self.ttl,
            last_read_at: now,
        };

        let mut contexts = self.contexts.write().await;
        evict_expired(&mut contexts);
        if contexts.len() >= MAX_CONTEXTS {
            evict_least_recently_read(&mut contexts);
        }
        contexts.insert(id, stored);

        Ok(ContextSummary {
            context_id: id,
            total,
            page_size,
        })
    }

    /// 0-based page number. Reading refreshes the context's expiry
    /// (sliding TTL).
    pub async fn get_page(&self, id: Uuid, page: i64) -> Result<ContextPage> {
        if page < 0 {
            return Err(ServiceError::invalid("page must be >= 0"));
        }

        let mut contexts = self.contexts.write().await;
        let now = Instant::now();
        let stored = contexts
            .get_mut(&id)
            .filter(|c| c.expires_at > now)
            .ok_or_else(|| ServiceError::NotFound {
                entity: "search context",
                id: 0,
            })?;

        stored.last_read_at = now;
        stored.expires_at = now + self.ttl;

        let page_size = stored.page_size.max(1) as usize;
        let start = (page as usize).saturating_mul(page_size);
        let end = (start + page_size).min(stored.ids.len());
        let page_ids: Vec<EntityId> = if start >= stored.ids.len() {
            Vec::new()
        } else {
            stored.ids[start..end].to_vec()
        };
        let has_next = end < stored.ids.len();
        drop(contexts);

        let mut items = Vec::with_capacity(page_ids.len());
        for movie_id in page_ids {
            items.push(self.movies.find_by_id(movie_id).await?);
        }

        Ok(ContextPage {
            items,
            page,
            has_next,
        })
    }

    /// Returns criteria and totals without hydrating entities. Also
    /// refreshes the sliding TTL, same as `get_page`.
    pub async fn get_info(&self, id: Uuid) -> Result<ContextInfo> {
        let mut contexts = self.contexts.write().await;
        let now = Instant::now();
        let stored = contexts
            .get_mut(&id)
            .filter(|c| c.expires_at > now)
            .ok_or_else(|| ServiceError::NotFound {
                entity: "search context",
                id: 0,
            })?;

        stored.last_read_at = now;
        stored.expires_at = now + self.ttl;

        Ok(ContextInfo {
            context_id: id,
            criteria: stored.criteria.clone(),
            total: stored.total,
            page_size: stored.page_size,
        })
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }
}

fn evict_expired(contexts: &mut HashMap<Uuid, StoredContext>) {
    let now = Instant::now();
    contexts.retain(|_, c| c.expires_at > now);
}

fn evict_least_recently_read(contexts: &mut HashMap<Uuid, StoredContext>) {
    if let Some((&oldest_id, _)) = contexts.iter().min_by_key(|(_, c)| c.last_read_at) {
        contexts.remove(&oldest_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use movies_db::InMemoryMovieRepository;

    async fn seeded_cache(count: usize) -> SearchContextCache {
        let repo = Arc::new(InMemoryMovieRepository::new());
        for i in 0..count {
            let mut m = Movie::new(format!("Movie {i}"), "Dir".into(), 2000);
            m.genres = vec!["Action".into()];
            movies_db::MovieRepository::save(&*repo, &mut m).await.unwrap();
        }
        SearchContextCache::new(repo)
    }

    #[tokio::test]
    async fn pages_cover_the_whole_result_set_without_overlap() {
        let cache = seeded_cache(150).await;
        let criteria = MovieSearchCriteria {
            genre: Some("Action".into()),
            ..Default::default()
        };
        let summary = cache.create_context(criteria, 50).await.unwrap();
        assert_eq!(summary.total, 150);

        let mut seen = std::collections::HashSet::new();
        for page in 0..3 {
            let result = cache.get_page(summary.context_id, page).await.unwrap();
            assert_eq!(result.items.len(), 50);
            for item in &result.items {
                assert!(seen.insert(item.id));
            }
        }
        let empty = cache.get_page(summary.context_id, 3).await.unwrap();
        assert!(empty.items.is_empty());
        assert!(!empty.has_next);
        assert_eq!(seen.len(), 150);
    }

    #[tokio::test]
    async fn unknown_context_is_not_found() {
        let cache = seeded_cache(1).await;
        let result = cache.get_page(Uuid::new_v4(), 0).await;
        assert!(matches!(result, Err(ServiceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn create_context_is_tracked_in_the_cache() {
        let cache = seeded_cache(3).await;
        cache
            .create_context(MovieSearchCriteria::default(), 10)
            .await
            .unwrap();
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn get_info_does_not_hydrate_entities() {
        let cache = seeded_cache(5).await;
        let summary = cache
            .create_context(MovieSearchCriteria::default(), 2)
            .await
            .unwrap();
        let info = cache.get_info(summary.context_id).await.unwrap();
        assert_eq!(info.total, 5);
        assert_eq!(info.page_size, 2);
    }
}
