//! Shared application state handed to every tool and resource handler.

use movies_core::{ActorService, CircuitBreaker, CompoundService, MovieService, SearchContextCache};
use movies_db::{ActorRepository, MovieRepository};
use std::sync::Arc;

/// Everything a tool or resource handler needs, constructed once at startup
/// and shared behind `Arc` for the lifetime of the process.
pub struct AppState {
    pub movies: Arc<MovieService>,
    pub actors: Arc<ActorService>,
    pub compound: Arc<CompoundService>,
    pub contexts: Arc<SearchContextCache>,
    pub movie_repo: Arc<dyn MovieRepository>,
    pub actor_repo: Arc<dyn ActorRepository>,
    /// Guards every `tools/call`/`resources/read` dispatch; trips open after
    /// repeated repository failures so a struggling database sheds load
    /// instead of queueing every new request behind it.
    pub breaker: Arc<CircuitBreaker>,
}
