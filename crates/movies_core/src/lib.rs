//! Domain application services for the movies MCP server: movie/actor/cast
//! CRUD and search, compound analytics tools, the paginated search-context
//! cache, and the timeout/circuit-breaker/shutdown operational envelope.
//!
//! Nothing in this crate talks JSON-RPC; `movies_mcp` is the only crate that
//! converts a [`error::ServiceError`] into a wire error.

pub mod actor_service;
pub mod cache;
pub mod compound;
pub mod error;
pub mod movie_service;
pub mod shutdown;
pub mod timeout;

pub use actor_service::{ActorFields, ActorService};
pub use cache::{ContextInfo, ContextPage, ContextSummary, SearchContextCache};
pub use compound::{
    BulkImportReport, CompoundService, DirectorCareerStats, ImportOutcome,
    RecommendationPreferences, ScoredMovie,
};
pub use error::{Result, ServiceError};
pub use movie_service::{MovieFields, MovieService};
pub use shutdown::{ShutdownHook, ShutdownRegistry};
pub use timeout::{deadlines, CircuitBreaker, CircuitState};
