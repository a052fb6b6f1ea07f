//! Actor domain service and the actor/movie cast-link operations.
//!
//! Cast links are modeled on the `Actor` aggregate as a set of movie ids
//! (`spec.md` §9's "Design Notes" choice); this service is the only thing
//! that mutates the join table, always through
//! `ActorRepository::{link,unlink}`.

use crate::error::{Result, ServiceError};
use movies_db::{Actor, ActorRepository, ActorSearchCriteria, EntityId, Movie, MovieRepository};
use std::sync::Arc;

const MAX_NAME_LEN: usize = 255;
const MAX_BIO_LEN: usize = 2000;
const MIN_BIRTH_YEAR: i32 = 1800;
const DEFAULT_SEARCH_LIMIT: i64 = 50;
const MAX_SEARCH_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Default)]
pub struct ActorFields {
    pub name: String,
    pub birth_year: i32,
    pub bio: Option<String>,
}

fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Utc::now().year_ce().1 as i32
}

fn validate_fields(fields: &ActorFields) -> Result<()> {
    let mut problems = Vec::new();

    let name = fields.name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        problems.push("name");
    }
    if fields.birth_year < MIN_BIRTH_YEAR || fields.birth_year > current_year() {
        problems.push("birth_year");
    }
    if let Some(bio) = &fields.bio {
        if bio.chars().count() > MAX_BIO_LEN {
            problems.push("bio");
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::invalid(problems.join(", ")))
    }
}

pub struct ActorService {
    actors: Arc<dyn ActorRepository>,
    movies: Arc<dyn MovieRepository>,
}

impl ActorService {
    pub fn new(actors: Arc<dyn ActorRepository>, movies: Arc<dyn MovieRepository>) -> Self {
        Self { actors, movies }
    }

    pub async fn create_actor(&self, fields: ActorFields) -> Result<Actor> {
        let fields = ActorFields {
            name: fields.name.trim().to_string(),
            bio: fields.bio.map(|b| b.trim().to_string()),
            ..fields
        };
        validate_fields(&fields)?;

        let mut actor = Actor::new(fields.name, fields.birth_year);
        actor.bio = fields.bio;
        self.actors.save(&mut actor).await?;
        Ok(actor)
    }

    pub async fn update_actor(&self, id: EntityId, fields: ActorFields) -> Result<Actor> {
        if id <= 0 {
            return Err(ServiceError::invalid("id must be a positive integer"));
        }
        let fields = ActorFields {
            name: fields.name.trim().to_string(),
            bio: fields.bio.map(|b| b.trim().to_string()),
            ..fields
        };
        validate_fields(&fields)?;

        let mut actor = self.actors.find_by_id(id).await?;
        actor.name = fields.name;
        actor.birth_year = fields.birth_year;
        if fields.bio.is_some() {
            actor.bio = fields.bio;
        }
        self.actors.save(&mut actor).await?;
        Ok(actor)
    }

    pub async fn delete_actor(&self, id: EntityId) -> Result<()> {
        if id <= 0 {
            return Err(ServiceError::invalid("id must be a positive integer"));
        }
        Ok(self.actors.delete(id).await?)
    }

    pub async fn get_actor(&self, id: EntityId) -> Result<Actor> {
        if id <= 0 {
            return Err(ServiceError::invalid("id must be a positive integer"));
        }
        Ok(self.actors.find_by_id(id).await?)
    }

    pub async fn search_actors(&self, mut criteria: ActorSearchCriteria) -> Result<Vec<Actor>> {
        criteria.limit = match criteria.limit {
            0 => DEFAULT_SEARCH_LIMIT,
            n if n > MAX_SEARCH_LIMIT => MAX_SEARCH_LIMIT,
            n if n < 0 => DEFAULT_SEARCH_LIMIT,
            n => n,
        };
        criteria.offset = criteria.offset.max(0);
        Ok(self.actors.find_by_criteria(&criteria).await?)
    }

    /// Verifies both ids are positive, loads the actor, and links it to
    /// `movie_id` if not already linked (`duplicate` otherwise).
    pub async fn link_actor_to_movie(&self, actor_id: EntityId, movie_id: EntityId) -> Result<()> {
        if actor_id <= 0 || movie_id <= 0 {
            return Err(ServiceError::invalid(
                "actor_id and movie_id must be positive integers",
            ));
        }
        // Confirm both ends exist before writing the join row so the error
        // is a domain `not_found` rather than a raw foreign-key violation.
        self.actors.find_by_id(actor_id).await?;
        self.movies.find_by_id(movie_id).await?;
        self.actors.link(actor_id, movie_id).await?;
        Ok(())
    }

    pub async fn unlink_actor_from_movie(&self, actor_id: EntityId, movie_id: EntityId) -> Result<()> {
        if actor_id <= 0 || movie_id <= 0 {
            return Err(ServiceError::invalid(
                "actor_id and movie_id must be positive integers",
            ));
        }
        self.actors.unlink(actor_id, movie_id).await?;
        Ok(())
    }

    /// De-duplicated cast for a movie.
    pub async fn get_movie_cast(&self, movie_id: EntityId) -> Result<Vec<Actor>> {
        if movie_id <= 0 {
            return Err(ServiceError::invalid("movie_id must be a positive integer"));
        }
        // Confirm the movie exists so a deleted/unknown movie surfaces as
        // `not_found` rather than a silently empty cast.
        self.movies.find_by_id(movie_id).await?;
        let mut actors = self.actors.find_by_movie_id(movie_id).await?;
        actors.sort_by(|a, b| a.id.cmp(&b.id));
        actors.dedup_by(|a, b| a.id == b.id);
        Ok(actors)
    }

    /// Every movie the actor has a cast link to.
    pub async fn get_actor_movies(&self, actor_id: EntityId) -> Result<Vec<Movie>> {
        if actor_id <= 0 {
            return Err(ServiceError::invalid("actor_id must be a positive integer"));
        }
        let actor = self.actors.find_by_id(actor_id).await?;
        let mut movies = Vec::with_capacity(actor.movie_ids.len());
        for movie_id in actor.movie_ids {
            movies.push(self.movies.find_by_id(movie_id).await?);
        }
        Ok(movies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movie_service::{MovieFields, MovieService};
    use movies_db::{InMemoryActorRepository, InMemoryMovieRepository};

    fn services() -> (ActorService, MovieService) {
        let movie_repo = Arc::new(InMemoryMovieRepository::new());
        let actor_repo = Arc::new(InMemoryActorRepository::new());
        movie_repo.set_actor_repo(actor_repo.clone());
        (
            ActorService::new(actor_repo, movie_repo.clone()),
            MovieService::new(movie_repo),
        )
    }

    #[tokio::test]
    async fn link_then_get_cast_contains_the_actor() {
        let (actors, movies) = services();
        let movie = movies
            .create_movie(MovieFields {
                title: "The Matrix".into(),
                director: "The Wachowskis".into(),
                year: 1999,
                rating: None,
                genres: vec![],
                poster_url: None,
            })
            .await
            .unwrap();
        let actor = actors
            .create_actor(ActorFields {
                name: "Keanu Reeves".into(),
                birth_year: 1964,
                bio: None,
            })
            .await
            .unwrap();

        actors.link_actor_to_movie(actor.id, movie.id).await.unwrap();
        let cast = actors.get_movie_cast(movie.id).await.unwrap();
        assert_eq!(cast.len(), 1);
        assert_eq!(cast[0].id, actor.id);
    }

    #[tokio::test]
    async fn linking_twice_is_duplicate() {
        let (actors, movies) = services();
        let movie = movies
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
        let actor = actors
            .create_actor(ActorFields {
                name: "Al Pacino".into(),
                birth_year: 1940,
                bio: None,
            })
            .await
            .unwrap();

        actors.link_actor_to_movie(actor.id, movie.id).await.unwrap();
        let result = actors.link_actor_to_movie(actor.id, movie.id).await;
        assert!(matches!(result, Err(ServiceError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn birth_year_in_the_future_is_rejected() {
        let (actors, _movies) = services();
        let result = actors
            .create_actor(ActorFields {
                name: "Nobody".into(),
                birth_year: current_year() + 1,
                bio: None,
            })
            .await;
        assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));
    }
}
