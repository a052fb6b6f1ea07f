//! In-memory repository implementations, used by `movies_core`'s unit tests
//! so service logic can be exercised without a SQLite file or pool.

use crate::error::{DbError, Result};
use crate::repository::{ActorRepository, MovieRepository};
use crate::types::{Actor, ActorSearchCriteria, EntityId, Movie, MovieOrderBy, MovieSearchCriteria, OrderDir};
use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct InMemoryMovieRepository {
    rows: Mutex<HashMap<EntityId, Movie>>,
    next_id: Mutex<EntityId>,
    /// Set via [`Self::set_actor_repo`] so `delete` can cascade-remove cast
    /// links the same way the SQLite backend's `ON DELETE CASCADE` does.
    /// `None` when this repository is used standalone (most unit tests).
    cascade: Mutex<Option<Arc<InMemoryActorRepository>>>,
}

impl InMemoryMovieRepository {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
            cascade: Mutex::new(None),
        }
    }

    /// Wires this repository to the actor repository sharing its database,
    /// so deleting a movie also removes any cast links referencing it.
    pub fn set_actor_repo(&self, actor_repo: Arc<InMemoryActorRepository>) {
        *self.cascade.lock().unwrap() = Some(actor_repo);
    }

    fn matches(movie: &Movie, criteria: &MovieSearchCriteria) -> bool {
        if let Some(title) = &criteria.title {
            if !movie.title.to_lowercase().contains(&title.to_lowercase()) {
                return false;
            }
        }
        if let Some(director) = &criteria.director {
            if !movie.director.to_lowercase().contains(&director.to_lowercase()) {
                return false;
            }
        }
        if let Some(genre) = &criteria.genre {
            if !movie.genres.iter().any(|g| g.eq_ignore_ascii_case(genre)) {
                return false;
            }
        }
        if let Some(min_year) = criteria.min_year {
            if movie.year < min_year {
                return false;
            }
        }
        if let Some(max_year) = criteria.max_year {
            if movie.year > max_year {
                return false;
            }
        }
        if let Some(min_rating) = criteria.min_rating {
            if movie.rating.unwrap_or(0.0) < min_rating {
                return false;
            }
        }
        if let Some(max_rating) = criteria.max_rating {
            if movie.rating.unwrap_or(0.0) > max_rating {
                return false;
            }
        }
        true
    }

    fn compare(a: &Movie, b: &Movie, order_by: MovieOrderBy, order_dir: OrderDir) -> Ordering {
        let ordering = match order_by {
            MovieOrderBy::Title => a.title.cmp(&b.title),
            MovieOrderBy::Director => a.director.cmp(&b.director),
            MovieOrderBy::Year => a.year.cmp(&b.year),
            MovieOrderBy::Rating => a
                .rating
                .partial_cmp(&b.rating)
                .unwrap_or(Ordering::Equal),
            MovieOrderBy::CreatedAt => a.created_at.cmp(&b.created_at),
            MovieOrderBy::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        let ordering = match order_dir {
            OrderDir::Asc => ordering,
            OrderDir::Desc => ordering.reverse(),
        };
        ordering.then_with(|| a.id.cmp(&b.id))
    }

    fn filtered_sorted(&self, criteria: &MovieSearchCriteria) -> Vec<Movie> {
        let rows = self.rows.lock().unwrap();
        let mut matched: Vec<Movie> = rows
            .values()
            .filter(|m| Self::matches(m, criteria))
            .cloned()
            .collect();
        matched.sort_by(|a, b| Self::compare(a, b, criteria.order_by, criteria.order_dir));
        matched
    }
}

#[async_trait]
impl MovieRepository for InMemoryMovieRepository {
    async fn find_by_id(&self, id: EntityId) -> Result<Movie> {
        self.rows
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::not_found("movie", id))
    }

    async fn save(&self, movie: &mut Movie) -> Result<()> {
        movie.updated_at = Utc::now();
        let mut rows = self.rows.lock().unwrap();
        if movie.is_unsaved() {
            let mut next_id = self.next_id.lock().unwrap();
            movie.id = *next_id;
            *next_id += 1;
            movie.created_at = movie.updated_at;
            rows.insert(movie.id, movie.clone());
            Ok(())
        } else if rows.contains_key(&movie.id) {
            rows.insert(movie.id, movie.clone());
            Ok(())
        } else {
            Err(DbError::not_found("movie", movie.id))
        }
    }

    async fn delete(&self, id: EntityId) -> Result<()> {
        self.rows
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DbError::not_found("movie", id))?;
        if let Some(actor_repo) = self.cascade.lock().unwrap().as_ref() {
            actor_repo.unlink_movie(id);
        }
        Ok(())
    }

    async fn find_by_criteria(&self, criteria: &MovieSearchCriteria) -> Result<Vec<Movie>> {
        let matched = self.filtered_sorted(criteria);
        let offset = criteria.offset.max(0) as usize;
        let limit = criteria.limit.max(0) as usize;
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_by_criteria(&self, criteria: &MovieSearchCriteria) -> Result<i64> {
        Ok(self.filtered_sorted(criteria).len() as i64)
    }

    async fn find_by_title(&self, title: &str) -> Result<Vec<Movie>> {
        let criteria = MovieSearchCriteria {
            title: Some(title.to_string()),
            limit: 1000,
            ..Default::default()
        };
        self.find_by_criteria(&criteria).await
    }

    async fn find_by_director(&self, director: &str) -> Result<Vec<Movie>> {
        let criteria = MovieSearchCriteria {
            director: Some(director.to_string()),
            limit: 1000,
            ..Default::default()
        };
        self.find_by_criteria(&criteria).await
    }

    async fn find_by_genre(&self, genre: &str) -> Result<Vec<Movie>> {
        let criteria = MovieSearchCriteria {
            genre: Some(genre.to_string()),
            limit: 1000,
            ..Default::default()
        };
        self.find_by_criteria(&criteria).await
    }

    async fn find_top_rated(&self, limit: i64) -> Result<Vec<Movie>> {
        let rows = self.rows.lock().unwrap();
        let mut rated: Vec<Movie> = rows
            .values()
            .filter(|m| m.rating.unwrap_or(0.0) > 0.0)
            .cloned()
            .collect();
        rated.sort_by(|a, b| {
            b.rating
                .partial_cmp(&a.rating)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.year.cmp(&b.year))
                .then_with(|| a.id.cmp(&b.id))
        });
        rated.truncate(limit.max(0) as usize);
        Ok(rated)
    }

    async fn count_all(&self) -> Result<i64> {
        Ok(self.rows.lock().unwrap().len() as i64)
    }

    async fn delete_all(&self) -> Result<()> {
        self.rows.lock().unwrap().clear();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryActorRepository {
    rows: Mutex<HashMap<EntityId, Actor>>,
    links: Mutex<Vec<(EntityId, EntityId)>>,
    next_id: Mutex<EntityId>,
}

impl InMemoryActorRepository {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            links: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }

    fn movie_ids_for(&self, actor_id: EntityId) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .links
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| *a == actor_id)
            .map(|(_, m)| *m)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn hydrate(&self, actor: &Actor) -> Actor {
        let mut actor = actor.clone();
        actor.movie_ids = self.movie_ids_for(actor.id);
        actor
    }

    /// Removes every cast link referencing `movie_id`. Called by
    /// [`InMemoryMovieRepository::delete`] when wired via `set_actor_repo`,
    /// mirroring the SQLite schema's `ON DELETE CASCADE`.
    pub fn unlink_movie(&self, movie_id: EntityId) {
        self.links.lock().unwrap().retain(|(_, m)| *m != movie_id);
    }
}

#[async_trait]
impl ActorRepository for InMemoryActorRepository {
    async fn find_by_id(&self, id: EntityId) -> Result<Actor> {
        let actor = self
            .rows
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::not_found("actor", id))?;
        Ok(self.hydrate(&actor))
    }

    async fn save(&self, actor: &mut Actor) -> Result<()> {
        actor.updated_at = Utc::now();
        let mut rows = self.rows.lock().unwrap();
        if actor.is_unsaved() {
            let mut next_id = self.next_id.lock().unwrap();
            actor.id = *next_id;
            *next_id += 1;
            actor.created_at = actor.updated_at;
            rows.insert(actor.id, actor.clone());
            Ok(())
        } else if rows.contains_key(&actor.id) {
            rows.insert(actor.id, actor.clone());
            Ok(())
        } else {
            Err(DbError::not_found("actor", actor.id))
        }
    }

    async fn delete(&self, id: EntityId) -> Result<()> {
        let removed = self.rows.lock().unwrap().remove(&id).is_some();
        if removed {
            self.links.lock().unwrap().retain(|(a, _)| *a != id);
            Ok(())
        } else {
            Err(DbError::not_found("actor", id))
        }
    }

    async fn find_by_criteria(&self, criteria: &ActorSearchCriteria) -> Result<Vec<Actor>> {
        let movie_filter_ids: Option<Vec<EntityId>> = criteria.movie_id.map(|movie_id| {
            self.links
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, m)| *m == movie_id)
                .map(|(a, _)| *a)
                .collect()
        });

        let rows = self.rows.lock().unwrap();
        let mut matched: Vec<Actor> = rows
            .values()
            .filter(|a| {
                if let Some(name) = &criteria.name {
                    if !a.name.to_lowercase().contains(&name.to_lowercase()) {
                        return false;
                    }
                }
                if let Some(min) = criteria.min_birth_year {
                    if a.birth_year < min {
                        return false;
                    }
                }
                if let Some(max) = criteria.max_birth_year {
                    if a.birth_year > max {
                        return false;
                    }
                }
                if let Some(ids) = &movie_filter_ids {
                    if !ids.contains(&a.id) {
                        return false;
                    }
                }
                true
            })
            .map(|a| self.hydrate(a))
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        let offset = criteria.offset.max(0) as usize;
        let limit = criteria.limit.max(0) as usize;
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<Actor>> {
        let criteria = ActorSearchCriteria {
            name: Some(name.to_string()),
            limit: 1000,
            ..Default::default()
        };
        self.find_by_criteria(&criteria).await
    }

    async fn find_by_movie_id(&self, movie_id: EntityId) -> Result<Vec<Actor>> {
        let criteria = ActorSearchCriteria {
            movie_id: Some(movie_id),
            limit: 1000,
            ..Default::default()
        };
        self.find_by_criteria(&criteria).await
    }

    async fn link(&self, actor_id: EntityId, movie_id: EntityId) -> Result<()> {
        let mut links = self.links.lock().unwrap();
        if links.iter().any(|(a, m)| *a == actor_id && *m == movie_id) {
            return Err(DbError::duplicate(
                "cast link",
                format!("actor {} <-> movie {}", actor_id, movie_id),
            ));
        }
        links.push((actor_id, movie_id));
        Ok(())
    }

    async fn unlink(&self, actor_id: EntityId, movie_id: EntityId) -> Result<()> {
        let mut links = self.links.lock().unwrap();
        let before = links.len();
        links.retain(|(a, m)| !(*a == actor_id && *m == movie_id));
        if links.len() == before {
            Err(DbError::not_found("cast link", movie_id))
        } else {
            Ok(())
        }
    }

    async fn count_all(&self) -> Result<i64> {
        Ok(self.rows.lock().unwrap().len() as i64)
    }

    async fn delete_all(&self) -> Result<()> {
        self.rows.lock().unwrap().clear();
        self.links.lock().unwrap().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_assigns_incrementing_ids() {
        let repo = InMemoryMovieRepository::new();
        let mut a = Movie::new("Heat".into(), "Michael Mann".into(), 1995);
        let mut b = Movie::new("Thief".into(), "Michael Mann".into(), 1981);
        repo.save(&mut a).await.unwrap();
        repo.save(&mut b).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn update_on_unknown_id_is_not_found() {
        let repo = InMemoryMovieRepository::new();
        let mut ghost = Movie::new("Nope".into(), "Nobody".into(), 2000);
        ghost.id = 999;
        let result = repo.save(&mut ghost).await;
        assert!(matches!(result, Err(DbError::NotFound(_, 999))));
    }

    #[tokio::test]
    async fn link_rejects_duplicate_pair() {
        let repo = InMemoryActorRepository::new();
        repo.link(1, 1).await.unwrap();
        let result = repo.link(1, 1).await;
        assert!(matches!(result, Err(DbError::Duplicate(_, _))));
    }

    #[tokio::test]
    async fn deleting_a_movie_cascades_cast_links_when_wired() {
        let movie_repo = InMemoryMovieRepository::new();
        let actor_repo = Arc::new(InMemoryActorRepository::new());
        movie_repo.set_actor_repo(actor_repo.clone());

        let mut movie = Movie::new("Heat".into(), "Michael Mann".into(), 1995);
        movie_repo.save(&mut movie).await.unwrap();
        let mut actor = Actor::new("Al Pacino".into(), 1940);
        actor_repo.save(&mut actor).await.unwrap();
        actor_repo.link(actor.id, movie.id).await.unwrap();

        movie_repo.delete(movie.id).await.unwrap();

        assert!(actor_repo.movie_ids_for(actor.id).is_empty());
    }

    #[tokio::test]
    async fn search_respects_limit_offset_and_stable_order() {
        let repo = InMemoryMovieRepository::new();
        for title in ["B", "A", "C"] {
            let mut m = Movie::new(title.into(), "Dir".into(), 2000);
            repo.save(&mut m).await.unwrap();
        }
        let criteria = MovieSearchCriteria {
            limit: 2,
            offset: 0,
            ..Default::default()
        };
        let page = repo.find_by_criteria(&criteria).await.unwrap();
        assert_eq!(page.iter().map(|m| m.title.as_str()).collect::<Vec<_>>(), vec!["A", "B"]);
    }
}
