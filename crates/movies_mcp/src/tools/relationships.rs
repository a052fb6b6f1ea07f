//! Cast-link tools: `link_actor_to_movie`, `unlink_actor_from_movie`,
//! `get_movie_cast`, `get_actor_movies`.

use super::{parse_args, McpTool};
use crate::state::AppState;
use async_trait::async_trait;
use movies_core::ServiceError;
use movies_db::EntityId;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinkArgs {
    actor_id: EntityId,
    movie_id: EntityId,
}

pub struct LinkActorToMovieTool;

#[async_trait]
impl McpTool for LinkActorToMovieTool {
    fn name(&self) -> &'static str {
        "link_actor_to_movie"
    }

    fn description(&self) -> &'static str {
        "Add an actor to a movie's cast"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "actor_id": { "type": "integer" },
                "movie_id": { "type": "integer" }
            },
            "required": ["actor_id", "movie_id"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: LinkArgs = parse_args(args)?;
        state
            .actors
            .link_actor_to_movie(args.actor_id, args.movie_id)
            .await?;
        Ok(json!({ "linked": true, "actor_id": args.actor_id, "movie_id": args.movie_id }))
    }
}

pub struct UnlinkActorFromMovieTool;

#[async_trait]
impl McpTool for UnlinkActorFromMovieTool {
    fn name(&self) -> &'static str {
        "unlink_actor_from_movie"
    }

    fn description(&self) -> &'static str {
        "Remove an actor from a movie's cast"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "actor_id": { "type": "integer" },
                "movie_id": { "type": "integer" }
            },
            "required": ["actor_id", "movie_id"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: LinkArgs = parse_args(args)?;
        state
            .actors
            .unlink_actor_from_movie(args.actor_id, args.movie_id)
            .await?;
        Ok(json!({ "unlinked": true, "actor_id": args.actor_id, "movie_id": args.movie_id }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MovieIdArgs {
    movie_id: EntityId,
}

pub struct GetMovieCastTool;

#[async_trait]
impl McpTool for GetMovieCastTool {
    fn name(&self) -> &'static str {
        "get_movie_cast"
    }

    fn description(&self) -> &'static str {
        "List the actors linked to a movie"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "movie_id": { "type": "integer" } },
            "required": ["movie_id"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: MovieIdArgs = parse_args(args)?;
        let cast = state.actors.get_movie_cast(args.movie_id).await?;
        Ok(json!({ "cast": cast }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ActorIdArgs {
    actor_id: EntityId,
}

pub struct GetActorMoviesTool;

#[async_trait]
impl McpTool for GetActorMoviesTool {
    fn name(&self) -> &'static str {
        "get_actor_movies"
    }

    fn description(&self) -> &'static str {
        "List the movies an actor is linked to"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "actor_id": { "type": "integer" } },
            "required": ["actor_id"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: ActorIdArgs = parse_args(args)?;
        let movies = state.actors.get_actor_movies(args.actor_id).await?;
        Ok(json!({ "movies": movies }))
    }
}
