//! Actor tools: `add_actor`, `get_actor`, `update_actor`, `delete_actor`,
//! `search_actors`.

use super::{parse_args, McpTool};
use crate::state::AppState;
use async_trait::async_trait;
use movies_core::{ActorFields, ServiceError};
use movies_db::{ActorSearchCriteria, EntityId};
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
struct ActorFieldsArgs {
    name: String,
    birth_year: i32,
    #[serde(default)]
    bio: Option<String>,
}

impl From<ActorFieldsArgs> for ActorFields {
    fn from(args: ActorFieldsArgs) -> Self {
        ActorFields {
            name: args.name,
            birth_year: args.birth_year,
            bio: args.bio,
        }
    }
}

pub struct AddActorTool;

#[async_trait]
impl McpTool for AddActorTool {
    fn name(&self) -> &'static str {
        "add_actor"
    }

    fn description(&self) -> &'static str {
        "Add a new actor to the catalog"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "birth_year": { "type": "integer" },
                "bio": { "type": "string" }
            },
            "required": ["name", "birth_year"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: ActorFieldsArgs = parse_args(args)?;
        let name = args.name.clone();
        let actor = state.actors.create_actor(args.into()).await?;
        Ok(json!({
            "message": format!("Actor '{name}' added successfully with ID: {}", actor.id),
            "actor": actor,
        }))
    }
}

pub struct GetActorTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GetActorArgs {
    id: EntityId,
}

#[async_trait]
impl McpTool for GetActorTool {
    fn name(&self) -> &'static str {
        "get_actor"
    }

    fn description(&self) -> &'static str {
        "Fetch a single actor by id"
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
        let args: GetActorArgs = parse_args(args)?;
        let actor = state.actors.get_actor(args.id).await?;
        Ok(serde_json::to_value(actor).unwrap())
    }
}

pub struct UpdateActorTool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateActorArgs {
    id: EntityId,
    name: String,
    birth_year: i32,
    #[serde(default)]
    bio: Option<String>,
}

#[async_trait]
impl McpTool for UpdateActorTool {
    fn name(&self) -> &'static str {
        "update_actor"
    }

    fn description(&self) -> &'static str {
        "Update an existing actor's fields"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "integer" },
                "name": { "type": "string" },
                "birth_year": { "type": "integer" },
                "bio": { "type": "string" }
            },
            "required": ["id", "name", "birth_year"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: UpdateActorArgs = parse_args(args)?;
        let fields = ActorFields {
            name: args.name,
            birth_year: args.birth_year,
            bio: args.bio,
        };
        let actor = state.actors.update_actor(args.id, fields).await?;
        Ok(serde_json::to_value(actor).unwrap())
    }
}

pub struct DeleteActorTool;

#[async_trait]
impl McpTool for DeleteActorTool {
    fn name(&self) -> &'static str {
        "delete_actor"
    }

    fn description(&self) -> &'static str {
        "Delete an actor and cascade-remove their cast links"
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
        let args: GetActorArgs = parse_args(args)?;
        state.actors.delete_actor(args.id).await?;
        Ok(json!({ "deleted": true, "id": args.id }))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchActorsArgs {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    min_birth_year: Option<i32>,
    #[serde(default)]
    max_birth_year: Option<i32>,
    #[serde(default)]
    movie_id: Option<EntityId>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default = "default_offset")]
    offset: i64,
}

pub struct SearchActorsTool;

#[async_trait]
impl McpTool for SearchActorsTool {
    fn name(&self) -> &'static str {
        "search_actors"
    }

    fn description(&self) -> &'static str {
        "Search actors by name, birth year range, or linked movie"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "min_birth_year": { "type": "integer" },
                "max_birth_year": { "type": "integer" },
                "movie_id": { "type": "integer" },
                "limit": { "type": "integer" },
                "offset": { "type": "integer" }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: SearchActorsArgs = parse_args(args)?;
        let criteria = ActorSearchCriteria {
            name: args.name,
            min_birth_year: args.min_birth_year,
            max_birth_year: args.max_birth_year,
            movie_id: args.movie_id,
            limit: args.limit,
            offset: args.offset,
        };
        let actors = state.actors.search_actors(criteria).await?;
        Ok(json!({ "actors": actors, "count": actors.len() }))
    }
}
