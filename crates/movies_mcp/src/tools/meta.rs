//! `validate_tool_call`: check a prospective tool call's arguments against
//! the catalog without actually running the tool.
//!
//! This tool is built from a snapshot of the other 24 tools' schemas, taken
//! once at registry construction time (see [`super::ToolRegistry::new`]).
//! It does not see itself in that snapshot, since it is registered after the
//! snapshot is taken; nothing in `spec.md` §4.D requires a tool to validate
//! calls to itself.

use super::{McpTool, ToolRegistry};
use crate::state::AppState;
use async_trait::async_trait;
use movies_core::ServiceError;
use movies_protocol::ToolDefinition;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct ValidateToolCallTool {
    catalog: Arc<[ToolDefinition]>,
}

impl ValidateToolCallTool {
    pub fn new(registry: &ToolRegistry) -> Self {
        Self {
            catalog: super::registry_snapshot(registry),
        }
    }

    fn schema_for(&self, name: &str) -> Option<&Value> {
        self.catalog
            .iter()
            .find(|def| def.name == name)
            .map(|def| &def.input_schema)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ValidateToolCallArgs {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[async_trait]
impl McpTool for ValidateToolCallTool {
    fn name(&self) -> &'static str {
        "validate_tool_call"
    }

    fn description(&self) -> &'static str {
        "Validate a tool name and argument object against the catalog without invoking the tool"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "arguments": { "type": "object" }
            },
            "required": ["name"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _state: &AppState) -> Result<Value, ServiceError> {
        let args: ValidateToolCallArgs = super::parse_args(args)?;

        let Some(schema) = self.schema_for(&args.name) else {
            return Ok(json!({
                "valid": false,
                "errors": [format!("unknown tool: {}", args.name)],
            }));
        };

        let errors = schema_errors(schema, &args.arguments);
        Ok(json!({ "valid": errors.is_empty(), "errors": errors }))
    }
}

/// Checks `value` against a hand-written JSON Schema object (the same shape
/// every tool's `input_schema()` returns): required properties present,
/// declared types matching, and no properties outside the schema when
/// `additionalProperties` is `false`.
fn schema_errors(schema: &Value, value: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let Value::Object(obj) = value else {
        errors.push("arguments must be a JSON object".to_string());
        return errors;
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required {
            if let Some(name) = field.as_str() {
                if !obj.contains_key(name) {
                    errors.push(format!("missing required field: {name}"));
                }
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let additional_allowed = schema
        .get("additionalProperties")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    if !additional_allowed {
        if let Some(properties) = properties {
            for key in obj.keys() {
                if !properties.contains_key(key) {
                    errors.push(format!("unexpected field: {key}"));
                }
            }
        }
    }

    if let Some(properties) = properties {
        for (name, prop_schema) in properties {
            if let Some(actual) = obj.get(name) {
                if let Some(expected_type) = prop_schema.get("type").and_then(Value::as_str) {
                    if !matches_json_type(actual, expected_type) {
                        errors.push(format!("field {name} must be of type {expected_type}"));
                    }
                }
            }
        }
    }

    errors
}

fn matches_json_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;

    fn state() -> AppState {
        use movies_core::{ActorService, CircuitBreaker, CompoundService, MovieService, SearchContextCache};
        use movies_db::{InMemoryActorRepository, InMemoryBulkImporter, InMemoryMovieRepository};
        use std::sync::Arc;
        use std::time::Duration;

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

    #[tokio::test]
    async fn unknown_tool_name_is_invalid() {
        let registry = ToolRegistry::new();
        let tool = ValidateToolCallTool::new(&registry);
        let result = tool
            .execute(json!({ "name": "not_a_tool" }), &state())
            .await
            .unwrap();
        assert_eq!(result["valid"], json!(false));
    }

    #[tokio::test]
    async fn missing_required_field_is_invalid() {
        let registry = ToolRegistry::new();
        let tool = ValidateToolCallTool::new(&registry);
        let result = tool
            .execute(json!({ "name": "get_movie", "arguments": {} }), &state())
            .await
            .unwrap();
        assert_eq!(result["valid"], json!(false));
    }

    #[tokio::test]
    async fn well_formed_arguments_are_valid() {
        let registry = ToolRegistry::new();
        let tool = ValidateToolCallTool::new(&registry);
        let result = tool
            .execute(json!({ "name": "get_movie", "arguments": { "id": 1 } }), &state())
            .await
            .unwrap();
        assert_eq!(result["valid"], json!(true));
    }
}
