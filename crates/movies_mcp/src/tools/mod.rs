//! MCP tool implementations (`spec.md` §4.D).
//!
//! One file per capability group, mirroring the teacher's one-handler-per-
//! tool layout. Each tool is addressed by its flat name in a single
//! [`ToolRegistry`]; schemas live on the tool itself so `tools/list` and
//! `validate_tool_call` can never diverge from what dispatch actually runs.

mod actors;
mod compound;
mod context;
mod meta;
mod movies;
mod relationships;

use crate::state::AppState;
use async_trait::async_trait;
use movies_core::ServiceError;
use movies_protocol::ToolDefinition;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait McpTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> Value;
    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

pub struct ToolRegistry {
    tools: HashMap<&'static str, Box<dyn McpTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
        };

        registry.register(Box::new(movies::GetMovieTool));
        registry.register(Box::new(movies::AddMovieTool));
        registry.register(Box::new(movies::UpdateMovieTool));
        registry.register(Box::new(movies::DeleteMovieTool));
        registry.register(Box::new(movies::SearchMoviesTool));
        registry.register(Box::new(movies::ListTopMoviesTool));
        registry.register(Box::new(movies::SearchByDecadeTool));
        registry.register(Box::new(movies::SearchByRatingRangeTool));
        registry.register(Box::new(movies::SearchSimilarMoviesTool));

        registry.register(Box::new(actors::AddActorTool));
        registry.register(Box::new(actors::GetActorTool));
        registry.register(Box::new(actors::UpdateActorTool));
        registry.register(Box::new(actors::DeleteActorTool));
        registry.register(Box::new(actors::SearchActorsTool));

        registry.register(Box::new(relationships::LinkActorToMovieTool));
        registry.register(Box::new(relationships::UnlinkActorFromMovieTool));
        registry.register(Box::new(relationships::GetMovieCastTool));
        registry.register(Box::new(relationships::GetActorMoviesTool));

        registry.register(Box::new(compound::BulkMovieImportTool));
        registry.register(Box::new(compound::MovieRecommendationEngineTool));
        registry.register(Box::new(compound::DirectorCareerAnalysisTool));

        registry.register(Box::new(context::CreateSearchContextTool));
        registry.register(Box::new(context::GetContextPageTool));
        registry.register(Box::new(context::GetContextInfoTool));

        registry.register(Box::new(meta::ValidateToolCallTool::new(&registry)));

        registry
    }

    fn register(&mut self, tool: Box<dyn McpTool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        let mut tools: Vec<ToolDefinition> = self.tools.values().map(|t| t.definition()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn get_tool(&self, name: &str) -> Option<&dyn McpTool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub async fn call_tool(
        &self,
        name: &str,
        args: Value,
        state: &AppState,
    ) -> Result<Value, ServiceError> {
        let tool = self.get_tool(name).ok_or_else(|| {
            ServiceError::invalid(format!("Unknown tool: {name}"))
        })?;
        tool.execute(args, state).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared helper: deserialize a tool's `arguments` object into its typed
/// args struct, mapping a malformed payload onto `invalid_argument` instead
/// of a panic or a raw serde error escaping the dispatcher.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ServiceError> {
    serde_json::from_value(args).map_err(|e| ServiceError::invalid(e.to_string()))
}

pub(crate) fn registry_snapshot(registry: &ToolRegistry) -> Arc<[ToolDefinition]> {
    registry.list_tools().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_no_duplicate_names() {
        let registry = ToolRegistry::new();
        let names = registry.list_tools();
        let mut seen = std::collections::HashSet::new();
        for def in &names {
            assert!(seen.insert(def.name.clone()), "duplicate tool name {}", def.name);
        }
    }

    #[test]
    fn catalog_matches_the_fixed_set() {
        let registry = ToolRegistry::new();
        for name in [
            "get_movie",
            "add_movie",
            "update_movie",
            "delete_movie",
            "search_movies",
            "list_top_movies",
            "search_by_decade",
            "search_by_rating_range",
            "search_similar_movies",
            "add_actor",
            "get_actor",
            "update_actor",
            "delete_actor",
            "search_actors",
            "link_actor_to_movie",
            "unlink_actor_from_movie",
            "get_movie_cast",
            "get_actor_movies",
            "bulk_movie_import",
            "movie_recommendation_engine",
            "director_career_analysis",
            "create_search_context",
            "get_context_page",
            "get_context_info",
            "validate_tool_call",
        ] {
            assert!(registry.has_tool(name), "missing tool {name}");
        }
        assert_eq!(registry.list_tools().len(), 25);
    }
}
