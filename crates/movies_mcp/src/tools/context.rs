//! Search-context tools: `create_search_context`, `get_context_page`,
//! `get_context_info` (`spec.md` §4.H).

use super::{parse_args, McpTool};
use crate::state::AppState;
use async_trait::async_trait;
use movies_core::ServiceError;
use movies_db::{MovieOrderBy, MovieSearchCriteria, OrderDir};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

fn default_page_size() -> i64 {
    0
}

/// The nested object `spec.md` §6/§8 Scenario F sends under
/// `search_criteria`, e.g. `{"search_criteria":{"genre":"Action"}}`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchCriteriaArgs {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    director: Option<String>,
    #[serde(default)]
    genre: Option<String>,
    #[serde(default)]
    min_year: Option<i32>,
    #[serde(default)]
    max_year: Option<i32>,
    #[serde(default)]
    min_rating: Option<f64>,
    #[serde(default)]
    max_rating: Option<f64>,
    #[serde(default)]
    order_by: Option<String>,
    #[serde(default)]
    order_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateSearchContextArgs {
    #[serde(default)]
    search_criteria: SearchCriteriaArgs,
    #[serde(default = "default_page_size")]
    page_size: i64,
}

pub struct CreateSearchContextTool;

#[async_trait]
impl McpTool for CreateSearchContextTool {
    fn name(&self) -> &'static str {
        "create_search_context"
    }

    fn description(&self) -> &'static str {
        "Snapshot a movie search server-side for stable, paginated follow-up reads"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "search_criteria": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "director": { "type": "string" },
                        "genre": { "type": "string" },
                        "min_year": { "type": "integer" },
                        "max_year": { "type": "integer" },
                        "min_rating": { "type": "number" },
                        "max_rating": { "type": "number" },
                        "order_by": { "type": "string", "enum": ["title", "director", "year", "rating", "created_at", "updated_at"] },
                        "order_dir": { "type": "string", "enum": ["asc", "desc"] }
                    },
                    "additionalProperties": false
                },
                "page_size": { "type": "integer" }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: CreateSearchContextArgs = parse_args(args)?;
        let criteria_args = args.search_criteria;

        let order_by = match criteria_args.order_by {
            Some(raw) => MovieOrderBy::from_str_checked(&raw)
                .ok_or_else(|| ServiceError::invalid(format!("unknown order_by: {raw}")))?,
            None => MovieOrderBy::default(),
        };
        let order_dir = match criteria_args.order_dir {
            Some(raw) => OrderDir::from_str_checked(&raw)
                .ok_or_else(|| ServiceError::invalid(format!("unknown order_dir: {raw}")))?,
            None => OrderDir::default(),
        };

        let criteria = MovieSearchCriteria {
            title: criteria_args.title,
            director: criteria_args.director,
            genre: criteria_args.genre,
            min_year: criteria_args.min_year,
            max_year: criteria_args.max_year,
            min_rating: criteria_args.min_rating,
            max_rating: criteria_args.max_rating,
            order_by,
            order_dir,
            limit: 0,
            offset: 0,
        };

        let summary = state.contexts.create_context(criteria, args.page_size).await?;
        Ok(json!({
            "context_id": summary.context_id,
            "total": summary.total,
            "page_size": summary.page_size,
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GetContextPageArgs {
    context_id: Uuid,
    page: i64,
}

pub struct GetContextPageTool;

#[async_trait]
impl McpTool for GetContextPageTool {
    fn name(&self) -> &'static str {
        "get_context_page"
    }

    fn description(&self) -> &'static str {
        "Read one 0-based page of results from a search context"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "context_id": { "type": "string", "format": "uuid" },
                "page": { "type": "integer" }
            },
            "required": ["context_id", "page"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: GetContextPageArgs = parse_args(args)?;
        let page = state.contexts.get_page(args.context_id, args.page).await?;
        Ok(json!({
            "items": page.items,
            "page": page.page,
            "has_next": page.has_next,
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GetContextInfoArgs {
    context_id: Uuid,
}

pub struct GetContextInfoTool;

#[async_trait]
impl McpTool for GetContextInfoTool {
    fn name(&self) -> &'static str {
        "get_context_info"
    }

    fn description(&self) -> &'static str {
        "Inspect a search context's criteria and totals without hydrating entities"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "context_id": { "type": "string", "format": "uuid" } },
            "required": ["context_id"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, state: &AppState) -> Result<Value, ServiceError> {
        let args: GetContextInfoArgs = parse_args(args)?;
        let info = state.contexts.get_info(args.context_id).await?;
        Ok(json!({
            "context_id": info.context_id,
            "criteria": info.criteria,
            "total": info.total,
            "page_size": info.page_size,
        }))
    }
}
