//! The MCP protocol engine (`spec.md` §4.B): decodes one line into a
//! request, routes it by method, and encodes exactly one response line.
//!
//! Concurrency follows `spec.md` §5: the read loop decodes requests in
//! arrival order but hands each one to its own task, so a slow `search_movies`
//! never blocks a concurrent `get_movie`. Responses may therefore leave out
//! of order; the host correlates by `id`. A panic inside a handler is
//! recovered via a nested task join rather than a `catch_unwind`, since the
//! handler body is `async` and `UnwindSafe` isn't guaranteed across `.await`
//! points.

use crate::error_map::{bad_arguments, service_error};
use crate::resources::ResourceRegistry;
use crate::state::AppState;
use crate::tools::ToolRegistry;
use crate::transport::Transport;
use movies_core::shutdown::ShutdownRegistry;
use movies_core::timeout::{deadlines, handle_join_error, with_deadline};
use movies_protocol::{
    methods, ClientInfo, ErrorCode, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ResourceReadParams, ResourcesCapability, ResourcesListResult,
    ResourcesReadResult, ServerCapabilities, ServerInfo, ToolCallParams, ToolCallResult,
    ToolsCapability, ToolsListResult, ContentBlock, JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
    SERVER_NAME, SERVER_VERSION,
};
use movies_validate::{rules, RuleSet};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Construction-time configuration for [`McpServer`]. Everything that
/// varies per deployment (server identity, the `SERVER_TIMEOUT` env var)
/// lives here; the fixed tool and resource catalogs are assembled by
/// [`McpServer::new`].
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    pub server_name: String,
    pub server_version: String,
    /// Per-request deadline (`spec.md` §4.I); `movies-server` overrides this
    /// from `SERVER_TIMEOUT` when set.
    pub request_deadline: Duration,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            server_name: SERVER_NAME.to_string(),
            server_version: SERVER_VERSION.to_string(),
            request_deadline: deadlines::REQUEST,
        }
    }
}

/// The running server: one per process, shared across request tasks behind
/// an `Arc` so `run` can spawn a task per inbound line without cloning any
/// of its fields individually.
pub struct McpServer {
    config: McpServerConfig,
    state: AppState,
    tools: ToolRegistry,
    resources: ResourceRegistry,
    transport: Arc<dyn Transport>,
    shutdown: Arc<ShutdownRegistry>,
    initialized: AtomicBool,
}

impl McpServer {
    pub fn new(
        config: McpServerConfig,
        state: AppState,
        transport: Arc<dyn Transport>,
        shutdown: Arc<ShutdownRegistry>,
    ) -> Self {
        Self {
            config,
            state,
            tools: ToolRegistry::new(),
            resources: ResourceRegistry::new(),
            transport,
            shutdown,
            initialized: AtomicBool::new(false),
        }
    }

    /// Reads newline-delimited requests until EOF, dispatching each on its
    /// own task, then runs the registered shutdown hooks under the shutdown
    /// deadline.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        info!("movies-mcp-server starting");

        loop {
            match self.transport.read_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let this = Arc::clone(&self);
                    tokio::spawn(async move { this.handle_line(line).await });
                }
                Ok(None) => {
                    info!("stdin closed, shutting down");
                    break;
                }
                Err(err) => {
                    error!(error = %err, "transport read failed");
                    break;
                }
            }
        }

        match movies_core::shutdown::graceful_shutdown(&self.shutdown).await {
            Ok(()) => info!("shutdown hooks completed"),
            Err(err) => warn!(error = %err, "shutdown did not complete within the deadline"),
        }
        Ok(())
    }

    async fn handle_line(self: Arc<Self>, line: String) {
        let request: JsonRpcRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                let response = JsonRpcResponse::error(
                    None,
                    JsonRpcError::new(ErrorCode::ParseError, format!("Parse error: {err}")),
                );
                self.write(&response).await;
                return;
            }
        };

        if request.is_notification() {
            // Never answered, per spec.md §4.B/§6, regardless of method.
            return;
        }

        let response = self.clone().dispatch_recovering_panics(request).await;
        if !response.is_empty() {
            self.write(&response).await;
        }
    }

    /// Runs [`Self::dispatch`] on a nested task so a handler panic becomes a
    /// recovered internal error instead of silently dropping the response
    /// (`spec.md` §7).
    async fn dispatch_recovering_panics(self: Arc<Self>, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        let this = Arc::clone(&self);
        match tokio::spawn(async move { this.dispatch(request).await }).await {
            Ok(response) => response,
            Err(join_err) => {
                let mapped = handle_join_error("dispatch", join_err);
                JsonRpcResponse::error(id, service_error(mapped))
            }
        }
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        if request.jsonrpc != JSONRPC_VERSION {
            return JsonRpcResponse::error(
                request.id,
                JsonRpcError::new(
                    ErrorCode::InvalidRequest,
                    format!("Invalid request: unsupported jsonrpc version {}", request.jsonrpc),
                ),
            );
        }

        let initialized = self.initialized.load(Ordering::SeqCst);
        if !initialized && request.method != methods::INITIALIZE {
            return JsonRpcResponse::error(
                request.id,
                JsonRpcError::new(
                    ErrorCode::InvalidRequest,
                    "Invalid request: server has not been initialized",
                ),
            );
        }

        match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(request),
            methods::TOOLS_LIST => self.handle_tools_list(request),
            methods::TOOLS_CALL => self.handle_tools_call(request).await,
            methods::RESOURCES_LIST => self.handle_resources_list(request),
            methods::RESOURCES_READ => self.handle_resources_read(request).await,
            other => JsonRpcResponse::error(
                request.id,
                JsonRpcError::new(ErrorCode::MethodNotFound, format!("Method not found: {other}")),
            ),
        }
    }

    fn handle_initialize(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let Some(params) = request.params.clone() else {
            return JsonRpcResponse::error(
                request.id,
                JsonRpcError::new(ErrorCode::InvalidParams, "Invalid parameters: missing params"),
            );
        };

        let rule_set = RuleSet::new()
            .field("protocolVersion", vec![rules::required(), rules::mcp_protocol_version()])
            .field("clientInfo", vec![rules::required()]);
        if let Err(errors) = rule_set.validate(&params) {
            return JsonRpcResponse::error(
                request.id,
                JsonRpcError::with_data(ErrorCode::InvalidParams, errors.to_string(), errors.detail()),
            );
        }

        let parsed: InitializeParams = match serde_json::from_value(params) {
            Ok(parsed) => parsed,
            Err(err) => return JsonRpcResponse::error(request.id, bad_arguments(err)),
        };

        if parsed.protocol_version != MCP_PROTOCOL_VERSION {
            return JsonRpcResponse::error(
                request.id,
                JsonRpcError::new(
                    ErrorCode::InvalidParams,
                    format!(
                        "Invalid parameters: unsupported protocol version {}",
                        parsed.protocol_version
                    ),
                ),
            );
        }

        self.initialized.store(true, Ordering::SeqCst);
        info!(
            client = %client_label(&parsed.client_info),
            protocol_version = %parsed.protocol_version,
            "client initialized"
        );

        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
                resources: Some(ResourcesCapability {
                    list_changed: false,
                    subscribe: false,
                }),
                prompts: None,
                logging: None,
            },
            server_info: ServerInfo {
                name: self.config.server_name.clone(),
                version: self.config.server_version.clone(),
            },
        };

        JsonRpcResponse::success(request.id, serde_json::to_value(result).unwrap())
    }

    fn handle_tools_list(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: self.tools.list_tools(),
        };
        JsonRpcResponse::success(request.id, serde_json::to_value(result).unwrap())
    }

    async fn handle_tools_call(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let params: ToolCallParams = match request.params.clone() {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(err) => return JsonRpcResponse::error(request.id, bad_arguments(err)),
            },
            None => {
                return JsonRpcResponse::error(
                    request.id,
                    JsonRpcError::new(ErrorCode::InvalidParams, "Invalid parameters: missing params"),
                )
            }
        };

        if !self.tools.has_tool(&params.name) {
            return JsonRpcResponse::error(
                request.id,
                JsonRpcError::new(ErrorCode::MethodNotFound, format!("Method not found: {}", params.name)),
            );
        }

        let outcome = with_deadline(
            "request",
            self.config.request_deadline,
            self.state
                .breaker
                .call(self.tools.call_tool(&params.name, params.arguments, &self.state)),
        )
        .await;

        match outcome {
            Ok(value) => {
                let result = ToolCallResult {
                    content: content_for(&value),
                    is_error: false,
                };
                JsonRpcResponse::success(request.id, serde_json::to_value(result).unwrap())
            }
            Err(err) => JsonRpcResponse::error(request.id, service_error(err)),
        }
    }

    fn handle_resources_list(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let result = ResourcesListResult {
            resources: self.resources.list_resources(),
        };
        JsonRpcResponse::success(request.id, serde_json::to_value(result).unwrap())
    }

    async fn handle_resources_read(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let params: ResourceReadParams = match request.params.clone() {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(err) => return JsonRpcResponse::error(request.id, bad_arguments(err)),
            },
            None => {
                return JsonRpcResponse::error(
                    request.id,
                    JsonRpcError::new(ErrorCode::InvalidParams, "Invalid parameters: missing params"),
                )
            }
        };

        if !self.resources.is_known_uri(&params.uri) {
            return JsonRpcResponse::error(
                request.id,
                JsonRpcError::new(ErrorCode::MethodNotFound, format!("Method not found: {}", params.uri)),
            );
        }

        let outcome = with_deadline(
            "request",
            self.config.request_deadline,
            self.state.breaker.call(self.resources.read(&params.uri, &self.state)),
        )
        .await;

        match outcome {
            Ok(contents) => {
                let result = ResourcesReadResult { contents };
                JsonRpcResponse::success(request.id, serde_json::to_value(result).unwrap())
            }
            Err(err) => JsonRpcResponse::error(request.id, service_error(err)),
        }
    }

    async fn write(&self, response: &JsonRpcResponse) {
        let line = match serde_json::to_string(response) {
            Ok(line) => line,
            Err(err) => {
                error!(error = %err, "failed to serialize response");
                return;
            }
        };
        if let Err(err) = self.transport.write_line(&line).await {
            error!(error = %err, "failed to write response");
        }
    }
}

fn client_label(info: &ClientInfo) -> String {
    format!("{}/{}", info.name, info.version)
}

/// A handler that returns `{"message": "..."}` wants that string surfaced
/// verbatim as the tool's text content (`spec.md` §8 scenario B); anything
/// else is serialized whole so the caller can parse it back out.
fn content_for(value: &Value) -> Vec<ContentBlock> {
    match value.get("message").and_then(Value::as_str) {
        Some(message) => vec![ContentBlock::text(message.to_string())],
        None => vec![ContentBlock::text(
            serde_json::to_string(value).unwrap_or_else(|_| "null".to_string()),
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use movies_core::{ActorService, CircuitBreaker, CompoundService, MovieService, SearchContextCache};
    use movies_db::{InMemoryActorRepository, InMemoryBulkImporter, InMemoryMovieRepository};
    use serde_json::json;
    use std::time::Duration;

    fn test_state() -> AppState {
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

    fn server() -> (Arc<McpServer>, tokio::sync::mpsc::UnboundedSender<String>, tokio::sync::mpsc::UnboundedReceiver<String>) {
        let (transport, in_tx, out_rx) = ChannelTransport::new();
        let server = Arc::new(McpServer::new(
            McpServerConfig::default(),
            test_state(),
            Arc::new(transport),
            Arc::new(ShutdownRegistry::new()),
        ));
        (server, in_tx, out_rx)
    }

    fn init_request() -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "t", "version": "1" }
            }
        })
    }

    #[tokio::test]
    async fn initialize_reports_server_identity() {
        let (server, _in_tx, _out_rx) = server();
        let response = server.dispatch(serde_json::from_value(init_request()).unwrap()).await;
        let result = response.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], json!("movies-mcp-server"));
        assert_eq!(result["serverInfo"]["version"], json!("0.2.0"));
        assert_eq!(result["protocolVersion"], json!("2024-11-05"));
        assert!(result["capabilities"]["tools"].is_object());
        assert!(result["capabilities"]["resources"].is_object());
    }

    #[tokio::test]
    async fn requests_before_initialize_are_rejected() {
        let (server, _in_tx, _out_rx) = server();
        let request: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/list"
        }))
        .unwrap();
        let response = server.dispatch(request).await;
        assert_eq!(response.error.unwrap().code, ErrorCode::InvalidRequest.as_i32());
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let (server, _in_tx, _out_rx) = server();
        server.dispatch(serde_json::from_value(init_request()).unwrap()).await;
        let request: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "nope/nope"
        }))
        .unwrap();
        let response = server.dispatch(request).await;
        assert_eq!(response.error.unwrap().code, ErrorCode::MethodNotFound.as_i32());
    }

    #[tokio::test]
    async fn add_movie_round_trips_through_tools_call() {
        let (server, _in_tx, _out_rx) = server();
        server.dispatch(serde_json::from_value(init_request()).unwrap()).await;

        let add_request: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {
                "name": "add_movie",
                "arguments": {
                    "title": "The Matrix",
                    "director": "The Wachowskis",
                    "year": 1999,
                    "rating": 8.7,
                    "genres": ["Action", "Sci-Fi"]
                }
            }
        }))
        .unwrap();
        let response = server.dispatch(add_request).await;
        let result = response.result.unwrap();
        let content = result["content"][0]["text"].as_str().unwrap();
        assert_eq!(content, "Movie 'The Matrix' added successfully with ID: 1");
    }

    #[tokio::test]
    async fn invalid_rating_is_rejected_with_invalid_params() {
        let (server, _in_tx, _out_rx) = server();
        server.dispatch(serde_json::from_value(init_request()).unwrap()).await;

        let request: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {
                "name": "add_movie",
                "arguments": {
                    "title": "The Matrix",
                    "director": "The Wachowskis",
                    "year": 1999,
                    "rating": 11
                }
            }
        }))
        .unwrap();
        let response = server.dispatch(request).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, ErrorCode::InvalidParams.as_i32());
        assert!(error.message.to_lowercase().contains("rating"));
        assert!(error.message.contains("11"));
        assert_eq!(error.message.matches("Invalid parameters").count(), 1);
    }

    #[tokio::test]
    async fn notifications_receive_no_response() {
        let (server, in_tx, mut out_rx) = server();
        let server_task = tokio::spawn(server.run());
        in_tx
            .send(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }).to_string())
            .unwrap();
        in_tx.send(init_request().to_string()).unwrap();
        let line = out_rx.recv().await.unwrap();
        let response: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(response["id"], json!(1));
        drop(in_tx);
        let _ = server_task.await;
    }
}
