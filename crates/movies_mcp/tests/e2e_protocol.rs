//! End-to-end tests for the MCP protocol engine.
//!
//! These drive a real `McpServer` over `ChannelTransport`, backed by a real
//! SQLite pool (in-memory, migrated), rather than calling handler methods
//! directly. No mocks of the dispatch path itself - only the transport is
//! swapped for a channel so the test doesn't need a child process.

use movies_core::{ActorService, CircuitBreaker, CompoundService, MovieService, SearchContextCache, ShutdownRegistry};
use movies_db::{
    create_pool, run_migrations, DbConfig, SqliteActorRepository, SqliteBulkImporter, SqliteMovieRepository,
};
use movies_mcp::{AppState, ChannelTransport, McpServer, McpServerConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

async fn real_state() -> AppState {
    let pool = create_pool(DbConfig::sqlite_memory()).await.unwrap();
    run_migrations(&pool).await.unwrap();

    let movie_repo = Arc::new(SqliteMovieRepository::new(pool.clone()));
    let actor_repo = Arc::new(SqliteActorRepository::new(pool.clone()));
    let importer = Arc::new(SqliteBulkImporter::new(pool));

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

struct Harness {
    in_tx: UnboundedSender<String>,
    out_rx: UnboundedReceiver<String>,
}

impl Harness {
    async fn spawn() -> Self {
        let (transport, in_tx, out_rx) = ChannelTransport::new();
        let server = Arc::new(McpServer::new(
            McpServerConfig::default(),
            real_state().await,
            Arc::new(transport),
            Arc::new(ShutdownRegistry::new()),
        ));
        tokio::spawn(server.run());
        Self { in_tx, out_rx }
    }

    async fn call(&mut self, request: Value) -> Value {
        self.in_tx.send(request.to_string()).unwrap();
        let line = self.out_rx.recv().await.expect("server closed the channel");
        serde_json::from_str(&line).unwrap()
    }

    async fn initialize(&mut self) {
        let response = self
            .call(json!({
                "jsonrpc": "2.0",
                "id": 0,
                "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "e2e", "version": "1" }
                }
            }))
            .await;
        assert!(response["result"]["serverInfo"]["name"].is_string());
    }

    async fn call_tool(&mut self, id: i64, name: &str, arguments: Value) -> Value {
        self.call(json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        }))
        .await
    }
}

#[tokio::test]
async fn tool_catalog_has_exactly_the_fixed_set_of_twenty_five_tools() {
    let mut harness = Harness::spawn().await;
    harness.initialize().await;

    let response = harness
        .call(json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" }))
        .await;
    let tools = response["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 25);
}

#[tokio::test]
async fn resource_catalog_lists_the_fixed_set_of_four_resources() {
    let mut harness = Harness::spawn().await;
    harness.initialize().await;

    let response = harness
        .call(json!({ "jsonrpc": "2.0", "id": 1, "method": "resources/list" }))
        .await;
    let resources = response["result"]["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 4);
}

#[tokio::test]
async fn add_then_get_then_delete_a_movie_round_trips_over_the_wire() {
    let mut harness = Harness::spawn().await;
    harness.initialize().await;

    let add = harness
        .call_tool(
            1,
            "add_movie",
            json!({
                "title": "The Matrix",
                "director": "The Wachowskis",
                "year": 1999,
                "rating": 8.7,
                "genres": ["Action", "Sci-Fi"]
            }),
        )
        .await;
    let text = add["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("added successfully"));

    let get = harness.call_tool(2, "get_movie", json!({ "id": 1 })).await;
    let movie: Value = serde_json::from_str(get["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(movie["title"], json!("The Matrix"));

    let delete = harness.call_tool(3, "delete_movie", json!({ "id": 1 })).await;
    assert!(delete["result"].is_object());

    let get_again = harness.call_tool(4, "get_movie", json!({ "id": 1 })).await;
    assert_eq!(get_again["error"]["code"], json!(-32602));
}

#[tokio::test]
async fn deleting_a_movie_cascades_its_cast_links_through_the_real_database() {
    let mut harness = Harness::spawn().await;
    harness.initialize().await;

    harness
        .call_tool(
            1,
            "add_movie",
            json!({ "title": "Heat", "director": "Michael Mann", "year": 1995 }),
        )
        .await;
    harness
        .call_tool(
            2,
            "add_actor",
            json!({ "name": "Al Pacino", "birth_year": 1940 }),
        )
        .await;
    harness
        .call_tool(3, "link_actor_to_movie", json!({ "actor_id": 1, "movie_id": 1 }))
        .await;

    let cast_before = harness.call_tool(4, "get_movie_cast", json!({ "movie_id": 1 })).await;
    let cast: Value = serde_json::from_str(cast_before["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(cast["cast"].as_array().unwrap().len(), 1);

    harness.call_tool(5, "delete_movie", json!({ "id": 1 })).await;

    let actor_movies = harness.call_tool(6, "get_actor_movies", json!({ "actor_id": 1 })).await;
    let movies: Value =
        serde_json::from_str(actor_movies["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(movies["movies"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn invalid_rating_is_rejected_before_it_reaches_the_database() {
    let mut harness = Harness::spawn().await;
    harness.initialize().await;

    let response = harness
        .call_tool(
            1,
            "add_movie",
            json!({ "title": "Bad", "director": "Dir", "year": 2000, "rating": 99.0 }),
        )
        .await;
    assert_eq!(response["error"]["code"], json!(-32602));
    let message = response["error"]["message"].as_str().unwrap();
    assert!(message.contains("rating"));
    assert!(message.contains("99"));
}

#[tokio::test]
async fn search_context_pages_cover_every_row_exactly_once() {
    let mut harness = Harness::spawn().await;
    harness.initialize().await;

    for i in 0..5 {
        harness
            .call_tool(
                10 + i,
                "add_movie",
                json!({ "title": format!("Movie {i}"), "director": "Dir", "year": 2000 + i }),
            )
            .await;
    }

    let created = harness
        .call_tool(
            100,
            "create_search_context",
            json!({ "search_criteria": {}, "page_size": 2 }),
        )
        .await;
    let context: Value =
        serde_json::from_str(created["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(context["total"], json!(5));
    let context_id = context["context_id"].clone();

    let mut seen = 0;
    let mut page_num = 0;
    loop {
        let page_response = harness
            .call_tool(
                200 + page_num,
                "get_context_page",
                json!({ "context_id": context_id, "page": page_num }),
            )
            .await;
        let page: Value =
            serde_json::from_str(page_response["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
        let items = page["items"].as_array().unwrap();
        seen += items.len();
        if !page["has_next"].as_bool().unwrap() {
            break;
        }
        page_num += 1;
    }
    assert_eq!(seen, 5);
}
