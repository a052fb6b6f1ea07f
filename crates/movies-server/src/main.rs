//! Process entry point: CLI parsing, configuration from the environment,
//! database pool/migration startup, and the stdio request loop.

use async_trait::async_trait;
use clap::Parser;
use movies_core::shutdown::{ShutdownHook, ShutdownRegistry};
use movies_core::CircuitBreaker;
use movies_db::{
    create_pool, run_migrations, DbConfig, DbPool, SqliteActorRepository, SqliteBulkImporter,
    SqliteMovieRepository,
};
use movies_logging::{init_logging, LogConfig};
use movies_mcp::{AppState, McpServer, McpServerConfig, StdioTransport};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Movies catalog MCP server: exposes the movie/actor/cast catalog to MCP
/// hosts over JSON-RPC 2.0 on stdio.
#[derive(Parser, Debug)]
#[command(name = "movies-server", version, about = "Movies catalog MCP server")]
struct Cli {
    /// Skip running embedded migrations at startup.
    #[arg(long)]
    skip_migrations: bool,

    /// Run embedded migrations and exit without starting the server.
    #[arg(long)]
    migrate_only: bool,

    /// Override LOG_LEVEL/RUST_LOG for this run.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(level) = &cli.log_level {
        std::env::set_var("LOG_LEVEL", level);
    }
    if let Err(err) = init_logging(LogConfig {
        app_name: "movies-server",
        verbose: cli.log_level.as_deref() == Some("debug") || cli.log_level.as_deref() == Some("trace"),
    }) {
        eprintln!("warning: failed to initialize logging: {err:?}");
    }

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "movies-server exited with a fatal error");
            ExitCode::from(3)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let db_config = match build_db_config() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "missing or invalid database configuration");
            return Ok(ExitCode::from(2));
        }
    };

    let pool = match create_pool(db_config).await {
        Ok(pool) => pool,
        Err(err) => {
            error!(error = %err, "database unreachable at startup");
            return Ok(ExitCode::from(2));
        }
    };

    if cli.migrate_only {
        return match run_migrations(&pool).await {
            Ok(applied) => {
                info!(applied, "migrations applied, exiting (--migrate-only)");
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => {
                error!(error = %err, "migration failed");
                Ok(ExitCode::from(1))
            }
        };
    }

    if !cli.skip_migrations {
        if let Err(err) = run_migrations(&pool).await {
            error!(error = %err, "migration failed");
            return Ok(ExitCode::from(1));
        }
    }

    let state = build_state(pool.clone());

    let shutdown = Arc::new(ShutdownRegistry::new());
    shutdown
        .register("close database pool", Box::new(ClosePoolHook { pool }))
        .await;

    let config = McpServerConfig {
        request_deadline: server_timeout(),
        ..McpServerConfig::default()
    };

    let server = Arc::new(McpServer::new(
        config,
        state,
        Arc::new(StdioTransport::new()),
        shutdown,
    ));

    server.run().await?;
    Ok(ExitCode::SUCCESS)
}

fn build_state(pool: DbPool) -> AppState {
    let movie_repo = Arc::new(SqliteMovieRepository::new(pool.clone()));
    let actor_repo = Arc::new(SqliteActorRepository::new(pool.clone()));
    let importer = Arc::new(SqliteBulkImporter::new(pool));

    AppState {
        movies: Arc::new(movies_core::MovieService::new(movie_repo.clone())),
        actors: Arc::new(movies_core::ActorService::new(actor_repo.clone(), movie_repo.clone())),
        compound: Arc::new(movies_core::CompoundService::new(movie_repo.clone(), importer)),
        contexts: Arc::new(movies_core::SearchContextCache::new(movie_repo.clone())),
        movie_repo,
        actor_repo,
        breaker: Arc::new(CircuitBreaker::new(5, Duration::from_secs(30))),
    }
}

/// Builds a [`DbConfig`] from the environment. `DATABASE_URL` wins outright;
/// otherwise a SQLite URL is assembled from `DB_NAME` (the other discrete
/// `DB_*` connection parameters describe a server-based backend this binary
/// does not speak, and are accepted but unused, matching the teacher's
/// pattern of tolerating config knobs a given deployment doesn't need).
fn build_db_config() -> anyhow::Result<DbConfig> {
    let mut config = if let Ok(url) = std::env::var("DATABASE_URL") {
        DbConfig {
            url,
            ..DbConfig::sqlite_memory()
        }
    } else {
        let db_name = std::env::var("DB_NAME")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL or DB_NAME must be set"))?;
        DbConfig::sqlite(db_name)
    };

    if let Ok(max) = std::env::var("DB_MAX_OPEN_CONNS") {
        config = config.with_max_connections(
            max.parse().map_err(|_| anyhow::anyhow!("DB_MAX_OPEN_CONNS must be an integer"))?,
        );
    }
    if let Ok(max) = std::env::var("DB_MAX_IDLE_CONNS") {
        config = config.with_max_idle_connections(
            max.parse().map_err(|_| anyhow::anyhow!("DB_MAX_IDLE_CONNS must be an integer"))?,
        );
    }
    if let Ok(secs) = std::env::var("DB_CONN_MAX_LIFETIME") {
        let secs: u64 = secs
            .parse()
            .map_err(|_| anyhow::anyhow!("DB_CONN_MAX_LIFETIME must be an integer number of seconds"))?;
        config = config.with_conn_max_lifetime(Duration::from_secs(secs));
    }

    Ok(config)
}

/// `SERVER_TIMEOUT` (seconds) overrides the per-request deadline; absent or
/// unparseable, the default request deadline applies.
fn server_timeout() -> Duration {
    std::env::var("SERVER_TIMEOUT")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(movies_core::timeout::deadlines::REQUEST)
}

struct ClosePoolHook {
    pool: DbPool,
}

#[async_trait]
impl ShutdownHook for ClosePoolHook {
    async fn run(&self) -> anyhow::Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
