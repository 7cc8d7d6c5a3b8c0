//! Durak room server.
//!
//! Every room runs in its own actor owned by a [`RoomManager`]; rooms are
//! persisted through PostgreSQL, or kept in memory for local play.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Error;
use durak::{
    RoomManager,
    db::{Database, MemoryRoomStore, RoomStore},
};
use durak_server::{
    api,
    config::{ServerConfig, StorageBackend},
    logging, metrics,
};
use pico_args::Arguments;
use tracing::{error, info};

const HELP: &str = "\
Run a Durak room server

USAGE:
  durak_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]
  --db-url     URL         Database connection string  [default: env DATABASE_URL or postgres://postgres@localhost/durak]
  --storage    BACKEND     'postgres' or 'memory'      [default: env STORAGE or postgres]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  METRICS_BIND             Prometheus exporter address, disabled when unset
  DATABASE_URL             PostgreSQL connection string
  ROOM_LOCK_TIMEOUT_MS     How long a request may wait for its room
  STORE_TIMEOUT_MS         Bound on each store call
  (See .env file for all configuration options)
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    storage: Option<StorageBackend>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        storage: pargs.opt_value_from_str("--storage")?,
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url, args.storage)?;
    config.validate()?;

    if let Some(metrics_bind) = config.metrics_bind {
        metrics::init_metrics(metrics_bind).map_err(|e| anyhow::anyhow!(e))?;
        info!("Prometheus metrics exported on {}", metrics_bind);
    }

    let (store, database): (Arc<dyn RoomStore>, Option<Database>) = match config.storage {
        StorageBackend::Postgres => {
            info!("Connecting to database");
            let db = Database::new(&config.database)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
            let store = db.room_store();
            store
                .migrate()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to prepare room table: {}", e))?;
            info!("Database connected successfully");
            (Arc::new(store), Some(db))
        }
        StorageBackend::Memory => {
            info!("Using in-memory room storage; rooms are lost on restart");
            (Arc::new(MemoryRoomStore::new()), None)
        }
    };

    let room_manager = RoomManager::new(store, config.room.clone());
    let resumed = room_manager
        .resume_all()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to resume rooms: {}", e))?;
    info!("Server ready with {} resumed room(s)", resumed);

    let app = api::create_router(api::AppState::new(room_manager, database));

    info!("Starting HTTP/WebSocket server on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
}
