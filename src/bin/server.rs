//! Native Store Server
//!
//! Writes raw content received from upstream systems to the document store
//! and reads it back in the format it was received.
//!
//! # Configuration
//!
//! Environment variables:
//! - `NATIVE_STORE_PORT`: Port to listen on (default: 8080)
//! - `NATIVE_STORE_DATABASE_PATH`: SQLite database file (default: ~/.local/share/native-store/native.db)
//! - `NATIVE_STORE_COLLECTIONS`: Comma separated collections to serve
//! - `NATIVE_STORE_CONFIG`: Path to config file (default: ~/.config/native-store/config.yaml)
//!
//! # Config File Format
//!
//! ```yaml
//! port: 8080
//! database_path: /var/lib/native-store/native.db
//! collections: [methode, universal-content, v1-metadata]
//! ids_timeout_secs: 10
//! ```
//!
//! # Endpoints
//!
//! - `GET|PUT|PATCH|DELETE /{collection}/{uuid}`: Native content
//! - `GET /{collection}/__ids`: Streams every id in a collection
//! - `GET /__health`, `/__gtg`, `/__ping`, `/__build-info`: Operational endpoints

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use native_store::{router, AppState, Config, Db, Gateway};

#[derive(Parser)]
#[command(name = "native-store-server")]
#[command(version)]
#[command(about = "Serves raw upstream content from the native store")]
struct Cli {
    /// Path to config file
    #[arg(long, short, env = "NATIVE_STORE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "native_store=info,native_store_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match Config::load(cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    if config.collections.is_empty() {
        tracing::warn!("No collections configured - every content request will be rejected");
    }
    tracing::info!("Database: {}", config.database_path.display());
    tracing::info!("Collections: {}", config.collections.join(", "));

    // Dial in the background; requests answer 503 until it resolves
    let db = Db::connect(config.db_settings());

    let indexing = db.clone();
    tokio::spawn(async move {
        let result = match indexing.open().await {
            Ok(connection) => connection.ensure_index().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::error!("Failed to prepare the document store: {}", e);
            std::process::exit(1);
        }
        tracing::info!("Document store connected and indexed");
    });

    let state = AppState {
        gateway: Gateway::new(db.clone()),
        ids_timeout: config.ids_timeout(),
    };
    let app = router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    if let Some(connection) = db.peek() {
        connection.close().await;
    }
    tracing::info!("Shut down");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
