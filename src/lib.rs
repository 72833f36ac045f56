//! An idea-voting service and its client.
//!
//! Visitors browse a paginated list of ideas and may cast up to [VOTE_CAP](models::VOTE_CAP)
//! votes, one per idea, identified by IP address.
//!
//! # Server
//!
//! An axum application over a [Store](store::Store): PostgreSQL via sqlx when `DATABASE_URL` is
//! set, otherwise an in-memory store. Routes live under `PREFIX` (default `api/v1`):
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/ideas?limit=&offset=` | page of ideas with vote counts, plus the total |
//! | GET | `/ideas/{id}` | one idea |
//! | GET | `/votes/status` | the caller's votes |
//! | POST | `/ideas/{id}/vote` | cast a vote |
//! | DELETE | `/votes/reset` | withdraw the caller's votes |
//!
//! Read endpoints are cached briefly and every endpoint is throttled per caller.
//!
//! # Client
//!
//! [client::store::IdeaStore] keeps the client-side view of ideas and votes and performs every
//! network call; [client::view] renders that state as text. The `ideas-client` binary puts the
//! two together in a terminal.
//!
//! # Setup
//!
//! ```sh
//! DATABASE_URL=postgres://localhost/ideas RUST_LOG=info cargo run --bin idea-poll
//! IDEAS_API_URL=http://localhost:3000/api/v1 cargo run --bin ideas-client
//! ```
use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::Router;
use axum_server::Handle;
use tokio::signal::ctrl_c;
use tracing::{error, info, warn};

pub mod cache;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ip;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod routes;
pub mod services;
pub mod store;
pub mod throttle;

use cache::ResponseCache;
use config::Config;
use handlers::AppState;
use memory::MemoryStore;
use postgres::PgStore;
use services::VoteService;
use store::{Store, StoreError};

/// Pick the storage backend the configuration asks for.
pub async fn open_store(config: &Config) -> Result<Arc<dyn Store>, StoreError> {
    match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url, config.max_connections).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
        None => {
            warn!("DATABASE_URL not set, votes will be kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

pub fn app(store: Arc<dyn Store>, config: &Config) -> Router {
    let state = AppState {
        service: VoteService::new(store),
        cache: Arc::new(ResponseCache::new()),
    };
    routes::create_routes(state, config)
}

pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Initializing store...");
    let store = open_store(&config).await?;
    let app = app(store, &config);

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    info!("Server running on {address}, routes under /{}", config.prefix);
    axum_server::bind(address)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
