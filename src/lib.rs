use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::GoogleOAuth;
use crate::events::{Dispatcher, EventBus, EventWorker, LogMailer, Mailer, SmtpMailer};
use crate::model::{DbConnection, ModelManager};
use crate::storage::LocalStorage;
use crate::utils::signal::shutdown_signal;
use crate::{error::AppResult, web::AppState};
use axum::Router;
use sqlx::migrate::Migrator;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub mod config;
pub use config::{Config, ConfigError, ConfigResult};

pub mod auth;
pub mod error;
pub mod events;
pub mod model;
pub mod storage;
pub mod utils;
pub mod web;

static APPLICATION_NAME: &str = "academy";

/// Time the event worker gets to flush queued notifications on shutdown.
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn build_server() -> AppResult<(AppState, Router, EventWorker)> {
    let use_local = cfg!(debug_assertions);
    let config = Config::get_or_init(use_local).await;
    let db = DbConnection::connect(config.app().database_uri())?;

    let migrator = Migrator::new(Path::new("./migrations")).await?;
    tracing::debug!("applying migrations...");
    migrator.run(db.pool()).await?;

    build_server_with_pool(db, config).await
}

/// Assembles the application around an existing pool. The returned worker
/// must be spawned for notifications to be written.
pub async fn build_server_with_pool(
    db: DbConnection,
    config: &'static Config,
) -> AppResult<(AppState, Router, EventWorker)> {
    let mm = ModelManager::new(db);
    let (events, rx) = EventBus::new();

    let storage =
        LocalStorage::new(config.uploads().dir(), config.uploads().public_path()).await?;
    let google = config
        .google()
        .map(GoogleOAuth::from_config)
        .transpose()?;

    let mailer: Arc<dyn Mailer> = match config.mail() {
        Some(mail) if config.app().is_production() => Arc::new(SmtpMailer::new(mail)?),
        _ => Arc::new(LogMailer),
    };
    let dispatcher = Dispatcher::new(mm.clone(), mailer, config.app().frontend_url());
    let worker = EventWorker::new(
        rx,
        Arc::new(dispatcher),
        config.events().max_attempts(),
        config.events().backoff(),
    );

    let state = AppState::new(mm, config, events, Arc::new(storage), google);
    let app = web::routes::build_app(state.clone());
    Ok((state, app, worker))
}

#[tracing::instrument]
pub async fn setup_workers() -> AppResult<()> {
    let (state, app, worker) = build_server().await?;
    let config = state.config();
    let listener = TcpListener::bind(config.host().bindto()).await?;

    let cancel = CancellationToken::new();
    let eviction = tokio::spawn(
        state
            .rate_limiter()
            .clone()
            .run_eviction(cancel.child_token()),
    );
    let events = tokio::spawn(worker.run(cancel.child_token()));

    tracing::info!("{} is starting at: {}", APPLICATION_NAME, config.host().bindto());
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    cancel.cancel();
    if tokio::time::timeout(WORKER_DRAIN_TIMEOUT, events).await.is_err() {
        tracing::warn!("event worker did not drain in time, pending notifications dropped");
    }
    let _ = eviction.await;

    state.pool().close().await;
    tracing::info!("shutdown complete");
    Ok(())
}

fn setup_trace() {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

    // load .env file for RUST_LOG etc.
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,{APPLICATION_NAME}=debug")));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .with(ErrorLayer::default())
        .init();

    error::install_panic_hook();
    tracing::debug!("tracing initialized.");
}

#[tracing::instrument]
pub async fn run() -> AppResult<()> {
    setup_trace();
    setup_workers().await?;
    Ok(())
}
