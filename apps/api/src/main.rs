mod config;
mod curriculum;
mod db;
mod errors;
mod layout;
mod models;
mod routes;
mod state;
mod text;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::curriculum::draft::RedisDraftStore;
use crate::curriculum::media::S3MediaLibrary;
use crate::curriculum::publish::PgPublishStore;
use crate::curriculum::workspace::SessionWorkspace;
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Coursebuilder API v{}", env!("CARGO_PKG_VERSION"));

    // PostgreSQL: published sessions
    let db = create_pool(&config.database_url).await?;

    // Redis: draft snapshots
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized (draft ttl {}s)", config.draft_ttl_secs);

    // S3 / MinIO: media library objects and publish archives
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    let settings = config.scheduler_settings();
    info!(
        "Pagination debounce {}ms, task estimate {}pt",
        settings.debounce.as_millis(),
        settings.estimates.task_base
    );

    let workspace = SessionWorkspace::new(
        Arc::new(RedisDraftStore::new(redis, config.draft_ttl_secs)),
        Arc::new(PgPublishStore::new(db, s3.clone(), config.s3_bucket.clone())),
        settings,
    );
    let media = Arc::new(S3MediaLibrary::new(
        s3,
        config.s3_bucket.clone(),
        config.media_url_ttl(),
    ));

    // Build app state
    let state = AppState {
        workspace: Arc::new(workspace),
        media,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to the editor origin once it is configurable

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "coursebuilder-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
