mod auth;
mod config;
mod db;
mod errors;
mod layout;
mod models;
mod papers;
mod placement;
mod render;
mod routes;
mod state;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::session::{MemorySessionStore, RedisSessionStore};
use crate::auth::SessionStore;
use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::layout::default_page_config;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Campus API v{}", env!("CARGO_PKG_VERSION"));

    // PostgreSQL
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;

    // Sessions
    let sessions: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.clone())?;
            info!("Redis session store initialized");
            Arc::new(RedisSessionStore::new(client, config.session_ttl_secs))
        }
        None => {
            warn!("REDIS_URL not set; sessions are kept in memory and lost on restart");
            Arc::new(MemorySessionStore::new(config.session_ttl_secs))
        }
    };

    // S3 / MinIO for resumes
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    let paper_layout = default_page_config();
    info!(
        "Paper layout: {}x{}pt, {}pt body",
        paper_layout.page_width_pt, paper_layout.page_height_pt, paper_layout.body_size_pt
    );

    let state = AppState {
        db,
        sessions,
        s3,
        config: config.clone(),
        paper_layout,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// S3 client for MinIO locally or AWS in production.
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "campus-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
