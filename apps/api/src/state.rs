use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::auth::SessionStore;
use crate::config::Config;
use crate::layout::PageConfig;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Login sessions. Redis in production, in-memory in tests.
    pub sessions: Arc<dyn SessionStore>,
    /// Resume file storage.
    pub s3: S3Client,
    pub config: Config,
    /// Page geometry and fonts for generated question papers.
    pub paper_layout: PageConfig,
}
