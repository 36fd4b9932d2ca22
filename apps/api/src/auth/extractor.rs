use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::session::{SessionStore, SESSION_COOKIE};
use crate::errors::AppError;
use crate::models::placement::{CompanyProfileRow, StudentProfileRow};
use crate::models::user::UserRow;
use crate::state::AppState;

/// The authenticated user behind the request's session cookie.
///
/// Extraction fails with 401 when the cookie is missing, the session is
/// unknown, or the user has since been deleted.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: UserRow,
    pub session_token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Login required".to_string()))?;

        let user_id = state
            .sessions
            .lookup(&token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Session expired".to_string()))?;

        let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&state.db)
            .await?;
        let Some(user) = user else {
            return Err(drop_orphaned_session(state.sessions.as_ref(), &token, user_id).await);
        };

        Ok(CurrentUser {
            user,
            session_token: token,
        })
    }
}

/// Ends a session whose user no longer exists. The token itself is never
/// logged.
async fn drop_orphaned_session(sessions: &dyn SessionStore, token: &str, user_id: Uuid) -> AppError {
    tracing::warn!(user_id = %user_id, "session points at deleted user");
    if let Err(e) = sessions.destroy(token).await {
        tracing::error!(user_id = %user_id, "failed to drop orphaned session: {e}");
    }
    AppError::Unauthorized("Session expired".to_string())
}

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.user.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Loads the student profile, creating an empty one on first access.
    pub async fn require_student(&self, pool: &PgPool) -> Result<StudentProfileRow, AppError> {
        if !self.user.is_student {
            return Err(AppError::Forbidden);
        }
        sqlx::query(
            "INSERT INTO student_profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(self.user.id)
        .execute(pool)
        .await?;

        Ok(sqlx::query_as::<_, StudentProfileRow>(
            "SELECT * FROM student_profiles WHERE user_id = $1",
        )
        .bind(self.user.id)
        .fetch_one(pool)
        .await?)
    }

    pub async fn require_company(&self, pool: &PgPool) -> Result<CompanyProfileRow, AppError> {
        if !self.user.is_company {
            return Err(AppError::Forbidden);
        }
        sqlx::query_as::<_, CompanyProfileRow>("SELECT * FROM company_profiles WHERE user_id = $1")
            .bind(self.user.id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::Forbidden)
    }
}
