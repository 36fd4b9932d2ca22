//! Admin routes: portal-wide counts, user management and the audit trail.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::placement::{ApplicationStatus, AuditLogRow};
use crate::models::user::UserRow;
use crate::placement::audit;
use crate::state::AppState;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AdminDashboard {
    pub students: i64,
    pub companies: i64,
    pub jobs: i64,
    pub applications: i64,
    pub placed_students: i64,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/admin/dashboard
pub async fn handle_admin_dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<AdminDashboard>, AppError> {
    current.require_admin()?;

    let counts = sqlx::query_as::<_, AdminDashboard>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM student_profiles) AS students,
            (SELECT COUNT(*) FROM company_profiles) AS companies,
            (SELECT COUNT(*) FROM job_postings)     AS jobs,
            (SELECT COUNT(*) FROM applications)     AS applications,
            (SELECT COUNT(DISTINCT student_id) FROM applications WHERE status = $1) AS placed_students
        "#,
    )
    .bind(ApplicationStatus::Placed.as_str())
    .fetch_one(&state.db)
    .await?;

    Ok(Json(counts))
}

/// GET /api/v1/admin/users
pub async fn handle_list_users(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<UserRow>>, AppError> {
    current.require_admin()?;
    let users = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(users))
}

/// DELETE /api/v1/admin/users/:id
///
/// Profiles, postings and applications go with the user; audit entries stay
/// with their user cleared.
pub async fn handle_delete_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    current.require_admin()?;
    ensure_not_self(user_id, current.id())?;

    let username: String = sqlx::query_scalar("DELETE FROM users WHERE id = $1 RETURNING username")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

    audit::record(&state.db, Some(current.id()), format!("deleted user {username}")).await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/admin/audit-log?limit=
pub async fn handle_audit_log(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLogRow>>, AppError> {
    current.require_admin()?;
    Ok(Json(audit::recent(&state.db, query.limit).await?))
}

fn ensure_not_self(target: Uuid, current: Uuid) -> Result<(), AppError> {
    if target == current {
        return Err(AppError::Validation(
            "You cannot delete your own account".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_cannot_delete_own_account() {
        let me = Uuid::new_v4();
        match ensure_not_self(me, me) {
            Err(AppError::Validation(msg)) => assert_eq!(msg, "You cannot delete your own account"),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(ensure_not_self(Uuid::new_v4(), me).is_ok());
    }
}
