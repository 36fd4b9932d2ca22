use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::placement::AuditLogRow;

const MAX_AUDIT_PAGE: i64 = 500;
const DEFAULT_AUDIT_PAGE: i64 = 100;

/// Appends an entry to the audit log.
///
/// Audit failures are logged and swallowed; the triggering action already
/// succeeded and must not be reported as failed.
pub async fn record(pool: &PgPool, user_id: Option<Uuid>, action: impl Into<String>) {
    let action = truncate_action(action.into());
    info!(user_id = ?user_id, "audit: {action}");
    if let Err(e) = sqlx::query("INSERT INTO audit_logs (user_id, action) VALUES ($1, $2)")
        .bind(user_id)
        .bind(&action)
        .execute(pool)
        .await
    {
        warn!("failed to write audit entry '{action}': {e}");
    }
}

/// Newest audit entries first.
pub async fn recent(pool: &PgPool, limit: Option<i64>) -> Result<Vec<AuditLogRow>, sqlx::Error> {
    sqlx::query_as::<_, AuditLogRow>(
        "SELECT * FROM audit_logs ORDER BY timestamp DESC LIMIT $1",
    )
    .bind(page_size(limit))
    .fetch_all(pool)
    .await
}

fn page_size(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_AUDIT_PAGE).clamp(1, MAX_AUDIT_PAGE)
}

/// The column holds at most 255 characters.
fn truncate_action(action: String) -> String {
    if action.chars().count() <= 255 {
        action
    } else {
        action.chars().take(255).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_defaults_and_clamps() {
        assert_eq!(page_size(None), 100);
        assert_eq!(page_size(Some(0)), 1);
        assert_eq!(page_size(Some(-5)), 1);
        assert_eq!(page_size(Some(20)), 20);
        assert_eq!(page_size(Some(10_000)), 500);
    }

    #[test]
    fn test_long_actions_truncated_to_column_width() {
        let long = "x".repeat(400);
        assert_eq!(truncate_action(long).chars().count(), 255);
        assert_eq!(truncate_action("login".to_string()), "login");
    }
}
