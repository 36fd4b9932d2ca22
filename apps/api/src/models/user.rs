use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_student: bool,
    pub is_company: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    /// Landing page for a freshly logged-in user. Admin wins over the other roles.
    pub fn dashboard_path(&self) -> &'static str {
        if self.is_admin {
            "/admin/dashboard"
        } else if self.is_student {
            "/student/dashboard"
        } else if self.is_company {
            "/company/dashboard"
        } else {
            "/"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(is_student: bool, is_company: bool, is_admin: bool) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            username: "asha".to_string(),
            email: "asha@example.edu".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            is_student,
            is_company,
            is_admin,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_dashboard_path_by_role() {
        assert_eq!(user(true, false, false).dashboard_path(), "/student/dashboard");
        assert_eq!(user(false, true, false).dashboard_path(), "/company/dashboard");
        assert_eq!(user(false, false, true).dashboard_path(), "/admin/dashboard");
        assert_eq!(user(false, false, false).dashboard_path(), "/");
    }

    #[test]
    fn test_admin_takes_precedence() {
        assert_eq!(user(true, false, true).dashboard_path(), "/admin/dashboard");
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let json = serde_json::to_value(user(true, false, false)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "asha");
    }
}
