use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row of the question bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct QuestionRow {
    pub id: Uuid,
    pub question: String,
    pub subject_code: String,
    pub marks: i32,
    pub unit: i32,
    pub year: i32,
    pub subname: String,
    pub created_at: DateTime<Utc>,
}
