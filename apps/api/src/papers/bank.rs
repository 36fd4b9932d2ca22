//! Question bank persistence and input checks.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::question::QuestionRow;

const QUESTION_MAX_CHARS: usize = 300;
const SUBJECT_MAX_CHARS: usize = 100;

/// Body of an add or edit request. Every field is required.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QuestionInput {
    pub question: Option<String>,
    pub subject_code: Option<String>,
    pub subject: Option<String>,
    pub marks: Option<i32>,
    pub unit: Option<i32>,
    pub year: Option<i32>,
}

/// A validated question ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuestion {
    pub question: String,
    pub subject_code: String,
    pub subname: String,
    pub marks: i32,
    pub unit: i32,
    pub year: i32,
}

impl QuestionInput {
    pub fn validate(&self) -> Result<NewQuestion, AppError> {
        let text = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);

        let (Some(question), Some(subject_code), Some(subname), Some(marks), Some(unit), Some(year)) = (
            text(&self.question),
            text(&self.subject_code),
            text(&self.subject),
            self.marks,
            self.unit,
            self.year,
        ) else {
            return Err(AppError::Validation("All fields are required!".to_string()));
        };

        if question.chars().count() > QUESTION_MAX_CHARS {
            return Err(AppError::Validation(format!(
                "question must be at most {QUESTION_MAX_CHARS} characters"
            )));
        }
        if subject_code.chars().count() > SUBJECT_MAX_CHARS || subname.chars().count() > SUBJECT_MAX_CHARS {
            return Err(AppError::Validation(format!(
                "subject and subject code must be at most {SUBJECT_MAX_CHARS} characters"
            )));
        }
        if marks <= 0 || unit <= 0 || year <= 0 {
            return Err(AppError::Validation(
                "marks, unit and year must be positive".to_string(),
            ));
        }

        Ok(NewQuestion {
            question,
            subject_code,
            subname,
            marks,
            unit,
            year,
        })
    }
}

/// Narrowing filters for listing; absent fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionFilter {
    pub subject: Option<String>,
    pub year: Option<i32>,
    pub unit: Option<i32>,
    pub marks: Option<i32>,
}

pub async fn add_question(pool: &PgPool, q: &NewQuestion) -> Result<QuestionRow, AppError> {
    Ok(sqlx::query_as::<_, QuestionRow>(
        r#"
        INSERT INTO question_bank (question, subject_code, marks, unit, year, subname)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(&q.question)
    .bind(&q.subject_code)
    .bind(q.marks)
    .bind(q.unit)
    .bind(q.year)
    .bind(&q.subname)
    .fetch_one(pool)
    .await?)
}

pub async fn get_question(pool: &PgPool, id: Uuid) -> Result<QuestionRow, AppError> {
    sqlx::query_as::<_, QuestionRow>("SELECT * FROM question_bank WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Question {id} not found")))
}

pub async fn update_question(pool: &PgPool, id: Uuid, q: &NewQuestion) -> Result<QuestionRow, AppError> {
    sqlx::query_as::<_, QuestionRow>(
        r#"
        UPDATE question_bank
        SET question = $2, subject_code = $3, marks = $4, unit = $5, year = $6, subname = $7
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&q.question)
    .bind(&q.subject_code)
    .bind(q.marks)
    .bind(q.unit)
    .bind(q.year)
    .bind(&q.subname)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Question {id} not found")))
}

/// Returns whether a row was removed.
pub async fn delete_question(pool: &PgPool, id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM question_bank WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Deletes every listed id that exists; unknown ids are ignored.
pub async fn bulk_delete(pool: &PgPool, ids: &[Uuid]) -> Result<u64, AppError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query("DELETE FROM question_bank WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn list_questions(pool: &PgPool, filter: &QuestionFilter) -> Result<Vec<QuestionRow>, AppError> {
    let mut qb = filtered_query(filter);
    Ok(qb.build_query_as::<QuestionRow>().fetch_all(pool).await?)
}

fn filtered_query(filter: &QuestionFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb: QueryBuilder<'static, Postgres> = QueryBuilder::new("SELECT * FROM question_bank WHERE TRUE");
    if let Some(subject) = filter.subject.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        qb.push(" AND subname = ").push_bind(subject.to_string());
    }
    if let Some(year) = filter.year {
        qb.push(" AND year = ").push_bind(year);
    }
    if let Some(unit) = filter.unit {
        qb.push(" AND unit = ").push_bind(unit);
    }
    if let Some(marks) = filter.marks {
        qb.push(" AND marks = ").push_bind(marks);
    }
    qb.push(" ORDER BY year, subname, unit, marks, created_at");
    qb
}

pub async fn list_subjects(pool: &PgPool, year: Option<i32>) -> Result<Vec<String>, AppError> {
    Ok(sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT subname FROM question_bank WHERE ($1::INT IS NULL OR year = $1) ORDER BY subname",
    )
    .bind(year)
    .fetch_all(pool)
    .await?)
}

/// Every question a paper for `year`/`subject` may draw from, oldest first.
pub async fn candidates_for_paper(pool: &PgPool, year: i32, subject: &str) -> Result<Vec<QuestionRow>, AppError> {
    Ok(sqlx::query_as::<_, QuestionRow>(
        "SELECT * FROM question_bank WHERE year = $1 AND subname = $2 ORDER BY created_at, id",
    )
    .bind(year)
    .bind(subject.trim())
    .fetch_all(pool)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Execute;

    fn full_input() -> QuestionInput {
        QuestionInput {
            question: Some("  Explain the working of a B-tree.  ".to_string()),
            subject_code: Some("CS201".to_string()),
            subject: Some("Data Structures".to_string()),
            marks: Some(5),
            unit: Some(3),
            year: Some(2),
        }
    }

    #[test]
    fn test_complete_input_validates_and_trims() {
        let q = full_input().validate().unwrap();
        assert_eq!(q.question, "Explain the working of a B-tree.");
        assert_eq!(q.subname, "Data Structures");
        assert_eq!((q.marks, q.unit, q.year), (5, 3, 2));
    }

    #[test]
    fn test_any_missing_field_rejected() {
        let cases = [
            QuestionInput { question: None, ..full_input() },
            QuestionInput { subject_code: Some("   ".to_string()), ..full_input() },
            QuestionInput { subject: None, ..full_input() },
            QuestionInput { marks: None, ..full_input() },
            QuestionInput { unit: None, ..full_input() },
            QuestionInput { year: None, ..full_input() },
        ];
        for input in cases {
            match input.validate() {
                Err(AppError::Validation(msg)) => assert_eq!(msg, "All fields are required!"),
                other => panic!("expected rejection, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_overlong_question_rejected() {
        let input = QuestionInput {
            question: Some("x".repeat(301)),
            ..full_input()
        };
        assert!(matches!(input.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_nonpositive_marks_rejected() {
        let input = QuestionInput {
            marks: Some(0),
            ..full_input()
        };
        assert!(matches!(input.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_filter_builds_only_present_clauses() {
        let filter = QuestionFilter {
            subject: Some("Data Structures".to_string()),
            year: None,
            unit: Some(2),
            marks: None,
        };
        let mut qb = filtered_query(&filter);
        let sql = qb.build().sql().to_string();
        assert!(sql.contains("subname = $1"), "got {sql}");
        assert!(sql.contains("unit = $2"), "got {sql}");
        assert!(!sql.contains("year ="), "got {sql}");
        assert!(!sql.contains("marks ="), "got {sql}");
    }

    #[test]
    fn test_blank_subject_filter_ignored() {
        let filter = QuestionFilter {
            subject: Some("  ".to_string()),
            ..Default::default()
        };
        let mut qb = filtered_query(&filter);
        let sql = qb.build().sql().to_string();
        assert!(!sql.contains("subname ="), "got {sql}");
    }
}
