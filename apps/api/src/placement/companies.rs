//! Company-facing placement routes: postings, applicants and interviews.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::placement::{
    ApplicationRow, ApplicationStatus, CompanyProfileRow, InterviewRow, JobPostingRow,
};
use crate::placement::audit;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct JobInput {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub eligible_branches: String,
    #[validate(range(min = 0.0, max = 10.0, message = "must be between 0 and 10"))]
    pub min_cgpa: f64,
    #[validate(range(min = 0, message = "cannot be negative"))]
    pub max_backlogs: i32,
    pub deadline: NaiveDate,
}

#[derive(Debug, Serialize, FromRow)]
pub struct PostingSummaryRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub job: JobPostingRow,
    pub applied: i64,
    pub shortlisted: i64,
    pub interviewed: i64,
    pub placed: i64,
    pub rejected: i64,
}

#[derive(Debug, Serialize)]
pub struct CompanyDashboard {
    pub company: CompanyProfileRow,
    pub postings: Vec<PostingSummaryRow>,
}

/// An application joined with a summary of the applicant.
#[derive(Debug, Serialize, FromRow)]
pub struct ApplicantRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub application: ApplicationRow,
    pub full_name: String,
    pub branch: String,
    pub cgpa: f64,
    pub backlogs: i32,
    pub resume_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct InterviewInput {
    pub date: NaiveDate,
    pub time: NaiveTime,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub location: String,
}

/// Row used to authorise changes to an application: who owns its posting.
#[derive(Debug, FromRow)]
struct ApplicationOwnerRow {
    id: Uuid,
    owner_company_id: Uuid,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/company/dashboard
pub async fn handle_company_dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<CompanyDashboard>, AppError> {
    let company = current.require_company(&state.db).await?;

    let postings = sqlx::query_as::<_, PostingSummaryRow>(
        r#"
        SELECT j.*,
            COUNT(a.id) FILTER (WHERE a.status = 'Applied')     AS applied,
            COUNT(a.id) FILTER (WHERE a.status = 'Shortlisted') AS shortlisted,
            COUNT(a.id) FILTER (WHERE a.status = 'Interviewed') AS interviewed,
            COUNT(a.id) FILTER (WHERE a.status = 'Placed')      AS placed,
            COUNT(a.id) FILTER (WHERE a.status = 'Rejected')    AS rejected
        FROM job_postings j
        LEFT JOIN applications a ON a.job_id = j.id
        WHERE j.company_id = $1
        GROUP BY j.id
        ORDER BY j.created_at DESC
        "#,
    )
    .bind(company.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(CompanyDashboard { company, postings }))
}

/// POST /api/v1/company/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<JobInput>,
) -> Result<(StatusCode, Json<JobPostingRow>), AppError> {
    req.validate()?;
    let company = current.require_company(&state.db).await?;

    let job = sqlx::query_as::<_, JobPostingRow>(
        r#"
        INSERT INTO job_postings
            (company_id, title, description, eligible_branches, min_cgpa, max_backlogs, deadline)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(company.id)
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(req.eligible_branches.trim())
    .bind(req.min_cgpa)
    .bind(req.max_backlogs)
    .bind(req.deadline)
    .fetch_one(&state.db)
    .await?;

    info!("{} posted job {}", company.company_name, job.title);
    audit::record(
        &state.db,
        Some(current.id()),
        format!("posted job {} ({})", job.title, job.id),
    )
    .await;
    Ok((StatusCode::CREATED, Json(job)))
}

/// PUT /api/v1/company/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(job_id): Path<Uuid>,
    Json(req): Json<JobInput>,
) -> Result<Json<JobPostingRow>, AppError> {
    req.validate()?;
    let company = current.require_company(&state.db).await?;
    owned_job(&state.db, &company, job_id).await?;

    let job = sqlx::query_as::<_, JobPostingRow>(
        r#"
        UPDATE job_postings
        SET title = $2, description = $3, eligible_branches = $4,
            min_cgpa = $5, max_backlogs = $6, deadline = $7
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(job_id)
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(req.eligible_branches.trim())
    .bind(req.min_cgpa)
    .bind(req.max_backlogs)
    .bind(req.deadline)
    .fetch_one(&state.db)
    .await?;

    audit::record(&state.db, Some(current.id()), format!("updated job {job_id}")).await;
    Ok(Json(job))
}

/// DELETE /api/v1/company/jobs/:id
///
/// Cascades to the posting's applications and interviews.
pub async fn handle_delete_job(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let company = current.require_company(&state.db).await?;
    let job = owned_job(&state.db, &company, job_id).await?;

    sqlx::query("DELETE FROM job_postings WHERE id = $1")
        .bind(job_id)
        .execute(&state.db)
        .await?;

    audit::record(
        &state.db,
        Some(current.id()),
        format!("deleted job {} ({job_id})", job.title),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/company/jobs/:id/applications
pub async fn handle_job_applications(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Vec<ApplicantRow>>, AppError> {
    let company = current.require_company(&state.db).await?;
    owned_job(&state.db, &company, job_id).await?;

    let rows = sqlx::query_as::<_, ApplicantRow>(
        r#"
        SELECT a.*, s.full_name, s.branch, s.cgpa, s.backlogs, s.resume_key
        FROM applications a
        JOIN student_profiles s ON s.id = a.student_id
        WHERE a.job_id = $1
        ORDER BY a.applied_on
        "#,
    )
    .bind(job_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// PATCH /api/v1/applications/:id/status
///
/// Allowed for the company that owns the posting, or any admin.
pub async fn handle_update_status(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(application_id): Path<Uuid>,
    Json(req): Json<StatusUpdate>,
) -> Result<Json<ApplicationRow>, AppError> {
    let status: ApplicationStatus = req.status.parse().map_err(AppError::Validation)?;

    let owner = application_owner(&state.db, application_id).await?;
    if !current.user.is_admin {
        let company = current.require_company(&state.db).await?;
        if company.id != owner.owner_company_id {
            return Err(AppError::Forbidden);
        }
    }

    let application = sqlx::query_as::<_, ApplicationRow>(
        "UPDATE applications SET status = $2 WHERE id = $1 RETURNING *",
    )
    .bind(owner.id)
    .bind(status.as_str())
    .fetch_one(&state.db)
    .await?;

    audit::record(
        &state.db,
        Some(current.id()),
        format!("set application {application_id} to {status}"),
    )
    .await;
    Ok(Json(application))
}

/// PUT /api/v1/company/applications/:id/interview
///
/// An application has at most one interview; scheduling again replaces it.
pub async fn handle_schedule_interview(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(application_id): Path<Uuid>,
    Json(req): Json<InterviewInput>,
) -> Result<Json<InterviewRow>, AppError> {
    req.validate()?;
    let company = current.require_company(&state.db).await?;

    let owner = application_owner(&state.db, application_id).await?;
    if company.id != owner.owner_company_id {
        return Err(AppError::Forbidden);
    }

    let interview = sqlx::query_as::<_, InterviewRow>(
        r#"
        INSERT INTO interview_schedules (application_id, date, time, location)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (application_id)
        DO UPDATE SET date = EXCLUDED.date, time = EXCLUDED.time, location = EXCLUDED.location
        RETURNING *
        "#,
    )
    .bind(owner.id)
    .bind(req.date)
    .bind(req.time)
    .bind(req.location.trim())
    .fetch_one(&state.db)
    .await?;

    audit::record(
        &state.db,
        Some(current.id()),
        format!(
            "scheduled interview for application {application_id} on {} {}",
            interview.date, interview.time
        ),
    )
    .await;
    Ok(Json(interview))
}

// ────────────────────────────────────────────────────────────────────────────
// Ownership checks
// ────────────────────────────────────────────────────────────────────────────

async fn owned_job(
    pool: &PgPool,
    company: &CompanyProfileRow,
    job_id: Uuid,
) -> Result<JobPostingRow, AppError> {
    let job = sqlx::query_as::<_, JobPostingRow>("SELECT * FROM job_postings WHERE id = $1")
        .bind(job_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;
    if job.company_id != company.id {
        return Err(AppError::Forbidden);
    }
    Ok(job)
}

async fn application_owner(pool: &PgPool, application_id: Uuid) -> Result<ApplicationOwnerRow, AppError> {
    sqlx::query_as::<_, ApplicationOwnerRow>(
        r#"
        SELECT a.id, j.company_id AS owner_company_id
        FROM applications a
        JOIN job_postings j ON j.id = a.job_id
        WHERE a.id = $1
        "#,
    )
    .bind(application_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Application {application_id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_input(title: &str, min_cgpa: f64, max_backlogs: i32) -> JobInput {
        JobInput {
            title: title.to_string(),
            description: "Backend role".to_string(),
            eligible_branches: "CSE, IT".to_string(),
            min_cgpa,
            max_backlogs,
            deadline: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
        }
    }

    #[test]
    fn test_job_input_accepts_typical_posting() {
        assert!(job_input("Graduate Engineer", 7.0, 0).validate().is_ok());
    }

    #[test]
    fn test_job_input_rejects_bad_values() {
        assert!(job_input("", 7.0, 0).validate().is_err());
        assert!(job_input("Engineer", 10.5, 0).validate().is_err());
        assert!(job_input("Engineer", -1.0, 0).validate().is_err());
        assert!(job_input("Engineer", 6.0, -2).validate().is_err());
    }

    #[test]
    fn test_job_input_requires_deadline() {
        let body = r#"{"title":"Engineer","min_cgpa":6.0,"max_backlogs":1}"#;
        assert!(serde_json::from_str::<JobInput>(body).is_err());
    }

    #[test]
    fn test_interview_input_parses_date_and_time() {
        let body = r#"{"date":"2026-11-03","time":"14:30:00","location":"Room 204"}"#;
        let input: InterviewInput = serde_json::from_str(body).unwrap();
        assert_eq!(input.time, NaiveTime::from_hms_opt(14, 30, 0).unwrap());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_interview_input_requires_location() {
        let input = InterviewInput {
            date: NaiveDate::from_ymd_opt(2026, 11, 3).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            location: String::new(),
        };
        assert!(input.validate().is_err());
    }
}
