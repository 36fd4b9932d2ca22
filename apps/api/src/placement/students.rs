//! Student-facing placement routes: profile, resume, job board and applications.

use std::path::Path as FsPath;

use aws_sdk_s3::primitives::ByteStream;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::placement::{
    ApplicationRow, ApplicationStatus, InterviewRow, JobPostingRow, StudentProfileRow,
};
use crate::placement::audit;
use crate::placement::eligibility::{check_eligibility, Eligibility};
use crate::state::AppState;

const RESUME_EXTENSIONS: [&str; 3] = ["pdf", "doc", "docx"];

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct StudentDashboard {
    pub applied_count: i64,
    pub interviews_count: i64,
    pub placement_status: &'static str,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub full_name: String,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub branch: String,
    #[validate(range(min = 0.0, max = 10.0, message = "must be between 0 and 10"))]
    pub cgpa: f64,
    #[validate(range(min = 0, message = "cannot be negative"))]
    pub backlogs: i32,
    #[validate(length(max = 15, message = "must be at most 15 characters"))]
    pub phone: Option<String>,
    pub skills: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: StudentProfileRow,
    pub message: String,
}

/// A posting joined with its company's name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JobListingRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub job: JobPostingRow,
    pub company_name: String,
}

#[derive(Debug, Serialize)]
pub struct OpenJob {
    #[serde(flatten)]
    pub listing: JobListingRow,
    pub eligibility: Eligibility,
    pub applied: bool,
}

#[derive(Debug, Serialize, FromRow)]
pub struct MyApplicationRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub application: ApplicationRow,
    pub job_title: String,
    pub company_name: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct MyInterviewRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub interview: InterviewRow,
    pub job_title: String,
    pub company_name: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/student/dashboard
pub async fn handle_student_dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<StudentDashboard>, AppError> {
    let profile = current.require_student(&state.db).await?;

    let applied_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM applications WHERE student_id = $1")
        .bind(profile.id)
        .fetch_one(&state.db)
        .await?;

    let interviews_count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM interview_schedules i
        JOIN applications a ON a.id = i.application_id
        WHERE a.student_id = $1
        "#,
    )
    .bind(profile.id)
    .fetch_one(&state.db)
    .await?;

    let placed: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM applications WHERE student_id = $1 AND status = $2)",
    )
    .bind(profile.id)
    .bind(ApplicationStatus::Placed.as_str())
    .fetch_one(&state.db)
    .await?;

    Ok(Json(StudentDashboard {
        applied_count,
        interviews_count,
        placement_status: placement_status(placed),
    }))
}

/// GET /api/v1/student/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<StudentProfileRow>, AppError> {
    Ok(Json(current.require_student(&state.db).await?))
}

/// PUT /api/v1/student/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>, AppError> {
    req.validate()?;
    let profile = current.require_student(&state.db).await?;

    let profile = sqlx::query_as::<_, StudentProfileRow>(
        r#"
        UPDATE student_profiles
        SET full_name = $2, branch = $3, cgpa = $4, backlogs = $5, phone = $6, skills = $7
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(profile.id)
    .bind(req.full_name.trim())
    .bind(req.branch.trim())
    .bind(req.cgpa)
    .bind(req.backlogs)
    .bind(blank_to_none(req.phone))
    .bind(blank_to_none(req.skills))
    .fetch_one(&state.db)
    .await?;

    audit::record(&state.db, Some(current.id()), "updated student profile").await;
    Ok(Json(ProfileResponse {
        profile,
        message: "Profile updated.".to_string(),
    }))
}

/// POST /api/v1/student/resume (multipart, field `resume`)
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    current: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = current.require_student(&state.db).await?;

    let mut upload: Option<(String, bytes::Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        if field.name() != Some("resume") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?;
        upload = Some((file_name, data));
    }

    let (file_name, data) =
        upload.ok_or_else(|| AppError::Validation("resume file is required".to_string()))?;
    if data.is_empty() {
        return Err(AppError::Validation("The uploaded resume is empty".to_string()));
    }
    if data.len() > state.config.resume_max_bytes {
        return Err(AppError::Validation(format!(
            "Resume must be at most {} bytes",
            state.config.resume_max_bytes
        )));
    }
    let ext = resume_extension(&file_name)?;

    let key = resume_key(profile.id, &ext);
    state
        .s3
        .put_object()
        .bucket(&state.config.s3_bucket)
        .key(&key)
        .body(ByteStream::from(data.to_vec()))
        .content_type(content_type_for(&ext))
        .send()
        .await
        .map_err(|e| AppError::Storage(format!("S3 upload failed: {e}")))?;
    info!("Uploaded resume to s3://{}/{}", state.config.s3_bucket, key);

    let previous = profile.resume_key.clone();
    let profile = sqlx::query_as::<_, StudentProfileRow>(
        "UPDATE student_profiles SET resume_key = $2 WHERE id = $1 RETURNING *",
    )
    .bind(profile.id)
    .bind(&key)
    .fetch_one(&state.db)
    .await?;

    if let Some(old) = previous.filter(|old| *old != key) {
        if let Err(e) = state
            .s3
            .delete_object()
            .bucket(&state.config.s3_bucket)
            .key(&old)
            .send()
            .await
        {
            warn!("failed to remove old resume {old}: {e}");
        }
    }

    audit::record(&state.db, Some(current.id()), "uploaded resume").await;
    Ok(Json(ProfileResponse {
        profile,
        message: "Resume uploaded.".to_string(),
    }))
}

/// GET /api/v1/student/jobs
///
/// Postings whose deadline has not passed, each marked with the student's
/// eligibility and whether they already applied.
pub async fn handle_list_open_jobs(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<OpenJob>>, AppError> {
    let profile = current.require_student(&state.db).await?;
    let today = Local::now().date_naive();

    let listings = sqlx::query_as::<_, JobListingRow>(
        r#"
        SELECT j.*, c.company_name
        FROM job_postings j
        JOIN company_profiles c ON c.id = j.company_id
        WHERE j.deadline >= $1
        ORDER BY j.deadline, j.created_at
        "#,
    )
    .bind(today)
    .fetch_all(&state.db)
    .await?;

    let applied: Vec<Uuid> = sqlx::query_scalar("SELECT job_id FROM applications WHERE student_id = $1")
        .bind(profile.id)
        .fetch_all(&state.db)
        .await?;

    let jobs = listings
        .into_iter()
        .map(|listing| OpenJob {
            eligibility: check_eligibility(&profile, &listing.job, today),
            applied: applied.contains(&listing.job.id),
            listing,
        })
        .collect();
    Ok(Json(jobs))
}

/// POST /api/v1/student/jobs/:id/apply
pub async fn handle_apply(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(job_id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApplicationRow>), AppError> {
    let profile = current.require_student(&state.db).await?;

    let job = sqlx::query_as::<_, JobPostingRow>("SELECT * FROM job_postings WHERE id = $1")
        .bind(job_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;

    let eligibility = check_eligibility(&profile, &job, Local::now().date_naive());
    if !eligibility.eligible {
        return Err(AppError::Validation(format!(
            "You are not eligible for this job: {}",
            eligibility.reasons.join("; ")
        )));
    }

    let application = sqlx::query_as::<_, ApplicationRow>(
        r#"
        INSERT INTO applications (student_id, job_id, status)
        VALUES ($1, $2, $3)
        ON CONFLICT (student_id, job_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(profile.id)
    .bind(job.id)
    .bind(ApplicationStatus::Applied.as_str())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::Conflict("You have already applied for this job.".to_string()))?;

    audit::record(
        &state.db,
        Some(current.id()),
        format!("applied to job {} ({})", job.title, job.id),
    )
    .await;
    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /api/v1/student/applications
pub async fn handle_my_applications(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<MyApplicationRow>>, AppError> {
    let profile = current.require_student(&state.db).await?;
    let rows = sqlx::query_as::<_, MyApplicationRow>(
        r#"
        SELECT a.*, j.title AS job_title, c.company_name
        FROM applications a
        JOIN job_postings j ON j.id = a.job_id
        JOIN company_profiles c ON c.id = j.company_id
        WHERE a.student_id = $1
        ORDER BY a.applied_on DESC
        "#,
    )
    .bind(profile.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// GET /api/v1/student/interviews
pub async fn handle_my_interviews(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<MyInterviewRow>>, AppError> {
    let profile = current.require_student(&state.db).await?;
    let rows = sqlx::query_as::<_, MyInterviewRow>(
        r#"
        SELECT i.*, j.title AS job_title, c.company_name
        FROM interview_schedules i
        JOIN applications a ON a.id = i.application_id
        JOIN job_postings j ON j.id = a.job_id
        JOIN company_profiles c ON c.id = j.company_id
        WHERE a.student_id = $1
        ORDER BY i.date, i.time
        "#,
    )
    .bind(profile.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn placement_status(placed: bool) -> &'static str {
    if placed {
        "Placed"
    } else {
        "Not Placed"
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Lower-cased extension of an accepted resume file name.
fn resume_extension(file_name: &str) -> Result<String, AppError> {
    let ext = FsPath::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if RESUME_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(AppError::Validation(format!(
            "Resume must be one of: {}",
            RESUME_EXTENSIONS.join(", ")
        )))
    }
}

fn resume_key(profile_id: Uuid, ext: &str) -> String {
    format!("resumes/{profile_id}/{}.{ext}", Uuid::new_v4())
}

fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        _ => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_extension_accepts_known_types() {
        assert_eq!(resume_extension("cv.pdf").unwrap(), "pdf");
        assert_eq!(resume_extension("My CV.DOCX").unwrap(), "docx");
        assert_eq!(resume_extension("old.doc").unwrap(), "doc");
    }

    #[test]
    fn test_resume_extension_rejects_others() {
        for name in ["cv.txt", "cv", "", "archive.pdf.zip"] {
            assert!(
                matches!(resume_extension(name), Err(AppError::Validation(_))),
                "accepted {name}"
            );
        }
    }

    #[test]
    fn test_resume_key_is_scoped_to_profile() {
        let profile_id = Uuid::new_v4();
        let key = resume_key(profile_id, "pdf");
        assert!(key.starts_with(&format!("resumes/{profile_id}/")));
        assert!(key.ends_with(".pdf"));
        assert_ne!(key, resume_key(profile_id, "pdf"));
    }

    #[test]
    fn test_placement_status_words() {
        assert_eq!(placement_status(true), "Placed");
        assert_eq!(placement_status(false), "Not Placed");
    }

    #[test]
    fn test_blank_optional_fields_become_null() {
        assert_eq!(blank_to_none(Some("  ".to_string())), None);
        assert_eq!(blank_to_none(None), None);
        assert_eq!(
            blank_to_none(Some(" 9876543210 ".to_string())),
            Some("9876543210".to_string())
        );
    }

    #[test]
    fn test_profile_update_rejects_long_phone() {
        let req = ProfileUpdate {
            full_name: "Asha".to_string(),
            branch: "CSE".to_string(),
            cgpa: 8.1,
            backlogs: 0,
            phone: Some("1234567890123456".to_string()),
            skills: None,
        };
        assert!(req.validate().is_err());
    }
}
