//! Axum route handlers for the question bank and paper generation.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Local, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::layout::{layout_paper, PageConfig, PaperLayout};
use crate::models::question::QuestionRow;
use crate::papers::bank::{self, QuestionFilter, QuestionInput};
use crate::papers::blueprint::{validate_marks_total, validate_shape, PaperHeader, PaperRequest};
use crate::papers::selector::{assemble_paper, AssembledPaper};
use crate::placement::audit;
use crate::render::render_paper_pdf;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub question: QuestionRow,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SubjectsQuery {
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub deleted: u64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PaperPreview {
    pub header: PaperHeader,
    #[serde(flatten)]
    pub paper: AssembledPaper,
}

// ────────────────────────────────────────────────────────────────────────────
// Question bank
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/questions?subject=&year=&unit=&marks=
pub async fn handle_list_questions(
    State(state): State<AppState>,
    _current: CurrentUser,
    Query(filter): Query<QuestionFilter>,
) -> Result<Json<Vec<QuestionRow>>, AppError> {
    Ok(Json(bank::list_questions(&state.db, &filter).await?))
}

/// GET /api/v1/questions/subjects?year=
pub async fn handle_list_subjects(
    State(state): State<AppState>,
    _current: CurrentUser,
    Query(query): Query<SubjectsQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(bank::list_subjects(&state.db, query.year).await?))
}

/// POST /api/v1/questions
pub async fn handle_add_question(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(input): Json<QuestionInput>,
) -> Result<(StatusCode, Json<QuestionResponse>), AppError> {
    let new = input.validate()?;
    let question = bank::add_question(&state.db, &new).await?;

    audit::record(
        &state.db,
        Some(current.id()),
        format!("added question {} ({})", question.id, question.subname),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(QuestionResponse {
            question,
            message: "Question saved successfully!".to_string(),
        }),
    ))
}

/// GET /api/v1/questions/:id
pub async fn handle_get_question(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<QuestionRow>, AppError> {
    Ok(Json(bank::get_question(&state.db, id).await?))
}

/// PUT /api/v1/questions/:id
pub async fn handle_update_question(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<QuestionInput>,
) -> Result<Json<QuestionResponse>, AppError> {
    let new = input.validate()?;
    let question = bank::update_question(&state.db, id, &new).await?;

    audit::record(&state.db, Some(current.id()), format!("updated question {id}")).await;

    Ok(Json(QuestionResponse {
        question,
        message: "Question updated successfully!".to_string(),
    }))
}

/// DELETE /api/v1/questions/:id
pub async fn handle_delete_question(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !bank::delete_question(&state.db, id).await? {
        return Err(AppError::NotFound(format!("Question {id} not found")));
    }
    audit::record(&state.db, Some(current.id()), format!("deleted question {id}")).await;
    Ok(Json(serde_json::json!({ "message": "Successfully deleted!" })))
}

/// POST /api/v1/questions/bulk-delete
pub async fn handle_bulk_delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>, AppError> {
    if let Some(reply) = nothing_selected(&req.ids) {
        return Ok(Json(reply));
    }

    let deleted = bank::bulk_delete(&state.db, &req.ids).await?;
    audit::record(
        &state.db,
        Some(current.id()),
        format!("bulk deleted {deleted} of {} questions", req.ids.len()),
    )
    .await;

    Ok(Json(BulkDeleteResponse {
        deleted,
        message: "Selected questions deleted successfully.".to_string(),
    }))
}

/// An empty selection is not an error, just a no-op reply.
fn nothing_selected(ids: &[Uuid]) -> Option<BulkDeleteResponse> {
    ids.is_empty().then(|| BulkDeleteResponse {
        deleted: 0,
        message: "No questions selected for deletion.".to_string(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Paper generation
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/papers/preview
///
/// Draws a paper and returns it as JSON without rendering.
pub async fn handle_preview_paper(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<PaperRequest>,
) -> Result<Json<PaperPreview>, AppError> {
    let preview = draw_paper(&state, &current, &request).await?;
    Ok(Json(preview))
}

/// POST /api/v1/papers/pdf
///
/// Draws a paper and returns it as a downloadable PDF.
pub async fn handle_paper_pdf(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<PaperRequest>,
) -> Result<impl IntoResponse, AppError> {
    let preview = draw_paper(&state, &current, &request).await?;

    let layout: PaperLayout = plan_layout(&preview, &state.paper_layout);
    let bytes = tokio::task::spawn_blocking(move || render_paper_pdf(&layout))
        .await
        .map_err(|e| AppError::Pdf(format!("render task failed: {e}")))??;

    info!(
        "Rendered {} paper ({} bytes)",
        preview.header.subject,
        bytes.len()
    );

    let disposition = format!(
        "attachment; filename=\"{}_paper.pdf\"",
        filename_stem(&preview.header.subject_code)
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

async fn draw_paper(
    state: &AppState,
    current: &CurrentUser,
    request: &PaperRequest,
) -> Result<PaperPreview, AppError> {
    validate_shape(request)?;
    validate_marks_total(&request.sections, request.max_marks)?;

    let pool = bank::candidates_for_paper(&state.db, request.year, &request.subject).await?;
    info!(
        "Drawing {} year {} paper from {} candidate questions",
        request.subject,
        request.year,
        pool.len()
    );

    let mut rng = StdRng::from_entropy();
    let preview = build_preview(request, &pool, Local::now().date_naive(), &mut rng);

    audit::record(
        &state.db,
        Some(current.id()),
        format!(
            "generated {} paper: {} marks placed, {} slots unfilled",
            preview.header.subject,
            preview.paper.selected_marks,
            preview.paper.unfilled.len()
        ),
    )
    .await;

    Ok(preview)
}

/// Selection and header for an already validated request.
fn build_preview<R: Rng + ?Sized>(
    request: &PaperRequest,
    pool: &[QuestionRow],
    today: NaiveDate,
    rng: &mut R,
) -> PaperPreview {
    PaperPreview {
        header: request.header(today),
        paper: assemble_paper(pool, &request.sections, rng),
    }
}

fn plan_layout(preview: &PaperPreview, config: &PageConfig) -> PaperLayout {
    layout_paper(&preview.header, &preview.paper, config)
}

/// Keeps the download name header-safe.
fn filename_stem(subject_code: &str) -> String {
    let stem: String = subject_code
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    if stem.is_empty() {
        "question".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::default_page_config;
    use crate::papers::blueprint::{SectionSpec, SlotSpec};
    use chrono::Utc;

    #[test]
    fn test_empty_bulk_delete_replies_without_error() {
        let req: BulkDeleteRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        let reply = nothing_selected(&req.ids).unwrap();
        assert_eq!(
            serde_json::to_value(reply).unwrap(),
            serde_json::json!({ "deleted": 0, "message": "No questions selected for deletion." })
        );
        assert!(nothing_selected(&[Uuid::new_v4()]).is_none());
    }

    fn q(text: &str, unit: i32, marks: i32) -> QuestionRow {
        QuestionRow {
            id: Uuid::new_v4(),
            question: text.to_string(),
            subject_code: "CS201".to_string(),
            marks,
            unit,
            year: 2,
            subname: "Data Structures".to_string(),
            created_at: Utc::now(),
        }
    }

    fn request() -> PaperRequest {
        PaperRequest {
            year: 2,
            subject: "Data Structures".to_string(),
            subject_code: "CS201".to_string(),
            academic_year: "2026-27".to_string(),
            department: "Computer Engineering".to_string(),
            test_name: "Unit Test I".to_string(),
            term: "I".to_string(),
            division: "B".to_string(),
            hours: 1,
            minutes: 0,
            max_marks: 10,
            sections: vec![SectionSpec {
                questions_to_attempt: 2,
                marks_each: 5,
                slots: vec![SlotSpec { marks: 5, unit: 1 }, SlotSpec { marks: 5, unit: 2 }],
            }],
        }
    }

    #[test]
    fn test_preview_pairs_header_with_selection() {
        let pool = vec![q("Define a stack.", 1, 5), q("Define a queue.", 2, 5)];
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let preview = build_preview(&request(), &pool, today, &mut rng);
        assert_eq!(preview.header.date, "19/10/2026");
        assert_eq!(preview.header.duration, "1 hours");
        assert_eq!(preview.paper.selected_marks, 10);
        assert!(preview.paper.unfilled.is_empty());

        let labels: Vec<&str> = preview.paper.sections[0]
            .questions
            .iter()
            .map(|q| q.label.as_str())
            .collect();
        assert_eq!(labels, vec!["a)", "b)"]);
    }

    #[test]
    fn test_preview_serializes_flat() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let preview = build_preview(&request(), &[], today, &mut rng);
        let value = serde_json::to_value(&preview).unwrap();
        assert!(value.get("header").is_some());
        assert_eq!(value["selected_marks"], 0);
        assert_eq!(value["unfilled"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_preview_renders_to_pdf() {
        let pool = vec![q("Define a stack.", 1, 5), q("Define a queue.", 2, 5)];
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let preview = build_preview(&request(), &pool, today, &mut rng);

        let layout = plan_layout(&preview, &default_page_config());
        let bytes = render_paper_pdf(&layout).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_filename_stem_strips_unsafe_chars() {
        assert_eq!(filename_stem("CS-201"), "CS-201");
        assert_eq!(filename_stem("CS 201\"x"), "CS201x");
        assert_eq!(filename_stem(""), "question");
    }
}
