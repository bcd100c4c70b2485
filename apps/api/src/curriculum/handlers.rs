use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::curriculum::draft::DraftStatus;
use crate::curriculum::publish::PublishReceipt;
use crate::curriculum::templates::{template_definition, TemplateDefinition, TemplateType};
use crate::curriculum::tree::Edit;
use crate::curriculum::workspace::{EditOutcome, NewSession, PagesView, SessionView};
use crate::errors::AppError;
use crate::layout::measurement::{MeasurementReport, ReportOutcome};
use crate::models::ids::{CourseId, SessionId};
use crate::models::session::SessionMetadata;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub course_id: CourseId,
    pub title: String,
    pub template_type: TemplateType,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub metadata: SessionMetadata,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

#[derive(Serialize)]
pub struct DraftSaveResponse {
    pub draft_status: DraftStatus,
}

/// GET /api/v1/templates/:template_type
pub async fn handle_get_template(
    Path(template_type): Path<TemplateType>,
) -> Json<TemplateDefinition> {
    Json(template_definition(template_type))
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".into()));
    }
    let view = state
        .workspace
        .create(NewSession {
            course_id: req.course_id,
            title: req.title,
            template_type: req.template_type,
            order: req.order,
            metadata: req.metadata,
            duration_minutes: req.duration_minutes,
        })
        .await;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.workspace.view(id).await?))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_close_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<StatusCode, AppError> {
    if state.workspace.close(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("session {id} is not open")))
    }
}

/// POST /api/v1/sessions/:id/edits
pub async fn handle_apply_edit(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(edit): Json<Edit>,
) -> Result<Json<EditOutcome>, AppError> {
    Ok(Json(state.workspace.edit(id, edit).await?))
}

/// POST /api/v1/sessions/:id/measurements
pub async fn handle_measurements(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(report): Json<MeasurementReport>,
) -> Result<Json<ReportOutcome>, AppError> {
    Ok(Json(state.workspace.record_measurements(id, report).await?))
}

/// GET /api/v1/sessions/:id/pages
pub async fn handle_get_pages(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<PagesView>, AppError> {
    let pages = state.workspace.pages(id, state.media.as_ref()).await?;
    Ok(Json(pages))
}

/// POST /api/v1/sessions/:id/draft
pub async fn handle_save_draft(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<DraftSaveResponse>, AppError> {
    let draft_status = state.workspace.save_draft(id).await?;
    Ok(Json(DraftSaveResponse { draft_status }))
}

/// POST /api/v1/sessions/:id/publish
pub async fn handle_publish(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<PublishReceipt>, AppError> {
    Ok(Json(state.workspace.publish(id).await?))
}
