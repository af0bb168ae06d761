//! Admin handlers for complaint triage, reporting and the archive

use super::{ok, ApiResult, AppJson, AppPath, AppState};
use crate::error::AppError;
use crate::models::*;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Duration;
use uuid::Uuid;

// =============================================================================
// Complaint Management
// =============================================================================

/// Every non-archived complaint, newest first
pub async fn list_complaints(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
) -> ApiResult<Vec<ComplaintView>> {
    Ok(ok(state.complaints.list(&admin).await?))
}

/// Single complaint, archived ones included
pub async fn get_complaint(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<ComplaintView> {
    Ok(ok(state.complaints.get(id, &admin).await?))
}

pub async fn update_complaint(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<TriageRequest>,
) -> ApiResult<ComplaintView> {
    let updated = state.complaints.triage(id, &input, &admin).await?.detach();
    Ok(ok(updated))
}

pub async fn add_note(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<NoteRequest>,
) -> ApiResult<ComplaintView> {
    Ok(ok(state.complaints.add_note(id, &input.note, &admin).await?))
}

// =============================================================================
// Reporting
// =============================================================================

pub async fn get_stats(State(state): State<AppState>) -> ApiResult<ComplaintStats> {
    Ok(ok(state.complaints.stats().await?))
}

/// CSV download of every complaint
pub async fn download_report(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    let csv = state.complaints.report().await?;
    tracing::info!("Complaint report exported by {}", admin.username);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"complaints-report.csv\"",
            ),
        ],
        csv,
    ))
}

pub async fn recent_activities(State(state): State<AppState>) -> ApiResult<Vec<Activity>> {
    Ok(ok(state.complaints.recent_activities().await?))
}

// =============================================================================
// Archive
// =============================================================================

/// Run the archive sweep now. The body is optional; without it the configured age applies.
pub async fn archive_complaints(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    body: Result<Json<ArchiveRequest>, JsonRejection>,
) -> ApiResult<serde_json::Value> {
    // A bodiless request uses the configured threshold; a bad body is rejected
    let requested = match body {
        Ok(Json(request)) => request.older_than_days,
        Err(JsonRejection::MissingJsonContentType(_)) => None,
        Err(rejection) => return Err(rejection.into()),
    };
    let older_than = match requested {
        Some(days) => Duration::try_days(days)
            .filter(|_| days > 0)
            .ok_or_else(|| AppError::validation("olderThanDays must be a positive number"))?,
        None => state.archive_after,
    };

    let archived = state.complaints.archive_sweep(older_than).await?;
    tracing::info!(
        "Archive sweep run by {}: {} complaints archived",
        admin.username,
        archived
    );
    Ok(ok(serde_json::json!({ "archived": archived })))
}
