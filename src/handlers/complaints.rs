//! Complaint handlers for signed-in users

use super::{ok, ApiResult, AppJson, AppPath, AppState};
use crate::error::AppError;
use crate::models::*;
use crate::validation::validate_complaint;
use axum::{extract::State, http::StatusCode, Extension, Json};
use uuid::Uuid;

pub async fn create_complaint(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    AppJson(input): AppJson<ComplaintRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ComplaintView>>), AppError> {
    let submission = validate_complaint(&input)?;
    let created = state.complaints.create(submission, &identity).await?.detach();
    Ok((StatusCode::CREATED, ok(created)))
}

pub async fn list_complaints(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<ComplaintView>> {
    Ok(ok(state.complaints.list(&identity).await?))
}

pub async fn get_complaint(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<ComplaintView> {
    Ok(ok(state.complaints.get(id, &identity).await?))
}

/// Owner edit. Ownership is checked before the body so strangers always get 403.
pub async fn update_complaint(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    AppPath(id): AppPath<Uuid>,
    payload: Result<AppJson<ComplaintRequest>, AppError>,
) -> ApiResult<ComplaintView> {
    state.complaints.ensure_editable(id, &identity).await?;
    let AppJson(input) = payload?;
    let updated = state
        .complaints
        .update_content(id, &input, &identity)
        .await?
        .detach();
    Ok(ok(updated))
}

pub async fn delete_complaint(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.complaints.delete(id, &identity).await?;
    Ok(ok(serde_json::json!({ "message": "Complaint removed" })))
}
