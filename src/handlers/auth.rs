//! Authentication handlers
//!
//! Login hands out a bearer token. There is no logout endpoint: the server
//! keeps no session, so signing out means the client discards its token.

use super::{ok, ApiResult, AppJson, AppState};
use crate::error::AppError;
use crate::models::*;
use crate::validation::{parse_role, validate_registration};
use axum::{extract::State, http::StatusCode, Json};

/// Self-service registration. New accounts always get the `user` role.
pub async fn register(
    State(state): State<AppState>,
    AppJson(input): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), AppError> {
    let registration = validate_registration(&input)?;
    let user = state.credentials.register(registration).await?;
    Ok((StatusCode::CREATED, ok(UserResponse::from(user))))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(input): AppJson<LoginRequest>,
) -> ApiResult<TokenResponse> {
    let role = parse_role(&input.role)?;
    let user = state
        .credentials
        .login(&input.username, &input.password, role)
        .await?;

    let token = state
        .tokens
        .issue(&user.identity())
        .map_err(|e| AppError::internal(e.to_string()))?;

    tracing::info!("User {} logged in as {}", user.username, role.as_str());
    Ok(ok(TokenResponse { token }))
}
