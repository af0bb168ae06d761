//! Middleware for authentication and security headers
//!
//! Both guards verify the bearer token and insert the decoded `Identity` into
//! the request extensions, available to handlers via `Extension<Identity>`.
//! Verification is a pure check of the signed payload; no store is consulted.

use crate::error::AppError;
use crate::handlers::AppState;
use crate::models::Identity;
use crate::services::tokens::{TokenError, TokenService};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

pub fn authenticate(tokens: &TokenService, headers: &HeaderMap) -> Result<Identity, AppError> {
    let token = bearer_token(headers)
        .ok_or_else(|| AppError::unauthenticated("No token, authorization denied"))?;

    tokens.verify(token).map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        match e {
            TokenError::Expired => AppError::unauthenticated("Token has expired"),
            _ => AppError::unauthenticated("Token is not valid"),
        }
    })
}

/// Any valid token
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = authenticate(&state.tokens, request.headers())?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// A valid token carrying the admin role
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = authenticate(&state.tokens, request.headers())?;
    if !identity.is_admin() {
        tracing::info!(
            "Admin route {} refused for {}",
            request.uri().path(),
            identity.username
        );
        return Err(AppError::forbidden("Admin access required"));
    }
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Security headers middleware
pub async fn security_headers(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if state.is_production {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        );
    }

    response
}
