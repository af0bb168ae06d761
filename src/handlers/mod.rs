//! HTTP request handlers

pub mod admin;
pub mod auth;
pub mod complaints;
pub mod directory;
pub mod middleware;

#[cfg(test)]
mod tests;

use crate::db::Stores;
use crate::error::AppError;
use crate::models::ApiResponse;
use crate::services::{ComplaintService, Credentials, Mailer, Notifier, TokenService};
use axum::{
    extract::{FromRequest, FromRequestParts},
    Json,
};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub credentials: Credentials,
    pub complaints: ComplaintService,
    pub stores: Stores,
    /// Default age threshold for the archive sweep
    pub archive_after: chrono::Duration,
    pub is_production: bool,
}

impl AppState {
    pub fn new(
        stores: Stores,
        tokens: TokenService,
        mailer: Arc<dyn Mailer>,
        admin_email: Option<String>,
        archive_after: chrono::Duration,
        is_production: bool,
    ) -> Self {
        let notifier = Notifier::new(mailer, stores.users.clone(), admin_email);
        Self {
            tokens: Arc::new(tokens),
            credentials: Credentials::new(stores.users.clone()),
            complaints: ComplaintService::new(stores.clone(), notifier),
            stores,
            archive_after,
            is_production,
        }
    }
}

/// JSON body whose rejections use the application error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Path parameters whose rejections use the application error envelope
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

pub fn ok<T>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data))
}
