//! Route table
//!
//! Three groups share one router: public auth endpoints, endpoints for any
//! signed-in user, and the admin surface. Guards are attached per group with
//! `route_layer`, so unknown paths fall through to the static frontend.

use crate::handlers::{
    admin, auth, complaints, directory,
    middleware::{require_admin, require_auth, security_headers},
    AppState,
};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let user = Router::new()
        .route(
            "/complaints",
            get(complaints::list_complaints).post(complaints::create_complaint),
        )
        .route(
            "/complaints/:id",
            get(complaints::get_complaint)
                .put(complaints::update_complaint)
                .delete(complaints::delete_complaint),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let admin = Router::new()
        // Complaint triage and reporting
        .route("/admin/complaints", get(admin::list_complaints))
        .route("/admin/complaints/stats", get(admin::get_stats))
        .route("/admin/complaints/report", get(admin::download_report))
        .route("/admin/complaints/archive", post(admin::archive_complaints))
        .route(
            "/admin/complaints/:id",
            get(admin::get_complaint).put(admin::update_complaint),
        )
        .route("/admin/complaints/:id/notes", post(admin::add_note))
        .route("/admin/activities", get(admin::recent_activities))
        // Reference data
        .route(
            "/admin/users",
            get(directory::list_users).post(directory::create_user),
        )
        .route(
            "/admin/users/:id",
            put(directory::update_user).delete(directory::delete_user),
        )
        .route(
            "/admin/categories",
            get(directory::list_categories).post(directory::create_category),
        )
        .route(
            "/admin/categories/:id",
            put(directory::update_category).delete(directory::delete_category),
        )
        .route(
            "/admin/departments",
            get(directory::list_departments).post(directory::create_department),
        )
        .route(
            "/admin/departments/:id",
            put(directory::update_department).delete(directory::delete_department),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(public)
        .merge(user)
        .merge(admin)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers,
        ))
        .with_state(state)
}
