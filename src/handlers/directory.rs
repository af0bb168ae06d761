//! Admin handlers for users, categories and departments

use super::{ok, ApiResult, AppJson, AppPath, AppState};
use crate::error::AppError;
use crate::models::*;
use crate::validation::{
    parse_role, validate_email, validate_name, validate_registration, validate_username,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use std::collections::HashMap;
use uuid::Uuid;

type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

fn deleted(what: &str) -> Json<ApiResponse<serde_json::Value>> {
    ok(serde_json::json!({ "message": format!("{} deleted", what) }))
}

// =============================================================================
// Users
// =============================================================================

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<UserResponse>> {
    let users = state.stores.users.list().await?;
    Ok(ok(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    AppJson(input): AppJson<CreateUserRequest>,
) -> Created<UserResponse> {
    let registration = validate_registration(&RegisterRequest {
        username: input.username,
        email: input.email,
        password: input.password,
    })?;
    let role = match input.role.as_deref() {
        Some(role) => parse_role(role)?,
        None => Role::User,
    };

    let user = state.credentials.create_user(registration, role).await?;
    tracing::info!("User {} created by {}", user.id, admin.username);
    Ok((StatusCode::CREATED, ok(UserResponse::from(user))))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateUserRequest>,
) -> ApiResult<UserResponse> {
    let changes = UserChanges {
        username: input.username.as_deref().map(validate_username).transpose()?,
        email: input.email.as_deref().map(validate_email).transpose()?,
        role: input.role.as_deref().map(parse_role).transpose()?,
    };

    let user = state
        .stores
        .users
        .update(id, changes)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    tracing::info!("User {} updated by {}", id, admin.username);
    Ok(ok(UserResponse::from(user)))
}

/// Complaints owned by the user are kept and show the owner as unresolved
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<serde_json::Value> {
    if id == admin.id {
        return Err(AppError::validation("You cannot delete your own account"));
    }
    if !state.stores.users.delete(id).await? {
        return Err(AppError::not_found("User not found"));
    }
    tracing::info!("User {} deleted by {}", id, admin.username);
    Ok(deleted("User"))
}

// =============================================================================
// Categories
// =============================================================================

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    Ok(ok(state.stores.categories.list().await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    AppJson(input): AppJson<CategoryRequest>,
) -> Created<Category> {
    let name = validate_name(input.name.as_deref())?;
    let category = state.stores.categories.create(&name).await?;
    tracing::info!("Category '{}' created by {}", category.name, admin.username);
    Ok((StatusCode::CREATED, ok(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<CategoryRequest>,
) -> ApiResult<Category> {
    let name = validate_name(input.name.as_deref())?;
    let category = state
        .stores
        .categories
        .rename(id, &name)
        .await?
        .ok_or_else(|| AppError::not_found("Category not found"))?;
    tracing::info!("Category {} renamed by {}", id, admin.username);
    Ok(ok(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<serde_json::Value> {
    if !state.stores.categories.delete(id).await? {
        return Err(AppError::not_found("Category not found"));
    }
    tracing::info!("Category {} deleted by {}", id, admin.username);
    Ok(deleted("Category"))
}

// =============================================================================
// Departments
// =============================================================================

async fn department_views(
    state: &AppState,
    departments: Vec<Department>,
) -> Result<Vec<DepartmentView>, AppError> {
    let manager_ids: Vec<Uuid> = departments.iter().filter_map(|d| d.manager_id).collect();
    let managers: HashMap<Uuid, User> = if manager_ids.is_empty() {
        HashMap::new()
    } else {
        state
            .stores
            .users
            .find_many(&manager_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect()
    };

    Ok(departments
        .into_iter()
        .map(|d| DepartmentView {
            manager: d
                .manager_id
                .and_then(|id| managers.get(&id))
                .map(UserSummary::from),
            id: d.id,
            name: d.name,
            created_at: d.created_at,
        })
        .collect())
}

async fn department_view(state: &AppState, department: Department) -> Result<DepartmentView, AppError> {
    department_views(state, vec![department])
        .await?
        .pop()
        .ok_or_else(|| AppError::internal("department view lost"))
}

/// A manager reference has to point at an existing user
async fn ensure_manager(state: &AppState, manager: Option<Uuid>) -> Result<(), AppError> {
    if let Some(id) = manager {
        if state.stores.users.find_by_id(id).await?.is_none() {
            return Err(AppError::validation("Manager not found"));
        }
    }
    Ok(())
}

pub async fn list_departments(State(state): State<AppState>) -> ApiResult<Vec<DepartmentView>> {
    let departments = state.stores.departments.list().await?;
    Ok(ok(department_views(&state, departments).await?))
}

pub async fn create_department(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    AppJson(input): AppJson<DepartmentRequest>,
) -> Created<DepartmentView> {
    let name = validate_name(input.name.as_deref())?;
    let manager = input.manager.flatten();
    ensure_manager(&state, manager).await?;

    let department = state.stores.departments.create(&name, manager).await?;
    tracing::info!("Department '{}' created by {}", department.name, admin.username);
    Ok((StatusCode::CREATED, ok(department_view(&state, department).await?)))
}

pub async fn update_department(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<DepartmentRequest>,
) -> ApiResult<DepartmentView> {
    let name = input
        .name
        .as_deref()
        .map(|n| validate_name(Some(n)))
        .transpose()?;
    ensure_manager(&state, input.manager.flatten()).await?;

    let department = state
        .stores
        .departments
        .update(
            id,
            DepartmentChanges {
                name,
                manager_id: input.manager,
            },
        )
        .await?
        .ok_or_else(|| AppError::not_found("Department not found"))?;
    tracing::info!("Department {} updated by {}", id, admin.username);
    Ok(ok(department_view(&state, department).await?))
}

pub async fn delete_department(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<serde_json::Value> {
    if !state.stores.departments.delete(id).await? {
        return Err(AppError::not_found("Department not found"));
    }
    tracing::info!("Department {} deleted by {}", id, admin.username);
    Ok(deleted("Department"))
}
