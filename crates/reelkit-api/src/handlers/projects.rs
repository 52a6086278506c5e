//! Project CRUD.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use reelkit_models::{Project, ProjectId, UserId};

use crate::error::{ApiError, ApiResult};
use crate::handlers::require_project;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    pub user_id: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

/// GET /projects
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ListProjectsQuery>,
) -> ApiResult<Json<Vec<Project>>> {
    let user_id = query.user_id.map(UserId::from_string);
    let projects = state
        .projects
        .list(user_id.as_ref(), query.include_deleted)
        .await?;
    Ok(Json(projects))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub user_id: Option<String>,
}

/// POST /projects
pub async fn create_project(
    State(state): State<AppState>,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<Json<Project>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let user_id = request.user_id.map(UserId::from_string);
    let project = state
        .projects
        .create(
            request.name.trim(),
            user_id.as_ref(),
            request.description.as_deref(),
        )
        .await?;
    Ok(Json(project))
}

/// GET /projects/{id}
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Project>> {
    Ok(Json(require_project(&state, &id).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

/// PUT /projects/{id}
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateProjectRequest>,
) -> ApiResult<Json<Project>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    require_project(&state, &id).await?;
    let updated = state
        .projects
        .update(
            &ProjectId::from_string(id.as_str()),
            request.name.as_deref().map(str::trim),
            request.description.as_deref(),
        )
        .await?
        .ok_or_else(|| ApiError::not_found(format!("project {id}")))?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub hard: bool,
}

/// DELETE /projects/{id}
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    require_project(&state, &id).await?;
    let deleted = state
        .projects
        .delete(&ProjectId::from_string(id), query.hard)
        .await?;
    Ok(Json(json!({ "success": deleted })))
}

/// POST /projects/{id}/restore
pub async fn restore_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Project>> {
    let restored = state
        .projects
        .restore(&ProjectId::from_string(id.as_str()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("project {id}")))?;
    Ok(Json(restored))
}
