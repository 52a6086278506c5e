//! User administration.
//!
//! Admin gating happens in the outer HTTP shell; these handlers manage the
//! passcode roster itself.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use reelkit_models::{Role, User};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// User row as exposed to the admin UI; includes the passcode, which the
/// default `User` serialization withholds.
#[derive(Debug, Serialize)]
pub struct AdminUser {
    pub id: String,
    pub username: String,
    pub passcode: String,
    pub role: Role,
}

impl From<User> for AdminUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            passcode: user.passcode,
            role: user.role,
        }
    }
}

/// GET /users
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<AdminUser>>> {
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(AdminUser::from).collect()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 80))]
    pub username: String,
    #[validate(length(min = 4, max = 80))]
    pub passcode: String,
    #[serde(default)]
    pub role: Role,
}

/// POST /users
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<Json<AdminUser>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let created = state
        .users
        .create(request.username.trim(), &request.passcode, request.role)
        .await?
        .ok_or_else(|| ApiError::Conflict("username or passcode already exists".into()))?;
    Ok(Json(AdminUser::from(created)))
}

/// DELETE /users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let deleted = state
        .users
        .delete(&reelkit_models::UserId::from_string(user_id.as_str()))
        .await?;
    if !deleted {
        return Err(ApiError::not_found(format!("user {user_id}")));
    }
    Ok(Json(json!({ "success": true })))
}
